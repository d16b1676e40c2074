//! Messenger seam: payload shapes, error taxonomy, and the trait contract.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

/// Embed thumbnail, serialized to the Discord schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmbedThumbnail {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

/// One rich embed. Only the fields this bot renders are modeled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Embed {
    pub title: String,
    pub description: String,
    pub color: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<EmbedThumbnail>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<EmbedField>,
}

/// Body of a status message. Discord requires content or at least one embed,
/// so renderers emit a content line when there is nothing to embed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessagePayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub embeds: Vec<Embed>,
}

impl MessagePayload {
    pub fn from_embeds(embeds: Vec<Embed>) -> Self {
        Self {
            content: None,
            embeds,
        }
    }

    pub fn from_text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            embeds: Vec::new(),
        }
    }
}

#[derive(Debug, Error)]
/// Enumerates messaging failures. `NotFound` is the only variant the upsert
/// machine branches on; everything else surfaces at the scheduler boundary.
pub enum DiscordApiError {
    #[error("message not found")]
    NotFound,
    #[error("discord {operation} failed with status {status}: {body}")]
    Status {
        operation: &'static str,
        status: u16,
        body: String,
    },
    #[error("discord {operation} request failed: {source}")]
    Transport {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to decode discord {operation} response: {source}")]
    Decode {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },
}

#[async_trait]
/// Trait contract for the one-message-per-channel publishing surface.
pub trait StatusMessenger: Send + Sync {
    /// Blocks until the messaging backend accepts this identity; the poll
    /// loop must not start before this succeeds.
    async fn ready(&self) -> Result<(), DiscordApiError>;

    /// Sends a new message and returns its identifier.
    async fn send(
        &self,
        channel_id: &str,
        payload: &MessagePayload,
    ) -> Result<String, DiscordApiError>;

    /// Edits an existing message in place; fails with
    /// [`DiscordApiError::NotFound`] when it was deleted out-of-band.
    async fn edit(
        &self,
        channel_id: &str,
        message_id: &str,
        payload: &MessagePayload,
    ) -> Result<(), DiscordApiError>;

    /// Reports whether a message still exists.
    async fn message_exists(
        &self,
        channel_id: &str,
        message_id: &str,
    ) -> Result<bool, DiscordApiError>;
}
