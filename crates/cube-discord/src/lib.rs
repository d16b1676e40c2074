//! Discord messaging collaborator for cubewatch.
//!
//! Exposes the [`StatusMessenger`] seam the status runtime publishes
//! through, with a typed REST client implementation that classifies
//! deleted-message errors so the upsert machine can recover.

pub mod discord_api_client;
pub mod messenger;

pub use discord_api_client::{BotIdentity, DiscordApiClient};
pub use messenger::{
    DiscordApiError, Embed, EmbedField, EmbedThumbnail, MessagePayload, StatusMessenger,
};
