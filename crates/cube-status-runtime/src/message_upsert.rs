//! Create-or-update state machine for the single status message per channel.

use std::sync::Arc;

use cube_discord::{DiscordApiError, MessagePayload, StatusMessenger};

/// Identifier of "the" status message this process owns in one channel.
/// Never persisted: a restart always starts a new message.
#[derive(Debug, Clone, Default)]
pub struct ChannelMessageState {
    last_message_id: Option<String>,
}

impl ChannelMessageState {
    pub fn last_message_id(&self) -> Option<&str> {
        self.last_message_id.as_deref()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// How a publish converged the channel onto the latest snapshot.
pub enum PublishOutcome {
    SentNew,
    Edited,
    Replaced,
}

/// Publishes `payload` as the status message for `channel_id`. Edits in
/// place while the remembered message survives; when it was deleted
/// out-of-band the edit reports NotFound and a fresh message takes over.
/// Any other edit failure keeps the remembered id so the next cycle
/// retries against the same message.
pub async fn publish(
    messenger: &Arc<dyn StatusMessenger>,
    channel_id: &str,
    payload: &MessagePayload,
    state: &mut ChannelMessageState,
) -> Result<PublishOutcome, DiscordApiError> {
    match state.last_message_id.clone() {
        Some(message_id) => match messenger.edit(channel_id, &message_id, payload).await {
            Ok(()) => Ok(PublishOutcome::Edited),
            Err(DiscordApiError::NotFound) => {
                let new_id = messenger.send(channel_id, payload).await?;
                state.last_message_id = Some(new_id);
                Ok(PublishOutcome::Replaced)
            }
            Err(error) => Err(error),
        },
        None => {
            let new_id = messenger.send(channel_id, payload).await?;
            state.last_message_id = Some(new_id);
            Ok(PublishOutcome::SentNew)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use cube_discord::{DiscordApiError, MessagePayload, StatusMessenger};

    use super::{publish, ChannelMessageState, PublishOutcome};

    #[derive(Clone, Copy, PartialEq, Eq)]
    enum EditScript {
        Succeed,
        NotFound,
        Forbidden,
    }

    struct FakeMessenger {
        edit_script: EditScript,
        next_id: AtomicUsize,
        sent: Mutex<Vec<String>>,
        edited: Mutex<Vec<(String, String)>>,
    }

    impl FakeMessenger {
        fn new(edit_script: EditScript) -> Arc<Self> {
            Arc::new(Self {
                edit_script,
                next_id: AtomicUsize::new(1),
                sent: Mutex::new(Vec::new()),
                edited: Mutex::new(Vec::new()),
            })
        }

        fn as_messenger(self: &Arc<Self>) -> Arc<dyn StatusMessenger> {
            Arc::clone(self) as Arc<dyn StatusMessenger>
        }
    }

    #[async_trait]
    impl StatusMessenger for FakeMessenger {
        async fn ready(&self) -> Result<(), DiscordApiError> {
            Ok(())
        }

        async fn send(
            &self,
            _channel_id: &str,
            payload: &MessagePayload,
        ) -> Result<String, DiscordApiError> {
            let id = format!("m{}", self.next_id.fetch_add(1, Ordering::SeqCst));
            self.sent
                .lock()
                .expect("sent lock")
                .push(payload.content.clone().unwrap_or_default());
            Ok(id)
        }

        async fn edit(
            &self,
            _channel_id: &str,
            message_id: &str,
            payload: &MessagePayload,
        ) -> Result<(), DiscordApiError> {
            match self.edit_script {
                EditScript::Succeed => {
                    self.edited.lock().expect("edited lock").push((
                        message_id.to_string(),
                        payload.content.clone().unwrap_or_default(),
                    ));
                    Ok(())
                }
                EditScript::NotFound => Err(DiscordApiError::NotFound),
                EditScript::Forbidden => Err(DiscordApiError::Status {
                    operation: "edit message",
                    status: 403,
                    body: "Missing Access".to_string(),
                }),
            }
        }

        async fn message_exists(
            &self,
            _channel_id: &str,
            _message_id: &str,
        ) -> Result<bool, DiscordApiError> {
            Ok(self.edit_script == EditScript::Succeed)
        }
    }

    fn payload(text: &str) -> MessagePayload {
        MessagePayload::from_text(text)
    }

    #[tokio::test]
    async fn functional_first_publish_sends_new_message_and_remembers_id() {
        let fake = FakeMessenger::new(EditScript::Succeed);
        let messenger = fake.as_messenger();
        let mut state = ChannelMessageState::default();

        let outcome = publish(&messenger, "C1", &payload("cycle 1"), &mut state)
            .await
            .expect("publish");
        assert_eq!(outcome, PublishOutcome::SentNew);
        assert_eq!(state.last_message_id(), Some("m1"));
        assert_eq!(fake.sent.lock().expect("sent").as_slice(), ["cycle 1"]);
    }

    #[tokio::test]
    async fn functional_publish_edits_in_place_with_latest_content() {
        let fake = FakeMessenger::new(EditScript::Succeed);
        let messenger = fake.as_messenger();
        let mut state = ChannelMessageState::default();

        publish(&messenger, "C1", &payload("cycle 1"), &mut state)
            .await
            .expect("first publish");
        let outcome = publish(&messenger, "C1", &payload("cycle 2"), &mut state)
            .await
            .expect("second publish");

        assert_eq!(outcome, PublishOutcome::Edited);
        assert_eq!(state.last_message_id(), Some("m1"));
        let edited = fake.edited.lock().expect("edited");
        assert_eq!(edited.as_slice(), [("m1".to_string(), "cycle 2".to_string())]);
    }

    #[tokio::test]
    async fn functional_publish_replaces_externally_deleted_message() {
        let fake = FakeMessenger::new(EditScript::NotFound);
        let messenger = fake.as_messenger();
        let mut state = ChannelMessageState::default();

        publish(&messenger, "C1", &payload("cycle 1"), &mut state)
            .await
            .expect("first publish");
        let outcome = publish(&messenger, "C1", &payload("cycle 2"), &mut state)
            .await
            .expect("second publish");

        assert_eq!(outcome, PublishOutcome::Replaced);
        assert_eq!(state.last_message_id(), Some("m2"));
    }

    #[tokio::test]
    async fn regression_other_edit_errors_keep_remembered_id_for_retry() {
        let fake = FakeMessenger::new(EditScript::Forbidden);
        let messenger = fake.as_messenger();
        let mut state = ChannelMessageState::default();

        publish(&messenger, "C1", &payload("cycle 1"), &mut state)
            .await
            .expect("first publish");
        let error = publish(&messenger, "C1", &payload("cycle 2"), &mut state)
            .await
            .expect_err("edit must fail");

        assert!(matches!(error, DiscordApiError::Status { status: 403, .. }));
        assert_eq!(state.last_message_id(), Some("m1"));
        assert_eq!(fake.sent.lock().expect("sent").len(), 1);
    }
}
