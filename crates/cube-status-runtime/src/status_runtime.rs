//! Poll scheduler driving the status-synchronization cycle.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use cube_directory::DirectoryCache;
use cube_discord::StatusMessenger;
use cube_protocol::{ServerAddr, StatusQuery};

use crate::aggregate::{aggregate_directory, aggregate_single};
use crate::message_upsert::{publish, ChannelMessageState, PublishOutcome};
use crate::prober::probe_all;
use crate::render::{render_directory_message, render_single_server_message};

/// Where each cycle's targets come from.
pub enum PollSource {
    /// Many servers discovered through the master directory, aggregated into
    /// one message without player tables.
    Master { directory: DirectoryCache },
    /// One fixed server, reported with player statistics even when idle.
    Fixed { addr: ServerAddr },
}

/// Runtime configuration for the status poll loop.
pub struct StatusRuntimeConfig {
    pub messenger: Arc<dyn StatusMessenger>,
    pub query: Arc<dyn StatusQuery>,
    pub channel_id: String,
    pub source: PollSource,
    pub poll_interval: Duration,
    pub poll_once: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
/// How (or whether) the cycle converged the channel message.
pub enum PublishDisposition {
    #[default]
    Skipped,
    Sent,
    Edited,
    Replaced,
}

impl PublishDisposition {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Skipped => "skipped",
            Self::Sent => "sent",
            Self::Edited => "edited",
            Self::Replaced => "replaced",
        }
    }
}

impl From<PublishOutcome> for PublishDisposition {
    fn from(outcome: PublishOutcome) -> Self {
        match outcome {
            PublishOutcome::SentNew => Self::Sent,
            PublishOutcome::Edited => Self::Edited,
            PublishOutcome::Replaced => Self::Replaced,
        }
    }
}

#[derive(Debug, Default)]
/// Counters for one cycle, reported on the scheduler's summary line.
pub struct PollCycleReport {
    pub targets: usize,
    pub probes_ok: usize,
    pub probes_timed_out: usize,
    pub probes_failed: usize,
    pub reportable: usize,
    pub publish: PublishDisposition,
}

/// Runs the status poll loop until the process stops.
pub async fn run_status_runtime(config: StatusRuntimeConfig) -> Result<()> {
    let mut runtime = StatusRuntime::new(config).await?;
    runtime.run().await
}

pub struct StatusRuntime {
    config: StatusRuntimeConfig,
    message_state: ChannelMessageState,
}

impl StatusRuntime {
    /// Waits for the messaging collaborator's readiness check before any
    /// cycle runs; a failure here is a startup failure, not a cycle failure.
    pub async fn new(config: StatusRuntimeConfig) -> Result<Self> {
        config
            .messenger
            .ready()
            .await
            .context("messaging collaborator failed its readiness check")?;
        Ok(Self {
            config,
            message_state: ChannelMessageState::default(),
        })
    }

    pub fn message_state(&self) -> &ChannelMessageState {
        &self.message_state
    }

    pub async fn run(&mut self) -> Result<()> {
        loop {
            match self.poll_once().await {
                Ok(report) => {
                    println!(
                        "status poll: channel={} targets={} ok={} timeouts={} failed={} reportable={} publish={}",
                        self.config.channel_id,
                        report.targets,
                        report.probes_ok,
                        report.probes_timed_out,
                        report.probes_failed,
                        report.reportable,
                        report.publish.as_str()
                    );
                }
                // A bad cycle never terminates the loop; state is intact and
                // the next cycle retries.
                Err(error) => {
                    eprintln!(
                        "status poll error: channel={} {error:#}",
                        self.config.channel_id
                    );
                }
            }

            if self.config.poll_once {
                return Ok(());
            }

            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    println!("status runtime shutdown requested");
                    return Ok(());
                }
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }
    }

    /// One full fetch -> probe -> aggregate -> render -> publish cycle.
    pub async fn poll_once(&mut self) -> Result<PollCycleReport> {
        let mut report = PollCycleReport::default();
        let (targets, single_mode) = match &mut self.config.source {
            PollSource::Master { directory } => (directory.get_targets().await, false),
            PollSource::Fixed { addr } => (vec![addr.clone()], true),
        };
        report.targets = targets.len();

        let results = probe_all(&self.config.query, &targets, single_mode).await;
        for (_, result) in &results {
            match result {
                Ok(_) => report.probes_ok = report.probes_ok.saturating_add(1),
                Err(error) if error.is_timeout() => {
                    report.probes_timed_out = report.probes_timed_out.saturating_add(1);
                }
                Err(_) => report.probes_failed = report.probes_failed.saturating_add(1),
            }
        }

        let entries = if single_mode {
            aggregate_single(results)
        } else {
            aggregate_directory(results)
        };
        report.reportable = entries.len();

        let payload = if single_mode {
            // An unreachable fixed server leaves the previous message alone.
            entries.first().map(render_single_server_message)
        } else {
            Some(render_directory_message(&entries))
        };
        let Some(payload) = payload else {
            return Ok(report);
        };

        let outcome = publish(
            &self.config.messenger,
            &self.config.channel_id,
            &payload,
            &mut self.message_state,
        )
        .await
        .with_context(|| format!("publish to channel {} failed", self.config.channel_id))?;
        report.publish = outcome.into();
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use httpmock::prelude::*;
    use tempfile::tempdir;

    use cube_directory::{DirectoryCache, MasterListClient};
    use cube_discord::{DiscordApiError, MessagePayload, StatusMessenger};
    use cube_protocol::{PlayerStat, QueryError, ServerAddr, ServerStatus, StatusQuery};

    use super::{PollSource, PublishDisposition, StatusRuntime, StatusRuntimeConfig};

    fn status(connected_clients: u32) -> ServerStatus {
        ServerStatus {
            description: "cycle test server".to_string(),
            map: "ac_arid".to_string(),
            mode: 0,
            mastermode: 0,
            minutes_remaining: 10,
            connected_clients,
            max_clients: 16,
        }
    }

    struct ScriptedQuery {
        statuses: HashMap<String, ServerStatus>,
        players: Vec<PlayerStat>,
    }

    impl ScriptedQuery {
        fn new(statuses: HashMap<String, ServerStatus>) -> Arc<Self> {
            Arc::new(Self {
                statuses,
                players: Vec::new(),
            })
        }
    }

    #[async_trait]
    impl StatusQuery for ScriptedQuery {
        async fn query_status(&self, addr: &ServerAddr) -> Result<ServerStatus, QueryError> {
            self.statuses
                .get(&addr.host)
                .cloned()
                .ok_or(QueryError::Timeout)
        }

        async fn query_player_stats(
            &self,
            _addr: &ServerAddr,
        ) -> Result<Vec<PlayerStat>, QueryError> {
            Ok(self.players.clone())
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum MessengerCall {
        Sent { id: String, embeds: usize },
        Edited { id: String, embeds: usize },
    }

    struct RecordingMessenger {
        next_id: AtomicUsize,
        fail_sends: bool,
        calls: Mutex<Vec<MessengerCall>>,
    }

    impl RecordingMessenger {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                next_id: AtomicUsize::new(1),
                fail_sends: false,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                next_id: AtomicUsize::new(1),
                fail_sends: true,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<MessengerCall> {
            self.calls.lock().expect("calls lock").clone()
        }
    }

    #[async_trait]
    impl StatusMessenger for RecordingMessenger {
        async fn ready(&self) -> Result<(), DiscordApiError> {
            Ok(())
        }

        async fn send(
            &self,
            _channel_id: &str,
            payload: &MessagePayload,
        ) -> Result<String, DiscordApiError> {
            if self.fail_sends {
                return Err(DiscordApiError::Status {
                    operation: "create message",
                    status: 500,
                    body: "upstream unavailable".to_string(),
                });
            }
            let id = format!("m{}", self.next_id.fetch_add(1, Ordering::SeqCst));
            self.calls.lock().expect("calls lock").push(MessengerCall::Sent {
                id: id.clone(),
                embeds: payload.embeds.len(),
            });
            Ok(id)
        }

        async fn edit(
            &self,
            _channel_id: &str,
            message_id: &str,
            payload: &MessagePayload,
        ) -> Result<(), DiscordApiError> {
            self.calls
                .lock()
                .expect("calls lock")
                .push(MessengerCall::Edited {
                    id: message_id.to_string(),
                    embeds: payload.embeds.len(),
                });
            Ok(())
        }

        async fn message_exists(
            &self,
            _channel_id: &str,
            _message_id: &str,
        ) -> Result<bool, DiscordApiError> {
            Ok(true)
        }
    }

    fn config(
        messenger: Arc<dyn StatusMessenger>,
        query: Arc<dyn StatusQuery>,
        source: PollSource,
    ) -> StatusRuntimeConfig {
        StatusRuntimeConfig {
            messenger,
            query,
            channel_id: "C1".to_string(),
            source,
            poll_interval: Duration::from_millis(1),
            poll_once: true,
        }
    }

    #[tokio::test]
    async fn integration_directory_cycles_send_then_edit_one_message() {
        let master = MockServer::start();
        master.mock(|when, then| {
            when.method(GET).path("/retrieve.do");
            then.status(200)
                .body("addserver one.example.org 28763\naddserver two.example.org 28763\n");
        });
        let temp = tempdir().expect("tempdir");
        let client = MasterListClient::new(master.base_url(), 2_000, 1, 1).expect("client");
        let directory = DirectoryCache::new(
            client,
            temp.path().join("master-list.json"),
            Duration::from_secs(3_600),
        );

        let query = ScriptedQuery::new(HashMap::from([
            ("one.example.org".to_string(), status(4)),
            ("two.example.org".to_string(), status(0)),
        ]));
        let messenger = RecordingMessenger::new();
        let mut runtime = StatusRuntime::new(config(
            messenger.clone(),
            query,
            PollSource::Master { directory },
        ))
        .await
        .expect("runtime");

        let first = runtime.poll_once().await.expect("first cycle");
        assert_eq!(first.targets, 2);
        assert_eq!(first.probes_ok, 2);
        assert_eq!(first.reportable, 1);
        assert_eq!(first.publish, PublishDisposition::Sent);
        assert_eq!(runtime.message_state().last_message_id(), Some("m1"));

        let second = runtime.poll_once().await.expect("second cycle");
        assert_eq!(second.publish, PublishDisposition::Edited);
        assert_eq!(runtime.message_state().last_message_id(), Some("m1"));

        assert_eq!(
            messenger.calls(),
            vec![
                MessengerCall::Sent {
                    id: "m1".to_string(),
                    embeds: 1
                },
                MessengerCall::Edited {
                    id: "m1".to_string(),
                    embeds: 1
                },
            ]
        );
    }

    #[tokio::test]
    async fn functional_single_mode_skips_publish_when_server_unreachable() {
        let query = ScriptedQuery::new(HashMap::new());
        let messenger = RecordingMessenger::new();
        let mut runtime = StatusRuntime::new(config(
            messenger.clone(),
            query,
            PollSource::Fixed {
                addr: ServerAddr::new("down.example.org", 28764),
            },
        ))
        .await
        .expect("runtime");

        let report = runtime.poll_once().await.expect("cycle");
        assert_eq!(report.targets, 1);
        assert_eq!(report.probes_timed_out, 1);
        assert_eq!(report.reportable, 0);
        assert_eq!(report.publish, PublishDisposition::Skipped);
        assert!(messenger.calls().is_empty());
        assert_eq!(runtime.message_state().last_message_id(), None);
    }

    #[tokio::test]
    async fn functional_single_mode_reports_idle_server() {
        let query = ScriptedQuery::new(HashMap::from([(
            "home.example.org".to_string(),
            status(0),
        )]));
        let messenger = RecordingMessenger::new();
        let mut runtime = StatusRuntime::new(config(
            messenger.clone(),
            query,
            PollSource::Fixed {
                addr: ServerAddr::new("home.example.org", 28764),
            },
        ))
        .await
        .expect("runtime");

        let report = runtime.poll_once().await.expect("cycle");
        assert_eq!(report.reportable, 1);
        assert_eq!(report.publish, PublishDisposition::Sent);
        assert_eq!(
            messenger.calls(),
            vec![MessengerCall::Sent {
                id: "m1".to_string(),
                embeds: 1
            }]
        );
    }

    #[tokio::test]
    async fn regression_publish_failure_surfaces_as_cycle_error_with_state_intact() {
        let query = ScriptedQuery::new(HashMap::from([(
            "home.example.org".to_string(),
            status(2),
        )]));
        let messenger = RecordingMessenger::failing();
        let mut runtime = StatusRuntime::new(config(
            messenger.clone(),
            query,
            PollSource::Fixed {
                addr: ServerAddr::new("home.example.org", 28764),
            },
        ))
        .await
        .expect("runtime");

        let error = runtime.poll_once().await.expect_err("publish must fail");
        assert!(error.to_string().contains("channel C1"));
        assert_eq!(runtime.message_state().last_message_id(), None);
    }
}
