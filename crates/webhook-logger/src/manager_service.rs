// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Actor owning the log queues and the background tasks that drain them.
//!
//! ```text
//!    ┌──────────────┐          ┌────────────────┐
//!    │   Handles    │ commands │    Service     │ owns queues, dispatch
//!    │ (producers)  │ ───────> │   actor task   │ task table, liveness timer
//!    └──────────────┘          └───────┬────────┘
//!                                      │ spawns
//!                       ┌──────────────┴──────────────┐
//!                       v                             v
//!               ┌───────────────┐            ┌────────────────┐
//!               │ Dispatch loop │ 1 per      │ Liveness timer │
//!               │               │ destination│                │
//!               └───────────────┘            └────────────────┘
//! ```
//!
//! Every read and write of the queues happens on the service task, one
//! command at a time. `enqueue` only pushes a command on an unbounded
//! channel, so producers never wait and never see an error.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::client::DeliveryClient;
use crate::config::Config;
use crate::destination::Destination;
use crate::dispatch::DispatchLoop;
use crate::error::{ConfigError, ManagerError};
use crate::liveness::LivenessTimer;
use crate::queue::{RecordQueues, TakenBatch};
use crate::record::LogRecord;

#[derive(Debug)]
pub enum LogManagerCommand {
    /// Queue a log for a destination.
    Enqueue {
        destination: Destination,
        record: LogRecord,
    },
    /// Take the next batch of a destination, for its dispatch loop.
    TakeBatch {
        destination: Destination,
        response_tx: oneshot::Sender<TakenBatch>,
    },
    /// A dispatch loop finished a send; the liveness timer restarts.
    SendFinished,
    /// The liveness timer of the given generation fired.
    LivenessTick { generation: u64 },
    /// Copy of the logs waiting for a destination.
    GetQueued {
        destination: Destination,
        response_tx: oneshot::Sender<Vec<LogRecord>>,
    },
    /// Whether a dispatch loop is running for a destination.
    IsDispatching {
        destination: Destination,
        response_tx: oneshot::Sender<bool>,
    },
    Shutdown,
}

/// Cloneable entry point of the log manager.
#[derive(Clone, Debug)]
pub struct LogManagerHandle {
    tx: mpsc::UnboundedSender<LogManagerCommand>,
    config: Arc<Config>,
}

impl LogManagerHandle {
    /// Queues a log for `destination`, starting its dispatch loop if needed.
    ///
    /// Never blocks and never fails: when the manager is gone the log is
    /// dropped.
    pub fn enqueue(&self, destination: Destination, record: LogRecord) {
        if self
            .tx
            .send(LogManagerCommand::Enqueue {
                destination,
                record,
            })
            .is_err()
        {
            debug!("Log manager is not running, dropping log");
        }
    }

    /// Takes the next batch of `destination` out of its queue.
    pub async fn take_batch(&self, destination: Destination) -> Result<TakenBatch, ManagerError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.tx
            .send(LogManagerCommand::TakeBatch {
                destination,
                response_tx,
            })
            .map_err(|_| ManagerError::Send("take_batch"))?;

        response_rx
            .await
            .map_err(|_| ManagerError::Receive("take_batch"))
    }

    /// Returns the logs waiting to be sent to `destination`, oldest first.
    pub async fn queued(&self, destination: Destination) -> Result<Vec<LogRecord>, ManagerError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.tx
            .send(LogManagerCommand::GetQueued {
                destination,
                response_tx,
            })
            .map_err(|_| ManagerError::Send("queued"))?;

        response_rx
            .await
            .map_err(|_| ManagerError::Receive("queued"))
    }

    /// Returns whether a dispatch loop is draining `destination`.
    pub async fn is_dispatching(&self, destination: Destination) -> Result<bool, ManagerError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.tx
            .send(LogManagerCommand::IsDispatching {
                destination,
                response_tx,
            })
            .map_err(|_| ManagerError::Send("is_dispatching"))?;

        response_rx
            .await
            .map_err(|_| ManagerError::Receive("is_dispatching"))
    }

    /// Stops the manager and its background tasks. Queued logs are dropped.
    pub fn shutdown(&self) -> Result<(), mpsc::error::SendError<LogManagerCommand>> {
        self.tx.send(LogManagerCommand::Shutdown)
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn send_finished(&self) {
        let _ = self.tx.send(LogManagerCommand::SendFinished);
    }
}

struct BackgroundTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Log manager service; spawn [`LogManagerService::run`] and log through the
/// returned [`LogManagerHandle`].
pub struct LogManagerService {
    config: Arc<Config>,
    client: Arc<dyn DeliveryClient>,
    queues: RecordQueues,
    dispatch_tasks: HashMap<Destination, BackgroundTask>,
    liveness_task: Option<BackgroundTask>,
    liveness_generation: u64,
    rx: mpsc::UnboundedReceiver<LogManagerCommand>,
    tx: mpsc::WeakUnboundedSender<LogManagerCommand>,
}

impl LogManagerService {
    pub fn new(
        config: Config,
        client: Arc<dyn DeliveryClient>,
    ) -> Result<(Self, LogManagerHandle), ConfigError> {
        config.validate()?;
        let config = Arc::new(config);
        let (tx, rx) = mpsc::unbounded_channel();

        let service = Self {
            queues: RecordQueues::new(config.max_stored_logs),
            config: Arc::clone(&config),
            client,
            dispatch_tasks: HashMap::new(),
            liveness_task: None,
            liveness_generation: 0,
            rx,
            tx: tx.downgrade(),
        };
        let handle = LogManagerHandle { tx, config };

        Ok((service, handle))
    }

    /// Runs the service, processing commands until shutdown.
    ///
    /// Sends the startup liveness notice first. Stops on
    /// [`LogManagerHandle::shutdown`] or once every handle is dropped and the
    /// dispatch loops have drained; the liveness timer does not keep the
    /// service alive.
    pub async fn run(mut self) {
        debug!("Log manager service started");
        self.start_liveness();

        while let Some(command) = self.rx.recv().await {
            match command {
                LogManagerCommand::Enqueue {
                    destination,
                    record,
                } => self.enqueue(destination, record),

                LogManagerCommand::TakeBatch {
                    destination,
                    response_tx,
                } => {
                    let taken = self.queues.take_batch(&destination);
                    if response_tx.send(taken).is_err() {
                        error!("Failed to send take_batch response - receiver dropped");
                    }
                }

                LogManagerCommand::SendFinished => self.arm_liveness(),

                LogManagerCommand::LivenessTick { generation } => {
                    if generation == self.liveness_generation {
                        self.enqueue_liveness_notice(false);
                    } else {
                        debug!("Ignoring tick of a replaced liveness timer");
                    }
                }

                LogManagerCommand::GetQueued {
                    destination,
                    response_tx,
                } => {
                    if response_tx.send(self.queues.queued(&destination)).is_err() {
                        error!("Failed to send queued response - receiver dropped");
                    }
                }

                LogManagerCommand::IsDispatching {
                    destination,
                    response_tx,
                } => {
                    let running = self
                        .dispatch_tasks
                        .get(&destination)
                        .is_some_and(|task| !task.handle.is_finished());
                    if response_tx.send(running).is_err() {
                        error!("Failed to send is_dispatching response - receiver dropped");
                    }
                }

                LogManagerCommand::Shutdown => {
                    debug!("Log manager service shutting down");
                    break;
                }
            }
        }

        for (_, task) in self.dispatch_tasks.drain() {
            task.cancel.cancel();
        }
        if let Some(task) = self.liveness_task.take() {
            task.cancel.cancel();
        }
        debug!("Log manager service stopped");
    }

    fn enqueue(&mut self, destination: Destination, record: LogRecord) {
        if self.config.is_suppressed() {
            return;
        }
        let was_empty = self.queues.push(&destination, record);
        let is_dispatching = self
            .dispatch_tasks
            .get(&destination)
            .is_some_and(|task| !task.handle.is_finished());
        // A loop that died with logs still queued is restarted too.
        if was_empty || !is_dispatching {
            self.start_dispatch(destination);
        }
    }

    /// Starts the dispatch loop of `destination`, replacing any previous one.
    fn start_dispatch(&mut self, destination: Destination) {
        let Some(tx) = self.tx.upgrade() else {
            return;
        };

        let previous = self.dispatch_tasks.remove(&destination).map(|task| {
            task.cancel.cancel();
            task.handle
        });

        let cancel = CancellationToken::new();
        let dispatch = DispatchLoop {
            destination: destination.clone(),
            handle: LogManagerHandle {
                tx,
                config: Arc::clone(&self.config),
            },
            client: Arc::clone(&self.client),
            config: Arc::clone(&self.config),
            cancel: cancel.clone(),
        };
        let handle = tokio::spawn(dispatch.run(previous));

        self.dispatch_tasks
            .insert(destination, BackgroundTask { cancel, handle });
    }

    fn start_liveness(&mut self) {
        if self.config.is_suppressed() || self.config.liveness.is_none() {
            return;
        }
        self.enqueue_liveness_notice(true);
        self.arm_liveness();
    }

    fn enqueue_liveness_notice(&mut self, is_first: bool) {
        let Some(liveness) = self.config.liveness.as_ref() else {
            return;
        };
        let record = LogRecord::liveness_notice(liveness, is_first);
        let destination = liveness.destination.clone();
        self.enqueue(destination, record);
    }

    /// (Re)starts the liveness timer, so the next notice comes one full
    /// interval from now.
    fn arm_liveness(&mut self) {
        if self.config.is_suppressed() {
            return;
        }
        let Some(interval) = self
            .config
            .liveness
            .as_ref()
            .and_then(|liveness| liveness.interval)
        else {
            return;
        };
        if let Some(task) = self.liveness_task.take() {
            task.cancel.cancel();
        }
        self.liveness_generation += 1;

        let cancel = CancellationToken::new();
        let timer = LivenessTimer {
            interval,
            generation: self.liveness_generation,
            tx: self.tx.clone(),
            cancel: cancel.clone(),
        };
        let handle = tokio::spawn(timer.run());
        self.liveness_task = Some(BackgroundTask { cancel, handle });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::WebhookPayload;
    use crate::config::{LivenessConfig, Mention};
    use crate::embed::Embed;
    use crate::error::DeliveryError;
    use crate::severity::Severity;
    use async_trait::async_trait;
    use std::time::Duration;

    struct NoopClient;

    #[async_trait]
    impl DeliveryClient for NoopClient {
        async fn deliver(
            &self,
            _destination: &Destination,
            _payload: WebhookPayload,
        ) -> Result<(), DeliveryError> {
            Ok(())
        }
    }

    fn destination() -> Destination {
        Destination::from_url("https://discord.com/api/webhooks/1/token")
            .expect("failed to parse destination")
    }

    fn record(title: &str) -> LogRecord {
        LogRecord::new(
            Embed {
                title: Some(title.to_string()),
                ..Default::default()
            },
            None,
            Severity::Error,
        )
    }

    fn create_and_spawn_service(config: Config) -> LogManagerHandle {
        let (service, handle) = LogManagerService::new(config, Arc::new(NoopClient))
            .expect("failed to create log manager service");
        tokio::spawn(service.run());
        handle
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = Config {
            max_stored_logs: 0,
            ..Default::default()
        };
        assert!(LogManagerService::new(config, Arc::new(NoopClient)).is_err());
    }

    #[tokio::test]
    async fn test_enqueue_and_queued() {
        let handle = create_and_spawn_service(Config::default());

        handle.enqueue(destination(), record("a"));
        handle.enqueue(destination(), record("b"));

        let queued = handle
            .queued(destination())
            .await
            .expect("failed to get queued logs");
        let titles: Vec<_> = queued.iter().filter_map(|r| r.embed.title.clone()).collect();
        assert_eq!(titles, vec!["a", "b"]);
        assert!(handle
            .is_dispatching(destination())
            .await
            .expect("failed to get dispatch state"));

        handle.shutdown().expect("failed to shutdown");
    }

    #[tokio::test]
    async fn test_take_batch() {
        let handle = create_and_spawn_service(Config::default());
        for i in 0..12 {
            handle.enqueue(destination(), record(&i.to_string()));
        }

        let taken = handle
            .take_batch(destination())
            .await
            .expect("failed to take batch");
        assert_eq!(taken.records.len(), 10);
        assert_eq!(taken.remaining, 2);

        handle.shutdown().expect("failed to shutdown");
    }

    #[tokio::test]
    async fn test_max_stored_logs() {
        let handle = create_and_spawn_service(Config {
            max_stored_logs: 100,
            ..Default::default()
        });
        for i in 0..150 {
            handle.enqueue(destination(), record(&format!("Testing! {i}")));
        }

        let queued = handle
            .queued(destination())
            .await
            .expect("failed to get queued logs");
        assert_eq!(queued.len(), 100);
        for (idx, log) in queued.iter().enumerate() {
            let title = log.embed.title.as_deref().expect("missing title");
            let number: usize = title
                .rsplit(' ')
                .next()
                .and_then(|n| n.parse().ok())
                .expect("title does not end with a number");
            assert_eq!(number, idx + 50);
        }

        handle.shutdown().expect("failed to shutdown");
    }

    #[tokio::test]
    async fn test_disabled_in_debug() {
        let handle = create_and_spawn_service(Config {
            disabled_in_debug: true,
            ..Default::default()
        });
        handle.enqueue(destination(), record("a"));

        let queued = handle
            .queued(destination())
            .await
            .expect("failed to get queued logs");
        assert!(queued.is_empty());
        assert!(!handle
            .is_dispatching(destination())
            .await
            .expect("failed to get dispatch state"));

        handle.shutdown().expect("failed to shutdown");
    }

    #[tokio::test]
    async fn test_shutdown_stops_service() {
        let (service, handle) = LogManagerService::new(Config::default(), Arc::new(NoopClient))
            .expect("failed to create log manager service");
        let service_task = tokio::spawn(service.run());

        handle.enqueue(destination(), record("a"));
        handle.shutdown().expect("failed to shutdown");
        tokio::time::timeout(Duration::from_secs(1), service_task)
            .await
            .expect("service did not stop")
            .expect("service task failed");

        assert_eq!(
            handle.queued(destination()).await,
            Err(ManagerError::Send("queued"))
        );
    }

    #[tokio::test]
    async fn test_service_stops_when_handles_are_dropped() {
        let (service, handle) = LogManagerService::new(Config::default(), Arc::new(NoopClient))
            .expect("failed to create log manager service");
        let service_task = tokio::spawn(service.run());

        drop(handle);
        tokio::time::timeout(Duration::from_secs(1), service_task)
            .await
            .expect("service did not stop")
            .expect("service task failed");
    }

    #[tokio::test(start_paused = true)]
    async fn test_liveness_timer_does_not_keep_service_running() {
        let config = Config {
            liveness: Some(LivenessConfig::new(
                destination(),
                Some(Duration::from_secs(30)),
                &Mention::user("1"),
            )),
            ..Default::default()
        };
        let (service, handle) = LogManagerService::new(config, Arc::new(NoopClient))
            .expect("failed to create log manager service");
        let service_task = tokio::spawn(service.run());

        // The startup notice is sent and the timer re-armed before the drop.
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert!(!handle
            .is_dispatching(destination())
            .await
            .expect("failed to get dispatch state"));

        drop(handle);
        tokio::time::timeout(Duration::from_secs(600), service_task)
            .await
            .expect("service did not stop")
            .expect("service task failed");
    }
}
