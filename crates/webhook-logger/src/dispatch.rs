// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Background sender of one destination's queue.
//!
//! ```text
//!   Idle ──enqueue──> Waiting ──frequency elapsed──> Sending
//!                        ^                              │
//!                        └────── logs left ─────────────┤
//!                                                       │ queue drained
//!                                                       v
//!                                                  Terminated
//! ```
//!
//! The loop exits once a send leaves the queue empty; the next enqueue for
//! the destination starts a new one.

use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::attachment::make_attachment;
use crate::client::{DeliveryClient, WebhookPayload};
use crate::config::Config;
use crate::constants::FALLBACK_LOG_TARGET;
use crate::destination::Destination;
use crate::manager_service::LogManagerHandle;
use crate::mentions::build_mention_string;
use crate::record::LogRecord;

pub(crate) struct DispatchLoop {
    pub(crate) destination: Destination,
    pub(crate) handle: LogManagerHandle,
    pub(crate) client: Arc<dyn DeliveryClient>,
    pub(crate) config: Arc<Config>,
    pub(crate) cancel: CancellationToken,
}

impl DispatchLoop {
    /// Runs until the queue is drained or the loop is cancelled.
    ///
    /// `previous` is the loop this one replaces; it is awaited first so two
    /// loops never send to the same destination at once.
    pub(crate) async fn run(self, previous: Option<JoinHandle<()>>) {
        if let Some(previous) = previous {
            if let Err(e) = previous.await {
                debug!("Previous dispatch loop did not exit cleanly: {e}");
            }
        }
        debug!("Dispatch loop for webhook {} started", self.destination.id());

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    debug!("Dispatch loop for webhook {} cancelled", self.destination.id());
                    return;
                }
                () = sleep(self.config.frequency) => {}
            }

            let taken = match self.handle.take_batch(self.destination.clone()).await {
                Ok(taken) => taken,
                Err(e) => {
                    debug!("Dispatch loop for webhook {} stopping: {e}", self.destination.id());
                    return;
                }
            };

            if !taken.records.is_empty() {
                send_batch(
                    &self.destination,
                    taken.records,
                    &self.config,
                    self.client.as_ref(),
                )
                .await;
                self.handle.send_finished();
            }

            if taken.remaining == 0 {
                debug!("Dispatch loop for webhook {} drained", self.destination.id());
                return;
            }
        }
    }
}

/// Builds the webhook message of a batch and delivers it.
///
/// A failed delivery is reported through the fallback logger and otherwise
/// ignored; the batch is not retried.
pub async fn send_batch(
    destination: &Destination,
    batch: Vec<LogRecord>,
    config: &Config,
    client: &dyn DeliveryClient,
) {
    let content = build_mention_string(&batch, config);
    let attachment = config
        .attachment_policy
        .formatter()
        .and_then(|formatter| make_attachment(&batch, formatter));
    let payload = WebhookPayload {
        content,
        embeds: batch.into_iter().map(|record| record.embed).collect(),
        attachment,
    };

    debug!(
        "Sending {} logs to webhook {}",
        payload.embeds.len(),
        destination.id()
    );
    let summary = payload.summary();
    if let Err(e) = client.deliver(destination, payload).await {
        warn!(
            target: FALLBACK_LOG_TARGET,
            error = %e,
            payload = %summary,
            "Received an error from the webhook after sending logs"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AttachmentPolicy, Mention};
    use crate::embed::Embed;
    use crate::error::DeliveryError;
    use crate::record::LogInfo;
    use crate::severity::Severity;
    use async_trait::async_trait;
    use reqwest::StatusCode;
    use std::collections::BTreeMap;
    use std::sync::Mutex;
    use tracing_test::traced_test;

    #[derive(Default)]
    struct CapturingClient {
        payloads: Mutex<Vec<WebhookPayload>>,
        reject: bool,
    }

    #[async_trait]
    impl DeliveryClient for CapturingClient {
        async fn deliver(
            &self,
            _destination: &Destination,
            payload: WebhookPayload,
        ) -> Result<(), DeliveryError> {
            self.payloads.lock().expect("lock poisoned").push(payload);
            if self.reject {
                return Err(DeliveryError::Status {
                    status: StatusCode::BAD_REQUEST,
                    body: "Invalid Form Body".to_string(),
                });
            }
            Ok(())
        }
    }

    fn destination() -> Destination {
        Destination::from_url("https://discord.com/api/webhooks/1/token")
            .expect("failed to parse destination")
    }

    fn record(title: &str, severity: Severity, attach: bool) -> LogRecord {
        let attachment = attach
            .then(|| LogInfo::new(severity, title.to_string(), BTreeMap::new()));
        LogRecord::new(
            Embed {
                title: Some(title.to_string()),
                ..Default::default()
            },
            attachment,
            severity,
        )
    }

    #[tokio::test]
    async fn test_send_batch_builds_payload() {
        let client = CapturingClient::default();
        let config = Config {
            attachment_policy: AttachmentPolicy::json(),
            ..Default::default()
        }
        .with_mention(Severity::Warning, &Mention::user("2"));

        let batch = vec![
            record("first", Severity::Info, false),
            record("second", Severity::Warning, true),
        ];
        send_batch(&destination(), batch, &config, &client).await;

        let payloads = client.payloads.lock().expect("lock poisoned");
        assert_eq!(payloads.len(), 1);
        let payload = &payloads[0];
        assert_eq!(payload.content, "<@2>");
        let titles: Vec<_> = payload
            .embeds
            .iter()
            .filter_map(|embed| embed.title.as_deref())
            .collect();
        assert_eq!(titles, vec!["first", "second"]);

        let attachment = payload.attachment.as_ref().expect("expected attachment");
        let json: serde_json::Value =
            serde_json::from_slice(&attachment.data).expect("attachment is not JSON");
        assert_eq!(
            json,
            serde_json::json!({ "2": { "level": "warning", "message": "second" } })
        );
    }

    #[tokio::test]
    async fn test_send_batch_without_attachment_policy() {
        let client = CapturingClient::default();
        let batch = vec![record("first", Severity::Info, true)];
        send_batch(&destination(), batch, &Config::default(), &client).await;

        let payloads = client.payloads.lock().expect("lock poisoned");
        assert_eq!(payloads[0].attachment, None);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_send_batch_failure_is_logged() {
        let client = CapturingClient {
            reject: true,
            ..Default::default()
        };
        let batch = vec![record("first", Severity::Error, false)];
        send_batch(&destination(), batch, &Config::default(), &client).await;

        assert!(logs_contain("Received an error from the webhook after sending logs"));
        assert!(logs_contain("Invalid Form Body"));
        assert!(logs_contain("embeds: 1"));
    }
}
