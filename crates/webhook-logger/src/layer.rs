// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! `tracing` front-end: turns events into queued webhook logs.
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tracing_subscriber::layer::SubscriberExt;
//! use webhook_logger::{Config, Destination, LogManagerService, WebhookClient, WebhookLayer};
//!
//! # async fn setup() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Arc::new(WebhookClient::new(Duration::from_secs(10))?);
//! let (service, handle) = LogManagerService::new(Config::default(), client)?;
//! tokio::spawn(service.run());
//!
//! let destination = Destination::from_url("https://discord.com/api/webhooks/1/token")?;
//! let subscriber = tracing_subscriber::registry()
//!     .with(WebhookLayer::new(handle, destination).with_label("my-service"));
//! tracing::subscriber::set_global_default(subscriber)?;
//! # Ok(())
//! # }
//! ```

use chrono::Utc;
use std::collections::BTreeMap;
use std::fmt;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

use crate::destination::Destination;
use crate::embed::{Embed, EmbedField, EmbedFooter};
use crate::manager_service::LogManagerHandle;
use crate::record::{LogInfo, LogRecord};
use crate::severity::Severity;

const MESSAGE_FIELD: &str = "message";
const SEVERITY_FIELD: &str = "severity";

/// Events from these targets are never forwarded, so sending logs cannot
/// produce more logs.
const IGNORED_TARGETS: [&str; 6] = [
    "webhook_logger",
    "reqwest",
    "hyper",
    "hyper_util",
    "h2",
    "rustls",
];

/// A [`Layer`] forwarding events to one webhook destination.
#[derive(Debug, Clone)]
pub struct WebhookLayer {
    handle: LogManagerHandle,
    destination: Destination,
    min_severity: Severity,
    label: Option<String>,
}

impl WebhookLayer {
    /// Forwards events of `Info` severity and above to `destination`.
    #[must_use]
    pub fn new(handle: LogManagerHandle, destination: Destination) -> Self {
        Self {
            handle,
            destination,
            min_severity: Severity::Info,
            label: None,
        }
    }

    #[must_use]
    pub fn with_min_severity(mut self, min_severity: Severity) -> Self {
        self.min_severity = min_severity;
        self
    }

    /// Shown in the footer of every embed, to tell sources apart.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    fn make_record(&self, event: &Event<'_>) -> Option<LogRecord> {
        let metadata = event.metadata();
        let mut visitor = EventVisitor::default();
        event.record(&mut visitor);

        let severity = visitor
            .severity
            .unwrap_or_else(|| Severity::from(*metadata.level()));
        let config = self.handle.config();
        if severity < self.min_severity || config.disabled_severities.contains(&severity) {
            return None;
        }

        let mut fields = visitor.fields;
        if config.extra_metadata.contains(&severity) {
            fields.insert("_source".to_string(), metadata.target().to_string());
            if let Some(file) = metadata.file() {
                fields.insert("_file".to_string(), file.to_string());
            }
            if let Some(module) = metadata.module_path() {
                fields.insert("_function".to_string(), module.to_string());
            }
            if let Some(line) = metadata.line() {
                fields.insert("_line".to_string(), line.to_string());
            }
        }

        let message = visitor.message.unwrap_or_default();
        let attachment = config
            .attachment_policy
            .is_enabled()
            .then(|| LogInfo::new(severity, message.clone(), fields.clone()));

        let embed_fields = if config.exclude_metadata.contains(&severity) {
            Vec::new()
        } else {
            fields
                .into_iter()
                .map(|(name, value)| EmbedField::new(name, value))
                .collect()
        };
        let embed = Embed {
            title: Some(message),
            color: Some(config.color_for(severity)),
            timestamp: Some(Utc::now()),
            footer: self
                .label
                .as_ref()
                .map(|text| EmbedFooter { text: text.clone() }),
            fields: embed_fields,
            ..Default::default()
        }
        .truncated();

        Some(LogRecord::new(embed, attachment, severity))
    }
}

impl<S> Layer<S> for WebhookLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let target = event.metadata().target();
        if IGNORED_TARGETS.iter().any(|ignored| {
            target
                .strip_prefix(ignored)
                .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
        }) {
            return;
        }

        if let Some(record) = self.make_record(event) {
            self.handle.enqueue(self.destination.clone(), record);
        }
    }
}

#[derive(Default)]
struct EventVisitor {
    message: Option<String>,
    severity: Option<Severity>,
    fields: BTreeMap<String, String>,
}

impl EventVisitor {
    fn record_value(&mut self, field: &Field, value: String) {
        match field.name() {
            MESSAGE_FIELD => self.message = Some(value),
            SEVERITY_FIELD => match value.parse() {
                Ok(severity) => self.severity = Some(severity),
                Err(_) => {
                    self.fields.insert(SEVERITY_FIELD.to_string(), value);
                }
            },
            name => {
                self.fields.insert(name.to_string(), value);
            }
        }
    }
}

impl Visit for EventVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.record_value(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.record_value(field, format!("{value:?}"));
    }
}
