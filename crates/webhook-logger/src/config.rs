// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::collections::{HashMap, HashSet};
use std::env;
use std::fmt::{self, Debug};
use std::sync::Arc;
use std::time::Duration;

use crate::attachment::{JsonLogFormatter, LogFormatter};
use crate::constants::{DEFAULT_FREQUENCY, DEFAULT_LIVENESS_MESSAGE, DEFAULT_MAX_STORED_LOGS};
use crate::destination::Destination;
use crate::error::ConfigError;
use crate::severity::{Color, Severity};

/// A user or role to notify.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mention {
    User(String),
    Role(String),
    Combined(Vec<Mention>),
}

impl Mention {
    pub fn user(id: impl Into<String>) -> Self {
        Self::User(id.into())
    }

    pub fn role(id: impl Into<String>) -> Self {
        Self::Role(id.into())
    }

    /// Renders the mention in the sink's `<@id>` / `<@&id>` syntax.
    #[must_use]
    pub fn to_mention_strings(&self) -> Vec<String> {
        match self {
            Mention::User(id) => vec![format!("<@{id}>")],
            Mention::Role(id) => vec![format!("<@&{id}>")],
            Mention::Combined(mentions) => mentions
                .iter()
                .flat_map(Mention::to_mention_strings)
                .collect(),
        }
    }
}

/// Periodic "I am alive" notices.
#[derive(Debug, Clone)]
pub struct LivenessConfig {
    pub destination: Destination,
    /// Quiet time after which another notice is sent. `None` sends a single
    /// notice on startup.
    pub interval: Option<Duration>,
    pub message: String,
    pub color: Color,
    /// Mentioned only on the startup notice, to be notified of restarts.
    pub initial_mentions: Vec<String>,
}

impl LivenessConfig {
    #[must_use]
    pub fn new(
        destination: Destination,
        interval: Option<Duration>,
        initial_mention: &Mention,
    ) -> Self {
        Self {
            destination,
            interval,
            message: DEFAULT_LIVENESS_MESSAGE.to_string(),
            color: Color::BLUE,
            initial_mentions: initial_mention.to_mention_strings(),
        }
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    #[must_use]
    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }
}

/// Whether the full logs are also sent as a file next to the embeds.
///
/// Embeds truncate long messages and metadata; the attachment does not.
#[derive(Clone, Default)]
pub enum AttachmentPolicy {
    #[default]
    Disabled,
    Enabled(Arc<dyn LogFormatter>),
}

impl AttachmentPolicy {
    /// Enables attachments with the default JSON formatter.
    #[must_use]
    pub fn json() -> Self {
        Self::Enabled(Arc::new(JsonLogFormatter::default()))
    }

    #[must_use]
    pub fn formatter(&self) -> Option<&dyn LogFormatter> {
        match self {
            AttachmentPolicy::Disabled => None,
            AttachmentPolicy::Enabled(formatter) => Some(formatter.as_ref()),
        }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        matches!(self, AttachmentPolicy::Enabled(_))
    }
}

impl Debug for AttachmentPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttachmentPolicy::Disabled => write!(f, "Disabled"),
            AttachmentPolicy::Enabled(_) => write!(f, "Enabled"),
        }
    }
}

/// Configuration of the log manager. Immutable once the manager is built.
#[derive(Debug, Clone)]
pub struct Config {
    /// Time between two sends to the same destination.
    pub frequency: Duration,
    pub liveness: Option<LivenessConfig>,
    pub attachment_policy: AttachmentPolicy,
    /// Rendered mentions per severity, see [`Config::with_mention`].
    pub mentions: HashMap<Severity, Vec<String>>,
    /// Embed colors. Severities missing here use [`Severity::default_color`].
    pub colors: HashMap<Severity, Color>,
    /// Severities whose logs are sent without metadata fields.
    pub exclude_metadata: HashSet<Severity>,
    /// Severities whose logs also carry `source`, `file`, `function` and `line`.
    pub extra_metadata: HashSet<Severity>,
    /// Severities that are never sent.
    pub disabled_severities: HashSet<Severity>,
    /// Drop everything in debug builds.
    pub disabled_in_debug: bool,
    /// Bound of each destination's queue; the oldest logs are dropped past it.
    pub max_stored_logs: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            frequency: DEFAULT_FREQUENCY,
            liveness: None,
            attachment_policy: AttachmentPolicy::Disabled,
            mentions: HashMap::new(),
            colors: Severity::ALL
                .into_iter()
                .map(|severity| (severity, severity.default_color()))
                .collect(),
            exclude_metadata: HashSet::new(),
            extra_metadata: HashSet::new(),
            disabled_severities: HashSet::new(),
            disabled_in_debug: false,
            max_stored_logs: DEFAULT_MAX_STORED_LOGS,
        }
    }
}

impl Config {
    /// Create configuration from environment variables, on top of the defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(value) = env::var("WEBHOOK_LOGGER_FREQUENCY_SECS") {
            let secs = value
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidEnv {
                    name: "WEBHOOK_LOGGER_FREQUENCY_SECS",
                    value: value.clone(),
                })?;
            config.frequency = Duration::from_secs(secs);
        }
        if let Ok(value) = env::var("WEBHOOK_LOGGER_MAX_STORED_LOGS") {
            config.max_stored_logs =
                value
                    .parse::<usize>()
                    .map_err(|_| ConfigError::InvalidEnv {
                        name: "WEBHOOK_LOGGER_MAX_STORED_LOGS",
                        value: value.clone(),
                    })?;
        }
        if let Ok(value) = env::var("WEBHOOK_LOGGER_DISABLED_IN_DEBUG") {
            config.disabled_in_debug = value.to_lowercase() == "true";
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frequency.is_zero() {
            return Err(ConfigError::Invalid(
                "frequency must be greater than 0".to_string(),
            ));
        }
        if self.max_stored_logs == 0 {
            return Err(ConfigError::Invalid(
                "max_stored_logs must be greater than 0".to_string(),
            ));
        }
        if let Some(interval) = self.liveness.as_ref().and_then(|liveness| liveness.interval) {
            if interval.is_zero() {
                return Err(ConfigError::Invalid(
                    "liveness interval must be greater than 0".to_string(),
                ));
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn with_mention(mut self, severity: Severity, mention: &Mention) -> Self {
        self.mentions
            .insert(severity, mention.to_mention_strings());
        self
    }

    #[must_use]
    pub fn color_for(&self, severity: Severity) -> Color {
        self.colors
            .get(&severity)
            .copied()
            .unwrap_or_else(|| severity.default_color())
    }

    /// Whether the manager drops everything, see [`Config::disabled_in_debug`].
    #[must_use]
    pub fn is_suppressed(&self) -> bool {
        self.disabled_in_debug && cfg!(debug_assertions)
    }
}
