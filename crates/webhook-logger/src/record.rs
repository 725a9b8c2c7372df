// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::LivenessConfig;
use crate::embed::Embed;
use crate::severity::Severity;

/// A log waiting in a destination's queue.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub embed: Embed,
    /// Full content of the log, sent in the attachment when enabled.
    pub attachment: Option<LogInfo>,
    /// `None` for liveness notices.
    pub severity: Option<Severity>,
    pub is_first_liveness_notice: bool,
}

impl LogRecord {
    #[must_use]
    pub fn new(embed: Embed, attachment: Option<LogInfo>, severity: Severity) -> Self {
        Self {
            embed,
            attachment,
            severity: Some(severity),
            is_first_liveness_notice: false,
        }
    }

    #[must_use]
    pub fn liveness_notice(config: &LivenessConfig, is_first: bool) -> Self {
        Self {
            embed: Embed {
                title: Some(config.message.clone()),
                color: Some(config.color),
                timestamp: Some(Utc::now()),
                ..Default::default()
            },
            attachment: None,
            severity: None,
            is_first_liveness_notice: is_first,
        }
    }

    /// Size counted against the per-batch content limit.
    #[must_use]
    pub fn size(&self) -> usize {
        self.embed.content_length()
    }
}

/// Untruncated content of a log, as written to the attachment file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogInfo {
    pub level: Severity,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, String>>,
}

impl LogInfo {
    #[must_use]
    pub fn new(level: Severity, message: String, metadata: BTreeMap<String, String>) -> Self {
        Self {
            level,
            message,
            metadata: (!metadata.is_empty()).then_some(metadata),
        }
    }
}

/// A [`LogInfo`] with its 1-based position in the batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogContainer {
    pub number: usize,
    pub info: LogInfo,
}
