// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The file sent next to a batch's embeds, holding the untruncated logs.

use chrono::{FixedOffset, Offset, Utc};
use serde::ser::{Serialize, SerializeMap, Serializer};
use tracing::{debug, warn};

use crate::constants::{ATTACHMENT_FAILURE_MESSAGE, MAX_ATTACHMENT_SIZE_BYTES};
use crate::record::{LogContainer, LogRecord};

/// Encodes the logs of a batch into an attachment file.
pub trait LogFormatter: Send + Sync {
    fn format(&self, logs: &[LogContainer]) -> Vec<u8>;
    fn make_filename(&self, logs: &[LogContainer]) -> String;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub data: Vec<u8>,
}

/// Builds the attachment of a batch, if any of its logs carries one.
///
/// Logs keep their 1-based position in the batch, so numbers match the order
/// of the embeds even when some logs have nothing to attach.
#[must_use]
pub fn make_attachment(batch: &[LogRecord], formatter: &dyn LogFormatter) -> Option<Attachment> {
    let logs: Vec<LogContainer> = batch
        .iter()
        .enumerate()
        .filter_map(|(idx, record)| {
            record.attachment.clone().map(|info| LogContainer {
                number: idx + 1,
                info,
            })
        })
        .collect();
    if logs.is_empty() {
        return None;
    }

    let mut data = formatter.format(&logs);
    if data.is_empty() {
        warn!("Log formatter produced an empty attachment for {} logs", logs.len());
        data = ATTACHMENT_FAILURE_MESSAGE.as_bytes().to_vec();
    }
    let data = cap_attachment(data, MAX_ATTACHMENT_SIZE_BYTES);
    let filename = formatter.make_filename(&logs);
    Some(Attachment { filename, data })
}

/// Cuts `data` to exactly `ceiling` bytes when it is larger.
pub(crate) fn cap_attachment(mut data: Vec<u8>, ceiling: usize) -> Vec<u8> {
    if data.len() > ceiling {
        debug!(
            "Attachment of {} bytes exceeds {} bytes, truncating",
            data.len(),
            ceiling
        );
        data.truncate(ceiling);
    }
    data
}

/// Writes the logs as a JSON object keyed by their number in the batch.
///
/// ```json
/// {"1":{"level":"error","message":"..."},"3":{"level":"info","message":"..."}}
/// ```
#[derive(Debug, Clone)]
pub struct JsonLogFormatter {
    /// Adding `.json` makes some clients render the file poorly, so it is off
    /// by default.
    pub with_json_extension: bool,
    /// Offset of the time written in filenames.
    pub offset: FixedOffset,
}

impl Default for JsonLogFormatter {
    fn default() -> Self {
        Self {
            with_json_extension: false,
            offset: Utc.fix(),
        }
    }
}

struct NumberedLogs<'a>(&'a [LogContainer]);

impl Serialize for NumberedLogs<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for log in self.0 {
            map.serialize_entry(&log.number.to_string(), &log.info)?;
        }
        map.end()
    }
}

impl LogFormatter for JsonLogFormatter {
    fn format(&self, logs: &[LogContainer]) -> Vec<u8> {
        match serde_json::to_vec(&NumberedLogs(logs)) {
            Ok(data) => data,
            Err(e) => {
                warn!("Failed to encode log attachment: {e}");
                Vec::new()
            }
        }
    }

    fn make_filename(&self, _logs: &[LogContainer]) -> String {
        let date = Utc::now()
            .with_timezone(&self.offset)
            .format("%Y-%m-%d_%H-%M-%S");
        if self.with_json_extension {
            format!("Logs_{date}.json")
        } else {
            format!("Logs_{date}")
        }
    }
}
