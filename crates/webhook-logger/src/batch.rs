// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Selection of the logs that go out in one webhook message.
//!
//! A batch is always a prefix of the queue: logs leave in arrival order and a
//! log is never skipped to pack a later one in. When the head log alone is
//! bigger than the content limit the batch is empty and the log stays queued;
//! it is only removed by the queue's oldest-first eviction.

use std::collections::VecDeque;
use tracing::debug;

use crate::constants::{MAX_EMBEDS_CONTENT_LENGTH, MAX_EMBEDS_PER_MESSAGE};
use crate::record::LogRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchLimits {
    pub max_entries: usize,
    pub max_content_length: usize,
}

impl Default for BatchLimits {
    fn default() -> Self {
        Self {
            max_entries: MAX_EMBEDS_PER_MESSAGE,
            max_content_length: MAX_EMBEDS_CONTENT_LENGTH,
        }
    }
}

/// Drains the longest prefix of `queue` that fits in `limits`.
///
/// Whatever is not selected stays in `queue`, in order.
pub fn select_batch(queue: &mut VecDeque<LogRecord>, limits: BatchLimits) -> Vec<LogRecord> {
    let mut content_length = 0;
    let mut taken = 0;

    for record in queue.iter() {
        if taken >= limits.max_entries {
            break;
        }
        let size = record.size();
        if content_length + size > limits.max_content_length {
            break;
        }
        content_length += size;
        taken += 1;
    }

    if taken == 0 {
        if let Some(head) = queue.front() {
            debug!(
                "Log of size {} does not fit in a batch of {}, holding it",
                head.size(),
                limits.max_content_length
            );
        }
    }

    queue.drain(..taken).collect()
}
