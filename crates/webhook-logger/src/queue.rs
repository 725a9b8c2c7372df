// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Per-destination queues of logs waiting to be sent.
//!
//! Each queue is bounded: past `max_stored_logs` the oldest unsent log is
//! dropped to make room, never the newest one. Dropping is silent since log
//! delivery is best-effort.

use std::collections::{HashMap, VecDeque};
use tracing::debug;

use crate::batch::{select_batch, BatchLimits};
use crate::destination::Destination;
use crate::record::LogRecord;

/// Logs taken out of a queue for one send.
#[derive(Debug, Clone, PartialEq)]
pub struct TakenBatch {
    pub records: Vec<LogRecord>,
    /// Logs left in the queue afterwards.
    pub remaining: usize,
}

#[derive(Debug)]
pub struct RecordQueues {
    queues: HashMap<Destination, VecDeque<LogRecord>>,
    max_stored_logs: usize,
    limits: BatchLimits,
}

impl RecordQueues {
    #[must_use]
    pub fn new(max_stored_logs: usize) -> Self {
        Self::with_limits(max_stored_logs, BatchLimits::default())
    }

    #[must_use]
    pub fn with_limits(max_stored_logs: usize, limits: BatchLimits) -> Self {
        Self {
            queues: HashMap::new(),
            max_stored_logs,
            limits,
        }
    }

    /// Appends `record` to the destination's queue.
    ///
    /// Returns `true` when the queue was empty before, i.e. nothing is
    /// currently draining it.
    pub fn push(&mut self, destination: &Destination, record: LogRecord) -> bool {
        let queue = self.queues.entry(destination.clone()).or_default();
        let was_empty = queue.is_empty();

        queue.push_back(record);
        while queue.len() > self.max_stored_logs {
            queue.pop_front();
            debug!(
                "Queue of webhook {} is full ({} logs), dropping oldest log",
                destination.id(),
                self.max_stored_logs
            );
        }

        was_empty
    }

    /// Takes the next batch of the destination's queue.
    pub fn take_batch(&mut self, destination: &Destination) -> TakenBatch {
        let Some(queue) = self.queues.get_mut(destination) else {
            return TakenBatch {
                records: Vec::new(),
                remaining: 0,
            };
        };

        let records = select_batch(queue, self.limits);
        let remaining = queue.len();
        if remaining == 0 {
            self.queues.remove(destination);
        }

        TakenBatch { records, remaining }
    }

    #[must_use]
    pub fn queued(&self, destination: &Destination) -> Vec<LogRecord> {
        self.queues
            .get(destination)
            .map(|queue| queue.iter().cloned().collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn len(&self, destination: &Destination) -> usize {
        self.queues.get(destination).map_or(0, VecDeque::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::Embed;
    use crate::severity::Severity;

    fn destination(id: &str) -> Destination {
        Destination::from_url(&format!("https://discord.com/api/webhooks/{id}/token"))
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

    fn titles(records: &[LogRecord]) -> Vec<String> {
        records
            .iter()
            .filter_map(|record| record.embed.title.clone())
            .collect()
    }

    #[test]
    fn test_push_reports_empty_queue() {
        let mut queues = RecordQueues::new(10);
        let dest = destination("1");

        assert!(queues.push(&dest, record("a")));
        assert!(!queues.push(&dest, record("b")));
        assert_eq!(queues.len(&dest), 2);
    }

    #[test]
    fn test_push_evicts_oldest() {
        let mut queues = RecordQueues::new(100);
        let dest = destination("1");

        for i in 0..150 {
            queues.push(&dest, record(&format!("Testing! {i}")));
            assert!(queues.len(&dest) <= 100);
        }

        let queued = titles(&queues.queued(&dest));
        assert_eq!(queued.len(), 100);
        assert_eq!(queued.first().map(String::as_str), Some("Testing! 50"));
        assert_eq!(queued.last().map(String::as_str), Some("Testing! 149"));
    }

    #[test]
    fn test_destinations_are_independent() {
        let mut queues = RecordQueues::new(1);
        let first = destination("1");
        let second = destination("2");

        queues.push(&first, record("a"));
        assert!(queues.push(&second, record("b")));
        queues.push(&second, record("c"));

        assert_eq!(titles(&queues.queued(&first)), vec!["a"]);
        assert_eq!(titles(&queues.queued(&second)), vec!["c"]);
    }

    #[test]
    fn test_take_batch() {
        let mut queues = RecordQueues::new(100);
        let dest = destination("1");
        for i in 0..12 {
            queues.push(&dest, record(&i.to_string()));
        }

        let taken = queues.take_batch(&dest);
        assert_eq!(taken.records.len(), 10);
        assert_eq!(taken.remaining, 2);

        let taken = queues.take_batch(&dest);
        assert_eq!(titles(&taken.records), vec!["10", "11"]);
        assert_eq!(taken.remaining, 0);

        // A drained queue counts as empty again.
        assert!(queues.push(&dest, record("12")));
    }

    #[test]
    fn test_take_batch_unknown_destination() {
        let mut queues = RecordQueues::new(100);
        let taken = queues.take_batch(&destination("1"));
        assert!(taken.records.is_empty());
        assert_eq!(taken.remaining, 0);
    }
}
