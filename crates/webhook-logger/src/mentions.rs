// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::collections::{BTreeSet, HashSet};

use crate::config::Config;
use crate::record::LogRecord;

/// Builds the message content that notifies the users and roles interested in
/// a batch.
///
/// Mentions of the most important severity come first, followed by the
/// startup-notice mentions when the batch holds the first liveness notice.
/// Each mention appears once, at its first position.
#[must_use]
pub fn build_mention_string(batch: &[LogRecord], config: &Config) -> String {
    let severities: BTreeSet<_> = batch.iter().filter_map(|record| record.severity).collect();

    let severity_mentions = severities
        .into_iter()
        .rev()
        .filter_map(|severity| config.mentions.get(&severity))
        .flatten();

    let wants_liveness_mentions = batch.iter().any(|record| record.is_first_liveness_notice);
    let liveness_mentions = config
        .liveness
        .as_ref()
        .filter(|_| wants_liveness_mentions)
        .map(|liveness| liveness.initial_mentions.as_slice())
        .unwrap_or_default();

    let mut seen = HashSet::new();
    severity_mentions
        .chain(liveness_mentions)
        .filter(|mention| seen.insert(*mention))
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(" ")
}
