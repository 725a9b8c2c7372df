// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Limits of the webhook sink.
//!
//! The sink rejects a message whose embeds are too many or too long, and a
//! message whose files exceed its upload limit. Batches and attachments are
//! sized against these values so a request is never rejected for its shape.

use std::time::Duration;

/// Maximum number of embeds in a single webhook message.
pub const MAX_EMBEDS_PER_MESSAGE: usize = 10;

/// Maximum summed [`content_length`](crate::embed::Embed::content_length) of
/// the embeds of a single webhook message.
pub const MAX_EMBEDS_CONTENT_LENGTH: usize = 6_000;

/// Ceiling for the attachment blob.
///
/// The sink accepts 25MB of files per message; the attachment is cut one
/// megabyte below that.
pub const MAX_ATTACHMENT_SIZE_BYTES: usize = 24_000_000;

/// Blob sent in place of an attachment the formatter could not encode.
pub const ATTACHMENT_FAILURE_MESSAGE: &str =
    "<error-could-not-encode-attachment-please-report-this-issue>";

pub const MAX_EMBED_TITLE_LENGTH: usize = 256;
pub const MAX_EMBED_DESCRIPTION_LENGTH: usize = 4_096;
pub const MAX_EMBED_FIELDS: usize = 25;
pub const MAX_EMBED_FIELD_NAME_LENGTH: usize = 256;
pub const MAX_EMBED_FIELD_VALUE_LENGTH: usize = 1_024;
pub const MAX_EMBED_FOOTER_LENGTH: usize = 2_048;
pub const MAX_EMBED_AUTHOR_NAME_LENGTH: usize = 256;

/// Default time between two sends to the same destination.
///
/// The sink rate-limits webhooks, so going below ten seconds is not
/// recommended.
pub const DEFAULT_FREQUENCY: Duration = Duration::from_secs(10);

/// Default bound of each destination's queue.
pub const DEFAULT_MAX_STORED_LOGS: usize = 1_000;

pub const DEFAULT_LIVENESS_MESSAGE: &str = "Alive Notice!";

/// Target of the fallback logger.
///
/// Events under this crate's targets are never forwarded to a webhook.
pub const FALLBACK_LOG_TARGET: &str = "webhook_logger::fallback";
