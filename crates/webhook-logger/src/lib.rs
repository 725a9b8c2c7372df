// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! # Webhook Logger
//!
//! Batches application logs and ships them to chat webhooks.
//!
//! ## Overview
//!
//! Producers enqueue logs without blocking. Each destination webhook has its
//! own bounded queue, drained by a background loop that sends one message
//! every [`Config::frequency`], as long as logs are waiting. A message holds
//! as many logs as fit the sink's limits, mentions the users and roles
//! interested in its severities, and optionally carries the full logs as an
//! attached file.
//!
//! An optional liveness notice is sent on startup and whenever nothing was
//! sent for a whole interval.
//!
//! ## Architecture
//!
//! - [`manager_service`]: actor owning the queues and the background tasks
//! - [`queue`] and [`batch`]: bounded queues and batch selection
//! - [`mentions`] and [`attachment`]: the content of a message
//! - [`client`]: HTTP delivery to the webhook
//! - [`layer`]: `tracing` front-end producing logs from events

#![deny(clippy::unwrap_used)]
#![deny(unused_extern_crates)]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod attachment;
pub mod batch;
pub mod client;
pub mod config;
pub mod constants;
pub mod destination;
mod dispatch;
pub mod embed;
pub mod error;
pub mod layer;
mod liveness;
pub mod manager_service;
pub mod mentions;
pub mod queue;
pub mod record;
pub mod severity;

pub use attachment::{Attachment, JsonLogFormatter, LogFormatter};
pub use client::{DeliveryClient, WebhookClient, WebhookPayload};
pub use config::{AttachmentPolicy, Config, LivenessConfig, Mention};
pub use destination::Destination;
pub use dispatch::send_batch;
pub use embed::{Embed, EmbedAuthor, EmbedField, EmbedFooter};
pub use error::{ConfigError, DeliveryError, DestinationError, ManagerError};
pub use layer::WebhookLayer;
pub use manager_service::{LogManagerHandle, LogManagerService};
pub use record::{LogInfo, LogRecord};
pub use severity::{Color, Severity};
