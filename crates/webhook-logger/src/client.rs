// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use crate::attachment::Attachment;
use crate::destination::Destination;
use crate::embed::Embed;
use crate::error::DeliveryError;

/// One webhook message: the mentions, the embeds of a batch and its
/// attachment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WebhookPayload {
    pub content: String,
    pub embeds: Vec<Embed>,
    #[serde(skip)]
    pub attachment: Option<Attachment>,
}

impl WebhookPayload {
    /// Short description for logs, without the attachment bytes.
    #[must_use]
    pub fn summary(&self) -> String {
        let attachment = self.attachment.as_ref().map_or_else(
            || "none".to_string(),
            |attachment| format!("{} ({} bytes)", attachment.filename, attachment.data.len()),
        );
        format!(
            "content: {:?}, embeds: {}, attachment: {attachment}",
            self.content,
            self.embeds.len()
        )
    }
}

/// Sends a batch to a destination. Errors end the cycle; nothing is retried.
#[async_trait]
pub trait DeliveryClient: Send + Sync {
    async fn deliver(
        &self,
        destination: &Destination,
        payload: WebhookPayload,
    ) -> Result<(), DeliveryError>;
}

/// Delivers payloads over HTTP to the webhook execute endpoint.
#[derive(Debug, Clone)]
pub struct WebhookClient {
    client: reqwest::Client,
}

impl WebhookClient {
    pub fn new(timeout: Duration) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn create_request(
        &self,
        destination: &Destination,
        mut payload: WebhookPayload,
    ) -> Result<reqwest::RequestBuilder, DeliveryError> {
        let request = self.client.post(destination.execute_url());

        let Some(attachment) = payload.attachment.take() else {
            return Ok(request.json(&payload));
        };

        let mut payload_json = serde_json::to_value(&payload)?;
        if let Some(object) = payload_json.as_object_mut() {
            object.insert(
                "attachments".to_string(),
                serde_json::json!([{ "id": 0, "filename": attachment.filename }]),
            );
        }
        let form = Form::new()
            .part(
                "payload_json",
                Part::text(serde_json::to_string(&payload_json)?).mime_str("application/json")?,
            )
            .part(
                "files[0]",
                Part::bytes(attachment.data).file_name(attachment.filename),
            );
        Ok(request.multipart(form))
    }
}

#[async_trait]
impl DeliveryClient for WebhookClient {
    async fn deliver(
        &self,
        destination: &Destination,
        payload: WebhookPayload,
    ) -> Result<(), DeliveryError> {
        let request = self.create_request(destination, payload)?;
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            debug!("Delivered logs to webhook {}", destination.id());
            return Ok(());
        }
        Err(DeliveryError::Status {
            status,
            body: response.text().await.unwrap_or_default(),
        })
    }
}
