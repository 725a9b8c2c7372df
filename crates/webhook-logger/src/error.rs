// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use reqwest::StatusCode;

/// Errors from building a [`Destination`](crate::destination::Destination).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DestinationError {
    #[error("Invalid webhook URL: {0}")]
    InvalidUrl(String),

    #[error("Webhook URL has no '/webhooks/' path segment")]
    MissingWebhookPath,

    #[error("Webhook URL has no webhook id")]
    MissingId,

    #[error("Webhook URL has no webhook token")]
    MissingToken,
}

/// Errors from delivering one batch to the sink.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("Failed to send request: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{status}: Sink rejected the payload: {body}")]
    Status { status: StatusCode, body: String },

    #[error("Failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Errors from validating a [`Config`](crate::config::Config).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Invalid value '{value}' for {name}")]
    InvalidEnv { name: &'static str, value: String },
}

/// Errors from talking to a stopped log manager.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ManagerError {
    #[error("Failed to send {0} command: log manager is not running")]
    Send(&'static str),

    #[error("Failed to receive {0} response: log manager dropped the request")]
    Receive(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = ConfigError::Invalid("frequency must be greater than 0".to_string());
        assert_eq!(
            error.to_string(),
            "Invalid configuration: frequency must be greater than 0"
        );

        let error = DeliveryError::Status {
            status: StatusCode::TOO_MANY_REQUESTS,
            body: "rate limited".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "429 Too Many Requests: Sink rejected the payload: rate limited"
        );

        let error = ManagerError::Send("take_batch");
        assert_eq!(
            error.to_string(),
            "Failed to send take_batch command: log manager is not running"
        );
    }
}
