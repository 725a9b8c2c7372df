// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use reqwest::Url;
use std::fmt::{self, Debug};
use std::str::FromStr;

use crate::error::DestinationError;

/// Address of a webhook that receives log batches.
///
/// Each destination gets its own queue and its own dispatch loop. Built from
/// a webhook URL of the form `https://host/api/webhooks/{id}/{token}`,
/// optionally with a `thread_id` query parameter.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Destination {
    url: Url,
    id: String,
    token: String,
    thread_id: Option<String>,
}

impl Destination {
    pub fn from_url(url: &str) -> Result<Self, DestinationError> {
        let mut url = Url::parse(url).map_err(|e| DestinationError::InvalidUrl(e.to_string()))?;

        let segments: Vec<String> = url
            .path_segments()
            .ok_or(DestinationError::MissingWebhookPath)?
            .filter(|segment| !segment.is_empty())
            .map(str::to_string)
            .collect();
        let position = segments
            .iter()
            .position(|segment| segment == "webhooks")
            .ok_or(DestinationError::MissingWebhookPath)?;
        let id = segments
            .get(position + 1)
            .cloned()
            .ok_or(DestinationError::MissingId)?;
        let token = segments
            .get(position + 2)
            .cloned()
            .ok_or(DestinationError::MissingToken)?;

        let thread_id = url
            .query_pairs()
            .find(|(key, _)| key == "thread_id")
            .map(|(_, value)| value.into_owned());

        url.set_query(None);
        url.set_fragment(None);
        url.set_path(&format!(
            "{}/{id}/{token}",
            segments[..=position]
                .iter()
                .fold(String::new(), |path, segment| path + "/" + segment)
        ));

        Ok(Self {
            url,
            id,
            token,
            thread_id,
        })
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn thread_id(&self) -> Option<&str> {
        self.thread_id.as_deref()
    }

    /// URL that executes the webhook and waits for the sink's confirmation.
    #[must_use]
    pub fn execute_url(&self) -> Url {
        let mut url = self.url.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("wait", "true");
            if let Some(thread_id) = &self.thread_id {
                query.append_pair("thread_id", thread_id);
            }
        }
        url
    }
}

impl FromStr for Destination {
    type Err = DestinationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_url(s)
    }
}

impl Debug for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Destination")
            .field("id", &self.id)
            .field("thread_id", &self.thread_id)
            .finish_non_exhaustive()
    }
}
