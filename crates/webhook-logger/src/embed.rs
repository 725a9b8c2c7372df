// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Rich message blocks rendered by the sink for each log record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{
    MAX_EMBEDS_CONTENT_LENGTH, MAX_EMBED_AUTHOR_NAME_LENGTH, MAX_EMBED_DESCRIPTION_LENGTH,
    MAX_EMBED_FIELDS, MAX_EMBED_FIELD_NAME_LENGTH, MAX_EMBED_FIELD_VALUE_LENGTH,
    MAX_EMBED_FOOTER_LENGTH, MAX_EMBED_TITLE_LENGTH,
};
use crate::severity::Color;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Embed {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<EmbedFooter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<EmbedAuthor>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<EmbedField>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedFooter {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedAuthor {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub inline: bool,
}

impl EmbedField {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            inline: false,
        }
    }
}

impl Embed {
    /// Size of the embed as the sink counts it against the per-message limit.
    ///
    /// The sum of the character counts of the title, description, footer
    /// text, author name, and every field name and value. Color and timestamp
    /// are free.
    #[must_use]
    pub fn content_length(&self) -> usize {
        let text = |s: &Option<String>| s.as_deref().map_or(0, |s| s.chars().count());
        text(&self.title)
            + text(&self.description)
            + self
                .footer
                .as_ref()
                .map_or(0, |footer| footer.text.chars().count())
            + self
                .author
                .as_ref()
                .map_or(0, |author| author.name.chars().count())
            + self
                .fields
                .iter()
                .map(|field| field.name.chars().count() + field.value.chars().count())
                .sum::<usize>()
    }

    /// Cuts every part of the embed down to the sink's limits.
    ///
    /// Afterwards `content_length()` is at most
    /// [`MAX_EMBEDS_CONTENT_LENGTH`], so the embed always fits in a batch on
    /// its own. Trailing fields go first, then the description, then the
    /// title.
    #[must_use]
    pub fn truncated(mut self) -> Self {
        if let Some(title) = self.title.as_mut() {
            truncate_chars(title, MAX_EMBED_TITLE_LENGTH);
        }
        if let Some(description) = self.description.as_mut() {
            truncate_chars(description, MAX_EMBED_DESCRIPTION_LENGTH);
        }
        if let Some(footer) = self.footer.as_mut() {
            truncate_chars(&mut footer.text, MAX_EMBED_FOOTER_LENGTH);
        }
        if let Some(author) = self.author.as_mut() {
            truncate_chars(&mut author.name, MAX_EMBED_AUTHOR_NAME_LENGTH);
        }
        self.fields.truncate(MAX_EMBED_FIELDS);
        for field in &mut self.fields {
            truncate_chars(&mut field.name, MAX_EMBED_FIELD_NAME_LENGTH);
            truncate_chars(&mut field.value, MAX_EMBED_FIELD_VALUE_LENGTH);
        }

        while self.content_length() > MAX_EMBEDS_CONTENT_LENGTH && self.fields.pop().is_some() {}

        let overflow = self
            .content_length()
            .saturating_sub(MAX_EMBEDS_CONTENT_LENGTH);
        if overflow > 0 {
            if let Some(description) = self.description.as_mut() {
                let keep = description.chars().count().saturating_sub(overflow);
                truncate_chars(description, keep);
            }
        }

        let overflow = self
            .content_length()
            .saturating_sub(MAX_EMBEDS_CONTENT_LENGTH);
        if overflow > 0 {
            if let Some(title) = self.title.as_mut() {
                let keep = title.chars().count().saturating_sub(overflow);
                truncate_chars(title, keep);
            }
        }

        self
    }
}

/// Truncates `s` to at most `max` characters, on a char boundary.
pub(crate) fn truncate_chars(s: &mut String, max: usize) {
    if let Some((idx, _)) = s.char_indices().nth(max) {
        s.truncate(idx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn long(len: usize) -> String {
        "é".repeat(len)
    }

    #[test]
    fn test_content_length_counts_text_parts() {
        let embed = Embed {
            title: Some("title".to_string()),
            description: Some("description".to_string()),
            color: Some(Color::RED),
            timestamp: Some(Utc::now()),
            footer: Some(EmbedFooter {
                text: "footer".to_string(),
            }),
            author: None,
            fields: vec![EmbedField::new("key", "value")],
        };
        assert_eq!(embed.content_length(), 5 + 11 + 6 + 3 + 5);
    }

    #[test]
    fn test_content_length_counts_chars_not_bytes() {
        let embed = Embed {
            title: Some("ééé".to_string()),
            ..Default::default()
        };
        assert_eq!(embed.content_length(), 3);
    }

    #[test]
    fn test_truncated_applies_part_limits() {
        let embed = Embed {
            title: Some(long(300)),
            fields: (0..30)
                .map(|i| EmbedField::new(format!("k{i}"), "v"))
                .collect(),
            ..Default::default()
        }
        .truncated();

        assert_eq!(embed.title.as_deref().map(|t| t.chars().count()), Some(256));
        assert_eq!(embed.fields.len(), MAX_EMBED_FIELDS);
    }

    #[test]
    fn test_truncated_fits_in_a_batch() {
        let embed = Embed {
            title: Some(long(6_500)),
            description: Some(long(6_500)),
            footer: Some(EmbedFooter { text: long(6_500) }),
            author: Some(EmbedAuthor { name: long(6_500) }),
            fields: (0..50)
                .map(|_| EmbedField::new(long(6_500), long(6_500)))
                .collect(),
            ..Default::default()
        }
        .truncated();

        assert!(embed.content_length() <= MAX_EMBEDS_CONTENT_LENGTH);
        // Footer and title are kept whole while the description can absorb the overflow.
        assert_eq!(
            embed.footer.map(|f| f.text.chars().count()),
            Some(MAX_EMBED_FOOTER_LENGTH)
        );
        assert_eq!(
            embed.title.map(|t| t.chars().count()),
            Some(MAX_EMBED_TITLE_LENGTH)
        );
    }

    #[test]
    fn test_truncated_keeps_small_embed_intact() {
        let embed = Embed {
            title: Some("hello".to_string()),
            fields: vec![EmbedField::new("a", "b")],
            ..Default::default()
        };
        assert_eq!(embed.clone().truncated(), embed);
    }

    #[test]
    fn test_serialization_skips_empty_parts() {
        let embed = Embed {
            title: Some("hello".to_string()),
            color: Some(Color::BLUE),
            ..Default::default()
        };
        let json = serde_json::to_value(&embed).expect("failed to serialize embed");
        assert_eq!(
            json,
            serde_json::json!({ "title": "hello", "color": Color::BLUE.0 })
        );
    }
}
