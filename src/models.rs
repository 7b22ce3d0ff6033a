//! Data models for the Arweave Today news feed.
//!
//! This module defines the feed document and its parts:
//! - [`NewsRecord`]: One feed snapshot (publication instant plus ordered topics)
//! - [`Topic`]: A single news item, narrated in feed order
//! - [`Aside`]: The optional chitchat and suggested-read segments
//!
//! Documents are validated once when they are parsed. Missing or `null` optional
//! fields are normalised here so the rest of the crate never has to guess at
//! defaults: topic natures default to `"news"`, empty strings count as absent
//! for asides and video links, and a document without `ts` is rejected.

use serde::{Deserialize, Deserializer, Serialize};

/// One feed snapshot.
///
/// # JSON Schema
///
/// ```text
/// {
///   "ts": 1720000000000,
///   "topics": [{ "headline": "...", "body": "...", "nature": "funding", "video": "https://..." }],
///   "chitchat": { "nature": "Did you know?", "headline": "...", "body": "..." },
///   "suggested": { "nature": "today's read", "headline": "...", "body": "..." }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct NewsRecord {
    /// Publication instant in epoch milliseconds.
    pub ts: i64,
    /// Topics in narration order.
    #[serde(default, deserialize_with = "null_as_default")]
    pub topics: Vec<Topic>,
    /// Optional "did you know" segment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chitchat: Option<Aside>,
    /// Optional suggested-read segment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested: Option<Aside>,
}

impl NewsRecord {
    /// Validate a parsed JSON document as a news record.
    pub fn from_value(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Parse and validate a news record from JSON text.
    pub fn from_json_str(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// A single news item.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Topic {
    #[serde(default, deserialize_with = "null_as_default")]
    pub headline: String,
    /// Primary narration content.
    #[serde(default, deserialize_with = "null_as_default")]
    pub body: String,
    /// Category label such as "funding" or "community".
    #[serde(default = "default_nature", deserialize_with = "nature_or_default")]
    pub nature: String,
    /// Link to a video whose spoken content can enrich the body.
    #[serde(default, deserialize_with = "non_empty", skip_serializing_if = "Option::is_none")]
    pub video: Option<String>,
}

impl Topic {
    /// Copy of this topic with `extra` appended to the body as a new paragraph.
    ///
    /// The source topic is left untouched.
    pub fn with_appended_paragraph(&self, extra: &str) -> Topic {
        let mut derived = self.clone();
        derived.body = format!("{}\n\n{}", self.body, extra);
        derived
    }
}

/// A chitchat or suggested-read segment. Every field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Aside {
    #[serde(default, deserialize_with = "non_empty", skip_serializing_if = "Option::is_none")]
    pub nature: Option<String>,
    #[serde(default, deserialize_with = "non_empty", skip_serializing_if = "Option::is_none")]
    pub headline: Option<String>,
    #[serde(default, deserialize_with = "non_empty", skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl Aside {
    /// An aside renders only when it has a headline or a body.
    pub fn has_content(&self) -> bool {
        self.headline.is_some() || self.body.is_some()
    }
}

fn default_nature() -> String {
    "news".to_string()
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn non_empty<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

fn nature_or_default<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(non_empty(deserializer)?.unwrap_or_else(default_nature))
}
