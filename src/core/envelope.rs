//! Tags and the pipe envelope passed between pipeline stages.

use crate::core::value::Value;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

/// Capability/content-type label. Drives help categories and pipe compatibility.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tag(Cow<'static, str>);

impl Tag {
    /// Plain text content; the tag most text commands produce and consume.
    pub const TEXT: Tag = Tag(Cow::Borrowed("input_text"));
    pub const NUMBER: Tag = Tag(Cow::Borrowed("number"));
    pub const IMAGE: Tag = Tag(Cow::Borrowed("image"));
    pub const ATTACHMENT: Tag = Tag(Cow::Borrowed("attachment"));
    pub const ELEVATED: Tag = Tag(Cow::Borrowed("elevated"));
    pub const UTILITY: Tag = Tag(Cow::Borrowed("utility"));

    pub fn new(name: impl Into<String>) -> Self {
        Tag(Cow::Owned(name.into()))
    }

    /// Legacy name-based piping target: "this stage may feed `path`".
    pub fn pipe_target(path: &str) -> Self {
        Tag(Cow::Owned(format!("cmd:{path}")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Tag {
    fn from(s: &str) -> Self {
        Tag::new(s)
    }
}

pub type PipeData = BTreeMap<Tag, Value>;

/// Result of one stage: success/error flag, optional message, optional typed data.
///
/// A stage that does not want to feed anything downstream leaves `data` empty.
/// Command bodies author these directly, so [`CommandResponse`] is the same type.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PipeEnvelope {
    pub error: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<PipeData>,
}

pub type CommandResponse = PipeEnvelope;

impl PipeEnvelope {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            error: false,
            message: Some(message.into()),
            data: None,
        }
    }

    pub fn silent() -> Self {
        Self::default()
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            error: true,
            message: Some(message.into()),
            data: None,
        }
    }

    pub fn with_data(mut self, tag: Tag, value: impl Into<Value>) -> Self {
        self.data
            .get_or_insert_with(BTreeMap::new)
            .insert(tag, value.into());
        self
    }

    /// Text suitable for the reply collaborator: the message, else any text payload.
    pub fn display_text(&self) -> Option<String> {
        if let Some(m) = &self.message {
            return Some(m.clone());
        }
        self.data
            .as_ref()
            .and_then(|d| d.get(&Tag::TEXT))
            .map(|v| v.to_string())
    }
}
