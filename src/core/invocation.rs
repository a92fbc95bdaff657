//! Canonical invocation shape and the two adapters feeding it.
//!
//! Free text (`!say hello`) and structured payloads (`name` + option map) both become
//! an [`Invocation`] whose `body` starts with the command path. The resolver only
//! ever sees this one shape.

use crate::core::deploy::SUBCOMMAND_OPTION;
use crate::core::error::DispatchError;
use crate::core::registry::Registry;
use crate::core::value::{Attachment, Value};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Text,
    Structured,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    /// Command path followed (for text) by free-form arguments. Prefix already stripped.
    pub body: String,
    /// Typed option values from a structured payload; empty for text.
    pub options: BTreeMap<String, Value>,
    pub attachments: Vec<Attachment>,
    pub source: Source,
}

impl Invocation {
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            options: BTreeMap::new(),
            attachments: Vec::new(),
            source: Source::Text,
        }
    }

    /// Text adapter: accept `raw` only if it starts with `prefix`.
    pub fn from_message(raw: &str, prefix: &str) -> Option<Self> {
        let trimmed = raw.trim_start();
        let body = trimmed.strip_prefix(prefix)?;
        if body.trim().is_empty() {
            return None;
        }
        Some(Self::text(body.trim()))
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    pub fn is_text(&self) -> bool {
        self.source == Source::Text
    }
}

/// A platform's structured command payload, before normalization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StructuredCall {
    /// Registered (possibly flattened) command name, e.g. `calc-add`.
    pub name: String,
    pub options: BTreeMap<String, Value>,
    pub attachments: Vec<Attachment>,
}

impl StructuredCall {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn option(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(name.into(), value.into());
        self
    }
}

/// Structured adapter: map an exported name (and merge selector) back to a command path.
///
/// The selector must be one of the exported choices verbatim; aliases and extra
/// tokens are rejected so both surfaces reach a child under the same name.
pub fn normalize_structured(
    registry: &Registry,
    call: StructuredCall,
) -> Result<Invocation, DispatchError> {
    let route = registry
        .structured_route(&call.name)
        .ok_or_else(|| DispatchError::UnknownCommand {
            name: call.name.clone(),
        })?;

    let mut options = call.options;
    let mut body = route.path.join(" ");
    if route.merged {
        match options.remove(SUBCOMMAND_OPTION) {
            // Blank counts as absent and falls through to the default child.
            Some(Value::Text(sub)) if sub.trim().is_empty() => {}
            Some(Value::Text(sub)) => {
                if !route.choices.iter().any(|c| *c == sub) {
                    return Err(DispatchError::InvalidChoice {
                        command: route.path.join(" "),
                        option: SUBCOMMAND_OPTION.to_string(),
                        given: sub,
                        choices: route.choices.clone(),
                    });
                }
                body.push(' ');
                body.push_str(&sub);
            }
            Some(other) => {
                return Err(DispatchError::InvalidArgument {
                    command: route.path.join(" "),
                    option: SUBCOMMAND_OPTION.to_string(),
                    reason: format!("expected a subcommand name, got '{other}'"),
                });
            }
            None => {}
        }
    }

    Ok(Invocation {
        body,
        options,
        attachments: call.attachments,
        source: Source::Structured,
    })
}
