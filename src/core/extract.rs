//! Argument extraction templates.
//!
//! A template turns the unconsumed part of an invocation into a raw argument record.
//! Templates never fail: anything absent or unparseable is simply left out, and
//! required-ness is enforced afterwards by option validation. The template is fixed
//! per descriptor at registration time.

use crate::core::invocation::{Invocation, Source};
use crate::core::value::Value;
use std::collections::BTreeMap;

pub type ArgsRecord = BTreeMap<String, Value>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ArgTemplate {
    /// Takes no free-text arguments.
    #[default]
    None,
    /// Whole trimmed remainder becomes one argument.
    Remainder { arg: String },
    /// First whitespace-separated token, then the trimmed rest.
    FirstToken { first: String, rest: String },
    /// First token, then everything after the separating whitespace with line
    /// structure and indentation kept (code blocks, multi-line bodies).
    TwoSegment { first: String, second: String },
    /// First attached binary payload; text is ignored.
    FirstAttachment { arg: String },
}

impl ArgTemplate {
    pub fn remainder(arg: impl Into<String>) -> Self {
        ArgTemplate::Remainder { arg: arg.into() }
    }

    pub fn first_token(first: impl Into<String>, rest: impl Into<String>) -> Self {
        ArgTemplate::FirstToken {
            first: first.into(),
            rest: rest.into(),
        }
    }

    pub fn two_segment(first: impl Into<String>, second: impl Into<String>) -> Self {
        ArgTemplate::TwoSegment {
            first: first.into(),
            second: second.into(),
        }
    }

    pub fn first_attachment(arg: impl Into<String>) -> Self {
        ArgTemplate::FirstAttachment { arg: arg.into() }
    }

    /// Argument names this template can fill.
    pub fn arg_names(&self) -> Vec<&str> {
        match self {
            ArgTemplate::None => vec![],
            ArgTemplate::Remainder { arg } | ArgTemplate::FirstAttachment { arg } => {
                vec![arg.as_str()]
            }
            ArgTemplate::FirstToken { first, rest } => vec![first.as_str(), rest.as_str()],
            ArgTemplate::TwoSegment { first, second } => vec![first.as_str(), second.as_str()],
        }
    }

    /// Extract a raw record. `remainder` is the text left after the prefix and the
    /// matched command path were consumed.
    ///
    /// Structured payloads arrive already keyed by option name, so every template
    /// except `None` passes them through.
    pub fn extract(&self, invocation: &Invocation, remainder: &str) -> ArgsRecord {
        let mut record = ArgsRecord::new();
        if *self == ArgTemplate::None {
            return record;
        }

        if invocation.source == Source::Structured {
            record.extend(invocation.options.clone());
            if let ArgTemplate::FirstAttachment { arg } = self {
                if !record.contains_key(arg) {
                    if let Some(a) = invocation.attachments.first() {
                        record.insert(arg.clone(), Value::Attachment(a.clone()));
                    }
                }
            }
            return record;
        }

        match self {
            ArgTemplate::None => {}
            ArgTemplate::Remainder { arg } => {
                put_text(&mut record, arg, remainder.trim());
            }
            ArgTemplate::FirstToken { first, rest } => {
                let (head, tail) = split_first_token(remainder.trim());
                put_text(&mut record, first, head);
                put_text(&mut record, rest, tail.trim());
            }
            ArgTemplate::TwoSegment { first, second } => {
                let (head, tail) = split_first_token(remainder.trim_start());
                put_text(&mut record, first, head);
                put_text(&mut record, second, second_segment(tail));
            }
            ArgTemplate::FirstAttachment { arg } => {
                if let Some(a) = invocation.attachments.first() {
                    record.insert(arg.clone(), Value::Attachment(a.clone()));
                }
            }
        }
        record
    }
}

fn put_text(record: &mut ArgsRecord, name: &str, text: &str) {
    if !text.is_empty() {
        record.insert(name.to_string(), Value::Text(text.to_string()));
    }
}

fn split_first_token(s: &str) -> (&str, &str) {
    match s.find(char::is_whitespace) {
        Some(i) => (&s[..i], &s[i..]),
        None => (s, ""),
    }
}

/// Drop the separator (blanks plus at most one line break) and trailing whitespace,
/// keep everything else verbatim.
fn second_segment(tail: &str) -> &str {
    let s = tail.trim_start_matches([' ', '\t']);
    let s = s
        .strip_prefix("\r\n")
        .or_else(|| s.strip_prefix('\n'))
        .unwrap_or(s);
    s.trim_end()
}
