//! Option/schema model: one typed argument of a command, plus the validated
//! argument record handed to handlers.

use crate::core::error::DispatchError;
use crate::core::value::{Attachment, Value};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;

static USER_MENTION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^<@!?(\w+)>$").unwrap());
static CHANNEL_MENTION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^<#(\w+)>$").unwrap());
static ROLE_MENTION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^<@&(\w+)>$").unwrap());
static RAW_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\w+$").unwrap());

/// `i64::MAX as f64` rounds up to 2^63, so the upper bound is exclusive.
const I64_RANGE: std::ops::Range<f64> = i64::MIN as f64..i64::MAX as f64;

/// Semantic type of an option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionKind {
    String,
    Integer,
    Number,
    Boolean,
    User,
    Channel,
    Role,
    Attachment,
}

/// One declared argument. Immutable once attached to a descriptor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptionSpec {
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub kind: OptionKind,
    pub required: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<Value>,
}

impl OptionSpec {
    pub fn new(name: impl Into<String>, kind: OptionKind) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            kind,
            required: false,
            choices: Vec::new(),
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, OptionKind::String)
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, OptionKind::Integer)
    }

    pub fn number(name: impl Into<String>) -> Self {
        Self::new(name, OptionKind::Number)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, OptionKind::Boolean)
    }

    pub fn user(name: impl Into<String>) -> Self {
        Self::new(name, OptionKind::User)
    }

    pub fn channel(name: impl Into<String>) -> Self {
        Self::new(name, OptionKind::Channel)
    }

    pub fn role(name: impl Into<String>) -> Self {
        Self::new(name, OptionKind::Role)
    }

    pub fn attachment(name: impl Into<String>) -> Self {
        Self::new(name, OptionKind::Attachment)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn choices<I, V>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.choices = choices.into_iter().map(Into::into).collect();
        self
    }

    pub fn choice_labels(&self) -> Vec<String> {
        self.choices.iter().map(|c| c.to_string()).collect()
    }
}

/// Failure of a single option check, before the command name is attached.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    Missing {
        option: String,
    },
    InvalidChoice {
        option: String,
        given: String,
        choices: Vec<String>,
    },
    Invalid {
        option: String,
        reason: String,
    },
}

impl ValidationError {
    pub fn into_dispatch(self, command: &str) -> DispatchError {
        let command = command.to_string();
        match self {
            ValidationError::Missing { option } => DispatchError::MissingArgument { command, option },
            ValidationError::InvalidChoice {
                option,
                given,
                choices,
            } => DispatchError::InvalidChoice {
                command,
                option,
                given,
                choices,
            },
            ValidationError::Invalid { option, reason } => DispatchError::InvalidArgument {
                command,
                option,
                reason,
            },
        }
    }
}

/// Validate and coerce one raw value against its spec.
///
/// `Ok(None)` means the option is absent and optional.
pub fn validate(spec: &OptionSpec, raw: Option<&Value>) -> Result<Option<Value>, ValidationError> {
    let raw = match raw {
        Some(Value::Text(t)) if t.trim().is_empty() => None,
        other => other,
    };
    let Some(raw) = raw else {
        if spec.required {
            return Err(ValidationError::Missing {
                option: spec.name.clone(),
            });
        }
        return Ok(None);
    };

    let value = coerce(spec, raw)?;

    if !spec.choices.is_empty() && !spec.choices.iter().any(|c| choice_matches(c, &value)) {
        return Err(ValidationError::InvalidChoice {
            option: spec.name.clone(),
            given: value.to_string(),
            choices: spec.choice_labels(),
        });
    }
    Ok(Some(value))
}

fn choice_matches(choice: &Value, value: &Value) -> bool {
    match (choice.as_f64(), value.as_f64()) {
        (Some(a), Some(b)) => a == b,
        _ => choice == value,
    }
}

fn coerce(spec: &OptionSpec, raw: &Value) -> Result<Value, ValidationError> {
    let invalid = |reason: String| ValidationError::Invalid {
        option: spec.name.clone(),
        reason,
    };

    match spec.kind {
        OptionKind::String => match raw {
            Value::Attachment(_) => Err(invalid("expected text, got an attachment".into())),
            Value::Text(t) => Ok(Value::Text(t.clone())),
            other => Ok(Value::Text(other.to_string())),
        },
        OptionKind::Integer => match raw {
            Value::Integer(i) => Ok(Value::Integer(*i)),
            Value::Number(n) if n.is_finite() && n.fract() == 0.0 => {
                if I64_RANGE.contains(n) {
                    Ok(Value::Integer(*n as i64))
                } else {
                    Err(invalid(format!("{n} is out of range for an integer")))
                }
            }
            Value::Text(t) => t
                .trim()
                .parse::<i64>()
                .map(Value::Integer)
                .map_err(|_| invalid(format!("'{}' is not an integer", t.trim()))),
            other => Err(invalid(format!("'{other}' is not an integer"))),
        },
        OptionKind::Number => {
            let n = match raw {
                Value::Number(n) => *n,
                Value::Integer(i) => *i as f64,
                Value::Text(t) => t
                    .trim()
                    .parse::<f64>()
                    .map_err(|_| invalid(format!("'{}' is not a number", t.trim())))?,
                other => return Err(invalid(format!("'{other}' is not a number"))),
            };
            if !n.is_finite() {
                return Err(invalid("number must be finite".into()));
            }
            Ok(Value::Number(n))
        }
        OptionKind::Boolean => match raw {
            Value::Bool(b) => Ok(Value::Bool(*b)),
            Value::Text(t) => parse_bool(t.trim())
                .map(Value::Bool)
                .ok_or_else(|| invalid(format!("'{}' is not a boolean", t.trim()))),
            other => Err(invalid(format!("'{other}' is not a boolean"))),
        },
        OptionKind::User => match raw {
            Value::User(id) => Ok(Value::User(id.clone())),
            Value::Text(t) => parse_reference(t.trim(), &USER_MENTION)
                .map(Value::User)
                .ok_or_else(|| invalid(format!("'{}' is not a user reference", t.trim()))),
            other => Err(invalid(format!("'{other}' is not a user reference"))),
        },
        OptionKind::Channel => match raw {
            Value::Channel(id) => Ok(Value::Channel(id.clone())),
            Value::Text(t) => parse_reference(t.trim(), &CHANNEL_MENTION)
                .map(Value::Channel)
                .ok_or_else(|| invalid(format!("'{}' is not a channel reference", t.trim()))),
            other => Err(invalid(format!("'{other}' is not a channel reference"))),
        },
        OptionKind::Role => match raw {
            Value::Role(id) => Ok(Value::Role(id.clone())),
            Value::Text(t) => parse_reference(t.trim(), &ROLE_MENTION)
                .map(Value::Role)
                .ok_or_else(|| invalid(format!("'{}' is not a role reference", t.trim()))),
            other => Err(invalid(format!("'{other}' is not a role reference"))),
        },
        OptionKind::Attachment => match raw {
            Value::Attachment(a) => Ok(Value::Attachment(a.clone())),
            _ => Err(invalid("expected an attached file".into())),
        },
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

fn parse_reference(s: &str, mention: &Regex) -> Option<String> {
    if let Some(caps) = mention.captures(s) {
        return Some(caps[1].to_string());
    }
    RAW_ID.is_match(s).then(|| s.to_string())
}

/// Validate a whole extracted record against an ordered list of specs.
///
/// Keys not declared by any spec are dropped.
pub fn validate_all(
    specs: &[OptionSpec],
    record: &BTreeMap<String, Value>,
) -> Result<Args, ValidationError> {
    let mut values = BTreeMap::new();
    for spec in specs {
        if let Some(v) = validate(spec, record.get(&spec.name))? {
            values.insert(spec.name.clone(), v);
        }
    }
    Ok(Args { values })
}

/// Validated, typed arguments of a resolved leaf command.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    values: BTreeMap<String, Value>,
}

impl Args {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_text)
    }

    pub fn integer(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_i64)
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(Value::as_f64)
    }

    pub fn flag(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(Value::as_bool)
    }

    pub fn attachment(&self, name: &str) -> Option<&Attachment> {
        self.get(name).and_then(Value::as_attachment)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_required_is_missing_argument() {
        let spec = OptionSpec::string("text").required();
        assert_eq!(
            validate(&spec, None),
            Err(ValidationError::Missing {
                option: "text".into()
            })
        );
        // Blank text counts as absent.
        assert!(matches!(
            validate(&spec, Some(&Value::from("   "))),
            Err(ValidationError::Missing { .. })
        ));
    }

    #[test]
    fn optional_absent_is_none() {
        let spec = OptionSpec::integer("count");
        assert_eq!(validate(&spec, None), Ok(None));
    }

    #[test]
    fn integer_from_number_rejects_out_of_range() {
        let spec = OptionSpec::integer("count");
        assert_eq!(validate(&spec, Some(&Value::Number(42.0))), Ok(Some(Value::Integer(42))));
        assert_eq!(
            validate(&spec, Some(&Value::Number(-9.223372036854775808e18))),
            Ok(Some(Value::Integer(i64::MIN)))
        );
        for n in [1e300, -1e300, 9.223372036854775808e18] {
            assert!(
                matches!(
                    validate(&spec, Some(&Value::Number(n))),
                    Err(ValidationError::Invalid { .. })
                ),
                "{n}"
            );
        }
    }

    #[test]
    fn numbers_must_be_finite() {
        let spec = OptionSpec::number("n");
        assert_eq!(validate(&spec, Some(&"2.5".into())), Ok(Some(Value::Number(2.5))));
        assert!(matches!(
            validate(&spec, Some(&"inf".into())),
            Err(ValidationError::Invalid { .. })
        ));
        assert!(matches!(
            validate(&spec, Some(&"abc".into())),
            Err(ValidationError::Invalid { .. })
        ));
    }

    #[test]
    fn numeric_choices_compare_by_value() {
        let spec = OptionSpec::number("sides").choices([4.0, 6.0, 20.0]);
        assert_eq!(validate(&spec, Some(&"6".into())), Ok(Some(Value::Number(6.0))));
        let err = validate(&spec, Some(&"7".into())).unwrap_err();
        assert_eq!(
            err,
            ValidationError::InvalidChoice {
                option: "sides".into(),
                given: "7".into(),
                choices: vec!["4".into(), "6".into(), "20".into()],
            }
        );
    }

    #[test]
    fn string_choices() {
        let spec = OptionSpec::string("mode").choices(["fast", "slow"]);
        assert!(validate(&spec, Some(&"fast".into())).is_ok());
        assert!(matches!(
            validate(&spec, Some(&"medium".into())),
            Err(ValidationError::InvalidChoice { .. })
        ));
    }

    #[test]
    fn mentions_coerce_to_ids() {
        let user = OptionSpec::user("who");
        assert_eq!(
            validate(&user, Some(&"<@!1234>".into())),
            Ok(Some(Value::User("1234".into())))
        );
        assert_eq!(
            validate(&user, Some(&"1234".into())),
            Ok(Some(Value::User("1234".into())))
        );
        let channel = OptionSpec::channel("where");
        assert_eq!(
            validate(&channel, Some(&"<#99>".into())),
            Ok(Some(Value::Channel("99".into())))
        );
        let role = OptionSpec::role("role");
        assert!(validate(&role, Some(&"<@&7>".into())).is_ok());
        assert!(validate(&role, Some(&"not a role".into())).is_err());
    }

    #[test]
    fn attachment_requires_payload() {
        let spec = OptionSpec::attachment("file").required();
        assert!(matches!(
            validate(&spec, Some(&"file.png".into())),
            Err(ValidationError::Invalid { .. })
        ));
        let file = Attachment::new("a.png", vec![1, 2, 3]);
        assert_eq!(
            validate(&spec, Some(&Value::Attachment(file.clone()))),
            Ok(Some(Value::Attachment(file)))
        );
    }

    #[test]
    fn booleans() {
        let spec = OptionSpec::boolean("loud");
        assert_eq!(validate(&spec, Some(&"Yes".into())), Ok(Some(Value::Bool(true))));
        assert_eq!(validate(&spec, Some(&"off".into())), Ok(Some(Value::Bool(false))));
        assert!(validate(&spec, Some(&"maybe".into())).is_err());
    }

    #[test]
    fn validate_all_drops_undeclared_keys() {
        let specs = vec![OptionSpec::string("a")];
        let mut record = BTreeMap::new();
        record.insert("a".to_string(), Value::from("x"));
        record.insert("zzz".to_string(), Value::from("y"));
        let args = validate_all(&specs, &record).unwrap();
        assert_eq!(args.len(), 1);
        assert_eq!(args.str("a"), Some("x"));
    }
}
