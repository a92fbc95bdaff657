use crate::core::envelope::PipeEnvelope;
use std::io;
use thiserror::Error;

/// Configuration and registration failures. Raised before any dispatch happens.
#[derive(Error, Debug)]
pub enum SwitchboardError {
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Config error: {0}")]
    ConfigError(String),
    #[error("Duplicate name '{name}' in scope '{scope}'")]
    DuplicateName { scope: String, name: String },
    #[error("Invalid descriptor '{command}': {reason}")]
    InvalidDescriptor { command: String, reason: String },
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Not found: {0}")]
    NotFound(String),
}

/// Fieldless discriminant of [`DispatchError`], handy for assertions and metrics labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    EmptyInvocation,
    UnknownCommand,
    UnknownSubcommand,
    MissingArgument,
    InvalidChoice,
    InvalidArgument,
    AccessDenied,
    PipeIncompatible,
    MalformedPipeline,
    HandlerFailure,
}

/// Everything that can go wrong between receiving an invocation and producing a reply.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DispatchError {
    #[error("empty invocation")]
    EmptyInvocation,
    #[error("unknown command: {name}")]
    UnknownCommand { name: String },
    #[error("invalid subcommand: {given}; use one of {} (under '{parent}')", .choices.join(", "))]
    UnknownSubcommand {
        parent: String,
        given: String,
        choices: Vec<String>,
    },
    #[error("{command}: missing required argument '{option}'")]
    MissingArgument { command: String, option: String },
    #[error("{command}: invalid value '{given}' for '{option}'; choose one of {}", .choices.join(", "))]
    InvalidChoice {
        command: String,
        option: String,
        given: String,
        choices: Vec<String>,
    },
    #[error("{command}: invalid value for '{option}': {reason}")]
    InvalidArgument {
        command: String,
        option: String,
        reason: String,
    },
    #[error("access denied to '{command}': {reason}")]
    AccessDenied { command: String, reason: String },
    #[error(
        "cannot pipe '{upstream}' [{}] into '{downstream}' [{}]",
        .produces.join(", "),
        .accepts.join(", ")
    )]
    PipeIncompatible {
        upstream: String,
        produces: Vec<String>,
        downstream: String,
        accepts: Vec<String>,
    },
    #[error("malformed pipeline: {reason}")]
    MalformedPipeline { reason: String },
    #[error("{command} failed: {message}")]
    HandlerFailure { command: String, message: String },
}

impl DispatchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DispatchError::EmptyInvocation => ErrorKind::EmptyInvocation,
            DispatchError::UnknownCommand { .. } => ErrorKind::UnknownCommand,
            DispatchError::UnknownSubcommand { .. } => ErrorKind::UnknownSubcommand,
            DispatchError::MissingArgument { .. } => ErrorKind::MissingArgument,
            DispatchError::InvalidChoice { .. } => ErrorKind::InvalidChoice,
            DispatchError::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            DispatchError::AccessDenied { .. } => ErrorKind::AccessDenied,
            DispatchError::PipeIncompatible { .. } => ErrorKind::PipeIncompatible,
            DispatchError::MalformedPipeline { .. } => ErrorKind::MalformedPipeline,
            DispatchError::HandlerFailure { .. } => ErrorKind::HandlerFailure,
        }
    }

    /// Uniform `{error: true, message}` rendering used by the single reporting path.
    pub fn to_envelope(&self) -> PipeEnvelope {
        PipeEnvelope::fail(self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_subcommand_names_parent_and_choices() {
        let err = DispatchError::UnknownSubcommand {
            parent: "todo".into(),
            given: "frob".into(),
            choices: vec!["add".into(), "list".into()],
        };
        assert_eq!(
            err.to_string(),
            "invalid subcommand: frob; use one of add, list (under 'todo')"
        );
        assert_eq!(err.kind(), ErrorKind::UnknownSubcommand);
    }

    #[test]
    fn envelope_is_uniform() {
        let env = DispatchError::EmptyInvocation.to_envelope();
        assert!(env.error);
        assert_eq!(env.message.as_deref(), Some("empty invocation"));
        assert!(env.data.is_none());
    }
}
