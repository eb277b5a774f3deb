use std::io;
use std::path::PathBuf;
use thiserror::Error;
use trigr_manifest::{ManifestError, SourceLocation};

/// Errors that abort a compilation run
///
/// Every variant tied to source carries the offending location so the CLI can
/// point at it directly.
#[derive(Error, Debug)]
pub enum CompileError {
    #[error("{location}: syntax error: {message}")]
    SyntaxError {
        location: SourceLocation,
        message: String,
    },

    #[error("{location}: {call} is missing required argument '{argument}'")]
    MissingRequiredArgument {
        location: SourceLocation,
        call: String,
        argument: String,
    },

    #[error("{location}: unrecognized trigger shape for {call}: {reason}")]
    UnrecognizedTriggerShape {
        location: SourceLocation,
        call: String,
        reason: String,
    },

    #[error("{location}: unsupported expression `{expression}`: {reason}")]
    UnsupportedExpression {
        location: SourceLocation,
        expression: String,
        reason: String,
    },

    #[error("{location}: invalid pattern '{pattern}': {reason}")]
    InvalidPattern {
        location: SourceLocation,
        pattern: String,
        reason: String,
    },

    #[error("{second}: duplicate endpoint key '{key}' (first defined at {first})")]
    DuplicateEndpointKey {
        key: String,
        first: SourceLocation,
        second: SourceLocation,
    },

    #[error("{location}: unknown parameter reference '{name}'")]
    UnknownParamReference {
        location: SourceLocation,
        name: String,
    },

    #[error("{location}: invalid value for option '{option}': {reason}")]
    InvalidOption {
        location: SourceLocation,
        option: String,
        reason: String,
    },

    #[error("{location}: invalid parameter: {reason}")]
    InvalidParam {
        location: SourceLocation,
        reason: String,
    },

    #[error("{second}: parameter '{name}' is already declared at {first}")]
    DuplicateParam {
        name: String,
        first: SourceLocation,
        second: SourceLocation,
    },

    #[error("{second}: setGlobalOptions may only be called once (first call at {first})")]
    DuplicateGlobalOptions {
        first: SourceLocation,
        second: SourceLocation,
    },

    #[error("IO error reading {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Manifest(#[from] ManifestError),
}

impl CompileError {
    /// Source location the error points at, if it has one
    pub fn location(&self) -> Option<&SourceLocation> {
        match self {
            CompileError::SyntaxError { location, .. }
            | CompileError::MissingRequiredArgument { location, .. }
            | CompileError::UnrecognizedTriggerShape { location, .. }
            | CompileError::UnsupportedExpression { location, .. }
            | CompileError::InvalidPattern { location, .. }
            | CompileError::UnknownParamReference { location, .. }
            | CompileError::InvalidOption { location, .. }
            | CompileError::InvalidParam { location, .. } => Some(location),
            CompileError::DuplicateEndpointKey { second, .. }
            | CompileError::DuplicateParam { second, .. }
            | CompileError::DuplicateGlobalOptions { second, .. } => Some(second),
            CompileError::Io { .. } | CompileError::Manifest(_) => None,
        }
    }

    /// Attach a location to manifest-level errors raised while building an endpoint
    pub(crate) fn from_manifest(error: ManifestError, location: &SourceLocation) -> Self {
        match error {
            ManifestError::InvalidPattern { pattern, reason } => CompileError::InvalidPattern {
                location: location.clone(),
                pattern,
                reason,
            },
            ManifestError::DuplicateEndpointKey { key, first, second } => {
                CompileError::DuplicateEndpointKey { key, first, second }
            }
            other => CompileError::Manifest(other),
        }
    }
}
