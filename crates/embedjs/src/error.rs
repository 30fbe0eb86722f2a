//! Error conditions surfaced by a [`Context`](crate::Context)
//!
//! Script failures keep the thrown value's name and message verbatim, so
//! callers can match on them the same way script code would.

use embedjs_engine::EngineError;
use thiserror::Error;

/// Result type alias for context operations
pub type Result<T> = std::result::Result<T, Error>;

/// Malformed text crossing the host/engine boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    /// Bytes that claim to be UTF-8 but are not
    #[error("invalid UTF-8 sequence at byte {offset}")]
    InvalidUtf8 { offset: usize },

    /// Engine text holding an unpaired surrogate half
    #[error("lone surrogate U+{unit:04X} at byte {offset}")]
    LoneSurrogate { unit: u16, offset: usize },

    /// UTF-16 host text with an unpaired surrogate
    #[error("unpaired UTF-16 surrogate U+{unit:04X} at index {index}")]
    InvalidUtf16 { unit: u16, index: usize },
}

/// Everything a context operation can fail with.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A host value has no engine representation
    #[error("Argument type error: {0}")]
    ArgumentType(String),

    /// Script `ReferenceError`, or a missing root identifier.
    ///
    /// Messages thrown by the engine are its own text verbatim (for example
    /// `x is not defined`). Only a property path whose root global is missing
    /// reads `identifier 'x' undefined`. Match on the variant, not the text.
    #[error("ReferenceError: {message}")]
    Reference { message: String },

    /// Script `TypeError`, or an invalid property traversal
    #[error("TypeError: {message}")]
    Type { message: String },

    /// Compile-time failure
    #[error("SyntaxError: {message}")]
    Syntax { message: String },

    /// Any other thrown value. Error objects carry a `stack` naming the
    /// file, line and column they were thrown from.
    #[error("{name}: {message}")]
    Script {
        name: String,
        message: String,
        stack: Option<String>,
    },

    /// Malformed text
    #[error("Encoding error: {0}")]
    Encoding(#[from] EncodingError),

    /// The engine aborted; the context is unusable from now on
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn reference(message: impl Into<String>) -> Self {
        Self::Reference {
            message: message.into(),
        }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::Type {
            message: message.into(),
        }
    }

    pub fn syntax(message: impl Into<String>) -> Self {
        Self::Syntax {
            message: message.into(),
        }
    }

    /// Create a generic script error without a stack trace
    pub fn script(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Script {
            name: name.into(),
            message: message.into(),
            stack: None,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Stable name of the error condition.
    pub fn error_type(&self) -> &str {
        match self {
            Self::ArgumentType(_) => "ArgumentTypeError",
            Self::Reference { .. } => "ReferenceError",
            Self::Type { .. } => "TypeError",
            Self::Syntax { .. } => "SyntaxError",
            Self::Script { name, .. } => name,
            Self::Encoding(_) => "EncodingError",
            Self::Internal(_) => "InternalError",
        }
    }

    /// The message without the error-type prefix.
    pub fn message(&self) -> String {
        match self {
            Self::ArgumentType(message) | Self::Internal(message) => message.clone(),
            Self::Reference { message }
            | Self::Type { message }
            | Self::Syntax { message }
            | Self::Script { message, .. } => message.clone(),
            Self::Encoding(err) => err.to_string(),
        }
    }

    /// Check if this error was raised by script code
    pub fn is_script_error(&self) -> bool {
        matches!(
            self,
            Self::Reference { .. } | Self::Type { .. } | Self::Syntax { .. } | Self::Script { .. }
        )
    }

    /// Check if the context that produced this error is now unusable
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Internal(_))
    }

    /// Get the stack trace if available
    pub fn stack_trace(&self) -> Option<&str> {
        match self {
            Self::Script { stack, .. } => stack.as_deref(),
            _ => None,
        }
    }
}

impl From<EngineError> for Error {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Fatal(reason) => Self::Internal(reason),
            EngineError::Thrown => Self::Internal("unclassified script exception".into()),
        }
    }
}
