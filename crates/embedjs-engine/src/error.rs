//! Engine failure signals

use thiserror::Error;

/// Result type alias for engine primitives
pub type EngineResult<T> = Result<T, EngineError>;

/// How an engine primitive failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// Script code threw. The thrown value sits on top of the value stack
    /// and stays there until the caller pops it.
    #[error("script threw a value")]
    Thrown,

    /// The VM aborted. Nothing may touch the engine afterwards.
    #[error("fatal engine error: {0}")]
    Fatal(String),
}

impl EngineError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }
}

/// Panic payload used to carry a fatal abort out of a native callback.
#[derive(Debug)]
pub(crate) struct FatalAbort(pub(crate) String);

/// Constructor used when raising an error value from host code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Error,
    TypeError,
    ReferenceError,
    SyntaxError,
    RangeError,
}
