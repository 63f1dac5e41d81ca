//! Error types for the admission layer.
//!
//! Errors are explicit and typed (no stringly-typed errors). User payloads
//! are never wrapped: a task whose output is itself a `Result` travels
//! through [`spawn`](crate::Scheduler::spawn) and
//! [`finish`](crate::Scheduler::finish) untouched. The kinds below cover
//! only what the admission layer itself can fail with.

use core::fmt;

/// The kind of error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A frame reservation was refused (budget exhausted or injected failure).
    FrameExhausted,
    /// An admitted task was dropped by the host executor before it completed.
    TaskLost,
}

/// The error type for admission-layer operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    kind: ErrorKind,
    context: Option<String>,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub const fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: None,
        }
    }

    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns true if this error came from a refused frame reservation.
    #[must_use]
    pub const fn is_frame_exhausted(&self) -> bool {
        matches!(self.kind, ErrorKind::FrameExhausted)
    }

    /// Returns true if this error reports a task lost by the host executor.
    #[must_use]
    pub const fn is_task_lost(&self) -> bool {
        matches!(self.kind, ErrorKind::TaskLost)
    }

    /// Adds deterministic context text to the error.
    #[must_use]
    pub fn with_context(mut self, ctx: impl Into<String>) -> Self {
        self.context = Some(ctx.into());
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(ctx) = &self.context {
            write!(f, ": {ctx}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {}

/// A specialized Result type for admission-layer operations.
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_without_context() {
        let err = Error::new(ErrorKind::TaskLost);
        assert_eq!(err.to_string(), "TaskLost");
    }

    #[test]
    fn display_with_context() {
        let err = Error::new(ErrorKind::FrameExhausted).with_context("budget exceeded");
        assert_eq!(err.to_string(), "FrameExhausted: budget exceeded");
    }

    #[test]
    fn predicates_match_kind() {
        let exhausted = Error::new(ErrorKind::FrameExhausted);
        assert!(exhausted.is_frame_exhausted());
        assert!(!exhausted.is_task_lost());

        let lost = Error::new(ErrorKind::TaskLost);
        assert!(!lost.is_frame_exhausted());
        assert!(lost.is_task_lost());
    }
}
