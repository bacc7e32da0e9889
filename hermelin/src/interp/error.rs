//! Runtime errors for the interpreter

use std::fmt;

/// Hard error raised during evaluation.
///
/// Soft conditions (unknown identifiers, unknown functions) never produce one
/// of these; they are logged and the offending node yields no value.
#[derive(Debug, Clone)]
pub struct RuntimeError {
    pub kind: ErrorKind,
    pub message: String,
    /// Call sites active when the error first crossed a user function call,
    /// innermost last
    pub traceback: Vec<String>,
}

/// Kinds of runtime errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Operand or argument of the wrong type
    TypeError,
    /// Wrong number of arguments to a built-in
    Argument,
    /// Invalid index or oversized array extension
    Index,
    /// Integer division by zero
    DivisionByZero,
    /// Integer overflow in exponentiation
    Overflow,
    /// Recursion limit exceeded
    StackOverflow,
    /// Module could not be read or parsed
    Import,
    /// IO error inside a built-in
    IoError,
    /// The program has no `main` function
    MissingMain,
}

impl ErrorKind {
    /// Numeric code reported to the host
    pub fn code(self) -> i32 {
        match self {
            ErrorKind::TypeError => 1,
            ErrorKind::Argument => 2,
            ErrorKind::Index => 3,
            ErrorKind::DivisionByZero => 4,
            ErrorKind::Overflow => 5,
            ErrorKind::StackOverflow => 6,
            ErrorKind::Import => 7,
            ErrorKind::IoError => 8,
            ErrorKind::MissingMain => 9,
        }
    }
}

impl RuntimeError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        RuntimeError {
            kind,
            message: message.into(),
            traceback: Vec::new(),
        }
    }

    pub fn code(&self) -> i32 {
        self.kind.code()
    }

    pub fn type_error(expected: &str, got: &str) -> Self {
        Self::new(
            ErrorKind::TypeError,
            format!("type error: expected {expected}, got {got}"),
        )
    }

    pub fn division_by_zero() -> Self {
        Self::new(ErrorKind::DivisionByZero, "division by zero")
    }

    pub fn overflow(what: &str) -> Self {
        Self::new(ErrorKind::Overflow, format!("integer overflow in {what}"))
    }

    pub fn index(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Index, message)
    }

    pub fn stack_overflow(limit: usize) -> Self {
        Self::new(
            ErrorKind::StackOverflow,
            format!("stack overflow: recursion deeper than {limit} calls"),
        )
    }

    pub fn import(path: &str, reason: &str) -> Self {
        Self::new(ErrorKind::Import, format!("cannot import {path}: {reason}"))
    }

    pub fn io_error(msg: &str) -> Self {
        Self::new(ErrorKind::IoError, format!("IO error: {msg}"))
    }

    pub fn missing_main() -> Self {
        Self::new(ErrorKind::MissingMain, "no main function defined")
    }

    /// Attach a traceback unless an inner call already did
    pub fn with_traceback(mut self, traceback: &[String]) -> Self {
        if self.traceback.is_empty() {
            self.traceback = traceback.to_vec();
        }
        self
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Runtime error [{}]: {}", self.code(), self.message)
    }
}

impl std::error::Error for RuntimeError {}

/// Result type for interpreter operations
pub type InterpResult<T> = Result<T, RuntimeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_error_message_format() {
        let err = RuntimeError::type_error("array", "int");
        assert_eq!(err.kind, ErrorKind::TypeError);
        assert_eq!(err.message, "type error: expected array, got int");
    }

    #[test]
    fn test_display_includes_code() {
        let err = RuntimeError::division_by_zero();
        assert_eq!(err.to_string(), "Runtime error [4]: division by zero");
    }

    #[test]
    fn test_codes_are_distinct() {
        let kinds = [
            ErrorKind::TypeError,
            ErrorKind::Argument,
            ErrorKind::Index,
            ErrorKind::DivisionByZero,
            ErrorKind::Overflow,
            ErrorKind::StackOverflow,
            ErrorKind::Import,
            ErrorKind::IoError,
            ErrorKind::MissingMain,
        ];
        let mut codes: Vec<i32> = kinds.iter().map(|k| k.code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), kinds.len());
    }

    #[test]
    fn test_traceback_kept_from_innermost() {
        let inner = vec!["main (line 1)".to_string(), "f (line 3)".to_string()];
        let err = RuntimeError::division_by_zero()
            .with_traceback(&inner)
            .with_traceback(&["main (line 1)".to_string()]);
        assert_eq!(err.traceback, inner);
    }

    #[test]
    fn test_import_message() {
        let err = RuntimeError::import("lib.hs", "file not found");
        assert_eq!(err.message, "cannot import lib.hs: file not found");
        assert_eq!(err.code(), 7);
    }

    #[test]
    fn test_error_is_std_error() {
        let err = RuntimeError::missing_main();
        let std_err: &dyn std::error::Error = &err;
        assert!(std_err.source().is_none());
    }
}
