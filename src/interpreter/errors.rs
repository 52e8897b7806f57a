//! Runtime error types for the Python interpreter
//!
//! This module defines:
//! - [`RuntimeError`]: errors raised by the engine itself, named after the Python
//!   exception class they become
//! - [`Exception`]: a propagating exception (engine error or user instance) with
//!   the traceback collected while frames unwind
//! - [`Unwind`]: everything that can abort normal statement flow, either an
//!   exception or a [`Halt`] requested by the execution hook
//! - [`Flow`]: how a statement completed (`break`, `continue`, `return`)

use crate::memory::value::{ObjectId, Value};
use std::rc::Rc;
use thiserror::Error;

/// Errors raised by the engine
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    #[error("TypeError: {0}")]
    TypeError(String),

    #[error("ValueError: {0}")]
    ValueError(String),

    #[error("NameError: {0}")]
    NameError(String),

    #[error("UnboundLocalError: {0}")]
    UnboundLocalError(String),

    #[error("AttributeError: {0}")]
    AttributeError(String),

    #[error("IndexError: {0}")]
    IndexError(String),

    /// Carries the rendered key
    #[error("KeyError: {0}")]
    KeyError(String),

    #[error("ZeroDivisionError: {0}")]
    ZeroDivisionError(String),

    #[error("OverflowError: {0}")]
    OverflowError(String),

    #[error("RecursionError: {0}")]
    RecursionError(String),

    #[error("AssertionError{}", prefixed(.0))]
    AssertionError(String),

    #[error("NotImplementedError{}", prefixed(.0))]
    NotImplementedError(String),

    #[error("StopIteration{}", prefixed(.0))]
    StopIteration(String),

    #[error("ModuleNotFoundError: {0}")]
    ModuleNotFoundError(String),

    #[error("ImportError: {0}")]
    ImportError(String),

    #[error("EOFError: {0}")]
    EOFError(String),

    #[error("SyntaxError: {0}")]
    SyntaxError(String),

    #[error("RuntimeError: {0}")]
    Runtime(String),

    /// Engine invariant violated (dangling identity, corrupted frame stack)
    #[error("SystemError: {0}")]
    Internal(String),
}

fn prefixed(message: &str) -> String {
    if message.is_empty() {
        String::new()
    } else {
        format!(": {}", message)
    }
}

impl RuntimeError {
    /// Name of the Python exception class this error is raised as
    pub fn class_name(&self) -> &'static str {
        match self {
            RuntimeError::TypeError(_) => "TypeError",
            RuntimeError::ValueError(_) => "ValueError",
            RuntimeError::NameError(_) => "NameError",
            RuntimeError::UnboundLocalError(_) => "UnboundLocalError",
            RuntimeError::AttributeError(_) => "AttributeError",
            RuntimeError::IndexError(_) => "IndexError",
            RuntimeError::KeyError(_) => "KeyError",
            RuntimeError::ZeroDivisionError(_) => "ZeroDivisionError",
            RuntimeError::OverflowError(_) => "OverflowError",
            RuntimeError::RecursionError(_) => "RecursionError",
            RuntimeError::AssertionError(_) => "AssertionError",
            RuntimeError::NotImplementedError(_) => "NotImplementedError",
            RuntimeError::StopIteration(_) => "StopIteration",
            RuntimeError::ModuleNotFoundError(_) => "ModuleNotFoundError",
            RuntimeError::ImportError(_) => "ImportError",
            RuntimeError::EOFError(_) => "EOFError",
            RuntimeError::SyntaxError(_) => "SyntaxError",
            RuntimeError::Runtime(_) => "RuntimeError",
            RuntimeError::Internal(_) => "SystemError",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            RuntimeError::TypeError(m)
            | RuntimeError::ValueError(m)
            | RuntimeError::NameError(m)
            | RuntimeError::UnboundLocalError(m)
            | RuntimeError::AttributeError(m)
            | RuntimeError::IndexError(m)
            | RuntimeError::KeyError(m)
            | RuntimeError::ZeroDivisionError(m)
            | RuntimeError::OverflowError(m)
            | RuntimeError::RecursionError(m)
            | RuntimeError::AssertionError(m)
            | RuntimeError::NotImplementedError(m)
            | RuntimeError::StopIteration(m)
            | RuntimeError::ModuleNotFoundError(m)
            | RuntimeError::ImportError(m)
            | RuntimeError::EOFError(m)
            | RuntimeError::SyntaxError(m)
            | RuntimeError::Runtime(m)
            | RuntimeError::Internal(m) => m,
        }
    }

    pub(crate) fn type_error(message: impl Into<String>) -> Self {
        RuntimeError::TypeError(message.into())
    }

    pub(crate) fn value_error(message: impl Into<String>) -> Self {
        RuntimeError::ValueError(message.into())
    }

    pub(crate) fn missing_object(id: ObjectId) -> Self {
        RuntimeError::Internal(format!("dangling object reference {}", id))
    }
}

/// Names of the builtin exception classes and their base, in creation order
pub const EXCEPTION_HIERARCHY: &[(&str, Option<&str>)] = &[
    ("BaseException", None),
    ("Exception", Some("BaseException")),
    ("ArithmeticError", Some("Exception")),
    ("ZeroDivisionError", Some("ArithmeticError")),
    ("OverflowError", Some("ArithmeticError")),
    ("LookupError", Some("Exception")),
    ("IndexError", Some("LookupError")),
    ("KeyError", Some("LookupError")),
    ("ValueError", Some("Exception")),
    ("TypeError", Some("Exception")),
    ("NameError", Some("Exception")),
    ("UnboundLocalError", Some("NameError")),
    ("AttributeError", Some("Exception")),
    ("AssertionError", Some("Exception")),
    ("RuntimeError", Some("Exception")),
    ("RecursionError", Some("RuntimeError")),
    ("NotImplementedError", Some("RuntimeError")),
    ("StopIteration", Some("Exception")),
    ("ImportError", Some("Exception")),
    ("ModuleNotFoundError", Some("ImportError")),
    ("EOFError", Some("Exception")),
    ("SyntaxError", Some("Exception")),
    ("SystemError", Some("Exception")),
];

/// The payload of a propagating exception
#[derive(Debug, Clone, PartialEq)]
pub enum ExceptionValue {
    /// Raised by the engine; materialized into an instance only when bound with `as`
    Builtin(RuntimeError),
    /// A heap instance of an exception class
    Object(ObjectId),
}

/// One frame of a traceback
#[derive(Debug, Clone, PartialEq)]
pub struct TraceEntry {
    pub origin: Rc<str>,
    pub line: usize,
    pub routine: String,
}

/// A propagating exception with its traceback, innermost frame first
#[derive(Debug, Clone, PartialEq)]
pub struct Exception {
    pub value: ExceptionValue,
    pub traceback: Vec<TraceEntry>,
}

impl Exception {
    pub fn new(value: ExceptionValue) -> Self {
        Exception {
            value,
            traceback: Vec::new(),
        }
    }

    /// Origin of the innermost frame the exception passed through
    pub fn innermost_origin(&self) -> Option<&str> {
        self.traceback.first().map(|e| e.origin.as_ref())
    }
}

/// Why the hook stopped interpretation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Halt {
    /// A console read had no answer available
    InputRequested { prompt: String },
    /// The hook returned [`HookAction::Stop`](super::hooks::HookAction::Stop)
    Stopped,
}

/// Abnormal completion of a statement or expression
#[derive(Debug, Clone, PartialEq)]
pub enum Unwind {
    Error(Box<Exception>),
    Halt(Halt),
}

impl From<RuntimeError> for Unwind {
    fn from(err: RuntimeError) -> Self {
        Unwind::Error(Box::new(Exception::new(ExceptionValue::Builtin(err))))
    }
}

impl From<Halt> for Unwind {
    fn from(halt: Halt) -> Self {
        Unwind::Halt(halt)
    }
}

/// Result type used throughout the interpreter
pub type Exec<T> = Result<T, Unwind>;

/// Normal completion of a statement
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    Normal,
    Break,
    Continue,
    Return(Value),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_matches_traceback_tail() {
        assert_eq!(
            RuntimeError::ZeroDivisionError("division by zero".into()).to_string(),
            "ZeroDivisionError: division by zero"
        );
        assert_eq!(RuntimeError::AssertionError(String::new()).to_string(), "AssertionError");
        assert_eq!(RuntimeError::KeyError("'a'".into()).to_string(), "KeyError: 'a'");
    }

    #[test]
    fn test_hierarchy_covers_every_engine_error() {
        let errors = [
            RuntimeError::TypeError(String::new()),
            RuntimeError::EOFError(String::new()),
            RuntimeError::Internal(String::new()),
            RuntimeError::Runtime(String::new()),
            RuntimeError::ModuleNotFoundError(String::new()),
        ];
        for err in errors {
            assert!(EXCEPTION_HIERARCHY
                .iter()
                .any(|(name, _)| *name == err.class_name()));
        }
    }
}
