// Tracer error types

use thiserror::Error;

/// Failure inside the tracer's own instrumentation
#[derive(Debug, Error)]
pub enum TraceError {
    #[error("step limit of {limit} exceeded")]
    StepLimit { limit: usize },

    #[error("{routine} panicked: {message}")]
    Panic { routine: &'static str, message: String },
}

/// Failure of the foreign-language front door
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TranslateError {
    #[error("Error: No translator configured for {language}")]
    Unavailable { language: String },

    #[error("Error: translator failed: {0}")]
    Failed(String),

    #[error("Error: translator produced non-UTF-8 output")]
    Encoding,

    #[error("Error: Code conversion request timed out ({secs}s).")]
    TimedOut { secs: u64 },

    #[error("Error: API request failed ({0}). LM Studio running?")]
    Request(String),

    /// The collaborator answered with text that is not runnable code
    #[error("{0}")]
    Rejected(String),
}
