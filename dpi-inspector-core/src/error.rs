use thiserror::Error;

/// Errors surfaced to callers of the engine.
///
/// Per the propagation policy: parsers and L7 extractors never raise (they
/// return partial records or "no match"); the dispatcher and workers never
/// propagate per-packet errors (the verdict subsumes all normal outcomes).
/// Only capture-file open/parse errors and admin-surface/config failures
/// reach this type.
#[derive(Error, Debug)]
pub enum DpiError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed capture file: {0}")]
    MalformedCapture(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("rule store unavailable: {0}")]
    RuleStoreUnavailable(String),
}

pub type Result<T> = std::result::Result<T, DpiError>;
