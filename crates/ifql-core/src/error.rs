use thiserror::Error;

/// Canonical result for the engine.
pub type Result<T> = std::result::Result<T, Error>;

/// Every failure the pipeline can surface, from parse through execution.
/// Clone is required because a finish with an error fans out to several
/// downstream datasets.
#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error("parse error at {line}:{col}: {message}")]
    Parse {
        line: u32,
        col: u32,
        message: String,
    },

    #[error("unknown function {0:?}")]
    UnknownFunction(String),

    #[error("invalid argument: {0}")]
    Argument(String),

    #[error("type error: {0}")]
    Type(String),

    #[error("invalid query: {0}")]
    Query(String),

    #[error("planning error: {0}")]
    Plan(String),

    #[error("storage read error: {0}")]
    Read(String),

    #[error(
        "memory budget exceeded: requested {requested} bytes, capacity {capacity}, used {used}"
    )]
    ResourceExhausted {
        requested: usize,
        capacity: usize,
        used: usize,
    },

    #[error("join type mismatch: {0}")]
    JoinTypeMismatch(String),

    #[error("query cancelled")]
    Cancelled,

    #[error("operator panicked: {0}")]
    Panic(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Type(e.to_string())
    }
}
