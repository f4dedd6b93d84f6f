use thiserror::Error;

pub type Result<T = ()> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("node source error: {0}")]
    Source(String),
    #[error("process table unavailable: {0}")]
    ProcessTable(String),
    #[error("property store error: {0}")]
    Store(String),
    #[error("could not resolve '{0}' into a peer")]
    Unresolved(String),
    #[error("'{token}' is ambiguous, matches: {}", candidates.join(", "))]
    Ambiguous {
        token: String,
        candidates: Vec<String>,
    },
}
