use thiserror::Error;

/// Failure modes surfaced to the user. None of them are fatal: a fresh
/// search always replaces the session state wholesale.
#[derive(Error, Debug)]
pub enum XrayError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("upstream failure for item {item} ({location}): {reason}")]
    UpstreamFailure {
        item: u64,
        location: String,
        reason: String,
    },
    #[error("item {item} ({location}): only {loaded} of {reported} pages loaded")]
    TruncatedPages {
        item: u64,
        location: String,
        loaded: u32,
        reported: u32,
    },
    #[error("no records found for the selected filters")]
    EmptyResult,
    #[error("cannot analyse an empty dataset")]
    EmptyDataset,
    #[error("not enough records to compute dispersion statistics")]
    InsufficientData,
    #[error("retention is undefined for an empty baseline")]
    DivisionUndefined,
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, XrayError>;
