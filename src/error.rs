use chrono::NaiveDate;
use thiserror::Error;

/// Failure to retrieve a listing page
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("No page count marker found on {url}")]
    MissingPageCount { url: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl FetchError {
    /// Whether another attempt at the same request may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Transport(_) => true,
            FetchError::Status { status, .. } => *status == 429 || *status >= 500,
            FetchError::MissingPageCount { .. } | FetchError::InvalidUrl(_) => false,
        }
    }
}

/// A single offer card that could not be turned into an offer
#[derive(Error, Debug, PartialEq)]
pub enum ExtractionError {
    #[error("card {id}: missing {what}")]
    Missing { id: String, what: &'static str },

    #[error("card {id}: only {count} detail line(s)")]
    TooFewDetails { id: String, count: usize },

    #[error("card {id}: unparsable {what} '{raw}'")]
    Unparsable {
        id: String,
        what: &'static str,
        raw: String,
    },
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Field '{field}' does not exist in the offer schema")]
    SchemaMismatch { field: String },

    #[error("Batch carries {count} different schemas, expected one")]
    MultipleSchemas { count: usize },

    #[error("Snapshot for {source_id} on {ds} already exists")]
    SnapshotExists { source_id: String, ds: NaiveDate },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("Another transition is in progress for table {table}")]
    TrackerConflict { table: String },

    #[error("Snapshot error: {0}")]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T, E = EtlError> = std::result::Result<T, E>;
