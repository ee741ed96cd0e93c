use thiserror::Error;

/// Failures surfaced by metadata detection and configuration retrieval.
///
/// `Cancelled` is kept apart from every other variant so callers can tell
/// an aborted operation from a failed one.
#[derive(Debug, Error)]
pub enum Error {
    #[error("operation was cancelled")]
    Cancelled,
    #[error("failure in setting GCP metadata-flavor: {0}")]
    Setup(String),
    #[error("failure to detect GCP metadata: {0}")]
    Detect(String),
    #[error("failure to get GCP metadata: {0}")]
    Transport(String),
    #[error("error in server response while fetching {0}")]
    ServerResponse(&'static str),
    #[error("{0}")]
    Validation(String),
    #[error("no matching hwaddr found for GCP interface {0}")]
    NoMatch(u64),
    #[error("{0}")]
    Empty(&'static str),
}

impl Error {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}
