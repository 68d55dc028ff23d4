use thiserror::Error;

/// Storage errors.
///
/// The receiver treats every variant except startup connection failures
/// as a per-frame failure: the current write is abandoned and the
/// reception loop continues.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Not found")]
    NotFound,
}
