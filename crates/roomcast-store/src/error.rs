//! Error types for the storage layer.

/// Errors a [`MessageStore`](crate::MessageStore) can report.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backing store could not be reached or refused the operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A stored record did not match the expected shape. Raised at the
    /// store boundary so callers only ever see well-typed values.
    #[error("corrupt record: {0}")]
    Corrupt(String),
}
