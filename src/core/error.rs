//! Typed errors for the seams callers need to match on.

use thiserror::Error;

/// Raised when a transaction violates the buy-record invariants.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransactionError {
    #[error("ticker must not be empty")]
    EmptyTicker,

    #[error("quantity must be greater than zero, got {0}")]
    NonPositiveQuantity(f64),

    #[error("price must not be negative, got {0}")]
    NegativePrice(f64),

    #[error("invalid date: '{0}'")]
    InvalidDate(String),

    #[error("invalid number in column {column}: '{value}'")]
    InvalidNumber { column: &'static str, value: String },
}

/// Failure of a transaction or watchlist store.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("store unreachable: {0}")]
    Unreachable(String),

    #[error("unexpected data layout: {0}")]
    Schema(String),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("all stores failed: {}", .0.join("; "))]
    Exhausted(Vec<String>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_formatting_is_readable() {
        let err = TransactionError::NonPositiveQuantity(0.0);
        assert_eq!(err.to_string(), "quantity must be greater than zero, got 0");

        let err = PersistenceError::Exhausted(vec![
            "sheets: store unreachable: timeout".to_string(),
            "csv: io error: denied".to_string(),
        ]);
        assert_eq!(
            err.to_string(),
            "all stores failed: sheets: store unreachable: timeout; csv: io error: denied"
        );
    }
}
