//! Errors raised by the core data model.

/// Error type for data model operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors that can occur while building datasets and reports.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A row does not have one cell per column
    #[error("row {row} has {found} cells, expected {expected}")]
    RowWidth {
        /// Zero-based row index
        row: usize,
        /// Number of declared columns
        expected: usize,
        /// Number of cells in the row
        found: usize,
    },

    /// Two columns share the same name
    #[error("duplicate column name: {0}")]
    DuplicateColumn(String),

    /// The report was already finalized
    #[error("report {0} is sealed")]
    Sealed(String),

    /// A stage name was recorded twice
    #[error("stage already recorded: {0}")]
    DuplicateStage(String),
}
