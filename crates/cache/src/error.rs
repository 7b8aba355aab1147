//! Cache errors.

/// Error type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;

/// Errors that can occur during cache operations.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Organism or symbol was empty
    #[error("invalid cache key: organism={organism:?} symbol={symbol:?}")]
    InvalidKey {
        /// Organism as given
        organism: String,
        /// Symbol as given
        symbol: String,
    },
}
