use thiserror::Error;

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the cell list and the event driver built on top of it.
///
/// Configuration errors abort the rebuild that raised them; the caller decides
/// whether the whole run is abandoned. Nothing here is retried internally.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid user or API parameter.
    #[error("invalid parameter: {0}")]
    InvalidParam(String),

    /// Cell list configuration that cannot produce a usable grid.
    #[error("cell configuration error: {0}")]
    Config(String),

    /// A computed cell index fell outside the allocated Morton array.
    #[error("cell index {index} out of range for array of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    /// The cell list was queried before a successful build.
    #[error("cell list has not been built")]
    NotBuilt,

    /// Only three spatial axes are supported by the Morton index.
    #[error("domain error: {0}")]
    DomainError(String),

    /// Numerical or geometric issue (e.g., degenerate contact normal).
    #[error("numerical error: {0}")]
    MathError(String),
}
