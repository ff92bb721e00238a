use thiserror::Error;

/// Errors surfaced to callers of the index.
///
/// Degenerate partitions are not errors from the caller's point of
/// view; nodes absorb them by staying oversized leaves.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum VpTreeError {
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("cannot select a threshold from an empty list of points")]
    EmptyInput,
}

pub type Result<T> = std::result::Result<T, VpTreeError>;
