mod resolve;
mod separator;

pub use resolve::{resolve_overlaps, ResolveConfig, ResolvedSegment};
pub use separator::{SourceSeparator, TimedSeparator};

use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum SeparationError {
    #[error("separation failed: {0}")]
    SeparationFailed(String),
    #[error("separation timed out after {0:?}")]
    Timeout(Duration),
    #[error("separation worker unavailable")]
    WorkerUnavailable,
}

pub type Result<T> = std::result::Result<T, SeparationError>;
