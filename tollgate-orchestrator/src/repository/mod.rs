//! Repository Module
//!
//! Collaborators the admission engine reads from and writes to. Storage is
//! owned elsewhere; the engine depends only on these traits. In-memory
//! implementations back tests and embedded use.

mod build;
mod runner;

use thiserror::Error;

// Re-export traits
pub use build::{BuildSnapshotProvider, DropRecorder};
pub use runner::RunnerSnapshotProvider;

// Re-export implementations
pub use build::InMemoryBuildRepository;
pub use runner::InMemoryRunnerRepository;

/// Error returned by a collaborator
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    /// Backing store could not be reached
    #[error("repository unavailable: {0}")]
    Unavailable(String),

    /// Requested record does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Record is in a state that forbids the write
    #[error("conflict: {0}")]
    Conflict(String),
}

pub type Result<T> = std::result::Result<T, RepositoryError>;
