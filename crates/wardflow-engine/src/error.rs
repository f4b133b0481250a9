//! Error types for engine operations

use thiserror::Error;

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors raised when accepting or driving a workflow.
///
/// Runtime failures inside a running workflow are not errors at this
/// boundary: they land in the workflow snapshot as phase and agent
/// statuses (`RunStatus::Failed`, `FailureReason`), mirroring how denials
/// stay values at the gateway boundary.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The submitted specification was rejected before any phase ran.
    #[error("Invalid workflow spec: {0}")]
    InvalidSpec(String),
}
