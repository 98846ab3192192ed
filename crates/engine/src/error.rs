//! Engine-level error type.

use coursekit_core::CoreError;
use coursekit_db::StorageError;

/// Failure inside an engine operation. Domain failures (validation,
/// missing records) and storage failures are kept distinct so callers
/// can map them to different responses.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl EngineError {
    /// Shortcut for validation failures raised by the engine itself.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Core(CoreError::Validation(message.into()))
    }
}
