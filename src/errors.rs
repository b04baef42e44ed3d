use std::io;

use thiserror::Error;

use crate::types::ModelId;

/// Error type for picker configuration, IO, image generation, and PNG failures.
///
/// Selection misses (no delimiter, oversized record, exhausted attempts) are not
/// errors; `FortunePicker::pick` reports them as `Ok(None)`.
#[derive(Debug, Error)]
pub enum FortuneError {
    /// Unexpected filesystem failure.
    #[error(transparent)]
    Io(#[from] io::Error),
    /// Invalid argument or setting.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// The external generator could not run or failed.
    #[error("image generator '{model_id}' failed: {reason}")]
    Generator {
        /// Model the generator was configured with.
        model_id: ModelId,
        /// What went wrong.
        reason: String,
    },
    /// Generator output is not a well-formed PNG stream.
    #[error("invalid PNG data: {0}")]
    InvalidImage(String),
}
