#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

/// Command-line entry points shared by the binaries.
pub mod apps;
/// Fortune-to-image generation loop.
pub mod canvas;
/// Picker and generation loop configuration types.
pub mod config;
/// Centralized constants used across the picker, loop, and PNG encoder.
pub mod constants;
/// Virtual concatenation of fortune database files.
pub mod corpus;
/// External image generators.
pub mod generator;
/// Byte-weighted fortune selection.
pub mod picker;
/// PNG text metadata helpers.
pub mod png;
/// Fortune record delimiter protocol.
pub mod record;
/// Input transports used by the picker (filesystem today).
pub mod transport;
/// Shared type aliases.
pub mod types;

mod errors;

pub use canvas::{Canvas, StepOutcome};
pub use config::{CanvasConfig, PickerConfig};
pub use corpus::{CorpusLayout, CorpusSpan};
pub use errors::FortuneError;
pub use generator::{CommandGenerator, ImageGenerator};
pub use picker::{FortunePicker, PickedFortune};
pub use types::{FortuneText, MetaKeyword, MetaText, ModelId};
