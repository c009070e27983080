//! Audio subsystem
//!
//! Decoding (WAV, MP3) to 16-bit PCM, format conversion to the device
//! format and the output device abstraction.

pub mod convert;
pub mod decoder;
pub mod mixer;
pub mod output;
pub mod types;

#[cfg(feature = "hardware-audio")]
pub mod cpal_output;

pub use convert::{convert, convert_buffer};
pub use decoder::{AudioKind, SimpleDecoder};
pub use output::{AudioOutput, PlaybackRecord, PlayerGuard, PlayerHandle, SimulatedOutput};
pub use types::{PcmBuffer, PcmFormat};

#[cfg(feature = "hardware-audio")]
pub use cpal_output::CpalOutput;
