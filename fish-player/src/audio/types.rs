//! Core audio data types
//!
//! All audio inside the player is signed 16-bit little-endian linear PCM,
//! interleaved by channel: `[L, R, L, R, ...]` for stereo.

use std::sync::Arc;
use std::time::Duration;

/// Bytes per PCM sample (16-bit)
pub const BYTES_PER_SAMPLE: usize = 2;

/// Sample rate the output device runs at
pub const OUTPUT_SAMPLE_RATE: u32 = 44100;

/// Channel count the output device runs at
pub const OUTPUT_CHANNELS: u16 = 2;

/// Sample rate and channel layout of a PCM stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PcmFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl PcmFormat {
    pub const fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }

    /// Format of the shared output device (44.1 kHz stereo)
    pub const fn output() -> Self {
        Self::new(OUTPUT_SAMPLE_RATE, OUTPUT_CHANNELS)
    }

    /// Bytes in one frame (one sample per channel)
    pub fn frame_bytes(&self) -> usize {
        BYTES_PER_SAMPLE * self.channels as usize
    }
}

/// Decoded PCM audio ready for conversion or playback.
///
/// The byte buffer is reference counted so playback and amplitude analysis
/// can read it independently without copying.
#[derive(Debug, Clone)]
pub struct PcmBuffer {
    data: Arc<[u8]>,
    format: PcmFormat,
}

impl PcmBuffer {
    pub fn new(data: impl Into<Arc<[u8]>>, format: PcmFormat) -> Self {
        Self {
            data: data.into(),
            format,
        }
    }

    /// Build a buffer from interleaved samples
    pub fn from_samples(samples: &[i16], format: PcmFormat) -> Self {
        Self::new(samples_to_bytes(samples), format)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn format(&self) -> PcmFormat {
        self.format
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of whole frames in the buffer
    pub fn frames(&self) -> usize {
        match self.format.frame_bytes() {
            0 => 0,
            frame_bytes => self.data.len() / frame_bytes,
        }
    }

    /// Playback duration at the buffer's own sample rate
    pub fn duration(&self) -> Duration {
        if self.format.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames() as f64 / self.format.sample_rate as f64)
    }

    /// Interleaved samples decoded from the byte buffer
    pub fn samples(&self) -> Vec<i16> {
        bytes_to_samples(&self.data)
    }
}

/// Decode little-endian 16-bit samples; a trailing odd byte is ignored
pub fn bytes_to_samples(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(BYTES_PER_SAMPLE)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

/// Encode samples as little-endian 16-bit bytes
pub fn samples_to_bytes(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}
