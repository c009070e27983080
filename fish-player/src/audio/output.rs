//! Audio output abstraction
//!
//! One output device is opened per process and shared by all playback.
//! Each playback gets its own [`PlayerHandle`]; the controller starts it,
//! polls it until it finishes and closes it.
//!
//! Two backends exist:
//! - [`SimulatedOutput`]: no sound, a player reports "playing" for exactly the
//!   buffer's duration (tokio clock, so paused-time tests run instantly)
//! - `CpalOutput` (feature `hardware-audio`): real device through cpal

use crate::audio::types::{PcmBuffer, PcmFormat, OUTPUT_CHANNELS, OUTPUT_SAMPLE_RATE};
use crate::error::{Error, Result};
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Shared output device
pub trait AudioOutput: Send + Sync {
    /// Format every player on this output expects
    fn format(&self) -> PcmFormat;

    /// Create a player for a buffer already in [`AudioOutput::format`]
    fn new_player(&self, buffer: &PcmBuffer) -> Result<Box<dyn PlayerHandle>>;
}

/// One in-flight playback on an [`AudioOutput`]
pub trait PlayerHandle: Send + Sync {
    fn play(&mut self);
    fn is_playing(&self) -> bool;
    fn close(&mut self);
}

impl<T: AudioOutput + ?Sized> AudioOutput for Arc<T> {
    fn format(&self) -> PcmFormat {
        (**self).format()
    }

    fn new_player(&self, buffer: &PcmBuffer) -> Result<Box<dyn PlayerHandle>> {
        (**self).new_player(buffer)
    }
}

/// Reject a buffer the output cannot play as is.
///
/// Rates are converted upstream, but channel layouts other than mono to
/// stereo pass through conversion unchanged and end up here.
pub fn ensure_format(expected: PcmFormat, buffer: &PcmBuffer) -> Result<()> {
    let actual = buffer.format();
    if actual == expected {
        return Ok(());
    }
    Err(Error::AudioOutput(format!(
        "Buffer is {}Hz/{}ch but the output runs at {}Hz/{}ch",
        actual.sample_rate, actual.channels, expected.sample_rate, expected.channels
    )))
}

/// Sample encodings an output stream can be fed in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamSampleFormat {
    I16,
    F32,
}

/// One supported configuration range reported by a device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamFormatRange {
    pub channels: u16,
    pub min_rate: u32,
    pub max_rate: u32,
    pub sample_format: StreamSampleFormat,
}

/// Pick the stream configuration: index into `ranges` and the sample rate.
///
/// Only stereo ranges qualify, since decoded audio can only be brought to
/// stereo. 44.1 kHz is preferred, otherwise the supported rate closest to it;
/// i16 wins over f32 at the same rate. None when the device has no stereo range.
pub fn choose_stream_format(ranges: &[StreamFormatRange]) -> Option<(usize, u32)> {
    ranges
        .iter()
        .enumerate()
        .filter(|(_, range)| range.channels == OUTPUT_CHANNELS && range.min_rate <= range.max_rate)
        .map(|(index, range)| {
            let rate = OUTPUT_SAMPLE_RATE.clamp(range.min_rate, range.max_rate);
            let prefers_f32 = range.sample_format == StreamSampleFormat::F32;
            (rate.abs_diff(OUTPUT_SAMPLE_RATE), prefers_f32, index, rate)
        })
        .min()
        .map(|(_, _, index, rate)| (index, rate))
}

/// Closes the wrapped player when dropped
pub struct PlayerGuard(Box<dyn PlayerHandle>);

impl PlayerGuard {
    pub fn new(player: Box<dyn PlayerHandle>) -> Self {
        Self(player)
    }
}

impl Deref for PlayerGuard {
    type Target = dyn PlayerHandle;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

impl DerefMut for PlayerGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.0.as_mut()
    }
}

impl Drop for PlayerGuard {
    fn drop(&mut self) {
        self.0.close();
    }
}

/// What a simulated player was asked to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackRecord {
    pub format: PcmFormat,
    pub bytes: usize,
    pub started: bool,
    pub closed: bool,
}

#[derive(Debug, Default)]
struct SimulatedState {
    records: Mutex<Vec<PlaybackRecord>>,
    active: AtomicUsize,
}

impl SimulatedState {
    fn update(&self, index: usize, f: impl FnOnce(&mut PlaybackRecord)) {
        let mut records = self.records.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(record) = records.get_mut(index) {
            f(record);
        }
    }
}

/// Output that plays nothing but keeps real-time playback semantics
#[derive(Debug, Clone)]
pub struct SimulatedOutput {
    format: PcmFormat,
    /// Players never finish on their own when set
    stuck: bool,
    state: Arc<SimulatedState>,
}

impl SimulatedOutput {
    pub fn new() -> Self {
        Self::with_format(PcmFormat::output())
    }

    pub fn with_format(format: PcmFormat) -> Self {
        Self {
            format,
            stuck: false,
            state: Arc::new(SimulatedState::default()),
        }
    }

    /// Output whose players report "playing" until closed
    pub fn stuck() -> Self {
        Self {
            stuck: true,
            ..Self::new()
        }
    }

    /// Every player created so far, in creation order
    pub fn records(&self) -> Vec<PlaybackRecord> {
        self.state
            .records
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    /// Players created but not yet closed
    pub fn active_players(&self) -> usize {
        self.state.active.load(Ordering::SeqCst)
    }
}

impl Default for SimulatedOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioOutput for SimulatedOutput {
    fn format(&self) -> PcmFormat {
        self.format
    }

    fn new_player(&self, buffer: &PcmBuffer) -> Result<Box<dyn PlayerHandle>> {
        ensure_format(self.format, buffer)?;

        let index = {
            let mut records = self.state.records.lock().unwrap_or_else(|p| p.into_inner());
            records.push(PlaybackRecord {
                format: buffer.format(),
                bytes: buffer.bytes().len(),
                started: false,
                closed: false,
            });
            records.len() - 1
        };
        self.state.active.fetch_add(1, Ordering::SeqCst);

        debug!(
            "Simulated player #{} for {:?} of audio",
            index,
            buffer.duration()
        );

        Ok(Box::new(SimulatedPlayer {
            index,
            duration: buffer.duration(),
            stuck: self.stuck,
            started_at: None,
            closed: false,
            state: Arc::clone(&self.state),
        }))
    }
}

struct SimulatedPlayer {
    index: usize,
    duration: Duration,
    stuck: bool,
    started_at: Option<Instant>,
    closed: bool,
    state: Arc<SimulatedState>,
}

impl PlayerHandle for SimulatedPlayer {
    fn play(&mut self) {
        if self.closed || self.started_at.is_some() {
            return;
        }
        self.started_at = Some(Instant::now());
        self.state.update(self.index, |r| r.started = true);
    }

    fn is_playing(&self) -> bool {
        match self.started_at {
            Some(_) if self.closed => false,
            Some(_) if self.stuck => true,
            Some(start) => Instant::now() < start + self.duration,
            None => false,
        }
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.state.active.fetch_sub(1, Ordering::SeqCst);
        self.state.update(self.index, |r| r.closed = true);
    }
}
