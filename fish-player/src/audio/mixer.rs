//! Voice mixer for the shared output stream
//!
//! Every player created on the hardware output becomes a voice. The device
//! callback sums all playing voices into one interleaved i16 buffer.
//! Finished and closed voices are dropped from the mix on the next fill.

use crate::audio::output::PlayerHandle;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

const VOICE_IDLE: u8 = 0;
const VOICE_PLAYING: u8 = 1;
const VOICE_DONE: u8 = 2;

#[derive(Debug)]
struct Voice {
    samples: Vec<i16>,
    cursor: AtomicUsize,
    state: AtomicU8,
}

impl Voice {
    fn state(&self) -> u8 {
        self.state.load(Ordering::Acquire)
    }
}

/// Sums active voices into the output stream
#[derive(Debug, Clone, Default)]
pub struct Mixer {
    voices: Arc<Mutex<Vec<Arc<Voice>>>>,
}

impl Mixer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register interleaved samples as a new, not yet started voice
    pub fn add_voice(&self, samples: Vec<i16>) -> MixerPlayer {
        let voice = Arc::new(Voice {
            samples,
            cursor: AtomicUsize::new(0),
            state: AtomicU8::new(VOICE_IDLE),
        });
        self.lock().push(Arc::clone(&voice));

        MixerPlayer {
            voice,
            mixer: self.clone(),
        }
    }

    /// Number of voices still attached to the mix
    pub fn voice_count(&self) -> usize {
        self.lock().len()
    }

    /// Fill `out` with the sum of all playing voices, silence when none are playing
    pub fn fill(&self, out: &mut [i16]) {
        out.fill(0);

        let mut voices = self.lock();
        for voice in voices.iter() {
            if voice.state() != VOICE_PLAYING {
                continue;
            }

            let start = voice.cursor.load(Ordering::Acquire);
            let remaining = voice.samples.len().saturating_sub(start);
            let count = remaining.min(out.len());

            for (dst, &src) in out.iter_mut().zip(&voice.samples[start..start + count]) {
                *dst = dst.saturating_add(src);
            }

            voice.cursor.store(start + count, Ordering::Release);
            if start + count >= voice.samples.len() {
                voice.state.store(VOICE_DONE, Ordering::Release);
            }
        }

        voices.retain(|voice| voice.state() != VOICE_DONE);
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Arc<Voice>>> {
        // A panicking callback must not silence every later fill
        self.voices.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Player handle for one mixer voice
#[derive(Debug)]
pub struct MixerPlayer {
    voice: Arc<Voice>,
    mixer: Mixer,
}

impl PlayerHandle for MixerPlayer {
    fn play(&mut self) {
        let _ = self.voice.state.compare_exchange(
            VOICE_IDLE,
            VOICE_PLAYING,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    fn is_playing(&self) -> bool {
        self.voice.state() == VOICE_PLAYING
    }

    fn close(&mut self) {
        self.voice.state.store(VOICE_DONE, Ordering::Release);
        self.mixer
            .lock()
            .retain(|voice| !Arc::ptr_eq(voice, &self.voice));
    }
}
