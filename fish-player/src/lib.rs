//! # Fish Player Library (fish-player)
//!
//! Audio playback and motor animation for the animatronic fish.
//!
//! **Purpose:** Decode sound files and synthesized speech, play them on the
//! shared audio output and move the fish's mouth with the audio's loudness.
//! Periodic performance cycles add body and tail movement around the audio.
//!
//! **Architecture:** symphonia/hound decoding, linear-interpolation format
//! conversion, a cpal (or simulated) output, H-bridge motors over
//! embedded-hal, all coordinated on tokio.

pub mod audio;
pub mod config;
pub mod device;
pub mod error;
pub mod motor;
pub mod playback;
pub mod show;
pub mod speech;

pub use device::{Actuators, FishDevice};
pub use error::{Error, MotorError, Result};
pub use playback::PlaybackController;
pub use show::{ContentPicker, PerformanceCycle, Performer};
pub use speech::{PiperClient, SpeechSynthesizer};
