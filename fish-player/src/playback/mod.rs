//! Animated playback
//!
//! [`PlaybackController`] plays a PCM buffer on the fish's audio output while
//! [`AmplitudeAnimator`] moves the mouth in step with the buffer's loudness.

pub mod animator;
pub mod controller;

pub use animator::{AmplitudeAnimator, AnimationReport, MouthTransition};
pub use controller::{PlaybackController, PlaybackReport};
