//! Playback with concurrent mouth animation
//!
//! The controller holds the device lock for the whole playback, so at most one
//! animated playback runs per fish. The lock guard moves into the animation
//! task and comes back when that task is joined.
//!
//! Exit paths:
//! - player finishes: close the player, give the animation up to 2 s to wrap
//!   up, then cancel it and join anyway
//! - player still busy after `duration + 5 s`: cancel and join the animation,
//!   close the player, return [`Error::PlaybackTimeout`]
//!
//! The player handle is closed on every path by [`PlayerGuard`].

use crate::audio::convert::convert_buffer;
use crate::audio::output::{ensure_format, PlayerGuard};
use crate::audio::types::PcmBuffer;
use crate::device::FishDevice;
use crate::error::{Error, Result};
use crate::playback::animator::{AmplitudeAnimator, AnimationReport};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// How often the player is asked whether it is still playing
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Slack on top of the expected duration before playback counts as stuck
pub const TIMEOUT_MARGIN: Duration = Duration::from_secs(5);

/// Time the animation gets to finish after the audio has ended
pub const ANIMATION_GRACE: Duration = Duration::from_secs(2);

/// Outcome of a completed playback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackReport {
    pub duration: Duration,
    /// None when the animation task panicked
    pub animation: Option<AnimationReport>,
}

#[derive(Debug, Clone)]
pub struct PlaybackController {
    animator: AmplitudeAnimator,
    poll_interval: Duration,
    timeout_margin: Duration,
    animation_grace: Duration,
}

impl Default for PlaybackController {
    fn default() -> Self {
        Self {
            animator: AmplitudeAnimator::default(),
            poll_interval: POLL_INTERVAL,
            timeout_margin: TIMEOUT_MARGIN,
            animation_grace: ANIMATION_GRACE,
        }
    }
}

impl PlaybackController {
    pub fn new(animator: AmplitudeAnimator) -> Self {
        Self {
            animator,
            ..Self::default()
        }
    }

    /// Play `buffer` on the fish's output while animating its mouth.
    ///
    /// The buffer is converted to the output format first when needed. An
    /// output whose channel layout the buffer cannot be converted to fails
    /// before the device is locked.
    pub async fn play_with_animation(
        &self,
        device: &FishDevice,
        buffer: PcmBuffer,
    ) -> Result<PlaybackReport> {
        let output = device.output();
        let target = output.format();
        let buffer = if buffer.format() == target {
            buffer
        } else {
            convert_buffer(&buffer, target)
        };
        ensure_format(target, &buffer)?;

        let duration = buffer.duration();
        let timeout = duration + self.timeout_margin;

        let actuators = device.lock_owned().await;
        debug!(?duration, ?timeout, "Device locked for playback");

        let mut player = PlayerGuard::new(output.new_player(&buffer)?);
        player.play();

        let cancel = CancellationToken::new();
        let animator = self.animator.clone();
        let token = cancel.clone();
        let analysis = buffer.clone();
        let mut animation = tokio::spawn(async move {
            let mut actuators = actuators;
            let report = animator.run(&analysis, &mut actuators, &token).await;
            (actuators, report)
        });

        let poll_interval = self.poll_interval;
        let finished = tokio::time::timeout(timeout, async {
            let mut ticker = tokio::time::interval(poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if !player.is_playing() {
                    break;
                }
            }
        })
        .await;

        if finished.is_err() {
            warn!(?timeout, "Playback did not finish in time, stopping");
            cancel.cancel();
            drop(player);
            if let Err(e) = animation.await {
                error!("Animation task failed: {}", e);
            }
            return Err(Error::PlaybackTimeout { timeout });
        }

        drop(player);

        let joined = match tokio::time::timeout(self.animation_grace, &mut animation).await {
            Ok(joined) => joined,
            Err(_) => {
                warn!(
                    grace = ?self.animation_grace,
                    "Animation took too long to finish, cancelling"
                );
                cancel.cancel();
                animation.await
            }
        };

        let animation = match joined {
            Ok((_actuators, report)) => Some(report),
            Err(e) => {
                error!("Animation task failed: {}", e);
                None
            }
        };

        info!(?duration, "Playback finished");
        Ok(PlaybackReport {
            duration,
            animation,
        })
    }
}
