//! Amplitude-driven mouth animation
//!
//! The PCM buffer is walked in 100 ms windows. For each full window the mean
//! absolute sample value (all channels) is compared with a threshold: above
//! it the mouth opens, at or below it the mouth closes. A motor is only
//! commanded when the wanted mouth state differs from the current one.
//!
//! Windows are paced by an interval anchored at the start of the run, so
//! analysis keeps up with playback however long the buffer is. A trailing partial window ends the walk without
//! being evaluated.

use crate::audio::types::{PcmBuffer, PcmFormat, BYTES_PER_SAMPLE};
use crate::device::Actuators;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Length of one analysis window
pub const WINDOW_DURATION: Duration = Duration::from_millis(100);

/// Mean absolute amplitude above which the mouth opens
pub const AMPLITUDE_THRESHOLD: i64 = 1500;

/// Time the closing mouth gets before its motor is released
pub const MOUTH_SETTLE_DELAY: Duration = Duration::from_secs(1);

/// Mouth motor change decided for one window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouthTransition {
    Open,
    Close,
}

/// What one animation run did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnimationReport {
    /// Full windows evaluated
    pub windows: usize,
    pub opens: usize,
    pub closes: usize,
    /// Motor commands that failed (logged and skipped)
    pub motor_errors: usize,
    /// Stopped early by the playback controller
    pub cancelled: bool,
}

/// Frames in one analysis window at `format`'s sample rate
pub fn window_frames(format: PcmFormat, window: Duration) -> usize {
    (format.sample_rate as f64 * window.as_secs_f64()) as usize
}

/// Mean absolute value of the 16-bit samples in `window`, None when it holds none
pub fn average_amplitude(window: &[u8]) -> Option<i64> {
    let mut sum: i64 = 0;
    let mut count: i64 = 0;
    for pair in window.chunks_exact(BYTES_PER_SAMPLE) {
        sum += (i16::from_le_bytes([pair[0], pair[1]]) as i64).abs();
        count += 1;
    }

    if count == 0 {
        None
    } else {
        Some(sum / count)
    }
}

/// Transition for a window given the current mouth state
pub fn decide(average: i64, threshold: i64, mouth_open: bool) -> Option<MouthTransition> {
    if average > threshold && !mouth_open {
        Some(MouthTransition::Open)
    } else if average <= threshold && mouth_open {
        Some(MouthTransition::Close)
    } else {
        None
    }
}

/// Drives the mouth motor from a PCM buffer
#[derive(Debug, Clone)]
pub struct AmplitudeAnimator {
    threshold: i64,
    window: Duration,
    settle: Duration,
}

impl Default for AmplitudeAnimator {
    fn default() -> Self {
        Self {
            threshold: AMPLITUDE_THRESHOLD,
            window: WINDOW_DURATION,
            settle: MOUTH_SETTLE_DELAY,
        }
    }
}

impl AmplitudeAnimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Byte length of one window for `format` (whole frames only)
    pub fn window_bytes(&self, format: PcmFormat) -> usize {
        window_frames(format, self.window) * format.frame_bytes()
    }

    /// Transitions the animator would issue for `buffer`, one entry per full window
    pub fn plan(&self, buffer: &PcmBuffer) -> Vec<Option<MouthTransition>> {
        let window_bytes = self.window_bytes(buffer.format());
        if window_bytes == 0 {
            return Vec::new();
        }

        let mut mouth_open = false;
        buffer
            .bytes()
            .chunks_exact(window_bytes)
            .map(|window| {
                let transition = average_amplitude(window)
                    .and_then(|avg| decide(avg, self.threshold, mouth_open));
                if let Some(t) = transition {
                    mouth_open = t == MouthTransition::Open;
                }
                transition
            })
            .collect()
    }

    /// Animate the mouth over `buffer`, then leave both motors stopped.
    ///
    /// Motor failures are logged and counted; they never end the run.
    /// Cancelling `cancel` ends the walk and skips the settle delay, cleanup still runs.
    pub async fn run(
        &self,
        buffer: &PcmBuffer,
        actuators: &mut Actuators,
        cancel: &CancellationToken,
    ) -> AnimationReport {
        let mut report = AnimationReport::default();
        let mut mouth_open = false;
        let window_bytes = self.window_bytes(buffer.format());

        debug!(
            window_bytes,
            threshold = self.threshold,
            total_bytes = buffer.bytes().len(),
            "Starting mouth animation"
        );

        if window_bytes > 0 {
            let mut pacing = tokio::time::interval(self.window);
            pacing.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately
            pacing.tick().await;

            for window in buffer.bytes().chunks_exact(window_bytes) {
                if cancel.is_cancelled() {
                    report.cancelled = true;
                    break;
                }

                report.windows += 1;
                if let Some(average) = average_amplitude(window) {
                    match decide(average, self.threshold, mouth_open) {
                        Some(MouthTransition::Open) => {
                            debug!(average, "Opening mouth");
                            report.opens += 1;
                            log_motor(actuators.open_mouth(), "open mouth", &mut report);
                            mouth_open = true;
                        }
                        Some(MouthTransition::Close) => {
                            debug!(average, "Closing mouth");
                            report.closes += 1;
                            log_motor(actuators.close_mouth(), "close mouth", &mut report);
                            mouth_open = false;
                        }
                        None => {}
                    }
                }

                tokio::select! {
                    _ = cancel.cancelled() => {
                        report.cancelled = true;
                        break;
                    }
                    _ = pacing.tick() => {}
                }
            }
        }

        if mouth_open {
            report.closes += 1;
            log_motor(actuators.close_mouth(), "close mouth", &mut report);
            if !report.cancelled {
                tokio::select! {
                    _ = cancel.cancelled() => report.cancelled = true,
                    _ = tokio::time::sleep(self.settle) => {}
                }
            }
        }
        log_motor(actuators.stop_mouth(), "stop mouth", &mut report);
        log_motor(actuators.stop_body(), "stop body", &mut report);

        debug!(?report, "Mouth animation finished");
        report
    }
}

fn log_motor(
    result: Result<(), crate::error::MotorError>,
    action: &str,
    report: &mut AnimationReport,
) {
    if let Err(e) = result {
        warn!("Failed to {}: {}", action, e);
        report.motor_errors += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::types::samples_to_bytes;
    use crate::device::{FishDevice, SimulatedProbes};
    use crate::error::MotorError;
    use crate::motor::{MockMotor, MotorCommand, MotorDriver, MotorState};

    /// 44.1 kHz stereo buffer of `windows` windows at a constant sample value
    fn constant(value: i16, windows: usize) -> PcmBuffer {
        PcmBuffer::from_samples(&vec![value; 4410 * 2 * windows], PcmFormat::output())
    }

    async fn animate(buffer: &PcmBuffer) -> (AnimationReport, SimulatedProbes) {
        let (device, probes, _) = FishDevice::simulated_default();
        let mut actuators = device.lock().await;
        let report = AmplitudeAnimator::new()
            .run(buffer, &mut actuators, &CancellationToken::new())
            .await;
        (report, probes)
    }

    #[test]
    fn test_window_size() {
        assert_eq!(AmplitudeAnimator::new().window_bytes(PcmFormat::output()), 17640);
        assert_eq!(AmplitudeAnimator::new().window_bytes(PcmFormat::new(22050, 1)), 4410);
        assert_eq!(AmplitudeAnimator::new().window_bytes(PcmFormat::new(5, 1)), 0);
    }

    #[test]
    fn test_average_amplitude() {
        assert_eq!(average_amplitude(&samples_to_bytes(&[100, -300])), Some(200));
        assert_eq!(average_amplitude(&samples_to_bytes(&[i16::MIN])), Some(32768));
        assert_eq!(average_amplitude(&[]), None);
    }

    #[test]
    fn test_threshold_boundary() {
        assert_eq!(decide(1501, 1500, false), Some(MouthTransition::Open));
        assert_eq!(decide(1500, 1500, false), None);
        assert_eq!(decide(1500, 1500, true), Some(MouthTransition::Close));
        assert_eq!(decide(1501, 1500, true), None);
    }

    #[test]
    fn test_plan_only_fires_on_change() {
        let mut samples = vec![2000i16; 4410 * 2 * 2];
        samples.extend(vec![0i16; 4410 * 2]);
        samples.extend(vec![-3000i16; 4410 * 2]);
        let buffer = PcmBuffer::from_samples(&samples, PcmFormat::output());

        assert_eq!(
            AmplitudeAnimator::new().plan(&buffer),
            vec![
                Some(MouthTransition::Open),
                None,
                Some(MouthTransition::Close),
                Some(MouthTransition::Open),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_silence_never_opens() {
        let (report, probes) = animate(&constant(0, 5)).await;

        assert_eq!(report.windows, 5);
        assert_eq!(report.opens, 0);
        assert_eq!(probes.head.count(MotorCommand::Forward), 0);
        assert_eq!(probes.head.state(), MotorState::Stopped);
        assert_eq!(probes.body.state(), MotorState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_loud_buffer_opens_once_and_closes_at_end() {
        let (report, probes) = animate(&constant(2000, 5)).await;

        assert_eq!(report.opens, 1);
        assert_eq!(report.closes, 1);
        assert_eq!(
            probes.head.commands(),
            vec![MotorCommand::Forward, MotorCommand::Reverse, MotorCommand::Stop]
        );
        assert_eq!(probes.head.state(), MotorState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_paces_windows_and_settles() {
        let start = tokio::time::Instant::now();
        animate(&constant(2000, 5)).await;
        // Five windows of 100 ms plus the 1 s settle after closing
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(1500));
        assert!(elapsed < Duration::from_millis(1600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_window_is_not_evaluated() {
        let buffer = PcmBuffer::from_samples(&vec![5000i16; 100], PcmFormat::output());
        let (report, probes) = animate(&buffer).await;

        assert_eq!(report.windows, 0);
        assert_eq!(probes.head.commands(), vec![MotorCommand::Stop]);
        assert_eq!(probes.body.commands(), vec![MotorCommand::Stop]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_motor_failure_does_not_stop_animation() {
        let (device, probes, _) = FishDevice::simulated_default();
        probes.head.fail_next(1);

        let mut actuators = device.lock().await;
        let report = AmplitudeAnimator::new()
            .run(&constant(2000, 3), &mut actuators, &CancellationToken::new())
            .await;

        assert_eq!(report.motor_errors, 1);
        assert_eq!(report.windows, 3);
        // Mouth was believed open, so cleanup still closes and stops it
        assert_eq!(probes.head.count(MotorCommand::Reverse), 1);
        assert_eq!(probes.head.state(), MotorState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_early_and_cleans_up() {
        let (device, probes, _) = FishDevice::simulated_default();
        let cancel = CancellationToken::new();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(250)).await;
            canceller.cancel();
        });

        let start = tokio::time::Instant::now();
        let mut actuators = device.lock().await;
        let report = AmplitudeAnimator::new()
            .run(&constant(2000, 50), &mut actuators, &cancel)
            .await;

        assert!(report.cancelled);
        assert_eq!(report.windows, 3);
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(probes.head.state(), MotorState::Stopped);
        assert_eq!(probes.body.state(), MotorState::Stopped);
    }

    /// Head motor whose direction commands take real time to apply
    struct SlowMotor {
        inner: MockMotor,
        delay: Duration,
    }

    impl MotorDriver for SlowMotor {
        fn forward(&mut self) -> Result<(), MotorError> {
            std::thread::sleep(self.delay);
            self.inner.forward()
        }

        fn reverse(&mut self) -> Result<(), MotorError> {
            std::thread::sleep(self.delay);
            self.inner.reverse()
        }

        fn stop(&mut self) -> Result<(), MotorError> {
            self.inner.stop()
        }

        fn state(&self) -> MotorState {
            self.inner.state()
        }
    }

    #[tokio::test]
    async fn test_motor_latency_does_not_stretch_pacing() {
        let (head, probe) = MockMotor::new("head");
        let (body, _) = MockMotor::new("body");
        let slow = SlowMotor {
            inner: head,
            delay: Duration::from_millis(20),
        };
        let mut actuators = Actuators::new(Box::new(slow), Box::new(body));

        // Loud and quiet windows alternate, so every window commands the motor
        let mut samples = Vec::new();
        for i in 0..10 {
            let value = if i % 2 == 0 { 4000i16 } else { 0 };
            samples.extend(vec![value; 4410 * 2]);
        }
        let buffer = PcmBuffer::from_samples(&samples, PcmFormat::output());

        let start = std::time::Instant::now();
        let report = AmplitudeAnimator::new()
            .run(&buffer, &mut actuators, &CancellationToken::new())
            .await;
        let elapsed = start.elapsed();

        assert_eq!(report.windows, 10);
        assert_eq!(probe.count(MotorCommand::Forward), 5);
        assert_eq!(probe.count(MotorCommand::Reverse), 5);
        // Ten 100 ms windows; 20 ms per command must not add up to 1.2 s
        assert!(elapsed >= Duration::from_millis(950), "took {:?}", elapsed);
        assert!(elapsed < Duration::from_millis(1150), "took {:?}", elapsed);
    }
}
