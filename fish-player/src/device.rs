//! The fish as a whole: two motors and one audio output
//!
//! All physical actions go through [`FishDevice::lock`]. Whoever holds the
//! guard owns both motors; the audio output is shared and re-entrant.

use crate::audio::output::{AudioOutput, SimulatedOutput};
use crate::error::MotorError;
use crate::motor::{MockMotor, MotorDriver, MotorProbe, MotorState};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard, OwnedMutexGuard};
use tracing::{info, warn};

/// Head (mouth) and body (body/tail) motors
pub struct Actuators {
    head: Box<dyn MotorDriver>,
    body: Box<dyn MotorDriver>,
}

impl Actuators {
    pub fn new(head: Box<dyn MotorDriver>, body: Box<dyn MotorDriver>) -> Self {
        Self { head, body }
    }

    pub fn open_mouth(&mut self) -> Result<(), MotorError> {
        self.head.forward()
    }

    pub fn close_mouth(&mut self) -> Result<(), MotorError> {
        self.head.reverse()
    }

    pub fn stop_mouth(&mut self) -> Result<(), MotorError> {
        self.head.stop()
    }

    pub fn raise_body(&mut self) -> Result<(), MotorError> {
        self.body.forward()
    }

    pub fn raise_tail(&mut self) -> Result<(), MotorError> {
        self.body.reverse()
    }

    pub fn stop_body(&mut self) -> Result<(), MotorError> {
        self.body.stop()
    }

    pub fn mouth_state(&self) -> MotorState {
        self.head.state()
    }

    pub fn body_state(&self) -> MotorState {
        self.body.state()
    }

    /// Stop both motors, logging failures
    pub fn stop_all(&mut self) {
        if let Err(e) = self.stop_mouth() {
            warn!("Failed to stop mouth motor: {}", e);
        }
        if let Err(e) = self.stop_body() {
            warn!("Failed to stop body motor: {}", e);
        }
    }
}

/// Motor probes of a simulated fish
#[derive(Debug, Clone)]
pub struct SimulatedProbes {
    pub head: MotorProbe,
    pub body: MotorProbe,
}

/// Aggregate root owning the motors and the shared audio output
#[derive(Clone)]
pub struct FishDevice {
    actuators: Arc<Mutex<Actuators>>,
    output: Arc<dyn AudioOutput>,
}

impl FishDevice {
    pub fn new(actuators: Actuators, output: Arc<dyn AudioOutput>) -> Self {
        Self {
            actuators: Arc::new(Mutex::new(actuators)),
            output,
        }
    }

    /// Fish with mock motors and the given output
    pub fn simulated(output: Arc<dyn AudioOutput>) -> (Self, SimulatedProbes) {
        let (head, head_probe) = MockMotor::new("head");
        let (body, body_probe) = MockMotor::new("body");
        let device = Self::new(Actuators::new(Box::new(head), Box::new(body)), output);
        (
            device,
            SimulatedProbes {
                head: head_probe,
                body: body_probe,
            },
        )
    }

    /// Fish with mock motors and a [`SimulatedOutput`]
    pub fn simulated_default() -> (Self, SimulatedProbes, SimulatedOutput) {
        let output = SimulatedOutput::new();
        let (device, probes) = Self::simulated(Arc::new(output.clone()));
        (device, probes, output)
    }

    /// Exclusive access to the motors
    pub async fn lock(&self) -> MutexGuard<'_, Actuators> {
        self.actuators.lock().await
    }

    /// Exclusive access that can move into a spawned task
    pub async fn lock_owned(&self) -> OwnedMutexGuard<Actuators> {
        Arc::clone(&self.actuators).lock_owned().await
    }

    pub fn output(&self) -> &Arc<dyn AudioOutput> {
        &self.output
    }

    /// Stop both motors. Waits for any running performance to release the lock.
    pub async fn close(&self) {
        let mut actuators = self.lock().await;
        actuators.stop_all();
        info!("Fish device closed, motors stopped");
    }
}
