//! Motor stand-in for machines without the H-bridge wiring
//!
//! Commands are logged and recorded into a [`MotorProbe`] that tests (and
//! the simulated binary) can inspect after the motor itself has been handed
//! to the device.

use crate::error::MotorError;
use crate::motor::{MotorCommand, MotorDriver, MotorState};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

#[derive(Debug, Default)]
struct ProbeState {
    commands: Vec<MotorCommand>,
    state: MotorState,
    /// Remaining writes that should fail
    failures: usize,
}

/// Shared view of a [`MockMotor`]
#[derive(Debug, Clone, Default)]
pub struct MotorProbe {
    inner: Arc<Mutex<ProbeState>>,
}

impl MotorProbe {
    /// Every command that reached the motor, including failed ones
    pub fn commands(&self) -> Vec<MotorCommand> {
        self.lock().commands.clone()
    }

    pub fn state(&self) -> MotorState {
        self.lock().state
    }

    /// Number of times `command` was issued
    pub fn count(&self, command: MotorCommand) -> usize {
        self.lock().commands.iter().filter(|&&c| c == command).count()
    }

    /// Make the next `n` commands fail
    pub fn fail_next(&self, n: usize) {
        self.lock().failures = n;
    }

    fn lock(&self) -> MutexGuard<'_, ProbeState> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }
}

/// Motor that only records what it is told
#[derive(Debug)]
pub struct MockMotor {
    name: &'static str,
    probe: MotorProbe,
}

impl MockMotor {
    pub fn new(name: &'static str) -> (Self, MotorProbe) {
        let probe = MotorProbe::default();
        (
            Self {
                name,
                probe: probe.clone(),
            },
            probe,
        )
    }

    fn record(&mut self, command: MotorCommand) -> Result<(), MotorError> {
        let mut inner = self.probe.lock();
        inner.commands.push(command);

        if inner.failures > 0 {
            inner.failures -= 1;
            return Err(MotorError::Line {
                line: "enable",
                reason: "injected failure".to_string(),
            });
        }

        inner.state = command.target_state();
        debug!(motor = self.name, state = %inner.state, "Mock motor");
        Ok(())
    }
}

impl MotorDriver for MockMotor {
    fn forward(&mut self) -> Result<(), MotorError> {
        self.record(MotorCommand::Forward)
    }

    fn reverse(&mut self) -> Result<(), MotorError> {
        self.record(MotorCommand::Reverse)
    }

    fn stop(&mut self) -> Result<(), MotorError> {
        self.record(MotorCommand::Stop)
    }

    fn state(&self) -> MotorState {
        self.probe.state()
    }
}
