//! H-bridge driver over `embedded_hal::digital::OutputPin` (v1.0)
//!
//! Every command writes dir1, dir2 and only then enable, so enable is never
//! asserted while the direction lines are still changing.

use crate::error::MotorError;
use crate::motor::{MotorDriver, MotorState};
use embedded_hal::digital::{Error as _, OutputPin, PinState};
use tracing::trace;

/// Motor driven by three GPIO output lines
pub struct HBridgeMotor<P: OutputPin> {
    name: &'static str,
    enable: P,
    dir1: P,
    dir2: P,
    state: MotorState,
}

impl<P: OutputPin> HBridgeMotor<P> {
    /// Take ownership of the three lines. The motor is assumed stopped until
    /// the first command; call [`MotorDriver::stop`] to force the lines low.
    pub fn new(name: &'static str, enable: P, dir1: P, dir2: P) -> Self {
        Self {
            name,
            enable,
            dir1,
            dir2,
            state: MotorState::Stopped,
        }
    }

    fn drive(&mut self, dir1: bool, dir2: bool, enable: bool) -> Result<(), MotorError> {
        write_line(&mut self.dir1, "dir1", dir1)?;
        write_line(&mut self.dir2, "dir2", dir2)?;
        write_line(&mut self.enable, "enable", enable)?;
        Ok(())
    }

    fn command(&mut self, target: MotorState) -> Result<(), MotorError> {
        match target {
            MotorState::Forward => self.drive(true, false, true)?,
            MotorState::Reverse => self.drive(false, true, true)?,
            MotorState::Stopped => self.drive(false, false, false)?,
        }

        trace!(motor = self.name, state = %target, "Motor command applied");
        self.state = target;
        Ok(())
    }
}

fn write_line<P: OutputPin>(pin: &mut P, line: &'static str, high: bool) -> Result<(), MotorError> {
    pin.set_state(PinState::from(high))
        .map_err(|e| MotorError::Line {
            line,
            reason: format!("{:?}", e.kind()),
        })
}

impl<P: OutputPin + Send> MotorDriver for HBridgeMotor<P> {
    fn forward(&mut self) -> Result<(), MotorError> {
        self.command(MotorState::Forward)
    }

    fn reverse(&mut self) -> Result<(), MotorError> {
        self.command(MotorState::Reverse)
    }

    fn stop(&mut self) -> Result<(), MotorError> {
        self.command(MotorState::Stopped)
    }

    fn state(&self) -> MotorState {
        self.state
    }
}
