//! DC motor control
//!
//! Both fish motors sit behind an H-bridge: two direction lines and one
//! enable line. Forward, reverse and stop are the only legal operations.
//! Drivers are not synchronised themselves; [`crate::device::FishDevice`]
//! serialises all access through its lock.

pub mod hbridge;
pub mod mock;

#[cfg(feature = "gpio")]
pub mod cdev;

use crate::error::MotorError;
use std::fmt;

pub use hbridge::HBridgeMotor;
pub use mock::{MockMotor, MotorProbe};

/// Last commanded state of a motor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MotorState {
    #[default]
    Stopped,
    Forward,
    Reverse,
}

impl fmt::Display for MotorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MotorState::Stopped => write!(f, "stopped"),
            MotorState::Forward => write!(f, "forward"),
            MotorState::Reverse => write!(f, "reverse"),
        }
    }
}

/// A single motor command, as issued to a driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotorCommand {
    Forward,
    Reverse,
    Stop,
}

impl MotorCommand {
    /// State the motor is in once the command succeeded
    pub fn target_state(self) -> MotorState {
        match self {
            MotorCommand::Forward => MotorState::Forward,
            MotorCommand::Reverse => MotorState::Reverse,
            MotorCommand::Stop => MotorState::Stopped,
        }
    }
}

/// An H-bridge driven DC motor
pub trait MotorDriver: Send {
    fn forward(&mut self) -> Result<(), MotorError>;
    fn reverse(&mut self) -> Result<(), MotorError>;
    fn stop(&mut self) -> Result<(), MotorError>;

    /// Last successfully commanded state
    fn state(&self) -> MotorState;

    fn apply(&mut self, command: MotorCommand) -> Result<(), MotorError> {
        match command {
            MotorCommand::Forward => self.forward(),
            MotorCommand::Reverse => self.reverse(),
            MotorCommand::Stop => self.stop(),
        }
    }
}

impl<M: MotorDriver + ?Sized> MotorDriver for Box<M> {
    fn forward(&mut self) -> Result<(), MotorError> {
        (**self).forward()
    }

    fn reverse(&mut self) -> Result<(), MotorError> {
        (**self).reverse()
    }

    fn stop(&mut self) -> Result<(), MotorError> {
        (**self).stop()
    }

    fn state(&self) -> MotorState {
        (**self).state()
    }
}
