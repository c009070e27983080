//! Motor wiring on a Linux GPIO character device

use crate::error::MotorError;
use crate::motor::HBridgeMotor;
use linux_embedded_hal::gpio_cdev::{Chip, LineRequestFlags};
use linux_embedded_hal::CdevPin;
use tracing::info;

const CONSUMER: &str = "fish-player";

/// GPIO offsets of one H-bridge channel
#[derive(Debug, Clone, Copy)]
pub struct MotorPins {
    pub enable: u32,
    pub dir1: u32,
    pub dir2: u32,
}

/// Mouth/head motor
pub const HEAD_PINS: MotorPins = MotorPins {
    enable: 5,
    dir1: 13,
    dir2: 6,
};

/// Body/tail motor
pub const BODY_PINS: MotorPins = MotorPins {
    enable: 12,
    dir1: 26,
    dir2: 19,
};

pub type CdevMotor = HBridgeMotor<CdevPin>;

/// Request both motors' lines from `chip_name` (`gpiochip0` or a full `/dev` path)
pub fn open_motors(chip_name: &str) -> Result<(CdevMotor, CdevMotor), MotorError> {
    let path = if chip_name.starts_with('/') {
        chip_name.to_string()
    } else {
        format!("/dev/{}", chip_name)
    };

    let mut chip =
        Chip::new(&path).map_err(|e| MotorError::Setup(format!("open {}: {}", path, e)))?;

    let head = open_motor(&mut chip, "head", HEAD_PINS)?;
    let body = open_motor(&mut chip, "body", BODY_PINS)?;

    info!(chip = %path, "GPIO motors initialised");
    Ok((head, body))
}

fn open_motor(chip: &mut Chip, name: &'static str, pins: MotorPins) -> Result<CdevMotor, MotorError> {
    Ok(HBridgeMotor::new(
        name,
        output_line(chip, pins.enable)?,
        output_line(chip, pins.dir1)?,
        output_line(chip, pins.dir2)?,
    ))
}

fn output_line(chip: &mut Chip, offset: u32) -> Result<CdevPin, MotorError> {
    let handle = chip
        .get_line(offset)
        .and_then(|line| line.request(LineRequestFlags::OUTPUT, 0, CONSUMER))
        .map_err(|e| MotorError::Setup(format!("request GPIO{}: {}", offset, e)))?;

    CdevPin::new(handle).map_err(|e| MotorError::Setup(format!("GPIO{}: {}", offset, e)))
}
