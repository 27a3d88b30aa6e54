//! Step/direction outputs.
//!
//! Generic over embedded-hal 1.0 pin types.

use embedded_hal::digital::OutputPin;

use crate::config::MotorConstraints;
use crate::error::MotorError;

/// Direction of motor motion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// Positive step count.
    Forward,
    /// Negative step count.
    Reverse,
}

impl Direction {
    /// Get direction from signed step count.
    #[inline]
    pub fn from_steps(steps: i32) -> Self {
        if steps >= 0 {
            Direction::Forward
        } else {
            Direction::Reverse
        }
    }

    /// Get the sign multiplier.
    #[inline]
    pub fn sign(self) -> i32 {
        match self {
            Direction::Forward => 1,
            Direction::Reverse => -1,
        }
    }
}

/// Hardware the step generator drives.
///
/// Called from the tick context: implementations must not block.
pub trait StepOutput {
    /// Set the direction line of a motor.
    fn set_direction(&mut self, motor: usize, direction: Direction) -> Result<(), MotorError>;

    /// Raise the step line of a motor.
    fn step_high(&mut self, motor: usize) -> Result<(), MotorError>;

    /// Lower the step line of a motor.
    fn step_low(&mut self, motor: usize) -> Result<(), MotorError>;
}

/// STEP and DIR pins of one driver.
pub struct MotorPins<STEP, DIR>
where
    STEP: OutputPin,
    DIR: OutputPin,
{
    /// STEP pin (pulse to move one step).
    step_pin: STEP,

    /// DIR pin (high = forward, or inverted).
    dir_pin: DIR,

    /// Whether direction pin logic is inverted.
    invert_direction: bool,

    /// Current direction (cached to avoid unnecessary pin writes).
    current_direction: Option<Direction>,
}

impl<STEP, DIR> MotorPins<STEP, DIR>
where
    STEP: OutputPin,
    DIR: OutputPin,
{
    /// Wrap a driver's pins.
    pub fn new(step_pin: STEP, dir_pin: DIR, invert_direction: bool) -> Self {
        Self {
            step_pin,
            dir_pin,
            invert_direction,
            current_direction: None,
        }
    }

    /// Wrap a driver's pins with the direction polarity configured for
    /// `motor`.
    pub fn for_motor(step_pin: STEP, dir_pin: DIR, motor: &MotorConstraints) -> Self {
        Self::new(step_pin, dir_pin, motor.invert_direction)
    }

    /// Whether DIR is driven low for forward motion.
    #[inline]
    pub fn is_inverted(&self) -> bool {
        self.invert_direction
    }

    /// Release the pins.
    pub fn release(self) -> (STEP, DIR) {
        (self.step_pin, self.dir_pin)
    }

    fn set_direction(&mut self, direction: Direction) -> Result<(), MotorError> {
        if self.current_direction == Some(direction) {
            return Ok(());
        }

        let pin_high = match direction {
            Direction::Forward => !self.invert_direction,
            Direction::Reverse => self.invert_direction,
        };

        if pin_high {
            self.dir_pin.set_high().map_err(|_| MotorError::PinError)?;
        } else {
            self.dir_pin.set_low().map_err(|_| MotorError::PinError)?;
        }

        self.current_direction = Some(direction);
        Ok(())
    }
}

/// A bank of identical step/direction drivers.
pub struct PinBank<STEP, DIR, const N: usize>
where
    STEP: OutputPin,
    DIR: OutputPin,
{
    motors: [MotorPins<STEP, DIR>; N],
}

impl<STEP, DIR, const N: usize> PinBank<STEP, DIR, N>
where
    STEP: OutputPin,
    DIR: OutputPin,
{
    /// Build a bank from per-motor pins, in motor order.
    pub fn new(motors: [MotorPins<STEP, DIR>; N]) -> Self {
        Self { motors }
    }

    /// Build a bank from raw STEP/DIR pairs in motor order, taking each
    /// motor's direction polarity from `motors`.
    ///
    /// # Errors
    ///
    /// Returns `MotorError::InvalidMotor` with the first index that has
    /// pins but no configured motor, or a configured motor but no pins.
    pub fn from_constraints(
        pins: [(STEP, DIR); N],
        motors: &[MotorConstraints],
    ) -> Result<Self, MotorError> {
        if motors.len() != N {
            return Err(MotorError::InvalidMotor(motors.len().min(N)));
        }
        let mut index = 0;
        let bank = pins.map(|(step, dir)| {
            let pins = MotorPins::for_motor(step, dir, &motors[index]);
            index += 1;
            pins
        });
        Ok(Self { motors: bank })
    }

    /// Release the pins.
    pub fn release(self) -> [MotorPins<STEP, DIR>; N] {
        self.motors
    }

    fn motor(&mut self, motor: usize) -> Result<&mut MotorPins<STEP, DIR>, MotorError> {
        self.motors.get_mut(motor).ok_or(MotorError::InvalidMotor(motor))
    }
}

impl<STEP, DIR, const N: usize> StepOutput for PinBank<STEP, DIR, N>
where
    STEP: OutputPin,
    DIR: OutputPin,
{
    fn set_direction(&mut self, motor: usize, direction: Direction) -> Result<(), MotorError> {
        self.motor(motor)?.set_direction(direction)
    }

    fn step_high(&mut self, motor: usize) -> Result<(), MotorError> {
        self.motor(motor)?
            .step_pin
            .set_high()
            .map_err(|_| MotorError::PinError)
    }

    fn step_low(&mut self, motor: usize) -> Result<(), MotorError> {
        self.motor(motor)?
            .step_pin
            .set_low()
            .map_err(|_| MotorError::PinError)
    }
}
