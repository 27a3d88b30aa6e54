//! Coolant outputs.

use embedded_hal::digital::OutputPin;

use crate::config::CoolantConfig;
use crate::error::MotorError;

/// Mist and flood valve state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CoolantState {
    /// Mist coolant (M7).
    pub mist: bool,
    /// Flood coolant (M8).
    pub flood: bool,
}

impl CoolantState {
    /// Both valves closed (M9).
    pub const OFF: Self = Self {
        mist: false,
        flood: false,
    };
}

/// A coolant device.
pub trait Coolant {
    /// Drive the valves to `state`.
    fn apply(&mut self, state: CoolantState) -> Result<(), MotorError>;

    /// Last applied state.
    fn state(&self) -> CoolantState;

    /// Close the valves for a feedhold, keeping the applied state.
    fn pause(&mut self) -> Result<(), MotorError>;

    /// Reopen the valves closed by [`pause`](Coolant::pause).
    fn resume(&mut self) -> Result<(), MotorError>;
}

/// Coolant that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullCoolant;

impl Coolant for NullCoolant {
    fn apply(&mut self, _state: CoolantState) -> Result<(), MotorError> {
        Ok(())
    }

    fn state(&self) -> CoolantState {
        CoolantState::OFF
    }

    fn pause(&mut self) -> Result<(), MotorError> {
        Ok(())
    }

    fn resume(&mut self) -> Result<(), MotorError> {
        Ok(())
    }
}

/// Mist and flood valves on active-high pins.
pub struct PinCoolant<MIST, FLOOD>
where
    MIST: OutputPin,
    FLOOD: OutputPin,
{
    mist: MIST,
    flood: FLOOD,
    pause_on_hold: bool,
    state: CoolantState,
    paused: bool,
}

impl<MIST, FLOOD> PinCoolant<MIST, FLOOD>
where
    MIST: OutputPin,
    FLOOD: OutputPin,
{
    /// Wrap the valve pins.
    pub fn new(mist: MIST, flood: FLOOD, config: CoolantConfig) -> Self {
        Self {
            mist,
            flood,
            pause_on_hold: config.pause_on_hold,
            state: CoolantState::OFF,
            paused: false,
        }
    }

    /// Release the pins.
    pub fn release(self) -> (MIST, FLOOD) {
        (self.mist, self.flood)
    }

    fn write(&mut self, state: CoolantState) -> Result<(), MotorError> {
        set(&mut self.mist, state.mist)?;
        set(&mut self.flood, state.flood)
    }
}

fn set<P: OutputPin>(pin: &mut P, on: bool) -> Result<(), MotorError> {
    if on {
        pin.set_high().map_err(|_| MotorError::PinError)
    } else {
        pin.set_low().map_err(|_| MotorError::PinError)
    }
}

impl<MIST, FLOOD> Coolant for PinCoolant<MIST, FLOOD>
where
    MIST: OutputPin,
    FLOOD: OutputPin,
{
    fn apply(&mut self, state: CoolantState) -> Result<(), MotorError> {
        self.state = state;
        if self.paused {
            return Ok(());
        }
        self.write(state)
    }

    fn state(&self) -> CoolantState {
        self.state
    }

    fn pause(&mut self) -> Result<(), MotorError> {
        if !self.pause_on_hold || self.paused || self.state == CoolantState::OFF {
            return Ok(());
        }
        self.paused = true;
        self.write(CoolantState::OFF)
    }

    fn resume(&mut self) -> Result<(), MotorError> {
        if !self.paused {
            return Ok(());
        }
        self.paused = false;
        self.write(self.state)
    }
}
