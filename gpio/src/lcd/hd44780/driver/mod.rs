mod gpio;

use crate::lcd::hd44780::PinRole;
use crate::{GpioError, GpioResult};
pub use gpio::*;
use std::fmt::{Debug, Display, Formatter};
use thiserror::Error;

/// Operations a connection provides to the display driver above it.
///
/// The driver turns text, cursor movement and configuration into command and data bytes and
/// hands them to [Self::send]; the connection only knows how to get a byte into the
/// controller.
pub trait HD44780Connection: Debug {
    /// Sends a byte to the addressed controller(s), high nibble first.
    fn send(&mut self, target: DisplayTarget, mode: RegisterSelect, byte: u8) -> GpioResult<()>;

    /// Sends a command byte (RS low).
    fn send_command(&mut self, target: DisplayTarget, command: u8) -> GpioResult<()> {
        self.send(target, RegisterSelect::Command, command)
    }

    /// Sends a data byte (RS high).
    fn send_data(&mut self, target: DisplayTarget, data: u8) -> GpioResult<()> {
        self.send(target, RegisterSelect::Data, data)
    }

    /// Gets whether [Self::set_backlight] does anything on this connection.
    fn supports_backlight(&self) -> bool {
        false
    }

    /// Switches the backlight on or off.
    fn set_backlight(&mut self, _on: bool) -> GpioResult<()> {
        Ok(())
    }

    /// Blocks for the given number of microseconds.
    fn pause(&mut self, us: u32);

    /// Releases the hardware. Calling it again does nothing.
    fn close(&mut self) -> GpioResult<()>;
}

/// Which controller(s) a transfer is addressed to.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum DisplayTarget {
    /// Every controller present (id `0`).
    All,
    /// The first controller (id `1`).
    First,
    /// The second controller (id `2`).
    Second,
}

impl DisplayTarget {
    pub fn id(self) -> u8 {
        match self {
            DisplayTarget::All => 0,
            DisplayTarget::First => 1,
            DisplayTarget::Second => 2,
        }
    }
}

impl TryFrom<u8> for DisplayTarget {
    type Error = GpioError;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        match id {
            0 => Ok(DisplayTarget::All),
            1 => Ok(DisplayTarget::First),
            2 => Ok(DisplayTarget::Second),
            _ => Err(GpioError::InvalidArgument),
        }
    }
}

/// Register a byte is written to, selected by the RS line.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RegisterSelect {
    /// Instruction register, RS low.
    Command,
    /// Data register, RS high.
    Data,
}

impl RegisterSelect {
    /// Level of the RS line for this register.
    pub fn level(self) -> bool {
        self == RegisterSelect::Data
    }
}

/// Progress of bringing a connection up.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum InitStage {
    Unconfigured,
    PinsAllocated,
    PinsExported,
    ProtocolReset,
    Ready,
    Failed,
    Closed,
}

impl Display for InitStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let str = match self {
            InitStage::Unconfigured => "unconfigured",
            InitStage::PinsAllocated => "pins allocated",
            InitStage::PinsExported => "pins exported",
            InitStage::ProtocolReset => "protocol reset",
            InitStage::Ready => "ready",
            InitStage::Failed => "failed",
            InitStage::Closed => "closed",
        };
        write!(f, "{}", str)
    }
}

#[derive(Debug, Error, Eq, PartialEq, Clone)]
pub enum ConnectionError {
    #[error("invalid GPIO number {value} for {role}")]
    InvalidPin { role: PinRole, value: i64 },
    #[error("failed to set up GPIO {pin} as {role}: {source}")]
    PinSetup {
        role: PinRole,
        pin: u32,
        #[source]
        source: GpioError,
    },
    #[error(transparent)]
    Gpio(#[from] GpioError),
}
