pub mod config;
pub mod delay;
pub mod lcd;
pub mod sysfs;

#[cfg(test)]
pub(crate) mod testing;

use std::fmt::Debug;
use std::io::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error, Eq, PartialEq, Clone)]
pub enum GpioError {
    #[error("pin already in use")]
    AlreadyInUse,
    #[error("invalid argument")]
    InvalidArgument,
    #[error("exporting GPIO {pin} failed: {kind}")]
    ExportFailed { pin: u32, kind: ErrorKind },
    #[error("configuring GPIO {pin} as output failed: {kind}")]
    ConfigureFailed { pin: u32, kind: ErrorKind },
    #[error("writing GPIO {pin} failed: {kind}")]
    WriteFailed { pin: u32, kind: ErrorKind },
    #[error("GPIO {pin} is not exported")]
    NotExported { pin: u32 },
    #[error("connection is closed")]
    Closed,
    #[error("IO error: {0}")]
    Io(ErrorKind),
}

impl From<std::io::Error> for GpioError {
    fn from(err: std::io::Error) -> Self {
        GpioError::Io(err.kind())
    }
}

pub type GpioResult<T> = Result<T, GpioError>;

/// Manages the lifecycle of GPIO lines: handing them out as configured outputs.
pub trait GpioDriver: Debug {
    /// Exports the GPIO line to user space, sets it up as an output driven low
    /// and opens a persistent handle for writing its level.
    ///
    /// # Errors
    /// - `GpioError::InvalidArgument` if the line number is out of range.
    /// - `GpioError::AlreadyInUse` if this driver already handed out the line.
    /// - `GpioError::ExportFailed` if the line could not be exported.
    /// - `GpioError::ConfigureFailed` if the direction or the value handle could not be set up.
    ///   The export is undone before returning.
    fn export_output(&self, number: u32) -> GpioResult<Box<dyn GpioOutput + '_>>;
}

/// An exported GPIO line configured as output.
///
/// Dropping an output that was not released releases it.
pub trait GpioOutput: Debug {
    /// Gets the GPIO line number.
    fn number(&self) -> u32;

    /// Gets whether the line is still exported and writable.
    fn is_exported(&self) -> bool;

    /// Writes the level of the GPIO line.
    fn write(&self, value: bool) -> GpioResult<()>;

    /// Reverts the line to input and gives it back to the kernel.
    ///
    /// Calling this on an already released output does nothing.
    fn release(&mut self) -> GpioResult<()>;
}

/// Blocking wait used to honor the controller timing.
pub trait Delay: Debug {
    /// Blocks the calling thread for at least the given number of microseconds.
    fn delay_us(&mut self, us: u32);
}
