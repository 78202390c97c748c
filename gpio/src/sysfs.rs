//! GPIO lines driven through the sysfs interface (`/sys/class/gpio`).
//!
//! A line is handed to user space by writing its number to `export`, which makes the kernel
//! create `gpioN/` with `direction` and `value` attributes. Writing `low` to `direction` turns
//! the line into an output driven low without glitching it high first. The `value` file is
//! kept open for the whole lifetime of the output, so a level change is a single write.
use crate::{GpioDriver, GpioError, GpioOutput, GpioResult};
use bitvec::vec::BitVec;
use log::{debug, trace, warn};
use std::fmt::{Debug, Formatter};
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Seek, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicU8;

/// Whether a line was exported by this driver or was already exported before.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum Export {
    Fresh,
    Existing,
}

pub struct SysfsGpioDriver {
    base_path: PathBuf,
    used_pins: BitVec<AtomicU8>,
}

impl SysfsGpioDriver {
    /// Where the kernel exposes the GPIO class.
    pub const BASE_PATH: &'static str = "/sys/class/gpio";

    /// Upper bound (exclusive) for line numbers accepted by this driver.
    pub const PIN_COUNT: usize = 1024;

    pub fn new() -> Self {
        Self::with_base_path(Self::BASE_PATH)
    }

    /// Creates a driver working on a different directory laid out like `/sys/class/gpio`.
    pub fn with_base_path(base_path: impl Into<PathBuf>) -> Self {
        SysfsGpioDriver {
            base_path: base_path.into(),
            used_pins: BitVec::repeat(false, Self::PIN_COUNT),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Gets the lines currently handed out by this driver, in ascending order.
    pub fn used_pins(&self) -> Vec<u32> {
        self.used_pins.iter_ones().map(|index| index as u32).collect()
    }

    fn pin_path(&self, number: u32, attribute: &str) -> PathBuf {
        self.base_path.join(format!("gpio{}", number)).join(attribute)
    }

    fn write_attribute(path: &Path, value: &str) -> std::io::Result<()> {
        trace!("{} <- {:?}", path.display(), value);
        let mut file = OpenOptions::new().write(true).truncate(true).open(path)?;
        file.write_all(value.as_bytes())
    }

    fn export(&self, number: u32) -> std::io::Result<Export> {
        Self::export_outcome(
            Self::write_attribute(&self.base_path.join("export"), &format!("{}\n", number)),
        )
    }

    /// The kernel answers `EBUSY` for a line that survived a previous run without being
    /// unexported.
    fn export_outcome(result: std::io::Result<()>) -> std::io::Result<Export> {
        match result {
            Ok(()) => Ok(Export::Fresh),
            Err(err) if err.kind() == ErrorKind::ResourceBusy => Ok(Export::Existing),
            Err(err) => Err(err),
        }
    }

    fn unexport(&self, number: u32) -> std::io::Result<()> {
        Self::write_attribute(&self.base_path.join("unexport"), &format!("{}\n", number))
    }

    fn set_direction(&self, number: u32, direction: &str) -> std::io::Result<()> {
        Self::write_attribute(&self.pin_path(number, "direction"), direction)
    }

    /// Best effort revert of a half configured line.
    ///
    /// A line that was already exported is left exported.
    fn abandon(&self, number: u32, revert_direction: bool, export: Export) {
        if revert_direction {
            if let Err(err) = self.set_direction(number, "in") {
                warn!("Reverting GPIO {} to input failed: {}", number, err);
            }
        }
        if export == Export::Existing {
            debug!("GPIO {} was exported before, leaving it exported", number);
        } else if let Err(err) = self.unexport(number) {
            warn!("Unexporting GPIO {} failed: {}", number, err);
        }
    }
}

impl Default for SysfsGpioDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for SysfsGpioDriver {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "SysfsGpioDriver({:?})", self.base_path)
    }
}

impl GpioDriver for SysfsGpioDriver {
    fn export_output(&self, number: u32) -> GpioResult<Box<dyn GpioOutput + '_>> {
        let index = number as usize;
        if index >= Self::PIN_COUNT {
            return Err(GpioError::InvalidArgument);
        }

        if self.used_pins[index] {
            return Err(GpioError::AlreadyInUse);
        }

        let export = self.export(number).map_err(|err| GpioError::ExportFailed {
            pin: number,
            kind: err.kind(),
        })?;
        if export == Export::Existing {
            debug!("GPIO {} is already exported", number);
        }

        if let Err(err) = self.set_direction(number, "low") {
            self.abandon(number, false, export);
            return Err(GpioError::ConfigureFailed {
                pin: number,
                kind: err.kind(),
            });
        }

        let value = match OpenOptions::new()
            .write(true)
            .open(self.pin_path(number, "value"))
        {
            Ok(file) => file,
            Err(err) => {
                self.abandon(number, true, export);
                return Err(GpioError::ConfigureFailed {
                    pin: number,
                    kind: err.kind(),
                });
            }
        };

        self.used_pins.set_aliased(index, true);

        debug!("Exported GPIO {} as output", number);

        Ok(Box::new(SysfsOutput {
            driver: self,
            number,
            value: Some(value),
        }))
    }
}

/// Output line exported through sysfs, owning its open `value` file.
pub struct SysfsOutput<'a> {
    driver: &'a SysfsGpioDriver,
    number: u32,
    value: Option<File>,
}

impl Debug for SysfsOutput<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}[{}][output]", self.driver, self.number)
    }
}

impl GpioOutput for SysfsOutput<'_> {
    fn number(&self) -> u32 {
        self.number
    }

    fn is_exported(&self) -> bool {
        self.value.is_some()
    }

    fn write(&self, value: bool) -> GpioResult<()> {
        let mut file = self
            .value
            .as_ref()
            .ok_or(GpioError::NotExported { pin: self.number })?;

        // Rewind so the next level overwrites this one instead of being appended
        file.write_all(if value { b"1" } else { b"0" })
            .and_then(|_| file.rewind())
            .map_err(|err| GpioError::WriteFailed {
                pin: self.number,
                kind: err.kind(),
            })
    }

    fn release(&mut self) -> GpioResult<()> {
        if self.value.is_none() {
            return Ok(());
        }

        let mut result = Ok(());

        if let Err(err) = self.driver.set_direction(self.number, "in") {
            warn!("Reverting GPIO {} to input failed: {}", self.number, err);
            result = Err(err.into());
        }

        // Closes the value file
        self.value = None;

        if let Err(err) = self.driver.unexport(self.number) {
            warn!("Unexporting GPIO {} failed: {}", self.number, err);
            if result.is_ok() {
                result = Err(err.into());
            }
        }

        self.driver.used_pins.set_aliased(self.number as usize, false);

        debug!("Released GPIO {}", self.number);

        result
    }
}

impl Drop for SysfsOutput<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.release() {
            warn!("Releasing GPIO {} on drop failed: {}", self.number, err);
        }
    }
}
