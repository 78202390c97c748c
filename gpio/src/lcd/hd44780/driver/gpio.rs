use crate::config::ConfigSource;
use crate::lcd::hd44780::driver::{
    ConnectionError, DisplayTarget, HD44780Connection, InitStage, RegisterSelect,
};
use crate::lcd::hd44780::{Controllers, DisplayOptions, PinConfig, PinRole};
use crate::{Delay, GpioDriver, GpioError, GpioOutput, GpioResult};
use log::{debug, error, info, trace, warn};

/// Settle time between two steps of a nibble transfer.
pub const SETTLE_DELAY_US: u32 = 50;
/// Wait after the first bring-up byte; the controller may still be executing an 8-bit function set.
pub const BRING_UP_DELAY_US: u32 = 4100;
/// Wait after switching the controller to 4-bit mode.
pub const FOUR_BIT_DELAY_US: u32 = 150;

/// The GPIO lines of a connection.
///
/// EN2 only exists on dual controller displays, the backlight only when it is enabled.
#[derive(Debug)]
pub struct PinSet<'a> {
    pub en: Box<dyn GpioOutput + 'a>,
    pub en2: Option<Box<dyn GpioOutput + 'a>>,
    pub rs: Box<dyn GpioOutput + 'a>,
    pub d7: Box<dyn GpioOutput + 'a>,
    pub d6: Box<dyn GpioOutput + 'a>,
    pub d5: Box<dyn GpioOutput + 'a>,
    pub d4: Box<dyn GpioOutput + 'a>,
    pub backlight: Option<Box<dyn GpioOutput + 'a>>,
}

impl<'a> PinSet<'a> {
    /// Data lines, most significant first.
    pub fn data_lines(&self) -> [&dyn GpioOutput; 4] {
        [&*self.d7, &*self.d6, &*self.d5, &*self.d4]
    }

    /// Every line, in acquisition order.
    fn lines_mut(&mut self) -> [Option<&mut Box<dyn GpioOutput + 'a>>; 8] {
        [
            Some(&mut self.en),
            Some(&mut self.rs),
            Some(&mut self.d7),
            Some(&mut self.d6),
            Some(&mut self.d5),
            Some(&mut self.d4),
            self.backlight.as_mut(),
            self.en2.as_mut(),
        ]
    }

    /// Releases every line, in acquisition order.
    ///
    /// Keeps going when a line fails to release and returns the first error.
    fn release_all(&mut self) -> GpioResult<()> {
        Self::release_lines(self.lines_mut().into_iter().flatten())
    }

    /// Releases every line, last acquired first.
    fn release_in_reverse(&mut self) -> GpioResult<()> {
        Self::release_lines(self.lines_mut().into_iter().rev().flatten())
    }

    fn release_lines<'p>(
        lines: impl Iterator<Item = &'p mut Box<dyn GpioOutput + 'a>>,
    ) -> GpioResult<()>
    where
        'a: 'p,
    {
        let mut result = Ok(());
        for pin in lines {
            if let Err(err) = pin.release() {
                warn!("Releasing GPIO {} failed: {}", pin.number(), err);
                if result.is_ok() {
                    result = Err(err);
                }
            }
        }
        result
    }
}

/// One byte or nibble on the way to the controller.
///
/// A failed write is logged and remembered, and the sequence carries on.
struct Transfer<'p, 'a> {
    pins: &'p PinSet<'a>,
    delay: &'p mut (dyn Delay + 'a),
    controllers: Controllers,
    error: Option<GpioError>,
}

impl Transfer<'_, '_> {
    fn set_level(&mut self, pin: &dyn GpioOutput, value: bool) {
        if let Err(err) = pin.write(value) {
            warn!("Setting GPIO {} to {} failed: {}", pin.number(), u8::from(value), err);
            self.error.get_or_insert(err);
        }
    }

    fn settle(&mut self) {
        self.delay.delay_us(SETTLE_DELAY_US);
    }

    fn select_register(&mut self, mode: RegisterSelect) {
        let pins = self.pins;
        self.set_level(&*pins.rs, mode.level());
    }

    fn clear_data_lines(&mut self) {
        let pins = self.pins;
        for line in pins.data_lines() {
            self.set_level(line, false);
        }
        self.settle();
    }

    /// Puts the nibble on the data lines and pulses enable.
    ///
    /// The controller latches the data lines on the falling edge.
    fn clock_nibble(&mut self, target: DisplayTarget, nibble: u8) {
        let pins = self.pins;
        for (bit, line) in (0..4).rev().zip(pins.data_lines()) {
            self.set_level(line, (nibble >> bit) & 1 == 1);
        }
        self.settle();

        self.set_enable(target, true);
        self.settle();

        self.set_enable(target, false);
        self.settle();
    }

    fn set_enable(&mut self, target: DisplayTarget, value: bool) {
        let pins = self.pins;
        if matches!(target, DisplayTarget::All | DisplayTarget::First) {
            self.set_level(&*pins.en, value);
        }
        if target == DisplayTarget::Second
            || (self.controllers.is_dual() && target == DisplayTarget::All)
        {
            if let Some(en2) = &pins.en2 {
                self.set_level(&**en2, value);
            }
        }
    }

    fn finish(self) -> GpioResult<()> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Connection to an HD44780 display in 4-bit mode over individually driven GPIO lines.
///
/// Every step of a transfer is separated by [SETTLE_DELAY_US].
///
/// Dropping an open connection closes it.
#[derive(Debug)]
pub struct GpioHD44780Connection<'a> {
    pins: Option<PinSet<'a>>,
    controllers: Controllers,
    backlight_pin: i64,
    delay: Box<dyn Delay + 'a>,
    stage: InitStage,
}

impl<'a> GpioHD44780Connection<'a> {
    /// Reads the pin mapping from `source` and sets the connection up, see [Self::init].
    pub fn from_config(
        driver: &'a dyn GpioDriver,
        source: &dyn ConfigSource,
        options: DisplayOptions,
        delay: Box<dyn Delay + 'a>,
    ) -> Result<Self, ConnectionError> {
        let config = PinConfig::load(source, &options);
        Self::init(driver, &config, options, delay)
    }

    /// Acquires the lines and switches the controller to 4-bit mode.
    ///
    /// Lines are acquired in the order EN, RS, D7, D6, D5, D4, backlight, EN2. If one fails,
    /// those already acquired are released in reverse order before the error is returned.
    ///
    /// The rest of the controller setup (function set, display on, clear, entry mode) is left to
    /// the caller.
    pub fn init(
        driver: &'a dyn GpioDriver,
        config: &PinConfig,
        options: DisplayOptions,
        delay: Box<dyn Delay + 'a>,
    ) -> Result<Self, ConnectionError> {
        let result = Self::try_init(driver, config, options, delay);
        if let Err(err) = &result {
            error!("HD44780 GPIO connection failed: {}", err);
            debug!("Connection stage: {}", InitStage::Failed);
        }
        result
    }

    fn try_init(
        driver: &'a dyn GpioDriver,
        config: &PinConfig,
        options: DisplayOptions,
        delay: Box<dyn Delay + 'a>,
    ) -> Result<Self, ConnectionError> {
        debug!("Connection stage: {}", InitStage::Unconfigured);

        let en = Self::pin_number(config, PinRole::En)?;
        let rs = Self::pin_number(config, PinRole::Rs)?;
        let d7 = Self::pin_number(config, PinRole::D7)?;
        let d6 = Self::pin_number(config, PinRole::D6)?;
        let d5 = Self::pin_number(config, PinRole::D5)?;
        let d4 = Self::pin_number(config, PinRole::D4)?;
        let en2 = match options.controllers {
            Controllers::Dual => Some(Self::pin_number(config, PinRole::En2)?),
            Controllers::Single => None,
        };
        let backlight = if options.backlight && config.backlight_enabled() {
            Some(Self::pin_number(config, PinRole::Backlight)?)
        } else {
            if options.backlight {
                info!(
                    "Backlight GPIO {} is out of range, backlight control disabled",
                    config.backlight
                );
            }
            None
        };

        debug!("Connection stage: {}", InitStage::PinsAllocated);

        // On an early return the lines acquired so far are dropped, and so released, in
        // reverse order
        let en = Self::acquire(driver, PinRole::En, en)?;
        let rs = Self::acquire(driver, PinRole::Rs, rs)?;
        let d7 = Self::acquire(driver, PinRole::D7, d7)?;
        let d6 = Self::acquire(driver, PinRole::D6, d6)?;
        let d5 = Self::acquire(driver, PinRole::D5, d5)?;
        let d4 = Self::acquire(driver, PinRole::D4, d4)?;
        let backlight = match backlight {
            Some(pin) => Some(Self::acquire(driver, PinRole::Backlight, pin)?),
            None => None,
        };
        let en2 = match en2 {
            Some(pin) => Some(Self::acquire(driver, PinRole::En2, pin)?),
            None => None,
        };

        let mut connection = GpioHD44780Connection {
            pins: Some(PinSet {
                en,
                en2,
                rs,
                d7,
                d6,
                d5,
                d4,
                backlight,
            }),
            controllers: options.controllers,
            backlight_pin: if options.backlight {
                config.backlight
            } else {
                PinConfig::BACKLIGHT_DISABLED
            },
            delay,
            stage: InitStage::PinsExported,
        };
        debug!("Connection stage: {}", connection.stage);
        debug!(
            "Registered send/close{} for {} controller(s)",
            if connection.supports_backlight() { "/backlight" } else { "" },
            connection.controllers.count()
        );

        // Whatever state the controller is in, 0x33 0x32 ends in 4-bit mode: up to two 8-bit
        // function sets followed by the switch to a 4-bit interface.
        connection.set_stage(InitStage::ProtocolReset);
        if let Err(err) = connection.bring_up() {
            if let Some(mut pins) = connection.pins.take() {
                // Failures are already logged, the bring-up error is the one reported
                let _ = pins.release_in_reverse();
            }
            connection.stage = InitStage::Failed;
            return Err(err.into());
        }

        connection.set_stage(InitStage::Ready);
        info!(
            "HD44780 GPIO connection ready (EN {}, RS {}, D7-D4 {:?})",
            config.en,
            config.rs,
            [config.d7, config.d6, config.d5, config.d4]
        );

        Ok(connection)
    }

    fn bring_up(&mut self) -> GpioResult<()> {
        self.send(DisplayTarget::All, RegisterSelect::Command, 0x33)?;
        self.pause(BRING_UP_DELAY_US);
        self.send(DisplayTarget::All, RegisterSelect::Command, 0x32)?;
        self.pause(FOUR_BIT_DELAY_US);
        Ok(())
    }

    fn pin_number(config: &PinConfig, role: PinRole) -> Result<u32, ConnectionError> {
        let value = config.get(role);
        u32::try_from(value).map_err(|_| ConnectionError::InvalidPin { role, value })
    }

    fn acquire(
        driver: &'a dyn GpioDriver,
        role: PinRole,
        pin: u32,
    ) -> Result<Box<dyn GpioOutput + 'a>, ConnectionError> {
        debug!("Setting up GPIO {} as {}", pin, role);
        driver
            .export_output(pin)
            .map_err(|source| ConnectionError::PinSetup { role, pin, source })
    }

    fn set_stage(&mut self, stage: InitStage) {
        self.stage = stage;
        debug!("Connection stage: {}", stage);
    }

    pub fn stage(&self) -> InitStage {
        self.stage
    }

    pub fn controllers(&self) -> Controllers {
        self.controllers
    }

    /// Gets the lines, or `None` once the connection is closed.
    pub fn pins(&self) -> Option<&PinSet<'a>> {
        self.pins.as_ref()
    }

    fn transfer(&mut self, target: DisplayTarget) -> GpioResult<Transfer<'_, 'a>> {
        let pins = self.pins.as_ref().ok_or(GpioError::Closed)?;
        if target == DisplayTarget::Second && pins.en2.is_none() {
            warn!("No second controller to address, the transfer will not be clocked in");
        }
        Ok(Transfer {
            pins,
            delay: &mut *self.delay,
            controllers: self.controllers,
            error: None,
        })
    }

    /// Sends a single nibble (the low 4 bits of `nibble`) to the addressed controller(s).
    ///
    /// # Errors
    /// - `GpioError::InvalidArgument` if `nibble` does not fit in 4 bits.
    /// - `GpioError::Closed` if the connection is closed.
    /// - The first write error, after the whole sequence ran.
    pub fn send_nibble(
        &mut self,
        target: DisplayTarget,
        mode: RegisterSelect,
        nibble: u8,
    ) -> GpioResult<()> {
        if nibble > 0b1111 {
            return Err(GpioError::InvalidArgument);
        }
        trace!("Sending nibble {:04b} to {:?}, RS: {:?}", nibble, target, mode);

        let mut transfer = self.transfer(target)?;
        transfer.select_register(mode);
        transfer.clear_data_lines();
        transfer.clock_nibble(target, nibble);
        transfer.finish()
    }
}

impl HD44780Connection for GpioHD44780Connection<'_> {
    fn send(&mut self, target: DisplayTarget, mode: RegisterSelect, byte: u8) -> GpioResult<()> {
        trace!("Sending {:08b} to {:?}, RS: {:?}", byte, target, mode);

        let mut transfer = self.transfer(target)?;
        transfer.select_register(mode);
        transfer.clear_data_lines();
        transfer.clock_nibble(target, byte >> 4);
        transfer.clear_data_lines();
        transfer.clock_nibble(target, byte & 0x0F);
        transfer.finish()
    }

    fn supports_backlight(&self) -> bool {
        self.pins
            .as_ref()
            .is_some_and(|pins| pins.backlight.is_some())
    }

    fn set_backlight(&mut self, on: bool) -> GpioResult<()> {
        let pins = self.pins.as_ref().ok_or(GpioError::Closed)?;
        if !(0..32).contains(&self.backlight_pin) {
            return Ok(());
        }
        let Some(pin) = &pins.backlight else {
            return Ok(());
        };

        trace!("Backlight {}", if on { "on" } else { "off" });
        pin.write(on).inspect_err(|err| {
            warn!("Switching backlight on GPIO {} failed: {}", pin.number(), err);
        })
    }

    fn pause(&mut self, us: u32) {
        self.delay.delay_us(us);
    }

    fn close(&mut self) -> GpioResult<()> {
        let Some(mut pins) = self.pins.take() else {
            return Ok(());
        };
        let result = pins.release_all();
        self.set_stage(InitStage::Closed);
        result
    }
}

impl Drop for GpioHD44780Connection<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!("Closing HD44780 GPIO connection failed: {}", err);
        }
    }
}
