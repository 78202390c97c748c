use hdlcd_gpio::GpioResult;
use hdlcd_gpio::lcd::hd44780::driver::{DisplayTarget, HD44780Connection};
use log::warn;

/// Start of each row in DDRAM.
const ROW_OFFSETS: [u8; 2] = [0x00, 0x40];

/// Just enough of a display driver on top of a connection to show some text.
pub trait DisplayExt {
    fn common_init(&mut self) -> GpioResult<()>;
    fn clear(&mut self) -> GpioResult<()>;
    fn print(&mut self, s: &str) -> GpioResult<()>;
    fn set_cursor(&mut self, row: usize, col: usize) -> GpioResult<()>;
}

impl<T: ?Sized + HD44780Connection> DisplayExt for T {
    fn common_init(&mut self) -> GpioResult<()> {
        // Function set: 4-bit, 2 lines, 5x8 font
        self.send_command(DisplayTarget::All, 0b00101000)?;
        // Display on, cursor off, blink off
        self.send_command(DisplayTarget::All, 0b00001100)?;
        self.clear()?;
        // Entry mode: increment, no shift
        self.send_command(DisplayTarget::All, 0b00000110)
    }

    fn clear(&mut self) -> GpioResult<()> {
        self.send_command(DisplayTarget::All, 0b00000001)?;
        self.pause(1600);
        Ok(())
    }

    fn print(&mut self, s: &str) -> GpioResult<()> {
        for c in s.chars() {
            if c.is_ascii() {
                self.send_data(DisplayTarget::All, c as u8)?;
            } else {
                warn!("Non-ASCII character: {}", c);
                self.send_data(DisplayTarget::All, b'?')?
            }
        }
        Ok(())
    }

    fn set_cursor(&mut self, row: usize, col: usize) -> GpioResult<()> {
        let Some(offset) = ROW_OFFSETS.get(row) else {
            return Err(hdlcd_gpio::GpioError::InvalidArgument);
        };
        if col >= 40 {
            return Err(hdlcd_gpio::GpioError::InvalidArgument);
        }
        self.send_command(DisplayTarget::All, 0b10000000 | (offset + col as u8))
    }
}
