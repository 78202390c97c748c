//! HD44780 character LCD connected to GPIO lines in 4-bit mode.
//!
//! R/W of the display must be wired to ground: the connection only ever writes, and a display
//! driving 5 V onto the data lines would damage the host GPIO.
//!
//! Displays with two controllers share RS and D4-D7 and have a separate enable line (EN2) for
//! the second controller.
//!
//! Default wiring (BCM numbering):
//!
//! | GPIO | LCD                 |
//! |------|---------------------|
//! | 18   | D7                  |
//! | 23   | D6                  |
//! | 24   | D5                  |
//! | 25   | D4                  |
//! | 8    | EN                  |
//! | 7    | RS                  |
//! | 22   | EN2 (optional)      |
//! | 17   | backlight (optional)|
pub mod driver;
mod pins;

pub use pins::*;
