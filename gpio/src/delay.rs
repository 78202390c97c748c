use crate::Delay;
use std::thread::sleep;
use std::time::Duration;

/// Delay backed by [std::thread::sleep].
///
/// The OS may oversleep, which only ever lengthens the controller timings.
#[derive(Debug, Default, Copy, Clone)]
pub struct ThreadDelay;

impl Delay for ThreadDelay {
    fn delay_us(&mut self, us: u32) {
        sleep(Duration::from_micros(us.into()));
    }
}
