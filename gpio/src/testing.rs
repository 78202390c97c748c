//! Recording doubles shared by the unit tests.
use crate::config::ConfigSource;
use crate::{Delay, GpioDriver, GpioError, GpioOutput, GpioResult};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt::{Debug, Formatter};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Event {
    Export(u32),
    Write(u32, bool),
    Release(u32),
    Delay(u32),
}

/// Ordered log of everything the doubles observed.
#[derive(Debug, Default, Clone)]
pub struct EventLog(Rc<RefCell<Vec<Event>>>);

impl EventLog {
    pub fn push(&self, event: Event) {
        self.0.borrow_mut().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.0.borrow().clone()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }

    pub fn exports(&self) -> Vec<u32> {
        self.filter(|event| match event {
            Event::Export(pin) => Some(pin),
            _ => None,
        })
    }

    pub fn releases(&self) -> Vec<u32> {
        self.filter(|event| match event {
            Event::Release(pin) => Some(pin),
            _ => None,
        })
    }

    pub fn delays(&self) -> Vec<u32> {
        self.filter(|event| match event {
            Event::Delay(us) => Some(us),
            _ => None,
        })
    }

    /// Writes to the given pin, in order.
    pub fn writes_to(&self, pin: u32) -> Vec<bool> {
        self.filter(|event| match event {
            Event::Write(p, value) if p == pin => Some(value),
            _ => None,
        })
    }

    pub fn writes(&self) -> Vec<(u32, bool)> {
        self.filter(|event| match event {
            Event::Write(pin, value) => Some((pin, value)),
            _ => None,
        })
    }

    /// Replays the writes and returns the nibble on `data` (D7..D4) and the RS level
    /// every time `enable` goes high.
    pub fn clocked_nibbles(&self, enable: u32, rs: u32, data: [u32; 4]) -> Vec<(bool, u8)> {
        let mut levels: HashMap<u32, bool> = HashMap::new();
        let mut clocked = Vec::new();
        for (pin, value) in self.writes() {
            levels.insert(pin, value);
            if pin == enable && value {
                let nibble = data.iter().fold(0u8, |acc, line| {
                    (acc << 1) | u8::from(levels.get(line).copied().unwrap_or(false))
                });
                clocked.push((levels.get(&rs).copied().unwrap_or(false), nibble));
            }
        }
        clocked
    }

    fn filter<T>(&self, f: impl Fn(Event) -> Option<T>) -> Vec<T> {
        self.0.borrow().iter().copied().filter_map(f).collect()
    }
}

#[derive(Debug, Default)]
pub struct MockGpioDriver {
    pub log: EventLog,
    used: RefCell<HashSet<u32>>,
    failing_exports: RefCell<HashSet<u32>>,
    failing_writes: RefCell<HashSet<u32>>,
}

impl MockGpioDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_export(&self, pin: u32) {
        self.failing_exports.borrow_mut().insert(pin);
    }

    pub fn fail_writes(&self, pin: u32) {
        self.failing_writes.borrow_mut().insert(pin);
    }

    pub fn delay(&self) -> Box<RecordingDelay> {
        Box::new(RecordingDelay {
            log: self.log.clone(),
        })
    }
}

impl GpioDriver for MockGpioDriver {
    fn export_output(&self, number: u32) -> GpioResult<Box<dyn GpioOutput + '_>> {
        if self.failing_exports.borrow().contains(&number) {
            return Err(GpioError::ExportFailed {
                pin: number,
                kind: ErrorKind::PermissionDenied,
            });
        }
        if !self.used.borrow_mut().insert(number) {
            return Err(GpioError::AlreadyInUse);
        }
        self.log.push(Event::Export(number));
        Ok(Box::new(MockOutput {
            driver: self,
            number,
            exported: true,
        }))
    }
}

pub struct MockOutput<'a> {
    driver: &'a MockGpioDriver,
    number: u32,
    exported: bool,
}

impl Debug for MockOutput<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "MockOutput({})", self.number)
    }
}

impl GpioOutput for MockOutput<'_> {
    fn number(&self) -> u32 {
        self.number
    }

    fn is_exported(&self) -> bool {
        self.exported
    }

    fn write(&self, value: bool) -> GpioResult<()> {
        if !self.exported {
            return Err(GpioError::NotExported { pin: self.number });
        }
        if self.driver.failing_writes.borrow().contains(&self.number) {
            return Err(GpioError::WriteFailed {
                pin: self.number,
                kind: ErrorKind::BrokenPipe,
            });
        }
        self.driver.log.push(Event::Write(self.number, value));
        Ok(())
    }

    fn release(&mut self) -> GpioResult<()> {
        if self.exported {
            self.exported = false;
            self.driver.used.borrow_mut().remove(&self.number);
            self.driver.log.push(Event::Release(self.number));
        }
        Ok(())
    }
}

impl Drop for MockOutput<'_> {
    fn drop(&mut self) {
        let _ = self.release();
    }
}

#[derive(Debug)]
pub struct RecordingDelay {
    log: EventLog,
}

impl Delay for RecordingDelay {
    fn delay_us(&mut self, us: u32) {
        self.log.push(Event::Delay(us));
    }
}

/// Configuration keyed by `section/key`.
#[derive(Debug, Default)]
pub struct MapConfig(pub HashMap<String, i64>);

impl MapConfig {
    pub fn with(mut self, section: &str, key: &str, value: i64) -> Self {
        self.0.insert(format!("{}/{}", section, key), value);
        self
    }
}

impl ConfigSource for MapConfig {
    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.0
            .get(&format!("{}/{}", section, key))
            .copied()
            .unwrap_or(default)
    }
}

/// Scratch directory laid out like `/sys/class/gpio`, with `gpioN/` already present
/// for the given lines. Removed on drop.
pub struct SysfsFixture {
    path: PathBuf,
}

impl SysfsFixture {
    pub fn new(pins: &[u32]) -> Self {
        static COUNTER: AtomicUsize = AtomicUsize::new(0);
        let path = std::env::temp_dir().join(format!(
            "hdlcd-sysfs-{}-{}",
            std::process::id(),
            COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        std::fs::create_dir_all(&path).unwrap();
        std::fs::write(path.join("export"), "").unwrap();
        std::fs::write(path.join("unexport"), "").unwrap();
        for pin in pins {
            let pin_path = path.join(format!("gpio{}", pin));
            std::fs::create_dir_all(&pin_path).unwrap();
            std::fs::write(pin_path.join("direction"), "in").unwrap();
            std::fs::write(pin_path.join("value"), "0").unwrap();
        }
        SysfsFixture { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read(&self, file: &str) -> String {
        std::fs::read_to_string(self.path.join(file)).unwrap()
    }

    pub fn write(&self, file: &str, content: &str) {
        std::fs::write(self.path.join(file), content).unwrap();
    }

    pub fn remove(&self, file: &str) {
        std::fs::remove_file(self.path.join(file)).unwrap();
    }
}

impl Drop for SysfsFixture {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.path);
    }
}
