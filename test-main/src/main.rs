mod config;
mod utils;

use crate::config::Config;
use crate::utils::DisplayExt;
use dotenv::dotenv;
use hdlcd_gpio::delay::ThreadDelay;
use hdlcd_gpio::lcd::hd44780::driver::{GpioHD44780Connection, HD44780Connection};
use hdlcd_gpio::sysfs::SysfsGpioDriver;
use log::{debug, info};
use std::env::args;
use std::thread::sleep;
use std::time::Duration;
use sysinfo::System;

fn main() -> eyre::Result<()> {
    dotenv().ok();
    pretty_env_logger::init();

    const UNKNOWN_STR: &str = "???";

    info!(
        "Hello, {}!",
        System::name().as_deref().unwrap_or(UNKNOWN_STR)
    );
    info!(
        "System ver {} kernel ver {}",
        System::long_os_version().as_deref().unwrap_or(UNKNOWN_STR),
        System::kernel_version().as_deref().unwrap_or(UNKNOWN_STR),
    );
    info!("Architecture {}", System::cpu_arch());

    let config = match Config::try_load()? {
        Some(config) => {
            info!("Config loaded.");
            config
        }
        None => {
            info!("Config not found. Using defaults and environment");
            Config::default()
        }
    };
    let options = config.display_options();
    debug!("{:?}", options);

    let gpio = SysfsGpioDriver::new();
    debug!("{:?} initialized.", gpio);

    let mut lcd =
        GpioHD44780Connection::from_config(&gpio, &config, options, Box::new(ThreadDelay))?;
    lcd.common_init()?;

    let text: Vec<String> = args().skip(1).collect();
    let text = if text.is_empty() {
        "Hello, HD44780!".to_string()
    } else {
        text.join(" ")
    };

    lcd.print(&text)?;
    lcd.set_cursor(1, 0)?;
    lcd.print(concat!("v", env!("CARGO_PKG_VERSION")))?;

    if lcd.supports_backlight() {
        for on in [false, true, false, true] {
            lcd.set_backlight(on)?;
            sleep(Duration::from_millis(500));
        }
    }

    sleep(Duration::from_secs(2));

    lcd.close()?;
    info!("Pins released.");

    Ok(())
}
