use dotenv::var;
use hdlcd_gpio::config::{ConfigSource, EnvConfig};
use hdlcd_gpio::lcd::hd44780::{Controllers, DisplayOptions};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// Demo configuration, read from `CONFIG_FILE` (`config.json` by default).
///
/// ```json
/// {
///   "dual_controller": false,
///   "backlight": true,
///   "sections": { "hd44780": { "pin_EN": 8, "pin_BL": 17 } }
/// }
/// ```
///
/// Keys missing from the file are looked up in the environment.
#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct Config {
    pub dual_controller: bool,
    pub backlight: bool,
    pub sections: HashMap<String, HashMap<String, i64>>,
}

impl Config {
    fn path() -> String {
        var("CONFIG_FILE").unwrap_or_else(|_| "config.json".to_string())
    }

    pub fn try_load() -> eyre::Result<Option<Self>> {
        let config_str = Self::path();
        let config_path = Path::new(&config_str);
        if !config_path.exists() {
            return Ok(None);
        }
        let file = std::fs::File::open(config_path)?;
        let reader = std::io::BufReader::new(file);
        Ok(Some(serde_json::from_reader(reader)?))
    }

    pub fn display_options(&self) -> DisplayOptions {
        DisplayOptions {
            controllers: if self.dual_controller {
                Controllers::Dual
            } else {
                Controllers::Single
            },
            backlight: self.backlight,
        }
    }
}

impl ConfigSource for Config {
    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.sections
            .get(section)
            .and_then(|values| values.get(key))
            .copied()
            .unwrap_or_else(|| EnvConfig.get_int(section, key, default))
    }
}
