//! Integer configuration lookup, scoped by section.

use log::warn;
use std::env::var;
use std::fmt::Debug;

/// Source of integer configuration values.
pub trait ConfigSource: Debug {
    /// Gets the value of `key` in `section`, or `default` if it is not set.
    fn get_int(&self, section: &str, key: &str, default: i64) -> i64;
}

/// Reads configuration from environment variables named `<SECTION>_<KEY>`, upper-cased.
///
/// `pin_EN` in section `hd44780` is read from `HD44780_PIN_EN`.
#[derive(Debug, Default, Copy, Clone)]
pub struct EnvConfig;

impl EnvConfig {
    pub fn var_name(section: &str, key: &str) -> String {
        format!("{}_{}", section, key).to_ascii_uppercase()
    }
}

impl ConfigSource for EnvConfig {
    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        let name = Self::var_name(section, key);
        match var(&name) {
            Ok(value) => value.trim().parse().unwrap_or_else(|_| {
                warn!("Ignoring {}={:?}: not an integer, using {}", name, value, default);
                default
            }),
            Err(_) => default,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn var_name_is_upper_snake_case() {
        assert_eq!(EnvConfig::var_name("hd44780", "pin_EN2"), "HD44780_PIN_EN2");
    }

    #[test]
    fn unset_variable_falls_back_to_default() {
        let config = EnvConfig;
        assert_eq!(config.get_int("hdlcd_test_unset", "pin_none", 42), 42);
    }
}
