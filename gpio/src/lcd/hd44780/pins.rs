use crate::config::ConfigSource;
use log::debug;
use std::fmt::{Display, Formatter};

/// Signal a GPIO line carries on the display side.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum PinRole {
    /// Enable of the first (or only) controller.
    En,
    /// Enable of the second controller.
    En2,
    /// Register select.
    Rs,
    D7,
    D6,
    D5,
    D4,
    Backlight,
}

impl PinRole {
    pub const ALL: [PinRole; 8] = [
        PinRole::En,
        PinRole::En2,
        PinRole::Rs,
        PinRole::D7,
        PinRole::D6,
        PinRole::D5,
        PinRole::D4,
        PinRole::Backlight,
    ];

    /// Key of the line number in the configuration section.
    pub const fn config_key(self) -> &'static str {
        match self {
            PinRole::En => "pin_EN",
            PinRole::En2 => "pin_EN2",
            PinRole::Rs => "pin_RS",
            PinRole::D7 => "pin_D7",
            PinRole::D6 => "pin_D6",
            PinRole::D5 => "pin_D5",
            PinRole::D4 => "pin_D4",
            PinRole::Backlight => "pin_BL",
        }
    }

    /// Line number used when the configuration does not set one.
    pub const fn default_pin(self) -> i64 {
        match self {
            PinRole::En => 8,
            PinRole::En2 => 22,
            PinRole::Rs => 7,
            PinRole::D7 => 18,
            PinRole::D6 => 23,
            PinRole::D5 => 24,
            PinRole::D4 => 25,
            PinRole::Backlight => 17,
        }
    }
}

impl Display for PinRole {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let str = match self {
            PinRole::En => "EN",
            PinRole::En2 => "EN2",
            PinRole::Rs => "RS",
            PinRole::D7 => "D7",
            PinRole::D6 => "D6",
            PinRole::D5 => "D5",
            PinRole::D4 => "D4",
            PinRole::Backlight => "BL",
        };
        write!(f, "{}", str)
    }
}

/// Number of HD44780 controllers on the display module.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub enum Controllers {
    #[default]
    Single,
    Dual,
}

impl Controllers {
    pub fn count(self) -> u8 {
        match self {
            Controllers::Single => 1,
            Controllers::Dual => 2,
        }
    }

    pub fn is_dual(self) -> bool {
        self == Controllers::Dual
    }
}

/// Display properties owned by the surrounding driver rather than by the connection.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct DisplayOptions {
    pub controllers: Controllers,
    /// Whether the backlight is switched through a GPIO line.
    pub backlight: bool,
}

/// GPIO line numbers of every signal, as read from the configuration.
///
/// Values are kept as configured; validation happens when the connection is set up.
/// A backlight outside `0..32` disables backlight control.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct PinConfig {
    pub en: i64,
    pub en2: i64,
    pub rs: i64,
    pub d7: i64,
    pub d6: i64,
    pub d5: i64,
    pub d4: i64,
    pub backlight: i64,
}

impl PinConfig {
    /// Configuration section holding the pin mapping.
    pub const SECTION: &'static str = "hd44780";

    /// Backlight value meaning "no backlight line".
    pub const BACKLIGHT_DISABLED: i64 = -1;

    /// Reads the mapping from `source`.
    ///
    /// EN2 is only read for dual controller displays and the backlight line only when the
    /// backlight is enabled; otherwise they keep their defaults, and the backlight is set to
    /// [Self::BACKLIGHT_DISABLED].
    pub fn load(source: &dyn ConfigSource, options: &DisplayOptions) -> Self {
        let get = |role: PinRole| {
            let value = source.get_int(Self::SECTION, role.config_key(), role.default_pin());
            debug!("Pin {} mapped to GPIO{}", role, value);
            value
        };

        let mut config = PinConfig {
            en: get(PinRole::En),
            rs: get(PinRole::Rs),
            d4: get(PinRole::D4),
            d5: get(PinRole::D5),
            d6: get(PinRole::D6),
            d7: get(PinRole::D7),
            ..Default::default()
        };

        if options.controllers.is_dual() {
            config.en2 = get(PinRole::En2);
        }

        config.backlight = if options.backlight {
            get(PinRole::Backlight)
        } else {
            Self::BACKLIGHT_DISABLED
        };

        config
    }

    pub fn get(&self, role: PinRole) -> i64 {
        match role {
            PinRole::En => self.en,
            PinRole::En2 => self.en2,
            PinRole::Rs => self.rs,
            PinRole::D7 => self.d7,
            PinRole::D6 => self.d6,
            PinRole::D5 => self.d5,
            PinRole::D4 => self.d4,
            PinRole::Backlight => self.backlight,
        }
    }

    /// Gets whether the backlight line number is usable.
    pub fn backlight_enabled(&self) -> bool {
        (0..32).contains(&self.backlight)
    }
}

impl Default for PinConfig {
    fn default() -> Self {
        PinConfig {
            en: PinRole::En.default_pin(),
            en2: PinRole::En2.default_pin(),
            rs: PinRole::Rs.default_pin(),
            d7: PinRole::D7.default_pin(),
            d6: PinRole::D6.default_pin(),
            d5: PinRole::D5.default_pin(),
            d4: PinRole::D4.default_pin(),
            backlight: PinRole::Backlight.default_pin(),
        }
    }
}
