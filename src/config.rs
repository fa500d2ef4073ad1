//src/config.rs
use comfy_table::Color;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};
use thiserror::Error;
use tracing::{debug, warn};

const CONFIG_FILE_NAME: &str = "config.toml";
pub(crate) const APP_DIR_NAME: &str = "gym-tracker-cli";
const CONFIG_ENV_VAR: &str = "GYM_TRACKER_CONFIG_DIR"; // Environment variable name

const STRIPE_SECRET_ENV_VAR: &str = "STRIPE_SECRET_KEY";
const STRIPE_WEBHOOK_ENV_VAR: &str = "STRIPE_WEBHOOK_SECRET";
const STRIPE_PRICE_ENV_VAR: &str = "STRIPE_PRICE_ID";
const ANTHROPIC_KEY_ENV_VAR: &str = "ANTHROPIC_API_KEY";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not determine configuration directory.")]
    CannotDetermineConfigDir,
    #[error("I/O error accessing config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config file (TOML): {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Failed to serialize config data (TOML): {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    #[error("Invalid color name: {0}")]
    InvalidColor(String),
    #[error("Invalid bar weight: {0}. Bar weight must be zero or positive.")]
    InvalidBarWeight(f64),
    #[error("Invalid rest duration: {0} seconds. Use a value between 1 and 3600.")]
    InvalidRestSeconds(u32),
}

#[derive(
    Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Units {
    #[default]
    Metric, // kg, cm, km
    Imperial, // lbs, in, mi
}

/// Which plate denominations the plate calculator assumes are on the rack.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlateSet {
    #[default]
    Metric,
    Imperial,
}

// Define standard colors using strum for easy iteration/parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter)]
pub enum StandardColor {
    Black,
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
    White,
    DarkGrey,
    DarkRed,
    DarkGreen,
    DarkYellow,
    DarkBlue,
    DarkMagenta,
    DarkCyan,
    Grey,
}

// Helper to convert our enum to comfy_table::Color
impl From<StandardColor> for Color {
    fn from(value: StandardColor) -> Self {
        match value {
            StandardColor::Black => Self::Black,
            StandardColor::Red => Self::Red,
            StandardColor::Green => Self::Green,
            StandardColor::Yellow => Self::Yellow,
            StandardColor::Blue => Self::Blue,
            StandardColor::Magenta => Self::Magenta,
            StandardColor::Cyan => Self::Cyan,
            StandardColor::White => Self::White,
            StandardColor::DarkGrey => Self::DarkGrey,
            StandardColor::DarkRed => Self::DarkRed,
            StandardColor::DarkGreen => Self::DarkGreen,
            StandardColor::DarkYellow => Self::DarkYellow,
            StandardColor::DarkBlue => Self::DarkBlue,
            StandardColor::DarkMagenta => Self::DarkMagenta,
            StandardColor::DarkCyan => Self::DarkCyan,
            StandardColor::Grey => Self::Grey,
        }
    }
}

// Helper to parse a string into our StandardColor enum
pub fn parse_color(color_str: &str) -> Result<StandardColor, ConfigError> {
    for color in StandardColor::iter() {
        if format!("{color:?}").eq_ignore_ascii_case(color_str) {
            return Ok(color);
        }
    }
    Err(ConfigError::InvalidColor(color_str.to_string()))
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)] // Ensure defaults are used if fields are missing
pub struct Theme {
    pub header_color: String,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            header_color: "Green".to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct BillingConfig {
    pub stripe_secret_key: Option<String>,
    pub webhook_secret: Option<String>,
    pub price_id: Option<String>,
    /// Origin used for checkout success/cancel and portal return URLs.
    pub base_url: String,
    /// Maximum age of a webhook signature timestamp.
    pub webhook_tolerance_secs: i64,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            stripe_secret_key: None,
            webhook_secret: None,
            price_id: None,
            base_url: "http://localhost:3000".to_string(),
            webhook_tolerance_secs: 300,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct AiConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub workout_max_tokens: u32,
    pub insights_max_tokens: u32,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "claude-sonnet-4-20250514".to_string(),
            workout_max_tokens: 2048,
            insights_max_tokens: 1024,
        }
    }
}

// Environment values win over the file and are never written back to it.
fn env_or(var: &str, file_value: Option<&String>) -> Option<String> {
    std::env::var(var)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .or_else(|| file_value.cloned())
}

impl BillingConfig {
    pub fn secret_key(&self) -> Option<String> {
        env_or(STRIPE_SECRET_ENV_VAR, self.stripe_secret_key.as_ref())
    }

    pub fn webhook_secret(&self) -> Option<String> {
        env_or(STRIPE_WEBHOOK_ENV_VAR, self.webhook_secret.as_ref())
    }

    pub fn price_id(&self) -> Option<String> {
        env_or(STRIPE_PRICE_ENV_VAR, self.price_id.as_ref())
    }
}

impl AiConfig {
    pub fn api_key(&self) -> Option<String> {
        env_or(ANTHROPIC_KEY_ENV_VAR, self.api_key.as_ref())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)] // Ensure defaults are used if fields are missing
pub struct Config {
    /// Display units used when no profile is signed in.
    pub units: Units,
    pub bar_weight_kg: f64,
    pub plate_set: PlateSet,
    pub default_rest_seconds: u32,
    /// Bearer token of the signed-in user, if any.
    pub session_token: Option<String>,

    pub billing: BillingConfig,
    pub ai: AiConfig,

    // Theming
    pub theme: Theme,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            units: Units::default(),
            bar_weight_kg: 20.0,
            plate_set: PlateSet::default(),
            default_rest_seconds: 90,
            session_token: None,
            billing: BillingConfig::default(),
            ai: AiConfig::default(),
            theme: Theme::default(),
        }
    }
}

impl Config {
    /// Validates and sets the bar weight.
    /// # Errors
    /// Returns `ConfigError::InvalidBarWeight` for negative or non-finite values.
    pub fn set_bar_weight(&mut self, weight_kg: f64) -> Result<(), ConfigError> {
        if !weight_kg.is_finite() || weight_kg < 0.0 {
            return Err(ConfigError::InvalidBarWeight(weight_kg));
        }
        self.bar_weight_kg = weight_kg;
        Ok(())
    }

    /// Validates and sets the default rest timer length.
    /// # Errors
    /// Returns `ConfigError::InvalidRestSeconds` outside `1..=3600`.
    pub fn set_default_rest_seconds(&mut self, seconds: u32) -> Result<(), ConfigError> {
        if seconds == 0 || seconds > 3600 {
            return Err(ConfigError::InvalidRestSeconds(seconds));
        }
        self.default_rest_seconds = seconds;
        Ok(())
    }
}

/// Determines the path to the configuration file.
/// Exposed at crate root as `get_config_path_util`
pub fn get_config_path() -> Result<PathBuf, ConfigError> {
    let config_dir_override = std::env::var(CONFIG_ENV_VAR).ok();

    let config_dir_path = if let Some(path_str) = config_dir_override {
        let path = PathBuf::from(path_str);
        if !path.is_dir() {
            warn!(
                "Environment variable {} points to '{}', which is not a directory. Trying to create it.",
                CONFIG_ENV_VAR,
                path.display()
            );
            fs::create_dir_all(&path)?;
        }
        path
    } else {
        let base_config_dir = dirs::config_dir().ok_or(ConfigError::CannotDetermineConfigDir)?;
        base_config_dir.join(APP_DIR_NAME)
    };

    if !config_dir_path.exists() {
        fs::create_dir_all(&config_dir_path)?;
    }

    Ok(config_dir_path.join(CONFIG_FILE_NAME))
}

/// Loads the configuration from the TOML file at the given path.
/// A missing file is created with defaults.
/// Exposed at crate root as `load_config_util`
pub fn load(config_path: &Path) -> Result<Config, ConfigError> {
    if config_path.exists() {
        let config_content = fs::read_to_string(config_path)?;
        let config: Config = toml::from_str(&config_content).map_err(ConfigError::TomlParse)?;
        Ok(config)
    } else {
        debug!("No config at {}, writing defaults", config_path.display());
        let default_config = Config::default();
        save(config_path, &default_config)?;
        Ok(default_config)
    }
}

/// Saves the configuration to the TOML file.
/// Exposed at crate root as `save_config_util`
pub fn save(config_path: &Path, config: &Config) -> Result<(), ConfigError> {
    if let Some(parent_dir) = config_path.parent() {
        if !parent_dir.exists() {
            fs::create_dir_all(parent_dir)?;
        }
    }
    let config_content = toml::to_string_pretty(config).map_err(ConfigError::TomlSerialize)?;
    fs::write(config_path, config_content)?;
    Ok(())
}
