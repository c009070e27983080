//! Bootstrap configuration loading
//!
//! Resolution order for the configuration file:
//! 1. Explicit path (command line or `FISH_CONFIG`)
//! 2. `~/.config/fish/config.toml`
//! 3. `/etc/fish/config.toml`
//! 4. Built-in defaults
//!
//! A missing file never stops startup: a warning is logged and defaults apply.
//! A file that exists but does not parse is a configuration error.

use crate::{Error, Result};
use chrono::{DateTime, Datelike, TimeZone, Timelike, Weekday};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit configuration file
pub const CONFIG_ENV_VAR: &str = "FISH_CONFIG";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Directory holding the `.wav`/`.mp3` files the fish can sing
    pub sound_dir: PathBuf,

    /// Directory for `played.json` and `queue.json` (defaults to `sound_dir`)
    pub data_dir: Option<PathBuf>,

    /// Speech synthesis endpoint
    pub piper_url: String,

    /// Speak phrases through speech synthesis (otherwise they are only logged)
    pub enable_tts: bool,

    /// GPIO character device driving the motors
    pub gpio_chip: String,

    /// Audio output device name (None = system default)
    pub audio_device: Option<String>,

    /// Seconds between performance cycles
    pub cycle_interval_secs: u64,

    /// Seconds a played item suppresses repeats
    pub retention_secs: u64,

    /// Phrase spoken once at startup (empty = stay quiet)
    pub greeting: String,

    pub logging: LoggingConfig,

    /// Weighted phrases for the random speech choice
    pub phrases: Vec<PhraseConfig>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

/// One entry of the phrase book
///
/// A phrase with `hours` or `weekdays` is only eligible inside that window;
/// `boost` is added to its weight while it is.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PhraseConfig {
    pub text: String,
    #[serde(default = "default_weight")]
    pub weight: u32,
    /// Inclusive local hour range, e.g. `[11, 12]`
    #[serde(default)]
    pub hours: Option<(u32, u32)>,
    #[serde(default)]
    pub weekdays: Vec<Weekday>,
    #[serde(default)]
    pub boost: u32,
}

fn default_weight() -> u32 {
    50
}

impl PhraseConfig {
    pub fn new(text: impl Into<String>, weight: u32) -> Self {
        Self {
            text: text.into(),
            weight,
            hours: None,
            weekdays: Vec::new(),
            boost: 0,
        }
    }

    /// Draw weight at the given local time; 0 outside the phrase's window
    pub fn weight_at<Tz: TimeZone>(&self, at: &DateTime<Tz>) -> u32 {
        if self.hours.is_none() && self.weekdays.is_empty() {
            return self.weight;
        }

        let in_hours = self
            .hours
            .map_or(true, |(start, end)| (start..=end).contains(&at.hour()));
        let on_day = self.weekdays.is_empty() || self.weekdays.contains(&at.weekday());

        if in_hours && on_day {
            self.weight.saturating_add(self.boost)
        } else {
            0
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            sound_dir: PathBuf::from("/sound-data"),
            data_dir: None,
            piper_url: "http://piper:5000".to_string(),
            enable_tts: true,
            gpio_chip: "gpiochip0".to_string(),
            audio_device: None,
            cycle_interval_secs: 60,
            retention_secs: 60 * 60,
            greeting: "Hallo Ich bins! Bin wieder da und ready!".to_string(),
            logging: LoggingConfig::default(),
            phrases: default_phrases(),
        }
    }
}

fn default_phrases() -> Vec<PhraseConfig> {
    let mut phrases: Vec<PhraseConfig> = [
        ("Hallo, I bims. Vong Fisch Sprache her.", 50),
        ("Haben wir noch Peps da?", 50),
        ("Bruder, muss los! Ab ins Wasser!", 50),
        ("Technik, die begeistert. Das bin ich!", 50),
        ("Einfach mal machen!", 50),
        ("Schauen wir mal was wird. Was wird.", 50),
        ("Warum liegt hier Stroh?", 50),
        ("Der Gerät wird nie müde. Der Gerät schläft nie ein.", 40),
    ]
    .into_iter()
    .map(|(text, weight)| PhraseConfig::new(text, weight))
    .collect();

    phrases.push(PhraseConfig {
        hours: Some((11, 12)),
        boost: 70,
        ..PhraseConfig::new("Bald ist Mittag", 10)
    });
    phrases.push(PhraseConfig {
        weekdays: vec![Weekday::Wed],
        boost: 80,
        ..PhraseConfig::new("Es ist Mittwoch, meine Kerle.", 50)
    });
    phrases.push(PhraseConfig {
        weekdays: vec![Weekday::Fri],
        boost: 80,
        ..PhraseConfig::new("Freitag ab eins macht jeder seins!", 50)
    });
    phrases
}

impl TomlConfig {
    /// Parse a configuration file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Parse configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TomlConfig =
            toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration following the documented resolution order.
    ///
    /// `explicit` comes from the command line; `FISH_CONFIG` is consulted when it is None.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let source = ConfigSource::resolve(explicit);
        source.log();
        Self::load_from(&source)
    }

    /// Load from an already resolved source without logging
    pub fn load_from(source: &ConfigSource) -> Result<Self> {
        match source {
            ConfigSource::File(path) => Self::from_file(path),
            ConfigSource::Missing(_) | ConfigSource::Defaults => Ok(Self::default()),
        }
    }

    pub fn cycle_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.cycle_interval_secs)
    }

    pub fn retention(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.retention_secs)
    }

    fn validate(&self) -> Result<()> {
        if self.cycle_interval_secs == 0 {
            return Err(Error::Config(
                "cycle_interval_secs must be greater than zero".to_string(),
            ));
        }
        if self.piper_url.trim().is_empty() {
            return Err(Error::Config("piper_url must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Where the configuration comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// An existing file
    File(PathBuf),
    /// An explicitly named file that does not exist
    Missing(PathBuf),
    /// No file anywhere
    Defaults,
}

impl ConfigSource {
    /// Apply the resolution order
    pub fn resolve(explicit: Option<&Path>) -> Self {
        let explicit = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from));

        match explicit {
            Some(path) if path.exists() => ConfigSource::File(path),
            Some(path) => ConfigSource::Missing(path),
            None => discover_config_file().map_or(ConfigSource::Defaults, ConfigSource::File),
        }
    }

    /// Report the source; call once logging is up
    pub fn log(&self) {
        match self {
            ConfigSource::File(path) => info!("Loading configuration from {}", path.display()),
            ConfigSource::Missing(path) => warn!(
                "Configuration file {} not found, using built-in defaults",
                path.display()
            ),
            ConfigSource::Defaults => {
                warn!("No configuration file found, using built-in defaults")
            }
        }
    }
}

/// First existing configuration file among the platform locations
fn discover_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("fish").join("config.toml"));
    let system_config = PathBuf::from("/etc/fish/config.toml");

    user_config
        .into_iter()
        .chain(std::iter::once(system_config))
        .find(|path| path.exists())
}
