//! fish-player runtime configuration
//!
//! Built from the bootstrap TOML file, then overridden by command-line flags
//! and their environment variables.

use fish_common::config::{PhraseConfig, TomlConfig};
use std::path::PathBuf;
use std::time::Duration;

/// Values that take precedence over the configuration file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub sound_dir: Option<PathBuf>,
    pub data_dir: Option<PathBuf>,
    pub piper_url: Option<String>,
    pub disable_tts: bool,
}

/// Player configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub sound_dir: PathBuf,
    pub data_dir: PathBuf,
    pub piper_url: String,
    pub enable_tts: bool,
    pub gpio_chip: String,
    pub audio_device: Option<String>,
    pub cycle_interval: Duration,
    pub retention: Duration,
    pub greeting: String,
    pub phrases: Vec<PhraseConfig>,
    pub log_level: String,
}

impl Config {
    pub fn new(file: TomlConfig, overrides: Overrides) -> Self {
        // Data dir follows an overridden sound dir unless it was set on its own
        let sound_dir = overrides.sound_dir.unwrap_or_else(|| file.sound_dir.clone());
        let data_dir = overrides
            .data_dir
            .or_else(|| file.data_dir.clone())
            .unwrap_or_else(|| sound_dir.clone());

        Self {
            cycle_interval: file.cycle_interval(),
            retention: file.retention(),
            sound_dir,
            data_dir,
            piper_url: overrides.piper_url.unwrap_or(file.piper_url),
            enable_tts: file.enable_tts && !overrides.disable_tts,
            gpio_chip: file.gpio_chip,
            audio_device: file.audio_device,
            greeting: file.greeting,
            phrases: file.phrases,
            log_level: file.logging.level,
        }
    }

    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub fn default_log_filter(&self) -> String {
        format!(
            "fish_player={level},fish_common={level}",
            level = self.log_level
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_values_without_overrides() {
        let config = Config::new(TomlConfig::default(), Overrides::default());
        assert_eq!(config.sound_dir, PathBuf::from("/sound-data"));
        assert_eq!(config.data_dir, PathBuf::from("/sound-data"));
        assert_eq!(config.piper_url, "http://piper:5000");
        assert_eq!(config.cycle_interval, Duration::from_secs(60));
        assert!(config.enable_tts);
    }

    #[test]
    fn test_overrides_win() {
        let overrides = Overrides {
            sound_dir: Some(PathBuf::from("/tmp/sounds")),
            piper_url: Some("http://localhost:5000".to_string()),
            disable_tts: true,
            ..Overrides::default()
        };
        let config = Config::new(TomlConfig::default(), overrides);

        assert_eq!(config.sound_dir, PathBuf::from("/tmp/sounds"));
        assert_eq!(config.data_dir, PathBuf::from("/tmp/sounds"));
        assert_eq!(config.piper_url, "http://localhost:5000");
        assert!(!config.enable_tts);
    }

    #[test]
    fn test_file_data_dir_beats_sound_dir_override() {
        let file = TomlConfig {
            data_dir: Some(PathBuf::from("/var/lib/fish")),
            ..TomlConfig::default()
        };
        let overrides = Overrides {
            sound_dir: Some(PathBuf::from("/tmp/sounds")),
            ..Overrides::default()
        };

        let config = Config::new(file, overrides);
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/fish"));
    }

    #[test]
    fn test_log_filter() {
        let config = Config::new(TomlConfig::default(), Overrides::default());
        assert_eq!(
            config.default_log_filter(),
            "fish_player=info,fish_common=info"
        );
    }
}
