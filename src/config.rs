use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::codec::{EncoderOptions, WebPPreset};

/// File name of the settings file, looked up next to the executable.
pub const CONFIG_FILE_NAME: &str = "webp-filetype.json";

/// Settings for the batch converter.
///
/// # Loading
///
/// ```rust,no_run
/// use webp_filetype::config::Config;
///
/// // From a JSON file
/// let config = Config::load(Some("webp-filetype.json".as_ref())).unwrap();
///
/// // Or use defaults and customize
/// let mut config = Config::default();
/// config.save.quality = 80;
/// config.output.overwrite = true;
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Encoder settings applied to every saved file.
    pub save: SaveConfig,
    /// Where converted files go and what happens to the originals.
    pub output: OutputConfig,
}

/// Encoder settings.
///
/// # Example
///
/// ```rust
/// use webp_filetype::codec::WebPPreset;
/// use webp_filetype::config::SaveConfig;
///
/// let save = SaveConfig { quality: 250, preset: WebPPreset::Drawing, lossless: false };
/// assert_eq!(save.encoder_options().quality, 100);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaveConfig {
    /// 0-100. Ignored in lossless mode, which always uses 100.
    pub quality: u8,
    pub preset: WebPPreset,
    pub lossless: bool,
}

/// Output and behavior configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory for converted files. `None` writes next to each input.
    pub output_dir: Option<PathBuf>,
    /// If `true`, replace existing `.webp` outputs.
    pub overwrite: bool,
    /// If `true`, create a `.bak` backup before an input is replaced in place.
    pub backup_originals: bool,
    /// If `true`, walk into subdirectories of directory arguments.
    pub recursive: bool,
}

impl Default for SaveConfig {
    fn default() -> Self {
        let options = EncoderOptions::default();
        Self {
            quality: options.quality,
            preset: options.preset,
            lossless: options.lossless,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_dir: None,
            overwrite: false,
            backup_originals: true,
            recursive: true,
        }
    }
}

impl SaveConfig {
    /// Codec options for these settings, with quality clamped to 0-100.
    pub fn encoder_options(&self) -> EncoderOptions {
        EncoderOptions {
            quality: self.quality.min(100),
            preset: self.preset,
            lossless: self.lossless,
        }
    }
}

impl Config {
    /// Resolve the config file path, in the same directory as the executable.
    pub fn default_path() -> Result<PathBuf> {
        let exe_path = std::env::current_exe().context("Failed to get executable path")?;
        let exe_dir = exe_path
            .parent()
            .context("Failed to get executable directory")?;
        Ok(exe_dir.join(CONFIG_FILE_NAME))
    }

    /// Load config from the given path, or from the default location.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_path()?,
        };

        if !config_path.exists() {
            log::warn!(
                "Config file not found at {}. Using defaults.",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let contents =
            std::fs::read_to_string(&config_path).context("Failed to read config file")?;
        let config: Config =
            serde_json::from_str(&contents).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Save config to the given path, or to the default location.
    pub fn save(&self, path: Option<&Path>) -> Result<()> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_path()?,
        };

        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(&config_path, contents).context("Failed to write config file")?;
        log::info!("Config saved to {}", config_path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.save.quality, 95);
        assert_eq!(config.save.preset, WebPPreset::Photo);
        assert!(!config.save.lossless);
        assert_eq!(config.output.output_dir, None);
        assert!(!config.output.overwrite);
        assert!(config.output.backup_originals);
        assert!(config.output.recursive);
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);

        let mut config = Config::default();
        config.save.preset = WebPPreset::Icon;
        config.save.lossless = true;
        config.output.output_dir = Some(PathBuf::from("converted"));
        config.save(Some(&path)).unwrap();

        let loaded = Config::load(Some(&path)).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load(Some(&dir.path().join("absent.json"))).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("partial.json");
        fs::write(&path, r#"{ "save": { "preset": "text" } }"#).unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.save.preset, WebPPreset::Text);
        assert_eq!(config.save.quality, 95);
        assert!(config.output.backup_originals);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(Config::load(Some(&path)).is_err());
    }

    #[test]
    fn encoder_options_clamp_quality() {
        let save = SaveConfig { quality: 200, ..SaveConfig::default() };
        assert_eq!(save.encoder_options().quality, 100);
        assert_eq!(SaveConfig::default().encoder_options(), EncoderOptions::default());
    }
}
