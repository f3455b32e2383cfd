mod file_config;

pub use file_config::FileConfig;

use std::path::PathBuf;

use clap::ValueEnum;
use thiserror::Error;

use crate::convert::{self, AudioFormat, ConversionError};

/// Default width of the download pool.
pub const DEFAULT_POOL_SIZE: usize = 4;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config file {path}: {reason}")]
    File { path: PathBuf, reason: String },

    #[error("unsupported output format: {0}")]
    UnsupportedFormat(String),

    #[error("pool size must be at least 1")]
    ZeroPool,

    #[error(transparent)]
    Ffmpeg(#[from] ConversionError),
}

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub output_dir: Option<PathBuf>,
    pub temp_dir: Option<PathBuf>,
    pub format: Option<AudioFormat>,
    pub pool_size: Option<usize>,
    pub ffmpeg_path: Option<String>,
}

/// Resolved runtime settings for one invocation.
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    pub output_dir: PathBuf,
    pub temp_dir: PathBuf,
    pub format: AudioFormat,
    pub pool_size: usize,
    pub ffmpeg_path: String,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            temp_dir: PathBuf::from("./Temp"),
            format: AudioFormat::Mp3,
            pool_size: DEFAULT_POOL_SIZE,
            ffmpeg_path: "ffmpeg".to_string(),
        }
    }
}

impl DownloadConfig {
    /// Resolve configuration from CLI arguments and optional TOML file
    /// config. TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self, ConfigError> {
        let file = file_config.unwrap_or_default();
        let defaults = Self::default();

        let output_dir = file
            .output_dir
            .map(PathBuf::from)
            .or_else(|| cli.output_dir.clone())
            .unwrap_or(defaults.output_dir);

        let temp_dir = file
            .temp_dir
            .map(PathBuf::from)
            .or_else(|| cli.temp_dir.clone())
            .unwrap_or(defaults.temp_dir);

        let format = match file.format {
            Some(s) => {
                Some(parse_format(&s).ok_or(ConfigError::UnsupportedFormat(s))?)
            }
            None => None,
        }
        .or(cli.format)
        .unwrap_or(defaults.format);

        let pool_size = file
            .pool_size
            .or(cli.pool_size)
            .unwrap_or(defaults.pool_size);
        if pool_size == 0 {
            return Err(ConfigError::ZeroPool);
        }

        let ffmpeg_path = file
            .ffmpeg_path
            .or_else(|| cli.ffmpeg_path.clone())
            .unwrap_or(defaults.ffmpeg_path);

        Ok(Self {
            output_dir,
            temp_dir,
            format,
            pool_size,
            ffmpeg_path,
        })
    }

    /// Environment checks that need the resolved settings: the converter
    /// binary must exist and be recent enough before any download starts.
    pub async fn validate(&self) -> Result<(), ConfigError> {
        convert::check_ffmpeg(&self.ffmpeg_path).await?;
        Ok(())
    }
}

/// Parses an audio format string using clap's ValueEnum trait.
fn parse_format(s: &str) -> Option<AudioFormat> {
    AudioFormat::from_str(s, true).ok()
}
