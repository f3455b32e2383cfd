use serde::Deserialize;
use std::path::Path;

use super::ConfigError;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub output_dir: Option<String>,
    pub temp_dir: Option<String>,
    pub format: Option<String>,
    pub pool_size: Option<usize>,
    pub ffmpeg_path: Option<String>,

    // Catalog credentials; environment variables take precedence.
    pub spotify_client_id: Option<String>,
    pub spotify_client_secret: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::File {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::File {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}
