//! Audio transcoding through an external ffmpeg process.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use clap::ValueEnum;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::process::Command;

/// Oldest ffmpeg release the converter is known to work with.
const MIN_FFMPEG_VERSION: f64 = 4.2;

/// Errors that can occur during audio conversion.
#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("ffmpeg not found at '{0}'")]
    FfmpegNotFound(String),

    #[error("ffmpeg {found} is too old, {MIN_FFMPEG_VERSION}+ required")]
    FfmpegTooOld { found: String },

    #[error("ffmpeg version could not be detected")]
    VersionUndetected,

    #[error("ffmpeg failed: {0}")]
    ConversionFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Recognized target formats. Anything else is a configuration error raised
/// before any work begins, never a per-item failure.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Mp3,
    Flac,
    Ogg,
    Opus,
    M4a,
}

impl AudioFormat {
    /// Also the file extension of the final artifact.
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Flac => "flac",
            AudioFormat::Ogg => "ogg",
            AudioFormat::Opus => "opus",
            AudioFormat::M4a => "m4a",
        }
    }

    /// Codec arguments passed to ffmpeg for this format.
    fn codec_args(&self) -> &'static [&'static str] {
        match self {
            AudioFormat::Mp3 => &["-codec:a", "libmp3lame"],
            AudioFormat::Flac => &["-codec:a", "flac"],
            AudioFormat::Ogg => &["-codec:a", "libvorbis"],
            AudioFormat::Opus => &["-codec:a", "libopus"],
            AudioFormat::M4a => &["-codec:a", "aac"],
        }
    }
}

impl std::str::FromStr for AudioFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mp3" => Ok(AudioFormat::Mp3),
            "flac" => Ok(AudioFormat::Flac),
            "ogg" => Ok(AudioFormat::Ogg),
            "opus" => Ok(AudioFormat::Opus),
            "m4a" => Ok(AudioFormat::M4a),
            other => Err(format!("unsupported output format: {}", other)),
        }
    }
}

impl std::fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The external transcoder seam.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Convert `input` into `output` in the given format. On failure the
    /// caller must assume `output` may exist as a corrupt partial file.
    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        format: AudioFormat,
    ) -> Result<(), ConversionError>;
}

/// ffmpeg-backed transcoder.
pub struct FfmpegTranscoder {
    ffmpeg_path: String,
}

impl FfmpegTranscoder {
    pub fn new(ffmpeg_path: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
        }
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        format: AudioFormat,
    ) -> Result<(), ConversionError> {
        if let Some(parent) = output.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let output_status = Command::new(&self.ffmpeg_path)
            .arg("-i")
            .arg(input)
            .args(format.codec_args())
            // best VBR quality; keeps sampled length consistent with the
            // actual length in players
            .args(["-q:a", "0", "-vn", "-y"])
            .arg(output)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output_status.status.success() {
            let stderr = String::from_utf8_lossy(&output_status.stderr);
            return Err(ConversionError::ConversionFailed(format!(
                "ffmpeg returned {}: {}",
                output_status
                    .status
                    .code()
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "signal".to_string()),
                stderr.trim()
            )));
        }

        Ok(())
    }
}

/// Check that ffmpeg exists and is recent enough. Called once during
/// configuration validation, before any pipeline starts.
pub async fn check_ffmpeg(ffmpeg_path: &str) -> Result<(), ConversionError> {
    let output = Command::new(ffmpeg_path)
        .arg("-version")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|_| ConversionError::FfmpegNotFound(ffmpeg_path.to_string()))?;

    let text = format!(
        "{}{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );

    parse_ffmpeg_version(&text)
}

/// Parse `ffmpeg -version` output and enforce the minimum version. Build
/// strings without a parseable number fall back to a copyright-year check.
fn parse_ffmpeg_version(output: &str) -> Result<(), ConversionError> {
    let version_re =
        Regex::new(r"ffmpeg version \D?(\d+)\.(\d+)").expect("valid version regex");

    if let Some(caps) = version_re.captures(output) {
        let major: f64 = caps[1].parse().unwrap_or(0.0);
        let minor: f64 = caps[2].parse().unwrap_or(0.0);
        let version = major + minor / 10.0;
        if version < MIN_FFMPEG_VERSION {
            return Err(ConversionError::FfmpegTooOld {
                found: format!("{}.{}", &caps[1], &caps[2]),
            });
        }
        return Ok(());
    }

    // Nightly builds report a git hash instead of a version number.
    let date_re = Regex::new(r"Copyright \(c\) \d{4}-(\d{4})").expect("valid date regex");
    if let Some(caps) = date_re.captures(output) {
        let year: u32 = caps[1].parse().unwrap_or(0);
        if year >= 2020 {
            return Ok(());
        }
    }

    Err(ConversionError::VersionUndetected)
}
