//! Media metadata probing via ffprobe
//!
//! The extractor talks to a [`MediaProbe`] trait object so tests can stub
//! metadata without a real ffprobe binary or real video files. The shipped
//! implementation shells out to ffprobe and reads its JSON output.
//!
//! Probing is best-effort throughout: a file ffprobe cannot parse still
//! gets cataloged, just with null quality fields.

use std::path::Path;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

/// Quality metadata read from a media container. Every field is optional;
/// absence means the probe could not determine it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaInfo {
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub codec: Option<String>,
    pub bitrate_kbps: Option<i64>,
    pub duration_secs: Option<f64>,
}

#[async_trait]
pub trait MediaProbe: Send + Sync {
    async fn probe(&self, path: &Path) -> Result<MediaInfo>;
}

/// ffprobe-backed implementation of [`MediaProbe`]
pub struct FfprobeClient {
    ffprobe_path: String,
}

impl FfprobeClient {
    pub fn new(ffprobe_path: impl Into<String>) -> Self {
        Self {
            ffprobe_path: ffprobe_path.into(),
        }
    }

    /// Check whether the configured ffprobe binary runs at all
    pub async fn is_available(&self) -> bool {
        Command::new(&self.ffprobe_path)
            .arg("-version")
            .output()
            .await
            .map(|output| output.status.success())
            .unwrap_or(false)
    }
}

#[async_trait]
impl MediaProbe for FfprobeClient {
    async fn probe(&self, path: &Path) -> Result<MediaInfo> {
        let output = Command::new(&self.ffprobe_path)
            .args([
                "-v",
                "error",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path)
            .output()
            .await
            .with_context(|| format!("failed to run {}", self.ffprobe_path))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("ffprobe failed for {}: {}", path.display(), stderr.trim());
        }

        let raw = String::from_utf8_lossy(&output.stdout);
        let info = parse_ffprobe_output(&raw)
            .with_context(|| format!("unparseable ffprobe output for {}", path.display()))?;

        debug!(
            path = %path.display(),
            width = ?info.width,
            height = ?info.height,
            codec = ?info.codec,
            "Probed media file"
        );

        Ok(info)
    }
}

/// ffprobe JSON output structures. ffprobe prints numeric rate and duration
/// fields as strings.
mod ffprobe {
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    pub struct Output {
        #[serde(default)]
        pub streams: Vec<Stream>,
        pub format: Option<Format>,
    }

    #[derive(Debug, Deserialize)]
    pub struct Stream {
        pub codec_type: Option<String>,
        pub codec_name: Option<String>,
        pub width: Option<i64>,
        pub height: Option<i64>,
        pub bit_rate: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    pub struct Format {
        pub bit_rate: Option<String>,
        pub duration: Option<String>,
    }
}

pub(crate) fn parse_ffprobe_output(raw: &str) -> Result<MediaInfo> {
    let output: ffprobe::Output = serde_json::from_str(raw)?;

    let video = output
        .streams
        .iter()
        .find(|stream| stream.codec_type.as_deref() == Some("video"));

    // Stream-level bitrate is the video track alone; fall back to the
    // container-wide rate when the muxer left it unset.
    let bitrate_bps = video
        .and_then(|stream| stream.bit_rate.as_deref())
        .or_else(|| {
            output
                .format
                .as_ref()
                .and_then(|format| format.bit_rate.as_deref())
        })
        .and_then(|rate| rate.parse::<i64>().ok());

    Ok(MediaInfo {
        width: video.and_then(|stream| stream.width),
        height: video.and_then(|stream| stream.height),
        codec: video.and_then(|stream| stream.codec_name.clone()),
        bitrate_kbps: bitrate_bps.map(|bps| bps / 1000),
        duration_secs: output
            .format
            .as_ref()
            .and_then(|format| format.duration.as_deref())
            .and_then(|duration| duration.parse::<f64>().ok()),
    })
}
