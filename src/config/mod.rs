//! Application configuration management
//!
//! All settings come from environment variables with workable defaults.
//! Validation runs before any scan or analysis work starts; a bad setting
//! fails the run with an error naming the variable.

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::services::quality_assessor::{normalize_tier, tier_min_height};

const DEFAULT_EXTENSIONS: &str = "mkv,mp4,avi,m4v,mov,wmv,flv,webm,mpeg,mpg,ts,m2ts";
const DEFAULT_IGNORE_PATTERNS: &str = "*sample*,*trailer*,*.partial";
const DEFAULT_BITRATE_FLOORS: &str = "2160p=10000,1080p=5000,720p=2500,480p=1000";

/// A setting that cannot be used. Fatal to the run; nothing is scanned or
/// analyzed once one of these surfaces.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("SCANNER_WORKERS must be at least 1 (got {0})")]
    InvalidWorkerCount(usize),

    #[error("SCAN_BATCH_SIZE must be at least 1 (got {0})")]
    InvalidBatchSize(usize),

    #[error("ALLOWED_EXTENSIONS must name at least one extension")]
    EmptyExtensionList,

    #[error("IGNORE_PATTERNS entry '{pattern}' is not a valid glob: {source}")]
    InvalidIgnorePattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("MIN_RESOLUTION '{0}' is not a known resolution tier")]
    UnknownResolutionTier(String),

    #[error("MIN_BITRATE_KBPS entry '{0}' is not of the form tier=kbps")]
    InvalidBitrateEntry(String),

    #[error("scan root '{}' does not exist or is not a directory", .0.display())]
    UnreadableRoot(PathBuf),
}

/// Worker pool and traversal settings for the scanner
#[derive(Debug, Clone)]
pub struct ScanSettings {
    /// Concurrent metadata extraction workers
    pub workers: usize,

    /// File records persisted per transaction
    pub batch_size: usize,

    /// Lowercase extensions accepted by the walk
    pub allowed_extensions: Vec<String>,

    /// Glob patterns excluding files from the walk
    pub ignore_patterns: Vec<String>,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            workers: 4,
            batch_size: 50,
            allowed_extensions: parse_csv(DEFAULT_EXTENSIONS),
            ignore_patterns: parse_csv(DEFAULT_IGNORE_PATTERNS),
        }
    }
}

/// Quality floors for the analyzer
#[derive(Debug, Clone)]
pub struct QualityThresholds {
    /// Lowest acceptable resolution tier, e.g. "720p". Aliases like "4K"
    /// and "SD" are normalized at load time.
    pub min_resolution: String,

    /// Per-tier bitrate floors in kbps. A tier with no entry gets no
    /// bitrate check.
    pub bitrate_floors: Vec<(String, i64)>,

    /// Informational only; never flags an issue on its own
    pub preferred_codec: Option<String>,
}

impl QualityThresholds {
    /// Bitrate floor for a resolution tier, if one is configured
    pub fn bitrate_floor_for(&self, tier: &str) -> Option<i64> {
        self.bitrate_floors
            .iter()
            .find(|(name, _)| name == tier)
            .map(|(_, kbps)| *kbps)
    }
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            min_resolution: "720p".to_string(),
            bitrate_floors: parse_bitrate_floors(DEFAULT_BITRATE_FLOORS)
                .unwrap_or_default(),
            preferred_codec: None,
        }
    }
}

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite catalog path
    pub database_path: PathBuf,

    /// ffprobe binary to invoke for media metadata
    pub ffprobe_path: String,

    pub scan: ScanSettings,

    pub thresholds: QualityThresholds,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let config = Self {
            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "./data/curator.db".to_string())
                .into(),

            ffprobe_path: env::var("FFPROBE_PATH").unwrap_or_else(|_| "ffprobe".to_string()),

            scan: ScanSettings {
                workers: env::var("SCANNER_WORKERS")
                    .unwrap_or_else(|_| "4".to_string())
                    .parse()
                    .context("Invalid SCANNER_WORKERS")?,

                batch_size: env::var("SCAN_BATCH_SIZE")
                    .unwrap_or_else(|_| "50".to_string())
                    .parse()
                    .context("Invalid SCAN_BATCH_SIZE")?,

                allowed_extensions: parse_csv(
                    &env::var("ALLOWED_EXTENSIONS")
                        .unwrap_or_else(|_| DEFAULT_EXTENSIONS.to_string()),
                ),

                ignore_patterns: parse_csv(
                    &env::var("IGNORE_PATTERNS")
                        .unwrap_or_else(|_| DEFAULT_IGNORE_PATTERNS.to_string()),
                ),
            },

            thresholds: QualityThresholds {
                min_resolution: normalize_tier(
                    &env::var("MIN_RESOLUTION").unwrap_or_else(|_| "720p".to_string()),
                ),

                bitrate_floors: parse_bitrate_floors(
                    &env::var("MIN_BITRATE_KBPS")
                        .unwrap_or_else(|_| DEFAULT_BITRATE_FLOORS.to_string()),
                )?,

                preferred_codec: env::var("PREFERRED_CODEC")
                    .ok()
                    .map(|codec| codec.to_lowercase()),
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Check every setting before any work begins
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scan.workers == 0 {
            return Err(ConfigError::InvalidWorkerCount(self.scan.workers));
        }
        if self.scan.batch_size == 0 {
            return Err(ConfigError::InvalidBatchSize(self.scan.batch_size));
        }
        if self.scan.allowed_extensions.is_empty() {
            return Err(ConfigError::EmptyExtensionList);
        }
        for pattern in &self.scan.ignore_patterns {
            glob::Pattern::new(pattern).map_err(|source| ConfigError::InvalidIgnorePattern {
                pattern: pattern.clone(),
                source,
            })?;
        }
        if tier_min_height(&self.thresholds.min_resolution).is_none() {
            return Err(ConfigError::UnknownResolutionTier(
                self.thresholds.min_resolution.clone(),
            ));
        }
        Ok(())
    }
}

fn parse_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|entry| entry.trim().to_lowercase())
        .filter(|entry| !entry.is_empty())
        .collect()
}

fn parse_bitrate_floors(raw: &str) -> Result<Vec<(String, i64)>, ConfigError> {
    let mut floors = Vec::new();
    for entry in raw.split(',').map(str::trim).filter(|entry| !entry.is_empty()) {
        let invalid = || ConfigError::InvalidBitrateEntry(entry.to_string());
        let (tier, kbps) = entry.split_once('=').ok_or_else(invalid)?;
        let tier = normalize_tier(tier.trim());
        let kbps: i64 = kbps.trim().parse().map_err(|_| invalid())?;
        if tier_min_height(&tier).is_none() || kbps <= 0 {
            return Err(invalid());
        }
        floors.push((tier, kbps));
    }
    Ok(floors)
}
