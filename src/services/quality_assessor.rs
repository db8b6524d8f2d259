//! Quality assessment pass
//!
//! Flags files whose probed quality sits below the configured floors:
//! vertical resolution under the minimum tier, or bitrate under the floor
//! for the file's own tier. A file below both is critical instead of a
//! warning. Files with no probed height are never judged; null metadata
//! means unknown, not bad.

use crate::config::QualityThresholds;
use crate::db::{CreateIssue, IssueSeverity, MediaFileRecord};

/// Resolution tiers by minimum vertical height, ascending
pub const RESOLUTION_TIERS: &[(&str, i64)] = &[
    ("480p", 480),
    ("576p", 576),
    ("720p", 720),
    ("1080p", 1080),
    ("2160p", 2160),
];

/// Height floor for a named tier, if the tier is known
pub fn tier_min_height(tier: &str) -> Option<i64> {
    RESOLUTION_TIERS
        .iter()
        .find(|(name, _)| *name == tier)
        .map(|(_, height)| *height)
}

/// Normalize a configured tier name. Marketing aliases and bare heights
/// ("4K", "UHD", "1080") map onto the canonical tier names; anything else
/// is lowercased and left for [`tier_min_height`] to accept or reject.
pub fn normalize_tier(raw: &str) -> String {
    match raw.to_uppercase().as_str() {
        "4K" | "UHD" | "2160" => "2160p".to_string(),
        "1080" => "1080p".to_string(),
        "720" => "720p".to_string(),
        "576" => "576p".to_string(),
        "480" | "SD" => "480p".to_string(),
        _ => raw.to_lowercase(),
    }
}

/// The tier a probed height falls into: the highest tier whose floor the
/// height reaches. Anything under 480 lines still counts as 480p.
pub fn height_to_tier(height: i64) -> &'static str {
    RESOLUTION_TIERS
        .iter()
        .rev()
        .find(|(_, floor)| height >= *floor)
        .map(|(name, _)| *name)
        .unwrap_or(RESOLUTION_TIERS[0].0)
}

/// Assess a library snapshot against the configured quality floors
pub fn assess(files: &[MediaFileRecord], thresholds: &QualityThresholds) -> Vec<CreateIssue> {
    let Some(min_height) = tier_min_height(&thresholds.min_resolution) else {
        return Vec::new();
    };

    let mut issues = Vec::new();

    for file in files {
        // Unknown height: neither floor can be judged
        let Some(height) = file.height else {
            continue;
        };

        let mut notes = Vec::new();

        let below_resolution = height < min_height;
        if below_resolution {
            notes.push(format!(
                "height {} is below the {} minimum",
                height, thresholds.min_resolution
            ));
        }

        let tier = height_to_tier(height);
        let below_bitrate = match (file.bitrate_kbps, thresholds.bitrate_floor_for(tier)) {
            (Some(rate), Some(floor)) if rate < floor => {
                notes.push(format!(
                    "{} kbps is below the {} kbps floor for {}",
                    rate, floor, tier
                ));
                true
            }
            _ => false,
        };

        if !below_resolution && !below_bitrate {
            continue;
        }

        // Codec preference is informational; it rides along on an issue
        // that already fired but never raises one itself.
        if let (Some(codec), Some(preferred)) = (&file.codec, &thresholds.preferred_codec) {
            if !codec.eq_ignore_ascii_case(preferred) {
                notes.push(format!("codec {} differs from preferred {}", codec, preferred));
            }
        }

        let severity = if below_resolution && below_bitrate {
            IssueSeverity::Critical
        } else {
            IssueSeverity::Warning
        };

        issues.push(CreateIssue::low_res(&file.path, severity, notes.join("; ")));
    }

    issues
}
