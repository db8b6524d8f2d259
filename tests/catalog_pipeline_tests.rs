//! Integration tests for the catalog pipeline contracts
//!
//! These tests pin down the rules the scanner and analyzer agree on:
//! - Issue keys and severities
//! - Canonical copy selection among duplicates
//! - Resolution tiers and quality floors
//! - Episode gap detection
//! - Batch accounting

// ============================================================================
// Issue Key Tests
// ============================================================================

/// Issue kinds the analyzer can record
const ISSUE_KINDS: &[&str] = &["duplicate", "low_res", "missing_episode"];

mod issue_keys {
    use super::*;

    /// Deterministic key for a duplicate group
    fn duplicate_key(fingerprint: &str) -> String {
        format!("duplicate:{}", fingerprint)
    }

    /// Deterministic key for a quality finding
    fn low_res_key(path: &str) -> String {
        format!("low_res:{}", path)
    }

    /// Deterministic key for an episode gap
    fn missing_episode_key(show: &str, season: i64, episode: i64) -> String {
        format!("missing_episode:{}:{}:{}", show.to_lowercase(), season, episode)
    }

    #[test]
    fn test_keys_are_stable_across_runs() {
        assert_eq!(duplicate_key("abc123"), duplicate_key("abc123"));
        assert_eq!(
            missing_episode_key("The Expanse", 2, 7),
            missing_episode_key("The Expanse", 2, 7),
        );
    }

    #[test]
    fn test_show_casing_does_not_split_keys() {
        // The same gap reported from differently-cased paths must land on
        // the same issue row
        assert_eq!(
            missing_episode_key("The Expanse", 2, 7),
            missing_episode_key("the expanse", 2, 7),
        );
    }

    #[test]
    fn test_keys_differ_between_kinds() {
        let mut keys = vec![
            duplicate_key("fp"),
            low_res_key("/movies/fp.mkv"),
            missing_episode_key("fp", 1, 1),
        ];
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), 3, "each kind keys its own namespace");
    }

    #[test]
    fn test_every_kind_has_a_snake_case_name() {
        for kind in ISSUE_KINDS {
            assert!(kind.chars().all(|c| c.is_ascii_lowercase() || c == '_'));
        }
    }
}

// ============================================================================
// Canonical Copy Selection Tests
// ============================================================================

mod canonical_selection {
    /// A copy inside one duplicate group
    #[derive(Debug, Clone)]
    struct Copy {
        path: String,
        size_bytes: i64,
        height: Option<i64>,
        bitrate_kbps: Option<i64>,
    }

    impl Copy {
        fn new(path: &str, size: i64, height: Option<i64>, kbps: Option<i64>) -> Self {
            Self {
                path: path.to_string(),
                size_bytes: size,
                height,
                bitrate_kbps: kbps,
            }
        }
    }

    /// Keep order: resolution, then bitrate, then size, then path. Missing
    /// metadata ranks below every known value.
    fn keep_order(a: &Copy, b: &Copy) -> std::cmp::Ordering {
        let height = |c: &Copy| c.height.unwrap_or(-1);
        let bitrate = |c: &Copy| c.bitrate_kbps.unwrap_or(-1);
        height(b)
            .cmp(&height(a))
            .then_with(|| bitrate(b).cmp(&bitrate(a)))
            .then_with(|| b.size_bytes.cmp(&a.size_bytes))
            .then_with(|| a.path.cmp(&b.path))
    }

    fn pick_canonical(copies: &mut Vec<Copy>) -> Copy {
        copies.sort_by(keep_order);
        copies[0].clone()
    }

    fn reclaimable(copies: &[Copy], canonical: &Copy) -> i64 {
        copies
            .iter()
            .filter(|c| c.path != canonical.path)
            .map(|c| c.size_bytes)
            .sum()
    }

    #[test]
    fn test_resolution_wins_first() {
        let mut copies = vec![
            Copy::new("/m/a-720p.mkv", 9_000_000_000, Some(720), Some(8000)),
            Copy::new("/m/a-1080p.mkv", 2_000_000_000, Some(1080), Some(3000)),
        ];
        let canonical = pick_canonical(&mut copies);
        assert_eq!(canonical.path, "/m/a-1080p.mkv", "resolution beats bitrate and size");
    }

    #[test]
    fn test_bitrate_breaks_resolution_ties() {
        let mut copies = vec![
            Copy::new("/m/web.mkv", 4_000_000_000, Some(1080), Some(4000)),
            Copy::new("/m/bluray.mkv", 3_000_000_000, Some(1080), Some(9000)),
        ];
        let canonical = pick_canonical(&mut copies);
        assert_eq!(canonical.path, "/m/bluray.mkv");
    }

    #[test]
    fn test_size_breaks_bitrate_ties() {
        let mut copies = vec![
            Copy::new("/m/short.mkv", 2_000_000_000, Some(1080), Some(8000)),
            Copy::new("/m/extended.mkv", 3_000_000_000, Some(1080), Some(8000)),
        ];
        let canonical = pick_canonical(&mut copies);
        assert_eq!(canonical.path, "/m/extended.mkv");
    }

    #[test]
    fn test_path_is_the_final_deterministic_tiebreak() {
        let mut copies = vec![
            Copy::new("/mnt/two/film.mkv", 1_000, Some(1080), Some(8000)),
            Copy::new("/mnt/one/film.mkv", 1_000, Some(1080), Some(8000)),
        ];
        let first = pick_canonical(&mut copies.clone());
        assert_eq!(first.path, "/mnt/one/film.mkv", "lexicographically smaller path wins");

        // Input order must not matter
        copies.reverse();
        let second = pick_canonical(&mut copies);
        assert_eq!(first.path, second.path);
    }

    #[test]
    fn test_unknown_resolution_never_beats_known() {
        let mut copies = vec![
            Copy::new("/m/unprobed.mkv", 9_000_000_000, None, None),
            Copy::new("/m/known.mkv", 1_000_000_000, Some(480), Some(900)),
        ];
        let canonical = pick_canonical(&mut copies);
        assert_eq!(canonical.path, "/m/known.mkv");
    }

    #[test]
    fn test_three_copy_scenario() {
        // A 720p encode and two 1080p encodes of the same film
        let mut copies = vec![
            Copy::new("/movies/Heat (1995)/heat-720p.mkv", 700, Some(720), Some(3000)),
            Copy::new("/movies/Heat (1995)/heat-1080p.mkv", 500, Some(1080), Some(8000)),
            Copy::new("/mnt/backup/heat-1080p.mkv", 900, Some(1080), Some(8000)),
        ];
        let canonical = pick_canonical(&mut copies);
        assert_eq!(canonical.path, "/mnt/backup/heat-1080p.mkv", "bigger 1080p copy wins");
        assert_eq!(reclaimable(&copies, &canonical), 700 + 500);
    }

    #[test]
    fn test_singleton_reclaims_nothing() {
        let copies = vec![Copy::new("/m/only.mkv", 1_000, Some(1080), Some(8000))];
        assert_eq!(reclaimable(&copies, &copies[0]), 0);
    }
}

// ============================================================================
// Resolution Tier Tests
// ============================================================================

mod resolution_tiers {
    /// Tier floors in pixels of height
    const TIERS: &[(&str, i64)] = &[("480p", 480), ("720p", 720), ("1080p", 1080), ("2160p", 2160)];

    fn tier_min_height(tier: &str) -> Option<i64> {
        TIERS.iter().find(|(name, _)| *name == tier).map(|(_, h)| *h)
    }

    /// The tier a height falls into: the highest floor at or below it
    fn height_to_tier(height: i64) -> &'static str {
        TIERS
            .iter()
            .rev()
            .find(|(_, floor)| height >= *floor)
            .map(|(name, _)| *name)
            .unwrap_or("480p")
    }

    fn below_resolution_floor(height: i64, min_tier: &str) -> bool {
        match tier_min_height(min_tier) {
            Some(min) => height < min,
            None => false,
        }
    }

    #[test]
    fn test_exact_heights_map_to_their_tier() {
        assert_eq!(height_to_tier(480), "480p");
        assert_eq!(height_to_tier(720), "720p");
        assert_eq!(height_to_tier(1080), "1080p");
        assert_eq!(height_to_tier(2160), "2160p");
    }

    #[test]
    fn test_between_heights_round_down() {
        // DS9 upscale releases come in 960p; that is a 720p-class file
        assert_eq!(height_to_tier(960), "720p");
        assert_eq!(height_to_tier(1440), "1080p");
        assert_eq!(height_to_tier(576), "480p");
    }

    #[test]
    fn test_tiny_heights_fall_into_the_lowest_tier() {
        assert_eq!(height_to_tier(360), "480p");
        assert_eq!(height_to_tier(240), "480p");
    }

    #[test]
    fn test_at_minimum_is_acceptable() {
        // Exactly meeting the floor is never a finding
        assert!(!below_resolution_floor(1080, "1080p"));
        assert!(!below_resolution_floor(720, "720p"));
    }

    #[test]
    fn test_below_minimum_is_flagged() {
        assert!(below_resolution_floor(1079, "1080p"));
        assert!(below_resolution_floor(720, "1080p"));
    }

    #[test]
    fn test_severity_escalates_only_when_both_are_low() {
        fn severity(res_low: bool, bitrate_low: bool) -> Option<&'static str> {
            match (res_low, bitrate_low) {
                (true, true) => Some("critical"),
                (true, false) | (false, true) => Some("warning"),
                (false, false) => None,
            }
        }

        assert_eq!(severity(true, true), Some("critical"));
        assert_eq!(severity(true, false), Some("warning"));
        assert_eq!(severity(false, true), Some("warning"));
        assert_eq!(severity(false, false), None);
    }
}

// ============================================================================
// Episode Gap Tests
// ============================================================================

mod episode_gaps {
    use std::collections::BTreeSet;

    /// Gaps inside the observed range of a season. Episodes past the
    /// highest seen number are unknowable from files alone.
    fn find_gaps(observed: &[i64]) -> Vec<i64> {
        let seen: BTreeSet<i64> = observed.iter().copied().collect();
        let (Some(&first), Some(&last)) = (seen.first(), seen.last()) else {
            return Vec::new();
        };
        (first..=last).filter(|n| !seen.contains(n)).collect()
    }

    #[test]
    fn test_single_gap() {
        assert_eq!(find_gaps(&[1, 2, 4, 5]), vec![3]);
    }

    #[test]
    fn test_multiple_gaps() {
        assert_eq!(find_gaps(&[2, 3, 5, 6, 9]), vec![4, 7, 8]);
    }

    #[test]
    fn test_complete_season_has_no_gaps() {
        assert_eq!(find_gaps(&[1, 2, 3, 4, 5]), Vec::<i64>::new());
    }

    #[test]
    fn test_single_episode_has_no_gaps() {
        assert_eq!(find_gaps(&[7]), Vec::<i64>::new());
    }

    #[test]
    fn test_range_starts_at_the_lowest_seen_episode() {
        // Nothing before episode 4 was observed, so nothing before it can
        // be called missing
        assert_eq!(find_gaps(&[4, 6]), vec![5]);
    }

    #[test]
    fn test_trailing_episodes_are_not_reported() {
        // A season that really has 20 episodes but stops at 5 on disk
        // reports nothing past 5
        let gaps = find_gaps(&[1, 2, 3, 4, 5]);
        assert!(gaps.is_empty());
    }

    #[test]
    fn test_duplicate_files_for_one_episode_do_not_mask_gaps() {
        // Two copies of episode 2, still missing episode 3
        assert_eq!(find_gaps(&[1, 2, 2, 4]), vec![3]);
    }
}

// ============================================================================
// Batch Accounting Tests
// ============================================================================

mod batch_accounting {
    /// Split n records into full batches plus a remainder
    fn batch_sizes(total: usize, batch_size: usize) -> Vec<usize> {
        let mut sizes = vec![batch_size; total / batch_size];
        if total % batch_size > 0 {
            sizes.push(total % batch_size);
        }
        sizes
    }

    #[test]
    fn test_every_record_lands_in_exactly_one_batch() {
        for total in [0, 1, 49, 50, 51, 137] {
            let sizes = batch_sizes(total, 50);
            assert_eq!(sizes.iter().sum::<usize>(), total, "no record dropped for {}", total);
        }
    }

    #[test]
    fn test_only_the_last_batch_may_be_short() {
        let sizes = batch_sizes(137, 50);
        assert_eq!(sizes, vec![50, 50, 37]);
    }

    #[test]
    fn test_a_failed_batch_has_a_known_size() {
        // When a write fails the whole batch is unpersisted, never part
        // of it
        let sizes = batch_sizes(5, 2);
        for size in sizes {
            assert!(size == 2 || size == 1);
        }
    }
}

// ============================================================================
// Scan Filtering Tests
// ============================================================================

mod scan_filtering {
    use glob::{MatchOptions, Pattern};

    const OPTIONS: MatchOptions = MatchOptions {
        case_sensitive: false,
        require_literal_separator: false,
        require_literal_leading_dot: false,
    };

    fn extension_allowed(filename: &str, allowed: &[&str]) -> bool {
        std::path::Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|ext| allowed.iter().any(|a| a.eq_ignore_ascii_case(ext)))
            .unwrap_or(false)
    }

    fn ignored(filename: &str, patterns: &[&str]) -> bool {
        patterns
            .iter()
            .any(|p| Pattern::new(p).unwrap().matches_with(filename, OPTIONS))
    }

    #[test]
    fn test_extension_check_ignores_case() {
        let allowed = ["mkv", "mp4"];
        assert!(extension_allowed("Movie.MKV", &allowed));
        assert!(extension_allowed("movie.mkv", &allowed));
        assert!(!extension_allowed("movie.iso", &allowed));
        assert!(!extension_allowed("no-extension", &allowed));
    }

    #[test]
    fn test_sample_pattern_catches_casing_variants() {
        let patterns = ["*sample*"];
        assert!(ignored("movie-sample.mkv", &patterns));
        assert!(ignored("Movie-SAMPLE.mkv", &patterns));
        assert!(ignored("sample.mkv", &patterns));
        assert!(!ignored("movie.mkv", &patterns));
    }

    #[test]
    fn test_partial_download_pattern() {
        let patterns = ["*.partial"];
        assert!(ignored("episode.mkv.partial", &patterns));
        assert!(!ignored("episode.mkv", &patterns));
    }

    #[test]
    fn test_trailer_scenario() {
        // A typical extras folder next to the feature
        let patterns = ["*sample*", "*trailer*"];
        let files = [
            "Dune.Part.Two.2024.2160p.mkv",
            "Dune.Part.Two.2024.Trailer.mkv",
            "dune-sample.mkv",
        ];
        let kept: Vec<_> = files.iter().filter(|f| !ignored(f, &patterns)).collect();
        assert_eq!(kept, vec![&"Dune.Part.Two.2024.2160p.mkv"]);
    }
}

// ============================================================================
// Run Summary Tests
// ============================================================================

mod run_summaries {
    /// Per-file outcomes folded into the final accounting
    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Outcome {
        Persisted,
        Unreadable,
    }

    fn tally(outcomes: &[Outcome]) -> (u64, u64) {
        let scanned = outcomes.iter().filter(|o| **o == Outcome::Persisted).count() as u64;
        let failed = outcomes.iter().filter(|o| **o == Outcome::Unreadable).count() as u64;
        (scanned, failed)
    }

    #[test]
    fn test_failures_do_not_hide_successes() {
        let outcomes = [
            Outcome::Persisted,
            Outcome::Unreadable,
            Outcome::Persisted,
            Outcome::Persisted,
        ];
        assert_eq!(tally(&outcomes), (3, 1));
    }

    #[test]
    fn test_every_file_is_accounted_for() {
        let outcomes = [Outcome::Persisted, Outcome::Unreadable, Outcome::Unreadable];
        let (scanned, failed) = tally(&outcomes);
        assert_eq!(scanned + failed, outcomes.len() as u64);
    }
}
