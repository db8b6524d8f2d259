//! Series completeness pass
//!
//! For every (show, season) seen in a tv library, episodes between the
//! lowest and highest observed number should all be present; each hole in
//! that range becomes a missing_episode issue. Episodes beyond the highest
//! observed number are unknowable without an external episode guide, so
//! nothing after the last seen episode is ever reported.
//!
//! Only files with a fully parsed (show, season, episode) identity take
//! part. The issues reference no files: the finding is about absence.

use std::collections::{BTreeMap, BTreeSet};

use crate::db::{CreateIssue, MediaFileRecord, MediaType};

/// Find episode gaps in a library snapshot
pub fn detect(files: &[MediaFileRecord]) -> Vec<CreateIssue> {
    // Seasons keyed case-insensitively; the display title is the first one
    // seen in path order.
    let mut seasons: BTreeMap<(String, i64), (String, BTreeSet<i64>)> = BTreeMap::new();

    for file in files {
        if file.media_type != MediaType::Tv {
            continue;
        }
        let (Some(title), Some(season), Some(episode)) =
            (&file.show_title, file.season, file.episode)
        else {
            continue;
        };

        seasons
            .entry((title.to_lowercase(), season))
            .or_insert_with(|| (title.clone(), BTreeSet::new()))
            .1
            .insert(episode);
    }

    let mut issues = Vec::new();
    for ((_, season), (title, episodes)) in &seasons {
        let (Some(first), Some(last)) = (episodes.first(), episodes.last()) else {
            continue;
        };
        for episode in *first..=*last {
            if !episodes.contains(&episode) {
                issues.push(CreateIssue::missing_episode(title, *season, episode));
            }
        }
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn episode(title: &str, season: i64, episode: i64) -> MediaFileRecord {
        let path = format!("/tv/{}/s{:02}e{:02}.mkv", title.to_lowercase(), season, episode);
        MediaFileRecord {
            id: Uuid::new_v4(),
            path: path.clone(),
            media_type: MediaType::Tv,
            size_bytes: 900,
            fingerprint: format!("fp-{}", path),
            width: Some(1920),
            height: Some(1080),
            codec: Some("h264".to_string()),
            bitrate_kbps: Some(5000),
            duration_secs: Some(2600.0),
            container: "mkv".to_string(),
            show_title: Some(title.to_string()),
            season: Some(season),
            episode: Some(episode),
            created_at: Utc::now(),
            scanned_at: Utc::now(),
        }
    }

    fn unparsed_tv(path: &str) -> MediaFileRecord {
        let mut record = episode("ignored", 1, 1);
        record.path = path.to_string();
        record.show_title = None;
        record.season = None;
        record.episode = None;
        record
    }

    #[test]
    fn gap_inside_the_observed_range_is_reported() {
        let files = vec![
            episode("The Wire", 1, 1),
            episode("The Wire", 1, 2),
            episode("The Wire", 1, 4),
            episode("The Wire", 1, 5),
        ];

        let issues = detect(&files);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].issue_key, "missing_episode:the wire:1:3");
        assert_eq!(issues[0].show_title.as_deref(), Some("The Wire"));
        assert_eq!(issues[0].season, Some(1));
        assert_eq!(issues[0].episode, Some(3));
        assert!(issues[0].file_paths.is_empty(), "the finding is about a file that does not exist");
    }

    #[test]
    fn every_hole_in_the_range_is_reported() {
        let files = vec![
            episode("Show", 2, 1),
            episode("Show", 2, 4),
            episode("Show", 2, 7),
        ];

        let gaps: Vec<i64> = detect(&files).iter().filter_map(|issue| issue.episode).collect();
        assert_eq!(gaps, vec![2, 3, 5, 6]);
    }

    #[test]
    fn contiguous_season_has_no_issues() {
        let files = vec![episode("Show", 1, 1), episode("Show", 1, 2), episode("Show", 1, 3)];
        assert!(detect(&files).is_empty());
    }

    #[test]
    fn episodes_after_the_last_seen_are_unknowable() {
        // A season that stops at episode 3 may or may not have an episode 4;
        // without an episode guide nothing past the end is reported.
        let files = vec![episode("Show", 1, 1), episode("Show", 1, 2), episode("Show", 1, 3)];
        assert!(detect(&files).is_empty());
    }

    #[test]
    fn seasons_are_checked_independently() {
        let files = vec![
            episode("Show", 1, 1),
            episode("Show", 1, 3),
            episode("Show", 2, 1),
            episode("Show", 2, 2),
        ];

        let issues = detect(&files);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].season, Some(1));
        assert_eq!(issues[0].episode, Some(2));
    }

    #[test]
    fn show_grouping_ignores_title_case() {
        let files = vec![episode("The Wire", 1, 1), episode("the wire", 1, 3)];

        let issues = detect(&files);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].episode, Some(2));
    }

    #[test]
    fn single_observed_episode_yields_nothing() {
        let files = vec![episode("Show", 1, 7)];
        assert!(detect(&files).is_empty());
    }

    #[test]
    fn files_without_identity_are_ignored() {
        let mut movie = episode("ignored", 1, 9);
        movie.media_type = MediaType::Movie;
        movie.show_title = None;

        let files = vec![
            movie,
            unparsed_tv("/tv/raw-capture.mkv"),
            episode("Show", 1, 1),
            episode("Show", 1, 2),
        ];
        assert!(detect(&files).is_empty());
    }
}
