//! Duplicate detection pass
//!
//! Files sharing one content fingerprint form a duplicate group. Each group
//! with two or more members becomes a single issue that names every copy,
//! the one worth keeping, and how many bytes the rest would reclaim.
//!
//! The keeper is chosen deterministically: highest resolution, then highest
//! bitrate, then largest file, then the lexicographically smallest path.
//! Unknown resolution or bitrate sorts below any known value.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::db::{CreateIssue, MediaFileRecord};

/// Find duplicate groups in a library snapshot
pub fn detect(files: &[MediaFileRecord]) -> Vec<CreateIssue> {
    let mut groups: HashMap<&str, Vec<&MediaFileRecord>> = HashMap::new();
    for file in files {
        groups.entry(file.fingerprint.as_str()).or_default().push(file);
    }

    let mut fingerprints: Vec<&str> = groups
        .iter()
        .filter(|(_, members)| members.len() >= 2)
        .map(|(fingerprint, _)| *fingerprint)
        .collect();
    fingerprints.sort_unstable();

    let mut issues = Vec::with_capacity(fingerprints.len());
    for fingerprint in fingerprints {
        let mut members = groups.remove(fingerprint).unwrap_or_default();
        members.sort_by(|a, b| keep_order(a, b));

        let canonical = members[0];
        let reclaimable: i64 = members[1..].iter().map(|file| file.size_bytes).sum();
        let file_paths: Vec<String> = members.iter().map(|file| file.path.clone()).collect();

        let detail = format!(
            "{} files share the same content; keeping {} reclaims {} bytes",
            members.len(),
            canonical.path,
            reclaimable
        );

        issues.push(CreateIssue::duplicate(
            fingerprint,
            file_paths,
            canonical.path.clone(),
            reclaimable,
            detail,
        ));
    }

    issues
}

/// Keep preference: the file to retain sorts first
fn keep_order(a: &MediaFileRecord, b: &MediaFileRecord) -> Ordering {
    let height = |file: &MediaFileRecord| file.height.unwrap_or(-1);
    let bitrate = |file: &MediaFileRecord| file.bitrate_kbps.unwrap_or(-1);

    height(b)
        .cmp(&height(a))
        .then_with(|| bitrate(b).cmp(&bitrate(a)))
        .then_with(|| b.size_bytes.cmp(&a.size_bytes))
        .then_with(|| a.path.cmp(&b.path))
}
