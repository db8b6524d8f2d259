//! File metadata extraction
//!
//! Turns one path on disk into a catalog record: content fingerprint,
//! size, container, probed quality fields, and (for tv libraries) the
//! episode identity parsed from the filename.
//!
//! Only the filesystem can fail extraction. Probing and identity parsing
//! are best-effort; their absence leaves null fields, never an error.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::warn;

use crate::db::{CreateMediaFile, MediaType};
use crate::services::filename_parser::parse_name;
use crate::services::fingerprint::compute_fingerprint;
use crate::services::media_probe::{MediaInfo, MediaProbe};

/// A file the extractor could not read. Recoverable at the scan level:
/// the file is logged, counted, and skipped.
#[derive(Debug, thiserror::Error)]
#[error("cannot read {path}: {source}")]
pub struct ExtractionError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// Builds catalog records from files on disk
pub struct MetadataExtractor {
    probe: Arc<dyn MediaProbe>,
}

impl MetadataExtractor {
    pub fn new(probe: Arc<dyn MediaProbe>) -> Self {
        Self { probe }
    }

    /// Extract the catalog record for one file
    pub async fn extract(
        &self,
        path: &Path,
        media_type: MediaType,
    ) -> Result<CreateMediaFile, ExtractionError> {
        let unreadable = |source| ExtractionError {
            path: path.to_path_buf(),
            source,
        };

        let size_bytes = tokio::fs::metadata(path)
            .await
            .map_err(unreadable)?
            .len() as i64;

        // Hashing reads the file in blocking IO
        let fingerprint_path = path.to_path_buf();
        let fingerprint = tokio::task::spawn_blocking(move || compute_fingerprint(&fingerprint_path))
            .await
            .map_err(|join_err| unreadable(std::io::Error::other(join_err)))?
            .map_err(unreadable)?;

        let info = match self.probe.probe(path).await {
            Ok(info) => info,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "Media probe failed, cataloging without quality metadata");
                MediaInfo::default()
            }
        };

        let container = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase())
            .unwrap_or_default();

        let identity = match media_type {
            MediaType::Tv => path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .map(parse_name)
                .unwrap_or_default(),
            MediaType::Movie => Default::default(),
        };

        Ok(CreateMediaFile {
            path: path.to_string_lossy().into_owned(),
            media_type,
            size_bytes,
            fingerprint,
            width: info.width,
            height: info.height,
            codec: info.codec,
            bitrate_kbps: info.bitrate_kbps,
            duration_secs: info.duration_secs,
            container,
            show_title: identity.title,
            season: identity.season.map(i64::from),
            episode: identity.episode.map(i64::from),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use async_trait::async_trait;
    use std::fs;
    use tempfile::TempDir;

    struct StubProbe {
        info: MediaInfo,
    }

    #[async_trait]
    impl MediaProbe for StubProbe {
        async fn probe(&self, _path: &Path) -> anyhow::Result<MediaInfo> {
            Ok(self.info.clone())
        }
    }

    struct FailingProbe;

    #[async_trait]
    impl MediaProbe for FailingProbe {
        async fn probe(&self, _path: &Path) -> anyhow::Result<MediaInfo> {
            bail!("no such demuxer")
        }
    }

    fn hd_probe() -> Arc<dyn MediaProbe> {
        Arc::new(StubProbe {
            info: MediaInfo {
                width: Some(1920),
                height: Some(1080),
                codec: Some("h264".to_string()),
                bitrate_kbps: Some(5800),
                duration_secs: Some(2700.0),
            },
        })
    }

    #[tokio::test]
    async fn builds_a_full_record() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("Heat.1995.1080p.mkv");
        fs::write(&path, b"video payload").expect("write");

        let extractor = MetadataExtractor::new(hd_probe());
        let record = extractor.extract(&path, MediaType::Movie).await.expect("extract");

        assert_eq!(record.path, path.to_string_lossy());
        assert_eq!(record.media_type, MediaType::Movie);
        assert_eq!(record.size_bytes, 13);
        assert_eq!(record.fingerprint.len(), 64);
        assert_eq!(record.container, "mkv");
        assert_eq!(record.height, Some(1080));
        assert_eq!(record.codec.as_deref(), Some("h264"));
        assert!(record.show_title.is_none(), "movies carry no episode identity");
    }

    #[tokio::test]
    async fn probe_failure_still_catalogs_the_file() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("odd-container.mkv");
        fs::write(&path, b"unparseable").expect("write");

        let extractor = MetadataExtractor::new(Arc::new(FailingProbe));
        let record = extractor.extract(&path, MediaType::Movie).await.expect("extract");

        assert!(!record.fingerprint.is_empty());
        assert_eq!(record.width, None);
        assert_eq!(record.height, None);
        assert_eq!(record.codec, None);
        assert_eq!(record.bitrate_kbps, None);
    }

    #[tokio::test]
    async fn missing_file_is_an_extraction_error() {
        let dir = TempDir::new().expect("tempdir");
        let extractor = MetadataExtractor::new(hd_probe());

        let err = extractor
            .extract(&dir.path().join("gone.mkv"), MediaType::Movie)
            .await
            .expect_err("must fail");
        assert!(err.to_string().contains("gone.mkv"));
    }

    #[tokio::test]
    async fn tv_files_get_identity_from_the_filename() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("The.Expanse.S02E05.Home.1080p.mkv");
        fs::write(&path, b"episode payload").expect("write");

        let extractor = MetadataExtractor::new(hd_probe());
        let record = extractor.extract(&path, MediaType::Tv).await.expect("extract");

        assert_eq!(record.show_title.as_deref(), Some("The Expanse"));
        assert_eq!(record.season, Some(2));
        assert_eq!(record.episode, Some(5));
    }

    #[tokio::test]
    async fn unparseable_tv_name_is_cataloged_without_identity() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("raw-capture.mkv");
        fs::write(&path, b"payload").expect("write");

        let extractor = MetadataExtractor::new(hd_probe());
        let record = extractor.extract(&path, MediaType::Tv).await.expect("extract");

        assert!(record.show_title.is_none());
        assert!(record.season.is_none());
        assert!(record.episode.is_none());
    }
}
