//! Pipeline services

pub mod analyzer;
pub mod completeness;
pub mod duplicate_detector;
pub mod extractor;
pub mod filename_parser;
pub mod fingerprint;
pub mod media_probe;
pub mod progress;
pub mod quality_assessor;
pub mod scanner;

pub use analyzer::{AnalyzeJob, AnalyzeOptions, AnalyzerService};
pub use extractor::{ExtractionError, MetadataExtractor};
pub use media_probe::{FfprobeClient, MediaInfo, MediaProbe};
pub use progress::{JobGate, JobHandle, JobSnapshot, Phase, ProgressEvent, RunSummary};
pub use scanner::{ScanJob, ScannerService};
