//! Minimal CLI parsing for the scan, analyze, and stats commands.

use std::env;
use std::path::PathBuf;

use anyhow::{Result, bail};

use crate::db::MediaType;
use crate::services::AnalyzeOptions;

pub const USAGE: &str = "\
Usage:
  curator scan <root>... [--media-type movie|tv]
  curator analyze [--duplicates] [--quality] [--completeness]
  curator stats

Commands:
  scan      Walk the given roots and catalog every media file
  analyze   Run detection passes over the catalog (all passes by default)
  stats     Print catalog totals and open issue counts
";

#[derive(Debug, Clone)]
pub enum Command {
    Scan {
        roots: Vec<PathBuf>,
        media_type: MediaType,
    },
    Analyze {
        options: AnalyzeOptions,
    },
    Stats,
}

impl Command {
    pub fn from_args() -> Result<Self> {
        Self::parse(env::args().skip(1).collect())
    }

    fn parse(args: Vec<String>) -> Result<Self> {
        let mut args = args.into_iter();
        let Some(command) = args.next() else {
            bail!("missing command\n\n{}", USAGE);
        };

        match command.as_str() {
            "scan" => Self::parse_scan(args),
            "analyze" => Self::parse_analyze(args),
            "stats" => {
                if let Some(extra) = args.next() {
                    bail!("unexpected argument '{}'\n\n{}", extra, USAGE);
                }
                Ok(Command::Stats)
            }
            "--help" | "-h" | "help" => bail!("{}", USAGE),
            other => bail!("unknown command '{}'\n\n{}", other, USAGE),
        }
    }

    fn parse_scan(mut args: impl Iterator<Item = String>) -> Result<Self> {
        let mut roots = Vec::new();
        let mut media_type = MediaType::Movie;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--media-type" => {
                    let Some(value) = args.next() else {
                        bail!("--media-type needs a value\n\n{}", USAGE);
                    };
                    media_type = parse_media_type(&value)?;
                }
                _ if arg.starts_with("--media-type=") => {
                    let value = arg.split_once('=').map(|(_, v)| v).unwrap_or_default();
                    media_type = parse_media_type(value)?;
                }
                _ if arg.starts_with("--") => {
                    bail!("unknown option '{}'\n\n{}", arg, USAGE);
                }
                root => roots.push(PathBuf::from(root)),
            }
        }

        if roots.is_empty() {
            bail!("scan needs at least one root directory\n\n{}", USAGE);
        }
        Ok(Command::Scan { roots, media_type })
    }

    fn parse_analyze(args: impl Iterator<Item = String>) -> Result<Self> {
        let mut duplicates = false;
        let mut quality = false;
        let mut completeness = false;

        for arg in args {
            match arg.as_str() {
                "--duplicates" => duplicates = true,
                "--quality" => quality = true,
                "--completeness" => completeness = true,
                other => bail!("unknown option '{}'\n\n{}", other, USAGE),
            }
        }

        // No flags means every pass
        let options = if duplicates || quality || completeness {
            AnalyzeOptions {
                duplicates,
                quality,
                completeness,
            }
        } else {
            AnalyzeOptions::default()
        };
        Ok(Command::Analyze { options })
    }
}

fn parse_media_type(value: &str) -> Result<MediaType> {
    match MediaType::from_str(value) {
        Some(media_type) => Ok(media_type),
        None => bail!("'{}' is not a media type (movie or tv)\n\n{}", value, USAGE),
    }
}
