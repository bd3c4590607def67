//! Command-line inspector for Marathon-era data files
//!
//! Reports, for each input file, whether it carries AppleSingle or
//! MacBinary II framing, where the requested fork's payload lives, and
//! which asset family the data fork sniffs as.

use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use openmarathon_fileio::{wrapper, AssetKind, ForkKind, OpenedFile, Wrapper};

#[derive(Parser)]
#[command(name = "marathon-inspect")]
#[command(about = "Identify wrapped and raw Marathon-era data files")]
struct Args {
    /// Files to inspect
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Which fork window to report for wrapped files
    #[arg(long, value_enum, default_value_t = ForkArg::Data)]
    fork: ForkArg,

    /// Emit one JSON object per file instead of text
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ForkArg {
    Data,
    Resource,
}

impl From<ForkArg> for ForkKind {
    fn from(fork: ForkArg) -> ForkKind {
        match fork {
            ForkArg::Data => ForkKind::Data,
            ForkArg::Resource => ForkKind::Resource,
        }
    }
}

#[derive(Serialize)]
struct Report {
    path: String,
    wrapper: &'static str,
    fork: ForkKind,
    /// Absent when the file is unwrapped or the fork has no known offset
    payload_offset: Option<u64>,
    payload_length: Option<u64>,
    /// Sniffed family of the data fork
    kind: AssetKind,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let args = Args::parse();

    let mut opened = 0usize;
    for path in &args.files {
        match inspect(path, args.fork) {
            Ok(report) => {
                opened += 1;
                if args.json {
                    println!("{}", serde_json::to_string(&report)?);
                } else {
                    print_report(&report);
                }
            }
            Err(e) => {
                tracing::warn!("{}: {:#}", path.display(), e);
            }
        }
    }

    if opened == 0 {
        bail!("no input file could be opened");
    }
    Ok(())
}

fn inspect(path: &Path, fork: ForkArg) -> Result<Report> {
    let mut file =
        File::open(path).with_context(|| format!("opening {}", path.display()))?;

    let probed = wrapper::probe_wrapper(&mut file, fork.into());
    let (wrapper_name, payload_offset, payload_length) = match probed {
        Wrapper::AppleSingle { offset, length } => ("applesingle", Some(offset), Some(length)),
        Wrapper::MacBinary {
            data_length,
            rsrc_length,
        } => match fork {
            ForkArg::Data => (
                "macbinary",
                Some(wrapper::MACBINARY_HEADER_LEN),
                Some(data_length),
            ),
            // The resource fork of a MacBinary file is only reachable through
            // the resource manager; report its length, not a window.
            ForkArg::Resource => ("macbinary", None, Some(rsrc_length)),
        },
        Wrapper::None => ("none", None, None),
    };

    // Classification always runs over the data-fork window
    let kind = OpenedFile::from_reader(file)?.classify()?;

    Ok(Report {
        path: path.display().to_string(),
        wrapper: wrapper_name,
        fork: fork.into(),
        payload_offset,
        payload_length,
        kind,
    })
}

fn print_report(report: &Report) {
    let framing = if report.wrapper == "none" {
        "no wrapper".to_string()
    } else {
        match (report.payload_offset, report.payload_length) {
            (Some(offset), Some(length)) => {
                format!("{} fork at {}+{}", report.wrapper, offset, length)
            }
            (_, Some(length)) => format!("{} fork length {}", report.wrapper, length),
            _ => report.wrapper.to_string(),
        }
    };
    println!("{}: {}, {}", report.path, framing, report.kind.name());
}
