//! File handling for Marathon-era game data
//!
//! This crate answers two questions about a file before the engine touches
//! it: is it wrapped in legacy Mac framing (AppleSingle or MacBinary II),
//! and which of the engine's tag-less binary asset formats does it hold
//! (sound bank, scenario map, physics model, shape collection)?
//!
//! - [`wrapper`] — detects the framing and computes the data-fork window
//! - [`sniff`] — classifies the unwrapped bytes by header structure
//! - [`opened`] — a file handle that applies the window transparently

pub mod opened;
pub mod sniff;
pub mod wrapper;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FileError {
    /// The underlying stream failed; a format that merely doesn't match is
    /// reported as a negative classification, never as an error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FileError>;

pub use opened::{classify_file, OpenedFile};
pub use sniff::AssetKind;
pub use wrapper::{ForkDescriptor, ForkKind, Wrapper};
