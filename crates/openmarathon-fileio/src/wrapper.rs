//! AppleSingle and MacBinary II wrapper detection
//!
//! Game files that crossed from classic Mac OS onto flat filesystems often
//! arrive wrapped: AppleSingle bundles both forks plus metadata behind a
//! typed entry table, MacBinary II prepends a fixed 128-byte header with a
//! CRC-16 integrity check. Both are probed here so the rest of the engine
//! can treat the embedded data fork as the file content.

use std::io::{self, Read, Seek, SeekFrom};

use byteorder::{BigEndian, ReadBytesExt};
use serde::{Deserialize, Serialize};

pub const APPLESINGLE_MAGIC: u32 = 0x0005_1600;
pub const APPLESINGLE_VERSION: u32 = 0x0002_0000;

/// Offset of the entry count inside an AppleSingle header
const APPLESINGLE_ENTRY_COUNT_OFFSET: u64 = 0x18;

/// MacBinary II header size; the data fork starts right behind it
pub const MACBINARY_HEADER_LEN: u64 = 128;

/// Which fork of a wrapped file the caller wants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ForkKind {
    Data,
    Resource,
}

impl ForkKind {
    /// AppleSingle entry id for this fork (1 = data, 2 = resource)
    fn entry_id(self) -> u32 {
        match self {
            ForkKind::Data => 1,
            ForkKind::Resource => 2,
        }
    }
}

/// Read window established by wrapper detection.
///
/// If `is_wrapped` is false the whole stream is the payload: `payload_offset`
/// is 0 and `payload_length` is 0 here, resolved lazily from the stream
/// length by [`crate::OpenedFile::length`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForkDescriptor {
    pub is_wrapped: bool,
    pub payload_offset: u64,
    pub payload_length: u64,
}

impl ForkDescriptor {
    /// Descriptor for an unwrapped stream
    pub fn raw() -> Self {
        ForkDescriptor {
            is_wrapped: false,
            payload_offset: 0,
            payload_length: 0,
        }
    }

    pub fn wrapped(offset: u64, length: u64) -> Self {
        ForkDescriptor {
            is_wrapped: true,
            payload_offset: offset,
            payload_length: length,
        }
    }
}

/// Outcome of probing a stream for wrapper framing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wrapper {
    /// AppleSingle entry for the requested fork: absolute offset and length
    AppleSingle { offset: u64, length: u64 },
    /// MacBinary II header: both fork lengths; the data fork sits at 128
    MacBinary { data_length: u64, rsrc_length: u64 },
    /// Neither format recognized
    None,
}

/// Probe a stream for AppleSingle framing and look up the requested fork.
///
/// Returns the `(offset, length)` of the first entry matching the fork's id,
/// scanning the table strictly in file order. Any short read or seek failure
/// counts as "not AppleSingle".
pub fn detect_applesingle<R: Read + Seek>(f: &mut R, fork: ForkKind) -> Option<(u64, u64)> {
    scan_applesingle(f, fork).unwrap_or(None)
}

fn scan_applesingle<R: Read + Seek>(f: &mut R, fork: ForkKind) -> io::Result<Option<(u64, u64)>> {
    f.seek(SeekFrom::Start(0))?;
    let magic = f.read_u32::<BigEndian>()?;
    let version = f.read_u32::<BigEndian>()?;
    if magic != APPLESINGLE_MAGIC || version != APPLESINGLE_VERSION {
        return Ok(None);
    }

    // Walk the entry table; first entry with the requested id wins
    let req_id = fork.entry_id();
    f.seek(SeekFrom::Start(APPLESINGLE_ENTRY_COUNT_OFFSET))?;
    let num_entries = f.read_u16::<BigEndian>()?;
    for _ in 0..num_entries {
        let id = f.read_u32::<BigEndian>()?;
        let offset = f.read_u32::<BigEndian>()?;
        let length = f.read_u32::<BigEndian>()?;
        tracing::trace!("AppleSingle entry id {} offset {} length {}", id, offset, length);
        if id == req_id {
            return Ok(Some((offset as u64, length as u64)));
        }
    }
    Ok(None)
}

/// Probe a stream for a MacBinary II header.
///
/// Only MacBinary II is recognized; older MacBinary files lack the version
/// bytes and the header CRC this check relies on.
pub fn detect_macbinary<R: Read + Seek>(f: &mut R) -> Option<(u64, u64)> {
    let mut header = [0u8; MACBINARY_HEADER_LEN as usize];
    f.seek(SeekFrom::Start(0)).ok()?;
    f.read_exact(&mut header).ok()?;
    check_macbinary_header(&header)
}

/// Validate a 128-byte MacBinary II header window.
///
/// Pure function of the header bytes, so the gating and CRC logic is
/// testable without a stream. Returns `(data_fork_length, rsrc_fork_length)`
/// on success.
pub fn check_macbinary_header(header: &[u8; 128]) -> Option<(u64, u64)> {
    // Fixed zero bytes, filename length limit, and the two version bytes
    if header[0] != 0
        || header[1] > 63
        || header[74] != 0
        || header[122] < 0x81
        || header[123] < 0x81
    {
        return None;
    }

    let crc = crc16(&header[..124]);
    let stored = u16::from_be_bytes([header[124], header[125]]);
    if crc != stored {
        tracing::trace!("MacBinary CRC mismatch: computed {:04x}, stored {:04x}", crc, stored);
        return None;
    }

    let data_length = u32::from_be_bytes([header[83], header[84], header[85], header[86]]) as u64;
    let rsrc_length = u32::from_be_bytes([header[87], header[88], header[89], header[90]]) as u64;
    Some((data_length, rsrc_length))
}

/// CRC-16 over `data`: polynomial 0x1021, MSB-first, zero initial value
/// (XMODEM style, as MacBinary II specifies for its header bytes 0..=123).
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0;
    for &byte in data {
        let mut reg = (byte as u16) << 8;
        for _ in 0..8 {
            if (reg ^ crc) & 0x8000 != 0 {
                crc = (crc << 1) ^ 0x1021;
            } else {
                crc <<= 1;
            }
            reg <<= 1;
        }
    }
    crc
}

/// Probe a stream for either wrapper format, AppleSingle first.
///
/// AppleSingle must be tried before MacBinary: its signature checks live in
/// the same header region MacBinary reads blindly as a 128-byte block, so
/// reversing the order risks misreading AppleSingle framing.
pub fn probe_wrapper<R: Read + Seek>(f: &mut R, fork: ForkKind) -> Wrapper {
    if let Some((offset, length)) = detect_applesingle(f, fork) {
        return Wrapper::AppleSingle { offset, length };
    }
    if let Some((data_length, rsrc_length)) = detect_macbinary(f) {
        return Wrapper::MacBinary { data_length, rsrc_length };
    }
    Wrapper::None
}

/// Establish the data-fork read window for a stream being opened for reading.
///
/// AppleSingle is consulted first, then MacBinary II, then the raw stream
/// as-is. Never fails: unreadable or unrecognized streams fall back to the
/// raw descriptor.
pub fn unwrap_data_fork<R: Read + Seek>(f: &mut R) -> ForkDescriptor {
    match probe_wrapper(f, ForkKind::Data) {
        Wrapper::AppleSingle { offset, length } => {
            tracing::debug!("AppleSingle data fork at {}+{}", offset, length);
            ForkDescriptor::wrapped(offset, length)
        }
        Wrapper::MacBinary { data_length, .. } => {
            tracing::debug!("MacBinary II data fork at {}+{}", MACBINARY_HEADER_LEN, data_length);
            ForkDescriptor::wrapped(MACBINARY_HEADER_LEN, data_length)
        }
        Wrapper::None => ForkDescriptor::raw(),
    }
}
