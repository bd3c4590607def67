//! Structural sniffing of game asset files
//!
//! Marathon-era data files carry no type tags on disk; the engine decides
//! what a file is by inspecting its header layout. Three probes run in a
//! fixed order (sound bank, map/physics, shape collection) and the first
//! structural match wins. Every probe is a read-only pass that starts from
//! absolute offset 0, so classification is a pure function of the bytes.

use std::io::{self, Read, Seek, SeekFrom};

use byteorder::{BigEndian, ReadBytesExt};
use serde::{Deserialize, Serialize};

const SOUND_TAG: u32 = u32::from_be_bytes(*b"snd2");
const LINE_TAG: u32 = u32::from_be_bytes(*b"LINS");
const POINT_TAG: u32 = u32::from_be_bytes(*b"PNTS");
const PHYSICS_TAG: u32 = u32::from_be_bytes(*b"MNpx");

/// Reserved "no data" marker in shape collection offset fields
const NONE_OFFSET: i32 = -1;

/// Number of collection headers in a shapes file
const COLLECTION_COUNT: usize = 32;

/// Structural family of an asset file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssetKind {
    Sounds,
    Scenario,
    Physics,
    Shapes,
    Unrecognized,
}

impl AssetKind {
    pub fn name(self) -> &'static str {
        match self {
            AssetKind::Sounds => "Sounds",
            AssetKind::Scenario => "Scenario",
            AssetKind::Physics => "Physics",
            AssetKind::Shapes => "Shapes",
            AssetKind::Unrecognized => "Unrecognized",
        }
    }
}

/// Classify the bytes of `f` (a window of `file_length` bytes starting at
/// the stream's offset 0) as one of the known asset families.
///
/// A short read or seek failure inside a probe only fails that probe;
/// exhausting all three yields [`AssetKind::Unrecognized`], which is a
/// normal result, not an error.
pub fn classify<R: Read + Seek>(f: &mut R, file_length: u64) -> AssetKind {
    if let Ok(true) = is_sounds(f) {
        return AssetKind::Sounds;
    }
    if let Ok(Some(kind)) = map_or_physics(f, file_length) {
        return kind;
    }
    if let Ok(true) = is_shapes(f, file_length) {
        return AssetKind::Shapes;
    }
    AssetKind::Unrecognized
}

/// Sound bank: format version 1 followed by the 'snd2' tag
fn is_sounds<R: Read + Seek>(f: &mut R) -> io::Result<bool> {
    f.seek(SeekFrom::Start(0))?;
    let version = f.read_u32::<BigEndian>()?;
    let tag = f.read_u32::<BigEndian>()?;
    Ok(version == 1 && tag == SOUND_TAG)
}

/// Map or physics file: version gate, a plausible directory offset, then the
/// first chunk tag at offset 128 decides between the two.
fn map_or_physics<R: Read + Seek>(f: &mut R, file_length: u64) -> io::Result<Option<AssetKind>> {
    f.seek(SeekFrom::Start(0))?;
    let version = f.read_u16::<BigEndian>()?;
    let data_version = f.read_u16::<BigEndian>()?;
    // Version 3 was never shipped; the gap is real, don't close it
    if !matches!(version, 0 | 1 | 2 | 4) || !matches!(data_version, 0 | 1 | 2) {
        return Ok(None);
    }

    f.seek(SeekFrom::Current(68))?;
    let directory_offset = f.read_i32::<BigEndian>()?;
    if directory_offset as i64 >= file_length as i64 {
        tracing::trace!("map probe: directory offset {} past EOF {}", directory_offset, file_length);
        return Ok(None);
    }

    f.seek(SeekFrom::Start(128))?;
    let tag = f.read_u32::<BigEndian>()?;
    if tag == LINE_TAG || tag == POINT_TAG {
        return Ok(Some(AssetKind::Scenario));
    }
    if tag == PHYSICS_TAG {
        return Ok(Some(AssetKind::Physics));
    }
    Ok(None)
}

/// Shape collection: 32 collection headers, each 32 bytes, whose 8-bit and
/// 16-bit data windows must all be in bounds or carry the "none" sentinel.
fn is_shapes<R: Read + Seek>(f: &mut R, file_length: u64) -> io::Result<bool> {
    f.seek(SeekFrom::Start(0))?;
    for _ in 0..COLLECTION_COUNT {
        let status_flags = f.read_u32::<BigEndian>()?;
        let offset = f.read_i32::<BigEndian>()?;
        let length = f.read_i32::<BigEndian>()?;
        let offset16 = f.read_i32::<BigEndian>()?;
        let length16 = f.read_i32::<BigEndian>()?;
        if status_flags != 0
            || !window_plausible(offset, length, file_length)
            || !window_plausible(offset16, length16, file_length)
        {
            return Ok(false);
        }
        f.seek(SeekFrom::Current(12))?;
    }
    Ok(true)
}

/// A collection data window is acceptable if it is the "none" sentinel or
/// lies entirely within the file.
fn window_plausible(offset: i32, length: i32, file_length: u64) -> bool {
    offset == NONE_OFFSET
        || (((offset as i64) < file_length as i64)
            && (offset as i64 + length as i64 <= file_length as i64))
}
