//! Opened files with transparent wrapper handling
//!
//! [`OpenedFile`] runs wrapper detection once at open time and then exposes
//! the embedded data fork as if it were the whole file: positions are
//! relative to the fork window and the length is the fork length. Unwrapped
//! files pass straight through. There is no process-wide state; every open
//! file is its own handle.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use crate::sniff::{self, AssetKind};
use crate::wrapper::{unwrap_data_fork, ForkDescriptor};
use crate::Result;

/// A readable file with its data-fork window established.
///
/// Generic over the underlying stream so tests can inject an
/// `io::Cursor` instead of a real file.
#[derive(Debug)]
pub struct OpenedFile<R: Read + Seek = File> {
    inner: R,
    fork: ForkDescriptor,
}

impl OpenedFile<File> {
    /// Open a file read-only, transparently handling AppleSingle and
    /// MacBinary II framing.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        tracing::debug!("Opened {}", path.display());
        Ok(Self::from_reader(file)?)
    }
}

impl<R: Read + Seek> OpenedFile<R> {
    /// Wrap an already-open stream, probing for wrapper framing and seeking
    /// to the start of the payload.
    pub fn from_reader(mut inner: R) -> io::Result<Self> {
        let fork = unwrap_data_fork(&mut inner);
        inner.seek(SeekFrom::Start(fork.payload_offset))?;
        Ok(OpenedFile { inner, fork })
    }

    pub fn fork(&self) -> ForkDescriptor {
        self.fork
    }

    pub fn is_wrapped(&self) -> bool {
        self.fork.is_wrapped
    }

    /// Seek to a fork-relative position
    pub fn set_position(&mut self, position: u64) -> Result<()> {
        self.inner
            .seek(SeekFrom::Start(self.fork.payload_offset + position))?;
        Ok(())
    }

    /// Current fork-relative position
    pub fn position(&mut self) -> Result<u64> {
        let absolute = self.inner.stream_position()?;
        Ok(absolute.saturating_sub(self.fork.payload_offset))
    }

    /// Length of the readable window: the fork length for wrapped files,
    /// the whole stream otherwise (measured without disturbing the cursor).
    pub fn length(&mut self) -> Result<u64> {
        if self.fork.is_wrapped {
            Ok(self.fork.payload_length)
        } else {
            Ok(self.stream_length()?)
        }
    }

    /// Sniff the asset family of the established window.
    pub fn classify(&mut self) -> Result<AssetKind> {
        let length = self.length()?;
        Ok(sniff::classify(self, length))
    }

    fn stream_length(&mut self) -> io::Result<u64> {
        let position = self.inner.stream_position()?;
        let length = self.inner.seek(SeekFrom::End(0))?;
        self.inner.seek(SeekFrom::Start(position))?;
        Ok(length)
    }

    /// End of the fork window in absolute stream coordinates
    fn window_end(&mut self) -> io::Result<u64> {
        if self.fork.is_wrapped {
            Ok(self.fork.payload_offset + self.fork.payload_length)
        } else {
            self.stream_length()
        }
    }
}

impl<R: Read + Seek> Read for OpenedFile<R> {
    // Reads are not clamped to the window end; the fork length is advisory,
    // as callers historically read exactly what the directory tells them to.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<R: Read + Seek> Seek for OpenedFile<R> {
    /// Seeks are fork-relative: `Start(0)` is the first payload byte and
    /// `End(0)` the end of the window.
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(p) => SeekFrom::Start(self.fork.payload_offset + p),
            SeekFrom::Current(d) => SeekFrom::Current(d),
            SeekFrom::End(d) => {
                let end = self.window_end()? as i64 + d;
                if end < self.fork.payload_offset as i64 {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        "seek before start of fork",
                    ));
                }
                SeekFrom::Start(end as u64)
            }
        };
        let absolute = self.inner.seek(target)?;
        Ok(absolute.saturating_sub(self.fork.payload_offset))
    }
}

/// Open and classify a file in one step.
pub fn classify_file(path: &Path) -> Result<AssetKind> {
    OpenedFile::open(path)?.classify()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wrapper::{crc16, APPLESINGLE_MAGIC, APPLESINGLE_VERSION};
    use std::io::Cursor;

    fn sounds_payload() -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&1u32.to_be_bytes());
        buf.extend_from_slice(b"snd2");
        buf.extend_from_slice(&[0xeeu8; 8]);
        buf
    }

    fn scenario_payload() -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&1u16.to_be_bytes());
        buf.extend_from_slice(&0u16.to_be_bytes());
        buf.resize(72, 0);
        buf.extend_from_slice(&130i32.to_be_bytes());
        buf.resize(128, 0);
        buf.extend_from_slice(b"PNTS");
        buf.resize(256, 0);
        buf
    }

    fn applesingle_around(payload: &[u8]) -> Vec<u8> {
        let payload_start = 0x40u32;
        let mut buf = Vec::new();
        buf.extend_from_slice(&APPLESINGLE_MAGIC.to_be_bytes());
        buf.extend_from_slice(&APPLESINGLE_VERSION.to_be_bytes());
        buf.extend_from_slice(&[0u8; 16]);
        buf.extend_from_slice(&2u16.to_be_bytes());
        // Resource fork entry first, then the data fork
        buf.extend_from_slice(&2u32.to_be_bytes());
        buf.extend_from_slice(&0u32.to_be_bytes());
        buf.extend_from_slice(&0u32.to_be_bytes());
        buf.extend_from_slice(&1u32.to_be_bytes());
        buf.extend_from_slice(&payload_start.to_be_bytes());
        buf.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        buf.resize(payload_start as usize, 0);
        buf.extend_from_slice(payload);
        buf
    }

    fn macbinary_around(payload: &[u8]) -> Vec<u8> {
        let mut header = [0u8; 128];
        header[1] = 5;
        header[2..7].copy_from_slice(b"Map.A");
        header[83..87].copy_from_slice(&(payload.len() as u32).to_be_bytes());
        header[122] = 0x81;
        header[123] = 0x81;
        let crc = crc16(&header[..124]);
        header[124..126].copy_from_slice(&crc.to_be_bytes());
        let mut buf = header.to_vec();
        buf.extend_from_slice(payload);
        buf
    }

    #[test]
    fn applesingle_window_is_fork_relative() {
        let payload = sounds_payload();
        let wrapped = applesingle_around(&payload);
        let mut f = OpenedFile::from_reader(Cursor::new(wrapped)).unwrap();

        assert!(f.is_wrapped());
        assert_eq!(f.position().unwrap(), 0);
        assert_eq!(f.length().unwrap(), payload.len() as u64);

        let mut first = [0u8; 4];
        f.read_exact(&mut first).unwrap();
        assert_eq!(first, 1u32.to_be_bytes());
        assert_eq!(f.position().unwrap(), 4);

        f.set_position(4).unwrap();
        let mut tag = [0u8; 4];
        f.read_exact(&mut tag).unwrap();
        assert_eq!(&tag, b"snd2");
    }

    #[test]
    fn classify_through_applesingle() {
        let wrapped = applesingle_around(&sounds_payload());
        let mut f = OpenedFile::from_reader(Cursor::new(wrapped)).unwrap();
        assert_eq!(f.classify().unwrap(), AssetKind::Sounds);
    }

    #[test]
    fn classify_through_macbinary() {
        let wrapped = macbinary_around(&scenario_payload());
        let mut f = OpenedFile::from_reader(Cursor::new(wrapped)).unwrap();
        assert!(f.is_wrapped());
        assert_eq!(f.length().unwrap(), 256);
        assert_eq!(f.classify().unwrap(), AssetKind::Scenario);
    }

    #[test]
    fn raw_file_passes_through() {
        let payload = scenario_payload();
        let mut f = OpenedFile::from_reader(Cursor::new(payload)).unwrap();
        assert!(!f.is_wrapped());
        assert_eq!(f.length().unwrap(), 256);
        assert_eq!(f.classify().unwrap(), AssetKind::Scenario);
    }

    #[test]
    fn seek_from_end_respects_window() {
        let payload = sounds_payload();
        let len = payload.len() as u64;
        let wrapped = applesingle_around(&payload);
        let mut f = OpenedFile::from_reader(Cursor::new(wrapped)).unwrap();

        assert_eq!(f.seek(SeekFrom::End(-4)).unwrap(), len - 4);
        assert_eq!(f.seek(SeekFrom::Current(2)).unwrap(), len - 2);
        assert!(f.seek(SeekFrom::End(-(len as i64) - 1)).is_err());
    }

    #[test]
    fn classification_does_not_consume_the_handle() {
        let wrapped = macbinary_around(&scenario_payload());
        let mut f = OpenedFile::from_reader(Cursor::new(wrapped)).unwrap();
        assert_eq!(f.classify().unwrap(), AssetKind::Scenario);
        assert_eq!(f.classify().unwrap(), AssetKind::Scenario);
        // Handle still usable for ordinary reads afterwards
        f.set_position(128).unwrap();
        let mut tag = [0u8; 4];
        f.read_exact(&mut tag).unwrap();
        assert_eq!(&tag, b"PNTS");
    }
}
