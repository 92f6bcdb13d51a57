//! Append-only log of length-prefixed canonical CBOR frames.
//!
//! Each frame is a little-endian `u32` length followed by that many bytes of
//! canonical CBOR. Frames are fsynced on append. A truncated trailing frame is
//! reported as corruption rather than silently dropped.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use accord_cbor::to_canonical_cbor;
use serde::{Serialize, de::DeserializeOwned};

use crate::{LedgerError, LedgerResult, io_error};

#[derive(Debug)]
pub struct FrameLog {
    path: PathBuf,
}

impl FrameLog {
    /// Open (creating if needed) the log file at `path`.
    pub fn open(path: impl Into<PathBuf>) -> LedgerResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
        }
        if !path.exists() {
            File::create(&path).map_err(|e| io_error(&path, e))?;
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append<T: Serialize>(&self, frame: &T) -> LedgerResult<()> {
        let bytes = to_canonical_cbor(frame)?;
        let len = u32::try_from(bytes.len())
            .map_err(|_| LedgerError::Corrupt("frame larger than 4GiB".into()))?;
        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)
            .map_err(|e| io_error(&self.path, e))?;
        file.write_all(&len.to_le_bytes())
            .and_then(|_| file.write_all(&bytes))
            .and_then(|_| file.sync_all())
            .map_err(|e| io_error(&self.path, e))
    }

    pub fn read_all<T: DeserializeOwned>(&self) -> LedgerResult<Vec<T>> {
        let mut file = File::open(&self.path).map_err(|e| io_error(&self.path, e))?;
        let mut frames = Vec::new();
        loop {
            let mut len_buf = [0u8; 4];
            let read = file.read(&mut len_buf).map_err(|e| io_error(&self.path, e))?;
            if read == 0 {
                break;
            }
            if read < len_buf.len() {
                return Err(LedgerError::Corrupt(format!(
                    "truncated length header (read {read} bytes)"
                )));
            }
            let len = u32::from_le_bytes(len_buf) as usize;
            let mut buf = vec![0u8; len];
            if let Err(err) = file.read_exact(&mut buf) {
                if err.kind() == ErrorKind::UnexpectedEof {
                    return Err(LedgerError::Corrupt("truncated frame payload".into()));
                }
                return Err(io_error(&self.path, err));
            }
            frames.push(serde_cbor::from_slice(&buf)?);
        }
        Ok(frames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn frames_survive_reopen() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("frames.log");
        let log = FrameLog::open(&path).unwrap();
        log.append(&("first", 1u32)).unwrap();
        log.append(&("second", 2u32)).unwrap();

        let again = FrameLog::open(&path).unwrap();
        let frames: Vec<(String, u32)> = again.read_all().unwrap();
        assert_eq!(frames, vec![("first".into(), 1), ("second".into(), 2)]);
    }

    #[test]
    fn detects_truncated_frame() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("frames.log");
        FrameLog::open(&path).unwrap().append(&"payload").unwrap();

        let len = fs::metadata(&path).unwrap().len();
        let file = OpenOptions::new().write(true).open(&path).unwrap();
        file.set_len(len - 1).unwrap();

        let err = FrameLog::open(&path).unwrap().read_all::<String>().unwrap_err();
        assert!(matches!(err, LedgerError::Corrupt(_)));
    }
}
