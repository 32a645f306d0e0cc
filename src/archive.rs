//! Archive decompression.
//!
//! A [`Decompressor`] turns one archive's bytes into its list of members
//! ([`RawEntry`]), in container order, directories omitted. [`ZipDecompressor`]
//! is the built-in engine; it runs on a blocking thread because inflating a
//! multi-gigabyte export is CPU-bound.

use std::io::Read;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ArchiveReadError;
use crate::models::RawEntry;

/// Decompression engine seam.
#[async_trait]
pub trait Decompressor: Send + Sync {
    async fn decompress(&self, bytes: Arc<[u8]>) -> Result<Vec<RawEntry>, ArchiveReadError>;
}

/// Zip decompressor with a per-member size ceiling (zip-bomb protection).
#[derive(Debug, Clone)]
pub struct ZipDecompressor {
    max_entry_bytes: u64,
}

impl ZipDecompressor {
    pub fn new(max_entry_bytes: u64) -> Self {
        Self { max_entry_bytes }
    }
}

#[async_trait]
impl Decompressor for ZipDecompressor {
    async fn decompress(&self, bytes: Arc<[u8]>) -> Result<Vec<RawEntry>, ArchiveReadError> {
        let limit = self.max_entry_bytes;
        tokio::task::spawn_blocking(move || read_zip(&bytes, limit))
            .await
            .map_err(|e| ArchiveReadError::Task(e.to_string()))?
    }
}

/// Read every file member of a zip archive.
pub fn read_zip(bytes: &[u8], max_entry_bytes: u64) -> Result<Vec<RawEntry>, ArchiveReadError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| ArchiveReadError::Invalid(e.to_string()))?;

    let mut entries = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let member = archive
            .by_index(i)
            .map_err(|e| ArchiveReadError::Invalid(e.to_string()))?;
        if member.is_dir() {
            continue;
        }

        let name = decode_member_name(member.name_raw());
        let out = read_bounded(member, max_entry_bytes).map_err(|e| ArchiveReadError::Member {
            name: name.clone(),
            reason: e.to_string(),
        })?;
        if out.len() as u64 > max_entry_bytes {
            return Err(ArchiveReadError::TooLarge {
                name,
                limit: max_entry_bytes,
            });
        }

        entries.push(RawEntry { path: name, bytes: out });
    }
    Ok(entries)
}

/// Read at most `limit + 1` bytes so the caller can tell an oversize member
/// apart. The buffer grows with the data actually read, never with the size a
/// member header declares.
fn read_bounded<R: Read>(reader: R, limit: u64) -> std::io::Result<Vec<u8>> {
    let mut out = Vec::new();
    reader.take(limit.saturating_add(1)).read_to_end(&mut out)?;
    Ok(out)
}

/// UTF-8 names are kept; anything else is read one character per byte so
/// that mojibake repair can act on it later.
fn decode_member_name(raw: &[u8]) -> String {
    match std::str::from_utf8(raw) {
        Ok(name) => name.to_string(),
        Err(_) => raw.iter().map(|&b| b as char).collect(),
    }
}
