//! Media index and blob handles.
//!
//! Archives carry photos and videos as ordinary members; posts refer to them
//! by archive-internal path. The [`MediaIndex`] registers every media member
//! under a case-insensitive normalized key so that posts from any archive in
//! the batch can be cross-referenced against it.
//!
//! Display handles are created lazily through a [`BlobResolver`], at most once
//! per record, and every created handle is tracked so it can be released when
//! the dataset is discarded.
//!
//! # Resolvers
//!
//! | Resolver | Handle | Release |
//! |----------|--------|---------|
//! | [`BlobStore`] | `/media/<uuid>` | removes bytes from the store |
//! | [`InlineResolver`] | `data:<mime>;base64,…` | no-op |

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, RwLock};

use base64::Engine;
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::error::ResolveError;
use crate::models::RawEntry;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "m4v", "webm"];

/// Normalize path separators to `/`.
pub fn normalize_path(path: &str) -> String {
    path.replace('\\', "/")
}

fn extension(path: &str) -> Option<String> {
    let name = path.rsplit('/').next().unwrap_or(path);
    name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase())
}

/// Whether `path` names an image or video by its extension.
pub fn is_media_path(path: &str) -> bool {
    extension(path)
        .map(|ext| {
            IMAGE_EXTENSIONS.contains(&ext.as_str()) || VIDEO_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Derive a MIME type from the path's extension.
pub fn guess_mime(path: &str) -> &'static str {
    match extension(path).as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("mp4") => "video/mp4",
        Some("mov") => "video/quicktime",
        Some("m4v") => "video/x-m4v",
        Some("webm") => "video/webm",
        _ => "application/octet-stream",
    }
}

/// Opaque display reference produced by a [`BlobResolver`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct BlobHandle(String);

impl BlobHandle {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Creates and releases display handles for media bytes.
///
/// A handle that was created must be released exactly once; the resolver
/// may hold the backing bytes until then.
pub trait BlobResolver: Send + Sync {
    fn create_handle(&self, bytes: Arc<[u8]>, mime: &'static str)
        -> Result<BlobHandle, ResolveError>;

    fn release_handle(&self, handle: &BlobHandle);
}

// ============ BlobStore ============

struct StoredBlob {
    bytes: Arc<[u8]>,
    mime: &'static str,
}

/// In-process blob registry. Handles are URL paths under [`BlobStore::PREFIX`],
/// the route the HTTP server serves media from.
pub struct BlobStore {
    blobs: RwLock<HashMap<String, StoredBlob>>,
}

impl BlobStore {
    pub const PREFIX: &'static str = "/media/";

    pub fn new() -> Self {
        Self {
            blobs: RwLock::new(HashMap::new()),
        }
    }

    /// Look up bytes and MIME type by the key part of a handle (after the prefix).
    pub fn get(&self, key: &str) -> Option<(Arc<[u8]>, &'static str)> {
        let blobs = self.blobs.read().unwrap_or_else(|e| e.into_inner());
        blobs.get(key).map(|b| (b.bytes.clone(), b.mime))
    }

    /// Number of handles not yet released.
    pub fn live_handles(&self) -> usize {
        self.blobs.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl Default for BlobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BlobResolver for BlobStore {
    fn create_handle(
        &self,
        bytes: Arc<[u8]>,
        mime: &'static str,
    ) -> Result<BlobHandle, ResolveError> {
        let key = Uuid::new_v4().to_string();
        let handle = BlobHandle::new(format!("{}{}", Self::PREFIX, key));
        let mut blobs = self.blobs.write().unwrap_or_else(|e| e.into_inner());
        blobs.insert(key, StoredBlob { bytes, mime });
        Ok(handle)
    }

    fn release_handle(&self, handle: &BlobHandle) {
        if let Some(key) = handle.as_str().strip_prefix(Self::PREFIX) {
            let mut blobs = self.blobs.write().unwrap_or_else(|e| e.into_inner());
            blobs.remove(key);
        }
    }
}

// ============ InlineResolver ============

/// Resolver producing self-contained `data:` URIs.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineResolver;

impl BlobResolver for InlineResolver {
    fn create_handle(
        &self,
        bytes: Arc<[u8]>,
        mime: &'static str,
    ) -> Result<BlobHandle, ResolveError> {
        let payload = base64::engine::general_purpose::STANDARD.encode(&bytes);
        Ok(BlobHandle::new(format!("data:{};base64,{}", mime, payload)))
    }

    fn release_handle(&self, _handle: &BlobHandle) {}
}

// ============ MediaIndex ============

/// One media member, keyed by its lower-cased normalized path.
pub struct MediaRecord {
    /// Normalized path as first seen.
    pub path: String,
    bytes: Arc<[u8]>,
    mime: &'static str,
    handle: Mutex<Option<BlobHandle>>,
}

impl MediaRecord {
    fn new(path: String, bytes: Vec<u8>) -> Self {
        let mime = guess_mime(&path);
        Self {
            path,
            bytes: Arc::from(bytes),
            mime,
            handle: Mutex::new(None),
        }
    }

    pub fn mime(&self) -> &'static str {
        self.mime
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The handle, if one has been materialized.
    pub fn handle(&self) -> Option<BlobHandle> {
        self.handle.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

/// A record resolved for one post's reference.
#[derive(Debug, Clone)]
pub struct ResolvedMedia {
    pub handle: BlobHandle,
    pub mime: &'static str,
}

/// Case-insensitive index of media members across a batch of archives.
pub struct MediaIndex {
    records: HashMap<String, MediaRecord>,
    created: Mutex<Vec<BlobHandle>>,
}

impl MediaIndex {
    pub fn new() -> Self {
        Self {
            records: HashMap::new(),
            created: Mutex::new(Vec::new()),
        }
    }

    /// Move every media member of one archive into the index.
    ///
    /// The first occurrence of a key wins; later duplicates are dropped.
    /// Returns the number of newly registered records and the non-media
    /// members, in their original order.
    pub fn absorb_archive(&mut self, entries: Vec<RawEntry>) -> (usize, Vec<RawEntry>) {
        let mut added = 0;
        let mut rest = Vec::with_capacity(entries.len());
        for entry in entries {
            let path = normalize_path(&entry.path);
            if !is_media_path(&path) {
                rest.push(entry);
                continue;
            }
            let key = path.to_lowercase();
            if self.records.contains_key(&key) {
                continue;
            }
            self.records.insert(key, MediaRecord::new(path, entry.bytes));
            added += 1;
        }
        (added, rest)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Exact lookup after normalization and lower-casing.
    pub fn get(&self, referenced_path: &str) -> Option<&MediaRecord> {
        self.records
            .get(&normalize_path(referenced_path).to_lowercase())
    }

    /// Look up a referenced path and materialize its handle on first access.
    ///
    /// Returns `Ok(None)` when no record matches. Concurrent callers for the
    /// same record all observe the single handle created by the first one.
    pub fn resolve(
        &self,
        referenced_path: &str,
        resolver: &dyn BlobResolver,
    ) -> Result<Option<ResolvedMedia>, ResolveError> {
        let record = match self.get(referenced_path) {
            Some(record) => record,
            None => return Ok(None),
        };

        let mut slot = record.handle.lock().unwrap_or_else(|e| e.into_inner());
        let handle = match slot.as_ref() {
            Some(handle) => handle.clone(),
            None => {
                let handle = resolver.create_handle(record.bytes.clone(), record.mime)?;
                self.created
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .push(handle.clone());
                *slot = Some(handle.clone());
                handle
            }
        };

        Ok(Some(ResolvedMedia {
            handle,
            mime: record.mime,
        }))
    }

    /// Number of handles created so far and not yet released.
    pub fn created_handles(&self) -> usize {
        self.created.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Release every created handle through `resolver`, then forget them.
    ///
    /// Returns how many handles were released. Calling it again is a no-op.
    pub fn release_all(&self, resolver: &dyn BlobResolver) -> usize {
        let mut created = self.created.lock().unwrap_or_else(|e| e.into_inner());
        for handle in created.iter() {
            resolver.release_handle(handle);
        }
        let released = created.len();
        created.clear();
        drop(created);

        for record in self.records.values() {
            *record.handle.lock().unwrap_or_else(|e| e.into_inner()) = None;
        }
        if released > 0 {
            debug!(released, "released media handles");
        }
        released
    }
}

impl Default for MediaIndex {
    fn default() -> Self {
        Self::new()
    }
}
