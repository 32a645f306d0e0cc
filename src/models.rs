//! Core data models used throughout the harness.
//!
//! These types represent the archive members, posts, and media references
//! that flow through the ingestion pipeline.

use serde::Serialize;

use crate::media::BlobHandle;

/// One decompressed archive member.
#[derive(Debug, Clone)]
pub struct RawEntry {
    /// Archive-internal path, as stored in the container.
    pub path: String,
    pub bytes: Vec<u8>,
}

impl RawEntry {
    pub fn new(path: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            bytes: bytes.into(),
        }
    }
}

/// How a piece of media is displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn from_mime(mime: &str) -> Self {
        if mime.starts_with("video/") {
            MediaKind::Video
        } else {
            MediaKind::Image
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }
}

/// A post's use of one media file.
///
/// `handle`, `kind` and `mime` are `None` when the referenced path has no
/// matching member in any ingested archive.
#[derive(Debug, Clone, Serialize)]
pub struct MediaReference {
    /// Normalized, repaired path as referenced by the post.
    pub uri: String,
    pub handle: Option<BlobHandle>,
    #[serde(rename = "type")]
    pub kind: Option<MediaKind>,
    pub mime: Option<&'static str>,
    pub title: String,
    pub description: String,
}

/// The canonical unit of content.
#[derive(Debug, Clone, Serialize)]
pub struct Post {
    /// Hex digest of `"<timestamp>\n<text>\n<permalink>"`.
    pub id: String,
    /// Milliseconds since the Unix epoch.
    pub created_at: i64,
    pub text: String,
    pub title: String,
    pub permalink: String,
    pub media: Vec<MediaReference>,
    pub source_path: String,
}
