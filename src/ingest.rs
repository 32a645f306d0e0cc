//! Ingestion pipeline orchestration.
//!
//! Coordinates one run: decompress each archive → register media → scan JSON
//! members → build posts concurrently → deduplicate, sort and group. The
//! result is a [`Session`]; a [`Harness`] holds at most one session and
//! replaces it on every run.
//!
//! Media from every archive of a batch is registered before any post is
//! built, so a post in one part of a multi-part export can reference a
//! photo stored in another part.

use std::collections::BTreeSet;
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::archive::{Decompressor, ZipDecompressor};
use crate::config::Config;
use crate::dataset::{Dataset, Zone};
use crate::digest::{create_provider, DigestProvider};
use crate::error::{BuildError, DigestError, IngestError};
use crate::extract::{build_post, scan_entry, BuildContext, Candidate, PathFilter};
use crate::media::{normalize_path, BlobResolver, MediaIndex};
use crate::models::{Post, RawEntry};
use crate::report::{ArchiveSummary, IngestReport, ReportBuilder};
use crate::sources::ArchiveSource;
use crate::text_repair::repair_owned;

/// Runs ingestion with a fixed set of collaborators.
pub struct Ingestor {
    decompressor: Arc<dyn Decompressor>,
    resolver: Arc<dyn BlobResolver>,
    digest: Arc<dyn DigestProvider>,
    filter: PathFilter,
    zone: Zone,
}

impl Ingestor {
    pub fn new(
        decompressor: Arc<dyn Decompressor>,
        resolver: Arc<dyn BlobResolver>,
        digest: Arc<dyn DigestProvider>,
        filter: PathFilter,
        zone: Zone,
    ) -> Self {
        Self {
            decompressor,
            resolver,
            digest,
            filter,
            zone,
        }
    }

    /// Zip decompression, the configured digest provider, path segments and
    /// timezone, with handles created through `resolver`.
    pub fn from_config(config: &Config, resolver: Arc<dyn BlobResolver>) -> Result<Self, DigestError> {
        Ok(Self::new(
            Arc::new(ZipDecompressor::new(config.ingest.max_entry_bytes)),
            resolver,
            create_provider(&config.digest)?,
            PathFilter::new(&config.ingest.post_path_segments),
            Zone::from_config(&config.browse),
        ))
    }

    /// Ingest a batch of archives.
    ///
    /// Fails only when the batch is empty or no archive could be opened;
    /// every other problem is recorded in the session's report.
    pub async fn ingest(&self, archives: Vec<ArchiveSource>) -> Result<Session, IngestError> {
        if archives.is_empty() {
            return Err(IngestError::NoArchives);
        }

        let mut report = ReportBuilder::new(archives.len());
        let mut media = MediaIndex::new();
        let mut top_paths = BTreeSet::new();
        let mut candidates = Vec::new();
        let mut readable = 0usize;

        for source in archives {
            let ArchiveSource { name, bytes } = source;
            let sha256 = hex::encode(Sha256::digest(&bytes));
            let size_bytes = bytes.len() as u64;

            let entries = match self.decompressor.decompress(Arc::from(bytes)).await {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(archive = %name, error = %e, "failed to open archive");
                    report.error(format!("Archive read failed: {} ({})", name, e));
                    report.archive(ArchiveSummary {
                        name,
                        sha256,
                        size_bytes,
                        members: None,
                        media_registered: 0,
                    });
                    continue;
                }
            };
            readable += 1;
            let members = entries.len();
            collect_top_paths(&entries, &mut top_paths);

            let (media_registered, rest) = media.absorb_archive(entries);
            for entry in &rest {
                candidates.extend(scan_entry(entry, &self.filter, &mut report));
            }
            info!(archive = %name, members, media = media_registered, "archive scanned");

            report.archive(ArchiveSummary {
                name,
                sha256,
                size_bytes,
                members: Some(members),
                media_registered,
            });
        }

        if readable == 0 {
            return Err(IngestError::NoReadableArchives(Box::new(report.finish(0))));
        }

        let ctx = BuildContext {
            media: Arc::new(media),
            resolver: Arc::clone(&self.resolver),
            digest: Arc::clone(&self.digest),
        };
        let posts = build_all(candidates, &ctx, &mut report).await;

        let dataset = Dataset::build(posts, self.zone, &mut report);
        let report = report.finish(dataset.len());
        info!(
            adopted = report.adopted,
            duplicates = report.duplicates,
            errors = report.errors.len(),
            "ingestion complete"
        );

        Ok(Session {
            dataset,
            report,
            top_paths: top_paths.into_iter().collect(),
            media: ctx.media,
            resolver: ctx.resolver,
        })
    }
}

/// First path segment of every member, repaired.
fn collect_top_paths(entries: &[RawEntry], out: &mut BTreeSet<String>) {
    for entry in entries {
        let path = normalize_path(&entry.path);
        if let Some(top) = path.split('/').next().filter(|s| !s.is_empty()) {
            out.insert(repair_owned(top));
        }
    }
}

/// Build every candidate on its own task. Results are collected in
/// candidate order regardless of completion order.
async fn build_all(
    candidates: Vec<Candidate>,
    ctx: &BuildContext,
    report: &mut ReportBuilder,
) -> Vec<Post> {
    let tasks: Vec<_> = candidates
        .into_iter()
        .map(|candidate| {
            let ctx = ctx.clone();
            let path = candidate.source_path.clone();
            (path, tokio::spawn(async move { build_post(&candidate, &ctx) }))
        })
        .collect();

    let mut posts = Vec::with_capacity(tasks.len());
    for (path, task) in tasks {
        let result = task
            .await
            .unwrap_or_else(|e| Err(BuildError::Aborted(e.to_string())));
        match result {
            Ok(post) => posts.push(post),
            Err(e) => {
                debug!(path = %path, error = %e, "post build failed");
                report.error(format!("Post build failed in {}: {}", path, e));
            }
        }
    }
    posts
}

// ============ Session ============

/// The immutable result of one ingestion run.
///
/// Owns the media index and the resolver that created its handles. Handles
/// are released by [`release`](Session::release) or when the session drops.
pub struct Session {
    pub dataset: Dataset,
    pub report: IngestReport,
    /// Sorted, repaired first path segments across all archives.
    pub top_paths: Vec<String>,
    media: Arc<MediaIndex>,
    resolver: Arc<dyn BlobResolver>,
}

impl Session {
    pub fn media(&self) -> &MediaIndex {
        &self.media
    }

    /// Release every display handle created during the run.
    pub fn release(&self) -> usize {
        self.media.release_all(self.resolver.as_ref())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.release();
    }
}

// ============ Harness ============

/// Holds the current session and replaces it on each run.
pub struct Harness {
    ingestor: Ingestor,
    session: Option<Session>,
}

impl Harness {
    pub fn new(ingestor: Ingestor) -> Self {
        Self {
            ingestor,
            session: None,
        }
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Take ownership of the current session, if any.
    pub fn into_session(mut self) -> Option<Session> {
        self.session.take()
    }

    /// Run ingestion over `archives`, replacing the current session.
    ///
    /// An empty batch is rejected before anything is touched. Otherwise the
    /// previous session's handles are released before processing starts.
    pub async fn run_ingestion(&mut self, archives: Vec<ArchiveSource>) -> Result<&Session, IngestError> {
        if archives.is_empty() {
            return Err(IngestError::NoArchives);
        }
        if let Some(previous) = self.session.take() {
            let released = previous.release();
            debug!(released, "previous session discarded");
        }

        let session = self.ingestor.ingest(archives).await?;
        Ok(self.session.insert(session))
    }
}
