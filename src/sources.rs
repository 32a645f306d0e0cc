//! Archive discovery on the local filesystem.

use anyhow::{bail, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// One archive's name and compressed bytes.
#[derive(Debug, Clone)]
pub struct ArchiveSource {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Read archives from `paths`.
///
/// Files are taken as given, in argument order. Directories are walked and
/// the files matching `globs` (relative to the directory) are taken, sorted
/// by relative path.
pub fn collect_archives(paths: &[PathBuf], globs: &[String]) -> Result<Vec<ArchiveSource>> {
    let include_set = build_globset(globs)?;
    let mut archives = Vec::new();

    for path in paths {
        if path.is_file() {
            archives.push(read_archive(path, display_name(path))?);
        } else if path.is_dir() {
            archives.extend(scan_directory(path, &include_set)?);
        } else {
            bail!("Archive path does not exist: {}", path.display());
        }
    }

    Ok(archives)
}

fn scan_directory(root: &Path, include_set: &GlobSet) -> Result<Vec<ArchiveSource>> {
    let mut matches = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().replace('\\', "/");
        if !include_set.is_match(&rel_str) {
            continue;
        }
        matches.push((rel_str, path.to_path_buf()));
    }

    // Sort for deterministic ordering
    matches.sort_by(|a, b| a.0.cmp(&b.0));

    matches
        .into_iter()
        .map(|(name, path)| read_archive(&path, name))
        .collect()
}

fn read_archive(path: &Path, name: String) -> Result<ArchiveSource> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read archive: {}", path.display()))?;
    Ok(ArchiveSource { name, bytes })
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
