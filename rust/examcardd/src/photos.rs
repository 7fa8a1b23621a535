//! Student photos keyed by identifier.

use anyhow::Context;
use image::DynamicImage;
use serde::Serialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Read, Seek};
use std::path::{Path, PathBuf};
use zip::ZipArchive;

use crate::assets::decode_bytes;

const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];
const MACOS_METADATA_DIR: &str = "__MACOSX";
/// Larger entries are not student photos; reading stops once this is exceeded.
const MAX_PHOTO_BYTES: u64 = 32 * 1024 * 1024;
/// Upper bound on what an archive's declared entry size can reserve up front.
const MAX_PREALLOC: u64 = 1024 * 1024;

/// Read at most `MAX_PHOTO_BYTES`. `Ok(None)` when the data is larger than that. `declared` is
/// only a capacity hint and is not trusted.
fn read_capped<R: Read>(reader: R, declared: u64) -> io::Result<Option<Vec<u8>>> {
    let mut bytes = Vec::with_capacity(declared.min(MAX_PREALLOC) as usize);
    reader.take(MAX_PHOTO_BYTES + 1).read_to_end(&mut bytes)?;
    if bytes.len() as u64 > MAX_PHOTO_BYTES {
        return Ok(None);
    }
    Ok(Some(bytes))
}

/// Lookup key for an archive entry or file name: the base name without directories and without
/// its last extension. Returns `None` for anything that is not a photo (wrong extension,
/// directories, archive metadata).
pub fn photo_key(entry_name: &str) -> Option<String> {
    let normalized = entry_name.replace('\\', "/");
    if normalized.ends_with('/') {
        return None;
    }
    if normalized
        .split('/')
        .any(|seg| seg.eq_ignore_ascii_case(MACOS_METADATA_DIR))
    {
        return None;
    }
    let base = normalized.rsplit('/').next().unwrap_or("");
    // AppleDouble companions ("._12345.jpg") and dotfiles.
    if base.starts_with('.') {
        return None;
    }
    let (stem, ext) = base.rsplit_once('.')?;
    if !IMAGE_EXTENSIONS
        .iter()
        .any(|e| ext.eq_ignore_ascii_case(e))
    {
        return None;
    }
    let stem = stem.trim();
    if stem.is_empty() {
        return None;
    }
    Some(stem.to_string())
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub added: usize,
    pub replaced: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl ImportSummary {
    pub fn imported(&self) -> usize {
        self.added + self.replaced
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PhotoSource {
    Primary,
    Fallback,
    Placeholder,
}

/// Outcome of the two-key lookup for one student.
#[derive(Debug, Clone, Copy)]
pub struct PhotoMatch<'a> {
    pub source: PhotoSource,
    pub key: Option<&'a str>,
    pub image: Option<&'a DynamicImage>,
}

#[derive(Debug, Default, Clone)]
pub struct PhotoIndex {
    photos: HashMap<String, DynamicImage>,
}

impl PhotoIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.photos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.photos.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.photos.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&DynamicImage> {
        if key.is_empty() {
            return None;
        }
        self.photos.get(key)
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.photos.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Last write wins. Returns true when an earlier photo was replaced.
    pub fn insert(&mut self, key: impl Into<String>, image: DynamicImage) -> bool {
        self.photos.insert(key.into(), image).is_some()
    }

    /// Primary identifier first, then the fallback; `Placeholder` when neither is indexed.
    pub fn resolve<'a>(&'a self, primary: &'a str, fallback: &'a str) -> PhotoMatch<'a> {
        if let Some(image) = self.get(primary) {
            return PhotoMatch {
                source: PhotoSource::Primary,
                key: Some(primary),
                image: Some(image),
            };
        }
        if let Some(image) = self.get(fallback) {
            return PhotoMatch {
                source: PhotoSource::Fallback,
                key: Some(fallback),
                image: Some(image),
            };
        }
        PhotoMatch {
            source: PhotoSource::Placeholder,
            key: None,
            image: None,
        }
    }

    fn accept(&mut self, key: String, bytes: &[u8], summary: &mut ImportSummary) {
        match decode_bytes(bytes) {
            Some(image) => {
                if self.insert(key, image) {
                    summary.replaced += 1;
                } else {
                    summary.added += 1;
                }
            }
            None => {
                tracing::debug!(key = %key, "photo could not be decoded; skipped");
                summary.failed += 1;
            }
        }
    }

    /// An unreadable archive fails the whole import; unreadable entries are dropped one by one.
    pub fn merge_zip<R: Read + Seek>(&mut self, reader: R) -> anyhow::Result<ImportSummary> {
        let mut archive = ZipArchive::new(reader).context("invalid zip archive")?;
        let mut summary = ImportSummary::default();
        for i in 0..archive.len() {
            let mut entry = match archive.by_index(i) {
                Ok(e) => e,
                Err(e) => {
                    tracing::debug!(index = i, error = %e, "unreadable archive entry");
                    summary.failed += 1;
                    continue;
                }
            };
            let key = if entry.is_dir() {
                None
            } else {
                photo_key(entry.name())
            };
            let Some(key) = key else {
                summary.skipped += 1;
                continue;
            };
            let declared = entry.size();
            match read_capped(&mut entry, declared) {
                Ok(Some(bytes)) => self.accept(key, &bytes, &mut summary),
                Ok(None) => {
                    tracing::debug!(key = %key, "archive entry too large for a photo");
                    summary.failed += 1;
                }
                Err(e) => {
                    tracing::debug!(key = %key, error = %e, "failed to inflate archive entry");
                    summary.failed += 1;
                }
            }
        }
        tracing::info!(
            added = summary.added,
            replaced = summary.replaced,
            skipped = summary.skipped,
            failed = summary.failed,
            total = self.len(),
            "photo archive merged"
        );
        Ok(summary)
    }

    pub fn merge_zip_file(&mut self, path: &Path) -> anyhow::Result<ImportSummary> {
        let f = File::open(path)
            .with_context(|| format!("failed to open photo archive {}", path.to_string_lossy()))?;
        self.merge_zip(f)
            .with_context(|| format!("failed to read photo archive {}", path.to_string_lossy()))
    }

    /// Individually selected files. A file that cannot be read counts as failed and is skipped.
    pub fn merge_files(&mut self, paths: &[PathBuf]) -> ImportSummary {
        let mut summary = ImportSummary::default();
        for path in paths {
            let Some(key) = path
                .file_name()
                .and_then(|s| s.to_str())
                .and_then(photo_key)
            else {
                summary.skipped += 1;
                continue;
            };
            match std::fs::read(path) {
                Ok(bytes) => self.accept(key, &bytes, &mut summary),
                Err(e) => {
                    tracing::debug!(path = %path.to_string_lossy(), error = %e, "failed to read photo");
                    summary.failed += 1;
                }
            }
        }
        tracing::info!(
            added = summary.added,
            replaced = summary.replaced,
            skipped = summary.skipped,
            failed = summary.failed,
            total = self.len(),
            "photo files merged"
        );
        summary
    }

    /// Non-recursive folder import, in file-name order so collisions resolve deterministically.
    /// Only an unlistable folder fails; an unreadable entry counts as failed.
    pub fn merge_dir(&mut self, dir: &Path) -> anyhow::Result<ImportSummary> {
        let listing = std::fs::read_dir(dir)
            .with_context(|| format!("failed to list photo folder {}", dir.to_string_lossy()))?;
        Ok(self.merge_listing(listing.map(|ent| ent.map(|e| e.path()))))
    }

    fn merge_listing<I>(&mut self, listing: I) -> ImportSummary
    where
        I: IntoIterator<Item = io::Result<PathBuf>>,
    {
        let mut paths = Vec::new();
        let mut unreadable = 0usize;
        for ent in listing {
            match ent {
                Ok(p) if p.is_file() => paths.push(p),
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(error = %e, "unreadable folder entry");
                    unreadable += 1;
                }
            }
        }
        paths.sort();
        let mut summary = self.merge_files(&paths);
        summary.failed += unreadable;
        summary
    }
}
