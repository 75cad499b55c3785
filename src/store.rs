//! The attachment store: keyed item records behind a trait.
//!
//! The pipeline never assumes a specific persistence engine. Everything it
//! needs from the host system is the [`AttachmentStore`] trait: resolve an
//! item's file, read and write its catalogued metadata, and get/set named
//! meta values (the conversion record lives under one such key). The batch
//! orchestrator additionally needs `select_ids`/`count` so it can walk the
//! corpus in stable ascending-id order.
//!
//! [`FileStore`] is the shipped reference implementation: a JSON manifest at
//! `.pixelpress/store.json` under the upload root, holding a
//! `BTreeMap<ItemId, Item>`. The BTreeMap gives deterministic ascending-id
//! iteration for free, which is exactly the ordering contract `select_ids`
//! promises. Saves go through a tmp file and an atomic rename so a crashed
//! process never leaves a torn manifest.
//!
//! Batch filters select by the item's *original* MIME type, which import
//! records once and conversion never touches. A shrinking filter would make
//! offset-based chunk walks skip items; a stable corpus keeps the offset
//! arithmetic honest and leaves "already converted" to be decided per item
//! at processing time.

use crate::engine::{Dimensions, Engine, TargetFormat};
use crate::naming;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

/// Directory under the upload root holding store state.
const STORE_DIR: &str = ".pixelpress";

/// Manifest file name within [`STORE_DIR`].
const MANIFEST_FILENAME: &str = "store.json";

/// Version of the manifest format. Bump to invalidate old manifests when
/// the schema changes.
const MANIFEST_VERSION: u32 = 1;

/// Meta key the conversion record is persisted under.
pub const CONVERSION_META_KEY: &str = "pixelpress_conversion";

/// Meta key recording the last sanitization pass (unix seconds).
pub const SANITIZED_AT_META_KEY: &str = "pixelpress_sanitized_at";

pub type ItemId = u64;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("no item with id {0}")]
    UnknownItem(ItemId),
    #[error("no store manifest at {0}")]
    NotInitialized(PathBuf),
    #[error("store already initialized at {0}")]
    AlreadyInitialized(PathBuf),
    #[error("unsupported manifest version {found} (expected {expected})")]
    VersionMismatch { found: u32, expected: u32 },
}

/// Which items a batch operation walks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchFilter {
    /// Raster images: everything an engine could transcode.
    Raster,
    /// SVG documents, the sanitization corpus.
    Svg,
}

impl BatchFilter {
    fn matches(self, mime: &str) -> bool {
        match self {
            BatchFilter::Raster => mime.starts_with("image/") && mime != "image/svg+xml",
            BatchFilter::Svg => mime == "image/svg+xml",
        }
    }
}

/// One recorded derivative, stored with its resolved path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizeRecord {
    /// Root-relative path of the derivative file.
    pub file: String,
    pub width: u32,
    pub height: u32,
    pub mime: String,
}

/// Catalogued metadata for one item's active file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemMetadata {
    /// Root-relative path of the file currently served for this item.
    pub file: String,
    pub mime: String,
    pub width: u32,
    pub height: u32,
    /// Derivatives of the active file, keyed by size profile name.
    #[serde(default)]
    pub sizes: BTreeMap<String, SizeRecord>,
}

/// One stored item. `original_path` and `original_mime` are written at
/// import and never change; the mutable state lives in `metadata` and
/// `meta`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Root-relative path of the originally imported file, recorded
    /// verbatim so it can be located independent of the active pointer.
    pub original_path: String,
    pub original_mime: String,
    pub metadata: ItemMetadata,
    #[serde(default)]
    pub meta: BTreeMap<String, String>,
}

/// Persisted outcome of converting one item.
///
/// Created on first successful conversion, overwritten wholesale on
/// re-conversion, deleted on revert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionRecord {
    pub converted: bool,
    pub format: TargetFormat,
    pub engine_name: String,
    /// Size profile names generated for the converted file.
    pub converted_sizes: Vec<String>,
    /// Root-relative path of the pre-conversion file.
    pub original_file: String,
    /// Derivative records of the original, restored on revert.
    #[serde(default)]
    pub original_sizes: BTreeMap<String, SizeRecord>,
    /// SHA-256 hex digest of the original file at conversion time.
    pub source_digest: String,
    pub original_total_bytes: u64,
    pub converted_total_bytes: u64,
    pub bytes_saved: i64,
    pub percent_saved: f64,
    /// Unix seconds.
    pub timestamp: u64,
}

impl ConversionRecord {
    /// Fill in the savings fields from the byte totals.
    pub fn with_totals(mut self, original: u64, converted: u64) -> Self {
        self.original_total_bytes = original;
        self.converted_total_bytes = converted;
        self.bytes_saved = original as i64 - converted as i64;
        self.percent_saved = if original > 0 {
            (self.bytes_saved as f64 / original as f64) * 100.0
        } else {
            0.0
        };
        self
    }
}

/// The keyed record store the pipeline runs against.
///
/// `select_ids` must return ids in ascending order and be stable across
/// calls with no intervening writes; the batch orchestrator's offset
/// arithmetic depends on it.
pub trait AttachmentStore {
    /// Upload root all stored paths are relative to.
    fn root(&self) -> &Path;

    /// Absolute path of the item's active file.
    fn file_path(&self, id: ItemId) -> Result<PathBuf, StoreError>;

    /// Root-relative path and MIME the item was imported with.
    fn original(&self, id: ItemId) -> Result<(String, String), StoreError>;

    fn metadata(&self, id: ItemId) -> Result<ItemMetadata, StoreError>;

    fn set_metadata(&mut self, id: ItemId, metadata: ItemMetadata) -> Result<(), StoreError>;

    fn meta(&self, id: ItemId, key: &str) -> Result<Option<String>, StoreError>;

    fn set_meta(&mut self, id: ItemId, key: &str, value: &str) -> Result<(), StoreError>;

    fn delete_meta(&mut self, id: ItemId, key: &str) -> Result<(), StoreError>;

    /// Ids matching `filter`, ascending, skipping `offset`, at most `limit`.
    fn select_ids(
        &self,
        filter: BatchFilter,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<ItemId>, StoreError>;

    /// Total ids matching `filter`.
    fn count(&self, filter: BatchFilter) -> Result<u32, StoreError>;
}

/// Read an item's conversion record, if one exists.
pub fn load_record(
    store: &dyn AttachmentStore,
    id: ItemId,
) -> Result<Option<ConversionRecord>, StoreError> {
    match store.meta(id, CONVERSION_META_KEY)? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

/// Persist an item's conversion record, replacing any previous one.
pub fn save_record(
    store: &mut dyn AttachmentStore,
    id: ItemId,
    record: &ConversionRecord,
) -> Result<(), StoreError> {
    let raw = serde_json::to_string(record)?;
    store.set_meta(id, CONVERSION_META_KEY, &raw)
}

/// Delete an item's conversion record.
pub fn delete_record(store: &mut dyn AttachmentStore, id: ItemId) -> Result<(), StoreError> {
    store.delete_meta(id, CONVERSION_META_KEY)
}

/// SHA-256 hash of a file's contents, returned as a hex string.
pub fn hash_file(path: &Path) -> std::io::Result<String> {
    let bytes = std::fs::read(path)?;
    let digest = Sha256::digest(&bytes);
    Ok(format!("{:x}", digest))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoreManifest {
    version: u32,
    items: BTreeMap<ItemId, Item>,
}

impl StoreManifest {
    fn empty() -> Self {
        Self {
            version: MANIFEST_VERSION,
            items: BTreeMap::new(),
        }
    }
}

/// File-backed reference implementation of [`AttachmentStore`].
#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
    manifest: StoreManifest,
}

impl FileStore {
    fn manifest_path(root: &Path) -> PathBuf {
        root.join(STORE_DIR).join(MANIFEST_FILENAME)
    }

    /// Create a new empty store under `root`. Fails if one already exists.
    pub fn create(root: &Path) -> Result<Self, StoreError> {
        let path = Self::manifest_path(root);
        if path.exists() {
            return Err(StoreError::AlreadyInitialized(path));
        }
        let store = Self {
            root: root.to_path_buf(),
            manifest: StoreManifest::empty(),
        };
        store.save()?;
        Ok(store)
    }

    /// Open an existing store under `root`.
    pub fn open(root: &Path) -> Result<Self, StoreError> {
        let path = Self::manifest_path(root);
        if !path.exists() {
            return Err(StoreError::NotInitialized(path));
        }
        let content = std::fs::read_to_string(&path)?;
        let manifest: StoreManifest = serde_json::from_str(&content)?;
        if manifest.version != MANIFEST_VERSION {
            return Err(StoreError::VersionMismatch {
                found: manifest.version,
                expected: MANIFEST_VERSION,
            });
        }
        Ok(Self {
            root: root.to_path_buf(),
            manifest,
        })
    }

    /// Open the store under `root`, creating an empty one when absent.
    pub fn open_or_create(root: &Path) -> Result<Self, StoreError> {
        if Self::manifest_path(root).exists() {
            Self::open(root)
        } else {
            Self::create(root)
        }
    }

    /// Persist the manifest. Written to a tmp file first, then renamed, so
    /// readers never observe a half-written manifest.
    pub fn save(&self) -> Result<(), StoreError> {
        let path = Self::manifest_path(&self.root);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.manifest)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// Walk the upload root and catalogue every admissible file not already
    /// in the store. Ids are assigned in sorted-path order so repeated
    /// imports of the same tree produce the same numbering.
    ///
    /// `identify` reads dimensions when the caller has an engine for it;
    /// files it cannot read (and SVG documents) are recorded at 0x0.
    pub fn import(&mut self, identify: Option<&dyn Engine>) -> Result<ImportSummary, StoreError> {
        let mut summary = ImportSummary::default();
        let known: std::collections::BTreeSet<String> = self
            .manifest
            .items
            .values()
            .map(|item| item.original_path.clone())
            .collect();

        let mut candidates = Vec::new();
        for entry in WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.file_name() != STORE_DIR)
        {
            let entry = entry.map_err(|e| {
                StoreError::Io(e.into_io_error().unwrap_or_else(|| {
                    std::io::Error::other("walk failed on a non-io error")
                }))
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(mime) = entry
                .path()
                .extension()
                .and_then(|e| e.to_str())
                .and_then(naming::mime_for_extension)
            else {
                summary.skipped += 1;
                continue;
            };
            // Derivatives of already-stored items are outputs, not sources
            if let Some(name) = entry.path().file_name().and_then(|n| n.to_str())
                && naming::parse_derivative_name(name).is_some()
            {
                summary.skipped += 1;
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(&self.root)
                .unwrap_or(entry.path())
                .to_string_lossy()
                .to_string();
            if known.contains(&relative) {
                summary.skipped += 1;
                continue;
            }
            candidates.push((relative, mime.to_string(), entry.path().to_path_buf()));
        }
        candidates.sort_by(|a, b| a.0.cmp(&b.0));

        let mut next_id = self
            .manifest
            .items
            .keys()
            .next_back()
            .map(|id| id + 1)
            .unwrap_or(1);

        for (relative, mime, absolute) in candidates {
            let dims = match identify {
                Some(engine) if mime != "image/svg+xml" => engine
                    .identify(&absolute)
                    .map(|d| (d.width, d.height))
                    .unwrap_or((0, 0)),
                _ => (0, 0),
            };
            debug!(id = next_id, file = %relative, mime = %mime, "Imported item");
            self.manifest.items.insert(
                next_id,
                Item {
                    original_path: relative.clone(),
                    original_mime: mime.clone(),
                    metadata: ItemMetadata {
                        file: relative,
                        mime,
                        width: dims.0,
                        height: dims.1,
                        sizes: BTreeMap::new(),
                    },
                    meta: BTreeMap::new(),
                },
            );
            next_id += 1;
            summary.added += 1;
        }

        self.save()?;
        Ok(summary)
    }

    /// All items in ascending-id order.
    pub fn items(&self) -> impl Iterator<Item = (ItemId, &Item)> {
        self.manifest.items.iter().map(|(id, item)| (*id, item))
    }

    pub fn len(&self) -> usize {
        self.manifest.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.manifest.items.is_empty()
    }

    /// Insert an item directly. Test seams and migrations only; `import` is
    /// the normal entry path.
    pub fn insert_item(&mut self, id: ItemId, item: Item) {
        self.manifest.items.insert(id, item);
    }

    fn item(&self, id: ItemId) -> Result<&Item, StoreError> {
        self.manifest.items.get(&id).ok_or(StoreError::UnknownItem(id))
    }

    fn item_mut(&mut self, id: ItemId) -> Result<&mut Item, StoreError> {
        self.manifest
            .items
            .get_mut(&id)
            .ok_or(StoreError::UnknownItem(id))
    }
}

impl AttachmentStore for FileStore {
    fn root(&self) -> &Path {
        &self.root
    }

    fn file_path(&self, id: ItemId) -> Result<PathBuf, StoreError> {
        Ok(self.root.join(&self.item(id)?.metadata.file))
    }

    fn original(&self, id: ItemId) -> Result<(String, String), StoreError> {
        let item = self.item(id)?;
        Ok((item.original_path.clone(), item.original_mime.clone()))
    }

    fn metadata(&self, id: ItemId) -> Result<ItemMetadata, StoreError> {
        Ok(self.item(id)?.metadata.clone())
    }

    fn set_metadata(&mut self, id: ItemId, metadata: ItemMetadata) -> Result<(), StoreError> {
        self.item_mut(id)?.metadata = metadata;
        self.save()
    }

    fn meta(&self, id: ItemId, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.item(id)?.meta.get(key).cloned())
    }

    fn set_meta(&mut self, id: ItemId, key: &str, value: &str) -> Result<(), StoreError> {
        self.item_mut(id)?.meta.insert(key.to_string(), value.to_string());
        self.save()
    }

    fn delete_meta(&mut self, id: ItemId, key: &str) -> Result<(), StoreError> {
        self.item_mut(id)?.meta.remove(key);
        self.save()
    }

    fn select_ids(
        &self,
        filter: BatchFilter,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<ItemId>, StoreError> {
        Ok(self
            .manifest
            .items
            .iter()
            .filter(|(_, item)| filter.matches(&item.original_mime))
            .map(|(id, _)| *id)
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    fn count(&self, filter: BatchFilter) -> Result<u32, StoreError> {
        Ok(self
            .manifest
            .items
            .values()
            .filter(|item| filter.matches(&item.original_mime))
            .count() as u32)
    }
}

/// What one `import` run did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub added: u32,
    pub skipped: u32,
}

impl fmt::Display for ImportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.skipped > 0 {
            write!(f, "{} imported, {} skipped", self.added, self.skipped)
        } else {
            write!(f, "{} imported", self.added)
        }
    }
}

/// Aggregate savings across every conversion record in the store.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SavingsReport {
    pub items_total: u32,
    pub items_converted: u32,
    pub original_bytes: u64,
    pub converted_bytes: u64,
}

impl SavingsReport {
    /// Walk every raster item and sum its conversion record, if any.
    pub fn collect(store: &dyn AttachmentStore) -> Result<Self, StoreError> {
        let mut report = Self::default();
        let ids = store.select_ids(BatchFilter::Raster, 0, u32::MAX)?;
        report.items_total = ids.len() as u32;
        for id in ids {
            if let Some(record) = load_record(store, id)?
                && record.converted
            {
                report.items_converted += 1;
                report.original_bytes += record.original_total_bytes;
                report.converted_bytes += record.converted_total_bytes;
            }
        }
        Ok(report)
    }

    pub fn bytes_saved(&self) -> i64 {
        self.original_bytes as i64 - self.converted_bytes as i64
    }

    pub fn percent_saved(&self) -> f64 {
        if self.original_bytes == 0 {
            0.0
        } else {
            (self.bytes_saved() as f64 / self.original_bytes as f64) * 100.0
        }
    }
}

impl fmt::Display for SavingsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Converted: {}/{} items",
            self.items_converted, self.items_total
        )?;
        writeln!(f, "Original:  {} bytes", self.original_bytes)?;
        writeln!(f, "Converted: {} bytes", self.converted_bytes)?;
        write!(
            f,
            "Saved:     {} bytes ({:.1}%)",
            self.bytes_saved(),
            self.percent_saved()
        )
    }
}

/// Dimensions helper for callers holding catalogued width/height that may
/// be unknown (0x0 at import time).
pub fn known_dimensions(metadata: &ItemMetadata) -> Option<Dimensions> {
    if metadata.width > 0 && metadata.height > 0 {
        Some(Dimensions::new(metadata.width, metadata.height))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::backend::tests::MockEngine;
    use std::fs;
    use tempfile::TempDir;

    fn seeded_store(files: &[(&str, &str)]) -> (TempDir, FileStore) {
        let tmp = TempDir::new().unwrap();
        for (path, content) in files {
            let full = tmp.path().join(path);
            fs::create_dir_all(full.parent().unwrap()).unwrap();
            fs::write(&full, content).unwrap();
        }
        let mut store = FileStore::create(tmp.path()).unwrap();
        store.import(None).unwrap();
        (tmp, store)
    }

    // =========================================================================
    // Create / open / import
    // =========================================================================

    #[test]
    fn create_then_open_round_trips() {
        let tmp = TempDir::new().unwrap();
        FileStore::create(tmp.path()).unwrap();
        let store = FileStore::open(tmp.path()).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn create_twice_fails() {
        let tmp = TempDir::new().unwrap();
        FileStore::create(tmp.path()).unwrap();
        assert!(matches!(
            FileStore::create(tmp.path()),
            Err(StoreError::AlreadyInitialized(_))
        ));
    }

    #[test]
    fn open_without_manifest_fails() {
        let tmp = TempDir::new().unwrap();
        assert!(matches!(
            FileStore::open(tmp.path()),
            Err(StoreError::NotInitialized(_))
        ));
    }

    #[test]
    fn open_rejects_future_manifest_version() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join(STORE_DIR);
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join(MANIFEST_FILENAME),
            format!(r#"{{"version": {}, "items": {{}}}}"#, MANIFEST_VERSION + 1),
        )
        .unwrap();

        assert!(matches!(
            FileStore::open(tmp.path()),
            Err(StoreError::VersionMismatch { .. })
        ));
    }

    #[test]
    fn import_assigns_ascending_ids_in_path_order() {
        let (_tmp, store) = seeded_store(&[
            ("b.png", "png"),
            ("a.jpg", "jpg"),
            ("sub/c.jpg", "jpg"),
        ]);

        let files: Vec<(ItemId, String)> = store
            .items()
            .map(|(id, item)| (id, item.original_path.clone()))
            .collect();
        assert_eq!(
            files,
            vec![
                (1, "a.jpg".to_string()),
                (2, "b.png".to_string()),
                (3, "sub/c.jpg".to_string()),
            ]
        );
    }

    #[test]
    fn import_skips_unknown_extensions_and_derivatives() {
        let (_tmp, store) = seeded_store(&[
            ("photo.jpg", "jpg"),
            ("notes.txt", "text"),
            ("photo-150x150-c.jpg", "derivative"),
        ]);

        assert_eq!(store.len(), 1);
        let (_, item) = store.items().next().unwrap();
        assert_eq!(item.original_path, "photo.jpg");
    }

    #[test]
    fn import_is_idempotent() {
        let (_tmp, mut store) = seeded_store(&[("a.jpg", "jpg")]);
        let again = store.import(None).unwrap();
        assert_eq!(again.added, 0);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn import_records_identified_dimensions() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.jpg"), "jpg").unwrap();
        let engine =
            MockEngine::with_dimensions("mock", vec![crate::engine::Dimensions::new(800, 600)]);

        let mut store = FileStore::create(tmp.path()).unwrap();
        store.import(Some(&engine)).unwrap();

        let metadata = store.metadata(1).unwrap();
        assert_eq!((metadata.width, metadata.height), (800, 600));
    }

    #[test]
    fn import_leaves_svg_dimensions_unknown() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("logo.svg"), "<svg/>").unwrap();
        let engine = MockEngine::new("mock");

        let mut store = FileStore::create(tmp.path()).unwrap();
        store.import(Some(&engine)).unwrap();

        let metadata = store.metadata(1).unwrap();
        assert_eq!((metadata.width, metadata.height), (0, 0));
        assert!(!engine.touched_pixels());
    }

    // =========================================================================
    // Trait surface
    // =========================================================================

    #[test]
    fn file_path_joins_active_file_to_root() {
        let (tmp, store) = seeded_store(&[("sub/a.jpg", "jpg")]);
        assert_eq!(store.file_path(1).unwrap(), tmp.path().join("sub/a.jpg"));
        assert!(matches!(
            store.file_path(99),
            Err(StoreError::UnknownItem(99))
        ));
    }

    #[test]
    fn metadata_updates_persist_across_reopen() {
        let (tmp, mut store) = seeded_store(&[("a.jpg", "jpg")]);

        let mut metadata = store.metadata(1).unwrap();
        metadata.file = "a.webp".to_string();
        metadata.mime = "image/webp".to_string();
        store.set_metadata(1, metadata).unwrap();

        let reopened = FileStore::open(tmp.path()).unwrap();
        assert_eq!(reopened.metadata(1).unwrap().file, "a.webp");
        // The import-time original is untouched
        assert_eq!(reopened.original(1).unwrap().0, "a.jpg");
    }

    #[test]
    fn meta_set_get_delete() {
        let (_tmp, mut store) = seeded_store(&[("a.jpg", "jpg")]);

        assert_eq!(store.meta(1, "k").unwrap(), None);
        store.set_meta(1, "k", "v").unwrap();
        assert_eq!(store.meta(1, "k").unwrap().as_deref(), Some("v"));
        store.delete_meta(1, "k").unwrap();
        assert_eq!(store.meta(1, "k").unwrap(), None);
    }

    #[test]
    fn select_ids_filters_and_pages() {
        let (_tmp, store) = seeded_store(&[
            ("a.jpg", "jpg"),
            ("b.svg", "<svg/>"),
            ("c.png", "png"),
            ("d.jpg", "jpg"),
        ]);

        assert_eq!(store.count(BatchFilter::Raster).unwrap(), 3);
        assert_eq!(store.count(BatchFilter::Svg).unwrap(), 1);

        let all = store.select_ids(BatchFilter::Raster, 0, 100).unwrap();
        let page = store.select_ids(BatchFilter::Raster, 1, 1).unwrap();
        assert_eq!(page, all[1..2].to_vec());

        let svg = store.select_ids(BatchFilter::Svg, 0, 100).unwrap();
        assert_eq!(svg.len(), 1);
    }

    #[test]
    fn select_ids_is_stable_between_calls() {
        let (_tmp, store) = seeded_store(&[("a.jpg", "jpg"), ("b.jpg", "jpg"), ("c.jpg", "jpg")]);

        let first = store.select_ids(BatchFilter::Raster, 0, 2).unwrap();
        let second = store.select_ids(BatchFilter::Raster, 0, 2).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn select_ids_offset_past_end_is_empty() {
        let (_tmp, store) = seeded_store(&[("a.jpg", "jpg")]);
        assert!(store.select_ids(BatchFilter::Raster, 5, 10).unwrap().is_empty());
    }

    // =========================================================================
    // Records
    // =========================================================================

    fn sample_record() -> ConversionRecord {
        ConversionRecord {
            converted: true,
            format: TargetFormat::Webp,
            engine_name: "native".to_string(),
            converted_sizes: vec!["thumbnail".to_string()],
            original_file: "a.jpg".to_string(),
            original_sizes: BTreeMap::new(),
            source_digest: "ab".repeat(32),
            original_total_bytes: 0,
            converted_total_bytes: 0,
            bytes_saved: 0,
            percent_saved: 0.0,
            timestamp: 1_700_000_000,
        }
        .with_totals(1000, 400)
    }

    #[test]
    fn record_round_trips_through_meta() {
        let (_tmp, mut store) = seeded_store(&[("a.jpg", "jpg")]);

        assert_eq!(load_record(&store, 1).unwrap(), None);

        let record = sample_record();
        save_record(&mut store, 1, &record).unwrap();
        assert_eq!(load_record(&store, 1).unwrap(), Some(record));

        delete_record(&mut store, 1).unwrap();
        assert_eq!(load_record(&store, 1).unwrap(), None);
    }

    #[test]
    fn with_totals_computes_savings() {
        let record = sample_record();
        assert_eq!(record.original_total_bytes, 1000);
        assert_eq!(record.converted_total_bytes, 400);
        assert_eq!(record.bytes_saved, 600);
        assert!((record.percent_saved - 60.0).abs() < f64::EPSILON);
    }

    #[test]
    fn with_totals_handles_growth() {
        let record = sample_record().with_totals(100, 150);
        assert_eq!(record.bytes_saved, -50);
        assert!(record.percent_saved < 0.0);
    }

    #[test]
    fn hash_file_is_deterministic_hex() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("x.bin");
        fs::write(&path, b"hello world").unwrap();

        let h1 = hash_file(&path).unwrap();
        let h2 = hash_file(&path).unwrap();
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);
    }

    // =========================================================================
    // SavingsReport
    // =========================================================================

    #[test]
    fn savings_report_aggregates_converted_items() {
        let (_tmp, mut store) =
            seeded_store(&[("a.jpg", "jpg"), ("b.jpg", "jpg"), ("c.svg", "<svg/>")]);

        save_record(&mut store, 1, &sample_record()).unwrap();

        let report = SavingsReport::collect(&store).unwrap();
        assert_eq!(report.items_total, 2);
        assert_eq!(report.items_converted, 1);
        assert_eq!(report.original_bytes, 1000);
        assert_eq!(report.converted_bytes, 400);
        assert_eq!(report.bytes_saved(), 600);
        assert!((report.percent_saved() - 60.0).abs() < 0.001);
    }

    #[test]
    fn empty_report_avoids_division_by_zero() {
        let report = SavingsReport::default();
        assert_eq!(report.percent_saved(), 0.0);
    }

    #[test]
    fn savings_display_shows_totals() {
        let (_tmp, mut store) = seeded_store(&[("a.jpg", "jpg")]);
        save_record(&mut store, 1, &sample_record()).unwrap();
        let report = SavingsReport::collect(&store).unwrap();

        let rendered = report.to_string();
        assert!(rendered.contains("Converted: 1/1 items"));
        assert!(rendered.contains("(60.0%)"));
    }

    #[test]
    fn known_dimensions_rejects_unknown() {
        let mut metadata = ItemMetadata::default();
        assert_eq!(known_dimensions(&metadata), None);
        metadata.width = 800;
        metadata.height = 600;
        assert_eq!(
            known_dimensions(&metadata),
            Some(Dimensions::new(800, 600))
        );
    }
}
