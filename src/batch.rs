//! Chunked batch processing across the whole corpus.
//!
//! Large libraries cannot be converted inside one request cycle, so the
//! orchestrator works in fixed-size chunks: the caller sends
//! `{action, offset}`, gets back `{processed, batch_size, errors}`, and
//! decides whether to send the next chunk. The orchestrator holds no state
//! between calls — everything resumable lives in the caller's
//! [`BatchCursor`] and the per-item conversion records in the store, which
//! is what lets the driving loop move between processes mid-run.
//!
//! The corpus an operation walks is fixed by the item's import-time MIME
//! type and never shrinks as items are processed; whether an item still
//! needs work is decided per item when its chunk arrives. Already-converted
//! items are skipped by `convert`, unconverted ones by `revert`, and both
//! skips count as successes, so offsets stay aligned with the stable
//! ordering `select_ids` guarantees.
//!
//! Completion is signaled two ways and callers must honor both: the
//! processed count reaching the total, or a chunk coming back smaller than
//! requested. Checking only one either stops early or loops forever.
//!
//! Concurrent drivers over overlapping ranges are not coordinated: skips
//! make double-processing harmless but wasted, and revert racing convert is
//! undefined. One driver per corpus is the operating assumption.

use crate::config::PipelineConfig;
use crate::convert::{ConversionOutcome, ConversionRequest, convert};
use crate::engine::EngineRegistry;
use crate::naming;
use crate::sanitize::Sanitizer;
use crate::store::{
    AttachmentStore, BatchFilter, ConversionRecord, ItemId, SANITIZED_AT_META_KEY, SizeRecord,
    StoreError, delete_record, hash_file, known_dimensions, load_record, save_record,
};
use crate::thumbs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::mpsc::Sender;
use thiserror::Error;
use tracing::{debug, error, warn};

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Which batch operation a chunk belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchKind {
    Convert,
    Revert,
    Sanitize,
}

impl BatchKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BatchKind::Convert => "convert",
            BatchKind::Revert => "revert",
            BatchKind::Sanitize => "sanitize",
        }
    }

    fn filter(self) -> BatchFilter {
        match self {
            BatchKind::Convert | BatchKind::Revert => BatchFilter::Raster,
            BatchKind::Sanitize => BatchFilter::Svg,
        }
    }
}

impl fmt::Display for BatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown batch action `{0}` (expected `convert`, `revert` or `sanitize`)")]
pub struct ParseKindError(String);

impl FromStr for BatchKind {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "convert" => Ok(BatchKind::Convert),
            "revert" => Ok(BatchKind::Revert),
            "sanitize" => Ok(BatchKind::Sanitize),
            _ => Err(ParseKindError(s.to_string())),
        }
    }
}

/// One chunk request, as carried by whatever transport drives the batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRequest {
    pub action: BatchKind,
    pub offset: u32,
}

/// One chunk response. Termination is signaled through these fields only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResponse {
    /// Items accounted for so far: `offset + batch_size`, capped at the
    /// corpus total.
    pub processed: u32,
    /// Items in this chunk. Zero means the offset is past the corpus end.
    pub batch_size: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

/// Caller-held position in a batch run. The orchestrator never stores one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchCursor {
    pub offset: u32,
    pub total: u32,
    pub processed: u32,
}

impl BatchCursor {
    pub fn start(total: u32) -> Self {
        Self {
            offset: 0,
            total,
            processed: 0,
        }
    }

    /// Fold one response in, advancing the offset by the chunk size.
    pub fn advance(&mut self, response: &BatchResponse) {
        self.offset += response.batch_size;
        self.processed = response.processed;
    }

    /// Both completion signals: every item accounted for, or the store
    /// returned a short (or empty) chunk.
    pub fn is_complete(&self, last_batch_size: u32, limit: u32) -> bool {
        self.processed >= self.total || last_batch_size < limit
    }
}

/// Per-chunk processing summary.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkOutcome {
    /// Items that completed (including idempotent skips).
    pub done: u32,
    /// Items the chunk contained.
    pub total_in_chunk: u32,
    pub errors: Vec<String>,
}

/// Typed progress events, consumed by a printer thread in the binary.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    ChunkStarted {
        kind: BatchKind,
        offset: u32,
        limit: u32,
    },
    ItemFailed {
        id: ItemId,
        message: String,
    },
    ChunkFinished {
        kind: BatchKind,
        processed: u32,
        total: u32,
    },
    RunFinished {
        kind: BatchKind,
        processed: u32,
        total: u32,
        failed: u32,
    },
}

/// Summary of a full [`Orchestrator::drive`] run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub kind: BatchKind,
    pub total: u32,
    pub processed: u32,
    pub errors: Vec<String>,
}

/// The batch orchestrator. Stateless: all of its fields are borrowed
/// collaborators, and nothing survives between calls.
pub struct Orchestrator<'a> {
    registry: &'a EngineRegistry,
    sanitizer: &'a dyn Sanitizer,
    config: &'a PipelineConfig,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        registry: &'a EngineRegistry,
        sanitizer: &'a dyn Sanitizer,
        config: &'a PipelineConfig,
    ) -> Self {
        Self {
            registry,
            sanitizer,
            config,
        }
    }

    /// Corpus size for an operation kind.
    pub fn total(&self, store: &dyn AttachmentStore, kind: BatchKind) -> Result<u32, BatchError> {
        Ok(store.count(kind.filter())?)
    }

    /// The next chunk of item ids, in stable ascending order.
    pub fn fetch_chunk(
        &self,
        store: &dyn AttachmentStore,
        kind: BatchKind,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<ItemId>, BatchError> {
        Ok(store.select_ids(kind.filter(), offset, limit)?)
    }

    /// Process one chunk of items. Item failures land in `errors` and never
    /// abort the remaining items; only a store-level fault is returned.
    pub fn process_chunk(
        &self,
        store: &mut dyn AttachmentStore,
        kind: BatchKind,
        ids: &[ItemId],
        progress: Option<&Sender<ProgressEvent>>,
    ) -> ChunkOutcome {
        let mut outcome = ChunkOutcome {
            done: 0,
            total_in_chunk: ids.len() as u32,
            errors: Vec::new(),
        };

        for &id in ids {
            let result = match kind {
                BatchKind::Convert => self.convert_item(store, id),
                BatchKind::Revert => self.revert_item(store, id),
                BatchKind::Sanitize => self.sanitize_item(store, id),
            };
            match result {
                Ok(()) => outcome.done += 1,
                Err(message) => {
                    error!(item = id, kind = %kind, %message, "Item failed");
                    if let Some(tx) = progress {
                        let _ = tx.send(ProgressEvent::ItemFailed {
                            id,
                            message: message.clone(),
                        });
                    }
                    outcome.errors.push(format!("item {id}: {message}"));
                }
            }
        }

        outcome
    }

    /// Handle one control-surface request: fetch, process, report.
    pub fn handle(
        &self,
        store: &mut dyn AttachmentStore,
        request: &BatchRequest,
        progress: Option<&Sender<ProgressEvent>>,
    ) -> Result<BatchResponse, BatchError> {
        let limit = self.config.batch.chunk_size;
        let total = self.total(store, request.action)?;
        let ids = self.fetch_chunk(store, request.action, request.offset, limit)?;

        debug!(
            kind = %request.action,
            offset = request.offset,
            chunk = ids.len(),
            total,
            "Processing chunk"
        );
        if let Some(tx) = progress {
            let _ = tx.send(ProgressEvent::ChunkStarted {
                kind: request.action,
                offset: request.offset,
                limit,
            });
        }

        let outcome = self.process_chunk(store, request.action, &ids, progress);
        let batch_size = ids.len() as u32;
        let processed = (request.offset + batch_size).min(total);

        if let Some(tx) = progress {
            let _ = tx.send(ProgressEvent::ChunkFinished {
                kind: request.action,
                processed,
                total,
            });
        }

        Ok(BatchResponse {
            processed,
            batch_size,
            errors: outcome.errors,
        })
    }

    /// In-process driving loop: issue chunk requests until either
    /// completion signal fires, accumulating errors along the way.
    pub fn drive(
        &self,
        store: &mut dyn AttachmentStore,
        kind: BatchKind,
        progress: Option<&Sender<ProgressEvent>>,
    ) -> Result<RunSummary, BatchError> {
        let limit = self.config.batch.chunk_size;
        let total = self.total(store, kind)?;
        let mut cursor = BatchCursor::start(total);
        let mut errors = Vec::new();

        loop {
            let request = BatchRequest {
                action: kind,
                offset: cursor.offset,
            };
            let response = self.handle(store, &request, progress)?;
            errors.extend(response.errors.iter().cloned());
            cursor.advance(&response);

            if cursor.is_complete(response.batch_size, limit) {
                break;
            }
        }

        if let Some(tx) = progress {
            let _ = tx.send(ProgressEvent::RunFinished {
                kind,
                processed: cursor.processed,
                total,
                failed: errors.len() as u32,
            });
        }

        Ok(RunSummary {
            kind,
            total,
            processed: cursor.processed,
            errors,
        })
    }

    // -------------------------------------------------------------------
    // Per-item operations
    // -------------------------------------------------------------------

    /// Convert one item: transcode the active file, regenerate derivatives
    /// in the new container, flip the active pointer, write the record.
    fn convert_item(&self, store: &mut dyn AttachmentStore, id: ItemId) -> Result<(), String> {
        if let Some(record) = load_record(store, id).map_err(|e| e.to_string())?
            && record.converted
        {
            debug!(item = id, "Already converted, skipping");
            return Ok(());
        }

        let format = self.config.format;
        let metadata = store.metadata(id).map_err(|e| e.to_string())?;
        if metadata.mime == format.mime() {
            debug!(item = id, "Already in the target container, skipping");
            return Ok(());
        }

        let Some(engine) = self.registry.choose(format, &self.config.engine) else {
            return Err(format!("no available engine writes {format}"));
        };
        let root = store.root().to_path_buf();
        let source_abs = root.join(&metadata.file);

        let source_name = Path::new(&metadata.file)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| format!("item file `{}` has no file name", metadata.file))?;
        let dest_name = naming::converted_file_name(&source_name, format);
        let dest_rel = match Path::new(&metadata.file).parent() {
            Some(parent) if parent != Path::new("") => {
                parent.join(&dest_name).to_string_lossy().to_string()
            }
            _ => dest_name.clone(),
        };
        let dest_abs = root.join(&dest_rel);

        // Byte totals and digest are read before the pipeline touches
        // anything, so a failed convert leaves no record behind
        let original_total = file_size(&source_abs)
            + metadata
                .sizes
                .values()
                .map(|s| file_size(&root.join(&s.file)))
                .sum::<u64>();
        let source_digest = hash_file(&source_abs).map_err(|e| e.to_string())?;

        let request = ConversionRequest {
            source: source_abs,
            dest: dest_abs.clone(),
            format,
            quality: self.config.quality,
        };
        match convert(engine, &request, &self.config.limits) {
            ConversionOutcome::Success { .. } => {}
            ConversionOutcome::Failure { reason } => return Err(reason.to_string()),
        }

        // Derivatives re-encode the converted file, so they come out in the
        // new container. A generator fault costs the derivatives, not the
        // conversion.
        let profiles = self.config.normalized_sizes();
        let derivatives = match thumbs::generate(
            engine,
            &dest_abs,
            known_dimensions(&metadata),
            &profiles,
            self.config.quality,
        ) {
            Ok(set) => set,
            Err(e) => {
                warn!(item = id, error = %e, "Derivative generation skipped");
                thumbs::DerivativeSet::default()
            }
        };

        let mut new_sizes = BTreeMap::new();
        let mut converted_total = file_size(&dest_abs);
        for derivative in derivatives.iter() {
            converted_total += file_size(&derivative.path);
            let rel = derivative
                .path
                .strip_prefix(&root)
                .unwrap_or(&derivative.path)
                .to_string_lossy()
                .to_string();
            new_sizes.insert(
                derivative.profile.clone(),
                SizeRecord {
                    file: rel,
                    width: derivative.width,
                    height: derivative.height,
                    mime: derivative.mime.clone(),
                },
            );
        }

        let record = ConversionRecord {
            converted: true,
            format,
            engine_name: engine.name().to_string(),
            converted_sizes: derivatives.names(),
            original_file: metadata.file.clone(),
            original_sizes: metadata.sizes.clone(),
            source_digest,
            original_total_bytes: 0,
            converted_total_bytes: 0,
            bytes_saved: 0,
            percent_saved: 0.0,
            timestamp: unix_now(),
        }
        .with_totals(original_total, converted_total);

        let mut updated = metadata;
        updated.file = dest_rel;
        updated.mime = format.mime().to_string();
        updated.sizes = new_sizes;

        save_record(store, id, &record).map_err(|e| e.to_string())?;
        store.set_metadata(id, updated).map_err(|e| e.to_string())?;
        Ok(())
    }

    /// Revert one item: remove the converted file and its derivatives,
    /// restore the original pointer and metadata, drop the record.
    fn revert_item(&self, store: &mut dyn AttachmentStore, id: ItemId) -> Result<(), String> {
        let Some(record) = load_record(store, id).map_err(|e| e.to_string())? else {
            debug!(item = id, "Not converted, skipping");
            return Ok(());
        };
        if !record.converted {
            return Ok(());
        }

        let metadata = store.metadata(id).map_err(|e| e.to_string())?;
        let root = store.root().to_path_buf();

        // Recorded derivatives first, then the converted file itself
        for size in metadata.sizes.values() {
            remove_if_exists(&root.join(&size.file));
        }
        let converted_abs = root.join(&metadata.file);
        if metadata.file != record.original_file {
            remove_if_exists(&converted_abs);
        }

        // Sweep orphans: conventionally-named derivatives of the converted
        // file that fell out of the metadata record (crashed runs, older
        // profile sets)
        sweep_orphan_derivatives(&converted_abs, record.format.extension());

        let original_abs = root.join(&record.original_file);
        if !original_abs.exists() {
            return Err(format!(
                "original file `{}` is missing, refusing to revert",
                record.original_file
            ));
        }

        let mime = Path::new(&record.original_file)
            .extension()
            .and_then(|e| e.to_str())
            .and_then(naming::mime_for_extension)
            .map(str::to_string)
            .or_else(|| store.original(id).ok().map(|(_, mime)| mime))
            .unwrap_or_else(|| "application/octet-stream".to_string());

        let mut restored = metadata;
        restored.file = record.original_file.clone();
        restored.mime = mime;
        restored.sizes = record.original_sizes.clone();

        store.set_metadata(id, restored).map_err(|e| e.to_string())?;
        delete_record(store, id).map_err(|e| e.to_string())?;
        Ok(())
    }

    /// Re-sanitize one SVG item through the injected sanitizer.
    fn sanitize_item(&self, store: &mut dyn AttachmentStore, id: ItemId) -> Result<(), String> {
        let path = store.file_path(id).map_err(|e| e.to_string())?;
        let bytes = std::fs::read(&path).map_err(|e| e.to_string())?;

        let clean = self.sanitizer.sanitize(&bytes).map_err(|e| e.to_string())?;
        if clean != bytes {
            std::fs::write(&path, clean).map_err(|e| e.to_string())?;
        }

        store
            .set_meta(id, SANITIZED_AT_META_KEY, &unix_now().to_string())
            .map_err(|e| e.to_string())?;
        Ok(())
    }
}

fn file_size(path: &Path) -> u64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

fn remove_if_exists(path: &Path) {
    if path.exists()
        && let Err(e) = std::fs::remove_file(path)
    {
        warn!(path = %path.display(), error = %e, "Could not remove file");
    }
}

/// Delete files in `converted`'s directory whose name parses as a
/// derivative of `converted`'s stem in the given container.
fn sweep_orphan_derivatives(converted: &Path, extension: &str) {
    let Some(parent) = converted.parent() else {
        return;
    };
    let Some(stem) = converted.file_stem().and_then(|s| s.to_str()) else {
        return;
    };
    let Ok(entries) = std::fs::read_dir(parent) else {
        return;
    };
    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        let matches_ext = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(extension));
        if !matches_ext {
            continue;
        }
        if let Some(parsed) = naming::parse_derivative_name(name)
            && parsed.stem == stem
        {
            remove_if_exists(&entry.path());
        }
    }
}

fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
