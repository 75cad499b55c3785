//! # pixelpress
//!
//! An image transcoding and derivative pipeline for attachment libraries.
//! A directory of originals plus a small JSON manifest is the data source:
//! the pipeline converts images to modern containers (WebP, AVIF),
//! regenerates their size derivatives, and can undo all of it, item by item.
//!
//! # Architecture: Engines, Pipeline, Orchestrator
//!
//! Three layers, each usable without the one above it:
//!
//! ```text
//! 1. Engines       probe → identify → transcode/render    (codec access)
//! 2. Pipeline      guarded convert + derivative geometry  (one file at a time)
//! 3. Orchestrator  chunked batches over a store           (whole libraries)
//! ```
//!
//! This separation exists for three reasons:
//!
//! - **Swappability**: everything above the [`engine::Engine`] trait is
//!   codec-agnostic, so a deployment can ship the pure-Rust engine, shell
//!   out to ImageMagick, or mock the whole layer in tests.
//! - **Resumability**: the orchestrator holds no state between chunks, so a
//!   batch can stop, crash, or migrate between processes and pick up where
//!   the store's records say it left off.
//! - **Testability**: geometry planning, naming, and batch arithmetic are
//!   pure functions; unit tests exercise pipeline logic without decoding a
//!   single pixel.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`engine`] | [`engine::Engine`] trait, the native and ImageMagick implementations, probe-once registry |
//! | [`convert`] | Guarded single-file conversion: resource gates, output verification, failure taxonomy |
//! | [`geometry`] | Pure resize/crop planning — cover and contain, never upscale |
//! | [`thumbs`] | Derivative generation from size profiles, per-profile failure isolation |
//! | [`naming`] | Derivative file-name convention: build, parse, MIME mapping |
//! | [`store`] | Attachment store trait + JSON-manifest [`store::FileStore`], conversion records, savings report |
//! | [`batch`] | Chunked orchestrator: convert / revert / sanitize across the whole store |
//! | [`sanitize`] | SVG sanitization seam with a conservative built-in pass |
//! | [`config`] | `config.toml` loading, stock-default merging, size-profile normalization |
//! | [`output`] | CLI output formatting — pure `format_*` functions, thin `print_*` wrappers |
//!
//! # Design Decisions
//!
//! ## Gates Before Pixels
//!
//! Every conversion runs five pre-flight checks — source readable, format
//! supported, memory headroom, file-size ceiling, pixel ceiling — using
//! only header reads. The expensive decode happens after the last gate
//! passes, and a failed or empty output is removed so a failure leaves the
//! filesystem as it found it. See [`convert::convert`].
//!
//! ## Convert Is a Pointer Flip
//!
//! Converting an item never deletes its original. The store tracks an
//! *active file* per item; conversion writes the new container next to the
//! original, regenerates derivatives, and flips the pointer. Revert flips
//! it back and removes what conversion produced, which is why a full
//! convert → revert round trip is byte-exact on the originals.
//!
//! ## Stable Batch Corpora
//!
//! Batch offsets are only meaningful if the corpus doesn't shift under
//! them. Chunk selection therefore filters on the import-time MIME type,
//! which never changes; "already done" is decided per item, not by
//! shrinking the query. A converted item stays in the convert corpus and is
//! skipped as a success when its chunk comes around.
//!
//! ## Pure-Rust Engine First
//!
//! The default engine uses the `image` crate for decode/encode, `rav1d`
//! for AVIF decode, and libwebp bindings for WebP — no system binaries
//! required. The ImageMagick engine is probed at startup and used when
//! present and preferred; if a named engine can't write the requested
//! format, selection falls back to one that can and says so.

pub mod batch;
pub mod config;
pub mod convert;
pub mod engine;
pub mod geometry;
pub mod naming;
pub mod output;
pub mod sanitize;
pub mod store;
pub mod thumbs;

#[cfg(test)]
pub(crate) mod test_helpers;
