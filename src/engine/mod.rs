//! Image engines — the pluggable codec layer.
//!
//! | Engine | Backed by |
//! |---|---|
//! | [`NativeEngine`] | `image` crate + `rav1d` AVIF decode + libwebp encode |
//! | [`MagickEngine`] | the `magick` CLI |
//!
//! The module is split into:
//! - **Params**: Target formats, quality, engine preference
//! - **Backend**: [`Engine`] trait, probe results, error type
//! - **Engines**: The two concrete implementations
//! - **Registry**: Probe-once discovery and deterministic selection

pub mod backend;
pub mod magick;
pub mod native;
mod params;
mod registry;

pub use backend::{Dimensions, Engine, EngineError, EngineInfo};
pub use magick::{MAGICK_ENGINE, MagickEngine};
pub use native::{NATIVE_ENGINE, NativeEngine};
pub use params::{EnginePreference, ParseFormatError, Quality, TargetFormat};
pub use registry::{EngineRegistry, Validation};
