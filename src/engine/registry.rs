//! Engine discovery and deterministic selection.
//!
//! The registry probes each candidate engine once at construction and caches
//! the results, so selection never re-runs capability queries. Engines are
//! held in preference order: given equal capability, the earlier engine wins
//! every time.

use super::backend::{Engine, EngineInfo};
use super::magick::MagickEngine;
use super::native::NativeEngine;
use super::params::{EnginePreference, TargetFormat};
use std::collections::BTreeSet;
use tracing::{debug, warn};

struct RegisteredEngine {
    engine: Box<dyn Engine>,
    info: EngineInfo,
}

/// Ordered collection of probed engines.
pub struct EngineRegistry {
    engines: Vec<RegisteredEngine>,
}

/// Result of [`EngineRegistry::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validation {
    pub valid: bool,
    pub message: String,
}

impl Validation {
    fn ok(message: String) -> Self {
        Self {
            valid: true,
            message,
        }
    }

    fn fail(message: String) -> Self {
        Self {
            valid: false,
            message,
        }
    }
}

impl EngineRegistry {
    /// Probe each engine once and cache its capabilities. Order is
    /// preference order.
    pub fn discover(engines: Vec<Box<dyn Engine>>) -> Self {
        let engines = engines
            .into_iter()
            .map(|engine| {
                let info = engine.probe();
                debug!(
                    engine = %info.name,
                    available = info.available,
                    version = info.version.as_deref().unwrap_or("-"),
                    "Probed engine"
                );
                RegisteredEngine { engine, info }
            })
            .collect();
        Self { engines }
    }

    /// Standard engine lineup: ImageMagick first, the in-process engine as
    /// fallback.
    pub fn with_default_engines(magick_binary: Option<&str>) -> Self {
        let magick = match magick_binary {
            Some(binary) => MagickEngine::with_binary(binary),
            None => MagickEngine::new(),
        };
        Self::discover(vec![Box::new(magick), Box::new(NativeEngine::new())])
    }

    /// Cached probe results, in preference order.
    pub fn infos(&self) -> impl Iterator<Item = &EngineInfo> {
        self.engines.iter().map(|r| &r.info)
    }

    /// Cached probe result for a specific engine name.
    pub fn info_for(&self, name: &str) -> Option<&EngineInfo> {
        self.lookup(name).map(|r| &r.info)
    }

    fn lookup(&self, name: &str) -> Option<&RegisteredEngine> {
        self.engines.iter().find(|r| r.info.name == name)
    }

    /// Select the engine that will encode `format`.
    ///
    /// A named preference wins when that engine is available and writes the
    /// format; otherwise selection falls back to the first capable engine in
    /// registry order, and the fallback is logged. Returns `None` when no
    /// available engine can write the format.
    pub fn choose(
        &self,
        format: TargetFormat,
        preference: &EnginePreference,
    ) -> Option<&dyn Engine> {
        if let EnginePreference::Named(name) = preference {
            match self.lookup(name) {
                Some(reg) if reg.info.available && reg.info.writes_format(format) => {
                    return Some(reg.engine.as_ref());
                }
                Some(reg) if reg.info.available => {
                    warn!(
                        engine = %name,
                        format = %format,
                        "Preferred engine cannot write format, falling back"
                    );
                }
                Some(_) => {
                    warn!(engine = %name, "Preferred engine unavailable, falling back");
                }
                None => {
                    warn!(engine = %name, "Unknown engine name, falling back");
                }
            }
        }

        self.engines
            .iter()
            .find(|r| r.info.available && r.info.writes_format(format))
            .map(|r| r.engine.as_ref())
    }

    /// Diagnose a preference/format pairing without selecting anything.
    ///
    /// Purely informational: the message explains what `choose` would do,
    /// including a fallback from a named engine. Never mutates state.
    pub fn validate(&self, preference: &EnginePreference, format: TargetFormat) -> Validation {
        let fallback = self
            .engines
            .iter()
            .find(|r| r.info.available && r.info.writes_format(format));

        if let EnginePreference::Named(name) = preference {
            match self.lookup(name) {
                Some(reg) if reg.info.available && reg.info.writes_format(format) => {
                    return Validation::ok(format!("engine `{name}` writes {format}"));
                }
                Some(reg) if reg.info.available => match fallback {
                    Some(f) => {
                        return Validation::ok(format!(
                            "engine `{name}` cannot write {format}, `{}` will be used",
                            f.info.name
                        ));
                    }
                    None => {
                        return Validation::fail(format!(
                            "engine `{name}` cannot write {format} and no available engine does"
                        ));
                    }
                },
                Some(_) | None => match fallback {
                    Some(f) => {
                        return Validation::ok(format!(
                            "engine `{name}` is unavailable, `{}` will be used",
                            f.info.name
                        ));
                    }
                    None => {
                        return Validation::fail(format!(
                            "engine `{name}` is unavailable and no available engine writes {format}"
                        ));
                    }
                },
            }
        }

        match fallback {
            Some(f) => Validation::ok(format!("engine `{}` writes {format}", f.info.name)),
            None => Validation::fail(format!("no available engine writes {format}")),
        }
    }

    /// Select an engine for scale/crop work, where only decode support
    /// matters. Returns `None` only when every engine is unavailable.
    pub fn geometry_engine(&self, preference: &EnginePreference) -> Option<&dyn Engine> {
        if let EnginePreference::Named(name) = preference {
            match self.lookup(name) {
                Some(reg) if reg.info.available => return Some(reg.engine.as_ref()),
                Some(_) => {
                    warn!(engine = %name, "Preferred engine unavailable, falling back");
                }
                None => {
                    warn!(engine = %name, "Unknown engine name, falling back");
                }
            }
        }

        self.engines
            .iter()
            .find(|r| r.info.available)
            .map(|r| r.engine.as_ref())
    }

    /// True when some available engine can write `format`.
    pub fn supports_write(&self, format: TargetFormat) -> bool {
        self.engines
            .iter()
            .any(|r| r.info.available && r.info.writes_format(format))
    }

    /// Union of MIME types readable by the available engines. This is the
    /// admission filter for sources entering the pipeline.
    pub fn supported_input_mimes(&self) -> BTreeSet<String> {
        let mut mimes = BTreeSet::new();
        for reg in &self.engines {
            if reg.info.available {
                mimes.extend(reg.info.reads.iter().cloned());
            }
        }
        mimes
    }
}

#[cfg(test)]
mod tests {
    use super::super::backend::tests::MockEngine;
    use super::super::backend::Dimensions;
    use super::*;

    fn engine_writing(name: &str, formats: &[TargetFormat]) -> Box<dyn Engine> {
        let mut info = EngineInfo::unavailable(name);
        info.available = true;
        info.writes = formats.iter().copied().collect();
        info.reads = ["image/jpeg", "image/png"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        Box::new(MockEngine::with_info(info))
    }

    fn engine_unavailable(name: &str) -> Box<dyn Engine> {
        Box::new(MockEngine::with_info(EngineInfo::unavailable(name)))
    }

    #[test]
    fn choose_picks_first_capable_engine() {
        let registry = EngineRegistry::discover(vec![
            engine_writing("alpha", &[TargetFormat::Webp, TargetFormat::Avif]),
            engine_writing("beta", &[TargetFormat::Webp]),
        ]);

        let chosen = registry
            .choose(TargetFormat::Webp, &EnginePreference::Auto)
            .unwrap();
        assert_eq!(chosen.name(), "alpha");
    }

    #[test]
    fn choose_skips_engine_missing_the_format() {
        // alpha writes WebP only, so AVIF requests must land on beta
        let registry = EngineRegistry::discover(vec![
            engine_writing("alpha", &[TargetFormat::Webp]),
            engine_writing("beta", &[TargetFormat::Webp, TargetFormat::Avif]),
        ]);

        let webp = registry
            .choose(TargetFormat::Webp, &EnginePreference::Auto)
            .unwrap();
        assert_eq!(webp.name(), "alpha");

        let avif = registry
            .choose(TargetFormat::Avif, &EnginePreference::Auto)
            .unwrap();
        assert_eq!(avif.name(), "beta");
    }

    #[test]
    fn choose_skips_unavailable_engine() {
        let registry = EngineRegistry::discover(vec![
            engine_unavailable("alpha"),
            engine_writing("beta", &[TargetFormat::Webp]),
        ]);

        let chosen = registry
            .choose(TargetFormat::Webp, &EnginePreference::Auto)
            .unwrap();
        assert_eq!(chosen.name(), "beta");
    }

    #[test]
    fn choose_honors_named_preference() {
        let registry = EngineRegistry::discover(vec![
            engine_writing("alpha", &[TargetFormat::Webp]),
            engine_writing("beta", &[TargetFormat::Webp]),
        ]);

        let chosen = registry
            .choose(TargetFormat::Webp, &EnginePreference::from_name("beta"))
            .unwrap();
        assert_eq!(chosen.name(), "beta");
    }

    #[test]
    fn choose_falls_back_when_named_engine_cannot_write() {
        let registry = EngineRegistry::discover(vec![
            engine_writing("alpha", &[TargetFormat::Avif]),
            engine_writing("beta", &[TargetFormat::Webp]),
        ]);

        let chosen = registry
            .choose(TargetFormat::Webp, &EnginePreference::from_name("alpha"))
            .unwrap();
        assert_eq!(chosen.name(), "beta");
    }

    #[test]
    fn choose_falls_back_when_named_engine_unknown() {
        let registry =
            EngineRegistry::discover(vec![engine_writing("alpha", &[TargetFormat::Webp])]);

        let chosen = registry
            .choose(TargetFormat::Webp, &EnginePreference::from_name("gd"))
            .unwrap();
        assert_eq!(chosen.name(), "alpha");
    }

    #[test]
    fn choose_none_when_no_engine_writes_format() {
        let registry = EngineRegistry::discover(vec![
            engine_writing("alpha", &[TargetFormat::Webp]),
            engine_unavailable("beta"),
        ]);

        assert!(registry
            .choose(TargetFormat::Avif, &EnginePreference::Auto)
            .is_none());
    }

    #[test]
    fn validate_reports_missing_format_support() {
        // WebP-only lineup asked about AVIF: the spec's degraded state
        let registry =
            EngineRegistry::discover(vec![engine_writing("alpha", &[TargetFormat::Webp])]);

        let result = registry.validate(&EnginePreference::Auto, TargetFormat::Avif);
        assert!(!result.valid);
        assert!(result.message.contains("avif"));

        let ok = registry.validate(&EnginePreference::Auto, TargetFormat::Webp);
        assert!(ok.valid);
        assert!(ok.message.contains("alpha"));
    }

    #[test]
    fn validate_names_the_fallback_engine() {
        let registry = EngineRegistry::discover(vec![
            engine_unavailable("alpha"),
            engine_writing("beta", &[TargetFormat::Webp]),
        ]);

        let result =
            registry.validate(&EnginePreference::from_name("alpha"), TargetFormat::Webp);
        assert!(result.valid);
        assert!(result.message.contains("unavailable"));
        assert!(result.message.contains("beta"));
    }

    #[test]
    fn validate_fails_when_named_engine_has_no_fallback() {
        let registry =
            EngineRegistry::discover(vec![engine_writing("alpha", &[TargetFormat::Webp])]);

        let result =
            registry.validate(&EnginePreference::from_name("alpha"), TargetFormat::Avif);
        assert!(!result.valid);
    }

    #[test]
    fn geometry_engine_only_needs_availability() {
        // alpha writes nothing but can still scale and crop
        let registry = EngineRegistry::discover(vec![
            engine_writing("alpha", &[]),
            engine_writing("beta", &[TargetFormat::Webp]),
        ]);

        let chosen = registry
            .geometry_engine(&EnginePreference::Auto)
            .unwrap();
        assert_eq!(chosen.name(), "alpha");
    }

    #[test]
    fn geometry_engine_none_when_all_unavailable() {
        let registry = EngineRegistry::discover(vec![
            engine_unavailable("alpha"),
            engine_unavailable("beta"),
        ]);
        assert!(registry.geometry_engine(&EnginePreference::Auto).is_none());
    }

    #[test]
    fn discover_probes_once_and_caches() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        struct CountingEngine {
            probes: Arc<AtomicUsize>,
            info: EngineInfo,
        }

        impl Engine for CountingEngine {
            fn name(&self) -> &str {
                &self.info.name
            }
            fn probe(&self) -> EngineInfo {
                self.probes.fetch_add(1, Ordering::SeqCst);
                self.info.clone()
            }
            fn identify(
                &self,
                _path: &std::path::Path,
            ) -> Result<Dimensions, super::super::backend::EngineError> {
                unimplemented!()
            }
            fn transcode(
                &self,
                _source: &std::path::Path,
                _dest: &std::path::Path,
                _format: TargetFormat,
                _quality: super::super::params::Quality,
            ) -> Result<u64, super::super::backend::EngineError> {
                unimplemented!()
            }
            fn render(
                &self,
                _source: &std::path::Path,
                _dest: &std::path::Path,
                _plan: &crate::geometry::ResizePlan,
                _quality: super::super::params::Quality,
            ) -> Result<Dimensions, super::super::backend::EngineError> {
                unimplemented!()
            }
        }

        let probes = Arc::new(AtomicUsize::new(0));
        let mut info = EngineInfo::unavailable("counted");
        info.available = true;
        info.writes = [TargetFormat::Webp].into_iter().collect();

        let registry = EngineRegistry::discover(vec![Box::new(CountingEngine {
            probes: Arc::clone(&probes),
            info,
        })]);
        assert_eq!(probes.load(Ordering::SeqCst), 1);

        // Every selection path runs against the cached probe
        let _ = registry.choose(TargetFormat::Webp, &EnginePreference::Auto);
        let _ = registry.geometry_engine(&EnginePreference::Auto);
        let _ = registry.supports_write(TargetFormat::Webp);
        let _ = registry.supported_input_mimes();
        assert_eq!(probes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn supported_input_mimes_unions_available_engines() {
        let mut gif_info = EngineInfo::unavailable("gifread");
        gif_info.available = true;
        gif_info.reads = ["image/gif".to_string()].into_iter().collect();

        let registry = EngineRegistry::discover(vec![
            engine_writing("alpha", &[TargetFormat::Webp]),
            Box::new(MockEngine::with_info(gif_info)),
        ]);

        let mimes = registry.supported_input_mimes();
        assert!(mimes.contains("image/jpeg"));
        assert!(mimes.contains("image/gif"));
    }

    #[test]
    fn supports_write_ignores_unavailable_engines() {
        let mut ghost = EngineInfo::unavailable("ghost");
        ghost.writes = [TargetFormat::Avif].into_iter().collect();

        let registry = EngineRegistry::discover(vec![
            Box::new(MockEngine::with_info(ghost)),
            engine_writing("alpha", &[TargetFormat::Webp]),
        ]);

        assert!(registry.supports_write(TargetFormat::Webp));
        assert!(!registry.supports_write(TargetFormat::Avif));
    }

    #[test]
    fn chosen_engine_is_usable_for_work() {
        let mock = MockEngine::with_dimensions(
            "alpha",
            vec![Dimensions {
                width: 640,
                height: 480,
            }],
        );

        let registry = EngineRegistry::discover(vec![Box::new(mock)]);
        let engine = registry
            .choose(TargetFormat::Webp, &EnginePreference::Auto)
            .unwrap();

        let dims = engine
            .identify(std::path::Path::new("/photos/a.jpg"))
            .unwrap();
        assert_eq!((dims.width, dims.height), (640, 480));
    }
}
