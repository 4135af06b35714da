//! Purpose: The per-handle session state machine over the collaborator seams.
//! Exports: `Session`.
//! Role: Enforces the Empty → ModelLoaded → ConfigLoaded → Processed
//! lifecycle and owns every cached derived document.
//! Invariants: Every mutating operation clears the prior error before acting.
//! Invariants: Any upstream mutation invalidates all downstream cached state.
//! Invariants: A failed operation never leaves a later stage marked done.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::core::backend::{Backend, EngineFactory, ModelFormat, ModelLoader, PresetStore, SliceEngine};
use crate::core::config::{ConfigMap, ConfigValue};
use crate::core::error::{Error, ErrorKind};
use crate::core::model::Model;
use crate::core::preset::{self, PresetRequest, Selection};
use crate::core::stats;

pub struct Session {
    loader: Box<dyn ModelLoader>,
    store: Box<dyn PresetStore>,
    engines: Box<dyn EngineFactory>,
    model: Option<Model>,
    engine: Option<Box<dyn SliceEngine>>,
    config: ConfigMap,
    config_loaded: bool,
    processed: bool,
    presets_initialized: bool,
    selection: Selection,
    last_error: Option<String>,
    stats_cache: Option<String>,
    config_cache: Option<String>,
    preset_info_cache: Option<String>,
}

impl Session {
    pub fn new(backend: Backend) -> Self {
        Self {
            loader: backend.loader,
            store: backend.store,
            engines: backend.engines,
            model: None,
            engine: None,
            config: ConfigMap::new(),
            config_loaded: false,
            processed: false,
            presets_initialized: false,
            selection: Selection::default(),
            last_error: None,
            stats_cache: None,
            config_cache: None,
            preset_info_cache: None,
        }
    }

    pub fn model_loaded(&self) -> bool {
        self.model.is_some()
    }

    pub fn config_loaded(&self) -> bool {
        self.config_loaded
    }

    pub fn processed(&self) -> bool {
        self.processed
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn config(&self) -> &ConfigMap {
        &self.config
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn clear_error(&mut self) {
        self.last_error = None;
    }

    /// Load a model file, replacing any previously loaded model. On failure
    /// the previous model remains observable.
    pub fn load_model(&mut self, path: &Path) -> Result<(), Error> {
        self.last_error = None;
        let format = match ModelFormat::from_path(path) {
            Some(format) => format,
            None => {
                return Err(self.fail(
                    Error::new(ErrorKind::ModelLoad)
                        .with_message("unsupported model format")
                        .with_path(path),
                ));
            }
        };
        let model = match self.loader.load(path, format) {
            Ok(model) => model,
            Err(err) => return Err(self.fail(err)),
        };
        if model.is_empty() {
            return Err(self.fail(
                Error::new(ErrorKind::ModelLoad)
                    .with_message("model contains no objects")
                    .with_path(path),
            ));
        }

        info!(
            path = %path.display(),
            format = format.as_str(),
            objects = model.object_count(),
            "model loaded"
        );
        self.model = Some(model);
        self.processed = false;
        self.stats_cache = None;
        Ok(())
    }

    /// Resolve any of the three preset categories and replace the resolved
    /// configuration with the store's composed result.
    pub fn resolve_presets(&mut self, request: &PresetRequest) -> Result<(), Error> {
        self.last_error = None;
        // Selection names and merged values may change even when resolution
        // fails partway, so the cached renderings go stale either way.
        self.config_cache = None;
        self.preset_info_cache = None;

        if !self.presets_initialized {
            if let Err(err) = self.store.initialize() {
                return Err(self.fail(err));
            }
            self.presets_initialized = true;
            debug!("preset store initialized");
        }

        let result = preset::resolve(
            self.store.as_mut(),
            request,
            &mut self.selection,
            &mut self.config,
        );
        if let Err(err) = result {
            return Err(self.fail(err));
        }

        self.config_loaded = true;
        self.processed = false;
        self.stats_cache = None;
        Ok(())
    }

    /// Set one configuration option, overwriting any preset-derived value.
    pub fn set_config_option(&mut self, key: &str, value: &str) -> Result<(), Error> {
        self.last_error = None;
        if key.trim().is_empty() {
            return Err(self.fail(
                Error::new(ErrorKind::ConfigParse).with_message("configuration key is empty"),
            ));
        }
        self.config.set(key, ConfigValue::single(value));
        self.config_loaded = true;
        self.processed = false;
        self.config_cache = None;
        self.stats_cache = None;
        Ok(())
    }

    /// Run the engine's apply/process/validate pipeline on a fresh engine
    /// instance.
    pub fn process(&mut self) -> Result<(), Error> {
        self.last_error = None;
        if self.model.is_none() {
            return Err(self.fail(Error::new(ErrorKind::NoModel).with_message("no model loaded")));
        }
        if !self.config_loaded {
            return Err(self.fail(
                Error::new(ErrorKind::NoConfig).with_message("no configuration loaded"),
            ));
        }

        // A new run invalidates the previous one up front; a failure below
        // must not leave a stale processed state behind.
        self.processed = false;
        self.stats_cache = None;
        self.engine = None;

        match self.process_inner() {
            Ok(()) => {
                self.processed = true;
                Ok(())
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    fn process_inner(&mut self) -> Result<(), Error> {
        let mut engine = self.engines.create()?;

        let Some(model) = self.model.as_mut() else {
            return Err(Error::new(ErrorKind::Internal).with_message("model slot empty"));
        };
        model.ensure_default_instances();
        match self.config.bed_center() {
            Some(center) => {
                model.center_instances_around(center);
                debug!(x = center[0], y = center[1], "instances centered on bed");
            }
            None => debug!("no printable_area configured; centering skipped"),
        }

        engine.apply(model, &self.config)?;
        engine.process()?;
        if let Some(message) = engine.validate()? {
            if !message.is_empty() {
                return Err(Error::new(ErrorKind::ProcessFailed).with_message(message));
            }
        }

        self.engine = Some(engine);
        Ok(())
    }

    /// Export machine instructions and rebuild the statistics cache from the
    /// export report.
    pub fn export(&mut self, output: &Path) -> Result<PathBuf, Error> {
        self.last_error = None;
        if !self.processed {
            return Err(self.fail(
                Error::new(ErrorKind::ProcessFailed).with_message("model not processed"),
            ));
        }
        let Some(engine) = self.engine.as_mut() else {
            return Err(self.fail(
                Error::new(ErrorKind::Internal).with_message("processed without engine"),
            ));
        };
        let exported = match engine.export(output) {
            Ok(exported) => exported,
            Err(err) => return Err(self.fail(err)),
        };
        if exported.path.as_os_str().is_empty() {
            return Err(self.fail(
                Error::new(ErrorKind::ExportFailed)
                    .with_message("export produced no output path"),
            ));
        }

        let document = stats::full_document(&exported.report, &self.config);
        self.stats_cache = Some(render(&document).map_err(|err| self.fail(err))?);
        info!(path = %exported.path.display(), "export complete");
        Ok(exported.path)
    }

    /// The cached statistics document: the full one once an export has run,
    /// otherwise the reduced document read from the engine summary.
    pub fn statistics(&mut self) -> Result<&str, Error> {
        if !self.processed {
            let err = Error::new(ErrorKind::ProcessFailed).with_message("model not processed");
            return Err(self.fail(err));
        }
        if self.stats_cache.is_none() {
            let Some(engine) = self.engine.as_ref() else {
                let err = Error::new(ErrorKind::Internal).with_message("processed without engine");
                return Err(self.fail(err));
            };
            let summary = match engine.summary() {
                Ok(summary) => summary,
                Err(err) => return Err(self.fail(err)),
            };
            let document = stats::basic_document(&summary);
            self.stats_cache = Some(render(&document).map_err(|err| self.fail(err))?);
        }
        Ok(self.stats_cache.as_deref().unwrap_or_default())
    }

    /// Lazily rendered dump of the resolved configuration.
    pub fn resolved_config(&mut self) -> Result<&str, Error> {
        if !self.config_loaded {
            let err = Error::new(ErrorKind::NoConfig).with_message("no configuration loaded");
            return Err(self.fail(err));
        }
        if self.config_cache.is_none() {
            let document = self.config.to_json_value();
            self.config_cache = Some(render(&document).map_err(|err| self.fail(err))?);
        }
        Ok(self.config_cache.as_deref().unwrap_or_default())
    }

    /// Currently resolved preset names; all-absent is a valid state.
    pub fn preset_info(&mut self) -> Result<&str, Error> {
        if self.preset_info_cache.is_none() {
            let document = serde_json::json!({
                "printer": self.selection.printer,
                "filament": self.selection.filament,
                "process": self.selection.process,
            });
            self.preset_info_cache = Some(render(&document).map_err(|err| self.fail(err))?);
        }
        Ok(self.preset_info_cache.as_deref().unwrap_or_default())
    }

    fn fail(&mut self, err: Error) -> Error {
        self.last_error = Some(err.to_string());
        err
    }
}

fn render(document: &serde_json::Value) -> Result<String, Error> {
    serde_json::to_string_pretty(document).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("failed to render document")
            .with_source(err)
    })
}
