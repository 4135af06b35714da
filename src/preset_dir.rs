//! Purpose: Directory-backed preset store for CLI, serving, and embedders.
//! Exports: `DirStore`.
//! Role: Reference implementation of the preset-store collaborator; scans
//! `printer/`, `filament/`, and `process/` subdirectories of JSON files.
//! Invariants: Enumeration order is sorted file name per root, roots in
//! configured order; duplicate preset names keep the first occurrence.
//! Invariants: Default search locations are `$SLICEKIT_PRESET_DIR`, else
//! `~/.slicekit/presets`, chosen lazily at initialize time.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::core::backend::{PresetCategory, PresetStore};
use crate::core::config::{ConfigMap, ConfigValue};
use crate::core::error::{Error, ErrorKind};

#[derive(Debug, Deserialize)]
struct PresetFile {
    name: String,
    #[serde(default)]
    inherits: Option<String>,
    #[serde(default)]
    values: serde_json::Map<String, Value>,
}

#[derive(Clone, Debug)]
struct Preset {
    name: String,
    inherits: Option<String>,
    values: ConfigMap,
}

pub struct DirStore {
    roots: Vec<PathBuf>,
    initialized: bool,
    presets: [Vec<Preset>; 3],
    selected: [Option<String>; 3],
}

impl DirStore {
    pub fn new() -> Self {
        Self::with_roots(Vec::new())
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self::with_roots(vec![root.into()])
    }

    pub fn with_roots(roots: Vec<PathBuf>) -> Self {
        Self {
            roots,
            initialized: false,
            presets: [Vec::new(), Vec::new(), Vec::new()],
            selected: [None, None, None],
        }
    }

    pub fn default_search_dirs() -> Vec<PathBuf> {
        if let Some(dir) = std::env::var_os("SLICEKIT_PRESET_DIR") {
            return vec![PathBuf::from(dir)];
        }
        let home = std::env::var_os("HOME").unwrap_or_default();
        vec![PathBuf::from(home).join(".slicekit").join("presets")]
    }

    fn slot(category: PresetCategory) -> usize {
        match category {
            PresetCategory::Printer => 0,
            PresetCategory::Filament => 1,
            PresetCategory::Process => 2,
        }
    }

    fn pool(&self, category: PresetCategory) -> &[Preset] {
        &self.presets[Self::slot(category)]
    }

    fn find(&self, category: PresetCategory, name: &str) -> Option<&Preset> {
        self.pool(category).iter().find(|preset| preset.name == name)
    }

    fn load_root(&mut self, root: &Path) -> Result<(), Error> {
        for category in PresetCategory::ALL {
            let dir = root.join(category.as_str());
            if !dir.is_dir() {
                debug!(dir = %dir.display(), "preset directory missing; skipped");
                continue;
            }
            let mut paths: Vec<PathBuf> = std::fs::read_dir(&dir)
                .map_err(|err| Error::new(ErrorKind::Io).with_path(&dir).with_source(err))?
                .collect::<Result<Vec<_>, _>>()
                .map_err(|err| Error::new(ErrorKind::Io).with_path(&dir).with_source(err))?
                .into_iter()
                .map(|entry| entry.path())
                .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
                .collect();
            paths.sort();

            for path in paths {
                let preset = read_preset(&path)?;
                let pool = &mut self.presets[Self::slot(category)];
                if pool.iter().any(|existing| existing.name == preset.name) {
                    debug!(
                        name = preset.name.as_str(),
                        path = %path.display(),
                        "duplicate preset name; first occurrence kept"
                    );
                    continue;
                }
                pool.push(preset);
            }
        }
        Ok(())
    }

    /// Effective configuration with the inheritance chain applied
    /// root-first.
    fn effective_config(
        &self,
        category: PresetCategory,
        name: &str,
        seen: &mut HashSet<String>,
    ) -> Result<ConfigMap, Error> {
        if !seen.insert(name.to_string()) {
            return Err(Error::new(ErrorKind::ConfigParse)
                .with_message(format!(
                    "{} preset inheritance cycle",
                    category.as_str()
                ))
                .with_preset(name));
        }
        let preset = self.find(category, name).ok_or_else(|| {
            Error::new(ErrorKind::PresetNotFound)
                .with_message(format!("{} preset not found", category.as_str()))
                .with_preset(name)
        })?;

        let mut config = match &preset.inherits {
            Some(parent) => {
                self.effective_config(category, parent, seen)
                    .map_err(|err| match err.kind() {
                        ErrorKind::PresetNotFound => Error::new(ErrorKind::ConfigParse)
                            .with_message(format!(
                                "{} preset inherits unknown parent {parent}",
                                category.as_str()
                            ))
                            .with_preset(name),
                        _ => err,
                    })?
            }
            None => ConfigMap::new(),
        };
        config.merge(&preset.values);
        Ok(config)
    }
}

impl Default for DirStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PresetStore for DirStore {
    fn initialize(&mut self) -> Result<(), Error> {
        if self.initialized {
            return Ok(());
        }
        if self.roots.is_empty() {
            self.roots = Self::default_search_dirs();
        }
        let roots = self.roots.clone();
        for root in &roots {
            self.load_root(root)?;
        }
        self.initialized = true;
        debug!(
            printers = self.presets[0].len(),
            filaments = self.presets[1].len(),
            processes = self.presets[2].len(),
            "preset store loaded"
        );
        Ok(())
    }

    fn names(&self, category: PresetCategory) -> Result<Vec<String>, Error> {
        Ok(self
            .pool(category)
            .iter()
            .map(|preset| preset.name.clone())
            .collect())
    }

    fn find_exact(&self, category: PresetCategory, name: &str) -> Result<bool, Error> {
        Ok(self.find(category, name).is_some())
    }

    fn select(&mut self, category: PresetCategory, name: &str) -> Result<(), Error> {
        if self.find(category, name).is_none() {
            return Err(Error::new(ErrorKind::PresetNotFound)
                .with_message(format!("{} preset not found", category.as_str()))
                .with_preset(name));
        }
        self.selected[Self::slot(category)] = Some(name.to_string());
        Ok(())
    }

    fn selected(&self, category: PresetCategory) -> Result<Option<String>, Error> {
        Ok(self.selected[Self::slot(category)].clone())
    }

    fn preset_config(&self, category: PresetCategory, name: &str) -> Result<ConfigMap, Error> {
        self.effective_config(category, name, &mut HashSet::new())
    }

    /// Printer first, then process, then filament; later categories
    /// overwrite overlapping keys.
    fn composed_config(&self) -> Result<ConfigMap, Error> {
        let order = [
            PresetCategory::Printer,
            PresetCategory::Process,
            PresetCategory::Filament,
        ];
        let mut config = ConfigMap::new();
        for category in order {
            if let Some(name) = &self.selected[Self::slot(category)] {
                let effective = self.effective_config(category, name, &mut HashSet::new())?;
                config.merge(&effective);
            }
        }
        Ok(config)
    }
}

fn read_preset(path: &Path) -> Result<Preset, Error> {
    let text = std::fs::read_to_string(path)
        .map_err(|err| Error::new(ErrorKind::Io).with_path(path).with_source(err))?;
    let file: PresetFile = serde_json::from_str(&text).map_err(|err| {
        Error::new(ErrorKind::ConfigParse)
            .with_message("invalid preset file")
            .with_path(path)
            .with_source(err)
    })?;
    if file.name.trim().is_empty() {
        return Err(Error::new(ErrorKind::ConfigParse)
            .with_message("preset name is empty")
            .with_path(path));
    }

    let mut values = ConfigMap::new();
    for (key, value) in &file.values {
        values.set(key.clone(), config_value(value, path)?);
    }
    Ok(Preset {
        name: file.name,
        inherits: file.inherits,
        values,
    })
}

fn config_value(value: &Value, path: &Path) -> Result<ConfigValue, Error> {
    match value {
        Value::String(text) => Ok(ConfigValue::single(text.clone())),
        Value::Number(number) => Ok(ConfigValue::single(number.to_string())),
        Value::Bool(flag) => Ok(ConfigValue::single(if *flag { "1" } else { "0" })),
        Value::Array(items) => {
            let mut list = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::String(text) => list.push(text.clone()),
                    Value::Number(number) => list.push(number.to_string()),
                    Value::Bool(flag) => list.push(if *flag { "1" } else { "0" }.to_string()),
                    _ => {
                        return Err(Error::new(ErrorKind::ConfigParse)
                            .with_message("unsupported value in preset list")
                            .with_path(path));
                    }
                }
            }
            Ok(ConfigValue::List(list))
        }
        _ => Err(Error::new(ErrorKind::ConfigParse)
            .with_message("unsupported preset value type")
            .with_path(path)),
    }
}
