//! Purpose: Collaborator seams the session drives: model loading, preset
//! storage, and the slicing engine itself.
//! Exports: `ModelLoader`, `PresetStore`, `SliceEngine`, `EngineFactory`,
//! the engine exchange types, and the `Backend` bundle.
//! Invariants: Everything behind these traits is external to the core; the
//! session never assumes a particular engine or store implementation.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::config::ConfigMap;
use crate::core::error::Error;
use crate::core::model::Model;

/// Recognized model container formats, derived from the path extension.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ModelFormat {
    ThreeMf,
    Stl,
    Amf,
    Obj,
}

impl ModelFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "3mf" => Some(Self::ThreeMf),
            "stl" => Some(Self::Stl),
            "amf" => Some(Self::Amf),
            "obj" => Some(Self::Obj),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ThreeMf => "3mf",
            Self::Stl => "stl",
            Self::Amf => "amf",
            Self::Obj => "obj",
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresetCategory {
    Printer,
    Filament,
    Process,
}

impl PresetCategory {
    pub const ALL: [PresetCategory; 3] = [Self::Printer, Self::Filament, Self::Process];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Printer => "printer",
            Self::Filament => "filament",
            Self::Process => "process",
        }
    }
}

/// Post-process totals, read back verbatim for the basic statistics document.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Summary {
    pub estimated_print_time: String,
    pub total_used_filament_mm: f64,
    pub total_extruded_volume_mm3: f64,
    pub total_weight_g: f64,
    pub total_cost: f64,
    pub total_toolchanges: u32,
    /// Per-extruder filament length in mm, keyed by the engine's indices.
    pub filament_stats: BTreeMap<usize, f64>,
}

/// Per-extruder volumetric usage from the export run. Indices are the
/// engine's own and are not assumed contiguous from zero.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct ExtruderVolumes {
    pub index: usize,
    pub total_mm3: f64,
    pub model_mm3: f64,
    pub support_mm3: f64,
    pub wipe_tower_mm3: f64,
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct ModeTiming {
    pub time_seconds: f64,
    pub prepare_seconds: f64,
}

/// Raw engine output captured at export time; source of the full statistics
/// document.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ExportReport {
    pub extruders: Vec<ExtruderVolumes>,
    pub extruder_changes: u32,
    pub filament_changes: u32,
    pub nozzle_changes: u32,
    pub normal: ModeTiming,
    pub quiet: ModeTiming,
    pub timelapse_seconds: f64,
}

/// Result of the engine's export step. An empty `path` is itself treated as
/// an export failure by the session.
#[derive(Clone, Debug)]
pub struct Exported {
    pub path: PathBuf,
    pub report: ExportReport,
}

pub trait ModelLoader {
    fn load(&mut self, path: &Path, format: ModelFormat) -> Result<Model, Error>;
}

pub trait PresetStore {
    /// Set default search locations if none are configured and load all
    /// presets. Called lazily, exactly once per session.
    fn initialize(&mut self) -> Result<(), Error>;

    /// Preset names for a category, in the store's enumeration order.
    fn names(&self, category: PresetCategory) -> Result<Vec<String>, Error>;

    fn find_exact(&self, category: PresetCategory, name: &str) -> Result<bool, Error>;

    /// Select a preset, forcing it to take effect even if the store already
    /// considers it selected.
    fn select(&mut self, category: PresetCategory, name: &str) -> Result<(), Error>;

    fn selected(&self, category: PresetCategory) -> Result<Option<String>, Error>;

    /// A single preset's effective configuration (inheritance applied).
    fn preset_config(&self, category: PresetCategory, name: &str) -> Result<ConfigMap, Error>;

    /// The inheritance-aware composition across all current selections.
    fn composed_config(&self) -> Result<ConfigMap, Error>;
}

pub trait SliceEngine {
    fn apply(&mut self, model: &Model, config: &ConfigMap) -> Result<(), Error>;

    fn process(&mut self) -> Result<(), Error>;

    /// A non-empty message means validation failed.
    fn validate(&mut self) -> Result<Option<String>, Error>;

    fn export(&mut self, output: &Path) -> Result<Exported, Error>;

    /// Post-process summary, available once `process` has run.
    fn summary(&self) -> Result<Summary, Error>;
}

/// A fresh engine instance is created for every processing run; no engine
/// state carries across repeated `process()` calls.
pub trait EngineFactory {
    fn create(&self) -> Result<Box<dyn SliceEngine>, Error>;
}

/// The collaborators one session exclusively owns.
pub struct Backend {
    pub loader: Box<dyn ModelLoader>,
    pub store: Box<dyn PresetStore>,
    pub engines: Box<dyn EngineFactory>,
}

#[cfg(test)]
mod tests {
    use super::ModelFormat;
    use std::path::Path;

    #[test]
    fn format_detection_is_case_insensitive() {
        let cases = [
            ("part.3MF", Some(ModelFormat::ThreeMf)),
            ("part.stl", Some(ModelFormat::Stl)),
            ("part.Amf", Some(ModelFormat::Amf)),
            ("part.OBJ", Some(ModelFormat::Obj)),
            ("part.step", None),
            ("part", None),
        ];
        for (name, expected) in cases {
            assert_eq!(ModelFormat::from_path(Path::new(name)), expected, "{name}");
        }
    }
}
