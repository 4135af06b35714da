//! Purpose: Define the stable public Rust API boundary for slicekit.
//! Exports: Session, collaborator traits, exchange types, and errors.
//! Role: Public, additive-only surface; hides internal core modules.
//! Invariants: This module is the only public path to the session core.

pub use crate::core::backend::{
    Backend, EngineFactory, Exported, ExportReport, ExtruderVolumes, ModeTiming, ModelFormat,
    ModelLoader, PresetCategory, PresetStore, SliceEngine, Summary,
};
pub use crate::core::config::{ConfigMap, ConfigValue};
#[doc(hidden)]
pub use crate::core::error::to_status_code;
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::model::{BoundingBox, Instance, Model, ModelObject};
pub use crate::core::preset::{PresetRequest, Selection, resolve as resolve_presets};
pub use crate::core::session::Session;
pub use crate::core::stats::format_duration;
pub use crate::preset_dir::DirStore;
