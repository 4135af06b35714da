//! Purpose: Preset resolution policy shared by the session, the CLI, and the
//! HTTP service.
//! Exports: `PresetRequest`, `Selection`, and `resolve`.
//! Invariants: Lookup is exact first, then a bidirectional substring scan in
//! store enumeration order; the first fallback match wins.
//! Invariants: A post-selection identity mismatch is surfaced as not-found
//! and leaves the recorded selection for that category untouched.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::backend::{PresetCategory, PresetStore};
use crate::core::config::ConfigMap;
use crate::core::error::{Error, ErrorKind};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PresetRequest {
    pub printer: Option<String>,
    pub filament: Option<String>,
    pub process: Option<String>,
}

impl PresetRequest {
    fn requested(&self, category: PresetCategory) -> Option<&str> {
        let name = match category {
            PresetCategory::Printer => self.printer.as_deref(),
            PresetCategory::Filament => self.filament.as_deref(),
            PresetCategory::Process => self.process.as_deref(),
        };
        // An empty name means "not supplied", matching the C boundary where
        // both NULL and "" skip the category.
        name.filter(|name| !name.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        PresetCategory::ALL
            .iter()
            .all(|category| self.requested(*category).is_none())
    }
}

/// The resolved preset names recorded per category.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Selection {
    pub printer: Option<String>,
    pub filament: Option<String>,
    pub process: Option<String>,
}

impl Selection {
    fn slot(&mut self, category: PresetCategory) -> &mut Option<String> {
        match category {
            PresetCategory::Printer => &mut self.printer,
            PresetCategory::Filament => &mut self.filament,
            PresetCategory::Process => &mut self.process,
        }
    }
}

/// Resolve each requested category against the store, recording matched
/// names in `selection` as they succeed. The printer preset's own config is
/// merged into `config` immediately so bed geometry is queryable between
/// preset calls; once all categories resolve, `config` is replaced wholesale
/// with the store's composed configuration.
pub fn resolve(
    store: &mut dyn PresetStore,
    request: &PresetRequest,
    selection: &mut Selection,
    config: &mut ConfigMap,
) -> Result<(), Error> {
    for category in PresetCategory::ALL {
        let Some(wanted) = request.requested(category) else {
            continue;
        };
        let matched = resolve_category(store, category, wanted)?;

        store.select(category, &matched)?;
        let selected = store.selected(category)?;
        if selected.as_deref() != Some(matched.as_str()) {
            return Err(Error::new(ErrorKind::PresetNotFound)
                .with_message(format!(
                    "{} preset selection did not take effect",
                    category.as_str()
                ))
                .with_preset(wanted));
        }

        debug!(
            category = category.as_str(),
            requested = wanted,
            matched = matched.as_str(),
            "preset resolved"
        );
        *selection.slot(category) = Some(matched.clone());

        // Printer settings establish bed geometry needed for centering even
        // before filament/process are resolved; the composed replacement
        // below supersedes this merge.
        if category == PresetCategory::Printer {
            let printer_config = store.preset_config(category, &matched)?;
            config.merge(&printer_config);
        }
    }

    *config = store.composed_config()?;
    Ok(())
}

fn resolve_category(
    store: &mut dyn PresetStore,
    category: PresetCategory,
    wanted: &str,
) -> Result<String, Error> {
    if store.find_exact(category, wanted)? {
        return Ok(wanted.to_string());
    }
    let names = store.names(category)?;
    match fallback_match(&names, wanted) {
        Some(matched) => Ok(matched),
        None => Err(Error::new(ErrorKind::PresetNotFound)
            .with_message(format!("{} preset not found", category.as_str()))
            .with_preset(wanted)),
    }
}

/// Loose bidirectional substring match; first hit in enumeration order wins.
fn fallback_match(names: &[String], wanted: &str) -> Option<String> {
    names
        .iter()
        .find(|name| name.contains(wanted) || wanted.contains(name.as_str()))
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::{PresetRequest, Selection, fallback_match, resolve};
    use crate::core::backend::{PresetCategory, PresetStore};
    use crate::core::config::{ConfigMap, ConfigValue};
    use crate::core::error::{Error, ErrorKind};
    use std::collections::BTreeMap;

    struct ScriptedStore {
        names: BTreeMap<&'static str, Vec<String>>,
        selected: BTreeMap<&'static str, String>,
        /// Selecting this name records a different name, simulating a
        /// store-internal aliasing bug.
        alias: Option<(String, String)>,
    }

    impl ScriptedStore {
        fn new(printers: &[&str], filaments: &[&str], processes: &[&str]) -> Self {
            let mut names = BTreeMap::new();
            names.insert("printer", to_owned(printers));
            names.insert("filament", to_owned(filaments));
            names.insert("process", to_owned(processes));
            Self {
                names,
                selected: BTreeMap::new(),
                alias: None,
            }
        }
    }

    fn to_owned(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    impl PresetStore for ScriptedStore {
        fn initialize(&mut self) -> Result<(), Error> {
            Ok(())
        }

        fn names(&self, category: PresetCategory) -> Result<Vec<String>, Error> {
            Ok(self.names[category.as_str()].clone())
        }

        fn find_exact(&self, category: PresetCategory, name: &str) -> Result<bool, Error> {
            Ok(self.names[category.as_str()].iter().any(|n| n == name))
        }

        fn select(&mut self, category: PresetCategory, name: &str) -> Result<(), Error> {
            let recorded = match &self.alias {
                Some((from, to)) if from == name => to.clone(),
                _ => name.to_string(),
            };
            self.selected.insert(category.as_str(), recorded);
            Ok(())
        }

        fn selected(&self, category: PresetCategory) -> Result<Option<String>, Error> {
            Ok(self.selected.get(category.as_str()).cloned())
        }

        fn preset_config(
            &self,
            _category: PresetCategory,
            name: &str,
        ) -> Result<ConfigMap, Error> {
            let mut config = ConfigMap::new();
            config.set("source_preset", ConfigValue::single(name));
            config.set(
                "printable_area",
                ConfigValue::single("0x0,200x0,200x200,0x200"),
            );
            Ok(config)
        }

        fn composed_config(&self) -> Result<ConfigMap, Error> {
            let mut config = ConfigMap::new();
            config.set("composed", ConfigValue::single("true"));
            for (category, name) in &self.selected {
                config.set(format!("selected_{category}"), ConfigValue::single(name));
            }
            Ok(config)
        }
    }

    #[test]
    fn exact_name_resolves_verbatim() {
        let mut store = ScriptedStore::new(&["Voron 2.4 350", "Voron 0.2"], &[], &[]);
        let mut selection = Selection::default();
        let mut config = ConfigMap::new();
        let request = PresetRequest {
            printer: Some("Voron 0.2".to_string()),
            ..Default::default()
        };

        resolve(&mut store, &request, &mut selection, &mut config).expect("resolve");
        assert_eq!(selection.printer.as_deref(), Some("Voron 0.2"));
    }

    #[test]
    fn substring_fallback_takes_first_match_in_store_order() {
        let mut store = ScriptedStore::new(
            &["Prusa MK4 Input Shaper", "Prusa MK4S", "Prusa XL"],
            &[],
            &[],
        );
        let mut selection = Selection::default();
        let mut config = ConfigMap::new();
        let request = PresetRequest {
            printer: Some("MK4".to_string()),
            ..Default::default()
        };

        resolve(&mut store, &request, &mut selection, &mut config).expect("resolve");
        assert_eq!(
            selection.printer.as_deref(),
            Some("Prusa MK4 Input Shaper")
        );
    }

    #[test]
    fn fallback_matches_in_both_directions() {
        let names = to_owned(&["PLA Basic"]);
        // Stored name is a substring of the request.
        assert_eq!(
            fallback_match(&names, "PLA Basic @BBL X1C").as_deref(),
            Some("PLA Basic")
        );
        // Request is a substring of the stored name.
        assert_eq!(fallback_match(&names, "Basic").as_deref(), Some("PLA Basic"));
        assert_eq!(fallback_match(&names, "PETG"), None);
    }

    #[test]
    fn missing_preset_names_category_and_request() {
        let mut store = ScriptedStore::new(&["Voron"], &["PLA"], &[]);
        let mut selection = Selection::default();
        let mut config = ConfigMap::new();
        let request = PresetRequest {
            filament: Some("ASA".to_string()),
            ..Default::default()
        };

        let err = resolve(&mut store, &request, &mut selection, &mut config)
            .expect_err("must fail");
        assert_eq!(err.kind(), ErrorKind::PresetNotFound);
        assert_eq!(err.preset(), Some("ASA"));
        assert!(err.to_string().contains("filament"));
        assert!(selection.filament.is_none());
    }

    #[test]
    fn selection_mismatch_is_reported_as_not_found() {
        let mut store = ScriptedStore::new(&["Voron 2.4"], &[], &[]);
        store.alias = Some(("Voron 2.4".to_string(), "Voron 2.4 (stale)".to_string()));
        let mut selection = Selection::default();
        let mut config = ConfigMap::new();
        let request = PresetRequest {
            printer: Some("Voron 2.4".to_string()),
            ..Default::default()
        };

        let err = resolve(&mut store, &request, &mut selection, &mut config)
            .expect_err("must fail");
        assert_eq!(err.kind(), ErrorKind::PresetNotFound);
        assert!(selection.printer.is_none());
    }

    #[test]
    fn composed_config_supersedes_printer_merge() {
        let mut store = ScriptedStore::new(&["Voron 2.4"], &["PLA"], &["0.20mm"]);
        let mut selection = Selection::default();
        let mut config = ConfigMap::new();
        let request = PresetRequest {
            printer: Some("Voron 2.4".to_string()),
            filament: Some("PLA".to_string()),
            process: Some("0.20mm".to_string()),
        };

        resolve(&mut store, &request, &mut selection, &mut config).expect("resolve");
        // The interim printer merge is replaced by the composed result.
        assert!(!config.has("source_preset"));
        assert!(config.has("composed"));
        assert_eq!(selection.filament.as_deref(), Some("PLA"));
        assert_eq!(selection.process.as_deref(), Some("0.20mm"));
    }

    #[test]
    fn empty_request_still_composes() {
        let mut store = ScriptedStore::new(&[], &[], &[]);
        let mut selection = Selection::default();
        let mut config = ConfigMap::new();
        let request = PresetRequest::default();
        assert!(request.is_empty());

        resolve(&mut store, &request, &mut selection, &mut config).expect("resolve");
        assert!(config.has("composed"));
    }
}
