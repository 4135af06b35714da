//! Purpose: Derived statistics documents built from raw engine output.
//! Exports: `basic_document`, `full_document`, and `format_duration`.
//! Invariants: The basic document mirrors the engine summary one-for-one;
//! the full document is derived from the export report only.
//! Invariants: Extruder-indexed maps use the engine's reported indices
//! verbatim; indices are not assumed contiguous from zero.
//! Invariants: Per-extruder diameter/density/cost fall back to defaults when
//! the configuration under-specifies an index.

use std::f64::consts::PI;

use serde_json::{Map, Value, json};

use crate::core::backend::{ExportReport, ModeTiming, Summary};
use crate::core::config::ConfigMap;

const DEFAULT_DIAMETER_MM: f64 = 1.75;
const DEFAULT_DENSITY_G_CM3: f64 = 1.24;
const DEFAULT_COST_PER_KG: f64 = 0.0;

/// Reduced-fidelity document, available right after processing. Fields are
/// read straight off the engine summary with no further derivation.
pub fn basic_document(summary: &Summary) -> Value {
    let mut filament_stats = Map::new();
    for (index, length_mm) in &summary.filament_stats {
        filament_stats.insert(index.to_string(), json!(length_mm));
    }
    json!({
        "estimated_print_time": summary.estimated_print_time,
        "total_used_filament": summary.total_used_filament_mm,
        "total_extruded_volume": summary.total_extruded_volume_mm3,
        "total_weight": summary.total_weight_g,
        "total_cost": summary.total_cost,
        "total_toolchanges": summary.total_toolchanges,
        "filament_stats": filament_stats,
    })
}

/// Full document, rebuilt from the raw export report whenever an export run
/// completes.
pub fn full_document(report: &ExportReport, config: &ConfigMap) -> Value {
    let mut modes = Map::new();
    modes.insert(
        "normal".to_string(),
        mode_json(&report.normal, report.timelapse_seconds),
    );
    if report.quiet.time_seconds > 0.0 {
        modes.insert(
            "quiet".to_string(),
            mode_json(&report.quiet, report.timelapse_seconds),
        );
    }

    let mut volume_total = Map::new();
    let mut volume_model = Map::new();
    let mut volume_support = Map::new();
    let mut volume_wipe_tower = Map::new();
    let mut length_total = Map::new();
    let mut length_model = Map::new();
    let mut length_support = Map::new();
    let mut length_wipe_tower = Map::new();
    let mut weight = Map::new();
    let mut cost = Map::new();
    let mut total_weight_g = 0.0;
    let mut total_cost = 0.0;

    for extruder in &report.extruders {
        let key = extruder.index.to_string();
        let diameter = config.float_at("filament_diameter", extruder.index, DEFAULT_DIAMETER_MM);
        let density = config.float_at("filament_density", extruder.index, DEFAULT_DENSITY_G_CM3);
        let cost_per_kg = config.float_at("filament_cost", extruder.index, DEFAULT_COST_PER_KG);

        volume_total.insert(key.clone(), json!(extruder.total_mm3));
        volume_model.insert(key.clone(), json!(extruder.model_mm3));
        volume_support.insert(key.clone(), json!(extruder.support_mm3));
        volume_wipe_tower.insert(key.clone(), json!(extruder.wipe_tower_mm3));

        length_total.insert(key.clone(), json!(length_mm(extruder.total_mm3, diameter)));
        length_model.insert(key.clone(), json!(length_mm(extruder.model_mm3, diameter)));
        length_support.insert(
            key.clone(),
            json!(length_mm(extruder.support_mm3, diameter)),
        );
        length_wipe_tower.insert(
            key.clone(),
            json!(length_mm(extruder.wipe_tower_mm3, diameter)),
        );

        let weight_g = weight_g(extruder.total_mm3, density);
        let extruder_cost = weight_g * cost_per_kg / 1000.0;
        weight.insert(key.clone(), json!(weight_g));
        cost.insert(key, json!(extruder_cost));
        total_weight_g += weight_g;
        total_cost += extruder_cost;
    }

    json!({
        "modes": modes,
        "timelapse_seconds": report.timelapse_seconds,
        "extruder_changes": report.extruder_changes,
        "filament_changes": report.filament_changes,
        "nozzle_changes": report.nozzle_changes,
        "volume_mm3": {
            "total": volume_total,
            "model": volume_model,
            "support": volume_support,
            "wipe_tower": volume_wipe_tower,
        },
        "length_mm": {
            "total": length_total,
            "model": length_model,
            "support": length_support,
            "wipe_tower": length_wipe_tower,
        },
        "weight_g": weight,
        "cost": cost,
        "total_weight_g": total_weight_g,
        "total_cost": total_cost,
    })
}

fn mode_json(timing: &ModeTiming, timelapse_seconds: f64) -> Value {
    let model_seconds =
        (timing.time_seconds - timing.prepare_seconds - timelapse_seconds).max(0.0);
    json!({
        "time_seconds": timing.time_seconds,
        "time": format_duration(timing.time_seconds),
        "prepare_seconds": timing.prepare_seconds,
        "model_time_seconds": model_seconds,
        "model_time": format_duration(model_seconds),
    })
}

fn length_mm(volume_mm3: f64, diameter_mm: f64) -> f64 {
    let radius = diameter_mm / 2.0;
    volume_mm3 / (PI * radius * radius)
}

fn weight_g(volume_mm3: f64, density_g_cm3: f64) -> f64 {
    volume_mm3 * density_g_cm3 / 1000.0
}

/// Days/hours/minutes/seconds rendering, e.g. `1d 2h 3m 4s`. Negative input
/// clamps to zero.
pub fn format_duration(seconds: f64) -> String {
    let mut total = seconds.max(0.0).round() as u64;
    let days = total / 86_400;
    total %= 86_400;
    let hours = total / 3_600;
    total %= 3_600;
    let minutes = total / 60;
    let secs = total % 60;

    let mut parts = Vec::new();
    if days > 0 {
        parts.push(format!("{days}d"));
    }
    if hours > 0 || !parts.is_empty() {
        parts.push(format!("{hours}h"));
    }
    if minutes > 0 || !parts.is_empty() {
        parts.push(format!("{minutes}m"));
    }
    parts.push(format!("{secs}s"));
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::{basic_document, format_duration, full_document};
    use crate::core::backend::{ExportReport, ExtruderVolumes, ModeTiming, Summary};
    use crate::core::config::{ConfigMap, ConfigValue};
    use std::f64::consts::PI;

    fn report_with(extruders: Vec<ExtruderVolumes>) -> ExportReport {
        ExportReport {
            extruders,
            extruder_changes: 2,
            filament_changes: 1,
            nozzle_changes: 0,
            normal: ModeTiming {
                time_seconds: 3_700.0,
                prepare_seconds: 120.0,
            },
            quiet: ModeTiming::default(),
            timelapse_seconds: 30.0,
        }
    }

    fn extruder(index: usize, total_mm3: f64) -> ExtruderVolumes {
        ExtruderVolumes {
            index,
            total_mm3,
            model_mm3: total_mm3 * 0.8,
            support_mm3: total_mm3 * 0.15,
            wipe_tower_mm3: total_mm3 * 0.05,
        }
    }

    #[test]
    fn basic_document_mirrors_summary() {
        let mut summary = Summary {
            estimated_print_time: "1h 2m 3s".to_string(),
            total_used_filament_mm: 5_200.0,
            total_extruded_volume_mm3: 12_500.0,
            total_weight_g: 15.5,
            total_cost: 0.39,
            total_toolchanges: 4,
            ..Default::default()
        };
        summary.filament_stats.insert(0, 5_200.0);

        let doc = basic_document(&summary);
        assert_eq!(doc["estimated_print_time"], "1h 2m 3s");
        assert_eq!(doc["total_used_filament"], 5_200.0);
        assert_eq!(doc["total_toolchanges"], 4);
        assert_eq!(doc["filament_stats"]["0"], 5_200.0);
    }

    #[test]
    fn length_and_weight_scale_linearly_with_volume() {
        let config = ConfigMap::new();
        let single = full_document(&report_with(vec![extruder(0, 1_000.0)]), &config);
        let doubled = full_document(&report_with(vec![extruder(0, 2_000.0)]), &config);

        let length = single["length_mm"]["total"]["0"].as_f64().unwrap();
        let length_doubled = doubled["length_mm"]["total"]["0"].as_f64().unwrap();
        assert_eq!(length_doubled, length * 2.0);

        let weight = single["weight_g"]["0"].as_f64().unwrap();
        let weight_doubled = doubled["weight_g"]["0"].as_f64().unwrap();
        assert_eq!(weight_doubled, weight * 2.0);
    }

    #[test]
    fn derivation_uses_configured_values_with_index_fallback() {
        let mut config = ConfigMap::new();
        config.set("filament_diameter", ConfigValue::list(["2.85"]));
        config.set("filament_density", ConfigValue::list(["1.10"]));
        config.set("filament_cost", ConfigValue::list(["25"]));

        let report = report_with(vec![extruder(0, 1_000.0), extruder(1, 1_000.0)]);
        let doc = full_document(&report, &config);

        // Extruder 0 uses the configured values.
        let radius = 2.85 / 2.0;
        let expected_length = 1_000.0 / (PI * radius * radius);
        assert!(
            (doc["length_mm"]["total"]["0"].as_f64().unwrap() - expected_length).abs() < 1e-9
        );
        let expected_weight = 1_000.0 * 1.10 / 1000.0;
        assert!((doc["weight_g"]["0"].as_f64().unwrap() - expected_weight).abs() < 1e-9);
        assert!(
            (doc["cost"]["0"].as_f64().unwrap() - expected_weight * 25.0 / 1000.0).abs() < 1e-9
        );

        // Extruder 1 is past the configured vectors: 1.75mm, 1.24, cost 0.
        let radius = 1.75 / 2.0;
        let expected_length = 1_000.0 / (PI * radius * radius);
        assert!(
            (doc["length_mm"]["total"]["1"].as_f64().unwrap() - expected_length).abs() < 1e-9
        );
        assert!((doc["weight_g"]["1"].as_f64().unwrap() - 1.24).abs() < 1e-9);
        assert_eq!(doc["cost"]["1"], 0.0);
    }

    #[test]
    fn zero_volume_extruder_has_zero_weight_and_cost() {
        let mut config = ConfigMap::new();
        config.set("filament_cost", ConfigValue::list(["25"]));
        let doc = full_document(&report_with(vec![extruder(0, 0.0)]), &config);
        assert_eq!(doc["weight_g"]["0"], 0.0);
        assert_eq!(doc["cost"]["0"], 0.0);
    }

    #[test]
    fn extruder_indices_are_kept_verbatim() {
        let config = ConfigMap::new();
        let doc = full_document(
            &report_with(vec![extruder(1, 500.0), extruder(3, 250.0)]),
            &config,
        );
        let totals = doc["volume_mm3"]["total"].as_object().unwrap();
        let keys: Vec<&String> = totals.keys().collect();
        assert_eq!(keys, vec!["1", "3"]);
    }

    #[test]
    fn quiet_mode_is_gated_on_positive_time() {
        let config = ConfigMap::new();
        let mut report = report_with(vec![extruder(0, 100.0)]);
        let doc = full_document(&report, &config);
        assert!(doc["modes"].get("quiet").is_none());

        report.quiet = ModeTiming {
            time_seconds: 4_100.0,
            prepare_seconds: 120.0,
        };
        let doc = full_document(&report, &config);
        assert_eq!(doc["modes"]["quiet"]["time_seconds"], 4_100.0);
    }

    #[test]
    fn model_time_is_never_negative() {
        let config = ConfigMap::new();
        let mut report = report_with(vec![extruder(0, 100.0)]);
        report.normal = ModeTiming {
            time_seconds: 100.0,
            prepare_seconds: 90.0,
        };
        report.timelapse_seconds = 60.0;

        let doc = full_document(&report, &config);
        assert_eq!(doc["modes"]["normal"]["model_time_seconds"], 0.0);
        // 3700 - 120 - 30 for the untouched fixture would be positive; here
        // the clamp applies.
        assert_eq!(doc["modes"]["normal"]["model_time"], "0s");
    }

    #[test]
    fn duration_formatting() {
        assert_eq!(format_duration(0.0), "0s");
        assert_eq!(format_duration(59.4), "59s");
        assert_eq!(format_duration(60.0), "1m 0s");
        assert_eq!(format_duration(3_661.0), "1h 1m 1s");
        assert_eq!(format_duration(90_061.0), "1d 1h 1m 1s");
        assert_eq!(format_duration(-5.0), "0s");
    }
}
