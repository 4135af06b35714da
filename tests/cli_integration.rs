// CLI integration tests against a temporary preset directory.
use std::path::Path;
use std::process::Command;

use serde_json::Value;

fn cmd() -> Command {
    let exe = env!("CARGO_BIN_EXE_slicekit");
    Command::new(exe)
}

fn parse_json(text: &str) -> Value {
    serde_json::from_str(text).expect("valid json")
}

fn write_preset(root: &Path, category: &str, file: &str, body: &str) {
    let dir = root.join(category);
    std::fs::create_dir_all(&dir).expect("mkdir");
    std::fs::write(dir.join(file), body).expect("write preset");
}

fn seed_presets(root: &Path) {
    write_preset(
        root,
        "printer",
        "a1.json",
        r#"{"name": "Bambu Lab A1", "values": {
            "printable_area": "0x0,256x0,256x256,0x256",
            "nozzle_diameter": ["0.4"]
        }}"#,
    );
    write_preset(
        root,
        "filament",
        "pla.json",
        r#"{"name": "Bambu PLA Basic @BBL A1", "values": {
            "filament_diameter": ["1.75"],
            "temperature": "220"
        }}"#,
    );
    write_preset(
        root,
        "process",
        "standard.json",
        r#"{"name": "0.20mm Standard @BBL A1", "values": {
            "layer_height": "0.2",
            "temperature": "215"
        }}"#,
    );
}

#[test]
fn presets_list_reports_all_categories() {
    let temp = tempfile::tempdir().expect("tempdir");
    seed_presets(temp.path());

    let output = cmd()
        .args(["--dir", temp.path().to_str().unwrap(), "presets", "list"])
        .output()
        .expect("list");
    assert!(output.status.success());

    let listing = parse_json(std::str::from_utf8(&output.stdout).expect("utf8"));
    assert_eq!(listing["printer"][0], "Bambu Lab A1");
    assert_eq!(listing["filament"][0], "Bambu PLA Basic @BBL A1");
    assert_eq!(listing["process"][0], "0.20mm Standard @BBL A1");
}

#[test]
fn presets_show_prints_the_effective_config() {
    let temp = tempfile::tempdir().expect("tempdir");
    seed_presets(temp.path());

    let output = cmd()
        .args([
            "--dir",
            temp.path().to_str().unwrap(),
            "presets",
            "show",
            "printer",
            "Bambu Lab A1",
        ])
        .output()
        .expect("show");
    assert!(output.status.success());

    let config = parse_json(std::str::from_utf8(&output.stdout).expect("utf8"));
    assert_eq!(config["printable_area"], "0x0,256x0,256x256,0x256");
    assert_eq!(config["nozzle_diameter"][0], "0.4");
}

#[test]
fn compose_resolves_substrings_and_applies_overrides() {
    let temp = tempfile::tempdir().expect("tempdir");
    seed_presets(temp.path());

    let output = cmd()
        .args([
            "--dir",
            temp.path().to_str().unwrap(),
            "compose",
            "--printer",
            "A1",
            "--filament",
            "PLA Basic",
            "--process",
            "0.20mm",
            "--set",
            "layer_height=0.28",
        ])
        .output()
        .expect("compose");
    assert!(output.status.success());

    let reply = parse_json(std::str::from_utf8(&output.stdout).expect("utf8"));
    assert_eq!(reply["presets"]["printer"], "Bambu Lab A1");
    assert_eq!(reply["presets"]["filament"], "Bambu PLA Basic @BBL A1");
    assert_eq!(reply["presets"]["process"], "0.20mm Standard @BBL A1");
    // Filament wins over process for shared keys; the override wins last.
    assert_eq!(reply["config"]["temperature"], "220");
    assert_eq!(reply["config"]["layer_height"], "0.28");
}

#[test]
fn unknown_preset_exits_with_the_not_found_code() {
    let temp = tempfile::tempdir().expect("tempdir");
    seed_presets(temp.path());

    let output = cmd()
        .args([
            "--dir",
            temp.path().to_str().unwrap(),
            "compose",
            "--printer",
            "Voron",
        ])
        .output()
        .expect("compose");
    assert!(!output.status.success());
    assert_eq!(output.status.code(), Some(5));

    let envelope = parse_json(std::str::from_utf8(&output.stderr).expect("utf8"));
    assert_eq!(envelope["error"]["kind"], "PresetNotFound");
    assert_eq!(envelope["error"]["preset"], "Voron");
}

#[test]
fn malformed_preset_file_is_a_config_parse_error() {
    let temp = tempfile::tempdir().expect("tempdir");
    seed_presets(temp.path());
    write_preset(temp.path(), "printer", "broken.json", "{not json");

    let output = cmd()
        .args(["--dir", temp.path().to_str().unwrap(), "presets", "list"])
        .output()
        .expect("list");
    assert!(!output.status.success());
    assert_eq!(output.status.code(), Some(4));

    let envelope = parse_json(std::str::from_utf8(&output.stderr).expect("utf8"));
    assert_eq!(envelope["error"]["kind"], "ConfigParse");
    assert!(envelope["error"]["path"]
        .as_str()
        .unwrap()
        .ends_with("broken.json"));
}

#[test]
fn empty_directory_lists_empty_categories() {
    let temp = tempfile::tempdir().expect("tempdir");

    let output = cmd()
        .args(["--dir", temp.path().to_str().unwrap(), "presets", "list"])
        .output()
        .expect("list");
    assert!(output.status.success());

    let listing = parse_json(std::str::from_utf8(&output.stdout).expect("utf8"));
    assert_eq!(listing["printer"], serde_json::json!([]));
}
