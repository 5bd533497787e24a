use std::fs;
use std::path::PathBuf;
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

fn bin() -> &'static str {
    env!("CARGO_BIN_EXE_perkeval")
}

fn unique_temp_path(name: &str) -> PathBuf {
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock should be after unix epoch")
        .as_nanos();
    std::env::temp_dir().join(format!("perkeval-{name}-{stamp}"))
}

const WORLD: &str = r#"{
    "guilds": {
        "1": {
            "catalog": {
                "perks": [
                    {"id": 1, "name": "Goldbug", "max_stacks": 3,
                     "requirements": [{"req_type": "commodity_qty", "commodity_name": "gold", "value": 5}],
                     "effects": [{"target_stat": "income", "value": 20}]}
                ]
            },
            "players": {
                "2": {"holdings": [{"commodity": "Gold", "quantity": 17, "unit_price": 10}]},
                "3": {"holdings": [{"commodity": "Gold", "quantity": 2, "unit_price": 10}]}
            }
        }
    }
}"#;

fn data_dir(name: &str) -> PathBuf {
    let dir = unique_temp_path(name);
    fs::create_dir_all(&dir).expect("data dir should be created");
    fs::write(dir.join("world.json"), WORLD).expect("world fixture should be written");
    dir
}

fn run(dir: &PathBuf, args: &[&str]) -> std::process::Output {
    Command::new(bin())
        .args(args)
        .env("PERKEVAL_DATA_DIR", dir)
        .env_remove("PERKEVAL_CONFIG_PATH")
        .output()
        .expect("perkeval should run")
}

#[test]
fn unknown_command_prints_usage() {
    let output = Command::new(bin())
        .arg("simulate")
        .output()
        .expect("perkeval should run");
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("usage: perkeval"));
}

#[test]
fn evaluate_command_emits_evaluation_json() {
    let dir = data_dir("evaluate");
    let base_path = dir.join("base.json");
    fs::write(&base_path, r#"{"income": 100}"#).expect("base fixture should be written");

    let output = run(&dir, &["evaluate", "1", "2", base_path.to_string_lossy().as_ref()]);
    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    let payload: serde_json::Value =
        serde_json::from_str(&stdout).expect("evaluate should emit json");
    assert_eq!(payload["final"]["income"], 160.0);
    assert_eq!(payload["final"]["networth"], 170.0);

    let _ = fs::remove_dir_all(dir);
}

#[test]
fn track_command_announces_once_and_persists_state() {
    let dir = data_dir("track");

    let first = run(&dir, &["track", "1", "2"]);
    assert_eq!(first.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&first.stdout).contains("**PERK ACTIVATED!!**"));
    assert!(dir.join("state.json").exists());

    let second = run(&dir, &["track", "1", "2"]);
    assert_eq!(second.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&second.stdout).contains("no newly activated perks"));

    let _ = fs::remove_dir_all(dir);
}

#[test]
fn rank_command_filters_low_networth() {
    let dir = data_dir("rank");
    let output = run(&dir, &["rank", "1", "10"]);
    assert_eq!(output.status.code(), Some(0));
    let payload: serde_json::Value = serde_json::from_str(&String::from_utf8_lossy(&output.stdout))
        .expect("rank should emit json");
    let rows = payload.as_array().expect("ranking array");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["user"], 2);

    let _ = fs::remove_dir_all(dir);
}

#[test]
fn evaluate_command_requires_ids() {
    let dir = data_dir("usage");
    let output = run(&dir, &["evaluate", "1"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("usage: perkeval evaluate"));
    let _ = fs::remove_dir_all(dir);
}

#[test]
fn validate_command_returns_non_zero_on_duplicate_ids() {
    let path = unique_temp_path("invalid-catalog").with_extension("json");
    fs::write(
        &path,
        r#"{"perks": [{"id": 1, "name": "A"}, {"id": 1, "name": "B"}]}"#,
    )
    .expect("fixture should be written");

    let output = Command::new(bin())
        .args(["validate", path.to_string_lossy().as_ref()])
        .output()
        .expect("validate should run");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("validation failed"));

    let _ = fs::remove_file(path);
}

#[test]
fn validate_command_accepts_yaml_catalog() {
    let path = unique_temp_path("catalog").with_extension("yaml");
    fs::write(
        &path,
        "perks:\n  - id: 1\n    name: Goldbug\n    effects:\n      - target_stat: income\n        value: 20\n",
    )
    .expect("fixture should be written");

    let output = Command::new(bin())
        .args(["validate", path.to_string_lossy().as_ref()])
        .output()
        .expect("validate should run");

    assert_eq!(output.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&output.stdout).contains("validation passed"));

    let _ = fs::remove_file(path);
}
