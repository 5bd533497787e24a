use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use crate::catalog::{validate_catalog_file, ValidationSeverity};
use crate::config::load_engine_config_from_env;
use crate::perks::{render_announcements, PerkEngine, StatValues};
use crate::server;
use crate::services::{rank_by_effective_networth, RankingOptions};
use crate::store::{JsonFileStore, StoreError};

pub const DATA_DIR_ENV: &str = "PERKEVAL_DATA_DIR";
pub const DEFAULT_DATA_DIR: &str = "data";

const USAGE: &str = "usage: perkeval <serve|evaluate|track|validate|rank>";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Serve,
    Evaluate,
    Track,
    Validate,
    Rank,
}

pub fn parse_command(args: &[String]) -> Option<Command> {
    match args.get(1).map(String::as_str) {
        Some("serve") => Some(Command::Serve),
        Some("evaluate") => Some(Command::Evaluate),
        Some("track") => Some(Command::Track),
        Some("validate") => Some(Command::Validate),
        Some("rank") => Some(Command::Rank),
        _ => None,
    }
}

pub fn run_with_args(args: &[String]) -> i32 {
    match parse_command(args) {
        Some(Command::Serve) => handle_serve(),
        Some(Command::Evaluate) => handle_evaluate(args),
        Some(Command::Track) => handle_track(args),
        Some(Command::Validate) => handle_validate(args),
        Some(Command::Rank) => handle_rank(args),
        None => {
            eprintln!("{USAGE}");
            2
        }
    }
}

pub fn data_dir_from_env() -> PathBuf {
    env::var(DATA_DIR_ENV)
        .ok()
        .filter(|dir| !dir.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
}

/// Engine over the file store in the configured data directory.
pub fn open_engine() -> Result<PerkEngine, StoreError> {
    let store = Arc::new(JsonFileStore::open(&data_dir_from_env())?);
    let config = load_engine_config_from_env();
    Ok(PerkEngine::with_config(store.clone(), store, config))
}

fn open_engine_or_report() -> Option<PerkEngine> {
    match open_engine() {
        Ok(engine) => Some(engine),
        Err(err) => {
            eprintln!("failed to open data dir: {err}");
            None
        }
    }
}

fn handle_serve() -> i32 {
    let Some(engine) = open_engine_or_report() else {
        return 1;
    };
    let bind_addr = server::bind_addr_from_env();
    match server::run_server(&bind_addr, engine) {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("server error: {err}");
            1
        }
    }
}

fn handle_evaluate(args: &[String]) -> i32 {
    let (Some(guild), Some(user)) = (parse_id_arg(args.get(2)), parse_id_arg(args.get(3))) else {
        eprintln!("usage: perkeval evaluate <guild> <user> [base.json]");
        return 2;
    };
    let base = match args.get(4) {
        Some(path) => match read_base_values(path) {
            Ok(base) => base,
            Err(err) => {
                eprintln!("invalid base values '{path}': {err}");
                return 2;
            }
        },
        None => StatValues::new(),
    };
    let Some(engine) = open_engine_or_report() else {
        return 1;
    };

    match engine.evaluate(guild, user, &base) {
        Ok(evaluation) => print_json(&evaluation, "evaluation"),
        Err(err) => {
            eprintln!("evaluation failed: {err}");
            1
        }
    }
}

fn handle_track(args: &[String]) -> i32 {
    let (Some(guild), Some(user)) = (parse_id_arg(args.get(2)), parse_id_arg(args.get(3))) else {
        eprintln!("usage: perkeval track <guild> <user>");
        return 2;
    };
    let Some(engine) = open_engine_or_report() else {
        return 1;
    };

    match engine.evaluate_and_track_activations(guild, user, &StatValues::new()) {
        Ok((_, activated)) if activated.is_empty() => {
            println!("no newly activated perks");
            0
        }
        Ok((_, activated)) => {
            println!("{}", render_announcements(&activated));
            0
        }
        Err(err) => {
            eprintln!("tracking failed: {err}");
            1
        }
    }
}

fn handle_validate(args: &[String]) -> i32 {
    let Some(path) = args.get(2) else {
        eprintln!("usage: perkeval validate <catalog.json|catalog.yaml>");
        return 2;
    };

    let config = load_engine_config_from_env();
    match validate_catalog_file(path, &config) {
        Ok(report) => {
            for diag in &report.diagnostics {
                eprintln!("- [{}] {}: {}", diag.severity, diag.context, diag.message);
            }
            if report.has_errors() {
                eprintln!(
                    "validation failed: {} error(s)",
                    report.count(ValidationSeverity::Error)
                );
                1
            } else {
                println!(
                    "validation passed: {path} (warnings={})",
                    report.count(ValidationSeverity::Warning)
                );
                0
            }
        }
        Err(err) => {
            eprintln!("validation failed: {err}");
            1
        }
    }
}

fn handle_rank(args: &[String]) -> i32 {
    let Some(guild) = parse_id_arg(args.get(2)) else {
        eprintln!("usage: perkeval rank <guild> [limit]");
        return 2;
    };
    let limit = parse_usize_arg(args.get(3), "limit", RankingOptions::default().limit);
    let Some(engine) = open_engine_or_report() else {
        return 1;
    };

    match rank_by_effective_networth(&engine, guild, RankingOptions::default().with_limit(limit)) {
        Ok(ranked) => print_json(&ranked, "ranking"),
        Err(err) => {
            eprintln!("ranking failed: {err}");
            1
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T, what: &str) -> i32 {
    match serde_json::to_string_pretty(value) {
        Ok(payload) => {
            println!("{payload}");
            0
        }
        Err(err) => {
            eprintln!("failed to serialize {what}: {err}");
            1
        }
    }
}

fn read_base_values(path: &str) -> Result<StatValues, String> {
    let raw = fs::read_to_string(path).map_err(|err| err.to_string())?;
    serde_json::from_str(&raw).map_err(|err| err.to_string())
}

fn parse_id_arg(raw: Option<&String>) -> Option<u64> {
    raw.and_then(|value| value.trim().parse::<u64>().ok())
}

fn parse_usize_arg(raw: Option<&String>, name: &str, default: usize) -> usize {
    raw.and_then(|value| value.parse::<usize>().ok())
        .unwrap_or_else(|| {
            if let Some(value) = raw {
                eprintln!("invalid {name} '{value}', defaulting to {default}");
            }
            default
        })
}
