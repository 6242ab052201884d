//! Replay a captured feed file through the pipeline and print the parsed
//! events plus the resulting roster state.
//!
//! Usage:
//!   replay_feed <feed-file> [--creature ID:NOUN:NAME]...
//!
//! Each `--creature` seeds the roster so events can resolve. The whole file
//! is run as a single chunk (events never span chunks; splitting a capture
//! would drop attack/damage pairs at the boundary).

use std::env;
use std::fs;
use std::process::ExitCode;

use fray::{
    run_pipeline, serialize_events_json, CreatureRegistry, CreatureRoster, StockClassifier,
    TrackerSettings,
};

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("replay_feed: {err}");
            ExitCode::from(2)
        }
    }
}

fn run(args: &[String]) -> Result<(), String> {
    let Some(path) = args.get(1).filter(|a| !a.starts_with("--")) else {
        return Err("usage: replay_feed <feed-file> [--creature ID:NOUN:NAME]...".to_string());
    };

    let roster = CreatureRoster::new();
    let mut i = 2;
    while i < args.len() {
        if args[i] == "--creature" {
            let spec = args
                .get(i + 1)
                .ok_or_else(|| "--creature needs ID:NOUN:NAME".to_string())?;
            let (id, name) = parse_creature_spec(spec)?;
            roster.add(id, name);
            i += 2;
        } else {
            return Err(format!("unknown argument: {}", args[i]));
        }
    }

    let raw = fs::read_to_string(path).map_err(|e| format!("read {path}: {e}"))?;
    let lines: Vec<String> = raw.lines().map(str::to_string).collect();

    let classifier = StockClassifier::new();
    let settings = TrackerSettings::from_env();
    let events = run_pipeline(&lines, &classifier, &roster, &settings);

    println!("{}", serialize_events_json(&events)?);
    for creature in roster.creatures() {
        let state = creature.state();
        println!(
            "# {} (id {}): {} damage, {} wound(s), {} status(es){}",
            creature.name(),
            creature.id(),
            state.total_damage,
            state.wounds.len(),
            state.statuses.len(),
            if state.fatal_crit { ", FATAL" } else { "" },
        );
    }
    Ok(())
}

fn parse_creature_spec(spec: &str) -> Result<(u64, String), String> {
    let mut parts = spec.splitn(3, ':');
    let id: u64 = parts
        .next()
        .unwrap_or_default()
        .parse()
        .map_err(|_| format!("bad creature id in {spec:?}"))?;
    let _noun = parts.next().unwrap_or_default();
    let name = parts.next().unwrap_or_default();
    if name.is_empty() {
        return Err(format!("creature spec {spec:?} needs ID:NOUN:NAME"));
    }
    Ok((id, name.to_string()))
}
