use anyhow::Result;
use std::path::Path;

use crate::config::Config;
use crate::pledge::{self, SandboxState};

pub async fn run(config_file: Option<&Path>) -> Result<()> {
    let config = Config::load_or(config_file)?;
    let caps = pledge::detect();

    println!("Seatbelt Capabilities:");
    for line in caps.status_lines() {
        println!("{}", line);
    }
    println!();

    let engine = pledge::state::global();
    let status = engine.status();
    println!("Engine:");
    match engine.process_path() {
        Some(path) => println!("  Process:     {}", path.display()),
        None => println!("  Process:     (unresolved)"),
    }
    println!("  State:       {}", format_state(status.state));
    println!("  Enforced:    {}", status.enforced);
    println!();

    println!("Configuration:");
    println!("  File:        {}", config.file_path().display());
    println!("  Enforcement: {}", config.pledge.enforcement);
    println!("  Promises:    {}", config.pledge.promises);
    println!("  Probe paths: {:?}", config.pledge.probe_paths);
    println!("  Timeout:     {}ms", config.pledge.probe_timeout_ms);

    Ok(())
}

fn format_state(state: SandboxState) -> &'static str {
    match state {
        SandboxState::Unpledged => "unpledged",
        SandboxState::Pledged => "pledged (not enforced)",
        SandboxState::Active => "active",
    }
}
