use anyhow::{Context, Result};
use clap::Args;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::pledge::{PolicyText, PromiseMask, ProfileCompiler, SBPL_MAX_SIZE};

#[derive(Args)]
pub struct ProfileArgs {
    /// Promise string, e.g. "stdio rpath" (default: pledge.promises from config)
    pub promises: Option<String>,

    /// Executable bound to the PROCESS_PATH parameter (default: this binary)
    #[arg(long)]
    pub exe: Option<PathBuf>,

    /// Byte limit for the compiled profile
    #[arg(long, default_value_t = SBPL_MAX_SIZE)]
    pub limit: usize,
}

pub async fn run(args: ProfileArgs, config_file: Option<&Path>) -> Result<()> {
    let promises = match args.promises {
        Some(promises) => promises,
        None => Config::load_or(config_file)?.pledge.promises,
    };
    let exe = match args.exe {
        Some(exe) => exe,
        None => std::env::current_exe()?,
    };

    let policy = render(&promises, &exe, args.limit)?;

    print!("{}", policy.as_str());
    eprintln!();
    for (name, value) in policy.params() {
        eprintln!(";; param {} = {}", name, value.to_string_lossy());
    }
    eprintln!(";; {} of {} bytes", policy.len(), args.limit);

    Ok(())
}

fn render(promises: &str, exe: &Path, limit: usize) -> Result<PolicyText> {
    let mask: PromiseMask = promises
        .parse()
        .with_context(|| format!("Invalid promise string: {:?}", promises))?;
    let policy = ProfileCompiler::with_limit(limit)
        .compile(mask, exe)
        .with_context(|| format!("Failed to compile profile for {:?}", promises))?;
    Ok(policy)
}
