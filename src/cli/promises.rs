use anyhow::Result;
use clap::Args;
use serde::Serialize;

use crate::pledge::profile;
use crate::pledge::{Promise, SBPL_MAX_SIZE};

#[derive(Args)]
pub struct PromisesArgs {
    /// Print as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct PromiseRow {
    bit: u32,
    name: &'static str,
    supported: bool,
    rule_bytes: usize,
}

fn rows() -> Vec<PromiseRow> {
    Promise::ALL
        .iter()
        .map(|promise| {
            let rules = profile::translation(*promise);
            PromiseRow {
                bit: promise.bit(),
                name: promise.name(),
                supported: rules.is_some(),
                rule_bytes: rules.map_or(0, str::len),
            }
        })
        .collect()
}

pub async fn run(args: PromisesArgs) -> Result<()> {
    let rows = rows();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!("Promises (profile limit {} bytes):", SBPL_MAX_SIZE);
    println!();
    println!("  {:>3}  {:<10} {:<11} rules", "bit", "name", "seatbelt");
    for row in &rows {
        let status = if row.supported { "ok" } else { "unsupported" };
        println!(
            "  {:>3}  {:<10} {:<11} {}",
            row.bit, row.name, status, row.rule_bytes
        );
    }
    println!();
    println!("Granting an unsupported promise fails the pledge with ENOSYS.");

    Ok(())
}
