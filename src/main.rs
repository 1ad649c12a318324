use anyhow::Result;
use clap::Parser;

use sbpledge::cli::{self, Cli, Commands};
use sbpledge::config::Config;

fn main() -> Result<()> {
    // argv[0] dispatch: if re-exec'd as "sbpledge-probe", enter the probe child
    // immediately, before Tokio, Clap, or any other initialization.
    #[cfg(unix)]
    if let Some(arg0) = std::env::args_os().next()
        && arg0.to_string_lossy().ends_with(sbpledge::pledge::PROBE_ARG0)
    {
        sbpledge::pledge::probe_child_main();
    }

    let cli = Cli::parse();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main(cli))
}

async fn async_main(cli: Cli) -> Result<()> {
    // RUST_LOG wins, then --verbose, then logging.level from config
    let log_level = if cli.verbose {
        "debug".to_string()
    } else {
        Config::load_or(cli.config.as_deref())
            .map(|c| c.logging.level)
            .unwrap_or_else(|_| "info".to_string())
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .init();

    let config_file = cli.config.as_deref();
    match cli.command {
        Commands::Status => cli::status::run(config_file).await,
        Commands::Promises(args) => cli::promises::run(args).await,
        Commands::Profile(args) => cli::profile::run(args, config_file).await,
        Commands::Test(args) => cli::test::run(args, config_file).await,
        Commands::Config(args) => cli::config::run(args, config_file).await,
        Commands::Paths => cli::paths::run(),
    }
}
