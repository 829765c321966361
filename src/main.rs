//! tellycache - Cached TMDB detail lookups from the command line
//!
//! Resolves movie, show, season and person details through the two-tier
//! detail cache and prints them as JSON.

use std::process::ExitCode;

use clap::Parser;
use futures::future::join_all;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use tellycache::cache::{ResolveError, SystemClock};
use tellycache::cli::{Cli, Command, StartupConfig};
use tellycache::data::TmdbClient;
use tellycache::services::DetailServices;

/// Sets up stderr logging, honouring RUST_LOG over the -v flags
fn init_logging(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Prints each resolved record, returning false if any lookup failed
fn print_results<T: Serialize>(results: Vec<(String, Result<T, ResolveError>)>) -> bool {
    let mut all_ok = true;
    for (label, result) in results {
        match result.map_err(|e| e.to_string()).and_then(|record| {
            serde_json::to_string_pretty(&record).map_err(|e| e.to_string())
        }) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("error: {}: {}", label, e);
                all_ok = false;
            }
        }
    }
    all_ok
}

async fn run(config: &StartupConfig, command: Command) -> Result<bool, Box<dyn std::error::Error>> {
    let services = DetailServices::open(&config.cache, SystemClock::shared());
    let client = || config.require_api_key().map(TmdbClient::new);

    let all_ok = match command {
        Command::Invalidate { key } => {
            services.invalidate(&key)?;
            true
        }
        Command::Clear => {
            services.clear_all();
            true
        }
        Command::Purge => {
            let removed = services.purge_expired();
            println!("Removed {} expired entries", removed);
            true
        }
        Command::Movie { ids } => {
            let client = client()?;
            let results = join_all(ids.iter().map(|&id| services.movie(id, &client))).await;
            print_results(ids.iter().map(|id| format!("movie {}", id)).zip(results).collect())
        }
        Command::Show { ids } => {
            let client = client()?;
            let results = join_all(ids.iter().map(|&id| services.show(id, &client))).await;
            print_results(ids.iter().map(|id| format!("show {}", id)).zip(results).collect())
        }
        Command::Person { ids } => {
            let client = client()?;
            let results = join_all(ids.iter().map(|&id| services.person(id, &client))).await;
            print_results(ids.iter().map(|id| format!("person {}", id)).zip(results).collect())
        }
        Command::Season {
            tv_id,
            season_number,
        } => {
            let client = client()?;
            let result = services.season(tv_id, season_number, &client).await;
            print_results(vec![(format!("season {} of show {}", season_number, tv_id), result)])
        }
    };

    Ok(all_ok)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match StartupConfig::from_cli(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::from(2);
        }
    };

    init_logging(config.log_filter());

    match run(&config, cli.command).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
