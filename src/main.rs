mod cli;
mod config;
mod db;
mod error;
mod models;
mod prayer_times;
mod tracking;
mod utils;

use anyhow::{Context, Result};
use clap::Parser;
use std::process::ExitCode;

use cli::args::{Cli, Commands};
use cli::handlers;
use config::AppConfig;
use db::migrations::run_migrations;
use error::TrackError;
use prayer_times::TimingsProvider;
use tracking::Tracker;

fn main() -> ExitCode {
    env_logger::init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("  ✗ {:#}", e);
            ExitCode::from(exit_code(&e))
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = AppConfig::load(cli.config.as_deref()).context("Loading config")?;

    // Ensure data directory exists and open DB
    config.ensure_data_dir()?;
    let db_path = config.db_path()?;
    let conn = db::open(&db_path, &config.storage)?;

    // Run migrations on every startup
    run_migrations(&conn)?;

    let user = cli.user.as_deref();
    match &cli.command {
        Commands::Times { date } => {
            let provider = timings_provider(&config)?;
            let tracker = Tracker::new(&conn, provider.as_ref(), &config.location.default_country);
            let caller = handlers::caller(user, &config)?;
            handlers::handle_times(&tracker, &caller, date.as_deref())?;
        }
        Commands::Mark { prayer, date } => {
            let provider = timings_provider(&config)?;
            let tracker = Tracker::new(&conn, provider.as_ref(), &config.location.default_country);
            let caller = handlers::caller(user, &config)?;
            handlers::handle_mark(&tracker, &caller, prayer, date.as_deref())?;
        }
        Commands::Calendar { month, json } => {
            let provider = timings_provider(&config)?;
            let tracker = Tracker::new(&conn, provider.as_ref(), &config.location.default_country);
            let caller = handlers::caller(user, &config)?;
            handlers::handle_calendar(&tracker, &caller, month.as_deref(), *json)?;
        }
        Commands::Progress {
            group,
            period,
            json,
        } => {
            let provider = timings_provider(&config)?;
            let tracker = Tracker::new(&conn, provider.as_ref(), &config.location.default_country);
            handlers::handle_progress(&tracker, group, period, *json)?;
        }
        Commands::User { action } => {
            handlers::handle_user(&conn, &config, user, action)?;
        }
        Commands::Group { action } => {
            handlers::handle_group(&conn, action)?;
        }
    }

    Ok(())
}

fn timings_provider(config: &AppConfig) -> Result<Box<dyn TimingsProvider>> {
    let provider = prayer_times::from_config(&config.timings)
        .map_err(|e| TrackError::Configuration(format!("{:#}", e)))?;
    log::debug!("using {} timings provider", provider.name());
    Ok(provider)
}

/// Process exit status: 2 for mistakes the user can correct, 75 (EX_TEMPFAIL)
/// when retrying may help, 78 (EX_CONFIG) for bad configuration or references.
fn exit_code(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<TrackError>() {
        Some(e) if e.is_user_correctable() => 2,
        Some(e) if e.is_retryable() => 75,
        Some(TrackError::Configuration(_)) => 78,
        _ => 1,
    }
}
