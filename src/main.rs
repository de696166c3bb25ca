mod config;
mod database;
mod models;
mod store;
mod sync;
mod ui;

#[cfg(test)]
mod tests;

use anyhow::Result;
use crate::config::settings::Settings;
use crate::database::connection::Database;
use crate::database::RemoteStore;
use crate::ui::app::App;
use clap::{Arg, Command};
use dotenvy::dotenv;
use std::env;
use std::fs::OpenOptions;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("OJT Logbook")
        .version("0.1.0")
        .about("Track your On-the-Job-Training hours, online or off")
        .arg(
            Arg::new("check-connection")
                .long("check-connection")
                .help("Probe the backend once and exit")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("user")
                .long("user")
                .value_name("USER_ID")
                .help("Log hours as this user instead of OJT_USER_ID"),
        )
        .get_matches();

    // Load .env file
    dotenv().ok();

    // Check if debug logging is enabled via .env
    let debug_enabled = env::var("DEBUG_LOGS_ENABLED")
        .ok()
        .and_then(|v| v.parse::<bool>().ok())
        .unwrap_or(false);

    if debug_enabled {
        // Enable debug logging to app.log file
        let log_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open("app.log")
            .expect("Failed to open log file");

        env_logger::Builder::from_env(
            env_logger::Env::default().default_filter_or("ojt_logbook=debug"),
        )
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .init();

        log::info!("=== DEBUG LOGGING ENABLED ===");
        log::info!("Writing logs to app.log");
        log::info!("To disable: Remove DEBUG_LOGS_ENABLED from .env or set to false");
    } else {
        // No logging for regular users
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("off")).init();
    }

    log::info!("Starting OJT Logbook");
    let mut settings = Settings::new()?;
    if let Some(user) = matches.get_one::<String>("user") {
        settings.user_id = user.clone();
    }
    log::info!("Logging hours as {}", settings.user_id);

    let database = Database::new(&settings.database_url)?;

    if matches.get_flag("check-connection") {
        if database.ping().await {
            println!("✅ Backend reachable");
        } else {
            println!("❌ Backend unreachable. Please check:");
            println!("  - Database is running");
            println!("  - .env file has correct DATABASE_URL");
        }
        return Ok(());
    }

    // Schema bootstrap is best-effort; being offline at startup is fine.
    match database.create_tables().await {
        Ok(()) => log::info!("Database ready"),
        Err(e) => log::warn!("Backend unreachable at startup, running offline: {}", e),
    }

    let store: Arc<dyn RemoteStore> = Arc::new(database);
    let mut app = App::new(store, &settings);
    app.run().await?;

    Ok(())
}
