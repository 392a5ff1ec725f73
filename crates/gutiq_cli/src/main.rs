//! Command-line runner for the event API.
//!
//! # Responsibility
//! - Map `health|list|get|create|delete|version` subcommands onto
//!   `EventsApi` calls.
//! - Print the status code and pretty JSON body; exit non-zero on errors.

use clap::{Parser, Subcommand};
use gutiq_api::{ApiConfig, ApiResponse, EventsApi};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(name = "gutiq", about = "Record and inspect GutIQ health events")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, PartialEq, Eq, Subcommand)]
enum Command {
    /// Liveness check; does not touch the database.
    Health,
    /// List all events, newest first.
    List,
    /// Fetch one event by id.
    Get { event_id: String },
    /// Create an event from a `{timestamp, event_type, data}` JSON body.
    Create { body: String },
    /// Delete one event by id.
    Delete { event_id: String },
    /// Print the core crate version.
    Version,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = ApiConfig::from_env();
    if let Err(err) = gutiq_api::init_logging(&config) {
        eprintln!("logging disabled: {err}");
    }

    let api = EventsApi::from_config(&config);
    let response = match cli.command {
        Command::Health => api.health(),
        Command::List => api.get_all_events(),
        Command::Get { event_id } => api.get_event(&event_id),
        Command::Create { body } => api.create_event(&body),
        Command::Delete { event_id } => api.delete_event(&event_id),
        Command::Version => {
            println!("gutiq_core version={}", gutiq_core::core_version());
            return ExitCode::SUCCESS;
        }
    };

    print_response(&response);
    if response.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn print_response(response: &ApiResponse) {
    println!("status={}", response.status);
    if response.body.is_null() {
        return;
    }
    match serde_json::to_string_pretty(&response.body) {
        Ok(body) => println!("{body}"),
        Err(err) => eprintln!("failed to render body: {err}"),
    }
}
