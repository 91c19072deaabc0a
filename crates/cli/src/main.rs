//! Sensor Hub CLI
//!
//! A command-line tool for sending readings, querying history,
//! exporting CSV and tailing live events from a sensor hub.

mod client;
mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{readings, status, watch};
use std::path::PathBuf;

/// Sensor Hub CLI
#[derive(Parser)]
#[command(name = "sensorctl")]
#[command(author, version, about = "CLI for the Sensor Hub", long_about = None)]
pub struct Cli {
    /// Hub URL (can also be set via SENSOR_HUB_URL env var)
    #[arg(long, env = "SENSOR_HUB_URL", default_value = "http://localhost:8080")]
    pub api_url: String,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Send one reading
    Send {
        /// Temperature in °C
        #[arg(long, allow_hyphen_values = true)]
        temperature: f64,

        /// Relative humidity in %
        #[arg(long, allow_hyphen_values = true)]
        humidity: f64,

        /// Soil moisture in %
        #[arg(long, allow_hyphen_values = true)]
        soil_moisture: f64,
    },

    /// Show reading history, newest first
    History {
        /// Show at most this many readings
        #[arg(long, short)]
        limit: Option<usize>,

        /// Show abnormal readings only
        #[arg(long)]
        abnormal_only: bool,
    },

    /// Show abnormal readings and what tripped them
    Abnormal,

    /// Show the number of abnormal readings
    Count,

    /// Download the history as CSV
    Export {
        /// Output file path (stdout if not specified)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Print live updates and notifications as they arrive
    Watch,

    /// Show hub health and readiness
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize client
    let client = client::ApiClient::new(&cli.api_url)?;

    // Execute command
    match cli.command {
        Commands::Send {
            temperature,
            humidity,
            soil_moisture,
        } => {
            let reading = client::SensorReading {
                temperature,
                humidity,
                soil_moisture,
            };
            readings::send_reading(&client, reading, cli.format).await?;
        }
        Commands::History {
            limit,
            abnormal_only,
        } => {
            readings::show_history(&client, limit, abnormal_only, cli.format).await?;
        }
        Commands::Abnormal => {
            readings::show_abnormal(&client, cli.format).await?;
        }
        Commands::Count => {
            readings::show_count(&client, cli.format).await?;
        }
        Commands::Export { output } => {
            readings::export_csv(&client, output).await?;
        }
        Commands::Watch => {
            watch::watch(&client, cli.format).await?;
        }
        Commands::Status => {
            status::show_status(&client, cli.format).await?;
        }
    }

    Ok(())
}
