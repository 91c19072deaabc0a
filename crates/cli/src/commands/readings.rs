//! Reading ingestion, query and export commands

use anyhow::{Context, Result};
use colored::Colorize;
use futures::StreamExt;
use std::io::Write;
use std::path::PathBuf;
use tabled::{settings::Style, Table, Tabled};

use crate::client::{
    AbnormalCount, AbnormalHistoryEntry, ApiClient, HistoryEntry, MessageResponse, SensorReading,
};
use crate::output::{
    color_abnormal, format_measurement, print_info, print_json, print_success, print_warning,
    OutputFormat,
};

/// Row for readings table
#[derive(Tabled)]
struct ReadingRow {
    #[tabled(rename = "ID")]
    id: i64,
    #[tabled(rename = "Timestamp")]
    timestamp: String,
    #[tabled(rename = "Temp (°C)")]
    temperature: String,
    #[tabled(rename = "Humidity (%)")]
    humidity: String,
    #[tabled(rename = "Soil Moisture (%)")]
    soil_moisture: String,
    #[tabled(rename = "Status")]
    status: String,
}

impl From<&HistoryEntry> for ReadingRow {
    fn from(entry: &HistoryEntry) -> Self {
        Self {
            id: entry.id,
            timestamp: entry.timestamp.clone(),
            temperature: format_measurement(entry.temperature),
            humidity: format_measurement(entry.humidity),
            soil_moisture: format_measurement(entry.soil_moisture),
            status: color_abnormal(entry.is_abnormal),
        }
    }
}

/// Row for abnormal history table
#[derive(Tabled)]
struct AbnormalRow {
    #[tabled(rename = "Timestamp")]
    timestamp: String,
    #[tabled(rename = "Type")]
    abnormal_type: String,
}

/// Post one reading
pub async fn send_reading(
    client: &ApiClient,
    reading: SensorReading,
    format: OutputFormat,
) -> Result<()> {
    let response: MessageResponse = client.post("sensor-data", &reading).await?;

    match format {
        OutputFormat::Json => print_json(&response)?,
        OutputFormat::Table => print_success(&response.message),
    }

    Ok(())
}

/// Keep abnormal rows only when asked, then cap at `limit`
fn select_history(
    mut entries: Vec<HistoryEntry>,
    limit: Option<usize>,
    abnormal_only: bool,
) -> Vec<HistoryEntry> {
    if abnormal_only {
        entries.retain(|e| e.is_abnormal);
    }
    if let Some(limit) = limit {
        entries.truncate(limit);
    }
    entries
}

/// Show reading history, newest first
pub async fn show_history(
    client: &ApiClient,
    limit: Option<usize>,
    abnormal_only: bool,
    format: OutputFormat,
) -> Result<()> {
    let entries: Vec<HistoryEntry> = client.get("history").await?;
    let total = entries.len();
    let entries = select_history(entries, limit, abnormal_only);

    match format {
        OutputFormat::Json => print_json(&entries)?,
        OutputFormat::Table => {
            if entries.is_empty() {
                print_warning("No readings found");
                return Ok(());
            }

            let rows: Vec<ReadingRow> = entries.iter().map(ReadingRow::from).collect();
            println!("{}", Table::new(rows).with(Style::rounded()));

            if entries.len() < total {
                print_info(&format!("Showing {} of {} readings", entries.len(), total));
            }
        }
    }

    Ok(())
}

/// Show abnormal readings with the measurement that tripped them
pub async fn show_abnormal(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let entries: Vec<AbnormalHistoryEntry> = client.get("abnormal-history").await?;

    match format {
        OutputFormat::Json => print_json(&entries)?,
        OutputFormat::Table => {
            if entries.is_empty() {
                print_success("No abnormal readings");
                return Ok(());
            }

            let rows: Vec<AbnormalRow> = entries
                .iter()
                .map(|e| AbnormalRow {
                    timestamp: e.timestamp.clone(),
                    abnormal_type: e.abnormal_type.red().to_string(),
                })
                .collect();
            println!("{}", Table::new(rows).with(Style::rounded()));
        }
    }

    Ok(())
}

pub async fn show_count(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let result: AbnormalCount = client.get("abnormal-count").await?;

    match format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Table => {
            let count = if result.count == 0 {
                result.count.to_string().green()
            } else {
                result.count.to_string().red().bold()
            };
            println!("{} {}", "Abnormal readings:".bold(), count);
        }
    }

    Ok(())
}

/// Download the CSV export to `output`, or stdout when none is given
pub async fn export_csv(client: &ApiClient, output: Option<PathBuf>) -> Result<()> {
    let response = client.open_stream("download-csv").await?;
    let mut chunks = response.bytes_stream();

    let mut writer: Box<dyn Write> = match &output {
        Some(path) => Box::new(std::io::BufWriter::new(
            std::fs::File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?,
        )),
        None => Box::new(std::io::stdout().lock()),
    };

    let mut lines = 0usize;
    while let Some(chunk) = chunks.next().await {
        let chunk = chunk.context("Failed to read export")?;
        lines += chunk.iter().filter(|b| **b == b'\n').count();
        writer.write_all(&chunk).context("Failed to write export")?;
    }
    writer.flush().context("Failed to write export")?;
    drop(writer);

    if let Some(path) = output {
        print_success(&format!(
            "Exported {} readings to {}",
            lines.saturating_sub(1),
            path.display()
        ));
    }

    Ok(())
}
