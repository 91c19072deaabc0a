//! Hub health and readiness

use anyhow::Result;
use colored::Colorize;
use reqwest::StatusCode;
use tabled::{settings::Style, Table, Tabled};

use crate::client::{ApiClient, HealthResponse, ReadinessResponse};
use crate::output::{color_status, print_json, OutputFormat};

/// Row for components table
#[derive(Tabled)]
struct ComponentRow {
    #[tabled(rename = "Component")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Failures")]
    failures: u32,
    #[tabled(rename = "Message")]
    message: String,
}

fn component_rows(health: &HealthResponse) -> Vec<ComponentRow> {
    let mut rows: Vec<ComponentRow> = health
        .components
        .iter()
        .map(|(name, component)| ComponentRow {
            name: name.clone(),
            status: color_status(&component.status),
            failures: component.consecutive_failures,
            message: component.message.clone().unwrap_or_default(),
        })
        .collect();
    rows.sort_by(|a, b| a.name.cmp(&b.name));
    rows
}

/// Show hub health and readiness
pub async fn show_status(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let (_, health): (StatusCode, HealthResponse) = client.get_with_status("healthz").await?;
    let (_, readiness): (StatusCode, ReadinessResponse) = client.get_with_status("readyz").await?;

    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "health": health,
            "readiness": readiness,
        }))?,
        OutputFormat::Table => {
            println!("{}", "Sensor Hub Status".bold());
            println!("{}", "=".repeat(50));
            println!("Health:                 {}", color_status(&health.status));

            let ready = if readiness.ready { "ready" } else { "not ready" };
            match &readiness.reason {
                Some(reason) => println!("Readiness:              {} ({})", color_status(ready), reason),
                None => println!("Readiness:              {}", color_status(ready)),
            }
            println!();

            let rows = component_rows(&health);
            if !rows.is_empty() {
                println!("{}", Table::new(rows).with(Style::rounded()));
            }
        }
    }

    Ok(())
}
