//! Tail the hub's live event stream

use anyhow::{Context, Result};
use colored::Colorize;
use futures::StreamExt;
use serde_json::Value;

use crate::client::{ApiClient, HistoryEntry, Notification};
use crate::output::{
    color_abnormal, format_measurement, print_error, print_info, print_warning, OutputFormat,
};

/// One Server-Sent Events frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    pub event: String,
    pub data: String,
}

/// Incremental Server-Sent Events decoder
///
/// Bytes may arrive split anywhere; frames are emitted once their blank-line
/// terminator has been seen.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: Vec<u8>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every frame it completes
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buffer.extend(chunk.iter().filter(|b| **b != b'\r'));

        let mut frames = Vec::new();
        while let Some(end) = self.buffer.windows(2).position(|w| w == b"\n\n") {
            let raw: Vec<u8> = self.buffer.drain(..end + 2).collect();
            if let Some(frame) = parse_frame(&String::from_utf8_lossy(&raw[..end])) {
                frames.push(frame);
            }
        }
        frames
    }
}

/// Parse one frame; comment-only frames (keep-alives) yield `None`
fn parse_frame(raw: &str) -> Option<SseFrame> {
    let mut event = None;
    let mut data: Vec<&str> = Vec::new();

    for line in raw.lines() {
        if line.starts_with(':') {
            continue;
        }
        let (field, value) = line.split_once(':').unwrap_or((line, ""));
        let value = value.strip_prefix(' ').unwrap_or(value);

        match field {
            "event" => event = Some(value.to_string()),
            "data" => data.push(value),
            _ => {}
        }
    }

    if data.is_empty() {
        return None;
    }

    Some(SseFrame {
        event: event.unwrap_or_else(|| "message".to_string()),
        data: data.join("\n"),
    })
}

fn print_frame(frame: &SseFrame, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let data: Value = serde_json::from_str(&frame.data)
                .unwrap_or_else(|_| Value::String(frame.data.clone()));
            println!("{}", serde_json::json!({ "event": frame.event, "data": data }));
        }
        OutputFormat::Table => match frame.event.as_str() {
            "update" => {
                let update: HistoryEntry =
                    serde_json::from_str(&frame.data).context("Malformed update event")?;
                println!(
                    "{} #{} temperature={} humidity={} soil_moisture={} {}",
                    update.timestamp.dimmed(),
                    update.id,
                    format_measurement(update.temperature),
                    format_measurement(update.humidity),
                    format_measurement(update.soil_moisture),
                    color_abnormal(update.is_abnormal)
                );
            }
            "notification" => {
                let notification: Notification =
                    serde_json::from_str(&frame.data).context("Malformed notification event")?;
                print_warning(&format!(
                    "{} temperature={} humidity={} soil_moisture={} at {}",
                    notification.message.bold(),
                    format_measurement(notification.data.temperature),
                    format_measurement(notification.data.humidity),
                    format_measurement(notification.data.soil_moisture),
                    notification.data.timestamp
                ));
            }
            other => println!("{} {}", other.cyan(), frame.data),
        },
    }

    Ok(())
}

/// Print live events until the stream ends or Ctrl-C
pub async fn watch(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let response = client.open_stream("events").await?;
    let mut chunks = response.bytes_stream();
    let mut parser = SseParser::new();

    if let OutputFormat::Table = format {
        print_info("Watching live events (Ctrl-C to stop)");
    }

    loop {
        tokio::select! {
            chunk = chunks.next() => match chunk {
                Some(Ok(bytes)) => {
                    for frame in parser.push(&bytes) {
                        if let Err(e) = print_frame(&frame, format) {
                            print_error(&format!("{:#}", e));
                        }
                    }
                }
                Some(Err(e)) => return Err(e).context("Live stream failed"),
                None => {
                    print_warning("Live stream closed by server");
                    return Ok(());
                }
            },
            _ = tokio::signal::ctrl_c() => return Ok(()),
        }
    }
}
