//! CSV export of the reading history

use futures::stream::{self, Stream};

use crate::models::Reading;
use crate::time::LocalZone;

/// Header row of every export
pub const CSV_HEADER: &str = "timestamp,temperature,humidity,soil_moisture";

/// Attachment name offered to browsers
pub const CSV_FILENAME: &str = "sensor_data.csv";

/// Render a measurement so integral values keep their decimal point
///
/// Magnitudes that switch to scientific notation get a signed, two-digit
/// exponent (`1e+20`, `1e-07`).
fn format_measurement(value: f64) -> String {
    let rendered = format!("{:?}", value);

    match rendered.split_once('e') {
        Some((mantissa, exponent)) => {
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exponent),
            };
            format!("{}e{}{:0>2}", mantissa, sign, digits)
        }
        None => rendered,
    }
}

/// One CSV line, newline-terminated
pub fn csv_row(reading: &Reading, zone: &LocalZone) -> String {
    format!(
        "{},{},{},{}\n",
        zone.format(reading.timestamp),
        format_measurement(reading.temperature),
        format_measurement(reading.humidity),
        format_measurement(reading.soil_moisture),
    )
}

/// Header followed by one line per reading, in the given order
pub fn csv_lines(readings: Vec<Reading>, zone: LocalZone) -> impl Iterator<Item = String> {
    std::iter::once(format!("{}\n", CSV_HEADER))
        .chain(readings.into_iter().map(move |r| csv_row(&r, &zone)))
}

/// Same as [`csv_lines`] as an async stream, for chunked responses
pub fn csv_stream(readings: Vec<Reading>, zone: LocalZone) -> impl Stream<Item = String> {
    stream::iter(csv_lines(readings, zone))
}

/// Whole export as one string
pub fn render_csv(readings: Vec<Reading>, zone: LocalZone) -> String {
    csv_lines(readings, zone).collect()
}
