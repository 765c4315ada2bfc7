//! Historical sensor reports: display rows, downsampling, averages and export.

use chrono::{DateTime, FixedOffset};
use serde::Serialize;

use crate::models::{round_to, SensorReading, TIMESTAMP_FLOOR};

// ---

/// Default minimum spacing between retained report rows.
pub const DEFAULT_SPACING_SECS: i64 = 60;

/// Display string used for rows whose timestamp is missing or corrupt.
pub const INVALID_TIMESTAMP: &str = "Invalid Timestamp";

/// Format epoch seconds like `Mar 26, 2025, 06:45:00 PM` in `offset`.
pub fn format_timestamp(timestamp: i64, offset: &FixedOffset) -> String {
    // ---
    if timestamp < TIMESTAMP_FLOOR {
        return INVALID_TIMESTAMP.to_string();
    }

    match DateTime::from_timestamp(timestamp, 0) {
        Some(utc) => utc
            .with_timezone(offset)
            .format("%b %d, %Y, %I:%M:%S %p")
            .to_string(),
        None => INVALID_TIMESTAMP.to_string(),
    }
}

/// One line of the reports table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    // ---
    /// Key of the sensor log in the telemetry backend.
    pub id: String,
    pub timestamp: i64,
    pub date_formatted: String,
    pub power_kw: f64,
    pub temp_c: f64,
    pub gas_ppm: i64,
    pub level_cm: f64,
}

impl ReportRow {
    pub fn from_reading(id: impl Into<String>, reading: &SensorReading, offset: &FixedOffset) -> Self {
        // ---
        ReportRow {
            id: id.into(),
            timestamp: reading.timestamp,
            date_formatted: format_timestamp(reading.timestamp, offset),
            power_kw: reading.power_kw(),
            temp_c: reading.temp_c,
            gas_ppm: reading.gas_ppm,
            level_cm: reading.level_cm,
        }
    }

    /// At or above the floor and representable as a calendar date.
    fn is_valid(&self) -> bool {
        self.timestamp >= TIMESTAMP_FLOOR && DateTime::from_timestamp(self.timestamp, 0).is_some()
    }
}

/// Downsample time-ordered rows.
///
/// Rows are first filtered by a case-insensitive substring match on
/// `date_formatted` (an empty search keeps everything), rows with an invalid
/// timestamp are dropped, and the remainder is thinned greedily so that each
/// kept row is at least `spacing_secs` away from the previously kept one.
/// The first surviving row is always kept.
pub fn sample(rows: &[ReportRow], search: &str, spacing_secs: i64) -> Vec<ReportRow> {
    // ---
    let needle = search.to_lowercase();
    let mut kept: Vec<ReportRow> = Vec::new();
    let mut last_kept: Option<i64> = None;

    for row in rows
        .iter()
        .filter(|row| row.date_formatted.to_lowercase().contains(&needle))
        .filter(|row| row.is_valid())
    {
        let far_enough = last_kept.map_or(true, |last| {
            row.timestamp.abs_diff(last) >= spacing_secs.unsigned_abs()
        });
        if far_enough {
            last_kept = Some(row.timestamp);
            kept.push(row.clone());
        }
    }

    tracing::trace!(
        input = rows.len(),
        kept = kept.len(),
        spacing_secs,
        "Sampled report rows"
    );
    kept
}

/// Averages shown above the reports table.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ReportStats {
    pub avg_power_kw: f64,
    pub avg_temp_c: f64,
    pub count: usize,
}

/// Mean power and temperature; all zero for an empty slice.
pub fn aggregate(rows: &[ReportRow]) -> ReportStats {
    // ---
    if rows.is_empty() {
        return ReportStats::default();
    }

    let n = rows.len() as f64;
    let sum_power: f64 = rows.iter().map(|r| r.power_kw).sum();
    let sum_temp: f64 = rows.iter().map(|r| r.temp_c).sum();

    ReportStats {
        avg_power_kw: sum_power / n,
        avg_temp_c: sum_temp / n,
        count: rows.len(),
    }
}

impl ReportStats {
    /// Round for display: power to 2 decimals, temperature to 1.
    pub fn rounded(self) -> Self {
        ReportStats {
            avg_power_kw: round_to(self.avg_power_kw, 2),
            avg_temp_c: round_to(self.avg_temp_c, 1),
            count: self.count,
        }
    }
}

// ---

/// A report row rendered as export cells. Field renames are the sheet headers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportRow {
    #[serde(rename = "Date/Time")]
    pub date_time: String,
    #[serde(rename = "Power (kW)")]
    pub power_kw: String,
    #[serde(rename = "Temperature (°C)")]
    pub temp_c: String,
    #[serde(rename = "Gas (ppm)")]
    pub gas_ppm: String,
    #[serde(rename = "Level (cm)")]
    pub level_cm: String,
}

pub fn export_rows(rows: &[ReportRow]) -> Vec<ExportRow> {
    // ---
    rows.iter()
        .map(|r| ExportRow {
            date_time: r.date_formatted.clone(),
            power_kw: format!("{:.2}", r.power_kw),
            temp_c: format!("{:.2}", r.temp_c),
            gas_ppm: r.gas_ppm.to_string(),
            level_cm: format!("{:.1}", r.level_cm),
        })
        .collect()
}

/// Render the export sheet as CSV with CRLF line endings.
///
/// The header line is written with the first row, so an empty slice yields
/// an empty document.
pub fn to_csv(rows: &[ExportRow]) -> Result<Vec<u8>, csv::Error> {
    // ---
    let mut wtr = csv::WriterBuilder::new()
        .terminator(csv::Terminator::CRLF)
        .from_writer(Vec::new());

    for row in rows {
        wtr.serialize(row)?;
    }

    let bytes = wtr.into_inner().map_err(|e| e.into_error())?;
    tracing::debug!(rows = rows.len(), bytes = bytes.len(), "Rendered CSV export");
    Ok(bytes)
}
