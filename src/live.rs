//! Live system status and trend series for the dashboard.

use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;

use crate::models::{round_to, SensorReading, Settings};

// ---

/// Threshold breaches for the latest reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Alerts {
    pub temperature: bool,
    pub gas: bool,
    pub level: bool,
    pub power: bool,
}

impl Alerts {
    pub fn evaluate(reading: &SensorReading, settings: &Settings) -> Self {
        // ---
        Alerts {
            temperature: reading.temp_c > settings.max_temp,
            gas: reading.gas_ppm >= settings.alert_gas_ppm,
            level: reading.level_cm < settings.min_level || reading.level_cm > settings.max_level,
            power: reading.power_kw() < settings.min_power_kw,
        }
    }

    pub fn any(&self) -> bool {
        self.temperature || self.gas || self.level || self.power
    }
}

/// The stat cards at the top of the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiveStatus {
    // ---
    pub temp_c: f64,
    pub gas_ppm: i64,
    pub voltage_v: f64,
    pub level_cm: f64,
    pub power_kw: f64,
    /// Local time of the reading, or `N/A` when it carries no usable timestamp.
    pub time: String,
    pub is_online: bool,
    pub alerts: Alerts,
}

impl LiveStatus {
    /// Status shown before any reading has arrived.
    pub fn offline() -> Self {
        LiveStatus {
            temp_c: 0.0,
            gas_ppm: 0,
            voltage_v: 0.0,
            level_cm: 0.0,
            power_kw: 0.0,
            time: "N/A".to_string(),
            is_online: false,
            alerts: Alerts::default(),
        }
    }

    /// The device is online when its last reading is at most `window_secs` old.
    pub fn from_reading(
        reading: &SensorReading,
        now: DateTime<Utc>,
        window_secs: u32,
        settings: &Settings,
        offset: &FixedOffset,
    ) -> Self {
        // ---
        let stamped = reading_time(reading);
        let time = stamped
            .map(|ts| ts.with_timezone(offset).format("%I:%M:%S %p").to_string())
            .unwrap_or_else(|| "N/A".to_string());
        let is_online = stamped.is_some()
            && now.timestamp().saturating_sub(reading.timestamp) <= i64::from(window_secs);

        LiveStatus {
            temp_c: round_to(reading.temp_c, 1),
            gas_ppm: reading.gas_ppm,
            voltage_v: round_to(reading.voltage_v, 2),
            level_cm: round_to(reading.level_cm, 1),
            power_kw: reading.power_kw(),
            time,
            is_online,
            alerts: Alerts::evaluate(reading, settings),
        }
    }
}

/// Calendar time of a reading, if its timestamp is usable.
fn reading_time(reading: &SensorReading) -> Option<DateTime<Utc>> {
    if !reading.has_valid_timestamp() {
        return None;
    }
    DateTime::from_timestamp(reading.timestamp, 0)
}

/// One point of the dashboard trend charts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    /// `HH:MM` label on the x axis; empty for an unusable timestamp.
    pub time: String,
    pub temp_c: f64,
    pub gas_ppm: i64,
    pub voltage_v: f64,
    pub power_kw: f64,
    pub level_cm: f64,
}

pub fn trend(readings: &[SensorReading], offset: &FixedOffset) -> Vec<TrendPoint> {
    // ---
    readings
        .iter()
        .map(|r| TrendPoint {
            time: reading_time(r)
                .map(|ts| ts.with_timezone(offset).format("%H:%M").to_string())
                .unwrap_or_default(),
            temp_c: r.temp_c,
            gas_ppm: r.gas_ppm,
            voltage_v: r.voltage_v,
            power_kw: r.power_kw(),
            level_cm: r.level_cm,
        })
        .collect()
}
