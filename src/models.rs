//! Data models for the agrowaste ledger, sensor telemetry and calibration settings.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

// ---

/// Operator recorded on every ledger write.
pub const LEDGER_USER: &str = "Admin";

/// Direction of an inventory movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    Add,
    Consume,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Add => "Add",
            Action::Consume => "Consume",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Add" => Ok(Action::Add),
            "Consume" => Ok(Action::Consume),
            other => Err(format!("unknown action '{}'", other)),
        }
    }
}

/// One inventory movement as stored in the ledger.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionRecord {
    // ---
    pub id: Uuid,
    pub action: Action,
    #[serde(rename = "type")]
    pub material_type: String,
    pub quantity: Decimal,
    /// Server-assigned; `None` while the write is still pending.
    pub timestamp: Option<DateTime<Utc>>,
    pub user: String,
}

/// Row shape of the `agrowaste_transactions` table.
#[derive(Debug, sqlx::FromRow)]
pub struct TransactionRow {
    // ---
    pub id: Uuid,
    pub action: String,
    pub material_type: String,
    pub quantity: Decimal,
    pub created_at: Option<DateTime<Utc>>,
    pub created_by: String,
}

impl TryFrom<TransactionRow> for TransactionRecord {
    type Error = String;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        // ---
        Ok(TransactionRecord {
            id: row.id,
            action: row.action.parse()?,
            material_type: row.material_type,
            quantity: row.quantity,
            timestamp: row.created_at,
            user: row.created_by,
        })
    }
}

/// Transaction form as submitted by the dashboard.
///
/// `quantity` is accepted either as a JSON number or as the raw text of the
/// form field; [`crate::ledger::NewTransaction::parse`] validates it.
#[derive(Debug, Clone, Deserialize)]
pub struct TransactionForm {
    // ---
    pub action: Action,
    #[serde(rename = "type")]
    pub material_type: String,
    pub quantity: Value,
}

// ---

/// Raw sensor record as delivered by the telemetry backend.
///
/// Every field is optional and may arrive as a number or a numeric string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSensorReading {
    // ---
    #[serde(default)]
    pub temp_c: Option<Value>,
    #[serde(default)]
    pub gas_ppm: Option<Value>,
    #[serde(default)]
    pub voltage_v: Option<Value>,
    #[serde(default)]
    pub level_cm: Option<Value>,
    #[serde(default)]
    pub timestamp: Option<Value>,
}

/// Sensor reading with all fields normalized.
///
/// Missing or unparseable values become `0`; an unusable timestamp becomes `0`
/// and therefore falls below [`TIMESTAMP_FLOOR`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct SensorReading {
    // ---
    pub temp_c: f64,
    pub gas_ppm: i64,
    pub voltage_v: f64,
    pub level_cm: f64,
    /// Seconds since the Unix epoch.
    pub timestamp: i64,
}

/// Timestamps below this value (Sep 2001) are treated as missing or corrupt.
pub const TIMESTAMP_FLOOR: i64 = 1_000_000_000;

impl SensorReading {
    pub fn has_valid_timestamp(&self) -> bool {
        self.timestamp >= TIMESTAMP_FLOOR
    }

    /// Generated power in kilowatts, rounded to two decimals.
    pub fn power_kw(&self) -> f64 {
        round_to(self.voltage_v / 1000.0, 2)
    }
}

impl RawSensorReading {
    // ---
    pub fn to_normalized(&self) -> SensorReading {
        // ---
        SensorReading {
            temp_c: lenient_f64(self.temp_c.as_ref()),
            gas_ppm: lenient_f64(self.gas_ppm.as_ref()).trunc() as i64,
            voltage_v: lenient_f64(self.voltage_v.as_ref()),
            level_cm: lenient_f64(self.level_cm.as_ref()),
            timestamp: lenient_f64(self.timestamp.as_ref()).trunc() as i64,
        }
    }
}

/// Read a JSON number or numeric string, defaulting to `0.0`.
fn lenient_f64(value: Option<&Value>) -> f64 {
    // ---
    let parsed = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite()).unwrap_or(0.0)
}

/// Round half away from zero to `decimals` places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

// ---

/// Calibration thresholds used for dashboard alerts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Settings {
    // ---
    pub max_temp: f64,
    pub min_level: f64,
    pub max_level: f64,
    pub min_power_kw: f64,
    pub alert_gas_ppm: i64,
    pub system_mode: String,
    pub notifications_enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            max_temp: 40.0,
            min_level: 40.0,
            max_level: 90.0,
            min_power_kw: 0.5,
            alert_gas_ppm: 800,
            system_mode: "active".to_string(),
            notifications_enabled: true,
        }
    }
}

impl Settings {
    /// Reject threshold combinations that can never be satisfied.
    pub fn validate(&self) -> Result<(), String> {
        // ---
        let numbers = [self.max_temp, self.min_level, self.max_level, self.min_power_kw];
        if numbers.iter().any(|v| !v.is_finite()) {
            return Err("thresholds must be finite numbers".into());
        }
        if self.min_level > self.max_level {
            return Err(format!(
                "min_level ({}) must not exceed max_level ({})",
                self.min_level, self.max_level
            ));
        }
        if self.alert_gas_ppm < 0 || self.min_power_kw < 0.0 {
            return Err("gas and power thresholds must not be negative".into());
        }
        if self.system_mode.trim().is_empty() {
            return Err("system_mode is required".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use serde_json::json;

    fn raw(value: Value) -> RawSensorReading {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_missing_fields_default_to_zero() {
        // ---
        let reading = raw(json!({})).to_normalized();
        assert_eq!(reading, SensorReading::default());
        assert!(!reading.has_valid_timestamp());
    }

    #[test]
    fn test_numeric_strings_are_accepted() {
        // ---
        let reading = raw(json!({
            "temp_c": "36.75",
            "gas_ppm": "412.9",
            "voltage_v": 220,
            "level_cm": " 55.5 ",
            "timestamp": "1742928300"
        }))
        .to_normalized();

        assert_eq!(reading.temp_c, 36.75);
        assert_eq!(reading.gas_ppm, 412);
        assert_eq!(reading.voltage_v, 220.0);
        assert_eq!(reading.level_cm, 55.5);
        assert_eq!(reading.timestamp, 1_742_928_300);
        assert!(reading.has_valid_timestamp());
    }

    #[test]
    fn test_garbage_values_degrade_to_zero() {
        // ---
        let reading = raw(json!({
            "temp_c": "hot",
            "gas_ppm": null,
            "voltage_v": [1, 2],
            "timestamp": "soon"
        }))
        .to_normalized();

        assert_eq!(reading.temp_c, 0.0);
        assert_eq!(reading.gas_ppm, 0);
        assert_eq!(reading.voltage_v, 0.0);
        assert_eq!(reading.timestamp, 0);
    }

    #[test]
    fn test_power_is_voltage_over_thousand() {
        // ---
        let reading = SensorReading {
            voltage_v: 1234.0,
            ..SensorReading::default()
        };
        assert_eq!(reading.power_kw(), 1.23);

        let reading = SensorReading {
            voltage_v: 1236.0,
            ..SensorReading::default()
        };
        assert_eq!(reading.power_kw(), 1.24);
    }

    #[test]
    fn test_timestamp_floor_boundary() {
        // ---
        let below = SensorReading {
            timestamp: TIMESTAMP_FLOOR - 1,
            ..SensorReading::default()
        };
        let at = SensorReading {
            timestamp: TIMESTAMP_FLOOR,
            ..SensorReading::default()
        };
        assert!(!below.has_valid_timestamp());
        assert!(at.has_valid_timestamp());
    }

    #[test]
    fn test_action_parsing() {
        // ---
        assert_eq!("Add".parse::<Action>(), Ok(Action::Add));
        assert_eq!("Consume".parse::<Action>(), Ok(Action::Consume));
        assert!("add".parse::<Action>().is_err());
        assert_eq!(Action::Consume.to_string(), "Consume");
    }

    #[test]
    fn test_transaction_form_uses_type_field() {
        // ---
        let form: TransactionForm = serde_json::from_value(json!({
            "action": "Consume",
            "type": "Corn",
            "quantity": "12.5"
        }))
        .unwrap();
        assert_eq!(form.action, Action::Consume);
        assert_eq!(form.material_type, "Corn");
        assert_eq!(form.quantity, json!("12.5"));
    }

    #[test]
    fn test_settings_validation() {
        // ---
        assert!(Settings::default().validate().is_ok());

        let inverted = Settings {
            min_level: 95.0,
            ..Settings::default()
        };
        assert!(inverted.validate().is_err());

        let negative_gas = Settings {
            alert_gas_ppm: -1,
            ..Settings::default()
        };
        assert!(negative_gas.validate().is_err());

        let blank_mode = Settings {
            system_mode: "  ".into(),
            ..Settings::default()
        };
        assert!(blank_mode.validate().is_err());
    }
}
