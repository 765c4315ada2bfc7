//! Client for the realtime telemetry database.
//!
//! The device writes its latest sample to `realtime_data/latest` and appends
//! every sample under `sensor_logs/<push-id>`. Both are read through the
//! database's REST interface (`<path>.json`).

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::debug;

use crate::models::{RawSensorReading, SensorReading};

// ---

const LATEST_PATH: &str = "realtime_data/latest";
const LOGS_PATH: &str = "sensor_logs";

#[derive(Debug, Clone)]
pub struct TelemetryClient {
    client: reqwest::Client,
    base_url: String,
    auth: Option<String>,
}

impl TelemetryClient {
    pub fn new(base_url: impl Into<String>, auth: Option<String>) -> Self {
        TelemetryClient {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            auth,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}.json", self.base_url, path)
    }

    fn auth_query(&self) -> Vec<(&'static str, String)> {
        self.auth
            .iter()
            .map(|token| ("auth", token.clone()))
            .collect()
    }

    /// The most recent sample, or `None` if the device never reported.
    pub async fn latest(&self) -> Result<Option<SensorReading>, reqwest::Error> {
        // ---
        let url = self.url(LATEST_PATH);
        debug!("Fetching latest reading from: {}", url);

        let body: Value = self
            .client
            .get(&url)
            .query(&self.auth_query())
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        match serde_json::from_value::<Option<RawSensorReading>>(body) {
            Ok(raw) => Ok(raw.map(|r| r.to_normalized())),
            Err(e) => {
                debug!("Latest reading is not an object: {}", e);
                Ok(None)
            }
        }
    }

    /// The last `limit` sensor logs in push order, keyed by log id.
    pub async fn history(&self, limit: u32) -> Result<Vec<(String, SensorReading)>, reqwest::Error> {
        // ---
        let url = self.url(LOGS_PATH);
        let mut query = self.auth_query();
        query.push(("orderBy", "\"$key\"".to_string()));
        query.push(("limitToLast", limit.to_string()));

        debug!("Fetching last {} sensor logs from: {}", limit, url);

        let body: Value = self
            .client
            .get(&url)
            .query(&query)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let logs = parse_logs(body);
        debug!("Fetched {} sensor logs", logs.len());
        Ok(logs)
    }

    /// Remove one sensor log.
    pub async fn delete_log(&self, id: &str) -> Result<(), reqwest::Error> {
        // ---
        self.delete_path(&format!("{}/{}", LOGS_PATH, id)).await
    }

    /// Remove the whole sensor history. `realtime_data` is left alone.
    pub async fn clear_logs(&self) -> Result<(), reqwest::Error> {
        // ---
        self.delete_path(LOGS_PATH).await
    }

    async fn delete_path(&self, path: &str) -> Result<(), reqwest::Error> {
        // ---
        let url = self.url(path);
        debug!("Deleting: {}", url);

        self.client
            .delete(&url)
            .query(&self.auth_query())
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

/// Turn the `sensor_logs` object into `(id, reading)` pairs.
///
/// Push ids sort chronologically, so key order is arrival order. Entries that
/// are not objects are skipped.
fn parse_logs(body: Value) -> Vec<(String, SensorReading)> {
    // ---
    let map: BTreeMap<String, Value> = match body {
        Value::Object(map) => map.into_iter().collect(),
        Value::Null => return Vec::new(),
        other => {
            debug!("Sensor logs response is not an object: {}", other);
            return Vec::new();
        }
    };

    map.into_iter()
        .filter_map(|(id, item)| match serde_json::from_value::<RawSensorReading>(item) {
            Ok(raw) => Some((id, raw.to_normalized())),
            Err(e) => {
                debug!("Failed to parse sensor log {}: {}", id, e);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_logs_orders_by_key_and_skips_garbage() {
        // ---
        let body = json!({
            "-Nb2": { "temp_c": 31.0, "timestamp": 1742928360 },
            "-Na9": { "temp_c": "30.5", "voltage_v": 1200, "timestamp": 1742928300 },
            "-Nc0": "not a reading",
            "-Nd4": { "gas_ppm": 512 }
        });

        let logs = parse_logs(body);
        let ids: Vec<&str> = logs.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["-Na9", "-Nb2", "-Nd4"]);

        assert_eq!(logs[0].1.temp_c, 30.5);
        assert_eq!(logs[0].1.power_kw(), 1.2);
        assert_eq!(logs[2].1.gas_ppm, 512);
        assert!(!logs[2].1.has_valid_timestamp());
    }

    #[test]
    fn test_parse_logs_handles_empty_responses() {
        // ---
        assert!(parse_logs(Value::Null).is_empty());
        assert!(parse_logs(json!([1, 2, 3])).is_empty());
    }

    #[test]
    fn test_urls_and_auth() {
        // ---
        let client = TelemetryClient::new("https://ecovolt.example.com", Some("tok".into()));
        assert_eq!(
            client.url(LATEST_PATH),
            "https://ecovolt.example.com/realtime_data/latest.json"
        );
        assert_eq!(client.auth_query(), vec![("auth", "tok".to_string())]);

        // Clearing history targets the logs collection, never realtime data.
        assert_eq!(
            client.url(LOGS_PATH),
            "https://ecovolt.example.com/sensor_logs.json"
        );
        assert_eq!(
            client.url(&format!("{}/{}", LOGS_PATH, "-Na9")),
            "https://ecovolt.example.com/sensor_logs/-Na9.json"
        );

        let anonymous = TelemetryClient::new("https://ecovolt.example.com", None);
        assert!(anonymous.auth_query().is_empty());
    }
}
