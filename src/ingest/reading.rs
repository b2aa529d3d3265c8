//! rtl_433 JSON payload decoding
//!
//! rtl_433 publishes one JSON object per decoded transmission. Only weather
//! sensors are of interest: tyre pressure monitors and anything without a
//! temperature are dropped before the JSON is parsed.

use crate::store::SensorRecord;
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

const LOCAL_TIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Why a payload was dropped without decoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    TyrePressure,
    NoTemperature,
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("missing field '{0}'")]
    MissingField(&'static str),
    #[error("unrecognised time '{0}'")]
    Time(String),
}

/// Payloads worth decoding mention "temperature" and do not mention "TPMS".
pub fn prefilter(payload: &[u8]) -> Option<SkipReason> {
    if contains(payload, b"TPMS") {
        Some(SkipReason::TyrePressure)
    } else if !contains(payload, b"temperature") {
        Some(SkipReason::NoTemperature)
    } else {
        None
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

#[derive(Debug, Deserialize)]
struct RawReading {
    time: Option<Value>,
    model: Option<String>,
    id: Option<Value>,
    channel: Option<Value>,
    #[serde(rename = "temperature_C")]
    temperature_c: Option<f64>,
    #[serde(rename = "temperature_2_C")]
    temperature_2_c: Option<f64>,
    humidity: Option<f64>,
    #[serde(rename = "pressure_hPa")]
    pressure_hpa: Option<f64>,
    #[serde(rename = "Light %")]
    light: Option<f64>,
}

/// One decoded weather reading
#[derive(Debug, Clone, PartialEq)]
pub struct SensorReading {
    /// Time as stored: the receiver's own text when it sent text
    pub time_text: String,
    pub time: DateTime<Utc>,
    /// `model/id/channel`
    pub key: String,
    pub temp1: Option<f64>,
    pub temp2: Option<f64>,
    pub humidity: Option<f64>,
    pub pressure: Option<f64>,
    pub light: Option<f64>,
}

impl SensorReading {
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        let raw: RawReading = serde_json::from_slice(payload)?;

        let model = raw.model.ok_or(DecodeError::MissingField("model"))?;
        let time = raw.time.ok_or(DecodeError::MissingField("time"))?;
        let (time_text, time) = parse_time(&time)?;
        let key = format!(
            "{}/{}/{}",
            model,
            segment(raw.id.as_ref()),
            segment(raw.channel.as_ref())
        );

        Ok(Self {
            time_text,
            time,
            key,
            temp1: raw.temperature_c,
            temp2: raw.temperature_2_c,
            humidity: raw.humidity,
            pressure: raw.pressure_hpa,
            light: raw.light,
        })
    }

    /// Row for storage under `sensor_id`
    pub fn to_record(&self, sensor_id: String) -> SensorRecord {
        SensorRecord {
            date_time: self.time_text.clone(),
            sensor_id,
            temp1: self.temp1,
            temp2: self.temp2,
            rh: self.humidity,
            press: self.pressure,
            light: self.light,
        }
    }
}

/// id and channel arrive as numbers from some decoders and strings from others
fn segment(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

fn parse_time(value: &Value) -> Result<(String, DateTime<Utc>), DecodeError> {
    match value {
        Value::String(text) => parse_time_text(text).map(|t| (text.clone(), t)),
        Value::Number(n) => {
            let time = n
                .as_f64()
                .and_then(from_epoch_seconds)
                .ok_or_else(|| DecodeError::Time(n.to_string()))?;
            let text = time.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string();
            Ok((text, time))
        }
        other => Err(DecodeError::Time(other.to_string())),
    }
}

/// Accepts local `YYYY-MM-DD HH:MM:SS` (or `T` separated, optional
/// fraction), RFC 3339 with an offset, or Unix epoch seconds.
pub fn parse_time_text(text: &str) -> Result<DateTime<Utc>, DecodeError> {
    let text = text.trim();

    for format in LOCAL_TIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Local
                .from_local_datetime(&naive)
                .earliest()
                .map(|t| t.with_timezone(&Utc))
                .ok_or_else(|| DecodeError::Time(text.to_string()));
        }
    }

    if let Ok(time) = DateTime::parse_from_rfc3339(text) {
        return Ok(time.with_timezone(&Utc));
    }

    text.parse::<f64>()
        .ok()
        .and_then(from_epoch_seconds)
        .ok_or_else(|| DecodeError::Time(text.to_string()))
}

fn from_epoch_seconds(seconds: f64) -> Option<DateTime<Utc>> {
    if !seconds.is_finite() {
        return None;
    }
    let millis = (seconds * 1_000.0).round();
    if millis < i64::MIN as f64 || millis > i64::MAX as f64 {
        return None;
    }
    DateTime::from_timestamp_millis(millis as i64)
}
