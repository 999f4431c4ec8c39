use serde::{Deserialize, Deserializer};

use crate::error::LocationError;
use crate::models::sample::Sample;

/// Latest instant representable as a millisecond epoch timestamp in the feed.
const MAX_TIMESTAMP_MS: f64 = 8.64e15;

/// One line of the position feed. A line carries either a fix or an error code.
#[derive(Debug, Deserialize)]
pub struct FeedRecord {
    #[serde(default, deserialize_with = "parse_f64_option")]
    pub latitude: Option<f64>,
    #[serde(default, deserialize_with = "parse_f64_option")]
    pub longitude: Option<f64>,
    #[serde(default, deserialize_with = "parse_f64_option")]
    pub accuracy: Option<f64>,
    #[serde(default, deserialize_with = "parse_f64_option")]
    pub timestamp: Option<f64>,
    pub error: Option<String>,
}

impl FeedRecord {
    /// Converts the record into a fix, an error report, or `None` when the line
    /// is missing required fields or carries an unusable timestamp.
    pub fn into_event(self) -> Option<Result<Sample, LocationError>> {
        if let Some(code) = self.error.as_deref() {
            return Some(Err(LocationError::from_code(code)));
        }

        let latitude = self.latitude?;
        let longitude = self.longitude?;
        let timestamp = self.timestamp?;
        if !timestamp.is_finite() || !(0.0..=MAX_TIMESTAMP_MS).contains(&timestamp) {
            return None;
        }
        // Missing accuracy means the daemon could not estimate it.
        let accuracy = self.accuracy.unwrap_or(f64::MAX);

        Some(Ok(Sample::new(latitude, longitude, accuracy, timestamp as i64)))
    }
}

fn parse_f64_option<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrFloat {
        String(String),
        Float(f64),
    }

    let v: Option<StringOrFloat> = Option::deserialize(deserializer)?;
    match v {
        Some(StringOrFloat::Float(f)) => Ok(Some(f)),
        Some(StringOrFloat::String(s)) => {
            if s.trim().is_empty() {
                Ok(None)
            } else {
                s.trim().parse::<f64>().map(Some).map_err(serde::de::Error::custom)
            }
        }
        None => Ok(None),
    }
}
