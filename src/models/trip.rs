use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::sample::{RoutePoint, Sample};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TripStatus {
    Active,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trip {
    pub id: String,
    pub purpose: String,
    pub start_timestamp_ms: i64,
    #[serde(default)]
    pub end_timestamp_ms: Option<i64>,
    pub start_odometer: f64,
    #[serde(default)]
    pub end_odometer: Option<f64>,
    #[serde(default)]
    pub start_location: Option<String>,
    #[serde(default)]
    pub end_location: Option<String>,
    pub route: Vec<RoutePoint>, // chronological, never empty
    pub distance_km: f64,
    pub duration_seconds: i64,
    pub average_speed_kmh: f64,
    pub status: TripStatus,
}

impl Trip {
    /// New active trip seeded with its first route point.
    pub fn begin(purpose: &str, start_odometer: f64, seed: Sample) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            purpose: purpose.to_string(),
            start_timestamp_ms: seed.timestamp,
            end_timestamp_ms: None,
            start_odometer,
            end_odometer: None,
            start_location: Some(seed.location_label()),
            end_location: None,
            route: vec![seed],
            distance_km: 0.0,
            duration_seconds: 0,
            average_speed_kmh: 0.0,
            status: TripStatus::Active,
        }
    }

    pub fn last_point(&self) -> Option<&RoutePoint> {
        self.route.last()
    }

    /// Odometer delta, when the trip has been closed with a reading.
    pub fn odometer_distance(&self) -> Option<f64> {
        self.end_odometer.map(|end| end - self.start_odometer)
    }
}
