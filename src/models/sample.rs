use serde::{Deserialize, Serialize};

/// One positioning reading. `accuracy` is the radius of uncertainty in meters,
/// `timestamp` is milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sample {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: f64,
    pub timestamp: i64,
}

/// Points stored in a trip's route are plain samples.
pub type RoutePoint = Sample;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccuracyGrade {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl Sample {
    pub fn new(latitude: f64, longitude: f64, accuracy: f64, timestamp: i64) -> Self {
        Self {
            latitude,
            longitude,
            accuracy,
            timestamp,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
            && self.accuracy.is_finite()
            && self.accuracy >= 0.0
    }

    pub fn accuracy_grade(&self) -> AccuracyGrade {
        match self.accuracy {
            a if a <= 10.0 => AccuracyGrade::Excellent,
            a if a <= 50.0 => AccuracyGrade::Good,
            a if a <= 100.0 => AccuracyGrade::Fair,
            _ => AccuracyGrade::Poor,
        }
    }

    /// "lat, lon" label used for trip start/end locations.
    pub fn location_label(&self) -> String {
        format!("{:.6}, {:.6}", self.latitude, self.longitude)
    }
}

impl std::fmt::Display for AccuracyGrade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            AccuracyGrade::Excellent => "Excellent",
            AccuracyGrade::Good => "Good",
            AccuracyGrade::Fair => "Fair",
            AccuracyGrade::Poor => "Poor",
        };
        f.write_str(label)
    }
}
