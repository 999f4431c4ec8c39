use crate::models::sample::RoutePoint;

pub const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TripMetrics {
    pub distance_km: f64,
    pub duration_seconds: i64,
    pub average_speed_kmh: f64,
}

/// Great-circle distance between two points, in kilometers.
pub fn haversine_km(a: &RoutePoint, b: &RoutePoint) -> f64 {
    let dlat = (b.latitude - a.latitude).to_radians();
    let dlon = (b.longitude - a.longitude).to_radians();
    let h = (dlat / 2.0).sin().powi(2)
        + a.latitude.to_radians().cos() * b.latitude.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_KM * c
}

pub fn route_distance_km(route: &[RoutePoint]) -> f64 {
    route.windows(2).map(|pair| haversine_km(&pair[0], &pair[1])).sum()
}

/// Whole seconds from `start_ms` to `end_ms`, floored, never negative.
pub fn duration_seconds(start_ms: i64, end_ms: i64) -> i64 {
    end_ms.saturating_sub(start_ms).max(0).div_euclid(1000)
}

pub fn average_speed_kmh(distance_km: f64, duration_seconds: i64) -> f64 {
    if duration_seconds <= 0 {
        return 0.0;
    }
    distance_km / duration_seconds as f64 * 3.6
}

/// Metrics for `route`, with the duration measured from the first point to
/// `until_ms` (the recorded end of a completed trip), or to the newest point
/// when `until_ms` is `None`.
pub fn compute_metrics(route: &[RoutePoint], until_ms: Option<i64>) -> TripMetrics {
    let (Some(first), Some(last)) = (route.first(), route.last()) else {
        return TripMetrics {
            distance_km: 0.0,
            duration_seconds: 0,
            average_speed_kmh: 0.0,
        };
    };

    let distance_km = route_distance_km(route);
    let duration_seconds = duration_seconds(first.timestamp, until_ms.unwrap_or(last.timestamp));

    TripMetrics {
        distance_km,
        duration_seconds,
        average_speed_kmh: average_speed_kmh(distance_km, duration_seconds),
    }
}
