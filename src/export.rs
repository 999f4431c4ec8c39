use chrono::{NaiveDate, TimeZone};
use std::fmt;

use crate::models::trip::Trip;

pub const CSV_HEADER: &str = "Date,Purpose,Start Odometer,End Odometer,Distance (km),Duration (hours),Average Speed (km/h),Start Location,End Location";

/// Renders trips as CSV, one row per trip in the given order. Dates are the
/// trip start date in `tz`.
pub fn to_csv<Tz: TimeZone>(trips: &[Trip], tz: &Tz) -> String
where
    Tz::Offset: fmt::Display,
{
    let mut out = String::from(CSV_HEADER);
    out.push('\n');

    let rows: Vec<String> = trips.iter().map(|trip| csv_row(trip, tz)).collect();
    out.push_str(&rows.join("\n"));
    out
}

fn csv_row<Tz: TimeZone>(trip: &Trip, tz: &Tz) -> String
where
    Tz::Offset: fmt::Display,
{
    let date = tz
        .timestamp_millis_opt(trip.start_timestamp_ms)
        .single()
        .map(|dt| dt.format("%-m/%-d/%Y").to_string())
        .unwrap_or_default();
    let end_odometer = match trip.end_odometer {
        Some(v) if v != 0.0 => v.to_string(),
        _ => String::new(),
    };

    format!(
        "{},{},{},{},{:.2},{:.2},{:.1},{},{}",
        date,
        quoted(&trip.purpose),
        trip.start_odometer,
        end_odometer,
        trip.distance_km,
        trip.duration_seconds as f64 / 3600.0,
        trip.average_speed_kmh,
        quoted(trip.start_location.as_deref().unwrap_or("")),
        quoted(trip.end_location.as_deref().unwrap_or("")),
    )
}

fn quoted(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

pub fn export_file_name(today: NaiveDate) -> String {
    format!("business_trips_{}.csv", today.format("%Y-%m-%d"))
}
