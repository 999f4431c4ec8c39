pub mod distance;
pub mod trip_engine;
