use anyhow::Result;
use dotenvy::dotenv;
use serde::Deserialize;
use std::env;
use std::time::Duration;

use crate::position::PositionOptions;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub log_level: String,
    pub position_feed: String,
    pub feed_poll_interval_ms: u64,
    pub watch_timeout_ms: u64,
    pub watch_max_age_ms: u64,
    pub one_shot_timeout_ms: u64,
    pub one_shot_max_age_ms: u64,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        dotenv().ok();

        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://trip_tracker.db".to_string());
        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let position_feed =
            env::var("POSITION_FEED").unwrap_or_else(|_| "positions.jsonl".to_string());

        Ok(Self {
            database_url,
            log_level,
            position_feed,
            feed_poll_interval_ms: env_u64("FEED_POLL_INTERVAL_MS", 1000),
            watch_timeout_ms: env_u64("WATCH_TIMEOUT_MS", millis(PositionOptions::CONTINUOUS.timeout)),
            watch_max_age_ms: env_u64("WATCH_MAX_AGE_MS", millis(PositionOptions::CONTINUOUS.maximum_age)),
            one_shot_timeout_ms: env_u64("ONE_SHOT_TIMEOUT_MS", millis(PositionOptions::ONE_SHOT.timeout)),
            one_shot_max_age_ms: env_u64("ONE_SHOT_MAX_AGE_MS", millis(PositionOptions::ONE_SHOT.maximum_age)),
        })
    }

    pub fn continuous_options(&self) -> PositionOptions {
        PositionOptions {
            enable_high_accuracy: true,
            timeout: Duration::from_millis(self.watch_timeout_ms),
            maximum_age: Duration::from_millis(self.watch_max_age_ms),
        }
    }

    pub fn one_shot_options(&self) -> PositionOptions {
        PositionOptions {
            enable_high_accuracy: true,
            timeout: Duration::from_millis(self.one_shot_timeout_ms),
            maximum_age: Duration::from_millis(self.one_shot_max_age_ms),
        }
    }
}

fn millis(d: Duration) -> u64 {
    d.as_millis() as u64
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
