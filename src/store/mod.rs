use async_trait::async_trait;
use thiserror::Error;

use crate::models::trip::Trip;

pub mod sqlite;

pub const CURRENT_TRIP_KEY: &str = "trip_tracker_current_trip";
pub const TRIP_HISTORY_KEY: &str = "trip_tracker_trips";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("stored record `{key}` is corrupt: {source}")]
    Corrupt {
        key: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode trip record: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("storage failure: {0}")]
    Database(#[from] sqlx::Error),
}

/// Durable home of the current-trip slot and the completed-trip history
/// (most recent first). Every write is atomic with respect to reads.
#[async_trait]
pub trait PersistenceStore: Send + Sync {
    async fn load_current(&self) -> Result<Option<Trip>, StoreError>;

    async fn load_history(&self) -> Result<Vec<Trip>, StoreError>;

    async fn save_current(&self, trip: &Trip) -> Result<(), StoreError>;

    /// No-op when the slot is already empty.
    async fn clear_current(&self) -> Result<(), StoreError>;

    async fn prepend_history(&self, trip: &Trip) -> Result<(), StoreError>;

    /// Prepends `trip` to history and clears the current slot as one unit:
    /// after a crash the store holds either the state before or after, never a mix.
    async fn archive(&self, trip: &Trip) -> Result<(), StoreError>;

    /// Returns whether a trip with `trip_id` was removed.
    async fn remove_from_history(&self, trip_id: &str) -> Result<bool, StoreError>;
}
