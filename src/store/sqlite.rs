use async_trait::async_trait;
use sqlx::SqliteConnection;
use tracing::{debug, warn};

use crate::db::{queries, DbPool};
use crate::models::trip::Trip;
use crate::store::{PersistenceStore, StoreError, CURRENT_TRIP_KEY, TRIP_HISTORY_KEY};

/// Key-value store over a single SQLite table. Records are JSON documents.
#[derive(Clone)]
pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    #[cfg(test)]
    pub async fn in_memory() -> Self {
        let pool = crate::db::init_memory_pool()
            .await
            .expect("in-memory sqlite pool");
        Self::new(pool)
    }

    #[cfg(test)]
    pub async fn put_raw(&self, key: &str, value: &str) {
        let mut conn = self.pool.acquire().await.expect("connection");
        put_value(&mut conn, key, value).await.expect("raw write");
    }
}

async fn get_value(conn: &mut SqliteConnection, key: &str) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>(queries::SELECT_VALUE)
        .bind(key)
        .fetch_optional(&mut *conn)
        .await
}

async fn put_value(conn: &mut SqliteConnection, key: &str, value: &str) -> Result<(), sqlx::Error> {
    sqlx::query(queries::UPSERT_VALUE)
        .bind(key)
        .bind(value)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

async fn delete_value(conn: &mut SqliteConnection, key: &str) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(queries::DELETE_VALUE)
        .bind(key)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}

fn decode_history(raw: Option<String>) -> Result<Vec<Trip>, StoreError> {
    match raw {
        None => Ok(Vec::new()),
        Some(json) => serde_json::from_str(&json).map_err(|source| StoreError::Corrupt {
            key: TRIP_HISTORY_KEY,
            source,
        }),
    }
}

/// History as seen by a write: a corrupt record is replaced rather than
/// blocking every later archive.
fn history_for_update(raw: Option<String>) -> Vec<Trip> {
    decode_history(raw).unwrap_or_else(|e| {
        warn!("Overwriting unreadable trip history: {}", e);
        Vec::new()
    })
}

fn encode<T: serde::Serialize + ?Sized>(value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(StoreError::Encode)
}

#[async_trait]
impl PersistenceStore for SqliteStore {
    async fn load_current(&self) -> Result<Option<Trip>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        match get_value(&mut conn, CURRENT_TRIP_KEY).await? {
            None => Ok(None),
            Some(json) => serde_json::from_str(&json)
                .map(Some)
                .map_err(|source| StoreError::Corrupt {
                    key: CURRENT_TRIP_KEY,
                    source,
                }),
        }
    }

    async fn load_history(&self) -> Result<Vec<Trip>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        decode_history(get_value(&mut conn, TRIP_HISTORY_KEY).await?)
    }

    async fn save_current(&self, trip: &Trip) -> Result<(), StoreError> {
        let json = encode(trip)?;
        let mut conn = self.pool.acquire().await?;
        put_value(&mut conn, CURRENT_TRIP_KEY, &json).await?;
        debug!("Saved current trip {} ({} points)", trip.id, trip.route.len());
        Ok(())
    }

    async fn clear_current(&self) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await?;
        delete_value(&mut conn, CURRENT_TRIP_KEY).await?;
        Ok(())
    }

    async fn prepend_history(&self, trip: &Trip) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        let mut history = history_for_update(get_value(&mut tx, TRIP_HISTORY_KEY).await?);
        history.insert(0, trip.clone());
        put_value(&mut tx, TRIP_HISTORY_KEY, &encode(&history)?).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn archive(&self, trip: &Trip) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        let mut history = history_for_update(get_value(&mut tx, TRIP_HISTORY_KEY).await?);
        history.retain(|t| t.id != trip.id);
        history.insert(0, trip.clone());
        put_value(&mut tx, TRIP_HISTORY_KEY, &encode(&history)?).await?;
        delete_value(&mut tx, CURRENT_TRIP_KEY).await?;

        // Dropping the transaction without commit rolls both writes back.
        tx.commit().await?;
        debug!("Archived trip {} ({} trips in history)", trip.id, history.len());
        Ok(())
    }

    async fn remove_from_history(&self, trip_id: &str) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;

        let mut history = decode_history(get_value(&mut tx, TRIP_HISTORY_KEY).await?)?;
        let before = history.len();
        history.retain(|t| t.id != trip_id);
        if history.len() == before {
            return Ok(false);
        }
        put_value(&mut tx, TRIP_HISTORY_KEY, &encode(&history)?).await?;

        tx.commit().await?;
        Ok(true)
    }
}
