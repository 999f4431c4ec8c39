use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{LocationError, TripError};
use crate::models::sample::Sample;
use crate::models::trip::{Trip, TripStatus};
use crate::position::{PositionOptions, PositionSource};
use crate::processor::distance::{compute_metrics, TripMetrics};
use crate::store::{PersistenceStore, StoreError, CURRENT_TRIP_KEY, TRIP_HISTORY_KEY};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerState {
    Idle,
    Active,
}

/// What happened to a delivered position event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleOutcome {
    /// Appended to the route and persisted.
    Applied,
    /// Not newer than the last route point.
    Stale,
    /// Coordinates or accuracy out of range.
    Rejected,
    /// No trip is active.
    Idle,
    /// The subscription reported an error instead of a fix.
    SourceError(LocationError),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SampleCounters {
    pub accepted: u64,
    pub stale: u64,
    pub rejected: u64,
}

/// Owns the trip lifecycle. All mutations go through `&mut self`, so the
/// owner serializes them; each transition is persisted before it returns.
pub struct TripEngine {
    store: Arc<dyn PersistenceStore>,
    source: PositionSource,
    one_shot: PositionOptions,
    current: Option<Trip>,
    history: Vec<Trip>,
    counters: SampleCounters,
    diagnostics: Vec<String>,
}

fn apply_metrics(trip: &mut Trip, metrics: TripMetrics) {
    trip.distance_km = metrics.distance_km;
    trip.duration_seconds = metrics.duration_seconds;
    trip.average_speed_kmh = metrics.average_speed_kmh;
}

impl TripEngine {
    /// Loads persisted state. A persisted current trip is resumed as-is and
    /// continuous positioning restarts. Corrupt records are logged and
    /// treated as absent.
    pub async fn init(
        store: Arc<dyn PersistenceStore>,
        source: PositionSource,
        one_shot: PositionOptions,
    ) -> Result<Self, TripError> {
        let mut diagnostics = Vec::new();

        let history = match store.load_history().await {
            Ok(history) => history,
            Err(e @ StoreError::Corrupt { .. }) => {
                warn!("Failed to load trip history: {}", e);
                diagnostics.push(format!("{}: {}", TRIP_HISTORY_KEY, e));
                Vec::new()
            }
            Err(e) => return Err(e.into()),
        };

        let current = match store.load_current().await {
            Ok(current) => current,
            Err(e @ StoreError::Corrupt { .. }) => {
                warn!("Failed to load current trip: {}", e);
                diagnostics.push(format!("{}: {}", CURRENT_TRIP_KEY, e));
                store.clear_current().await?;
                None
            }
            Err(e) => return Err(e.into()),
        };

        let mut engine = Self {
            store,
            source,
            one_shot,
            current,
            history,
            counters: SampleCounters::default(),
            diagnostics,
        };

        if let Some(trip) = &engine.current {
            info!(
                "Resuming trip {} ({}, {} points, {:.2} km)",
                trip.id,
                trip.purpose,
                trip.route.len(),
                trip.distance_km
            );
            engine.source.start_continuous();
        }
        info!("Loaded {} completed trips", engine.history.len());

        Ok(engine)
    }

    pub fn state(&self) -> TrackerState {
        if self.current.is_some() {
            TrackerState::Active
        } else {
            TrackerState::Idle
        }
    }

    pub fn current_trip(&self) -> Option<&Trip> {
        self.current.as_ref()
    }

    pub fn history(&self) -> &[Trip] {
        &self.history
    }

    pub fn counters(&self) -> SampleCounters {
        self.counters
    }

    pub fn diagnostics(&self) -> &[String] {
        &self.diagnostics
    }

    pub fn position(&self) -> &PositionSource {
        &self.source
    }

    pub async fn start_trip(&mut self, purpose: &str, start_odometer: f64) -> Result<Trip, TripError> {
        if self.current.is_some() {
            return Err(TripError::AlreadyActive);
        }
        if !start_odometer.is_finite() {
            return Err(TripError::Validation(format!(
                "start odometer must be a finite number, got {}",
                start_odometer
            )));
        }

        let seed = self
            .source
            .get_one_shot(self.one_shot.timeout, self.one_shot.maximum_age)
            .await?;

        let trip = Trip::begin(purpose, start_odometer, seed);
        self.store.save_current(&trip).await?;
        self.current = Some(trip.clone());
        self.source.start_continuous();

        info!(
            "Started trip {} ({}) at {} odometer {}",
            trip.id,
            trip.purpose,
            seed.location_label(),
            start_odometer
        );
        Ok(trip)
    }

    /// Applies one fix to the active trip: append, recompute, persist.
    pub async fn on_sample(&mut self, sample: Sample) -> Result<SampleOutcome, TripError> {
        let Some(trip) = self.current.as_ref() else {
            return Ok(SampleOutcome::Idle);
        };

        if !sample.is_valid() {
            self.counters.rejected += 1;
            debug!("Rejected invalid sample {:?}", sample);
            return Ok(SampleOutcome::Rejected);
        }

        if let Some(last) = trip.last_point() {
            if sample.timestamp <= last.timestamp {
                self.counters.stale += 1;
                debug!(
                    "Dropped out-of-order sample at {} (last point {}), {} dropped so far",
                    sample.timestamp, last.timestamp, self.counters.stale
                );
                return Ok(SampleOutcome::Stale);
            }
        }

        let mut updated = trip.clone();
        updated.route.push(sample);
        let metrics = compute_metrics(&updated.route, None);
        apply_metrics(&mut updated, metrics);

        // In-memory state only advances once the write went through.
        self.store.save_current(&updated).await?;
        debug!(
            "Trip {}: {} points, {:.3} km, {} s",
            updated.id,
            updated.route.len(),
            updated.distance_km,
            updated.duration_seconds
        );
        self.current = Some(updated);
        self.counters.accepted += 1;

        Ok(SampleOutcome::Applied)
    }

    /// Waits for the next continuous-positioning event and applies it before
    /// returning. `None` once no subscription is open.
    pub async fn process_next(&mut self) -> Option<Result<SampleOutcome, TripError>> {
        match self.source.next_event().await? {
            Ok(sample) => Some(self.on_sample(sample).await),
            Err(e) => Some(Ok(SampleOutcome::SourceError(e))),
        }
    }

    pub async fn end_trip(&mut self, end_odometer: f64) -> Result<Trip, TripError> {
        let Some(trip) = self.current.as_ref() else {
            return Err(TripError::NoActiveTrip);
        };

        if !end_odometer.is_finite() || end_odometer < trip.start_odometer {
            return Err(TripError::Validation(format!(
                "end odometer {} must be a number no lower than the start odometer {}",
                end_odometer, trip.start_odometer
            )));
        }

        let anchor = self
            .source
            .get_one_shot(self.one_shot.timeout, self.one_shot.maximum_age)
            .await?;

        let completed = complete_trip(trip, anchor, end_odometer);

        self.store.archive(&completed).await?;
        self.history.insert(0, completed.clone());
        self.current = None;
        self.source.stop_continuous();

        info!(
            "Ended trip {}: {:.2} km in {} s ({:.1} km/h), odometer {} -> {}",
            completed.id,
            completed.distance_km,
            completed.duration_seconds,
            completed.average_speed_kmh,
            completed.start_odometer,
            end_odometer
        );
        Ok(completed)
    }

    /// Removes a completed trip from history.
    pub async fn delete_trip(&mut self, trip_id: &str) -> Result<bool, TripError> {
        let removed = self.store.remove_from_history(trip_id).await?;
        if removed {
            self.history.retain(|t| t.id != trip_id);
            info!("Deleted trip {}", trip_id);
        }
        Ok(removed)
    }

    /// Stops positioning without touching trip state. The persisted trip
    /// resumes on the next `init`.
    pub fn suspend(&mut self) {
        self.source.stop_continuous();
    }
}

/// Frozen copy of `trip` closed at `anchor`. The anchor is only appended when
/// it is newer than the route, since a cached one-shot fix may predate it.
fn complete_trip(trip: &Trip, anchor: Sample, end_odometer: f64) -> Trip {
    let mut completed = trip.clone();
    let last_timestamp = completed
        .last_point()
        .map(|p| p.timestamp)
        .unwrap_or(completed.start_timestamp_ms);

    if anchor.timestamp > last_timestamp {
        completed.route.push(anchor);
    }
    let end_timestamp = anchor.timestamp.max(last_timestamp);

    completed.end_timestamp_ms = Some(end_timestamp);
    completed.end_odometer = Some(end_odometer);
    completed.end_location = Some(anchor.location_label());
    completed.status = TripStatus::Completed;
    let metrics = compute_metrics(&completed.route, Some(end_timestamp));
    apply_metrics(&mut completed, metrics);
    completed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::mock::ScriptedProvider;
    use crate::store::sqlite::SqliteStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn fix(lat: f64, lon: f64, t: i64) -> Sample {
        Sample::new(lat, lon, 5.0, t)
    }

    /// SQLite store whose writes start failing once `fail` is set.
    struct FlakyStore {
        inner: SqliteStore,
        fail: AtomicBool,
    }

    impl FlakyStore {
        async fn new() -> Arc<Self> {
            Arc::new(Self {
                inner: SqliteStore::in_memory().await,
                fail: AtomicBool::new(false),
            })
        }

        fn fail_writes(&self) {
            self.fail.store(true, Ordering::SeqCst);
        }

        fn check(&self) -> Result<(), StoreError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(StoreError::Database(sqlx::Error::PoolClosed));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl PersistenceStore for FlakyStore {
        async fn load_current(&self) -> Result<Option<Trip>, StoreError> {
            self.inner.load_current().await
        }

        async fn load_history(&self) -> Result<Vec<Trip>, StoreError> {
            self.inner.load_history().await
        }

        async fn save_current(&self, trip: &Trip) -> Result<(), StoreError> {
            self.check()?;
            self.inner.save_current(trip).await
        }

        async fn clear_current(&self) -> Result<(), StoreError> {
            self.check()?;
            self.inner.clear_current().await
        }

        async fn prepend_history(&self, trip: &Trip) -> Result<(), StoreError> {
            self.check()?;
            self.inner.prepend_history(trip).await
        }

        async fn archive(&self, trip: &Trip) -> Result<(), StoreError> {
            self.check()?;
            self.inner.archive(trip).await
        }

        async fn remove_from_history(&self, trip_id: &str) -> Result<bool, StoreError> {
            self.check()?;
            self.inner.remove_from_history(trip_id).await
        }
    }

    async fn flaky_engine() -> (TripEngine, Arc<ScriptedProvider>, Arc<FlakyStore>) {
        let provider = ScriptedProvider::new();
        let store = FlakyStore::new().await;
        let source = PositionSource::new(provider.clone(), PositionOptions::CONTINUOUS);
        let mut engine = TripEngine::init(store.clone(), source, PositionOptions::ONE_SHOT)
            .await
            .unwrap();
        provider.push_one_shot(Ok(fix(0.0, 0.0, 0)));
        engine.start_trip("client visit", 1000.0).await.unwrap();
        (engine, provider, store)
    }

    async fn engine_with(
        provider: &Arc<ScriptedProvider>,
        store: &Arc<SqliteStore>,
    ) -> TripEngine {
        let source = PositionSource::new(provider.clone(), PositionOptions::CONTINUOUS);
        TripEngine::init(store.clone(), source, PositionOptions::ONE_SHOT)
            .await
            .unwrap()
    }

    async fn active_engine() -> (TripEngine, Arc<ScriptedProvider>, Arc<SqliteStore>) {
        let provider = ScriptedProvider::new();
        let store = Arc::new(SqliteStore::in_memory().await);
        let mut engine = engine_with(&provider, &store).await;
        provider.push_one_shot(Ok(fix(0.0, 0.0, 0)));
        engine.start_trip("client visit", 1000.0).await.unwrap();
        (engine, provider, store)
    }

    #[tokio::test]
    async fn test_starts_idle() {
        let provider = ScriptedProvider::new();
        let store = Arc::new(SqliteStore::in_memory().await);
        let engine = engine_with(&provider, &store).await;

        assert_eq!(engine.state(), TrackerState::Idle);
        assert!(engine.current_trip().is_none());
        assert!(engine.history().is_empty());
        assert_eq!(provider.watch_calls(), 0);
    }

    #[tokio::test]
    async fn test_start_trip_seeds_and_persists() {
        let (engine, provider, store) = active_engine().await;

        let trip = engine.current_trip().unwrap();
        assert_eq!(engine.state(), TrackerState::Active);
        assert_eq!(trip.route, vec![fix(0.0, 0.0, 0)]);
        assert_eq!(trip.distance_km, 0.0);
        assert_eq!(trip.duration_seconds, 0);
        assert_eq!(trip.status, TripStatus::Active);
        assert_eq!(store.load_current().await.unwrap().as_ref(), Some(trip));
        assert!(provider.is_watching());
        assert_eq!(provider.last_one_shot_options(), Some(PositionOptions::ONE_SHOT));
    }

    #[tokio::test]
    async fn test_start_trip_location_failure_stays_idle() {
        let provider = ScriptedProvider::new();
        let store = Arc::new(SqliteStore::in_memory().await);
        let mut engine = engine_with(&provider, &store).await;
        provider.push_one_shot(Err(LocationError::PermissionDenied));

        let err = engine.start_trip("client visit", 1000.0).await.unwrap_err();
        assert!(matches!(err, TripError::Location(LocationError::PermissionDenied)));
        assert_eq!(engine.state(), TrackerState::Idle);
        assert!(store.load_current().await.unwrap().is_none());
        assert!(!provider.is_watching());
    }

    #[tokio::test]
    async fn test_start_trip_rejects_non_finite_odometer() {
        let provider = ScriptedProvider::new();
        let store = Arc::new(SqliteStore::in_memory().await);
        let mut engine = engine_with(&provider, &store).await;

        let err = engine.start_trip("x", f64::NAN).await.unwrap_err();
        assert!(matches!(err, TripError::Validation(_)));
        assert_eq!(engine.state(), TrackerState::Idle);
    }

    #[tokio::test]
    async fn test_start_while_active_is_state_error() {
        let (mut engine, provider, _store) = active_engine().await;
        let before = engine.current_trip().cloned();
        provider.push_one_shot(Ok(fix(5.0, 5.0, 10_000)));

        let err = engine.start_trip("second", 1.0).await.unwrap_err();
        assert!(matches!(err, TripError::AlreadyActive));
        assert!(err.is_state_error());
        assert_eq!(engine.current_trip().cloned(), before);
    }

    #[tokio::test]
    async fn test_samples_accumulate_metrics() {
        let (mut engine, _provider, store) = active_engine().await;

        let outcome = engine.on_sample(fix(0.0, 1.0, 3_600_000)).await.unwrap();
        assert_eq!(outcome, SampleOutcome::Applied);

        let trip = engine.current_trip().unwrap();
        assert_eq!(trip.route.len(), 2);
        assert!((trip.distance_km - 111.19).abs() < 0.5);
        assert_eq!(trip.duration_seconds, 3600);
        let expected_speed = trip.distance_km / 3600.0 * 3.6;
        assert!((trip.average_speed_kmh - expected_speed).abs() < 1e-12);
        assert_eq!(store.load_current().await.unwrap().as_ref(), Some(trip));
        assert_eq!(engine.counters().accepted, 1);
    }

    #[tokio::test]
    async fn test_extreme_timestamps_do_not_overflow() {
        let provider = ScriptedProvider::new();
        let store = Arc::new(SqliteStore::in_memory().await);
        let mut engine = engine_with(&provider, &store).await;
        provider.push_one_shot(Ok(fix(0.0, 0.0, i64::MIN / 2)));
        engine.start_trip("client visit", 1000.0).await.unwrap();

        let outcome = engine.on_sample(fix(0.0, 1.0, i64::MAX / 2 + 10)).await.unwrap();
        assert_eq!(outcome, SampleOutcome::Applied);
        let trip = engine.current_trip().unwrap();
        assert_eq!(trip.duration_seconds, i64::MAX / 1000);
        assert!(trip.average_speed_kmh.is_finite());
    }

    #[tokio::test]
    async fn test_failed_sample_write_leaves_trip_unchanged() {
        let (mut engine, _provider, store) = flaky_engine().await;
        engine.on_sample(fix(0.0, 0.01, 60_000)).await.unwrap();
        let before = engine.current_trip().cloned();
        let counters = engine.counters();

        store.fail_writes();
        let err = engine.on_sample(fix(0.0, 0.02, 120_000)).await.unwrap_err();
        assert!(matches!(err, TripError::Persistence(StoreError::Database(_))));
        assert_eq!(engine.current_trip().cloned(), before);
        assert_eq!(engine.counters(), counters);
        assert_eq!(store.load_current().await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_failed_archive_keeps_trip_active() {
        let (mut engine, provider, store) = flaky_engine().await;
        engine.on_sample(fix(0.0, 0.01, 60_000)).await.unwrap();
        let before = engine.current_trip().cloned();

        store.fail_writes();
        provider.push_one_shot(Ok(fix(0.0, 0.02, 120_000)));
        let err = engine.end_trip(1050.0).await.unwrap_err();
        assert!(matches!(err, TripError::Persistence(StoreError::Database(_))));

        assert_eq!(engine.state(), TrackerState::Active);
        assert_eq!(engine.current_trip().cloned(), before);
        assert!(engine.history().is_empty());
        assert!(store.load_history().await.unwrap().is_empty());
        assert_eq!(store.load_current().await.unwrap(), before);
        assert!(provider.is_watching());
    }

    #[tokio::test]
    async fn test_out_of_order_sample_is_dropped() {
        let (mut engine, _provider, _store) = active_engine().await;
        engine.on_sample(fix(0.0, 0.01, 10_000)).await.unwrap();
        let before = engine.current_trip().cloned();

        assert_eq!(
            engine.on_sample(fix(0.0, 0.02, 10_000)).await.unwrap(),
            SampleOutcome::Stale
        );
        assert_eq!(
            engine.on_sample(fix(0.0, 0.03, 5_000)).await.unwrap(),
            SampleOutcome::Stale
        );
        assert_eq!(engine.current_trip().cloned(), before);
        assert_eq!(engine.counters().stale, 2);
    }

    #[tokio::test]
    async fn test_invalid_sample_is_rejected() {
        let (mut engine, _provider, _store) = active_engine().await;
        assert_eq!(
            engine.on_sample(fix(120.0, 0.0, 10_000)).await.unwrap(),
            SampleOutcome::Rejected
        );
        assert_eq!(engine.current_trip().unwrap().route.len(), 1);
        assert_eq!(engine.counters().rejected, 1);
    }

    #[tokio::test]
    async fn test_sample_while_idle_is_noop() {
        let provider = ScriptedProvider::new();
        let store = Arc::new(SqliteStore::in_memory().await);
        let mut engine = engine_with(&provider, &store).await;

        assert_eq!(
            engine.on_sample(fix(1.0, 1.0, 1_000)).await.unwrap(),
            SampleOutcome::Idle
        );
        assert!(store.load_current().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_process_next_applies_subscription_events_in_order() {
        let (mut engine, provider, _store) = active_engine().await;

        assert!(provider.emit(Ok(fix(0.0, 0.01, 1_000))).await);
        assert!(provider.emit(Ok(fix(0.0, 0.02, 500))).await);
        assert!(provider.emit(Err(LocationError::Timeout)).await);
        assert!(provider.emit(Ok(fix(0.0, 0.03, 2_000))).await);

        assert_eq!(engine.process_next().await.unwrap().unwrap(), SampleOutcome::Applied);
        assert_eq!(engine.process_next().await.unwrap().unwrap(), SampleOutcome::Stale);
        assert_eq!(
            engine.process_next().await.unwrap().unwrap(),
            SampleOutcome::SourceError(LocationError::Timeout)
        );
        assert_eq!(engine.process_next().await.unwrap().unwrap(), SampleOutcome::Applied);

        let timestamps: Vec<i64> = engine
            .current_trip()
            .unwrap()
            .route
            .iter()
            .map(|p| p.timestamp)
            .collect();
        assert_eq!(timestamps, vec![0, 1_000, 2_000]);
    }

    #[tokio::test]
    async fn test_full_lifecycle() {
        let (mut engine, provider, store) = active_engine().await;
        engine.on_sample(fix(0.0, 0.01, 60_000)).await.unwrap();
        engine.on_sample(fix(0.0, 0.02, 120_000)).await.unwrap();
        provider.push_one_shot(Ok(fix(0.0, 0.03, 180_000)));

        let done = engine.end_trip(1050.0).await.unwrap();

        assert_eq!(done.status, TripStatus::Completed);
        assert_eq!(done.end_odometer, Some(1050.0));
        assert_eq!(done.odometer_distance(), Some(50.0));
        assert_eq!(done.end_timestamp_ms, Some(180_000));
        assert_eq!(done.route.len(), 4);
        assert_eq!(done.duration_seconds, 180);
        assert!(done.end_location.is_some());
        let expected = crate::processor::distance::route_distance_km(&done.route);
        assert!((done.distance_km - expected).abs() < 1e-12);

        assert_eq!(engine.state(), TrackerState::Idle);
        assert_eq!(engine.history().first(), Some(&done));
        assert!(store.load_current().await.unwrap().is_none());
        assert_eq!(store.load_history().await.unwrap(), vec![done]);
        assert!(!provider.is_watching());
    }

    #[tokio::test]
    async fn test_history_is_most_recent_first() {
        let (mut engine, provider, _store) = active_engine().await;
        provider.push_one_shot(Ok(fix(0.0, 0.1, 60_000)));
        let first = engine.end_trip(1010.0).await.unwrap();

        provider.push_one_shot(Ok(fix(0.0, 0.1, 120_000)));
        engine.start_trip("second", 1010.0).await.unwrap();
        provider.push_one_shot(Ok(fix(0.0, 0.2, 180_000)));
        let second = engine.end_trip(1020.0).await.unwrap();

        assert_eq!(engine.history(), &[second, first]);
    }

    #[tokio::test]
    async fn test_end_trip_below_start_odometer() {
        let (mut engine, provider, store) = active_engine().await;
        let before = engine.current_trip().cloned();

        let err = engine.end_trip(999.0).await.unwrap_err();
        assert!(matches!(err, TripError::Validation(_)));
        assert_eq!(engine.state(), TrackerState::Active);
        assert_eq!(engine.current_trip().cloned(), before);
        assert_eq!(store.load_current().await.unwrap(), before);
        assert!(provider.is_watching());
    }

    #[tokio::test]
    async fn test_end_trip_location_failure_keeps_trip() {
        let (mut engine, provider, store) = active_engine().await;
        provider.push_one_shot(Err(LocationError::Timeout));
        let before = engine.current_trip().cloned();

        let err = engine.end_trip(1100.0).await.unwrap_err();
        assert!(matches!(err, TripError::Location(LocationError::Timeout)));
        assert_eq!(engine.current_trip().cloned(), before);
        assert!(store.load_history().await.unwrap().is_empty());
        assert!(store.load_current().await.unwrap().is_some());

        // Caller retries once the signal is back.
        provider.push_one_shot(Ok(fix(0.0, 0.1, 30_000)));
        assert!(engine.end_trip(1100.0).await.is_ok());
    }

    #[tokio::test]
    async fn test_end_trip_while_idle() {
        let provider = ScriptedProvider::new();
        let store = Arc::new(SqliteStore::in_memory().await);
        let mut engine = engine_with(&provider, &store).await;

        let err = engine.end_trip(10.0).await.unwrap_err();
        assert!(matches!(err, TripError::NoActiveTrip));
    }

    #[tokio::test]
    async fn test_zero_duration_trip() {
        let (mut engine, provider, _store) = active_engine().await;
        provider.push_one_shot(Ok(fix(0.0, 0.0, 0)));

        let done = engine.end_trip(1000.0).await.unwrap();
        assert_eq!(done.duration_seconds, 0);
        assert_eq!(done.average_speed_kmh, 0.0);
        assert_eq!(done.end_odometer, Some(1000.0));
    }

    #[tokio::test]
    async fn test_cached_end_fix_is_not_appended() {
        let (mut engine, provider, _store) = active_engine().await;
        engine.on_sample(fix(0.0, 0.05, 90_000)).await.unwrap();
        provider.push_one_shot(Ok(fix(0.0, 0.04, 80_000)));

        let done = engine.end_trip(1001.0).await.unwrap();
        assert_eq!(done.route.len(), 2);
        assert_eq!(done.end_timestamp_ms, Some(90_000));
        assert_eq!(done.duration_seconds, 90);
    }

    #[tokio::test]
    async fn test_resume_after_restart() {
        let (mut engine, _provider, store) = active_engine().await;
        engine.on_sample(fix(0.0, 0.01, 30_000)).await.unwrap();
        let persisted = engine.current_trip().cloned().unwrap();
        drop(engine);

        let provider = ScriptedProvider::new();
        let resumed = engine_with(&provider, &store).await;

        assert_eq!(resumed.state(), TrackerState::Active);
        assert_eq!(resumed.current_trip(), Some(&persisted));
        assert_eq!(provider.watch_calls(), 1);
        assert_eq!(provider.last_one_shot_options(), None);
    }

    #[tokio::test]
    async fn test_corrupt_records_do_not_abort_init() {
        let store = Arc::new(SqliteStore::in_memory().await);
        store.put_raw(CURRENT_TRIP_KEY, "{\"id\": 12").await;
        store.put_raw(TRIP_HISTORY_KEY, "not json").await;

        let provider = ScriptedProvider::new();
        let engine = engine_with(&provider, &store).await;

        assert_eq!(engine.state(), TrackerState::Idle);
        assert!(engine.history().is_empty());
        assert_eq!(engine.diagnostics().len(), 2);
        assert!(store.load_current().await.unwrap().is_none());
        assert_eq!(provider.watch_calls(), 0);
    }

    #[tokio::test]
    async fn test_delete_trip() {
        let (mut engine, provider, store) = active_engine().await;
        provider.push_one_shot(Ok(fix(0.0, 0.1, 60_000)));
        let done = engine.end_trip(1010.0).await.unwrap();

        assert!(!engine.delete_trip("unknown").await.unwrap());
        assert!(engine.delete_trip(&done.id).await.unwrap());
        assert!(engine.history().is_empty());
        assert!(store.load_history().await.unwrap().is_empty());
    }
}
