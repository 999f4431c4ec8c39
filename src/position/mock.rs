//! Scripted positioning primitive for tests.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use crate::error::LocationError;
use crate::models::sample::Sample;
use crate::position::{PositionOptions, PositionProvider, PositionWatch};

#[derive(Default)]
pub struct ScriptedProvider {
    one_shots: Mutex<VecDeque<Result<Sample, LocationError>>>,
    watch_tx: Mutex<Option<mpsc::Sender<Result<Sample, LocationError>>>>,
    watch_refusal: Mutex<Option<LocationError>>,
    last_watch_options: Mutex<Option<PositionOptions>>,
    last_one_shot_options: Mutex<Option<PositionOptions>>,
    watch_calls: AtomicUsize,
    hang: AtomicBool,
}

impl ScriptedProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_one_shot(&self, result: Result<Sample, LocationError>) {
        self.one_shots.lock().unwrap().push_back(result);
    }

    /// One-shot queries never resolve.
    pub fn hang_one_shots(&self) {
        self.hang.store(true, Ordering::SeqCst);
    }

    pub fn refuse_watch(&self, error: LocationError) {
        *self.watch_refusal.lock().unwrap() = Some(error);
    }

    /// Delivers an event to the open subscription. Returns false when nobody listens.
    pub async fn emit(&self, event: Result<Sample, LocationError>) -> bool {
        let tx = self.watch_tx.lock().unwrap().clone();
        match tx {
            Some(tx) => tx.send(event).await.is_ok(),
            None => false,
        }
    }

    pub fn watch_calls(&self) -> usize {
        self.watch_calls.load(Ordering::SeqCst)
    }

    pub fn is_watching(&self) -> bool {
        self.watch_tx
            .lock()
            .unwrap()
            .as_ref()
            .map(|tx| !tx.is_closed())
            .unwrap_or(false)
    }

    pub fn last_watch_options(&self) -> Option<PositionOptions> {
        *self.last_watch_options.lock().unwrap()
    }

    pub fn last_one_shot_options(&self) -> Option<PositionOptions> {
        *self.last_one_shot_options.lock().unwrap()
    }
}

#[async_trait]
impl PositionProvider for ScriptedProvider {
    async fn current_position(&self, options: PositionOptions) -> Result<Sample, LocationError> {
        *self.last_one_shot_options.lock().unwrap() = Some(options);
        if self.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        let next = self.one_shots.lock().unwrap().pop_front();
        next.unwrap_or(Err(LocationError::Unavailable))
    }

    fn watch_position(&self, options: PositionOptions) -> Result<PositionWatch, LocationError> {
        self.watch_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_watch_options.lock().unwrap() = Some(options);
        if let Some(error) = *self.watch_refusal.lock().unwrap() {
            return Err(error);
        }
        let (tx, rx) = mpsc::channel(16);
        *self.watch_tx.lock().unwrap() = Some(tx);
        Ok(rx)
    }
}
