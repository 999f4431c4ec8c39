use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::LocationError;
use crate::models::sample::Sample;

pub mod feed;
#[cfg(test)]
pub mod mock;

/// Stream of fixes (or errors) from a continuous subscription. Dropping the
/// receiver cancels the subscription.
pub type PositionWatch = mpsc::Receiver<Result<Sample, LocationError>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionOptions {
    pub enable_high_accuracy: bool,
    pub timeout: Duration,
    pub maximum_age: Duration,
}

impl PositionOptions {
    pub const CONTINUOUS: PositionOptions = PositionOptions {
        enable_high_accuracy: true,
        timeout: Duration::from_secs(10),
        maximum_age: Duration::from_secs(5),
    };

    pub const ONE_SHOT: PositionOptions = PositionOptions {
        enable_high_accuracy: true,
        timeout: Duration::from_secs(10),
        maximum_age: Duration::from_secs(60),
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionState {
    Unknown,
    Granted,
    Denied,
}

/// The platform positioning primitive.
#[async_trait]
pub trait PositionProvider: Send + Sync {
    /// Single fix, honoring `options.maximum_age` for cached fixes.
    async fn current_position(&self, options: PositionOptions) -> Result<Sample, LocationError>;

    /// Starts a continuous subscription.
    fn watch_position(&self, options: PositionOptions) -> Result<PositionWatch, LocationError>;
}

/// Wraps a [`PositionProvider`]: owns at most one continuous subscription,
/// validates every fix, and keeps the last permission state and error around
/// for observability.
pub struct PositionSource {
    provider: Arc<dyn PositionProvider>,
    continuous: PositionOptions,
    watch: Option<PositionWatch>,
    permission: PermissionState,
    last_error: Option<LocationError>,
    last_sample: Option<Sample>,
    discarded: u64,
}

impl PositionSource {
    pub fn new(provider: Arc<dyn PositionProvider>, continuous: PositionOptions) -> Self {
        Self {
            provider,
            continuous,
            watch: None,
            permission: PermissionState::Unknown,
            last_error: None,
            last_sample: None,
            discarded: 0,
        }
    }

    pub fn start_continuous(&mut self) {
        if self.watch.is_some() {
            return;
        }

        match self.provider.watch_position(self.continuous) {
            Ok(watch) => {
                info!("Continuous positioning started");
                self.watch = Some(watch);
                self.last_error = None;
            }
            Err(e) => {
                warn!("Could not start continuous positioning: {}", e);
                self.record_error(e);
            }
        }
    }

    pub fn stop_continuous(&mut self) {
        if let Some(mut watch) = self.watch.take() {
            watch.close();
            info!("Continuous positioning stopped");
        }
    }

    pub fn is_tracking(&self) -> bool {
        self.watch.is_some()
    }

    pub async fn get_one_shot(
        &mut self,
        timeout: Duration,
        max_age: Duration,
    ) -> Result<Sample, LocationError> {
        let options = PositionOptions {
            enable_high_accuracy: true,
            timeout,
            maximum_age: max_age,
        };

        let result = match tokio::time::timeout(timeout, self.provider.current_position(options)).await {
            Ok(result) => result,
            Err(_) => Err(LocationError::Timeout),
        };

        match result {
            Ok(sample) if sample.is_valid() => {
                self.record_sample(sample);
                Ok(sample)
            }
            Ok(sample) => {
                warn!("Discarding invalid one-shot fix: {:?}", sample);
                self.discarded += 1;
                self.record_error(LocationError::Unavailable);
                Err(LocationError::Unavailable)
            }
            Err(e) => {
                self.record_error(e);
                Err(e)
            }
        }
    }

    /// Waits for the next event of the continuous subscription. Invalid fixes
    /// are discarded here. Returns `None` when nothing is subscribed or the
    /// provider ended the subscription.
    pub async fn next_event(&mut self) -> Option<Result<Sample, LocationError>> {
        loop {
            let watch = self.watch.as_mut()?;
            match watch.recv().await {
                Some(Ok(sample)) if sample.is_valid() => {
                    self.record_sample(sample);
                    return Some(Ok(sample));
                }
                Some(Ok(sample)) => {
                    debug!("Discarding invalid fix: {:?}", sample);
                    self.discarded += 1;
                }
                Some(Err(e)) => {
                    warn!("Positioning error: {}", e);
                    self.record_error(e);
                    return Some(Err(e));
                }
                None => {
                    info!("Position provider closed the subscription");
                    self.watch = None;
                    return None;
                }
            }
        }
    }

    pub fn permission(&self) -> PermissionState {
        self.permission
    }

    pub fn last_error(&self) -> Option<LocationError> {
        self.last_error
    }

    pub fn last_sample(&self) -> Option<&Sample> {
        self.last_sample.as_ref()
    }

    /// Fixes dropped for failing validation.
    pub fn discarded(&self) -> u64 {
        self.discarded
    }

    fn record_sample(&mut self, sample: Sample) {
        self.permission = PermissionState::Granted;
        self.last_error = None;
        self.last_sample = Some(sample);
    }

    fn record_error(&mut self, error: LocationError) {
        if error == LocationError::PermissionDenied {
            self.permission = PermissionState::Denied;
        }
        self.last_error = Some(error);
    }
}
