use thiserror::Error;

use crate::store::StoreError;

/// Failure reported by the positioning primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LocationError {
    #[error("location access denied")]
    PermissionDenied,
    #[error("location information is unavailable")]
    Unavailable,
    #[error("location request timed out")]
    Timeout,
    #[error("positioning is not supported")]
    Unsupported,
}

impl LocationError {
    /// Maps the feed's error codes. Unknown codes count as unavailable.
    pub fn from_code(code: &str) -> Self {
        match code.trim().to_uppercase().as_str() {
            "PERMISSION_DENIED" => LocationError::PermissionDenied,
            "TIMEOUT" => LocationError::Timeout,
            "UNSUPPORTED" => LocationError::Unsupported,
            _ => LocationError::Unavailable,
        }
    }
}

#[derive(Debug, Error)]
pub enum TripError {
    #[error(transparent)]
    Location(#[from] LocationError),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("a trip is already active")]
    AlreadyActive,
    #[error("no active trip")]
    NoActiveTrip,
    #[error(transparent)]
    Persistence(#[from] StoreError),
}

impl TripError {
    /// True for operations invoked in the wrong lifecycle state.
    pub fn is_state_error(&self) -> bool {
        matches!(self, TripError::AlreadyActive | TripError::NoActiveTrip)
    }
}
