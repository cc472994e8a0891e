use chrono::NaiveDate;
use thiserror::Error;

use crate::models::PrayerType;
use crate::prayer_times::TimingsError;

#[derive(Error, Debug)]
pub enum TrackError {
    #[error("{prayer} cannot be marked right now for {date}: outside its prayer window")]
    OutOfWindow { prayer: PrayerType, date: NaiveDate },

    #[error("{prayer} is already marked for {date}")]
    AlreadyMarked { prayer: PrayerType, date: NaiveDate },

    #[error("temporarily unavailable: {0}")]
    Transient(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl TrackError {
    /// Only transient failures are worth repeating unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TrackError::Transient(_))
    }

    /// Errors the caller can fix by choosing a different prayer or time.
    pub fn is_user_correctable(&self) -> bool {
        matches!(
            self,
            TrackError::OutOfWindow { .. } | TrackError::AlreadyMarked { .. }
        )
    }
}

impl From<rusqlite::Error> for TrackError {
    fn from(e: rusqlite::Error) -> Self {
        TrackError::Transient(format!("storage: {}", e))
    }
}

impl From<TimingsError> for TrackError {
    fn from(e: TimingsError) -> Self {
        match e {
            TimingsError::UnknownLocation(_) | TimingsError::Unsupported(_) => {
                TrackError::Configuration(e.to_string())
            }
            _ => TrackError::Transient(e.to_string()),
        }
    }
}

pub type TrackResult<T> = Result<T, TrackError>;
