//! Error types for the calhook ecosystem.

use thiserror::Error;

/// Errors that can occur in calhook operations.
#[derive(Error, Debug)]
pub enum CalHookError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    #[error("Unresolvable recurrence anchor for event '{0}': instance marker is not an epoch timestamp")]
    UnresolvableRecurrence(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for calhook operations.
pub type CalHookResult<T> = Result<T, CalHookError>;

/// Why an inbound event fragment could not be turned into a descriptor.
///
/// `MissingSubCalendar` means the event is simply not one of ours and the
/// item is skipped quietly; every other variant aborts the item and is
/// logged as a failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("Event has no sub-calendar id")]
    MissingSubCalendar,

    #[error("Event has no id")]
    MissingIdentifier,

    #[error("Event id '{0}' does not start with a numeric series id")]
    MalformedIdentifier(String),

    #[error("Event '{0}' has no usable start/end times")]
    MissingTimeRange(String),
}

impl NormalizeError {
    /// True for conditions that mean "not our event" rather than a fault.
    pub fn is_benign(&self) -> bool {
        matches!(self, NormalizeError::MissingSubCalendar)
    }
}
