//! Event descriptor normalization.
//!
//! `normalize` turns a raw webhook fragment into the canonical
//! `EventDescriptor` everything downstream consumes. Validation happens
//! exactly once, here: the resolver, builder and executor all treat the
//! descriptor as a closed, fully-populated shape and never re-check it.

use chrono::{DateTime, FixedOffset};
use serde_json::{Map, Value};

use crate::error::NormalizeError;
use crate::webhook::EventFragment;

/// Marker separating the series id from the occurrence epoch in compound
/// instance ids, e.g. `500-rid-1700000000`.
pub const INSTANCE_MARKER: &str = "-rid-";

/// Canonical view of one inbound event.
#[derive(Debug, Clone)]
pub struct EventDescriptor {
    /// Identifier exactly as delivered by the webhook
    pub raw_id: String,
    /// Numeric series id (the whole id for non-recurring events)
    pub series_id: i64,
    /// Epoch suffix of a compound id, decoded later by the resolver
    pub rid_suffix: Option<String>,
    /// Set when the id carries the instance marker or the fragment has
    /// explicit recurrence fields
    pub is_recurring_instance: bool,

    // Sub-calendar membership
    /// Primary sub-calendar the event was delivered under
    pub sub_calendar_id: i64,
    /// Full membership list, possibly empty
    pub sub_calendar_ids: Vec<i64>,

    // Time range
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    /// Explicit occurrence start, when the payload carries one
    pub ristart: Option<DateTime<FixedOffset>>,
    pub rrule: Option<String>,

    // Passthrough fields, copied verbatim and never fabricated
    pub title: Option<String>,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub timezone: Option<String>,
    pub all_day: Option<bool>,
    pub who: Option<String>,
    pub version: Option<String>,

    /// Custom fields, deep-copied so the builder can overwrite one key
    /// without touching the source fragment
    pub custom: Map<String, Value>,
}

impl EventDescriptor {
    /// Identifier the provider expects in the update URL: the series id
    /// for recurring instances, the delivered id otherwise.
    pub fn target_id(&self) -> String {
        if self.is_recurring_instance {
            self.series_id.to_string()
        } else {
            self.raw_id.clone()
        }
    }
}

/// Normalize a raw fragment into a complete descriptor, or fail closed.
///
/// A fragment with no sub-calendar at all is not an error worth logging
/// loudly: it is simply an event calhook does not manage.
pub fn normalize(fragment: &EventFragment) -> Result<EventDescriptor, NormalizeError> {
    let sub_calendar_id = fragment
        .subcalendar_id
        .or_else(|| fragment.subcalendar_ids.first().copied())
        .ok_or(NormalizeError::MissingSubCalendar)?;

    let raw_id = fragment
        .id
        .clone()
        .filter(|id| !id.is_empty())
        .ok_or(NormalizeError::MissingIdentifier)?;

    let (series_id, rid_suffix) = split_series_id(&raw_id)?;

    let (start, end) = match (fragment.start_dt, fragment.end_dt) {
        (Some(start), Some(end)) => (start, end),
        _ => return Err(NormalizeError::MissingTimeRange(raw_id)),
    };

    let is_recurring_instance =
        rid_suffix.is_some() || fragment.series_id.is_some() || fragment.rrule.is_some();

    Ok(EventDescriptor {
        raw_id,
        series_id,
        rid_suffix,
        is_recurring_instance,
        sub_calendar_id,
        sub_calendar_ids: fragment.subcalendar_ids.clone(),
        start,
        end,
        ristart: fragment.ristart_dt,
        rrule: fragment.rrule.clone(),
        title: fragment.title.clone(),
        location: fragment.location.clone(),
        notes: fragment.notes.clone(),
        timezone: fragment.tz.clone(),
        all_day: fragment.all_day,
        who: fragment.who.clone(),
        version: fragment.version.clone(),
        custom: fragment.custom.clone(),
    })
}

/// Split a raw id on the instance marker and parse the series half.
///
/// The split happens on the first marker occurrence; whatever follows is
/// kept verbatim for the resolver to decode.
fn split_series_id(raw_id: &str) -> Result<(i64, Option<String>), NormalizeError> {
    let (series_part, rid_suffix) = match raw_id.split_once(INSTANCE_MARKER) {
        Some((series, suffix)) => (series, Some(suffix.to_string())),
        None => (raw_id, None),
    };

    let series_id = series_part
        .parse::<i64>()
        .map_err(|_| NormalizeError::MalformedIdentifier(raw_id.to_string()))?;

    Ok((series_id, rid_suffix))
}
