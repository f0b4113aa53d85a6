//! Recurrence anchor resolution.
//!
//! Updates to a single occurrence of a recurring event are addressed by
//! the series id plus an anchor timestamp naming the occurrence. Webhook
//! payload versions differ in which anchor source they populate, so
//! resolution follows a fixed priority order instead of trusting any one
//! field.

use chrono::{DateTime, FixedOffset, TimeZone, Utc};

use crate::descriptor::EventDescriptor;
use crate::error::CalHookError;

/// Resolve the occurrence anchor for a recurring-instance descriptor.
///
/// Priority: the epoch suffix embedded in the compound id, then the
/// explicit occurrence-start field, then the event's plain start time.
///
/// A marker suffix that is present but not a decodable epoch fails
/// closed: guessing an anchor from a lower-priority source could scope
/// the write to the wrong occurrence.
pub fn resolve_instance_anchor(
    descriptor: &EventDescriptor,
) -> Result<DateTime<FixedOffset>, CalHookError> {
    if let Some(suffix) = &descriptor.rid_suffix {
        return decode_epoch_suffix(suffix)
            .ok_or_else(|| CalHookError::UnresolvableRecurrence(descriptor.raw_id.clone()));
    }

    if let Some(ristart) = descriptor.ristart {
        return Ok(ristart);
    }

    Ok(descriptor.start)
}

/// Decode an instance-marker suffix as Unix epoch seconds, in UTC.
fn decode_epoch_suffix(suffix: &str) -> Option<DateTime<FixedOffset>> {
    let epoch = suffix.parse::<i64>().ok()?;
    Utc.timestamp_opt(epoch, 0)
        .single()
        .map(|dt| dt.fixed_offset())
}
