//! Update payload construction.
//!
//! The provider rejects partial updates that omit fields it considers
//! required, yet also re-validates optional fields we have no intention
//! of changing. The builder therefore produces one of several candidate
//! field sets ("shapes") for the same logical update; the executor walks
//! them in order until the provider accepts one.

use std::fmt;

use chrono::{DateTime, FixedOffset};
use serde_json::{Map, Value, json};

use crate::config::LinkAssignment;
use crate::descriptor::EventDescriptor;

/// Candidate field sets, in descending completeness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadShape {
    /// Everything known about the event, including the recurrence rule
    Full,
    /// `Full` minus the recurrence rule, for occurrences whose schedule
    /// has already diverged from the series pattern
    NoRule,
    /// Required fields only, dropping passthroughs the provider might
    /// validate against stale data
    Minimal,
}

impl fmt::Display for PayloadShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PayloadShape::Full => "full",
            PayloadShape::NoRule => "no_rule",
            PayloadShape::Minimal => "minimal",
        })
    }
}

/// A concrete update body bound for the provider.
#[derive(Debug, Clone)]
pub struct UpdatePayload {
    pub shape: PayloadShape,
    /// Body fields, insertion-ordered
    pub fields: Map<String, Value>,
}

/// Build one candidate payload for the given shape.
///
/// Every shape carries the target id, the time range, the primary
/// sub-calendar and the full custom-field map with exactly the link
/// field overwritten. Datetimes are rendered as RFC 3339 with their
/// original offsets so an echo of the inbound payload compares equal.
///
/// The `anchor` scopes recurring writes to a single occurrence and must
/// be `None` for non-recurring events.
pub fn build_payload(
    descriptor: &EventDescriptor,
    assignment: &LinkAssignment,
    anchor: Option<&DateTime<FixedOffset>>,
    shape: PayloadShape,
) -> UpdatePayload {
    let mut fields = Map::new();

    fields.insert("id".into(), Value::String(descriptor.target_id()));
    fields.insert("subcalendar_id".into(), json!(assignment.sub_calendar_id));

    // Recurring updates go through the series and must not rewrite the
    // membership list; plain events echo it back, collapsed.
    if !descriptor.is_recurring_instance && !descriptor.sub_calendar_ids.is_empty() {
        fields.insert(
            "subcalendar_ids".into(),
            json!(collapse_memberships(descriptor, assignment)),
        );
    }

    fields.insert("start_dt".into(), rfc3339(&descriptor.start));
    fields.insert("end_dt".into(), rfc3339(&descriptor.end));

    if let Some(title) = &descriptor.title {
        fields.insert("title".into(), json!(title));
    }
    if let Some(all_day) = descriptor.all_day {
        fields.insert("all_day".into(), json!(all_day));
    }

    if shape != PayloadShape::Minimal {
        for (key, value) in [
            ("location", &descriptor.location),
            ("notes", &descriptor.notes),
            ("tz", &descriptor.timezone),
            ("who", &descriptor.who),
            ("version", &descriptor.version),
        ] {
            if let Some(value) = value {
                fields.insert(key.into(), json!(value));
            }
        }
    }

    if descriptor.is_recurring_instance {
        if shape == PayloadShape::Full {
            if let Some(rrule) = &descriptor.rrule {
                fields.insert("rrule".into(), json!(rrule));
            }
        }
        if let Some(anchor) = anchor {
            fields.insert("ristart_dt".into(), rfc3339(anchor));
            // Scope the write to this occurrence only
            fields.insert("redit".into(), json!("single"));
        }
    }

    let mut custom = descriptor.custom.clone();
    custom.insert(assignment.field.clone(), json!({ "html": assignment.html }));
    fields.insert("custom".into(), Value::Object(custom));

    UpdatePayload { shape, fields }
}

fn rfc3339(dt: &DateTime<FixedOffset>) -> Value {
    Value::String(dt.to_rfc3339())
}

/// Collapse the membership list for the update body.
///
/// Memberships outside the link table are preserved untouched; managed
/// ones collapse to the single sub-calendar that triggered this update.
/// One webhook must not fan an event out across every managed
/// sub-calendar it happens to appear on.
fn collapse_memberships(descriptor: &EventDescriptor, assignment: &LinkAssignment) -> Vec<i64> {
    let mut ids: Vec<i64> = descriptor
        .sub_calendar_ids
        .iter()
        .copied()
        .filter(|id| *id == assignment.sub_calendar_id || !assignment.managed.contains(id))
        .collect();
    if !ids.contains(&assignment.sub_calendar_id) {
        ids.push(assignment.sub_calendar_id);
    }
    ids
}
