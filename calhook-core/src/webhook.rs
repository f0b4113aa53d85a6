//! Inbound webhook payload types.
//!
//! The provider delivers notifications in two structurally different
//! shapes depending on which webhook API version the calendar is on: a
//! dispatch-wrapped batch and a flat single-action form. Both collapse
//! into the same list of `WebhookItem`s before any core logic runs, so
//! nothing downstream knows which shape arrived.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

/// One webhook delivery, either shape.
///
/// Variants are tried in order: a body with a `dispatch` array is the
/// batch shape, anything else must carry `action` + `event`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum WebhookPayload {
    /// `{ "id": ..., "calendar": ..., "dispatch": [ { "trigger": ..., "event": {...} }, ... ] }`
    Dispatch {
        #[serde(default, deserialize_with = "lenient_string")]
        id: Option<String>,
        #[serde(default)]
        calendar: Option<String>,
        dispatch: Vec<DispatchItem>,
    },
    /// `{ "action": ..., "event": {...} }`
    Flat { action: String, event: EventFragment },
}

/// One entry of a dispatch-wrapped delivery.
#[derive(Debug, Clone, Deserialize)]
pub struct DispatchItem {
    pub trigger: String,
    pub event: EventFragment,
}

/// A trigger and its event fragment, shape-independent.
#[derive(Debug, Clone)]
pub struct WebhookItem {
    pub trigger: Trigger,
    pub event: EventFragment,
}

impl WebhookPayload {
    /// Flatten either shape into a uniform item list, preserving order.
    pub fn into_items(self) -> Vec<WebhookItem> {
        match self {
            WebhookPayload::Dispatch { dispatch, .. } => dispatch
                .into_iter()
                .map(|item| WebhookItem {
                    trigger: Trigger::parse(&item.trigger),
                    event: item.event,
                })
                .collect(),
            WebhookPayload::Flat { action, event } => vec![WebhookItem {
                trigger: Trigger::parse(&action),
                event,
            }],
        }
    }

    /// Delivery id for log correlation, when the shape carries one.
    pub fn delivery_id(&self) -> Option<&str> {
        match self {
            WebhookPayload::Dispatch { id, .. } => id.as_deref(),
            WebhookPayload::Flat { .. } => None,
        }
    }
}

/// Normalized trigger/action vocabulary.
///
/// The batch shape uses `event.created` / `event.modified`, the flat
/// shape uses bare `create` / `update` verbs. Anything outside the
/// create/modify family is a skip condition, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    Created,
    Modified,
    Other(String),
}

impl Trigger {
    pub fn parse(raw: &str) -> Trigger {
        match raw.trim_start_matches("event.") {
            "created" | "create" => Trigger::Created,
            "modified" | "modify" | "update" | "updated" => Trigger::Modified,
            other => Trigger::Other(other.to_string()),
        }
    }

    pub fn is_actionable(&self) -> bool {
        matches!(self, Trigger::Created | Trigger::Modified)
    }
}

/// The raw event fragment carried by both webhook shapes.
///
/// Everything is optional here; `descriptor::normalize` decides what is
/// required. Identifier-ish fields arrive as JSON numbers or strings
/// depending on payload version, so those deserialize leniently on that
/// axis only. Unknown fields are ignored rather than rejected.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventFragment {
    /// Event id as delivered: plain numeric, or compound for instances
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    /// Numeric series id, present on some recurring-instance payloads
    #[serde(default, deserialize_with = "lenient_i64")]
    pub series_id: Option<i64>,

    // Sub-calendar membership
    #[serde(default, deserialize_with = "lenient_i64")]
    pub subcalendar_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64_list")]
    pub subcalendar_ids: Vec<i64>,

    // Time range (RFC 3339 with offset)
    #[serde(default)]
    pub start_dt: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub end_dt: Option<DateTime<FixedOffset>>,
    /// Start of this particular occurrence, for recurring instances
    #[serde(default)]
    pub ristart_dt: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub rrule: Option<String>,

    // Passthrough fields, echoed back in update payloads when present
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub tz: Option<String>,
    #[serde(default)]
    pub all_day: Option<bool>,
    #[serde(default)]
    pub who: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub version: Option<String>,

    /// Custom fields, carried whole so updates can round-trip them
    #[serde(default)]
    pub custom: Map<String, Value>,
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn lenient_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.parse().ok(),
        _ => None,
    })
}

fn lenient_i64_list<'de, D>(deserializer: D) -> Result<Vec<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let Some(Value::Array(items)) = value else {
        return Ok(Vec::new());
    };
    Ok(items
        .into_iter()
        .filter_map(|item| match item {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        })
        .collect())
}
