//! Update execution with shape fallback.
//!
//! The provider's validation behavior differs between event classes in
//! ways the webhook payload does not reveal up front, so an update is a
//! linear chain of candidate payloads tried strictly in order. Advancing
//! is driven by the classified failure of the previous attempt; a payload
//! reshuffle cannot fix an auth or transport failure, so fatal classes
//! stop the chain immediately.

use calhook_core::{EventDescriptor, LinkAssignment, PayloadShape, UpdatePayload, build_payload};
use chrono::{DateTime, FixedOffset};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::client::{ApiFailure, FailureKind, ProviderClient};

/// One step of a fallback chain: a candidate payload plus the failure
/// classes of the preceding attempt that allow entering it.
#[derive(Debug, Clone)]
pub struct ChainStep {
    pub payload: UpdatePayload,
    pub advance_on: &'static [FailureKind],
}

impl ChainStep {
    /// The opening step; its entry condition is never consulted.
    pub fn first(payload: UpdatePayload) -> Self {
        Self {
            payload,
            advance_on: &[],
        }
    }

    pub fn on(payload: UpdatePayload, advance_on: &'static [FailureKind]) -> Self {
        Self {
            payload,
            advance_on,
        }
    }
}

/// The shape that was finally accepted, and how many writes it took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub shape: PayloadShape,
    pub attempts: usize,
}

/// Terminal failure of an update chain.
#[derive(Debug, Error)]
#[error("Update failed after {attempts} attempt(s): {failure}")]
pub struct UpdateError {
    pub attempts: usize,
    pub failure: ApiFailure,
}

/// Fallback chain for a recurring-instance update.
///
/// Order: the full payload first; on an overlap rejection retry without
/// the recurrence rule (the occurrence has diverged from the pattern and
/// re-asserting the rule collides with the series itself); if the
/// provider still refuses, fall back to the minimal payload. A plain
/// validation failure of the full payload skips straight to minimal,
/// since dropping only the rule cannot cure it.
pub fn recurring_chain(
    descriptor: &EventDescriptor,
    assignment: &LinkAssignment,
    anchor: &DateTime<FixedOffset>,
) -> Vec<ChainStep> {
    vec![
        ChainStep::first(build_payload(
            descriptor,
            assignment,
            Some(anchor),
            PayloadShape::Full,
        )),
        ChainStep::on(
            build_payload(descriptor, assignment, Some(anchor), PayloadShape::NoRule),
            &[FailureKind::Overlap],
        ),
        ChainStep::on(
            build_payload(descriptor, assignment, Some(anchor), PayloadShape::Minimal),
            &[FailureKind::Overlap, FailureKind::Validation],
        ),
    ]
}

/// Single-step chain for a non-recurring event.
pub fn single_chain(descriptor: &EventDescriptor, assignment: &LinkAssignment) -> Vec<ChainStep> {
    vec![ChainStep::first(build_payload(
        descriptor,
        assignment,
        None,
        PayloadShape::Full,
    ))]
}

/// Walk a fallback chain until the provider accepts a write.
///
/// After a retryable failure the walk advances to the next step whose
/// entry condition includes that failure class, consuming any steps it
/// skips over. The chain never moves backwards and no step runs twice.
pub async fn execute_update(
    client: &ProviderClient,
    event_id: &str,
    chain: Vec<ChainStep>,
) -> Result<UpdateOutcome, UpdateError> {
    let mut steps = chain.into_iter();
    let mut next = steps.next();
    let mut attempts = 0;
    let mut last_failure = None;

    while let Some(step) = next.take() {
        attempts += 1;
        let shape = step.payload.shape;
        debug!(event_id, %shape, attempt = attempts, "sending event update");

        match client.update_event(event_id, &step.payload).await {
            Ok(()) => {
                info!(event_id, %shape, attempts, "event update accepted");
                return Ok(UpdateOutcome { shape, attempts });
            }
            Err(failure) => {
                if failure.kind.is_retryable() {
                    next = steps.find(|step| step.advance_on.contains(&failure.kind));
                    match &next {
                        Some(upcoming) => info!(
                            event_id,
                            %shape,
                            next_shape = %upcoming.payload.shape,
                            kind = ?failure.kind,
                            "shape rejected, falling back"
                        ),
                        None => debug!(event_id, %shape, kind = ?failure.kind, "shape rejected, chain exhausted"),
                    }
                } else {
                    warn!(event_id, %shape, kind = ?failure.kind, "fatal provider failure, stopping chain");
                }
                last_failure = Some(failure);
            }
        }
    }

    let failure = last_failure.unwrap_or(ApiFailure {
        kind: FailureKind::Validation,
        status: None,
        message: "No payload shapes to attempt".to_string(),
    });
    Err(UpdateError { attempts, failure })
}
