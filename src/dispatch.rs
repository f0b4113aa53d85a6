//! Per-delivery dispatch.
//!
//! Walks the items of one webhook delivery strictly in order and runs
//! each through normalize, link lookup, anchor resolution and the
//! provider executor. A failing item never blocks the items after it;
//! outcomes are counted and logged, not returned to the provider.

use calhook_core::{WebhookItem, WebhookPayload, normalize, resolve_instance_anchor};
use calhook_provider::executor::{execute_update, recurring_chain, single_chain};
use tracing::{debug, info, warn};

use crate::state::AppState;

/// Outcome counters for one webhook delivery.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSummary {
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
}

enum ItemOutcome {
    Updated,
    Skipped(&'static str),
    Failed(String),
}

/// Process one webhook delivery end to end.
pub async fn process_delivery(state: &AppState, payload: WebhookPayload) -> DispatchSummary {
    let delivery_id = payload.delivery_id().map(str::to_string);
    let mut summary = DispatchSummary::default();

    for item in payload.into_items() {
        match process_item(state, &item).await {
            ItemOutcome::Updated => summary.updated += 1,
            ItemOutcome::Skipped(reason) => {
                debug!(reason, "skipping webhook item");
                summary.skipped += 1;
            }
            ItemOutcome::Failed(reason) => {
                warn!(%reason, "webhook item failed");
                summary.failed += 1;
            }
        }
    }

    info!(
        delivery_id = delivery_id.as_deref().unwrap_or("-"),
        updated = summary.updated,
        skipped = summary.skipped,
        failed = summary.failed,
        "webhook delivery processed"
    );
    summary
}

async fn process_item(state: &AppState, item: &WebhookItem) -> ItemOutcome {
    if !item.trigger.is_actionable() {
        return ItemOutcome::Skipped("trigger is not a create or modify");
    }

    let descriptor = match normalize(&item.event) {
        Ok(descriptor) => descriptor,
        Err(err) if err.is_benign() => return ItemOutcome::Skipped("event has no sub-calendar"),
        Err(err) => return ItemOutcome::Failed(err.to_string()),
    };

    let Some(assignment) = state.config.assign(&descriptor) else {
        return ItemOutcome::Skipped("no link configured for the event's sub-calendars");
    };

    let chain = if descriptor.is_recurring_instance {
        let anchor = match resolve_instance_anchor(&descriptor) {
            Ok(anchor) => anchor,
            Err(err) => return ItemOutcome::Failed(err.to_string()),
        };
        recurring_chain(&descriptor, &assignment, &anchor)
    } else {
        single_chain(&descriptor, &assignment)
    };

    let target_id = descriptor.target_id();
    match execute_update(&state.client, &target_id, chain).await {
        Ok(outcome) => {
            debug!(
                event_id = %target_id,
                shape = %outcome.shape,
                attempts = outcome.attempts,
                sub_calendar = assignment.sub_calendar_id,
                "link written"
            );
            ItemOutcome::Updated
        }
        Err(err) => ItemOutcome::Failed(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use calhook_core::{AppConfig, LinkTable};
    use serde_json::json;

    fn test_state(api_base: &str) -> AppState {
        let config = AppConfig {
            api_base: api_base.to_string(),
            api_key: "test-key".to_string(),
            calendar_id: "ks73ad7816e7a61b3a".to_string(),
            custom_field: "meeting_link".to_string(),
            listen_addr: "127.0.0.1:0".parse().expect("Should parse addr"),
            links: LinkTable::from_iter([
                (14156325, "L1".to_string()),
                (14098383, "https://meet.example.com/retro".to_string()),
            ]),
        };
        AppState::new(config).expect("Should build state")
    }

    fn payload(value: serde_json::Value) -> WebhookPayload {
        serde_json::from_value(value).expect("Should parse payload")
    }

    #[tokio::test]
    async fn dispatch_shape_writes_link_for_recurring_instance() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PUT", "/ks73ad7816e7a61b3a/events/500")
            .match_header("Provider-Token", "test-key")
            .match_body(mockito::Matcher::PartialJson(json!({
                "id": "500",
                "subcalendar_id": 14156325,
                "start_dt": "2023-11-14T22:13:20+00:00",
                "end_dt": "2023-11-14T23:13:20+00:00",
                "ristart_dt": "2023-11-14T22:13:20+00:00",
                "redit": "single",
                "custom": { "meeting_link": { "html": "L1" } }
            })))
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let state = test_state(&server.url());
        let summary = process_delivery(
            &state,
            payload(json!({
                "id": 8254,
                "calendar": "ks73ad7816e7a61b3a",
                "dispatch": [{
                    "trigger": "event.created",
                    "event": {
                        "id": "500-rid-1700000000",
                        "subcalendar_id": 14156325,
                        "start_dt": "2023-11-14T22:13:20+00:00",
                        "end_dt": "2023-11-14T23:13:20+00:00",
                        "title": "Standup",
                        "custom": {}
                    }
                }]
            })),
        )
        .await;

        assert_eq!(summary.updated, 1);
        assert_eq!(summary.failed, 0);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn flat_shape_writes_link_for_plain_event() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PUT", "/ks73ad7816e7a61b3a/events/772211")
            .match_body(mockito::Matcher::PartialJson(json!({
                "id": "772211",
                "subcalendar_id": 14098383,
                "custom": {
                    "meeting_link": { "html": "https://meet.example.com/retro" }
                }
            })))
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let state = test_state(&server.url());
        let summary = process_delivery(
            &state,
            payload(json!({
                "action": "update",
                "event": {
                    "id": 772211,
                    "subcalendar_id": 14098383,
                    "start_dt": "2024-01-05T09:00:00+01:00",
                    "end_dt": "2024-01-05T10:00:00+01:00"
                }
            })),
        )
        .await;

        assert_eq!(summary.updated, 1);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn unmanaged_event_is_skipped_without_a_write() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PUT", mockito::Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let state = test_state(&server.url());
        let summary = process_delivery(
            &state,
            payload(json!({
                "action": "create",
                "event": {
                    "id": 772211,
                    "subcalendar_id": 99,
                    "start_dt": "2024-01-05T09:00:00+01:00",
                    "end_dt": "2024-01-05T10:00:00+01:00"
                }
            })),
        )
        .await;

        assert_eq!(summary, DispatchSummary { updated: 0, skipped: 1, failed: 0 });
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn missing_sub_calendar_is_a_quiet_skip() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PUT", mockito::Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let state = test_state(&server.url());
        let summary = process_delivery(
            &state,
            payload(json!({
                "action": "create",
                "event": {
                    "id": 772211,
                    "start_dt": "2024-01-05T09:00:00+01:00",
                    "end_dt": "2024-01-05T10:00:00+01:00"
                }
            })),
        )
        .await;

        assert_eq!(summary, DispatchSummary { updated: 0, skipped: 1, failed: 0 });
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn one_failing_item_does_not_block_the_next() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("PUT", "/ks73ad7816e7a61b3a/events/111")
            .with_status(404)
            .create_async()
            .await;
        let ok = server
            .mock("PUT", "/ks73ad7816e7a61b3a/events/222")
            .with_status(200)
            .with_body("{}")
            .expect(1)
            .create_async()
            .await;

        let state = test_state(&server.url());
        let summary = process_delivery(
            &state,
            payload(json!({
                "dispatch": [
                    {
                        "trigger": "event.modified",
                        "event": {
                            "id": 111,
                            "subcalendar_id": 14156325,
                            "start_dt": "2024-01-05T09:00:00+01:00",
                            "end_dt": "2024-01-05T10:00:00+01:00"
                        }
                    },
                    {
                        "trigger": "event.removed",
                        "event": {
                            "id": 555,
                            "subcalendar_id": 14156325,
                            "start_dt": "2024-01-05T09:00:00+01:00",
                            "end_dt": "2024-01-05T10:00:00+01:00"
                        }
                    },
                    {
                        "trigger": "event.modified",
                        "event": {
                            "id": 222,
                            "subcalendar_id": 14156325,
                            "start_dt": "2024-01-05T11:00:00+01:00",
                            "end_dt": "2024-01-05T12:00:00+01:00"
                        }
                    }
                ]
            })),
        )
        .await;

        assert_eq!(summary, DispatchSummary { updated: 1, skipped: 1, failed: 1 });
        ok.assert_async().await;
    }

    #[tokio::test]
    async fn malformed_id_counts_as_a_failure() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PUT", mockito::Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let state = test_state(&server.url());
        let summary = process_delivery(
            &state,
            payload(json!({
                "action": "update",
                "event": {
                    "id": "garbage-rid-also-garbage",
                    "subcalendar_id": 14156325,
                    "start_dt": "2024-01-05T09:00:00+01:00",
                    "end_dt": "2024-01-05T10:00:00+01:00"
                }
            })),
        )
        .await;

        assert_eq!(summary, DispatchSummary { updated: 0, skipped: 0, failed: 1 });
        mock.assert_async().await;
    }
}
