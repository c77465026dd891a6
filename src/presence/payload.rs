//! Canonical activity payload and per-submission value resolution.

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};

use super::document::RichPresence;
use crate::value::{TextValue, TimeValue};

/// The wire-shaped activity record. Absent fields are omitted entirely, never
/// serialized as `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assets: Option<ActivityAssets>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamps: Option<ActivityTimestamps>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buttons: Option<Vec<ActivityButton>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityAssets {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub large_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub large_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub small_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub small_text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityTimestamps {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityButton {
    pub label: String,
    pub url: String,
}

async fn resolve_text(value: Option<&TextValue>, presence: &RichPresence) -> Option<String> {
    match value {
        Some(text) => Some(text.resolve(presence).await),
        None => None,
    }
}

async fn resolve_time(value: Option<&TimeValue>, presence: &RichPresence) -> Option<i64> {
    match value {
        Some(time) => time.resolve(presence).await,
        None => None,
    }
}

impl RichPresence {
    /// Resolve every field into the canonical payload. Returns `None` when
    /// everything resolved absent: the explicit signal to clear a previously
    /// set presence, as opposed to sending an empty record.
    pub async fn resolve_activity(&self) -> Option<Activity> {
        let fields = self.fields_snapshot();

        let state = resolve_text(fields.state.as_ref(), self).await;
        let details = resolve_text(fields.details.as_ref(), self).await;

        let has_assets = fields.large_image.is_some()
            || fields.large_image_text.is_some()
            || fields.small_image.is_some()
            || fields.small_image_text.is_some();
        let assets = if has_assets {
            Some(ActivityAssets {
                large_image: resolve_text(fields.large_image.as_ref(), self).await,
                large_text: resolve_text(fields.large_image_text.as_ref(), self).await,
                small_image: resolve_text(fields.small_image.as_ref(), self).await,
                small_text: resolve_text(fields.small_image_text.as_ref(), self).await,
            })
        } else {
            None
        };

        let start = resolve_time(fields.start_timestamp.as_ref(), self).await;
        let end = resolve_time(fields.end_timestamp.as_ref(), self).await;
        let timestamps = if start.is_some() || end.is_some() {
            Some(ActivityTimestamps { start, end })
        } else {
            None
        };

        // Buttons resolve concurrently; join_all keeps input order no matter
        // which producer settles first.
        let buttons = if fields.buttons.is_empty() {
            None
        } else {
            Some(
                join_all(fields.buttons.iter().map(|button| async move {
                    ActivityButton {
                        label: button.label.resolve(self).await,
                        url: button.url.resolve(self).await,
                    }
                }))
                .await,
            )
        };

        let activity = Activity {
            state,
            details,
            assets,
            timestamps,
            buttons,
        };
        if activity == Activity::default() {
            None
        } else {
            Some(activity)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::testing::mock_registry;
    use serde_json::json;

    #[tokio::test]
    async fn empty_document_resolves_to_clear_signal() {
        let (registry, _mock) = mock_registry();
        let presence = registry.presence(json!({}));
        assert!(presence.resolve_activity().await.is_none());
    }

    #[tokio::test]
    async fn cleared_document_resolves_to_clear_signal() {
        let (registry, _mock) = mock_registry();
        let presence = registry.presence(json!({
            "state": "busy",
            "largeImage": "logo",
            "buttons": ["Vote"],
        }));
        presence.clear();
        assert!(presence.resolve_activity().await.is_none());
    }

    #[tokio::test]
    async fn assets_group_omitted_without_image_fields() {
        let (registry, _mock) = mock_registry();
        let presence = registry.presence(json!({ "state": "busy" }));

        let activity = presence.resolve_activity().await.unwrap();
        assert_eq!(activity.state.as_deref(), Some("busy"));
        assert!(activity.assets.is_none());
        assert!(activity.timestamps.is_none());
        assert!(activity.buttons.is_none());
    }

    #[tokio::test]
    async fn timestamps_group_included_for_end_only() {
        let (registry, _mock) = mock_registry();
        let presence = registry.presence(json!({ "endTimestamp": 9000 }));

        let timestamps = presence.resolve_activity().await.unwrap().timestamps.unwrap();
        assert!(timestamps.start.is_none());
        assert_eq!(timestamps.end, Some(9000));
    }

    #[tokio::test]
    async fn deferred_time_producer_yielding_nothing_omits_the_field() {
        let (registry, _mock) = mock_registry();
        let presence = registry.presence(json!({ "state": "busy" }));
        presence.set_start_timestamp(TimeValue::deferred(|_| None));

        let activity = presence.resolve_activity().await.unwrap();
        assert!(activity.timestamps.is_none());
    }

    #[tokio::test]
    async fn absent_fields_never_serialize() {
        let (registry, _mock) = mock_registry();
        let presence = registry.presence(json!({ "state": "busy", "largeImage": "logo" }));

        let activity = presence.resolve_activity().await.unwrap();
        let wire = serde_json::to_value(&activity).unwrap();
        assert_eq!(
            wire,
            json!({ "state": "busy", "assets": { "large_image": "logo" } })
        );
    }

    #[tokio::test]
    async fn deferred_fields_re_resolve_every_attempt() {
        use std::sync::atomic::{AtomicU32, Ordering};
        use std::sync::Arc;

        let counter = Arc::new(AtomicU32::new(0));
        let (registry, _mock) = mock_registry();
        let presence = registry.presence(json!({}));
        let producer_counter = Arc::clone(&counter);
        presence.set_state(TextValue::deferred(move |_| {
            format!("tick {}", producer_counter.fetch_add(1, Ordering::SeqCst))
        }));

        assert_eq!(
            presence.resolve_activity().await.unwrap().state.as_deref(),
            Some("tick 0")
        );
        assert_eq!(
            presence.resolve_activity().await.unwrap().state.as_deref(),
            Some("tick 1")
        );
    }

    #[tokio::test]
    async fn button_order_survives_out_of_order_resolution() {
        use std::time::Duration;

        let (registry, _mock) = mock_registry();
        let presence = registry.presence(json!({}));

        // Each label takes longer to resolve the earlier it appears.
        for (index, label) in ["A", "B", "C"].into_iter().enumerate() {
            let delay = Duration::from_millis(30 - 10 * index as u64);
            presence.add_button_with_url(
                TextValue::deferred_async(move |_| async move {
                    tokio::time::sleep(delay).await;
                    label.to_owned()
                }),
                "https://example.com",
            );
        }

        let buttons = presence.resolve_activity().await.unwrap().buttons.unwrap();
        let labels: Vec<_> = buttons.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, ["A", "B", "C"]);
    }
}
