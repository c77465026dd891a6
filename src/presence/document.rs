//! The fluent presence document: construction from loose input, mutation,
//! submission, and interval scheduling.

use std::fmt;
use std::future::IntoFuture;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::input::{ButtonInput, PresenceInput};
use crate::error::PresenceError;
use crate::rpc::registry::{ClientBinding, ClientRegistry};
use crate::value::{now_millis, Seconds, TextValue, TimeValue};

/// Url a button falls back to when none was supplied.
pub const DEFAULT_BUTTON_URL: &str = "https://discord.com";

/// Default period between interval submissions.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(15_000);

/// Ceiling of the wire format's timestamp field, in epoch milliseconds.
/// Computed instants are clamped here so the receiving system never sees an
/// overflowing value.
pub(crate) const MAX_TIMESTAMP_MILLIS: i64 = 2_147_483_647_000;

#[derive(Debug, Clone, Default)]
pub(crate) struct Fields {
    pub(crate) state: Option<TextValue>,
    pub(crate) details: Option<TextValue>,
    pub(crate) start_timestamp: Option<TimeValue>,
    pub(crate) end_timestamp: Option<TimeValue>,
    pub(crate) large_image: Option<TextValue>,
    pub(crate) large_image_text: Option<TextValue>,
    pub(crate) small_image: Option<TextValue>,
    pub(crate) small_image_text: Option<TextValue>,
    pub(crate) buttons: Vec<ButtonSpec>,
}

#[derive(Debug, Clone)]
pub(crate) struct ButtonSpec {
    pub(crate) label: TextValue,
    pub(crate) url: TextValue,
}

fn non_empty(text: Option<String>) -> Option<String> {
    text.filter(|value| !value.is_empty())
}

impl Fields {
    fn from_input(input: PresenceInput) -> Self {
        let now = now_millis();

        let (asset_large, asset_large_text, asset_small, asset_small_text) = match input.assets {
            Some(assets) => (
                assets.large_image,
                assets.large_text,
                assets.small_image,
                assets.small_text,
            ),
            None => (None, None, None, None),
        };
        let (nested_start, nested_end) = match input.timestamps {
            Some(timestamps) => (timestamps.start, timestamps.end),
            None => (None, None),
        };

        let mut start = input.start_timestamp.or(input.timestamp).or(nested_start);
        if start.is_none() {
            if let Some(seconds) = input.elapsed_time {
                start = Some(now.saturating_sub((seconds * 1000.0) as i64));
            }
        }
        let mut end = input.end_timestamp.or(nested_end);
        if end.is_none() {
            if let Some(seconds) = input.time_left {
                end = Some(now.saturating_add((seconds * 1000.0) as i64));
            }
        }

        let button_urls = input.metadata.map(|m| m.button_urls).unwrap_or_default();
        let buttons = input
            .buttons
            .into_iter()
            .enumerate()
            .map(|(index, button)| match button {
                ButtonInput::Label(label) => ButtonSpec {
                    label: TextValue::Literal(label),
                    url: TextValue::Literal(
                        button_urls
                            .get(index)
                            .cloned()
                            .unwrap_or_else(|| DEFAULT_BUTTON_URL.to_owned()),
                    ),
                },
                ButtonInput::Full { label, url } => ButtonSpec {
                    label: TextValue::Literal(label),
                    url: TextValue::Literal(url),
                },
            })
            .collect();

        Self {
            state: non_empty(input.state)
                .or_else(|| non_empty(input.title))
                .map(TextValue::Literal),
            details: non_empty(input.details)
                .or_else(|| non_empty(input.description))
                .map(TextValue::Literal),
            start_timestamp: start.map(TimeValue::Literal),
            end_timestamp: end.map(TimeValue::Literal),
            large_image: non_empty(input.large_image)
                .or_else(|| non_empty(input.image))
                .or_else(|| non_empty(asset_large))
                .map(TextValue::Literal),
            large_image_text: non_empty(input.large_image_text)
                .or_else(|| non_empty(input.image_text))
                .or_else(|| non_empty(asset_large_text))
                .map(TextValue::Literal),
            small_image: non_empty(input.small_image)
                .or_else(|| non_empty(asset_small))
                .map(TextValue::Literal),
            small_image_text: non_empty(input.small_image_text)
                .or_else(|| non_empty(asset_small_text))
                .map(TextValue::Literal),
            buttons,
        }
    }
}

struct DocumentInner {
    registry: ClientRegistry,
    binding: Option<ClientBinding>,
    fields: RwLock<Fields>,
    submitted: AtomicBool,
    interval: AtomicBool,
    interval_task: Mutex<Option<JoinHandle<()>>>,
}

/// A mutable presence document. Cheap to clone; clones share the same
/// underlying document, which is how the interval task and the caller observe
/// one another's state.
#[derive(Clone)]
pub struct RichPresence {
    inner: Arc<DocumentInner>,
}

impl RichPresence {
    pub(crate) fn from_parts(
        registry: ClientRegistry,
        binding: Option<ClientBinding>,
        input: PresenceInput,
    ) -> Self {
        Self {
            inner: Arc::new(DocumentInner {
                registry,
                binding,
                fields: RwLock::new(Fields::from_input(input)),
                submitted: AtomicBool::new(false),
                interval: AtomicBool::new(false),
                interval_task: Mutex::new(None),
            }),
        }
    }

    pub(crate) fn fields_snapshot(&self) -> Fields {
        self.inner.fields.read().clone()
    }

    /// Whether this document is a server-acknowledged snapshot (or a counted
    /// interval that has run out). Terminal documents no longer submit.
    pub fn is_submitted(&self) -> bool {
        self.inner.submitted.load(Ordering::SeqCst)
    }

    pub fn has_active_interval(&self) -> bool {
        self.inner.interval.load(Ordering::SeqCst)
    }

    /// The application id submissions will connect under.
    pub fn application_id(&self) -> String {
        match &self.inner.binding {
            Some(binding) => binding.application_id.clone(),
            None => self.inner.registry.default_application_id().to_owned(),
        }
    }

    /// Set the state line.
    pub fn set_state(&self, text: impl Into<TextValue>) -> &Self {
        self.inner.fields.write().state = Some(text.into());
        self
    }

    /// Set the details line.
    pub fn set_details(&self, text: impl Into<TextValue>) -> &Self {
        self.inner.fields.write().details = Some(text.into());
        self
    }

    /// Alias for [`set_details`](Self::set_details).
    pub fn set_description(&self, text: impl Into<TextValue>) -> &Self {
        self.set_details(text)
    }

    /// Set the large image key and its hover text. Either part is skipped
    /// when the supplied literal is empty, so prior values stay untouched.
    pub fn set_large_image(&self, icon: impl Into<TextValue>, text: impl Into<TextValue>) -> &Self {
        let icon = icon.into();
        let text = text.into();
        let mut fields = self.inner.fields.write();
        if !icon.is_empty_literal() {
            fields.large_image = Some(icon);
        }
        if !text.is_empty_literal() {
            fields.large_image_text = Some(text);
        }
        drop(fields);
        self
    }

    /// Set the small image key and its hover text. Same empty-argument rule
    /// as [`set_large_image`](Self::set_large_image).
    pub fn set_small_image(&self, icon: impl Into<TextValue>, text: impl Into<TextValue>) -> &Self {
        let icon = icon.into();
        let text = text.into();
        let mut fields = self.inner.fields.write();
        if !icon.is_empty_literal() {
            fields.small_image = Some(icon);
        }
        if !text.is_empty_literal() {
            fields.small_image_text = Some(text);
        }
        drop(fields);
        self
    }

    pub fn set_start_timestamp(&self, time: impl Into<TimeValue>) -> &Self {
        self.inner.fields.write().start_timestamp = Some(time.into());
        self
    }

    /// Alias for [`set_start_timestamp`](Self::set_start_timestamp).
    pub fn set_timestamp(&self, time: impl Into<TimeValue>) -> &Self {
        self.set_start_timestamp(time)
    }

    pub fn set_end_timestamp(&self, time: impl Into<TimeValue>) -> &Self {
        self.inner.fields.write().end_timestamp = Some(time.into());
        self
    }

    /// Shortcut for the start timestamp: `time` seconds already elapsed.
    /// Producers are evaluated immediately against the document. A produced
    /// value at or beyond the current instant is ignored, so a nonsensical
    /// future "elapsed" never moves the start timestamp.
    pub fn set_elapsed_time(&self, time: impl Into<Seconds>) -> &Self {
        let millis = time.into().eval(self) * 1000.0;
        let now = now_millis();
        if millis.is_finite() && (millis as i64) < now {
            self.inner.fields.write().start_timestamp = Some(TimeValue::Literal(
                now.saturating_sub(millis as i64).min(MAX_TIMESTAMP_MILLIS),
            ));
        }
        self
    }

    /// Shortcut for the end timestamp: `time` seconds remaining.
    pub fn set_time_left(&self, time: impl Into<Seconds>) -> &Self {
        let millis = time.into().eval(self) * 1000.0;
        if millis.is_finite() {
            let end = (now_millis() as f64 + millis).min(MAX_TIMESTAMP_MILLIS as f64) as i64;
            self.inner.fields.write().end_timestamp = Some(TimeValue::Literal(end));
        }
        self
    }

    /// Append a button opening [`DEFAULT_BUTTON_URL`].
    pub fn add_button(&self, label: impl Into<TextValue>) -> &Self {
        self.add_button_with_url(label, DEFAULT_BUTTON_URL)
    }

    /// Append a button. Buttons keep their insertion order in the payload.
    pub fn add_button_with_url(
        &self,
        label: impl Into<TextValue>,
        url: impl Into<TextValue>,
    ) -> &Self {
        self.inner.fields.write().buttons.push(ButtonSpec {
            label: label.into(),
            url: url.into(),
        });
        self
    }

    /// Append a button with a zero-width-space label.
    pub fn add_blank_button(&self, url: impl Into<TextValue>) -> &Self {
        self.add_button_with_url("\u{200b}", url)
    }

    /// Unset every field and drop all buttons. Submitting a cleared document
    /// sends the explicit clear signal.
    pub fn clear(&self) -> &Self {
        *self.inner.fields.write() = Fields::default();
        self
    }

    /// Resolve the document and send it to the peer.
    ///
    /// Returns a fresh, server-acknowledged snapshot built from the peer's
    /// response; the snapshot is terminal and re-submitting it is a no-op.
    /// Calling this on a terminal document, or while an interval is driving
    /// this document, returns the document unchanged without issuing a
    /// request.
    pub async fn submit(&self) -> Result<RichPresence, PresenceError> {
        if self.inner.interval.load(Ordering::SeqCst) || self.inner.submitted.load(Ordering::SeqCst)
        {
            tracing::debug!("Skipping submit: presence is terminal or interval-bound");
            return Ok(self.clone());
        }

        let ack = self.send_activity().await?;
        Ok(self.snapshot_from_ack(&ack))
    }

    /// One resolve-and-send pass, bypassing the terminal/interval gates.
    /// Interval ticks use this directly and get the raw acknowledgement.
    async fn send_activity(&self) -> Result<Value, PresenceError> {
        let (peer, application_id) = self.inner.registry.peer_for(self.inner.binding.as_ref());
        peer.ensure_connected(&application_id).await?;

        let activity = self.resolve_activity().await;
        tracing::debug!(
            "Sending activity update for {} (clear: {})",
            application_id,
            activity.is_none()
        );
        peer.set_activity(self.inner.registry.pid(), activity.as_ref())
            .await
    }

    fn snapshot_from_ack(&self, ack: &Value) -> RichPresence {
        let snapshot = RichPresence::from_parts(
            self.inner.registry.clone(),
            self.inner.binding.clone(),
            PresenceInput::from_value(ack),
        );
        snapshot.inner.submitted.store(true, Ordering::SeqCst);
        snapshot
    }

    /// Submit now and keep re-submitting every `period` (15 s when absent).
    ///
    /// Each tick re-resolves every deferred field, so producers can vary the
    /// presence over time. With `times` the document turns terminal once that
    /// many submissions have gone out, the immediate first one included;
    /// without it the interval runs until [`Self::cancel_interval`]. A failed
    /// tick is logged and ticking continues. Returns the acknowledgement of
    /// the immediate first send; on a terminal or already interval-bound
    /// document this is a no-op returning `Value::Null`.
    pub async fn repeat(
        &self,
        times: Option<u32>,
        period: Option<Duration>,
    ) -> Result<Value, PresenceError> {
        if self.inner.submitted.load(Ordering::SeqCst)
            || self.inner.interval.swap(true, Ordering::SeqCst)
        {
            tracing::debug!("Ignoring repeat() on a terminal or interval-bound presence");
            return Ok(Value::Null);
        }

        let times = times.map(|count| count.max(1));
        let period = period.unwrap_or(DEFAULT_INTERVAL);

        if times != Some(1) {
            let presence = self.clone();
            let remaining = times.map(|count| count.saturating_sub(1));
            let task = tokio::spawn(async move {
                let mut ticker = tokio::time::interval(period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                // An interval's first tick completes immediately; the
                // caller's own immediate send covers that one.
                ticker.tick().await;

                let mut sent = 0u32;
                loop {
                    ticker.tick().await;
                    if let Err(error) = presence.send_activity().await {
                        tracing::warn!("Presence interval tick failed: {}", error);
                    }
                    sent = sent.saturating_add(1);
                    if remaining.is_some_and(|count| sent >= count) {
                        presence.inner.submitted.store(true, Ordering::SeqCst);
                        break;
                    }
                }
            });
            *self.inner.interval_task.lock() = Some(task);
        }

        let first = self.send_activity().await;
        if times == Some(1) {
            self.inner.submitted.store(true, Ordering::SeqCst);
        }
        first
    }

    /// Stop a running interval. Returns whether one was running.
    pub fn cancel_interval(&self) -> bool {
        let task = self.inner.interval_task.lock().take();
        match task {
            Some(task) => {
                task.abort();
                self.inner.interval.store(false, Ordering::SeqCst);
                tracing::debug!("Presence interval cancelled");
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for RichPresence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RichPresence")
            .field("fields", &*self.inner.fields.read())
            .field("submitted", &self.is_submitted())
            .field("interval", &self.has_active_interval())
            .finish()
    }
}

/// Awaiting a document submits it once. The handle is consumed, so the same
/// handle cannot accidentally submit twice; clone it first to keep working
/// with the document afterwards.
impl IntoFuture for RichPresence {
    type Output = Result<RichPresence, PresenceError>;
    type IntoFuture = BoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move { self.submit().await })
    }
}
