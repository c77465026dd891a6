//! Loosely-shaped construction input.
//!
//! Callers historically supplied presence data under a number of alternate
//! key names (`title` for `state`, `image` for `largeImage`, nested
//! `assets`/`timestamps` groups). Construction accepts all of them and never
//! fails: missing fields stay unset, unrecognized fields are ignored, and
//! scalar non-string text values are coerced to their string representation.

use serde::Deserialize;
use serde_json::Value;

use super::document::DEFAULT_BUTTON_URL;

/// Input record for building a [`RichPresence`](super::RichPresence).
///
/// When several synonyms for the same field are present, the first in the
/// documented precedence order wins (`state` over `title`, `startTimestamp`
/// over `timestamp` over `timestamps.start`, and so on).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PresenceInput {
    #[serde(rename = "clientID")]
    pub client_id: Option<String>,
    pub transport: Option<String>,

    pub state: Option<String>,
    pub title: Option<String>,
    pub details: Option<String>,
    pub description: Option<String>,

    /// Epoch milliseconds.
    pub start_timestamp: Option<i64>,
    pub timestamp: Option<i64>,
    pub end_timestamp: Option<i64>,
    pub timestamps: Option<TimestampsInput>,

    pub large_image: Option<String>,
    pub image: Option<String>,
    pub large_image_text: Option<String>,
    pub image_text: Option<String>,
    pub small_image: Option<String>,
    pub small_image_text: Option<String>,
    pub assets: Option<AssetsInput>,

    pub buttons: Vec<ButtonInput>,
    pub metadata: Option<MetadataInput>,

    /// Seconds already elapsed; implies a start timestamp of now minus this.
    pub elapsed_time: Option<f64>,
    /// Seconds remaining; implies an end timestamp of now plus this.
    pub time_left: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TimestampsInput {
    pub start: Option<i64>,
    pub end: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AssetsInput {
    pub large_image: Option<String>,
    pub large_text: Option<String>,
    pub small_image: Option<String>,
    pub small_text: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MetadataInput {
    pub button_urls: Vec<String>,
}

/// A button given either as a bare label (paired positionally with
/// `metadata.button_urls`, or falling back to the placeholder url) or as a
/// full `{label, url}` record.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ButtonInput {
    Label(String),
    Full {
        label: String,
        #[serde(default = "default_button_url")]
        url: String,
    },
}

fn default_button_url() -> String {
    DEFAULT_BUTTON_URL.to_owned()
}

impl PresenceInput {
    /// Permissive extraction from arbitrary JSON. Unlike deserializing into
    /// the typed struct, this cannot fail: wrong-typed fields degrade to
    /// absence, and scalar text fields accept numbers and booleans.
    pub fn from_value(value: &Value) -> Self {
        let Some(map) = value.as_object() else {
            return Self::default();
        };

        let text = |key: &str| map.get(key).and_then(coerce_text);
        let millis = |key: &str| map.get(key).and_then(coerce_millis);
        let seconds = |key: &str| map.get(key).and_then(Value::as_f64);

        let timestamps = map.get("timestamps").and_then(Value::as_object).map(|t| {
            TimestampsInput {
                start: t.get("start").and_then(coerce_millis),
                end: t.get("end").and_then(coerce_millis),
            }
        });

        let assets = map.get("assets").and_then(Value::as_object).map(|a| {
            AssetsInput {
                large_image: a.get("large_image").and_then(coerce_text),
                large_text: a.get("large_text").and_then(coerce_text),
                small_image: a.get("small_image").and_then(coerce_text),
                small_text: a.get("small_text").and_then(coerce_text),
            }
        });

        let buttons = map
            .get("buttons")
            .and_then(Value::as_array)
            .map(|entries| entries.iter().filter_map(coerce_button).collect())
            .unwrap_or_default();

        let metadata = map.get("metadata").and_then(Value::as_object).map(|m| {
            MetadataInput {
                button_urls: m
                    .get("button_urls")
                    .and_then(Value::as_array)
                    .map(|urls| urls.iter().filter_map(coerce_text).collect())
                    .unwrap_or_default(),
            }
        });

        Self {
            client_id: text("clientID"),
            transport: text("transport"),
            state: text("state"),
            title: text("title"),
            details: text("details"),
            description: text("description"),
            start_timestamp: millis("startTimestamp"),
            timestamp: millis("timestamp"),
            end_timestamp: millis("endTimestamp"),
            timestamps,
            large_image: text("largeImage"),
            image: text("image"),
            large_image_text: text("largeImageText"),
            image_text: text("imageText"),
            small_image: text("smallImage"),
            small_image_text: text("smallImageText"),
            assets,
            buttons,
            metadata,
            elapsed_time: seconds("elapsedTime"),
            time_left: seconds("timeLeft"),
        }
    }
}

impl From<&Value> for PresenceInput {
    fn from(value: &Value) -> Self {
        Self::from_value(value)
    }
}

impl From<Value> for PresenceInput {
    fn from(value: Value) -> Self {
        Self::from_value(&value)
    }
}

fn coerce_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

fn coerce_millis(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| value.as_f64().map(|f| f as i64))
}

fn coerce_button(value: &Value) -> Option<ButtonInput> {
    match value {
        Value::String(label) if !label.is_empty() => Some(ButtonInput::Label(label.clone())),
        Value::Object(map) => Some(ButtonInput::Full {
            label: map.get("label").and_then(coerce_text)?,
            url: map
                .get("url")
                .and_then(coerce_text)
                .unwrap_or_else(default_button_url),
        }),
        _ => None,
    }
}
