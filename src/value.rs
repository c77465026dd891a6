//! Deferred field values.
//!
//! Every presence field can hold either a literal value or a producer that is
//! invoked against the owning document on every submission attempt. Producers
//! are never cached across attempts, so an interval-bound presence re-resolves
//! each field on every tick.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;

use crate::presence::RichPresence;

/// Current wall-clock time as epoch milliseconds.
pub(crate) fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// A text field: a literal string, or a producer resolved per submission.
#[derive(Clone)]
pub enum TextValue {
    Literal(String),
    Deferred(Arc<dyn Fn(&RichPresence) -> String + Send + Sync>),
    DeferredAsync(Arc<dyn Fn(&RichPresence) -> BoxFuture<'static, String> + Send + Sync>),
}

impl TextValue {
    /// Wrap a synchronous producer.
    pub fn deferred<F>(producer: F) -> Self
    where
        F: Fn(&RichPresence) -> String + Send + Sync + 'static,
    {
        Self::Deferred(Arc::new(producer))
    }

    /// Wrap an asynchronous producer. The future may not borrow the document;
    /// clone the handle into the future if it needs to read fields.
    pub fn deferred_async<F, Fut>(producer: F) -> Self
    where
        F: Fn(&RichPresence) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = String> + Send + 'static,
    {
        Self::DeferredAsync(Arc::new(move |presence| Box::pin(producer(presence))))
    }

    pub(crate) fn is_empty_literal(&self) -> bool {
        matches!(self, Self::Literal(text) if text.is_empty())
    }

    pub(crate) async fn resolve(&self, presence: &RichPresence) -> String {
        match self {
            Self::Literal(text) => text.clone(),
            Self::Deferred(producer) => producer(presence),
            Self::DeferredAsync(producer) => producer(presence).await,
        }
    }
}

impl fmt::Debug for TextValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(text) => f.debug_tuple("Literal").field(text).finish(),
            Self::Deferred(_) => f.write_str("Deferred(..)"),
            Self::DeferredAsync(_) => f.write_str("DeferredAsync(..)"),
        }
    }
}

impl From<&str> for TextValue {
    fn from(text: &str) -> Self {
        Self::Literal(text.to_owned())
    }
}

impl From<String> for TextValue {
    fn from(text: String) -> Self {
        Self::Literal(text)
    }
}

/// A timestamp field in epoch milliseconds. Producers return `None` when they
/// cannot yield a number, which omits the field from the payload entirely.
#[derive(Clone)]
pub enum TimeValue {
    Literal(i64),
    Deferred(Arc<dyn Fn(&RichPresence) -> Option<i64> + Send + Sync>),
    DeferredAsync(Arc<dyn Fn(&RichPresence) -> BoxFuture<'static, Option<i64>> + Send + Sync>),
}

impl TimeValue {
    pub fn deferred<F>(producer: F) -> Self
    where
        F: Fn(&RichPresence) -> Option<i64> + Send + Sync + 'static,
    {
        Self::Deferred(Arc::new(producer))
    }

    pub fn deferred_async<F, Fut>(producer: F) -> Self
    where
        F: Fn(&RichPresence) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<i64>> + Send + 'static,
    {
        Self::DeferredAsync(Arc::new(move |presence| Box::pin(producer(presence))))
    }

    pub(crate) async fn resolve(&self, presence: &RichPresence) -> Option<i64> {
        match self {
            Self::Literal(millis) => Some(*millis),
            Self::Deferred(producer) => producer(presence),
            Self::DeferredAsync(producer) => producer(presence).await,
        }
    }
}

impl fmt::Debug for TimeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(millis) => f.debug_tuple("Literal").field(millis).finish(),
            Self::Deferred(_) => f.write_str("Deferred(..)"),
            Self::DeferredAsync(_) => f.write_str("DeferredAsync(..)"),
        }
    }
}

impl From<i64> for TimeValue {
    fn from(millis: i64) -> Self {
        Self::Literal(millis)
    }
}

impl From<DateTime<Utc>> for TimeValue {
    fn from(instant: DateTime<Utc>) -> Self {
        Self::Literal(instant.timestamp_millis())
    }
}

impl From<SystemTime> for TimeValue {
    fn from(instant: SystemTime) -> Self {
        Self::Literal(DateTime::<Utc>::from(instant).timestamp_millis())
    }
}

/// Argument to the elapsed-time and time-left shorthands: a literal seconds
/// value, or a producer evaluated immediately against the document.
pub enum Seconds {
    Literal(f64),
    Deferred(Box<dyn Fn(&RichPresence) -> f64 + Send + Sync>),
}

impl Seconds {
    pub fn deferred<F>(producer: F) -> Self
    where
        F: Fn(&RichPresence) -> f64 + Send + Sync + 'static,
    {
        Self::Deferred(Box::new(producer))
    }

    pub(crate) fn eval(&self, presence: &RichPresence) -> f64 {
        match self {
            Self::Literal(seconds) => *seconds,
            Self::Deferred(producer) => producer(presence),
        }
    }
}

impl From<f64> for Seconds {
    fn from(seconds: f64) -> Self {
        Self::Literal(seconds)
    }
}

impl From<i32> for Seconds {
    fn from(seconds: i32) -> Self {
        Self::Literal(f64::from(seconds))
    }
}

impl From<i64> for Seconds {
    fn from(seconds: i64) -> Self {
        Self::Literal(seconds as f64)
    }
}

impl From<u32> for Seconds {
    fn from(seconds: u32) -> Self {
        Self::Literal(f64::from(seconds))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_conversions() {
        assert!(matches!(TextValue::from("hi"), TextValue::Literal(s) if s == "hi"));
        assert!(matches!(TimeValue::from(1500i64), TimeValue::Literal(1500)));

        let epoch = DateTime::<Utc>::from_timestamp_millis(1_700_000_000_000).unwrap();
        assert!(matches!(
            TimeValue::from(epoch),
            TimeValue::Literal(1_700_000_000_000)
        ));
    }

    #[test]
    fn empty_literal_detection() {
        assert!(TextValue::from("").is_empty_literal());
        assert!(!TextValue::from("x").is_empty_literal());
        assert!(!TextValue::deferred(|_| String::new()).is_empty_literal());
    }
}
