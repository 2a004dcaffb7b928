//! Metric points and their on-disk record shape.

use std::borrow::Cow;
use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

/// What a metric point measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    /// A moment in time; no payload.
    Mark,
    /// A duration in seconds.
    Span,
    /// An arbitrary number.
    Value,
}

/// Free-form attributes attached to a point.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Attributes(BTreeMap<String, Value>);

impl Attributes {
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One immutable telemetry event.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricPoint {
    /// Monotonic nanoseconds since the recorder was created.
    pub t_ns: u64,
    pub name: Cow<'static, str>,
    pub kind: MetricKind,
    /// Seconds for spans, arbitrary for values, `None` for marks.
    pub value: Option<f64>,
    pub extra: Attributes,
}

/// Serialized line layout: the timestamp appears both as integer
/// nanoseconds and as float seconds.
#[derive(Serialize)]
struct Record<'a> {
    t_ns: u64,
    t: f64,
    name: &'a str,
    kind: MetricKind,
    value: Option<f64>,
    extra: &'a Attributes,
}

impl MetricPoint {
    /// Encode as a single compact JSON line (without the trailing newline).
    pub fn to_json_line(&self) -> serde_json::Result<String> {
        #[allow(clippy::cast_precision_loss)]
        let t = self.t_ns as f64 / 1e9;
        serde_json::to_string(&Record {
            t_ns: self.t_ns,
            t,
            name: &self.name,
            kind: self.kind,
            value: self.value,
            extra: &self.extra,
        })
    }
}
