//! Telemetry recorder for the buttontalk turn pipeline.
//!
//! The hot-path API ([`Telemetry::mark`], [`Telemetry::value`],
//! [`Telemetry::span`]) never blocks: points go onto an unbounded queue and
//! a background task batches them into an append-only JSON-lines file. When
//! the recorder is disabled every call returns after a single branch and the
//! metrics file is never created.

#![deny(unused_crate_dependencies)]

mod config;
mod point;
mod recorder;
mod sink;

pub use config::TelemetryConfig;
pub use point::{Attributes, MetricKind, MetricPoint};
pub use recorder::{SpanGuard, Telemetry};
