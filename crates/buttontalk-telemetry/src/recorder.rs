//! The cloneable telemetry handle and its span guard.

use std::borrow::Cow;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::TelemetryConfig;
use crate::point::{Attributes, MetricKind, MetricPoint};
use crate::sink::run_flush_loop;

/// How long [`Telemetry::shutdown`] waits for the final flush.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// Handle to the telemetry recorder.
///
/// Cloning is cheap; all clones feed the same queue. A disabled handle holds
/// nothing and every method returns immediately.
#[derive(Clone, Default)]
pub struct Telemetry {
    inner: Option<Arc<Inner>>,
}

struct Inner {
    tx: mpsc::UnboundedSender<MetricPoint>,
    origin: Instant,
    config: TelemetryConfig,
    cancel: CancellationToken,
    /// Held until `start` hands it to the flush task.
    rx: Mutex<Option<mpsc::UnboundedReceiver<MetricPoint>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for Telemetry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Telemetry")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

impl Telemetry {
    /// A recorder that records nothing and never touches the filesystem.
    #[must_use]
    pub const fn disabled() -> Self {
        Self { inner: None }
    }

    /// Create a recorder. Points are queued immediately but only written
    /// once [`Telemetry::start`] has spawned the flush task.
    #[must_use]
    pub fn new(config: TelemetryConfig) -> Self {
        if !config.enabled {
            return Self::disabled();
        }
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            inner: Some(Arc::new(Inner {
                tx,
                origin: Instant::now(),
                config,
                cancel: CancellationToken::new(),
                rx: Mutex::new(Some(rx)),
                worker: Mutex::new(None),
            })),
        }
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    /// Spawn the background flush task. Calling it again is a no-op.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) {
        let Some(inner) = &self.inner else {
            return;
        };
        let Some(rx) = inner
            .rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            return;
        };

        let path = inner.config.path.clone();
        let interval = inner.config.flush_interval;
        let cancel = inner.cancel.clone();
        tracing::info!(path = %path.display(), ?interval, "Telemetry recorder started");

        let handle = tokio::spawn(async move {
            run_flush_loop(rx, &path, interval, cancel).await;
        });
        *inner.worker.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
    }

    /// Record a point in time.
    pub fn mark(&self, name: impl Into<Cow<'static, str>>, extra: Attributes) {
        if let Some(inner) = &self.inner {
            inner.push(name.into(), MetricKind::Mark, None, extra);
        }
    }

    /// Record an arbitrary number.
    pub fn value(&self, name: impl Into<Cow<'static, str>>, value: f64, extra: Attributes) {
        if let Some(inner) = &self.inner {
            inner.push(name.into(), MetricKind::Value, Some(value), extra);
        }
    }

    /// Record a duration measured elsewhere.
    pub fn record_span(
        &self,
        name: impl Into<Cow<'static, str>>,
        elapsed: Duration,
        extra: Attributes,
    ) {
        if let Some(inner) = &self.inner {
            inner.push(
                name.into(),
                MetricKind::Span,
                Some(elapsed.as_secs_f64()),
                extra,
            );
        }
    }

    /// Start timing; the span is recorded when the guard is dropped.
    #[must_use = "the span is recorded when the guard drops"]
    pub fn span(&self, name: impl Into<Cow<'static, str>>) -> SpanGuard {
        SpanGuard {
            active: self.inner.as_ref().map(|inner| ActiveSpan {
                inner: Arc::clone(inner),
                name: name.into(),
                started: Instant::now(),
                extra: Attributes::new(),
            }),
        }
    }

    /// Stop the flush task after a final flush. Waits at most one second.
    pub async fn shutdown(&self) {
        let Some(inner) = &self.inner else {
            return;
        };
        inner.cancel.cancel();
        let handle = inner
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if tokio::time::timeout(SHUTDOWN_TIMEOUT, handle).await.is_err() {
                tracing::warn!("Telemetry flush did not finish within {SHUTDOWN_TIMEOUT:?}");
            }
        }
    }
}

impl Inner {
    fn push(
        &self,
        name: Cow<'static, str>,
        kind: MetricKind,
        value: Option<f64>,
        extra: Attributes,
    ) {
        let t_ns = u64::try_from(self.origin.elapsed().as_nanos()).unwrap_or(u64::MAX);
        // A send error means the flush task is gone; telemetry never surfaces that.
        let _ = self.tx.send(MetricPoint {
            t_ns,
            name,
            kind,
            value,
            extra,
        });
    }
}

struct ActiveSpan {
    inner: Arc<Inner>,
    name: Cow<'static, str>,
    started: Instant,
    extra: Attributes,
}

/// Records a `span` point with the elapsed time when dropped.
pub struct SpanGuard {
    active: Option<ActiveSpan>,
}

impl SpanGuard {
    /// Attach an attribute to the pending span.
    pub fn attr(&mut self, key: &'static str, value: impl Into<serde_json::Value>) {
        if let Some(active) = &mut self.active {
            active.extra.insert(key, value);
        }
    }

    /// Record now instead of at scope end.
    pub fn finish(self) {}
}

impl Drop for SpanGuard {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            let elapsed = active.started.elapsed();
            active.inner.push(
                active.name,
                MetricKind::Span,
                Some(elapsed.as_secs_f64()),
                active.extra,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(dir: &tempfile::TempDir) -> TelemetryConfig {
        TelemetryConfig {
            enabled: true,
            path: dir.path().join("metrics.jsonl"),
            flush_interval: Duration::from_millis(20),
        }
    }

    #[test]
    fn disabled_handle_reports_disabled() {
        let telemetry = Telemetry::disabled();
        assert!(!telemetry.is_enabled());
        telemetry.mark("ignored", Attributes::new());
        let mut guard = telemetry.span("ignored");
        guard.attr("k", 1);
        guard.finish();
    }

    #[test]
    fn config_disabled_yields_disabled_handle() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(&dir);
        cfg.enabled = false;
        assert!(!Telemetry::new(cfg).is_enabled());
    }

    #[test]
    fn points_queue_in_order_before_start() {
        let dir = tempfile::tempdir().unwrap();
        let telemetry = Telemetry::new(config(&dir));
        telemetry.mark("a", Attributes::new());
        telemetry.value("b", 2.0, Attributes::new().with("unit", "chars"));
        telemetry.record_span("c", Duration::from_millis(250), Attributes::new());

        let inner = telemetry.inner.as_ref().unwrap();
        let mut rx = inner.rx.lock().unwrap().take().unwrap();
        let a = rx.try_recv().unwrap();
        let b = rx.try_recv().unwrap();
        let c = rx.try_recv().unwrap();

        assert_eq!(a.kind, MetricKind::Mark);
        assert_eq!(a.value, None);
        assert_eq!(b.value, Some(2.0));
        assert_eq!(b.extra.get("unit"), Some(&serde_json::json!("chars")));
        assert_eq!(c.kind, MetricKind::Span);
        assert!((c.value.unwrap() - 0.25).abs() < 1e-9);
        assert!(a.t_ns <= b.t_ns && b.t_ns <= c.t_ns);
    }

    #[test]
    fn span_guard_records_on_drop_with_attributes() {
        let dir = tempfile::tempdir().unwrap();
        let telemetry = Telemetry::new(config(&dir));
        {
            let mut guard = telemetry.span("tts.synthesize");
            guard.attr("seq", 3);
        }
        let inner = telemetry.inner.as_ref().unwrap();
        let mut rx = inner.rx.lock().unwrap().take().unwrap();
        let point = rx.try_recv().unwrap();
        assert_eq!(point.name, "tts.synthesize");
        assert_eq!(point.kind, MetricKind::Span);
        assert_eq!(point.extra.get("seq"), Some(&serde_json::json!(3)));
        assert!(rx.try_recv().is_err());
    }
}
