//! Background flush loop. Owns the metrics file for its whole lifetime.

use std::path::Path;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::point::MetricPoint;

pub(crate) async fn run_flush_loop(
    mut rx: mpsc::UnboundedReceiver<MetricPoint>,
    path: &Path,
    flush_interval: Duration,
    cancel: CancellationToken,
) {
    let mut buffer: Vec<MetricPoint> = Vec::new();
    let mut ticker = tokio::time::interval(flush_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            point = rx.recv() => match point {
                Some(point) => buffer.push(point),
                None => break,
            },
            _ = ticker.tick() => {
                if !buffer.is_empty() {
                    write_batch(path, &mut buffer).await;
                }
            }
        }
    }

    while let Ok(point) = rx.try_recv() {
        buffer.push(point);
    }
    if !buffer.is_empty() {
        write_batch(path, &mut buffer).await;
    }
    tracing::debug!(path = %path.display(), "Telemetry flush loop exited");
}

/// Append `buffer` as JSON lines and clear it. I/O failures drop the batch.
async fn write_batch(path: &Path, buffer: &mut Vec<MetricPoint>) {
    let mut payload = String::new();
    for point in buffer.drain(..) {
        match point.to_json_line() {
            Ok(line) => {
                payload.push_str(&line);
                payload.push('\n');
            }
            Err(e) => tracing::debug!(name = %point.name, "Skipping unencodable metric: {e}"),
        }
    }

    if let Err(e) = append(path, payload.as_bytes()).await {
        tracing::debug!(path = %path.display(), "Dropping telemetry batch: {e}");
    }
}

async fn append(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(bytes).await?;
    file.flush().await
}
