//! Backlight animations and status text over a [`DisplaySurface`].
//!
//! The pulse runs as its own task and is stopped through a cancellation
//! token; the turn logic never waits on it except in [`stop_pulse`], which
//! bounds the wait. Display failures are logged and otherwise ignored: the
//! indicator is cosmetic and must not break a turn.
//!
//! [`stop_pulse`]: DisplayFeedbackController::stop_pulse

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use buttontalk_core::{DisplayError, DisplaySurface, Rgb};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Character capacity of the display (two rows of sixteen).
pub const DISPLAY_CHARS: usize = 32;

/// Time between two brightness updates of the pulse.
pub const PULSE_STEP: Duration = Duration::from_millis(50);

/// How long `stop_pulse` waits for the animation task to exit.
const PULSE_STOP_TIMEOUT: Duration = Duration::from_millis(500);

/// Snapshot of the pulse animation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PulseState {
    pub active: bool,
    /// Color restored when the pulse stops.
    pub base: Rgb,
    /// Current brightness factor in `0.0..=1.0`.
    pub intensity: f32,
}

/// Pulse snapshot plus the generation of the pulse that owns it.
///
/// Only the pulse whose generation matches may write intensity or restore
/// the base color. Surface color writes happen under this lock.
struct PulseShared {
    view: PulseState,
    generation: u64,
}

struct PulseTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
    generation: u64,
}

/// Drives the status display and backlight.
pub struct DisplayFeedbackController {
    surface: Arc<dyn DisplaySurface>,
    state: Arc<Mutex<PulseShared>>,
    pulse: Mutex<Option<PulseTask>>,
}

impl DisplayFeedbackController {
    #[must_use]
    pub fn new(surface: Arc<dyn DisplaySurface>) -> Self {
        Self {
            surface,
            state: Arc::new(Mutex::new(PulseShared {
                view: PulseState {
                    active: false,
                    base: Rgb::BLUE,
                    intensity: 1.0,
                },
                generation: 0,
            })),
            pulse: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn pulse_state(&self) -> PulseState {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).view
    }

    #[must_use]
    pub fn is_pulsing(&self) -> bool {
        self.pulse_state().active
    }

    /// Start ramping `color` from dark to full and back once per `period`.
    ///
    /// A no-op while a pulse is already running. Must be called from within
    /// a tokio runtime.
    pub fn start_pulse(&self, color: Rgb, period: Duration) {
        let mut slot = self.pulse.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|task| !task.handle.is_finished()) {
            tracing::debug!("Pulse already running");
            return;
        }

        let generation = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            state.generation += 1;
            state.view = PulseState {
                active: true,
                base: color,
                intensity: 0.0,
            };
            state.generation
        };

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_pulse(
            Arc::clone(&self.surface),
            Arc::clone(&self.state),
            color,
            ramp_steps(period),
            PulseGuard {
                cancel: cancel.clone(),
                generation,
            },
        ));
        *slot = Some(PulseTask {
            cancel,
            handle,
            generation,
        });
        tracing::debug!(%color, ?period, "Pulse started");
    }

    /// Stop the pulse and restore its base color.
    ///
    /// Idempotent: the base color is written once per started pulse, and
    /// calls without a running pulse do nothing.
    pub async fn stop_pulse(&self) {
        let task = self
            .pulse
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(task) = task else {
            return;
        };

        task.cancel.cancel();
        let abort = task.handle.abort_handle();
        if tokio::time::timeout(PULSE_STOP_TIMEOUT, task.handle)
            .await
            .is_err()
        {
            tracing::warn!("Pulse task did not stop within {PULSE_STOP_TIMEOUT:?}");
            abort.abort();
        }

        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.generation != task.generation {
            tracing::debug!("Pulse replaced while stopping; leaving the new one alone");
            return;
        }
        state.view.active = false;
        state.view.intensity = 1.0;
        let base = state.view.base;
        log_failure("restore pulse color", self.surface.set_color(base));
        drop(state);
        tracing::debug!(%base, "Pulse stopped");
    }

    /// Set a steady backlight color. It also becomes the fade-out color.
    pub fn set_color(&self, color: Rgb) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.view.base = color;
        log_failure("set color", self.surface.set_color(color));
    }

    /// Replace the text with the first 32 characters of `text`.
    pub fn write(&self, text: &str) {
        let visible: String = text.chars().take(DISPLAY_CHARS).collect();
        self.render(&visible);
    }

    /// Replace the text with the last 32 characters of `text`.
    ///
    /// Used for live transcripts, where the newest words matter.
    pub fn write_tail(&self, text: &str) {
        let skip = text.chars().count().saturating_sub(DISPLAY_CHARS);
        let visible: String = text.chars().skip(skip).collect();
        self.render(&visible);
    }

    pub fn clear(&self) {
        log_failure("clear", self.surface.clear());
    }

    pub fn off(&self) {
        log_failure("backlight off", self.surface.off());
    }

    /// Ramp the backlight from dark up to `color` in `steps` steps.
    pub async fn fade_in(&self, color: Rgb, duration: Duration, steps: u32) {
        let steps = steps.max(1);
        let pause = duration / steps;
        for i in 0..=steps {
            log_failure("fade in", self.surface.set_color(color.scaled(ratio(i, steps))));
            tokio::time::sleep(pause).await;
        }
        self.set_color(color);
    }

    /// Ramp the current color down to dark, then switch the backlight off.
    pub async fn fade_out(&self, duration: Duration, steps: u32) {
        let steps = steps.max(1);
        let pause = duration / steps;
        let color = self.pulse_state().base;
        for i in (0..=steps).rev() {
            log_failure("fade out", self.surface.set_color(color.scaled(ratio(i, steps))));
            tokio::time::sleep(pause).await;
        }
        self.off();
    }

    fn render(&self, text: &str) {
        tracing::debug!(%text, "Display text");
        log_failure("clear", self.surface.clear());
        log_failure("write", self.surface.write_text(text));
    }
}

impl Drop for DisplayFeedbackController {
    fn drop(&mut self) {
        if let Some(task) = self
            .pulse
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            task.cancel.cancel();
        }
    }
}

/// Steps in one half of the period (dark → full).
fn ramp_steps(period: Duration) -> u32 {
    let half = period / 2;
    let steps = half.as_millis() / PULSE_STEP.as_millis();
    u32::try_from(steps).unwrap_or(u32::MAX).max(1)
}

/// Brightness steps of one period: up from dark to full, back down to just
/// above dark. Cycling it visits dark once per period.
fn ramp(steps: u32) -> impl Iterator<Item = u32> + Clone {
    (0..steps).chain((1..=steps).rev())
}

#[allow(clippy::cast_precision_loss)]
fn ratio(i: u32, steps: u32) -> f32 {
    i as f32 / steps as f32
}

struct PulseGuard {
    cancel: CancellationToken,
    generation: u64,
}

async fn run_pulse(
    surface: Arc<dyn DisplaySurface>,
    state: Arc<Mutex<PulseShared>>,
    color: Rgb,
    steps: u32,
    guard: PulseGuard,
) {
    for i in ramp(steps).cycle() {
        let intensity = ratio(i, steps);
        {
            let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
            if guard.cancel.is_cancelled() || state.generation != guard.generation {
                return;
            }
            state.view.intensity = intensity;
            log_failure("pulse", surface.set_color(color.scaled(intensity)));
        }

        tokio::select! {
            () = guard.cancel.cancelled() => return,
            () = tokio::time::sleep(PULSE_STEP) => {}
        }
    }
}

fn log_failure(what: &str, result: Result<(), DisplayError>) {
    if let Err(e) = result {
        tracing::debug!(error = %e, "Display {what} failed");
    }
}
