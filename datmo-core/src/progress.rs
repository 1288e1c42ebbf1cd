//! Progress reporting and cooperative cancellation.
//!
//! Every long-running stage takes a [`Progress`] implementation. It is polled
//! through [`enough::Stop::check`] at coarse checkpoints (per pyramid band,
//! per solver iteration, per block of scanlines) and receives progress values
//! through [`Progress::post`]. Cancellation is advisory: a stage may finish the
//! block it is in before it observes the request.

use core::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use enough::{Stop, StopReason, Unstoppable};

/// Default number of discrete progress units.
pub const DEFAULT_MAX_PROGRESS: u32 = 100;

/// A cancellation source that also accepts progress values.
pub trait Progress: Stop {
    /// Report progress in units of the receiver's declared maximum.
    fn post(&self, _value: u32) {}
}

impl Progress for Unstoppable {}

type Observer = Arc<dyn Fn(u32) + Send + Sync>;

struct TokenState {
    value: AtomicU32,
    maximum: AtomicU32,
    terminate: AtomicBool,
    observer: Option<Observer>,
}

/// Shared progress/cancellation handle.
///
/// Clones share state, so one clone can be handed to a worker while another
/// stays with the caller to request termination.
#[derive(Clone)]
pub struct ProgressToken {
    state: Arc<TokenState>,
}

impl ProgressToken {
    /// Create a token with the default maximum of 100 units.
    pub fn new() -> Self {
        Self::build(DEFAULT_MAX_PROGRESS, None)
    }

    /// Create a token that forwards every progress change to `observer`.
    pub fn with_observer(observer: impl Fn(u32) + Send + Sync + 'static) -> Self {
        Self::build(DEFAULT_MAX_PROGRESS, Some(Arc::new(observer)))
    }

    fn build(maximum: u32, observer: Option<Observer>) -> Self {
        Self {
            state: Arc::new(TokenState {
                value: AtomicU32::new(0),
                maximum: AtomicU32::new(maximum.max(1)),
                terminate: AtomicBool::new(false),
                observer,
            }),
        }
    }

    /// Declare the number of progress units.
    pub fn set_maximum(&self, maximum: u32) {
        self.state.maximum.store(maximum.max(1), Ordering::Relaxed);
    }

    /// Declared number of progress units.
    pub fn maximum(&self) -> u32 {
        self.state.maximum.load(Ordering::Relaxed)
    }

    /// Post a progress value, clamped to the declared maximum.
    pub fn post_progress(&self, value: u32) {
        let value = value.min(self.maximum());
        let previous = self.state.value.swap(value, Ordering::AcqRel);
        if previous != value {
            if let Some(observer) = &self.state.observer {
                observer(value);
            }
        }
    }

    /// Last posted progress value.
    pub fn progress(&self) -> u32 {
        self.state.value.load(Ordering::Acquire)
    }

    /// Ask the computation holding this token to stop.
    pub fn request_termination(&self) {
        self.state.terminate.store(true, Ordering::Release);
    }

    /// Whether termination has been requested.
    pub fn is_termination_requested(&self) -> bool {
        self.state.terminate.load(Ordering::Acquire)
    }
}

impl Default for ProgressToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ProgressToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressToken")
            .field("value", &self.progress())
            .field("maximum", &self.maximum())
            .field("terminate", &self.is_termination_requested())
            .field("observer", &self.state.observer.is_some())
            .finish()
    }
}

impl Stop for ProgressToken {
    fn check(&self) -> Result<(), StopReason> {
        if self.is_termination_requested() {
            Err(StopReason::Cancelled)
        } else {
            Ok(())
        }
    }
}

impl Progress for ProgressToken {
    fn post(&self, value: u32) {
        self.post_progress(value);
    }
}

/// Maps a stage's local 0..=100 progress onto a sub-range of a parent.
pub struct ProgressBand<'a, P: Progress> {
    inner: &'a P,
    start: u32,
    span: u32,
}

impl<'a, P: Progress> ProgressBand<'a, P> {
    /// Forward local progress `0..=100` to `start..=start + span` on `inner`.
    pub fn new(inner: &'a P, start: u32, span: u32) -> Self {
        Self { inner, start, span }
    }
}

impl<P: Progress> Stop for ProgressBand<'_, P> {
    fn check(&self) -> Result<(), StopReason> {
        self.inner.check()
    }
}

impl<P: Progress> Progress for ProgressBand<'_, P> {
    fn post(&self, value: u32) {
        let local = value.min(100);
        self.inner.post(self.start + local * self.span / 100);
    }
}

/// Post `done / total` as a percentage.
#[inline]
pub(crate) fn post_fraction(progress: &impl Progress, done: usize, total: usize) {
    if total > 0 {
        progress.post((done.min(total) * 100 / total) as u32);
    }
}
