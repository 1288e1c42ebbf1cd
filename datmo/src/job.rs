//! Background tone mapping jobs with progress events.
//!
//! A job owns a private working copy of its frame, runs one operator on a
//! worker thread and reports through a channel of [`JobEvent`]s:
//!
//! - success: `MaximumSteps`, `Progress`..., one `ImageComputed`, `Finished`
//! - failure (error or panic): `MaximumSteps`, `Progress`..., one `Error`
//! - cancellation: nothing after the request
//!
//! The channel disconnects when the job ends, so iterating
//! [`JobHandle::events`] terminates.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use datmo_core::ProgressToken;
use log::{debug, info, warn};

use crate::frame::{prepare_working_frame, DisplayImage, HdrFrame};
use crate::operator::{DisplayAdaptiveOperator, ToneMapOperator};
use crate::options::TonemapOptions;

/// Message reported to hosts for operator panics.
pub const PANIC_MESSAGE: &str = "Failed to tonemap image";

/// Notification from a running job.
#[derive(Debug, Clone, PartialEq)]
pub enum JobEvent {
    /// Number of progress units the job will report.
    MaximumSteps(u32),
    /// Progress in `0..=maximum`.
    Progress(u32),
    /// The tone-mapped image and the options it was made with.
    ImageComputed(DisplayImage, TonemapOptions),
    /// The job completed successfully.
    Finished,
    /// The job failed.
    Error(String),
}

// ============================================================================
// Live-job accounting
// ============================================================================

/// Count of live jobs, owned by whatever layer spawns them.
#[derive(Debug, Clone, Default)]
pub struct JobRegistry {
    live: Arc<AtomicUsize>,
}

impl JobRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of jobs registered and not yet ended.
    pub fn live_jobs(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    fn enter(&self) -> LiveGuard {
        self.live.fetch_add(1, Ordering::AcqRel);
        LiveGuard {
            live: Arc::clone(&self.live),
        }
    }
}

/// Decrements the registry count when the job ends, however it ends.
struct LiveGuard {
    live: Arc<AtomicUsize>,
}

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::AcqRel);
    }
}

// ============================================================================
// Event delivery
// ============================================================================

/// Sender that can be closed from either side.
#[derive(Clone)]
struct EventSink {
    tx: Arc<Mutex<Option<Sender<JobEvent>>>>,
}

impl EventSink {
    fn new(tx: Sender<JobEvent>) -> Self {
        Self {
            tx: Arc::new(Mutex::new(Some(tx))),
        }
    }

    fn send(&self, event: JobEvent) {
        if let Ok(guard) = self.tx.lock() {
            if let Some(tx) = guard.as_ref() {
                // A dropped receiver just means nobody is listening.
                let _ = tx.send(event);
            }
        }
    }

    fn close(&self) {
        if let Ok(mut guard) = self.tx.lock() {
            guard.take();
        }
    }
}

fn event_channel() -> (ProgressToken, EventSink, Receiver<JobEvent>) {
    let (tx, rx) = mpsc::channel();
    let sink = EventSink::new(tx);
    let progress_sink = sink.clone();
    let token = ProgressToken::with_observer(move |v| progress_sink.send(JobEvent::Progress(v)));
    (token, sink, rx)
}

// ============================================================================
// Jobs
// ============================================================================

/// One tone mapping request.
pub struct TonemapJob {
    frame: HdrFrame,
    original_width: u32,
    options: TonemapOptions,
    operator: Arc<dyn ToneMapOperator>,
    registry: Option<JobRegistry>,
}

impl TonemapJob {
    /// Job running `operator` on `frame`.
    ///
    /// `original_width` is the width of the full-size source image; the
    /// working frame is resampled to `options.xsize` when that differs.
    pub fn new(
        frame: HdrFrame,
        original_width: u32,
        options: TonemapOptions,
        operator: Arc<dyn ToneMapOperator>,
    ) -> Self {
        Self {
            frame,
            original_width,
            options,
            operator,
            registry: None,
        }
    }

    /// Job running the display-adaptive operator configured by `options`.
    pub fn display_adaptive(
        frame: HdrFrame,
        original_width: u32,
        options: TonemapOptions,
    ) -> Self {
        let operator = Arc::new(DisplayAdaptiveOperator::new(options.operator.clone()));
        Self::new(frame, original_width, options, operator)
    }

    /// Count this job in `registry` while it is alive.
    pub fn with_registry(mut self, registry: &JobRegistry) -> Self {
        self.registry = Some(registry.clone());
        self
    }

    /// Run on a new worker thread.
    pub fn spawn(self) -> std::io::Result<JobHandle> {
        let (token, sink, events) = event_channel();
        let guard = self.registry.as_ref().map(JobRegistry::enter);

        let worker_token = token.clone();
        let worker_sink = sink.clone();
        let thread = thread::Builder::new()
            .name("datmo-tonemap".into())
            .spawn(move || {
                let _guard = guard;
                self.execute(&worker_token, &worker_sink);
            })?;

        Ok(JobHandle {
            token,
            sink,
            events,
            thread: Some(thread),
        })
    }

    /// Run on the calling thread and return every event emitted.
    pub fn run_blocking(self) -> Vec<JobEvent> {
        let (token, sink, events) = event_channel();
        let _guard = self.registry.as_ref().map(JobRegistry::enter);
        self.execute(&token, &sink);
        events.try_iter().collect()
    }

    fn execute(self, token: &ProgressToken, sink: &EventSink) {
        let Self {
            frame,
            original_width,
            options,
            operator,
            registry: _,
        } = self;

        info!(
            "{} job started: {}x{}, xsize {:?}, pregamma {}",
            operator.name(),
            frame.width,
            frame.height,
            options.xsize,
            options.pregamma
        );
        sink.send(JobEvent::MaximumSteps(token.maximum()));

        let outcome = catch_unwind(AssertUnwindSafe(|| {
            options.validate()?;
            let working = prepare_working_frame(frame, original_width, &options)?;
            operator.tonemap(&working, token)
        }));

        match outcome {
            Ok(Ok(image)) => {
                if token.is_termination_requested() {
                    debug!("{} job cancelled after completion", operator.name());
                } else {
                    info!(
                        "{} job finished: {}x{}",
                        operator.name(),
                        image.width(),
                        image.height()
                    );
                    sink.send(JobEvent::ImageComputed(image, options));
                    sink.send(JobEvent::Finished);
                }
            }
            Ok(Err(err)) if err.is_stopped() => {
                info!("{} job cancelled", operator.name());
            }
            Ok(Err(err)) => {
                warn!("{} job failed: {}", operator.name(), err);
                sink.send(JobEvent::Error(err.to_string()));
            }
            Err(_) => {
                warn!("{} job panicked", operator.name());
                sink.send(JobEvent::Error(PANIC_MESSAGE.into()));
            }
        }

        sink.close();
    }
}

/// Handle to a job running on a worker thread.
pub struct JobHandle {
    token: ProgressToken,
    sink: EventSink,
    events: Receiver<JobEvent>,
    thread: Option<JoinHandle<()>>,
}

impl JobHandle {
    /// Ask the job to stop.
    ///
    /// Events still queued are discarded and no further events are delivered.
    pub fn request_termination(&self) {
        self.token.request_termination();
        self.sink.close();
        while self.events.try_recv().is_ok() {}
    }

    /// Whether termination has been requested.
    pub fn is_termination_requested(&self) -> bool {
        self.token.is_termination_requested()
    }

    /// Last progress value posted by the job.
    pub fn progress(&self) -> u32 {
        self.token.progress()
    }

    /// Event receiver; disconnects when the job ends.
    pub fn events(&self) -> &Receiver<JobEvent> {
        &self.events
    }

    /// Wait for the worker thread to exit and return the undelivered events.
    pub fn wait(mut self) -> Vec<JobEvent> {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("tonemap worker thread panicked outside the operator");
            }
        }
        self.events.try_iter().collect()
    }
}

impl std::fmt::Debug for JobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobHandle")
            .field("token", &self.token)
            .field("running", &self.thread.as_ref().map(|t| !t.is_finished()))
            .finish()
    }
}
