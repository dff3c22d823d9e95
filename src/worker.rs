//! Running an inpainting request off the calling thread.
//!
//! The worker takes ownership of the [`Pipeline`] for the duration of one
//! request and hands it back when done, so a pipeline can never serve two
//! requests at once. Progress flows over a channel; the caller decides how
//! often to look at it.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use image::RgbaImage;

use crate::error::{Error, Result};
use crate::pipeline::{InpaintOutput, Pipeline, Step};

/// Default interval between progress updates.
pub const PROGRESS_INTERVAL: Duration = Duration::from_millis(50);

/// Snapshot handed to progress callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// Time since the request started.
    pub elapsed: Duration,
    /// Most recent step the pipeline entered, if any.
    pub step: Option<Step>,
}

enum Event {
    Step(Step),
    Done(Result<InpaintOutput>),
}

/// An inpainting request running on its own thread.
pub struct InpaintWorker {
    started: Instant,
    events: Receiver<Event>,
    handle: JoinHandle<Pipeline>,
}

impl InpaintWorker {
    /// Start inpainting on a new thread.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be spawned.
    pub fn spawn(mut pipeline: Pipeline, source: RgbaImage, stroke: RgbaImage) -> Result<Self> {
        let (tx, events) = mpsc::channel();
        let started = Instant::now();

        let handle = thread::Builder::new()
            .name("inpaint-worker".to_string())
            .spawn(move || {
                let step_tx = tx.clone();
                let result = pipeline.inpaint_observed(&source, &stroke, &mut |step| {
                    // A dropped receiver only means nobody is watching.
                    let _ = step_tx.send(Event::Step(step));
                });
                let _ = tx.send(Event::Done(result));
                pipeline
            })?;

        Ok(Self {
            started,
            events,
            handle,
        })
    }

    /// Block until the request finishes, calling `on_progress` every
    /// `interval` and whenever the pipeline enters a new step.
    ///
    /// Returns the pipeline for reuse together with the request result.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Worker`] if the worker thread panicked; the pipeline is
    /// lost in that case.
    pub fn wait(
        self,
        interval: Duration,
        mut on_progress: impl FnMut(Progress),
    ) -> Result<(Pipeline, Result<InpaintOutput>)> {
        let mut step = None;

        let result = loop {
            match self.events.recv_timeout(interval) {
                Ok(Event::Step(next)) => {
                    step = Some(next);
                    on_progress(Progress {
                        elapsed: self.started.elapsed(),
                        step,
                    });
                }
                Ok(Event::Done(result)) => break Some(result),
                Err(RecvTimeoutError::Timeout) => on_progress(Progress {
                    elapsed: self.started.elapsed(),
                    step,
                }),
                Err(RecvTimeoutError::Disconnected) => break None,
            }
        };

        let pipeline = self
            .handle
            .join()
            .map_err(|panic| Error::Worker(panic_message(panic.as_ref())))?;

        let result = result.ok_or_else(|| Error::Worker("worker exited without a result".to_string()))?;

        tracing::debug!(
            "Worker finished after {} ms",
            self.started.elapsed().as_millis()
        );

        Ok((pipeline, result))
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "worker thread panicked".to_string())
}
