//! Admission, dispatch and completion of render requests.
//!
//! All bookkeeping (the pending set, the id counter, the document binding and
//! the counters) lives behind one mutex. The lock is taken for short
//! bookkeeping steps only and is never held while a document renders.
//!
//! Rendering is driven by a *pump*: a loop that takes the next queued request,
//! renders it with the lock released, records the completion and publishes the
//! result. In single-threaded mode the caller's thread pumps inside
//! `request_page`; in multi-threaded mode the worker thread pumps. A `pumping`
//! flag guarantees only one pump runs at a time, so at most one render is ever
//! in flight.

use crate::config::{RenderMode, RendererConfig};
use crate::document::{DocumentBinding, DocumentStatus, SharedDocument};
use crate::events::{EventHub, RendererEvent};
use crate::queue::{Admission, RequestQueue};
use crate::request::{
    ImageSize, PageRequest, Priority, RenderOptions, RenderResult, RequestId, RequestKey,
};
use crate::stats::PerformanceStats;
use crate::worker::{DropReason, Execution, RenderJob, RenderWorker};
use async_channel::Receiver;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, warn};

/// Observable state of a renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RendererState {
    /// No live document is bound.
    NoDocument,
    /// A document is bound and nothing is pending.
    Idle,
    /// Requests are queued or rendering.
    Rendering,
}

/// Who is driving a pump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Pumper {
    /// The thread that called into the renderer (single-threaded mode).
    Caller,
    /// The background worker thread.
    Worker,
}

#[derive(Debug)]
struct SchedulerState {
    queue: RequestQueue,
    binding: DocumentBinding,
    mode: RenderMode,
    pumping: bool,
    worker_stop: bool,
    worker_waker: Option<crossbeam_channel::Sender<()>>,
    discard_stale_results: bool,
    stats: PerformanceStats,
}

#[derive(Debug)]
struct Inner {
    state: Mutex<SchedulerState>,
    events: EventHub,
}

/// Frees the pump slot if a pump unwinds, so later pumps are not locked out.
struct PumpGuard<'a> {
    scheduler: &'a Scheduler,
    armed: bool,
}

impl Drop for PumpGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = self.scheduler.lock();
        state.pumping = false;
        if let Some(request) = state.queue.release_in_flight() {
            state.stats.failed += 1;
            error!("Render pump unwound while handling {}", request.id);
        }
    }
}

/// Shared handle to the scheduler; cloned into the worker thread.
#[derive(Debug, Clone)]
pub(crate) struct Scheduler {
    inner: Arc<Inner>,
}

impl Scheduler {
    pub(crate) fn new(config: &RendererConfig) -> Self {
        let state = SchedulerState {
            queue: RequestQueue::new(config.priority_ordering),
            binding: DocumentBinding::empty(),
            mode: RenderMode::SingleThreaded,
            pumping: false,
            worker_stop: false,
            worker_waker: None,
            discard_stale_results: config.discard_stale_results,
            stats: PerformanceStats::default(),
        };
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(state),
                events: EventHub::default(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SchedulerState> {
        // Every critical section leaves the state consistent, so a panic
        // elsewhere does not invalidate it.
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    // ---- admission -------------------------------------------------------

    /// Admit a render request. Returns [`RequestId::REJECTED`] when no ready
    /// document is bound.
    pub(crate) fn enqueue(
        &self,
        page: usize,
        size: ImageSize,
        options: RenderOptions,
        priority: Priority,
    ) -> RequestId {
        let key = RequestKey::new(page, size, options);
        let (admission, mode, waker) = loop {
            let Some((document, generation)) = self.bound_document() else {
                debug!("Rejected page {} at {}: no document", page, size);
                return RequestId::REJECTED;
            };
            // Queried without the lock; a backend may block here.
            let status = document.status();
            drop(document);
            if status != DocumentStatus::Ready {
                debug!("Rejected page {} at {}: document is {:?}", page, size, status);
                return RequestId::REJECTED;
            }

            let mut state = self.lock();
            if state.binding.generation() != generation {
                // Rebound while checking; check the new document.
                continue;
            }
            let admission = state.queue.admit(key, priority, generation);
            break (admission, state.mode, state.worker_waker.clone());
        };

        match admission {
            Admission::Coalesced(id) => {
                debug!("Page {} at {} already pending as {}", page, size, id);
            }
            Admission::Queued(id) => {
                debug!("Queued page {} at {} as {} ({:?})", page, size, id, priority);
                match (mode, waker) {
                    (RenderMode::MultiThreaded, Some(waker)) => {
                        // The worker may be exiting; whoever stops it drains the queue.
                        let _ = waker.send(());
                    }
                    (RenderMode::MultiThreaded, None) => {}
                    (RenderMode::SingleThreaded, _) => self.pump(Pumper::Caller),
                }
            }
        }
        admission.id()
    }

    /// Admit a request whose pixel size is derived from the page size at `zoom`.
    pub(crate) fn enqueue_at_zoom(
        &self,
        page: usize,
        zoom: f64,
        options: RenderOptions,
        priority: Priority,
    ) -> RequestId {
        let Some((document, _)) = self.bound_document() else {
            debug!("Rejected page {} at zoom {}: no document", page, zoom);
            return RequestId::REJECTED;
        };
        let size = match document.status() {
            DocumentStatus::Ready => document.page_size_at_zoom(page, zoom),
            _ => None,
        };
        drop(document);
        match size {
            Some(size) => self.enqueue(page, size, options, priority),
            None => {
                debug!("Rejected page {} at zoom {}: size unavailable", page, zoom);
                RequestId::REJECTED
            }
        }
    }

    /// The live bound document and its binding generation.
    fn bound_document(&self) -> Option<(SharedDocument, u64)> {
        let state = self.lock();
        let generation = state.binding.generation();
        state.binding.upgrade().map(|document| (document, generation))
    }

    // ---- dispatch --------------------------------------------------------

    /// Render queued requests until the queue is empty.
    ///
    /// Returns immediately if another pump is already running; that pump
    /// picks up anything queued in the meantime. A worker pump also stops
    /// early once the worker has been asked to exit.
    pub(crate) fn pump(&self, pumper: Pumper) {
        {
            let mut state = self.lock();
            if state.pumping {
                return;
            }
            state.pumping = true;
        }
        let mut guard = PumpGuard {
            scheduler: self,
            armed: true,
        };

        loop {
            let job = {
                let mut state = self.lock();
                let stopping = pumper == Pumper::Worker && state.worker_stop;
                let generation = state.binding.generation();
                let next = if stopping {
                    None
                } else {
                    state.queue.take_next(generation)
                };
                match next {
                    Some(request) => RenderJob {
                        request,
                        document: state.binding.upgrade(),
                        generation,
                    },
                    None => {
                        guard.armed = false;
                        state.pumping = false;
                        return;
                    }
                }
            };

            debug!(
                "Rendering page {} at {} for {} ({:?})",
                job.request.key.page, job.request.key.size, job.request.id, pumper
            );
            let execution = RenderWorker::execute(&job);
            let RenderJob {
                request,
                document,
                generation,
            } = job;
            // Release the document before taking the lock again.
            drop(document);

            if let Some(result) = self.complete(request, generation, execution) {
                self.inner.events.publish(RendererEvent::PageRendered(result));
            }
        }
    }

    /// Record a finished job and decide whether its result is delivered.
    fn complete(
        &self,
        request: PageRequest,
        generation: u64,
        execution: Execution,
    ) -> Option<RenderResult> {
        let mut state = self.lock();
        if state.queue.complete(&request.key).is_none() {
            warn!("Completed {} was not in flight", request.id);
        }

        match execution {
            Execution::Rendered { image, elapsed } => {
                state.stats.record(elapsed);
                if state.discard_stale_results && generation != state.binding.generation() {
                    state.stats.discarded += 1;
                    debug!(
                        "Discarded page {} for {}: document changed while rendering",
                        request.key.page, request.id
                    );
                    return None;
                }
                debug!(
                    "Rendered page {} for {} in {:?}",
                    request.key.page, request.id, elapsed
                );
                Some(RenderResult {
                    page: request.key.page,
                    size: request.key.size,
                    image: Arc::new(image),
                    options: request.key.options,
                    request_id: request.id,
                    render_time: elapsed,
                })
            }
            Execution::Dropped(reason) => {
                state.stats.dropped += 1;
                match reason {
                    DropReason::NoDocument => {
                        debug!("Dropped {}: no document", request.id);
                    }
                    DropReason::NotReady(status) => {
                        debug!("Dropped {}: document is {:?}", request.id, status);
                    }
                }
                None
            }
            Execution::Failed(e) => {
                state.stats.failed += 1;
                warn!(
                    "Failed to render page {} for {}: {:#}",
                    request.key.page, request.id, e
                );
                None
            }
        }
    }

    // ---- document --------------------------------------------------------

    /// Bind a new document. Returns `false` if it was already bound.
    pub(crate) fn set_document(&self, document: Option<&SharedDocument>) -> bool {
        let mut state = self.lock();
        if state.binding.is_bound_to(document) {
            return false;
        }
        state.binding.rebind(document);
        debug!(
            "Document binding {} ({} requests pending)",
            state.binding.generation(),
            state.queue.pending_len()
        );
        true
    }

    pub(crate) fn document(&self) -> Option<SharedDocument> {
        self.lock().binding.upgrade()
    }

    // ---- mode and worker coordination -----------------------------------

    pub(crate) fn mode(&self) -> RenderMode {
        self.lock().mode
    }

    pub(crate) fn set_mode(&self, mode: RenderMode) {
        self.lock().mode = mode;
    }

    /// Register the channel the worker waits on for new work.
    pub(crate) fn attach_worker(&self, waker: crossbeam_channel::Sender<()>) {
        let mut state = self.lock();
        state.worker_stop = false;
        state.worker_waker = Some(waker);
    }

    pub(crate) fn request_worker_stop(&self) {
        let mut state = self.lock();
        state.worker_stop = true;
        state.worker_waker = None;
    }

    pub(crate) fn worker_stop_requested(&self) -> bool {
        self.lock().worker_stop
    }

    #[cfg(test)]
    pub(crate) fn clear_worker_stop(&self) {
        self.lock().worker_stop = false;
    }

    /// Forget the worker after it exited or failed to start.
    pub(crate) fn detach_worker(&self) {
        let mut state = self.lock();
        state.worker_stop = false;
        state.worker_waker = None;
    }

    /// Forget every request that has not started rendering.
    pub(crate) fn abandon_queued(&self) -> usize {
        self.lock().queue.abandon_queued()
    }

    // ---- observation -----------------------------------------------------

    pub(crate) fn subscribe(&self) -> Receiver<RendererEvent> {
        self.inner.events.subscribe()
    }

    pub(crate) fn publish(&self, event: RendererEvent) {
        self.inner.events.publish(event);
    }

    pub(crate) fn state(&self) -> RendererState {
        let state = self.lock();
        if state.binding.upgrade().is_none() {
            RendererState::NoDocument
        } else if state.queue.is_idle() {
            RendererState::Idle
        } else {
            RendererState::Rendering
        }
    }

    pub(crate) fn pending_len(&self) -> usize {
        self.lock().queue.pending_len()
    }

    pub(crate) fn stats(&self) -> PerformanceStats {
        self.lock().stats
    }

    pub(crate) fn reset_stats(&self) {
        self.lock().stats = PerformanceStats::default();
    }
}
