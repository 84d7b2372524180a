//! Render execution and the background worker thread.
//!
//! [`RenderWorker::execute`] performs exactly one render against a document.
//! [`WorkerThread`] owns the dedicated thread used in multi-threaded mode; it
//! is started and joined explicitly by the renderer, never detached.

use crate::document::{DocumentStatus, SharedDocument};
use crate::error::Result;
use crate::request::PageRequest;
use crate::scheduler::{Pumper, Scheduler};
use crossbeam_channel::{Receiver, Sender};
use image::RgbaImage;
use std::panic::{self, AssertUnwindSafe};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, error};

/// A dispatched request together with the document it resolved to.
pub struct RenderJob {
    pub request: PageRequest,
    /// Strong handle taken at dispatch, `None` if no live document was bound.
    pub document: Option<SharedDocument>,
    /// Document binding generation the job was dispatched under.
    pub generation: u64,
}

/// Why a job produced no bitmap without calling the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// No document set, or it was dropped by its owner.
    NoDocument,
    /// The document exists but is not `Ready`.
    NotReady(DocumentStatus),
}

/// Outcome of one render job.
#[derive(Debug)]
pub enum Execution {
    Rendered { image: RgbaImage, elapsed: Duration },
    Dropped(DropReason),
    Failed(anyhow::Error),
}

/// Executes render jobs. One call renders one page.
#[derive(Debug, Default, Clone, Copy)]
pub struct RenderWorker;

impl RenderWorker {
    /// Render `job` against its document.
    ///
    /// Document state is checked here, at execution time, because it may
    /// have changed since the request was admitted. A panic inside the
    /// document's status or render call is reported as a failure.
    pub fn execute(job: &RenderJob) -> Execution {
        let Some(document) = job.document.as_ref() else {
            return Execution::Dropped(DropReason::NoDocument);
        };

        let status = match panic::catch_unwind(AssertUnwindSafe(|| document.status())) {
            Ok(status) => status,
            Err(_) => {
                return Execution::Failed(anyhow::anyhow!(
                    "document panicked while reporting its status"
                ))
            }
        };
        if status != DocumentStatus::Ready {
            return Execution::Dropped(DropReason::NotReady(status));
        }

        let key = job.request.key;
        let start = Instant::now();
        let rendered = panic::catch_unwind(AssertUnwindSafe(|| {
            document.render(key.page, key.size, &key.options)
        }));
        let elapsed = start.elapsed();

        match rendered {
            Ok(Ok(image)) => Execution::Rendered { image, elapsed },
            Ok(Err(e)) => Execution::Failed(e),
            Err(_) => Execution::Failed(anyhow::anyhow!(
                "document panicked while rendering page {}",
                key.page
            )),
        }
    }
}

/// The background render thread used in multi-threaded mode.
///
/// The worker sleeps on a wake-up channel. The scheduler keeps a sender and
/// pokes it whenever a request is queued; stopping sets a flag in the
/// scheduler and sends one last wake-up so the thread notices.
#[derive(Debug)]
pub(crate) struct WorkerThread {
    wakeups: Sender<()>,
    handle: JoinHandle<()>,
}

impl WorkerThread {
    /// Spawn the worker. It drains whatever is already queued right away.
    pub(crate) fn start(scheduler: &Scheduler, name: &str) -> Result<Self> {
        let (wakeups, rx) = crossbeam_channel::unbounded();
        scheduler.attach_worker(wakeups.clone());

        let worker_scheduler = scheduler.clone();
        let spawned = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || run(&worker_scheduler, &rx));
        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                scheduler.detach_worker();
                return Err(e.into());
            }
        };

        let worker = Self { wakeups, handle };
        worker.wake();
        debug!("Render worker '{}' started", name);
        Ok(worker)
    }

    /// Tell the worker there is work to pick up.
    pub(crate) fn wake(&self) {
        // Fails only once the worker has exited.
        let _ = self.wakeups.send(());
    }

    /// Ask the worker to exit once its in-flight render (if any) finishes.
    pub(crate) fn stop(&self, scheduler: &Scheduler) {
        scheduler.request_worker_stop();
        self.wake();
    }

    /// Wait for the worker thread to exit.
    pub(crate) fn join(self, scheduler: &Scheduler) {
        let name = self
            .handle
            .thread()
            .name()
            .unwrap_or("render-worker")
            .to_string();
        if self.handle.join().is_err() {
            error!("Render worker '{}' panicked", name);
        }
        scheduler.detach_worker();
        debug!("Render worker '{}' joined", name);
    }

    pub(crate) fn stop_and_join(self, scheduler: &Scheduler) {
        self.stop(scheduler);
        self.join(scheduler);
    }
}

fn run(scheduler: &Scheduler, wakeups: &Receiver<()>) {
    while wakeups.recv().is_ok() {
        if scheduler.worker_stop_requested() {
            break;
        }
        scheduler.pump(Pumper::Worker);
        if scheduler.worker_stop_requested() {
            break;
        }
    }
}
