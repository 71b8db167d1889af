//! Caller-local worker pool.
//!
//! Every thread that drives a raster render gets its own small pool,
//! created lazily on first use and sized `reader_threads +
//! compute_threads`. Pools are deliberately not shared across unrelated
//! callers: fan-out stays bounded by caller count and there is no
//! cross-request queue contention. A reader task running on a pool worker
//! is itself a caller and gets its own pool for the compute tasks it
//! spawns.

use std::cell::RefCell;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;

pub(crate) type Job = Box<dyn FnOnce() + Send + 'static>;

/// Completion handle for a posted job.
pub struct TaskHandle {
    done: Receiver<()>,
}

impl TaskHandle {
    /// Block until the job has finished. Returns immediately for jobs
    /// that ran inline.
    pub fn join(&self) {
        // A dropped sender also releases the join, so a panicking job
        // cannot wedge its reader.
        let _ = self.done.recv();
    }
}

/// Fixed-size worker pool fed by an mpsc queue.
pub struct WorkerPool {
    sender: Mutex<Option<Sender<Job>>>,
    worker_count: usize,
}

impl WorkerPool {
    /// Spawn `worker_count` named workers.
    pub fn new(worker_count: usize) -> Self {
        let (sender, receiver) = mpsc::channel::<Job>();
        let receiver = Arc::new(Mutex::new(receiver));

        for worker_ix in 0..worker_count {
            let receiver = Arc::clone(&receiver);
            let spawned = thread::Builder::new()
                .name(format!("hillshade-worker-{worker_ix}"))
                .spawn(move || loop {
                    let job = receiver.lock().unwrap().recv();
                    match job {
                        Ok(job) => job(),
                        Err(_) => break,
                    }
                });
            if let Err(e) = spawned {
                tracing::warn!(error = %e, "failed to spawn hillshade worker");
            }
        }

        Self {
            sender: Mutex::new(Some(sender)),
            worker_count,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Post a job, or run it inline on the calling thread when the pool
    /// is closed or has no workers. Either way the returned handle joins
    /// the job's completion.
    pub fn post_or_run(&self, job: Job) -> TaskHandle {
        let (done_tx, done_rx) = mpsc::channel();
        let wrapped: Job = Box::new(move || {
            let _signal = SignalOnDrop(done_tx);
            job();
        });

        let rejected = {
            let sender = self.sender.lock().unwrap();
            match sender.as_ref().filter(|_| self.worker_count > 0) {
                Some(sender) => sender.send(wrapped).err().map(|e| e.0),
                None => Some(wrapped),
            }
        };

        if let Some(job) = rejected {
            job();
        }

        TaskHandle { done: done_rx }
    }

    /// Stop accepting jobs; idle workers exit once the queue drains.
    pub fn close(&self) {
        self.sender.lock().unwrap().take();
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.close();
    }
}

/// Signals task completion even when the job panics.
struct SignalOnDrop(Sender<()>);

impl Drop for SignalOnDrop {
    fn drop(&mut self) {
        let _ = self.0.send(());
    }
}

enum CallerPoolSlot {
    Unset,
    Active(Arc<WorkerPool>),
    Closed,
}

thread_local! {
    static CALLER_POOL: RefCell<CallerPoolSlot> = const { RefCell::new(CallerPoolSlot::Unset) };
}

/// The calling thread's pool, created on first use with `worker_count`
/// workers. Returns `None` when `worker_count` is zero or the caller's
/// pool has been closed; submissions then run inline.
pub fn caller_pool(worker_count: usize) -> Option<Arc<WorkerPool>> {
    if worker_count == 0 {
        return None;
    }
    CALLER_POOL.with(|slot| {
        let mut slot = slot.borrow_mut();
        match &*slot {
            CallerPoolSlot::Active(pool) => Some(Arc::clone(pool)),
            CallerPoolSlot::Closed => None,
            CallerPoolSlot::Unset => {
                let pool = Arc::new(WorkerPool::new(worker_count));
                *slot = CallerPoolSlot::Active(Arc::clone(&pool));
                Some(pool)
            }
        }
    })
}

/// Close the calling thread's pool. Subsequent submissions from this
/// thread run inline.
pub fn close_caller_pool() {
    CALLER_POOL.with(|slot| {
        let mut slot = slot.borrow_mut();
        if let CallerPoolSlot::Active(pool) = &*slot {
            pool.close();
        }
        *slot = CallerPoolSlot::Closed;
    });
}
