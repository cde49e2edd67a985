//! Bounded worker pool backed by OS threads.
//!
//! Jobs are closures submitted to an MPMC channel; a fixed set of
//! worker threads (the pool's slots) pulls and runs them, so at most
//! `slots` jobs execute simultaneously. Queued jobs can be discarded
//! via epoch-based cancellation without touching jobs that already
//! started.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;

/// A unit of work for the pool.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

struct Submission {
    /// Pool epoch at submission time; stale submissions are discarded.
    epoch: u64,
    task: Task,
}

enum Control {
    /// Retire one worker thread once it is idle.
    Retire,
}

/// Bounded set of concurrent execution slots.
///
/// Queued jobs start as soon as a slot frees up, best-effort FIFO.
/// `cancel_all` discards not-yet-started jobs only; running jobs are
/// never preempted.
pub struct WorkerPool {
    job_tx: Sender<Submission>,
    job_rx: Receiver<Submission>,
    control_tx: Sender<Control>,
    control_rx: Receiver<Control>,
    epoch: Arc<AtomicU64>,
    running: Arc<AtomicUsize>,
    slots: AtomicUsize,
    next_worker_id: AtomicUsize,
    /// Also serializes resize operations.
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Create a pool with the given number of slots, clamped to
    /// `1..=CPU count`.
    pub fn new(slots: usize) -> Self {
        let (job_tx, job_rx) = unbounded();
        let (control_tx, control_rx) = unbounded();

        let pool = Self {
            job_tx,
            job_rx,
            control_tx,
            control_rx,
            epoch: Arc::new(AtomicU64::new(0)),
            running: Arc::new(AtomicUsize::new(0)),
            slots: AtomicUsize::new(0),
            next_worker_id: AtomicUsize::new(0),
            handles: Mutex::new(Vec::new()),
        };
        pool.resize(slots);
        pool
    }

    /// Number of slots currently configured.
    pub fn slots(&self) -> usize {
        self.slots.load(Ordering::SeqCst)
    }

    /// Number of jobs executing right now.
    pub fn running_jobs(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }

    /// Number of submissions waiting for a free slot. Includes stale
    /// submissions not yet swept after a cancellation.
    pub fn queued_jobs(&self) -> usize {
        self.job_rx.len()
    }

    /// Change the slot count, clamped to `1..=CPU count`.
    ///
    /// Growth spawns workers immediately; shrink retires workers as
    /// they become idle. Jobs already running are not preempted.
    pub fn resize(&self, slots: usize) {
        let slots = clamp_slots(slots);
        let mut handles = self.handles.lock();
        let current = self.slots.load(Ordering::SeqCst);

        if slots > current {
            for _ in current..slots {
                self.spawn_worker(&mut handles);
            }
        } else {
            for _ in slots..current {
                let _ = self.control_tx.send(Control::Retire);
            }
        }

        self.slots.store(slots, Ordering::SeqCst);
        tracing::debug!(slots, "worker pool resized");
    }

    /// Enqueue a job; it begins executing as soon as a slot is free.
    pub fn submit(&self, task: Task) {
        let submission = Submission {
            epoch: self.epoch.load(Ordering::SeqCst),
            task,
        };
        // Send only fails if all receivers are gone, which cannot
        // happen while the pool owns one end.
        let _ = self.job_tx.send(submission);
    }

    /// Discard all not-yet-started jobs.
    ///
    /// Running jobs are NOT interrupted; they complete normally.
    /// Callers must treat this as "no new starts", not "instant stop".
    pub fn cancel_all(&self) {
        let current = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;

        // Sweep the queue. Workers double-check the epoch on dequeue,
        // so sweeping is only a memory courtesy, not a correctness
        // requirement.
        while let Ok(submission) = self.job_rx.try_recv() {
            if submission.epoch >= current {
                // Raced with a fresh submission; everything behind it
                // is fresh too (FIFO), put it back and stop.
                let _ = self.job_tx.send(submission);
                break;
            }
        }

        tracing::debug!("worker pool queue cleared");
    }

    fn spawn_worker(&self, handles: &mut Vec<JoinHandle<()>>) {
        let id = self.next_worker_id.fetch_add(1, Ordering::SeqCst);
        let jobs = self.job_rx.clone();
        let control = self.control_rx.clone();
        let epoch = Arc::clone(&self.epoch);
        let running = Arc::clone(&self.running);

        let builder = std::thread::Builder::new().name(format!("srb-worker-{}", id));
        match builder.spawn(move || worker_loop(jobs, control, epoch, running)) {
            Ok(handle) => handles.push(handle),
            Err(e) => tracing::error!("failed to spawn worker thread: {}", e),
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        let mut handles = self.handles.lock();
        for _ in 0..handles.len() {
            let _ = self.control_tx.send(Control::Retire);
        }
        for handle in handles.drain(..) {
            let _ = handle.join();
        }
    }
}

fn worker_loop(
    jobs: Receiver<Submission>,
    control: Receiver<Control>,
    epoch: Arc<AtomicU64>,
    running: Arc<AtomicUsize>,
) {
    loop {
        // Control messages win over queued work so a shrink takes
        // effect before the next job starts.
        if control.try_recv().is_ok() {
            break;
        }

        crossbeam_channel::select! {
            recv(control) -> msg => {
                // Retire, or pool dropped.
                let _ = msg;
                break;
            }
            recv(jobs) -> submission => match submission {
                Ok(submission) => {
                    if submission.epoch != epoch.load(Ordering::SeqCst) {
                        // Discarded by cancel_all after being queued.
                        continue;
                    }
                    running.fetch_add(1, Ordering::SeqCst);
                    (submission.task)();
                    running.fetch_sub(1, Ordering::SeqCst);
                }
                Err(_) => break,
            },
        }
    }
}

fn clamp_slots(slots: usize) -> usize {
    slots.clamp(1, num_cpus::get())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn wait_for_count(counter: &Arc<AtomicUsize>, expected: usize) {
        for _ in 0..200 {
            if counter.load(Ordering::SeqCst) == expected {
                return;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        panic!(
            "counter stuck at {} (expected {})",
            counter.load(Ordering::SeqCst),
            expected
        );
    }

    #[test]
    fn runs_all_submitted_tasks() {
        let pool = WorkerPool::new(2);
        let done = Arc::new(AtomicUsize::new(0));

        for _ in 0..6 {
            let done = Arc::clone(&done);
            pool.submit(Box::new(move || {
                done.fetch_add(1, Ordering::SeqCst);
            }));
        }

        wait_for_count(&done, 6);
    }

    #[test]
    fn concurrency_never_exceeds_slot_count() {
        let pool = WorkerPool::new(2);
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let done = Arc::new(AtomicUsize::new(0));

        for _ in 0..6 {
            let active = Arc::clone(&active);
            let peak = Arc::clone(&peak);
            let done = Arc::clone(&done);
            pool.submit(Box::new(move || {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(30));
                active.fetch_sub(1, Ordering::SeqCst);
                done.fetch_add(1, Ordering::SeqCst);
            }));
        }

        wait_for_count(&done, 6);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[test]
    fn cancel_discards_queued_but_not_running() {
        let pool = WorkerPool::new(1);
        let executed = Arc::new(AtomicUsize::new(0));
        let (gate_tx, gate_rx) = crossbeam_channel::bounded::<()>(0);
        let (started_tx, started_rx) = crossbeam_channel::bounded::<()>(0);

        {
            let executed = Arc::clone(&executed);
            pool.submit(Box::new(move || {
                let _ = started_tx.send(());
                let _ = gate_rx.recv();
                executed.fetch_add(1, Ordering::SeqCst);
            }));
        }
        for _ in 0..4 {
            let executed = Arc::clone(&executed);
            pool.submit(Box::new(move || {
                executed.fetch_add(1, Ordering::SeqCst);
            }));
        }

        // First task is definitely occupying the only slot.
        started_rx
            .recv_timeout(Duration::from_secs(2))
            .expect("first task never started");

        pool.cancel_all();
        gate_tx.send(()).expect("running task vanished");

        wait_for_count(&executed, 1);
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(executed.load(Ordering::SeqCst), 1);
        assert_eq!(pool.queued_jobs(), 0);
    }

    #[test]
    fn submissions_after_cancel_still_run() {
        let pool = WorkerPool::new(1);
        pool.cancel_all();

        let done = Arc::new(AtomicUsize::new(0));
        let done_clone = Arc::clone(&done);
        pool.submit(Box::new(move || {
            done_clone.fetch_add(1, Ordering::SeqCst);
        }));

        wait_for_count(&done, 1);
    }

    #[test]
    fn resize_grows_capacity() {
        let pool = WorkerPool::new(1);
        if num_cpus::get() < 2 {
            return; // cannot observe growth on a single-core machine
        }
        pool.resize(2);
        assert_eq!(pool.slots(), 2);

        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let done = Arc::new(AtomicUsize::new(0));

        for _ in 0..4 {
            let active = Arc::clone(&active);
            let peak = Arc::clone(&peak);
            let done = Arc::clone(&done);
            pool.submit(Box::new(move || {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(30));
                active.fetch_sub(1, Ordering::SeqCst);
                done.fetch_add(1, Ordering::SeqCst);
            }));
        }

        wait_for_count(&done, 4);
        assert_eq!(peak.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn slot_count_is_clamped() {
        let pool = WorkerPool::new(0);
        assert_eq!(pool.slots(), 1);

        let pool = WorkerPool::new(usize::MAX);
        assert!(pool.slots() <= num_cpus::get());
    }
}
