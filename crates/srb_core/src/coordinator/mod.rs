//! Batch coordinator: owns the job set of one user-initiated batch.
//!
//! The coordinator is the single owner of batch state. All mutations
//! go through its methods and are serialized by one mutex, since job
//! completions arrive concurrently from multiple workers. Presentation
//! signals leave through a [`BatchEvent`] channel; there is no direct
//! coupling between the invoker and any display layer.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::events::{BatchEvent, BatchSummary, EventSender};
use crate::invoker::{self, JobSink};
use crate::logging::{BatchLogger, Severity};
use crate::models::{BatchConfig, Job, JobOutcome};
use crate::pool::WorkerPool;

/// Lifecycle of one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchPhase {
    /// No batch submitted yet (or state cleared).
    #[default]
    Idle,
    /// Jobs are being enqueued.
    Submitting,
    /// All jobs enqueued, some not yet terminated.
    Running,
    /// Every job terminated naturally.
    Completed,
    /// Cancellation requested; queued jobs discarded. The batch still
    /// drains running jobs before the completion signal fires.
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobPhase {
    Queued,
    Running,
    Done,
}

#[derive(Default)]
struct BatchState {
    /// Bumped per batch so stragglers from a replaced batch are ignored.
    seq: u64,
    phase: BatchPhase,
    jobs: HashMap<PathBuf, JobPhase>,
    total: usize,
    summary: BatchSummary,
    last_percent: u8,
}

impl BatchState {
    /// `floor(done / total * 100)`; an empty batch reads 100.
    fn percent(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        ((self.summary.done() * 100) / self.total) as u8
    }

    fn running_count(&self) -> usize {
        self.jobs
            .values()
            .filter(|p| **p == JobPhase::Running)
            .count()
    }
}

/// Coordinates one batch of jobs over a bounded worker pool.
///
/// Always lives behind an `Arc`; worker threads call back into the
/// coordinator through clones held by their job closures.
pub struct BatchCoordinator {
    /// Handle to ourselves for the job closures.
    self_ref: Weak<BatchCoordinator>,
    pool: WorkerPool,
    events: EventSender,
    logger: Mutex<Option<Arc<BatchLogger>>>,
    state: Mutex<BatchState>,
}

impl BatchCoordinator {
    /// Create a coordinator with an initial pool size.
    ///
    /// The pool is resized to each batch's configured concurrency on
    /// `start_batch`.
    pub fn new(initial_slots: usize, events: EventSender) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            self_ref: self_ref.clone(),
            pool: WorkerPool::new(initial_slots),
            events,
            logger: Mutex::new(None),
            state: Mutex::new(BatchState::default()),
        })
    }

    /// Current batch phase.
    pub fn phase(&self) -> BatchPhase {
        self.state.lock().phase
    }

    /// Current aggregate progress percent.
    pub fn progress_percent(&self) -> u8 {
        self.state.lock().percent()
    }

    /// Accounting snapshot of the current batch.
    pub fn summary(&self) -> BatchSummary {
        self.state.lock().summary
    }

    /// Clear prior batch state and submit one job per file.
    ///
    /// Duplicate paths are collapsed. Pool concurrency is taken from
    /// the config snapshot; the snapshot also pins tool path and model
    /// for every job of this batch.
    pub fn start_batch(
        &self,
        files: Vec<PathBuf>,
        config: BatchConfig,
        logger: Option<Arc<BatchLogger>>,
    ) {
        self.pool.resize(config.max_concurrency);
        *self.logger.lock() = logger;

        let (seq, unique) = {
            let mut st = self.state.lock();
            st.seq += 1;
            st.phase = BatchPhase::Submitting;
            st.jobs.clear();

            let mut unique = Vec::with_capacity(files.len());
            for file in files {
                if st.jobs.insert(file.clone(), JobPhase::Queued).is_none() {
                    unique.push(file);
                }
            }

            st.total = st.jobs.len();
            st.summary = BatchSummary {
                total: st.total,
                ..BatchSummary::default()
            };
            st.last_percent = 0;
            (st.seq, unique)
        };

        self.log_line(
            Severity::Info,
            &format!("Selected {} file(s) for processing", unique.len()),
        );

        if unique.is_empty() {
            let mut st = self.state.lock();
            if st.seq == seq {
                st.phase = BatchPhase::Completed;
                let summary = st.summary;
                let _ = self.events.send(BatchEvent::BatchComplete { summary });
            }
            return;
        }

        // Upgrading always succeeds here; we are called through the Arc
        // that new() handed out.
        let Some(me) = self.self_ref.upgrade() else {
            return;
        };
        for file in unique {
            let job = invoker::job_for_source(file, &config);
            let me = Arc::clone(&me);
            self.pool.submit(Box::new(move || me.run_job(seq, job)));
        }

        let mut st = self.state.lock();
        // A fast batch may already be past Submitting by now.
        if st.seq == seq && st.phase == BatchPhase::Submitting {
            st.phase = BatchPhase::Running;
        }
    }

    /// Discard queued jobs and let running ones drain.
    ///
    /// Running external processes are NOT killed; each still reaches
    /// its terminal outcome and the batch-complete signal fires once
    /// they finish. Discarded jobs are accounted as cancelled so the
    /// `done + running == total` invariant keeps holding.
    pub fn cancel_batch(&self) {
        self.pool.cancel_all();

        let mut st = self.state.lock();
        if !matches!(st.phase, BatchPhase::Submitting | BatchPhase::Running) {
            return;
        }
        st.phase = BatchPhase::Cancelled;

        let mut discarded = 0;
        for phase in st.jobs.values_mut() {
            if *phase == JobPhase::Queued {
                *phase = JobPhase::Done;
                discarded += 1;
            }
        }
        st.summary.cancelled += discarded;

        let still_running = st.running_count();
        let percent = st.percent();
        st.last_percent = percent;

        self.log_line(
            Severity::Warning,
            &format!(
                "Batch cancelled: {} queued job(s) discarded, {} still running",
                discarded, still_running
            ),
        );
        let _ = self.events.send(BatchEvent::Progress { percent });

        if st.summary.done() == st.total {
            let summary = st.summary;
            let _ = self.events.send(BatchEvent::BatchComplete { summary });
        }
    }

    /// Entry point executed on a pool slot for one job.
    fn run_job(&self, seq: u64, job: Job) {
        {
            let mut st = self.state.lock();
            if st.seq != seq {
                return;
            }
            match st.jobs.get_mut(&job.source) {
                Some(phase @ JobPhase::Queued) => *phase = JobPhase::Running,
                // Marked done by a cancellation that raced our dequeue,
                // or state we no longer track. Do not start.
                _ => return,
            }
        }

        let _ = self.events.send(BatchEvent::JobStarted {
            source: job.source.clone(),
        });
        self.log_line(
            Severity::Info,
            &format!("Processing file: {}", job.source.display()),
        );

        let outcome = invoker::run(&job, self);
        self.finish_job(seq, &job, outcome);
    }

    /// The sole completion trigger per job; runs exactly once for every
    /// job that actually started.
    fn finish_job(&self, seq: u64, job: &Job, outcome: JobOutcome) {
        let mut st = self.state.lock();
        if st.seq != seq {
            return;
        }
        let Some(phase) = st.jobs.get_mut(&job.source) else {
            return;
        };
        if *phase == JobPhase::Done {
            return;
        }
        *phase = JobPhase::Done;

        match &outcome {
            JobOutcome::Succeeded { output } => {
                st.summary.succeeded += 1;
                self.log_line(
                    Severity::Success,
                    &format!("Finished: {}", output.display()),
                );
            }
            JobOutcome::Failed { exit_code, stderr } => {
                st.summary.failed += 1;
                self.log_line(
                    Severity::Error,
                    &format!(
                        "Failed ({}): {} [exit code {}]",
                        job.source.display(),
                        stderr,
                        exit_code
                    ),
                );
            }
            JobOutcome::Skipped { reason } => {
                st.summary.skipped += 1;
                self.log_line(
                    Severity::Warning,
                    &format!("Skipped {}: {}", job.source.display(), reason),
                );
            }
        }

        let percent = st.percent();
        st.last_percent = percent;

        // Events are sent while holding the state lock so that the
        // progress stream stays monotone for the consumer.
        let _ = self.events.send(BatchEvent::JobFinished {
            source: job.source.clone(),
            outcome,
        });
        let _ = self.events.send(BatchEvent::Progress { percent });

        if st.summary.done() == st.total {
            if st.phase != BatchPhase::Cancelled {
                st.phase = BatchPhase::Completed;
            }
            let summary = st.summary;
            self.log_line(
                Severity::Info,
                &format!(
                    "Batch finished: {} succeeded, {} failed, {} skipped, {} cancelled",
                    summary.succeeded, summary.failed, summary.skipped, summary.cancelled
                ),
            );
            let _ = self.events.send(BatchEvent::BatchComplete { summary });
        }
    }

    /// Write to the log sink and mirror to the event stream.
    fn log_line(&self, severity: Severity, message: &str) {
        if let Some(ref logger) = *self.logger.lock() {
            logger.log(severity, message);
        }
        let _ = self.events.send(BatchEvent::Log {
            message: message.to_string(),
            severity,
        });
    }
}

impl JobSink for BatchCoordinator {
    fn tool_output(&self, job: &Job, line: &str) {
        let _ = self.events.send(BatchEvent::ToolOutput {
            source: job.source.clone(),
            line: line.to_string(),
        });
    }

    fn log(&self, severity: Severity, message: &str) {
        self.log_line(severity, message);
    }
}
