//! Presentation signals emitted by the batch coordinator.
//!
//! Events are fire-and-forget notifications over a channel, consumed
//! by a single presentation layer (GUI main loop or CLI printer).
//! Delivery order across different jobs is unspecified; lines of one
//! job's output stream arrive in the order the subprocess produced
//! them.

use std::path::PathBuf;

use crate::logging::Severity;
use crate::models::JobOutcome;

/// A signal from the coordinator to the presentation layer.
#[derive(Debug, Clone)]
pub enum BatchEvent {
    /// A severity-tagged log line (already written to the log sink).
    Log { message: String, severity: Severity },
    /// One line of a job's combined subprocess output, streamed live.
    ToolOutput { source: PathBuf, line: String },
    /// A job's external process is about to launch.
    JobStarted { source: PathBuf },
    /// A job reached its terminal outcome. Emitted exactly once per
    /// executed job; jobs discarded by cancellation never emit this.
    JobFinished { source: PathBuf, outcome: JobOutcome },
    /// Aggregate progress changed. Percent is `floor(done / total * 100)`.
    Progress { percent: u8 },
    /// Every job of the batch terminated (or was discarded).
    BatchComplete { summary: BatchSummary },
}

/// Final accounting for one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Jobs submitted with the batch.
    pub total: usize,
    /// Jobs whose tool exited 0.
    pub succeeded: usize,
    /// Jobs whose tool exited nonzero or faulted.
    pub failed: usize,
    /// Jobs skipped before launching a process.
    pub skipped: usize,
    /// Queued jobs discarded by cancellation.
    pub cancelled: usize,
}

impl BatchSummary {
    /// Jobs that reached a terminal state one way or another.
    pub fn done(&self) -> usize {
        self.succeeded + self.failed + self.skipped + self.cancelled
    }
}

/// Sending half of the event channel, held by the coordinator.
pub type EventSender = crossbeam_channel::Sender<BatchEvent>;

/// Receiving half of the event channel, held by the presentation layer.
pub type EventReceiver = crossbeam_channel::Receiver<BatchEvent>;

/// Create an unbounded event channel.
pub fn channel() -> (EventSender, EventReceiver) {
    crossbeam_channel::unbounded()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_counts_all_terminal_states() {
        let summary = BatchSummary {
            total: 7,
            succeeded: 3,
            failed: 1,
            skipped: 1,
            cancelled: 2,
        };
        assert_eq!(summary.done(), 7);
    }

    #[test]
    fn events_flow_through_channel() {
        let (tx, rx) = channel();
        tx.send(BatchEvent::Progress { percent: 50 }).unwrap();

        match rx.recv().unwrap() {
            BatchEvent::Progress { percent } => assert_eq!(percent, 50),
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
