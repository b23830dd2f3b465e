//! Run status and atom-level progress, shared across workers.

use serde::Serialize;
use std::sync::Mutex;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Idle,
    Building,
    Filtering,
    Complete,
    CompleteWithWarnings,
    Error,
}

/// Snapshot returned by a progress query.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct Progress {
    pub status: Status,
    pub total_atoms: usize,
    pub processed_atoms: usize,
    pub percent: f64,
}

/// Mutex-protected counter. Writers are the atom workers; readers only
/// appear on the query path, never inside the build loop.
#[derive(Debug)]
pub struct ProgressTracker {
    state: Mutex<State>,
}

#[derive(Debug)]
struct State {
    status: Status,
    total: usize,
    processed: usize,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self {
            state: Mutex::new(State {
                status: Status::Idle,
                total: 0,
                processed: 0,
            }),
        }
    }
}

impl ProgressTracker {
    pub fn begin(&self, total_atoms: usize) {
        let mut state = self.state.lock().unwrap();
        state.status = Status::Building;
        state.total = total_atoms;
        state.processed = 0;
    }

    pub fn record_atom(&self) {
        self.state.lock().unwrap().processed += 1;
    }

    pub fn set_status(&self, status: Status) {
        self.state.lock().unwrap().status = status;
    }

    pub fn snapshot(&self) -> Progress {
        let state = self.state.lock().unwrap();
        let percent = if state.total == 0 {
            0.0
        } else {
            100.0 * state.processed as f64 / state.total as f64
        };
        Progress {
            status: state.status,
            total_atoms: state.total,
            processed_atoms: state.processed,
            percent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_and_percent() {
        let tracker = ProgressTracker::default();
        assert_eq!(tracker.snapshot().status, Status::Idle);

        tracker.begin(4);
        tracker.record_atom();
        tracker.record_atom();
        let progress = tracker.snapshot();
        assert_eq!(progress.status, Status::Building);
        assert_eq!(progress.processed_atoms, 2);
        assert!((progress.percent - 50.0).abs() < f64::EPSILON);

        tracker.set_status(Status::Complete);
        assert_eq!(tracker.snapshot().status, Status::Complete);
    }

    #[test]
    fn empty_run_reports_zero_percent() {
        let tracker = ProgressTracker::default();
        tracker.begin(0);
        assert_eq!(tracker.snapshot().percent, 0.0);
    }
}
