//! Import status machine.
//!
//! A session owns one [`ImportStatusMachine`]; every accepted transition is
//! pushed to the paired [`StatusStream`]. Transitions that would move the
//! import backwards are rejected.

use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::{ImportError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum ImportStage {
    ReadingFile,
    ParsingCsv,
    ProcessingWorkouts { current: usize, total: usize },
    SavingData,
}

impl ImportStage {
    fn rank(&self) -> u8 {
        match self {
            ImportStage::ReadingFile => 0,
            ImportStage::ParsingCsv => 1,
            ImportStage::ProcessingWorkouts { .. } => 2,
            ImportStage::SavingData => 3,
        }
    }
}

impl fmt::Display for ImportStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportStage::ReadingFile => f.write_str("reading file"),
            ImportStage::ParsingCsv => f.write_str("parsing csv"),
            ImportStage::ProcessingWorkouts { current, total } => {
                write!(f, "processing workouts {current}/{total}")
            }
            ImportStage::SavingData => f.write_str("saving data"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum ImportStatus {
    NotStarted,
    Importing(ImportStage),
    MappingExercises { pending: usize },
    Completed,
    Failed(String),
}

impl fmt::Display for ImportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportStatus::NotStarted => f.write_str("not started"),
            ImportStatus::Importing(stage) => write!(f, "importing: {stage}"),
            ImportStatus::MappingExercises { pending } => {
                write!(f, "mapping exercises ({pending} pending)")
            }
            ImportStatus::Completed => f.write_str("completed"),
            ImportStatus::Failed(message) => write!(f, "failed: {message}"),
        }
    }
}

fn allowed(from: &ImportStatus, to: &ImportStatus) -> bool {
    use ImportStatus::*;
    match (from, to) {
        (NotStarted | Completed, Importing(ImportStage::ReadingFile)) => true,
        (Importing(a), Importing(b)) => match (a, b) {
            (
                ImportStage::ProcessingWorkouts { current: c1, total: t1 },
                ImportStage::ProcessingWorkouts { current: c2, total: t2 },
            ) => t1 == t2 && c2 >= c1,
            _ => b.rank() > a.rank(),
        },
        (MappingExercises { .. }, Importing(ImportStage::SavingData)) => true,
        (Importing(_), MappingExercises { .. } | Completed) => true,
        (MappingExercises { .. }, Completed) => true,
        (Importing(_) | MappingExercises { .. }, Failed(_)) => true,
        (Completed | Failed(_), NotStarted) => true,
        _ => false,
    }
}

struct StatusState {
    status: ImportStatus,
    generation: u64,
}

/// Shared handle to a session's status
#[derive(Clone)]
pub struct ImportStatusMachine {
    state: Arc<Mutex<StatusState>>,
    tx: mpsc::UnboundedSender<ImportStatus>,
}

impl ImportStatusMachine {
    pub fn new() -> (Self, StatusStream) {
        let (tx, rx) = mpsc::unbounded_channel();
        let machine = Self {
            state: Arc::new(Mutex::new(StatusState {
                status: ImportStatus::NotStarted,
                generation: 0,
            })),
            tx,
        };
        (machine, StatusStream { rx })
    }

    fn lock(&self) -> MutexGuard<'_, StatusState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn current(&self) -> ImportStatus {
        self.lock().status.clone()
    }

    pub fn transition(&self, next: ImportStatus) -> Result<()> {
        let mut state = self.lock();
        if !allowed(&state.status, &next) {
            return Err(ImportError::InvalidTransition {
                from: state.status.to_string(),
                to: next.to_string(),
            });
        }
        debug!(from = %state.status, to = %next, "Import status changed");
        state.status = next.clone();
        state.generation += 1;
        // Nobody listening is fine.
        let _ = self.tx.send(next);
        Ok(())
    }

    /// Return to `NotStarted` after `delay` unless the status moved on first.
    pub fn schedule_reset(&self, delay: Duration) {
        let generation = self.lock().generation;
        let machine = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let still_completed = {
                let state = machine.lock();
                state.generation == generation && state.status == ImportStatus::Completed
            };
            if still_completed {
                if let Err(e) = machine.transition(ImportStatus::NotStarted) {
                    warn!("Status reset skipped: {}", e);
                }
            }
        });
    }
}

/// Receiving end of a session's status updates
pub struct StatusStream {
    rx: mpsc::UnboundedReceiver<ImportStatus>,
}

impl StatusStream {
    /// Next status, or `None` once the session is gone.
    pub async fn next(&mut self) -> Option<ImportStatus> {
        self.rx.recv().await
    }

    /// Everything already published, without waiting.
    pub fn drain(&mut self) -> Vec<ImportStatus> {
        let mut statuses = Vec::new();
        while let Ok(status) = self.rx.try_recv() {
            statuses.push(status);
        }
        statuses
    }
}
