//! Import session: drives one export file from disk to the store.
//!
//! Flow: read file, parse in chunks, assemble workouts, save every workout
//! whose exercises all matched the catalog, then pause in
//! `MappingExercises` if any names are still unmatched. The caller resumes
//! with [`ImportSession::confirm_exercise_mapping`] or
//! [`ImportSession::cancel_mapping`]. Any persistence failure deletes the
//! workouts this run already committed before the session reports `Failed`.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::ingestion::ScopedFileAccess;
use super::processing::assembler::WorkoutAssembler;
use super::processing::catalog::{
    CancelPolicy, ExerciseReconciler, ExerciseResolver, MappingDecision, MappingPlan,
    PendingExercise,
};
use super::processing::parser::{parse_csv, DropReason};
use super::status::{ImportStage, ImportStatus, ImportStatusMachine, StatusStream};
use super::storage::WorkoutStore;
use crate::config::ImportConfig;
use crate::error::{ImportError, Result};
use crate::observability::metrics;
use crate::types::{ImportSource, WorkoutDraft};

/// What an import did
#[derive(Debug, Clone, Serialize)]
pub struct ImportSummary {
    /// Schema the file was parsed with
    pub source: ImportSource,
    /// Set when the header contradicted the declared source
    pub format_override: Option<ImportSource>,
    pub file_sha256: String,
    pub data_lines: usize,
    pub rows_parsed: usize,
    pub dropped_rows: BTreeMap<DropReason, usize>,
    pub workouts_saved: usize,
    pub exercises_created: usize,
    pub mappings_applied: usize,
    pub workouts_dropped: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unresolved_workouts: Vec<WorkoutDraft>,
}

#[derive(Debug, Clone)]
pub enum ImportOutcome {
    Completed(ImportSummary),
    /// Paused until the caller decides what each unmatched name means
    NeedsMapping(Vec<PendingExercise>),
}

/// Work parked while waiting for mapping decisions
struct PausedImport {
    summary: ImportSummary,
    staged: Vec<WorkoutDraft>,
    pending: Vec<PendingExercise>,
    committed: Vec<Uuid>,
    started: Instant,
}

pub struct ImportSession {
    store: Arc<dyn WorkoutStore>,
    config: ImportConfig,
    status: ImportStatusMachine,
    paused: Option<PausedImport>,
    last_request: Option<(PathBuf, ImportSource)>,
}

impl ImportSession {
    pub fn new(store: Arc<dyn WorkoutStore>, config: ImportConfig) -> (Self, StatusStream) {
        let (status, stream) = ImportStatusMachine::new();
        let session = Self {
            store,
            config,
            status,
            paused: None,
            last_request: None,
        };
        (session, stream)
    }

    pub fn status(&self) -> ImportStatus {
        self.status.current()
    }

    /// Pending names while paused in `MappingExercises`.
    pub fn pending_exercises(&self) -> Vec<PendingExercise> {
        self.paused
            .as_ref()
            .map(|p| p.pending.clone())
            .unwrap_or_default()
    }

    #[instrument(skip(self, path), fields(path = %path.display()))]
    pub async fn start_import(
        &mut self,
        path: &Path,
        declared: ImportSource,
    ) -> Result<ImportOutcome> {
        let access = ScopedFileAccess::acquire(path).await?;
        self.status
            .transition(ImportStatus::Importing(ImportStage::ReadingFile))?;
        self.last_request = Some((path.to_path_buf(), declared));
        info!("🚀 Starting {} import from {}", declared, access.path().display());

        let started = Instant::now();
        let mut committed = Vec::new();
        match self.run_import(access, declared, &mut committed, started).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => Err(self.fail(&committed, e).await),
        }
    }

    async fn run_import(
        &mut self,
        mut access: ScopedFileAccess,
        declared: ImportSource,
        committed: &mut Vec<Uuid>,
        started: Instant,
    ) -> Result<ImportOutcome> {
        let file = access.read_lossy().await?;
        drop(access);

        self.status
            .transition(ImportStatus::Importing(ImportStage::ParsingCsv))?;
        let parsed = parse_csv(&file.text, declared, self.config.chunk_size).await?;
        let source = parsed
            .format
            .as_ref()
            .map(|f| f.effective)
            .unwrap_or(declared);
        let format_override = parsed
            .format
            .as_ref()
            .filter(|f| f.overridden())
            .map(|f| f.effective);
        let rows_parsed = parsed.rows.len();
        info!(
            "✅ Parsed {} rows ({} dropped) from {} data lines",
            rows_parsed,
            parsed.dropped_total(),
            parsed.data_lines
        );

        let resolver = Arc::new(ExerciseResolver::new(Arc::clone(&self.store)));
        let assembler = WorkoutAssembler::new(Arc::clone(&resolver));
        let status = self.status.clone();
        let drafts = assembler
            .assemble(parsed.rows, |current, total| {
                status.transition(ImportStatus::Importing(
                    ImportStage::ProcessingWorkouts { current, total },
                ))
            })
            .await?;

        self.status
            .transition(ImportStatus::Importing(ImportStage::SavingData))?;
        let (staged, ready): (Vec<_>, Vec<_>) =
            drafts.into_iter().partition(|d| d.has_placeholders());
        let workouts_saved =
            save_in_batches(self.store.as_ref(), &ready, self.config.batch_size, committed).await?;

        let summary = ImportSummary {
            source,
            format_override,
            file_sha256: file.sha256,
            data_lines: parsed.data_lines,
            rows_parsed,
            dropped_rows: parsed.dropped,
            workouts_saved,
            exercises_created: 0,
            mappings_applied: 0,
            workouts_dropped: 0,
            unresolved_workouts: Vec::new(),
        };

        let pending = resolver.pending().await;
        if staged.is_empty() {
            return self.complete(summary, started).map(ImportOutcome::Completed);
        }

        self.status.transition(ImportStatus::MappingExercises {
            pending: pending.len(),
        })?;
        info!(
            "⏸️  {} workouts wait on {} unmatched exercises",
            staged.len(),
            pending.len()
        );
        self.paused = Some(PausedImport {
            summary,
            staged,
            pending: pending.clone(),
            committed: std::mem::take(committed),
            started,
        });
        Ok(ImportOutcome::NeedsMapping(pending))
    }

    /// Apply the user's decisions and save the remaining workouts.
    ///
    /// Names without a selection become new catalog entries. An unknown
    /// `MapTo` target is rejected before anything changes and the session
    /// stays in `MappingExercises`.
    #[instrument(skip_all, fields(selections = selections.len()))]
    pub async fn confirm_exercise_mapping(
        &mut self,
        selections: HashMap<String, MappingDecision>,
    ) -> Result<ImportSummary> {
        let paused = self.paused.take().ok_or(ImportError::NoPendingMapping)?;
        let reconciler = ExerciseReconciler::new(Arc::clone(&self.store));

        let plan = match reconciler.plan(&paused.pending, &selections).await {
            Ok(plan) => plan,
            Err(e) => {
                warn!("Mapping rejected: {}", e);
                self.paused = Some(paused);
                return Err(e);
            }
        };

        let PausedImport {
            mut summary,
            mut staged,
            mut committed,
            started,
            ..
        } = paused;
        match self
            .finish_mapping(&reconciler, &plan, &mut staged, &mut summary, &mut committed)
            .await
        {
            Ok(()) => self.complete(summary, started),
            Err(e) => Err(self.fail(&committed, e).await),
        }
    }

    async fn finish_mapping(
        &self,
        reconciler: &ExerciseReconciler,
        plan: &MappingPlan,
        staged: &mut [WorkoutDraft],
        summary: &mut ImportSummary,
        committed: &mut Vec<Uuid>,
    ) -> Result<()> {
        self.status
            .transition(ImportStatus::Importing(ImportStage::SavingData))?;
        summary.exercises_created = reconciler.promote(plan).await?;
        summary.mappings_applied = ExerciseReconciler::apply(plan, staged);
        summary.workouts_saved +=
            save_in_batches(self.store.as_ref(), staged, self.config.batch_size, committed).await?;
        Ok(())
    }

    /// Discard every pending decision at once.
    #[instrument(skip(self))]
    pub async fn cancel_mapping(&mut self, policy: CancelPolicy) -> Result<ImportSummary> {
        let paused = self.paused.take().ok_or(ImportError::NoPendingMapping)?;
        let PausedImport {
            mut summary,
            staged,
            pending,
            mut committed,
            started,
        } = paused;

        let outcome = ExerciseReconciler::cancel(&pending, staged, policy);
        summary.workouts_dropped = outcome.dropped;
        summary.unresolved_workouts = outcome.retained;

        if !outcome.committable.is_empty() {
            let saved = match self.save_committable(&outcome.committable, &mut committed).await {
                Ok(saved) => saved,
                Err(e) => return Err(self.fail(&committed, e).await),
            };
            summary.workouts_saved += saved;
        }
        self.complete(summary, started)
    }

    async fn save_committable(
        &self,
        drafts: &[WorkoutDraft],
        committed: &mut Vec<Uuid>,
    ) -> Result<usize> {
        self.status
            .transition(ImportStatus::Importing(ImportStage::SavingData))?;
        save_in_batches(self.store.as_ref(), drafts, self.config.batch_size, committed).await
    }

    /// Re-run the last import after a failure.
    pub async fn retry(&mut self) -> Result<ImportOutcome> {
        let current = self.status.current();
        let request = match (&current, &self.last_request) {
            (ImportStatus::Failed(_), Some(request)) => request.clone(),
            _ => {
                return Err(ImportError::InvalidTransition {
                    from: current.to_string(),
                    to: ImportStatus::NotStarted.to_string(),
                })
            }
        };
        info!("🔁 Retrying import of {}", request.0.display());
        self.status.transition(ImportStatus::NotStarted)?;
        self.start_import(&request.0, request.1).await
    }

    fn complete(&mut self, summary: ImportSummary, started: Instant) -> Result<ImportSummary> {
        self.status.transition(ImportStatus::Completed)?;
        self.status
            .schedule_reset(self.config.completed_reset_delay());
        metrics::session::completed(started.elapsed().as_secs_f64());
        info!(
            "🎉 Import completed: {} workouts saved, {} exercises created, {} dropped",
            summary.workouts_saved, summary.exercises_created, summary.workouts_dropped
        );
        Ok(summary)
    }

    async fn fail(&mut self, committed: &[Uuid], error: ImportError) -> ImportError {
        if !committed.is_empty() {
            match self.store.delete_workouts(committed).await {
                Ok(()) => {
                    metrics::persistence::rollback(committed.len());
                    warn!("Rolled back {} workouts committed by this import", committed.len());
                }
                Err(e) => error!("Rollback of {} workouts failed: {}", committed.len(), e),
            }
        }
        metrics::session::failed();
        error!("❌ Import failed: {}", error);
        if let Err(e) = self.status.transition(ImportStatus::Failed(error.to_string())) {
            warn!("Could not record failure: {}", e);
        }
        error
    }
}

/// Save `drafts` in batches of `batch_size`, one store transaction each.
/// Ids of every committed workout are appended to `committed`.
async fn save_in_batches(
    store: &dyn WorkoutStore,
    drafts: &[WorkoutDraft],
    batch_size: usize,
    committed: &mut Vec<Uuid>,
) -> Result<usize> {
    let mut saved = 0;
    for batch in drafts.chunks(batch_size.max(1)) {
        if let Err(e) = store.save_workouts(batch).await {
            metrics::persistence::error();
            return Err(e);
        }
        committed.extend(batch.iter().map(|w| w.id));
        saved += batch.len();
        metrics::persistence::batch_saved(batch.len());
        info!("💾 Saved batch of {} workouts ({} total)", batch.len(), saved);
    }
    Ok(saved)
}
