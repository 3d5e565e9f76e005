use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::resolver::PendingExercise;
use crate::error::{ImportError, Result};
use crate::observability::metrics;
use crate::pipeline::storage::{name_key, WorkoutStore};
use crate::types::{ExerciseCatalogEntry, ExerciseRef, WorkoutDraft};

/// What to do with one unmatched exercise name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingDecision {
    /// Promote the placeholder to a new catalog entry with the same id
    KeepNew,
    /// Point every reference at an existing catalog entry
    MapTo(Uuid),
}

impl FromStr for MappingDecision {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let value = s.trim();
        if value.eq_ignore_ascii_case("new") {
            return Ok(MappingDecision::KeepNew);
        }
        Uuid::parse_str(value)
            .map(MappingDecision::MapTo)
            .map_err(|_| format!("expected 'new' or an exercise id, got '{value}'"))
    }
}

/// What happens to staged workouts when the user cancels mapping
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelPolicy {
    /// Discard every staged workout that references an unmatched name
    #[default]
    DropAffected,
    /// Keep affected workouts with unresolved references, without persisting them
    RetainUnresolved,
}

impl FromStr for CancelPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "drop" | "drop_affected" => Ok(CancelPolicy::DropAffected),
            "retain" | "retain_unresolved" => Ok(CancelPolicy::RetainUnresolved),
            other => Err(format!("unknown cancel policy: {other}")),
        }
    }
}

impl fmt::Display for CancelPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelPolicy::DropAffected => f.write_str("drop"),
            CancelPolicy::RetainUnresolved => f.write_str("retain"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum PlannedAction {
    Promote,
    Rewrite(ExerciseCatalogEntry),
}

/// Validated decisions for every pending exercise
#[derive(Debug, Clone)]
pub struct MappingPlan {
    actions: Vec<(PendingExercise, PlannedAction)>,
}

impl MappingPlan {
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn promoted(&self) -> usize {
        self.actions
            .iter()
            .filter(|(_, a)| matches!(a, PlannedAction::Promote))
            .count()
    }

    fn target_for(&self, placeholder_id: Uuid) -> Option<Uuid> {
        self.actions
            .iter()
            .find(|(p, _)| p.placeholder_id == placeholder_id)
            .map(|(p, action)| match action {
                PlannedAction::Promote => p.placeholder_id,
                PlannedAction::Rewrite(entry) => entry.id,
            })
    }
}

/// Result of cancelling a pending mapping
#[derive(Debug, Default)]
pub struct CancelOutcome {
    /// Workouts that no longer reference any unmatched name
    pub committable: Vec<WorkoutDraft>,
    /// Affected workouts kept with unresolved references
    pub retained: Vec<WorkoutDraft>,
    pub dropped: usize,
}

/// Applies user decisions for unmatched exercise names
pub struct ExerciseReconciler {
    store: Arc<dyn WorkoutStore>,
}

impl ExerciseReconciler {
    pub fn new(store: Arc<dyn WorkoutStore>) -> Self {
        Self { store }
    }

    /// Validate `selections` against the pending names and the catalog.
    ///
    /// Nothing is written here. An unknown `MapTo` target fails the whole plan.
    #[instrument(skip_all, fields(pending = pending.len(), selections = selections.len()))]
    pub async fn plan(
        &self,
        pending: &[PendingExercise],
        selections: &HashMap<String, MappingDecision>,
    ) -> Result<MappingPlan> {
        let by_key: HashMap<String, MappingDecision> = selections
            .iter()
            .map(|(name, decision)| (name_key(name), *decision))
            .collect();

        for name in selections.keys() {
            let key = name_key(name);
            if !pending.iter().any(|p| name_key(&p.name) == key) {
                warn!(exercise = %name, "Ignoring selection for an exercise that is not pending");
            }
        }

        let mut actions = Vec::with_capacity(pending.len());
        for exercise in pending {
            let decision = by_key
                .get(&name_key(&exercise.name))
                .copied()
                .unwrap_or(MappingDecision::KeepNew);
            let action = match decision {
                MappingDecision::KeepNew => PlannedAction::Promote,
                MappingDecision::MapTo(target) => match self.store.get_exercise(target).await? {
                    Some(entry) => PlannedAction::Rewrite(entry),
                    None => {
                        return Err(ImportError::UnknownMappingTarget {
                            name: exercise.name.clone(),
                            target,
                        })
                    }
                },
            };
            actions.push((exercise.clone(), action));
        }
        Ok(MappingPlan { actions })
    }

    /// Create catalog entries for every `KeepNew` decision, reusing the placeholder id.
    pub async fn promote(&self, plan: &MappingPlan) -> Result<usize> {
        let mut created = 0;
        for (exercise, action) in &plan.actions {
            if *action != PlannedAction::Promote {
                continue;
            }
            let entry = ExerciseCatalogEntry {
                id: exercise.placeholder_id,
                name: exercise.name.clone(),
            };
            self.store.create_exercise(&entry).await?;
            created += 1;
        }
        metrics::catalog::placeholders_promoted(created as u64);
        info!(created, "Promoted placeholders to catalog entries");
        Ok(created)
    }

    /// Rewrite every planned placeholder reference. Returns the number of
    /// references changed.
    pub fn apply(plan: &MappingPlan, drafts: &mut [WorkoutDraft]) -> usize {
        let mut rewritten = 0;
        for draft in drafts.iter_mut() {
            for exercise in draft.exercises.iter_mut() {
                let ExerciseRef::Placeholder(placeholder_id) = exercise.exercise else {
                    continue;
                };
                if let Some(target) = plan.target_for(placeholder_id) {
                    exercise.exercise = ExerciseRef::Catalog(target);
                    rewritten += 1;
                }
            }
        }
        metrics::catalog::mappings_applied(rewritten as u64);
        rewritten
    }

    /// Discard all pending decisions as one batch.
    pub fn cancel(
        pending: &[PendingExercise],
        drafts: Vec<WorkoutDraft>,
        policy: CancelPolicy,
    ) -> CancelOutcome {
        let mut outcome = CancelOutcome::default();
        for mut draft in drafts {
            let affected = pending
                .iter()
                .any(|p| draft.references_placeholder(p.placeholder_id));
            if !affected {
                outcome.committable.push(draft);
                continue;
            }
            match policy {
                CancelPolicy::DropAffected => outcome.dropped += 1,
                CancelPolicy::RetainUnresolved => {
                    for exercise in draft.exercises.iter_mut() {
                        if let ExerciseRef::Placeholder(id) = exercise.exercise {
                            if pending.iter().any(|p| p.placeholder_id == id) {
                                exercise.exercise = ExerciseRef::Unresolved;
                            }
                        }
                    }
                    outcome.retained.push(draft);
                }
            }
        }
        metrics::catalog::mappings_cancelled(pending.len() as u64);
        info!(
            %policy,
            dropped = outcome.dropped,
            retained = outcome.retained.len(),
            "Cancelled exercise mapping"
        );
        outcome
    }
}
