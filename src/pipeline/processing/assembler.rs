//! Workout assembly from parsed rows.
//!
//! Rows are grouped by (start, workout name) into workouts and, inside a
//! workout, by exercise name. Exercise groups of one workout are built on
//! separate tasks and joined before the workout is finalized. Workouts are
//! processed one after another, yielding to the runtime in between.

use chrono::{Duration, NaiveDateTime};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::catalog::ExerciseResolver;
use super::normalize::parse_duration_seconds;
use super::parser::TypedRow;
use crate::error::Result;
use crate::observability::metrics;
use crate::pipeline::storage::name_key;
use crate::types::{ExerciseDraft, ImportSource, SetDraft, WorkoutDraft};

pub struct WorkoutAssembler {
    resolver: Arc<ExerciseResolver>,
}

impl WorkoutAssembler {
    pub fn new(resolver: Arc<ExerciseResolver>) -> Self {
        Self { resolver }
    }

    /// Build one draft per distinct (start, workout name).
    ///
    /// `progress` is called with `(current, total)` before each workout; an
    /// error from it aborts assembly.
    #[instrument(skip_all, fields(rows = rows.len()))]
    pub async fn assemble<F>(&self, rows: Vec<TypedRow>, mut progress: F) -> Result<Vec<WorkoutDraft>>
    where
        F: FnMut(usize, usize) -> Result<()>,
    {
        let groups = group_workouts(rows);
        let total = groups.len();
        let mut drafts = Vec::with_capacity(total);

        for (i, ((start, name), rows)) in groups.into_iter().enumerate() {
            progress(i + 1, total)?;
            let draft = self.build_workout(start, name, rows).await?;
            metrics::assembly::workout_built(draft.exercises.len(), draft.set_count());
            drafts.push(draft);
            tokio::task::yield_now().await;
        }

        info!(workouts = drafts.len(), "Assembled workouts");
        Ok(drafts)
    }

    async fn build_workout(
        &self,
        start: NaiveDateTime,
        name: String,
        mut rows: Vec<TypedRow>,
    ) -> Result<WorkoutDraft> {
        rows.sort_by_key(|r| r.line_number());

        let source = match rows.first() {
            Some(TypedRow::Hevy(_)) => ImportSource::Hevy,
            _ => ImportSource::Strong,
        };
        let end = workout_end(start, &rows);
        let notes = rows
            .iter()
            .find_map(|r| r.workout_notes())
            .map(str::to_string);

        let mut tasks = JoinSet::new();
        for (position, (exercise_name, group)) in group_exercises(rows).into_iter().enumerate() {
            let resolver = Arc::clone(&self.resolver);
            tasks.spawn(async move {
                let exercise = resolver.resolve(&exercise_name).await?;
                let notes = group
                    .iter()
                    .find_map(|r| r.exercise_notes())
                    .map(str::to_string);
                let sets = build_sets(group);
                Ok::<_, crate::error::ImportError>((
                    position,
                    ExerciseDraft {
                        exercise,
                        exercise_name,
                        order: 0,
                        sets,
                        notes,
                    },
                ))
            });
        }

        let mut exercises = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            exercises.push(joined??);
        }
        exercises.sort_by_key(|(position, _)| *position);
        let exercises: Vec<ExerciseDraft> = exercises
            .into_iter()
            .enumerate()
            .map(|(order, (_, mut exercise))| {
                exercise.order = order as i32;
                exercise
            })
            .collect();

        debug!(workout = %name, %start, exercises = exercises.len(), "Built workout");
        Ok(WorkoutDraft {
            id: Uuid::new_v4(),
            name,
            start,
            end,
            duration_seconds: (end - start).num_seconds().max(0) as u64,
            notes,
            exercises,
            source,
        })
    }
}

fn group_workouts(rows: Vec<TypedRow>) -> BTreeMap<(NaiveDateTime, String), Vec<TypedRow>> {
    let mut groups: BTreeMap<(NaiveDateTime, String), Vec<TypedRow>> = BTreeMap::new();
    for row in rows {
        groups
            .entry((row.started_at(), row.workout_name().to_string()))
            .or_default()
            .push(row);
    }
    groups
}

/// Exercise groups in order of first appearance. `rows` must be sorted by line.
fn group_exercises(rows: Vec<TypedRow>) -> Vec<(String, Vec<TypedRow>)> {
    let mut groups: Vec<(String, String, Vec<TypedRow>)> = Vec::new();
    for row in rows {
        let key = name_key(row.exercise_name());
        match groups.iter_mut().find(|(k, _, _)| *k == key) {
            Some((_, _, group)) => group.push(row),
            None => {
                let name = row.exercise_name().trim().to_string();
                groups.push((key, name, vec![row]));
            }
        }
    }
    groups
        .into_iter()
        .map(|(_, name, group)| (name, group))
        .collect()
}

/// Sets ordered by source set index, ties broken by line. Orders stay strictly
/// increasing and non-negative; a set that cannot get an order within `i32`
/// is left out.
fn build_sets(mut rows: Vec<TypedRow>) -> Vec<SetDraft> {
    rows.sort_by_key(|r| (r.set_index(), r.line_number()));
    let mut previous: i64 = -1;
    rows.iter()
        .filter_map(|row| {
            let wanted = i64::from(row.set_index()).max(previous + 1);
            let Ok(order) = i32::try_from(wanted) else {
                debug!(line_number = row.line_number(), "Set order out of range; skipping set");
                return None;
            };
            previous = wanted;
            Some(SetDraft {
                reps: row.reps(),
                weight: row.weight(),
                set_type: row.set_type(),
                rpe: row.rpe(),
                order,
                done: true,
            })
        })
        .collect()
}

fn workout_end(start: NaiveDateTime, rows: &[TypedRow]) -> NaiveDateTime {
    let end = match rows.first() {
        Some(TypedRow::Hevy(_)) => rows
            .iter()
            .find_map(|r| match r {
                TypedRow::Hevy(h) => h.end_time,
                TypedRow::Strong(_) => None,
            })
            .unwrap_or(start),
        Some(TypedRow::Strong(first)) => {
            let seconds = parse_duration_seconds(&first.duration).unwrap_or(0);
            i64::try_from(seconds)
                .ok()
                .and_then(Duration::try_seconds)
                .and_then(|d| start.checked_add_signed(d))
                .unwrap_or(start)
        }
        None => start,
    };
    end.max(start)
}
