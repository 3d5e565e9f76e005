// Persistence gateway: exercise catalog and committed workouts

pub mod in_memory;
pub mod sqlite;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::{ImportError, Result};
use crate::types::{ExerciseCatalogEntry, ExerciseRef, WorkoutDraft};

pub use in_memory::InMemoryStore;
pub use sqlite::SqliteStore;

/// Storage trait for the exercise catalog and imported workouts
#[async_trait]
pub trait WorkoutStore: Send + Sync {
    // Exercise catalog operations
    async fn find_exercise_by_name(&self, name: &str) -> Result<Option<ExerciseCatalogEntry>>;
    async fn get_exercise(&self, id: Uuid) -> Result<Option<ExerciseCatalogEntry>>;
    async fn create_exercise(&self, entry: &ExerciseCatalogEntry) -> Result<()>;
    async fn list_exercises(&self) -> Result<Vec<ExerciseCatalogEntry>>;

    // Workout operations
    /// Persist a batch of workouts atomically: all of them or none.
    async fn save_workouts(&self, workouts: &[WorkoutDraft]) -> Result<()>;
    async fn delete_workouts(&self, ids: &[Uuid]) -> Result<()>;
    async fn list_workouts(&self) -> Result<Vec<WorkoutDraft>>;
}

/// Reject workouts that still point at placeholders or unresolved names.
pub(crate) fn ensure_committable(workouts: &[WorkoutDraft]) -> Result<()> {
    for workout in workouts {
        for exercise in &workout.exercises {
            if !matches!(exercise.exercise, ExerciseRef::Catalog(_)) {
                return Err(ImportError::Persistence(format!(
                    "workout '{}' references uncommitted exercise '{}'",
                    workout.name, exercise.exercise_name
                )));
            }
        }
    }
    Ok(())
}

/// Catalog lookups are case-insensitive on the trimmed name.
pub(crate) fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}
