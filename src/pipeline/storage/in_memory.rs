use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;
use uuid::Uuid;

use super::{ensure_committable, name_key, WorkoutStore};
use crate::error::{ImportError, Result};
use crate::types::{ExerciseCatalogEntry, WorkoutDraft};

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| ImportError::Persistence("in-memory store lock poisoned".to_string()))
}

/// In-memory store for tests and dry runs
#[derive(Clone, Default)]
pub struct InMemoryStore {
    exercises: Arc<Mutex<HashMap<Uuid, ExerciseCatalogEntry>>>,
    workouts: Arc<Mutex<Vec<WorkoutDraft>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with catalog entries.
    pub fn with_exercises<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let store = Self::new();
        if let Ok(mut exercises) = store.exercises.lock() {
            for name in names {
                let entry = ExerciseCatalogEntry {
                    id: Uuid::new_v4(),
                    name: name.into(),
                };
                exercises.insert(entry.id, entry);
            }
        }
        store
    }
}

#[async_trait]
impl WorkoutStore for InMemoryStore {
    async fn find_exercise_by_name(&self, name: &str) -> Result<Option<ExerciseCatalogEntry>> {
        let key = name_key(name);
        let exercises = lock(&self.exercises)?;
        Ok(exercises.values().find(|e| name_key(&e.name) == key).cloned())
    }

    async fn get_exercise(&self, id: Uuid) -> Result<Option<ExerciseCatalogEntry>> {
        Ok(lock(&self.exercises)?.get(&id).cloned())
    }

    async fn create_exercise(&self, entry: &ExerciseCatalogEntry) -> Result<()> {
        let mut exercises = lock(&self.exercises)?;
        let key = name_key(&entry.name);
        if exercises.values().any(|e| e.id != entry.id && name_key(&e.name) == key) {
            return Err(ImportError::Persistence(format!(
                "exercise '{}' already exists",
                entry.name
            )));
        }
        exercises.insert(entry.id, entry.clone());
        debug!("Created exercise: {} with id {}", entry.name, entry.id);
        Ok(())
    }

    async fn list_exercises(&self) -> Result<Vec<ExerciseCatalogEntry>> {
        let mut all: Vec<_> = lock(&self.exercises)?.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(all)
    }

    async fn save_workouts(&self, workouts: &[WorkoutDraft]) -> Result<()> {
        ensure_committable(workouts)?;
        let mut stored = lock(&self.workouts)?;
        stored.extend(workouts.iter().cloned());
        debug!("Saved {} workouts", workouts.len());
        Ok(())
    }

    async fn delete_workouts(&self, ids: &[Uuid]) -> Result<()> {
        let mut stored = lock(&self.workouts)?;
        stored.retain(|w| !ids.contains(&w.id));
        debug!("Deleted {} workouts", ids.len());
        Ok(())
    }

    async fn list_workouts(&self) -> Result<Vec<WorkoutDraft>> {
        Ok(lock(&self.workouts)?.clone())
    }
}
