use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::error::Result;
use crate::observability::metrics;
use crate::pipeline::storage::{name_key, WorkoutStore};
use crate::types::ExerciseRef;

/// An exercise name with no catalog match, waiting for a user decision
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingExercise {
    pub placeholder_id: Uuid,
    /// First spelling seen in the export
    pub name: String,
}

#[derive(Default)]
struct ResolverState {
    by_name: HashMap<String, ExerciseRef>,
    pending: Vec<PendingExercise>,
}

/// Session-scoped exercise name resolution.
///
/// Each distinct name (case-insensitive, trimmed) is looked up in the catalog
/// once. Unmatched names get a placeholder id derived from the session
/// namespace and the name, so repeated lookups and concurrent assembly tasks
/// always agree on the same reference.
pub struct ExerciseResolver {
    store: Arc<dyn WorkoutStore>,
    namespace: Uuid,
    state: Mutex<ResolverState>,
}

impl ExerciseResolver {
    pub fn new(store: Arc<dyn WorkoutStore>) -> Self {
        Self::with_namespace(store, Uuid::new_v4())
    }

    pub fn with_namespace(store: Arc<dyn WorkoutStore>, namespace: Uuid) -> Self {
        Self {
            store,
            namespace,
            state: Mutex::new(ResolverState::default()),
        }
    }

    pub async fn resolve(&self, name: &str) -> Result<ExerciseRef> {
        let key = name_key(name);
        let mut state = self.state.lock().await;
        if let Some(existing) = state.by_name.get(&key) {
            return Ok(existing.clone());
        }

        let resolved = match self.store.find_exercise_by_name(name).await? {
            Some(entry) => {
                metrics::catalog::name_matched();
                ExerciseRef::Catalog(entry.id)
            }
            None => {
                let placeholder_id = Uuid::new_v5(&self.namespace, key.as_bytes());
                debug!(exercise = name, %placeholder_id, "No catalog match; staging placeholder");
                metrics::catalog::placeholder_staged();
                state.pending.push(PendingExercise {
                    placeholder_id,
                    name: name.trim().to_string(),
                });
                ExerciseRef::Placeholder(placeholder_id)
            }
        };
        state.by_name.insert(key, resolved.clone());
        Ok(resolved)
    }

    /// Unmatched names, sorted by name.
    pub async fn pending(&self) -> Vec<PendingExercise> {
        let mut pending = self.state.lock().await.pending.clone();
        pending.sort_by(|a, b| a.name.cmp(&b.name));
        pending
    }
}
