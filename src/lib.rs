pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod observability;
pub mod pipeline;
pub mod types;

pub use config::ImportConfig;
pub use error::{ImportError, Result};
pub use pipeline::processing::catalog::{CancelPolicy, MappingDecision, PendingExercise};
pub use pipeline::storage::{InMemoryStore, SqliteStore, WorkoutStore};
pub use pipeline::{ImportOutcome, ImportSession, ImportStage, ImportStatus, ImportSummary, StatusStream};
pub use types::{ExerciseCatalogEntry, ExerciseDraft, ExerciseRef, ImportSource, SetDraft, SetType, WorkoutDraft};
