// Exercise catalog reconciliation: name resolution and user mapping decisions

pub mod reconciliation;
pub mod resolver;

pub use reconciliation::{CancelOutcome, CancelPolicy, ExerciseReconciler, MappingDecision, MappingPlan};
pub use resolver::{ExerciseResolver, PendingExercise};
