//! Metrics for the import pipeline
//!
//! Recorded through the `metrics` facade; whichever recorder the host process
//! installs receives them. Without a recorder every call is a no-op.

use std::fmt;

/// Every metric name emitted by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Parser metrics
    ParserRowsParsed,
    ParserRowsDropped,
    ParserChunksProcessed,
    ParserDuration,
    ParserFormatOverrides,

    // Assembly metrics
    AssemblyWorkoutsBuilt,
    AssemblyExercisesBuilt,
    AssemblySetsBuilt,

    // Catalog metrics
    CatalogNamesMatched,
    CatalogPlaceholdersStaged,
    CatalogMappingsApplied,
    CatalogPlaceholdersPromoted,
    CatalogMappingsCancelled,

    // Persistence metrics
    PersistenceBatchesSaved,
    PersistenceWorkoutsSaved,
    PersistenceErrors,
    PersistenceRollbacks,

    // Session metrics
    ImportCompleted,
    ImportFailed,
    ImportDuration,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::ParserRowsParsed => "workout_import_parser_rows_parsed_total",
            MetricName::ParserRowsDropped => "workout_import_parser_rows_dropped_total",
            MetricName::ParserChunksProcessed => "workout_import_parser_chunks_processed_total",
            MetricName::ParserDuration => "workout_import_parser_duration_seconds",
            MetricName::ParserFormatOverrides => "workout_import_parser_format_overrides_total",

            MetricName::AssemblyWorkoutsBuilt => "workout_import_assembly_workouts_built_total",
            MetricName::AssemblyExercisesBuilt => "workout_import_assembly_exercises_built_total",
            MetricName::AssemblySetsBuilt => "workout_import_assembly_sets_built_total",

            MetricName::CatalogNamesMatched => "workout_import_catalog_names_matched_total",
            MetricName::CatalogPlaceholdersStaged => "workout_import_catalog_placeholders_staged_total",
            MetricName::CatalogMappingsApplied => "workout_import_catalog_mappings_applied_total",
            MetricName::CatalogPlaceholdersPromoted => "workout_import_catalog_placeholders_promoted_total",
            MetricName::CatalogMappingsCancelled => "workout_import_catalog_mappings_cancelled_total",

            MetricName::PersistenceBatchesSaved => "workout_import_persistence_batches_saved_total",
            MetricName::PersistenceWorkoutsSaved => "workout_import_persistence_workouts_saved_total",
            MetricName::PersistenceErrors => "workout_import_persistence_errors_total",
            MetricName::PersistenceRollbacks => "workout_import_persistence_rollbacks_total",

            MetricName::ImportCompleted => "workout_import_completed_total",
            MetricName::ImportFailed => "workout_import_failed_total",
            MetricName::ImportDuration => "workout_import_duration_seconds",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Parser Metrics
// ============================================================================

pub mod parser {
    use super::MetricName;

    pub fn rows_parsed(count: u64, source: &'static str) {
        ::metrics::counter!(MetricName::ParserRowsParsed.as_str(), "source" => source).increment(count);
    }

    pub fn rows_dropped(count: u64, reason: &'static str) {
        ::metrics::counter!(MetricName::ParserRowsDropped.as_str(), "reason" => reason).increment(count);
    }

    pub fn chunk_processed() {
        ::metrics::counter!(MetricName::ParserChunksProcessed.as_str()).increment(1);
    }

    pub fn duration(secs: f64) {
        ::metrics::histogram!(MetricName::ParserDuration.as_str()).record(secs);
    }

    pub fn format_override(detected: &'static str) {
        ::metrics::counter!(MetricName::ParserFormatOverrides.as_str(), "detected" => detected).increment(1);
    }
}

// ============================================================================
// Assembly Metrics
// ============================================================================

pub mod assembly {
    use super::MetricName;

    pub fn workout_built(exercises: usize, sets: usize) {
        ::metrics::counter!(MetricName::AssemblyWorkoutsBuilt.as_str()).increment(1);
        ::metrics::counter!(MetricName::AssemblyExercisesBuilt.as_str()).increment(exercises as u64);
        ::metrics::counter!(MetricName::AssemblySetsBuilt.as_str()).increment(sets as u64);
    }
}

// ============================================================================
// Catalog Metrics
// ============================================================================

pub mod catalog {
    use super::MetricName;

    pub fn name_matched() {
        ::metrics::counter!(MetricName::CatalogNamesMatched.as_str()).increment(1);
    }

    pub fn placeholder_staged() {
        ::metrics::counter!(MetricName::CatalogPlaceholdersStaged.as_str()).increment(1);
    }

    pub fn mappings_applied(count: u64) {
        ::metrics::counter!(MetricName::CatalogMappingsApplied.as_str()).increment(count);
    }

    pub fn placeholders_promoted(count: u64) {
        ::metrics::counter!(MetricName::CatalogPlaceholdersPromoted.as_str()).increment(count);
    }

    pub fn mappings_cancelled(count: u64) {
        ::metrics::counter!(MetricName::CatalogMappingsCancelled.as_str()).increment(count);
    }
}

// ============================================================================
// Persistence Metrics
// ============================================================================

pub mod persistence {
    use super::MetricName;

    pub fn batch_saved(workouts: usize) {
        ::metrics::counter!(MetricName::PersistenceBatchesSaved.as_str()).increment(1);
        ::metrics::counter!(MetricName::PersistenceWorkoutsSaved.as_str()).increment(workouts as u64);
    }

    pub fn error() {
        ::metrics::counter!(MetricName::PersistenceErrors.as_str()).increment(1);
    }

    pub fn rollback(workouts: usize) {
        ::metrics::counter!(MetricName::PersistenceRollbacks.as_str()).increment(workouts as u64);
    }
}

// ============================================================================
// Session Metrics
// ============================================================================

pub mod session {
    use super::MetricName;

    pub fn completed(secs: f64) {
        ::metrics::counter!(MetricName::ImportCompleted.as_str()).increment(1);
        ::metrics::histogram!(MetricName::ImportDuration.as_str()).record(secs);
    }

    pub fn failed() {
        ::metrics::counter!(MetricName::ImportFailed.as_str()).increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names_are_prefixed() {
        for name in [
            MetricName::ParserRowsParsed,
            MetricName::CatalogPlaceholdersStaged,
            MetricName::PersistenceRollbacks,
            MetricName::ImportDuration,
        ] {
            assert!(name.to_string().starts_with("workout_import_"));
        }
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        parser::rows_parsed(3, "strong");
        parser::rows_dropped(1, "unparseable_date");
        catalog::placeholder_staged();
        persistence::batch_saved(2);
    }
}
