use async_trait::async_trait;
use std::collections::HashMap;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;
use uuid::Uuid;

use workout_import::{
    CancelPolicy, ExerciseCatalogEntry, ExerciseRef, ImportConfig, ImportError, ImportOutcome,
    ImportSession, ImportSource, ImportStage, ImportStatus, InMemoryStore, MappingDecision,
    SetType, SqliteStore, WorkoutDraft, WorkoutStore,
};

const STRONG_HEADER: &str =
    "Date,Workout Name,Duration,Exercise Name,Set Order,Weight,Reps,Distance,Seconds,Notes,Workout Notes,RPE";
const HEVY_HEADER: &str = "\"title\",\"start_time\",\"end_time\",\"description\",\"exercise_title\",\"superset_id\",\"exercise_notes\",\"set_index\",\"set_type\",\"weight_lbs\",\"reps\",\"distance_km\",\"duration_seconds\",\"rpe\"";

fn csv_file(header: &str, lines: &[&str]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "{header}").unwrap();
    for line in lines {
        writeln!(file, "{line}").unwrap();
    }
    file
}

fn config() -> ImportConfig {
    ImportConfig {
        batch_size: 1,
        ..ImportConfig::default()
    }
}

fn completed(outcome: ImportOutcome) -> workout_import::ImportSummary {
    match outcome {
        ImportOutcome::Completed(summary) => summary,
        ImportOutcome::NeedsMapping(pending) => panic!("unexpected pending exercises: {pending:?}"),
    }
}

/// Two workouts on different days: one fully in the catalog, one with Squat.
fn mixed_strong_file() -> NamedTempFile {
    csv_file(
        STRONG_HEADER,
        &[
            "2024-01-05 10:00:00,Push,45m,Bench Press (Barbell),1,100,10,,,,,",
            "2024-01-06 10:00:00,Legs,1h,Squat,1,140,5,,,,,",
            "2024-01-06 10:00:00,Legs,1h,Bench Press (Barbell),1,80,12,,,,,",
        ],
    )
}

#[tokio::test]
async fn test_strong_two_sets_end_to_end() {
    let store = Arc::new(InMemoryStore::with_exercises(["Bench Press (Barbell)"]));
    let bench = store.list_exercises().await.unwrap().remove(0);
    let file = csv_file(
        STRONG_HEADER,
        &[
            "2024-01-05 10:00:00,Chest Day,1h 5m,Bench Press (Barbell),1,100,10,,,,,",
            "2024-01-05 10:00:00,Chest Day,1h 5m,Bench Press (Barbell),2,110,8,,,,,",
        ],
    );

    let (mut session, mut stream) = ImportSession::new(store.clone(), config());
    let summary = completed(
        session
            .start_import(file.path(), ImportSource::Strong)
            .await
            .unwrap(),
    );

    assert_eq!(summary.rows_parsed, 2);
    assert_eq!(summary.workouts_saved, 1);
    assert_eq!(summary.format_override, None);

    let workouts = store.list_workouts().await.unwrap();
    assert_eq!(workouts.len(), 1);
    let workout = &workouts[0];
    assert_eq!(workout.name, "Chest Day");
    assert_eq!(workout.duration_seconds, 3900);
    assert_eq!(workout.exercises.len(), 1);
    let exercise = &workout.exercises[0];
    assert_eq!(exercise.exercise, ExerciseRef::Catalog(bench.id));
    let sets: Vec<(i32, f64, i32)> = exercise
        .sets
        .iter()
        .map(|s| (s.order, s.weight, s.reps))
        .collect();
    assert_eq!(sets, vec![(0, 100.0, 10), (1, 110.0, 8)]);

    assert_eq!(
        stream.drain(),
        vec![
            ImportStatus::Importing(ImportStage::ReadingFile),
            ImportStatus::Importing(ImportStage::ParsingCsv),
            ImportStatus::Importing(ImportStage::ProcessingWorkouts { current: 1, total: 1 }),
            ImportStatus::Importing(ImportStage::SavingData),
            ImportStatus::Completed,
        ]
    );
}

#[tokio::test]
async fn test_hevy_null_rpe_and_set_types() {
    let store = Arc::new(InMemoryStore::with_exercises(["Bench Press (Barbell)"]));
    let file = csv_file(
        HEVY_HEADER,
        &[
            "\"Push\",\"12 Mar 2024, 18:30\",\"12 Mar 2024, 19:30\",\"\",\"Bench Press (Barbell)\",,\"\",\"0\",\"warmup\",\"95\",\"12\",,,\"null\"",
            "\"Push\",\"12 Mar 2024, 18:30\",\"12 Mar 2024, 19:30\",\"\",\"Bench Press (Barbell)\",,\"\",\"1\",\"normal\",\"135\",\"8\",,,\"8.5\"",
        ],
    );

    let (mut session, _stream) = ImportSession::new(store.clone(), config());
    let summary = completed(
        session
            .start_import(file.path(), ImportSource::Hevy)
            .await
            .unwrap(),
    );
    assert_eq!(summary.source, ImportSource::Hevy);

    let workouts = store.list_workouts().await.unwrap();
    let sets = &workouts[0].exercises[0].sets;
    assert_eq!(sets[0].rpe, None);
    assert_eq!(sets[0].set_type, SetType::Warmup);
    assert_eq!(sets[1].rpe, Some(8.5));
    assert_eq!(sets[1].set_type, SetType::Working);
    assert_eq!(workouts[0].duration_seconds, 3600);
}

#[tokio::test]
async fn test_extreme_set_positions_do_not_fail_import() {
    let store = Arc::new(InMemoryStore::with_exercises(["Bench Press", "Squat"]));
    let strong = csv_file(
        STRONG_HEADER,
        &[
            "2024-01-05 10:00:00,Legs,1h,Squat,-2147483648,100,5,,,,,",
            "2024-01-05 10:00:00,Legs,1h,Squat,1,100,5,,,,,",
        ],
    );
    let (mut session, _stream) = ImportSession::new(store.clone(), config());
    let summary = completed(
        session
            .start_import(strong.path(), ImportSource::Strong)
            .await
            .unwrap(),
    );
    assert_eq!(summary.rows_parsed, 1);
    assert_eq!(summary.workouts_saved, 1);

    let hevy = csv_file(
        HEVY_HEADER,
        &[
            "Push,\"12 Mar 2024, 18:30\",,,Bench Press,,,2147483647,normal,135,10,,,",
            "Push,\"12 Mar 2024, 18:30\",,,Bench Press,,,2147483647,normal,135,8,,,",
        ],
    );
    let (mut session, _stream) = ImportSession::new(store.clone(), config());
    let summary = completed(
        session
            .start_import(hevy.path(), ImportSource::Hevy)
            .await
            .unwrap(),
    );
    assert_eq!(summary.workouts_saved, 1);
    assert_eq!(session.status(), ImportStatus::Completed);

    let workouts = store.list_workouts().await.unwrap();
    let push = workouts.iter().find(|w| w.name == "Push").unwrap();
    let orders: Vec<i32> = push.exercises[0].sets.iter().map(|s| s.order).collect();
    assert_eq!(orders, vec![i32::MAX]);
}

#[tokio::test]
async fn test_declared_source_overridden_by_header() {
    let store = Arc::new(InMemoryStore::with_exercises(["Bench Press"]));
    let file = csv_file(
        HEVY_HEADER,
        &["Push,\"12 Mar 2024, 18:30\",\"12 Mar 2024, 19:00\",,Bench Press,,,0,normal,135,10,,,"],
    );

    let (mut session, _stream) = ImportSession::new(store.clone(), config());
    let summary = completed(
        session
            .start_import(file.path(), ImportSource::Strong)
            .await
            .unwrap(),
    );
    assert_eq!(summary.source, ImportSource::Hevy);
    assert_eq!(summary.format_override, Some(ImportSource::Hevy));
    assert_eq!(store.list_workouts().await.unwrap()[0].source, ImportSource::Hevy);
}

#[tokio::test]
async fn test_unmatched_names_pause_then_keep_new() {
    let store = Arc::new(InMemoryStore::with_exercises(["Bench Press (Barbell)"]));
    let file = mixed_strong_file();

    let (mut session, _stream) = ImportSession::new(store.clone(), config());
    let outcome = session
        .start_import(file.path(), ImportSource::Strong)
        .await
        .unwrap();
    let ImportOutcome::NeedsMapping(pending) = outcome else {
        panic!("expected a mapping pause");
    };
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].name, "Squat");
    assert_eq!(session.status(), ImportStatus::MappingExercises { pending: 1 });
    // The unaffected workout is already saved
    assert_eq!(store.list_workouts().await.unwrap().len(), 1);

    let summary = session
        .confirm_exercise_mapping(HashMap::new())
        .await
        .unwrap();
    assert_eq!(summary.workouts_saved, 2);
    assert_eq!(summary.exercises_created, 1);
    assert_eq!(summary.mappings_applied, 1);
    assert_eq!(session.status(), ImportStatus::Completed);

    let squat = store.find_exercise_by_name("squat").await.unwrap().unwrap();
    assert_eq!(squat.id, pending[0].placeholder_id);
    let workouts = store.list_workouts().await.unwrap();
    assert!(workouts
        .iter()
        .flat_map(|w| &w.exercises)
        .all(|e| matches!(e.exercise, ExerciseRef::Catalog(_))));
}

#[tokio::test]
async fn test_map_to_existing_exercise() {
    let store = Arc::new(InMemoryStore::with_exercises([
        "Bench Press (Barbell)",
        "Squat (Barbell)",
    ]));
    let squat = store
        .find_exercise_by_name("Squat (Barbell)")
        .await
        .unwrap()
        .unwrap();
    let file = mixed_strong_file();

    let (mut session, _stream) = ImportSession::new(store.clone(), config());
    session
        .start_import(file.path(), ImportSource::Strong)
        .await
        .unwrap();

    let selections = HashMap::from([("Squat".to_string(), MappingDecision::MapTo(squat.id))]);
    let summary = session.confirm_exercise_mapping(selections).await.unwrap();
    assert_eq!(summary.exercises_created, 0);
    assert_eq!(store.list_exercises().await.unwrap().len(), 2);

    let legs = store
        .list_workouts()
        .await
        .unwrap()
        .into_iter()
        .find(|w| w.name == "Legs")
        .unwrap();
    assert_eq!(legs.exercises[0].exercise, ExerciseRef::Catalog(squat.id));
    assert_eq!(legs.exercises[0].exercise_name, "Squat");
}

#[tokio::test]
async fn test_unknown_mapping_target_changes_nothing() {
    let store = Arc::new(InMemoryStore::with_exercises(["Bench Press (Barbell)"]));
    let file = mixed_strong_file();

    let (mut session, _stream) = ImportSession::new(store.clone(), config());
    session
        .start_import(file.path(), ImportSource::Strong)
        .await
        .unwrap();

    let bogus = HashMap::from([("Squat".to_string(), MappingDecision::MapTo(Uuid::new_v4()))]);
    let result = session.confirm_exercise_mapping(bogus).await;
    assert!(matches!(result, Err(ImportError::UnknownMappingTarget { .. })));
    assert_eq!(session.status(), ImportStatus::MappingExercises { pending: 1 });
    assert_eq!(store.list_workouts().await.unwrap().len(), 1);
    assert_eq!(store.list_exercises().await.unwrap().len(), 1);
    assert_eq!(session.pending_exercises().len(), 1);

    // A valid decision still goes through afterwards
    let summary = session
        .confirm_exercise_mapping(HashMap::new())
        .await
        .unwrap();
    assert_eq!(summary.workouts_saved, 2);
}

#[tokio::test]
async fn test_cancel_drops_affected_workouts() {
    let store = Arc::new(InMemoryStore::with_exercises(["Bench Press (Barbell)"]));
    let file = mixed_strong_file();

    let (mut session, _stream) = ImportSession::new(store.clone(), config());
    session
        .start_import(file.path(), ImportSource::Strong)
        .await
        .unwrap();

    let summary = session
        .cancel_mapping(CancelPolicy::DropAffected)
        .await
        .unwrap();
    assert_eq!(summary.workouts_saved, 1);
    assert_eq!(summary.workouts_dropped, 1);
    assert!(summary.unresolved_workouts.is_empty());
    assert_eq!(session.status(), ImportStatus::Completed);

    let workouts = store.list_workouts().await.unwrap();
    assert_eq!(workouts.len(), 1);
    assert_eq!(workouts[0].name, "Push");
    assert!(store.find_exercise_by_name("Squat").await.unwrap().is_none());
    assert!(matches!(
        session.cancel_mapping(CancelPolicy::DropAffected).await,
        Err(ImportError::NoPendingMapping)
    ));
}

#[tokio::test]
async fn test_cancel_retains_unresolved_workouts() {
    let store = Arc::new(InMemoryStore::with_exercises(["Bench Press (Barbell)"]));
    let file = mixed_strong_file();

    let (mut session, _stream) = ImportSession::new(store.clone(), config());
    session
        .start_import(file.path(), ImportSource::Strong)
        .await
        .unwrap();

    let summary = session
        .cancel_mapping(CancelPolicy::RetainUnresolved)
        .await
        .unwrap();
    assert_eq!(summary.workouts_dropped, 0);
    assert_eq!(summary.unresolved_workouts.len(), 1);

    let legs = &summary.unresolved_workouts[0];
    assert_eq!(legs.name, "Legs");
    let refs: Vec<_> = legs
        .exercises
        .iter()
        .map(|e| (e.exercise_name.as_str(), e.exercise.clone()))
        .collect();
    assert_eq!(refs[0], ("Squat", ExerciseRef::Unresolved));
    assert!(matches!(refs[1].1, ExerciseRef::Catalog(_)));

    // Retained workouts are never persisted
    assert_eq!(store.list_workouts().await.unwrap().len(), 1);
}

/// Delegates to an in-memory store, failing one chosen `save_workouts` call.
struct FlakyStore {
    inner: InMemoryStore,
    fail_on_save: usize,
    saves: AtomicUsize,
}

#[async_trait]
impl WorkoutStore for FlakyStore {
    async fn find_exercise_by_name(
        &self,
        name: &str,
    ) -> workout_import::Result<Option<ExerciseCatalogEntry>> {
        self.inner.find_exercise_by_name(name).await
    }

    async fn get_exercise(&self, id: Uuid) -> workout_import::Result<Option<ExerciseCatalogEntry>> {
        self.inner.get_exercise(id).await
    }

    async fn create_exercise(&self, entry: &ExerciseCatalogEntry) -> workout_import::Result<()> {
        self.inner.create_exercise(entry).await
    }

    async fn list_exercises(&self) -> workout_import::Result<Vec<ExerciseCatalogEntry>> {
        self.inner.list_exercises().await
    }

    async fn save_workouts(&self, workouts: &[WorkoutDraft]) -> workout_import::Result<()> {
        let call = self.saves.fetch_add(1, Ordering::SeqCst) + 1;
        if call == self.fail_on_save {
            return Err(ImportError::Persistence("disk full".to_string()));
        }
        self.inner.save_workouts(workouts).await
    }

    async fn delete_workouts(&self, ids: &[Uuid]) -> workout_import::Result<()> {
        self.inner.delete_workouts(ids).await
    }

    async fn list_workouts(&self) -> workout_import::Result<Vec<WorkoutDraft>> {
        self.inner.list_workouts().await
    }
}

#[tokio::test]
async fn test_failed_batch_rolls_back_and_needs_retry() {
    let store = Arc::new(FlakyStore {
        inner: InMemoryStore::with_exercises(["Squat"]),
        fail_on_save: 2,
        saves: AtomicUsize::new(0),
    });
    let file = csv_file(
        STRONG_HEADER,
        &[
            "2024-01-01 10:00:00,Legs,1h,Squat,1,100,5,,,,,",
            "2024-01-02 10:00:00,Legs,1h,Squat,1,105,5,,,,,",
            "2024-01-03 10:00:00,Legs,1h,Squat,1,110,5,,,,,",
        ],
    );

    let (mut session, _stream) = ImportSession::new(store.clone(), config());
    let result = session.start_import(file.path(), ImportSource::Strong).await;
    assert!(matches!(result, Err(ImportError::Persistence(_))));
    assert!(matches!(session.status(), ImportStatus::Failed(_)));
    // First batch was committed, then removed again
    assert!(store.list_workouts().await.unwrap().is_empty());

    let again = session.start_import(file.path(), ImportSource::Strong).await;
    assert!(matches!(again, Err(ImportError::InvalidTransition { .. })));

    let summary = completed(session.retry().await.unwrap());
    assert_eq!(summary.workouts_saved, 3);
    assert_eq!(store.list_workouts().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_retry_without_failure_is_rejected() {
    let (mut session, _stream) = ImportSession::new(Arc::new(InMemoryStore::new()), config());
    assert!(matches!(
        session.retry().await,
        Err(ImportError::InvalidTransition { .. })
    ));
}

#[tokio::test]
async fn test_missing_file_leaves_status_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let (mut session, mut stream) = ImportSession::new(Arc::new(InMemoryStore::new()), config());
    let result = session
        .start_import(&dir.path().join("nope.csv"), ImportSource::Strong)
        .await;
    assert!(matches!(result, Err(ImportError::FileAccess { .. })));
    assert_eq!(session.status(), ImportStatus::NotStarted);
    assert!(stream.drain().is_empty());
}

#[tokio::test]
async fn test_completed_resets_to_not_started() {
    let store = Arc::new(InMemoryStore::with_exercises(["Squat"]));
    let file = csv_file(STRONG_HEADER, &["2024-01-01 10:00:00,Legs,1h,Squat,1,100,5,,,,,"]);
    let config = ImportConfig {
        completed_reset_delay_ms: 20,
        ..ImportConfig::default()
    };

    let (mut session, mut stream) = ImportSession::new(store, config);
    completed(
        session
            .start_import(file.path(), ImportSource::Strong)
            .await
            .unwrap(),
    );
    assert_eq!(session.status(), ImportStatus::Completed);

    let reset = tokio::time::timeout(Duration::from_secs(2), async {
        while let Some(status) = stream.next().await {
            if status == ImportStatus::NotStarted {
                return true;
            }
        }
        false
    })
    .await
    .unwrap();
    assert!(reset);
    assert_eq!(session.status(), ImportStatus::NotStarted);
}

#[tokio::test]
async fn test_many_workouts_progress_in_order() {
    let store = Arc::new(InMemoryStore::with_exercises(["Squat"]));
    let lines: Vec<String> = (1..=20)
        .map(|day| format!("2024-02-{day:02} 07:30:00,Legs,50m,Squat,1,100,5,,,,,"))
        .collect();
    let line_refs: Vec<&str> = lines.iter().map(String::as_str).collect();
    let file = csv_file(STRONG_HEADER, &line_refs);
    let config = ImportConfig {
        chunk_size: 3,
        batch_size: 7,
        ..ImportConfig::default()
    };

    let (mut session, mut stream) = ImportSession::new(store.clone(), config);
    let summary = completed(
        session
            .start_import(file.path(), ImportSource::Strong)
            .await
            .unwrap(),
    );
    assert_eq!(summary.workouts_saved, 20);

    let progress: Vec<usize> = stream
        .drain()
        .into_iter()
        .filter_map(|s| match s {
            ImportStatus::Importing(ImportStage::ProcessingWorkouts { current, total }) => {
                assert_eq!(total, 20);
                Some(current)
            }
            _ => None,
        })
        .collect();
    assert_eq!(progress, (1..=20).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_sqlite_store_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SqliteStore::open(dir.path().join("workouts.db")).unwrap());
    let file = mixed_strong_file();

    let (mut session, _stream) = ImportSession::new(store.clone(), config());
    let outcome = session
        .start_import(file.path(), ImportSource::Strong)
        .await
        .unwrap();
    let ImportOutcome::NeedsMapping(pending) = outcome else {
        panic!("empty catalog should leave names unmatched");
    };
    assert_eq!(pending.len(), 2);

    let summary = session
        .confirm_exercise_mapping(HashMap::new())
        .await
        .unwrap();
    assert_eq!(summary.exercises_created, 2);
    assert_eq!(summary.workouts_saved, 2);

    let workouts = store.list_workouts().await.unwrap();
    assert_eq!(workouts.len(), 2);
    assert_eq!(workouts[0].name, "Push");
    assert_eq!(workouts[1].exercises.len(), 2);
    assert_eq!(store.list_exercises().await.unwrap().len(), 2);
}
