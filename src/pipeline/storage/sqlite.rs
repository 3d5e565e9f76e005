use async_trait::async_trait;
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};
use uuid::Uuid;

use super::{ensure_committable, name_key, WorkoutStore};
use crate::error::{ImportError, Result};
use crate::types::{
    ExerciseCatalogEntry, ExerciseDraft, ExerciseRef, ImportSource, SetDraft, SetType,
    WorkoutDraft,
};

const DATE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// SQLite-backed catalog and workout store
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(db_path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        info!("Opened workout store at {}", db_path.display());
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            r#"
            PRAGMA foreign_keys=ON;
            CREATE TABLE IF NOT EXISTS exercises (
                id        TEXT PRIMARY KEY,
                name      TEXT NOT NULL,
                name_key  TEXT NOT NULL UNIQUE
            );
            CREATE TABLE IF NOT EXISTS workouts (
                id                TEXT PRIMARY KEY,
                name              TEXT NOT NULL,
                started_at        TEXT NOT NULL,
                ended_at          TEXT NOT NULL,
                duration_seconds  INTEGER NOT NULL,
                notes             TEXT,
                source            TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS workout_exercises (
                workout_id     TEXT NOT NULL REFERENCES workouts(id) ON DELETE CASCADE,
                position       INTEGER NOT NULL,
                exercise_id    TEXT NOT NULL REFERENCES exercises(id),
                exercise_name  TEXT NOT NULL,
                notes          TEXT,
                PRIMARY KEY (workout_id, position)
            );
            CREATE TABLE IF NOT EXISTS exercise_sets (
                workout_id         TEXT NOT NULL REFERENCES workouts(id) ON DELETE CASCADE,
                exercise_position  INTEGER NOT NULL,
                position           INTEGER NOT NULL,
                reps               INTEGER NOT NULL,
                weight             REAL NOT NULL,
                set_type           TEXT NOT NULL,
                rpe                REAL,
                done               INTEGER NOT NULL,
                PRIMARY KEY (workout_id, exercise_position, position)
            );
            "#,
        )?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `op` against the connection on the blocking pool.
    async fn run<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().map_err(|_| {
                ImportError::Persistence("sqlite connection lock poisoned".to_string())
            })?;
            op(&mut conn)
        })
        .await?
    }
}

fn parse_uuid(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| ImportError::Persistence(format!("corrupt id '{value}': {e}")))
}

fn parse_timestamp(value: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, DATE_TIME_FORMAT)
        .map_err(|e| ImportError::Persistence(format!("corrupt timestamp '{value}': {e}")))
}

fn parse_set_type(value: &str) -> SetType {
    SetType::from_label(value)
}

#[async_trait]
impl WorkoutStore for SqliteStore {
    async fn find_exercise_by_name(&self, name: &str) -> Result<Option<ExerciseCatalogEntry>> {
        let key = name_key(name);
        self.run(move |conn| {
            let row = conn
                .query_row(
                    "SELECT id, name FROM exercises WHERE name_key = ?1",
                    params![key],
                    |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
                )
                .optional()?;
            row.map(|(id, name)| Ok(ExerciseCatalogEntry { id: parse_uuid(&id)?, name }))
                .transpose()
        })
        .await
    }

    async fn get_exercise(&self, id: Uuid) -> Result<Option<ExerciseCatalogEntry>> {
        self.run(move |conn| {
            let name = conn
                .query_row(
                    "SELECT name FROM exercises WHERE id = ?1",
                    params![id.to_string()],
                    |row| row.get::<_, String>(0),
                )
                .optional()?;
            Ok(name.map(|name| ExerciseCatalogEntry { id, name }))
        })
        .await
    }

    async fn create_exercise(&self, entry: &ExerciseCatalogEntry) -> Result<()> {
        let entry = entry.clone();
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO exercises (id, name, name_key) VALUES (?1, ?2, ?3)",
                params![entry.id.to_string(), entry.name, name_key(&entry.name)],
            )
            .map_err(|e| {
                ImportError::Persistence(format!("could not create exercise '{}': {e}", entry.name))
            })?;
            debug!("Created exercise: {} with id {}", entry.name, entry.id);
            Ok(())
        })
        .await
    }

    async fn list_exercises(&self) -> Result<Vec<ExerciseCatalogEntry>> {
        self.run(|conn| {
            let mut stmt = conn.prepare("SELECT id, name FROM exercises ORDER BY name")?;
            let rows = stmt
                .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.into_iter()
                .map(|(id, name)| Ok(ExerciseCatalogEntry { id: parse_uuid(&id)?, name }))
                .collect()
        })
        .await
    }

    async fn save_workouts(&self, workouts: &[WorkoutDraft]) -> Result<()> {
        ensure_committable(workouts)?;
        let workouts = workouts.to_vec();
        self.run(move |conn| insert_workouts(conn, &workouts)).await
    }

    async fn delete_workouts(&self, ids: &[Uuid]) -> Result<()> {
        let ids = ids.to_vec();
        self.run(move |conn| {
            let tx = conn.transaction()?;
            for id in &ids {
                tx.execute("DELETE FROM workouts WHERE id = ?1", params![id.to_string()])?;
            }
            tx.commit()?;
            debug!("Deleted {} workouts", ids.len());
            Ok(())
        })
        .await
    }

    async fn list_workouts(&self) -> Result<Vec<WorkoutDraft>> {
        self.run(|conn| load_workouts(conn)).await
    }
}

fn insert_workouts(conn: &mut Connection, workouts: &[WorkoutDraft]) -> Result<()> {
    let tx = conn.transaction()?;
    for workout in workouts {
        let workout_id = workout.id.to_string();
        tx.execute(
            "INSERT INTO workouts (id, name, started_at, ended_at, duration_seconds, notes, source)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                workout_id,
                workout.name,
                workout.start.format(DATE_TIME_FORMAT).to_string(),
                workout.end.format(DATE_TIME_FORMAT).to_string(),
                workout.duration_seconds as i64,
                workout.notes,
                workout.source.name(),
            ],
        )?;
        for exercise in &workout.exercises {
            let exercise_id = exercise.exercise.id().map(|id| id.to_string());
            tx.execute(
                "INSERT INTO workout_exercises (workout_id, position, exercise_id, exercise_name, notes)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    workout_id,
                    exercise.order,
                    exercise_id,
                    exercise.exercise_name,
                    exercise.notes,
                ],
            )?;
            for set in &exercise.sets {
                tx.execute(
                    "INSERT INTO exercise_sets (workout_id, exercise_position, position, reps, weight, set_type, rpe, done)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        workout_id,
                        exercise.order,
                        set.order,
                        set.reps,
                        set.weight,
                        set.set_type.as_str(),
                        set.rpe,
                        set.done,
                    ],
                )?;
            }
        }
    }
    tx.commit()?;
    debug!("Saved {} workouts", workouts.len());
    Ok(())
}

fn load_workouts(conn: &Connection) -> Result<Vec<WorkoutDraft>> {
    let mut sets: BTreeMap<(String, i32), Vec<SetDraft>> = BTreeMap::new();
    {
        let mut stmt = conn.prepare(
            "SELECT workout_id, exercise_position, position, reps, weight, set_type, rpe, done
             FROM exercise_sets ORDER BY workout_id, exercise_position, position",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i32>(1)?,
                SetDraft {
                    order: row.get(2)?,
                    reps: row.get(3)?,
                    weight: row.get(4)?,
                    set_type: parse_set_type(&row.get::<_, String>(5)?),
                    rpe: row.get(6)?,
                    done: row.get(7)?,
                },
            ))
        })?;
        for row in rows {
            let (workout_id, position, set) = row?;
            sets.entry((workout_id, position)).or_default().push(set);
        }
    }

    let mut exercises: BTreeMap<String, Vec<ExerciseDraft>> = BTreeMap::new();
    {
        let mut stmt = conn.prepare(
            "SELECT workout_id, position, exercise_id, exercise_name, notes
             FROM workout_exercises ORDER BY workout_id, position",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i32>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Option<String>>(4)?,
            ))
        })?;
        for row in rows {
            let (workout_id, position, exercise_id, exercise_name, notes) = row?;
            let exercise_sets = sets
                .remove(&(workout_id.clone(), position))
                .unwrap_or_default();
            exercises.entry(workout_id).or_default().push(ExerciseDraft {
                exercise: ExerciseRef::Catalog(parse_uuid(&exercise_id)?),
                exercise_name,
                order: position,
                sets: exercise_sets,
                notes,
            });
        }
    }

    let mut stmt = conn.prepare(
        "SELECT id, name, started_at, ended_at, duration_seconds, notes, source
         FROM workouts ORDER BY started_at, name",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, i64>(4)?,
                row.get::<_, Option<String>>(5)?,
                row.get::<_, String>(6)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(id, name, started_at, ended_at, duration, notes, source)| {
            Ok(WorkoutDraft {
                id: parse_uuid(&id)?,
                exercises: exercises.remove(&id).unwrap_or_default(),
                name,
                start: parse_timestamp(&started_at)?,
                end: parse_timestamp(&ended_at)?,
                duration_seconds: duration.max(0) as u64,
                notes,
                source: source
                    .parse::<ImportSource>()
                    .map_err(ImportError::Persistence)?,
            })
        })
        .collect()
}
