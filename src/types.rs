use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::constants::{get_supported_sources, HEVY_SOURCE, STRONG_SOURCE};

/// Vendor schema of an export file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportSource {
    Strong,
    Hevy,
}

impl ImportSource {
    pub fn name(&self) -> &'static str {
        match self {
            ImportSource::Strong => STRONG_SOURCE,
            ImportSource::Hevy => HEVY_SOURCE,
        }
    }
}

impl fmt::Display for ImportSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ImportSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            STRONG_SOURCE => Ok(ImportSource::Strong),
            HEVY_SOURCE => Ok(ImportSource::Hevy),
            other => Err(format!(
                "unknown import source: {other} (supported: {})",
                get_supported_sources().join(", ")
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SetType {
    Warmup,
    Working,
    Failure,
    Drop,
}

impl SetType {
    /// Map a vendor set-type label. Unknown or empty labels are working sets.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "warmup" | "warm_up" | "warm-up" | "w" => SetType::Warmup,
            "failure" | "f" => SetType::Failure,
            "dropset" | "drop" | "drop_set" | "d" => SetType::Drop,
            _ => SetType::Working,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SetType::Warmup => "warmup",
            SetType::Working => "working",
            SetType::Failure => "failure",
            SetType::Drop => "drop",
        }
    }
}

/// How an exercise draft points at the catalog
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ExerciseRef {
    /// An existing catalog entry
    Catalog(Uuid),
    /// Provisional id minted for an unmatched name, awaiting resolution
    Placeholder(Uuid),
    /// Left unresolved after the user cancelled mapping
    Unresolved,
}

impl ExerciseRef {
    pub fn id(&self) -> Option<Uuid> {
        match self {
            ExerciseRef::Catalog(id) | ExerciseRef::Placeholder(id) => Some(*id),
            ExerciseRef::Unresolved => None,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, ExerciseRef::Placeholder(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetDraft {
    pub reps: i32,
    pub weight: f64,
    pub set_type: SetType,
    pub rpe: Option<f64>,
    pub order: i32,
    pub done: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseDraft {
    pub exercise: ExerciseRef,
    /// Name as it appeared in the export
    pub exercise_name: String,
    pub order: i32,
    pub sets: Vec<SetDraft>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutDraft {
    pub id: Uuid,
    pub name: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub duration_seconds: u64,
    pub notes: Option<String>,
    pub exercises: Vec<ExerciseDraft>,
    pub source: ImportSource,
}

impl WorkoutDraft {
    pub fn references_placeholder(&self, placeholder_id: Uuid) -> bool {
        self.exercises
            .iter()
            .any(|e| e.exercise == ExerciseRef::Placeholder(placeholder_id))
    }

    pub fn has_placeholders(&self) -> bool {
        self.exercises.iter().any(|e| e.exercise.is_placeholder())
    }

    pub fn set_count(&self) -> usize {
        self.exercises.iter().map(|e| e.sets.len()).sum()
    }
}

/// Canonical exercise in the user's catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExerciseCatalogEntry {
    pub id: Uuid,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_from_str() {
        assert_eq!("Strong".parse::<ImportSource>(), Ok(ImportSource::Strong));
        assert_eq!(" hevy ".parse::<ImportSource>(), Ok(ImportSource::Hevy));
        assert!("fitbod".parse::<ImportSource>().is_err());
    }

    #[test]
    fn test_set_type_labels() {
        assert_eq!(SetType::from_label("warmup"), SetType::Warmup);
        assert_eq!(SetType::from_label("normal"), SetType::Working);
        assert_eq!(SetType::from_label("dropset"), SetType::Drop);
        assert_eq!(SetType::from_label("FAILURE"), SetType::Failure);
        assert_eq!(SetType::from_label(""), SetType::Working);
    }
}
