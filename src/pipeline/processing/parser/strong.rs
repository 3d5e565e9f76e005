use chrono::NaiveDateTime;

use super::{
    optional_text, parse_count, parse_decimal, parse_rpe, parse_set_position, ColumnMap,
    DropReason, RowParser, TypedRow,
};
use crate::constants::{
    STRONG_DATE, STRONG_DURATION, STRONG_EXERCISE_NAME, STRONG_NOTES, STRONG_REPS, STRONG_RPE,
    STRONG_SET_ORDER, STRONG_WEIGHT, STRONG_WORKOUT_NAME, STRONG_WORKOUT_NOTES,
};
use crate::pipeline::processing::normalize::parse_date;
use crate::types::ImportSource;

const COLUMNS: &[(&str, usize)] = &[
    STRONG_DATE,
    STRONG_WORKOUT_NAME,
    STRONG_DURATION,
    STRONG_EXERCISE_NAME,
    STRONG_SET_ORDER,
    STRONG_WEIGHT,
    STRONG_REPS,
    STRONG_NOTES,
    STRONG_WORKOUT_NOTES,
    STRONG_RPE,
];

/// Columns a line must reach to be usable
const REQUIRED: &[(&str, usize)] = &[
    STRONG_DATE,
    STRONG_WORKOUT_NAME,
    STRONG_EXERCISE_NAME,
    STRONG_SET_ORDER,
];

#[derive(Debug, Clone, PartialEq)]
pub struct StrongRow {
    pub line_number: usize,
    pub date: NaiveDateTime,
    pub workout_name: String,
    /// Raw `Duration` text, e.g. `1h 5m`
    pub duration: String,
    pub exercise_name: String,
    /// One-based
    pub set_order: i32,
    pub weight: f64,
    pub reps: i32,
    pub notes: Option<String>,
    pub workout_notes: Option<String>,
    pub rpe: Option<f64>,
}

pub struct StrongParser;

impl RowParser for StrongParser {
    fn source(&self) -> ImportSource {
        ImportSource::Strong
    }

    fn column_map(&self, header: &[String]) -> ColumnMap {
        ColumnMap::resolve(header, COLUMNS)
    }

    fn parse_line(
        &self,
        line_number: usize,
        fields: &[String],
        columns: &ColumnMap,
    ) -> Result<TypedRow, DropReason> {
        if fields.len() < columns.required_len(REQUIRED) {
            return Err(DropReason::TooFewFields);
        }

        let date = parse_date(columns.field(fields, STRONG_DATE), ImportSource::Strong)
            .ok_or(DropReason::UnparseableDate)?;
        let set_order = parse_set_position(columns.field(fields, STRONG_SET_ORDER), 1)
            .ok_or(DropReason::UnparseableSetOrder)?;
        let weight = parse_decimal(columns.field(fields, STRONG_WEIGHT))
            .ok_or(DropReason::UnparseableWeight)?;
        let reps = parse_count(columns.field(fields, STRONG_REPS))
            .ok_or(DropReason::UnparseableReps)?;

        let exercise_name = columns.field(fields, STRONG_EXERCISE_NAME);
        if exercise_name.is_empty() {
            return Err(DropReason::MissingExerciseName);
        }

        Ok(TypedRow::Strong(StrongRow {
            line_number,
            date,
            workout_name: columns.field(fields, STRONG_WORKOUT_NAME).to_string(),
            duration: columns.field(fields, STRONG_DURATION).to_string(),
            exercise_name: exercise_name.to_string(),
            set_order,
            weight,
            reps,
            notes: optional_text(columns.field(fields, STRONG_NOTES)),
            workout_notes: optional_text(columns.field(fields, STRONG_WORKOUT_NOTES)),
            rpe: parse_rpe(columns.field(fields, STRONG_RPE)),
        }))
    }
}
