use chrono::NaiveDateTime;

use super::{
    optional_text, parse_count, parse_decimal, parse_rpe, parse_set_position, ColumnMap,
    DropReason, RowParser, TypedRow,
};
use crate::constants::{
    HEVY_DESCRIPTION, HEVY_END_TIME, HEVY_EXERCISE_NOTES, HEVY_EXERCISE_TITLE, HEVY_REPS,
    HEVY_RPE, HEVY_SET_INDEX, HEVY_SET_TYPE, HEVY_START_TIME, HEVY_TITLE, HEVY_WEIGHT_LBS,
};
use crate::pipeline::processing::normalize::parse_date;
use crate::types::{ImportSource, SetType};

const COLUMNS: &[(&str, usize)] = &[
    HEVY_TITLE,
    HEVY_START_TIME,
    HEVY_END_TIME,
    HEVY_DESCRIPTION,
    HEVY_EXERCISE_TITLE,
    HEVY_EXERCISE_NOTES,
    HEVY_SET_INDEX,
    HEVY_SET_TYPE,
    HEVY_WEIGHT_LBS,
    HEVY_REPS,
    HEVY_RPE,
];

const REQUIRED: &[(&str, usize)] = &[
    HEVY_TITLE,
    HEVY_START_TIME,
    HEVY_EXERCISE_TITLE,
    HEVY_SET_INDEX,
];

#[derive(Debug, Clone, PartialEq)]
pub struct HevyRow {
    pub line_number: usize,
    pub title: String,
    pub start_time: NaiveDateTime,
    /// `None` when absent or unparseable
    pub end_time: Option<NaiveDateTime>,
    pub description: Option<String>,
    pub exercise_title: String,
    pub exercise_notes: Option<String>,
    /// Zero-based
    pub set_index: i32,
    pub set_type: SetType,
    pub weight_lbs: f64,
    pub reps: i32,
    pub rpe: Option<f64>,
}

pub struct HevyParser;

impl RowParser for HevyParser {
    fn source(&self) -> ImportSource {
        ImportSource::Hevy
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

        let start_time = parse_date(columns.field(fields, HEVY_START_TIME), ImportSource::Hevy)
            .ok_or(DropReason::UnparseableDate)?;
        let set_index = parse_set_position(columns.field(fields, HEVY_SET_INDEX), 0)
            .ok_or(DropReason::UnparseableSetOrder)?;
        let weight_lbs = parse_decimal(columns.field(fields, HEVY_WEIGHT_LBS))
            .ok_or(DropReason::UnparseableWeight)?;
        let reps = parse_count(columns.field(fields, HEVY_REPS))
            .ok_or(DropReason::UnparseableReps)?;

        let exercise_title = columns.field(fields, HEVY_EXERCISE_TITLE);
        if exercise_title.is_empty() {
            return Err(DropReason::MissingExerciseName);
        }

        Ok(TypedRow::Hevy(HevyRow {
            line_number,
            title: columns.field(fields, HEVY_TITLE).to_string(),
            start_time,
            end_time: parse_date(columns.field(fields, HEVY_END_TIME), ImportSource::Hevy),
            description: optional_text(columns.field(fields, HEVY_DESCRIPTION)),
            exercise_title: exercise_title.to_string(),
            exercise_notes: optional_text(columns.field(fields, HEVY_EXERCISE_NOTES)),
            set_index,
            set_type: SetType::from_label(columns.field(fields, HEVY_SET_TYPE)),
            weight_lbs,
            reps,
            rpe: parse_rpe(columns.field(fields, HEVY_RPE)),
        }))
    }
}
