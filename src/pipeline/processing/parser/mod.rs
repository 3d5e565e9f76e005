//! Chunked, concurrent CSV row parsing.
//!
//! The body of an export is split into fixed-size chunks and each chunk is
//! parsed on its own tokio task. Chunks finish in any order; every row keeps
//! its source line number, and downstream grouping never depends on arrival
//! order.

pub mod hevy;
pub mod strong;

use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument};

use super::format::{header_tokens, resolve_format, FormatResolution};
use super::tokenizer::tokenize;
use crate::error::Result;
use crate::observability::metrics;
use crate::types::{ImportSource, SetType};

pub use hevy::{HevyParser, HevyRow};
pub use strong::{StrongParser, StrongRow};

/// Why a line did not become a typed row
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    TooFewFields,
    UnparseableDate,
    UnparseableSetOrder,
    UnparseableWeight,
    UnparseableReps,
    MissingExerciseName,
}

impl DropReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DropReason::TooFewFields => "too_few_fields",
            DropReason::UnparseableDate => "unparseable_date",
            DropReason::UnparseableSetOrder => "unparseable_set_order",
            DropReason::UnparseableWeight => "unparseable_weight",
            DropReason::UnparseableReps => "unparseable_reps",
            DropReason::MissingExerciseName => "missing_exercise_name",
        }
    }
}

/// One parsed CSV line in its vendor shape
#[derive(Debug, Clone, PartialEq)]
pub enum TypedRow {
    Strong(StrongRow),
    Hevy(HevyRow),
}

impl TypedRow {
    pub fn line_number(&self) -> usize {
        match self {
            TypedRow::Strong(r) => r.line_number,
            TypedRow::Hevy(r) => r.line_number,
        }
    }

    pub fn started_at(&self) -> NaiveDateTime {
        match self {
            TypedRow::Strong(r) => r.date,
            TypedRow::Hevy(r) => r.start_time,
        }
    }

    pub fn workout_name(&self) -> &str {
        match self {
            TypedRow::Strong(r) => &r.workout_name,
            TypedRow::Hevy(r) => &r.title,
        }
    }

    pub fn exercise_name(&self) -> &str {
        match self {
            TypedRow::Strong(r) => &r.exercise_name,
            TypedRow::Hevy(r) => &r.exercise_title,
        }
    }

    pub fn exercise_notes(&self) -> Option<&str> {
        match self {
            TypedRow::Strong(r) => r.notes.as_deref(),
            TypedRow::Hevy(r) => r.exercise_notes.as_deref(),
        }
    }

    pub fn workout_notes(&self) -> Option<&str> {
        match self {
            TypedRow::Strong(r) => r.workout_notes.as_deref(),
            TypedRow::Hevy(r) => r.description.as_deref(),
        }
    }

    /// Set position adjusted to zero-based. Strong counts sets from 1.
    pub fn set_index(&self) -> i32 {
        match self {
            TypedRow::Strong(r) => r.set_order.saturating_sub(1),
            TypedRow::Hevy(r) => r.set_index,
        }
    }

    pub fn set_type(&self) -> SetType {
        match self {
            TypedRow::Strong(_) => SetType::Working,
            TypedRow::Hevy(r) => r.set_type,
        }
    }

    pub fn weight(&self) -> f64 {
        match self {
            TypedRow::Strong(r) => r.weight,
            TypedRow::Hevy(r) => r.weight_lbs,
        }
    }

    pub fn reps(&self) -> i32 {
        match self {
            TypedRow::Strong(r) => r.reps,
            TypedRow::Hevy(r) => r.reps,
        }
    }

    pub fn rpe(&self) -> Option<f64> {
        match self {
            TypedRow::Strong(r) => r.rpe,
            TypedRow::Hevy(r) => r.rpe,
        }
    }
}

/// Header-derived column positions, falling back to stock export positions
#[derive(Debug, Clone, Default)]
pub struct ColumnMap {
    indices: HashMap<&'static str, usize>,
}

impl ColumnMap {
    pub fn resolve(header: &[String], columns: &[(&'static str, usize)]) -> Self {
        let indices = columns
            .iter()
            .map(|(name, default)| {
                let wanted = name.to_lowercase();
                let idx = header
                    .iter()
                    .position(|h| *h == wanted)
                    .unwrap_or_else(|| {
                        debug!(column = name, default, "Column missing from header; using default index");
                        *default
                    });
                (*name, idx)
            })
            .collect();
        Self { indices }
    }

    pub fn index(&self, column: (&'static str, usize)) -> usize {
        self.indices.get(column.0).copied().unwrap_or(column.1)
    }

    /// Field for `column`, trimmed; empty when the line is too short.
    pub fn field<'a>(&self, fields: &'a [String], column: (&'static str, usize)) -> &'a str {
        fields
            .get(self.index(column))
            .map(|s| s.trim())
            .unwrap_or("")
    }

    /// Minimum line width that covers every listed column.
    pub fn required_len(&self, columns: &[(&'static str, usize)]) -> usize {
        columns.iter().map(|c| self.index(*c) + 1).max().unwrap_or(0)
    }
}

/// Vendor-specific line parser
pub trait RowParser: Send + Sync {
    fn source(&self) -> ImportSource;

    /// Column positions for this vendor given the header tokens.
    fn column_map(&self, header: &[String]) -> ColumnMap;

    fn parse_line(
        &self,
        line_number: usize,
        fields: &[String],
        columns: &ColumnMap,
    ) -> std::result::Result<TypedRow, DropReason>;
}

pub fn parser_for(source: ImportSource) -> Arc<dyn RowParser> {
    match source {
        ImportSource::Strong => Arc::new(StrongParser),
        ImportSource::Hevy => Arc::new(HevyParser),
    }
}

/// Empty input is zero; anything else must be a number.
pub(crate) fn parse_decimal(value: &str) -> Option<f64> {
    if value.is_empty() {
        return Some(0.0);
    }
    value.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Empty input is zero; `8.0` style values are accepted. Values outside `i32`
/// are rejected.
pub(crate) fn parse_count(value: &str) -> Option<i32> {
    if value.is_empty() {
        return Some(0);
    }
    value.parse::<i32>().ok().or_else(|| {
        parse_decimal(value)
            .map(f64::round)
            .filter(|v| (f64::from(i32::MIN)..=f64::from(i32::MAX)).contains(v))
            .map(|v| v as i32)
    })
}

/// Set position counted from `first`; anything below it is rejected.
pub(crate) fn parse_set_position(value: &str, first: i32) -> Option<i32> {
    value.parse::<i32>().ok().filter(|v| *v >= first)
}

pub(crate) fn parse_rpe(value: &str) -> Option<f64> {
    if value.is_empty() || value.eq_ignore_ascii_case("null") {
        return None;
    }
    value.parse::<f64>().ok().filter(|v| v.is_finite())
}

pub(crate) fn optional_text(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

#[derive(Debug, Default)]
struct ChunkOutput {
    rows: Vec<TypedRow>,
    dropped: BTreeMap<DropReason, usize>,
}

fn parse_chunk(
    parser: &dyn RowParser,
    columns: &ColumnMap,
    lines: Vec<(usize, String)>,
) -> ChunkOutput {
    let mut out = ChunkOutput::default();
    for (line_number, line) in lines {
        let fields = tokenize(&line);
        match parser.parse_line(line_number, &fields, columns) {
            Ok(row) => out.rows.push(row),
            Err(reason) => {
                debug!(line_number, reason = reason.as_str(), "Dropping row");
                *out.dropped.entry(reason).or_default() += 1;
            }
        }
    }
    out
}

/// Rows produced from one export
#[derive(Debug, Clone)]
pub struct ParseOutput {
    pub format: Option<FormatResolution>,
    pub rows: Vec<TypedRow>,
    pub dropped: BTreeMap<DropReason, usize>,
    pub data_lines: usize,
}

impl ParseOutput {
    pub fn dropped_total(&self) -> usize {
        self.dropped.values().sum()
    }
}

/// Parse an export: detect the schema from the header, then parse the body in
/// concurrent chunks of `chunk_size` lines.
#[instrument(skip(text), fields(bytes = text.len()))]
pub async fn parse_csv(
    text: &str,
    declared: ImportSource,
    chunk_size: usize,
) -> Result<ParseOutput> {
    let t_parse = std::time::Instant::now();
    let mut lines = text
        .lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l))
        .filter(|(_, l)| !l.trim().is_empty());

    let Some((_, header_line)) = lines.next() else {
        info!("Empty export; nothing to parse");
        return Ok(ParseOutput {
            format: None,
            rows: Vec::new(),
            dropped: BTreeMap::new(),
            data_lines: 0,
        });
    };

    let format = resolve_format(header_line, declared);
    let parser = parser_for(format.effective);
    let columns = Arc::new(parser.column_map(&header_tokens(header_line)));

    let body: Vec<(usize, String)> = lines.map(|(n, l)| (n, l.to_string())).collect();
    let data_lines = body.len();
    let chunk_size = chunk_size.max(1);

    let mut tasks = JoinSet::new();
    let mut body = body.into_iter().peekable();
    while body.peek().is_some() {
        let chunk: Vec<(usize, String)> = body.by_ref().take(chunk_size).collect();
        let parser = Arc::clone(&parser);
        let columns = Arc::clone(&columns);
        tasks.spawn(async move { parse_chunk(parser.as_ref(), &columns, chunk) });
    }

    let mut rows = Vec::with_capacity(data_lines);
    let mut dropped: BTreeMap<DropReason, usize> = BTreeMap::new();
    while let Some(joined) = tasks.join_next().await {
        let chunk = joined?;
        metrics::parser::chunk_processed();
        rows.extend(chunk.rows);
        for (reason, count) in chunk.dropped {
            *dropped.entry(reason).or_default() += count;
        }
    }

    metrics::parser::rows_parsed(rows.len() as u64, format.effective.name());
    for (reason, count) in &dropped {
        metrics::parser::rows_dropped(*count as u64, reason.as_str());
    }
    metrics::parser::duration(t_parse.elapsed().as_secs_f64());
    info!(
        source = %format.effective,
        rows = rows.len(),
        dropped = dropped.values().sum::<usize>(),
        "Parsed export"
    );

    Ok(ParseOutput {
        format: Some(format),
        rows,
        dropped,
        data_lines,
    })
}
