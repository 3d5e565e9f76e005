//! Vendor schema detection from the header line.

use serde::Serialize;
use tracing::warn;

use super::tokenizer::tokenize;
use crate::constants::{HEVY_EXERCISE_TITLE, HEVY_START_TIME, STRONG_EXERCISE_NAME, STRONG_WORKOUT_NAME};
use crate::observability::metrics;
use crate::types::ImportSource;

/// Outcome of reconciling the declared source with the header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FormatResolution {
    pub declared: ImportSource,
    pub detected: Option<ImportSource>,
    pub effective: ImportSource,
}

impl FormatResolution {
    /// True when the header contradicted the declared source
    pub fn overridden(&self) -> bool {
        self.effective != self.declared
    }
}

/// Strip a UTF-8 byte order mark and surrounding whitespace from a header line.
pub fn clean_header_line(line: &str) -> &str {
    line.trim_start_matches('\u{feff}').trim()
}

/// Normalized header tokens, for case-insensitive column lookup.
pub fn header_tokens(line: &str) -> Vec<String> {
    tokenize(clean_header_line(line))
        .into_iter()
        .map(|t| t.trim().to_lowercase())
        .collect()
}

/// Identify the schema from the characteristic header columns.
pub fn detect_format(header_line: &str) -> Option<ImportSource> {
    let tokens = header_tokens(header_line);
    let has = |name: &str| tokens.iter().any(|t| t == &name.to_lowercase());

    if has(HEVY_START_TIME.0) && has(HEVY_EXERCISE_TITLE.0) {
        Some(ImportSource::Hevy)
    } else if has(STRONG_WORKOUT_NAME.0) && has(STRONG_EXERCISE_NAME.0) {
        Some(ImportSource::Strong)
    } else {
        None
    }
}

/// Pick the parser to use. A detected schema always wins over the declared one.
pub fn resolve_format(header_line: &str, declared: ImportSource) -> FormatResolution {
    let detected = detect_format(header_line);
    let effective = detected.unwrap_or(declared);
    if effective != declared {
        warn!(
            declared = %declared,
            detected = %effective,
            "Header does not match declared source; switching parser"
        );
        metrics::parser::format_override(effective.name());
    }
    FormatResolution {
        declared,
        detected,
        effective,
    }
}
