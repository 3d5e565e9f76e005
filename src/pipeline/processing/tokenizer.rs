//! Quote-aware CSV line splitting.

use csv::{ByteRecord, ReaderBuilder};

/// Split one CSV line into fields.
///
/// Commas inside double quotes are kept, quote characters are dropped from the
/// values, and an unterminated quote runs to the end of the line. Never fails.
pub fn tokenize(line: &str) -> Vec<String> {
    let line = line.trim_end_matches(['\r', '\n']);
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .buffer_capacity(line.len() + 1)
        .from_reader(line.as_bytes());

    let mut record = ByteRecord::new();
    match reader.read_byte_record(&mut record) {
        Ok(true) => record
            .iter()
            .map(|field| String::from_utf8_lossy(field).replace('"', ""))
            .collect(),
        _ => vec![String::new()],
    }
}

/// Inverse of [`tokenize`] for fields that need no escaping beyond commas.
pub fn join_fields<S: AsRef<str>>(fields: &[S]) -> String {
    fields
        .iter()
        .map(|f| {
            let f = f.as_ref();
            if f.contains(',') {
                format!("\"{f}\"")
            } else {
                f.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}
