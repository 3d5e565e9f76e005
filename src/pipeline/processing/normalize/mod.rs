//! Normalization of vendor date and duration strings.

pub mod dates;
pub mod duration;

pub use dates::parse_date;
pub use duration::parse_duration_seconds;
