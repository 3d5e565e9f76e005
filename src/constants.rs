/// Source name constants shared by the CLI and the format detector
pub const STRONG_SOURCE: &str = "strong";
pub const HEVY_SOURCE: &str = "hevy";

/// Lines handed to a single parse task
pub const DEFAULT_CHUNK_SIZE: usize = 500;

// Strong export columns, with their positions in a stock export
pub const STRONG_DATE: (&str, usize) = ("Date", 0);
pub const STRONG_WORKOUT_NAME: (&str, usize) = ("Workout Name", 1);
pub const STRONG_DURATION: (&str, usize) = ("Duration", 2);
pub const STRONG_EXERCISE_NAME: (&str, usize) = ("Exercise Name", 3);
pub const STRONG_SET_ORDER: (&str, usize) = ("Set Order", 4);
pub const STRONG_WEIGHT: (&str, usize) = ("Weight", 5);
pub const STRONG_REPS: (&str, usize) = ("Reps", 6);
pub const STRONG_NOTES: (&str, usize) = ("Notes", 9);
pub const STRONG_WORKOUT_NOTES: (&str, usize) = ("Workout Notes", 10);
pub const STRONG_RPE: (&str, usize) = ("RPE", 11);

// Hevy export columns
pub const HEVY_TITLE: (&str, usize) = ("title", 0);
pub const HEVY_START_TIME: (&str, usize) = ("start_time", 1);
pub const HEVY_END_TIME: (&str, usize) = ("end_time", 2);
pub const HEVY_DESCRIPTION: (&str, usize) = ("description", 3);
pub const HEVY_EXERCISE_TITLE: (&str, usize) = ("exercise_title", 4);
pub const HEVY_EXERCISE_NOTES: (&str, usize) = ("exercise_notes", 6);
pub const HEVY_SET_INDEX: (&str, usize) = ("set_index", 7);
pub const HEVY_SET_TYPE: (&str, usize) = ("set_type", 8);
pub const HEVY_WEIGHT_LBS: (&str, usize) = ("weight_lbs", 9);
pub const HEVY_REPS: (&str, usize) = ("reps", 10);
pub const HEVY_RPE: (&str, usize) = ("rpe", 13);

// Date formats
pub const STRONG_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const HEVY_DATE_FORMAT: &str = "%d %b %Y, %H:%M";
pub const HEVY_DATE_FORMAT_12H: &str = "%d %b %Y, %I:%M %p";
pub const ISO_DATE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
pub const BARE_DATE_FORMAT: &str = "%Y-%m-%d";

/// Get all supported source names
pub fn get_supported_sources() -> Vec<&'static str> {
    vec![STRONG_SOURCE, HEVY_SOURCE]
}
