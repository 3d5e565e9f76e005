// Import pipeline: file access, processing, persistence, and session status

pub mod ingestion;
pub mod processing;
pub mod session;
pub mod status;
pub mod storage;

// Re-export key types and functions from each stage
pub use processing::parser;
pub use session::{ImportOutcome, ImportSession, ImportSummary};
pub use status::{ImportStage, ImportStatus, StatusStream};
