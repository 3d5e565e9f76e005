// Pipeline ingestion: scoped access to export files

pub mod file_access;

pub use file_access::{ImportFile, ScopedFileAccess};
