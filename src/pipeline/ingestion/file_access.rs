use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::{debug, info};

use crate::error::{ImportError, Result};

/// Contents of an export file, decoded lossily as UTF-8
#[derive(Debug, Clone)]
pub struct ImportFile {
    pub text: String,
    /// Hex SHA-256 of the raw bytes
    pub sha256: String,
    pub bytes: usize,
}

/// Open handle on an export file; released on drop
pub struct ScopedFileAccess {
    path: PathBuf,
    file: File,
}

impl ScopedFileAccess {
    pub async fn acquire(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .await
            .map_err(|source| ImportError::FileAccess {
                path: path.to_path_buf(),
                source,
            })?;
        debug!("Acquired import file {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn read_lossy(&mut self) -> Result<ImportFile> {
        let mut raw = Vec::new();
        self.file
            .read_to_end(&mut raw)
            .await
            .map_err(|source| ImportError::FileAccess {
                path: self.path.clone(),
                source,
            })?;

        let sha256 = hex::encode(Sha256::digest(&raw));
        let text = String::from_utf8_lossy(&raw).into_owned();
        info!(
            path = %self.path.display(),
            bytes = raw.len(),
            %sha256,
            "Read import file"
        );
        Ok(ImportFile {
            text,
            sha256,
            bytes: raw.len(),
        })
    }
}

impl Drop for ScopedFileAccess {
    fn drop(&mut self) {
        debug!("Released import file {}", self.path.display());
    }
}
