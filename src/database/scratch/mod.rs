#[cfg(test)]
mod tests;

use crate::config::AnalyticalConfig;
use crate::{ScopeError, ValidationError};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};
use uuid::Uuid;

/// A stored upload inside the scratch directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredUpload {
    pub path: PathBuf,
    pub file_name: String,
    pub file_size: u64,
}

/// Process-lifetime directory holding uploaded database images
///
/// Each upload lands in its own subdirectory so a file that is still open
/// is never overwritten by a later upload with the same name.
#[derive(Debug)]
pub struct ScratchDir {
    dir: Option<TempDir>,
    path: PathBuf,
}

impl ScratchDir {
    /// Create the scratch directory, under `parent` when given
    #[inline]
    pub fn new(parent: Option<&Path>) -> Result<Self, ScopeError> {
        let dir = match parent {
            Some(parent) => {
                fs::create_dir_all(parent)?;
                tempfile::Builder::new().prefix("dbscope-").tempdir_in(parent)?
            }
            None => tempfile::Builder::new().prefix("dbscope-").tempdir()?,
        };
        let path = dir.path().to_path_buf();
        debug!("Created scratch directory {}", path.display());

        Ok(Self {
            dir: Some(dir),
            path,
        })
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Copy `source` into the scratch directory under `file_name`
    ///
    /// `file_name` must be a bare file name with an allowed extension.
    #[inline]
    pub fn store_upload(
        &self,
        source: &Path,
        file_name: &str,
        config: &AnalyticalConfig,
    ) -> Result<StoredUpload, ScopeError> {
        let file_name = validate_upload_name(file_name, config)?;

        if !source.is_file() {
            return Err(ValidationError::InvalidUpload(format!(
                "{} is not a readable file",
                source.display()
            ))
            .into());
        }

        let target_dir = self.path.join(Uuid::new_v4().to_string());
        fs::create_dir_all(&target_dir)?;
        let target = target_dir.join(file_name);
        let file_size = fs::copy(source, &target)?;

        info!(
            "Stored upload {} ({} bytes) at {}",
            file_name,
            file_size,
            target.display()
        );

        Ok(StoredUpload {
            path: target,
            file_name: file_name.to_string(),
            file_size,
        })
    }

    /// Remove the directory and everything in it
    #[inline]
    pub fn cleanup(&mut self) -> Result<(), ScopeError> {
        if let Some(dir) = self.dir.take() {
            dir.close()?;
            info!("Removed scratch directory {}", self.path.display());
        }
        Ok(())
    }
}

/// Check that an upload name is a bare file name with an allowed extension
#[inline]
pub fn validate_upload_name<'a>(
    file_name: &'a str,
    config: &AnalyticalConfig,
) -> Result<&'a str, ValidationError> {
    let file_name = file_name.trim();
    if file_name.is_empty() {
        return Err(ValidationError::InvalidUpload("no file name given".to_string()));
    }

    if file_name.contains(['/', '\\']) || file_name == "." || file_name == ".." {
        return Err(ValidationError::InvalidUpload(format!(
            "{} is not a plain file name",
            file_name
        )));
    }

    let extension = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();
    if !config.allows_extension(extension) {
        return Err(ValidationError::InvalidUpload(format!(
            "{} does not have a supported extension ({})",
            file_name,
            config.allowed_extensions.join(", ")
        )));
    }

    Ok(file_name)
}
