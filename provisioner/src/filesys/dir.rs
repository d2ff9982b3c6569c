//! Directory operations

use std::path::{Path, PathBuf};

use tokio::fs;

use crate::errors::ProvisionError;
use crate::filesys::file::{set_mode, File};

/// A directory wrapper with path
#[derive(Debug, Clone)]
pub struct Dir {
    path: PathBuf,
}

impl Dir {
    /// Create a new directory reference
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get the directory path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if the directory exists
    pub async fn exists(&self) -> bool {
        fs::metadata(&self.path)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }

    /// Create the directory (and parents)
    pub async fn create(&self) -> Result<(), ProvisionError> {
        fs::create_dir_all(&self.path).await?;
        Ok(())
    }

    /// Delete the directory and all contents
    pub async fn delete(&self) -> Result<(), ProvisionError> {
        if self.exists().await {
            fs::remove_dir_all(&self.path).await?;
        }
        Ok(())
    }

    /// List files in the directory
    pub async fn list_files(&self) -> Result<Vec<PathBuf>, ProvisionError> {
        let mut files = Vec::new();
        let mut entries = fs::read_dir(&self.path).await?;

        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                files.push(entry.path());
            }
        }

        files.sort();
        Ok(files)
    }

    /// List every directory below this one, depth first, excluding itself
    pub async fn walk_dirs(&self) -> Result<Vec<PathBuf>, ProvisionError> {
        let mut found = Vec::new();
        let mut pending = vec![self.path.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                // Symlinks are not followed
                if entry.file_type().await?.is_dir() {
                    pending.push(entry.path());
                    found.push(entry.path());
                }
            }
        }

        found.sort();
        Ok(found)
    }

    /// Recursively copy this directory's contents into `dest`
    pub async fn copy_into(&self, dest: &Path) -> Result<(), ProvisionError> {
        let mut pending = vec![(self.path.clone(), dest.to_path_buf())];

        while let Some((from, to)) = pending.pop() {
            fs::create_dir_all(&to).await?;
            let mut entries = fs::read_dir(&from).await?;
            while let Some(entry) = entries.next_entry().await? {
                let file_type = entry.file_type().await?;
                let target = to.join(entry.file_name());
                if file_type.is_dir() {
                    pending.push((entry.path(), target));
                } else if file_type.is_file() {
                    fs::copy(entry.path(), &target).await?;
                }
            }
        }

        Ok(())
    }

    /// Set the Unix permission bits of the directory itself
    pub async fn set_mode(&self, mode: u32) -> Result<(), ProvisionError> {
        set_mode(&self.path, mode).await
    }

    /// Get a file within this directory
    pub fn file(&self, name: &str) -> File {
        File::new(self.path.join(name))
    }

    /// Get a subdirectory
    pub fn subdir(&self, name: &str) -> Dir {
        Dir::new(self.path.join(name))
    }
}
