use std::{
    fs::Permissions,
    io::Write,
    path::{Path, PathBuf},
};

use serde::{Serialize, de::DeserializeOwned};
use tracing::debug;

pub mod error;

pub use error::{Error, Result};

/// JSON file holding the camera catalog.
///
/// Writes go to a temporary file next to the destination which is then renamed
/// over it, so readers only ever see a complete catalog.
#[derive(Debug, Clone)]
pub struct CatalogStore {
    path: PathBuf,
}

impl CatalogStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True iff the backing file exists and is a regular file.
    pub async fn exists(&self) -> bool {
        tokio::fs::metadata(&self.path)
            .await
            .map(|metadata| metadata.is_file())
            .unwrap_or(false)
    }

    pub async fn load<T: DeserializeOwned>(&self) -> Result<Vec<T>> {
        let data = tokio::fs::read(&self.path)
            .await
            .map_err(|source| Error::Read {
                path: self.path.clone(),
                source,
            })?;

        let records: Vec<T> = serde_json::from_slice(&data).map_err(Error::Decode)?;

        debug!(path = %self.path.display(), count = records.len(), "Loaded catalog");
        Ok(records)
    }

    pub async fn save<T: Serialize>(&self, records: &[T]) -> Result<()> {
        let mut data = serde_json::to_vec_pretty(records).map_err(Error::Encode)?;
        data.push(b'\n');

        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_atomic(&path, &data)).await??;

        debug!(path = %self.path.display(), count = records.len(), "Saved catalog");
        Ok(())
    }
}

fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let write_err = |source| Error::Write {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(write_err)?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".catalog")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(write_err)?;
    // Temp files start out owner-only; the catalog is read by other processes.
    if let Some(permissions) = catalog_permissions(path) {
        tmp.as_file()
            .set_permissions(permissions)
            .map_err(write_err)?;
    }
    tmp.write_all(data).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;

    tmp.persist(path).map_err(|e| Error::Rename {
        path: path.to_path_buf(),
        source: e.error,
    })?;

    Ok(())
}

/// Permissions of the existing catalog, or `0644` for a new one.
fn catalog_permissions(path: &Path) -> Option<Permissions> {
    match std::fs::metadata(path) {
        Ok(metadata) if metadata.is_file() => Some(metadata.permissions()),
        _ => default_permissions(),
    }
}

#[cfg(unix)]
fn default_permissions() -> Option<Permissions> {
    use std::os::unix::fs::PermissionsExt;

    Some(Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn default_permissions() -> Option<Permissions> {
    None
}
