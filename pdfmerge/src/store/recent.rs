//! Persistent most-recently-used list of PDF files.
//!
//! The list lives in a JSON file as an array of
//! `{ path, name, lastOpened, size, pageCount }`, most recent first. Every
//! mutation rewrites the file atomically while holding the list lock, so
//! concurrent writers in one process never interleave.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{MergeError, Result};
use crate::io::WriteOptions;
use crate::io::writer::write_atomic;
use crate::utils::display_name;

/// Maximum number of entries kept.
pub const MAX_RECENT_FILES: usize = 20;

/// One remembered file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentFile {
    /// Path of the file.
    pub path: PathBuf,
    /// File name for display.
    pub name: String,
    /// When the file was last added.
    pub last_opened: DateTime<Utc>,
    /// Size in bytes.
    pub size: u64,
    /// Number of pages.
    pub page_count: u32,
}

/// The recent-files store, bound to one JSON file.
#[derive(Debug)]
pub struct RecentFiles {
    path: PathBuf,
    entries: Mutex<Vec<RecentFile>>,
}

impl RecentFiles {
    /// Load the store from `path`. A missing file is an empty list.
    ///
    /// # Errors
    ///
    /// [`MergeError::RecentFiles`] if the file exists but cannot be read or
    /// is not a valid list.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut entries: Vec<RecentFile> = match std::fs::read(&path) {
            Ok(data) => serde_json::from_slice(&data)
                .map_err(|e| MergeError::recent_files(path.clone(), e.to_string()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(MergeError::recent_files(path, e.to_string())),
        };
        if entries.len() > MAX_RECENT_FILES {
            log::debug!(
                "recent files store {} holds {} entries; keeping the newest {MAX_RECENT_FILES}",
                path.display(),
                entries.len()
            );
            entries.truncate(MAX_RECENT_FILES);
        }
        log::debug!("opened recent files store {}", path.display());
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record `entry` as the most recent file.
    ///
    /// The timestamp is set to now. An existing entry for the same path is
    /// moved to the front, and the list is capped at [`MAX_RECENT_FILES`].
    ///
    /// # Errors
    ///
    /// [`MergeError::RecentFiles`] if the list cannot be persisted.
    pub fn add(&self, mut entry: RecentFile) -> Result<()> {
        entry.last_opened = Utc::now();
        self.update(|entries| {
            entries.retain(|existing| existing.path != entry.path);
            entries.insert(0, entry);
            entries.truncate(MAX_RECENT_FILES);
            true
        })
        .map(|_| ())
    }

    /// Snapshot of the list, most recent first.
    pub fn list(&self) -> Vec<RecentFile> {
        self.lock().clone()
    }

    /// Forget `path`. Returns whether it was present.
    ///
    /// # Errors
    ///
    /// [`MergeError::RecentFiles`] if the list cannot be persisted.
    pub fn remove(&self, path: &Path) -> Result<bool> {
        self.update(|entries| {
            let before = entries.len();
            entries.retain(|existing| existing.path != path);
            entries.len() != before
        })
    }

    /// Forget everything.
    ///
    /// # Errors
    ///
    /// [`MergeError::RecentFiles`] if the list cannot be persisted.
    pub fn clear(&self) -> Result<()> {
        self.update(|entries| {
            entries.clear();
            true
        })
        .map(|_| ())
    }

    /// Build an entry for an existing file from its metadata.
    ///
    /// # Errors
    ///
    /// [`MergeError::FileNotFound`] or [`MergeError::FileNotAccessible`].
    pub fn file_entry(path: &Path, page_count: u32) -> Result<RecentFile> {
        let metadata = std::fs::metadata(path).map_err(|source| match source.kind() {
            std::io::ErrorKind::NotFound => MergeError::file_not_found(path.to_path_buf()),
            _ => MergeError::FileNotAccessible {
                path: path.to_path_buf(),
                source,
            },
        })?;
        let last_opened = metadata.modified().map(DateTime::<Utc>::from).unwrap_or_else(|_| Utc::now());
        Ok(RecentFile {
            path: path.to_path_buf(),
            name: display_name(path),
            last_opened,
            size: metadata.len(),
            page_count,
        })
    }

    fn lock(&self) -> MutexGuard<'_, Vec<RecentFile>> {
        // The list is always left consistent, so a poisoned lock is usable.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply `change` to a copy of the list and persist it. The new list
    /// replaces the in-memory one only once it is on disk. `change` returns
    /// whether anything changed; nothing is written otherwise.
    fn update(&self, change: impl FnOnce(&mut Vec<RecentFile>) -> bool) -> Result<bool> {
        let mut entries = self.lock();
        let mut updated = entries.clone();
        if !change(&mut updated) {
            return Ok(false);
        }
        self.persist(&updated)?;
        *entries = updated;
        Ok(true)
    }

    fn persist(&self, entries: &[RecentFile]) -> Result<()> {
        let data = serde_json::to_vec_pretty(entries)
            .map_err(|e| MergeError::recent_files(self.path.clone(), e.to_string()))?;
        let options = WriteOptions {
            sync: false,
            ..WriteOptions::default()
        };
        write_atomic(&data, &self.path, &options)
            .map_err(|e| MergeError::recent_files(self.path.clone(), e.to_string()))?;
        log::trace!("persisted {} recent files to {}", entries.len(), self.path.display());
        Ok(())
    }
}
