//! JSON-file store.
//!
//! All records live in one pretty-printed JSON document. Readers take a
//! shared lock and writers an exclusive lock on a sidecar `<file>.lock`, so
//! the invariant checks in [`Records`] and the write that follows happen
//! atomically across processes. Writes go to a temp file in the same
//! directory and are renamed into place.

use std::fs::{self, File, OpenOptions};
use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use fs2::FileExt;
use tracing::{debug, instrument};

use super::{LibraryStore, Records, StoreResult};
use crate::library::{Library, LibraryId, LibrarySet, SetId};
use crate::version::Version;

/// A [`LibraryStore`] backed by a JSON file.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: Utf8PathBuf,
    lock_path: Utf8PathBuf,
}

/// Holds an OS lock on the sidecar file until dropped.
struct LockGuard {
    file: File,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

impl FileStore {
    /// Open (creating if needed) the store at `path`.
    #[instrument(skip_all, fields(path = %path.as_ref()))]
    pub fn open(path: impl AsRef<Utf8Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let lock_path = Utf8PathBuf::from(format!("{path}.lock"));
        let store = Self { path, lock_path };

        fs::create_dir_all(store.parent_dir())?;
        if !store.path.exists() {
            let _guard = store.lock(true)?;
            if !store.path.exists() {
                debug!("initializing empty store");
                store.write(&Records::default())?;
            }
        }
        Ok(store)
    }

    /// Path of the JSON document.
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Snapshot of every record.
    pub fn records(&self) -> StoreResult<Records> {
        self.with_records(Records::clone)
    }

    fn parent_dir(&self) -> &Utf8Path {
        self.path
            .parent()
            .filter(|parent| !parent.as_str().is_empty())
            .unwrap_or_else(|| Utf8Path::new("."))
    }

    fn lock(&self, exclusive: bool) -> StoreResult<LockGuard> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.lock_path)?;
        if exclusive {
            FileExt::lock_exclusive(&file)?;
        } else {
            FileExt::lock_shared(&file)?;
        }
        Ok(LockGuard { file })
    }

    fn read(&self) -> StoreResult<Records> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Records::default()),
            Err(e) => return Err(e.into()),
        };
        if text.trim().is_empty() {
            return Ok(Records::default());
        }
        Ok(serde_json::from_str(&text)?)
    }

    fn write(&self, records: &Records) -> StoreResult<()> {
        let mut tmp = tempfile::NamedTempFile::new_in(self.parent_dir())?;
        serde_json::to_writer_pretty(&mut tmp, records)?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }

    fn with_records<T>(&self, f: impl FnOnce(&Records) -> T) -> StoreResult<T> {
        let _guard = self.lock(false)?;
        let records = self.read()?;
        Ok(f(&records))
    }

    fn update(&self, f: impl FnOnce(&mut Records) -> StoreResult<()>) -> StoreResult<()> {
        let _guard = self.lock(true)?;
        let mut records = self.read()?;
        f(&mut records)?;
        self.write(&records)
    }
}

impl LibraryStore for FileStore {
    fn find_by_id(&self, id: &LibraryId) -> StoreResult<Option<Library>> {
        self.with_records(|records| records.library(id).cloned())
    }

    #[instrument(skip_all, fields(id = %library.id))]
    fn save(&self, library: &Library) -> StoreResult<Library> {
        self.update(|records| records.save_library(library))?;
        debug!("library saved");
        Ok(library.clone())
    }

    #[instrument(skip_all, fields(id = %library.id))]
    fn insert(&self, library: &Library) -> StoreResult<Library> {
        self.update(|records| records.insert_library(library))?;
        debug!("library inserted");
        Ok(library.clone())
    }

    #[instrument(skip_all, fields(id = %library.id, set_id = %set.id))]
    fn insert_with_set(&self, set: &LibrarySet, library: &Library) -> StoreResult<Library> {
        self.update(|records| records.insert_set_with_library(set, library))?;
        debug!("set and library inserted");
        Ok(library.clone())
    }

    fn exists_by_name(&self, name: &str) -> StoreResult<bool> {
        self.with_records(|records| records.name_taken(name))
    }

    fn exists_draft_in_set(&self, set_id: &SetId) -> StoreResult<bool> {
        self.with_records(|records| records.has_draft(set_id))
    }

    fn max_released_version(
        &self,
        set_id: &SetId,
        major: Option<u32>,
    ) -> StoreResult<Option<Version>> {
        self.with_records(|records| records.max_released(set_id, major))
    }

    fn find_in_set(&self, set_id: &SetId) -> StoreResult<Vec<Library>> {
        self.with_records(|records| records.in_set(set_id))
    }

    fn find_set(&self, id: &SetId) -> StoreResult<Option<LibrarySet>> {
        self.with_records(|records| records.set(id).cloned())
    }

    fn insert_set(&self, set: &LibrarySet) -> StoreResult<LibrarySet> {
        self.update(|records| records.insert_set(set))?;
        Ok(set.clone())
    }

    fn save_set(&self, set: &LibrarySet) -> StoreResult<LibrarySet> {
        self.update(|records| records.save_set(set))?;
        Ok(set.clone())
    }
}
