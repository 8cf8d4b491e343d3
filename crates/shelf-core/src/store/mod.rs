//! Persistence of library records and library sets.
//!
//! [`LibraryStore`] is the seam between the lifecycle service and whatever
//! holds the records. Two implementations ship with the crate:
//!
//! - [`MemoryStore`]: in-process, records every write for test assertions.
//! - [`FileStore`]: a single JSON document guarded by an exclusive file lock.
//!
//! Both delegate the actual queries and conditional writes to [`Records`], so
//! the draft and version invariants are enforced identically regardless of
//! backend.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::{FailOn, MemoryStore, StoreOperation};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::library::{Library, LibraryId, LibrarySet, SetId};
use crate::version::Version;

/// Errors from a [`LibraryStore`].
#[derive(Error, Debug)]
pub enum StoreError {
    /// Update of a record that does not exist.
    #[error("no record with id {0}")]
    NotFound(String),

    /// Insert of a record whose id is already present.
    #[error("a record with id {0} already exists")]
    DuplicateId(String),

    /// Another set already holds a library with this name.
    #[error("library name {0:?} is already taken")]
    NameTaken(String),

    /// The set already holds its one draft.
    #[error("library set {0} already has a draft")]
    DraftExists(SetId),

    /// Another release in the set already holds this major.minor.
    #[error("version {version} is already released in library set {set_id}")]
    VersionTaken {
        /// The set.
        set_id: SetId,
        /// The conflicting version.
        version: Version,
    },

    /// Filesystem failure.
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The store document could not be read or written as JSON.
    #[error("store data is corrupt: {0}")]
    Serde(#[from] serde_json::Error),

    /// The backend is unreachable (used by test doubles).
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Result type alias using [`StoreError`].
pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence contract for libraries and library sets.
pub trait LibraryStore: Send + Sync {
    /// Look up a library by id.
    fn find_by_id(&self, id: &LibraryId) -> StoreResult<Option<Library>>;

    /// Update an existing library.
    ///
    /// Fails with [`StoreError::DraftExists`] or [`StoreError::VersionTaken`]
    /// when the new state would break a set invariant.
    fn save(&self, library: &Library) -> StoreResult<Library>;

    /// Insert a new library, with the same invariant checks as [`save`](Self::save).
    fn insert(&self, library: &Library) -> StoreResult<Library>;

    /// Insert a new set together with its first library in one write.
    ///
    /// Nothing is persisted unless both records pass their checks.
    fn insert_with_set(&self, set: &LibrarySet, library: &Library) -> StoreResult<Library>;

    /// Whether any library has this name, compared case-insensitively.
    fn exists_by_name(&self, name: &str) -> StoreResult<bool>;

    /// Whether the set currently holds a draft.
    fn exists_draft_in_set(&self, set_id: &SetId) -> StoreResult<bool>;

    /// Highest released version in the set, optionally restricted to one major.
    fn max_released_version(
        &self,
        set_id: &SetId,
        major: Option<u32>,
    ) -> StoreResult<Option<Version>>;

    /// All libraries in a set, in storage order.
    fn find_in_set(&self, set_id: &SetId) -> StoreResult<Vec<Library>>;

    /// Look up a library set.
    fn find_set(&self, id: &SetId) -> StoreResult<Option<LibrarySet>>;

    /// Insert a new library set.
    fn insert_set(&self, set: &LibrarySet) -> StoreResult<LibrarySet>;

    /// Update an existing library set.
    fn save_set(&self, set: &LibrarySet) -> StoreResult<LibrarySet>;
}

/// The complete contents of a store.
///
/// This is also the on-disk document format of [`FileStore`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Records {
    /// Library sets.
    #[serde(default)]
    pub sets: Vec<LibrarySet>,
    /// Libraries, drafts and releases alike.
    #[serde(default)]
    pub libraries: Vec<Library>,
}

impl Records {
    /// Look up a library by id.
    pub fn library(&self, id: &LibraryId) -> Option<&Library> {
        self.libraries.iter().find(|lib| &lib.id == id)
    }

    /// Look up a set by id.
    pub fn set(&self, id: &SetId) -> Option<&LibrarySet> {
        self.sets.iter().find(|set| &set.id == id)
    }

    /// Whether a library with this name exists (case-insensitive).
    pub fn name_taken(&self, name: &str) -> bool {
        let wanted = name.to_lowercase();
        self.libraries
            .iter()
            .any(|lib| lib.name.to_lowercase() == wanted)
    }

    /// Whether the set holds a draft.
    pub fn has_draft(&self, set_id: &SetId) -> bool {
        self.libraries
            .iter()
            .any(|lib| &lib.set_id == set_id && lib.draft)
    }

    /// Highest released version in the set, optionally within one major.
    pub fn max_released(&self, set_id: &SetId, major: Option<u32>) -> Option<Version> {
        self.libraries
            .iter()
            .filter(|lib| &lib.set_id == set_id && lib.is_released())
            .filter(|lib| major.is_none_or(|major| lib.version.major == major))
            .map(|lib| lib.version)
            .max()
    }

    /// Libraries in the set, in storage order.
    pub fn in_set(&self, set_id: &SetId) -> Vec<Library> {
        self.libraries
            .iter()
            .filter(|lib| &lib.set_id == set_id)
            .cloned()
            .collect()
    }

    /// Insert a library after checking set invariants.
    pub fn insert_library(&mut self, library: &Library) -> StoreResult<()> {
        if self.library(&library.id).is_some() {
            return Err(StoreError::DuplicateId(library.id.to_string()));
        }
        self.check_invariants(library)?;
        self.libraries.push(library.clone());
        Ok(())
    }

    /// Replace a library after checking set invariants.
    pub fn save_library(&mut self, library: &Library) -> StoreResult<()> {
        let index = self
            .libraries
            .iter()
            .position(|lib| lib.id == library.id)
            .ok_or_else(|| StoreError::NotFound(library.id.to_string()))?;
        self.check_invariants(library)?;
        self.libraries[index] = library.clone();
        Ok(())
    }

    /// Insert a set.
    pub fn insert_set(&mut self, set: &LibrarySet) -> StoreResult<()> {
        if self.set(&set.id).is_some() {
            return Err(StoreError::DuplicateId(set.id.to_string()));
        }
        self.sets.push(set.clone());
        Ok(())
    }

    /// Insert a set and its first library, or neither.
    pub fn insert_set_with_library(
        &mut self,
        set: &LibrarySet,
        library: &Library,
    ) -> StoreResult<()> {
        if self.set(&set.id).is_some() {
            return Err(StoreError::DuplicateId(set.id.to_string()));
        }
        if self.library(&library.id).is_some() {
            return Err(StoreError::DuplicateId(library.id.to_string()));
        }
        self.check_invariants(library)?;
        self.sets.push(set.clone());
        self.libraries.push(library.clone());
        Ok(())
    }

    /// Replace a set.
    pub fn save_set(&mut self, set: &LibrarySet) -> StoreResult<()> {
        let slot = self
            .sets
            .iter_mut()
            .find(|existing| existing.id == set.id)
            .ok_or_else(|| StoreError::NotFound(set.id.to_string()))?;
        *slot = set.clone();
        Ok(())
    }

    /// Checks `library` against every other record in its set, and its name
    /// against libraries in other sets.
    fn check_invariants(&self, library: &Library) -> StoreResult<()> {
        let wanted = library.name.to_lowercase();
        if self
            .libraries
            .iter()
            .any(|other| other.set_id != library.set_id && other.name.to_lowercase() == wanted)
        {
            return Err(StoreError::NameTaken(library.name.clone()));
        }

        let mut siblings = self
            .libraries
            .iter()
            .filter(|other| other.set_id == library.set_id && other.id != library.id);

        if library.draft {
            if siblings.any(|other| other.draft) {
                return Err(StoreError::DraftExists(library.set_id));
            }
        } else if siblings.any(|other| {
            other.is_released()
                && other.version.major == library.version.major
                && other.version.minor == library.version.minor
        }) {
            return Err(StoreError::VersionTaken {
                set_id: library.set_id,
                version: library.version,
            });
        }
        Ok(())
    }
}
