//! In-memory store for tests and embedding.
//!
//! Every write is recorded as a [`StoreOperation`] so tests can assert on
//! exactly what was persisted, and any operation can be made to fail with
//! [`FailOn`].
//!
//! # Example
//!
//! ```
//! use shelf_core::library::{Library, SetId, UserId};
//! use shelf_core::store::{LibraryStore, MemoryStore, StoreOperation};
//!
//! let store = MemoryStore::new();
//! let lib = Library::new_draft(SetId::new(), "core", "fhir", "", &UserId::new("a"), chrono::Utc::now());
//! store.insert(&lib).unwrap();
//!
//! assert_eq!(store.writes(), vec![StoreOperation::Insert(lib.id)]);
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{LibraryStore, Records, StoreError, StoreResult};
use crate::library::{Library, LibraryId, LibrarySet, SetId};
use crate::version::Version;

/// In-memory [`LibraryStore`].
///
/// Clones share state, so a test can keep a handle after giving one to the
/// service.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryStoreInner>>,
}

#[derive(Debug, Default)]
struct MemoryStoreInner {
    records: Records,
    fail_on: Option<FailOn>,
    operations: Vec<StoreOperation>,
}

/// Which operation should fail with [`StoreError::Unavailable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOn {
    /// Fail `find_by_id`.
    FindById,
    /// Fail `save`.
    Save,
    /// Fail `insert`.
    Insert,
    /// Fail `exists_by_name`.
    ExistsByName,
    /// Fail `exists_draft_in_set`.
    ExistsDraftInSet,
    /// Fail `max_released_version`.
    MaxReleasedVersion,
    /// Fail `find_in_set`.
    FindInSet,
    /// Fail `find_set`.
    FindSet,
    /// Fail `insert_set`.
    InsertSet,
    /// Fail `save_set`.
    SaveSet,
}

/// A successful write, recorded for verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOperation {
    /// A library was updated.
    Save(LibraryId),
    /// A library was inserted.
    Insert(LibraryId),
    /// A set was inserted.
    InsertSet(SetId),
    /// A set was updated.
    SaveSet(SetId),
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with records. Seeding is not recorded.
    pub fn with_records(records: Records) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemoryStoreInner {
                records,
                ..MemoryStoreInner::default()
            })),
        }
    }

    /// Configure the store to fail on a specific operation.
    #[must_use]
    pub fn fail_on(self, fail_on: FailOn) -> Self {
        self.lock().fail_on = Some(fail_on);
        self
    }

    /// Clear the failure configuration.
    pub fn clear_fail_on(&self) {
        self.lock().fail_on = None;
    }

    /// All successful writes, in order.
    pub fn writes(&self) -> Vec<StoreOperation> {
        self.lock().operations.clone()
    }

    /// Number of successful writes.
    pub fn write_count(&self) -> usize {
        self.lock().operations.len()
    }

    /// Forget recorded writes (records are kept).
    pub fn clear_writes(&self) {
        self.lock().operations.clear();
    }

    /// Snapshot of the current records.
    pub fn records(&self) -> Records {
        self.lock().records.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryStoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check(&self, op: FailOn) -> StoreResult<MutexGuard<'_, MemoryStoreInner>> {
        let inner = self.lock();
        if inner.fail_on == Some(op) {
            return Err(StoreError::Unavailable(format!("injected failure on {op:?}")));
        }
        Ok(inner)
    }
}

impl LibraryStore for MemoryStore {
    fn find_by_id(&self, id: &LibraryId) -> StoreResult<Option<Library>> {
        Ok(self.check(FailOn::FindById)?.records.library(id).cloned())
    }

    fn save(&self, library: &Library) -> StoreResult<Library> {
        let mut inner = self.check(FailOn::Save)?;
        inner.records.save_library(library)?;
        inner.operations.push(StoreOperation::Save(library.id));
        Ok(library.clone())
    }

    fn insert(&self, library: &Library) -> StoreResult<Library> {
        let mut inner = self.check(FailOn::Insert)?;
        inner.records.insert_library(library)?;
        inner.operations.push(StoreOperation::Insert(library.id));
        Ok(library.clone())
    }

    fn insert_with_set(&self, set: &LibrarySet, library: &Library) -> StoreResult<Library> {
        let mut inner = self.check(FailOn::InsertSet)?;
        if inner.fail_on == Some(FailOn::Insert) {
            return Err(StoreError::Unavailable("injected failure on Insert".into()));
        }
        inner.records.insert_set_with_library(set, library)?;
        inner.operations.push(StoreOperation::InsertSet(set.id));
        inner.operations.push(StoreOperation::Insert(library.id));
        Ok(library.clone())
    }

    fn exists_by_name(&self, name: &str) -> StoreResult<bool> {
        Ok(self.check(FailOn::ExistsByName)?.records.name_taken(name))
    }

    fn exists_draft_in_set(&self, set_id: &SetId) -> StoreResult<bool> {
        Ok(self.check(FailOn::ExistsDraftInSet)?.records.has_draft(set_id))
    }

    fn max_released_version(
        &self,
        set_id: &SetId,
        major: Option<u32>,
    ) -> StoreResult<Option<Version>> {
        Ok(self
            .check(FailOn::MaxReleasedVersion)?
            .records
            .max_released(set_id, major))
    }

    fn find_in_set(&self, set_id: &SetId) -> StoreResult<Vec<Library>> {
        Ok(self.check(FailOn::FindInSet)?.records.in_set(set_id))
    }

    fn find_set(&self, id: &SetId) -> StoreResult<Option<LibrarySet>> {
        Ok(self.check(FailOn::FindSet)?.records.set(id).cloned())
    }

    fn insert_set(&self, set: &LibrarySet) -> StoreResult<LibrarySet> {
        let mut inner = self.check(FailOn::InsertSet)?;
        inner.records.insert_set(set)?;
        inner.operations.push(StoreOperation::InsertSet(set.id));
        Ok(set.clone())
    }

    fn save_set(&self, set: &LibrarySet) -> StoreResult<LibrarySet> {
        let mut inner = self.check(FailOn::SaveSet)?;
        inner.records.save_set(set)?;
        inner.operations.push(StoreOperation::SaveSet(set.id));
        Ok(set.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::UserId;
    use chrono::Utc;

    fn draft(set_id: SetId) -> Library {
        Library::new_draft(set_id, "core", "fhir", "src", &UserId::new("alice"), Utc::now())
    }

    #[test]
    fn clones_share_state() {
        let store = MemoryStore::new();
        let handle = store.clone();
        let lib = draft(SetId::new());
        store.insert(&lib).unwrap();
        assert_eq!(handle.find_by_id(&lib.id).unwrap(), Some(lib));
    }

    #[test]
    fn failed_writes_are_not_recorded() {
        let store = MemoryStore::new();
        let set_id = SetId::new();
        store.insert(&draft(set_id)).unwrap();
        assert!(matches!(
            store.insert(&draft(set_id)),
            Err(StoreError::DraftExists(_))
        ));
        assert_eq!(store.write_count(), 1);
    }

    #[test]
    fn failed_set_insert_leaves_no_records() {
        let store = MemoryStore::new().fail_on(FailOn::Insert);
        let set = LibrarySet::new(UserId::new("alice"));
        let lib = draft(set.id);

        assert!(matches!(
            store.insert_with_set(&set, &lib),
            Err(StoreError::Unavailable(_))
        ));
        assert_eq!(store.records(), Records::default());
        assert_eq!(store.write_count(), 0);
    }

    #[test]
    fn fail_on_injects_unavailable() {
        let store = MemoryStore::new().fail_on(FailOn::MaxReleasedVersion);
        let err = store.max_released_version(&SetId::new(), None).unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));

        store.clear_fail_on();
        assert_eq!(store.max_released_version(&SetId::new(), None).unwrap(), None);
    }

    #[test]
    fn set_writes_are_recorded() {
        let store = MemoryStore::new();
        let mut set = LibrarySet::new(UserId::new("alice"));
        store.insert_set(&set).unwrap();
        set.grant(&UserId::new("bob"), crate::library::Role::Write);
        store.save_set(&set).unwrap();

        assert_eq!(
            store.writes(),
            vec![StoreOperation::InsertSet(set.id), StoreOperation::SaveSet(set.id)]
        );
        assert_eq!(store.find_set(&set.id).unwrap(), Some(set));
    }
}
