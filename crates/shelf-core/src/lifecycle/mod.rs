//! The library version lifecycle.
//!
//! [`LifecycleService`] owns every rule about how a library moves between its
//! mutable draft state and immutable releases:
//!
//! - [`create_version`](LifecycleService::create_version) releases a draft in
//!   place under the next major or minor version.
//! - [`create_draft`](LifecycleService::create_draft) derives a new draft from
//!   a release.
//! - [`create_library`](LifecycleService::create_library),
//!   [`update_draft`](LifecycleService::update_draft),
//!   [`grant_access`](LifecycleService::grant_access) and
//!   [`revoke_access`](LifecycleService::revoke_access) cover the rest of a
//!   set's life.
//!
//! Every operation validates all of its preconditions before it writes.
//! Mutations hold a per-set lock for their whole check-then-write sequence,
//! and the store re-checks the draft and version invariants on write.

mod draft;
mod edit;
mod locks;
mod release;
mod sharing;

pub use edit::LibraryEdit;
pub use locks::{SetGuard, SetLocks};

use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::access::{AccessPolicy, Capability};
use crate::audit::{AuditKind, AuditRecorder};
use crate::library::{Library, LibraryId, LibrarySet, SetId, UserId};
use crate::store::{LibraryStore, StoreError};
use crate::translator::{Translator, TranslatorError};
use crate::version::Version;

/// Errors surfaced by lifecycle operations.
///
/// Exactly one is returned per failed call: the first precondition that does
/// not hold.
#[derive(Error, Debug)]
pub enum LifecycleError {
    /// The library or set does not exist.
    #[error("{kind} {id} not found")]
    NotFound {
        /// "library" or "library set".
        kind: &'static str,
        /// The id that was looked up.
        id: String,
    },

    /// The acting user may not perform this operation.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The record is in the wrong state for this operation.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Another library already uses this name.
    #[error("a library named '{0}' already exists")]
    DuplicateName(String),

    /// The draft has no content or carries known compile errors.
    #[error("library cannot be versioned: {0}")]
    ResourceCannotBeVersioned(String),

    /// The set already has a draft.
    #[error("library set {0} already has a draft")]
    ResourceNotDraftable(SetId),

    /// The translator reported errors in the library source.
    #[error("library source has compile errors: {}", .messages.join("; "))]
    CompileError {
        /// The library that failed to compile.
        id: LibraryId,
        /// The reported error messages.
        messages: Vec<String>,
    },

    /// The translator could not be reached or returned garbage.
    #[error("translator failure: {0}")]
    TranslatorTransportError(#[source] TranslatorError),

    /// An internal failure whose cause is deliberately not surfaced.
    #[error("internal error: {0}")]
    InternalError(String),

    /// The store rejected a release because its major.minor is taken.
    #[error("version {version} is already released in library set {set_id}")]
    VersionConflict {
        /// The set.
        set_id: SetId,
        /// The conflicting version.
        version: Version,
    },

    /// Any other store failure.
    #[error("store error: {0}")]
    Store(#[source] StoreError),
}

impl LifecycleError {
    /// Stable machine-readable code for this error.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::PermissionDenied(_) => "permission_denied",
            Self::InvalidState(_) => "invalid_state",
            Self::DuplicateName(_) => "duplicate_name",
            Self::ResourceCannotBeVersioned(_) => "resource_cannot_be_versioned",
            Self::ResourceNotDraftable(_) => "resource_not_draftable",
            Self::CompileError { .. } => "compile_error",
            Self::TranslatorTransportError(_) => "translator_transport_error",
            Self::InternalError(_) => "internal_error",
            Self::VersionConflict { .. } => "version_conflict",
            Self::Store(_) => "store_error",
        }
    }

    fn library_not_found(id: &LibraryId) -> Self {
        Self::NotFound {
            kind: "library",
            id: id.to_string(),
        }
    }

    fn set_not_found(id: &SetId) -> Self {
        Self::NotFound {
            kind: "library set",
            id: id.to_string(),
        }
    }
}

impl From<StoreError> for LifecycleError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DraftExists(set_id) => Self::ResourceNotDraftable(set_id),
            StoreError::NameTaken(name) => Self::DuplicateName(name),
            StoreError::VersionTaken { set_id, version } => {
                Self::VersionConflict { set_id, version }
            }
            other => Self::Store(other),
        }
    }
}

impl From<TranslatorError> for LifecycleError {
    fn from(err: TranslatorError) -> Self {
        Self::TranslatorTransportError(err)
    }
}

/// Result alias for lifecycle operations.
pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// Coordinates the store, translator, audit log and access policy.
pub struct LifecycleService {
    store: Box<dyn LibraryStore>,
    translator: Box<dyn Translator>,
    audit: Box<dyn AuditRecorder>,
    policy: AccessPolicy,
    locks: SetLocks,
}

impl std::fmt::Debug for LifecycleService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleService")
            .field("policy", &self.policy)
            .field("locks", &self.locks)
            .finish_non_exhaustive()
    }
}

impl LifecycleService {
    /// Build a service over the given collaborators with the default policy.
    pub fn new(
        store: impl LibraryStore + 'static,
        translator: impl Translator + 'static,
        audit: impl AuditRecorder + 'static,
    ) -> Self {
        Self {
            store: Box::new(store),
            translator: Box::new(translator),
            audit: Box::new(audit),
            policy: AccessPolicy::default(),
            locks: SetLocks::new(),
        }
    }

    /// Replace the access policy.
    #[must_use]
    pub fn with_policy(mut self, policy: AccessPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The access policy in force.
    pub const fn policy(&self) -> &AccessPolicy {
        &self.policy
    }

    /// Look up a library.
    pub fn library(&self, id: &LibraryId) -> LifecycleResult<Library> {
        self.load(id)
    }

    /// Look up a library set.
    pub fn library_set(&self, id: &SetId) -> LifecycleResult<LibrarySet> {
        self.load_set(id)
    }

    /// Every library in a set: releases in version order, then the draft.
    pub fn libraries_in_set(&self, id: &SetId) -> LifecycleResult<Vec<Library>> {
        self.load_set(id)?;
        let mut libraries = self.store.find_in_set(id)?;
        libraries.sort_by_key(|lib| (lib.draft, lib.version));
        Ok(libraries)
    }

    /// Whether `user` may edit `id` directly.
    pub fn can_mutate(&self, id: &LibraryId, user: &UserId) -> LifecycleResult<bool> {
        let library = self.load(id)?;
        let set = self.load_set(&library.set_id)?;
        Ok(self.policy.can_mutate(&set, user))
    }

    /// Why `user` may edit libraries in `set_id`, if at all.
    pub fn capabilities(&self, set_id: &SetId, user: &UserId) -> LifecycleResult<Vec<Capability>> {
        let set = self.load_set(set_id)?;
        Ok(self.policy.capabilities(&set, user))
    }

    /// Fail with [`LifecycleError::DuplicateName`] if `name` is taken,
    /// ignoring case.
    #[instrument(skip(self))]
    pub fn check_unique_name(&self, name: &str) -> LifecycleResult<()> {
        if self.store.exists_by_name(name)? {
            debug!("name already taken");
            return Err(LifecycleError::DuplicateName(name.to_string()));
        }
        Ok(())
    }

    fn load(&self, id: &LibraryId) -> LifecycleResult<Library> {
        self.store
            .find_by_id(id)?
            .ok_or_else(|| LifecycleError::library_not_found(id))
    }

    fn load_set(&self, id: &SetId) -> LifecycleResult<LibrarySet> {
        self.store
            .find_set(id)?
            .ok_or_else(|| LifecycleError::set_not_found(id))
    }

    /// Load a library, lock its set, and load it again under the lock.
    fn load_locked(&self, id: &LibraryId) -> LifecycleResult<(Library, SetGuard)> {
        let set_id = self.load(id)?.set_id;
        let guard = self.locks.lock(set_id);
        let library = self.load(id)?;
        Ok((library, guard))
    }

    /// Audit failures never undo the transition that was just persisted.
    fn record_audit(&self, target: &SetId, kind: AuditKind, user: &UserId) {
        match self.audit.record(target, kind, user) {
            Ok(true) => debug!(%target, %kind, "audit recorded"),
            Ok(false) => warn!(%target, %kind, "audit record was not accepted"),
            Err(e) => warn!(%target, %kind, error = %e, "failed to record audit entry"),
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Shared fixtures for lifecycle tests.

    use chrono::Utc;

    use super::LifecycleService;
    use crate::audit::MemoryAuditLog;
    use crate::library::{Library, LibrarySet, UserId};
    use crate::store::{LibraryStore, MemoryStore};
    use crate::translator::ScriptedTranslator;
    use crate::version::Version;

    pub(crate) struct Harness {
        pub store: MemoryStore,
        pub translator: ScriptedTranslator,
        pub audit: MemoryAuditLog,
        pub service: LifecycleService,
    }

    impl Harness {
        pub fn new() -> Self {
            Self::build(MemoryStore::new(), ScriptedTranslator::new(), MemoryAuditLog::new())
        }

        pub fn with_translator(translator: ScriptedTranslator) -> Self {
            Self::build(MemoryStore::new(), translator, MemoryAuditLog::new())
        }

        pub fn with_store(store: MemoryStore) -> Self {
            Self::build(store, ScriptedTranslator::new(), MemoryAuditLog::new())
        }

        pub fn with_audit(audit: MemoryAuditLog) -> Self {
            Self::build(MemoryStore::new(), ScriptedTranslator::new(), audit)
        }

        fn build(store: MemoryStore, translator: ScriptedTranslator, audit: MemoryAuditLog) -> Self {
            let service = LifecycleService::new(store.clone(), translator.clone(), audit.clone());
            Self {
                store,
                translator,
                audit,
                service,
            }
        }

        /// Insert a set without recording the write.
        pub fn seed_set(&self, owner: &str) -> LibrarySet {
            let set = LibrarySet::new(UserId::new(owner));
            self.store.insert_set(&set).unwrap();
            self.store.clear_writes();
            set
        }

        /// Insert a library without recording the write.
        pub fn seed(
            &self,
            set: &LibrarySet,
            name: &str,
            version: Version,
            draft: bool,
            creator: &str,
        ) -> Library {
            let creator = UserId::new(creator);
            let mut lib = Library::new_draft(
                set.id,
                name,
                "fhir-4.0.1",
                format!("library {name}\ndefine X: 1"),
                &creator,
                Utc::now(),
            );
            lib.version = version;
            lib.draft = draft;
            self.store.insert(&lib).unwrap();
            self.store.clear_writes();
            lib
        }
    }

    pub(crate) fn user(name: &str) -> UserId {
        UserId::new(name)
    }
}
