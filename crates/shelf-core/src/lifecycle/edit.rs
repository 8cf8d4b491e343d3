//! Creating libraries and editing drafts.

use chrono::Utc;
use tracing::{debug, info, instrument};

use super::{LifecycleError, LifecycleResult, LifecycleService};
use crate::audit::AuditKind;
use crate::library::{Library, LibraryId, LibrarySet, UserId};

/// Field changes for [`LifecycleService::update_draft`].
///
/// `None` leaves a field as it is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LibraryEdit {
    /// New library name.
    pub name: Option<String>,
    /// New source text.
    pub source: Option<String>,
}

impl LibraryEdit {
    /// An edit that renames the library.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// An edit that replaces the source.
    #[must_use]
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl LifecycleService {
    /// Create a library in a new set owned by `user`, as a draft at `0.0.000`.
    ///
    /// The set and the library are persisted in one store write. The name
    /// guard runs first; the store repeats the check inside that write, so
    /// of two concurrent creates with the same name only one succeeds.
    #[instrument(skip(self, source), fields(%user))]
    pub fn create_library(
        &self,
        name: &str,
        model: &str,
        source: &str,
        user: &UserId,
    ) -> LifecycleResult<Library> {
        self.check_unique_name(name)?;

        let set = LibrarySet::new(user.clone());
        let library = Library::new_draft(set.id, name, model, source, user, Utc::now());
        let library = self.store.insert_with_set(&set, &library)?;

        info!(id = %library.id, set_id = %set.id, "library created");
        self.record_audit(&set.id, AuditKind::Created, user);
        Ok(library)
    }

    /// Edit a draft's name or source.
    ///
    /// Allowed for the set owner and for users holding a write role in the
    /// set's ACL. A changed source is run through the translator and the
    /// outcome is recorded in `has_compile_errors`; a draft with compile
    /// errors can still be saved but not released. An edit that changes
    /// nothing writes nothing.
    #[instrument(skip(self, edit, auth_token), fields(%id, %user))]
    pub fn update_draft(
        &self,
        id: &LibraryId,
        edit: &LibraryEdit,
        user: &UserId,
        auth_token: Option<&str>,
    ) -> LifecycleResult<Library> {
        let (mut library, _guard) = self.load_locked(id)?;
        let set = self.load_set(&library.set_id)?;

        if !self.policy.can_mutate(&set, user) {
            return Err(LifecycleError::PermissionDenied(format!(
                "{user} has no write access to library set {}",
                set.id
            )));
        }
        if library.is_released() {
            return Err(LifecycleError::InvalidState(format!(
                "library {id} is released as {} and cannot be edited",
                library.version
            )));
        }

        let rename = edit.name.as_ref().filter(|name| **name != library.name);
        let new_source = edit.source.as_ref().filter(|source| **source != library.source);

        if rename.is_none() && new_source.is_none() {
            debug!("edit changes nothing");
            return Ok(library);
        }
        if let Some(name) = rename {
            self.check_unique_name(name)?;
        }
        if let Some(source) = new_source {
            let result = self.translator.translate(source, &library.model, auth_token)?;
            library.has_compile_errors = result.has_errors()?;
            library.source.clone_from(source);
            debug!(has_compile_errors = library.has_compile_errors, "source translated");
        }
        if let Some(name) = rename {
            library.name.clone_from(name);
        }

        let saved = self.store.save(&library.touched(user, Utc::now()))?;
        info!(compile_errors = saved.has_compile_errors, "draft updated");
        self.record_audit(&saved.set_id, AuditKind::Updated, user);
        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::super::testing::{Harness, user};
    use super::*;
    use crate::library::Role;
    use crate::store::{FailOn, LibraryStore, MemoryStore, StoreOperation};
    use crate::translator::ScriptedTranslator;
    use crate::version::Version;

    #[test]
    fn create_library_makes_owned_set_and_draft() {
        let h = Harness::new();
        let alice = user("alice");

        let lib = h
            .service
            .create_library("Common", "fhir-4.0.1", "define X: 1", &alice)
            .unwrap();

        assert!(lib.draft);
        assert_eq!(lib.version, Version::ZERO);
        assert_eq!(lib.created_by, alice);
        let set = h.service.library_set(&lib.set_id).unwrap();
        assert_eq!(set.owner, alice);
        assert!(set.acl.is_empty());
        assert_eq!(
            h.store.writes(),
            vec![StoreOperation::InsertSet(set.id), StoreOperation::Insert(lib.id)]
        );
        assert_eq!(h.audit.kinds(), vec![AuditKind::Created]);
    }

    #[test]
    fn create_library_rejects_duplicate_name() {
        let h = Harness::new();
        h.service
            .create_library("Common", "fhir", "x", &user("alice"))
            .unwrap();
        h.store.clear_writes();

        let err = h
            .service
            .create_library("common", "fhir", "y", &user("bob"))
            .unwrap_err();
        assert!(matches!(err, LifecycleError::DuplicateName(_)));
        assert_eq!(h.store.write_count(), 0);
    }

    #[test]
    fn failed_create_leaves_no_empty_set() {
        let h = Harness::with_store(MemoryStore::new().fail_on(FailOn::Insert));

        let err = h
            .service
            .create_library("Common", "fhir", "x", &user("alice"))
            .unwrap_err();
        assert!(matches!(err, LifecycleError::Store(_)));
        assert!(h.store.records().sets.is_empty());
        assert!(h.audit.kinds().is_empty());
    }

    #[test]
    fn concurrent_creates_with_same_name_yield_one() {
        let h = Arc::new(Harness::new());

        let results: Vec<_> = std::thread::scope(|scope| {
            let handles: Vec<_> = ["Common", "common", "COMMON", "CoMmOn"]
                .into_iter()
                .map(|name| {
                    let h = Arc::clone(&h);
                    scope.spawn(move || h.service.create_library(name, "fhir", "x", &user("alice")))
                })
                .collect();
            handles.into_iter().map(|handle| handle.join().unwrap()).collect()
        });

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(
            results
                .iter()
                .filter_map(|r| r.as_ref().err())
                .all(|e| matches!(e, LifecycleError::DuplicateName(_)))
        );
        let records = h.store.records();
        assert_eq!(records.sets.len(), 1);
        assert_eq!(records.libraries.len(), 1);
    }

    #[test]
    fn shared_writer_can_edit_source() {
        let h = Harness::with_translator(ScriptedTranslator::new().then_errors(["oops"]));
        let mut set = h.seed_set("alice");
        set.grant(&user("bob"), Role::Write);
        h.store.save_set(&set).unwrap();
        h.store.clear_writes();
        let draft = h.seed(&set, "core", Version::ZERO, true, "alice");

        let edit = LibraryEdit::default().source("define Broken: ");
        let saved = h
            .service
            .update_draft(&draft.id, &edit, &user("bob"), Some("tok"))
            .unwrap();

        assert_eq!(saved.source, "define Broken: ");
        assert!(saved.has_compile_errors);
        assert_eq!(saved.last_modified_by, user("bob"));
        assert_eq!(saved.created_by, user("alice"));
        assert_eq!(h.store.writes(), vec![StoreOperation::Save(draft.id)]);
        assert_eq!(h.audit.kinds(), vec![AuditKind::Updated]);
        assert_eq!(h.translator.calls()[0].model, "fhir-4.0.1");
    }

    #[test]
    fn fixing_source_clears_error_flag() {
        let h = Harness::new();
        let set = h.seed_set("alice");
        let mut draft = h.seed(&set, "core", Version::ZERO, true, "alice");
        draft.has_compile_errors = true;
        h.store.save(&draft).unwrap();
        h.store.clear_writes();

        let saved = h
            .service
            .update_draft(&draft.id, &LibraryEdit::default().source("define X: 2"), &user("alice"), None)
            .unwrap();
        assert!(!saved.has_compile_errors);
    }

    #[test]
    fn read_only_user_is_denied() {
        let h = Harness::new();
        let mut set = h.seed_set("alice");
        set.grant(&user("carol"), Role::Read);
        h.store.save_set(&set).unwrap();
        h.store.clear_writes();
        let draft = h.seed(&set, "core", Version::ZERO, true, "alice");

        let err = h
            .service
            .update_draft(&draft.id, &LibraryEdit::default().name("renamed"), &user("carol"), None)
            .unwrap_err();
        assert!(matches!(err, LifecycleError::PermissionDenied(_)));
        assert_eq!(h.store.write_count(), 0);
    }

    #[test]
    fn released_library_cannot_be_edited() {
        let h = Harness::new();
        let set = h.seed_set("alice");
        let release = h.seed(&set, "core", Version::new(1, 0, 0), false, "alice");

        let err = h
            .service
            .update_draft(&release.id, &LibraryEdit::default().name("x"), &user("alice"), None)
            .unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidState(_)));
    }

    #[test]
    fn rename_runs_name_guard() {
        let h = Harness::new();
        let set = h.seed_set("alice");
        let draft = h.seed(&set, "core", Version::ZERO, true, "alice");
        h.seed(&h.seed_set("zed"), "Taken", Version::ZERO, true, "zed");

        let err = h
            .service
            .update_draft(&draft.id, &LibraryEdit::default().name("taken"), &user("alice"), None)
            .unwrap_err();
        assert!(matches!(err, LifecycleError::DuplicateName(_)));

        let renamed = h
            .service
            .update_draft(&draft.id, &LibraryEdit::default().name("core-v2"), &user("alice"), None)
            .unwrap();
        assert_eq!(renamed.name, "core-v2");
        assert_eq!(h.translator.call_count(), 0);
    }

    #[test]
    fn unchanged_edit_writes_nothing() {
        let h = Harness::new();
        let set = h.seed_set("alice");
        let draft = h.seed(&set, "core", Version::ZERO, true, "alice");

        let edit = LibraryEdit::default().name("core").source(draft.source.clone());
        let same = h
            .service
            .update_draft(&draft.id, &edit, &user("alice"), None)
            .unwrap();
        assert_eq!(same, draft);
        assert_eq!(h.store.write_count(), 0);
        assert!(h.audit.records().is_empty());
    }

    #[test]
    fn translator_outage_aborts_edit() {
        let h = Harness::with_translator(ScriptedTranslator::new().then_unreachable("refused"));
        let set = h.seed_set("alice");
        let draft = h.seed(&set, "core", Version::ZERO, true, "alice");

        let err = h
            .service
            .update_draft(
                &draft.id,
                &LibraryEdit::default().name("renamed").source("new"),
                &user("alice"),
                None,
            )
            .unwrap_err();
        assert!(matches!(err, LifecycleError::TranslatorTransportError(_)));
        assert_eq!(h.service.library(&draft.id).unwrap(), draft);
        assert_eq!(h.store.write_count(), 0);
    }
}
