//! Releasing drafts and computing version numbers.

use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use super::{LifecycleError, LifecycleResult, LifecycleService};
use crate::access::is_creator;
use crate::audit::AuditKind;
use crate::library::{Library, LibraryId, UserId};
use crate::version::{ReleaseKind, Version};

const NEXT_VERSION_FAILED: &str = "unable to compute next version";

impl LifecycleService {
    /// Release a draft in place under the next `kind` version.
    ///
    /// Checks, in order: the library exists, `user` created it, it is a
    /// draft, it has content and no recorded compile errors, and the
    /// translator accepts its source. Nothing is written unless all pass.
    /// On success the library is saved once and one
    /// `VERSIONED_MAJOR`/`VERSIONED_MINOR` audit record is emitted.
    #[instrument(skip(self, auth_token), fields(%id, %kind, %user))]
    pub fn create_version(
        &self,
        id: &LibraryId,
        kind: ReleaseKind,
        user: &UserId,
        auth_token: Option<&str>,
    ) -> LifecycleResult<Library> {
        let (library, _guard) = self.load_locked(id)?;

        if !is_creator(&library, user) {
            return Err(LifecycleError::PermissionDenied(format!(
                "only {} can release library {id}",
                library.created_by
            )));
        }
        if library.is_released() {
            return Err(LifecycleError::InvalidState(format!(
                "library {id} is already released as {}",
                library.version
            )));
        }
        if !library.has_content() {
            return Err(LifecycleError::ResourceCannotBeVersioned(
                "library source is empty".into(),
            ));
        }
        if library.has_compile_errors {
            return Err(LifecycleError::ResourceCannotBeVersioned(
                "library source has unresolved compile errors".into(),
            ));
        }

        let result = self
            .translator
            .translate(&library.source, &library.model, auth_token)?;
        if result.has_errors()? {
            let messages = result.error_messages()?;
            debug!(count = messages.len(), "translator rejected source");
            return Err(LifecycleError::CompileError { id: *id, messages });
        }

        let next = self.compute_next_version(&library, kind)?;
        let previous = library.version;
        let set_id = library.set_id;
        let released = self
            .store
            .save(&library.release(next, user, Utc::now()))?;

        info!(%previous, version = %next, "library released");
        self.record_audit(&set_id, AuditKind::from(kind), user);
        Ok(released)
    }

    /// The version `create_version` would assign right now. Performs no writes.
    #[instrument(skip(self), fields(%id, %kind))]
    pub fn next_version(&self, id: &LibraryId, kind: ReleaseKind) -> LifecycleResult<Version> {
        let library = self.load(id)?;
        self.compute_next_version(&library, kind)
    }

    /// Major bumps from the highest release in the set; minor bumps from the
    /// highest release sharing the library's major. Either falls back to the
    /// library's own version when the set has no matching release.
    fn compute_next_version(&self, library: &Library, kind: ReleaseKind) -> LifecycleResult<Version> {
        let major_filter = match kind {
            ReleaseKind::Major => None,
            ReleaseKind::Minor => Some(library.version.major),
        };

        let max = self
            .store
            .max_released_version(&library.set_id, major_filter)
            .map_err(|e| {
                warn!(set_id = %library.set_id, error = %e, "version lookup failed");
                LifecycleError::InternalError(NEXT_VERSION_FAILED.into())
            })?;
        let baseline = max.unwrap_or(library.version);
        debug!(%baseline, from_store = max.is_some(), "next version baseline");

        let next = match kind {
            ReleaseKind::Major => baseline.bump(ReleaseKind::Major),
            ReleaseKind::Minor => {
                Version::new(library.version.major, baseline.minor, 0).bump(ReleaseKind::Minor)
            }
        };
        next.ok_or_else(|| {
            warn!(%baseline, %kind, "version component overflow");
            LifecycleError::InternalError(NEXT_VERSION_FAILED.into())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{Harness, user};
    use super::*;
    use crate::audit::{AuditKind, MemoryAuditLog};
    use crate::store::{FailOn, LibraryStore, MemoryStore, StoreOperation};
    use crate::translator::ScriptedTranslator;

    #[test]
    fn first_major_release_is_one_zero_zero() {
        let h = Harness::new();
        let set = h.seed_set("alice");
        let draft = h.seed(&set, "core", Version::ZERO, true, "alice");

        let released = h
            .service
            .create_version(&draft.id, ReleaseKind::Major, &user("alice"), Some("tok"))
            .unwrap();

        assert_eq!(released.id, draft.id);
        assert!(released.is_released());
        assert_eq!(released.version, Version::new(1, 0, 0));
        assert_eq!(released.version.to_string(), "1.0.000");
        assert_eq!(h.store.writes(), vec![StoreOperation::Save(draft.id)]);
        assert_eq!(h.audit.kinds(), vec![AuditKind::VersionedMajor]);
        assert_eq!(h.audit.records()[0].target_id, set.id);
        assert_eq!(h.translator.calls()[0].auth_token.as_deref(), Some("tok"));
    }

    #[test]
    fn minor_release_follows_highest_in_major() {
        let h = Harness::new();
        let set = h.seed_set("alice");
        h.seed(&set, "v1.0", Version::new(1, 0, 0), false, "alice");
        h.seed(&set, "v1.3", Version::new(1, 3, 0), false, "alice");
        let draft = h.seed(&set, "next", Version::new(1, 0, 0), true, "alice");

        let released = h
            .service
            .create_version(&draft.id, ReleaseKind::Minor, &user("alice"), None)
            .unwrap();

        assert_eq!(released.version, Version::new(1, 4, 0));
        assert_eq!(h.audit.kinds(), vec![AuditKind::VersionedMinor]);
    }

    #[test]
    fn major_release_follows_highest_in_set() {
        let h = Harness::new();
        let set = h.seed_set("alice");
        h.seed(&set, "v2", Version::new(2, 1, 0), false, "alice");
        let draft = h.seed(&set, "next", Version::new(1, 0, 0), true, "alice");

        let next = h.service.next_version(&draft.id, ReleaseKind::Major).unwrap();
        assert_eq!(next, Version::new(3, 0, 0));
    }

    #[test]
    fn minor_without_releases_uses_own_version() {
        let h = Harness::new();
        let set = h.seed_set("alice");
        let draft = h.seed(&set, "core", Version::ZERO, true, "alice");

        let next = h.service.next_version(&draft.id, ReleaseKind::Minor).unwrap();
        assert_eq!(next, Version::new(0, 1, 0));
    }

    #[test]
    fn next_version_is_read_only() {
        let h = Harness::new();
        let set = h.seed_set("alice");
        h.seed(&set, "v1", Version::new(1, 0, 0), false, "alice");
        let draft = h.seed(&set, "next", Version::new(1, 0, 0), true, "alice");

        let first = h.service.next_version(&draft.id, ReleaseKind::Minor).unwrap();
        let second = h.service.next_version(&draft.id, ReleaseKind::Minor).unwrap();

        assert_eq!(first, second);
        assert_eq!(h.store.write_count(), 0);
        assert!(h.audit.records().is_empty());
        assert_eq!(h.translator.call_count(), 0);
    }

    #[test]
    fn released_library_is_invalid_state() {
        let h = Harness::new();
        let set = h.seed_set("alice");
        let release = h.seed(&set, "v1", Version::new(1, 0, 0), false, "alice");

        for kind in [ReleaseKind::Major, ReleaseKind::Minor] {
            let err = h
                .service
                .create_version(&release.id, kind, &user("alice"), None)
                .unwrap_err();
            assert!(matches!(err, LifecycleError::InvalidState(_)));
        }
        assert_eq!(h.store.write_count(), 0);
        assert_eq!(h.translator.call_count(), 0);
    }

    #[test]
    fn non_creator_is_denied_even_with_acl() {
        let h = Harness::new();
        let mut set = h.seed_set("alice");
        set.grant(&user("bob"), crate::library::Role::Admin);
        h.store.save_set(&set).unwrap();
        h.store.clear_writes();
        let draft = h.seed(&set, "core", Version::ZERO, true, "alice");

        let err = h
            .service
            .create_version(&draft.id, ReleaseKind::Major, &user("bob"), None)
            .unwrap_err();

        assert!(matches!(err, LifecycleError::PermissionDenied(_)));
        assert_eq!(h.store.write_count(), 0);
        assert!(h.audit.records().is_empty());
    }

    #[test]
    fn missing_library_is_not_found() {
        let h = Harness::new();
        let err = h
            .service
            .create_version(&LibraryId::new(), ReleaseKind::Major, &user("alice"), None)
            .unwrap_err();
        assert_eq!(err.code(), "not_found");
    }

    #[test]
    fn blank_source_cannot_be_versioned() {
        let h = Harness::new();
        let set = h.seed_set("alice");
        let mut draft = h.seed(&set, "core", Version::ZERO, true, "alice");
        draft.source = "  \n ".into();
        h.store.save(&draft).unwrap();
        h.store.clear_writes();

        let err = h
            .service
            .create_version(&draft.id, ReleaseKind::Major, &user("alice"), None)
            .unwrap_err();
        assert!(matches!(err, LifecycleError::ResourceCannotBeVersioned(_)));
        assert_eq!(h.translator.call_count(), 0);
    }

    #[test]
    fn recorded_compile_errors_block_release() {
        let h = Harness::new();
        let set = h.seed_set("alice");
        let mut draft = h.seed(&set, "core", Version::ZERO, true, "alice");
        draft.has_compile_errors = true;
        h.store.save(&draft).unwrap();
        h.store.clear_writes();

        let err = h
            .service
            .create_version(&draft.id, ReleaseKind::Major, &user("alice"), None)
            .unwrap_err();
        assert!(matches!(err, LifecycleError::ResourceCannotBeVersioned(_)));
    }

    #[test]
    fn compile_errors_leave_draft_untouched() {
        let h = Harness::with_translator(
            ScriptedTranslator::new().then_errors(["Could not resolve identifier Foo"]),
        );
        let set = h.seed_set("alice");
        let draft = h.seed(&set, "core", Version::ZERO, true, "alice");

        let err = h
            .service
            .create_version(&draft.id, ReleaseKind::Major, &user("alice"), None)
            .unwrap_err();

        match err {
            LifecycleError::CompileError { id, messages } => {
                assert_eq!(id, draft.id);
                assert_eq!(messages, vec!["Could not resolve identifier Foo"]);
            }
            other => panic!("expected CompileError, got {other:?}"),
        }
        let refetched = h.service.library(&draft.id).unwrap();
        assert!(refetched.draft);
        assert_eq!(refetched.version, Version::ZERO);
        assert_eq!(h.store.write_count(), 0);
        assert!(h.audit.records().is_empty());
    }

    #[test]
    fn malformed_translator_output_is_transport_error() {
        let h = Harness::with_translator(ScriptedTranslator::new().then_malformed("not json"));
        let set = h.seed_set("alice");
        let draft = h.seed(&set, "core", Version::ZERO, true, "alice");

        let err = h
            .service
            .create_version(&draft.id, ReleaseKind::Minor, &user("alice"), None)
            .unwrap_err();
        assert!(matches!(err, LifecycleError::TranslatorTransportError(_)));
        assert_eq!(h.store.write_count(), 0);
    }

    #[test]
    fn store_failure_during_lookup_is_masked() {
        let store = MemoryStore::new();
        let h = Harness::with_store(store.clone());
        let set = h.seed_set("alice");
        let draft = h.seed(&set, "core", Version::ZERO, true, "alice");
        let _ = store.fail_on(FailOn::MaxReleasedVersion);

        let err = h
            .service
            .create_version(&draft.id, ReleaseKind::Major, &user("alice"), None)
            .unwrap_err();

        match err {
            LifecycleError::InternalError(message) => {
                assert_eq!(message, "unable to compute next version");
            }
            other => panic!("expected InternalError, got {other:?}"),
        }
        assert_eq!(h.store.write_count(), 0);
    }

    #[test]
    fn taken_version_surfaces_as_conflict() {
        let h = Harness::new();
        let set = h.seed_set("alice");
        h.seed(&set, "v1", Version::new(1, 0, 0), false, "alice");
        h.seed(&set, "v2", Version::new(2, 0, 0), false, "alice");
        // 1.1 is released after the draft was cut from 1.0
        let draft = h.seed(&set, "next", Version::new(1, 0, 0), true, "alice");
        h.seed(&set, "v1.1", Version::new(1, 1, 0), false, "alice");

        let next = h.service.next_version(&draft.id, ReleaseKind::Minor).unwrap();
        assert_eq!(next, Version::new(1, 2, 0));

        let clash = draft.release(Version::new(1, 1, 0), &user("alice"), Utc::now());
        let err = LifecycleError::from(h.store.save(&clash).unwrap_err());
        assert!(matches!(err, LifecycleError::VersionConflict { .. }));
    }

    #[test]
    fn audit_failure_does_not_fail_release() {
        let h = Harness::with_audit(MemoryAuditLog::failing());
        let set = h.seed_set("alice");
        let draft = h.seed(&set, "core", Version::ZERO, true, "alice");

        let released = h
            .service
            .create_version(&draft.id, ReleaseKind::Major, &user("alice"), None)
            .unwrap();
        assert!(released.is_released());
        assert_eq!(h.store.write_count(), 1);
    }

    #[test]
    fn version_never_reused_across_releases() {
        let h = Harness::new();
        let set = h.seed_set("alice");
        let first = h.seed(&set, "core", Version::ZERO, true, "alice");
        let alice = user("alice");

        let v1 = h
            .service
            .create_version(&first.id, ReleaseKind::Major, &alice, None)
            .unwrap();
        let second = h.service.create_draft(&v1.id, "core-2", "define Y: 2", &alice).unwrap();
        let v2 = h
            .service
            .create_version(&second.id, ReleaseKind::Minor, &alice, None)
            .unwrap();
        let third = h.service.create_draft(&v1.id, "core-3", "define Z: 3", &alice).unwrap();
        let v3 = h
            .service
            .create_version(&third.id, ReleaseKind::Minor, &alice, None)
            .unwrap();

        assert_eq!(v1.version, Version::new(1, 0, 0));
        assert_eq!(v2.version, Version::new(1, 1, 0));
        assert_eq!(v3.version, Version::new(1, 2, 0));
    }
}
