//! Deriving new drafts from releases.

use chrono::Utc;
use tracing::{info, instrument};

use super::{LifecycleError, LifecycleResult, LifecycleService};
use crate::access::is_creator;
use crate::audit::AuditKind;
use crate::library::{Library, LibraryId, UserId};

impl LifecycleService {
    /// Start a new draft from the release `id`.
    ///
    /// The new record gets a fresh id, the given name and source, and the
    /// release's set, model and version. The release itself is not modified.
    /// Fails if the name changes to one already taken, if `user` did not
    /// create the release, or if the set already has a draft.
    #[instrument(skip(self, new_source), fields(%id, %user))]
    pub fn create_draft(
        &self,
        id: &LibraryId,
        new_name: &str,
        new_source: &str,
        user: &UserId,
    ) -> LifecycleResult<Library> {
        let (source, _guard) = self.load_locked(id)?;

        if new_name != source.name {
            self.check_unique_name(new_name)?;
        }
        if !is_creator(&source, user) {
            return Err(LifecycleError::PermissionDenied(format!(
                "only {} can draft from library {id}",
                source.created_by
            )));
        }
        if self.store.exists_draft_in_set(&source.set_id)? {
            return Err(LifecycleError::ResourceNotDraftable(source.set_id));
        }

        let draft = source.derive_draft(new_name, new_source, user, Utc::now());
        let draft = self.store.insert(&draft)?;

        info!(draft = %draft.id, version = %draft.version, "draft created");
        self.record_audit(&draft.set_id, AuditKind::Created, user);
        Ok(draft)
    }
}
