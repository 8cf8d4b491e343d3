//! Sharing library sets with other users.

use tracing::{debug, info, instrument};

use super::{LifecycleError, LifecycleResult, LifecycleService, SetGuard};
use crate::audit::AuditKind;
use crate::library::{LibrarySet, Role, SetId, UserId};

impl LifecycleService {
    /// Grant `role` on a set to `grantee`. Only the set owner may share.
    ///
    /// Granting a role the grantee already holds changes nothing.
    #[instrument(skip(self), fields(%set_id, %grantee, %role, %user))]
    pub fn grant_access(
        &self,
        set_id: &SetId,
        grantee: &UserId,
        role: Role,
        user: &UserId,
    ) -> LifecycleResult<LibrarySet> {
        let (mut set, _guard) = self.load_set_for_sharing(set_id, grantee, user)?;

        if !set.grant(grantee, role) {
            debug!("role already granted");
            return Ok(set);
        }

        let saved = self.store.save_set(&set)?;
        info!("access granted");
        self.record_audit(set_id, AuditKind::Updated, user);
        Ok(saved)
    }

    /// Remove every role `grantee` holds on a set. Only the set owner may do this.
    #[instrument(skip(self), fields(%set_id, %grantee, %user))]
    pub fn revoke_access(
        &self,
        set_id: &SetId,
        grantee: &UserId,
        user: &UserId,
    ) -> LifecycleResult<LibrarySet> {
        let (mut set, _guard) = self.load_set_for_sharing(set_id, grantee, user)?;

        if !set.revoke(grantee) {
            debug!("grantee had no access");
            return Ok(set);
        }

        let saved = self.store.save_set(&set)?;
        info!("access revoked");
        self.record_audit(set_id, AuditKind::Updated, user);
        Ok(saved)
    }

    fn load_set_for_sharing(
        &self,
        set_id: &SetId,
        grantee: &UserId,
        user: &UserId,
    ) -> LifecycleResult<(LibrarySet, SetGuard)> {
        self.load_set(set_id)?;
        let guard = self.locks.lock(*set_id);
        let set = self.load_set(set_id)?;

        if &set.owner != user {
            return Err(LifecycleError::PermissionDenied(format!(
                "only {} can change sharing on library set {set_id}",
                set.owner
            )));
        }
        if &set.owner == grantee {
            return Err(LifecycleError::InvalidState(format!(
                "{grantee} owns library set {set_id}"
            )));
        }
        Ok((set, guard))
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{Harness, user};
    use super::*;
    use crate::store::StoreOperation;

    #[test]
    fn owner_grants_and_revokes() {
        let h = Harness::new();
        let set = h.seed_set("alice");

        let shared = h
            .service
            .grant_access(&set.id, &user("bob"), Role::Write, &user("alice"))
            .unwrap();
        assert_eq!(shared.roles_for(&user("bob")), &[Role::Write]);

        let merged = h
            .service
            .grant_access(&set.id, &user("bob"), Role::Read, &user("alice"))
            .unwrap();
        assert_eq!(merged.roles_for(&user("bob")), &[Role::Read, Role::Write]);

        let revoked = h
            .service
            .revoke_access(&set.id, &user("bob"), &user("alice"))
            .unwrap();
        assert!(revoked.acl.is_empty());

        assert_eq!(
            h.store.writes(),
            vec![
                StoreOperation::SaveSet(set.id),
                StoreOperation::SaveSet(set.id),
                StoreOperation::SaveSet(set.id),
            ]
        );
        assert_eq!(h.audit.kinds(), vec![AuditKind::Updated; 3]);
    }

    #[test]
    fn repeated_grant_is_a_no_op() {
        let h = Harness::new();
        let set = h.seed_set("alice");
        h.service
            .grant_access(&set.id, &user("bob"), Role::Admin, &user("alice"))
            .unwrap();
        h.service
            .grant_access(&set.id, &user("bob"), Role::Admin, &user("alice"))
            .unwrap();
        h.service
            .revoke_access(&set.id, &user("nobody"), &user("alice"))
            .unwrap();

        assert_eq!(h.store.write_count(), 1);
        assert_eq!(h.audit.records().len(), 1);
    }

    #[test]
    fn only_owner_can_share() {
        let h = Harness::new();
        let set = h.seed_set("alice");
        h.service
            .grant_access(&set.id, &user("bob"), Role::Admin, &user("alice"))
            .unwrap();
        h.store.clear_writes();

        // Even an admin grantee cannot re-share
        let err = h
            .service
            .grant_access(&set.id, &user("carol"), Role::Read, &user("bob"))
            .unwrap_err();
        assert!(matches!(err, LifecycleError::PermissionDenied(_)));
        assert_eq!(h.store.write_count(), 0);
    }

    #[test]
    fn owner_cannot_be_targeted() {
        let h = Harness::new();
        let set = h.seed_set("alice");
        let err = h
            .service
            .revoke_access(&set.id, &user("alice"), &user("alice"))
            .unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidState(_)));
    }

    #[test]
    fn unknown_set_is_not_found() {
        let h = Harness::new();
        let err = h
            .service
            .grant_access(&SetId::new(), &user("bob"), Role::Read, &user("alice"))
            .unwrap_err();
        assert_eq!(err.code(), "not_found");
    }
}
