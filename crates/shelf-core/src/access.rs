//! Access control for library mutation.
//!
//! Two gates exist and are deliberately kept apart:
//!
//! - **Creator gate** ([`is_creator`]): release and draft transitions are
//!   restricted to the user who created the library record.
//! - **Mutation gate** ([`AccessPolicy::can_mutate`]): direct field edits are
//!   allowed for the set owner and for anyone holding a write-capable role in
//!   the set's ACL.

use std::fmt;

use serde::Serialize;

use crate::config::AccessConfig;
use crate::library::{Library, LibrarySet, Role, UserId};

/// Ways a user can hold mutation rights on a library set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// The user owns the set.
    Owner,
    /// The set's ACL grants the user a write-capable role.
    SharedWrite,
}

impl Capability {
    /// Every capability, in evaluation order.
    pub const ALL: [Self; 2] = [Self::Owner, Self::SharedWrite];

    /// Whether this capability applies to `user` on `set`.
    pub fn applies(self, set: &LibrarySet, user: &UserId, policy: &AccessPolicy) -> bool {
        match self {
            Self::Owner => &set.owner == user,
            Self::SharedWrite => set
                .roles_for(user)
                .iter()
                .any(|role| policy.write_roles.contains(role)),
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Owner => write!(f, "owner"),
            Self::SharedWrite => write!(f, "shared-write"),
        }
    }
}

/// Which ACL roles count as write access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPolicy {
    write_roles: Vec<Role>,
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self {
            write_roles: vec![Role::Write, Role::Admin],
        }
    }
}

impl AccessPolicy {
    /// Policy with an explicit set of write-capable roles.
    pub fn new(write_roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            write_roles: write_roles.into_iter().collect(),
        }
    }

    /// Policy from the `[access]` config section, falling back to defaults.
    pub fn from_config(config: Option<&AccessConfig>) -> Self {
        config
            .and_then(|access| access.write_roles.clone())
            .map_or_else(Self::default, Self::new)
    }

    /// The write-capable roles.
    pub fn write_roles(&self) -> &[Role] {
        &self.write_roles
    }

    /// All capabilities `user` holds on `set`.
    pub fn capabilities(&self, set: &LibrarySet, user: &UserId) -> Vec<Capability> {
        Capability::ALL
            .into_iter()
            .filter(|capability| capability.applies(set, user, self))
            .collect()
    }

    /// Whether `user` may edit libraries in `set`.
    pub fn can_mutate(&self, set: &LibrarySet, user: &UserId) -> bool {
        Capability::ALL
            .into_iter()
            .any(|capability| capability.applies(set, user, self))
    }
}

/// Whether `user` created this library record.
pub fn is_creator(library: &Library, user: &UserId) -> bool {
    &library.created_by == user
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::SetId;

    fn set_with(user: &str, role: Role) -> LibrarySet {
        let mut set = LibrarySet::new(UserId::new("owner"));
        set.grant(&UserId::new(user), role);
        set
    }

    #[test]
    fn owner_can_mutate() {
        let set = LibrarySet::new(UserId::new("owner"));
        let policy = AccessPolicy::default();
        assert!(policy.can_mutate(&set, &UserId::new("owner")));
        assert_eq!(
            policy.capabilities(&set, &UserId::new("owner")),
            vec![Capability::Owner]
        );
    }

    #[test]
    fn write_role_can_mutate() {
        let set = set_with("bob", Role::Write);
        assert!(AccessPolicy::default().can_mutate(&set, &UserId::new("bob")));
    }

    #[test]
    fn read_role_cannot_mutate() {
        let set = set_with("bob", Role::Read);
        let policy = AccessPolicy::default();
        assert!(!policy.can_mutate(&set, &UserId::new("bob")));
        assert!(policy.capabilities(&set, &UserId::new("bob")).is_empty());
    }

    #[test]
    fn stranger_cannot_mutate() {
        let set = set_with("bob", Role::Admin);
        assert!(!AccessPolicy::default().can_mutate(&set, &UserId::new("mallory")));
    }

    #[test]
    fn custom_policy_narrows_write_roles() {
        let set = set_with("bob", Role::Write);
        let policy = AccessPolicy::new([Role::Admin]);
        assert!(!policy.can_mutate(&set, &UserId::new("bob")));
    }

    #[test]
    fn from_config_uses_configured_roles() {
        let config = AccessConfig {
            write_roles: Some(vec![Role::Read]),
        };
        let policy = AccessPolicy::from_config(Some(&config));
        assert_eq!(policy.write_roles(), &[Role::Read]);
        assert_eq!(AccessPolicy::from_config(None), AccessPolicy::default());
    }

    #[test]
    fn creator_gate_ignores_acl() {
        let owner = UserId::new("owner");
        let lib = Library::new_draft(SetId::new(), "lib", "m", "s", &owner, chrono::Utc::now());
        assert!(is_creator(&lib, &owner));
        assert!(!is_creator(&lib, &UserId::new("bob")));
    }
}
