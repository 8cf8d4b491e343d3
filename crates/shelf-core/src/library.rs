//! Library records, library sets, and their identifiers.
//!
//! A [`Library`] is either the single mutable draft of its set or an
//! immutable release. Transitions between the two produce new values
//! ([`Library::release`], [`Library::derive_draft`]) rather than patching
//! fields in place, so every copy carries forward exactly the documented
//! fields and nothing else.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::version::Version;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a fresh random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// The underlying UUID.
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $name {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim()).map(Self)
            }
        }
    };
}

uuid_id! {
    /// Identifier of a single library record (draft or release).
    LibraryId
}

uuid_id! {
    /// Identifier of a library set, shared by every record in a lineage.
    SetId
}

/// An acting user.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Wrap a user name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The user name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for UserId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Role granted to a user on a library set.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// May view the set's libraries.
    Read,
    /// May edit drafts.
    Write,
    /// May edit drafts and administer the set.
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => write!(f, "read"),
            Self::Write => write!(f, "write"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

/// One access-control entry on a library set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclEntry {
    /// The user the entry applies to.
    pub user: UserId,
    /// Roles granted to that user.
    pub roles: Vec<Role>,
}

/// The ownership group for a lineage of drafts and releases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibrarySet {
    /// Set identifier.
    pub id: SetId,
    /// The user who created the set.
    pub owner: UserId,
    /// Users other than the owner with access to the set.
    #[serde(default)]
    pub acl: Vec<AclEntry>,
}

impl LibrarySet {
    /// Create a new set owned by `owner` with an empty ACL.
    pub fn new(owner: UserId) -> Self {
        Self {
            id: SetId::new(),
            owner,
            acl: Vec::new(),
        }
    }

    /// Roles granted to `user` through the ACL (not counting ownership).
    pub fn roles_for(&self, user: &UserId) -> &[Role] {
        self.acl
            .iter()
            .find(|entry| &entry.user == user)
            .map(|entry| entry.roles.as_slice())
            .unwrap_or_default()
    }

    /// Add `role` to `user`'s ACL entry. Returns `false` if it was already granted.
    pub fn grant(&mut self, user: &UserId, role: Role) -> bool {
        match self.acl.iter_mut().find(|entry| &entry.user == user) {
            Some(entry) if entry.roles.contains(&role) => false,
            Some(entry) => {
                entry.roles.push(role);
                entry.roles.sort();
                true
            }
            None => {
                self.acl.push(AclEntry {
                    user: user.clone(),
                    roles: vec![role],
                });
                true
            }
        }
    }

    /// Remove `user`'s ACL entry. Returns `false` if there was none.
    pub fn revoke(&mut self, user: &UserId) -> bool {
        let before = self.acl.len();
        self.acl.retain(|entry| &entry.user != user);
        self.acl.len() != before
    }
}

/// A versioned code artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Library {
    /// Record identifier.
    pub id: LibraryId,
    /// The set this record belongs to for its whole life.
    pub set_id: SetId,
    /// Library name (unique across the store, case-insensitively).
    pub name: String,
    /// Data model the source is written against (passed to the translator).
    pub model: String,
    /// Library source text.
    pub source: String,
    /// Whether this record is the set's mutable draft.
    pub draft: bool,
    /// Version stamp. Drafts carry the version of the release they came from.
    pub version: Version,
    /// Whether the last translation of the source reported errors.
    #[serde(default)]
    pub has_compile_errors: bool,
    /// Who created this record.
    pub created_by: UserId,
    /// When this record was created.
    pub created_at: DateTime<Utc>,
    /// Who last modified this record.
    pub last_modified_by: UserId,
    /// When this record was last modified.
    pub last_modified_at: DateTime<Utc>,
}

impl Library {
    /// Create the first draft of a new set, at version `0.0.000`.
    pub fn new_draft(
        set_id: SetId,
        name: impl Into<String>,
        model: impl Into<String>,
        source: impl Into<String>,
        user: &UserId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: LibraryId::new(),
            set_id,
            name: name.into(),
            model: model.into(),
            source: source.into(),
            draft: true,
            version: Version::ZERO,
            has_compile_errors: false,
            created_by: user.clone(),
            created_at: now,
            last_modified_by: user.clone(),
            last_modified_at: now,
        }
    }

    /// Whether this record is an immutable release.
    pub const fn is_released(&self) -> bool {
        !self.draft
    }

    /// Whether the source text has any non-whitespace content.
    pub fn has_content(&self) -> bool {
        !self.source.trim().is_empty()
    }

    /// Turn this draft into a release stamped with `version`.
    ///
    /// Identity and creation fields are kept; the record is the same library.
    #[must_use]
    pub fn release(self, version: Version, user: &UserId, now: DateTime<Utc>) -> Self {
        Self {
            draft: false,
            version,
            last_modified_by: user.clone(),
            last_modified_at: now,
            ..self
        }
    }

    /// Build a new draft from this record.
    ///
    /// Only the set, model, and version are carried forward; the name and
    /// source are replaced, and identity and timestamps are regenerated.
    pub fn derive_draft(
        &self,
        name: impl Into<String>,
        source: impl Into<String>,
        user: &UserId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: LibraryId::new(),
            set_id: self.set_id,
            name: name.into(),
            model: self.model.clone(),
            source: source.into(),
            draft: true,
            version: self.version,
            has_compile_errors: false,
            created_by: user.clone(),
            created_at: now,
            last_modified_by: user.clone(),
            last_modified_at: now,
        }
    }

    /// Stamp the modification fields.
    #[must_use]
    pub fn touched(self, user: &UserId, now: DateTime<Utc>) -> Self {
        Self {
            last_modified_by: user.clone(),
            last_modified_at: now,
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> UserId {
        UserId::new("alice")
    }

    fn released(version: Version) -> Library {
        Library::new_draft(SetId::new(), "core", "fhir-4.0.1", "define X: 1", &alice(), Utc::now())
            .release(version, &alice(), Utc::now())
    }

    #[test]
    fn new_draft_starts_at_zero() {
        let lib = Library::new_draft(SetId::new(), "core", "fhir", "src", &alice(), Utc::now());
        assert!(lib.draft);
        assert_eq!(lib.version, Version::ZERO);
        assert_eq!(lib.created_by, alice());
        assert!(!lib.has_compile_errors);
    }

    #[test]
    fn release_keeps_identity() {
        let draft = Library::new_draft(SetId::new(), "core", "fhir", "src", &alice(), Utc::now());
        let id = draft.id;
        let bob = UserId::new("bob");
        let rel = draft.release(Version::new(1, 0, 0), &bob, Utc::now());
        assert_eq!(rel.id, id);
        assert!(rel.is_released());
        assert_eq!(rel.version, Version::new(1, 0, 0));
        assert_eq!(rel.created_by, alice());
        assert_eq!(rel.last_modified_by, bob);
    }

    #[test]
    fn derive_draft_copies_only_lineage_fields() {
        let mut source = released(Version::new(2, 3, 0));
        source.has_compile_errors = true;
        let bob = UserId::new("bob");

        let draft = source.derive_draft("core-next", "define Y: 2", &bob, Utc::now());

        assert_ne!(draft.id, source.id);
        assert_eq!(draft.set_id, source.set_id);
        assert_eq!(draft.version, source.version);
        assert_eq!(draft.model, source.model);
        assert_eq!(draft.name, "core-next");
        assert_eq!(draft.source, "define Y: 2");
        assert!(draft.draft);
        assert!(!draft.has_compile_errors);
        assert_eq!(draft.created_by, bob);
        // The source release is untouched.
        assert!(source.is_released());
        assert_eq!(source.name, "core");
    }

    #[test]
    fn has_content_ignores_whitespace() {
        let mut lib = released(Version::new(1, 0, 0));
        lib.source = " \n\t ".into();
        assert!(!lib.has_content());
    }

    #[test]
    fn grant_merges_roles() {
        let mut set = LibrarySet::new(alice());
        let bob = UserId::new("bob");
        assert!(set.grant(&bob, Role::Read));
        assert!(set.grant(&bob, Role::Write));
        assert!(!set.grant(&bob, Role::Write));
        assert_eq!(set.roles_for(&bob), &[Role::Read, Role::Write]);
        assert_eq!(set.acl.len(), 1);
    }

    #[test]
    fn revoke_removes_entry() {
        let mut set = LibrarySet::new(alice());
        let bob = UserId::new("bob");
        set.grant(&bob, Role::Admin);
        assert!(set.revoke(&bob));
        assert!(!set.revoke(&bob));
        assert!(set.roles_for(&bob).is_empty());
    }

    #[test]
    fn ids_round_trip_through_text() {
        let id = LibraryId::new();
        let parsed: LibraryId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert!("not-a-uuid".parse::<SetId>().is_err());
    }
}
