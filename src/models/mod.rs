//! Entity graph of the compliance core.
//!
//! Every entity carries an optional surrogate id assigned by the store. Two
//! entities compare equal only when both have an id and the ids match; a
//! value that was never stored is equal to nothing but itself.

use serde::{Deserialize, Serialize};

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }
    };
}

entity_id!(
    /// Store handle of a [`License`].
    LicenseId
);
entity_id!(
    /// Store handle of a [`LicenseConflict`].
    ConflictId
);
entity_id!(
    /// Store handle of a [`LicenseRisk`].
    RiskId
);
entity_id!(
    /// Store handle of a [`Library`].
    LibraryId
);
entity_id!(
    /// Store handle of a [`Dependency`].
    DependencyId
);
entity_id!(
    /// Store handle of a [`Project`].
    ProjectId
);

/// Identity semantics shared by all entities.
///
/// Implemented through `entity_identity!` so that `PartialEq`/`Hash` never
/// look at anything but the assigned id.
pub trait Entity {
    type Id: Copy + Eq + std::hash::Hash + Ord;

    fn id(&self) -> Option<Self::Id>;

    /// Whether both sides refer to the same stored entity.
    fn same_entity(&self, other: &Self) -> bool {
        matches!((self.id(), other.id()), (Some(a), Some(b)) if a == b)
    }
}

macro_rules! entity_identity {
    ($entity:ty, $id:ty) => {
        impl $crate::models::Entity for $entity {
            type Id = $id;

            fn id(&self) -> Option<$id> {
                self.id
            }
        }

        impl PartialEq for $entity {
            fn eq(&self, other: &Self) -> bool {
                std::ptr::eq(self, other) || $crate::models::Entity::same_entity(self, other)
            }
        }

        impl Eq for $entity {}

        impl std::hash::Hash for $entity {
            fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
                self.id.hash(state);
            }
        }
    };
}

pub mod library;
pub mod license;
pub mod project;

pub use library::{ErrorLog, Library, LibraryType, LinkType, LinkedLicense, LogSeverity, LogStatus};
pub use license::{CompatibilityState, License, LicenseConflict, LicenseRisk};
pub use project::{Dependency, Project, UploadState};


/// Case-insensitive comparison used for every natural key.
pub(crate) fn key_eq(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

/// Blank in the `StringUtils.isBlank` sense: empty or whitespace only.
pub(crate) fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsaved_entities_are_never_equal() {
        let a = License::new("MIT", "MIT License");
        let b = License::new("MIT", "MIT License");
        assert_ne!(a, b);
        assert_eq!(a, a);
    }

    #[test]
    fn stored_entities_compare_by_id() {
        let mut a = License::new("MIT", "MIT License");
        let mut b = License::new("Apache-2.0", "Apache License 2.0");
        a.id = Some(LicenseId(7));
        b.id = Some(LicenseId(7));
        assert_eq!(a, b);

        b.id = Some(LicenseId(8));
        assert_ne!(a, b);

        b.id = None;
        assert_ne!(a, b);
    }

    #[test]
    fn natural_keys_ignore_case() {
        assert!(key_eq("Left-Pad", "left-pad"));
        assert!(!key_eq("left-pad", "leftpad"));
    }

    #[test]
    fn blank_values() {
        assert!(is_blank(None));
        assert!(is_blank(Some("  ")));
        assert!(!is_blank(Some("MIT")));
    }
}
