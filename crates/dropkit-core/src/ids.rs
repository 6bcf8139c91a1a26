//! Identity generation for file entries and action steps.
//!
//! Ids never derive from user-controlled data such as file names, so two
//! files with the same name dropped at the same instant stay distinct.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new(id: Uuid) -> Self {
                Self(id)
            }

            pub fn from_u128(value: u128) -> Self {
                Self(Uuid::from_u128(value))
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }
    };
}

id_type!(
    /// Stable identity of a [`FileEntry`](crate::models::FileEntry).
    FileId
);
id_type!(
    /// Stable identity of an [`ActionStep`](crate::models::ActionStep).
    ActionId
);

/// Source of fresh ids, injected into the stores.
pub trait IdGenerator: Send + Sync {
    fn next_uuid(&self) -> Uuid;

    fn file_id(&self) -> FileId {
        FileId::new(self.next_uuid())
    }

    fn action_id(&self) -> ActionId {
        ActionId::new(self.next_uuid())
    }
}

/// Random v4 UUIDs.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomIds;

impl IdGenerator for RandomIds {
    fn next_uuid(&self) -> Uuid {
        Uuid::new_v4()
    }
}

/// Monotonic counter rendered as UUIDs, for reproducible tests and logs.
#[derive(Debug, Default)]
pub struct SequentialIds {
    next: AtomicU64,
}

impl SequentialIds {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }
}

impl IdGenerator for SequentialIds {
    fn next_uuid(&self) -> Uuid {
        let value = self.next.fetch_add(1, Ordering::Relaxed);
        Uuid::from_u128(u128::from(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_sequential_ids_are_monotonic() {
        let ids = SequentialIds::new();
        let a = ids.file_id();
        let b = ids.file_id();
        assert_eq!(a, FileId::from_u128(1));
        assert_eq!(b, FileId::from_u128(2));
        assert!(a < b);
    }

    #[test]
    fn test_random_ids_are_unique() {
        let ids = RandomIds;
        let set: HashSet<FileId> = (0..256).map(|_| ids.file_id()).collect();
        assert_eq!(set.len(), 256);
    }
}
