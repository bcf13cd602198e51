//! Identifier, name and value types shared across the engine.

mod value;

pub use value::PropertyValue;

use std::fmt;

use serde::{Deserialize, Serialize};

/// A record id, unique within the shard of the worker that allocated it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Gid(u64);

impl Gid {
    /// Creates a gid from its raw representation.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw representation.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Gid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies one member of the cluster. Worker 0 is the master.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WorkerId(u16);

impl WorkerId {
    /// The master's worker id.
    pub const MASTER: Self = Self(0);

    /// Creates a worker id.
    #[must_use]
    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }

    /// Returns the raw representation.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// Returns true for the master.
    #[must_use]
    pub const fn is_master(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "w{}", self.0)
    }
}

/// Cluster-wide address of a vertex or edge record: the worker owning the
/// record plus the gid it allocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GlobalAddress {
    /// The id within the owning worker's shard.
    pub gid: Gid,
    /// The worker owning the record.
    pub worker: WorkerId,
}

impl GlobalAddress {
    /// Creates an address.
    #[must_use]
    pub const fn new(gid: Gid, worker: WorkerId) -> Self {
        Self { gid, worker }
    }

    /// Returns true if the record lives on the given worker.
    #[must_use]
    pub const fn is_local_to(self, worker: WorkerId) -> bool {
        self.worker.as_u16() == worker.as_u16()
    }
}

impl fmt::Display for GlobalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.worker, self.gid)
    }
}

/// Opaque identifier addressing a dispatched worker-side plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlanId(u64);

impl PlanId {
    /// Creates a plan id.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw representation.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "plan#{}", self.0)
    }
}

macro_rules! name_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            /// Creates a new name.
            #[must_use]
            pub fn new(name: impl Into<String>) -> Self {
                Self(name.into())
            }

            /// Returns the name as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

name_type! {
    /// A vertex label.
    Label
}

name_type! {
    /// An edge type name.
    EdgeTypeName
}

name_type! {
    /// A property key on a vertex or edge.
    PropertyKey
}
