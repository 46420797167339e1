use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use serde::{Deserialize, Serialize};

/// Correlation key linking a request to its eventual `finished`/`failed` reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallId(u64);

/// Stable handle for an object exported by one side of a connection.
///
/// Ids are allocated by the owning side and are only meaningful within the
/// protocol instance that allocated them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReferenceId(u64);

impl CallId {
    pub fn new(value: u64) -> Self {
        CallId(value)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl ReferenceId {
    pub fn new(value: u64) -> Self {
        ReferenceId(value)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CallId({})", self.0)
    }
}

impl fmt::Display for ReferenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ref#{}", self.0)
    }
}

impl From<u64> for CallId {
    fn from(value: u64) -> Self {
        CallId::new(value)
    }
}

impl From<u64> for ReferenceId {
    fn from(value: u64) -> Self {
        ReferenceId::new(value)
    }
}

/// Monotonic allocator for outbound call ids. Starts at 1.
#[derive(Debug)]
pub struct CallIdAllocator {
    next: AtomicU64,
}

/// Monotonic allocator for reference ids. Starts at 1.
#[derive(Debug)]
pub struct ReferenceIdAllocator {
    next: AtomicU64,
}

impl CallIdAllocator {
    pub fn new() -> Self {
        CallIdAllocator {
            next: AtomicU64::new(1),
        }
    }

    pub fn allocate(&self) -> CallId {
        let id = self.next.fetch_add(1, Ordering::Relaxed);
        CallId::new(id)
    }

    pub fn peek_next(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }
}

impl ReferenceIdAllocator {
    pub fn new() -> Self {
        ReferenceIdAllocator {
            next: AtomicU64::new(1),
        }
    }

    pub fn allocate(&self) -> ReferenceId {
        let id = self.next.fetch_add(1, Ordering::Relaxed);
        ReferenceId::new(id)
    }

    pub fn peek_next(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }
}

impl Default for CallIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for ReferenceIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}
