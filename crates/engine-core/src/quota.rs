//! Hierarchical memory accounting bridging the engine to a pluggable allocator.
//!
//! The engine needs a quota tree: a root sized from the `resource_quota` config key,
//! with per-endpoint children that borrow against their parent and fail with
//! `ResourceExhausted` rather than block. This mirrors the shape of a
//! `tokio::sync::Semaphore` used for backpressure (acquire-or-fail, release-on-drop)
//! but threaded through a tree instead of a single counter, since a child exhausting
//! its own share must not be able to starve its siblings' already-granted memory.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::{EngineError, Result};

struct QuotaNode {
    parent: Option<MemoryQuota>,
    limit: usize,
    used: AtomicUsize,
    name: String,
}

/// A node in the memory quota tree.
///
/// Cloning shares the same underlying node; use [`MemoryQuota::child`] to create a new
/// node in the tree instead.
#[derive(Clone)]
pub struct MemoryQuota(Arc<QuotaNode>);

impl fmt::Debug for MemoryQuota {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryQuota")
            .field("name", &self.0.name)
            .field("limit", &self.0.limit)
            .field("used", &self.0.used.load(Ordering::Relaxed))
            .finish()
    }
}

impl MemoryQuota {
    /// Creates a root quota, typically sized from the engine's `resource_quota` config
    /// key.
    pub fn root(name: impl Into<String>, limit_bytes: usize) -> Self {
        MemoryQuota(Arc::new(QuotaNode {
            parent: None,
            limit: limit_bytes,
            used: AtomicUsize::new(0),
            name: name.into(),
        }))
    }

    /// Creates a child quota that shares this quota's pool but additionally caps its
    /// own share at `limit_bytes`. An allocation against the child must succeed against
    /// every ancestor up to the root or the whole chain is rolled back.
    pub fn child(&self, name: impl Into<String>, limit_bytes: usize) -> Self {
        MemoryQuota(Arc::new(QuotaNode {
            parent: Some(self.clone()),
            limit: limit_bytes,
            used: AtomicUsize::new(0),
            name: name.into(),
        }))
    }

    pub fn limit(&self) -> usize {
        self.0.limit
    }

    pub fn used(&self) -> usize {
        self.0.used.load(Ordering::Relaxed)
    }

    pub fn available(&self) -> usize {
        self.0.limit.saturating_sub(self.used())
    }

    /// Reserves `size` bytes against this node and every ancestor, non-blocking.
    ///
    /// Returns a [`QuotaReservation`] that releases the reservation on drop. Fails with
    /// `ResourceExhausted` at the first node (this one or an ancestor) that cannot
    /// satisfy the request; any nodes already reserved against in that attempt are
    /// unwound before returning.
    pub fn reserve(&self, size: usize) -> Result<QuotaReservation> {
        let mut chain = Vec::new();
        let mut node = Some(self.clone());
        while let Some(q) = node {
            if !q.try_reserve_local(size) {
                for granted in chain.into_iter().rev() {
                    release_local(&granted, size);
                }
                return Err(EngineError::ResourceExhausted(format!(
                    "quota '{}' has {} bytes available, requested {}",
                    q.0.name,
                    q.available(),
                    size
                )));
            }
            node = q.0.parent.clone();
            chain.push(q);
        }
        Ok(QuotaReservation {
            chain,
            size,
        })
    }

    fn try_reserve_local(&self, size: usize) -> bool {
        self.0
            .used
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                if used + size <= self.0.limit {
                    Some(used + size)
                } else {
                    None
                }
            })
            .is_ok()
    }
}

fn release_local(quota: &MemoryQuota, size: usize) {
    quota.0.used.fetch_sub(size, Ordering::AcqRel);
}

/// A live reservation against a chain of quota nodes. Releases the reserved bytes from
/// every node in the chain when dropped.
pub struct QuotaReservation {
    chain: Vec<MemoryQuota>,
    size: usize,
}

impl QuotaReservation {
    pub fn size(&self) -> usize {
        self.size
    }
}

impl Drop for QuotaReservation {
    fn drop(&mut self) {
        for quota in &self.chain {
            release_local(quota, self.size);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserves_and_releases() {
        let root = MemoryQuota::root("root", 100);
        {
            let r = root.reserve(40).unwrap();
            assert_eq!(root.used(), 40);
            assert_eq!(r.size(), 40);
        }
        assert_eq!(root.used(), 0);
    }

    #[test]
    fn child_cannot_exceed_own_limit_even_if_root_has_room() {
        let root = MemoryQuota::root("root", 1000);
        let child = root.child("endpoint-1", 10);
        assert!(child.reserve(20).is_err());
        assert_eq!(root.used(), 0, "failed child reservation must not leak into parent");
    }

    #[test]
    fn child_exhaustion_does_not_affect_sibling() {
        let root = MemoryQuota::root("root", 50);
        let a = root.child("a", 50);
        let b = root.child("b", 50);

        let _held = a.reserve(50).unwrap();
        assert!(b.reserve(1).is_err(), "root is fully consumed by sibling a");
    }

    #[test]
    fn rolls_back_partial_chain_on_ancestor_failure() {
        let root = MemoryQuota::root("root", 5);
        let child = root.child("child", 1000);

        assert!(child.reserve(10).is_err());
        assert_eq!(child.used(), 0, "child's local reservation must roll back");
        assert_eq!(root.used(), 0);
    }
}
