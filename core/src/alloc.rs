//! Allocation accounting and optional memory limits.
//!
//! This is a Rust re-expression of the original engine's
//! `allocator_config`/`default_allocator`: rather than a custom
//! `std::allocator`-compatible type, [`Allocator`] is a small, cheaply
//! cloneable handle (`Arc`-backed counters) that every part of the
//! interpreter which allocates heap storage for a [`Value`](https://docs.rs/threadscript-runtime)
//! consults before growing a `String`/`Vec`/`HashMap`. Counters are atomics
//! so that `allocate`/`deallocate` never need a lock, matching the original
//! class's documented trade-off: metrics may be momentarily imprecise when
//! read concurrently with updates, but allocation accounting itself is exact.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

/// A configured limit on the number of bytes the allocator will account
/// for. `0` means unlimited, matching `limits_t::unlimited_size`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocLimits {
    pub max_balance: u64,
}

impl AllocLimits {
    pub const UNLIMITED: Self = Self { max_balance: 0 };

    pub fn limited(max_balance: u64) -> Self {
        Self { max_balance }
    }
}

/// A point-in-time snapshot of allocation metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocMetrics {
    pub alloc_ops: u64,
    pub alloc_rejects: u64,
    pub dealloc_ops: u64,
    pub balance: i64,
    pub max_balance: i64,
}

#[derive(Debug, Default)]
struct Counters {
    alloc_ops: AtomicU64,
    alloc_rejects: AtomicU64,
    dealloc_ops: AtomicU64,
    balance: AtomicI64,
    max_balance: AtomicI64,
    limit: AtomicI64,
}

/// A shared, thread-safe allocation accountant.
///
/// Cloning an `Allocator` shares the same counters (it is a thin handle
/// around an `Arc`), the way the original's `basic_virtual_machine` owns a
/// single `default_allocator` instance shared by every thread it spawns.
#[derive(Debug, Clone)]
pub struct Allocator {
    counters: Arc<Counters>,
}

impl Default for Allocator {
    fn default() -> Self {
        Self::new(AllocLimits::UNLIMITED)
    }
}

impl Allocator {
    pub fn new(limits: AllocLimits) -> Self {
        let counters = Counters {
            limit: AtomicI64::new(limits.max_balance as i64),
            ..Default::default()
        };
        Self {
            counters: Arc::new(counters),
        }
    }

    /// Checks limits and records an allocation of `size` bytes.
    ///
    /// Returns `true` (and records the allocation) if the limit permits it;
    /// `false` (recording a rejection instead) otherwise. A `size` of `0`
    /// always succeeds.
    pub fn allocate(&self, size: u64) -> bool {
        let limit = self.counters.limit.load(Ordering::Relaxed);
        if limit > 0 {
            let current = self.counters.balance.load(Ordering::Relaxed);
            if current + size as i64 > limit {
                self.counters.alloc_rejects.fetch_add(1, Ordering::Relaxed);
                return false;
            }
        }
        self.counters.alloc_ops.fetch_add(1, Ordering::Relaxed);
        let new_balance = self.counters.balance.fetch_add(size as i64, Ordering::Relaxed) + size as i64;
        self.counters
            .max_balance
            .fetch_max(new_balance, Ordering::Relaxed);
        true
    }

    /// Records a deallocation of `size` bytes. Must be paired with an
    /// `allocate` call that returned `true` for the same size.
    pub fn deallocate(&self, size: u64) {
        self.counters.dealloc_ops.fetch_add(1, Ordering::Relaxed);
        self.counters.balance.fetch_sub(size as i64, Ordering::Relaxed);
    }

    pub fn metrics(&self) -> AllocMetrics {
        AllocMetrics {
            alloc_ops: self.counters.alloc_ops.load(Ordering::Relaxed),
            alloc_rejects: self.counters.alloc_rejects.load(Ordering::Relaxed),
            dealloc_ops: self.counters.dealloc_ops.load(Ordering::Relaxed),
            balance: self.counters.balance.load(Ordering::Relaxed),
            max_balance: self.counters.max_balance.load(Ordering::Relaxed),
        }
    }

    pub fn set_limits(&self, limits: AllocLimits) {
        self.counters
            .limit
            .store(limits.max_balance as i64, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unlimited_allocator_never_rejects() {
        let a = Allocator::default();
        assert!(a.allocate(1 << 30));
        assert_eq!(a.metrics().balance, 1 << 30);
    }

    #[test]
    fn limited_allocator_rejects_over_budget() {
        let a = Allocator::new(AllocLimits::limited(100));
        assert!(a.allocate(60));
        assert!(!a.allocate(60));
        assert_eq!(a.metrics().alloc_rejects, 1);
        a.deallocate(60);
        assert!(a.allocate(40));
    }

    #[test]
    fn cloned_handle_shares_counters() {
        let a = Allocator::new(AllocLimits::limited(10));
        let b = a.clone();
        assert!(a.allocate(10));
        assert!(!b.allocate(1));
    }
}
