//! Accounting for GPU-visible resources.
//!
//! Every context, geometry buffer, and material owns a ticket from a shared
//! ledger. The ticket is released by an explicit `dispose` traversal, never
//! by `Drop`, so a teardown path that forgets to traverse shows up as a
//! non-zero counter instead of being silently papered over.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// The kinds of GPU-visible resources the ledger tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Context,
    Geometry,
    Material,
}

/// Snapshot of the live resource counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResourceCounts {
    pub contexts: usize,
    pub geometries: usize,
    pub materials: usize,
}

impl ResourceCounts {
    /// True when nothing GPU-visible is retained.
    pub fn is_empty(&self) -> bool {
        self.contexts == 0 && self.geometries == 0 && self.materials == 0
    }
}

/// Shared counters of live GPU-visible resources.
#[derive(Debug, Default)]
pub struct ResourceLedger {
    contexts: AtomicUsize,
    geometries: AtomicUsize,
    materials: AtomicUsize,
}

impl ResourceLedger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registers one live resource and returns the ticket that releases it.
    pub fn acquire(self: &Arc<Self>, kind: ResourceKind) -> ResourceTicket {
        self.counter(kind).fetch_add(1, Ordering::SeqCst);
        ResourceTicket {
            ledger: Arc::clone(self),
            kind,
            released: false,
        }
    }

    /// Number of live resources of one kind.
    pub fn live(&self, kind: ResourceKind) -> usize {
        self.counter(kind).load(Ordering::SeqCst)
    }

    /// Snapshot of every counter.
    pub fn snapshot(&self) -> ResourceCounts {
        ResourceCounts {
            contexts: self.live(ResourceKind::Context),
            geometries: self.live(ResourceKind::Geometry),
            materials: self.live(ResourceKind::Material),
        }
    }

    fn counter(&self, kind: ResourceKind) -> &AtomicUsize {
        match kind {
            ResourceKind::Context => &self.contexts,
            ResourceKind::Geometry => &self.geometries,
            ResourceKind::Material => &self.materials,
        }
    }
}

/// Proof of one live resource. Release is explicit and idempotent; dropping
/// an unreleased ticket leaves the counter raised on purpose.
#[derive(Debug)]
pub struct ResourceTicket {
    ledger: Arc<ResourceLedger>,
    kind: ResourceKind,
    released: bool,
}

impl ResourceTicket {
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Returns the counter to the ledger. Calling twice is a no-op.
    pub fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.ledger.counter(self.kind).fetch_sub(1, Ordering::SeqCst);
        }
    }
}
