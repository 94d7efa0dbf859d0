use {
    super::{onion::Chain, pattern::Pattern},
    http::Method,
    std::sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
};

/// A registered route. Immutable once created.
#[derive(Clone)]
pub(crate) struct RouteEntry {
    pub(crate) method: Method,
    pub(crate) pattern: Pattern,
    pub(crate) chain: Arc<Chain>,
}

/// Append-only route list shared by a router and every group derived from it.
#[derive(Default)]
pub(crate) struct RouteTable {
    entries: Mutex<Vec<RouteEntry>>,
    sealed: AtomicBool,
}

impl RouteTable {
    /// Appends `entry`. Returns `false` when the table is already sealed.
    pub(crate) fn push(&self, entry: RouteEntry) -> bool {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if self.sealed.load(Ordering::Acquire) {
            return false;
        }
        entries.push(entry);
        true
    }

    /// Seals the table and hands its entries over in registration order.
    pub(crate) fn seal(&self) -> Vec<RouteEntry> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        self.sealed.store(true, Ordering::Release);
        std::mem::take(&mut *entries)
    }

    pub(crate) fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::Acquire)
    }
}
