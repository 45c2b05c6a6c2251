use std::sync::atomic::{AtomicU64, Ordering};

/// Per-direction relay counters, shared by both relay tasks.
#[derive(Debug, Default)]
pub struct RelayStats {
    inbound_forwarded: AtomicU64,
    inbound_dropped: AtomicU64,
    outbound_published: AtomicU64,
    outbound_dropped: AtomicU64,
}

/// Point-in-time copy of [`RelayStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub inbound_forwarded: u64,
    pub inbound_dropped: u64,
    pub outbound_published: u64,
    pub outbound_dropped: u64,
}

impl RelayStats {
    pub fn record_inbound_forwarded(&self) {
        self.inbound_forwarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_inbound_dropped(&self) {
        self.inbound_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_outbound_published(&self) {
        self.outbound_published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_outbound_dropped(&self) {
        self.outbound_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            inbound_forwarded: self.inbound_forwarded.load(Ordering::Relaxed),
            inbound_dropped: self.inbound_dropped.load(Ordering::Relaxed),
            outbound_published: self.outbound_published.load(Ordering::Relaxed),
            outbound_dropped: self.outbound_dropped.load(Ordering::Relaxed),
        }
    }
}
