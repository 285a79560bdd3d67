//! Access-expiring cache for address verdicts.

use dashmap::DashMap;
use std::future::Future;
use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Entry count that triggers the first sweep of expired entries.
const DEFAULT_SWEEP_THRESHOLD: usize = 1024;

/// Cached "is blocked" verdict.
#[derive(Debug, Clone, Copy)]
pub struct CachedVerdict {
    /// Whether the address is blocked.
    pub blocked: bool,
    /// Last time this entry was written or read.
    pub last_access: Instant,
}

impl CachedVerdict {
    /// Check if this entry has gone unused for longer than `ttl`.
    pub fn is_expired(&self, ttl: Duration) -> bool {
        self.last_access.elapsed() > ttl
    }
}

/// Concurrent verdict cache.
///
/// Entries expire once they have not been accessed for the TTL. An expired
/// entry is removed when a lookup finds it. Once the map holds at least the
/// sweep threshold, an insert also sweeps every expired entry when the map
/// has doubled since the last sweep or a full TTL has passed since it.
/// Locking is per shard, so lookups for unrelated addresses do not contend.
pub struct VerdictCache {
    entries: DashMap<IpAddr, CachedVerdict>,
    ttl: Duration,
    created: Instant,
    min_sweep: usize,
    next_sweep: AtomicUsize,
    /// Milliseconds after `created` at which the last sweep ran.
    last_sweep_ms: AtomicU64,
}

impl VerdictCache {
    /// Create a cache whose entries expire after `ttl` without access.
    pub fn new(ttl: Duration) -> Self {
        Self::with_sweep_threshold(ttl, DEFAULT_SWEEP_THRESHOLD)
    }

    /// Like [`VerdictCache::new`], sweeping once `threshold` entries are stored.
    pub fn with_sweep_threshold(ttl: Duration, threshold: usize) -> Self {
        let threshold = threshold.max(1);
        Self {
            entries: DashMap::new(),
            ttl,
            created: Instant::now(),
            min_sweep: threshold,
            next_sweep: AtomicUsize::new(threshold),
            last_sweep_ms: AtomicU64::new(0),
        }
    }

    /// Get a live verdict, refreshing its access time.
    pub fn get(&self, ip: &IpAddr) -> Option<bool> {
        {
            let mut entry = self.entries.get_mut(ip)?;
            if !entry.is_expired(self.ttl) {
                entry.last_access = Instant::now();
                return Some(entry.blocked);
            }
        }

        let ttl = self.ttl;
        self.entries.remove_if(ip, |_, entry| entry.is_expired(ttl));
        None
    }

    /// Store a verdict.
    pub fn insert(&self, ip: IpAddr, blocked: bool) {
        self.entries.insert(
            ip,
            CachedVerdict {
                blocked,
                last_access: Instant::now(),
            },
        );

        if self.sweep_due() {
            self.evict_expired();
        }
    }

    fn sweep_due(&self) -> bool {
        let len = self.entries.len();
        if len < self.min_sweep {
            return false;
        }
        if len >= self.next_sweep.load(Ordering::Relaxed) {
            return true;
        }
        let last_sweep = Duration::from_millis(self.last_sweep_ms.load(Ordering::Relaxed));
        self.created.elapsed().saturating_sub(last_sweep) >= self.ttl
    }

    /// Drop every expired entry.
    pub fn evict_expired(&self) {
        let ttl = self.ttl;
        self.entries.retain(|_, entry| !entry.is_expired(ttl));

        let live = self.entries.len();
        self.next_sweep
            .store(live.saturating_mul(2).max(self.min_sweep), Ordering::Relaxed);
        self.last_sweep_ms
            .store(self.created.elapsed().as_millis() as u64, Ordering::Relaxed);
    }

    /// Return the cached verdict or compute, store and return a new one.
    ///
    /// Failed computations are not cached. Two concurrent misses for the same
    /// address may both compute.
    pub async fn get_or_try_insert_with<F, Fut, E>(&self, ip: IpAddr, compute: F) -> Result<bool, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<bool, E>>,
    {
        if let Some(blocked) = self.get(&ip) {
            return Ok(blocked);
        }

        let blocked = compute().await?;
        self.insert(ip, blocked);
        Ok(blocked)
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}
