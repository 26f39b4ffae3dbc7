//! Bounded entry storage shared by every store tier
//!
//! Each tier wraps a [`StoreCore`]: one `RwLock` around the entry table
//! (mutual exclusion per store, never across stores) plus lock-free hit/miss
//! counters so that read-locked lookups can still be counted.

use crate::cache::{
    entry::CacheEntry,
    events::RemovalReason,
    types::{CacheKey, CacheStats, StoreId},
};
use crate::error::{CacheError, Result};
use crate::similarity::ScoreBreakdown;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{RwLock, RwLockReadGuard};
use tracing::debug;
use uuid::Uuid;

/// A successful lookup
#[derive(Debug, Clone)]
pub struct StoreHit {
    /// Snapshot of the entry after its access metadata was updated
    pub entry: CacheEntry,

    /// 1.0 for strict and range hits
    pub similarity: f64,

    /// Per-dimension scores for similarity hits
    pub breakdown: Option<ScoreBreakdown>,
}

/// An entry that left a store, with the reason
#[derive(Debug, Clone)]
pub struct Removal {
    pub entry: CacheEntry,
    pub reason: RemovalReason,
}

struct Slot {
    entry: CacheEntry,
    /// Logical insertion order, used to break ties between equal timestamps
    inserted: u64,
    /// Logical access order
    touched: u64,
}

impl Slot {
    fn lru_rank(&self) -> (DateTime<Utc>, u64) {
        (self.entry.metadata.last_accessed, self.touched)
    }
}

/// Entry table guarded by the store lock
pub(crate) struct EntryTable {
    capacity: usize,
    slots: HashMap<CacheKey, Slot>,
    clock: u64,
    evictions_capacity: u64,
    evictions_ttl: u64,
    invalidations: u64,
    malformed_skipped: u64,
}

impl EntryTable {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            slots: HashMap::new(),
            clock: 0,
            evictions_capacity: 0,
            evictions_ttl: 0,
            invalidations: 0,
            malformed_skipped: 0,
        }
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    /// Live entries with their insertion order
    pub(crate) fn iter(&self) -> impl Iterator<Item = (&CacheEntry, u64)> {
        self.slots
            .values()
            .filter(|slot| !slot.entry.is_expired())
            .map(|slot| (&slot.entry, slot.inserted))
    }

    pub(crate) fn get(&self, key: &str) -> Option<&CacheEntry> {
        self.slots
            .get(key)
            .map(|slot| &slot.entry)
            .filter(|entry| !entry.is_expired())
    }

    /// Insert or overwrite; evicts least recently used entries to stay within capacity
    fn insert(&mut self, entry: CacheEntry) -> Vec<Removal> {
        let mut removed = Vec::new();
        let seq = self.tick();

        if let Some(slot) = self.slots.get_mut(&entry.key) {
            debug!("Overwriting cache entry: {}", entry.key);
            slot.entry = entry;
            slot.inserted = seq;
            slot.touched = seq;
            return removed;
        }

        while self.slots.len() >= self.capacity {
            match self.pop_lru() {
                Some(entry) => removed.push(Removal {
                    entry,
                    reason: RemovalReason::LeastRecentlyUsed,
                }),
                None => break,
            }
        }

        debug!("Inserting cache entry: {}", entry.key);
        self.slots.insert(
            entry.key.clone(),
            Slot {
                entry,
                inserted: seq,
                touched: seq,
            },
        );
        removed
    }

    fn pop_lru(&mut self) -> Option<CacheEntry> {
        let key = self
            .slots
            .iter()
            .min_by_key(|(_, slot)| slot.lru_rank())
            .map(|(key, _)| key.clone())?;
        debug!("Evicting least recently used entry: {}", key);
        self.evictions_capacity += 1;
        self.slots.remove(&key).map(|slot| slot.entry)
    }

    fn evict_over_capacity(&mut self) -> Vec<Removal> {
        let mut removed = Vec::new();
        while self.slots.len() > self.capacity {
            match self.pop_lru() {
                Some(entry) => removed.push(Removal {
                    entry,
                    reason: RemovalReason::LeastRecentlyUsed,
                }),
                None => break,
            }
        }
        removed
    }

    /// Mark an entry accessed and return a snapshot of it.
    ///
    /// With `expected` set, an entry overwritten since it was read is left
    /// untouched.
    fn touch(&mut self, key: &str, expected: Option<Uuid>) -> Option<CacheEntry> {
        let seq = self.tick();
        let slot = self.slots.get_mut(key)?;
        if slot.entry.is_expired() || expected.is_some_and(|id| id != slot.entry.id) {
            return None;
        }
        slot.entry.mark_accessed();
        slot.touched = seq;
        Some(slot.entry.clone())
    }

    fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        let slot = self.slots.remove(key)?;
        self.invalidations += 1;
        Some(slot.entry)
    }

    fn clear(&mut self) -> Vec<CacheEntry> {
        let drained: Vec<CacheEntry> = self.slots.drain().map(|(_, slot)| slot.entry).collect();
        self.invalidations += drained.len() as u64;
        drained
    }

    fn purge_expired(&mut self) -> Vec<Removal> {
        let expired: Vec<CacheKey> = self
            .slots
            .iter()
            .filter(|(_, slot)| slot.entry.is_expired())
            .map(|(key, _)| key.clone())
            .collect();

        self.evictions_ttl += expired.len() as u64;
        expired
            .into_iter()
            .filter_map(|key| self.slots.remove(&key))
            .map(|slot| Removal {
                entry: slot.entry,
                reason: RemovalReason::Expired,
            })
            .collect()
    }
}

/// Lock, counters and capacity shared by all tiers
pub struct StoreCore {
    id: StoreId,
    table: RwLock<EntryTable>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl StoreCore {
    pub fn new(id: StoreId, capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(CacheError::Configuration(format!(
                "capacity of {} must be greater than 0",
                id
            )));
        }

        Ok(Self {
            id,
            table: RwLock::new(EntryTable::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        })
    }

    pub fn id(&self) -> StoreId {
        self.id
    }

    pub(crate) async fn read(&self) -> RwLockReadGuard<'_, EntryTable> {
        self.table.read().await
    }

    pub async fn capacity(&self) -> usize {
        self.table.read().await.capacity
    }

    /// Count a miss; returns `None` for call-site convenience
    pub(crate) fn miss<T>(&self) -> Option<T> {
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Touch `key` under the write lock and build the hit.
    ///
    /// The entry may have been evicted between the read-locked scan and this
    /// call; that case counts as a miss.
    pub(crate) async fn hit(
        &self,
        key: &str,
        similarity: f64,
        breakdown: Option<ScoreBreakdown>,
    ) -> Option<StoreHit> {
        let touched = self.table.write().await.touch(key, None);
        self.finish_hit(key, touched, similarity, breakdown)
    }

    /// Like [`hit`](Self::hit) for a score computed against `scored`; a
    /// racing overwrite of the same key counts as a miss
    pub(crate) async fn hit_scored(
        &self,
        scored: &CacheEntry,
        similarity: f64,
        breakdown: Option<ScoreBreakdown>,
    ) -> Option<StoreHit> {
        let touched = self.table.write().await.touch(&scored.key, Some(scored.id));
        self.finish_hit(&scored.key, touched, similarity, breakdown)
    }

    fn finish_hit(
        &self,
        key: &str,
        touched: Option<CacheEntry>,
        similarity: f64,
        breakdown: Option<ScoreBreakdown>,
    ) -> Option<StoreHit> {
        match touched {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!("Cache hit in {}: {} ({:.3})", self.id, key, similarity);
                Some(StoreHit {
                    entry,
                    similarity,
                    breakdown,
                })
            }
            None => self.miss(),
        }
    }

    pub async fn insert(&self, entry: CacheEntry) -> Vec<Removal> {
        self.table.write().await.insert(entry)
    }

    pub async fn evict_if_over_capacity(&self) -> Vec<Removal> {
        self.table.write().await.evict_over_capacity()
    }

    pub async fn remove(&self, key: &str) -> Option<CacheEntry> {
        self.table.write().await.remove(key)
    }

    pub async fn clear(&self) -> Vec<CacheEntry> {
        self.table.write().await.clear()
    }

    pub async fn purge_expired(&self) -> Vec<Removal> {
        self.table.write().await.purge_expired()
    }

    pub async fn note_malformed(&self, count: u64) {
        self.table.write().await.malformed_skipped += count;
    }

    pub async fn len(&self) -> usize {
        self.table.read().await.len()
    }

    pub async fn contains_key(&self, key: &str) -> bool {
        self.table.read().await.get(key).is_some()
    }

    /// Snapshot of live entries, oldest insertion first
    pub async fn entries(&self) -> Vec<CacheEntry> {
        let table = self.table.read().await;
        let mut entries: Vec<(&CacheEntry, u64)> = table.iter().collect();
        entries.sort_by_key(|(_, inserted)| *inserted);
        entries.into_iter().map(|(entry, _)| entry.clone()).collect()
    }

    pub async fn stats(&self) -> CacheStats {
        let table = self.table.read().await;
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: table.len(),
            evictions_capacity: table.evictions_capacity,
            evictions_ttl: table.evictions_ttl,
            invalidations: table.invalidations,
            malformed_skipped: table.malformed_skipped,
        }
    }
}

/// Interface shared by the strict, range and similarity stores
#[async_trait]
pub trait TierStore: Send + Sync {
    /// What a lookup is keyed by
    type Query: ?Sized + Sync;

    fn core(&self) -> &StoreCore;

    /// Find a matching entry; a hit updates its access metadata
    async fn lookup(&self, query: &Self::Query) -> Option<StoreHit>;

    /// Check that an entry belongs in this store
    fn accepts(&self, entry: &CacheEntry) -> Result<()> {
        if entry.store != self.core().id() {
            return Err(CacheError::Other(format!(
                "entry for {} offered to {}",
                entry.store,
                self.core().id()
            )));
        }
        Ok(())
    }

    /// Insert or overwrite, returning entries evicted to make room
    async fn insert(&self, entry: CacheEntry) -> Result<Vec<Removal>> {
        self.accepts(&entry)?;
        Ok(self.core().insert(entry).await)
    }

    async fn evict_if_over_capacity(&self) -> Vec<Removal> {
        self.core().evict_if_over_capacity().await
    }

    fn id(&self) -> StoreId {
        self.core().id()
    }
}
