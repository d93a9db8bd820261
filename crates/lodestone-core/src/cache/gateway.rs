use crate::{
    cache::timestamper::{Timestamp, Timestamper},
    collection::Disassembled,
    obs::sink::{MetricsEvent, record},
    session::CollectionKey,
};
use parking_lot::Mutex;
use std::collections::BTreeMap;

///
/// CacheGateway
///
/// Read-through/write-through second-level cache for disassembled
/// collections, keyed by association role plus owner id. The only component
/// mutably shared across sessions; every mutation goes through
/// `put`/`get`/`remove`/`lock`/`release`, never around them.
///
/// Staleness protocol: an entry is visible to a transaction only when it was
/// written before that transaction began. A soft-locked key reads as a miss
/// and rejects puts until the lock releases; after release, the slot keeps
/// the unlock timestamp and keeps rejecting puts from transactions that
/// began before the write completed. Soft-locks are in-process advisory
/// markers, never database locks.
///

#[derive(Debug, Default)]
pub struct CacheGateway {
    slots: Mutex<BTreeMap<CollectionKey, Slot>>,
    timestamper: Timestamper,
}

#[derive(Debug)]
enum Slot {
    Item {
        value: Disassembled,
        fresh_at: Timestamp,
    },
    Lock {
        count: u32,
        unlocked_at: Option<Timestamp>,
    },
}

impl CacheGateway {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: Mutex::new(BTreeMap::new()),
            timestamper: Timestamper::new(),
        }
    }

    /// Next timestamp from the gateway's shared clock; sessions stamp their
    /// transaction start with this.
    pub fn next_timestamp(&self) -> Timestamp {
        self.timestamper.next()
    }

    /// Look up a cached collection on behalf of a transaction that began at
    /// `txn_start`. Locked and too-fresh entries read as misses.
    pub fn get(&self, key: &CollectionKey, txn_start: Timestamp) -> Option<Disassembled> {
        let slots = self.slots.lock();
        match slots.get(key) {
            Some(Slot::Item { value, fresh_at }) if *fresh_at < txn_start => {
                record(MetricsEvent::CacheHit { role: &key.role });
                Some(value.clone())
            }
            Some(Slot::Lock { count, .. }) if *count > 0 => {
                record(MetricsEvent::SoftLockContended { role: &key.role });
                None
            }
            _ => {
                record(MetricsEvent::CacheMiss { role: &key.role });
                None
            }
        }
    }

    /// Cache a disassembled collection on behalf of a transaction that began
    /// at `txn_start`. Returns false when the put is rejected: the key is
    /// soft-locked, already populated, or was written to after the
    /// transaction began.
    pub fn put(&self, key: CollectionKey, value: Disassembled, txn_start: Timestamp) -> bool {
        let mut slots = self.slots.lock();
        let accepted = match slots.get(&key) {
            None => true,
            // a completed write newer than this transaction wins
            Some(Slot::Lock {
                count: 0,
                unlocked_at,
            }) => unlocked_at.is_none_or(|unlocked| unlocked < txn_start),
            // still locked, or already populated (minimal puts)
            Some(Slot::Lock { .. } | Slot::Item { .. }) => false,
        };

        if accepted {
            record(MetricsEvent::CachePut { role: &key.role });
            slots.insert(
                key,
                Slot::Item {
                    value,
                    fresh_at: self.timestamper.next(),
                },
            );
        } else {
            record(MetricsEvent::CachePutRejected { role: &key.role });
        }

        accepted
    }

    /// Evict a key unconditionally.
    pub fn remove(&self, key: &CollectionKey) {
        record(MetricsEvent::CacheEvict { role: &key.role });
        self.slots.lock().remove(key);
    }

    /// Soft-lock a key for the span of an in-flight database write.
    /// Reentrant within and across sessions; each `lock` pairs with one
    /// `release`.
    pub fn lock(&self, key: &CollectionKey) {
        let mut slots = self.slots.lock();
        match slots.get_mut(key) {
            Some(Slot::Lock { count, unlocked_at }) => {
                *count += 1;
                *unlocked_at = None;
            }
            _ => {
                slots.insert(
                    key.clone(),
                    Slot::Lock {
                        count: 1,
                        unlocked_at: None,
                    },
                );
            }
        }
    }

    /// Release one soft-lock hold. When the last hold releases, the slot
    /// records the unlock timestamp that gates subsequent puts.
    pub fn release(&self, key: &CollectionKey) {
        let mut slots = self.slots.lock();
        match slots.get_mut(key) {
            Some(Slot::Lock { count, unlocked_at }) if *count > 0 => {
                *count -= 1;
                if *count == 0 {
                    *unlocked_at = Some(self.timestamper.next());
                }
            }
            _ => {
                // releasing an unlocked key degrades it to an expired lock
                // marker rather than trusting whatever is cached
                slots.insert(
                    key.clone(),
                    Slot::Lock {
                        count: 0,
                        unlocked_at: Some(self.timestamper.next()),
                    },
                );
            }
        }
    }

    /// Is the key currently soft-locked?
    #[must_use]
    pub fn is_locked(&self, key: &CollectionKey) -> bool {
        matches!(
            self.slots.lock().get(key),
            Some(Slot::Lock { count, .. }) if *count > 0
        )
    }

    /// Drop every entry; test and shutdown plumbing.
    pub fn clear(&self) {
        self.slots.lock().clear();
    }
}

///
/// SoftLockGuard
///
/// Scoped soft-lock acquisition: brackets a write, guaranteed to release on
/// every exit path, including error paths. Held for the minimum span
/// covering "write issued" through "write acknowledged", never across an
/// entire transaction.
///

#[must_use = "the soft-lock releases when the guard drops"]
pub struct SoftLockGuard<'a> {
    gateway: &'a CacheGateway,
    key: CollectionKey,
}

impl<'a> SoftLockGuard<'a> {
    pub fn acquire(gateway: &'a CacheGateway, key: CollectionKey) -> Self {
        gateway.lock(&key);
        Self { gateway, key }
    }

    #[must_use]
    pub const fn key(&self) -> &CollectionKey {
        &self.key
    }
}

impl Drop for SoftLockGuard<'_> {
    fn drop(&mut self) {
        self.gateway.release(&self.key);
    }
}
