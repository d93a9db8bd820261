use crate::{
    cache::gateway::{CacheGateway, SoftLockGuard},
    collection::CollectionHandle,
    model::CollectionDescriptor,
    session::{CollectionKey, SessionContext},
};

/// Cache the handle's current element state after a successful flush,
/// keyed by owner under the descriptor's role. No-op without a cache policy
/// or while the key is soft-locked.
pub fn cache_collection(
    gateway: &CacheGateway,
    descriptor: &CollectionDescriptor,
    handle: &CollectionHandle,
    ctx: &dyn SessionContext,
) -> bool {
    if !descriptor.has_cache() {
        return false;
    }
    gateway.put(handle.key().clone(), handle.disassemble(), ctx.timestamp())
}

/// Reassemble an initialized handle straight from the cache, skipping the
/// database round-trip. A hit that cannot be reassembled is stale cache
/// state: the entry is evicted and the load falls through to the database.
pub fn get_cached_collection(
    gateway: &CacheGateway,
    descriptor: &CollectionDescriptor,
    key: &CollectionKey,
    ctx: &dyn SessionContext,
) -> Option<CollectionHandle> {
    if !descriptor.has_cache() {
        return None;
    }
    let cached = gateway.get(key, ctx.timestamp())?;

    match CollectionHandle::from_disassembled(key.clone(), descriptor.kind, &cached) {
        Ok(handle) => Some(handle),
        Err(_) => {
            // never hand back a corrupt handle
            gateway.remove(key);
            None
        }
    }
}

/// Bracket a database write to this owner's collection rows with a scoped
/// soft-lock. Returns `None` without a cache policy: there is nothing to
/// guard.
pub fn softlock<'a>(
    gateway: &'a CacheGateway,
    descriptor: &CollectionDescriptor,
    key: &CollectionKey,
) -> Option<SoftLockGuard<'a>> {
    if !descriptor.has_cache() {
        return None;
    }
    Some(SoftLockGuard::acquire(gateway, key.clone()))
}
