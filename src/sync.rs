//! The Entry Synchronizer: the two public entry points that wrap the resolver with the
//! lock-free protocol by which many threads may share one entry.

use crate::{
    entry::{CacheEntry, Publish, SharedEntry, Stabilized},
    error::Error,
    host::Transaction,
    resolver::{Lookup, resolve},
    status::{CacheResult, CacheStatus},
};

/// Resolves `key` against `entry` directly, with no sharing protocol.
///
/// Validates that `key` is non-empty and that `entry` is well-formed before delegating to the
/// resolver; a malformed entry or empty key maps to [`Error::InvalidArgument`].
pub fn get_cached<T: Transaction>(
    txn: &mut T,
    dbi: T::Dbi,
    key: &[u8],
    entry: &mut CacheEntry,
) -> Lookup {
    if key.is_empty() {
        return Lookup { value: None, result: CacheResult::error(Error::InvalidArgument) };
    }
    resolve(txn, dbi, key, entry)
}

/// Resolves `key` against a [`SharedEntry`] visible to many threads.
///
/// Stabilizes a torn-free local copy, resolves it, and publishes the result back iff the
/// resolver's status is `CONFIRMED` or `REFRESHED` (the only statuses that both advance the
/// entry and are safe for every racing reader to adopt). `DIRTY` answers are correct but
/// reflect uncommitted local writes that must never become another reader's cached truth, so
/// they are never published (§4.4, §7). If a competing publish has already reached or passed
/// this thread's snapshot, the reported status is demoted to [`CacheStatus::Race`]: the
/// looked-up value is still correct, the entry is simply left for the winner.
pub fn get_cached_shared<T: Transaction>(
    txn: &mut T,
    dbi: T::Dbi,
    key: &[u8],
    shared: &SharedEntry,
) -> Lookup {
    if key.is_empty() {
        return Lookup { value: None, result: CacheResult::error(Error::InvalidArgument) };
    }

    let mut local = match shared.stabilize() {
        Stabilized::Consistent(entry) => entry,
        Stabilized::Locked => {
            tracing::debug!("shared cache entry stayed locked past retry budget, falling back");
            let mut stub = CacheEntry::fresh();
            let mut lookup = resolve(txn, dbi, key, &mut stub);
            if lookup.result.status <= CacheStatus::BEHIND_THRESHOLD {
                lookup.result.status = CacheStatus::Race;
            }
            return lookup;
        }
    };

    let mut lookup = resolve(txn, dbi, key, &mut local);

    if matches!(lookup.result.status, CacheStatus::Confirmed | CacheStatus::Refreshed) {
        match shared.publish(&local) {
            Publish::Published => {}
            Publish::LostRace => lookup.result.status = CacheStatus::Race,
        }
    }

    lookup
}
