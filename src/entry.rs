//! The client-owned cache entry and the lock-free shared-entry protocol.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering, compiler_fence};

/// Monotonically increasing transaction identifier.
///
/// Zero means "never confirmed". [`MAX_TXNID`] is a reserved sentinel used by the shared-entry
/// protocol to mark an entry as locked mid-publish; it never appears as a real snapshot id.
pub type Txnid = u64;

/// Sentinel marking a shared entry as locked (mid-publish). Never a legitimate snapshot id.
pub const MAX_TXNID: Txnid = Txnid::MAX;

/// A client-owned, 32-byte-logical cache entry.
///
/// Reused across many calls and destroyed by the client; the cache never retains a reference
/// to it beyond the duration of a call. A freshly initialized entry ([`CacheEntry::fresh`]) is
/// always safe to pass in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheEntry {
    /// Byte offset of the value's payload inside the database mapping, or 0 if absent.
    pub offset: u64,
    /// Value length in bytes (0 when absent).
    pub length: u32,
    /// Txnid of the B-tree page that was the effective root of the table when this entry was
    /// recorded.
    pub trunk_txnid: Txnid,
    /// The highest reader snapshot at which this entry has been confirmed valid.
    pub last_confirmed_txnid: Txnid,
}

impl CacheEntry {
    /// An all-zero entry: always well-formed, always safe to pass to the cache.
    pub const fn fresh() -> Self {
        Self { offset: 0, length: 0, trunk_txnid: 0, last_confirmed_txnid: 0 }
    }

    /// True iff `offset == 0` (the entry currently records "value absent").
    pub const fn is_absent(&self) -> bool {
        self.offset == 0
    }

    /// Checks the well-formedness invariant: `trunk_txnid <= last_confirmed_txnid <=
    /// MAX_TXNID`, and `offset == 0 <=> length == 0`.
    pub const fn is_well_formed(&self) -> bool {
        self.trunk_txnid <= self.last_confirmed_txnid
            && self.last_confirmed_txnid <= MAX_TXNID
            && (self.offset != 0 || self.length == 0)
    }
}

/// Outcome of attempting to publish a locally-resolved entry to a [`SharedEntry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Publish {
    /// This thread's local entry became the new shared state.
    Published,
    /// Another thread had already advanced the shared entry at least as far.
    LostRace,
}

/// Outcome of stabilizing a local copy of a [`SharedEntry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Stabilized {
    /// A torn-free snapshot of the shared quadruple.
    Consistent(CacheEntry),
    /// The entry stayed locked across every retry; callers fall back.
    Locked,
}

/// A cache entry shared by many threads, synchronized with a seqlock-style protocol.
///
/// `last_confirmed_txnid` is the sequence field: a writer CASes it to [`MAX_TXNID`] to acquire
/// the lock, then releases it with the real value once the other three fields are consistent.
/// Readers treat a load of `MAX_TXNID` as "locked" and retry; `trunk_txnid` is poisoned to 0
/// partway through publication so that a reader racing without the re-read loop sees, at worst,
/// a never-confirmed entry (safe: it just takes the slow path).
#[derive(Debug, Default)]
pub struct SharedEntry {
    last_confirmed_txnid: AtomicU64,
    trunk_txnid: AtomicU64,
    offset: AtomicU64,
    length: AtomicU32,
}

/// Bounded retries for detecting a persistently locked entry before giving up and falling back.
const LOCK_RETRIES: u32 = 3;

impl SharedEntry {
    /// Creates a fresh (all-zero) shared entry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a shared entry pre-populated with the given state. Useful for resuming a
    /// process-local cache from a previously observed [`CacheEntry`]; the subsystem never
    /// persists entries itself.
    pub fn from_entry(entry: CacheEntry) -> Self {
        Self {
            last_confirmed_txnid: AtomicU64::new(entry.last_confirmed_txnid),
            trunk_txnid: AtomicU64::new(entry.trunk_txnid),
            offset: AtomicU64::new(entry.offset),
            length: AtomicU32::new(entry.length),
        }
    }

    /// Stabilizes a torn-free local copy of the shared quadruple.
    ///
    /// Loops re-reading `last_confirmed_txnid` together with the other three fields until two
    /// successive loads agree, yielding the CPU between attempts. If `last_confirmed_txnid`
    /// reads as the locked sentinel for [`LOCK_RETRIES`] consecutive attempts, gives up and
    /// reports [`Stabilized::Locked`].
    pub(crate) fn stabilize(&self) -> Stabilized {
        let mut local = self.load_raw();
        loop {
            let mut again_confirmed = self.last_confirmed_txnid.load(Ordering::Acquire);
            if again_confirmed == MAX_TXNID {
                let mut retries = 0;
                loop {
                    std::thread::yield_now();
                    again_confirmed = self.last_confirmed_txnid.load(Ordering::Acquire);
                    if again_confirmed != MAX_TXNID {
                        break;
                    }
                    retries += 1;
                    if retries >= LOCK_RETRIES {
                        return Stabilized::Locked;
                    }
                }
            }

            let again = CacheEntry {
                offset: self.offset.load(Ordering::Relaxed),
                length: self.length.load(Ordering::Relaxed),
                trunk_txnid: self.trunk_txnid.load(Ordering::Relaxed),
                last_confirmed_txnid: again_confirmed,
            };

            if local == again {
                return Stabilized::Consistent(local);
            }
            local = again;
            std::thread::yield_now();
        }
    }

    /// Reads the four fields without any consistency guarantee; only ever used as the seed
    /// for the first iteration of [`Self::stabilize`].
    fn load_raw(&self) -> CacheEntry {
        CacheEntry {
            offset: self.offset.load(Ordering::Relaxed),
            length: self.length.load(Ordering::Relaxed),
            trunk_txnid: self.trunk_txnid.load(Ordering::Relaxed),
            last_confirmed_txnid: self.last_confirmed_txnid.load(Ordering::Acquire),
        }
    }

    /// Attempts to publish `local` as the new shared state.
    ///
    /// Loses the race (without touching shared state) if the shared `last_confirmed_txnid` has
    /// already reached or passed `local.last_confirmed_txnid`. Otherwise CASes the sequence
    /// field to the locked sentinel, writes the poisoned `trunk_txnid = 0`, a compiler fence,
    /// then `offset`/`length`/the real `trunk_txnid`, and finally releases the lock with a
    /// release store of the real `last_confirmed_txnid`.
    pub(crate) fn publish(&self, local: &CacheEntry) -> Publish {
        loop {
            let snap = self.last_confirmed_txnid.load(Ordering::Acquire);
            if snap >= local.last_confirmed_txnid {
                return Publish::LostRace;
            }

            if self
                .last_confirmed_txnid
                .compare_exchange(snap, MAX_TXNID, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                self.trunk_txnid.store(0, Ordering::Relaxed);
                compiler_fence(Ordering::SeqCst);
                self.offset.store(local.offset, Ordering::Relaxed);
                self.length.store(local.length, Ordering::Relaxed);
                self.trunk_txnid.store(local.trunk_txnid, Ordering::Relaxed);
                self.last_confirmed_txnid.store(local.last_confirmed_txnid, Ordering::Release);
                return Publish::Published;
            }

            std::thread::yield_now();
        }
    }
}
