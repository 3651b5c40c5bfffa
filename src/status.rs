//! Status codes describing what the cache did to produce an answer.

use crate::error::Error;

/// What the cache did to produce an answer. Ordered worst-to-best is *not* the intent here:
/// the ordering below is the one the synchronizer's demotion rules compare against (see
/// [`CacheStatus::BEHIND_THRESHOLD`]) and matches the source's enum declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CacheStatus {
    /// Answered from the entry without touching the tree.
    Hit,
    /// The entry was still valid; `last_confirmed_txnid` was advanced to the current snapshot.
    Confirmed,
    /// The tree was walked and the entry was overwritten with a new answer.
    Refreshed,
    /// The answer depends on uncommitted local writes; the entry was left untouched.
    Dirty,
    /// The reader's snapshot precedes the entry's frame of reference; answered via fallback.
    Behind,
    /// A concurrent publish won the race; the answer is still correct but the entry may be
    /// unpublished.
    Race,
    /// `errcode` carries the failure.
    Error,
}

impl CacheStatus {
    /// The threshold used by the fallback path: any resolver status strictly worse than
    /// `DIRTY` (i.e. `BEHIND`/`RACE`/`ERROR`, meaning the fallback's own tree walk hit real
    /// trouble) survives; anything `DIRTY` or better is relabeled with the fallback's reason.
    pub const BEHIND_THRESHOLD: Self = Self::Dirty;
}

/// Either `errcode`'s two non-error outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrCode {
    /// The value was found.
    Success,
    /// No value exists for the key.
    NotFound,
}

/// The `errcode` field of a [`CacheResult`]: success, not-found, or a full error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutcomeCode {
    /// The cache (or the underlying tree) answered successfully.
    Ok(ErrCode),
    /// A failure occurred; `status` is always [`CacheStatus::Error`] alongside this.
    Err(Error),
}

impl OutcomeCode {
    /// True if this is [`ErrCode::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Ok(ErrCode::Success))
    }

    /// True if this is [`ErrCode::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Ok(ErrCode::NotFound))
    }
}

/// The result of a cache lookup: what was found, and what the cache did to find it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheResult {
    /// Success, not-found, or an error.
    pub errcode: OutcomeCode,
    /// What the cache did to produce `errcode`.
    pub status: CacheStatus,
}

impl CacheResult {
    pub(crate) fn new(errcode: OutcomeCode, status: CacheStatus) -> Self {
        Self { errcode, status }
    }

    pub(crate) fn success(status: CacheStatus) -> Self {
        Self::new(OutcomeCode::Ok(ErrCode::Success), status)
    }

    pub(crate) fn not_found(status: CacheStatus) -> Self {
        Self::new(OutcomeCode::Ok(ErrCode::NotFound), status)
    }

    pub(crate) fn error(err: Error) -> Self {
        Self::new(OutcomeCode::Err(err), CacheStatus::Error)
    }

    /// `errcode` for "value present or absent", chosen from whether `found` holds.
    pub(crate) fn found(found: bool, status: CacheStatus) -> Self {
        if found { Self::success(status) } else { Self::not_found(status) }
    }
}
