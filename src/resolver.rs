//! The Tree-Descent Resolver: drives a cursor through the B+-tree for a table, comparing
//! traversed-page txnids against the client's last-confirmed txnid, short-circuiting the
//! descent the moment a traversed page proves the cached answer is still valid.

use crate::{
    entry::{CacheEntry, Txnid},
    error::{Error, HostError},
    host::{NodeFlags, Transaction, TxnFlags},
    mapping::inside_and_committed,
    status::{CacheResult, CacheStatus},
};

/// The outcome of [`resolve`]: the value (if any) and what the cache did to produce it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lookup {
    /// The value bytes, or `None` if the key has no value at the resolved snapshot.
    pub value: Option<Vec<u8>>,
    /// What the cache did to produce `value`.
    pub result: CacheResult,
}

impl Lookup {
    fn error(err: Error) -> Self {
        Self { value: None, result: CacheResult::error(err) }
    }
}

/// Composes the value slice recorded by `entry`, asserting the pointer-safety invariant
/// (§8 property 2) for any non-empty result.
fn compose_entry_value<T: Transaction>(txn: &T, entry: &CacheEntry) -> Result<Option<Vec<u8>>, Error> {
    if entry.offset == 0 {
        return Ok(None);
    }
    debug_assert!(
        inside_and_committed(txn, entry.offset, txn.basis_snapshot()),
        "cache entry points outside the committed mapping window"
    );
    txn.read_at(entry.offset, entry.length).map(Some).map_err(Error::from)
}

/// Takes the "not found" branch shared by the stale-table-descriptor, empty-table, and
/// missing-key cases (§4.3 steps 3, 6, 8).
///
/// `trunk` is whatever the running trunk txnid was at the point the branch was taken.
fn not_found_branch(committed_snapshot: Txnid, trunk: Txnid, entry: &mut CacheEntry) -> Lookup {
    let mut status = CacheStatus::Dirty;
    if trunk <= committed_snapshot {
        status = CacheStatus::Confirmed;
        if entry.offset != 0 || entry.trunk_txnid == 0 {
            status = CacheStatus::Refreshed;
            entry.offset = 0;
            entry.length = 0;
            entry.trunk_txnid = trunk;
        }
        entry.last_confirmed_txnid = committed_snapshot;
    }
    debug_assert!(entry.is_well_formed());
    Lookup { value: None, result: CacheResult::not_found(status) }
}

/// Composes the "entry is still valid" response shared by the trivial-hit, fast-confirm, and
/// mid-descent short-circuit cases (§4.3 steps 2, 5, 7).
fn cache_confirmed<T: Transaction>(
    txn: &T,
    committed_snapshot: Txnid,
    trunk: Txnid,
    entry: &mut CacheEntry,
) -> Lookup {
    debug_assert!(trunk <= committed_snapshot && trunk <= entry.last_confirmed_txnid);
    let value = match compose_entry_value(txn, entry) {
        Ok(v) => v,
        Err(err) => return Lookup::error(err),
    };
    let found = value.is_some();
    if entry.last_confirmed_txnid == committed_snapshot {
        return Lookup { value, result: CacheResult::found(found, CacheStatus::Hit) };
    }
    entry.last_confirmed_txnid = committed_snapshot;
    Lookup { value, result: CacheResult::found(found, CacheStatus::Confirmed) }
}

/// Runs the decision procedure of §4.3 against an *exclusively-owned* local copy of `entry`,
/// mutating it in place exactly as the spec prescribes and returning the answer.
///
/// Preconditions: `entry.trunk_txnid <= entry.last_confirmed_txnid`; violating this returns
/// [`Error::InvalidArgument`] without touching `entry`.
pub fn resolve<T: Transaction>(
    txn: &mut T,
    dbi: T::Dbi,
    key: &[u8],
    entry: &mut CacheEntry,
) -> Lookup {
    if entry.trunk_txnid > entry.last_confirmed_txnid {
        return Lookup::error(Error::InvalidArgument);
    }

    if let Err(e) = txn.check_txn(TxnFlags::BLOCKED) {
        return Lookup::error(e.into());
    }

    // Step 1: past-snapshot. `T.txnid` and `front_txnid(T)` are the same query (§4.1 doc
    // comment); a read-only transaction's own txnid is its basis snapshot either way.
    if txn.front_txnid() < entry.trunk_txnid {
        return fallback(txn, dbi, key, CacheStatus::Behind);
    }

    // Step 2: trivial hit.
    if txn.front_txnid() <= entry.last_confirmed_txnid {
        let value = match compose_entry_value(txn, entry) {
            Ok(v) => v,
            Err(err) => return Lookup::error(err),
        };
        let found = value.is_some();
        return Lookup { value, result: CacheResult::found(found, CacheStatus::Hit) };
    }

    if let Err(e) = txn.dbi_check(dbi) {
        return Lookup::error(e.into());
    }

    let committed_snapshot = txn.basis_snapshot();
    let mut trunk = txn.front_txnid();

    // Step 3: stale table descriptor.
    if txn.is_stale(dbi) {
        match txn.tbl_refresh(dbi) {
            Ok(()) => {}
            Err(HostError::NotFound) => {
                return not_found_branch(committed_snapshot, trunk, entry);
            }
            Err(e) => return Lookup::error(e.into()),
        }
    }

    // Step 4: choose trunk.
    let mod_txnid = txn.table_mod_txnid(dbi);
    if mod_txnid != 0 {
        trunk = mod_txnid;
    }
    if txn.is_writer() {
        if let Some(front) = txn.innermost_dirty_writer_front(dbi) {
            trunk = front;
        }
    }

    // Step 5: fast-confirm by trunk.
    if trunk <= entry.last_confirmed_txnid {
        return cache_confirmed(txn, committed_snapshot, trunk, entry);
    }

    // Step 6: empty table.
    let Some(root) = txn.table_root(dbi) else {
        return not_found_branch(committed_snapshot, trunk, entry);
    };

    // Step 7: descend.
    let mut cursor = match txn.cursor_init(dbi) {
        Ok(c) => c,
        Err(e) => return Lookup::error(e.into()),
    };
    let normalized_key = match txn.check_key(dbi, key) {
        Ok(k) => k,
        Err(e) => return Lookup::error(e.into()),
    };

    let mut pgno = root;
    let mut page = match txn.page_get(&mut cursor, pgno, trunk) {
        Ok(p) => p,
        Err(e) => return Lookup::error(e.into()),
    };
    trunk = txn.page_txnid(&page);
    if trunk <= entry.last_confirmed_txnid {
        return cache_confirmed(txn, committed_snapshot, trunk, entry);
    }
    let mut ki = txn.page_numkeys(&page).wrapping_sub(1);

    while txn.is_branch(&page) {
        let nsr = txn.node_search(&page, &normalized_key);
        if nsr.node.is_some() {
            ki = (nsr.ki as isize + nsr.exact as isize - 1).max(0) as usize;
        }
        let child = txn.page_node(&page, ki);
        pgno = txn.node_pgno(&child);

        page = match txn.page_get(&mut cursor, pgno, trunk) {
            Ok(p) => p,
            Err(e) => return Lookup::error(e.into()),
        };
        trunk = txn.page_txnid(&page);
        if trunk <= entry.last_confirmed_txnid {
            return cache_confirmed(txn, committed_snapshot, trunk, entry);
        }

        ki = txn.page_numkeys(&page).wrapping_sub(1);
        if let Err(e) = txn.cursor_push(&mut cursor, &page, ki) {
            return Lookup::error(e.into());
        }
    }

    // Step 8: leaf lookup.
    if !txn.check_leaf_type(&page) {
        tracing::error!(pgno, "unexpected leaf-page type during cache descent");
        return Lookup::error(Error::Corrupted);
    }

    let nsr = txn.node_search(&page, &normalized_key);
    if !nsr.exact {
        return not_found_branch(committed_snapshot, trunk, entry);
    }
    let node = nsr.node.expect("exact match always carries a node");

    if txn.node_flags(&node).contains(NodeFlags::DUP) {
        tracing::warn!(pgno, "multi-value node encountered, unsupported by cache");
        return Lookup::error(Error::MultiValue);
    }

    // Step 9: read value.
    let slice = match txn.node_read(&page, &node) {
        Ok(s) => s,
        Err(e) => return Lookup::error(e.into()),
    };
    let bytes = match txn.read_at(slice.offset, slice.length) {
        Ok(b) => b,
        Err(e) => return Lookup::error(e.into()),
    };

    // Step 10: classify.
    if trunk > committed_snapshot {
        return Lookup { value: Some(bytes), result: CacheResult::success(CacheStatus::Dirty) };
    }

    debug_assert!(inside_and_committed(txn, slice.offset, committed_snapshot));
    entry.offset = slice.offset;
    entry.length = slice.length;
    entry.trunk_txnid = trunk;
    entry.last_confirmed_txnid = committed_snapshot;
    Lookup { value: Some(bytes), result: CacheResult::success(CacheStatus::Refreshed) }
}

/// Re-resolves against a zeroed throwaway entry, then relabels the status with `reason`
/// unless the fallback's own resolution already hit something worse than `DIRTY` (i.e. it
/// independently went `BEHIND`/`RACE`/`ERROR`, in which case that takes precedence).
fn fallback<T: Transaction>(txn: &mut T, dbi: T::Dbi, key: &[u8], reason: CacheStatus) -> Lookup {
    let mut stub = CacheEntry::fresh();
    let mut lookup = resolve(txn, dbi, key, &mut stub);
    if lookup.result.status <= CacheStatus::BEHIND_THRESHOLD {
        lookup.result.status = reason;
    }
    lookup
}
