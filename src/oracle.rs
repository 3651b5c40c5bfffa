//! The Snapshot Oracle: the three pure queries the cache uses to tell "my snapshot has
//! advanced past the entry" from "my own uncommitted writes may have changed the answer".

use crate::entry::Txnid;

/// Exposes the MVCC facts the cache needs about a transaction `T`, without the cache ever
/// needing to know how `T` represents its writer-nesting chain.
///
/// Implementors typically back this with a linked list of transaction frames (innermost
/// active nested writer first); this trait only ever walks it leaf-to-root, and only through
/// [`innermost_dirty_writer_front`](Self::innermost_dirty_writer_front).
pub trait SnapshotOracle {
    /// Database/table handle type this oracle reasons about dirtiness for.
    type Dbi: Copy + Eq + std::fmt::Debug;

    /// The committed txnid that `T` reads from.
    ///
    /// For a read-only transaction this is its own snapshot; for a writer it is the
    /// parent/ancestor-committed tip, never `T`'s own working txnid.
    fn basis_snapshot(&self) -> Txnid;

    /// The txnid associated with writes made inside `T` (or its innermost active nested
    /// writer). For a read-only transaction this coincides with its own txnid, which is also
    /// what the resolver's "past-snapshot" check (`T.txnid < entry.trunk_txnid`) compares
    /// against, since there is no separate "T's own txnid" query.
    fn front_txnid(&self) -> Txnid;

    /// True iff this transaction (not necessarily an ancestor) is a writer.
    fn is_writer(&self) -> bool;

    /// Walks the nested-writer chain from innermost outward and returns the `front_txnid` of
    /// the innermost ancestor (including `T` itself) that is both dirty and has `dbi` in its
    /// dirty set. The main/catalog table is treated as implicitly dirty whenever any writer
    /// in the chain is active.
    ///
    /// Returns `None` if no ancestor in the active nest dirties `dbi`.
    fn innermost_dirty_writer_front(&self, dbi: Self::Dbi) -> Option<Txnid>;

    /// True iff `T` or some ancestor in the active nest is a writer and has marked `dbi`
    /// dirty. Derived from [`innermost_dirty_writer_front`](Self::innermost_dirty_writer_front).
    fn dirties_table(&self, dbi: Self::Dbi) -> bool {
        self.innermost_dirty_writer_front(dbi).is_some()
    }
}
