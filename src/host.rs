//! The flat set of host-store hooks the Tree-Descent Resolver drives a cursor through.
//!
//! Everything in this module is a contract the cache *consumes*; the page allocator, the
//! copy-on-write engine, the B-tree mutation operators and the catalog itself are external
//! collaborators the cache never implements; it only calls through these hooks.

use bitflags::bitflags;

use crate::{entry::Txnid, error::HostResult, mapping::MappingView, oracle::SnapshotOracle};

/// Page number, as addressed by `base + pgno * page_size`.
pub type PageNo = u64;

bitflags! {
    /// Mask of reasons a transaction may be unusable, passed to [`Transaction::check_txn`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TxnFlags: u32 {
        /// The transaction has been aborted or its environment is shutting down.
        const BLOCKED = 0b0000_0001;
    }
}

bitflags! {
    /// Per-node flags read off a leaf node.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct NodeFlags: u32 {
        /// The node heads a duplicate-value (multi-value) subtree. Unsupported by the cache.
        const DUP = 0b0000_0001;
    }
}

/// A materialized value location: an offset into the mapping plus a byte length. The cache
/// never copies value bytes into itself, only this pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueSlice {
    /// Byte offset into the mapping.
    pub offset: u64,
    /// Length in bytes.
    pub length: u32,
}

/// The result of searching a page for a key: the node found (if any), whether it was an exact
/// match, and the index the cursor landed on (`cursor.ki`).
#[derive(Debug, Clone)]
pub struct NodeSearch<Node> {
    /// The node at the landing index, if the page is non-empty.
    pub node: Option<Node>,
    /// Whether `node` is an exact match for the search key.
    pub exact: bool,
    /// The index the search landed the cursor on.
    pub ki: usize,
}

/// The external contract a B+-tree-backed MVCC store exposes to the cache.
///
/// One implementor models one live transaction; cursors, pages, and nodes are borrowed for
/// the duration of a single [`crate::resolver::resolve`] call only. The trait is read-mostly
/// (`tbl_refresh` is the sole mutator, since refreshing a stale table descriptor is itself a
/// transaction-local cache the host owns).
pub trait Transaction: SnapshotOracle + MappingView {
    /// Cursor handle used to walk a table.
    type Cursor;
    /// A B-tree page.
    type Page;
    /// A single leaf/branch node within a page.
    type Node;

    /// Returns an error iff the transaction is unusable for the given blocked-state mask.
    fn check_txn(&self, blocked_mask: TxnFlags) -> HostResult<()>;

    /// Validates that `dbi` is a live handle on this transaction.
    fn dbi_check(&self, dbi: Self::Dbi) -> HostResult<()>;

    /// True iff the transaction's cached descriptor for `dbi` is marked stale and must be
    /// refreshed from the catalog before use.
    fn is_stale(&self, dbi: Self::Dbi) -> bool;

    /// Refreshes the transaction's cached table descriptor for `dbi` from the catalog.
    /// Returns [`crate::error::HostError::NotFound`] if the table has been dropped.
    fn tbl_refresh(&mut self, dbi: Self::Dbi) -> HostResult<()>;

    /// The table's root page, or `None` if the table is empty (the "invalid" sentinel).
    fn table_root(&self, dbi: Self::Dbi) -> Option<PageNo>;

    /// The txnid of the most recent mutation in the table's committed history, or 0 if
    /// unknown (legacy databases may never have recorded one).
    fn table_mod_txnid(&self, dbi: Self::Dbi) -> Txnid;

    /// Initializes a cursor positioned at the top of `dbi`'s tree.
    fn cursor_init(&self, dbi: Self::Dbi) -> HostResult<Self::Cursor>;

    /// Normalizes and validates `key` against the table's key constraints.
    fn check_key(&self, dbi: Self::Dbi, key: &[u8]) -> HostResult<Vec<u8>>;

    /// Loads the page at `pgno`, as observed while the running trunk txnid is `trunk`.
    fn page_get(&self, cursor: &mut Self::Cursor, pgno: PageNo, trunk: Txnid)
    -> HostResult<Self::Page>;

    /// Pushes `page` (landed at index `ki`) onto the cursor stack.
    fn cursor_push(&self, cursor: &mut Self::Cursor, page: &Self::Page, ki: usize) -> HostResult<()>;

    /// True iff `page` is a leaf page carrying the expected leaf-page flags.
    fn check_leaf_type(&self, page: &Self::Page) -> bool;

    /// True iff `page` is a branch page.
    fn is_branch(&self, page: &Self::Page) -> bool;

    /// The txnid stamped on `page`.
    fn page_txnid(&self, page: &Self::Page) -> Txnid;

    /// Number of keys on `page`.
    fn page_numkeys(&self, page: &Self::Page) -> usize;

    /// The node at index `ki` on `page`.
    fn page_node(&self, page: &Self::Page, ki: usize) -> Self::Node;

    /// Searches `page` for `key`.
    fn node_search(&self, page: &Self::Page, key: &[u8]) -> NodeSearch<Self::Node>;

    /// Flags on `node`.
    fn node_flags(&self, node: &Self::Node) -> NodeFlags;

    /// The child page number a branch node points to.
    fn node_pgno(&self, node: &Self::Node) -> PageNo;

    /// Reads the `(offset, length)` of the value `node` holds on `page`. Overflow values are
    /// materialized through whatever helper the tree itself uses to collapse them into a
    /// single contiguous span.
    fn node_read(&self, page: &Self::Page, node: &Self::Node) -> HostResult<ValueSlice>;
}
