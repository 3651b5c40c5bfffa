//! The Map-Window Validator: the runtime guard every reported value pointer must satisfy.

use crate::{entry::Txnid, error::HostResult};

/// The read-only view of the database mapping the validator reasons over.
///
/// The cache addresses values by `offset` into this mapping, never by raw pointer; a host
/// store backs this with `base + offset` into its memory-mapped file.
pub trait MappingView {
    /// Page size in bytes.
    fn page_size(&self) -> u64;

    /// Number of pages in the committed, allocated region visible to the current transaction.
    fn first_unallocated(&self) -> u64;

    /// The txnid of the page containing the given mapping offset, if the offset falls inside
    /// a known page. Used only to validate `on_committed_page`; an offset produced by the
    /// cache itself always resolves.
    fn page_txnid_at(&self, offset: u64) -> Option<Txnid>;

    /// Materializes `length` bytes starting at `offset` in the mapping. Large/overflow values
    /// must already have been collapsed to a single contiguous `(offset, length)` span by
    /// whichever tree-read helper produced it.
    fn read_at(&self, offset: u64, length: u32) -> HostResult<Vec<u8>>;
}

/// `(offset - mapping_base)` lies in `[0, first_unallocated * page_size)`.
pub fn inside_mapping(view: &impl MappingView, offset: u64) -> bool {
    offset < view.first_unallocated().saturating_mul(view.page_size())
}

/// The page containing `offset` carries a txnid no greater than `basis` (i.e. is committed,
/// not a dirty copy-on-write page).
pub fn on_committed_page(view: &impl MappingView, offset: u64, basis: Txnid) -> bool {
    view.page_txnid_at(offset).is_some_and(|txnid| txnid <= basis)
}

/// The runtime guard every reported non-empty value pointer must satisfy.
pub fn inside_and_committed(view: &impl MappingView, offset: u64, basis: Txnid) -> bool {
    inside_mapping(view, offset) && on_committed_page(view, offset, basis)
}
