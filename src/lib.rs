//! Lock-free validating lookup cache for an MVCC B+-tree key-value store.
//!
//! Clients hold a small, fixed-size [`CacheEntry`] alongside a key they read frequently. This
//! crate short-circuits full B-tree descents when the client's cache entry can be proven
//! still valid against the database's current MVCC state, and otherwise walks the tree,
//! returns the freshly read value, and updates the entry in place.
//!
//! Four cooperating pieces do the work:
//! - [`oracle`]: the Snapshot Oracle, pure MVCC queries against a transaction.
//! - [`mapping`]: the Map-Window Validator, the runtime guard every reported pointer must
//!   satisfy.
//! - [`resolver`]: the Tree-Descent Resolver, walks the tree, stopping early whenever a
//!   traversed page proves the cached answer still holds.
//! - [`entry`] and [`sync`]: the Entry Synchronizer, the lock-free seqlock protocol by which
//!   many threads share one entry, and the single-threaded entry point for when they don't.
//!
//! The page allocator, the copy-on-write engine, the B-tree mutation operators, the
//! write-ahead log, and the reader-table are external collaborators this crate never
//! implements; it only calls through the [`host::Transaction`] contract. Multi-value
//! (duplicate-key) tables are rejected rather than supported, and cache entries are ephemeral
//! client-owned memory (this crate never persists one across a process restart).
#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]

pub mod entry;
pub mod error;
pub mod host;
pub mod mapping;
pub mod oracle;
pub mod resolver;
pub mod status;
pub mod sync;

pub use entry::{CacheEntry, MAX_TXNID, SharedEntry, Txnid};
pub use error::{Error, HostError, HostResult};
pub use host::{NodeFlags, NodeSearch, PageNo, Transaction, TxnFlags, ValueSlice};
pub use mapping::MappingView;
pub use oracle::SnapshotOracle;
pub use resolver::{Lookup, resolve};
pub use status::{CacheResult, CacheStatus, ErrCode, OutcomeCode};
pub use sync::{get_cached, get_cached_shared};
