//! A tiny in-memory MVCC store implementing [`signet_mvcc_cache::host::Transaction`].
//!
//! This is test infrastructure standing in for the page allocator, the copy-on-write engine,
//! and the B-tree mutation operators (all of which are external collaborators the cache
//! crate itself never implements). Every table here is backed by a single flat leaf page (no
//! real branch fan-out), which is enough to drive the cache's decision procedure without
//! reimplementing a B-tree: the resolver's branch-descent loop simply never executes.
//!
//! Known simplification: `first_unallocated` reports the mapping's current global length
//! rather than a per-transaction snapshot of it, since `on_committed_page` (not
//! `inside_mapping`) is what actually gates whether a reader may see a value, see
//! `DESIGN.md`.
#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;
use signet_mvcc_cache::{
    HostError, HostResult, MappingView, NodeFlags, NodeSearch, PageNo, SnapshotOracle,
    Transaction, TxnFlags, Txnid, ValueSlice,
};

/// Table handle; stable for the lifetime of the environment, including across drop+recreate.
pub type Dbi = u32;

/// The main/catalog table, implicitly dirty whenever any writer is active.
pub const MAIN_DBI: Dbi = 0;

const PAGE_SIZE: u64 = 64;

#[derive(Debug, Clone)]
struct TableRecord {
    exists: bool,
    root: Option<PageNo>,
    mod_txnid: Txnid,
}

impl TableRecord {
    const fn absent() -> Self {
        Self { exists: false, root: None, mod_txnid: 0 }
    }
}

#[derive(Debug, Clone)]
struct MockPage {
    pgno: PageNo,
    txnid: Txnid,
    entries: Vec<(Vec<u8>, ValueSlice)>,
}

struct Inner {
    mapping: Vec<u8>,
    offset_stamps: HashMap<u64, Txnid>,
    pages: HashMap<PageNo, MockPage>,
    next_pgno: PageNo,
    tables: HashMap<Dbi, TableRecord>,
    names: HashMap<String, Dbi>,
    next_dbi: Dbi,
    committed_txnid: Txnid,
    next_txnid: Txnid,
}

/// A miniature MVCC environment: one committed tip, a flat table catalog, and an
/// append-only byte mapping standing in for the memory-mapped data file.
pub struct Env {
    inner: RwLock<Inner>,
}

impl Env {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                mapping: Vec::new(),
                offset_stamps: HashMap::new(),
                pages: HashMap::new(),
                next_pgno: 1,
                tables: HashMap::new(),
                names: HashMap::new(),
                next_dbi: MAIN_DBI + 1,
                committed_txnid: 0,
                next_txnid: 1,
            }),
        }
    }

    /// Returns the stable dbi for `name`, allocating one on first use. The number survives
    /// drop + recreate, matching a host catalog's handle-reuse behavior.
    pub fn dbi(&self, name: &str) -> Dbi {
        let mut inner = self.inner.write();
        if let Some(dbi) = inner.names.get(name) {
            return *dbi;
        }
        let dbi = inner.next_dbi;
        inner.next_dbi += 1;
        inner.names.insert(name.to_owned(), dbi);
        dbi
    }

    pub fn begin_ro(&self) -> Txn<'_> {
        let inner = self.inner.read();
        Txn::new(self, inner.committed_txnid, inner.committed_txnid, false)
    }

    pub fn begin_rw(&self) -> Txn<'_> {
        let mut inner = self.inner.write();
        let front = inner.next_txnid;
        inner.next_txnid += 1;
        Txn::new(self, inner.committed_txnid, front, true)
    }
}

impl Default for Env {
    fn default() -> Self {
        Self::new()
    }
}

/// A transaction: read-only if `is_writer` is false. The only Dbi-carrying type this crate's
/// resolver is generic over.
pub struct Txn<'e> {
    env: &'e Env,
    basis: Txnid,
    front: Txnid,
    is_writer: bool,
    blocked: Cell<bool>,
    local_tables: RefCell<HashMap<Dbi, TableRecord>>,
    dirty_dbis: RefCell<HashSet<Dbi>>,
    dirty_pages: RefCell<Vec<MockPage>>,
}

impl<'e> Txn<'e> {
    fn new(env: &'e Env, basis: Txnid, front: Txnid, is_writer: bool) -> Self {
        Self {
            env,
            basis,
            front,
            is_writer,
            blocked: Cell::new(false),
            local_tables: RefCell::new(HashMap::new()),
            dirty_dbis: RefCell::new(HashSet::new()),
            dirty_pages: RefCell::new(Vec::new()),
        }
    }

    /// Marks this transaction blocked; the next `check_txn` call will fail.
    pub fn block(&self) {
        self.blocked.set(true);
    }

    /// This transaction's own working/snapshot txnid (`T.txnid`).
    pub fn txnid(&self) -> Txnid {
        self.front
    }

    fn lookup_page(&self, pgno: PageNo) -> HostResult<MockPage> {
        if let Some(page) = self.dirty_pages.borrow().iter().find(|p| p.pgno == pgno) {
            return Ok(page.clone());
        }
        let inner = self.env.inner.read();
        inner.pages.get(&pgno).cloned().ok_or_else(|| HostError::Other("page not found".into()))
    }

    /// Creates a table (or re-creates a previously dropped one). Writer-only.
    pub fn create_db(&self, name: &str) -> Dbi {
        debug_assert!(self.is_writer);
        let dbi = self.env.dbi(name);
        self.local_tables
            .borrow_mut()
            .insert(dbi, TableRecord { exists: true, root: None, mod_txnid: 0 });
        self.dirty_dbis.borrow_mut().insert(dbi);
        dbi
    }

    /// Drops a table. Writer-only.
    pub fn drop_db(&self, dbi: Dbi) {
        debug_assert!(self.is_writer);
        self.local_tables.borrow_mut().insert(dbi, TableRecord::absent());
        self.dirty_dbis.borrow_mut().insert(dbi);
    }

    /// Inserts or updates `key`. Writer-only; immediately visible to this same transaction's
    /// own cache calls (as `DIRTY`), invisible to everyone else until [`Txn::commit`].
    pub fn put(&self, dbi: Dbi, key: &[u8], value: &[u8]) {
        debug_assert!(self.is_writer);
        self.ensure_cached(dbi);

        let mut entries = {
            let record = self.local_tables.borrow().get(&dbi).cloned().unwrap_or(TableRecord::absent());
            match record.root {
                Some(pgno) => self.lookup_page(pgno).expect("dirty root must resolve").entries,
                None => Vec::new(),
            }
        };

        let (offset, length) = {
            let mut inner = self.env.inner.write();
            let offset = inner.mapping.len() as u64;
            inner.mapping.extend_from_slice(value);
            inner.offset_stamps.insert(offset, self.front);
            (offset, value.len() as u32)
        };
        let slice = ValueSlice { offset, length };

        entries.retain(|(k, _)| k != key);
        let pos = entries.partition_point(|(k, _)| k.as_slice() < key);
        entries.insert(pos, (key.to_vec(), slice));

        let pgno = {
            let mut inner = self.env.inner.write();
            let pgno = inner.next_pgno;
            inner.next_pgno += 1;
            pgno
        };
        self.dirty_pages.borrow_mut().push(MockPage { pgno, txnid: self.front, entries });
        self.local_tables.borrow_mut().insert(
            dbi,
            TableRecord { exists: true, root: Some(pgno), mod_txnid: self.front },
        );
        self.dirty_dbis.borrow_mut().insert(dbi);
    }

    fn ensure_cached(&self, dbi: Dbi) {
        if self.local_tables.borrow().contains_key(&dbi) {
            return;
        }
        let inner = self.env.inner.read();
        let record = inner.tables.get(&dbi).cloned().unwrap_or(TableRecord::absent());
        drop(inner);
        self.local_tables.borrow_mut().insert(dbi, record);
    }

    /// Commits this writer's table and page changes, advancing the environment's committed
    /// tip to this transaction's own txnid.
    pub fn commit(self) {
        debug_assert!(self.is_writer);
        let mut inner = self.env.inner.write();
        for dbi in self.dirty_dbis.into_inner() {
            if let Some(record) = self.local_tables.borrow().get(&dbi) {
                inner.tables.insert(dbi, record.clone());
            }
        }
        for page in self.dirty_pages.into_inner() {
            inner.pages.insert(page.pgno, page);
        }
        inner.committed_txnid = self.front;
    }
}

impl SnapshotOracle for Txn<'_> {
    type Dbi = Dbi;

    fn basis_snapshot(&self) -> Txnid {
        self.basis
    }

    fn front_txnid(&self) -> Txnid {
        if self.is_writer { self.front } else { self.basis }
    }

    fn is_writer(&self) -> bool {
        self.is_writer
    }

    fn innermost_dirty_writer_front(&self, dbi: Self::Dbi) -> Option<Txnid> {
        if !self.is_writer {
            return None;
        }
        if dbi == MAIN_DBI || self.dirty_dbis.borrow().contains(&dbi) {
            Some(self.front)
        } else {
            None
        }
    }
}

impl MappingView for Txn<'_> {
    fn page_size(&self) -> u64 {
        PAGE_SIZE
    }

    fn first_unallocated(&self) -> u64 {
        let inner = self.env.inner.read();
        inner.mapping.len().div_ceil(PAGE_SIZE as usize) as u64 + 1
    }

    fn page_txnid_at(&self, offset: u64) -> Option<Txnid> {
        let inner = self.env.inner.read();
        inner.offset_stamps.get(&offset).copied()
    }

    fn read_at(&self, offset: u64, length: u32) -> HostResult<Vec<u8>> {
        let inner = self.env.inner.read();
        let start = offset as usize;
        let end = start + length as usize;
        inner
            .mapping
            .get(start..end)
            .map(<[u8]>::to_vec)
            .ok_or_else(|| HostError::Other("read out of bounds".into()))
    }
}

impl Transaction for Txn<'_> {
    type Cursor = ();
    type Page = MockPage;
    type Node = usize;

    fn check_txn(&self, _blocked_mask: TxnFlags) -> HostResult<()> {
        if self.blocked.get() { Err(HostError::Other("transaction blocked".into())) } else { Ok(()) }
    }

    fn dbi_check(&self, _dbi: Self::Dbi) -> HostResult<()> {
        Ok(())
    }

    fn is_stale(&self, dbi: Self::Dbi) -> bool {
        !self.local_tables.borrow().contains_key(&dbi)
    }

    fn tbl_refresh(&mut self, dbi: Self::Dbi) -> HostResult<()> {
        let inner = self.env.inner.read();
        let record = inner.tables.get(&dbi).cloned().unwrap_or(TableRecord::absent());
        drop(inner);
        if !record.exists {
            return Err(HostError::NotFound);
        }
        self.local_tables.borrow_mut().insert(dbi, record);
        Ok(())
    }

    fn table_root(&self, dbi: Self::Dbi) -> Option<PageNo> {
        self.local_tables.borrow().get(&dbi).and_then(|r| r.root)
    }

    fn table_mod_txnid(&self, dbi: Self::Dbi) -> Txnid {
        self.local_tables.borrow().get(&dbi).map_or(0, |r| r.mod_txnid)
    }

    fn cursor_init(&self, _dbi: Self::Dbi) -> HostResult<Self::Cursor> {
        Ok(())
    }

    fn check_key(&self, _dbi: Self::Dbi, key: &[u8]) -> HostResult<Vec<u8>> {
        Ok(key.to_vec())
    }

    fn page_get(
        &self,
        _cursor: &mut Self::Cursor,
        pgno: PageNo,
        _trunk: Txnid,
    ) -> HostResult<Self::Page> {
        self.lookup_page(pgno)
    }

    fn cursor_push(&self, _cursor: &mut Self::Cursor, _page: &Self::Page, _ki: usize) -> HostResult<()> {
        Ok(())
    }

    fn check_leaf_type(&self, _page: &Self::Page) -> bool {
        true
    }

    fn is_branch(&self, _page: &Self::Page) -> bool {
        false
    }

    fn page_txnid(&self, page: &Self::Page) -> Txnid {
        page.txnid
    }

    fn page_numkeys(&self, page: &Self::Page) -> usize {
        page.entries.len()
    }

    fn page_node(&self, _page: &Self::Page, ki: usize) -> Self::Node {
        ki
    }

    fn node_search(&self, page: &Self::Page, key: &[u8]) -> NodeSearch<Self::Node> {
        match page.entries.binary_search_by(|(k, _)| k.as_slice().cmp(key)) {
            Ok(idx) => NodeSearch { node: Some(idx), exact: true, ki: idx },
            Err(idx) => {
                let ki = idx.saturating_sub(1);
                NodeSearch { node: page.entries.get(ki).map(|_| ki), exact: false, ki }
            }
        }
    }

    fn node_flags(&self, _node: &Self::Node) -> NodeFlags {
        NodeFlags::empty()
    }

    fn node_pgno(&self, _node: &Self::Node) -> PageNo {
        0
    }

    fn node_read(&self, page: &Self::Page, node: &Self::Node) -> HostResult<ValueSlice> {
        page.entries.get(*node).map(|(_, slice)| *slice).ok_or_else(|| HostError::Other("node vanished".into()))
    }
}
