//! Staged transactions and their pending-write state.

use crate::{
    cursor::StagedCursor,
    error::{StagedError, StagedResult},
};
use ahash::{AHashMap, AHashSet};
use bytes::Bytes;
use parking_lot::RwLock;
use std::sync::Arc;
use stratum_kv::{KvRead, KvTraverse, KvWrite, MemCursor, MemStore, TableInfo, TableRegistry};
use tracing::{debug, trace};

/// Pending-write state shared between a staged transaction and its cursors.
///
/// Three pieces of state express every buffered mutation:
///
/// - the **overlay**: an in-memory store holding inserted rows,
/// - **tombstones**: per-table sets of deleted keys (for auto-dupsort tables
///   these are logical keys),
/// - **cleared tables**: tables whose base-side contents are hidden wholesale.
///
/// All methods take `&self`; the state is internally synchronized so a merge
/// cursor can consult it while a writer holding the same transaction mutates
/// it.
pub struct Pending {
    overlay: MemStore,
    deleted: RwLock<AHashMap<String, AHashSet<Vec<u8>>>>,
    cleared: RwLock<AHashSet<String>>,
    registry: Arc<TableRegistry>,
}

impl core::fmt::Debug for Pending {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Pending").finish_non_exhaustive()
    }
}

impl Pending {
    fn new(registry: Arc<TableRegistry>) -> Self {
        Self {
            overlay: MemStore::new(registry.clone()),
            deleted: RwLock::new(AHashMap::new()),
            cleared: RwLock::new(AHashSet::new()),
            registry,
        }
    }

    /// True if the table's base-side contents are hidden by a staged clear.
    pub fn is_table_cleared(&self, table: &str) -> bool {
        self.cleared.read().contains(table)
    }

    /// True if the key carries a tombstone in this table. For auto-dupsort
    /// tables the key is the logical (effective) key.
    pub fn is_entry_deleted(&self, table: &str, key: &[u8]) -> bool {
        self.deleted.read().get(table).is_some_and(|keys| keys.contains(key))
    }

    /// The configuration of a table, as seen by this staging layer.
    pub fn config(&self, table: &str) -> TableInfo {
        self.registry.config(table)
    }

    pub(crate) const fn overlay(&self) -> &MemStore {
        &self.overlay
    }

    pub(crate) fn put(&self, table: &str, key: &[u8], value: &[u8]) -> StagedResult<()> {
        self.overlay.put(table, key, value)?;
        Ok(())
    }

    pub(crate) fn append(&self, table: &str, key: &[u8], value: &[u8]) -> StagedResult<()> {
        self.overlay.append(table, key, value)?;
        Ok(())
    }

    pub(crate) fn append_dup(&self, table: &str, key: &[u8], value: &[u8]) -> StagedResult<()> {
        self.overlay.append_dup(table, key, value)?;
        Ok(())
    }

    pub(crate) fn delete(&self, table: &str, key: &[u8]) -> StagedResult<()> {
        self.deleted.write().entry(table.to_owned()).or_default().insert(key.to_vec());
        self.overlay.delete(table, key)?;
        Ok(())
    }

    pub(crate) fn clear_table(&self, table: &str) -> StagedResult<()> {
        trace!(%table, "staging table clear");
        self.cleared.write().insert(table.to_owned());
        self.overlay.clear_table(table)?;
        Ok(())
    }

    fn cleared_tables(&self) -> Vec<String> {
        self.cleared.read().iter().cloned().collect()
    }

    fn deleted_keys(&self) -> Vec<(String, Vec<Vec<u8>>)> {
        self.deleted
            .read()
            .iter()
            .map(|(table, keys)| (table.clone(), keys.iter().cloned().collect()))
            .collect()
    }
}

/// A staged transaction over a read-only base transaction.
///
/// Writes are buffered in [`Pending`] state; reads and cursors present the
/// union of the buffered state and the base, with buffered writes taking
/// precedence. Nothing touches the base until [`flush`] replays the buffer
/// into a writable store.
///
/// [`flush`]: StagedTx::flush
pub struct StagedTx<'t, B> {
    base: &'t B,
    pending: Pending,
}

impl<B> core::fmt::Debug for StagedTx<'_, B> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("StagedTx").finish_non_exhaustive()
    }
}

impl<'t, B: KvRead> StagedTx<'t, B> {
    /// Create a staged transaction over the given base transaction.
    pub fn new(base: &'t B, registry: Arc<TableRegistry>) -> Self {
        Self { base, pending: Pending::new(registry) }
    }

    /// The base transaction this staging layer reads through to.
    pub const fn base(&self) -> &B {
        self.base
    }

    /// The pending-write state shared with this transaction's cursors.
    pub const fn pending(&self) -> &Pending {
        &self.pending
    }

    /// Stage an insert. For dup-sort tables the value joins the key's group;
    /// otherwise it replaces any previously staged value.
    pub fn put(&self, table: &str, key: &[u8], value: &[u8]) -> StagedResult<()> {
        self.pending.put(table, key, value)
    }

    /// Stage an append of a key greater than all existing keys.
    pub fn append(&self, table: &str, key: &[u8], value: &[u8]) -> StagedResult<()> {
        self.pending.append(table, key, value)
    }

    /// Stage an append at the end of a key's dup group.
    pub fn append_dup(&self, table: &str, key: &[u8], value: &[u8]) -> StagedResult<()> {
        self.pending.append_dup(table, key, value)
    }

    /// Stage a deletion: the key is tombstoned against the base store and any
    /// staged rows for it are dropped.
    pub fn delete(&self, table: &str, key: &[u8]) -> StagedResult<()> {
        self.pending.delete(table, key)
    }

    /// Stage a table clear, hiding the table's base-side contents and
    /// dropping its staged rows.
    pub fn clear_table(&self, table: &str) -> StagedResult<()> {
        self.pending.clear_table(table)
    }

    /// Get the value stored under a key, honoring staged writes, tombstones,
    /// and clears.
    pub fn get(&self, table: &str, key: &[u8]) -> StagedResult<Option<Bytes>> {
        if let Some(value) = self.pending.overlay().get(table, key)? {
            return Ok(Some(value));
        }
        if self.pending.is_table_cleared(table) || self.pending.is_entry_deleted(table, key) {
            return Ok(None);
        }
        self.base.get(table, key).map_err(StagedError::from_base)
    }

    /// Create a merge cursor presenting the ordered union of the base table
    /// and the staged writes for it.
    pub fn cursor(&self, table: &str) -> StagedResult<StagedCursor<'_, B::Traverse<'_>, B::Error>> {
        let base = self.base.traverse(table).map_err(StagedError::from_base)?;
        let overlay: MemCursor<'_> = self.pending.overlay().traverse(table)?;
        Ok(StagedCursor::new(base, overlay, &self.pending, table))
    }

    /// Replay the buffered state into a writable store: table clears first,
    /// then tombstoned deletions, then staged rows.
    pub fn flush<W: KvWrite>(&self, sink: &W) -> StagedResult<()> {
        let cleared = self.pending.cleared_tables();
        for table in &cleared {
            sink.clear_table(table).map_err(StagedError::from_base)?;
        }

        let deleted = self.pending.deleted_keys();
        let mut tombstones = 0usize;
        for (table, keys) in &deleted {
            tombstones += keys.len();
            for key in keys {
                sink.delete(table, key).map_err(StagedError::from_base)?;
            }
        }

        let mut rows = 0usize;
        for table in self.pending.overlay().table_names() {
            let mut cursor = self.pending.overlay().traverse(&table)?;
            let mut entry = cursor.first()?.map(|(k, v)| (k.into_owned(), v.into_owned()));
            while let Some((key, value)) = entry {
                sink.put(&table, &key, &value).map_err(StagedError::from_base)?;
                rows += 1;
                entry = cursor.read_next()?.map(|(k, v)| (k.into_owned(), v.into_owned()));
            }
        }

        debug!(cleared = cleared.len(), tombstones, rows, "flushed staged writes");
        Ok(())
    }

    /// Drop every buffered write without applying it.
    pub fn discard(self) {}
}

impl<'t, B: KvRead> KvRead for StagedTx<'t, B> {
    type Error = StagedError;

    type Traverse<'a>
        = StagedCursor<'a, B::Traverse<'a>, B::Error>
    where
        Self: 'a;

    fn traverse(&self, table: &str) -> Result<Self::Traverse<'_>, Self::Error> {
        self.cursor(table)
    }

    fn get(&self, table: &str, key: &[u8]) -> Result<Option<Bytes>, Self::Error> {
        StagedTx::get(self, table, key)
    }
}
