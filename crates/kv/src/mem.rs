//! In-memory ordered key-value store.
//!
//! This backend keeps every table as a [`BTreeMap`] of keys to ordered value
//! groups, which makes the dup-sort ordering rules fall out of the map
//! structure directly. It backs tests, and `stratum-staged` uses it as the
//! pending-write overlay store.
//!
//! Cursors re-acquire the store lock on every operation and return owned
//! data, so a store handle can be shared between a cursor and a writer:
//! writes performed mid-scan never invalidate a cursor, they are simply
//! observed (or not) by its next stepping operation.

use crate::{
    model::{KvError, KvRead, KvTraverse, KvTraverseMut, KvWrite, RawKeyValue, RawValue},
    tables::TableRegistry,
};
use bytes::Bytes;
use parking_lot::RwLock;
use std::{
    borrow::Cow,
    collections::{BTreeMap, BTreeSet},
    ops::Bound,
    sync::Arc,
};

/// Ordered values of one key group. Plain tables keep at most one element.
type ValueGroup = BTreeSet<Bytes>;
/// One table: keys to value groups. Empty groups are never stored.
type StoreTable = BTreeMap<Vec<u8>, ValueGroup>;
/// All tables, by name.
type Store = BTreeMap<String, StoreTable>;

/// An ordered in-memory key-value store.
///
/// The store is synchronized with a [`RwLock`] and all access goes through
/// `&self`, so handles can be shared freely within a thread or across
/// threads. Dup-sort behavior is driven by the [`TableRegistry`] the store is
/// created with.
pub struct MemStore {
    tables: RwLock<Store>,
    registry: Arc<TableRegistry>,
}

impl core::fmt::Debug for MemStore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MemStore").finish_non_exhaustive()
    }
}

impl MemStore {
    /// Create an empty store using the given table configurations.
    pub fn new(registry: Arc<TableRegistry>) -> Self {
        Self { tables: RwLock::new(Store::new()), registry }
    }

    /// The table configuration registry this store was created with.
    pub const fn registry(&self) -> &Arc<TableRegistry> {
        &self.registry
    }

    /// Names of all tables holding at least one entry.
    pub fn table_names(&self) -> Vec<String> {
        self.tables.read().iter().filter(|(_, t)| !t.is_empty()).map(|(n, _)| n.clone()).collect()
    }
}

impl KvRead for MemStore {
    type Error = KvError;

    type Traverse<'a>
        = MemCursor<'a>
    where
        Self: 'a;

    fn traverse(&self, table: &str) -> Result<Self::Traverse<'_>, Self::Error> {
        Ok(MemCursor::new(self, table))
    }

    fn get(&self, table: &str, key: &[u8]) -> Result<Option<Bytes>, Self::Error> {
        let tables = self.tables.read();
        Ok(tables
            .get(table)
            .and_then(|t| t.get(key))
            .and_then(|group| group.first())
            .cloned())
    }
}

impl KvWrite for MemStore {
    fn put(&self, table: &str, key: &[u8], value: &[u8]) -> Result<(), Self::Error> {
        let info = self.registry.config(table);
        let mut tables = self.tables.write();
        let group = tables.entry(table.to_owned()).or_default().entry(key.to_vec()).or_default();
        if !info.dup_sort {
            group.clear();
        }
        group.insert(Bytes::copy_from_slice(value));
        Ok(())
    }

    fn append(&self, table: &str, key: &[u8], value: &[u8]) -> Result<(), Self::Error> {
        // The map keeps keys sorted regardless, so append degrades to put.
        self.put(table, key, value)
    }

    fn append_dup(&self, table: &str, key: &[u8], value: &[u8]) -> Result<(), Self::Error> {
        self.put(table, key, value)
    }

    fn delete(&self, table: &str, key: &[u8]) -> Result<(), Self::Error> {
        let mut tables = self.tables.write();
        if let Some(t) = tables.get_mut(table) {
            t.remove(key);
        }
        Ok(())
    }

    fn clear_table(&self, table: &str) -> Result<(), Self::Error> {
        self.tables.write().remove(table);
        Ok(())
    }
}

/// Cursor over one table of a [`MemStore`].
///
/// The position is the last observed `(key, value)` pair; stepping scans the
/// map from that position with exclusive bounds. After a missed lookup the
/// cursor is parked at the search key so stepping continues from there, but
/// [`current`] reports nothing.
///
/// [`current`]: KvTraverse::current
#[derive(Debug)]
pub struct MemCursor<'a> {
    store: &'a MemStore,
    table: String,
    pos: Option<(Vec<u8>, Bytes)>,
    /// Whether `pos` names an entry that was actually observed, as opposed
    /// to a parked search position.
    at_entry: bool,
}

impl<'a> MemCursor<'a> {
    /// Create a cursor over the specified table.
    pub fn new(store: &'a MemStore, table: &str) -> Self {
        Self { store, table: table.to_owned(), pos: None, at_entry: false }
    }

    fn set_entry(&mut self, key: &[u8], value: &Bytes) {
        self.pos = Some((key.to_vec(), value.clone()));
        self.at_entry = true;
    }

    fn park(&mut self, key: &[u8]) {
        self.pos = Some((key.to_vec(), Bytes::new()));
        self.at_entry = false;
    }

    fn clear_pos(&mut self) {
        self.pos = None;
        self.at_entry = false;
    }

    fn yield_pair(key: &[u8], value: &Bytes) -> Option<RawKeyValue<'a>> {
        Some((Cow::Owned(key.to_vec()), Cow::Owned(value.to_vec())))
    }
}

impl KvTraverse<KvError> for MemCursor<'_> {
    fn first<'b>(&'b mut self) -> Result<Option<RawKeyValue<'b>>, KvError> {
        let tables = self.store.tables.read();
        let entry = tables
            .get(&self.table)
            .and_then(|t| t.iter().next())
            .and_then(|(k, group)| group.first().map(|v| (k.clone(), v.clone())));
        drop(tables);
        let Some((key, value)) = entry else {
            self.clear_pos();
            return Ok(None);
        };
        self.set_entry(&key, &value);
        Ok(Self::yield_pair(&key, &value))
    }

    fn last<'b>(&'b mut self) -> Result<Option<RawKeyValue<'b>>, KvError> {
        let tables = self.store.tables.read();
        let entry = tables
            .get(&self.table)
            .and_then(|t| t.iter().next_back())
            .and_then(|(k, group)| group.last().map(|v| (k.clone(), v.clone())));
        drop(tables);
        let Some((key, value)) = entry else {
            self.clear_pos();
            return Ok(None);
        };
        self.set_entry(&key, &value);
        Ok(Self::yield_pair(&key, &value))
    }

    fn exact<'b>(&'b mut self, key: &[u8]) -> Result<Option<RawValue<'b>>, KvError> {
        let tables = self.store.tables.read();
        let value =
            tables.get(&self.table).and_then(|t| t.get(key)).and_then(|g| g.first()).cloned();
        drop(tables);
        match value {
            Some(value) => {
                self.set_entry(key, &value);
                Ok(Some(Cow::Owned(value.to_vec())))
            }
            None => {
                self.park(key);
                Ok(None)
            }
        }
    }

    fn lower_bound<'b>(&'b mut self, key: &[u8]) -> Result<Option<RawKeyValue<'b>>, KvError> {
        let tables = self.store.tables.read();
        let entry = tables.get(&self.table).and_then(|t| {
            t.range::<[u8], _>((Bound::Included(key), Bound::Unbounded))
                .next()
                .and_then(|(k, group)| group.first().map(|v| (k.clone(), v.clone())))
        });
        drop(tables);
        let Some((found, value)) = entry else {
            self.park(key);
            return Ok(None);
        };
        self.set_entry(&found, &value);
        Ok(Self::yield_pair(&found, &value))
    }

    fn lower_bound_dup<'b>(
        &'b mut self,
        key: &[u8],
        value: &[u8],
    ) -> Result<Option<RawValue<'b>>, KvError> {
        let tables = self.store.tables.read();
        let found = tables.get(&self.table).and_then(|t| t.get(key)).and_then(|group| {
            group.range::<[u8], _>((Bound::Included(value), Bound::Unbounded)).next().cloned()
        });
        drop(tables);
        let Some(found) = found else {
            return Ok(None);
        };
        self.set_entry(key, &found);
        Ok(Some(Cow::Owned(found.to_vec())))
    }

    fn read_next<'b>(&'b mut self) -> Result<Option<RawKeyValue<'b>>, KvError> {
        let Some((pk, pv)) = self.pos.clone() else {
            return self.first();
        };
        let tables = self.store.tables.read();
        let table = tables.get(&self.table);
        // Next value within the current key group first.
        let within = table.and_then(|t| t.get(&pk)).and_then(|group| {
            group.range::<[u8], _>((Bound::Excluded(&pv[..]), Bound::Unbounded)).next().cloned()
        });
        if let Some(value) = within {
            drop(tables);
            self.set_entry(&pk, &value);
            return Ok(Self::yield_pair(&pk, &value));
        }
        let entry = table.and_then(|t| {
            t.range::<[u8], _>((Bound::Excluded(&pk[..]), Bound::Unbounded))
                .next()
                .and_then(|(k, group)| group.first().map(|v| (k.clone(), v.clone())))
        });
        drop(tables);
        let Some((key, value)) = entry else {
            return Ok(None);
        };
        self.set_entry(&key, &value);
        Ok(Self::yield_pair(&key, &value))
    }

    fn next_dup<'b>(&'b mut self) -> Result<Option<RawKeyValue<'b>>, KvError> {
        let Some((pk, pv)) = self.pos.clone() else {
            return Ok(None);
        };
        let tables = self.store.tables.read();
        let value = tables.get(&self.table).and_then(|t| t.get(&pk)).and_then(|group| {
            group.range::<[u8], _>((Bound::Excluded(&pv[..]), Bound::Unbounded)).next().cloned()
        });
        drop(tables);
        let Some(value) = value else {
            return Ok(None);
        };
        self.set_entry(&pk, &value);
        Ok(Self::yield_pair(&pk, &value))
    }

    fn next_no_dup<'b>(&'b mut self) -> Result<Option<RawKeyValue<'b>>, KvError> {
        let Some((pk, _)) = self.pos.clone() else {
            return self.first();
        };
        let tables = self.store.tables.read();
        let entry = tables.get(&self.table).and_then(|t| {
            t.range::<[u8], _>((Bound::Excluded(&pk[..]), Bound::Unbounded))
                .next()
                .and_then(|(k, group)| group.first().map(|v| (k.clone(), v.clone())))
        });
        drop(tables);
        let Some((key, value)) = entry else {
            return Ok(None);
        };
        self.set_entry(&key, &value);
        Ok(Self::yield_pair(&key, &value))
    }

    fn read_prev<'b>(&'b mut self) -> Result<Option<RawKeyValue<'b>>, KvError> {
        let Some((pk, pv)) = self.pos.clone() else {
            return self.last();
        };
        let tables = self.store.tables.read();
        let table = tables.get(&self.table);
        // Previous value within the current key group first.
        let within = table.and_then(|t| t.get(&pk)).and_then(|group| {
            group.range::<[u8], _>((Bound::Unbounded, Bound::Excluded(&pv[..]))).next_back().cloned()
        });
        if let Some(value) = within {
            drop(tables);
            self.set_entry(&pk, &value);
            return Ok(Self::yield_pair(&pk, &value));
        }
        let entry = table.and_then(|t| {
            t.range::<[u8], _>((Bound::Unbounded, Bound::Excluded(&pk[..])))
                .next_back()
                .and_then(|(k, group)| group.last().map(|v| (k.clone(), v.clone())))
        });
        drop(tables);
        let Some((key, value)) = entry else {
            self.clear_pos();
            return Ok(None);
        };
        self.set_entry(&key, &value);
        Ok(Self::yield_pair(&key, &value))
    }

    fn current<'b>(&'b mut self) -> Result<Option<RawKeyValue<'b>>, KvError> {
        if !self.at_entry {
            return Ok(None);
        }
        let Some((key, value)) = self.pos.clone() else {
            return Ok(None);
        };
        Ok(Self::yield_pair(&key, &value))
    }
}

impl KvTraverseMut<KvError> for MemCursor<'_> {
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), KvError> {
        self.store.put(&self.table, key, value)?;
        self.set_entry(key, &Bytes::copy_from_slice(value));
        Ok(())
    }

    fn append(&mut self, key: &[u8], value: &[u8]) -> Result<(), KvError> {
        self.store.append(&self.table, key, value)?;
        self.set_entry(key, &Bytes::copy_from_slice(value));
        Ok(())
    }

    fn append_dup(&mut self, key: &[u8], value: &[u8]) -> Result<(), KvError> {
        self.store.append_dup(&self.table, key, value)?;
        self.set_entry(key, &Bytes::copy_from_slice(value));
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), KvError> {
        self.store.delete(&self.table, key)?;
        if let Some((pk, _)) = &self.pos {
            if pk == key {
                self.at_entry = false;
            }
        }
        Ok(())
    }

    fn delete_current(&mut self) -> Result<(), KvError> {
        let Some((pk, pv)) = self.pos.clone().filter(|_| self.at_entry) else {
            return Err(KvError::Inner("cursor has no current entry".into()));
        };
        let mut tables = self.store.tables.write();
        if let Some(t) = tables.get_mut(&self.table) {
            if let Some(group) = t.get_mut(&pk) {
                group.remove(&pv[..] as &[u8]);
                if group.is_empty() {
                    t.remove(&pk);
                }
            }
        }
        drop(tables);
        // Stepping continues from the deleted slot.
        self.at_entry = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::TableInfo;

    fn registry() -> Arc<TableRegistry> {
        let mut registry = TableRegistry::new();
        registry.define("plain", TableInfo::plain());
        registry.define("dup", TableInfo::dup());
        Arc::new(registry)
    }

    fn collect(cursor: &mut MemCursor<'_>) -> Vec<(Vec<u8>, Vec<u8>)> {
        let mut out = Vec::new();
        let mut entry = cursor.first().unwrap();
        while let Some((k, v)) = entry {
            out.push((k.into_owned(), v.into_owned()));
            entry = cursor.read_next().unwrap();
        }
        out
    }

    #[test]
    fn put_replaces_in_plain_tables() {
        let store = MemStore::new(registry());
        store.put("plain", b"k", b"old").unwrap();
        store.put("plain", b"k", b"new").unwrap();
        assert_eq!(store.get("plain", b"k").unwrap().as_deref(), Some(b"new" as &[u8]));
    }

    #[test]
    fn put_accumulates_in_dup_tables() {
        let store = MemStore::new(registry());
        store.put("dup", b"k", b"2").unwrap();
        store.put("dup", b"k", b"1").unwrap();
        store.put("dup", b"k", b"3").unwrap();

        let mut cursor = store.traverse("dup").unwrap();
        let entries = collect(&mut cursor);
        assert_eq!(
            entries,
            vec![
                (b"k".to_vec(), b"1".to_vec()),
                (b"k".to_vec(), b"2".to_vec()),
                (b"k".to_vec(), b"3".to_vec()),
            ]
        );
    }

    #[test]
    fn scan_is_ordered_across_keys() {
        let store = MemStore::new(registry());
        store.put("plain", b"b", b"2").unwrap();
        store.put("plain", b"a", b"1").unwrap();
        store.put("plain", b"c", b"3").unwrap();

        let mut cursor = store.traverse("plain").unwrap();
        let keys: Vec<_> = collect(&mut cursor).into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
    }

    #[test]
    fn exact_does_not_fall_through_to_next_key() {
        let store = MemStore::new(registry());
        store.put("plain", b"a", b"1").unwrap();
        store.put("plain", b"c", b"3").unwrap();

        let mut cursor = store.traverse("plain").unwrap();
        assert!(cursor.exact(b"b").unwrap().is_none());
        assert!(cursor.current().unwrap().is_none());
        // The cursor is parked at the search key; stepping resumes there.
        let (k, _) = cursor.read_next().unwrap().unwrap();
        assert_eq!(k.as_ref(), b"c");
    }

    #[test]
    fn lower_bound_finds_the_next_key() {
        let store = MemStore::new(registry());
        store.put("plain", b"a", b"1").unwrap();
        store.put("plain", b"c", b"3").unwrap();

        let mut cursor = store.traverse("plain").unwrap();
        let (k, v) = cursor.lower_bound(b"b").unwrap().unwrap();
        assert_eq!((k.as_ref(), v.as_ref()), (b"c" as &[u8], b"3" as &[u8]));
        assert!(cursor.lower_bound(b"d").unwrap().is_none());
    }

    #[test]
    fn dup_stepping_stays_inside_the_group() {
        let store = MemStore::new(registry());
        store.put("dup", b"a", b"1").unwrap();
        store.put("dup", b"a", b"2").unwrap();
        store.put("dup", b"b", b"9").unwrap();

        let mut cursor = store.traverse("dup").unwrap();
        cursor.first().unwrap();
        let (k, v) = cursor.next_dup().unwrap().unwrap();
        assert_eq!((k.as_ref(), v.as_ref()), (b"a" as &[u8], b"2" as &[u8]));
        // Group exhausted: next_dup stops, read_next crosses into "b".
        assert!(cursor.next_dup().unwrap().is_none());
        let (k, _) = cursor.read_next().unwrap().unwrap();
        assert_eq!(k.as_ref(), b"b");
    }

    #[test]
    fn next_no_dup_skips_the_rest_of_the_group() {
        let store = MemStore::new(registry());
        store.put("dup", b"a", b"1").unwrap();
        store.put("dup", b"a", b"2").unwrap();
        store.put("dup", b"b", b"9").unwrap();

        let mut cursor = store.traverse("dup").unwrap();
        cursor.first().unwrap();
        let (k, v) = cursor.next_no_dup().unwrap().unwrap();
        assert_eq!((k.as_ref(), v.as_ref()), (b"b" as &[u8], b"9" as &[u8]));
        assert!(cursor.next_no_dup().unwrap().is_none());
    }

    #[test]
    fn lower_bound_dup_requires_the_exact_key() {
        let store = MemStore::new(registry());
        store.put("dup", b"a", b"1").unwrap();
        store.put("dup", b"a", b"3").unwrap();

        let mut cursor = store.traverse("dup").unwrap();
        assert_eq!(
            cursor.lower_bound_dup(b"a", b"2").unwrap().as_deref(),
            Some(b"3" as &[u8])
        );
        assert!(cursor.lower_bound_dup(b"a", b"4").unwrap().is_none());
        assert!(cursor.lower_bound_dup(b"b", b"0").unwrap().is_none());
    }

    #[test]
    fn read_prev_walks_backward() {
        let store = MemStore::new(registry());
        store.put("dup", b"a", b"1").unwrap();
        store.put("dup", b"a", b"2").unwrap();
        store.put("dup", b"b", b"9").unwrap();

        let mut cursor = store.traverse("dup").unwrap();
        cursor.last().unwrap();
        let (k, v) = cursor.read_prev().unwrap().unwrap();
        assert_eq!((k.as_ref(), v.as_ref()), (b"a" as &[u8], b"2" as &[u8]));
        let (k, v) = cursor.read_prev().unwrap().unwrap();
        assert_eq!((k.as_ref(), v.as_ref()), (b"a" as &[u8], b"1" as &[u8]));
        assert!(cursor.read_prev().unwrap().is_none());
    }

    #[test]
    fn delete_current_removes_one_dup_value() {
        let store = MemStore::new(registry());
        store.put("dup", b"a", b"1").unwrap();
        store.put("dup", b"a", b"2").unwrap();

        let mut cursor = store.traverse("dup").unwrap();
        cursor.first().unwrap();
        cursor.delete_current().unwrap();
        assert!(cursor.current().unwrap().is_none());
        let (k, v) = cursor.read_next().unwrap().unwrap();
        assert_eq!((k.as_ref(), v.as_ref()), (b"a" as &[u8], b"2" as &[u8]));
    }

    #[test]
    fn writes_mid_scan_are_observed_on_the_next_step() {
        let store = MemStore::new(registry());
        store.put("plain", b"a", b"1").unwrap();

        let mut cursor = store.traverse("plain").unwrap();
        cursor.first().unwrap();
        store.put("plain", b"b", b"2").unwrap();
        let (k, _) = cursor.read_next().unwrap().unwrap();
        assert_eq!(k.as_ref(), b"b");
    }

    #[test]
    fn clear_table_empties_the_table() {
        let store = MemStore::new(registry());
        store.put("plain", b"a", b"1").unwrap();
        store.clear_table("plain").unwrap();
        assert!(store.get("plain", b"a").unwrap().is_none());
        let mut cursor = store.traverse("plain").unwrap();
        assert!(cursor.first().unwrap().is_none());
        assert!(store.table_names().is_empty());
    }
}
