//! Conformance scenarios for staged scans over arbitrary base stores.
//!
//! [`conformance`] runs the whole suite against a base store created with
//! [`scenario_registry`]. Each scenario stages writes over base rows in its
//! own tables, so the suite can run in any order against a single store.
//! Backends other than the in-memory store can run it against their own
//! implementation by enabling the `test-utils` feature.

use crate::{StagedCursor, StagedTx};
use std::sync::Arc;
use stratum_kv::{KvReadError, KvTraverse, KvWrite, TableInfo, TableRegistry};

const PRECEDENCE: &str = "conf_precedence";
const TOMBSTONE: &str = "conf_tombstone";
const CLEAR: &str = "conf_clear";
const DUP_MERGE: &str = "conf_dup_merge";
const EXACT: &str = "conf_exact";
const AUTO_TOMBSTONE: &str = "conf_auto_tombstone";
const BOUNDS: &str = "conf_bounds";
const UNION: &str = "conf_union";

/// The table configurations the scenarios expect.
pub fn scenario_registry() -> Arc<TableRegistry> {
    let mut registry = TableRegistry::new();
    for table in [PRECEDENCE, TOMBSTONE, CLEAR, EXACT, BOUNDS, UNION] {
        registry.define(table, TableInfo::plain());
    }
    registry.define(DUP_MERGE, TableInfo::dup());
    // Logical keys of 5 bytes, stored as 2-byte physical keys.
    registry.define(AUTO_TOMBSTONE, TableInfo::auto_dup(5, 2));
    Arc::new(registry)
}

/// Run the full scenario suite against a base store created with
/// [`scenario_registry`].
pub fn conformance<B: KvWrite>(base: &B, registry: Arc<TableRegistry>) {
    test_overlay_precedence(base, registry.clone());
    test_tombstone_invisibility(base, registry.clone());
    test_clear_invisibility(base, registry.clone());
    test_dup_merge(base, registry.clone());
    test_exact_contract(base, registry.clone());
    test_auto_dup_tombstone(base, registry.clone());
    test_lower_bound_contract(base, registry.clone());
    test_merge_equivalence(base, registry);
}

fn collect<C, E>(cursor: &mut StagedCursor<'_, C, E>) -> Vec<(Vec<u8>, Vec<u8>)>
where
    C: KvTraverse<E>,
    E: KvReadError,
{
    let mut out = Vec::new();
    let mut entry = cursor.first().unwrap().map(|(k, v)| (k.into_owned(), v.into_owned()));
    while let Some(pair) = entry {
        out.push(pair);
        entry = cursor.read_next().unwrap().map(|(k, v)| (k.into_owned(), v.into_owned()));
    }
    out
}

fn kv(key: &[u8], value: &[u8]) -> (Vec<u8>, Vec<u8>) {
    (key.to_vec(), value.to_vec())
}

/// A staged write shadows the base-store value for the same key.
pub fn test_overlay_precedence<B: KvWrite>(base: &B, registry: Arc<TableRegistry>) {
    base.put(PRECEDENCE, b"a", b"1").unwrap();
    base.put(PRECEDENCE, b"b", b"2").unwrap();

    let staged = StagedTx::new(base, registry);
    staged.put(PRECEDENCE, b"b", b"9").unwrap();

    let mut cursor = staged.cursor(PRECEDENCE).unwrap();
    assert_eq!(collect(&mut cursor), vec![kv(b"a", b"1"), kv(b"b", b"9")]);
}

/// A staged deletion hides the base-store entry from the scan.
pub fn test_tombstone_invisibility<B: KvWrite>(base: &B, registry: Arc<TableRegistry>) {
    base.put(TOMBSTONE, b"a", b"1").unwrap();
    base.put(TOMBSTONE, b"b", b"2").unwrap();
    base.put(TOMBSTONE, b"c", b"3").unwrap();

    let staged = StagedTx::new(base, registry);
    staged.delete(TOMBSTONE, b"b").unwrap();

    let mut cursor = staged.cursor(TOMBSTONE).unwrap();
    assert_eq!(collect(&mut cursor), vec![kv(b"a", b"1"), kv(b"c", b"3")]);
}

/// A staged table clear hides every base-store entry; staged rows survive.
pub fn test_clear_invisibility<B: KvWrite>(base: &B, registry: Arc<TableRegistry>) {
    base.put(CLEAR, b"a", b"1").unwrap();
    base.put(CLEAR, b"b", b"2").unwrap();

    let staged = StagedTx::new(base, registry);
    staged.clear_table(CLEAR).unwrap();
    staged.put(CLEAR, b"x", b"7").unwrap();

    let mut cursor = staged.cursor(CLEAR).unwrap();
    assert_eq!(collect(&mut cursor), vec![kv(b"x", b"7")]);
}

/// Dup values from both sides interleave in value order within a key group.
pub fn test_dup_merge<B: KvWrite>(base: &B, registry: Arc<TableRegistry>) {
    base.put(DUP_MERGE, b"k", b"1").unwrap();
    base.put(DUP_MERGE, b"k", b"3").unwrap();

    let staged = StagedTx::new(base, registry);
    staged.put(DUP_MERGE, b"k", b"2").unwrap();

    let mut cursor = staged.cursor(DUP_MERGE).unwrap();
    assert_eq!(
        collect(&mut cursor),
        vec![kv(b"k", b"1"), kv(b"k", b"2"), kv(b"k", b"3")]
    );
}

/// Exact lookups prefer the staged value and respect tombstones.
pub fn test_exact_contract<B: KvWrite>(base: &B, registry: Arc<TableRegistry>) {
    base.put(EXACT, b"k", b"1").unwrap();
    base.put(EXACT, b"t", b"2").unwrap();

    let staged = StagedTx::new(base, registry);
    staged.put(EXACT, b"k", b"9").unwrap();
    staged.delete(EXACT, b"t").unwrap();

    let mut cursor = staged.cursor(EXACT).unwrap();
    assert_eq!(cursor.exact(b"k").unwrap().as_deref(), Some(b"9" as &[u8]));
    assert!(cursor.exact(b"t").unwrap().is_none());
    assert!(cursor.exact(b"zz").unwrap().is_none());
}

/// Tombstones address auto-dupsort entries by their logical key.
pub fn test_auto_dup_tombstone<B: KvWrite>(base: &B, registry: Arc<TableRegistry>) {
    base.put(AUTO_TOMBSTONE, b"AB", b"CDEFG").unwrap();
    base.put(AUTO_TOMBSTONE, b"AB", b"XYZVW").unwrap();

    let staged = StagedTx::new(base, registry);
    staged.delete(AUTO_TOMBSTONE, b"ABCDE").unwrap();

    let mut cursor = staged.cursor(AUTO_TOMBSTONE).unwrap();
    assert_eq!(collect(&mut cursor), vec![kv(b"AB", b"XYZVW")]);
}

/// `lower_bound` lands at or above the search key on the merged view.
pub fn test_lower_bound_contract<B: KvWrite>(base: &B, registry: Arc<TableRegistry>) {
    base.put(BOUNDS, b"b", b"2").unwrap();
    base.put(BOUNDS, b"d", b"4").unwrap();

    let staged = StagedTx::new(base, registry);
    staged.put(BOUNDS, b"c", b"3").unwrap();

    let mut cursor = staged.cursor(BOUNDS).unwrap();
    for probe in [b"a" as &[u8], b"b", b"c", b"d"] {
        let Some((found, _)) = cursor.lower_bound(probe).unwrap() else {
            panic!("lower_bound({probe:?}) found nothing");
        };
        assert!(found.as_ref() >= probe, "lower_bound({probe:?}) returned {found:?}");
    }
    assert!(cursor.lower_bound(b"e").unwrap().is_none());
}

/// A full scan yields exactly the tombstone-filtered union of both sides,
/// with the staged side winning collisions, in non-decreasing key order.
pub fn test_merge_equivalence<B: KvWrite>(base: &B, registry: Arc<TableRegistry>) {
    let base_rows: &[(&[u8], &[u8])] =
        &[(b"a", b"1"), (b"c", b"3"), (b"e", b"5"), (b"g", b"7")];
    for (key, value) in base_rows {
        base.put(UNION, key, value).unwrap();
    }

    let staged = StagedTx::new(base, registry);
    staged.put(UNION, b"b", b"20").unwrap();
    staged.put(UNION, b"c", b"30").unwrap();
    staged.delete(UNION, b"e").unwrap();

    let mut cursor = staged.cursor(UNION).unwrap();
    let entries = collect(&mut cursor);
    assert_eq!(
        entries,
        vec![
            kv(b"a", b"1"),
            kv(b"b", b"20"),
            kv(b"c", b"30"),
            kv(b"g", b"7"),
        ]
    );
    assert!(entries.windows(2).all(|w| w[0].0 <= w[1].0), "scan keys must be ordered");
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratum_kv::MemStore;

    #[test]
    fn mem_store_passes_the_suite() {
        let registry = scenario_registry();
        let base = MemStore::new(registry.clone());
        conformance(&base, registry);
    }
}
