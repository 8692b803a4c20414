//! End-to-end tests for the staged mutation layer over the in-memory store.
//!
//! Scan semantics are covered by the shared conformance suite; the tests
//! here exercise what the suite does not: flushing, discarding, and the
//! staged transaction acting as an ordinary read store.

use std::sync::Arc;
use stratum_kv::{KvRead, KvTraverse, KvWrite, MemStore, TableInfo, TableRegistry};
use stratum_staged::{StagedTx, conformance};

const ACCOUNTS: &str = "accounts";
const HISTORY: &str = "history";

fn registry() -> Arc<TableRegistry> {
    let mut registry = TableRegistry::new();
    registry.define(ACCOUNTS, TableInfo::plain());
    registry.define(HISTORY, TableInfo::dup());
    Arc::new(registry)
}

fn scan<R: KvRead>(store: &R, table: &str) -> Vec<(Vec<u8>, Vec<u8>)> {
    let mut cursor = store.traverse(table).unwrap();
    let mut out = Vec::new();
    let mut entry = cursor.first().unwrap().map(|(k, v)| (k.into_owned(), v.into_owned()));
    while let Some(pair) = entry {
        out.push(pair);
        entry = cursor.read_next().unwrap().map(|(k, v)| (k.into_owned(), v.into_owned()));
    }
    out
}

#[test]
fn mem_store_passes_the_conformance_suite() {
    let registry = conformance::scenario_registry();
    let base = MemStore::new(registry.clone());
    conformance::conformance(&base, registry);
}

#[test]
fn staged_view_survives_a_flush_round_trip() {
    let registry = registry();
    let base = MemStore::new(registry.clone());
    base.put(ACCOUNTS, b"alice", b"100").unwrap();
    base.put(ACCOUNTS, b"bob", b"50").unwrap();
    base.put(HISTORY, b"alice", b"block-1").unwrap();
    base.put(HISTORY, b"alice", b"block-3").unwrap();

    let staged = StagedTx::new(&base, registry);
    staged.put(ACCOUNTS, b"alice", b"90").unwrap();
    staged.put(ACCOUNTS, b"carol", b"10").unwrap();
    staged.delete(ACCOUNTS, b"bob").unwrap();
    staged.append_dup(HISTORY, b"alice", b"block-2").unwrap();

    let staged_accounts = scan(&staged, ACCOUNTS);
    let staged_history = scan(&staged, HISTORY);

    staged.flush(&base).unwrap();

    // After replaying the buffer into the base, a plain scan of the base
    // matches the staged view exactly.
    assert_eq!(scan(&base, ACCOUNTS), staged_accounts);
    assert_eq!(scan(&base, HISTORY), staged_history);
    assert!(base.get(ACCOUNTS, b"bob").unwrap().is_none());
}

#[test]
fn cleared_tables_flush_as_a_replacement() {
    let registry = registry();
    let base = MemStore::new(registry.clone());
    base.put(ACCOUNTS, b"old", b"1").unwrap();
    base.put(ACCOUNTS, b"stale", b"2").unwrap();

    let staged = StagedTx::new(&base, registry);
    staged.clear_table(ACCOUNTS).unwrap();
    staged.put(ACCOUNTS, b"fresh", b"3").unwrap();

    let staged_view = scan(&staged, ACCOUNTS);
    staged.flush(&base).unwrap();

    assert_eq!(scan(&base, ACCOUNTS), staged_view);
    assert_eq!(staged_view, vec![(b"fresh".to_vec(), b"3".to_vec())]);
}

#[test]
fn staged_tx_serves_reads_like_any_store() {
    // A staged transaction is a KvRead like the store it wraps, so generic
    // read paths accept either.
    fn lookup<R: KvRead>(store: &R, key: &[u8]) -> Option<Vec<u8>> {
        store.get(ACCOUNTS, key).unwrap().map(|b| b.to_vec())
    }

    let registry = registry();
    let base = MemStore::new(registry.clone());
    base.put(ACCOUNTS, b"alice", b"100").unwrap();

    let staged = StagedTx::new(&base, registry);
    staged.put(ACCOUNTS, b"bob", b"7").unwrap();

    assert_eq!(lookup(&base, b"alice").as_deref(), Some(b"100" as &[u8]));
    assert_eq!(lookup(&staged, b"alice").as_deref(), Some(b"100" as &[u8]));
    assert_eq!(lookup(&base, b"bob"), None);
    assert_eq!(lookup(&staged, b"bob").as_deref(), Some(b"7" as &[u8]));
}

#[test]
fn discarding_a_staged_tx_changes_nothing() {
    let registry = registry();
    let base = MemStore::new(registry.clone());
    base.put(ACCOUNTS, b"alice", b"100").unwrap();
    let before = scan(&base, ACCOUNTS);

    let staged = StagedTx::new(&base, registry);
    staged.put(ACCOUNTS, b"alice", b"0").unwrap();
    staged.clear_table(HISTORY).unwrap();
    staged.discard();

    assert_eq!(scan(&base, ACCOUNTS), before);
}
