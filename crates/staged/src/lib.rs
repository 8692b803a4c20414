//! Staged mutation layer for the stratum key-value database.
//!
//! A [`StagedTx`] buffers writes against a read-only base transaction:
//! inserts land in an in-memory overlay store, deletions become per-key
//! tombstones, and whole-table clears become a per-table flag. Reads and
//! scans then present the ordered union of both stores as if the writes had
//! already been applied, and [`StagedTx::flush`] replays the buffered state
//! into a writable store.
//!
//! The heart of the crate is [`StagedCursor`], which merges a base-store
//! cursor and an overlay cursor into one ordered, dup-sort-aware stream
//! while hiding tombstoned keys and cleared tables on the base side.
//!
//! ```no_run
//! use std::sync::Arc;
//! use stratum_kv::{KvTraverse, MemStore, TableInfo, TableRegistry};
//! use stratum_staged::StagedTx;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut registry = TableRegistry::new();
//! registry.define("accounts", TableInfo::plain());
//! let registry = Arc::new(registry);
//!
//! let base = MemStore::new(registry.clone());
//! let staged = StagedTx::new(&base, registry);
//!
//! staged.put("accounts", b"alice", b"100")?;
//! staged.delete("accounts", b"bob")?;
//!
//! let mut cursor = staged.cursor("accounts")?;
//! let mut entry = cursor.first()?.map(|(k, v)| (k.into_owned(), v.into_owned()));
//! while let Some((key, value)) = entry {
//!     println!("{key:?} => {value:?}");
//!     entry = cursor.read_next()?.map(|(k, v)| (k.into_owned(), v.into_owned()));
//! }
//! # Ok(())
//! # }
//! ```

#![warn(
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    unreachable_pub,
    clippy::missing_const_for_fn,
    rustdoc::all
)]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![deny(unused_must_use, rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_cfg))]

/// Conformance scenarios for staged scans over arbitrary base stores.
#[cfg(any(test, feature = "test-utils"))]
pub mod conformance;

mod cursor;
pub use cursor::StagedCursor;

mod error;
pub use error::{StagedError, StagedResult};

mod mutation;
pub use mutation::{Pending, StagedTx};
