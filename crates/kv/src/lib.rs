//! Store model for the stratum staged key-value database.
//!
//! This crate defines the pieces the staging layer composes:
//!
//! - [`model`]: raw byte-oriented cursor traversal traits ([`KvTraverse`],
//!   [`KvTraverseMut`]) and transactional store access traits ([`KvRead`],
//!   [`KvWrite`]).
//! - [`tables`]: the runtime table configuration registry, including the
//!   dup-sort and auto-dupsort layout of each table.
//! - [`mem`]: an ordered in-memory backend implementing the full model. It
//!   backs tests and serves as the pending-write overlay store inside
//!   `stratum-staged`.
//!
//! # Trait Model
//!
//! All ordering is lexicographic on raw bytes. Tables configured as dup-sort
//! admit multiple values per key, ordered by value; the cursor traits expose
//! the dup-aware stepping operations (`next_dup`, `next_no_dup`,
//! `lower_bound_dup`) uniformly, and non-dup-sort tables simply behave as
//! single-value key groups.
//!
//! Cursor methods return `Ok(None)` when the requested entry does not exist
//! or the scan is past the end. Data is returned as [`Cow`] byte slices so
//! backends may borrow or allocate as their locking model requires.
//!
//! [`Cow`]: std::borrow::Cow
//! [`KvTraverse`]: model::KvTraverse
//! [`KvTraverseMut`]: model::KvTraverseMut
//! [`KvRead`]: model::KvRead
//! [`KvWrite`]: model::KvWrite

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

pub mod model;
pub use model::{
    KvError, KvRead, KvReadError, KvResult, KvTraverse, KvTraverseMut, KvWrite, RawKeyValue,
    RawValue,
};

pub mod tables;
pub use tables::{AutoDupLayout, TableInfo, TableRegistry};

pub mod mem;
pub use mem::{MemCursor, MemStore};
