//! Store model traits and raw key-value types.
//!
//! The model is split in two layers:
//!
//! - [`KvRead`] and [`KvWrite`] describe transactional access to a store:
//!   point reads, the write surface, and cursor creation.
//! - [`KvTraverse`] and [`KvTraverseMut`] describe a positioned cursor over
//!   one table, including the dup-sort stepping operations.
//!
//! Backends implement the raw traits over byte slices; interpretation of the
//! bytes is left entirely to callers.

mod error;
pub use error::{KvError, KvReadError, KvResult};

mod traits;
pub use traits::{KvRead, KvWrite};

mod traverse;
pub use traverse::{KvTraverse, KvTraverseMut};

use std::borrow::Cow;

/// A raw value.
pub type RawValue<'a> = Cow<'a, [u8]>;

/// A raw key-value pair.
pub type RawKeyValue<'a> = (Cow<'a, [u8]>, RawValue<'a>);
