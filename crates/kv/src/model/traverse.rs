//! Cursor traversal traits.

use super::{KvReadError, RawKeyValue, RawValue};

/// Trait for traversing key-value pairs in one table.
///
/// A cursor is a stateful position within the ordered entries of a table.
/// Positioning operations (`first`, `last`, `exact`, `lower_bound`,
/// `lower_bound_dup`) move the cursor to an absolute location; stepping
/// operations (`read_next`, `next_dup`, `next_no_dup`, `read_prev`) move it
/// relative to its current position.
///
/// For dup-sort tables, entries with the same key form a group ordered by
/// value. Non-dup-sort tables behave as groups of exactly one value, so the
/// dup-aware operations remain well-defined on them.
pub trait KvTraverse<E: KvReadError> {
    /// Set position to the first entry in the table, and return it.
    fn first<'a>(&'a mut self) -> Result<Option<RawKeyValue<'a>>, E>;

    /// Set position to the last entry in the table, and return it.
    fn last<'a>(&'a mut self) -> Result<Option<RawKeyValue<'a>>, E>;

    /// Position the cursor at the specified key and return its value only on
    /// an EXACT match. For dup-sort tables this is the first value of the
    /// key's group.
    ///
    /// The cursor is positioned at the search key even on a miss, so that a
    /// subsequent `read_next` continues from there.
    fn exact<'a>(&'a mut self, key: &[u8]) -> Result<Option<RawValue<'a>>, E>;

    /// Seek to the first entry AT OR ABOVE the specified key, and return it.
    fn lower_bound<'a>(&'a mut self, key: &[u8]) -> Result<Option<RawKeyValue<'a>>, E>;

    /// Within the group of the EXACT key, seek to the first value at or above
    /// `value` and return that value.
    ///
    /// Returns `Ok(None)` when the key is absent or its group holds no value
    /// at or above `value`.
    fn lower_bound_dup<'a>(&'a mut self, key: &[u8], value: &[u8])
    -> Result<Option<RawValue<'a>>, E>;

    /// Advance to the next entry in (key, value) order and return it.
    ///
    /// Returning `Ok(None)` indicates the cursor is past the end of the
    /// table.
    fn read_next<'a>(&'a mut self) -> Result<Option<RawKeyValue<'a>>, E>;

    /// Advance to the next value of the CURRENT key's group and return it.
    ///
    /// Returning `Ok(None)` indicates the group is exhausted; the position is
    /// left unchanged in that case.
    fn next_dup<'a>(&'a mut self) -> Result<Option<RawKeyValue<'a>>, E>;

    /// Advance to the first value of the next distinct key and return it.
    fn next_no_dup<'a>(&'a mut self) -> Result<Option<RawKeyValue<'a>>, E>;

    /// Move to the previous entry in (key, value) order and return it.
    ///
    /// Returning `Ok(None)` indicates the cursor is before the start of the
    /// table.
    fn read_prev<'a>(&'a mut self) -> Result<Option<RawKeyValue<'a>>, E>;

    /// Return the entry at the current position without moving.
    fn current<'a>(&'a mut self) -> Result<Option<RawKeyValue<'a>>, E>;
}

/// Trait for cursors that can also mutate their table.
pub trait KvTraverseMut<E: KvReadError>: KvTraverse<E> {
    /// Insert or replace an entry. For dup-sort tables the value is added to
    /// the key's group; otherwise any existing value for the key is replaced.
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), E>;

    /// Append an entry whose key is greater than all existing keys.
    ///
    /// If the key is not greater than the current maximum, behavior is
    /// backend-specific. The backend may return an error, or silently fall
    /// back to a regular put.
    fn append(&mut self, key: &[u8], value: &[u8]) -> Result<(), E>;

    /// Append a value at the end of a key's dup group.
    ///
    /// Like [`append`], the sorted-insert fast path may degrade to a regular
    /// put on backends without a native append.
    ///
    /// [`append`]: KvTraverseMut::append
    fn append_dup(&mut self, key: &[u8], value: &[u8]) -> Result<(), E>;

    /// Delete a key and all values in its group.
    fn delete(&mut self, key: &[u8]) -> Result<(), E>;

    /// Delete the entry at the current position.
    fn delete_current(&mut self) -> Result<(), E>;
}
