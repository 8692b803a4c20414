//! Transactional store access traits.

use super::{KvReadError, KvTraverse};
use bytes::Bytes;

/// Trait for read access to an ordered key-value store.
///
/// Implementors hand out cursors over named tables and serve point reads.
/// Tables are addressed by name; reading a table that does not exist behaves
/// as reading an empty table.
#[auto_impl::auto_impl(&, Arc, Box)]
pub trait KvRead {
    /// Error type for read operations.
    type Error: KvReadError;

    /// The cursor type for traversing a table.
    type Traverse<'a>: KvTraverse<Self::Error>
    where
        Self: 'a;

    /// Create a cursor over the specified table.
    fn traverse(&self, table: &str) -> Result<Self::Traverse<'_>, Self::Error>;

    /// Get the value stored under a key. For dup-sort tables this is the
    /// first value of the key's group.
    fn get(&self, table: &str, key: &[u8]) -> Result<Option<Bytes>, Self::Error>;
}

/// Trait for write access to an ordered key-value store.
///
/// Writes take `&self`: backends are expected to synchronize internally, and
/// a store handle is commonly shared between a cursor and its writer.
pub trait KvWrite: KvRead {
    /// Insert or replace an entry. For dup-sort tables the value is added to
    /// the key's group; otherwise any existing value for the key is replaced.
    fn put(&self, table: &str, key: &[u8], value: &[u8]) -> Result<(), Self::Error>;

    /// Append an entry whose key is greater than all existing keys. May fall
    /// back to a regular put on backends without a native append path.
    fn append(&self, table: &str, key: &[u8], value: &[u8]) -> Result<(), Self::Error>;

    /// Append a value at the end of a key's dup group. May fall back to a
    /// regular put.
    fn append_dup(&self, table: &str, key: &[u8], value: &[u8]) -> Result<(), Self::Error>;

    /// Delete a key and all values in its group.
    fn delete(&self, table: &str, key: &[u8]) -> Result<(), Self::Error>;

    /// Remove every entry of the specified table.
    fn clear_table(&self, table: &str) -> Result<(), Self::Error>;
}

impl<T: KvWrite + ?Sized> KvWrite for &T {
    fn put(&self, table: &str, key: &[u8], value: &[u8]) -> Result<(), Self::Error> {
        (**self).put(table, key, value)
    }

    fn append(&self, table: &str, key: &[u8], value: &[u8]) -> Result<(), Self::Error> {
        (**self).append(table, key, value)
    }

    fn append_dup(&self, table: &str, key: &[u8], value: &[u8]) -> Result<(), Self::Error> {
        (**self).append_dup(table, key, value)
    }

    fn delete(&self, table: &str, key: &[u8]) -> Result<(), Self::Error> {
        (**self).delete(table, key)
    }

    fn clear_table(&self, table: &str) -> Result<(), Self::Error> {
        (**self).clear_table(table)
    }
}

impl<T: KvWrite + ?Sized> KvWrite for std::sync::Arc<T> {
    fn put(&self, table: &str, key: &[u8], value: &[u8]) -> Result<(), Self::Error> {
        (**self).put(table, key, value)
    }

    fn append(&self, table: &str, key: &[u8], value: &[u8]) -> Result<(), Self::Error> {
        (**self).append(table, key, value)
    }

    fn append_dup(&self, table: &str, key: &[u8], value: &[u8]) -> Result<(), Self::Error> {
        (**self).append_dup(table, key, value)
    }

    fn delete(&self, table: &str, key: &[u8]) -> Result<(), Self::Error> {
        (**self).delete(table, key)
    }

    fn clear_table(&self, table: &str) -> Result<(), Self::Error> {
        (**self).clear_table(table)
    }
}

impl<T: KvWrite + ?Sized> KvWrite for std::boxed::Box<T> {
    fn put(&self, table: &str, key: &[u8], value: &[u8]) -> Result<(), Self::Error> {
        (**self).put(table, key, value)
    }

    fn append(&self, table: &str, key: &[u8], value: &[u8]) -> Result<(), Self::Error> {
        (**self).append(table, key, value)
    }

    fn append_dup(&self, table: &str, key: &[u8], value: &[u8]) -> Result<(), Self::Error> {
        (**self).append_dup(table, key, value)
    }

    fn delete(&self, table: &str, key: &[u8]) -> Result<(), Self::Error> {
        (**self).delete(table, key)
    }

    fn clear_table(&self, table: &str) -> Result<(), Self::Error> {
        (**self).clear_table(table)
    }
}
