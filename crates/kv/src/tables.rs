//! Runtime table configuration.
//!
//! Every table a store serves has a [`TableInfo`] describing its shape:
//! whether it is dup-sort (multiple values per key, ordered by value) and
//! whether it uses the auto-dupsort key encoding. Configurations live in a
//! [`TableRegistry`] keyed by table name; tables absent from the registry
//! behave as plain single-value tables.
//!
//! # Auto-dupsort
//!
//! Auto-dupsort is a compact encoding for dup-sort tables with long keys: a
//! logical key of `from_len` bytes is stored as a physical key of `to_len`
//! bytes, with the remaining `from_len - to_len` bytes carried as a prefix of
//! the value. Only physical keys of exactly `to_len` bytes participate in the
//! encoding; keys of any other length are stored as-is. The logical key of an
//! entry is recovered with [`TableInfo::effective_key`].

use ahash::AHashMap;
use std::borrow::Cow;

/// Key layout of an auto-dupsort table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoDupLayout {
    /// Length of the full logical key.
    pub from_len: usize,
    /// Length of the stored physical key.
    pub to_len: usize,
}

impl AutoDupLayout {
    /// Number of logical-key bytes carried as a value prefix.
    pub const fn prefix_len(self) -> usize {
        self.from_len - self.to_len
    }
}

/// Configuration of a single table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableInfo {
    /// Whether the table admits multiple values per key.
    pub dup_sort: bool,
    /// The auto-dupsort key layout, if the table uses the split encoding.
    /// Implies `dup_sort`.
    pub auto_dup: Option<AutoDupLayout>,
}

impl TableInfo {
    /// A plain table: one value per key.
    pub const fn plain() -> Self {
        Self { dup_sort: false, auto_dup: None }
    }

    /// A dup-sort table: multiple values per key, ordered by value.
    pub const fn dup() -> Self {
        Self { dup_sort: true, auto_dup: None }
    }

    /// A dup-sort table using the auto-dupsort key encoding. Logical keys of
    /// `from_len` bytes are stored as `to_len`-byte physical keys plus a
    /// `from_len - to_len` byte value prefix.
    pub const fn auto_dup(from_len: usize, to_len: usize) -> Self {
        assert!(to_len < from_len, "physical key must be shorter than the logical key");
        Self { dup_sort: true, auto_dup: Some(AutoDupLayout { from_len, to_len }) }
    }

    /// Recover the logical key of a stored entry.
    ///
    /// For auto-dupsort tables, a physical key of exactly `to_len` bytes is
    /// extended with the leading `from_len - to_len` bytes of the value. All
    /// other keys — and all keys of non-auto-dupsort tables — are returned
    /// unchanged, without allocating.
    pub fn effective_key<'a>(&self, key: &'a [u8], value: &[u8]) -> Cow<'a, [u8]> {
        let Some(layout) = self.auto_dup else {
            return Cow::Borrowed(key);
        };
        if key.len() != layout.to_len {
            return Cow::Borrowed(key);
        }
        // A value shorter than the dup prefix cannot carry a full logical
        // key; take the bytes that are there.
        let prefix = layout.prefix_len().min(value.len());
        let mut full = Vec::with_capacity(key.len() + prefix);
        full.extend_from_slice(key);
        full.extend_from_slice(&value[..prefix]);
        Cow::Owned(full)
    }
}

/// Registry of table configurations, keyed by table name.
#[derive(Debug, Clone, Default)]
pub struct TableRegistry {
    tables: AHashMap<String, TableInfo>,
}

impl TableRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a table configuration, replacing any previous one.
    pub fn define(&mut self, table: impl Into<String>, info: TableInfo) -> &mut Self {
        self.tables.insert(table.into(), info);
        self
    }

    /// Look up a table's configuration. Unregistered tables are plain.
    pub fn config(&self, table: &str) -> TableInfo {
        self.tables.get(table).copied().unwrap_or_default()
    }

    /// True if the table has an explicit configuration.
    pub fn contains(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unregistered_tables_are_plain() {
        let registry = TableRegistry::new();
        assert_eq!(registry.config("missing"), TableInfo::plain());
        assert!(!registry.contains("missing"));
    }

    #[test]
    fn effective_key_extends_matching_physical_keys() {
        let info = TableInfo::auto_dup(5, 2);
        // Physical key "AB" with value "CDEFG" encodes the logical key
        // "ABCDE".
        let key = info.effective_key(b"AB", b"CDEFG");
        assert_eq!(key.as_ref(), b"ABCDE");
        assert!(matches!(key, Cow::Owned(_)));
    }

    #[test]
    fn effective_key_ignores_other_key_lengths() {
        let info = TableInfo::auto_dup(5, 2);
        let key = info.effective_key(b"ABCDE", b"value");
        assert_eq!(key.as_ref(), b"ABCDE");
        assert!(matches!(key, Cow::Borrowed(_)));
    }

    #[test]
    fn effective_key_is_identity_without_auto_dup() {
        for info in [TableInfo::plain(), TableInfo::dup()] {
            let key = info.effective_key(b"AB", b"CDEFG");
            assert_eq!(key.as_ref(), b"AB");
            assert!(matches!(key, Cow::Borrowed(_)));
        }
    }

    #[test]
    fn effective_key_truncates_short_values() {
        let info = TableInfo::auto_dup(5, 2);
        assert_eq!(info.effective_key(b"AB", b"C").as_ref(), b"ABC");
    }
}
