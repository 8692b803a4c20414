//! The overlay merge cursor.
//!
//! [`StagedCursor`] presents a base-store cursor and the staged overlay
//! cursor for the same table as one ordered, dup-sort-aware stream. The base
//! side is filtered against the transaction's tombstones and cleared-table
//! flag, and entries present on both sides collapse to the overlay's version.
//!
//! # Merge state
//!
//! The cursor is a two-way merge with one held lookahead per side: after a
//! positioning call yields an entry, the winning side's candidate was
//! consumed and the losing side's candidate is retained. The stepping
//! operations (`read_next`, `next_dup`, `next_no_dup`) advance only the side
//! that produced the previous entry and merge against the retained candidate
//! of the other side.
//!
//! Reverse iteration is not implemented: `last` is a one-shot boundary
//! lookup, and `read_prev` (along with the other deferred dup operations)
//! fails with [`StagedError::Unsupported`].

use crate::{
    error::{StagedError, StagedResult},
    mutation::Pending,
};
use core::marker::PhantomData;
use std::borrow::Cow;
use stratum_kv::{
    KvReadError, KvTraverse, KvTraverseMut, MemCursor, RawKeyValue, RawValue, TableInfo,
};

/// Which underlying advance a stepping operation maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Advance {
    /// Next entry in (key, value) order.
    Next,
    /// Next value within the current key group.
    NextDup,
    /// First value of the next distinct key.
    NextNoDup,
}

/// An owned candidate held from one side of the merge. `None` means the side
/// is drained (or hidden) as of the last examination.
type Held = Option<(Vec<u8>, Vec<u8>)>;

/// Lifecycle of the merge state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    /// No positioning call has succeeded yet. Relative moves are invalid.
    Fresh,
    /// The last positioning call yielded an entry from the recorded side.
    Tracking {
        /// True if the base side supplied the last yielded entry.
        from_base: bool,
    },
    /// Both sides are drained. Relative moves yield nothing.
    Exhausted,
}

fn owned(kv: RawKeyValue<'_>) -> (Vec<u8>, Vec<u8>) {
    (kv.0.into_owned(), kv.1.into_owned())
}

fn yield_held(entry: Held) -> Option<RawKeyValue<'static>> {
    entry.map(|(k, v)| (Cow::Owned(k), Cow::Owned(v)))
}

/// Merge cursor over a base table and the staged writes for it.
///
/// Created by [`StagedTx::cursor`]. The cursor borrows the transaction's
/// [`Pending`] state, so writes staged through the cursor's own hooks (or
/// through the transaction) are visible to later positioning calls; already
/// held lookahead is never retroactively updated. Dropping the cursor
/// releases both underlying cursors.
///
/// [`StagedTx::cursor`]: crate::StagedTx::cursor
pub struct StagedCursor<'a, C, E> {
    base: C,
    overlay: MemCursor<'a>,
    pending: &'a Pending,
    table: String,
    info: TableInfo,
    held_base: Held,
    held_overlay: Held,
    state: ScanState,
    _marker: PhantomData<fn() -> E>,
}

impl<C, E> core::fmt::Debug for StagedCursor<'_, C, E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("StagedCursor")
            .field("table", &self.table)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl<'a, C, E> StagedCursor<'a, C, E>
where
    C: KvTraverse<E>,
    E: KvReadError,
{
    pub(crate) fn new(base: C, overlay: MemCursor<'a>, pending: &'a Pending, table: &str) -> Self {
        Self {
            base,
            overlay,
            pending,
            info: pending.config(table),
            table: table.to_owned(),
            held_base: None,
            held_overlay: None,
            state: ScanState::Fresh,
            _marker: PhantomData,
        }
    }

    /// True if the entry's logical key carries a tombstone.
    fn is_deleted(&self, key: &[u8], value: &[u8]) -> bool {
        let effective = self.info.effective_key(key, value);
        self.pending.is_entry_deleted(&self.table, &effective)
    }

    fn cleared(&self) -> bool {
        self.pending.is_table_cleared(&self.table)
    }

    /// One raw advance of the base cursor.
    fn step_base(&mut self, step: Advance) -> Result<Held, StagedError> {
        let kv = match step {
            Advance::Next => self.base.read_next(),
            Advance::NextDup => self.base.next_dup(),
            Advance::NextNoDup => self.base.next_no_dup(),
        };
        Ok(kv.map_err(StagedError::from_base)?.map(owned))
    }

    /// Advance the base cursor, skipping tombstoned entries. The step kind is
    /// preserved through the skip loop, so a dup-step keeps skipping within
    /// the same key group.
    fn advance_base(&mut self, step: Advance) -> Result<Held, StagedError> {
        let mut next = self.step_base(step)?;
        while let Some((key, value)) = &next {
            if !self.is_deleted(key, value) {
                break;
            }
            next = self.step_base(step)?;
        }
        Ok(next)
    }

    /// When both sides present the same key, advance the base past the
    /// collision so the overlay's version wins:
    ///
    /// - non-dup-sort tables collide on the key alone,
    /// - dup-sort tables collide on identical values,
    /// - auto-dupsort tables additionally collide when the dup prefixes of
    ///   both values match (the two rows encode the same logical key).
    fn skip_intersection(
        &mut self,
        overlay: &Held,
        base: Held,
        step: Advance,
    ) -> Result<Held, StagedError> {
        let collides = match (overlay.as_ref(), base.as_ref()) {
            (Some((mem_key, mem_value)), Some((base_key, base_value))) if mem_key == base_key => {
                if !self.info.dup_sort {
                    true
                } else if mem_value == base_value {
                    true
                } else if let Some(layout) = self.info.auto_dup {
                    let offset = layout.prefix_len();
                    offset != 0
                        && mem_value.len() >= offset
                        && base_value.len() >= offset
                        && mem_value[..offset] == base_value[..offset]
                } else {
                    false
                }
            }
            _ => false,
        };
        if collides {
            self.advance_base(step)
        } else {
            Ok(base)
        }
    }

    fn exhaust(&mut self) -> Held {
        self.held_base = None;
        self.held_overlay = None;
        self.state = ScanState::Exhausted;
        None
    }

    /// The common merge step: store both candidates as held lookahead, pick
    /// the smaller in (key, value) order — the overlay on ties — record which
    /// side won, and return the winner. A drained side always loses.
    fn go_forward(&mut self, overlay: Held, base: Held, step: Advance) -> Result<Held, StagedError> {
        if overlay.is_none() && base.is_none() {
            return Ok(self.exhaust());
        }

        let base = self.skip_intersection(&overlay, base, step)?;

        let from_base = match (overlay.as_ref(), base.as_ref()) {
            (Some((mem_key, mem_value)), Some((base_key, base_value))) => {
                if mem_key == base_key {
                    mem_value > base_value
                } else {
                    mem_key > base_key
                }
            }
            (Some(_), None) => false,
            (None, Some(_)) => true,
            (None, None) => return Ok(self.exhaust()),
        };

        self.held_overlay = overlay;
        self.held_base = base;
        self.state = ScanState::Tracking { from_base };
        Ok(if from_base { self.held_base.clone() } else { self.held_overlay.clone() })
    }

    /// Position the base cursor with `lower_bound` and tombstone-skip the
    /// landing entry.
    fn base_lower_bound(&mut self, key: &[u8]) -> Result<Held, StagedError> {
        let mut base = self.base.lower_bound(key).map_err(StagedError::from_base)?.map(owned);
        if let Some((base_key, base_value)) = &base {
            if self.is_deleted(base_key, base_value) {
                base = self.advance_base(Advance::Next)?;
            }
        }
        Ok(base)
    }

    /// Record an overlay-only result (the base side is hidden by a staged
    /// table clear).
    fn overlay_only(&mut self, overlay: Held) -> Held {
        self.held_base = None;
        self.held_overlay = overlay.clone();
        self.state = match overlay {
            Some(_) => ScanState::Tracking { from_base: false },
            None => ScanState::Exhausted,
        };
        overlay
    }

    /// Advance the side that produced the previous entry and merge against
    /// the other side's held candidate.
    fn step(&mut self, step: Advance) -> Result<Held, StagedError> {
        match self.state {
            ScanState::Fresh => Err(StagedError::NotPositioned),
            ScanState::Exhausted => Ok(None),
            ScanState::Tracking { from_base: true } => {
                let base = self.advance_base(step)?;
                let overlay = self.held_overlay.clone();
                self.go_forward(overlay, base, step)
            }
            ScanState::Tracking { from_base: false } => {
                let overlay = match step {
                    Advance::Next => self.overlay.read_next()?,
                    Advance::NextDup => self.overlay.next_dup()?,
                    Advance::NextNoDup => self.overlay.next_no_dup()?,
                }
                .map(owned);
                let base = self.held_base.clone();
                self.go_forward(overlay, base, step)
            }
        }
    }
}

impl<C, E> KvTraverse<StagedError> for StagedCursor<'_, C, E>
where
    C: KvTraverse<E>,
    E: KvReadError,
{
    fn first<'b>(&'b mut self) -> Result<Option<RawKeyValue<'b>>, StagedError> {
        let overlay = self.overlay.first()?.map(owned);
        if self.cleared() {
            let result = self.overlay_only(overlay);
            return Ok(yield_held(result));
        }

        let mut base = self.base.first().map_err(StagedError::from_base)?.map(owned);
        if let Some((base_key, base_value)) = &base {
            if self.is_deleted(base_key, base_value) {
                base = self.advance_base(Advance::Next)?;
            }
        }

        let winner = self.go_forward(overlay, base, Advance::Next)?;
        Ok(yield_held(winner))
    }

    fn last<'b>(&'b mut self) -> Result<Option<RawKeyValue<'b>>, StagedError> {
        let overlay = self.overlay.last()?.map(owned);
        let base = if self.cleared() {
            None
        } else {
            self.base.last().map_err(StagedError::from_base)?.map(owned)
        };

        let base = self.skip_intersection(&overlay, base, Advance::Next)?;
        // A tombstoned greatest base entry must not suppress the overlay
        // side; with no backward stepping available, the base side is simply
        // dropped.
        let base = match base {
            Some((key, value)) if self.is_deleted(&key, &value) => None,
            other => other,
        };

        self.held_overlay = overlay.clone();
        self.held_base = base.clone();
        let winner = match (overlay, base) {
            (None, None) => {
                self.state = ScanState::Exhausted;
                None
            }
            (Some(mem), None) => {
                self.state = ScanState::Tracking { from_base: false };
                Some(mem)
            }
            (None, Some(db)) => {
                self.state = ScanState::Tracking { from_base: true };
                Some(db)
            }
            (Some(mem), Some(db)) => {
                let overlay_wins = match mem.0.cmp(&db.0) {
                    core::cmp::Ordering::Greater => true,
                    core::cmp::Ordering::Less => false,
                    core::cmp::Ordering::Equal => mem.1 > db.1,
                };
                // This is a boundary lookup, not the start of a backward
                // scan: the losing side's candidate is useless as lookahead
                // and is cleared.
                if overlay_wins {
                    self.held_base = None;
                    self.state = ScanState::Tracking { from_base: false };
                    Some(mem)
                } else {
                    self.held_overlay = None;
                    self.state = ScanState::Tracking { from_base: true };
                    Some(db)
                }
            }
        };
        Ok(yield_held(winner))
    }

    fn exact<'b>(&'b mut self, key: &[u8]) -> Result<Option<RawValue<'b>>, StagedError> {
        if let Some(value) = self.overlay.exact(key)? {
            let value = value.into_owned();
            // Take the base side as lookahead for subsequent stepping. A
            // cleared table hides it entirely; otherwise it is
            // tombstone-skipped and collision-skipped like any merge step.
            let base = if self.cleared() { None } else { self.base_lower_bound(key)? };
            self.held_overlay = Some((key.to_vec(), value.clone()));
            let held_overlay = self.held_overlay.clone();
            self.held_base = self.skip_intersection(&held_overlay, base, Advance::Next)?;
            self.state = ScanState::Tracking { from_base: false };
            return Ok(Some(Cow::Owned(value)));
        }

        if self.cleared() || self.pending.is_entry_deleted(&self.table, key) {
            self.exhaust();
            return Ok(None);
        }

        match self.base.exact(key).map_err(StagedError::from_base)? {
            Some(value) => {
                let value = value.into_owned();
                self.held_base = Some((key.to_vec(), value.clone()));
                // The overlay has no exact match, so its lower bound is
                // strictly above the key and cannot collide.
                self.held_overlay = self.overlay.lower_bound(key)?.map(owned);
                self.state = ScanState::Tracking { from_base: true };
                Ok(Some(Cow::Owned(value)))
            }
            None => {
                self.exhaust();
                Ok(None)
            }
        }
    }

    fn lower_bound<'b>(&'b mut self, key: &[u8]) -> Result<Option<RawKeyValue<'b>>, StagedError> {
        if self.cleared() {
            let overlay = self.overlay.lower_bound(key)?.map(owned);
            let result = self.overlay_only(overlay);
            return Ok(yield_held(result));
        }

        let base = self.base_lower_bound(key)?;
        let overlay = self.overlay.lower_bound(key)?.map(owned);
        let winner = self.go_forward(overlay, base, Advance::Next)?;
        Ok(yield_held(winner))
    }

    fn lower_bound_dup<'b>(
        &'b mut self,
        key: &[u8],
        value: &[u8],
    ) -> Result<Option<RawValue<'b>>, StagedError> {
        // An empty search value is satisfied by every value in the group, so
        // this degrades to an exact lookup.
        if value.is_empty() {
            return self.exact(key);
        }

        let base = if self.cleared() {
            None
        } else {
            let mut found = self
                .base
                .lower_bound_dup(key, value)
                .map_err(StagedError::from_base)?
                .map(Cow::into_owned);
            if let Some(found_value) = &found {
                if self.is_deleted(key, found_value) {
                    found = self.advance_base(Advance::NextDup)?.map(|(_, v)| v);
                }
            }
            found
        };

        let overlay = self.overlay.lower_bound_dup(key, value)?.map(Cow::into_owned);

        // Both sides are keyed to the search key; the merge step then
        // compares values within the group.
        let winner = self.go_forward(
            overlay.map(|v| (key.to_vec(), v)),
            base.map(|v| (key.to_vec(), v)),
            Advance::Next,
        )?;
        Ok(winner.map(|(_, v)| Cow::Owned(v)))
    }

    fn read_next<'b>(&'b mut self) -> Result<Option<RawKeyValue<'b>>, StagedError> {
        let winner = self.step(Advance::Next)?;
        Ok(yield_held(winner))
    }

    fn next_dup<'b>(&'b mut self) -> Result<Option<RawKeyValue<'b>>, StagedError> {
        let winner = self.step(Advance::NextDup)?;
        Ok(yield_held(winner))
    }

    fn next_no_dup<'b>(&'b mut self) -> Result<Option<RawKeyValue<'b>>, StagedError> {
        let winner = self.step(Advance::NextNoDup)?;
        Ok(yield_held(winner))
    }

    fn read_prev<'b>(&'b mut self) -> Result<Option<RawKeyValue<'b>>, StagedError> {
        Err(StagedError::Unsupported("read_prev"))
    }

    fn current<'b>(&'b mut self) -> Result<Option<RawKeyValue<'b>>, StagedError> {
        let entry = match self.state {
            ScanState::Tracking { from_base: true } => self.held_base.clone(),
            ScanState::Tracking { from_base: false } => self.held_overlay.clone(),
            ScanState::Fresh | ScanState::Exhausted => None,
        };
        Ok(yield_held(entry))
    }
}

impl<C, E> KvTraverseMut<StagedError> for StagedCursor<'_, C, E>
where
    C: KvTraverse<E>,
    E: KvReadError,
{
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), StagedError> {
        self.pending.put(&self.table, key, value)
    }

    fn append(&mut self, key: &[u8], value: &[u8]) -> Result<(), StagedError> {
        self.pending.append(&self.table, key, value)
    }

    fn append_dup(&mut self, key: &[u8], value: &[u8]) -> Result<(), StagedError> {
        // The ordered-append fast path lives in the overlay cursor.
        self.overlay.append_dup(key, value)?;
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), StagedError> {
        self.pending.delete(&self.table, key)
    }

    fn delete_current(&mut self) -> Result<(), StagedError> {
        Err(StagedError::Unsupported("delete_current"))
    }
}

/// Deferred operations.
///
/// These are unimplemented on a staged cursor and fail with
/// [`StagedError::Unsupported`] so higher layers can refuse cleanly.
impl<C, E> StagedCursor<'_, C, E>
where
    C: KvTraverse<E>,
    E: KvReadError,
{
    /// First value of the current key group. Deferred.
    pub fn first_dup(&mut self) -> StagedResult<Option<RawValue<'_>>> {
        Err(StagedError::Unsupported("first_dup"))
    }

    /// Last value of the current key group. Deferred.
    pub fn last_dup(&mut self) -> StagedResult<Option<RawValue<'_>>> {
        Err(StagedError::Unsupported("last_dup"))
    }

    /// Number of entries in the table. Deferred.
    pub fn count(&mut self) -> StagedResult<u64> {
        Err(StagedError::Unsupported("count"))
    }

    /// Number of values in the current key group. Deferred.
    pub fn count_duplicates(&mut self) -> StagedResult<u64> {
        Err(StagedError::Unsupported("count_duplicates"))
    }

    /// Exact (key, value) lookup in a dup group. Deferred.
    pub fn seek_both_exact(
        &mut self,
        _key: &[u8],
        _value: &[u8],
    ) -> StagedResult<Option<RawKeyValue<'_>>> {
        Err(StagedError::Unsupported("seek_both_exact"))
    }

    /// Insert without dup-key collision handling. Deferred.
    pub fn put_no_dup_data(&mut self, _key: &[u8], _value: &[u8]) -> StagedResult<()> {
        Err(StagedError::Unsupported("put_no_dup_data"))
    }

    /// Delete one exact (key, value) pair. Deferred.
    pub fn delete_exact(&mut self, _key: &[u8], _value: &[u8]) -> StagedResult<()> {
        Err(StagedError::Unsupported("delete_exact"))
    }

    /// Delete every value of the current key group. Deferred until the
    /// dup-group walk is pinned down with range coverage.
    pub fn delete_current_duplicates(&mut self) -> StagedResult<()> {
        Err(StagedError::Unsupported("delete_current_duplicates"))
    }
}
