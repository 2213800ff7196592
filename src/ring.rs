//! Fixed-size ring of rows for filters that look at several upstream rows.
//!
//! Row `r` lives in slot `r % support`. Rows are meant to be loaded in
//! non-decreasing order; loading a row below the watermark still works but
//! evicts whatever newer row shared its slot.

use tracing::debug;

pub(crate) struct RowRing<T> {
    slots: Vec<T>,
    owners: Vec<Option<u32>>,
    row_len: usize,
    watermark: Option<u32>,
}

impl<T: Copy + Default> RowRing<T> {
    pub(crate) fn new(support: usize, row_len: usize) -> Self {
        let support = support.max(1);
        Self {
            slots: vec![T::default(); support * row_len],
            owners: vec![None; support],
            row_len,
            watermark: None,
        }
    }

    fn slot(&self, row: u32) -> usize {
        row as usize % self.owners.len()
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, row: u32) -> bool {
        self.owners[self.slot(row)] == Some(row)
    }

    /// Make `row` resident, filling its slot with `load` on a miss.
    pub(crate) fn ensure<E>(
        &mut self,
        row: u32,
        load: impl FnOnce(&mut [T]) -> Result<(), E>,
    ) -> Result<(), E> {
        let slot = self.slot(row);
        if self.owners[slot] == Some(row) {
            return Ok(());
        }
        if self.watermark.is_some_and(|w| row < w) {
            debug!(row, watermark = ?self.watermark, "reloading a row behind the ring watermark");
        }
        // Mark the slot empty until the load succeeds.
        self.owners[slot] = None;
        let start = slot * self.row_len;
        load(&mut self.slots[start..start + self.row_len])?;
        self.owners[slot] = Some(row);
        self.watermark = Some(self.watermark.map_or(row, |w| w.max(row)));
        Ok(())
    }

    /// A resident row. Callers `ensure` it first.
    pub(crate) fn get(&self, row: u32) -> &[T] {
        let slot = self.slot(row);
        debug_assert_eq!(self.owners[slot], Some(row), "row {row} is not resident");
        let start = slot * self.row_len;
        &self.slots[start..start + self.row_len]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fill(row: u32) -> impl FnOnce(&mut [u32]) -> Result<(), ()> {
        move |dst| {
            dst.fill(row);
            Ok(())
        }
    }

    #[test]
    fn keeps_last_support_rows() {
        let mut ring = RowRing::<u32>::new(3, 2);
        for r in 0..5 {
            ring.ensure(r, fill(r)).unwrap();
        }
        assert!(!ring.contains(1));
        assert!(ring.contains(2));
        assert!(ring.contains(4));
        assert_eq!(ring.get(3), &[3, 3]);
    }

    #[test]
    fn hit_does_not_reload() {
        let mut ring = RowRing::<u32>::new(2, 1);
        ring.ensure(7, fill(7)).unwrap();
        let mut called = false;
        ring.ensure(7, |_dst: &mut [u32]| -> Result<(), ()> {
            called = true;
            Ok(())
        })
        .unwrap();
        assert!(!called);
    }

    #[test]
    fn failed_load_leaves_slot_empty() {
        let mut ring = RowRing::<u32>::new(2, 1);
        ring.ensure(0, fill(0)).unwrap();
        assert!(ring.ensure(2, |_dst: &mut [u32]| Err("boom")).is_err());
        assert!(!ring.contains(0));
        assert!(!ring.contains(2));
    }
}
