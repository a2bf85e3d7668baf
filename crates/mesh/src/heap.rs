//! Indexed binary heap over pending triangles.
//!
//! The heap is ordered by increasing priority where `priority(t) =
//! -worst_error(t)`, so the root is always the triangle with the largest
//! approximation error. Every stored triangle carries its current heap
//! position in its arena slot, which makes removal by handle O(log n) after a
//! split or flip invalidates a triangle that is still queued.
//!
//! The heap borrows triangles, it never owns them; a triangle must be removed
//! from the heap before its slot is tombstoned.

use thiserror::Error;

use crate::store::{TriId, TriStore};

/// Returned by [`ErrorHeap::peek`] and [`ErrorHeap::extract`] when no
/// triangle is queued. Terminates the refinement loop.
#[derive(Error, Debug, PartialEq, Eq)]
#[error("triangle heap is empty")]
pub struct Empty;

#[derive(Debug)]
pub(crate) struct ErrorHeap {
    slots: Vec<TriId>,
}

impl ErrorHeap {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn priority(tris: &TriStore, id: TriId) -> f64 {
        -tris.worst_error(id)
    }

    fn less(tris: &TriStore, a: TriId, b: TriId) -> bool {
        Self::priority(tris, a).total_cmp(&Self::priority(tris, b)).is_lt()
    }

    fn place(&mut self, tris: &mut TriStore, pos: usize, id: TriId) {
        self.slots[pos] = id;
        tris.get_mut(id).heap_pos = Some(pos as u32);
    }

    fn sift_up(&mut self, tris: &mut TriStore, mut pos: usize) {
        while pos > 0 {
            let parent = (pos - 1) / 2;
            if Self::less(tris, self.slots[pos], self.slots[parent]) {
                let (a, b) = (self.slots[pos], self.slots[parent]);
                self.place(tris, pos, b);
                self.place(tris, parent, a);
                pos = parent;
            } else {
                break;
            }
        }
    }

    fn sift_down(&mut self, tris: &mut TriStore, mut pos: usize) {
        loop {
            let mut min = pos;
            for child in [2 * pos + 1, 2 * pos + 2] {
                if child < self.slots.len() && Self::less(tris, self.slots[child], self.slots[min])
                {
                    min = child;
                }
            }
            if min == pos {
                break;
            }
            let (a, b) = (self.slots[pos], self.slots[min]);
            self.place(tris, pos, b);
            self.place(tris, min, a);
            pos = min;
        }
    }

    /// Queue a pending triangle. It must carry a bucket and must not already
    /// be in the heap.
    pub(crate) fn insert(&mut self, tris: &mut TriStore, id: TriId) {
        debug_assert!(tris.get(id).heap_pos.is_none(), "triangle already queued");
        let pos = self.slots.len();
        self.slots.push(id);
        tris.get_mut(id).heap_pos = Some(pos as u32);
        self.sift_up(tris, pos);
    }

    /// The triangle with the largest error, without removing it.
    pub(crate) fn peek(&self) -> Result<TriId, Empty> {
        self.slots.first().copied().ok_or(Empty)
    }

    /// Remove and return the triangle with the largest error.
    pub(crate) fn extract(&mut self, tris: &mut TriStore) -> Result<TriId, Empty> {
        if self.slots.is_empty() {
            return Err(Empty);
        }
        let root = self.slots.swap_remove(0);
        tris.get_mut(root).heap_pos = None;
        if !self.slots.is_empty() {
            let moved = self.slots[0];
            tris.get_mut(moved).heap_pos = Some(0);
            self.sift_down(tris, 0);
        }
        Ok(root)
    }

    /// Remove the element at `pos`, restoring the heap property in whichever
    /// direction the swapped-in tail element needs. Out-of-range positions
    /// are ignored.
    pub(crate) fn remove(&mut self, tris: &mut TriStore, pos: u32) {
        let pos = pos as usize;
        if pos >= self.slots.len() {
            return;
        }
        let removed = self.slots.swap_remove(pos);
        tris.get_mut(removed).heap_pos = None;
        if pos < self.slots.len() {
            let moved = self.slots[pos];
            tris.get_mut(moved).heap_pos = Some(pos as u32);
            self.sift_down(tris, pos);
            self.sift_up(tris, pos);
        }
    }
}
