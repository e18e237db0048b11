use super::page_util::{PAGE_MASK, PAGE_SHIFT, PAGE_SIZE};

/// Mutable view over a contiguous index range of a huge array.
///
/// The view is a list of page fragments. Every fragment except the first and the last is a
/// full page, so locating an index costs one subtraction and a shift. Views split without
/// copying, which lets disjoint halves be handed to different threads.
pub struct HugeSliceMut<'a, T> {
    chunks: Vec<&'a mut [T]>,
    len: usize,
}

impl<'a, T> HugeSliceMut<'a, T> {
    pub(crate) fn from_chunks(chunks: Vec<&'a mut [T]>) -> Self {
        let chunks: Vec<&'a mut [T]> = chunks.into_iter().filter(|c| !c.is_empty()).collect();
        debug_assert!(
            chunks.len() < 3 || chunks[1..chunks.len() - 1].iter().all(|c| c.len() == PAGE_SIZE),
            "interior chunks must be full pages"
        );
        let len = chunks.iter().map(|c| c.len()).sum();
        Self { chunks, len }
    }

    /// Number of elements in the view.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the view is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    fn locate(&self, index: usize) -> (usize, usize) {
        assert!(
            index < self.len,
            "index {index} out of bounds for slice of length {}",
            self.len
        );
        let first = self.chunks[0].len();
        if index < first {
            (0, index)
        } else {
            let rest = index - first;
            (1 + (rest >> PAGE_SHIFT), rest & PAGE_MASK)
        }
    }

    /// Reference to the element at `index`.
    #[inline]
    pub fn get(&self, index: usize) -> &T {
        let (chunk, offset) = self.locate(index);
        &self.chunks[chunk][offset]
    }

    /// Stores `value` at `index`.
    #[inline]
    pub fn set(&mut self, index: usize, value: T) {
        let (chunk, offset) = self.locate(index);
        self.chunks[chunk][offset] = value;
    }

    /// Swaps the elements at `a` and `b`.
    pub fn swap(&mut self, a: usize, b: usize) {
        let (ca, oa) = self.locate(a);
        let (cb, ob) = self.locate(b);
        if ca == cb {
            self.chunks[ca].swap(oa, ob);
        } else {
            let (lo, hi, lo_off, hi_off) = if ca < cb { (ca, cb, oa, ob) } else { (cb, ca, ob, oa) };
            let (head, tail) = self.chunks.split_at_mut(hi);
            std::mem::swap(&mut head[lo][lo_off], &mut tail[0][hi_off]);
        }
    }

    /// Splits into `[0, mid)` and `[mid, len)`, borrowing from `self`.
    ///
    /// # Panics
    /// Panics if `mid > len()`.
    pub fn split_at_mut(&mut self, mid: usize) -> (HugeSliceMut<'_, T>, HugeSliceMut<'_, T>) {
        assert!(mid <= self.len, "split point {mid} beyond length {}", self.len);
        let mut left = Vec::new();
        let mut right = Vec::new();
        let mut remaining = mid;
        for chunk in self.chunks.iter_mut() {
            let chunk: &mut [T] = chunk;
            if remaining >= chunk.len() {
                remaining -= chunk.len();
                left.push(chunk);
            } else if remaining == 0 {
                right.push(chunk);
            } else {
                let (head, tail) = chunk.split_at_mut(remaining);
                remaining = 0;
                left.push(head);
                right.push(tail);
            }
        }
        (
            HugeSliceMut::from_chunks(left),
            HugeSliceMut::from_chunks(right),
        )
    }

    /// Iterates over the elements in order.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.chunks.iter().flat_map(|chunk| chunk.iter())
    }
}

impl<T: Copy> HugeSliceMut<'_, T> {
    /// Copies `[start, end)` of this view into the same positions of `dest`.
    pub fn copy_range_to(&self, dest: &mut HugeSliceMut<'_, T>, start: usize, end: usize) {
        for index in start..end {
            dest.set(index, *self.get(index));
        }
    }
}
