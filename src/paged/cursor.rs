use super::page_util::{index_in_page, page_base, page_index};

enum Pages<'a, T> {
    Single(&'a [T]),
    Paged(&'a [Box<[T]>]),
}

impl<T> Clone for Pages<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Pages<'_, T> {}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Unset,
    Ready,
    Positioned,
    Exhausted,
}

/// Segment-wise iteration over a range of a huge container.
///
/// After [`set_range`](Self::set_range) or [`set_full_range`](Self::set_full_range), every
/// successful [`next`](Self::next) exposes one backing page through
/// [`array`](Self::array); the valid elements are `array()[offset()..limit()]` and
/// `array()[offset()]` has global index `base() + offset()`.
///
/// A cursor is reusable across ranges and must not be shared between threads while
/// iterating; the `&mut self` receivers enforce that.
pub struct HugeCursor<'a, T> {
    pages: Option<Pages<'a, T>>,
    size: usize,
    state: State,
    page: usize,
    last_page: usize,
    first_offset: usize,
    last_limit: usize,
    array: &'a [T],
    base: usize,
    offset: usize,
    limit: usize,
}

impl<'a, T> HugeCursor<'a, T> {
    pub(crate) fn single(page: &'a [T]) -> Self {
        Self::new(Pages::Single(page), page.len())
    }

    pub(crate) fn paged(pages: &'a [Box<[T]>], size: usize) -> Self {
        Self::new(Pages::Paged(pages), size)
    }

    fn new(pages: Pages<'a, T>, size: usize) -> Self {
        Self {
            pages: Some(pages),
            size,
            state: State::Unset,
            page: 0,
            last_page: 0,
            first_offset: 0,
            last_limit: 0,
            array: &[],
            base: 0,
            offset: 0,
            limit: 0,
        }
    }

    /// Number of elements in the underlying container.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Prepares iteration over the whole container.
    pub fn set_full_range(&mut self) {
        self.set_range(0, self.size);
    }

    /// Prepares iteration over `[start, end)`.
    ///
    /// # Panics
    /// Panics if the range is inverted, exceeds the container, or the cursor is closed.
    pub fn set_range(&mut self, start: usize, end: usize) {
        assert!(
            start <= end && end <= self.size,
            "cursor range [{start}, {end}) outside [0, {})",
            self.size
        );
        let Some(pages) = self.pages else {
            panic!("cursor has been closed");
        };
        self.array = &[];
        self.offset = 0;
        self.limit = 0;
        self.base = 0;
        if start == end {
            self.state = State::Exhausted;
            return;
        }
        match pages {
            Pages::Single(_) => {
                self.page = 0;
                self.last_page = 0;
                self.first_offset = start;
                self.last_limit = end;
            }
            Pages::Paged(_) => {
                self.page = page_index(start);
                self.last_page = page_index(end - 1);
                self.first_offset = index_in_page(start);
                self.last_limit = index_in_page(end - 1) + 1;
            }
        }
        self.state = State::Ready;
    }

    /// Advances to the next segment, returning `false` once the range is exhausted.
    ///
    /// # Panics
    /// Panics if no range has been set.
    pub fn next(&mut self) -> bool {
        match self.state {
            State::Unset => panic!("cursor stepped before a range was set"),
            State::Exhausted => return false,
            State::Ready => {}
            State::Positioned => {
                if self.page >= self.last_page {
                    self.state = State::Exhausted;
                    self.array = &[];
                    return false;
                }
                self.page += 1;
            }
        }
        let pages = match self.pages {
            Some(pages) => pages,
            None => {
                self.state = State::Exhausted;
                return false;
            }
        };
        let first = self.state == State::Ready;
        self.array = match pages {
            Pages::Single(page) => page,
            Pages::Paged(pages) => &pages[self.page],
        };
        self.base = match pages {
            Pages::Single(_) => 0,
            Pages::Paged(_) => page_base(self.page),
        };
        self.offset = if first { self.first_offset } else { 0 };
        self.limit = if self.page == self.last_page {
            self.last_limit
        } else {
            self.array.len()
        };
        self.state = State::Positioned;
        true
    }

    /// The page backing the current segment.
    ///
    /// # Panics
    /// Panics unless the last call to [`next`](Self::next) returned `true`.
    pub fn array(&self) -> &'a [T] {
        assert_eq!(
            self.state,
            State::Positioned,
            "cursor is not positioned on a segment"
        );
        self.array
    }

    /// The valid slice of the current segment.
    pub fn slice(&self) -> &'a [T] {
        &self.array()[self.offset..self.limit]
    }

    /// First valid position in [`array`](Self::array).
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// One past the last valid position in [`array`](Self::array).
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Global index of `array()[0]`.
    pub fn base(&self) -> usize {
        self.base
    }

    /// Drops the page references held by this cursor. Idempotent.
    pub fn close(&mut self) {
        self.pages = None;
        self.array = &[];
        self.state = State::Exhausted;
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.pages.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paged::page_util::PAGE_SIZE;

    fn paged_storage(size: usize) -> Vec<Box<[usize]>> {
        let mut pages = Vec::new();
        let mut start = 0;
        while start < size {
            let end = (start + PAGE_SIZE).min(size);
            pages.push((start..end).collect::<Vec<_>>().into_boxed_slice());
            start = end;
        }
        pages
    }

    fn collect(cursor: &mut HugeCursor<'_, usize>) -> Vec<usize> {
        let mut out = Vec::new();
        while cursor.next() {
            for (i, v) in cursor.slice().iter().enumerate() {
                assert_eq!(cursor.base() + cursor.offset() + i, *v);
                out.push(*v);
            }
        }
        out
    }

    #[test]
    fn single_cursor_yields_one_segment() {
        let data: Vec<usize> = (0..10).collect();
        let mut cursor = HugeCursor::single(&data);
        cursor.set_range(2, 7);
        assert_eq!(collect(&mut cursor), vec![2, 3, 4, 5, 6]);
        assert!(!cursor.next());
    }

    #[test]
    fn paged_cursor_spans_pages() {
        let size = 2 * PAGE_SIZE + 100;
        let pages = paged_storage(size);
        let mut cursor = HugeCursor::paged(&pages, size);
        cursor.set_range(PAGE_SIZE - 3, 2 * PAGE_SIZE + 5);
        let values = collect(&mut cursor);
        assert_eq!(values.len(), PAGE_SIZE + 8);
        assert_eq!(values[0], PAGE_SIZE - 3);
        assert_eq!(*values.last().unwrap(), 2 * PAGE_SIZE + 4);

        cursor.set_full_range();
        assert_eq!(collect(&mut cursor), (0..size).collect::<Vec<_>>());
    }

    #[test]
    fn empty_range_yields_nothing() {
        let data = vec![1usize, 2, 3];
        let mut cursor = HugeCursor::single(&data);
        cursor.set_range(1, 1);
        assert!(!cursor.next());
    }

    #[test]
    #[should_panic(expected = "before a range was set")]
    fn stepping_without_range_panics() {
        let data = vec![1usize];
        let mut cursor = HugeCursor::single(&data);
        cursor.next();
    }

    #[test]
    fn close_is_idempotent_and_safe_before_next() {
        let data = vec![1usize];
        let mut cursor = HugeCursor::single(&data);
        cursor.close();
        cursor.close();
        assert!(cursor.is_closed());
        assert!(!cursor.next());
    }
}
