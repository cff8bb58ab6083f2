//! Dual-heap buffer.
//!
//! Two binary min-heaps share one fixed array: the left heap grows rightward from index 0,
//! the right heap grows leftward from the end of the array using mirrored indexing.
//! Which of them is the *current* heap and which is the *next* one is a role flag,
//! so swapping roles moves no data and allocates nothing.

/// Array side a heap grows from.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    fn opposite(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

/// Two min-heaps over a single array of fixed capacity.
pub struct DualHeap<T> {
    data: Box<[T]>,
    left_len: usize,
    right_len: usize,
    current: Side,
}

impl<T: Copy + Ord + Default> DualHeap<T> {
    /// Creates a buffer holding at most `capacity` values in both heaps together.
    pub fn new(capacity: usize) -> Self {
        DualHeap {
            data: vec![T::default(); capacity].into_boxed_slice(),
            left_len: 0,
            right_len: 0,
            current: Side::Left,
        }
    }

    /// Total capacity of the buffer.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Number of values that can still be pushed into either heap.
    pub fn remaining_capacity(&self) -> usize {
        self.data.len() - self.left_len - self.right_len
    }

    /// Number of values in both heaps.
    pub fn len(&self) -> usize {
        self.left_len + self.right_len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Side the current heap grows from.
    pub fn current_side(&self) -> Side {
        self.current
    }

    /// Exchanges the roles of the current and the next heap.
    pub fn swap_roles(&mut self) {
        self.current = self.current.opposite();
    }

    /// Current heap.
    pub fn current(&mut self) -> HeapMut<'_, T> {
        let side = self.current;
        self.side(side)
    }

    /// Next heap.
    pub fn next(&mut self) -> HeapMut<'_, T> {
        let side = self.current.opposite();
        self.side(side)
    }

    /// Heap growing from the given side.
    pub fn side(&mut self, side: Side) -> HeapMut<'_, T> {
        HeapMut { buf: self, side }
    }

    fn slot(&self, side: Side, idx: usize) -> usize {
        match side {
            Side::Left => idx,
            Side::Right => self.data.len() - 1 - idx,
        }
    }
}

/// Mutable view of one heap of a [`DualHeap`].
pub struct HeapMut<'a, T> {
    buf: &'a mut DualHeap<T>,
    side: Side,
}

impl<T: Copy + Ord + Default> HeapMut<'_, T> {
    pub fn len(&self) -> usize {
        match self.side {
            Side::Left => self.buf.left_len,
            Side::Right => self.buf.right_len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Smallest value of the heap.
    pub fn peek(&self) -> Option<T> {
        if self.is_empty() {
            None
        } else {
            Some(self.get(0))
        }
    }

    /// Appends a value without restoring the heap order.
    /// [`HeapMut::heapify`] must be called before the heap is used as a heap again.
    ///
    /// # Panics
    /// Panics if the buffer has no remaining capacity.
    pub fn array_push(&mut self, value: T) {
        assert!(self.buf.remaining_capacity() > 0, "dual heap capacity exceeded");

        let len = self.len();
        let slot = self.buf.slot(self.side, len);
        self.buf.data[slot] = value;
        self.set_len(len + 1);
    }

    /// Restores the heap order over all values.
    pub fn heapify(&mut self) {
        let len = self.len();
        for idx in (0..len / 2).rev() {
            self.sift_down(idx, len);
        }
    }

    /// Pushes a value keeping the heap order.
    ///
    /// # Panics
    /// Panics if the buffer has no remaining capacity.
    pub fn push(&mut self, value: T) {
        self.array_push(value);
        let last = self.len() - 1;
        self.sift_up(last);
    }

    /// Removes and returns the smallest value.
    pub fn pop(&mut self) -> Option<T> {
        let len = self.len();
        if len == 0 {
            return None;
        }

        let last = len - 1;
        self.swap(0, last);
        self.set_len(last);
        self.sift_down(0, last);

        return Some(self.get(last));
    }

    fn set_len(&mut self, len: usize) {
        match self.side {
            Side::Left => self.buf.left_len = len,
            Side::Right => self.buf.right_len = len,
        }
    }

    fn get(&self, idx: usize) -> T {
        self.buf.data[self.buf.slot(self.side, idx)]
    }

    fn swap(&mut self, i: usize, j: usize) {
        let i = self.buf.slot(self.side, i);
        let j = self.buf.slot(self.side, j);
        self.buf.data.swap(i, j);
    }

    fn sift_up(&mut self, mut idx: usize) {
        while idx > 0 {
            let parent = (idx - 1) / 2;
            if self.get(idx) >= self.get(parent) {
                break;
            }
            self.swap(idx, parent);
            idx = parent;
        }
    }

    fn sift_down(&mut self, mut idx: usize, len: usize) {
        loop {
            let left = 2 * idx + 1;
            if left >= len {
                break;
            }

            let right = left + 1;
            let child = if right < len && self.get(right) < self.get(left) {
                right
            } else {
                left
            };

            if self.get(idx) <= self.get(child) {
                break;
            }
            self.swap(idx, child);
            idx = child;
        }
    }
}
