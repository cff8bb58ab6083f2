//! Run buffer.

use rayon;
use rayon::slice::ParallelSliceMut;

/// Working buffer of the initial sort limited by values count.
/// The storage is allocated once and reused for every run.
pub struct RunBuffer {
    limit: usize,
    inner: Vec<u64>,
}

impl RunBuffer {
    pub fn new(limit: usize) -> Self {
        RunBuffer {
            limit,
            inner: Vec::with_capacity(limit),
        }
    }

    /// Adds a new value to the buffer.
    pub fn push(&mut self, value: u64) {
        self.inner.push(value);
    }

    /// Returns buffer length.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Checks if the buffer reached the limit.
    pub fn is_full(&self) -> bool {
        self.inner.len() >= self.limit
    }

    /// Drops buffered values keeping the allocation.
    pub fn clear(&mut self) {
        self.inner.clear();
    }

    pub fn as_slice(&self) -> &[u64] {
        self.inner.as_slice()
    }

    /// Sorts buffered values in ascending order, in parallel if a thread pool is provided.
    pub fn sort(&mut self, thread_pool: Option<&rayon::ThreadPool>) {
        match thread_pool {
            Some(thread_pool) => thread_pool.install(|| self.par_sort_unstable()),
            None => self.inner.sort_unstable(),
        }
    }
}

impl rayon::slice::ParallelSliceMut<u64> for RunBuffer {
    fn as_parallel_slice_mut(&mut self) -> &mut [u64] {
        self.inner.as_mut_slice()
    }
}

#[cfg(test)]
mod test {
    use rstest::*;

    use super::RunBuffer;

    #[test]
    fn test_run_buffer() {
        let mut buffer = RunBuffer::new(2);

        buffer.push(1);
        assert_eq!(buffer.is_full(), false);
        buffer.push(0);
        assert_eq!(buffer.is_full(), true);
        assert_eq!(buffer.as_slice(), &[1, 0]);

        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer.is_full(), false);
    }

    #[rstest]
    #[case(false)]
    #[case(true)]
    fn test_run_buffer_sort(#[case] parallel: bool) {
        let thread_pool = rayon::ThreadPoolBuilder::new().num_threads(2).build().unwrap();
        let mut buffer = RunBuffer::new(6);
        for value in [5, 3, 9, 3, 0, 7] {
            buffer.push(value);
        }

        buffer.sort(if parallel { Some(&thread_pool) } else { None });
        assert_eq!(buffer.as_slice(), &[0, 3, 3, 5, 7, 9]);
    }
}
