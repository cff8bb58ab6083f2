//! Binary heap merger.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::codec::{ValueReader, ValueWriter};
use crate::error::SortError;

/// Binary heap merger implementation.
/// Merges multiple sorted inputs into a single sorted output.
/// Time complexity is *m* \* log(*n*) in worst case where *m* is the number of values,
/// *n* is the number of inputs.
///
/// Equal values coming from different inputs are yielded in unspecified order.
pub struct BinaryHeapMerger<R: ValueReader> {
    // binary heap is max-heap by default so we reverse it to convert it to min-heap
    items: BinaryHeap<Reverse<(u64, usize)>>,
    readers: Vec<R>,
    initiated: bool,
    failed: bool,
}

impl<R: ValueReader> BinaryHeapMerger<R> {
    /// Creates an instance of a binary heap merger using readers as inputs.
    /// Reader values should be sorted in ascending order otherwise the result is undefined.
    ///
    /// # Arguments
    /// * `readers` - Readers to be merged in a single sorted stream
    pub fn new<I>(readers: I) -> Self
    where
        I: IntoIterator<Item = R>,
    {
        let readers = Vec::from_iter(readers);
        let items = BinaryHeap::with_capacity(readers.len());

        return BinaryHeapMerger {
            readers,
            items,
            initiated: false,
            failed: false,
        };
    }

    fn advance(&mut self, idx: usize) -> Result<(), SortError> {
        if let Some(value) = self.readers[idx].read()? {
            self.items.push(Reverse((value, idx)));
        }
        Ok(())
    }

    fn next_value(&mut self) -> Result<Option<u64>, SortError> {
        if !self.initiated {
            self.initiated = true;
            for idx in 0..self.readers.len() {
                self.advance(idx)?;
            }
        }

        let Reverse((value, idx)) = match self.items.pop() {
            Some(item) => item,
            None => return Ok(None),
        };
        self.advance(idx)?;

        return Ok(Some(value));
    }
}

impl<R: ValueReader> Iterator for BinaryHeapMerger<R> {
    type Item = Result<u64, SortError>;

    /// Returns the next value from the inputs in ascending order.
    /// The merger is fused after the first error.
    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        match self.next_value() {
            Ok(value) => value.map(Ok),
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}

/// Merges sorted readers into the writer and flushes it.
/// Returns the number of written values.
///
/// # Arguments
/// * `readers` - Sorted inputs, any of them may be empty
/// * `writer` - Merged output
pub fn merge<R, I, W>(readers: I, writer: &mut W) -> Result<u64, SortError>
where
    R: ValueReader,
    I: IntoIterator<Item = R>,
    W: ValueWriter + ?Sized,
{
    let mut written = 0;
    for value in BinaryHeapMerger::new(readers) {
        writer.write(value?)?;
        written += 1;
    }
    writer.flush()?;

    return Ok(written);
}
