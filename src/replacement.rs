//! Replacement selection run generator.
//!
//! The current heap holds values that may still extend the active run, the next heap holds
//! values smaller than the last written one which have to wait for the following run.
//! Both heaps live in one [`DualHeap`], so their total size never exceeds the heap budget.
//! For random input the runs are about twice as long as the heap.

use log;

use crate::codec::{ValueReader, ValueWriter};
use crate::error::SortError;
use crate::heap::DualHeap;
use crate::run::{Run, RunCollector};

/// Replacement selection run generator.
pub struct ReplacementSelection {
    heap: DualHeap<u64>,
    run_budget: usize,
}

impl ReplacementSelection {
    /// Creates a generator.
    ///
    /// # Arguments
    /// * `heap_budget` - Number of values held by both heaps together
    /// * `run_budget` - Memory available for run descriptors, 2 values per run
    pub fn new(heap_budget: usize, run_budget: usize) -> Result<Self, SortError> {
        if heap_budget == 0 {
            return Err(SortError::ValueTooSmall {
                parameter: "first_stage_memory_limit",
            });
        }

        return Ok(ReplacementSelection {
            heap: DualHeap::new(heap_budget),
            run_budget,
        });
    }

    /// Splits the input into sorted runs written one after another to the writer.
    pub fn generate<R, W>(&mut self, reader: &mut R, writer: &mut W) -> Result<Vec<Run>, SortError>
    where
        R: ValueReader + ?Sized,
        W: ValueWriter + ?Sized,
    {
        let mut state = RunState {
            runs: RunCollector::new(self.run_budget),
            written: 0,
            last_written: 0,
        };

        while self.heap.remaining_capacity() > 0 {
            match reader.read()? {
                Some(value) => self.heap.current().array_push(value),
                None => break,
            }
        }
        self.heap.current().heapify();

        while let Some(value) = reader.read()? {
            self.emit_one(&mut state, writer)?;

            if value >= state.last_written {
                self.heap.current().push(value);
            } else {
                // the next heap is heapified when it becomes current
                self.heap.next().array_push(value);
            }
        }

        while !self.heap.is_empty() {
            self.emit_one(&mut state, writer)?;
        }

        let tail = state.written - state.runs.emitted();
        state.runs.close(tail)?;
        writer.flush()?;

        log::debug!("replacement selection done (values: {})", state.written);

        return Ok(state.runs.into_runs());
    }

    /// Writes the smallest value of the active run, starting a new run if the active one is over.
    fn emit_one<W>(&mut self, state: &mut RunState, writer: &mut W) -> Result<(), SortError>
    where
        W: ValueWriter + ?Sized,
    {
        if self.heap.current().is_empty() {
            let length = state.written - state.runs.emitted();
            state.runs.close(length)?;
            log::debug!("run sealed (values: {}, total: {})", length, state.written);

            state.last_written = 0;
            self.heap.swap_roles();
            self.heap.current().heapify();
        }

        if let Some(value) = self.heap.current().pop() {
            writer.write(value)?;
            state.written += 1;
            state.last_written = value;
        }

        return Ok(());
    }
}

struct RunState {
    runs: RunCollector,
    written: u64,
    last_written: u64,
}

/// Splits the input into sorted runs using replacement selection.
///
/// # Arguments
/// * `reader` - Input values
/// * `writer` - Destination of the runs, written one after another
/// * `heap_budget` - Number of values held by both heaps together
/// * `run_budget` - Memory available for run descriptors, 2 values per run
pub fn replacement_selection<R, W>(
    reader: &mut R,
    writer: &mut W,
    heap_budget: usize,
    run_budget: usize,
) -> Result<Vec<Run>, SortError>
where
    R: ValueReader + ?Sized,
    W: ValueWriter + ?Sized,
{
    ReplacementSelection::new(heap_budget, run_budget)?.generate(reader, writer)
}
