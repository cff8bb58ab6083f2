//! Sorting parameters.
//!
//! Every budget is expressed in values (one value is 8 bytes), not in bytes.

use crate::error::SortError;

/// Default stream buffer size in values.
pub const DEFAULT_BUFFER_SIZE: usize = 4096;

/// Values reserved for run metadata by [`Params::new`].
/// Enough unless the input is about a thousand times larger than the memory limit.
pub const DEFAULT_RESERVE_FOR_RUN_METADATA: usize = 4096;

/// Estimated memory overhead of a single run during merging, in values.
pub const RUN_OVERHEAD: usize = 10;

/// Initial runs generation algorithm.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Generator {
    /// Fill a buffer, sort it and flush it as a run.
    InitialSort,
    /// Dual-heap replacement selection, produces runs about twice as long as the heap.
    ReplacementSelection,
}

impl Default for Generator {
    fn default() -> Self {
        Generator::InitialSort
    }
}

/// External sort parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Params {
    /// Total memory available to the sort.
    pub memory_limit: usize,
    /// Merge fan-in. [`None`] means it is computed from the memory limit once runs are generated.
    pub arity: Option<usize>,
    /// Read/write buffer size of every opened run.
    pub buffer_size: usize,
    /// Initial runs generation algorithm.
    pub generator: Generator,
    /// Memory reserved for run descriptors. Every run takes 2 values.
    pub reserve_for_run_metadata: usize,
    /// Working memory of the run generator.
    pub first_stage_memory_limit: usize,
}

impl Params {
    /// Creates parameters deriving the first stage budget from the memory limit.
    ///
    /// # Arguments
    /// * `memory_limit` - Total memory available to the sort
    /// * `buffer_size` - Read/write buffer size of every opened run
    /// * `generator` - Initial runs generation algorithm
    pub fn new(memory_limit: usize, buffer_size: usize, generator: Generator) -> Self {
        let reserve = DEFAULT_RESERVE_FOR_RUN_METADATA;
        let first_stage_memory_limit = memory_limit
            .saturating_sub(buffer_size.saturating_mul(2))
            .saturating_sub(reserve);

        Params {
            memory_limit,
            arity: None,
            buffer_size,
            generator,
            reserve_for_run_metadata: reserve,
            first_stage_memory_limit,
        }
    }

    /// Creates parameters with the default buffer size and [`Generator::InitialSort`].
    pub fn with_memory_limit(memory_limit: usize) -> Self {
        Params::new(memory_limit, DEFAULT_BUFFER_SIZE, Generator::InitialSort)
    }

    /// Sets a fixed merge fan-in.
    pub fn with_arity(mut self, arity: usize) -> Self {
        self.arity = Some(arity);
        self
    }

    /// Checks that every budget allows the sort to make progress.
    pub fn validate(&self) -> Result<(), SortError> {
        let checks = [
            ("memory_limit", self.memory_limit >= 1),
            ("first_stage_memory_limit", self.first_stage_memory_limit >= 1),
            ("buffer_size", self.buffer_size >= 1),
            ("reserve_for_run_metadata", self.reserve_for_run_metadata >= 2),
            ("arity", self.arity.map_or(true, |arity| arity >= 2)),
        ];

        match checks.iter().find(|(_, ok)| !ok) {
            Some((parameter, _)) => Err(SortError::ValueTooSmall { parameter: *parameter }),
            None => Ok(()),
        }
    }

    /// Computes the merge fan-in that fits into the memory limit.
    ///
    /// One buffer is reserved for the output and [`RUN_OVERHEAD`] values for every run,
    /// the rest is split into input buffers.
    pub fn default_arity(&self, run_count: usize) -> Result<usize, SortError> {
        self.validate()?;

        let memory_left = self
            .memory_limit
            .checked_sub(self.buffer_size)
            .and_then(|left| left.checked_sub(run_count.saturating_mul(RUN_OVERHEAD)))
            .ok_or(SortError::NotEnoughMemory)?;

        match memory_left / self.buffer_size {
            0 => Err(SortError::NotEnoughMemory),
            arity => Ok(arity),
        }
    }
}
