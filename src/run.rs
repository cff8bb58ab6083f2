//! Sorted runs and their bookkeeping.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::error::SortError;

/// Sorted range of values in the output of a run generator.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Run {
    /// Index of the first value of the run.
    pub offset: u64,
    /// Number of values in the run.
    pub length: u64,
}

impl Run {
    pub fn new(offset: u64, length: u64) -> Self {
        Run { offset, length }
    }
}

/// Identity of a temporary file within one sort.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FileId(pub(crate) usize);

/// Run materialized in a sealed temporary file.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SealedRun {
    pub file: FileId,
    pub run: Run,
}

/// Collects generated runs enforcing the run metadata budget.
/// Every run descriptor is accounted as 2 values.
pub(crate) struct RunCollector {
    runs: Vec<Run>,
    budget: usize,
    emitted: u64,
}

impl RunCollector {
    pub(crate) fn new(budget: usize) -> Self {
        RunCollector {
            runs: Vec::new(),
            budget,
            emitted: 0,
        }
    }

    /// Total length of the collected runs.
    pub(crate) fn emitted(&self) -> u64 {
        self.emitted
    }

    /// Closes a run of `length` values starting right after the previous one.
    /// Empty runs are not recorded.
    pub(crate) fn close(&mut self, length: u64) -> Result<(), SortError> {
        if length == 0 {
            return Ok(());
        }

        self.runs.push(Run::new(self.emitted, length));
        self.emitted += length;

        if 2 * self.runs.len() > self.budget {
            return Err(SortError::NotEnoughMemory);
        }

        return Ok(());
    }

    pub(crate) fn into_runs(self) -> Vec<Run> {
        self.runs
    }
}

/// Sealed runs ordered by length, shortest first.
/// Merging the shortest runs first minimizes the volume re-read by later passes.
#[derive(Default)]
pub struct RunRegistry {
    // binary heap is max-heap by default so we reverse it to convert it to min-heap;
    // the sequence number makes the order of equal-length runs deterministic
    runs: BinaryHeap<Reverse<(u64, u64, SealedRun)>>,
    seq: u64,
}

impl RunRegistry {
    pub fn new() -> Self {
        RunRegistry::default()
    }

    /// Registers a run.
    pub fn push(&mut self, run: SealedRun) {
        self.runs.push(Reverse((run.run.length, self.seq, run)));
        self.seq += 1;
    }

    /// Removes and returns the shortest run.
    pub fn pop(&mut self) -> Option<SealedRun> {
        self.runs.pop().map(|Reverse((_, _, run))| run)
    }

    /// Removes and returns up to `count` shortest runs, shortest first.
    pub fn pop_smallest(&mut self, count: usize) -> Vec<SealedRun> {
        let mut smallest = Vec::with_capacity(count.min(self.runs.len()));
        while smallest.len() < count {
            match self.pop() {
                Some(run) => smallest.push(run),
                None => break,
            }
        }

        return smallest;
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Total number of values in the registered runs.
    pub fn total_length(&self) -> u64 {
        self.runs.iter().map(|Reverse((length, _, _))| length).sum()
    }
}

impl Extend<SealedRun> for RunRegistry {
    fn extend<I: IntoIterator<Item = SealedRun>>(&mut self, iter: I) {
        for run in iter {
            self.push(run);
        }
    }
}
