//! Initial sort run generator.
//!
//! Fills a buffer, sorts it in memory and flushes it as one run, until the input is exhausted.

use log;
use rayon;

use crate::buffer::RunBuffer;
use crate::codec::{ValueReader, ValueWriter};
use crate::error::SortError;
use crate::run::{Run, RunCollector};

/// Sort-and-flush run generator.
pub struct InitialSort<'p> {
    buffer: RunBuffer,
    run_budget: usize,
    thread_pool: Option<&'p rayon::ThreadPool>,
}

impl<'p> InitialSort<'p> {
    /// Creates a generator.
    ///
    /// # Arguments
    /// * `work_budget` - Maximum run length in values
    /// * `run_budget` - Memory available for run descriptors, 2 values per run
    pub fn new(work_budget: usize, run_budget: usize) -> Result<Self, SortError> {
        if work_budget == 0 {
            return Err(SortError::ValueTooSmall {
                parameter: "first_stage_memory_limit",
            });
        }

        return Ok(InitialSort {
            buffer: RunBuffer::new(work_budget),
            run_budget,
            thread_pool: None,
        });
    }

    /// Sorts every run inside the thread pool.
    pub fn with_thread_pool(mut self, thread_pool: &'p rayon::ThreadPool) -> Self {
        self.thread_pool = Some(thread_pool);
        self
    }

    /// Splits the input into sorted runs written one after another to the writer.
    pub fn generate<R, W>(&mut self, reader: &mut R, writer: &mut W) -> Result<Vec<Run>, SortError>
    where
        R: ValueReader + ?Sized,
        W: ValueWriter + ?Sized,
    {
        let mut runs = RunCollector::new(self.run_budget);

        loop {
            self.buffer.clear();
            while !self.buffer.is_full() {
                match reader.read()? {
                    Some(value) => self.buffer.push(value),
                    None => break,
                }
            }

            if self.buffer.is_empty() {
                break;
            }

            self.buffer.sort(self.thread_pool);
            for &value in self.buffer.as_slice() {
                writer.write(value)?;
            }
            writer.flush()?;

            runs.close(self.buffer.len() as u64)?;
            log::debug!("run sealed (values: {}, total: {})", self.buffer.len(), runs.emitted());

            if !self.buffer.is_full() {
                break;
            }
        }

        return Ok(runs.into_runs());
    }
}

/// Splits the input into sorted runs of at most `work_budget` values.
///
/// # Arguments
/// * `reader` - Input values
/// * `writer` - Destination of the runs, written one after another
/// * `work_budget` - Maximum run length in values
/// * `run_budget` - Memory available for run descriptors, 2 values per run
pub fn generate_runs<R, W>(
    reader: &mut R,
    writer: &mut W,
    work_budget: usize,
    run_budget: usize,
) -> Result<Vec<Run>, SortError>
where
    R: ValueReader + ?Sized,
    W: ValueWriter + ?Sized,
{
    InitialSort::new(work_budget, run_budget)?.generate(reader, writer)
}

#[cfg(test)]
mod test {
    use rand::prelude::*;
    use rstest::*;

    use super::{generate_runs, InitialSort};
    use crate::codec::SliceReader;
    use crate::run::Run;
    use crate::SortError;

    #[rstest]
    #[case(vec![], 3, vec![])]
    #[case(vec![5], 3, vec![Run::new(0, 1)])]
    #[case(vec![3, 2, 1], 3, vec![Run::new(0, 3)])]
    #[case(vec![3, 2, 1, 0], 3, vec![Run::new(0, 3), Run::new(3, 1)])]
    #[case(vec![6, 5, 4, 3, 2, 1], 2, vec![Run::new(0, 2), Run::new(2, 2), Run::new(4, 2)])]
    fn test_initial_sort_runs(#[case] input: Vec<u64>, #[case] work_budget: usize, #[case] expected: Vec<Run>) {
        let mut output: Vec<u64> = Vec::new();
        let runs = generate_runs(&mut SliceReader::new(&input), &mut output, work_budget, 100).unwrap();
        assert_eq!(runs, expected);
        assert_eq!(output.len(), input.len());
    }

    #[test]
    fn test_initial_sort_output() {
        let input: Vec<u64> = vec![2326, 141, 15, 824, 2, 1882, 344, 152, 85, 5];
        let mut output: Vec<u64> = Vec::new();
        let runs = generate_runs(&mut SliceReader::new(&input), &mut output, 4, 100).unwrap();

        assert_eq!(runs, vec![Run::new(0, 4), Run::new(4, 4), Run::new(8, 2)]);
        assert_eq!(output, vec![15, 141, 824, 2326, 2, 152, 344, 1882, 5, 85]);
    }

    #[rstest]
    #[case(1)]
    #[case(7)]
    #[case(1000)]
    fn test_initial_sort_segment_sum(#[case] work_budget: usize) {
        let mut rng = rand::thread_rng();
        let input: Vec<u64> = (0..5000).map(|_| rng.gen()).collect();
        let thread_pool = rayon::ThreadPoolBuilder::new().num_threads(2).build().unwrap();

        let mut output: Vec<u64> = Vec::new();
        let runs = InitialSort::new(work_budget, usize::MAX)
            .unwrap()
            .with_thread_pool(&thread_pool)
            .generate(&mut SliceReader::new(&input), &mut output)
            .unwrap();

        assert_eq!(runs.iter().map(|run| run.length).sum::<u64>(), input.len() as u64);
        for run in &runs {
            let values = &output[run.offset as usize..(run.offset + run.length) as usize];
            assert!(values.windows(2).all(|w| w[0] <= w[1]));
            assert!(run.length as usize <= work_budget);
        }
    }

    #[test]
    fn test_initial_sort_not_enough_memory() {
        let input: Vec<u64> = Vec::from_iter(0..10);
        let result = generate_runs(&mut SliceReader::new(&input), &mut Vec::<u64>::new(), 2, 8);
        assert!(matches!(result, Err(SortError::NotEnoughMemory)));
    }

    #[test]
    fn test_initial_sort_zero_budget() {
        let result = generate_runs(&mut SliceReader::new(&[1]), &mut Vec::<u64>::new(), 0, 8);
        assert!(matches!(result, Err(SortError::ValueTooSmall { .. })));
    }
}
