//! External sorter.

use log;
use std::path::Path;

use crate::codec::{ValueReader, ValueWriter};
use crate::error::SortError;
use crate::initial::InitialSort;
use crate::merger;
use crate::params::{Generator, Params};
use crate::profile::IoClock;
use crate::replacement::ReplacementSelection;
use crate::run::{Run, RunRegistry, SealedRun};
use crate::storage::RunFiles;

/// Sorting summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortStats {
    /// Number of sorted values.
    pub values: u64,
    /// Number of runs produced by the run generator.
    pub runs: usize,
    /// Merge fan-in used.
    pub arity: usize,
    /// Number of merge passes including the final one.
    pub merge_passes: usize,
}

/// External sorter builder. Provides methods for [`ExternalSorter`] initialization.
#[derive(Clone)]
pub struct ExternalSorterBuilder {
    /// Sorting parameters.
    params: Params,
    /// Number of threads to be used to sort runs in memory.
    threads_number: Option<usize>,
    /// Directory to be used to store temporary data.
    tmp_dir: Option<Box<Path>>,
    /// Clock measuring time spent in temporary files I/O.
    io_clock: Option<IoClock>,
}

impl ExternalSorterBuilder {
    /// Creates an instance of a builder with the given parameters.
    pub fn new(params: Params) -> Self {
        ExternalSorterBuilder {
            params,
            threads_number: None,
            tmp_dir: None,
            io_clock: None,
        }
    }

    /// Builds an [`ExternalSorter`] instance using provided configuration.
    pub fn build(self) -> Result<ExternalSorter, SortError> {
        ExternalSorter::new(
            self.params,
            self.threads_number,
            self.tmp_dir.as_deref(),
            self.io_clock,
        )
    }

    /// Sets sorting parameters.
    pub fn with_params(mut self, params: Params) -> ExternalSorterBuilder {
        self.params = params;
        return self;
    }

    /// Sets number of threads to be used to sort runs in memory.
    pub fn with_threads_number(mut self, threads_number: usize) -> ExternalSorterBuilder {
        self.threads_number = Some(threads_number);
        return self;
    }

    /// Sets directory to be used to store temporary data.
    pub fn with_tmp_dir(mut self, path: &Path) -> ExternalSorterBuilder {
        self.tmp_dir = Some(path.into());
        return self;
    }

    /// Sets clock measuring time spent in temporary files I/O.
    pub fn with_io_clock(mut self, io_clock: IoClock) -> ExternalSorterBuilder {
        self.io_clock = Some(io_clock);
        return self;
    }
}

/// External sorter.
pub struct ExternalSorter {
    /// Sorting parameters.
    params: Params,
    /// In-memory sorting thread pool.
    thread_pool: rayon::ThreadPool,
    /// Directory to be used to store temporary data.
    tmp_dir: tempfile::TempDir,
    /// Clock measuring time spent in temporary files I/O.
    io_clock: Option<IoClock>,
}

impl ExternalSorter {
    /// Creates a new external sorter instance.
    ///
    /// # Arguments
    /// * `params` - Sorting parameters, validated here
    /// * `threads_number` - Number of threads to be used to sort runs in memory. If the parameter is [`None`]
    ///   a single thread is used.
    /// * `tmp_path` - Directory to be used to store temporary data. If paramater is [`None`] default OS temporary
    ///   directory will be used.
    /// * `io_clock` - Clock measuring time spent in temporary files I/O.
    pub fn new(
        params: Params,
        threads_number: Option<usize>,
        tmp_path: Option<&Path>,
        io_clock: Option<IoClock>,
    ) -> Result<Self, SortError> {
        params.validate()?;

        return Ok(ExternalSorter {
            params,
            thread_pool: Self::init_thread_pool(threads_number)?,
            tmp_dir: Self::init_tmp_directory(tmp_path)?,
            io_clock,
        });
    }

    fn init_thread_pool(threads_number: Option<usize>) -> Result<rayon::ThreadPool, SortError> {
        let threads_number = threads_number.unwrap_or(1);
        log::info!("initializing thread-pool (threads: {})", threads_number);

        let thread_pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads_number)
            .build()
            .map_err(|err| SortError::ThreadPoolBuildError(err))?;

        return Ok(thread_pool);
    }

    fn init_tmp_directory(tmp_path: Option<&Path>) -> Result<tempfile::TempDir, SortError> {
        let tmp_dir = if let Some(tmp_path) = tmp_path {
            tempfile::tempdir_in(tmp_path)
        } else {
            tempfile::tempdir()
        }
        .map_err(|err| SortError::TempDir(err))?;

        log::info!("using {} as a temporary directory", tmp_dir.path().display());

        return Ok(tmp_dir);
    }

    /// Sorting parameters.
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Sorts values from the reader into the writer.
    /// Every temporary file created by the sort is removed before returning, whatever the outcome.
    ///
    /// # Arguments
    /// * `reader` - Input values
    /// * `writer` - Sorted output, flushed at the end
    pub fn sort<R, W>(&self, reader: &mut R, writer: &mut W) -> Result<SortStats, SortError>
    where
        R: ValueReader + ?Sized,
        W: ValueWriter + ?Sized,
    {
        let mut files = RunFiles::new(self.tmp_dir.path(), self.params.buffer_size, self.io_clock.as_ref());

        log::info!("running first stage ({:?}) ...", self.params.generator);
        let mut registry = self.generate_runs(&mut files, reader)?;
        let runs = registry.len();
        let values = registry.total_length();
        log::info!("first stage done (runs: {}, values: {})", runs, values);

        let arity = self.resolve_arity(runs)?;
        log::info!("merging with arity {}", arity);

        let mut merge_passes = 0;
        if registry.len() > arity {
            let first_merge_arity = (registry.len() - 1) % (arity - 1) + 1;
            if first_merge_arity > 1 {
                log::info!("running first merge (runs: {}) ...", first_merge_arity);
                self.merge_into_run(&mut files, &mut registry, first_merge_arity)?;
                merge_passes += 1;
            }

            log::info!("running intermediate merges ...");
            while registry.len() > arity {
                self.merge_into_run(&mut files, &mut registry, arity)?;
                merge_passes += 1;
            }
            log::info!("intermediate merges done (passes: {})", merge_passes);
        }

        log::info!("running final merge (runs: {}) ...", registry.len());
        let count = registry.len();
        Self::merge_smallest(&mut files, &mut registry, count, writer)?;
        merge_passes += 1;
        log::info!(
            "final merge done (passes: {}, temporary files created: {}, left: {})",
            merge_passes,
            files.created(),
            files.alive()
        );

        return Ok(SortStats {
            values,
            runs,
            arity,
            merge_passes,
        });
    }

    fn generate_runs<R>(&self, files: &mut RunFiles, reader: &mut R) -> Result<RunRegistry, SortError>
    where
        R: ValueReader + ?Sized,
    {
        let (file, mut writer) = files.create()?;
        let work_budget = self.params.first_stage_memory_limit;
        let run_budget = self.params.reserve_for_run_metadata;

        let runs = match self.params.generator {
            Generator::InitialSort => InitialSort::new(work_budget, run_budget)?
                .with_thread_pool(&self.thread_pool)
                .generate(reader, &mut writer)?,
            Generator::ReplacementSelection => {
                ReplacementSelection::new(work_budget, run_budget)?.generate(reader, &mut writer)?
            }
        };
        writer.flush()?;
        drop(writer);
        files.seal(file, runs.len());

        let mut registry = RunRegistry::new();
        registry.extend(runs.into_iter().map(|run| SealedRun { file, run }));

        return Ok(registry);
    }

    fn resolve_arity(&self, runs: usize) -> Result<usize, SortError> {
        let arity = match self.params.arity {
            Some(arity) => arity,
            None => self.params.default_arity(runs)?,
        };

        // a single-run fan-in never reduces the number of runs
        if arity < 2 && runs > arity {
            return Err(SortError::NotEnoughMemory);
        }

        return Ok(arity);
    }

    /// Merges `count` shortest runs into a new temporary file and registers the result.
    fn merge_into_run(&self, files: &mut RunFiles, registry: &mut RunRegistry, count: usize) -> Result<(), SortError> {
        let (file, mut writer) = files.create()?;
        let length = Self::merge_smallest(files, registry, count, &mut writer)?;
        drop(writer);
        files.seal(file, 1);

        log::debug!("merged {} runs into a run of {} values", count, length);
        registry.push(SealedRun {
            file,
            run: Run::new(0, length),
        });

        return Ok(());
    }

    /// Merges `count` shortest runs into the writer releasing the consumed runs.
    fn merge_smallest<W>(
        files: &mut RunFiles,
        registry: &mut RunRegistry,
        count: usize,
        writer: &mut W,
    ) -> Result<u64, SortError>
    where
        W: ValueWriter + ?Sized,
    {
        let runs = registry.pop_smallest(count);

        let mut readers = Vec::with_capacity(runs.len());
        for run in &runs {
            readers.push(files.open(run)?);
        }
        let written = merger::merge(readers, writer)?;

        for run in &runs {
            files.release(run.file);
        }

        return Ok(written);
    }
}

/// Sorts values from the reader into the writer using the default temporary directory.
///
/// # Arguments
/// * `reader` - Input values
/// * `writer` - Sorted output, flushed at the end
/// * `params` - Sorting parameters
pub fn sort<R, W>(reader: &mut R, writer: &mut W, params: Params) -> Result<SortStats, SortError>
where
    R: ValueReader + ?Sized,
    W: ValueWriter + ?Sized,
{
    ExternalSorterBuilder::new(params).build()?.sort(reader, writer)
}

#[cfg(test)]
mod test {
    use std::io::{self, ErrorKind};
    use std::path::Path;

    use rand::prelude::*;
    use rstest::*;

    use super::{sort, ExternalSorter, ExternalSorterBuilder};
    use crate::codec::{BinaryReader, BinaryWriter, SliceReader, ValueReader, VALUE_SIZE};
    use crate::params::{Generator, Params};
    use crate::profile::IoClock;
    use crate::SortError;

    const SMALL_INPUT: [u64; 16] = [2326, 141, 15, 824, 2, 1882, 344, 152, 85, 5, 123, 123, 1, 268, 1023, 9652];

    fn small_params(generator: Generator) -> Params {
        Params {
            memory_limit: 1000,
            arity: Some(3),
            buffer_size: 1,
            generator,
            reserve_for_run_metadata: 100,
            first_stage_memory_limit: 3,
        }
    }

    fn sorter(params: Params) -> ExternalSorter {
        ExternalSorterBuilder::new(params)
            .with_threads_number(2)
            .with_tmp_dir(Path::new("./"))
            .build()
            .unwrap()
    }

    fn tmp_files(sorter: &ExternalSorter) -> usize {
        std::fs::read_dir(sorter.tmp_dir.path()).unwrap().count()
    }

    fn sorted(input: &[u64]) -> Vec<u64> {
        let mut expected = input.to_vec();
        expected.sort_unstable();
        expected
    }

    #[rstest]
    #[case(Generator::InitialSort)]
    #[case(Generator::ReplacementSelection)]
    fn test_external_sorter_small(#[case] generator: Generator) {
        let sorter = sorter(small_params(generator));
        let mut output: Vec<u64> = Vec::new();

        let stats = sorter.sort(&mut SliceReader::new(&SMALL_INPUT), &mut output).unwrap();

        assert_eq!(output, sorted(&SMALL_INPUT));
        assert_eq!(stats.values, 16);
        assert_eq!(stats.arity, 3);
        assert!(stats.merge_passes > 1);
        assert_eq!(tmp_files(&sorter), 0);
    }

    #[test]
    fn test_external_sorter_pass_schedule() {
        // 6 runs of at most 3 values with arity 3: 2 runs first, then 3, then the final 3
        let sorter = sorter(small_params(Generator::InitialSort));
        let mut output: Vec<u64> = Vec::new();

        let stats = sorter.sort(&mut SliceReader::new(&SMALL_INPUT), &mut output).unwrap();

        assert_eq!(stats.runs, 6);
        assert_eq!(stats.merge_passes, 3);
    }

    #[rstest]
    #[case(Generator::InitialSort, 2)]
    #[case(Generator::InitialSort, 5)]
    #[case(Generator::ReplacementSelection, 2)]
    #[case(Generator::ReplacementSelection, 7)]
    fn test_external_sorter_random(#[case] generator: Generator, #[case] arity: usize) {
        let mut input = Vec::from_iter(0..20_000u64);
        input.shuffle(&mut rand::thread_rng());

        let params = Params {
            memory_limit: 1000,
            arity: Some(arity),
            buffer_size: 16,
            generator,
            reserve_for_run_metadata: 4096,
            first_stage_memory_limit: 100,
        };
        let sorter = sorter(params);
        let mut output: Vec<u64> = Vec::new();

        let stats = sorter.sort(&mut SliceReader::new(&input), &mut output).unwrap();

        assert_eq!(output, Vec::from_iter(0..20_000u64));
        assert_eq!(stats.values, 20_000);
        assert_eq!(tmp_files(&sorter), 0);
    }

    #[rstest]
    #[case(Generator::InitialSort)]
    #[case(Generator::ReplacementSelection)]
    fn test_external_sorter_duplicates(#[case] generator: Generator) {
        let mut rng = StdRng::seed_from_u64(3);
        let input: Vec<u64> = (0..5_000).map(|_| rng.gen_range(0..10)).collect();
        let sorter = sorter(Params {
            first_stage_memory_limit: 50,
            reserve_for_run_metadata: 1000,
            ..small_params(generator)
        });
        let mut output: Vec<u64> = Vec::new();

        sorter.sort(&mut SliceReader::new(&input), &mut output).unwrap();

        assert_eq!(output, sorted(&input));
    }

    #[rstest]
    #[case(Generator::InitialSort)]
    #[case(Generator::ReplacementSelection)]
    fn test_external_sorter_idempotent(#[case] generator: Generator) {
        let input = Vec::from_iter(0..1_000u64);
        let sorter = sorter(Params {
            first_stage_memory_limit: 10,
            reserve_for_run_metadata: 1000,
            ..small_params(generator)
        });
        let mut output: Vec<u64> = Vec::new();

        sorter.sort(&mut SliceReader::new(&input), &mut output).unwrap();

        assert_eq!(output, input);
    }

    #[test]
    fn test_external_sorter_sorted_input_single_run() {
        // replacement selection turns sorted input into a single run
        let input = Vec::from_iter(0..1_000u64);
        let sorter = sorter(Params {
            first_stage_memory_limit: 10,
            ..small_params(Generator::ReplacementSelection)
        });
        let mut output: Vec<u64> = Vec::new();

        let stats = sorter.sort(&mut SliceReader::new(&input), &mut output).unwrap();

        assert_eq!(stats.runs, 1);
        assert_eq!(stats.merge_passes, 1);
    }

    #[rstest]
    #[case(Generator::InitialSort)]
    #[case(Generator::ReplacementSelection)]
    fn test_external_sorter_empty_input(#[case] generator: Generator) {
        let sorter = sorter(small_params(generator));
        let mut output: Vec<u64> = Vec::new();

        let stats = sorter.sort(&mut SliceReader::new(&[]), &mut output).unwrap();

        assert!(output.is_empty());
        assert_eq!(stats.runs, 0);
        assert_eq!(stats.values, 0);
        assert_eq!(stats.merge_passes, 1);
        assert_eq!(tmp_files(&sorter), 0);
    }

    #[test]
    fn test_external_sorter_single_pass_when_runs_fit() {
        let sorter = sorter(Params {
            arity: Some(6),
            ..small_params(Generator::InitialSort)
        });
        let mut output: Vec<u64> = Vec::new();

        let stats = sorter.sort(&mut SliceReader::new(&SMALL_INPUT), &mut output).unwrap();

        assert_eq!(stats.runs, 6);
        assert_eq!(stats.merge_passes, 1);
        assert_eq!(output, sorted(&SMALL_INPUT));
    }

    #[test]
    fn test_external_sorter_default_arity() {
        let mut input = Vec::from_iter(0..10_000u64);
        input.shuffle(&mut rand::thread_rng());
        let params = Params {
            memory_limit: 10_000,
            arity: None,
            buffer_size: 16,
            generator: Generator::InitialSort,
            reserve_for_run_metadata: 4096,
            first_stage_memory_limit: 100,
        };
        let mut output: Vec<u64> = Vec::new();

        let stats = sort(&mut SliceReader::new(&input), &mut output, params).unwrap();

        // (10000 - 16 - 10 * 100) / 16
        assert_eq!(stats.arity, 561);
        assert_eq!(stats.merge_passes, 1);
        assert_eq!(output, Vec::from_iter(0..10_000u64));
    }

    #[test]
    fn test_external_sorter_not_enough_memory_for_runs() {
        let input = Vec::from_iter((0..100u64).rev());
        let sorter = sorter(Params {
            reserve_for_run_metadata: 10,
            ..small_params(Generator::InitialSort)
        });

        let result = sorter.sort(&mut SliceReader::new(&input), &mut Vec::<u64>::new());

        assert!(matches!(result, Err(SortError::NotEnoughMemory)));
        assert_eq!(tmp_files(&sorter), 0);
    }

    #[test]
    fn test_external_sorter_not_enough_memory_for_arity() {
        let input = Vec::from_iter((0..100u64).rev());
        let sorter = sorter(Params {
            memory_limit: 200,
            arity: None,
            buffer_size: 1,
            ..small_params(Generator::InitialSort)
        });

        let result = sorter.sort(&mut SliceReader::new(&input), &mut Vec::<u64>::new());

        assert!(matches!(result, Err(SortError::NotEnoughMemory)));
        assert_eq!(tmp_files(&sorter), 0);
    }

    #[test]
    fn test_external_sorter_invalid_params() {
        let result = ExternalSorterBuilder::new(Params {
            arity: Some(1),
            ..small_params(Generator::InitialSort)
        })
        .build();
        assert!(matches!(result, Err(SortError::ValueTooSmall { parameter: "arity" })));

        let result = sort(
            &mut SliceReader::new(&SMALL_INPUT),
            &mut Vec::<u64>::new(),
            Params::with_memory_limit(100),
        );
        assert!(matches!(result, Err(SortError::ValueTooSmall { .. })));
    }

    /// Yields `count` values then fails.
    struct FailingReader {
        count: u64,
    }

    impl ValueReader for FailingReader {
        fn read(&mut self) -> Result<Option<u64>, SortError> {
            if self.count == 0 {
                return Err(io::Error::new(ErrorKind::Other, "test error").into());
            }
            self.count -= 1;
            Ok(Some(self.count))
        }
    }

    #[test]
    fn test_external_sorter_input_error_cleans_up() {
        let sorter = sorter(small_params(Generator::InitialSort));

        let result = sorter.sort(&mut FailingReader { count: 10 }, &mut Vec::<u64>::new());

        assert!(matches!(result, Err(SortError::IO(_))));
        assert_eq!(tmp_files(&sorter), 0);
    }

    #[test]
    fn test_external_sorter_binary_streams() {
        let mut rng = StdRng::seed_from_u64(11);
        let input: Vec<u64> = (0..3_000).map(|_| rng.gen()).collect();
        let bytes: Vec<u8> = input.iter().flat_map(|value| value.to_le_bytes()).collect();

        let clock = IoClock::new();
        let sorter = ExternalSorterBuilder::new(Params {
            memory_limit: 1000,
            arity: Some(4),
            buffer_size: 8,
            generator: Generator::ReplacementSelection,
            reserve_for_run_metadata: 1000,
            first_stage_memory_limit: 64,
        })
        .with_tmp_dir(Path::new("./"))
        .with_io_clock(clock.clone())
        .build()
        .unwrap();

        let mut reader = BinaryReader::with_capacity(8, io::Cursor::new(bytes));
        let mut writer = BinaryWriter::with_capacity(8, Vec::new());
        sorter.sort(&mut reader, &mut writer).unwrap();

        let output = writer.into_inner().unwrap();
        assert_eq!(output.len(), input.len() * VALUE_SIZE);
        let output: Vec<u64> = output
            .chunks_exact(VALUE_SIZE)
            .map(|chunk| u64::from_le_bytes(chunk.try_into().unwrap()))
            .collect();
        assert_eq!(output, sorted(&input));
        assert!(clock.elapsed().as_nanos() > 0);
    }

    #[test]
    fn test_external_sorter_trailing_bytes() {
        let sorter = sorter(small_params(Generator::InitialSort));
        let mut reader = BinaryReader::with_capacity(4, io::Cursor::new(vec![0u8; 21]));

        let result = sorter.sort(&mut reader, &mut Vec::<u64>::new());

        assert!(matches!(result, Err(SortError::TrailingBytes { count: 5 })));
        assert_eq!(tmp_files(&sorter), 0);
    }
}
