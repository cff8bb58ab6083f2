//! Temporary run files of a single sort.
//!
//! Every file created during a sort is tracked here until it is deleted. A file is deleted as
//! soon as the last run stored in it is consumed by a merge; whatever is left is deleted when
//! [`RunFiles`] is dropped, so no exit path of the sort leaves files behind.

use std::fs;
use std::io::{Seek, SeekFrom};
use std::path::Path;

use log;
use tempfile;

use crate::codec::{BinaryReader, BinaryWriter, BoundedReader, VALUE_SIZE};
use crate::error::SortError;
use crate::profile::{IoClock, Timed};
use crate::run::{FileId, SealedRun};

/// Writer of a run file.
pub type RunWriter = BinaryWriter<Timed<fs::File>>;

/// Reader of a single run.
pub type RunReader = BoundedReader<BinaryReader<Timed<fs::File>>>;

struct RunFile {
    file: tempfile::NamedTempFile,
    live_runs: usize,
}

pub(crate) struct RunFiles<'a> {
    dir: &'a Path,
    buf_size: usize,
    io_clock: Option<&'a IoClock>,
    files: Vec<Option<RunFile>>,
}

impl<'a> RunFiles<'a> {
    /// # Arguments
    /// * `dir` - Directory the files are created in
    /// * `buf_size` - Read/write buffer size of every opened file, in values
    /// * `io_clock` - Clock measuring time spent in file I/O
    pub(crate) fn new(dir: &'a Path, buf_size: usize, io_clock: Option<&'a IoClock>) -> Self {
        RunFiles {
            dir,
            buf_size,
            io_clock,
            files: Vec::new(),
        }
    }

    /// Creates a new file and returns a writer to it.
    /// The file has to be sealed once the writer is flushed.
    pub(crate) fn create(&mut self) -> Result<(FileId, RunWriter), SortError> {
        let file = tempfile::Builder::new()
            .prefix("run-")
            .suffix(".bin")
            .tempfile_in(self.dir)
            .map_err(SortError::TempDir)?;
        log::debug!("run file created: {}", file.path().display());

        let writer = BinaryWriter::with_capacity(self.buf_size, self.timed(file.reopen()?));

        let id = FileId(self.files.len());
        self.files.push(Some(RunFile { file, live_runs: 0 }));

        return Ok((id, writer));
    }

    /// Records the number of runs stored in the file. A file without runs is deleted.
    pub(crate) fn seal(&mut self, id: FileId, runs: usize) {
        if let Some(run_file) = self.files.get_mut(id.0).and_then(Option::as_mut) {
            run_file.live_runs = runs;
        }
        if runs == 0 {
            self.remove(id);
        }
    }

    /// Opens a reader positioned at the first value of the run.
    pub(crate) fn open(&self, sealed: &SealedRun) -> Result<RunReader, SortError> {
        let run_file = match self.files.get(sealed.file.0).and_then(Option::as_ref) {
            Some(run_file) => run_file,
            None => {
                return Err(SortError::IO(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "run file already removed",
                )))
            }
        };

        let mut file = run_file.file.reopen()?;
        file.seek(SeekFrom::Start(sealed.run.offset * VALUE_SIZE as u64))?;

        let reader = BinaryReader::with_capacity(self.buf_size, self.timed(file));
        return Ok(BoundedReader::new(reader, sealed.run.length));
    }

    /// Marks one run of the file as consumed, deleting the file after its last run.
    pub(crate) fn release(&mut self, id: FileId) {
        let consumed = match self.files.get_mut(id.0).and_then(Option::as_mut) {
            Some(run_file) => {
                run_file.live_runs = run_file.live_runs.saturating_sub(1);
                run_file.live_runs == 0
            }
            None => false,
        };

        if consumed {
            self.remove(id);
        }
    }

    /// Number of files created so far.
    pub(crate) fn created(&self) -> usize {
        self.files.len()
    }

    /// Number of files not deleted yet.
    pub(crate) fn alive(&self) -> usize {
        self.files.iter().filter(|file| file.is_some()).count()
    }

    fn remove(&mut self, id: FileId) {
        if let Some(run_file) = self.files.get_mut(id.0).and_then(Option::take) {
            let path = run_file.file.path().to_path_buf();
            match run_file.file.close() {
                Ok(()) => log::debug!("run file removed: {}", path.display()),
                Err(err) => log::warn!("run file {} not removed: {}", path.display(), err),
            }
        }
    }

    fn timed(&self, file: fs::File) -> Timed<fs::File> {
        Timed::new(file, self.io_clock.cloned())
    }
}

impl Drop for RunFiles<'_> {
    fn drop(&mut self) {
        for idx in 0..self.files.len() {
            self.remove(FileId(idx));
        }
    }
}
