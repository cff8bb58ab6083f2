//! `ext-sort-u64` is an external sort of unsigned 64-bit integers.
//!
//! External sorting is a class of sorting algorithms that can handle massive amounts of data. External sorting
//! is required when the data being sorted do not fit into the main memory (RAM) of a computer and instead must be
//! resided in slower external memory, usually a hard disk drive. During the first stage the input is split into
//! sorted runs stored in temporary files, then the runs are merged together in one or more passes.
//! For more information see [External Sorting](https://en.wikipedia.org/wiki/External_sorting).
//!
//! # Overview
//!
//! `ext-sort-u64` supports the following features:
//!
//! * **Bounded memory:**
//!   every budget is given in values (8 bytes each). The merge fan-in is derived from the memory limit
//!   unless it is set explicitly.
//! * **Two run generators:**
//!   sort-and-flush ([`Generator::InitialSort`]) and replacement selection
//!   ([`Generator::ReplacementSelection`]), the latter producing runs about twice as long as its heap
//!   using two heaps sharing one buffer.
//! * **Balanced merging:**
//!   the shortest runs are always merged first and the first pass is sized so that every later pass
//!   merges exactly `arity` runs.
//! * **Binary and text streams:**
//!   8-byte little-endian values or whitespace separated decimals.
//! * **Temporary files cleanup:**
//!   every temporary file is removed when the sort returns, successfully or not.
//!
//! # Example
//!
//! ```no_run
//! use std::fs;
//! use std::path;
//!
//! use log;
//!
//! use ext_sort_u64::{BinaryReader, BinaryWriter, ExternalSorterBuilder, Generator, Params};
//!
//! fn main() {
//!     let mut input_reader = BinaryReader::with_capacity(4096, fs::File::open("input.bin").unwrap());
//!     let mut output_writer = BinaryWriter::with_capacity(4096, fs::File::create("output.bin").unwrap());
//!
//!     // 64 MiB of values
//!     let params = Params::new(8 * 1024 * 1024, 4096, Generator::ReplacementSelection);
//!     let sorter = ExternalSorterBuilder::new(params)
//!         .with_tmp_dir(path::Path::new("./"))
//!         .build()
//!         .unwrap();
//!
//!     let stats = sorter.sort(&mut input_reader, &mut output_writer).unwrap();
//!     log::info!("sorted {} values in {} merge passes", stats.values, stats.merge_passes);
//! }
//! ```

pub mod buffer;
pub mod codec;
pub mod error;
pub mod heap;
pub mod initial;
pub mod merger;
pub mod params;
pub mod profile;
pub mod replacement;
pub mod run;
pub mod sort;
mod storage;

pub use codec::{
    copy_values, BinaryReader, BinaryWriter, BoundedReader, SliceReader, TextReader, TextWriter, ValueReader,
    ValueWriter, VALUE_SIZE,
};
pub use error::SortError;
pub use heap::DualHeap;
pub use initial::{generate_runs, InitialSort};
pub use merger::{merge, BinaryHeapMerger};
pub use params::{Generator, Params, DEFAULT_BUFFER_SIZE};
pub use profile::{IoClock, Timed};
pub use replacement::{replacement_selection, ReplacementSelection};
pub use run::{Run, RunRegistry, SealedRun};
pub use sort::{sort, ExternalSorter, ExternalSorterBuilder, SortStats};
