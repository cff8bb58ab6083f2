use std::fs;
use std::io;
use std::path;
use std::process;
use std::time::Instant;

use bytesize::ByteSize;
use clap::ArgEnum;
use env_logger;
use log;

use ext_sort_u64::{
    copy_values, BinaryReader, BinaryWriter, ExternalSorterBuilder, Generator, IoClock, Params, TextReader,
    TextWriter, Timed, ValueReader, ValueWriter, VALUE_SIZE,
};

fn main() {
    let arg_parser = build_arg_parser();

    let log_level: LogLevel = arg_parser.value_of_t_or_exit("log_level");
    init_logger(log_level);

    let memory_limit = byte_size_arg(&arg_parser, "memory_limit") / VALUE_SIZE as u64;
    if memory_limit < 1 {
        log::error!("too small memory limit");
        process::exit(2);
    }
    let buffer_size = byte_size_arg(&arg_parser, "buffer_size") / VALUE_SIZE as u64;
    if buffer_size < 1 {
        log::error!("too small buffer size");
        process::exit(2);
    }
    let (memory_limit, buffer_size) = (memory_limit as usize, buffer_size as usize);

    let text_input = arg_parser.is_present("text") || arg_parser.is_present("text_input");
    let text_output = arg_parser.is_present("text") || arg_parser.is_present("text_output");
    let generator = if arg_parser.is_present("replacement_selection") {
        Generator::ReplacementSelection
    } else {
        Generator::InitialSort
    };
    let arity: Option<usize> = arg_parser
        .is_present("arity")
        .then(|| arg_parser.value_of_t_or_exit("arity"));
    let threads: Option<usize> = arg_parser
        .is_present("threads")
        .then(|| arg_parser.value_of_t_or_exit("threads"));
    let tmp_dir: Option<&str> = arg_parser.value_of("tmp_dir");

    let io_clock = (!arg_parser.is_present("no_prof")).then(IoClock::new);

    let input_stream: Box<dyn io::Read> = match arg_parser.value_of("input") {
        Some(input) => match fs::File::open(input) {
            Ok(file) => Box::new(file),
            Err(err) => {
                log::error!("input file opening error: {}", err);
                process::exit(1);
            }
        },
        None => Box::new(io::stdin()),
    };
    let input_stream = Timed::new(input_stream, io_clock.clone());

    let output_stream: Box<dyn io::Write> = match arg_parser.value_of("output") {
        Some(output) => match fs::File::create(output) {
            Ok(file) => Box::new(file),
            Err(err) => {
                log::error!("output file creation error: {}", err);
                process::exit(1);
            }
        },
        None => Box::new(io::stdout()),
    };
    let output_stream = Timed::new(output_stream, io_clock.clone());

    let mut input: Box<dyn ValueReader> = if text_input {
        Box::new(TextReader::new(io::BufReader::with_capacity(
            buffer_size * VALUE_SIZE,
            input_stream,
        )))
    } else {
        Box::new(BinaryReader::with_capacity(buffer_size, input_stream))
    };
    let mut output: Box<dyn ValueWriter> = if text_output {
        Box::new(TextWriter::with_capacity(buffer_size, output_stream))
    } else {
        Box::new(BinaryWriter::with_capacity(buffer_size, output_stream))
    };

    let started = Instant::now();

    if arg_parser.is_present("no_sort") {
        if let Err(err) = copy_values(&mut input, &mut output) {
            log::error!("data copying error: {}", err);
            process::exit(1);
        }
    } else {
        // three buffers are taken by the input and output streams
        let mut params = Params::new(
            memory_limit.saturating_sub(3 * buffer_size),
            buffer_size,
            generator,
        );
        params.arity = arity;

        let mut sorter_builder = ExternalSorterBuilder::new(params);
        if let Some(threads) = threads {
            sorter_builder = sorter_builder.with_threads_number(threads);
        }

        if let Some(tmp_dir) = tmp_dir {
            sorter_builder = sorter_builder.with_tmp_dir(path::Path::new(tmp_dir));
        }

        if let Some(io_clock) = &io_clock {
            sorter_builder = sorter_builder.with_io_clock(io_clock.clone());
        }

        let sorter = match sorter_builder.build() {
            Ok(sorter) => sorter,
            Err(err) => {
                log::error!("sorter initialization error: {}", err);
                process::exit(1);
            }
        };

        match sorter.sort(&mut input, &mut output) {
            Ok(stats) => log::info!(
                "sorted {} values (runs: {}, arity: {}, merge passes: {})",
                stats.values,
                stats.runs,
                stats.arity,
                stats.merge_passes
            ),
            Err(err) => {
                log::error!("data sorting error: {}", err);
                process::exit(1);
            }
        }
    }

    if let Some(io_clock) = io_clock {
        let total = started.elapsed();
        let io_time = io_clock.elapsed();
        log::info!("io time: {:.2} seconds", io_time.as_secs_f64());
        log::info!("total time: {:.2} seconds", total.as_secs_f64());
        log::info!(
            "io time ratio: {:.2}",
            io_time.as_secs_f64() / total.as_secs_f64().max(f64::EPSILON)
        );
    }
}

fn byte_size_arg(arg_parser: &clap::ArgMatches, name: &str) -> u64 {
    arg_parser
        .value_of(name)
        .expect("value has a default")
        .parse::<ByteSize>()
        .expect("value is pre-validated")
        .as_u64()
}

#[derive(Copy, Clone, clap::ArgEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn possible_values() -> impl Iterator<Item = clap::PossibleValue<'static>> {
        Self::value_variants().iter().filter_map(|v| v.to_possible_value())
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <LogLevel as clap::ArgEnum>::from_str(s, false)
    }
}

fn validate_byte_size(value: &str) -> Result<(), String> {
    match value.parse::<ByteSize>() {
        Ok(_) => Ok(()),
        Err(err) => Err(format!("size format incorrect: {}", err)),
    }
}

fn build_arg_parser() -> clap::ArgMatches {
    clap::App::new("ext-sort-u64")
        .about("external sorter of unsigned 64-bit integers")
        .arg(
            clap::Arg::new("input")
                .short('i')
                .long("input")
                .help("file to be sorted (standard input by default)")
                .takes_value(true),
        )
        .arg(
            clap::Arg::new("output")
                .short('o')
                .long("output")
                .help("result file (standard output by default)")
                .takes_value(true),
        )
        .arg(
            clap::Arg::new("memory_limit")
                .short('m')
                .long("memory-limit")
                .help("memory limit")
                .takes_value(true)
                .default_value("1GiB")
                .validator(validate_byte_size),
        )
        .arg(
            clap::Arg::new("buffer_size")
                .short('b')
                .long("buffer-size")
                .help("read/write buffer size of every stream")
                .takes_value(true)
                .default_value("32KiB")
                .validator(validate_byte_size),
        )
        .arg(
            clap::Arg::new("text")
                .long("text")
                .help("use text format for input and output"),
        )
        .arg(
            clap::Arg::new("text_input")
                .long("text-input")
                .help("use text input format"),
        )
        .arg(
            clap::Arg::new("text_output")
                .long("text-output")
                .help("use text output format"),
        )
        .arg(
            clap::Arg::new("replacement_selection")
                .short('r')
                .long("replacement-selection")
                .help("generate runs using replacement selection"),
        )
        .arg(
            clap::Arg::new("arity")
                .short('a')
                .long("arity")
                .help("number of runs merged at once (computed from the memory limit by default)")
                .takes_value(true),
        )
        .arg(
            clap::Arg::new("log_level")
                .short('l')
                .long("loglevel")
                .help("logging level")
                .takes_value(true)
                .default_value("info")
                .possible_values(LogLevel::possible_values()),
        )
        .arg(
            clap::Arg::new("threads")
                .short('t')
                .long("threads")
                .help("number of threads to use for in-memory run sorting")
                .takes_value(true),
        )
        .arg(
            clap::Arg::new("tmp_dir")
                .short('d')
                .long("tmp-dir")
                .help("directory to be used to store temporary data")
                .takes_value(true),
        )
        .arg(
            clap::Arg::new("no_sort")
                .long("no-sort")
                .help("copy the input to the output without sorting, can be used to convert formats"),
        )
        .arg(
            clap::Arg::new("no_prof")
                .long("no-prof")
                .help("disable io time profiling"),
        )
        .get_matches()
}

fn init_logger(log_level: LogLevel) {
    env_logger::Builder::new()
        .filter_level(match log_level {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        })
        .format_timestamp_millis()
        .init();
}
