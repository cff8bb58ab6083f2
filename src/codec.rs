//! Value streams.
//!
//! Values are read and written one at a time through [`ValueReader`] and [`ValueWriter`].
//! The binary format is a plain sequence of 8-byte little-endian integers without any header,
//! the text format is whitespace separated decimal integers.

use std::io;
use std::io::prelude::*;

use crate::error::SortError;

/// Size of a single value in bytes.
pub const VALUE_SIZE: usize = 8;

/// Value stream reader.
pub trait ValueReader {
    /// Reads the next value. Returns [`None`] at the end of the stream.
    fn read(&mut self) -> Result<Option<u64>, SortError>;
}

/// Value stream writer.
pub trait ValueWriter {
    /// Writes a value.
    fn write(&mut self, value: u64) -> Result<(), SortError>;

    /// Pushes buffered values to the underlying storage.
    /// Must be called before the storage is handed to another stage.
    fn flush(&mut self) -> Result<(), SortError>;
}

impl<R: ValueReader + ?Sized> ValueReader for &mut R {
    fn read(&mut self) -> Result<Option<u64>, SortError> {
        (**self).read()
    }
}

impl<R: ValueReader + ?Sized> ValueReader for Box<R> {
    fn read(&mut self) -> Result<Option<u64>, SortError> {
        (**self).read()
    }
}

impl<W: ValueWriter + ?Sized> ValueWriter for &mut W {
    fn write(&mut self, value: u64) -> Result<(), SortError> {
        (**self).write(value)
    }

    fn flush(&mut self) -> Result<(), SortError> {
        (**self).flush()
    }
}

impl<W: ValueWriter + ?Sized> ValueWriter for Box<W> {
    fn write(&mut self, value: u64) -> Result<(), SortError> {
        (**self).write(value)
    }

    fn flush(&mut self) -> Result<(), SortError> {
        (**self).flush()
    }
}

/// Binary format reader.
pub struct BinaryReader<R: Read> {
    reader: io::BufReader<R>,
}

impl<R: Read> BinaryReader<R> {
    /// Creates a reader buffering `buf_values` values.
    pub fn with_capacity(buf_values: usize, inner: R) -> Self {
        BinaryReader {
            reader: io::BufReader::with_capacity(buf_values.max(1) * VALUE_SIZE, inner),
        }
    }
}

impl<R: Read> ValueReader for BinaryReader<R> {
    fn read(&mut self) -> Result<Option<u64>, SortError> {
        let mut bytes = [0u8; VALUE_SIZE];
        let mut filled = 0;

        while filled < VALUE_SIZE {
            match self.reader.read(&mut bytes[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(SortError::IO(err)),
            }
        }

        match filled {
            0 => Ok(None),
            VALUE_SIZE => Ok(Some(u64::from_le_bytes(bytes))),
            count => Err(SortError::TrailingBytes { count }),
        }
    }
}

/// Binary format writer.
pub struct BinaryWriter<W: Write> {
    writer: io::BufWriter<W>,
}

impl<W: Write> BinaryWriter<W> {
    /// Creates a writer buffering `buf_values` values.
    pub fn with_capacity(buf_values: usize, inner: W) -> Self {
        BinaryWriter {
            writer: io::BufWriter::with_capacity(buf_values.max(1) * VALUE_SIZE, inner),
        }
    }

    /// Flushes buffered values and returns the underlying stream.
    pub fn into_inner(self) -> Result<W, SortError> {
        self.writer.into_inner().map_err(|err| SortError::IO(err.into_error()))
    }
}

impl<W: Write> ValueWriter for BinaryWriter<W> {
    fn write(&mut self, value: u64) -> Result<(), SortError> {
        self.writer.write_all(&value.to_le_bytes())?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SortError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Text format reader.
pub struct TextReader<R: BufRead> {
    reader: R,
    token: Vec<u8>,
}

impl<R: BufRead> TextReader<R> {
    pub fn new(reader: R) -> Self {
        TextReader {
            reader,
            token: Vec::with_capacity(20),
        }
    }
}

impl<R: BufRead> ValueReader for TextReader<R> {
    fn read(&mut self) -> Result<Option<u64>, SortError> {
        self.token.clear();

        loop {
            let buf = match self.reader.fill_buf() {
                Ok(buf) => buf,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(SortError::IO(err)),
            };
            if buf.is_empty() {
                break;
            }

            let mut consumed = 0;
            let mut complete = false;
            for &byte in buf {
                consumed += 1;
                if !byte.is_ascii_whitespace() {
                    self.token.push(byte);
                } else if !self.token.is_empty() {
                    complete = true;
                    break;
                }
            }
            self.reader.consume(consumed);

            if complete {
                break;
            }
        }

        if self.token.is_empty() {
            return Ok(None);
        }

        let token = String::from_utf8_lossy(&self.token);
        match token.parse::<u64>() {
            Ok(value) => Ok(Some(value)),
            Err(_) => Err(SortError::InvalidText {
                token: token.into_owned(),
            }),
        }
    }
}

/// Text format writer. Writes one value per line.
pub struct TextWriter<W: Write> {
    writer: io::BufWriter<W>,
}

impl<W: Write> TextWriter<W> {
    /// Creates a writer with a buffer of `buf_values` values worth of bytes.
    pub fn with_capacity(buf_values: usize, inner: W) -> Self {
        TextWriter {
            writer: io::BufWriter::with_capacity(buf_values.max(1) * VALUE_SIZE, inner),
        }
    }
}

impl<W: Write> ValueWriter for TextWriter<W> {
    fn write(&mut self, value: u64) -> Result<(), SortError> {
        writeln!(self.writer, "{}", value)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SortError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Reader yielding at most `length` values of the inner reader.
pub struct BoundedReader<R> {
    inner: R,
    remaining: u64,
}

impl<R: ValueReader> BoundedReader<R> {
    pub fn new(inner: R, length: u64) -> Self {
        BoundedReader {
            inner,
            remaining: length,
        }
    }
}

impl<R: ValueReader> ValueReader for BoundedReader<R> {
    fn read(&mut self) -> Result<Option<u64>, SortError> {
        if self.remaining == 0 {
            return Ok(None);
        }
        self.remaining -= 1;
        self.inner.read()
    }
}

/// In-memory reader over a slice.
pub struct SliceReader<'a> {
    values: std::slice::Iter<'a, u64>,
}

impl<'a> SliceReader<'a> {
    pub fn new(values: &'a [u64]) -> Self {
        SliceReader { values: values.iter() }
    }
}

impl ValueReader for SliceReader<'_> {
    fn read(&mut self) -> Result<Option<u64>, SortError> {
        Ok(self.values.next().copied())
    }
}

impl ValueWriter for Vec<u64> {
    fn write(&mut self, value: u64) -> Result<(), SortError> {
        self.push(value);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SortError> {
        Ok(())
    }
}

/// Copies every value from the reader to the writer and flushes the writer.
/// Returns the number of copied values.
pub fn copy_values<R, W>(reader: &mut R, writer: &mut W) -> Result<u64, SortError>
where
    R: ValueReader + ?Sized,
    W: ValueWriter + ?Sized,
{
    let mut copied = 0;
    while let Some(value) = reader.read()? {
        writer.write(value)?;
        copied += 1;
    }
    writer.flush()?;

    return Ok(copied);
}
