use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::{Path, PathBuf};

use crate::external_sort::error::{IoResultExt, Result, SortError};
use crate::external_sort::record::{decode_record, Record, RECORD_WIDTH};

/// Forward-only reader that decodes one record at a time.
///
/// The cursor holds a single record-width buffer no matter how large the
/// underlying chunk is, which is what keeps merge memory proportional to the
/// fan-in rather than the chunk size.
pub struct RecordCursor<R> {
    reader: R,
    buffer: [u8; RECORD_WIDTH],
    current: Option<Record>,
    exhausted: bool,
    source: PathBuf,
}

impl RecordCursor<BufReader<File>> {
    /// Opens a chunk file behind a buffered reader of `buffer_size` bytes.
    pub fn open(path: &Path, buffer_size: usize) -> Result<Self> {
        let file = File::open(path).with_path("open chunk", path)?;
        Ok(Self::new(BufReader::with_capacity(buffer_size, file), path))
    }
}

impl<R: Read> RecordCursor<R> {
    pub fn new(reader: R, source: &Path) -> Self {
        Self {
            reader,
            buffer: [0u8; RECORD_WIDTH],
            current: None,
            exhausted: false,
            source: source.to_path_buf(),
        }
    }

    /// Moves to the next record. Returns `false` once fewer than a full
    /// record's bytes remain; a partial trailing record is never exposed.
    pub fn advance(&mut self) -> Result<bool> {
        if self.exhausted {
            return Ok(false);
        }

        let mut filled = 0;
        while filled < RECORD_WIDTH {
            match self.reader.read(&mut self.buffer[filled..]) {
                Ok(0) => {
                    self.exhausted = true;
                    self.current = None;
                    return Ok(false);
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.exhausted = true;
                    self.current = None;
                    return Err(SortError::Io {
                        operation: "read chunk",
                        path: self.source.clone(),
                        source: e,
                    });
                }
            }
        }

        self.current = Some(decode_record(self.buffer));
        Ok(true)
    }

    /// The record decoded by the last successful `advance`.
    pub fn current(&self) -> Option<Record> {
        self.current
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }
}
