use std::fs::{self, File};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::external_sort::error::{IoResultExt, Result, SortError};
use crate::external_sort::record::{decode_record, records_in, RECORD_WIDTH};
use crate::external_sort::{chunk_file_name, ChunkId};

/// What a finished sort or merge task hands to its consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkReport {
    pub chunk_id: ChunkId,
    pub record_count: u64,
}

/// Streams an input file into consecutive chunk files.
pub struct ChunkSplitter {
    chunk_size: usize,
    work_directory: PathBuf,
}

impl ChunkSplitter {
    pub fn new(chunk_size: usize, work_directory: PathBuf) -> Self {
        Self {
            chunk_size,
            work_directory,
        }
    }

    /// Writes `chunk0.bin`, `chunk1.bin`, ... and returns how many were written.
    /// An empty input produces no chunks.
    pub fn split(&self, input: &Path) -> Result<usize> {
        let mut file = File::open(input).with_path("open input", input)?;
        let mut buffer = vec![0u8; self.chunk_size];
        let mut chunk_count = 0;

        loop {
            let read = fill_buffer(&mut file, &mut buffer).with_path("read input", input)?;
            if read == 0 {
                break;
            }

            let chunk_path = self.work_directory.join(chunk_file_name(chunk_count));
            let mut chunk = File::create(&chunk_path).with_path("create chunk", &chunk_path)?;
            chunk
                .write_all(&buffer[..read])
                .with_path("write chunk", &chunk_path)?;
            debug!("Wrote chunk #{} ({} bytes)", chunk_count, read);
            chunk_count += 1;

            if read < buffer.len() {
                break;
            }
        }

        Ok(chunk_count)
    }
}

/// Reads until `buffer` is full or the stream ends; returns bytes read.
fn fill_buffer<R: Read>(reader: &mut R, buffer: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        match reader.read(&mut buffer[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Sorts one chunk file in memory and writes it back in place.
///
/// The chunk is held as encoded records and read and written in one call
/// each, so a sort task needs no memory beyond the chunk itself.
pub struct ChunkSorter {
    chunk_size: usize,
}

impl ChunkSorter {
    pub fn new(chunk_size: usize) -> Self {
        Self { chunk_size }
    }

    pub fn sort_chunk(&self, chunk_id: ChunkId, path: &Path) -> Result<ChunkReport> {
        let mut records = self.read_records(path)?;
        records.sort_unstable_by_key(|bytes| decode_record(*bytes));

        fs::write(path, records.as_flattened()).with_path("rewrite chunk", path)?;

        Ok(ChunkReport {
            chunk_id,
            record_count: records.len() as u64,
        })
    }

    fn read_records(&self, path: &Path) -> Result<Vec<[u8; RECORD_WIDTH]>> {
        let mut file = File::open(path).with_path("open chunk", path)?;
        let byte_len = file.metadata().with_path("inspect chunk", path)?.len();
        if byte_len > self.chunk_size as u64 {
            return Err(SortError::ChunkOverflow {
                path: path.to_path_buf(),
                capacity: self.chunk_size,
            });
        }

        // a trailing partial record is left unread
        let mut records = vec![[0u8; RECORD_WIDTH]; records_in(byte_len) as usize];
        file.read_exact(records.as_flattened_mut())
            .with_path("read chunk", path)?;
        Ok(records)
    }
}

/// Deletes consumed chunk files. Only called after the consuming merge succeeded.
pub fn remove_chunks(paths: &[PathBuf]) -> Result<()> {
    for path in paths {
        fs::remove_file(path).with_path("remove chunk", path)?;
    }
    Ok(())
}
