use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::external_sort::cursor::RecordCursor;
use crate::external_sort::error::{IoResultExt, Result};
use crate::external_sort::record::{encode_record, records_in, Record};

/// K-way merge of sorted chunk files through a min-heap of record cursors.
pub struct ChunkMerger {
    io_buffer_size: usize,
}

/// Heap entry: the cursor's current value plus which cursor produced it.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct MergeEntry {
    value: Record,
    source: usize,
}

impl ChunkMerger {
    pub fn new(io_buffer_size: usize) -> Self {
        Self { io_buffer_size }
    }

    /// Merges sorted `inputs` into `output` and returns the number of records
    /// written. A single input is moved into place instead of copied.
    ///
    /// Inputs are left on disk; deleting them is up to the caller once the
    /// merge has succeeded.
    pub fn merge(&self, inputs: &[PathBuf], output: &Path) -> Result<u64> {
        match inputs {
            [] => {
                File::create(output).with_path("create merge output", output)?;
                Ok(0)
            }
            [single] => {
                let len = fs::metadata(single).with_path("inspect chunk", single)?.len();
                fs::rename(single, output).with_path("rename chunk", single)?;
                debug!("Passed {} through to {}", single.display(), output.display());
                Ok(records_in(len))
            }
            _ => self.merge_many(inputs, output),
        }
    }

    fn merge_many(&self, inputs: &[PathBuf], output: &Path) -> Result<u64> {
        let mut cursors = Vec::with_capacity(inputs.len());
        for path in inputs {
            cursors.push(RecordCursor::open(path, self.io_buffer_size)?);
        }

        let mut merge_heap = BinaryHeap::with_capacity(cursors.len());
        for (source, cursor) in cursors.iter_mut().enumerate() {
            if cursor.advance()? {
                if let Some(value) = cursor.current() {
                    merge_heap.push(Reverse(MergeEntry { value, source }));
                }
            }
        }

        let file = File::create(output).with_path("create merge output", output)?;
        let mut writer = BufWriter::with_capacity(self.io_buffer_size, file);
        let mut records_written = 0u64;

        while let Some(Reverse(entry)) = merge_heap.pop() {
            writer
                .write_all(&encode_record(entry.value))
                .with_path("write merge output", output)?;
            records_written += 1;

            let cursor = &mut cursors[entry.source];
            if cursor.advance()? {
                if let Some(value) = cursor.current() {
                    merge_heap.push(Reverse(MergeEntry {
                        value,
                        source: entry.source,
                    }));
                }
            }
        }

        writer.flush().with_path("flush merge output", output)?;
        Ok(records_written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external_sort::record::{decode_records, write_records};
    use tempfile::tempdir;

    fn write_values(path: &Path, values: &[Record]) {
        let mut bytes = Vec::new();
        write_records(&mut bytes, values).unwrap();
        fs::write(path, bytes).unwrap();
    }

    fn read_values(path: &Path) -> Vec<Record> {
        decode_records(&fs::read(path).unwrap())
    }

    #[test]
    fn test_merge_two_sorted_inputs() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.bin");
        let b = dir.path().join("b.bin");
        let out = dir.path().join("out.bin");
        write_values(&a, &[1, 4, 9]);
        write_values(&b, &[-2, 4, 5, 10]);

        let written = ChunkMerger::new(16).merge(&[a.clone(), b.clone()], &out).unwrap();
        assert_eq!(written, 7);
        assert_eq!(read_values(&out), vec![-2, 1, 4, 4, 5, 9, 10]);
        // inputs remain until the caller removes them
        assert!(a.exists() && b.exists());
    }

    #[test]
    fn test_merge_k_inputs_up_to_fan_in() {
        let dir = tempdir().unwrap();
        for k in 1..=5usize {
            let inputs: Vec<PathBuf> = (0..k)
                .map(|i| {
                    let path = dir.path().join(format!("k{}_{}.bin", k, i));
                    let values: Vec<Record> = (0..6).map(|n| (n * k as i32) - i as i32).collect();
                    let mut sorted = values.clone();
                    sorted.sort();
                    write_values(&path, &sorted);
                    path
                })
                .collect();
            let out = dir.path().join(format!("out{}.bin", k));

            let written = ChunkMerger::new(8).merge(&inputs, &out).unwrap();
            let merged = read_values(&out);
            assert_eq!(written, 6 * k as u64);
            assert_eq!(merged.len(), 6 * k);
            assert!(merged.windows(2).all(|w| w[0] <= w[1]), "k = {}", k);
        }
    }

    #[test]
    fn test_merge_skips_empty_inputs() {
        let dir = tempdir().unwrap();
        let empty = dir.path().join("empty.bin");
        let full = dir.path().join("full.bin");
        let out = dir.path().join("out.bin");
        fs::write(&empty, b"").unwrap();
        write_values(&full, &[3, 3, 8]);

        let written = ChunkMerger::new(64).merge(&[empty, full], &out).unwrap();
        assert_eq!(written, 3);
        assert_eq!(read_values(&out), vec![3, 3, 8]);
    }

    #[test]
    fn test_single_input_is_renamed() {
        let dir = tempdir().unwrap();
        let only = dir.path().join("only.bin");
        let out = dir.path().join("out.bin");
        write_values(&only, &[1, 2]);

        assert_eq!(ChunkMerger::new(64).merge(&[only.clone()], &out).unwrap(), 2);
        assert!(!only.exists());
        assert_eq!(read_values(&out), vec![1, 2]);
    }

    #[test]
    fn test_merge_missing_input_fails() {
        let dir = tempdir().unwrap();
        let present = dir.path().join("present.bin");
        write_values(&present, &[1]);
        let out = dir.path().join("out.bin");

        let err = ChunkMerger::new(64)
            .merge(&[present, dir.path().join("absent.bin")], &out)
            .unwrap_err();
        assert!(err.to_string().starts_with("cannot open chunk"));
    }
}
