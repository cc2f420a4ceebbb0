// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Headerless Haar kernel coefficient files.
//!
//! A file holds `tex_w * tex_h` blocks, one per texel in row-major order.
//! Each block is `coef_w * coef_h` little-endian `f32` coefficients, also
//! row-major. Nothing else is stored: reader and writer agree on the
//! [`KernelDimensions`] out of band, and the file size is checked exactly
//! against them.

use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use translux_core::renderer::KernelDimensions;

const COEFFICIENT_BYTES: u64 = std::mem::size_of::<f32>() as u64;

/// Errors raised while reading or writing kernel files.
#[derive(Error, Debug)]
pub enum KernelFileError {
    #[error("I/O error on kernel file: {0}")]
    Io(#[from] io::Error),

    #[error("Kernel file truncated: expected {expected} coefficients, found {found}")]
    Truncated { expected: u64, found: u64 },

    #[error("Kernel file has {extra} bytes past the expected {expected} coefficients")]
    TrailingData { expected: u64, extra: u64 },

    #[error("Block holds {actual} coefficients, expected {expected}")]
    BlockSizeMismatch { expected: usize, actual: usize },

    #[error("All {expected} blocks are already written")]
    TooManyBlocks { expected: u64 },

    #[error("Kernel file incomplete: {written} of {expected} blocks written")]
    Incomplete { written: u64, expected: u64 },

    #[error("Cannot resume at row {row}: only {available} complete rows are on disk")]
    ResumeBeyondFile { row: u32, available: u32 },
}

/// Streams blocks to a kernel file, one texel at a time.
///
/// Blocks must be written in texel order. The writer flushes after every
/// completed texel row so that an interrupted bake can be resumed with
/// [`resume_at_row`](Self::resume_at_row).
#[derive(Debug)]
pub struct KernelFileWriter {
    path: PathBuf,
    dims: KernelDimensions,
    writer: BufWriter<File>,
    blocks_written: u64,
    scratch: Vec<u8>,
}

impl KernelFileWriter {
    /// Creates (or truncates) the file at `path`.
    pub fn create(path: impl AsRef<Path>, dims: KernelDimensions) -> Result<Self, KernelFileError> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)?;
        log::info!(
            "Writing kernel file {} ({} bytes expected)",
            path.display(),
            dims.file_size_bytes()
        );
        Ok(Self::from_parts(path, dims, file, 0))
    }

    /// Reopens a partially written file and positions it at the start of
    /// texel row `row`, dropping anything past that row.
    ///
    /// `row` may not exceed the number of complete rows already on disk.
    pub fn resume_at_row(
        path: impl AsRef<Path>,
        dims: KernelDimensions,
        row: u32,
    ) -> Result<Self, KernelFileError> {
        let path = path.as_ref().to_path_buf();
        let available = completed_rows(&path, dims)?;
        if row > available {
            return Err(KernelFileError::ResumeBeyondFile { row, available });
        }

        let mut file = OpenOptions::new().write(true).create(true).truncate(false).open(&path)?;
        let keep = row as u64 * row_bytes(dims);
        file.set_len(keep)?;
        file.seek(SeekFrom::End(0))?;

        log::info!(
            "Resuming kernel file {} at row {}/{}",
            path.display(),
            row,
            dims.tex_height()
        );
        let blocks = row as u64 * dims.tex_width() as u64;
        Ok(Self::from_parts(path, dims, file, blocks))
    }

    fn from_parts(path: PathBuf, dims: KernelDimensions, file: File, blocks_written: u64) -> Self {
        Self {
            path,
            dims,
            writer: BufWriter::new(file),
            blocks_written,
            scratch: Vec::with_capacity(dims.coefficients_per_texel() * COEFFICIENT_BYTES as usize),
        }
    }

    /// Appends the block of the next texel.
    pub fn write_block(&mut self, block: &[f32]) -> Result<(), KernelFileError> {
        let expected = self.dims.coefficients_per_texel();
        if block.len() != expected {
            return Err(KernelFileError::BlockSizeMismatch {
                expected,
                actual: block.len(),
            });
        }
        let total = self.dims.texel_count() as u64;
        if self.blocks_written >= total {
            return Err(KernelFileError::TooManyBlocks { expected: total });
        }

        self.scratch.clear();
        for value in block {
            self.scratch.extend_from_slice(&value.to_le_bytes());
        }
        self.writer.write_all(&self.scratch)?;
        self.blocks_written += 1;

        if self.blocks_written % self.dims.tex_width() as u64 == 0 {
            self.writer.flush()?;
        }
        Ok(())
    }

    /// Appends the blocks of one full texel row.
    pub fn write_row(&mut self, row: &[f32]) -> Result<(), KernelFileError> {
        let expected = self.dims.coefficients_per_row();
        if row.len() != expected {
            return Err(KernelFileError::BlockSizeMismatch {
                expected,
                actual: row.len(),
            });
        }
        for block in row.chunks_exact(self.dims.coefficients_per_texel()) {
            self.write_block(block)?;
        }
        Ok(())
    }

    /// Blocks written so far, including those kept by a resume.
    pub fn blocks_written(&self) -> u64 {
        self.blocks_written
    }

    /// Complete texel rows written so far.
    pub fn rows_written(&self) -> u32 {
        (self.blocks_written / self.dims.tex_width() as u64) as u32
    }

    /// Flushes and checks that every block was written.
    pub fn finish(mut self) -> Result<PathBuf, KernelFileError> {
        self.writer.flush()?;
        let expected = self.dims.texel_count() as u64;
        if self.blocks_written != expected {
            return Err(KernelFileError::Incomplete {
                written: self.blocks_written,
                expected,
            });
        }
        self.writer.get_ref().sync_all()?;
        log::info!("Kernel file {} complete", self.path.display());
        Ok(self.path)
    }
}

fn row_bytes(dims: KernelDimensions) -> u64 {
    dims.coefficients_per_row() as u64 * COEFFICIENT_BYTES
}

/// Streams a kernel file one texel row at a time.
///
/// Only one row is ever buffered, so a kernel larger than host memory can
/// still be uploaded row by row.
#[derive(Debug)]
pub struct KernelFileReader<R> {
    reader: R,
    dims: KernelDimensions,
    rows_read: u32,
}

impl KernelFileReader<BufReader<File>> {
    /// Opens the file at `path`, checking its size against `dims` before
    /// any coefficient is read.
    pub fn open(path: impl AsRef<Path>, dims: KernelDimensions) -> Result<Self, KernelFileError> {
        let file = File::open(path.as_ref())?;
        let len = file.metadata()?.len();
        let expected = dims.total_coefficients();
        let expected_bytes = dims.file_size_bytes();
        if len < expected_bytes {
            return Err(KernelFileError::Truncated {
                expected,
                found: len / COEFFICIENT_BYTES,
            });
        }
        if len > expected_bytes {
            return Err(KernelFileError::TrailingData {
                expected,
                extra: len - expected_bytes,
            });
        }
        Ok(Self::new(BufReader::new(file), dims))
    }
}

impl<R: Read> KernelFileReader<R> {
    pub fn new(reader: R, dims: KernelDimensions) -> Self {
        Self {
            reader,
            dims,
            rows_read: 0,
        }
    }

    pub fn dims(&self) -> KernelDimensions {
        self.dims
    }

    /// Texel rows read so far.
    pub fn rows_read(&self) -> u32 {
        self.rows_read
    }

    /// Fills `row` with the coefficients of the next texel row.
    ///
    /// `row` must hold exactly [`KernelDimensions::coefficients_per_row`]
    /// values. Reading past the last row is [`KernelFileError::TooManyBlocks`].
    pub fn read_row(&mut self, row: &mut [f32]) -> Result<(), KernelFileError> {
        let expected = self.dims.coefficients_per_row();
        if row.len() != expected {
            return Err(KernelFileError::BlockSizeMismatch {
                expected,
                actual: row.len(),
            });
        }
        if self.rows_read >= self.dims.tex_height() {
            return Err(KernelFileError::TooManyBlocks {
                expected: self.dims.texel_count() as u64,
            });
        }

        let filled = read_full(&mut self.reader, bytemuck::cast_slice_mut(row))?;
        if filled < row.len() * COEFFICIENT_BYTES as usize {
            let before = self.rows_read as u64 * row_bytes(self.dims);
            return Err(KernelFileError::Truncated {
                expected: self.dims.total_coefficients(),
                found: (before + filled as u64) / COEFFICIENT_BYTES,
            });
        }
        for value in row.iter_mut() {
            *value = f32::from_bits(u32::from_le(value.to_bits()));
        }
        self.rows_read += 1;
        Ok(())
    }

    /// Checks that every row was read and nothing follows the last one.
    pub fn finish(mut self) -> Result<(), KernelFileError> {
        let expected = self.dims.texel_count() as u64;
        let blocks = self.rows_read as u64 * self.dims.tex_width() as u64;
        if blocks != expected {
            return Err(KernelFileError::Incomplete {
                written: blocks,
                expected,
            });
        }
        let extra = io::copy(&mut self.reader, &mut io::sink())?;
        if extra > 0 {
            return Err(KernelFileError::TrailingData {
                expected: self.dims.total_coefficients(),
                extra,
            });
        }
        Ok(())
    }
}

/// Reads exactly one kernel's worth of coefficients from `reader`.
///
/// Fewer bytes than expected is [`KernelFileError::Truncated`]; any byte
/// past the end is [`KernelFileError::TrailingData`].
pub fn read_kernel_coefficients<R: Read>(
    reader: R,
    dims: KernelDimensions,
) -> Result<Vec<f32>, KernelFileError> {
    let mut coefficients = vec![0.0f32; dims.total_coefficients() as usize];
    let mut rows = KernelFileReader::new(reader, dims);
    for row in coefficients.chunks_exact_mut(dims.coefficients_per_row()) {
        rows.read_row(row)?;
    }
    rows.finish()?;
    Ok(coefficients)
}

/// Like `read_exact`, but reports how much was read before EOF.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Loads a whole kernel file.
pub fn load_kernel_file(
    path: impl AsRef<Path>,
    dims: KernelDimensions,
) -> Result<Vec<f32>, KernelFileError> {
    let path = path.as_ref();
    let mut rows = KernelFileReader::open(path, dims)?;
    let mut coefficients = vec![0.0f32; dims.total_coefficients() as usize];
    for row in coefficients.chunks_exact_mut(dims.coefficients_per_row()) {
        rows.read_row(row)?;
    }
    rows.finish()?;
    log::info!(
        "Loaded {} kernel coefficients from {}",
        coefficients.len(),
        path.display()
    );
    Ok(coefficients)
}

/// Writes a whole kernel in one go.
pub fn write_kernel_file(
    path: impl AsRef<Path>,
    dims: KernelDimensions,
    coefficients: &[f32],
) -> Result<(), KernelFileError> {
    let expected = dims.total_coefficients() as usize;
    if coefficients.len() != expected {
        return Err(KernelFileError::BlockSizeMismatch {
            expected,
            actual: coefficients.len(),
        });
    }
    let mut writer = KernelFileWriter::create(path, dims)?;
    for block in coefficients.chunks_exact(dims.coefficients_per_texel()) {
        writer.write_block(block)?;
    }
    writer.finish()?;
    Ok(())
}

/// Number of complete texel rows stored in a (possibly partial) file.
///
/// A missing file holds zero rows.
pub fn completed_rows(path: impl AsRef<Path>, dims: KernelDimensions) -> Result<u32, KernelFileError> {
    let len = match std::fs::metadata(path.as_ref()) {
        Ok(meta) => meta.len(),
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };
    let rows = (len / row_bytes(dims)).min(dims.tex_height() as u64);
    Ok(rows as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::tempdir;

    fn dims() -> KernelDimensions {
        KernelDimensions::new(4, 2, 2, 1).unwrap()
    }

    fn sample(dims: KernelDimensions) -> Vec<f32> {
        (0..dims.total_coefficients())
            .map(|i| i as f32 * 0.25 - 1.0)
            .collect()
    }

    #[test]
    fn test_file_roundtrip_is_identity() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("kernel.bin");
        let coefficients = sample(dims());
        write_kernel_file(&path, dims(), &coefficients).unwrap();

        assert_eq!(
            std::fs::metadata(&path).unwrap().len(),
            dims().file_size_bytes()
        );
        assert_eq!(load_kernel_file(&path, dims()).unwrap(), coefficients);
    }

    #[test]
    fn test_bytes_are_little_endian_and_row_major() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("kernel.bin");
        let coefficients = sample(dims());
        write_kernel_file(&path, dims(), &coefficients).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        // Texel (1, 1) is block 5; its second coefficient sits at 5 * 2 + 1.
        let offset = dims().coefficient_offset(dims().texel_index(1, 1), 0, 1);
        assert_eq!(offset, 11);
        assert_eq!(&bytes[offset * 4..offset * 4 + 4], &coefficients[11].to_le_bytes());
    }

    #[test]
    fn test_truncated_input_fails_explicitly() {
        let bytes: Vec<u8> = sample(dims())
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .take(10 * 4 + 2)
            .collect();
        match read_kernel_coefficients(Cursor::new(bytes), dims()) {
            Err(KernelFileError::Truncated { expected, found }) => {
                assert_eq!(expected, 16);
                assert_eq!(found, 10);
            }
            other => panic!("expected Truncated, got {other:?}"),
        }
    }

    #[test]
    fn test_trailing_bytes_are_rejected() {
        let mut bytes: Vec<u8> = sample(dims()).iter().flat_map(|v| v.to_le_bytes()).collect();
        bytes.extend_from_slice(&[0, 0, 0]);
        assert!(matches!(
            read_kernel_coefficients(Cursor::new(bytes), dims()),
            Err(KernelFileError::TrailingData { expected: 16, extra: 3 })
        ));
    }

    #[test]
    fn test_rows_stream_in_file_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("kernel.bin");
        let coefficients = sample(dims());
        write_kernel_file(&path, dims(), &coefficients).unwrap();

        let mut rows = KernelFileReader::open(&path, dims()).unwrap();
        let mut row = vec![0.0; dims().coefficients_per_row()];
        let mut streamed = Vec::new();
        while rows.rows_read() < dims().tex_height() {
            rows.read_row(&mut row).unwrap();
            streamed.extend_from_slice(&row);
        }
        assert!(matches!(
            rows.read_row(&mut row),
            Err(KernelFileError::TooManyBlocks { expected: 8 })
        ));
        rows.finish().unwrap();
        assert_eq!(streamed, coefficients);
    }

    #[test]
    fn test_open_checks_size_before_reading() {
        let dir = tempdir().unwrap();
        let short = dir.path().join("short.bin");
        std::fs::write(&short, [0u8; 4 * 10 + 2]).unwrap();
        assert!(matches!(
            KernelFileReader::open(&short, dims()),
            Err(KernelFileError::Truncated { expected: 16, found: 10 })
        ));

        let long = dir.path().join("long.bin");
        std::fs::write(&long, [0u8; 4 * 16 + 5]).unwrap();
        assert!(matches!(
            KernelFileReader::open(&long, dims()),
            Err(KernelFileError::TrailingData { expected: 16, extra: 5 })
        ));
    }

    #[test]
    fn test_stream_reports_progress_on_truncation() {
        let bytes: Vec<u8> = sample(dims())
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .take(4 * 11)
            .collect();
        let mut rows = KernelFileReader::new(Cursor::new(bytes), dims());
        let mut row = vec![0.0; dims().coefficients_per_row()];
        rows.read_row(&mut row).unwrap();
        assert!(matches!(
            rows.read_row(&mut row),
            Err(KernelFileError::Truncated { expected: 16, found: 11 })
        ));
        assert!(matches!(
            rows.read_row(&mut [0.0; 3]),
            Err(KernelFileError::BlockSizeMismatch { expected: 8, actual: 3 })
        ));
    }

    #[test]
    fn test_unfinished_stream_is_incomplete() {
        let bytes: Vec<u8> = sample(dims()).iter().flat_map(|v| v.to_le_bytes()).collect();
        let mut rows = KernelFileReader::new(Cursor::new(bytes), dims());
        rows.read_row(&mut [0.0; 8]).unwrap();
        assert!(matches!(
            rows.finish(),
            Err(KernelFileError::Incomplete { written: 4, expected: 8 })
        ));
    }

    #[test]
    fn test_missing_file_is_an_io_error() {
        let dir = tempdir().unwrap();
        let result = load_kernel_file(dir.path().join("absent.bin"), dims());
        assert!(matches!(result, Err(KernelFileError::Io(_))));
    }

    #[test]
    fn test_writer_validates_blocks() {
        let dir = tempdir().unwrap();
        let mut writer = KernelFileWriter::create(dir.path().join("k.bin"), dims()).unwrap();
        assert!(matches!(
            writer.write_block(&[1.0, 2.0, 3.0]),
            Err(KernelFileError::BlockSizeMismatch { expected: 2, actual: 3 })
        ));
        writer.write_row(&[0.0; 8]).unwrap();
        assert_eq!(writer.rows_written(), 1);
        assert!(matches!(
            writer.finish(),
            Err(KernelFileError::Incomplete { written: 4, expected: 8 })
        ));
    }

    #[test]
    fn test_resume_drops_partial_row() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("kernel.bin");
        let coefficients = sample(dims());
        let row_len = dims().coefficients_per_row();

        // One full row plus half of the next.
        let mut writer = KernelFileWriter::create(&path, dims()).unwrap();
        writer.write_row(&coefficients[..row_len]).unwrap();
        writer.write_block(&coefficients[row_len..row_len + 2]).unwrap();
        writer.write_block(&[9.0, 9.0]).unwrap();
        drop(writer);
        assert_eq!(completed_rows(&path, dims()).unwrap(), 1);

        assert!(matches!(
            KernelFileWriter::resume_at_row(&path, dims(), 2),
            Err(KernelFileError::ResumeBeyondFile { row: 2, available: 1 })
        ));

        let mut writer = KernelFileWriter::resume_at_row(&path, dims(), 1).unwrap();
        assert_eq!(writer.blocks_written(), 4);
        writer.write_row(&coefficients[row_len..]).unwrap();
        writer.finish().unwrap();

        assert_eq!(load_kernel_file(&path, dims()).unwrap(), coefficients);
        assert_eq!(completed_rows(&path, dims()).unwrap(), 2);
    }

    #[test]
    fn test_completed_rows_of_missing_file_is_zero() {
        let dir = tempdir().unwrap();
        assert_eq!(completed_rows(dir.path().join("none.bin"), dims()).unwrap(), 0);
    }
}
