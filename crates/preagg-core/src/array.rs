//! Binary storage format for per-entity result arrays.
//!
//! Layout: an 8 byte magic, a `u32` precision tag, `u64` rows and `u64`
//! columns, followed by the values in column-major order, all little endian.
//! Column-major storage lets a worker write each iteration's column in place
//! while the array is staged.

use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};

use crate::errors::{io_error, ErrorInfo, PreaggError};

const MAGIC: &[u8; 8] = b"PREAGGA\0";
const HEADER_LEN: u64 = 8 + 4 + 8 + 8;

/// Extension of result array files.
pub const ARRAY_EXTENSION: &str = "bin";

/// Returns `<code>.bin`.
pub fn array_file_name(code: &str) -> String {
    format!("{code}.{ARRAY_EXTENSION}")
}

/// Numeric width of stored values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    /// 32-bit floats.
    #[default]
    F32,
    /// 64-bit floats.
    F64,
}

impl Precision {
    fn tag(self) -> u32 {
        match self {
            Precision::F32 => 1,
            Precision::F64 => 2,
        }
    }

    fn from_tag(tag: u32) -> Option<Self> {
        match tag {
            1 => Some(Precision::F32),
            2 => Some(Precision::F64),
            _ => None,
        }
    }

    /// Size of one value in bytes.
    pub fn width(self) -> u64 {
        match self {
            Precision::F32 => 4,
            Precision::F64 => 8,
        }
    }
}

/// Values of a [`ResultArray`], column-major.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayValues {
    /// Single precision storage.
    F32(Vec<f32>),
    /// Double precision storage.
    F64(Vec<f64>),
}

/// Dense `rows × cols` array of results.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultArray {
    rows: usize,
    cols: usize,
    values: ArrayValues,
}

/// Shape and precision read from an array file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrayHeader {
    /// Number of rows.
    pub rows: usize,
    /// Number of columns.
    pub cols: usize,
    /// Stored precision.
    pub precision: Precision,
}

impl ResultArray {
    /// Builds an array from column-major values.
    pub fn new(rows: usize, cols: usize, values: ArrayValues) -> Result<Self, PreaggError> {
        let len = match &values {
            ArrayValues::F32(v) => v.len(),
            ArrayValues::F64(v) => v.len(),
        };
        if len != rows * cols {
            return Err(shape_error(rows, cols, len));
        }
        Ok(Self { rows, cols, values })
    }

    /// Builds a double precision array from row-major nested vectors.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self, PreaggError> {
        let n_rows = rows.len();
        let n_cols = rows.first().map(Vec::len).unwrap_or(0);
        if rows.iter().any(|row| row.len() != n_cols) {
            return Err(PreaggError::Config(ErrorInfo::new(
                "array-ragged",
                "rows have different lengths",
            )));
        }
        let mut values = Vec::with_capacity(n_rows * n_cols);
        for col in 0..n_cols {
            values.extend(rows.iter().map(|row| row[col]));
        }
        Self::new(n_rows, n_cols, ArrayValues::F64(values))
    }

    /// Number of rows.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// `(rows, cols)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Stored precision.
    pub fn precision(&self) -> Precision {
        match self.values {
            ArrayValues::F32(_) => Precision::F32,
            ArrayValues::F64(_) => Precision::F64,
        }
    }

    /// Raw storage.
    pub fn values(&self) -> &ArrayValues {
        &self.values
    }

    /// Value at `(row, col)` widened to `f64`.
    pub fn get(&self, row: usize, col: usize) -> f64 {
        let idx = col * self.rows + row;
        match &self.values {
            ArrayValues::F32(v) => f64::from(v[idx]),
            ArrayValues::F64(v) => v[idx],
        }
    }

    /// One row widened to `f64`.
    pub fn row(&self, row: usize) -> Vec<f64> {
        (0..self.cols).map(|col| self.get(row, col)).collect()
    }

    /// Sum of every column.
    pub fn column_sums(&self) -> Vec<f64> {
        (0..self.cols)
            .map(|col| (0..self.rows).map(|row| self.get(row, col)).sum())
            .collect()
    }

    /// True when at least one column sums to exactly zero.
    pub fn has_zero_column(&self) -> bool {
        self.column_sums().iter().any(|sum| *sum == 0.0)
    }

    /// Writes the array to `path`, creating parent directories.
    pub fn write(&self, path: &Path) -> Result<(), PreaggError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| io_error("array-dir", parent, err))?;
        }
        let file = File::create(path).map_err(|err| io_error("array-create", path, err))?;
        let mut writer = BufWriter::new(file);
        write_header(&mut writer, self.rows, self.cols, self.precision())
            .map_err(|err| io_error("array-write", path, err))?;
        let result = match &self.values {
            ArrayValues::F32(values) => values
                .iter()
                .try_for_each(|v| writer.write_f32::<LittleEndian>(*v)),
            ArrayValues::F64(values) => values
                .iter()
                .try_for_each(|v| writer.write_f64::<LittleEndian>(*v)),
        };
        result.map_err(|err| io_error("array-write", path, err))?;
        writer.flush().map_err(|err| io_error("array-write", path, err))
    }

    /// Reads an array from `path`.
    pub fn read(path: &Path) -> Result<Self, PreaggError> {
        let file = File::open(path).map_err(|err| io_error("array-open", path, err))?;
        let mut reader = BufReader::new(file);
        let header = read_header(&mut reader, path)?;
        let file_len = reader
            .get_ref()
            .metadata()
            .map_err(|err| io_error("array-stat", path, err))?
            .len();
        let len = checked_value_count(&header, file_len, path)?;
        let values = match header.precision {
            Precision::F32 => {
                let mut values = vec![0f32; len];
                reader
                    .read_f32_into::<LittleEndian>(&mut values)
                    .map_err(|err| io_error("array-truncated", path, err))?;
                ArrayValues::F32(values)
            }
            Precision::F64 => {
                let mut values = vec![0f64; len];
                reader
                    .read_f64_into::<LittleEndian>(&mut values)
                    .map_err(|err| io_error("array-truncated", path, err))?;
                ArrayValues::F64(values)
            }
        };
        Self::new(header.rows, header.cols, values)
    }
}

/// Reads only the header of an array file.
pub fn read_array_header(path: &Path) -> Result<ArrayHeader, PreaggError> {
    let file = File::open(path).map_err(|err| io_error("array-open", path, err))?;
    read_header(&mut BufReader::new(file), path)
}

/// Streams an array file column by column and reports whether any column
/// sums to zero, without holding the whole array in memory.
pub fn file_has_zero_column(path: &Path) -> Result<bool, PreaggError> {
    let file = File::open(path).map_err(|err| io_error("array-open", path, err))?;
    let mut reader = BufReader::new(file);
    let header = read_header(&mut reader, path)?;
    for _ in 0..header.cols {
        let mut sum = 0.0f64;
        for _ in 0..header.rows {
            let value = match header.precision {
                Precision::F32 => reader.read_f32::<LittleEndian>().map(f64::from),
                Precision::F64 => reader.read_f64::<LittleEndian>(),
            }
            .map_err(|err| io_error("array-truncated", path, err))?;
            sum += value;
        }
        if sum == 0.0 {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Array file being filled column by column at a staging path.
///
/// The file is created at full size (zero filled) when staged; each
/// [`StagedArray::write_column`] writes straight through to disk so the
/// worker never holds more than one column. [`StagedArray::promote`]
/// verifies the shape and renames the file to its final location.
#[derive(Debug)]
pub struct StagedArray {
    file: File,
    path: PathBuf,
    rows: usize,
    cols: usize,
    precision: Precision,
}

impl StagedArray {
    /// Creates the staging file with a header and zeroed values.
    pub fn create(
        path: &Path,
        rows: usize,
        cols: usize,
        precision: Precision,
    ) -> Result<Self, PreaggError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| io_error("array-dir", parent, err))?;
        }
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|err| io_error("array-create", path, err))?;
        write_header(&mut file, rows, cols, precision)
            .map_err(|err| io_error("array-write", path, err))?;
        let total = HEADER_LEN + (rows * cols) as u64 * precision.width();
        file.set_len(total)
            .map_err(|err| io_error("array-allocate", path, err))?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
            rows,
            cols,
            precision,
        })
    }

    /// Staging path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes one column.
    pub fn write_column(&mut self, col: usize, values: &[f64]) -> Result<(), PreaggError> {
        if col >= self.cols || values.len() != self.rows {
            return Err(PreaggError::Config(
                ErrorInfo::new("array-column-shape", "column does not fit the staged array")
                    .with_context("column", col.to_string())
                    .with_context("len", values.len().to_string())
                    .with_context("rows", self.rows.to_string())
                    .with_context("cols", self.cols.to_string()),
            ));
        }
        let offset = HEADER_LEN + (col * self.rows) as u64 * self.precision.width();
        self.file
            .seek(SeekFrom::Start(offset))
            .map_err(|err| io_error("array-seek", &self.path, err))?;
        let mut writer = BufWriter::new(&mut self.file);
        let result = match self.precision {
            Precision::F32 => values
                .iter()
                .try_for_each(|v| writer.write_f32::<LittleEndian>(*v as f32)),
            Precision::F64 => values
                .iter()
                .try_for_each(|v| writer.write_f64::<LittleEndian>(*v)),
        };
        result.map_err(|err| io_error("array-write", &self.path, err))?;
        writer
            .flush()
            .map_err(|err| io_error("array-write", &self.path, err))
    }

    /// Fills one column with a constant.
    pub fn fill_column(&mut self, col: usize, value: f64) -> Result<(), PreaggError> {
        let values = vec![value; self.rows];
        self.write_column(col, &values)
    }

    /// Closes and removes the staging file.
    pub fn discard(self) -> Result<(), PreaggError> {
        let StagedArray { file, path, .. } = self;
        drop(file);
        fs::remove_file(&path).map_err(|err| io_error("array-discard", &path, err))
    }

    /// Verifies the staged shape against `(rows, cols)` and atomically moves
    /// the file to `final_path`.
    pub fn promote(self, final_path: &Path, expected: (usize, usize)) -> Result<(), PreaggError> {
        let StagedArray { file, path, .. } = self;
        file.sync_all()
            .map_err(|err| io_error("array-sync", &path, err))?;
        drop(file);
        let header = read_array_header(&path)?;
        let len = fs::metadata(&path)
            .map_err(|err| io_error("array-stat", &path, err))?
            .len();
        let expected_len =
            HEADER_LEN + (expected.0 * expected.1) as u64 * header.precision.width();
        if (header.rows, header.cols) != expected || len != expected_len {
            return Err(PreaggError::Config(
                ErrorInfo::new("array-shape-mismatch", "staged array has unexpected shape")
                    .with_path(&path)
                    .with_context("expected", format!("{}x{}", expected.0, expected.1))
                    .with_context("found", format!("{}x{}", header.rows, header.cols))
                    .with_context("bytes", len.to_string()),
            ));
        }
        if let Some(parent) = final_path.parent() {
            fs::create_dir_all(parent).map_err(|err| io_error("array-dir", parent, err))?;
        }
        fs::rename(&path, final_path).map_err(|err| io_error("array-promote", final_path, err))
    }
}

fn write_header<W: Write>(
    writer: &mut W,
    rows: usize,
    cols: usize,
    precision: Precision,
) -> std::io::Result<()> {
    writer.write_all(MAGIC)?;
    writer.write_u32::<LittleEndian>(precision.tag())?;
    writer.write_u64::<LittleEndian>(rows as u64)?;
    writer.write_u64::<LittleEndian>(cols as u64)
}

fn read_header<R: Read>(reader: &mut R, path: &Path) -> Result<ArrayHeader, PreaggError> {
    let mut magic = [0u8; 8];
    reader
        .read_exact(&mut magic)
        .map_err(|err| io_error("array-header", path, err))?;
    if &magic != MAGIC {
        return Err(PreaggError::Serde(
            ErrorInfo::new("array-magic", "not a result array file").with_path(path),
        ));
    }
    let tag = reader
        .read_u32::<LittleEndian>()
        .map_err(|err| io_error("array-header", path, err))?;
    let precision = Precision::from_tag(tag).ok_or_else(|| {
        PreaggError::Serde(
            ErrorInfo::new("array-precision", "unknown precision tag")
                .with_path(path)
                .with_context("tag", tag.to_string()),
        )
    })?;
    let rows = reader
        .read_u64::<LittleEndian>()
        .map_err(|err| io_error("array-header", path, err))? as usize;
    let cols = reader
        .read_u64::<LittleEndian>()
        .map_err(|err| io_error("array-header", path, err))? as usize;
    Ok(ArrayHeader {
        rows,
        cols,
        precision,
    })
}

/// Number of values declared by `header`, checked against the bytes that
/// follow the header so a corrupt shape is rejected before allocating.
fn checked_value_count(
    header: &ArrayHeader,
    file_len: u64,
    path: &Path,
) -> Result<usize, PreaggError> {
    let body = file_len.saturating_sub(HEADER_LEN);
    let len = header.rows.checked_mul(header.cols);
    let bytes = len.and_then(|len| (len as u64).checked_mul(header.precision.width()));
    match (len, bytes) {
        (Some(len), Some(bytes)) if bytes == body => Ok(len),
        _ => Err(PreaggError::Serde(
            ErrorInfo::new("array-corrupt", "header shape does not match file size")
                .with_path(path)
                .with_context("rows", header.rows.to_string())
                .with_context("cols", header.cols.to_string())
                .with_context("bytes", body.to_string()),
        )),
    }
}

fn shape_error(rows: usize, cols: usize, len: usize) -> PreaggError {
    PreaggError::Config(
        ErrorInfo::new("array-shape", "value count does not match shape")
            .with_context("rows", rows.to_string())
            .with_context("cols", cols.to_string())
            .with_context("len", len.to_string()),
    )
}
