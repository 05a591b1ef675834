use std::fmt::{Debug, Formatter};

use duckdb::ffi::{self, duckdb_data_chunk};
use itertools::Itertools;
use log::trace;
use quack_dtype::LogicalType;
use quack_error::{QuackResult, quack_bail, quack_err};
use quack_scalar::Value;

use crate::native::{from_idx, to_idx};
use crate::types::LogicalTypeHandle;
use crate::vector::Vector;

/// Number of rows every data chunk can hold.
pub fn vector_size() -> usize {
    from_idx(unsafe { ffi::duckdb_vector_size() })
}

/// A fixed-capacity batch of equally long columns.
///
/// Chunks built on the host are writable. Chunks handed out by a query result are read-only: their
/// row count cannot change and their columns cannot be written.
pub struct DataChunk {
    ptr: duckdb_data_chunk,
    types: Vec<LogicalType>,
    capacity: usize,
    writable: bool,
}

// The chunk owns its native memory and nothing else refers to it.
unsafe impl Send for DataChunk {}

impl DataChunk {
    /// Create an empty, writable chunk with one column per type.
    pub fn try_new(types: &[LogicalType]) -> QuackResult<Self> {
        let handles: Vec<_> = types
            .iter()
            .map(LogicalTypeHandle::try_from_logical)
            .try_collect()?;
        let mut ptrs: Vec<_> = handles.iter().map(LogicalTypeHandle::as_ptr).collect();
        let ptr = unsafe { ffi::duckdb_create_data_chunk(ptrs.as_mut_ptr(), to_idx(ptrs.len())) };
        if ptr.is_null() {
            quack_bail!(Native: "failed to create data chunk");
        }
        Ok(Self {
            ptr,
            types: types.to_vec(),
            capacity: vector_size(),
            writable: true,
        })
    }

    /// Take ownership of a chunk fetched from a result.
    ///
    /// # Safety
    ///
    /// `ptr` must be a live chunk the caller owns, with columns of `types`.
    pub(crate) unsafe fn from_result(ptr: duckdb_data_chunk, types: Vec<LogicalType>) -> Self {
        Self {
            ptr,
            types,
            capacity: vector_size(),
            writable: false,
        }
    }

    pub(crate) fn as_ptr(&self) -> duckdb_data_chunk {
        self.ptr
    }

    /// Number of rows in use.
    pub fn row_count(&self) -> usize {
        from_idx(unsafe { ffi::duckdb_data_chunk_get_size(self.ptr) })
    }

    /// Set the number of rows in use. Only host-built chunks can be resized, never past capacity.
    pub fn set_row_count(&mut self, rows: usize) -> QuackResult<()> {
        self.check_writable()?;
        if rows > self.capacity {
            quack_bail!(
                InvalidArgument: "row count {} exceeds chunk capacity {}",
                rows,
                self.capacity
            );
        }
        unsafe { ffi::duckdb_data_chunk_set_size(self.ptr, to_idx(rows)) };
        Ok(())
    }

    /// Clear all rows and release the memory held for long strings and list children.
    pub fn reset(&mut self) -> QuackResult<()> {
        self.check_writable()?;
        unsafe { ffi::duckdb_data_chunk_reset(self.ptr) };
        Ok(())
    }

    /// Maximum number of rows.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of columns.
    pub fn column_count(&self) -> usize {
        self.types.len()
    }

    /// Declared types of the columns.
    pub fn column_types(&self) -> &[LogicalType] {
        &self.types
    }

    /// Whether rows may be written.
    pub fn is_writable(&self) -> bool {
        self.writable
    }

    /// Read view of column `index`.
    pub fn column(&self, index: usize) -> QuackResult<Vector<'_>> {
        self.vector(index, false)
    }

    /// Write view of column `index`.
    pub fn column_mut(&mut self, index: usize) -> QuackResult<Vector<'_>> {
        self.check_writable()?;
        self.vector(index, true)
    }

    fn vector(&self, index: usize, writable: bool) -> QuackResult<Vector<'_>> {
        let dtype = self
            .types
            .get(index)
            .ok_or_else(|| quack_err!(OutOfBounds: index, 0, self.types.len()))?;
        let ptr = unsafe { ffi::duckdb_data_chunk_get_vector(self.ptr, to_idx(index)) };
        if ptr.is_null() {
            quack_bail!(Native: "chunk has no vector at column {}", index);
        }
        Ok(Vector::new(
            ptr,
            dtype.clone(),
            self.row_count(),
            self.capacity,
            writable,
        ))
    }

    /// Decode every value, one `Vec` per row.
    pub fn rows(&self) -> QuackResult<Vec<Vec<Value>>> {
        let columns = self.columns()?;
        Ok((0..self.row_count())
            .map(|row| columns.iter().map(|column| column[row].clone()).collect())
            .collect())
    }

    /// Decode every value, one `Vec` per column.
    pub fn columns(&self) -> QuackResult<Vec<Vec<Value>>> {
        (0..self.column_count())
            .map(|i| self.column(i)?.values())
            .collect()
    }

    /// Replace the contents with `rows`, each holding one value per column.
    pub fn set_rows(&mut self, rows: &[Vec<Value>]) -> QuackResult<()> {
        if let Some((index, row)) = rows
            .iter()
            .find_position(|row| row.len() != self.column_count())
        {
            quack_bail!(
                ColumnCountMismatch: "row {} has {} values for {} columns",
                index,
                row.len(),
                self.column_count()
            );
        }
        self.set_row_count(rows.len())?;
        for column in 0..self.column_count() {
            let mut vector = self.column_mut(column)?;
            for (row, values) in rows.iter().enumerate() {
                vector.set(row, &values[column])?;
            }
        }
        trace!("filled chunk with {} rows", rows.len());
        Ok(())
    }

    /// Replace the contents with `columns`, one equally long `Vec` per column.
    pub fn set_columns(&mut self, columns: &[Vec<Value>]) -> QuackResult<()> {
        if columns.len() != self.column_count() {
            quack_bail!(
                ColumnCountMismatch: "got {} columns for a chunk of {}",
                columns.len(),
                self.column_count()
            );
        }
        let rows = columns.first().map_or(0, Vec::len);
        if let Some(index) = columns.iter().position(|c| c.len() != rows) {
            quack_bail!(
                InvalidArgument: "column {} has {} values, expected {}",
                index,
                columns[index].len(),
                rows
            );
        }
        self.set_row_count(rows)?;
        for (index, values) in columns.iter().enumerate() {
            let mut vector = self.column_mut(index)?;
            for (row, value) in values.iter().enumerate() {
                vector.set(row, value)?;
            }
        }
        Ok(())
    }

    fn check_writable(&self) -> QuackResult<()> {
        if !self.writable {
            quack_bail!(InvalidArgument: "result chunks are read-only");
        }
        Ok(())
    }
}

impl Debug for DataChunk {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataChunk")
            .field("types", &format_args!("[{}]", self.types.iter().format(", ")))
            .field("rows", &self.row_count())
            .field("writable", &self.writable)
            .finish()
    }
}

impl Drop for DataChunk {
    fn drop(&mut self) {
        unsafe { ffi::duckdb_destroy_data_chunk(&mut self.ptr) };
    }
}
