use std::ffi::c_void;
use std::fmt::{Debug, Formatter};
use std::marker::PhantomData;

use duckdb::ffi::{self, duckdb_vector};
use quack_dtype::LogicalType;
use quack_error::{QuackResult, quack_bail, quack_err};
use quack_scalar::Value;
use quack_validity::{Validity, ValidityMut, words_for};

use crate::native::{check_state, from_idx, to_idx};
use crate::{codec, raw};

/// One column of a [`DataChunk`](crate::DataChunk).
///
/// A vector is a view: it does not own native memory and cannot outlive the chunk it came from.
/// Views obtained through a shared borrow of the chunk are read-only.
pub struct Vector<'a> {
    ptr: duckdb_vector,
    dtype: LogicalType,
    rows: usize,
    capacity: usize,
    writable: bool,
    _chunk: PhantomData<&'a ()>,
}

impl<'a> Vector<'a> {
    pub(crate) fn new(
        ptr: duckdb_vector,
        dtype: LogicalType,
        rows: usize,
        capacity: usize,
        writable: bool,
    ) -> Self {
        Self {
            ptr,
            dtype,
            rows,
            capacity,
            writable,
            _chunk: PhantomData,
        }
    }


    pub(crate) fn as_ptr(&self) -> duckdb_vector {
        self.ptr
    }

    /// The declared type of the column.
    pub fn column_type(&self) -> &LogicalType {
        &self.dtype
    }

    /// Number of rows that hold values.
    pub fn row_count(&self) -> usize {
        self.rows
    }

    /// Number of slots allocated.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether values may be written through this view.
    pub fn is_writable(&self) -> bool {
        self.writable
    }

    /// The raw data buffer. Growing a list child or assigning a long string may move it, so the
    /// pointer must not be kept across writes.
    pub fn data_ptr(&self) -> *mut c_void {
        unsafe { ffi::duckdb_vector_get_data(self.ptr) }
    }

    /// Read view of the validity bitmap.
    pub fn validity(&self) -> Validity<'_> {
        let words = unsafe { ffi::duckdb_vector_get_validity(self.ptr) };
        if words.is_null() {
            return Validity::all_valid();
        }
        // SAFETY: the engine allocates one bit per slot of capacity.
        Validity::new(Some(unsafe {
            std::slice::from_raw_parts(words, words_for(self.capacity))
        }))
    }

    /// Whether `row` holds a value.
    pub fn is_valid(&self, row: usize) -> bool {
        self.validity().is_valid(row)
    }

    /// Materialize the validity bitmap so that it can be written. Idempotent.
    pub fn ensure_validity_writable(&mut self) -> QuackResult<()> {
        self.check_writable()?;
        unsafe { ffi::duckdb_vector_ensure_validity_writable(self.ptr) };
        Ok(())
    }

    /// Write view of the validity bitmap, materializing it first.
    pub fn validity_mut(&mut self) -> QuackResult<ValidityMut<'_>> {
        self.ensure_validity_writable()?;
        let words = unsafe { ffi::duckdb_vector_get_validity(self.ptr) };
        if words.is_null() {
            quack_bail!(Native: "validity bitmap missing after it was made writable");
        }
        // SAFETY: as above, and the bitmap is exclusively borrowed through `self`.
        Ok(ValidityMut::new(unsafe {
            std::slice::from_raw_parts_mut(words, words_for(self.capacity))
        }))
    }

    /// Mark `row` valid without materializing an absent bitmap.
    pub(crate) fn mark_valid(&mut self, row: usize) {
        let words = unsafe { ffi::duckdb_vector_get_validity(self.ptr) };
        if !words.is_null() {
            let words = unsafe { std::slice::from_raw_parts_mut(words, words_for(self.capacity)) };
            quack_validity::set_valid(words, row);
        }
    }

    /// Decode the value at `row`.
    pub fn get(&self, row: usize) -> QuackResult<Value> {
        codec::decode(self, row)
    }

    /// All values, in row order.
    pub fn values(&self) -> QuackResult<Vec<Value>> {
        (0..self.rows).map(|row| self.get(row)).collect()
    }

    /// Encode `value` into `row`, converting it to the column type first.
    pub fn set(&mut self, row: usize, value: &Value) -> QuackResult<()> {
        codec::encode(self, row, value)
    }

    /// Number of elements in the child of a list or map vector.
    pub fn list_size(&self) -> QuackResult<usize> {
        self.expect_list()?;
        Ok(from_idx(unsafe { ffi::duckdb_list_vector_get_size(self.ptr) }))
    }

    /// Set the number of elements in the child of a list or map vector.
    pub fn set_list_size(&mut self, size: usize) -> QuackResult<()> {
        self.check_writable()?;
        self.expect_list()?;
        check_state(
            unsafe { ffi::duckdb_list_vector_set_size(self.ptr, to_idx(size)) },
            || quack_err!(Native: "failed to set list size"),
        )
    }

    /// Make room for at least `capacity` elements in the child of a list or map vector.
    pub fn reserve_list(&mut self, capacity: usize) -> QuackResult<()> {
        self.check_writable()?;
        self.expect_list()?;
        check_state(
            unsafe { ffi::duckdb_list_vector_reserve(self.ptr, to_idx(capacity)) },
            || quack_err!(Native: "failed to reserve list capacity"),
        )
    }

    /// The element vector of a list, or the `STRUCT(key, value)` entry vector of a map.
    ///
    /// The child is read-only; use [`Vector::list_child_mut`] to write through it.
    pub fn list_child(&self) -> QuackResult<Vector<'_>> {
        let (ptr, dtype, size) = self.list_parts()?;
        Ok(Vector::new(ptr, dtype, size, size, false))
    }

    /// Writable element vector of a list or map.
    pub fn list_child_mut(&mut self) -> QuackResult<Vector<'_>> {
        let size = self.list_size()?;
        self.list_child_with_capacity_mut(size)
    }

    /// Writable element vector of a list or map, sized for `capacity` elements after a reserve.
    pub(crate) fn list_child_with_capacity_mut(
        &mut self,
        capacity: usize,
    ) -> QuackResult<Vector<'_>> {
        self.check_writable()?;
        let (ptr, dtype, size) = self.list_parts()?;
        Ok(Vector::new(ptr, dtype, size, capacity.max(size), true))
    }

    fn list_parts(&self) -> QuackResult<(duckdb_vector, LogicalType, usize)> {
        let dtype = match &self.dtype {
            LogicalType::List(element) => element.as_ref().clone(),
            map @ LogicalType::Map(..) => map.map_entry_type()?,
            other => quack_bail!(TypeMismatch: "{} has no list child", other),
        };
        let size = self.list_size()?;
        let ptr = unsafe { ffi::duckdb_list_vector_get_child(self.ptr) };
        Ok((ptr, dtype, size))
    }

    /// The `index`-th child of a struct, or of a union where child 0 is the tag.
    ///
    /// The child is read-only; use [`Vector::struct_child_mut`] to write through it.
    pub fn struct_child(&self, index: usize) -> QuackResult<Vector<'_>> {
        let (ptr, dtype) = self.struct_parts(index)?;
        Ok(Vector::new(ptr, dtype, self.rows, self.capacity, false))
    }

    /// Writable `index`-th child of a struct or union.
    pub fn struct_child_mut(&mut self, index: usize) -> QuackResult<Vector<'_>> {
        self.check_writable()?;
        let (ptr, dtype) = self.struct_parts(index)?;
        Ok(Vector::new(ptr, dtype, self.rows, self.capacity, true))
    }

    fn struct_parts(&self, index: usize) -> QuackResult<(duckdb_vector, LogicalType)> {
        let dtype = match &self.dtype {
            LogicalType::Struct(fields) => fields.types().get(index).cloned(),
            LogicalType::Union(_) if index == 0 => Some(LogicalType::UTinyInt),
            LogicalType::Union(fields) => fields.types().get(index - 1).cloned(),
            other => quack_bail!(TypeMismatch: "{} has no struct children", other),
        };
        let Some(dtype) = dtype else {
            quack_bail!(OutOfBounds: index, 0, self.struct_child_count());
        };
        let ptr = unsafe { ffi::duckdb_struct_vector_get_child(self.ptr, to_idx(index)) };
        Ok((ptr, dtype))
    }

    fn struct_child_count(&self) -> usize {
        match &self.dtype {
            LogicalType::Struct(fields) => fields.len(),
            LogicalType::Union(fields) => fields.len() + 1,
            _ => 0,
        }
    }

    /// The element vector of a fixed-size array, holding `size` elements per row.
    ///
    /// The child is read-only; use [`Vector::array_child_mut`] to write through it.
    pub fn array_child(&self) -> QuackResult<Vector<'_>> {
        let (ptr, dtype, size) = self.array_parts()?;
        Ok(Vector::new(ptr, dtype, self.rows * size, self.capacity * size, false))
    }

    /// Writable element vector of a fixed-size array.
    pub fn array_child_mut(&mut self) -> QuackResult<Vector<'_>> {
        self.check_writable()?;
        let (ptr, dtype, size) = self.array_parts()?;
        Ok(Vector::new(ptr, dtype, self.rows * size, self.capacity * size, true))
    }

    fn array_parts(&self) -> QuackResult<(duckdb_vector, LogicalType, usize)> {
        let LogicalType::Array(element, size) = &self.dtype else {
            quack_bail!(TypeMismatch: "{} is not an array", self.dtype);
        };
        let ptr = unsafe { ffi::duckdb_array_vector_get_child(self.ptr) };
        Ok((ptr, element.as_ref().clone(), from_idx(*size)))
    }

    /// Copy raw bytes into the data buffer of a fixed-width vector, starting at `byte_offset`.
    pub fn copy_from_bytes(&mut self, byte_offset: usize, bytes: &[u8]) -> QuackResult<()> {
        self.check_writable()?;
        let Some(width) = self.dtype.slot_width().filter(|_| !self.dtype.id().is_string_like())
        else {
            quack_bail!(UnsupportedType: "cannot copy raw bytes into a {} vector", self.dtype);
        };
        let end = byte_offset + bytes.len();
        if end > width * self.capacity {
            quack_bail!(OutOfBounds: end, 0, width * self.capacity);
        }
        // SAFETY: the range was checked against the allocated buffer above.
        unsafe { raw::copy_bytes(self.data_ptr().cast(), byte_offset, bytes) };
        Ok(())
    }

    /// Replace the validity bitmap with `words`, one bit per row starting at row 0.
    pub fn copy_validity_from(&mut self, words: &[u64]) -> QuackResult<()> {
        let capacity = words_for(self.capacity);
        if words.len() > capacity {
            quack_bail!(OutOfBounds: words.len(), 0, capacity);
        }
        self.ensure_validity_writable()?;
        let target = unsafe { ffi::duckdb_vector_get_validity(self.ptr) };
        let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
        // SAFETY: the bitmap is materialized and holds `capacity` words.
        unsafe { raw::copy_bytes(target.cast(), 0, &bytes) };
        Ok(())
    }

    pub(crate) fn check_writable(&self) -> QuackResult<()> {
        if !self.writable {
            quack_bail!(InvalidArgument: "vector of type {} is read-only", self.dtype);
        }
        Ok(())
    }

    fn expect_list(&self) -> QuackResult<()> {
        if !matches!(self.dtype, LogicalType::List(_) | LogicalType::Map(..)) {
            quack_bail!(TypeMismatch: "{} is not a list", self.dtype);
        }
        Ok(())
    }
}

impl Debug for Vector<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vector")
            .field("dtype", &format_args!("{}", self.dtype))
            .field("rows", &self.rows)
            .field("capacity", &self.capacity)
            .field("writable", &self.writable)
            .finish()
    }
}
