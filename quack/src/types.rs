//! Conversion between native logical type handles and [`LogicalType`].

use std::ffi::c_char;

use duckdb::ffi::{self, duckdb_logical_type};
use itertools::Itertools;
use quack_dtype::{FieldName, LogicalType, StructFields, TypeId};
use quack_error::{QuackResult, quack_bail, quack_err};

use crate::native::{cstring, from_idx, owned_str, to_idx};

/// An owned native logical type, destroyed on drop.
pub(crate) struct LogicalTypeHandle {
    ptr: duckdb_logical_type,
}

impl LogicalTypeHandle {
    /// Take ownership of a handle returned by the engine.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or a logical type the caller owns and nothing else will destroy.
    pub(crate) unsafe fn own(ptr: duckdb_logical_type) -> QuackResult<Self> {
        if ptr.is_null() {
            quack_bail!(Native: "engine returned no logical type");
        }
        Ok(Self { ptr })
    }

    pub(crate) fn as_ptr(&self) -> duckdb_logical_type {
        self.ptr
    }

    /// Describe this native type on the host.
    pub(crate) fn to_logical(&self) -> QuackResult<LogicalType> {
        let ptr = self.ptr;
        let id = TypeId::from_raw(unsafe { ffi::duckdb_get_type_id(ptr) })?;
        Ok(match id {
            TypeId::Decimal => LogicalType::decimal(
                unsafe { ffi::duckdb_decimal_width(ptr) },
                unsafe { ffi::duckdb_decimal_scale(ptr) },
            )?,
            TypeId::Enum => {
                let size = unsafe { ffi::duckdb_enum_dictionary_size(ptr) };
                let values: Vec<FieldName> = (0..size)
                    .map(|i| {
                        unsafe { owned_str(ffi::duckdb_enum_dictionary_value(ptr, u64::from(i))) }
                            .map(FieldName::from)
                            .ok_or_else(|| quack_err!(Native: "missing enum value {}", i))
                    })
                    .try_collect()?;
                LogicalType::enumeration(values)
            }
            TypeId::List => {
                LogicalType::list(child(unsafe { ffi::duckdb_list_type_child_type(ptr) })?)
            }
            TypeId::Array => LogicalType::array(
                child(unsafe { ffi::duckdb_array_type_child_type(ptr) })?,
                unsafe { ffi::duckdb_array_type_array_size(ptr) },
            ),
            TypeId::Map => LogicalType::map(
                child(unsafe { ffi::duckdb_map_type_key_type(ptr) })?,
                child(unsafe { ffi::duckdb_map_type_value_type(ptr) })?,
            ),
            TypeId::Struct => {
                let count = unsafe { ffi::duckdb_struct_type_child_count(ptr) };
                LogicalType::Struct(fields(count, |i| unsafe {
                    (
                        ffi::duckdb_struct_type_child_name(ptr, i),
                        ffi::duckdb_struct_type_child_type(ptr, i),
                    )
                })?)
            }
            TypeId::Union => {
                let count = unsafe { ffi::duckdb_union_type_member_count(ptr) };
                LogicalType::Union(fields(count, |i| unsafe {
                    (
                        ffi::duckdb_union_type_member_name(ptr, i),
                        ffi::duckdb_union_type_member_type(ptr, i),
                    )
                })?)
            }
            other => LogicalType::from_type_id(other)?,
        })
    }

    /// Build the native counterpart of a host type.
    pub(crate) fn try_from_logical(dtype: &LogicalType) -> QuackResult<Self> {
        let ptr = match dtype {
            LogicalType::Decimal(dt) => unsafe {
                ffi::duckdb_create_decimal_type(dt.width(), dt.scale())
            },
            LogicalType::Enum(et) => {
                let names: Vec<_> = et.values().iter().map(|v| cstring(v)).try_collect()?;
                let mut ptrs: Vec<*const c_char> = names.iter().map(|n| n.as_ptr()).collect();
                unsafe { ffi::duckdb_create_enum_type(ptrs.as_mut_ptr(), to_idx(ptrs.len())) }
            }
            LogicalType::List(element) => {
                let element = Self::try_from_logical(element)?;
                unsafe { ffi::duckdb_create_list_type(element.ptr) }
            }
            LogicalType::Array(element, size) => {
                let element = Self::try_from_logical(element)?;
                unsafe { ffi::duckdb_create_array_type(element.ptr, *size) }
            }
            LogicalType::Map(key, value) => {
                let key = Self::try_from_logical(key)?;
                let value = Self::try_from_logical(value)?;
                unsafe { ffi::duckdb_create_map_type(key.ptr, value.ptr) }
            }
            LogicalType::Struct(fields) | LogicalType::Union(fields) => {
                let names: Vec<_> = fields.names().iter().map(|n| cstring(n)).try_collect()?;
                let mut name_ptrs: Vec<*const c_char> = names.iter().map(|n| n.as_ptr()).collect();
                let children: Vec<_> =
                    fields.types().iter().map(Self::try_from_logical).try_collect()?;
                let mut child_ptrs: Vec<_> = children.iter().map(Self::as_ptr).collect();
                let count = to_idx(children.len());
                let (children, names) = (child_ptrs.as_mut_ptr(), name_ptrs.as_mut_ptr());
                if matches!(dtype, LogicalType::Struct(_)) {
                    unsafe { ffi::duckdb_create_struct_type(children, names, count) }
                } else {
                    unsafe { ffi::duckdb_create_union_type(children, names, count) }
                }
            }
            other => unsafe { ffi::duckdb_create_logical_type(other.id().raw()) },
        };
        if ptr.is_null() {
            quack_bail!(Native: "failed to create logical type {}", dtype);
        }
        Ok(Self { ptr })
    }
}

fn child(ptr: duckdb_logical_type) -> QuackResult<LogicalType> {
    unsafe { LogicalTypeHandle::own(ptr) }?.to_logical()
}

fn fields(
    count: ffi::idx_t,
    member: impl Fn(ffi::idx_t) -> (*mut c_char, duckdb_logical_type),
) -> QuackResult<StructFields> {
    let mut names = Vec::with_capacity(from_idx(count));
    let mut types = Vec::with_capacity(from_idx(count));
    for i in 0..count {
        let (name, dtype) = member(i);
        let dtype = child(dtype)?;
        let name = unsafe { owned_str(name) }
            .ok_or_else(|| quack_err!(Native: "missing name of member {}", i))?;
        names.push(FieldName::from(name));
        types.push(dtype);
    }
    StructFields::try_new(names, types)
}

impl Drop for LogicalTypeHandle {
    fn drop(&mut self) {
        unsafe { ffi::duckdb_destroy_logical_type(&mut self.ptr) };
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(LogicalType::Integer)]
    #[case(LogicalType::UHugeInt)]
    #[case(LogicalType::TimestampNs)]
    #[case(LogicalType::Varchar)]
    #[case(LogicalType::Uuid)]
    #[case(LogicalType::decimal(9, 4).unwrap())]
    #[case(LogicalType::decimal(38, 10).unwrap())]
    #[case(LogicalType::enumeration(["sad", "ok", "happy"]))]
    #[case(LogicalType::list(LogicalType::Varchar))]
    #[case(LogicalType::array(LogicalType::Double, 3))]
    #[case(LogicalType::map(LogicalType::Varchar, LogicalType::list(LogicalType::Integer)))]
    #[case(LogicalType::struct_([("a", LogicalType::Integer), ("b c", LogicalType::Blob)]))]
    #[case(LogicalType::union([("num", LogicalType::Integer), ("str", LogicalType::Varchar)]))]
    fn native_round_trip(#[case] dtype: LogicalType) {
        let handle = LogicalTypeHandle::try_from_logical(&dtype).unwrap();
        assert_eq!(handle.to_logical().unwrap(), dtype);
    }

    #[test]
    fn decimal_parameters_survive() {
        let dtype = LogicalType::decimal(9, 4).unwrap();
        let handle = LogicalTypeHandle::try_from_logical(&dtype).unwrap();
        assert_eq!(unsafe { ffi::duckdb_decimal_width(handle.as_ptr()) }, 9);
        assert_eq!(unsafe { ffi::duckdb_decimal_scale(handle.as_ptr()) }, 4);
        assert_eq!(
            unsafe { ffi::duckdb_decimal_internal_type(handle.as_ptr()) },
            TypeId::Integer.raw()
        );
    }
}
