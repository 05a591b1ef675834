//! Per-type encoding and decoding of single vector slots.
//!
//! Decoding reads the slot layout each type uses inside a vector. Encoding first [`coerce`]s the
//! host value to the exact shape of the column type, so that a value which passes coercion can
//! always be written; callers that must not partially write a row coerce every value up front.

use duckdb::ffi::{self, duckdb_hugeint, duckdb_interval, duckdb_list_entry, duckdb_uhugeint};
use itertools::Itertools;
use quack_dtype::{DecimalStorage, DecimalType, EnumStorage, LogicalType};
use quack_error::{QuackError, QuackResult, quack_bail, quack_err};
use quack_scalar::{
    BitValue, Date, DecimalValue, Interval, Time, TimeTz, TimeUnit, Timestamp, Value, VarInt,
    uuid_from_storage, uuid_to_storage,
};
use uuid::Uuid;

use crate::native::{from_idx, to_idx};
use crate::raw::{self, INLINE_LENGTH};
use crate::vector::Vector;

#[allow(clippy::cast_possible_truncation)]
pub(crate) fn hugeint_from_i128(value: i128) -> duckdb_hugeint {
    duckdb_hugeint {
        lower: value as u64,
        upper: (value >> 64) as i64,
    }
}

pub(crate) fn hugeint_to_i128(value: duckdb_hugeint) -> i128 {
    (i128::from(value.upper) << 64) | i128::from(value.lower)
}

#[allow(clippy::cast_possible_truncation)]
pub(crate) fn uhugeint_from_u128(value: u128) -> duckdb_uhugeint {
    duckdb_uhugeint {
        lower: value as u64,
        upper: (value >> 64) as u64,
    }
}

pub(crate) fn uhugeint_to_u128(value: duckdb_uhugeint) -> u128 {
    (u128::from(value.upper) << 64) | u128::from(value.lower)
}

fn unit_of(dtype: &LogicalType) -> Option<TimeUnit> {
    match dtype {
        LogicalType::TimestampS => Some(TimeUnit::Seconds),
        LogicalType::TimestampMs => Some(TimeUnit::Milliseconds),
        LogicalType::Timestamp | LogicalType::TimestampTz => Some(TimeUnit::Microseconds),
        LogicalType::TimestampNs => Some(TimeUnit::Nanoseconds),
        _ => None,
    }
}

fn per_second(unit: TimeUnit) -> i64 {
    match unit {
        TimeUnit::Seconds => 1,
        TimeUnit::Milliseconds => 1_000,
        TimeUnit::Microseconds => 1_000_000,
        TimeUnit::Nanoseconds => 1_000_000_000,
    }
}

/// Convert a timestamp to another unit, truncating towards negative infinity when coarsening.
pub(crate) fn rescale(ts: Timestamp, unit: TimeUnit) -> QuackResult<Timestamp> {
    let (from, to) = (per_second(ts.unit()), per_second(unit));
    let value = if to >= from {
        ts.value()
            .checked_mul(to / from)
            .ok_or_else(|| quack_err!(TypeMismatch: "timestamp {} overflows at finer unit", ts))?
    } else {
        ts.value().div_euclid(from / to)
    };
    Ok(Timestamp::new(value, unit))
}

/// Decode the value at `row` of `vector`.
pub(crate) fn decode(vector: &Vector<'_>, row: usize) -> QuackResult<Value> {
    if row >= vector.row_count() {
        quack_bail!(OutOfBounds: row, 0, vector.row_count());
    }
    if !vector.is_valid(row) {
        return Ok(Value::Null);
    }
    let data = vector.data_ptr().cast_const();

    // SAFETY: `row` is below the row count, so its slot is initialized, and the slot type is the
    // one the column type lays out.
    macro_rules! slot {
        ($ty:ty) => {
            unsafe { raw::read::<$ty>(data, row) }
        };
    }

    Ok(match vector.column_type() {
        LogicalType::Boolean => Value::Boolean(slot!(u8) != 0),
        LogicalType::TinyInt => Value::TinyInt(slot!(i8)),
        LogicalType::SmallInt => Value::SmallInt(slot!(i16)),
        LogicalType::Integer => Value::Integer(slot!(i32)),
        LogicalType::BigInt => Value::BigInt(slot!(i64)),
        LogicalType::HugeInt => Value::HugeInt(hugeint_to_i128(slot!(duckdb_hugeint))),
        LogicalType::UTinyInt => Value::UTinyInt(slot!(u8)),
        LogicalType::USmallInt => Value::USmallInt(slot!(u16)),
        LogicalType::UInteger => Value::UInteger(slot!(u32)),
        LogicalType::UBigInt => Value::UBigInt(slot!(u64)),
        LogicalType::UHugeInt => Value::UHugeInt(uhugeint_to_u128(slot!(duckdb_uhugeint))),
        LogicalType::Float => Value::Float(slot!(f32)),
        LogicalType::Double => Value::Double(slot!(f64)),
        LogicalType::Decimal(dt) => {
            let unscaled = match dt.storage() {
                DecimalStorage::I16 => i128::from(slot!(i16)),
                DecimalStorage::I32 => i128::from(slot!(i32)),
                DecimalStorage::I64 => i128::from(slot!(i64)),
                DecimalStorage::I128 => hugeint_to_i128(slot!(duckdb_hugeint)),
            };
            Value::Decimal(DecimalValue::try_new(*dt, unscaled)?)
        }
        LogicalType::Date => Value::Date(Date::from_days(slot!(i32))),
        LogicalType::Time => Value::Time(Time::from_micros(slot!(i64))),
        LogicalType::TimeTz => Value::TimeTz(TimeTz::from_bits(slot!(u64))),
        ts @ (LogicalType::Timestamp
        | LogicalType::TimestampS
        | LogicalType::TimestampMs
        | LogicalType::TimestampNs) => {
            let unit = unit_of(ts).unwrap_or(TimeUnit::Microseconds);
            Value::Timestamp(Timestamp::new(slot!(i64), unit))
        }
        LogicalType::TimestampTz => Value::TimestampTz(Timestamp::from_micros(slot!(i64))),
        LogicalType::Interval => {
            let interval = slot!(duckdb_interval);
            Value::Interval(Interval::new(
                interval.months,
                interval.days,
                interval.micros,
            ))
        }
        LogicalType::Varchar => {
            let bytes = unsafe { raw::string_bytes(data, row) };
            Value::Varchar(String::from_utf8(bytes).map_err(|e| QuackError::from(e.utf8_error()))?)
        }
        LogicalType::Blob => Value::Blob(unsafe { raw::string_bytes(data, row) }),
        LogicalType::Bit => {
            Value::Bit(BitValue::from_raw(unsafe { raw::string_bytes(data, row) })?)
        }
        LogicalType::VarInt => {
            Value::VarInt(VarInt::from_raw(unsafe { raw::string_bytes(data, row) })?)
        }
        LogicalType::Uuid => Value::Uuid(uuid_from_storage(hugeint_to_i128(slot!(duckdb_hugeint)))),
        LogicalType::Enum(et) => {
            let index = match et.storage() {
                EnumStorage::U8 => usize::from(slot!(u8)),
                EnumStorage::U16 => usize::from(slot!(u16)),
                EnumStorage::U32 => usize::try_from(slot!(u32))?,
            };
            Value::Enum(et.value(index)?.to_string())
        }
        LogicalType::List(_) => {
            let entry = slot!(duckdb_list_entry);
            let child = vector.list_child()?;
            Value::List(decode_range(&child, entry)?)
        }
        LogicalType::Map(..) => {
            let entry = slot!(duckdb_list_entry);
            let entries = vector.list_child()?;
            let keys = entries.struct_child(0)?;
            let values = entries.struct_child(1)?;
            let (start, len) = (from_idx(entry.offset), from_idx(entry.length));
            Value::Map(
                (start..start + len)
                    .map(|i| Ok((keys.get(i)?, values.get(i)?)))
                    .collect::<QuackResult<_>>()?,
            )
        }
        LogicalType::Array(_, size) => {
            let size = from_idx(*size);
            let child = vector.array_child()?;
            Value::Array(
                (row * size..(row + 1) * size)
                    .map(|i| child.get(i))
                    .try_collect()?,
            )
        }
        LogicalType::Struct(fields) => Value::Struct(
            fields
                .names()
                .iter()
                .enumerate()
                .map(|(i, name)| Ok((name.clone(), vector.struct_child(i)?.get(row)?)))
                .collect::<QuackResult<_>>()?,
        ),
        LogicalType::Union(fields) => {
            let tag = usize::from(slot_of_tag(vector, row)?);
            let name = fields
                .names()
                .get(tag)
                .ok_or_else(|| quack_err!(OutOfBounds: tag, 0, fields.len()))?;
            Value::Union {
                tag: name.clone(),
                value: Box::new(vector.struct_child(tag + 1)?.get(row)?),
            }
        }
        LogicalType::SqlNull => Value::Null,
        LogicalType::Any => {
            quack_bail!(UnsupportedType: "cannot decode a value of type {}", vector.column_type())
        }
    })
}

fn decode_range(child: &Vector<'_>, entry: duckdb_list_entry) -> QuackResult<Vec<Value>> {
    let (start, len) = (from_idx(entry.offset), from_idx(entry.length));
    (start..start + len).map(|i| child.get(i)).collect()
}

fn slot_of_tag(vector: &Vector<'_>, row: usize) -> QuackResult<u8> {
    match vector.struct_child(0)?.get(row)? {
        Value::UTinyInt(tag) => Ok(tag),
        other => Err(quack_err!(Native: "union tag is {}", other)),
    }
}

fn mismatch(dtype: &LogicalType, value: &Value) -> QuackError {
    quack_err!(TypeMismatch: "cannot convert {} value {} to {}", value.kind(), value, dtype)
}

fn integer<T: TryFrom<i128>>(dtype: &LogicalType, value: &Value) -> QuackResult<T> {
    value
        .as_i128()
        .and_then(|v| T::try_from(v).ok())
        .ok_or_else(|| mismatch(dtype, value))
}

fn decimal(dt: DecimalType, dtype: &LogicalType, value: &Value) -> QuackResult<DecimalValue> {
    let factor = 10i128.pow(u32::from(dt.scale()));
    match value {
        Value::Decimal(d) => d.cast(dt),
        Value::Float(_) | Value::Double(_) => {
            let scaled = value.as_f64().unwrap_or(f64::NAN) * 10f64.powi(i32::from(dt.scale()));
            if !scaled.is_finite() {
                return Err(mismatch(dtype, value));
            }
            #[allow(clippy::cast_possible_truncation)]
            let unscaled = scaled.round() as i128;
            DecimalValue::try_new(dt, unscaled)
        }
        other => other
            .as_i128()
            .and_then(|v| v.checked_mul(factor))
            .ok_or_else(|| mismatch(dtype, value))
            .and_then(|unscaled| DecimalValue::try_new(dt, unscaled)),
    }
}

/// Convert `value` to the exact variant and parameters `dtype` stores.
///
/// Integers convert between widths when they fit, floats and integers convert to decimals, strings
/// convert to blobs, bit strings, UUIDs and enum members, and timestamps convert between units.
/// Anything else is a `TypeMismatch`. `NULL` fits every type.
pub fn coerce(dtype: &LogicalType, value: &Value) -> QuackResult<Value> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    let fail = || mismatch(dtype, value);
    Ok(match dtype {
        LogicalType::Boolean => match value {
            Value::Boolean(b) => Value::Boolean(*b),
            _ => return Err(fail()),
        },
        LogicalType::TinyInt => Value::TinyInt(integer(dtype, value)?),
        LogicalType::SmallInt => Value::SmallInt(integer(dtype, value)?),
        LogicalType::Integer => Value::Integer(integer(dtype, value)?),
        LogicalType::BigInt => Value::BigInt(integer(dtype, value)?),
        LogicalType::HugeInt => Value::HugeInt(integer(dtype, value)?),
        LogicalType::UTinyInt => Value::UTinyInt(integer(dtype, value)?),
        LogicalType::USmallInt => Value::USmallInt(integer(dtype, value)?),
        LogicalType::UInteger => Value::UInteger(integer(dtype, value)?),
        LogicalType::UBigInt => Value::UBigInt(integer(dtype, value)?),
        LogicalType::UHugeInt => Value::UHugeInt(value.as_u128().ok_or_else(fail)?),
        #[allow(clippy::cast_possible_truncation)]
        LogicalType::Float => Value::Float(value.as_f64().ok_or_else(fail)? as f32),
        LogicalType::Double => Value::Double(value.as_f64().ok_or_else(fail)?),
        LogicalType::Decimal(dt) => Value::Decimal(decimal(*dt, dtype, value)?),
        LogicalType::Date => match value {
            Value::Date(d) => Value::Date(*d),
            _ => return Err(fail()),
        },
        LogicalType::Time => match value {
            Value::Time(t) => Value::Time(*t),
            _ => return Err(fail()),
        },
        LogicalType::TimeTz => match value {
            Value::TimeTz(t) => Value::TimeTz(*t),
            _ => return Err(fail()),
        },
        LogicalType::Timestamp
        | LogicalType::TimestampS
        | LogicalType::TimestampMs
        | LogicalType::TimestampNs => match value {
            Value::Timestamp(ts) | Value::TimestampTz(ts) => {
                Value::Timestamp(rescale(*ts, unit_of(dtype).unwrap_or(ts.unit()))?)
            }
            _ => return Err(fail()),
        },
        LogicalType::TimestampTz => match value {
            Value::Timestamp(ts) | Value::TimestampTz(ts) => {
                Value::TimestampTz(rescale(*ts, TimeUnit::Microseconds)?)
            }
            _ => return Err(fail()),
        },
        LogicalType::Interval => match value {
            Value::Interval(i) => Value::Interval(*i),
            _ => return Err(fail()),
        },
        LogicalType::Varchar => match value {
            Value::Varchar(s) | Value::Enum(s) => Value::Varchar(s.clone()),
            _ => return Err(fail()),
        },
        LogicalType::Blob => match value {
            Value::Blob(b) => Value::Blob(b.clone()),
            Value::Varchar(s) => Value::Blob(s.as_bytes().to_vec()),
            _ => return Err(fail()),
        },
        LogicalType::Bit => match value {
            Value::Bit(b) => Value::Bit(b.clone()),
            Value::Varchar(s) => Value::Bit(s.parse().map_err(|_| fail())?),
            _ => return Err(fail()),
        },
        LogicalType::VarInt => {
            quack_bail!(UnsupportedType: "encoding {} values is not supported", dtype)
        }
        LogicalType::Uuid => match value {
            Value::Uuid(u) => Value::Uuid(*u),
            Value::Varchar(s) => Value::Uuid(Uuid::parse_str(s).map_err(|_| fail())?),
            _ => return Err(fail()),
        },
        LogicalType::Enum(et) => match value {
            Value::Enum(s) | Value::Varchar(s) if et.index_of(s).is_some() => {
                Value::Enum(s.clone())
            }
            _ => return Err(fail()),
        },
        LogicalType::List(element) => match value {
            Value::List(items) | Value::Array(items) => Value::List(
                items
                    .iter()
                    .map(|item| coerce(element, item))
                    .try_collect()?,
            ),
            _ => return Err(fail()),
        },
        LogicalType::Array(element, size) => match value {
            Value::List(items) | Value::Array(items) if to_idx(items.len()) == *size => {
                Value::Array(
                    items
                        .iter()
                        .map(|item| coerce(element, item))
                        .try_collect()?,
                )
            }
            _ => return Err(fail()),
        },
        LogicalType::Struct(fields) => match value {
            Value::Struct(pairs) if pairs.len() == fields.len() => Value::Struct(
                fields
                    .iter()
                    .map(|(name, ty)| {
                        let (_, v) = pairs.iter().find(|(n, _)| n == name).ok_or_else(
                            || quack_err!(TypeMismatch: "missing field {} for {}", name, dtype),
                        )?;
                        Ok((name.clone(), coerce(ty, v)?))
                    })
                    .collect::<QuackResult<_>>()?,
            ),
            _ => return Err(fail()),
        },
        LogicalType::Map(key, val) => match value {
            Value::Map(entries) => Value::Map(
                entries
                    .iter()
                    .map(|(k, v)| Ok((coerce(key, k)?, coerce(val, v)?)))
                    .collect::<QuackResult<_>>()?,
            ),
            _ => return Err(fail()),
        },
        LogicalType::Union(fields) => match value {
            Value::Union { tag, value: member } => {
                let index = fields.find(tag).ok_or_else(fail)?;
                Value::Union {
                    tag: fields.names()[index].clone(),
                    value: Box::new(coerce(&fields.types()[index], member)?),
                }
            }
            other => fields
                .iter()
                .find_map(|(name, ty)| {
                    coerce(ty, other).ok().map(|v| Value::Union {
                        tag: name.clone(),
                        value: Box::new(v),
                    })
                })
                .ok_or_else(fail)?,
        },
        LogicalType::SqlNull | LogicalType::Any => return Err(fail()),
    })
}

/// Convert `value` to the column type and write it to `row`.
pub(crate) fn encode(vector: &mut Vector<'_>, row: usize, value: &Value) -> QuackResult<()> {
    let value = coerce(vector.column_type(), value)?;
    write(vector, row, &value)
}

/// Write a value that already has the exact shape [`coerce`] produces for the column type.
pub(crate) fn write(vector: &mut Vector<'_>, row: usize, value: &Value) -> QuackResult<()> {
    vector.check_writable()?;
    if row >= vector.capacity() {
        quack_bail!(OutOfBounds: row, 0, vector.capacity());
    }
    if value.is_null() {
        return set_null(vector, row);
    }
    vector.mark_valid(row);
    let data = vector.data_ptr();

    // SAFETY: `row` is below the capacity the engine allocated for the slot type of the column.
    macro_rules! put {
        ($ty:ty, $value:expr) => {
            unsafe { raw::write::<$ty>(data, row, $value) }
        };
    }

    let dtype = vector.column_type().clone();
    match (&dtype, value) {
        (LogicalType::Boolean, Value::Boolean(v)) => put!(u8, u8::from(*v)),
        (LogicalType::TinyInt, Value::TinyInt(v)) => put!(i8, *v),
        (LogicalType::SmallInt, Value::SmallInt(v)) => put!(i16, *v),
        (LogicalType::Integer, Value::Integer(v)) => put!(i32, *v),
        (LogicalType::BigInt, Value::BigInt(v)) => put!(i64, *v),
        (LogicalType::HugeInt, Value::HugeInt(v)) => put!(duckdb_hugeint, hugeint_from_i128(*v)),
        (LogicalType::UTinyInt, Value::UTinyInt(v)) => put!(u8, *v),
        (LogicalType::USmallInt, Value::USmallInt(v)) => put!(u16, *v),
        (LogicalType::UInteger, Value::UInteger(v)) => put!(u32, *v),
        (LogicalType::UBigInt, Value::UBigInt(v)) => put!(u64, *v),
        (LogicalType::UHugeInt, Value::UHugeInt(v)) => {
            put!(duckdb_uhugeint, uhugeint_from_u128(*v))
        }
        (LogicalType::Float, Value::Float(v)) => put!(f32, *v),
        (LogicalType::Double, Value::Double(v)) => put!(f64, *v),
        (LogicalType::Decimal(dt), Value::Decimal(d)) => match dt.storage() {
            DecimalStorage::I16 => put!(i16, i16::try_from(d.value())?),
            DecimalStorage::I32 => put!(i32, i32::try_from(d.value())?),
            DecimalStorage::I64 => put!(i64, i64::try_from(d.value())?),
            DecimalStorage::I128 => put!(duckdb_hugeint, hugeint_from_i128(d.value())),
        },
        (LogicalType::Date, Value::Date(d)) => put!(i32, d.days()),
        (LogicalType::Time, Value::Time(t)) => put!(i64, t.micros()),
        (LogicalType::TimeTz, Value::TimeTz(t)) => put!(u64, t.to_bits()),
        (
            LogicalType::Timestamp
            | LogicalType::TimestampS
            | LogicalType::TimestampMs
            | LogicalType::TimestampNs,
            Value::Timestamp(ts),
        )
        | (LogicalType::TimestampTz, Value::TimestampTz(ts)) => put!(i64, ts.value()),
        (LogicalType::Interval, Value::Interval(i)) => put!(
            duckdb_interval,
            duckdb_interval {
                months: i.months,
                days: i.days,
                micros: i.micros,
            }
        ),
        (LogicalType::Varchar, Value::Varchar(s)) => write_string(vector, row, s.as_bytes()),
        (LogicalType::Blob, Value::Blob(b)) => write_string(vector, row, b),
        (LogicalType::Bit, Value::Bit(b)) => write_string(vector, row, b.as_bytes()),
        (LogicalType::Uuid, Value::Uuid(u)) => {
            put!(duckdb_hugeint, hugeint_from_i128(uuid_to_storage(*u)))
        }
        (LogicalType::Enum(et), Value::Enum(s)) => {
            let index = et
                .index_of(s)
                .ok_or_else(|| quack_err!(TypeMismatch: "{} is not a member of {}", s, et))?;
            match et.storage() {
                EnumStorage::U8 => put!(u8, u8::try_from(index)?),
                EnumStorage::U16 => put!(u16, u16::try_from(index)?),
                EnumStorage::U32 => put!(u32, u32::try_from(index)?),
            }
        }
        (LogicalType::List(_), Value::List(items)) => {
            let entry = append_children(vector, items.len(), |child, offset| {
                items
                    .iter()
                    .enumerate()
                    .try_for_each(|(i, item)| write(child, offset + i, item))
            })?;
            put!(duckdb_list_entry, entry);
        }
        (LogicalType::Map(..), Value::Map(entries)) => {
            let entry = append_children(vector, entries.len(), |child, offset| {
                for i in 0..entries.len() {
                    child.mark_valid(offset + i);
                }
                let mut keys = child.struct_child_mut(0)?;
                for (i, (k, _)) in entries.iter().enumerate() {
                    write(&mut keys, offset + i, k)?;
                }
                let mut values = child.struct_child_mut(1)?;
                for (i, (_, v)) in entries.iter().enumerate() {
                    write(&mut values, offset + i, v)?;
                }
                Ok(())
            })?;
            put!(duckdb_list_entry, entry);
        }
        (LogicalType::Array(_, size), Value::Array(items)) => {
            let size = from_idx(*size);
            let mut child = vector.array_child_mut()?;
            for (i, item) in items.iter().enumerate() {
                write(&mut child, row * size + i, item)?;
            }
        }
        (LogicalType::Struct(_), Value::Struct(pairs)) => {
            for (i, (_, v)) in pairs.iter().enumerate() {
                write(&mut vector.struct_child_mut(i)?, row, v)?;
            }
        }
        (LogicalType::Union(fields), Value::Union { tag, value }) => {
            let index = fields
                .find(tag)
                .ok_or_else(|| quack_err!(TypeMismatch: "{} is not a member of {}", tag, dtype))?;
            write(
                &mut vector.struct_child_mut(0)?,
                row,
                &Value::UTinyInt(u8::try_from(index)?),
            )?;
            for member in 0..fields.len() {
                let mut child = vector.struct_child_mut(member + 1)?;
                if member == index {
                    write(&mut child, row, value)?;
                } else {
                    set_null(&mut child, row)?;
                }
            }
        }
        (LogicalType::VarInt, _) => {
            quack_bail!(UnsupportedType: "encoding {} values is not supported", dtype)
        }
        (dtype, value) => return Err(mismatch(dtype, value)),
    }
    Ok(())
}

/// Append `len` elements to the child of a list-like vector and return the entry describing them.
fn append_children(
    vector: &mut Vector<'_>,
    len: usize,
    fill: impl FnOnce(&mut Vector<'_>, usize) -> QuackResult<()>,
) -> QuackResult<duckdb_list_entry> {
    let offset = vector.list_size()?;
    vector.reserve_list(offset + len)?;
    {
        let mut child = vector.list_child_with_capacity_mut(offset + len)?;
        fill(&mut child, offset)?;
    }
    vector.set_list_size(offset + len)?;
    Ok(duckdb_list_entry {
        offset: to_idx(offset),
        length: to_idx(len),
    })
}

fn write_string(vector: &mut Vector<'_>, row: usize, bytes: &[u8]) {
    if bytes.len() <= INLINE_LENGTH {
        // SAFETY: string slots are 16 bytes wide and `row` is below the capacity.
        unsafe { raw::write_inline_string(vector.data_ptr(), row, bytes) };
    } else {
        unsafe {
            ffi::duckdb_vector_assign_string_element_len(
                vector.as_ptr(),
                to_idx(row),
                bytes.as_ptr().cast(),
                to_idx(bytes.len()),
            )
        };
    }
}

/// Mark `row` invalid, along with the slots nested types keep for it in their children.
fn set_null(vector: &mut Vector<'_>, row: usize) -> QuackResult<()> {
    vector.validity_mut()?.set_invalid(row);
    match vector.column_type().clone() {
        LogicalType::Struct(fields) => {
            for i in 0..fields.len() {
                set_null(&mut vector.struct_child_mut(i)?, row)?;
            }
        }
        LogicalType::Union(fields) => {
            for i in 0..=fields.len() {
                set_null(&mut vector.struct_child_mut(i)?, row)?;
            }
        }
        LogicalType::Array(_, size) => {
            let size = from_idx(size);
            let mut child = vector.array_child_mut()?;
            for i in row * size..(row + 1) * size {
                set_null(&mut child, i)?;
            }
        }
        LogicalType::List(_) | LogicalType::Map(..) => {
            let offset = to_idx(vector.list_size()?);
            // SAFETY: list slots hold one entry each and `row` is below the capacity.
            unsafe {
                raw::write(
                    vector.data_ptr(),
                    row,
                    duckdb_list_entry { offset, length: 0 },
                )
            };
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use quack_error::QuackError;
    use rstest::rstest;

    use super::*;

    fn dec(width: u8, scale: u8, value: i128) -> Value {
        Value::Decimal(DecimalValue::from_parts(width, scale, value).unwrap())
    }

    #[rstest]
    #[case(LogicalType::TinyInt, Value::BigInt(-7), Value::TinyInt(-7))]
    #[case(LogicalType::UBigInt, Value::Integer(42), Value::UBigInt(42))]
    #[case(LogicalType::HugeInt, Value::UBigInt(u64::MAX), Value::HugeInt(i128::from(u64::MAX)))]
    #[case(LogicalType::Double, Value::Integer(3), Value::Double(3.0))]
    #[case(LogicalType::decimal(9, 4).unwrap(), Value::Integer(12), dec(9, 4, 120_000))]
    #[case(LogicalType::decimal(9, 4).unwrap(), Value::Double(1234.5678), dec(9, 4, 12_345_678))]
    #[case(LogicalType::decimal(18, 2).unwrap(), dec(9, 4, 12_345_600), dec(18, 2, 123_456))]
    #[case(LogicalType::Blob, Value::from("ab"), Value::Blob(b"ab".to_vec()))]
    #[case(LogicalType::Varchar, Value::Enum("ok".into()), Value::from("ok"))]
    #[case(LogicalType::enumeration(["sad", "ok"]), Value::from("ok"), Value::Enum("ok".into()))]
    #[case(LogicalType::Integer, Value::Null, Value::Null)]
    fn coerces(#[case] dtype: LogicalType, #[case] value: Value, #[case] expected: Value) {
        assert_eq!(coerce(&dtype, &value).unwrap(), expected);
    }

    #[rstest]
    #[case(LogicalType::TinyInt, Value::Integer(300))]
    #[case(LogicalType::UInteger, Value::Integer(-1))]
    #[case(LogicalType::Integer, Value::from("12"))]
    #[case(LogicalType::Boolean, Value::Integer(1))]
    #[case(LogicalType::decimal(4, 2).unwrap(), Value::Integer(100))]
    #[case(LogicalType::enumeration(["sad", "ok"]), Value::from("happy"))]
    #[case(LogicalType::array(LogicalType::Integer, 3), Value::List(vec![Value::Integer(1)]))]
    #[case(LogicalType::Uuid, Value::from("not a uuid"))]
    fn rejects(#[case] dtype: LogicalType, #[case] value: Value) {
        assert!(matches!(
            coerce(&dtype, &value),
            Err(QuackError::TypeMismatch(..))
        ));
    }

    #[test]
    fn varint_cannot_be_encoded() {
        let value = Value::VarInt(VarInt::from_raw(vec![0x80, 0x00, 0x01, 0x05]).unwrap());
        assert!(matches!(
            coerce(&LogicalType::VarInt, &value),
            Err(QuackError::UnsupportedType(..))
        ));
    }

    #[test]
    fn timestamps_change_unit() {
        let ts = Value::Timestamp(Timestamp::new(1_500, TimeUnit::Milliseconds));
        assert_eq!(
            coerce(&LogicalType::TimestampS, &ts).unwrap(),
            Value::Timestamp(Timestamp::new(1, TimeUnit::Seconds))
        );
        assert_eq!(
            coerce(&LogicalType::TimestampTz, &ts).unwrap(),
            Value::TimestampTz(Timestamp::from_micros(1_500_000))
        );
    }

    #[test]
    fn struct_fields_match_by_name() {
        let dtype = LogicalType::struct_([("a", LogicalType::Integer), ("b", LogicalType::Varchar)]);
        let value = Value::Struct(vec![
            ("b".into(), Value::from("x")),
            ("a".into(), Value::BigInt(1)),
        ]);
        assert_eq!(
            coerce(&dtype, &value).unwrap(),
            Value::Struct(vec![
                ("a".into(), Value::Integer(1)),
                ("b".into(), Value::from("x")),
            ])
        );
        let missing = Value::Struct(vec![("a".into(), Value::Integer(1))]);
        assert!(coerce(&dtype, &missing).is_err());
    }

    #[test]
    fn union_picks_member() {
        let dtype = LogicalType::union([("num", LogicalType::Integer), ("str", LogicalType::Varchar)]);
        assert_eq!(
            coerce(&dtype, &Value::from("hi")).unwrap(),
            Value::Union {
                tag: "str".into(),
                value: Box::new(Value::from("hi"))
            }
        );
        let tagged = Value::Union {
            tag: "num".into(),
            value: Box::new(Value::BigInt(5)),
        };
        assert_eq!(
            coerce(&dtype, &tagged).unwrap(),
            Value::Union {
                tag: "num".into(),
                value: Box::new(Value::Integer(5))
            }
        );
    }

    #[rstest]
    #[case(0)]
    #[case(-1)]
    #[case(i128::MAX)]
    #[case(i128::MIN)]
    #[case(i128::from(u64::MAX) + 1)]
    fn hugeint_halves(#[case] value: i128) {
        assert_eq!(hugeint_to_i128(hugeint_from_i128(value)), value);
    }

    #[test]
    fn uhugeint_halves() {
        let value = u128::MAX - 12;
        assert_eq!(uhugeint_to_u128(uhugeint_from_u128(value)), value);
    }
}
