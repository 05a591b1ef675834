use std::fmt::{Display, Formatter, Write};

use itertools::Itertools;

use crate::Value;

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Boolean(v) => write!(f, "{v}"),
            Value::TinyInt(v) => write!(f, "{v}"),
            Value::SmallInt(v) => write!(f, "{v}"),
            Value::Integer(v) => write!(f, "{v}"),
            Value::BigInt(v) => write!(f, "{v}"),
            Value::HugeInt(v) => write!(f, "{v}"),
            Value::UTinyInt(v) => write!(f, "{v}"),
            Value::USmallInt(v) => write!(f, "{v}"),
            Value::UInteger(v) => write!(f, "{v}"),
            Value::UBigInt(v) => write!(f, "{v}"),
            Value::UHugeInt(v) => write!(f, "{v}"),
            Value::Float(v) => write_float(f, f64::from(*v)),
            Value::Double(v) => write_float(f, *v),
            Value::Decimal(v) => write!(f, "{v}"),
            Value::Date(v) => write!(f, "{v}"),
            Value::Time(v) => write!(f, "{v}"),
            Value::TimeTz(v) => write!(f, "{v}"),
            Value::Timestamp(v) => write!(f, "{v}"),
            Value::TimestampTz(v) if v.is_infinite() => write!(f, "{v}"),
            Value::TimestampTz(v) => write!(f, "{v}+00"),
            Value::Interval(v) => write!(f, "{v}"),
            Value::Varchar(v) | Value::Enum(v) => f.write_str(v),
            Value::Blob(v) => write_blob(f, v),
            Value::Bit(v) => write!(f, "{v}"),
            Value::VarInt(v) => write!(f, "{v}"),
            Value::Uuid(v) => write!(f, "{}", v.hyphenated()),
            Value::List(items) | Value::Array(items) => write!(f, "[{}]", items.iter().format(", ")),
            Value::Struct(fields) => write!(
                f,
                "{{{}}}",
                fields
                    .iter()
                    .format_with(", ", |(name, value), g| g(&format_args!("'{name}': {value}")))
            ),
            Value::Map(entries) => write!(
                f,
                "{{{}}}",
                entries
                    .iter()
                    .format_with(", ", |(key, value), g| g(&format_args!("{key}={value}")))
            ),
            Value::Union { value, .. } => write!(f, "{value}"),
        }
    }
}

fn write_float(f: &mut Formatter<'_>, value: f64) -> std::fmt::Result {
    if value.is_nan() {
        f.write_str("nan")
    } else if value.is_infinite() {
        f.write_str(if value > 0.0 { "inf" } else { "-inf" })
    } else if value.fract() == 0.0 && value.abs() < 1e16 {
        write!(f, "{value:.1}")
    } else {
        write!(f, "{value}")
    }
}

fn write_blob(f: &mut Formatter<'_>, bytes: &[u8]) -> std::fmt::Result {
    for &byte in bytes {
        if (0x20..=0x7e).contains(&byte) && !matches!(byte, b'\\' | b'\'' | b'"') {
            f.write_char(char::from(byte))?;
        } else {
            write!(f, "\\x{byte:02X}")?;
        }
    }
    Ok(())
}
