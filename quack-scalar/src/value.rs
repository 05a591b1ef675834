use quack_dtype::FieldName;
use uuid::Uuid;

use crate::{BitValue, Date, DecimalValue, Interval, Time, TimeTz, Timestamp, VarInt};

const UUID_FLIP: u128 = 1 << 127;

/// A single host-side value of any engine type.
///
/// Values carry no type of their own beyond their variant; the column type they are read from or
/// written to supplies parameters such as decimal scale or enum dictionary.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// SQL `NULL`.
    #[default]
    Null,
    /// `BOOLEAN`
    Boolean(bool),
    /// `TINYINT`
    TinyInt(i8),
    /// `SMALLINT`
    SmallInt(i16),
    /// `INTEGER`
    Integer(i32),
    /// `BIGINT`
    BigInt(i64),
    /// `HUGEINT`
    HugeInt(i128),
    /// `UTINYINT`
    UTinyInt(u8),
    /// `USMALLINT`
    USmallInt(u16),
    /// `UINTEGER`
    UInteger(u32),
    /// `UBIGINT`
    UBigInt(u64),
    /// `UHUGEINT`
    UHugeInt(u128),
    /// `FLOAT`
    Float(f32),
    /// `DOUBLE`
    Double(f64),
    /// `DECIMAL(width, scale)`
    Decimal(DecimalValue),
    /// `DATE`
    Date(Date),
    /// `TIME`
    Time(Time),
    /// `TIME WITH TIME ZONE`
    TimeTz(TimeTz),
    /// `TIMESTAMP`, `TIMESTAMP_S`, `TIMESTAMP_MS` or `TIMESTAMP_NS`, by unit.
    Timestamp(Timestamp),
    /// `TIMESTAMP WITH TIME ZONE`, microseconds since the epoch in UTC.
    TimestampTz(Timestamp),
    /// `INTERVAL`
    Interval(Interval),
    /// `VARCHAR`
    Varchar(String),
    /// `BLOB`
    Blob(Vec<u8>),
    /// `BIT`
    Bit(BitValue),
    /// `VARINT`
    VarInt(VarInt),
    /// `UUID`
    Uuid(Uuid),
    /// A member of an `ENUM` dictionary.
    Enum(String),
    /// `T[]`
    List(Vec<Value>),
    /// `T[N]`
    Array(Vec<Value>),
    /// `STRUCT(...)`, fields in declaration order.
    Struct(Vec<(FieldName, Value)>),
    /// `MAP(K, V)`, entries in storage order.
    Map(Vec<(Value, Value)>),
    /// `UNION(...)`: the selected member and its value.
    Union {
        /// Name of the selected member.
        tag: FieldName,
        /// The member's value.
        value: Box<Value>,
    },
}

impl Value {
    /// Whether this is `NULL`.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// A short name of the variant, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Boolean(_) => "BOOLEAN",
            Value::TinyInt(_) => "TINYINT",
            Value::SmallInt(_) => "SMALLINT",
            Value::Integer(_) => "INTEGER",
            Value::BigInt(_) => "BIGINT",
            Value::HugeInt(_) => "HUGEINT",
            Value::UTinyInt(_) => "UTINYINT",
            Value::USmallInt(_) => "USMALLINT",
            Value::UInteger(_) => "UINTEGER",
            Value::UBigInt(_) => "UBIGINT",
            Value::UHugeInt(_) => "UHUGEINT",
            Value::Float(_) => "FLOAT",
            Value::Double(_) => "DOUBLE",
            Value::Decimal(_) => "DECIMAL",
            Value::Date(_) => "DATE",
            Value::Time(_) => "TIME",
            Value::TimeTz(_) => "TIME WITH TIME ZONE",
            Value::Timestamp(_) => "TIMESTAMP",
            Value::TimestampTz(_) => "TIMESTAMP WITH TIME ZONE",
            Value::Interval(_) => "INTERVAL",
            Value::Varchar(_) => "VARCHAR",
            Value::Blob(_) => "BLOB",
            Value::Bit(_) => "BIT",
            Value::VarInt(_) => "VARINT",
            Value::Uuid(_) => "UUID",
            Value::Enum(_) => "ENUM",
            Value::List(_) => "LIST",
            Value::Array(_) => "ARRAY",
            Value::Struct(_) => "STRUCT",
            Value::Map(_) => "MAP",
            Value::Union { .. } => "UNION",
        }
    }

    /// The value of any signed or unsigned integer variant, widened.
    pub fn as_i128(&self) -> Option<i128> {
        Some(match *self {
            Value::TinyInt(v) => i128::from(v),
            Value::SmallInt(v) => i128::from(v),
            Value::Integer(v) => i128::from(v),
            Value::BigInt(v) => i128::from(v),
            Value::HugeInt(v) => v,
            Value::UTinyInt(v) => i128::from(v),
            Value::USmallInt(v) => i128::from(v),
            Value::UInteger(v) => i128::from(v),
            Value::UBigInt(v) => i128::from(v),
            Value::UHugeInt(v) => return i128::try_from(v).ok(),
            _ => return None,
        })
    }

    /// The value of any non-negative integer variant, widened.
    pub fn as_u128(&self) -> Option<u128> {
        match *self {
            Value::UHugeInt(v) => Some(v),
            _ => self.as_i128().and_then(|v| u128::try_from(v).ok()),
        }
    }

    /// The value of any numeric variant as a double. Wide integers and decimals may round.
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(f64::from(*v)),
            Value::Double(v) => Some(*v),
            Value::Decimal(d) => Some(d.to_f64()),
            other => other.as_i128().map(|v| v as f64),
        }
    }

    /// The text of a `VARCHAR` or `ENUM` value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Varchar(s) | Value::Enum(s) => Some(s),
            _ => None,
        }
    }

    /// A struct field by name.
    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Struct(fields) => fields.iter().find(|(n, _)| &**n == name).map(|(_, v)| v),
            _ => None,
        }
    }
}

/// The UUID a `HUGEINT` in the engine's UUID storage stands for. The top bit is flipped so that
/// signed comparison of the storage orders UUIDs lexicographically.
#[allow(clippy::cast_sign_loss)]
pub fn uuid_from_storage(storage: i128) -> Uuid {
    Uuid::from_u128((storage as u128) ^ UUID_FLIP)
}

/// The storage of a UUID, see [`uuid_from_storage`].
#[allow(clippy::cast_possible_wrap)]
pub fn uuid_to_storage(uuid: Uuid) -> i128 {
    (uuid.as_u128() ^ UUID_FLIP) as i128
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::$variant(value)
                }
            }
        )*
    };
}

value_from!(
    bool => Boolean,
    i8 => TinyInt,
    i16 => SmallInt,
    i32 => Integer,
    i64 => BigInt,
    i128 => HugeInt,
    u8 => UTinyInt,
    u16 => USmallInt,
    u32 => UInteger,
    u64 => UBigInt,
    u128 => UHugeInt,
    f32 => Float,
    f64 => Double,
    DecimalValue => Decimal,
    Date => Date,
    Time => Time,
    TimeTz => TimeTz,
    Interval => Interval,
    String => Varchar,
    Vec<u8> => Blob,
    BitValue => Bit,
    VarInt => VarInt,
    Uuid => Uuid,
);

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Varchar(value.to_string())
    }
}

impl From<Timestamp> for Value {
    fn from(value: Timestamp) -> Self {
        Value::Timestamp(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_widening() {
        assert_eq!(Value::from(-5i8).as_i128(), Some(-5));
        assert_eq!(Value::from(u64::MAX).as_i128(), Some(i128::from(u64::MAX)));
        assert_eq!(Value::from(u128::MAX).as_i128(), None);
        assert_eq!(Value::from(u128::MAX).as_u128(), Some(u128::MAX));
        assert_eq!(Value::from(-1i32).as_u128(), None);
        assert_eq!(Value::from("x").as_i128(), None);
        assert_eq!(Value::from(1.5f32).as_f64(), Some(1.5));
    }

    #[test]
    fn options_become_null() {
        assert!(Value::from(None::<i32>).is_null());
        assert_eq!(Value::from(Some(3i32)), Value::Integer(3));
    }

    #[test]
    fn uuid_storage_flips_top_bit() {
        let uuid = Uuid::parse_str("00000000-0000-0000-0000-000000000001").unwrap();
        let storage = uuid_to_storage(uuid);
        assert_eq!(storage, i128::MIN + 1);
        assert_eq!(uuid_from_storage(storage), uuid);

        let max = Uuid::from_u128(u128::MAX);
        assert_eq!(uuid_to_storage(max), i128::MAX);
    }

    #[test]
    fn struct_field_lookup() {
        let value = Value::Struct(vec![("a".into(), Value::Integer(1)), ("b".into(), Value::Null)]);
        assert_eq!(value.field("a"), Some(&Value::Integer(1)));
        assert_eq!(value.field("c"), None);
    }
}
