use std::fmt::{Display, Formatter};

use num_enum::{IntoPrimitive, TryFromPrimitive};
use quack_error::{QuackResult, quack_err};

/// The engine's type tags, numbered as in its C API.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, IntoPrimitive, TryFromPrimitive,
)]
#[repr(u32)]
pub enum TypeId {
    /// Placeholder for a type the engine could not describe.
    Invalid = 0,
    /// `BOOLEAN`
    Boolean = 1,
    /// `TINYINT`
    TinyInt = 2,
    /// `SMALLINT`
    SmallInt = 3,
    /// `INTEGER`
    Integer = 4,
    /// `BIGINT`
    BigInt = 5,
    /// `UTINYINT`
    UTinyInt = 6,
    /// `USMALLINT`
    USmallInt = 7,
    /// `UINTEGER`
    UInteger = 8,
    /// `UBIGINT`
    UBigInt = 9,
    /// `FLOAT`
    Float = 10,
    /// `DOUBLE`
    Double = 11,
    /// `TIMESTAMP`, microseconds since the epoch
    Timestamp = 12,
    /// `DATE`, days since the epoch
    Date = 13,
    /// `TIME`, microseconds since midnight
    Time = 14,
    /// `INTERVAL`
    Interval = 15,
    /// `HUGEINT`
    HugeInt = 16,
    /// `VARCHAR`
    Varchar = 17,
    /// `BLOB`
    Blob = 18,
    /// `DECIMAL(width, scale)`
    Decimal = 19,
    /// `TIMESTAMP_S`
    TimestampS = 20,
    /// `TIMESTAMP_MS`
    TimestampMs = 21,
    /// `TIMESTAMP_NS`
    TimestampNs = 22,
    /// `ENUM(...)`
    Enum = 23,
    /// `T[]`
    List = 24,
    /// `STRUCT(...)`
    Struct = 25,
    /// `MAP(K, V)`
    Map = 26,
    /// `UUID`
    Uuid = 27,
    /// `UNION(...)`
    Union = 28,
    /// `BIT`
    Bit = 29,
    /// `TIME WITH TIME ZONE`
    TimeTz = 30,
    /// `TIMESTAMP WITH TIME ZONE`
    TimestampTz = 31,
    /// `UHUGEINT`
    UHugeInt = 32,
    /// `T[N]`
    Array = 33,
    /// `ANY`
    Any = 34,
    /// `VARINT`
    VarInt = 35,
    /// The type of a bare `NULL` literal.
    SqlNull = 36,
}

impl TypeId {
    /// Convert a raw tag as returned by the engine.
    pub fn from_raw(raw: u32) -> QuackResult<Self> {
        Self::try_from(raw).map_err(|_| quack_err!(UnsupportedType: "unknown type id {}", raw))
    }

    /// The raw tag as passed to the engine.
    pub fn raw(self) -> u32 {
        self.into()
    }

    /// Whether values of this type have child vectors.
    pub fn is_nested(self) -> bool {
        matches!(
            self,
            TypeId::List | TypeId::Struct | TypeId::Map | TypeId::Array | TypeId::Union
        )
    }

    /// Whether values are stored as 16-byte string slots with optional out-of-line data.
    pub fn is_string_like(self) -> bool {
        matches!(
            self,
            TypeId::Varchar | TypeId::Blob | TypeId::Bit | TypeId::VarInt
        )
    }

    /// Byte width of one slot in the vector's data buffer, for the types whose width does not
    /// depend on type parameters.
    pub fn fixed_width(self) -> Option<usize> {
        Some(match self {
            TypeId::Boolean | TypeId::TinyInt | TypeId::UTinyInt => 1,
            TypeId::SmallInt | TypeId::USmallInt => 2,
            TypeId::Integer | TypeId::UInteger | TypeId::Float | TypeId::Date => 4,
            TypeId::BigInt
            | TypeId::UBigInt
            | TypeId::Double
            | TypeId::Time
            | TypeId::TimeTz
            | TypeId::Timestamp
            | TypeId::TimestampS
            | TypeId::TimestampMs
            | TypeId::TimestampNs
            | TypeId::TimestampTz => 8,
            TypeId::HugeInt
            | TypeId::UHugeInt
            | TypeId::Uuid
            | TypeId::Interval
            | TypeId::Varchar
            | TypeId::Blob
            | TypeId::Bit
            | TypeId::VarInt
            | TypeId::List
            | TypeId::Map => 16,
            TypeId::Decimal
            | TypeId::Enum
            | TypeId::Struct
            | TypeId::Union
            | TypeId::Array
            | TypeId::Any
            | TypeId::SqlNull
            | TypeId::Invalid => return None,
        })
    }

    /// The SQL spelling of the tag.
    pub fn sql_name(self) -> &'static str {
        match self {
            TypeId::Invalid => "INVALID",
            TypeId::Boolean => "BOOLEAN",
            TypeId::TinyInt => "TINYINT",
            TypeId::SmallInt => "SMALLINT",
            TypeId::Integer => "INTEGER",
            TypeId::BigInt => "BIGINT",
            TypeId::UTinyInt => "UTINYINT",
            TypeId::USmallInt => "USMALLINT",
            TypeId::UInteger => "UINTEGER",
            TypeId::UBigInt => "UBIGINT",
            TypeId::Float => "FLOAT",
            TypeId::Double => "DOUBLE",
            TypeId::Timestamp => "TIMESTAMP",
            TypeId::Date => "DATE",
            TypeId::Time => "TIME",
            TypeId::Interval => "INTERVAL",
            TypeId::HugeInt => "HUGEINT",
            TypeId::Varchar => "VARCHAR",
            TypeId::Blob => "BLOB",
            TypeId::Decimal => "DECIMAL",
            TypeId::TimestampS => "TIMESTAMP_S",
            TypeId::TimestampMs => "TIMESTAMP_MS",
            TypeId::TimestampNs => "TIMESTAMP_NS",
            TypeId::Enum => "ENUM",
            TypeId::List => "LIST",
            TypeId::Struct => "STRUCT",
            TypeId::Map => "MAP",
            TypeId::Uuid => "UUID",
            TypeId::Union => "UNION",
            TypeId::Bit => "BIT",
            TypeId::TimeTz => "TIME WITH TIME ZONE",
            TypeId::TimestampTz => "TIMESTAMP WITH TIME ZONE",
            TypeId::UHugeInt => "UHUGEINT",
            TypeId::Array => "ARRAY",
            TypeId::Any => "ANY",
            TypeId::VarInt => "VARINT",
            TypeId::SqlNull => "\"NULL\"",
        }
    }
}

impl Display for TypeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.sql_name())
    }
}
