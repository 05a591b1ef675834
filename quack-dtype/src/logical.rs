use std::fmt::{Display, Formatter};
use std::sync::Arc;

use itertools::Itertools;
use quack_error::{QuackResult, quack_bail, quack_err};

use crate::{DecimalType, TypeId};

/// The name of a struct field or union member.
pub type FieldName = Arc<str>;

/// A host-side description of a column's type.
///
/// This is plain data: the matching native handle is created from it on demand and released as soon
/// as the engine no longer needs it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LogicalType {
    /// `BOOLEAN`
    Boolean,
    /// `TINYINT`
    TinyInt,
    /// `SMALLINT`
    SmallInt,
    /// `INTEGER`
    Integer,
    /// `BIGINT`
    BigInt,
    /// `HUGEINT`
    HugeInt,
    /// `UTINYINT`
    UTinyInt,
    /// `USMALLINT`
    USmallInt,
    /// `UINTEGER`
    UInteger,
    /// `UBIGINT`
    UBigInt,
    /// `UHUGEINT`
    UHugeInt,
    /// `FLOAT`
    Float,
    /// `DOUBLE`
    Double,
    /// `DATE`
    Date,
    /// `TIME`
    Time,
    /// `TIME WITH TIME ZONE`
    TimeTz,
    /// `TIMESTAMP`
    Timestamp,
    /// `TIMESTAMP_S`
    TimestampS,
    /// `TIMESTAMP_MS`
    TimestampMs,
    /// `TIMESTAMP_NS`
    TimestampNs,
    /// `TIMESTAMP WITH TIME ZONE`
    TimestampTz,
    /// `INTERVAL`
    Interval,
    /// `VARCHAR`
    Varchar,
    /// `BLOB`
    Blob,
    /// `BIT`
    Bit,
    /// `VARINT`
    VarInt,
    /// `UUID`
    Uuid,
    /// `DECIMAL(width, scale)`
    Decimal(DecimalType),
    /// `ENUM(...)`
    Enum(EnumType),
    /// `T[]`
    List(Arc<LogicalType>),
    /// `T[N]`
    Array(Arc<LogicalType>, u64),
    /// `STRUCT(...)`
    Struct(StructFields),
    /// `MAP(K, V)`
    Map(Arc<LogicalType>, Arc<LogicalType>),
    /// `UNION(...)`
    Union(StructFields),
    /// The type of a bare `NULL` literal.
    SqlNull,
    /// `ANY`, only seen on unbound parameters.
    Any,
}

impl LogicalType {
    /// Build a type that needs no parameters from its tag.
    pub fn from_type_id(id: TypeId) -> QuackResult<Self> {
        Ok(match id {
            TypeId::Boolean => LogicalType::Boolean,
            TypeId::TinyInt => LogicalType::TinyInt,
            TypeId::SmallInt => LogicalType::SmallInt,
            TypeId::Integer => LogicalType::Integer,
            TypeId::BigInt => LogicalType::BigInt,
            TypeId::HugeInt => LogicalType::HugeInt,
            TypeId::UTinyInt => LogicalType::UTinyInt,
            TypeId::USmallInt => LogicalType::USmallInt,
            TypeId::UInteger => LogicalType::UInteger,
            TypeId::UBigInt => LogicalType::UBigInt,
            TypeId::UHugeInt => LogicalType::UHugeInt,
            TypeId::Float => LogicalType::Float,
            TypeId::Double => LogicalType::Double,
            TypeId::Date => LogicalType::Date,
            TypeId::Time => LogicalType::Time,
            TypeId::TimeTz => LogicalType::TimeTz,
            TypeId::Timestamp => LogicalType::Timestamp,
            TypeId::TimestampS => LogicalType::TimestampS,
            TypeId::TimestampMs => LogicalType::TimestampMs,
            TypeId::TimestampNs => LogicalType::TimestampNs,
            TypeId::TimestampTz => LogicalType::TimestampTz,
            TypeId::Interval => LogicalType::Interval,
            TypeId::Varchar => LogicalType::Varchar,
            TypeId::Blob => LogicalType::Blob,
            TypeId::Bit => LogicalType::Bit,
            TypeId::VarInt => LogicalType::VarInt,
            TypeId::Uuid => LogicalType::Uuid,
            TypeId::SqlNull => LogicalType::SqlNull,
            TypeId::Any => LogicalType::Any,
            TypeId::Decimal
            | TypeId::Enum
            | TypeId::List
            | TypeId::Array
            | TypeId::Struct
            | TypeId::Map
            | TypeId::Union
            | TypeId::Invalid => {
                quack_bail!(UnsupportedType: "{} needs type parameters", id)
            }
        })
    }

    /// `DECIMAL(width, scale)`
    pub fn decimal(width: u8, scale: u8) -> QuackResult<Self> {
        Ok(LogicalType::Decimal(DecimalType::try_new(width, scale)?))
    }

    /// `child[]`
    pub fn list(child: LogicalType) -> Self {
        LogicalType::List(Arc::new(child))
    }

    /// `child[size]`
    pub fn array(child: LogicalType, size: u64) -> Self {
        LogicalType::Array(Arc::new(child), size)
    }

    /// `MAP(key, value)`
    pub fn map(key: LogicalType, value: LogicalType) -> Self {
        LogicalType::Map(Arc::new(key), Arc::new(value))
    }

    /// `STRUCT(name type, ...)`
    pub fn struct_<N: Into<FieldName>>(fields: impl IntoIterator<Item = (N, LogicalType)>) -> Self {
        LogicalType::Struct(StructFields::from_iter(fields))
    }

    /// `UNION(tag type, ...)`
    pub fn union<N: Into<FieldName>>(members: impl IntoIterator<Item = (N, LogicalType)>) -> Self {
        LogicalType::Union(StructFields::from_iter(members))
    }

    /// `ENUM('a', 'b', ...)`
    pub fn enumeration<S: Into<FieldName>>(values: impl IntoIterator<Item = S>) -> Self {
        LogicalType::Enum(EnumType::new(values))
    }

    /// The tag of this type.
    pub fn id(&self) -> TypeId {
        match self {
            LogicalType::Boolean => TypeId::Boolean,
            LogicalType::TinyInt => TypeId::TinyInt,
            LogicalType::SmallInt => TypeId::SmallInt,
            LogicalType::Integer => TypeId::Integer,
            LogicalType::BigInt => TypeId::BigInt,
            LogicalType::HugeInt => TypeId::HugeInt,
            LogicalType::UTinyInt => TypeId::UTinyInt,
            LogicalType::USmallInt => TypeId::USmallInt,
            LogicalType::UInteger => TypeId::UInteger,
            LogicalType::UBigInt => TypeId::UBigInt,
            LogicalType::UHugeInt => TypeId::UHugeInt,
            LogicalType::Float => TypeId::Float,
            LogicalType::Double => TypeId::Double,
            LogicalType::Date => TypeId::Date,
            LogicalType::Time => TypeId::Time,
            LogicalType::TimeTz => TypeId::TimeTz,
            LogicalType::Timestamp => TypeId::Timestamp,
            LogicalType::TimestampS => TypeId::TimestampS,
            LogicalType::TimestampMs => TypeId::TimestampMs,
            LogicalType::TimestampNs => TypeId::TimestampNs,
            LogicalType::TimestampTz => TypeId::TimestampTz,
            LogicalType::Interval => TypeId::Interval,
            LogicalType::Varchar => TypeId::Varchar,
            LogicalType::Blob => TypeId::Blob,
            LogicalType::Bit => TypeId::Bit,
            LogicalType::VarInt => TypeId::VarInt,
            LogicalType::Uuid => TypeId::Uuid,
            LogicalType::Decimal(_) => TypeId::Decimal,
            LogicalType::Enum(_) => TypeId::Enum,
            LogicalType::List(_) => TypeId::List,
            LogicalType::Array(..) => TypeId::Array,
            LogicalType::Struct(_) => TypeId::Struct,
            LogicalType::Map(..) => TypeId::Map,
            LogicalType::Union(_) => TypeId::Union,
            LogicalType::SqlNull => TypeId::SqlNull,
            LogicalType::Any => TypeId::Any,
        }
    }

    /// Whether values of this type have child vectors.
    pub fn is_nested(&self) -> bool {
        self.id().is_nested()
    }

    /// Byte width of one slot of this type's own data buffer.
    ///
    /// Structs, unions and arrays keep their values in child vectors and have no slot of their own.
    pub fn slot_width(&self) -> Option<usize> {
        match self {
            LogicalType::Decimal(dt) => Some(dt.storage().byte_width()),
            LogicalType::Enum(et) => Some(et.storage().byte_width()),
            other => other.id().fixed_width(),
        }
    }

    /// The element type of a list or array.
    pub fn element_type(&self) -> QuackResult<&LogicalType> {
        match self {
            LogicalType::List(child) | LogicalType::Array(child, _) => Ok(child),
            other => Err(quack_err!(TypeMismatch: "{} has no element type", other)),
        }
    }

    /// The type of a map's entries, `STRUCT(key K, value V)`, which is how the engine lays maps out.
    pub fn map_entry_type(&self) -> QuackResult<LogicalType> {
        match self {
            LogicalType::Map(key, value) => Ok(LogicalType::struct_([
                ("key", key.as_ref().clone()),
                ("value", value.as_ref().clone()),
            ])),
            other => Err(quack_err!(TypeMismatch: "{} is not a map", other)),
        }
    }

    /// The named children of a struct or the members of a union.
    pub fn fields(&self) -> QuackResult<&StructFields> {
        match self {
            LogicalType::Struct(fields) | LogicalType::Union(fields) => Ok(fields),
            other => Err(quack_err!(TypeMismatch: "{} has no fields", other)),
        }
    }
}

impl Display for LogicalType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            LogicalType::Decimal(dt) => write!(f, "{dt}"),
            LogicalType::Enum(et) => write!(f, "{et}"),
            LogicalType::List(child) => write!(f, "{child}[]"),
            LogicalType::Array(child, size) => write!(f, "{child}[{size}]"),
            LogicalType::Struct(fields) => write!(f, "STRUCT({fields})"),
            LogicalType::Map(key, value) => write!(f, "MAP({key}, {value})"),
            LogicalType::Union(members) => write!(f, "UNION({members})"),
            other => f.write_str(other.id().sql_name()),
        }
    }
}

/// Ordered, named child types of a struct or union.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StructFields {
    names: Arc<[FieldName]>,
    types: Arc<[LogicalType]>,
}

impl StructFields {
    /// Create from parallel name and type lists.
    pub fn try_new(names: Vec<FieldName>, types: Vec<LogicalType>) -> QuackResult<Self> {
        if names.len() != types.len() {
            quack_bail!(
                "{} field names given for {} field types",
                names.len(),
                types.len()
            );
        }
        Ok(Self {
            names: names.into(),
            types: types.into(),
        })
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether there are no fields.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Field names, in order.
    pub fn names(&self) -> &[FieldName] {
        &self.names
    }

    /// Field types, in order.
    pub fn types(&self) -> &[LogicalType] {
        &self.types
    }

    /// Position of the field called `name`.
    pub fn find(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| &**n == name)
    }

    /// Iterate over `(name, type)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&FieldName, &LogicalType)> + '_ {
        self.names.iter().zip(self.types.iter())
    }
}

impl<N: Into<FieldName>> FromIterator<(N, LogicalType)> for StructFields {
    fn from_iter<T: IntoIterator<Item = (N, LogicalType)>>(iter: T) -> Self {
        let (names, types): (Vec<FieldName>, Vec<LogicalType>) =
            iter.into_iter().map(|(n, t)| (n.into(), t)).unzip();
        Self {
            names: names.into(),
            types: types.into(),
        }
    }
}

impl Display for StructFields {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            self.iter()
                .map(|(name, ty)| format!("{} {ty}", quote_identifier(name)))
                .join(", ")
        )
    }
}

fn quote_identifier(name: &str) -> String {
    let plain = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if plain {
        name.to_string()
    } else {
        format!("\"{}\"", name.replace('"', "\"\""))
    }
}

/// The integer width an enum's dictionary indices are stored in.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum EnumStorage {
    /// Up to 255 values.
    U8,
    /// Up to 65535 values.
    U16,
    /// Anything larger.
    U32,
}

impl EnumStorage {
    /// Bytes per slot.
    pub fn byte_width(self) -> usize {
        match self {
            EnumStorage::U8 => 1,
            EnumStorage::U16 => 2,
            EnumStorage::U32 => 4,
        }
    }

    /// The storage named by an internal-type tag.
    pub fn from_type_id(id: TypeId) -> QuackResult<Self> {
        Ok(match id {
            TypeId::UTinyInt => EnumStorage::U8,
            TypeId::USmallInt => EnumStorage::U16,
            TypeId::UInteger => EnumStorage::U32,
            other => quack_bail!(UnsupportedType: "{} is not an enum storage type", other),
        })
    }
}

/// The dictionary of an enum type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnumType {
    values: Arc<[FieldName]>,
}

impl EnumType {
    /// Create from the dictionary values, in index order.
    pub fn new<S: Into<FieldName>>(values: impl IntoIterator<Item = S>) -> Self {
        Self {
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Dictionary values in index order.
    pub fn values(&self) -> &[FieldName] {
        &self.values
    }

    /// The value stored at dictionary index `idx`.
    pub fn value(&self, idx: usize) -> QuackResult<&FieldName> {
        self.values
            .get(idx)
            .ok_or_else(|| quack_err!(OutOfBounds: idx, 0, self.values.len()))
    }

    /// The dictionary index of `value`.
    pub fn index_of(&self, value: &str) -> Option<usize> {
        self.values.iter().position(|v| &**v == value)
    }

    /// The index width the engine picks for a dictionary of this size.
    pub fn storage(&self) -> EnumStorage {
        match self.values.len() {
            n if n <= u8::MAX as usize => EnumStorage::U8,
            n if n <= u16::MAX as usize => EnumStorage::U16,
            _ => EnumStorage::U32,
        }
    }
}

impl Display for EnumType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ENUM({})",
            self.values
                .iter()
                .map(|v| format!("'{}'", v.replace('\'', "''")))
                .join(", ")
        )
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(LogicalType::Integer, "INTEGER")]
    #[case(LogicalType::TimeTz, "TIME WITH TIME ZONE")]
    #[case(LogicalType::decimal(9, 4).unwrap(), "DECIMAL(9,4)")]
    #[case(LogicalType::list(LogicalType::Varchar), "VARCHAR[]")]
    #[case(LogicalType::array(LogicalType::Integer, 3), "INTEGER[3]")]
    #[case(LogicalType::map(LogicalType::Varchar, LogicalType::Double), "MAP(VARCHAR, DOUBLE)")]
    #[case(
        LogicalType::struct_([("a", LogicalType::Integer), ("my field", LogicalType::Blob)]),
        "STRUCT(a INTEGER, \"my field\" BLOB)"
    )]
    #[case(
        LogicalType::union([("num", LogicalType::Integer), ("str", LogicalType::Varchar)]),
        "UNION(num INTEGER, str VARCHAR)"
    )]
    #[case(LogicalType::enumeration(["sad", "o'k"]), "ENUM('sad', 'o''k')")]
    fn display(#[case] ty: LogicalType, #[case] expected: &str) {
        assert_eq!(ty.to_string(), expected);
    }

    #[test]
    fn slot_widths() {
        assert_eq!(LogicalType::decimal(4, 1).unwrap().slot_width(), Some(2));
        assert_eq!(LogicalType::decimal(38, 10).unwrap().slot_width(), Some(16));
        assert_eq!(LogicalType::enumeration(["a"]).slot_width(), Some(1));
        assert_eq!(LogicalType::list(LogicalType::Integer).slot_width(), Some(16));
        assert_eq!(LogicalType::struct_([("a", LogicalType::Integer)]).slot_width(), None);
    }

    #[test]
    fn enum_storage_thresholds() {
        let small = EnumType::new((0..255).map(|i| i.to_string()));
        assert_eq!(small.storage(), EnumStorage::U8);
        let medium = EnumType::new((0..256).map(|i| i.to_string()));
        assert_eq!(medium.storage(), EnumStorage::U16);
        let large = EnumType::new((0..70_000).map(|i| i.to_string()));
        assert_eq!(large.storage(), EnumStorage::U32);
        assert_eq!(medium.index_of("255"), Some(255));
        assert!(small.value(300).is_err());
    }

    #[test]
    fn map_entries_are_key_value_structs() {
        let map = LogicalType::map(LogicalType::Varchar, LogicalType::Integer);
        let entry = map.map_entry_type().unwrap();
        let fields = entry.fields().unwrap();
        assert_eq!(fields.names()[0].as_ref(), "key");
        assert_eq!(fields.types()[1], LogicalType::Integer);
    }

    #[test]
    fn parameterized_tags_need_parameters() {
        assert!(LogicalType::from_type_id(TypeId::Decimal).is_err());
        assert_eq!(
            LogicalType::from_type_id(TypeId::Uuid).unwrap(),
            LogicalType::Uuid
        );
    }
}
