use serde_json::{Map, Number, Value as JsonValue, json};

use crate::Value;

impl Value {
    /// Render as JSON.
    ///
    /// Integers that fit 64 bits and finite floats become numbers. Wider integers, decimals and
    /// every other scalar become their display string, so no precision is lost. Maps become arrays
    /// of `{"key", "value"}` objects since their keys need not be strings.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::Null => JsonValue::Null,
            Value::Boolean(v) => JsonValue::Bool(*v),
            Value::TinyInt(v) => JsonValue::from(*v),
            Value::SmallInt(v) => JsonValue::from(*v),
            Value::Integer(v) => JsonValue::from(*v),
            Value::BigInt(v) => JsonValue::from(*v),
            Value::UTinyInt(v) => JsonValue::from(*v),
            Value::USmallInt(v) => JsonValue::from(*v),
            Value::UInteger(v) => JsonValue::from(*v),
            Value::UBigInt(v) => JsonValue::from(*v),
            Value::HugeInt(v) => i64::try_from(*v)
                .map(JsonValue::from)
                .unwrap_or_else(|_| JsonValue::String(v.to_string())),
            Value::UHugeInt(v) => u64::try_from(*v)
                .map(JsonValue::from)
                .unwrap_or_else(|_| JsonValue::String(v.to_string())),
            Value::Float(v) => float(f64::from(*v)),
            Value::Double(v) => float(*v),
            Value::Varchar(v) | Value::Enum(v) => JsonValue::String(v.clone()),
            Value::List(items) | Value::Array(items) => {
                JsonValue::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Struct(fields) => JsonValue::Object(
                fields
                    .iter()
                    .map(|(name, value)| (name.to_string(), value.to_json()))
                    .collect::<Map<_, _>>(),
            ),
            Value::Map(entries) => JsonValue::Array(
                entries
                    .iter()
                    .map(|(key, value)| json!({"key": key.to_json(), "value": value.to_json()}))
                    .collect(),
            ),
            Value::Union { value, .. } => value.to_json(),
            other => JsonValue::String(other.to_string()),
        }
    }
}

fn float(value: f64) -> JsonValue {
    Number::from_f64(value).map_or_else(
        || JsonValue::String(Value::Double(value).to_string()),
        JsonValue::Number,
    )
}

impl From<&Value> for JsonValue {
    fn from(value: &Value) -> Self {
        value.to_json()
    }
}
