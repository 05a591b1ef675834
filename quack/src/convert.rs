use std::collections::HashMap;

use quack_dtype::LogicalType;
use quack_error::QuackResult;
use quack_scalar::Value;
use serde_json::Value as JsonValue;

use crate::chunk::DataChunk;

/// One row keyed by column name.
pub type RowObject<T = Value> = HashMap<String, T>;

/// Whole columns keyed by column name.
pub type ColumnsObject<T = Value> = HashMap<String, Vec<T>>;

/// Turns decoded values into some other representation.
///
/// The converter sees every value, `NULL`s included, together with the declared type of its column.
/// Closures of the right shape are converters too.
pub trait ValueConverter {
    /// What each value becomes.
    type Output;

    /// Convert one value of a column declared as `dtype`.
    fn convert(&self, value: &Value, dtype: &LogicalType) -> QuackResult<Self::Output>;
}

impl<F, T> ValueConverter for F
where
    F: Fn(&Value, &LogicalType) -> QuackResult<T>,
{
    type Output = T;

    fn convert(&self, value: &Value, dtype: &LogicalType) -> QuackResult<T> {
        self(value, dtype)
    }
}

/// Converts values to JSON, as [`Value::to_json`] does.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonConverter;

impl ValueConverter for JsonConverter {
    type Output = JsonValue;

    fn convert(&self, value: &Value, _dtype: &LogicalType) -> QuackResult<JsonValue> {
        Ok(value.to_json())
    }
}

pub(crate) fn convert_columns<C: ValueConverter>(
    chunks: &[DataChunk],
    types: &[LogicalType],
    converter: &C,
) -> QuackResult<Vec<Vec<C::Output>>> {
    let mut columns: Vec<Vec<C::Output>> = types.iter().map(|_| Vec::new()).collect();
    for chunk in chunks {
        for ((column, dtype), values) in columns.iter_mut().zip(types).zip(chunk.columns()?) {
            for value in &values {
                column.push(converter.convert(value, dtype)?);
            }
        }
    }
    Ok(columns)
}

pub(crate) fn convert_rows<C: ValueConverter>(
    chunks: &[DataChunk],
    types: &[LogicalType],
    converter: &C,
) -> QuackResult<Vec<Vec<C::Output>>> {
    let mut rows = Vec::new();
    for chunk in chunks {
        for row in chunk.rows()? {
            rows.push(
                row.iter()
                    .zip(types)
                    .map(|(value, dtype)| converter.convert(value, dtype))
                    .collect::<QuackResult<Vec<_>>>()?,
            );
        }
    }
    Ok(rows)
}

/// Key every row by `names`, which must be unique.
pub(crate) fn key_rows<T>(names: &[String], rows: Vec<Vec<T>>) -> Vec<RowObject<T>> {
    rows.into_iter()
        .map(|row| names.iter().cloned().zip(row).collect())
        .collect()
}

/// Key every column by `names`, which must be unique.
pub(crate) fn key_columns<T>(names: &[String], columns: Vec<Vec<T>>) -> ColumnsObject<T> {
    names.iter().cloned().zip(columns).collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn closures_convert() {
        let lengths =
            |value: &Value, _: &LogicalType| -> QuackResult<usize> { Ok(value.to_string().len()) };
        assert_eq!(lengths.convert(&Value::from("four"), &LogicalType::Varchar).unwrap(), 4);
    }

    #[test]
    fn json_keeps_nulls_and_wide_integers() {
        assert_eq!(
            JsonConverter.convert(&Value::Null, &LogicalType::Integer).unwrap(),
            json!(null)
        );
        assert_eq!(
            JsonConverter
                .convert(&Value::HugeInt(i128::MAX), &LogicalType::HugeInt)
                .unwrap(),
            json!(i128::MAX.to_string())
        );
    }

    #[test]
    fn keys_follow_names() {
        let names = vec!["a".to_string(), "a:1".to_string()];
        let rows = key_rows(&names, vec![vec![1, 2], vec![3, 4]]);
        assert_eq!(rows[1]["a:1"], 4);
        let columns = key_columns(&names, vec![vec![1, 3], vec![2, 4]]);
        assert_eq!(columns["a"], [1, 3]);
    }
}
