use quack_dtype::LogicalType;
use quack_error::{QuackResult, quack_bail};
use quack_scalar::Value;

use crate::chunk::DataChunk;
use crate::convert::{
    ColumnsObject, RowObject, ValueConverter, convert_columns, convert_rows, key_columns, key_rows,
};
use crate::result::QueryResult;

/// Reads a [`QueryResult`] incrementally and keeps what it has read.
///
/// Values can be looked up by position once the chunk holding them has been read.
#[derive(Debug)]
pub struct ResultReader {
    result: QueryResult,
    chunks: Vec<DataChunk>,
    /// Row index at which each chunk starts, plus the total as the last entry.
    offsets: Vec<usize>,
    done: bool,
}

impl ResultReader {
    /// Wrap `result`. Nothing is read until asked for.
    pub fn new(result: QueryResult) -> Self {
        Self {
            result,
            chunks: Vec::new(),
            offsets: vec![0],
            done: false,
        }
    }

    /// The result being read, for its metadata.
    pub fn result(&self) -> &QueryResult {
        &self.result
    }

    /// Number of columns.
    pub fn column_count(&self) -> usize {
        self.result.column_count()
    }

    /// Names of all columns, as the engine reports them.
    pub fn column_names(&self) -> &[String] {
        self.result.column_names()
    }

    /// Declared types of all columns.
    pub fn column_types(&self) -> &[LogicalType] {
        self.result.column_types()
    }

    /// Rows read so far.
    pub fn current_row_count(&self) -> usize {
        self.offsets.last().copied().unwrap_or_default()
    }

    /// Whether every row has been read.
    pub fn done(&self) -> bool {
        self.done
    }

    /// Chunks read so far.
    pub fn chunks(&self) -> &[DataChunk] {
        &self.chunks
    }

    async fn fetch(&mut self) -> QuackResult<bool> {
        match self.result.fetch_chunk().await? {
            Some(chunk) => {
                self.offsets.push(self.current_row_count() + chunk.row_count());
                self.chunks.push(chunk);
                Ok(true)
            }
            None => {
                self.done = true;
                Ok(false)
            }
        }
    }

    /// Read every remaining row.
    pub async fn read_all(&mut self) -> QuackResult<()> {
        while !self.done && self.fetch().await? {}
        Ok(())
    }

    /// Read until at least `target_rows` rows are available or the result ends.
    pub async fn read_until(&mut self, target_rows: usize) -> QuackResult<()> {
        while !self.done && self.current_row_count() < target_rows && self.fetch().await? {}
        Ok(())
    }

    /// The value at `column` and `row`, counting rows across every chunk read so far.
    pub fn value(&self, column: usize, row: usize) -> QuackResult<Value> {
        if row >= self.current_row_count() {
            quack_bail!(OutOfBounds: row, 0, self.current_row_count());
        }
        // The chunk holding `row` is the last one starting at or before it.
        let chunk = self.offsets.partition_point(|&start| start <= row) - 1;
        self.chunks[chunk].column(column)?.get(row - self.offsets[chunk])
    }

    /// Decode every row read so far.
    pub fn rows(&self) -> QuackResult<Vec<Vec<Value>>> {
        let mut rows = Vec::with_capacity(self.current_row_count());
        for chunk in &self.chunks {
            rows.extend(chunk.rows()?);
        }
        Ok(rows)
    }

    /// Decode every value read so far, one `Vec` per column.
    pub fn columns(&self) -> QuackResult<Vec<Vec<Value>>> {
        let mut columns = vec![Vec::with_capacity(self.current_row_count()); self.column_count()];
        for chunk in &self.chunks {
            for (column, values) in columns.iter_mut().zip(chunk.columns()?) {
                column.extend(values);
            }
        }
        Ok(columns)
    }

    /// Decode every row read so far, keyed by the deduplicated column names.
    pub fn row_objects(&self) -> QuackResult<Vec<RowObject>> {
        Ok(key_rows(&self.result.deduplicated_column_names(), self.rows()?))
    }

    /// Decode every value read so far, one `Vec` per deduplicated column name.
    pub fn columns_object(&self) -> QuackResult<ColumnsObject> {
        Ok(key_columns(&self.result.deduplicated_column_names(), self.columns()?))
    }

    /// Pass every value read so far through `converter`, one `Vec` per row.
    pub fn convert_rows<C: ValueConverter>(
        &self,
        converter: &C,
    ) -> QuackResult<Vec<Vec<C::Output>>> {
        convert_rows(&self.chunks, self.column_types(), converter)
    }

    /// Pass every value read so far through `converter`, one `Vec` per column.
    pub fn convert_columns<C: ValueConverter>(
        &self,
        converter: &C,
    ) -> QuackResult<Vec<Vec<C::Output>>> {
        convert_columns(&self.chunks, self.column_types(), converter)
    }

    /// Like [`ResultReader::convert_rows`], keyed by the deduplicated column names.
    pub fn convert_row_objects<C: ValueConverter>(
        &self,
        converter: &C,
    ) -> QuackResult<Vec<RowObject<C::Output>>> {
        let rows = self.convert_rows(converter)?;
        Ok(key_rows(&self.result.deduplicated_column_names(), rows))
    }

    /// Like [`ResultReader::convert_columns`], keyed by the deduplicated column names.
    pub fn convert_columns_object<C: ValueConverter>(
        &self,
        converter: &C,
    ) -> QuackResult<ColumnsObject<C::Output>> {
        let columns = self.convert_columns(converter)?;
        Ok(key_columns(&self.result.deduplicated_column_names(), columns))
    }
}

#[cfg(test)]
mod tests {
    use quack_error::QuackError;
    use serde_json::json;

    use super::*;
    use crate::{Database, JsonConverter, vector_size};

    #[tokio::test]
    async fn reads_incrementally() {
        let conn = Database::open_in_memory().await.unwrap().connect().await.unwrap();
        let rows = 3 * vector_size() + 5;
        let mut reader = ResultReader::new(
            conn.stream(&format!("select i, i * 2 as twice from range({rows}) t(i)"))
                .await
                .unwrap(),
        );
        assert_eq!(reader.current_row_count(), 0);
        assert!(matches!(reader.value(0, 0), Err(QuackError::OutOfBounds(0, 0, 0, _))));

        reader.read_until(vector_size() + 1).await.unwrap();
        assert!(reader.current_row_count() > vector_size());
        assert!(!reader.done());
        let row = vector_size();
        assert_eq!(reader.value(1, row).unwrap(), Value::BigInt(2 * i64::try_from(row).unwrap()));

        reader.read_all().await.unwrap();
        assert!(reader.done());
        assert_eq!(reader.current_row_count(), rows);
        let last = rows - 1;
        assert_eq!(reader.value(0, last).unwrap(), Value::BigInt(i64::try_from(last).unwrap()));
        assert_eq!(reader.rows().unwrap().len(), rows);
        assert_eq!(reader.columns().unwrap()[1][4], Value::BigInt(8));
    }

    #[tokio::test]
    async fn read_until_stops_at_end() {
        let conn = Database::open_in_memory().await.unwrap().connect().await.unwrap();
        let mut reader = ResultReader::new(conn.run("select 1 as a, 'x' as b").await.unwrap());
        reader.read_until(100).await.unwrap();
        assert!(reader.done());
        assert_eq!(reader.current_row_count(), 1);
        assert_eq!(reader.column_names(), ["a", "b"]);
        assert_eq!(reader.rows().unwrap(), vec![vec![Value::Integer(1), Value::from("x")]]);
        assert!(matches!(reader.value(2, 0), Err(QuackError::OutOfBounds(..))));
    }

    #[tokio::test]
    async fn empty_result() {
        let conn = Database::open_in_memory().await.unwrap().connect().await.unwrap();
        let mut reader =
            ResultReader::new(conn.run("select 1 as a where false").await.unwrap());
        reader.read_all().await.unwrap();
        assert!(reader.done());
        assert_eq!(reader.current_row_count(), 0);
        assert_eq!(reader.columns().unwrap(), vec![Vec::<Value>::new()]);
    }

    #[tokio::test]
    async fn keyed_and_converted_views() {
        let conn = Database::open_in_memory().await.unwrap().connect().await.unwrap();
        let mut reader = ResultReader::new(
            conn.stream("select i as v, i::varchar as v from range(3) t(i)")
                .await
                .unwrap(),
        );
        reader.read_all().await.unwrap();
        assert_eq!(reader.row_objects().unwrap()[1]["v:1"], Value::from("1"));
        assert_eq!(reader.columns_object().unwrap()["v"].len(), 3);
        assert_eq!(
            reader.convert_rows(&JsonConverter).unwrap()[2],
            vec![json!(2), json!("2")]
        );
        assert_eq!(
            reader.convert_columns(&JsonConverter).unwrap()[1],
            [json!("0"), json!("1"), json!("2")]
        );
        assert_eq!(reader.convert_row_objects(&JsonConverter).unwrap()[0]["v"], json!(0));
        assert_eq!(
            reader.convert_columns_object(&JsonConverter).unwrap()["v:1"][2],
            json!("2")
        );
    }
}
