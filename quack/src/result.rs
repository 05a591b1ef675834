use std::collections::{HashMap, HashSet};
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use duckdb::ffi::{self, duckdb_result};
use futures::Stream;
use futures::stream;
use itertools::Itertools;
use log::{debug, trace};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use parking_lot::Mutex;
use quack_dtype::LogicalType;
use quack_error::{QuackResult, quack_err};
use quack_scalar::Value;

use crate::chunk::DataChunk;
use crate::connection::ConnectionHandle;
use crate::convert::{
    ColumnsObject, RowObject, ValueConverter, convert_columns, convert_rows, key_columns, key_rows,
};
use crate::native::{borrowed_str, native_error};
use crate::runtime;
use crate::types::LogicalTypeHandle;

/// What kind of statement produced a result, numbered as in the engine's C API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u32)]
pub enum StatementType {
    Invalid = 0,
    Select = 1,
    Insert = 2,
    Update = 3,
    Explain = 4,
    Delete = 5,
    Prepare = 6,
    Create = 7,
    Execute = 8,
    Alter = 9,
    Transaction = 10,
    Copy = 11,
    Analyze = 12,
    VariableSet = 13,
    CreateFunc = 14,
    Drop = 15,
    Export = 16,
    Pragma = 17,
    Vacuum = 18,
    Call = 19,
    Set = 20,
    Load = 21,
    Relation = 22,
    Extension = 23,
    LogicalPlan = 24,
    Attach = 25,
    Detach = 26,
    Multi = 27,
}

impl StatementType {
    pub(crate) fn from_raw(raw: u32) -> Self {
        Self::try_from(raw).unwrap_or(StatementType::Invalid)
    }
}

/// What a result holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u32)]
pub enum ResultType {
    Invalid = 0,
    /// A count of inserted, updated or deleted rows.
    ChangedRows = 1,
    /// Nothing, as for DDL.
    Nothing = 2,
    /// Rows of a query.
    QueryResult = 3,
}

/// A native result, destroyed on drop before the connection it came from is released.
pub(crate) struct ResultHandle {
    raw: duckdb_result,
    _connection: Arc<ConnectionHandle>,
}

// Calls on one result are serialized by the mutex that owns it.
unsafe impl Send for ResultHandle {}

impl ResultHandle {
    /// Take ownership of a result filled in by the engine, turning a failed one into an error.
    pub(crate) fn own(
        mut raw: duckdb_result,
        state: ffi::duckdb_state,
        connection: Arc<ConnectionHandle>,
    ) -> QuackResult<Self> {
        if state != ffi::DuckDBSuccess {
            let err = unsafe { native_error(ffi::duckdb_result_error(&mut raw), "query failed") };
            unsafe { ffi::duckdb_destroy_result(&mut raw) };
            return Err(err);
        }
        Ok(Self {
            raw,
            _connection: connection,
        })
    }
}

impl Drop for ResultHandle {
    fn drop(&mut self) {
        unsafe { ffi::duckdb_destroy_result(&mut self.raw) };
    }
}

/// The outcome of a statement: metadata plus a forward-only sequence of chunks.
///
/// Metadata is read once when the result is created. Chunks can be fetched until the first empty
/// one, after which the result is exhausted.
pub struct QueryResult {
    handle: Arc<Mutex<ResultHandle>>,
    names: Vec<String>,
    types: Vec<LogicalType>,
    statement_type: StatementType,
    result_type: ResultType,
    rows_changed: u64,
    streaming: bool,
    done: bool,
}

impl QueryResult {
    pub(crate) fn try_new(mut handle: ResultHandle) -> QuackResult<Self> {
        let raw = &mut handle.raw;
        let count = unsafe { ffi::duckdb_column_count(raw) };
        let names = (0..count)
            .map(|i| unsafe { borrowed_str(ffi::duckdb_column_name(raw, i)) }.unwrap_or_default())
            .collect();
        let types = (0..count)
            .map(|i| {
                unsafe { LogicalTypeHandle::own(ffi::duckdb_column_logical_type(raw, i)) }?
                    .to_logical()
            })
            .try_collect()?;
        let statement_type =
            StatementType::from_raw(unsafe { ffi::duckdb_result_statement_type(*raw) });
        let result_type = ResultType::try_from(unsafe { ffi::duckdb_result_return_type(*raw) })
            .unwrap_or(ResultType::Invalid);
        let rows_changed = unsafe { ffi::duckdb_rows_changed(raw) };
        let streaming = unsafe { ffi::duckdb_result_is_streaming(*raw) };
        debug!(
            "{} result with {} columns, streaming: {}",
            statement_type.name(),
            count,
            streaming
        );
        Ok(Self {
            handle: Arc::new(Mutex::new(handle)),
            names,
            types,
            statement_type,
            result_type,
            rows_changed,
            streaming,
            done: false,
        })
    }

    /// Number of columns.
    pub fn column_count(&self) -> usize {
        self.names.len()
    }

    /// Name of column `index`.
    pub fn column_name(&self, index: usize) -> QuackResult<&str> {
        self.names
            .get(index)
            .map(String::as_str)
            .ok_or_else(|| quack_err!(OutOfBounds: index, 0, self.names.len()))
    }

    /// Names of all columns, as the engine reports them.
    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    /// Names of all columns, made unique: the second and later uses of a name get a `:1`, `:2`,
    /// ... suffix, skipping any suffixed name that is already taken.
    pub fn deduplicated_column_names(&self) -> Vec<String> {
        deduplicate(&self.names)
    }

    /// Declared type of column `index`.
    pub fn column_type(&self, index: usize) -> QuackResult<&LogicalType> {
        self.types
            .get(index)
            .ok_or_else(|| quack_err!(OutOfBounds: index, 0, self.types.len()))
    }

    /// Declared types of all columns.
    pub fn column_types(&self) -> &[LogicalType] {
        &self.types
    }

    /// Kind of statement that produced the result.
    pub fn statement_type(&self) -> StatementType {
        self.statement_type
    }

    /// What the result holds.
    pub fn result_type(&self) -> ResultType {
        self.result_type
    }

    /// Rows inserted, updated or deleted. Zero for queries.
    pub fn rows_changed(&self) -> u64 {
        self.rows_changed
    }

    /// Whether chunks are produced on demand rather than held in memory.
    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    /// Whether the end of the result has been reached.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// The next non-empty chunk, or `None` at the end of the result.
    pub async fn fetch_chunk(&mut self) -> QuackResult<Option<DataChunk>> {
        if self.done {
            return Ok(None);
        }
        let handle = Arc::clone(&self.handle);
        let types = self.types.clone();
        let fetched = runtime::blocking(move || {
            let mut result = handle.lock();
            let ptr = unsafe { ffi::duckdb_fetch_chunk(result.raw) };
            if ptr.is_null() {
                let error = unsafe { ffi::duckdb_result_error(&mut result.raw) };
                if !error.is_null() {
                    return Err(unsafe { native_error(error, "failed to fetch chunk") });
                }
                return Ok(None);
            }
            let chunk = unsafe { DataChunk::from_result(ptr, types) };
            Ok((chunk.row_count() > 0).then_some(chunk))
        })
        .await;
        match &fetched {
            Ok(Some(chunk)) => trace!("fetched chunk of {} rows", chunk.row_count()),
            Ok(None) | Err(_) => self.done = true,
        }
        fetched
    }

    /// Fetch every remaining chunk.
    pub async fn fetch_all_chunks(&mut self) -> QuackResult<Vec<DataChunk>> {
        let mut chunks = Vec::new();
        while let Some(chunk) = self.fetch_chunk().await? {
            chunks.push(chunk);
        }
        Ok(chunks)
    }

    /// Fetch and decode every remaining row.
    pub async fn rows(&mut self) -> QuackResult<Vec<Vec<Value>>> {
        let mut rows = Vec::new();
        for chunk in self.fetch_all_chunks().await? {
            rows.extend(chunk.rows()?);
        }
        Ok(rows)
    }

    /// Fetch and decode every remaining value, one `Vec` per column.
    pub async fn columns(&mut self) -> QuackResult<Vec<Vec<Value>>> {
        let mut columns = vec![Vec::new(); self.column_count()];
        for chunk in self.fetch_all_chunks().await? {
            for (column, values) in columns.iter_mut().zip(chunk.columns()?) {
                column.extend(values);
            }
        }
        Ok(columns)
    }

    /// Fetch and decode every remaining row, keyed by the deduplicated column names.
    pub async fn row_objects(&mut self) -> QuackResult<Vec<RowObject>> {
        let rows = self.rows().await?;
        Ok(key_rows(&self.deduplicated_column_names(), rows))
    }

    /// Fetch and decode every remaining value, one `Vec` per deduplicated column name.
    pub async fn columns_object(&mut self) -> QuackResult<ColumnsObject> {
        let columns = self.columns().await?;
        Ok(key_columns(&self.deduplicated_column_names(), columns))
    }

    /// Fetch every remaining row and pass each value through `converter`.
    pub async fn convert_rows<C: ValueConverter>(
        &mut self,
        converter: &C,
    ) -> QuackResult<Vec<Vec<C::Output>>> {
        let chunks = self.fetch_all_chunks().await?;
        convert_rows(&chunks, &self.types, converter)
    }

    /// Like [`QueryResult::convert_rows`], one `Vec` per column.
    pub async fn convert_columns<C: ValueConverter>(
        &mut self,
        converter: &C,
    ) -> QuackResult<Vec<Vec<C::Output>>> {
        let chunks = self.fetch_all_chunks().await?;
        convert_columns(&chunks, &self.types, converter)
    }

    /// Like [`QueryResult::convert_rows`], keyed by the deduplicated column names.
    pub async fn convert_row_objects<C: ValueConverter>(
        &mut self,
        converter: &C,
    ) -> QuackResult<Vec<RowObject<C::Output>>> {
        let rows = self.convert_rows(converter).await?;
        Ok(key_rows(&self.deduplicated_column_names(), rows))
    }

    /// Like [`QueryResult::convert_columns`], keyed by the deduplicated column names.
    pub async fn convert_columns_object<C: ValueConverter>(
        &mut self,
        converter: &C,
    ) -> QuackResult<ColumnsObject<C::Output>> {
        let columns = self.convert_columns(converter).await?;
        Ok(key_columns(&self.deduplicated_column_names(), columns))
    }

    /// The remaining chunks as a stream. An error ends the stream after it is yielded.
    pub fn into_stream(self) -> impl Stream<Item = QuackResult<DataChunk>> {
        stream::unfold(Some(self), |result| async move {
            let mut result = result?;
            match result.fetch_chunk().await {
                Ok(Some(chunk)) => Some((Ok(chunk), Some(result))),
                Ok(None) => None,
                Err(err) => Some((Err(err), None)),
            }
        })
    }
}

impl StatementType {
    fn name(self) -> &'static str {
        match self {
            StatementType::Select => "select",
            StatementType::Insert => "insert",
            StatementType::Update => "update",
            StatementType::Delete => "delete",
            StatementType::Create => "create",
            StatementType::Multi => "multi",
            _ => "other",
        }
    }
}

fn deduplicate(names: &[String]) -> Vec<String> {
    let mut taken: HashSet<String> = names.iter().cloned().collect();
    let mut seen: HashMap<&str, usize> = HashMap::new();
    names
        .iter()
        .map(|name| {
            let next = seen.entry(name.as_str()).or_default();
            *next += 1;
            if *next == 1 {
                return name.clone();
            }
            loop {
                let candidate = format!("{}:{}", name, *next - 1);
                if taken.insert(candidate.clone()) {
                    return candidate;
                }
                *next += 1;
            }
        })
        .collect()
}

impl Debug for QueryResult {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryResult")
            .field("columns", &self.names)
            .field("types", &format_args!("[{}]", self.types.iter().format(", ")))
            .field("statement_type", &self.statement_type)
            .field("streaming", &self.streaming)
            .field("done", &self.done)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use futures::TryStreamExt;
    use quack_error::QuackError;
    use serde_json::json;
    use rstest::rstest;

    use super::*;
    use crate::{Database, JsonConverter};

    #[rstest]
    #[case(&["a", "b"], &["a", "b"])]
    #[case(&["a", "a", "a"], &["a", "a:1", "a:2"])]
    // Suffixes skip names that are already taken, so every key stays unique.
    #[case(&["a", "a", "a:1"], &["a", "a:2", "a:1"])]
    #[case(&["x", "y", "x", "y"], &["x", "y", "x:1", "y:1"])]
    fn deduplicates(#[case] names: &[&str], #[case] expected: &[&str]) {
        let names: Vec<String> = names.iter().map(|s| s.to_string()).collect();
        assert_eq!(deduplicate(&names), expected);
    }

    #[tokio::test]
    async fn metadata() {
        let conn = Database::open_in_memory().await.unwrap().connect().await.unwrap();
        let result = conn
            .run("select 1 as a, 'x' as a, [1.5]::double[] as c")
            .await
            .unwrap();
        assert_eq!(result.column_count(), 3);
        assert_eq!(result.column_names(), ["a", "a", "c"]);
        assert_eq!(result.deduplicated_column_names(), ["a", "a:1", "c"]);
        assert_eq!(
            result.column_types(),
            [
                LogicalType::Integer,
                LogicalType::Varchar,
                LogicalType::list(LogicalType::Double)
            ]
        );
        assert_eq!(result.statement_type(), StatementType::Select);
        assert_eq!(result.result_type(), ResultType::QueryResult);
        assert!(!result.is_streaming());
        assert!(matches!(result.column_name(3), Err(QuackError::OutOfBounds(3, 0, 3, _))));
    }

    #[tokio::test]
    async fn keyed_by_unique_names() {
        let conn = Database::open_in_memory().await.unwrap().connect().await.unwrap();
        let sql = "select i as a, i * 10 as a from range(3) t(i)";
        let rows = conn.run(sql).await.unwrap().row_objects().await.unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2]["a"], Value::BigInt(2));
        assert_eq!(rows[2]["a:1"], Value::BigInt(20));

        let columns = conn.run(sql).await.unwrap().columns_object().await.unwrap();
        assert_eq!(columns.len(), 2);
        assert_eq!(columns["a:1"], [Value::BigInt(0), Value::BigInt(10), Value::BigInt(20)]);
    }

    #[tokio::test]
    async fn converters_see_every_value() {
        let conn = Database::open_in_memory().await.unwrap().connect().await.unwrap();
        let sql = "select 1 as n, null::varchar as s, 12.5::decimal(4, 1) as d";
        let rows = conn
            .run(sql)
            .await
            .unwrap()
            .convert_rows(&JsonConverter)
            .await
            .unwrap();
        assert_eq!(rows, vec![vec![json!(1), json!(null), json!("12.5")]]);

        let type_names = |_: &Value, dtype: &LogicalType| -> QuackResult<String> {
            Ok(dtype.to_string())
        };
        let columns = conn
            .run(sql)
            .await
            .unwrap()
            .convert_columns_object(&type_names)
            .await
            .unwrap();
        assert_eq!(columns["s"], ["VARCHAR"]);

        let objects = conn
            .run(sql)
            .await
            .unwrap()
            .convert_row_objects(&JsonConverter)
            .await
            .unwrap();
        assert_eq!(objects[0]["n"], json!(1));

        let failing = |_: &Value, _: &LogicalType| -> QuackResult<()> {
            Err(quack_err!(UnsupportedType: "no conversion"))
        };
        assert!(matches!(
            conn.run(sql).await.unwrap().convert_columns(&failing).await,
            Err(QuackError::UnsupportedType(..))
        ));
    }

    #[tokio::test]
    async fn changed_rows() {
        let conn = Database::open_in_memory().await.unwrap().connect().await.unwrap();
        let create = conn.run("create table t(i integer)").await.unwrap();
        assert_eq!(create.statement_type(), StatementType::Create);
        assert_eq!(create.result_type(), ResultType::Nothing);
        let insert = conn.run("insert into t select * from range(10)").await.unwrap();
        assert_eq!(insert.statement_type(), StatementType::Insert);
        assert_eq!(insert.result_type(), ResultType::ChangedRows);
        assert_eq!(insert.rows_changed(), 10);
    }

    #[tokio::test]
    async fn chunks_end_with_none() {
        let conn = Database::open_in_memory().await.unwrap().connect().await.unwrap();
        let mut result = conn.run("select * from range(5000)").await.unwrap();
        let chunks = result.fetch_all_chunks().await.unwrap();
        assert!(chunks.iter().all(|c| c.row_count() > 0 && !c.is_writable()));
        assert_eq!(chunks.iter().map(DataChunk::row_count).sum::<usize>(), 5000);
        assert!(result.is_done());
        assert!(result.fetch_chunk().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn result_chunks_are_read_only() {
        let conn = Database::open_in_memory().await.unwrap().connect().await.unwrap();
        let mut result = conn.run("select 1").await.unwrap();
        let mut chunk = result.fetch_chunk().await.unwrap().unwrap();
        assert!(matches!(chunk.set_row_count(0), Err(QuackError::InvalidArgument(..))));
        assert!(matches!(chunk.column_mut(0), Err(QuackError::InvalidArgument(..))));
        assert_eq!(chunk.row_count(), 1);
    }

    #[tokio::test]
    async fn streams_chunks() {
        let conn = Database::open_in_memory().await.unwrap().connect().await.unwrap();
        let result = conn.stream("select i, i::varchar from range(5000) t(i)").await.unwrap();
        assert!(result.is_streaming());
        let chunks: Vec<DataChunk> = result.into_stream().try_collect().await.unwrap();
        assert_eq!(chunks.iter().map(DataChunk::row_count).sum::<usize>(), 5000);
        let last = chunks.last().unwrap();
        assert_eq!(
            last.rows().unwrap().last().unwrap(),
            &vec![Value::BigInt(4999), Value::from("4999")]
        );
    }

    #[tokio::test]
    async fn columns_materialize() {
        let conn = Database::open_in_memory().await.unwrap().connect().await.unwrap();
        let columns = conn
            .run("select i, i * 2 from range(3) t(i)")
            .await
            .unwrap()
            .columns()
            .await
            .unwrap();
        assert_eq!(
            columns,
            vec![
                vec![Value::BigInt(0), Value::BigInt(1), Value::BigInt(2)],
                vec![Value::BigInt(0), Value::BigInt(2), Value::BigInt(4)],
            ]
        );
    }
}
