use std::ptr;
use std::sync::Arc;

use duckdb::ffi::{self, duckdb_appender};
use itertools::Itertools;
use log::{debug, trace, warn};
use parking_lot::Mutex;
use paste::paste;
use quack_dtype::LogicalType;
use quack_error::{ContextExt, QuackError, QuackResult, quack_bail};
use quack_scalar::{Date, DecimalValue, Interval, Time, Timestamp, Value};

use crate::chunk::DataChunk;
use crate::codec::{coerce, write};
use crate::connection::ConnectionHandle;
use crate::native::{check_state, cstring, native_error, to_idx};
use crate::runtime;
use crate::types::LogicalTypeHandle;

/// A native appender, destroyed on drop. Destroying flushes what the engine still buffers.
pub(crate) struct AppenderHandle {
    ptr: duckdb_appender,
    _connection: Arc<ConnectionHandle>,
}

unsafe impl Send for AppenderHandle {}

impl AppenderHandle {
    fn error(&self, fallback: &str) -> QuackError {
        unsafe { native_error(ffi::duckdb_appender_error(self.ptr), fallback) }
    }

    fn append_chunk(&self, chunk: &DataChunk) -> QuackResult<()> {
        check_state(
            unsafe { ffi::duckdb_append_data_chunk(self.ptr, chunk.as_ptr()) },
            || self.error("failed to append data chunk"),
        )
    }
}

impl Drop for AppenderHandle {
    fn drop(&mut self) {
        if unsafe { ffi::duckdb_appender_destroy(&mut self.ptr) } != ffi::DuckDBSuccess {
            warn!("failed to flush appender while destroying it");
        }
    }
}

/// A value waiting in the current row.
#[derive(Debug, Clone, PartialEq)]
enum Slot {
    Value(Value),
    /// The column's default, filled in by the engine.
    Default,
}

/// Generates `append_<name>` for values that map directly onto a [`Value`] variant.
macro_rules! append_plain {
    ($($name:ident: $ty:ty => $variant:ident),* $(,)?) => {
        paste! {
            $(
                #[doc = "Append a `" $ty "` to the current row."]
                pub fn [<append_ $name>](&mut self, value: $ty) -> QuackResult<()> {
                    self.append_value(Value::$variant(value))
                }
            )*
        }
    };
}

/// Row-by-row bulk insert into one table.
///
/// Values are collected per row and checked against the table's column types when the row ends,
/// so a row that fails is never partly written. Finished rows are buffered in a data chunk that is
/// handed to the engine whenever it fills up, on [`Appender::flush`] and on [`Appender::close`].
pub struct Appender {
    handle: Arc<Mutex<AppenderHandle>>,
    types: Vec<LogicalType>,
    chunk: DataChunk,
    row: Vec<Slot>,
    closed: bool,
}

impl Appender {
    pub(crate) async fn create(
        connection: Arc<ConnectionHandle>,
        table: &str,
        schema: Option<&str>,
        catalog: Option<&str>,
    ) -> QuackResult<Self> {
        let c_table = cstring(table)?;
        let c_schema = schema.map(cstring).transpose()?;
        let c_catalog = catalog.map(cstring).transpose()?;
        let (handle, types) = runtime::blocking(move || {
            let mut ptr = ptr::null_mut();
            let state = unsafe {
                ffi::duckdb_appender_create_ext(
                    connection.as_ptr(),
                    c_catalog.as_ref().map_or(ptr::null(), |c| c.as_ptr()),
                    c_schema.as_ref().map_or(ptr::null(), |s| s.as_ptr()),
                    c_table.as_ptr(),
                    &mut ptr,
                )
            };
            let handle = AppenderHandle {
                ptr,
                _connection: connection,
            };
            if state != ffi::DuckDBSuccess {
                return Err(handle.error("failed to create appender"));
            }
            let count = unsafe { ffi::duckdb_appender_column_count(handle.ptr) };
            let types: Vec<LogicalType> = (0..count)
                .map(|i| {
                    let dtype = unsafe { ffi::duckdb_appender_column_type(handle.ptr, i) };
                    unsafe { LogicalTypeHandle::own(dtype) }?.to_logical()
                })
                .try_collect()?;
            Ok((handle, types))
        })
        .await?;
        debug!("created appender for {} with {} columns", table, types.len());
        Ok(Self {
            handle: Arc::new(Mutex::new(handle)),
            chunk: DataChunk::try_new(&types)?,
            types,
            row: Vec::new(),
            closed: false,
        })
    }

    /// Number of columns in the table, and so of values in every row.
    pub fn column_count(&self) -> usize {
        self.types.len()
    }

    /// Types of the table's columns, in order.
    pub fn column_types(&self) -> &[LogicalType] {
        &self.types
    }

    fn check_open(&self) -> QuackResult<()> {
        if self.closed {
            quack_bail!(AppenderClosed: "appender is closed");
        }
        Ok(())
    }

    fn check_row_boundary(&self) -> QuackResult<()> {
        if !self.row.is_empty() {
            quack_bail!(
                ColumnCountMismatch: "row in progress has {} of {} values",
                self.row.len(),
                self.column_count()
            );
        }
        Ok(())
    }

    /// Append any value to the current row. It is converted to the column type when the row ends.
    pub fn append_value(&mut self, value: impl Into<Value>) -> QuackResult<()> {
        self.check_open()?;
        self.row.push(Slot::Value(value.into()));
        Ok(())
    }

    append_plain!(
        boolean: bool => Boolean,
        int8: i8 => TinyInt,
        int16: i16 => SmallInt,
        int32: i32 => Integer,
        int64: i64 => BigInt,
        hugeint: i128 => HugeInt,
        uint8: u8 => UTinyInt,
        uint16: u16 => USmallInt,
        uint32: u32 => UInteger,
        uint64: u64 => UBigInt,
        uhugeint: u128 => UHugeInt,
        float: f32 => Float,
        double: f64 => Double,
        decimal: DecimalValue => Decimal,
        date: Date => Date,
        time: Time => Time,
        timestamp: Timestamp => Timestamp,
        interval: Interval => Interval,
    );

    /// Append a string to the current row.
    pub fn append_varchar(&mut self, value: &str) -> QuackResult<()> {
        self.append_value(Value::Varchar(value.to_string()))
    }

    /// Append bytes to the current row.
    pub fn append_blob(&mut self, value: &[u8]) -> QuackResult<()> {
        self.append_value(Value::Blob(value.to_vec()))
    }

    /// Append `NULL` to the current row.
    pub fn append_null(&mut self) -> QuackResult<()> {
        self.append_value(Value::Null)
    }

    /// Append the column's default value, as `DEFAULT` would in an `INSERT`.
    pub fn append_default(&mut self) -> QuackResult<()> {
        self.check_open()?;
        self.row.push(Slot::Default);
        Ok(())
    }

    /// Finish the current row.
    ///
    /// The row must hold exactly one value per column, each convertible to its column's type.
    /// Otherwise the row is discarded and nothing of it reaches the table. If the buffer is full
    /// and the engine rejects it, the buffered rows are dropped, the error is returned and the row
    /// stays in progress so that it can be ended again.
    pub fn end_row(&mut self) -> QuackResult<()> {
        self.check_open()?;
        if self.row.len() != self.column_count() {
            let values = self.row.len();
            self.row.clear();
            quack_bail!(
                ColumnCountMismatch: "row has {} values for {} columns",
                values,
                self.column_count()
            );
        }
        let coerced = self
            .row
            .iter()
            .zip(&self.types)
            .map(|(slot, dtype)| match slot {
                Slot::Value(value) => coerce(dtype, value).map(Slot::Value),
                Slot::Default => Ok(Slot::Default),
            })
            .try_collect::<_, Vec<_>, _>();
        let row = match coerced {
            Ok(row) => row,
            Err(err) => {
                self.row.clear();
                return Err(err);
            }
        };

        if self.chunk.row_count() == self.chunk.capacity() {
            self.push_chunk()?;
        }
        self.row.clear();
        let index = self.chunk.row_count();
        self.chunk.set_row_count(index + 1)?;
        if let Err(err) = self.write_row(index, &row) {
            self.chunk.set_row_count(index)?;
            return Err(err);
        }
        Ok(())
    }

    fn write_row(&mut self, index: usize, row: &[Slot]) -> QuackResult<()> {
        for (column, slot) in row.iter().enumerate() {
            match slot {
                Slot::Value(value) => write(&mut self.chunk.column_mut(column)?, index, value)?,
                Slot::Default => {
                    let handle = self.handle.lock();
                    check_state(
                        unsafe {
                            ffi::duckdb_append_default_to_chunk(
                                handle.ptr,
                                self.chunk.as_ptr(),
                                to_idx(column),
                                to_idx(index),
                            )
                        },
                        || handle.error("failed to append default value"),
                    )?;
                }
            }
        }
        Ok(())
    }

    /// Hand the buffered rows to the engine and empty the buffer.
    ///
    /// The buffer is emptied even when the engine rejects it, so a failing chunk is reported once.
    fn push_chunk(&mut self) -> QuackResult<()> {
        let rows = self.chunk.row_count();
        if rows == 0 {
            return Ok(());
        }
        let pushed = self.handle.lock().append_chunk(&self.chunk);
        self.chunk.reset()?;
        pushed.with_context(|| format!("discarded {rows} buffered rows"))?;
        trace!("appended chunk of {} rows", rows);
        Ok(())
    }

    /// Append a whole chunk whose columns match the table's column types.
    ///
    /// Rows appended before are written first. No row may be in progress.
    pub fn append_data_chunk(&mut self, chunk: &DataChunk) -> QuackResult<()> {
        self.check_open()?;
        self.check_row_boundary()?;
        if chunk.column_count() != self.column_count() {
            quack_bail!(
                ColumnCountMismatch: "chunk has {} columns for {} in the table",
                chunk.column_count(),
                self.column_count()
            );
        }
        if let Some((index, (expected, actual))) = self
            .types
            .iter()
            .zip(chunk.column_types())
            .find_position(|(expected, actual)| expected != actual)
        {
            quack_bail!(
                TypeMismatch: "chunk column {} is {}, table column is {}",
                index,
                actual,
                expected
            );
        }
        self.push_chunk()?;
        self.handle.lock().append_chunk(chunk)
    }

    /// Write every finished row to the table.
    pub async fn flush(&mut self) -> QuackResult<()> {
        self.check_open()?;
        self.check_row_boundary()?;
        self.push_chunk()?;
        let handle = Arc::clone(&self.handle);
        runtime::blocking(move || {
            let appender = handle.lock();
            check_state(unsafe { ffi::duckdb_appender_flush(appender.ptr) }, || {
                appender.error("failed to flush appender")
            })
        })
        .await?;
        debug!("flushed appender");
        Ok(())
    }

    /// Flush and close. Every later operation fails with `AppenderClosed`.
    pub async fn close(&mut self) -> QuackResult<()> {
        self.check_open()?;
        self.check_row_boundary()?;
        self.push_chunk()?;
        self.closed = true;
        let handle = Arc::clone(&self.handle);
        runtime::blocking(move || {
            let appender = handle.lock();
            check_state(unsafe { ffi::duckdb_appender_close(appender.ptr) }, || {
                appender.error("failed to close appender")
            })
        })
        .await?;
        debug!("closed appender");
        Ok(())
    }
}

impl Drop for Appender {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        let rows = self.chunk.row_count();
        if let Err(err) = self.push_chunk() {
            warn!("dropped {} appended rows: {}", rows, err.message());
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::{Connection, Database, vector_size};

    async fn table(sql: &str) -> (Database, Connection) {
        let db = Database::open_in_memory().await.unwrap();
        let conn = db.connect().await.unwrap();
        conn.run(sql).await.unwrap();
        (db, conn)
    }

    async fn count(conn: &Connection) -> Value {
        conn.run("select count(*) from t").await.unwrap().rows().await.unwrap()[0][0].clone()
    }

    #[tokio::test]
    async fn appends_rows_then_counts() {
        let (_db, conn) = table("create table t(i integer)").await;
        let mut appender = conn.appender("t", None, None).await.unwrap();
        assert_eq!(appender.column_count(), 1);
        assert_eq!(appender.column_types(), [LogicalType::Integer]);
        for i in 0..=16 {
            appender.append_int32(i).unwrap();
            appender.end_row().unwrap();
        }
        appender.flush().await.unwrap();
        assert_eq!(count(&conn).await, Value::BigInt(17));
    }

    #[rstest]
    #[case::too_few(1)]
    #[case::too_many(3)]
    #[tokio::test]
    async fn wrong_arity_leaves_table_unchanged(#[case] values: i32) {
        let (_db, conn) = table("create table t(a integer, b integer)").await;
        let mut appender = conn.appender("t", None, None).await.unwrap();
        for v in 0..values {
            appender.append_int32(v).unwrap();
        }
        assert!(matches!(appender.end_row(), Err(QuackError::ColumnCountMismatch(..))));
        appender.flush().await.unwrap();
        assert_eq!(count(&conn).await, Value::BigInt(0));

        appender.append_int32(1).unwrap();
        appender.append_int32(2).unwrap();
        appender.end_row().unwrap();
        appender.close().await.unwrap();
        assert_eq!(count(&conn).await, Value::BigInt(1));
    }

    #[tokio::test]
    async fn unconvertible_value_rejects_whole_row() {
        let (_db, conn) = table("create table t(a integer, b tinyint)").await;
        let mut appender = conn.appender("t", None, None).await.unwrap();
        appender.append_int32(1).unwrap();
        appender.append_int32(1000).unwrap();
        assert!(matches!(appender.end_row(), Err(QuackError::TypeMismatch(..))));
        appender.append_int64(2).unwrap();
        appender.append_value(3i8).unwrap();
        appender.end_row().unwrap();
        appender.close().await.unwrap();
        let rows = conn.run("select * from t").await.unwrap().rows().await.unwrap();
        assert_eq!(rows, vec![vec![Value::Integer(2), Value::TinyInt(3)]]);
    }

    #[tokio::test]
    async fn closed_appender_fails() {
        let (_db, conn) = table("create table t(i integer)").await;
        let mut appender = conn.appender("t", None, None).await.unwrap();
        appender.append_int32(5).unwrap();
        appender.end_row().unwrap();
        appender.close().await.unwrap();
        assert_eq!(count(&conn).await, Value::BigInt(1));

        assert!(matches!(appender.append_int32(6), Err(QuackError::AppenderClosed(..))));
        assert!(matches!(appender.append_default(), Err(QuackError::AppenderClosed(..))));
        assert!(matches!(appender.end_row(), Err(QuackError::AppenderClosed(..))));
        assert!(matches!(appender.flush().await, Err(QuackError::AppenderClosed(..))));
        assert!(matches!(appender.close().await, Err(QuackError::AppenderClosed(..))));
    }

    #[tokio::test]
    async fn flush_needs_row_boundary() {
        let (_db, conn) = table("create table t(a integer, b integer)").await;
        let mut appender = conn.appender("t", None, None).await.unwrap();
        appender.append_int32(1).unwrap();
        assert!(matches!(appender.flush().await, Err(QuackError::ColumnCountMismatch(..))));
    }

    #[tokio::test]
    async fn defaults_come_from_the_table() {
        let (_db, conn) = table("create table t(i integer default 7, s varchar)").await;
        let mut appender = conn.appender("t", None, None).await.unwrap();
        appender.append_default().unwrap();
        appender.append_varchar("x").unwrap();
        appender.end_row().unwrap();
        appender.append_int32(1).unwrap();
        appender.append_null().unwrap();
        appender.end_row().unwrap();
        appender.close().await.unwrap();
        let rows = conn.run("select * from t order by i").await.unwrap().rows().await.unwrap();
        assert_eq!(
            rows,
            vec![
                vec![Value::Integer(1), Value::Null],
                vec![Value::Integer(7), Value::from("x")]
            ]
        );
    }

    #[tokio::test]
    async fn fills_several_chunks() {
        let (_db, conn) = table("create table t(i bigint, s varchar)").await;
        let mut appender = conn.appender("t", None, None).await.unwrap();
        let rows = 2 * vector_size() + 3;
        for i in 0..rows {
            appender.append_uint64(u64::try_from(i).unwrap()).unwrap();
            appender.append_varchar(&format!("row number {i}")).unwrap();
            appender.end_row().unwrap();
        }
        appender.flush().await.unwrap();
        let rows_read = conn
            .run("select count(*), max(s) from t where s = 'row number ' || i")
            .await
            .unwrap()
            .rows()
            .await
            .unwrap();
        assert_eq!(rows_read[0][0], Value::BigInt(i64::try_from(rows).unwrap()));
    }

    #[tokio::test]
    async fn nested_and_temporal_columns() {
        let (_db, conn) = table(
            "create table t(l integer[], s struct(a varchar, b double), d date, \
             m map(varchar, integer))",
        )
        .await;
        let mut appender = conn.appender("t", None, None).await.unwrap();
        let list = Value::List(vec![Value::Integer(1), Value::Null, Value::Integer(3)]);
        let strukt = Value::Struct(vec![
            ("a".into(), Value::from("a string longer than twelve")),
            ("b".into(), Value::Double(0.5)),
        ]);
        let map = Value::Map(vec![(Value::from("k"), Value::Integer(9))]);
        appender.append_value(list.clone()).unwrap();
        appender.append_value(strukt.clone()).unwrap();
        appender.append_date(Date::from_ymd(2024, 2, 29).unwrap()).unwrap();
        appender.append_value(map.clone()).unwrap();
        appender.end_row().unwrap();
        appender.close().await.unwrap();
        let rows = conn.run("select * from t").await.unwrap().rows().await.unwrap();
        assert_eq!(
            rows,
            vec![vec![list, strukt, Value::Date(Date::from_ymd(2024, 2, 29).unwrap()), map]]
        );
    }

    #[tokio::test]
    async fn appends_prebuilt_chunks_in_order() {
        let (_db, conn) = table("create table t(i integer, s varchar)").await;
        let mut appender = conn.appender("t", None, None).await.unwrap();
        appender.append_int32(0).unwrap();
        appender.append_varchar("buffered").unwrap();
        appender.end_row().unwrap();

        let mut chunk = DataChunk::try_new(appender.column_types()).unwrap();
        chunk
            .set_rows(&[
                vec![Value::Integer(1), Value::from("one")],
                vec![Value::Integer(2), Value::Null],
            ])
            .unwrap();
        appender.append_data_chunk(&chunk).unwrap();
        appender.flush().await.unwrap();

        let rows = conn.run("select * from t").await.unwrap().rows().await.unwrap();
        assert_eq!(
            rows,
            vec![
                vec![Value::Integer(0), Value::from("buffered")],
                vec![Value::Integer(1), Value::from("one")],
                vec![Value::Integer(2), Value::Null],
            ]
        );
    }

    #[tokio::test]
    async fn prebuilt_chunk_must_match_table() {
        let (_db, conn) = table("create table t(i integer, s varchar)").await;
        let mut appender = conn.appender("t", None, None).await.unwrap();
        let chunk = DataChunk::try_new(&[LogicalType::Integer]).unwrap();
        assert!(matches!(
            appender.append_data_chunk(&chunk),
            Err(QuackError::ColumnCountMismatch(..))
        ));
        let chunk = DataChunk::try_new(&[LogicalType::BigInt, LogicalType::Varchar]).unwrap();
        assert!(matches!(
            appender.append_data_chunk(&chunk),
            Err(QuackError::TypeMismatch(..))
        ));
        appender.append_int32(1).unwrap();
        let chunk = DataChunk::try_new(&[LogicalType::Integer, LogicalType::Varchar]).unwrap();
        assert!(matches!(
            appender.append_data_chunk(&chunk),
            Err(QuackError::ColumnCountMismatch(..))
        ));
    }

    #[tokio::test]
    async fn rejected_buffer_keeps_the_row_being_ended() {
        let (_db, conn) = table("create table t(i integer)").await;
        let mut appender = conn.appender("t", None, None).await.unwrap();
        // A full buffer the engine cannot take: it has one column too many.
        appender.chunk = DataChunk::try_new(&[LogicalType::Integer, LogicalType::Integer]).unwrap();
        let capacity = appender.chunk.capacity();
        appender.chunk.set_row_count(capacity).unwrap();

        appender.append_int32(7).unwrap();
        let err = appender.end_row().unwrap_err();
        assert!(matches!(err, QuackError::Context(..)));
        assert!(err.to_string().starts_with(&format!("discarded {capacity} buffered rows")));
        assert_eq!(appender.chunk.row_count(), 0);
        assert_eq!(appender.row, vec![Slot::Value(Value::Integer(7))]);

        appender.chunk = DataChunk::try_new(appender.column_types()).unwrap();
        appender.end_row().unwrap();
        appender.close().await.unwrap();
        let rows = conn.run("select i from t").await.unwrap().rows().await.unwrap();
        assert_eq!(rows, vec![vec![Value::Integer(7)]]);
    }

    #[tokio::test]
    async fn duplicate_key_across_chunks_is_reported() {
        let (_db, conn) = table("create table t(i integer primary key)").await;
        let mut appender = conn.appender("t", None, None).await.unwrap();
        let keys = (0..i32::try_from(vector_size()).unwrap()).chain([0]);
        let mut ended = Ok(());
        for key in keys {
            appender.append_int32(key).unwrap();
            ended = appender.end_row();
            if ended.is_err() {
                break;
            }
        }
        let err = match ended {
            Err(err) => err,
            Ok(()) => appender.flush().await.unwrap_err(),
        };
        assert!(err.message().to_lowercase().contains("constraint"));
        drop(appender);
        assert_eq!(count(&conn).await, Value::BigInt(0));
    }

    #[tokio::test]
    async fn missing_table_fails() {
        let (_db, conn) = table("create schema s").await;
        let err = conn.appender("nope", Some("s"), None).await.err().unwrap();
        assert!(matches!(err, QuackError::Native(..)));
        assert!(err.message().contains("nope"));
    }

    #[tokio::test]
    async fn drop_pushes_finished_rows() {
        let (_db, conn) = table("create schema s; create table s.t(i integer)").await;
        {
            let mut appender = conn.appender("t", Some("s"), Some("memory")).await.unwrap();
            appender.append_int32(1).unwrap();
            appender.end_row().unwrap();
        }
        let rows = conn.run("select count(*) from s.t").await.unwrap().rows().await.unwrap();
        assert_eq!(rows, vec![vec![Value::BigInt(1)]]);
    }
}
