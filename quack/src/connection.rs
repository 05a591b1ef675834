use std::ptr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use duckdb::ffi::{self, duckdb_connection};
use log::debug;
use quack_error::{QuackResult, quack_bail};
use quack_scalar::Value;

use crate::appender::Appender;
use crate::database::DatabaseHandle;
use crate::extracted::ExtractedStatements;
use crate::native::cstring;
use crate::pending::PendingResult;
use crate::prepared::{PreparedHandle, PreparedStatement};
use crate::reader::ResultReader;
use crate::result::QueryResult;
use crate::runtime;

/// A native connection, disconnected on drop once every handle made from it is gone.
pub(crate) struct ConnectionHandle {
    ptr: duckdb_connection,
    /// Bumped by every interrupt; executions started before a bump fail their next step.
    interrupts: AtomicU64,
    _database: Arc<DatabaseHandle>,
}

// Statements on one connection are ordered by the caller; the engine locks its own state.
unsafe impl Send for ConnectionHandle {}
unsafe impl Sync for ConnectionHandle {}

impl ConnectionHandle {
    pub(crate) fn as_ptr(&self) -> duckdb_connection {
        self.ptr
    }

    pub(crate) fn interrupt_epoch(&self) -> u64 {
        self.interrupts.load(Ordering::Acquire)
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        unsafe { ffi::duckdb_disconnect(&mut self.ptr) };
        debug!("disconnected");
    }
}

/// Progress of the query currently running on a connection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryProgress {
    /// Percent complete, or `-1.0` when nothing is running.
    pub percentage: f64,
    pub rows_processed: u64,
    pub total_rows_to_process: u64,
}

/// A connection to a [`crate::Database`].
///
/// Statements are run in the order the caller awaits them. Results, pending executions, prepared
/// statements and appenders keep the connection alive until they are dropped.
pub struct Connection {
    handle: Arc<ConnectionHandle>,
}

impl Connection {
    pub(crate) async fn open(database: Arc<DatabaseHandle>) -> QuackResult<Self> {
        let handle = runtime::blocking(move || {
            let mut ptr = ptr::null_mut();
            let state = unsafe { ffi::duckdb_connect(database.as_ptr(), &mut ptr) };
            if state != ffi::DuckDBSuccess {
                quack_bail!(Native: "failed to connect");
            }
            Ok(ConnectionHandle {
                ptr,
                interrupts: AtomicU64::new(0),
                _database: database,
            })
        })
        .await?;
        debug!("connected");
        Ok(Self {
            handle: Arc::new(handle),
        })
    }

    /// Split `sql` into statements without running them.
    pub async fn extract_statements(&self, sql: &str) -> QuackResult<ExtractedStatements> {
        ExtractedStatements::extract(Arc::clone(&self.handle), sql).await
    }

    /// Prepare a single statement.
    pub async fn prepare(&self, sql: &str) -> QuackResult<PreparedStatement> {
        let c_sql = cstring(sql)?;
        let connection = Arc::clone(&self.handle);
        let handle = runtime::blocking(move || {
            let mut ptr = ptr::null_mut();
            let state =
                unsafe { ffi::duckdb_prepare(connection.as_ptr(), c_sql.as_ptr(), &mut ptr) };
            PreparedHandle::own(ptr, state, connection)
        })
        .await?;
        Ok(PreparedStatement::new(handle, Arc::clone(&self.handle)))
    }

    /// Run every statement in `sql` but the last, then prepare the last one with `values` bound.
    async fn prepare_last(&self, sql: &str, values: &[Value]) -> QuackResult<PreparedStatement> {
        let prepared = self.extract_statements(sql).await?.prepare_last().await?;
        if !values.is_empty() {
            prepared.bind_all(values)?;
        }
        Ok(prepared)
    }

    /// Run every statement in `sql` and return the materialized result of the last one.
    pub async fn run(&self, sql: &str) -> QuackResult<QueryResult> {
        self.prepare_last(sql, &[]).await?.run().await
    }

    /// Like [`Connection::run`], binding `values` to the last statement's parameters.
    pub async fn run_with(&self, sql: &str, values: &[Value]) -> QuackResult<QueryResult> {
        self.prepare_last(sql, values).await?.run().await
    }

    /// Run `sql` and read its whole result.
    pub async fn run_and_read_all(&self, sql: &str) -> QuackResult<ResultReader> {
        let mut reader = ResultReader::new(self.run(sql).await?);
        reader.read_all().await?;
        Ok(reader)
    }

    /// Run every statement in `sql`, returning a result for the last one that produces its chunks
    /// as they are fetched.
    pub async fn stream(&self, sql: &str) -> QuackResult<QueryResult> {
        self.prepare_last(sql, &[]).await?.stream().await
    }

    /// Like [`Connection::stream`], binding `values` to the last statement's parameters.
    pub async fn stream_with(&self, sql: &str, values: &[Value]) -> QuackResult<QueryResult> {
        self.prepare_last(sql, values).await?.stream().await
    }

    /// Stream `sql` and read at least `target_rows` rows of its result, or all of them if fewer.
    pub async fn stream_and_read_until(
        &self,
        sql: &str,
        target_rows: usize,
    ) -> QuackResult<ResultReader> {
        let mut reader = ResultReader::new(self.stream(sql).await?);
        reader.read_until(target_rows).await?;
        Ok(reader)
    }

    /// Start executing the last statement of `sql` after running the others, without waiting for
    /// it to finish.
    pub async fn start(&self, sql: &str) -> QuackResult<PendingResult> {
        self.prepare_last(sql, &[]).await?.start().await
    }

    /// Like [`Connection::start`], for a result produced chunk by chunk.
    pub async fn start_streaming(&self, sql: &str) -> QuackResult<PendingResult> {
        self.prepare_last(sql, &[]).await?.start_streaming().await
    }

    /// Create an appender for `table`, in `schema` and `catalog` when given.
    pub async fn appender(
        &self,
        table: &str,
        schema: Option<&str>,
        catalog: Option<&str>,
    ) -> QuackResult<Appender> {
        Appender::create(Arc::clone(&self.handle), table, schema, catalog).await
    }

    /// Ask the engine to stop the query running on this connection.
    ///
    /// Executions already started on this connection fail their next step with `Interrupted`.
    /// Other connections are unaffected, and statements started afterwards run normally.
    pub fn interrupt(&self) {
        self.handle.interrupts.fetch_add(1, Ordering::AcqRel);
        unsafe { ffi::duckdb_interrupt(self.handle.as_ptr()) };
        debug!("interrupted connection");
    }

    /// Progress of the query running on this connection.
    pub fn progress(&self) -> QueryProgress {
        let progress = unsafe { ffi::duckdb_query_progress(self.handle.as_ptr()) };
        QueryProgress {
            percentage: progress.percentage,
            rows_processed: progress.rows_processed,
            total_rows_to_process: progress.total_rows_to_process,
        }
    }
}
