use std::ptr;
use std::sync::Arc;

use duckdb::ffi::{self, duckdb_extracted_statements};
use log::debug;
use parking_lot::Mutex;
use quack_error::{QuackResult, quack_bail};

use crate::connection::ConnectionHandle;
use crate::native::{cstring, from_idx, native_error, to_idx};
use crate::prepared::{PreparedHandle, PreparedStatement};
use crate::result::QueryResult;
use crate::runtime;

/// Native statements split out of one SQL string, destroyed on drop.
pub(crate) struct ExtractedHandle {
    ptr: duckdb_extracted_statements,
    _connection: Arc<ConnectionHandle>,
}

unsafe impl Send for ExtractedHandle {}

impl Drop for ExtractedHandle {
    fn drop(&mut self) {
        unsafe { ffi::duckdb_destroy_extracted(&mut self.ptr) };
    }
}

/// The statements of a SQL string, each of which can be prepared on its own.
pub struct ExtractedStatements {
    handle: Arc<Mutex<ExtractedHandle>>,
    connection: Arc<ConnectionHandle>,
    count: usize,
}

impl ExtractedStatements {
    /// Split `sql` into statements. An empty or unparsable string is an error.
    pub(crate) async fn extract(connection: Arc<ConnectionHandle>, sql: &str) -> QuackResult<Self> {
        let c_sql = cstring(sql)?;
        let conn = Arc::clone(&connection);
        let (handle, count) = runtime::blocking(move || {
            let mut ptr = ptr::null_mut();
            let count =
                unsafe { ffi::duckdb_extract_statements(conn.as_ptr(), c_sql.as_ptr(), &mut ptr) };
            // Owned from here on, so the native handle is released on the error path too.
            let handle = ExtractedHandle {
                ptr,
                _connection: conn,
            };
            if count == 0 {
                return Err(unsafe {
                    native_error(
                        ffi::duckdb_extract_statements_error(handle.ptr),
                        "failed to extract statements",
                    )
                });
            }
            Ok((handle, from_idx(count)))
        })
        .await?;
        debug!("extracted {count} statements");
        Ok(Self {
            handle: Arc::new(Mutex::new(handle)),
            connection,
            count,
        })
    }

    /// Number of statements.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Prepare statement `index` (0-based).
    pub async fn prepare(&self, index: usize) -> QuackResult<PreparedStatement> {
        if index >= self.count {
            quack_bail!(OutOfBounds: index, 0, self.count);
        }
        let handle = Arc::clone(&self.handle);
        let connection = Arc::clone(&self.connection);
        let prepared = runtime::blocking(move || {
            let extracted = handle.lock();
            let mut ptr = ptr::null_mut();
            let state = unsafe {
                ffi::duckdb_prepare_extracted_statement(
                    connection.as_ptr(),
                    extracted.ptr,
                    to_idx(index),
                    &mut ptr,
                )
            };
            PreparedHandle::own(ptr, state, connection)
        })
        .await?;
        Ok(PreparedStatement::new(prepared, Arc::clone(&self.connection)))
    }

    /// Run every statement but the last to completion, then prepare the last.
    pub(crate) async fn prepare_last(&self) -> QuackResult<PreparedStatement> {
        for index in 0..self.count - 1 {
            self.prepare(index).await?.run().await?;
        }
        self.prepare(self.count - 1).await
    }

    /// Run every statement in order and return the result of the last.
    pub async fn run_all(&self) -> QuackResult<QueryResult> {
        self.prepare_last().await?.run().await
    }
}

#[cfg(test)]
mod tests {
    use quack_error::QuackError;
    use quack_scalar::Value;

    use crate::Database;

    #[tokio::test]
    async fn splits_statements() {
        let conn = Database::open_in_memory().await.unwrap().connect().await.unwrap();
        let extracted = conn
            .extract_statements(
                "create table t(i integer); insert into t values (1), (2); select sum(i) from t",
            )
            .await
            .unwrap();
        assert_eq!(extracted.count(), 3);
        let rows = extracted.run_all().await.unwrap().rows().await.unwrap();
        assert_eq!(rows, vec![vec![Value::HugeInt(3)]]);
    }

    #[tokio::test]
    async fn empty_sql_fails() {
        let conn = Database::open_in_memory().await.unwrap().connect().await.unwrap();
        let err = conn.extract_statements("").await.err().unwrap();
        assert!(matches!(err, QuackError::Native(..)));
    }

    #[tokio::test]
    async fn parse_errors_carry_engine_message() {
        let conn = Database::open_in_memory().await.unwrap().connect().await.unwrap();
        let err = conn.extract_statements("selec 1").await.err().unwrap();
        assert!(matches!(err, QuackError::Native(..)));
        assert!(err.message().to_lowercase().contains("syntax"));
    }

    #[tokio::test]
    async fn prepare_out_of_range() {
        let conn = Database::open_in_memory().await.unwrap().connect().await.unwrap();
        let extracted = conn.extract_statements("select 1; select 2").await.unwrap();
        assert!(matches!(
            extracted.prepare(2).await,
            Err(QuackError::OutOfBounds(2, 0, 2, _))
        ));
        let rows = extracted.prepare(1).await.unwrap().run().await.unwrap().rows().await.unwrap();
        assert_eq!(rows, vec![vec![Value::Integer(2)]]);
    }
}
