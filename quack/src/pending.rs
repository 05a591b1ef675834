use std::mem;
use std::sync::Arc;
use std::time::Duration;

use duckdb::ffi::{self, duckdb_pending_result, duckdb_result};
use log::trace;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use parking_lot::Mutex;
use quack_error::{QuackResult, quack_bail, quack_err};

use crate::connection::ConnectionHandle;
use crate::native::native_error;
use crate::result::{QueryResult, ResultHandle};
use crate::runtime;

/// How long to wait before retrying when the engine has no task to run.
const NO_TASKS_BACKOFF: Duration = Duration::from_millis(1);

/// The outcome of one execution step, numbered as in the engine's C API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u32)]
pub enum PendingState {
    /// The result can be materialized.
    ResultReady = 0,
    /// More tasks remain; retry after yielding.
    ResultNotReady = 1,
    /// Execution failed. [`PendingResult::run_task`] reports this as an error instead.
    Error = 2,
    /// Nothing can run right now; back off before retrying.
    NoTasksAvailable = 3,
}

/// A native pending result, destroyed on drop before the connection it came from is released.
pub(crate) struct PendingHandle {
    ptr: duckdb_pending_result,
    _connection: Arc<ConnectionHandle>,
}

// Steps on one pending result are serialized by the mutex that owns it.
unsafe impl Send for PendingHandle {}

impl PendingHandle {
    /// Take ownership of a pending result created by the engine, turning a failed one into an
    /// error.
    pub(crate) fn own(
        mut ptr: duckdb_pending_result,
        state: ffi::duckdb_state,
        connection: Arc<ConnectionHandle>,
    ) -> QuackResult<Self> {
        if state != ffi::DuckDBSuccess {
            let message = unsafe { ffi::duckdb_pending_error(ptr) };
            let err = unsafe { native_error(message, "failed to start execution") };
            unsafe { ffi::duckdb_destroy_pending(&mut ptr) };
            return Err(err);
        }
        Ok(Self {
            ptr,
            _connection: connection,
        })
    }
}

impl Drop for PendingHandle {
    fn drop(&mut self) {
        unsafe { ffi::duckdb_destroy_pending(&mut self.ptr) };
    }
}

/// A statement that has started executing but has no result yet.
///
/// Execution advances one bounded task at a time on the blocking pool. Steps take `&mut self`, so
/// two steps of the same execution never overlap; the handle mutex also keeps a step that outlived
/// its cancelled future from overlapping with the next one.
pub struct PendingResult {
    handle: Arc<Mutex<PendingHandle>>,
    connection: Arc<ConnectionHandle>,
    epoch: u64,
}

impl PendingResult {
    pub(crate) fn new(handle: PendingHandle, connection: Arc<ConnectionHandle>) -> Self {
        let epoch = connection.interrupt_epoch();
        Self {
            handle: Arc::new(Mutex::new(handle)),
            connection,
            epoch,
        }
    }

    /// Run one task.
    ///
    /// Fails with `Interrupted` once the connection has been interrupted after this execution
    /// started, and with `Native` when the engine reports an error.
    pub async fn run_task(&mut self) -> QuackResult<PendingState> {
        let handle = Arc::clone(&self.handle);
        let connection = Arc::clone(&self.connection);
        let epoch = self.epoch;
        runtime::blocking(move || {
            let pending = handle.lock();
            if connection.interrupt_epoch() != epoch {
                quack_bail!(Interrupted: "execution was interrupted");
            }
            let raw = unsafe { ffi::duckdb_pending_execute_task(pending.ptr) };
            let state = PendingState::try_from(raw)
                .map_err(|_| quack_err!(Native: "unknown pending state {}", raw))?;
            trace!("pending task finished in state {}", state.name());
            if state == PendingState::Error {
                if connection.interrupt_epoch() != epoch {
                    quack_bail!(Interrupted: "execution was interrupted");
                }
                return Err(unsafe {
                    native_error(ffi::duckdb_pending_error(pending.ptr), "execution failed")
                });
            }
            Ok(state)
        })
        .await
    }

    /// Run tasks until the result is ready, yielding between steps and backing off while the
    /// engine has nothing to run.
    pub async fn run_to_completion(&mut self) -> QuackResult<()> {
        loop {
            match self.run_task().await? {
                PendingState::ResultReady => return Ok(()),
                PendingState::ResultNotReady => tokio::task::yield_now().await,
                PendingState::NoTasksAvailable => tokio::time::sleep(NO_TASKS_BACKOFF).await,
                PendingState::Error => quack_bail!(Native: "execution failed"),
            }
        }
    }

    /// Turn a ready execution into its result. Runs any remaining work to completion first.
    pub async fn into_result(self) -> QuackResult<QueryResult> {
        let connection = Arc::clone(&self.connection);
        let handle = runtime::blocking(move || {
            let pending = self.handle.lock();
            let mut raw: duckdb_result = unsafe { mem::zeroed() };
            let state = unsafe { ffi::duckdb_execute_pending(pending.ptr, &mut raw) };
            ResultHandle::own(raw, state, connection)
        })
        .await?;
        QueryResult::try_new(handle)
    }

    /// Run to completion and return the result.
    pub async fn finish(mut self) -> QuackResult<QueryResult> {
        self.run_to_completion().await?;
        self.into_result().await
    }
}

impl PendingState {
    fn name(self) -> &'static str {
        match self {
            PendingState::ResultReady => "ready",
            PendingState::ResultNotReady => "not ready",
            PendingState::Error => "error",
            PendingState::NoTasksAvailable => "no tasks",
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use quack_error::QuackError;
    use quack_scalar::Value;

    use super::*;
    use crate::Database;

    const SLOW_QUERY: &str = "select count(*) from range(100000000) a, range(1000) b";

    #[tokio::test]
    async fn steps_until_ready() {
        let conn = Database::open_in_memory().await.unwrap().connect().await.unwrap();
        let mut pending = conn.start("select sum(i) from range(100000) t(i)").await.unwrap();
        let mut steps = 0;
        loop {
            steps += 1;
            match pending.run_task().await.unwrap() {
                PendingState::ResultReady => break,
                PendingState::ResultNotReady | PendingState::NoTasksAvailable => {}
                PendingState::Error => unreachable!(),
            }
        }
        assert!(steps >= 1);
        let rows = pending.into_result().await.unwrap().rows().await.unwrap();
        assert_eq!(rows, vec![vec![Value::HugeInt(4_999_950_000)]]);
    }

    #[tokio::test]
    async fn engine_errors_surface() {
        let conn = Database::open_in_memory().await.unwrap().connect().await.unwrap();
        let pending = conn
            .start("select ('a' || i)::integer from range(3) t(i)")
            .await
            .unwrap();
        let err = pending.finish().await.unwrap_err();
        assert!(matches!(err, QuackError::Native(..)));
        assert!(err.message().contains("a0"));
    }

    #[tokio::test]
    async fn interrupt_fails_next_step_and_connection_recovers() {
        let conn = Database::open_in_memory().await.unwrap().connect().await.unwrap();
        let mut pending = conn.start(SLOW_QUERY).await.unwrap();
        assert_ne!(pending.run_task().await.unwrap(), PendingState::ResultReady);
        conn.interrupt();
        let err = pending.run_task().await.unwrap_err();
        assert!(matches!(err, QuackError::Interrupted(..)));
        drop(pending);

        let rows = conn.run("select 42").await.unwrap().rows().await.unwrap();
        assert_eq!(rows, vec![vec![Value::Integer(42)]]);
    }

    #[tokio::test]
    async fn interrupt_is_per_connection() {
        let db = Database::open_in_memory().await.unwrap();
        let interrupted = db.connect().await.unwrap();
        let other = db.connect().await.unwrap();
        let mut slow = interrupted.start(SLOW_QUERY).await.unwrap();
        let pending = other.start("select 1 + 1").await.unwrap();
        interrupted.interrupt();
        assert!(matches!(slow.run_task().await, Err(QuackError::Interrupted(..))));
        let rows = pending.finish().await.unwrap().rows().await.unwrap();
        assert_eq!(rows, vec![vec![Value::Integer(2)]]);
    }

    #[tokio::test]
    async fn interrupt_before_start_does_not_apply() {
        let conn = Database::open_in_memory().await.unwrap().connect().await.unwrap();
        conn.interrupt();
        let rows = conn.run("select 7").await.unwrap().rows().await.unwrap();
        assert_eq!(rows, vec![vec![Value::Integer(7)]]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn steps_never_overlap() {
        let conn = Database::open_in_memory().await.unwrap().connect().await.unwrap();
        let mut pending = conn
            .start("select count(*) from range(3000000) t(i) where i % 7 = 0")
            .await
            .unwrap();
        let busy = Arc::new(AtomicBool::new(false));
        loop {
            assert!(!busy.swap(true, Ordering::SeqCst));
            let state = pending.run_task().await.unwrap();
            busy.store(false, Ordering::SeqCst);
            if state == PendingState::ResultReady {
                break;
            }
        }
        let rows = pending.into_result().await.unwrap().rows().await.unwrap();
        assert_eq!(rows, vec![vec![Value::BigInt(428_572)]]);
    }
}
