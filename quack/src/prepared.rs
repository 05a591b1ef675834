use std::ffi::c_void;
use std::ptr;
use std::sync::Arc;

use duckdb::ffi::{self, duckdb_prepared_statement};
use log::debug;
use parking_lot::Mutex;
use paste::paste;
use quack_dtype::TypeId;
use quack_error::{QuackResult, quack_bail, quack_err};
use quack_scalar::{DecimalValue, Interval, TimeUnit, Timestamp, Value};

use crate::codec::{hugeint_from_i128, rescale, uhugeint_from_u128};
use crate::connection::ConnectionHandle;
use crate::native::{check_state, cstring, from_idx, native_error, owned_str, to_idx};
use crate::pending::{PendingHandle, PendingResult};
use crate::result::{QueryResult, StatementType};
use crate::runtime;

/// A native prepared statement, destroyed on drop before the connection it came from is released.
pub(crate) struct PreparedHandle {
    ptr: duckdb_prepared_statement,
    _connection: Arc<ConnectionHandle>,
}

// Calls on one statement are serialized by the mutex that owns it.
unsafe impl Send for PreparedHandle {}

impl PreparedHandle {
    /// Take ownership of a statement prepared by the engine, turning a failed one into an error.
    pub(crate) fn own(
        mut ptr: duckdb_prepared_statement,
        state: ffi::duckdb_state,
        connection: Arc<ConnectionHandle>,
    ) -> QuackResult<Self> {
        if state != ffi::DuckDBSuccess {
            let err = unsafe { native_error(ffi::duckdb_prepare_error(ptr), "failed to prepare") };
            unsafe { ffi::duckdb_destroy_prepare(&mut ptr) };
            return Err(err);
        }
        Ok(Self {
            ptr,
            _connection: connection,
        })
    }
}

impl Drop for PreparedHandle {
    fn drop(&mut self) {
        unsafe { ffi::duckdb_destroy_prepare(&mut self.ptr) };
    }
}

/// Generates `bind_<name>` for parameters the engine binds from a plain value.
macro_rules! bind_plain {
    ($($name:ident: $ty:ty),* $(,)?) => {
        paste! {
            $(
                #[doc = "Bind a `" $ty "` to parameter `index` (1-based)."]
                pub fn [<bind_ $name>](&self, index: usize, value: $ty) -> QuackResult<()> {
                    self.bind_with(index, stringify!($name), |ptr, idx| unsafe {
                        ffi::[<duckdb_bind_ $name>](ptr, idx, value)
                    })
                }
            )*
        }
    };
}

/// A statement parsed and planned once, runnable many times with different parameters.
///
/// Parameters are numbered from 1, as in the engine.
pub struct PreparedStatement {
    handle: Arc<Mutex<PreparedHandle>>,
    connection: Arc<ConnectionHandle>,
}

impl PreparedStatement {
    pub(crate) fn new(handle: PreparedHandle, connection: Arc<ConnectionHandle>) -> Self {
        Self {
            handle: Arc::new(Mutex::new(handle)),
            connection,
        }
    }

    fn ptr(&self) -> duckdb_prepared_statement {
        self.handle.lock().ptr
    }

    /// Number of parameters.
    pub fn parameter_count(&self) -> usize {
        from_idx(unsafe { ffi::duckdb_nparams(self.ptr()) })
    }

    fn check_index(&self, index: usize) -> QuackResult<ffi::idx_t> {
        let count = self.parameter_count();
        if index == 0 || index > count {
            quack_bail!(OutOfBounds: index, 1, count + 1);
        }
        Ok(to_idx(index))
    }

    /// Name of parameter `index`: the name of a `$name` parameter, the number otherwise.
    pub fn parameter_name(&self, index: usize) -> QuackResult<String> {
        let idx = self.check_index(index)?;
        unsafe { owned_str(ffi::duckdb_parameter_name(self.ptr(), idx)) }
            .ok_or_else(|| quack_err!(Native: "parameter {} has no name", index))
    }

    /// Type the engine inferred for parameter `index`, `Invalid` when it could not infer one.
    pub fn parameter_type_id(&self, index: usize) -> QuackResult<TypeId> {
        let idx = self.check_index(index)?;
        TypeId::from_raw(unsafe { ffi::duckdb_param_type(self.ptr(), idx) })
    }

    /// Index of the parameter called `name`.
    pub fn parameter_index(&self, name: &str) -> QuackResult<usize> {
        let c_name = cstring(name)?;
        let mut idx = 0;
        check_state(
            unsafe { ffi::duckdb_bind_parameter_index(self.ptr(), &mut idx, c_name.as_ptr()) },
            || quack_err!(InvalidArgument: "no parameter named {}", name),
        )?;
        Ok(from_idx(idx))
    }

    /// Kind of statement that was prepared.
    pub fn statement_type(&self) -> StatementType {
        StatementType::from_raw(unsafe { ffi::duckdb_prepared_statement_type(self.ptr()) })
    }

    fn bind_with(
        &self,
        index: usize,
        kind: &str,
        bind: impl FnOnce(duckdb_prepared_statement, ffi::idx_t) -> ffi::duckdb_state,
    ) -> QuackResult<()> {
        let idx = self.check_index(index)?;
        let handle = self.handle.lock();
        check_state(bind(handle.ptr, idx), || {
            quack_err!(Native: "failed to bind {} to parameter {}", kind, index)
        })
    }

    bind_plain!(
        boolean: bool,
        int8: i8,
        int16: i16,
        int32: i32,
        int64: i64,
        uint8: u8,
        uint16: u16,
        uint32: u32,
        uint64: u64,
        float: f32,
        double: f64,
    );

    /// Bind a `HUGEINT` to parameter `index` (1-based).
    pub fn bind_hugeint(&self, index: usize, value: i128) -> QuackResult<()> {
        self.bind_with(index, "hugeint", |ptr, idx| unsafe {
            ffi::duckdb_bind_hugeint(ptr, idx, hugeint_from_i128(value))
        })
    }

    /// Bind a `UHUGEINT` to parameter `index` (1-based).
    pub fn bind_uhugeint(&self, index: usize, value: u128) -> QuackResult<()> {
        self.bind_with(index, "uhugeint", |ptr, idx| unsafe {
            ffi::duckdb_bind_uhugeint(ptr, idx, uhugeint_from_u128(value))
        })
    }

    /// Bind a decimal, keeping its width and scale.
    pub fn bind_decimal(&self, index: usize, value: DecimalValue) -> QuackResult<()> {
        let decimal = ffi::duckdb_decimal {
            width: value.width(),
            scale: value.scale(),
            value: hugeint_from_i128(value.value()),
        };
        self.bind_with(index, "decimal", |ptr, idx| unsafe {
            ffi::duckdb_bind_decimal(ptr, idx, decimal)
        })
    }

    /// Bind a date as days since 1970-01-01.
    pub fn bind_date(&self, index: usize, days: i32) -> QuackResult<()> {
        self.bind_with(index, "date", |ptr, idx| unsafe {
            ffi::duckdb_bind_date(ptr, idx, ffi::duckdb_date { days })
        })
    }

    /// Bind a time of day as microseconds since midnight.
    pub fn bind_time(&self, index: usize, micros: i64) -> QuackResult<()> {
        self.bind_with(index, "time", |ptr, idx| unsafe {
            ffi::duckdb_bind_time(ptr, idx, ffi::duckdb_time { micros })
        })
    }

    /// Bind a timestamp as microseconds since the epoch.
    pub fn bind_timestamp(&self, index: usize, micros: i64) -> QuackResult<()> {
        self.bind_with(index, "timestamp", |ptr, idx| unsafe {
            ffi::duckdb_bind_timestamp(ptr, idx, ffi::duckdb_timestamp { micros })
        })
    }

    /// Bind a `TIMESTAMP WITH TIME ZONE` as microseconds since the epoch in UTC.
    pub fn bind_timestamp_tz(&self, index: usize, micros: i64) -> QuackResult<()> {
        self.bind_with(index, "timestamp with time zone", |ptr, idx| unsafe {
            ffi::duckdb_bind_timestamp_tz(ptr, idx, ffi::duckdb_timestamp { micros })
        })
    }

    /// Bind an interval to parameter `index`.
    pub fn bind_interval(&self, index: usize, value: Interval) -> QuackResult<()> {
        let interval = ffi::duckdb_interval {
            months: value.months,
            days: value.days,
            micros: value.micros,
        };
        self.bind_with(index, "interval", |ptr, idx| unsafe {
            ffi::duckdb_bind_interval(ptr, idx, interval)
        })
    }

    /// Bind a string to parameter `index`.
    pub fn bind_varchar(&self, index: usize, value: &str) -> QuackResult<()> {
        self.bind_with(index, "varchar", |ptr, idx| unsafe {
            ffi::duckdb_bind_varchar_length(ptr, idx, value.as_ptr().cast(), to_idx(value.len()))
        })
    }

    /// Bind bytes to parameter `index`.
    pub fn bind_blob(&self, index: usize, value: &[u8]) -> QuackResult<()> {
        let data: *const c_void = value.as_ptr().cast();
        self.bind_with(index, "blob", |ptr, idx| unsafe {
            ffi::duckdb_bind_blob(ptr, idx, data, to_idx(value.len()))
        })
    }

    /// Bind `NULL` to parameter `index`.
    pub fn bind_null(&self, index: usize) -> QuackResult<()> {
        self.bind_with(index, "null", |ptr, idx| unsafe { ffi::duckdb_bind_null(ptr, idx) })
    }

    /// Bind any value, choosing the binder from its variant.
    ///
    /// Variants without a native binder of their own are bound as their text form, which the
    /// engine casts to the parameter's type.
    pub fn bind(&self, index: usize, value: &Value) -> QuackResult<()> {
        match value {
            Value::Null => self.bind_null(index),
            Value::Boolean(v) => self.bind_boolean(index, *v),
            Value::TinyInt(v) => self.bind_int8(index, *v),
            Value::SmallInt(v) => self.bind_int16(index, *v),
            Value::Integer(v) => self.bind_int32(index, *v),
            Value::BigInt(v) => self.bind_int64(index, *v),
            Value::HugeInt(v) => self.bind_hugeint(index, *v),
            Value::UTinyInt(v) => self.bind_uint8(index, *v),
            Value::USmallInt(v) => self.bind_uint16(index, *v),
            Value::UInteger(v) => self.bind_uint32(index, *v),
            Value::UBigInt(v) => self.bind_uint64(index, *v),
            Value::UHugeInt(v) => self.bind_uhugeint(index, *v),
            Value::Float(v) => self.bind_float(index, *v),
            Value::Double(v) => self.bind_double(index, *v),
            Value::Decimal(v) => self.bind_decimal(index, *v),
            Value::Date(v) => self.bind_date(index, v.days()),
            Value::Time(v) => self.bind_time(index, v.micros()),
            Value::Timestamp(ts) if ts.unit() == TimeUnit::Microseconds => {
                self.bind_timestamp(index, ts.value())
            }
            Value::TimestampTz(ts) => self.bind_timestamp_tz(index, micros(*ts)?),
            Value::Interval(v) => self.bind_interval(index, *v),
            Value::Varchar(v) | Value::Enum(v) => self.bind_varchar(index, v),
            Value::Blob(v) => self.bind_blob(index, v),
            other => self.bind_varchar(index, &other.to_string()),
        }
    }

    /// Bind `values` to parameters 1 through `values.len()`.
    pub fn bind_all(&self, values: &[Value]) -> QuackResult<()> {
        if values.len() != self.parameter_count() {
            quack_bail!(
                InvalidArgument: "statement takes {} parameters, got {}",
                self.parameter_count(),
                values.len()
            );
        }
        values
            .iter()
            .enumerate()
            .try_for_each(|(i, value)| self.bind(i + 1, value))
    }

    /// Unbind every parameter.
    pub fn clear_bindings(&self) -> QuackResult<()> {
        check_state(unsafe { ffi::duckdb_clear_bindings(self.ptr()) }, || {
            quack_err!(Native: "failed to clear bindings")
        })
    }

    async fn pending(&self, streaming: bool) -> QuackResult<PendingResult> {
        let handle = Arc::clone(&self.handle);
        let connection = Arc::clone(&self.connection);
        let pending = runtime::blocking(move || {
            let statement = handle.lock();
            let mut ptr = ptr::null_mut();
            let state = if streaming {
                unsafe { ffi::duckdb_pending_prepared_streaming(statement.ptr, &mut ptr) }
            } else {
                unsafe { ffi::duckdb_pending_prepared(statement.ptr, &mut ptr) }
            };
            PendingHandle::own(ptr, state, connection)
        })
        .await?;
        debug!("started {} execution", if streaming { "streaming" } else { "materialized" });
        Ok(PendingResult::new(pending, Arc::clone(&self.connection)))
    }

    /// Start a materialized execution with the current bindings.
    pub async fn start(&self) -> QuackResult<PendingResult> {
        self.pending(false).await
    }

    /// Start an execution whose result is produced chunk by chunk as it is fetched.
    pub async fn start_streaming(&self) -> QuackResult<PendingResult> {
        self.pending(true).await
    }

    /// Run with the current bindings and return the materialized result.
    pub async fn run(&self) -> QuackResult<QueryResult> {
        self.start().await?.finish().await
    }

    /// Run with the current bindings and return a streaming result.
    pub async fn stream(&self) -> QuackResult<QueryResult> {
        self.start_streaming().await?.finish().await
    }
}

fn micros(ts: Timestamp) -> QuackResult<i64> {
    Ok(rescale(ts, TimeUnit::Microseconds)?.value())
}
