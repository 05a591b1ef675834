//! Async bindings to DuckDB.
//!
//! Query results arrive as [`DataChunk`]s whose columns are read and written through [`Vector`]s,
//! which decode every engine type into a [`Value`]. Statements run step by step on the blocking
//! pool through a [`PendingResult`], so awaiting a query never stalls the async runtime, and an
//! [`Appender`] bulk-loads rows into a table.
//!
//! ```no_run
//! # async fn example() -> quack::QuackResult<()> {
//! let db = quack::Database::open_in_memory().await?;
//! let conn = db.connect().await?;
//! conn.run("create table t(i integer)").await?;
//! let mut appender = conn.appender("t", None, None).await?;
//! for i in 0..10 {
//!     appender.append_int32(i)?;
//!     appender.end_row()?;
//! }
//! appender.close().await?;
//! let rows = conn.run("select sum(i) from t").await?.rows().await?;
//! # Ok(())
//! # }
//! ```

pub use appender::Appender;
pub use chunk::{DataChunk, vector_size};
pub use codec::coerce;
pub use config::{AccessMode, Config, DEFAULT_API_NAME, available_options};
pub use connection::{Connection, QueryProgress};
pub use convert::{ColumnsObject, JsonConverter, RowObject, ValueConverter};
pub use database::{Database, InstanceCache, library_version};
pub use extracted::ExtractedStatements;
pub use pending::{PendingResult, PendingState};
pub use prepared::PreparedStatement;
pub use quack_dtype::{DecimalType, EnumType, FieldName, LogicalType, StructFields, TypeId};
pub use quack_error::{QuackError, QuackResult};
pub use quack_scalar::{
    BitValue, Date, DecimalValue, Interval, Time, TimeTz, TimeUnit, Timestamp, Value, VarInt,
};
pub use quack_validity::{Validity, ValidityMut};
pub use reader::ResultReader;
pub use result::{QueryResult, ResultType, StatementType};
pub use vector::Vector;

mod appender;
mod chunk;
mod codec;
mod config;
mod connection;
mod convert;
mod database;
mod extracted;
pub mod logging;
mod native;
mod pending;
mod prepared;
mod raw;
mod reader;
mod result;
mod runtime;
mod types;
mod vector;
