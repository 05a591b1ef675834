use std::ffi::c_char;
use std::ptr;
use std::sync::{Arc, OnceLock};

use duckdb::ffi::{self, duckdb_config, duckdb_database, duckdb_instance_cache};
use log::debug;
use quack_error::{QuackResult, quack_bail};

use crate::config::Config;
use crate::connection::Connection;
use crate::native::{borrowed_str, cstring, owned_str};
use crate::runtime;

const IN_MEMORY: &str = ":memory:";

/// A native database handle, closed on drop.
pub(crate) struct DatabaseHandle {
    ptr: duckdb_database,
}

// The engine synchronizes access to a database internally.
unsafe impl Send for DatabaseHandle {}
unsafe impl Sync for DatabaseHandle {}

impl DatabaseHandle {
    pub(crate) fn as_ptr(&self) -> duckdb_database {
        self.ptr
    }
}

impl Drop for DatabaseHandle {
    fn drop(&mut self) {
        unsafe { ffi::duckdb_close(&mut self.ptr) };
        debug!("closed database");
    }
}

/// An open database.
///
/// Cloning is cheap and shares the native handle, which is closed once the last clone and the last
/// connection made from it are dropped.
#[derive(Clone)]
pub struct Database {
    handle: Arc<DatabaseHandle>,
    path: Option<String>,
}

impl Database {
    /// Open the database file at `path`, creating it if needed, or an in-memory database when
    /// `path` is `None` or `":memory:"`.
    pub async fn open(path: Option<&str>, config: &Config) -> QuackResult<Self> {
        Self::open_with(path, config, "failed to open database", |path, out, config, error| {
            unsafe { ffi::duckdb_open_ext(path, out, config, error) }
        })
        .await
    }

    async fn open_with<F>(
        path: Option<&str>,
        config: &Config,
        fallback: &'static str,
        open: F,
    ) -> QuackResult<Self>
    where
        F: FnOnce(
                *const c_char,
                *mut duckdb_database,
                duckdb_config,
                *mut *mut c_char,
            ) -> ffi::duckdb_state
            + Send
            + 'static,
    {
        let path = path.filter(|p| *p != IN_MEMORY).map(str::to_string);
        let c_path = path.as_deref().map(cstring).transpose()?;
        let config = config.clone();
        let handle = runtime::blocking(move || {
            let native = config.to_native()?;
            let mut ptr = ptr::null_mut();
            let mut error: *mut c_char = ptr::null_mut();
            let state = open(
                c_path.as_ref().map_or(ptr::null(), |p| p.as_ptr()),
                &mut ptr,
                native.as_ptr(),
                &mut error,
            );
            let message = unsafe { owned_str(error) };
            if state != ffi::DuckDBSuccess {
                let message = message.unwrap_or_else(|| fallback.to_string());
                quack_bail!(Native: "{}", message);
            }
            Ok(DatabaseHandle { ptr })
        })
        .await?;
        debug!("opened database {}", path.as_deref().unwrap_or(IN_MEMORY));
        Ok(Self {
            handle: Arc::new(handle),
            path,
        })
    }

    /// Open a fresh in-memory database with default options.
    pub async fn open_in_memory() -> QuackResult<Self> {
        Self::open(None, &Config::default()).await
    }

    /// The file backing this database, or `None` when it lives in memory.
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Open a new connection.
    pub async fn connect(&self) -> QuackResult<Connection> {
        Connection::open(Arc::clone(&self.handle)).await
    }
}

/// A native instance cache, destroyed on drop. Databases taken from it stay open on their own.
struct InstanceCacheHandle {
    ptr: duckdb_instance_cache,
}

// The engine locks the cache internally.
unsafe impl Send for InstanceCacheHandle {}
unsafe impl Sync for InstanceCacheHandle {}

impl Drop for InstanceCacheHandle {
    fn drop(&mut self) {
        unsafe { ffi::duckdb_destroy_instance_cache(&mut self.ptr) };
    }
}

static GLOBAL_CACHE: OnceLock<InstanceCache> = OnceLock::new();

/// Hands out one shared database per file.
///
/// Opening the same path twice through one cache yields handles to the same engine instance, so
/// the file is never opened twice by this process. The instance is closed when its last handle is
/// dropped. Opening an instance that is already live with a different configuration fails.
#[derive(Clone)]
pub struct InstanceCache {
    handle: Arc<InstanceCacheHandle>,
}

impl InstanceCache {
    /// Create an empty cache.
    pub fn try_new() -> QuackResult<Self> {
        let ptr = unsafe { ffi::duckdb_create_instance_cache() };
        if ptr.is_null() {
            quack_bail!(Native: "failed to create instance cache");
        }
        Ok(Self {
            handle: Arc::new(InstanceCacheHandle { ptr }),
        })
    }

    /// The process-wide cache, created on first use.
    pub fn global() -> QuackResult<Self> {
        if let Some(cache) = GLOBAL_CACHE.get() {
            return Ok(cache.clone());
        }
        let cache = Self::try_new()?;
        Ok(GLOBAL_CACHE.get_or_init(|| cache).clone())
    }

    /// The live database for `path`, opening it with `config` if there is none.
    pub async fn get_or_create(
        &self,
        path: Option<&str>,
        config: &Config,
    ) -> QuackResult<Database> {
        let cache = Arc::clone(&self.handle);
        Database::open_with(
            path,
            config,
            "failed to get or create database from cache",
            move |path, out, config, error| unsafe {
                ffi::duckdb_get_or_create_from_cache(cache.ptr, path, out, config, error)
            },
        )
        .await
    }
}

/// Version string of the linked engine.
pub fn library_version() -> String {
    unsafe { borrowed_str(ffi::duckdb_library_version()) }.unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use quack_error::QuackError;
    use quack_scalar::Value;

    use super::*;

    #[tokio::test]
    async fn memory_aliases() {
        let db = Database::open(Some(IN_MEMORY), &Config::default()).await.unwrap();
        assert_eq!(db.path(), None);
        let db = Database::open_in_memory().await.unwrap();
        assert_eq!(db.path(), None);
    }

    #[tokio::test]
    async fn file_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("persist.db");
        let path = path.to_str().unwrap();
        {
            let db = Database::open(Some(path), &Config::default()).await.unwrap();
            let conn = db.connect().await.unwrap();
            conn.run("create table t as select 42 as answer").await.unwrap();
        }
        let db = Database::open(Some(path), &Config::default().threads(1))
            .await
            .unwrap();
        assert_eq!(db.path(), Some(path));
        let conn = db.connect().await.unwrap();
        let rows = conn.run("select answer from t").await.unwrap().rows().await.unwrap();
        assert_eq!(rows, vec![vec![Value::Integer(42)]]);
    }

    #[tokio::test]
    async fn api_name_reaches_engine() {
        let db = Database::open(None, &Config::default().set("duckdb_api", "quack-test"))
            .await
            .unwrap();
        let conn = db.connect().await.unwrap();
        let rows = conn
            .run("select current_setting('duckdb_api')")
            .await
            .unwrap()
            .rows()
            .await
            .unwrap();
        assert_eq!(rows, vec![vec![Value::from("quack-test")]]);
    }

    #[tokio::test]
    async fn unknown_option_fails_open() {
        let err = Database::open(None, &Config::default().set("no_such_option", "1"))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, QuackError::Native(..)));
        assert!(err.message().contains("no_such_option"));
    }

    #[tokio::test]
    async fn read_only_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.db");
        let config = Config::default().access_mode(crate::AccessMode::ReadOnly);
        let err = Database::open(path.to_str(), &config).await.err().unwrap();
        assert!(matches!(err, QuackError::Native(..)));
    }

    #[tokio::test]
    async fn cache_shares_one_instance_per_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cached.db");
        let path = path.to_str().unwrap();
        let cache = InstanceCache::try_new().unwrap();

        let first = cache.get_or_create(Some(path), &Config::default()).await.unwrap();
        first
            .connect()
            .await
            .unwrap()
            .run("create table t as select 2 as two")
            .await
            .unwrap();

        let second = cache.get_or_create(Some(path), &Config::default()).await.unwrap();
        assert_eq!(second.path(), Some(path));
        let conn = second.connect().await.unwrap();
        let rows = conn.run("select two from t").await.unwrap().rows().await.unwrap();
        assert_eq!(rows, vec![vec![Value::Integer(2)]]);
    }

    #[test]
    fn global_cache_is_shared() {
        let first = InstanceCache::global().unwrap();
        let second = InstanceCache::global().unwrap();
        assert!(Arc::ptr_eq(&first.handle, &second.handle));
    }

    #[test]
    fn version_is_reported() {
        assert!(library_version().starts_with('v'));
    }
}
