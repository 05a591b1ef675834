use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::ptr;

use duckdb::ffi::{self, duckdb_config};
use log::debug;
use quack_error::{QuackResult, quack_bail, quack_err};

use crate::native::{borrowed_str, check_state, cstring};

/// The value reported to the engine as the client API name unless overridden.
pub const DEFAULT_API_NAME: &str = "quack-rs";

const API_OPTION: &str = "duckdb_api";

/// How a database file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AccessMode {
    /// Read-write, unless the file is already opened read-only elsewhere.
    #[default]
    Automatic,
    /// Reads only; several processes may open the file at once.
    ReadOnly,
    /// Reads and writes.
    ReadWrite,
}

impl Display for AccessMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            AccessMode::Automatic => "automatic",
            AccessMode::ReadOnly => "read_only",
            AccessMode::ReadWrite => "read_write",
        })
    }
}

/// Engine options applied when a [`Database`](crate::Database) is opened.
///
/// Options are kept as plain strings and only handed to the engine at open time, so building a
/// config never fails; invalid names or values surface from `Database::open`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    options: BTreeMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            options: BTreeMap::from([(API_OPTION.to_string(), DEFAULT_API_NAME.to_string())]),
        }
    }
}

impl Config {
    /// Set option `name` to `value`, replacing any earlier value.
    pub fn set(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(name.into(), value.into());
        self
    }

    /// Number of engine worker threads.
    pub fn threads(self, threads: usize) -> Self {
        self.set("threads", threads.to_string())
    }

    /// How to open the database file.
    pub fn access_mode(self, mode: AccessMode) -> Self {
        self.set("access_mode", mode.to_string())
    }

    /// Memory limit, in the engine's size syntax such as `"512MB"`.
    pub fn max_memory(self, limit: impl Into<String>) -> Self {
        self.set("max_memory", limit)
    }

    /// The value of option `name`, if set.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.options.get(name).map(String::as_str)
    }

    /// All options, ordered by name.
    pub fn options(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.options.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub(crate) fn to_native(&self) -> QuackResult<ConfigHandle> {
        let mut ptr = ptr::null_mut();
        check_state(unsafe { ffi::duckdb_create_config(&mut ptr) }, || {
            quack_err!(Native: "failed to create config")
        })?;
        let handle = ConfigHandle { ptr };
        for (name, value) in &self.options {
            let (c_name, c_value) = (cstring(name)?, cstring(value)?);
            check_state(
                unsafe { ffi::duckdb_set_config(handle.ptr, c_name.as_ptr(), c_value.as_ptr()) },
                || quack_err!(Native: "invalid configuration option {}={}", name, value),
            )?;
        }
        debug!("built config with {} options", self.options.len());
        Ok(handle)
    }
}

/// Name and description of every option the engine accepts.
pub fn available_options() -> QuackResult<Vec<(String, String)>> {
    let count = unsafe { ffi::duckdb_config_count() };
    (0..count)
        .map(|i| {
            let (mut name, mut description) = (ptr::null(), ptr::null());
            check_state(
                unsafe { ffi::duckdb_get_config_flag(i, &mut name, &mut description) },
                || quack_err!(OutOfBounds: i, 0, count),
            )?;
            let Some(name) = (unsafe { borrowed_str(name) }) else {
                quack_bail!(Native: "config option {} has no name", i);
            };
            Ok((name, unsafe { borrowed_str(description) }.unwrap_or_default()))
        })
        .collect()
}

/// A native config handle, destroyed on drop.
pub(crate) struct ConfigHandle {
    ptr: duckdb_config,
}

impl ConfigHandle {
    pub(crate) fn as_ptr(&self) -> duckdb_config {
        self.ptr
    }
}

impl Drop for ConfigHandle {
    fn drop(&mut self) {
        unsafe { ffi::duckdb_destroy_config(&mut self.ptr) };
    }
}
