//! Small helpers shared by every wrapper around a native handle.

use std::ffi::{CStr, CString, c_char};

use duckdb::ffi::{self, idx_t};
use quack_error::{QuackError, QuackResult, quack_err};

#[inline]
pub(crate) fn to_idx(n: usize) -> idx_t {
    n as idx_t
}

#[inline]
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn from_idx(n: idx_t) -> usize {
    n as usize
}

pub(crate) fn cstring(s: &str) -> QuackResult<CString> {
    Ok(CString::new(s)?)
}

/// Copy a string the engine keeps ownership of.
///
/// # Safety
///
/// `ptr` must be null or point to a NUL-terminated string.
pub(crate) unsafe fn borrowed_str(ptr: *const c_char) -> Option<String> {
    (!ptr.is_null()).then(|| unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned())
}

/// Copy a string the engine allocated for the caller, then free it.
///
/// # Safety
///
/// `ptr` must be null or a NUL-terminated string allocated by the engine and not yet freed.
pub(crate) unsafe fn owned_str(ptr: *const c_char) -> Option<String> {
    let value = unsafe { borrowed_str(ptr) };
    if !ptr.is_null() {
        unsafe { ffi::duckdb_free(ptr.cast_mut().cast()) };
    }
    value
}

/// A `Native` error carrying the engine's message, or `fallback` when there is none.
///
/// # Safety
///
/// See [`borrowed_str`].
pub(crate) unsafe fn native_error(message: *const c_char, fallback: &str) -> QuackError {
    match unsafe { borrowed_str(message) } {
        Some(message) if !message.is_empty() => quack_err!(Native: "{}", message),
        _ => quack_err!(Native: "{}", fallback),
    }
}

pub(crate) fn check_state(
    state: ffi::duckdb_state,
    on_error: impl FnOnce() -> QuackError,
) -> QuackResult<()> {
    if state == ffi::DuckDBSuccess {
        Ok(())
    } else {
        Err(on_error())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_strings() {
        assert_eq!(unsafe { borrowed_str(std::ptr::null()) }, None);
        assert_eq!(unsafe { owned_str(std::ptr::null()) }, None);
        let err = unsafe { native_error(std::ptr::null(), "failed to connect") };
        assert_eq!(err.message(), "failed to connect");
    }

    #[test]
    fn engine_message_wins() {
        let message = CString::new("Parser Error: syntax error").unwrap();
        let err = unsafe { native_error(message.as_ptr(), "failed to prepare") };
        assert!(matches!(err, QuackError::Native(..)));
        assert_eq!(err.message(), "Parser Error: syntax error");
    }

    #[test]
    fn interior_nul() {
        assert!(matches!(cstring("a\0b"), Err(QuackError::InvalidArgument(..))));
    }
}
