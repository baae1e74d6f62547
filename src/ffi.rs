//! C ABI exports.
//!
//! Every function returns a NUL-terminated UTF-8 JSON string owned by this
//! library; the caller must release it with `FreeCString`. String arguments
//! may be null (read as empty) and need not be valid UTF-8 (decoded lossily).
//! No panic unwinds out of these functions.

#![allow(non_snake_case)]

use std::any::Any;
use std::borrow::Cow;
use std::ffi::{c_char, CStr, CString};
use std::panic::{self, AssertUnwindSafe};

use crate::dispatcher::{self, Bridge};
use crate::error::BridgeError;

/// Read a borrowed C string argument.
///
/// # Safety
///
/// `ptr` must be null or point to a NUL-terminated string that stays valid
/// for the duration of the call.
unsafe fn arg<'a>(ptr: *const c_char) -> Cow<'a, str> {
    if ptr.is_null() {
        Cow::Borrowed("")
    } else {
        CStr::from_ptr(ptr).to_string_lossy()
    }
}

fn into_raw(response: String) -> *mut c_char {
    // JSON escapes NUL, so this only strips bytes from a malformed response
    let c_string = CString::new(response).unwrap_or_else(|err| {
        let mut bytes = err.into_vec();
        bytes.retain(|&b| b != 0);
        CString::new(bytes).unwrap_or_default()
    });
    c_string.into_raw()
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Run `f` against the global bridge, converting every failure, panics
/// included, into an error envelope.
fn guarded<F>(f: F) -> *mut c_char
where
    F: FnOnce(&Bridge) -> String,
{
    let response = panic::catch_unwind(AssertUnwindSafe(|| match Bridge::global() {
        Ok(bridge) => f(bridge),
        Err(err) => dispatcher::error_envelope(&err),
    }))
    .unwrap_or_else(|payload| {
        dispatcher::error_envelope(&BridgeError::Panic(panic_message(payload.as_ref())))
    });
    into_raw(response)
}

/// Open a single connection: `{"handle": N}` or `{"error": msg}`.
///
/// # Safety
///
/// `conninfo` must be null or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn ConnectJSON(conninfo: *const c_char) -> *mut c_char {
    let url = arg(conninfo);
    guarded(|bridge| bridge.connect(&url))
}

/// Open a pool (max 10, min 1, 1-minute health check): `{"handle": N}` or
/// `{"error": msg}`.
///
/// # Safety
///
/// `conninfo` must be null or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn ConnectPool(conninfo: *const c_char) -> *mut c_char {
    let url = arg(conninfo);
    guarded(|bridge| bridge.connect_pool(&url))
}

/// Close a single connection: `{"ok": true}` or `{"error": msg}`.
#[no_mangle]
pub extern "C" fn CloseJSON(handle: u64) -> *mut c_char {
    guarded(|bridge| bridge.close(handle))
}

/// Close a pool: `{"ok": true}` or `{"error": msg}`.
#[no_mangle]
pub extern "C" fn ClosePool(handle: u64) -> *mut c_char {
    guarded(|bridge| bridge.close_pool(handle))
}

/// Run a query. Empty `params` sends `sql` verbatim; otherwise `params` is a
/// JSON array bound to `$1..$n`. `format` `"json"` yields objects, anything
/// else arrays.
///
/// # Safety
///
/// Each pointer must be null or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn Query(
    handle: u64,
    sql: *const c_char,
    params: *const c_char,
    format: *const c_char,
) -> *mut c_char {
    let (sql, params, format) = (arg(sql), arg(params), arg(format));
    guarded(|bridge| bridge.query(handle, &sql, &params, &format))
}

/// Run a statement: `{"rows_affected": N}` or `{"error": msg}`. `format` is
/// accepted for symmetry with `Query` and ignored.
///
/// # Safety
///
/// Each pointer must be null or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn Execute(
    handle: u64,
    sql: *const c_char,
    params: *const c_char,
    _format: *const c_char,
) -> *mut c_char {
    let (sql, params) = (arg(sql), arg(params));
    guarded(|bridge| bridge.execute(handle, &sql, &params))
}

/// Close every open session: `{"ok": true, "closed": N}`.
#[no_mangle]
pub extern "C" fn Shutdown() -> *mut c_char {
    guarded(|bridge| bridge.shutdown())
}

/// `{"version": "<version>"}`.
#[no_mangle]
pub extern "C" fn Version() -> *mut c_char {
    into_raw(dispatcher::version())
}

/// Release a string returned by any function above. Null is ignored.
///
/// # Safety
///
/// `ptr` must be null or a pointer returned by this library that has not
/// been freed yet.
#[no_mangle]
pub unsafe extern "C" fn FreeCString(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    unsafe fn take(ptr: *mut c_char) -> String {
        assert!(!ptr.is_null());
        let text = CStr::from_ptr(ptr).to_string_lossy().into_owned();
        FreeCString(ptr);
        text
    }

    #[test]
    fn test_version_round_trip() {
        let text = unsafe { take(Version()) };
        assert!(text.starts_with(r#"{"version":""#));
    }

    #[test]
    fn test_null_arguments_read_as_empty() {
        let text = unsafe { take(ConnectJSON(std::ptr::null())) };
        assert!(text.starts_with(r#"{"error":"#));

        let text = unsafe {
            take(Query(
                u64::MAX,
                std::ptr::null(),
                std::ptr::null(),
                std::ptr::null(),
            ))
        };
        assert_eq!(text, r#"{"error":"invalid handle"}"#);
    }

    #[test]
    fn test_non_utf8_argument_is_lossy() {
        let url = CString::new(vec![b'p', 0xff, b'q']).unwrap();
        let text = unsafe { take(ConnectPool(url.as_ptr())) };
        assert!(text.starts_with(r#"{"error":"#));
    }

    #[test]
    fn test_free_null_is_noop() {
        unsafe { FreeCString(std::ptr::null_mut()) };
    }

    #[test]
    fn test_panics_become_envelopes() {
        let text = unsafe { take(guarded(|_| panic!("boom"))) };
        assert_eq!(text, r#"{"error":"internal panic: boom"}"#);
    }

    #[test]
    fn test_interior_nul_is_stripped() {
        let text = unsafe { take(into_raw("a\0b".to_string())) };
        assert_eq!(text, "ab");
    }
}
