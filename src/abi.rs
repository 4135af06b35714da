//! Purpose: C ABI bridge for bindings (libslicekit).
//! Exports: C-callable session functions plus the Rust-level backend
//! registry used by embedding crates.
//! Invariants: Every call returns an `i32` status; 0 is success, 1 is a
//! null session handle, all other codes map 1:1 with core error kinds.
//! Invariants: Returned strings are owned by the session handle and stay
//! valid until the next call on the same handle or `slk_session_free`.
#![allow(clippy::result_large_err)]
#![allow(non_camel_case_types)]

use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::path::Path;
use std::ptr;
use std::sync::OnceLock;

use crate::core::backend::Backend;
use crate::core::error::{to_status_code, Error, ErrorKind};
use crate::core::preset::PresetRequest;
use crate::core::session::Session;

pub const SLK_OK: i32 = 0;
pub const SLK_NULL_SESSION: i32 = 1;

type BackendFactory = Box<dyn Fn() -> Result<Backend, Error> + Send + Sync>;

static BACKEND: OnceLock<BackendFactory> = OnceLock::new();

/// Registers the factory `slk_session_new` uses to assemble sessions.
/// The first installation wins; returns `false` when a factory is
/// already installed.
pub fn install_backend<F>(factory: F) -> bool
where
    F: Fn() -> Result<Backend, Error> + Send + Sync + 'static,
{
    BACKEND.set(Box::new(factory)).is_ok()
}

#[repr(C)]
pub struct slk_session {
    session: Session,
    last_error: Option<CString>,
    statistics: Option<CString>,
    config: Option<CString>,
    preset_info: Option<CString>,
}

#[unsafe(no_mangle)]
pub extern "C" fn slk_session_new(out_session: *mut *mut slk_session) -> i32 {
    if out_session.is_null() {
        return to_status_code(ErrorKind::Usage);
    }
    let Some(factory) = BACKEND.get() else {
        return to_status_code(ErrorKind::Usage);
    };
    let backend = match factory() {
        Ok(backend) => backend,
        Err(err) => return to_status_code(err.kind()),
    };
    let handle = Box::new(slk_session {
        session: Session::new(backend),
        last_error: None,
        statistics: None,
        config: None,
        preset_info: None,
    });
    unsafe {
        *out_session = Box::into_raw(handle);
    }
    SLK_OK
}

#[unsafe(no_mangle)]
pub extern "C" fn slk_session_free(session: *mut slk_session) {
    if session.is_null() {
        return;
    }
    unsafe {
        drop(Box::from_raw(session));
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn slk_load_model(session: *mut slk_session, path: *const c_char) -> i32 {
    let handle = match borrow_session(session) {
        Ok(handle) => handle,
        Err(code) => return code,
    };
    let path = match parse_c_str(path, "path") {
        Ok(path) => path,
        Err(err) => return fail(handle, err),
    };
    match handle.session.load_model(Path::new(path)) {
        Ok(()) => fine(handle),
        Err(err) => fail(handle, err),
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn slk_resolve_presets(
    session: *mut slk_session,
    printer: *const c_char,
    filament: *const c_char,
    process: *const c_char,
) -> i32 {
    let handle = match borrow_session(session) {
        Ok(handle) => handle,
        Err(code) => return code,
    };
    let request = match build_request(printer, filament, process) {
        Ok(request) => request,
        Err(err) => return fail(handle, err),
    };
    match handle.session.resolve_presets(&request) {
        Ok(()) => fine(handle),
        Err(err) => fail(handle, err),
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn slk_set_config_option(
    session: *mut slk_session,
    key: *const c_char,
    value: *const c_char,
) -> i32 {
    let handle = match borrow_session(session) {
        Ok(handle) => handle,
        Err(code) => return code,
    };
    let key = match parse_c_str(key, "key") {
        Ok(key) => key.to_string(),
        Err(err) => return fail(handle, err),
    };
    let value = match parse_c_str(value, "value") {
        Ok(value) => value.to_string(),
        Err(err) => return fail(handle, err),
    };
    match handle.session.set_config_option(&key, &value) {
        Ok(()) => fine(handle),
        Err(err) => fail(handle, err),
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn slk_process(session: *mut slk_session) -> i32 {
    let handle = match borrow_session(session) {
        Ok(handle) => handle,
        Err(code) => return code,
    };
    match handle.session.process() {
        Ok(()) => fine(handle),
        Err(err) => fail(handle, err),
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn slk_export(session: *mut slk_session, path: *const c_char) -> i32 {
    let handle = match borrow_session(session) {
        Ok(handle) => handle,
        Err(code) => return code,
    };
    let path = match parse_c_str(path, "path") {
        Ok(path) => path.to_string(),
        Err(err) => return fail(handle, err),
    };
    match handle.session.export(Path::new(&path)) {
        Ok(_) => fine(handle),
        Err(err) => fail(handle, err),
    }
}

/// Writes a pointer to the pretty-printed statistics document into
/// `out_json`. The string belongs to the session handle.
#[unsafe(no_mangle)]
pub extern "C" fn slk_statistics(session: *mut slk_session, out_json: *mut *const c_char) -> i32 {
    fetch_string(
        session,
        out_json,
        |handle| &mut handle.statistics,
        |session| session.statistics().map(str::to_string),
    )
}

#[unsafe(no_mangle)]
pub extern "C" fn slk_resolved_config(
    session: *mut slk_session,
    out_json: *mut *const c_char,
) -> i32 {
    fetch_string(
        session,
        out_json,
        |handle| &mut handle.config,
        |session| session.resolved_config().map(str::to_string),
    )
}

#[unsafe(no_mangle)]
pub extern "C" fn slk_preset_info(session: *mut slk_session, out_json: *mut *const c_char) -> i32 {
    fetch_string(
        session,
        out_json,
        |handle| &mut handle.preset_info,
        |session| session.preset_info().map(str::to_string),
    )
}

/// The message of the most recent failure on this handle, or null when
/// the last call succeeded.
#[unsafe(no_mangle)]
pub extern "C" fn slk_last_error(session: *mut slk_session) -> *const c_char {
    let Ok(handle) = borrow_session(session) else {
        return ptr::null();
    };
    handle
        .last_error
        .as_ref()
        .map(|text| text.as_ptr())
        .unwrap_or(ptr::null())
}

#[unsafe(no_mangle)]
pub extern "C" fn slk_clear_error(session: *mut slk_session) {
    if let Ok(handle) = borrow_session(session) {
        handle.last_error = None;
        handle.session.clear_error();
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn slk_version() -> *const c_char {
    concat!(env!("CARGO_PKG_VERSION"), "\0").as_ptr() as *const c_char
}

fn fetch_string<F>(
    session: *mut slk_session,
    out_json: *mut *const c_char,
    slot: fn(&mut slk_session) -> &mut Option<CString>,
    fetch: F,
) -> i32
where
    F: FnOnce(&mut Session) -> Result<String, Error>,
{
    let handle = match borrow_session(session) {
        Ok(handle) => handle,
        Err(code) => return code,
    };
    if out_json.is_null() {
        return fail(
            handle,
            Error::new(ErrorKind::Usage).with_message("out_json is null"),
        );
    }
    let text = match fetch(&mut handle.session) {
        Ok(text) => text,
        Err(err) => return fail(handle, err),
    };
    let owned = to_c_string(&text);
    unsafe {
        *out_json = owned.as_ptr();
    }
    *slot(handle) = Some(owned);
    fine(handle)
}

fn borrow_session<'a>(session: *mut slk_session) -> Result<&'a mut slk_session, i32> {
    if session.is_null() {
        return Err(SLK_NULL_SESSION);
    }
    Ok(unsafe { &mut *session })
}

fn parse_c_str<'a>(ptr: *const c_char, what: &str) -> Result<&'a str, Error> {
    if ptr.is_null() {
        return Err(Error::new(ErrorKind::Usage).with_message(format!("{what} is null")));
    }
    unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .map_err(|_| Error::new(ErrorKind::Usage).with_message(format!("{what} is not valid UTF-8")))
}

fn build_request(
    printer: *const c_char,
    filament: *const c_char,
    process: *const c_char,
) -> Result<PresetRequest, Error> {
    let slot = |ptr: *const c_char, what: &str| -> Result<Option<String>, Error> {
        if ptr.is_null() {
            return Ok(None);
        }
        Ok(Some(parse_c_str(ptr, what)?.to_string()))
    };
    Ok(PresetRequest {
        printer: slot(printer, "printer")?,
        filament: slot(filament, "filament")?,
        process: slot(process, "process")?,
    })
}

fn fine(handle: &mut slk_session) -> i32 {
    handle.last_error = None;
    SLK_OK
}

fn fail(handle: &mut slk_session, err: Error) -> i32 {
    handle.last_error = Some(to_c_string(&err.to_string()));
    to_status_code(err.kind())
}

fn to_c_string(text: &str) -> CString {
    CString::new(text.replace('\0', " ")).unwrap_or_default()
}
