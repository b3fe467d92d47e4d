//! FFI bindings for delivery-eta
//!
//! C-compatible entry points for hosts written in other languages. All strings
//! are null-terminated; returned strings are heap-allocated and must be
//! released with `eta_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;
use std::sync::Arc;

use crate::error::EtaError;
use crate::model::LinearRegressor;
use crate::pipeline::{parse_inputs, predict_json, EtaProcessor};
use crate::schema::ModelMetadata;

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// Join already-serialized JSON documents into a JSON array
fn vec_to_json_array(vec: Vec<String>) -> String {
    format!("[{}]", vec.join(","))
}

fn report_error(e: &EtaError) {
    set_last_error(&format!("{}: {}", e.kind(), e));
}

// ============================================================================
// Stateless API
// ============================================================================

/// Estimate delivery times for one order or an array of orders.
///
/// # Safety
/// - `input`, `metadata`, and `model` must be valid null-terminated C strings.
/// - Returns a JSON array of reports that must be freed with `eta_free_string`.
/// - Returns NULL on error; call `eta_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn eta_predict_json(
    input: *const c_char,
    metadata: *const c_char,
    model: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let (Some(input), Some(metadata), Some(model)) = (
        cstr_to_string(input),
        cstr_to_string(metadata),
        cstr_to_string(model),
    ) else {
        set_last_error("Invalid string pointer");
        return ptr::null_mut();
    };

    match predict_json(input, metadata, model) {
        Ok(reports) => string_to_cstr(&vec_to_json_array(reports)),
        Err(e) => {
            report_error(&e);
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Processor API
// ============================================================================

/// Opaque handle to an EtaProcessor
pub struct EtaProcessorHandle {
    processor: EtaProcessor,
}

/// Create a processor from metadata and linear model JSON.
///
/// # Safety
/// - `metadata` and `model` must be valid null-terminated C strings.
/// - Must be freed with `eta_processor_free`.
/// - Returns NULL on error; call `eta_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn eta_processor_new(
    metadata: *const c_char,
    model: *const c_char,
) -> *mut EtaProcessorHandle {
    clear_last_error();

    let (Some(metadata), Some(model)) = (cstr_to_string(metadata), cstr_to_string(model)) else {
        set_last_error("Invalid string pointer");
        return ptr::null_mut();
    };

    let built = ModelMetadata::from_json(&metadata).and_then(|metadata| {
        let model = LinearRegressor::from_json(&model)?;
        EtaProcessor::new(&metadata, Arc::new(model))
    });

    match built {
        Ok(processor) => Box::into_raw(Box::new(EtaProcessorHandle { processor })),
        Err(e) => {
            report_error(&e);
            ptr::null_mut()
        }
    }
}

/// Free a processor.
///
/// # Safety
/// - `processor` must be a pointer returned by `eta_processor_new`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn eta_processor_free(processor: *mut EtaProcessorHandle) {
    if !processor.is_null() {
        drop(Box::from_raw(processor));
    }
}

/// Estimate one order or an array of orders with an existing processor.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `eta_processor_new`.
/// - `input` must be a valid null-terminated C string.
/// - Returns a JSON array of reports that must be freed with `eta_free_string`.
/// - Returns NULL on error; call `eta_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn eta_processor_estimate(
    processor: *const EtaProcessorHandle,
    input: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }
    let handle = &*processor;

    let Some(input) = cstr_to_string(input) else {
        set_last_error("Invalid input string pointer");
        return ptr::null_mut();
    };

    let reports = parse_inputs(&input).and_then(|inputs| {
        inputs
            .iter()
            .map(|input| handle.processor.report_json(input))
            .collect::<Result<Vec<_>, _>>()
    });

    match reports {
        Ok(reports) => string_to_cstr(&vec_to_json_array(reports)),
        Err(e) => {
            report_error(&e);
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by this library.
///
/// # Safety
/// - `ptr` must be a pointer returned by an `eta_*` function, or NULL.
#[no_mangle]
pub unsafe extern "C" fn eta_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message, prefixed with its error code.
///
/// # Safety
/// - The returned pointer is valid until the next `eta_*` call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn eta_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

/// Get the library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn eta_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
