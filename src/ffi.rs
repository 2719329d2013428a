//! FFI bindings for Inhaler Insights
//!
//! This module provides C-compatible functions for calling the analysis engine
//! from the host application. All functions use C strings (null-terminated) and
//! return allocated memory that must be freed by the caller using
//! `inhaler_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::config::AnalysisConfig;
use crate::effort::InhalationEffort;
use crate::messages::{combine, ChangeNotification};
use crate::pipeline::{analyze_json, AnalysisProcessor};
use crate::status::decode;
use crate::usage::RelieverUsage;

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Set the last error message
fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

/// Clear the last error message
fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

// ============================================================================
// Stateless API
// ============================================================================

/// Analyze an input JSON document and return the report JSON.
///
/// # Safety
/// - `json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `inhaler_free_string`.
/// - Returns NULL on error; call `inhaler_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn inhaler_analyze(json: *const c_char) -> *mut c_char {
    clear_last_error();

    let json_str = match cstr_to_string(json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid JSON string pointer");
            return ptr::null_mut();
        }
    };

    match analyze_json(json_str) {
        Ok(report) => string_to_cstr(&report),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Classify a single inhalation.
///
/// Returns the effort code: 0 good, 1 low, 2 no inhalation, 3 exhalation,
/// 4 high-flow error, 5 system error.
#[no_mangle]
pub extern "C" fn inhaler_classify_effort(
    is_valid_inhale: bool,
    status: u32,
    peak_inspiratory_flow: u32,
) -> i32 {
    InhalationEffort::classify(is_valid_inhale, &decode(status), peak_inspiratory_flow).ordinal()
}

/// Grade a day's reliever inhalation count: 0 normal, 1 high.
#[no_mangle]
pub extern "C" fn inhaler_reliever_usage(count: u32) -> i32 {
    match RelieverUsage::from_count(count) {
        RelieverUsage::Normal => 0,
        RelieverUsage::High => 1,
    }
}

/// Decode a status bitmask into a JSON array of flag names.
///
/// Returns a newly allocated string that must be freed with `inhaler_free_string`.
#[no_mangle]
pub extern "C" fn inhaler_decode_status(status: u32) -> *mut c_char {
    clear_last_error();

    let names: Vec<&str> = decode(status).iter().map(|f| f.as_str()).collect();
    match serde_json::to_string(&names) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Combine a JSON array of change notifications, merging those of the same kind.
///
/// # Safety
/// - `json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `inhaler_free_string`.
/// - Returns NULL on error; call `inhaler_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn inhaler_combine_notifications(json: *const c_char) -> *mut c_char {
    clear_last_error();

    let json_str = match cstr_to_string(json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid JSON string pointer");
            return ptr::null_mut();
        }
    };

    let notifications: Vec<ChangeNotification> = match serde_json::from_str(&json_str) {
        Ok(n) => n,
        Err(e) => {
            set_last_error(&e.to_string());
            return ptr::null_mut();
        }
    };

    match serde_json::to_string(&combine(notifications)) {
        Ok(result) => string_to_cstr(&result),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Stateful Processor API
// ============================================================================

/// Opaque handle to an AnalysisProcessor
pub struct AnalysisProcessorHandle {
    processor: AnalysisProcessor,
}

/// Create a new AnalysisProcessor.
///
/// # Safety
/// - `config_json` must be NULL (default configuration) or a valid
///   null-terminated C string.
/// - Returns a pointer to a newly allocated processor.
/// - Must be freed with `inhaler_processor_free`.
/// - Returns NULL on error; call `inhaler_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn inhaler_processor_new(
    config_json: *const c_char,
) -> *mut AnalysisProcessorHandle {
    clear_last_error();

    let config = if config_json.is_null() {
        AnalysisConfig::default()
    } else {
        let json = match cstr_to_string(config_json) {
            Some(s) => s,
            None => {
                set_last_error("Invalid configuration string");
                return ptr::null_mut();
            }
        };
        match AnalysisConfig::from_json(&json) {
            Ok(config) => config,
            Err(e) => {
                set_last_error(&e.to_string());
                return ptr::null_mut();
            }
        }
    };

    let handle = Box::new(AnalysisProcessorHandle {
        processor: AnalysisProcessor::with_config(config),
    });
    Box::into_raw(handle)
}

/// Free an AnalysisProcessor.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `inhaler_processor_new`.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn inhaler_processor_free(processor: *mut AnalysisProcessorHandle) {
    if !processor.is_null() {
        drop(Box::from_raw(processor));
    }
}

/// Analyze input JSON with a configured processor.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `inhaler_processor_new`.
/// - `json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `inhaler_free_string`.
/// - Returns NULL on error; call `inhaler_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn inhaler_processor_analyze(
    processor: *mut AnalysisProcessorHandle,
    json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }

    let handle = &*processor;

    let json_str = match cstr_to_string(json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid JSON string pointer");
            return ptr::null_mut();
        }
    };

    match handle.processor.process_json(&json_str) {
        Ok(report) => string_to_cstr(&report),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Save processor configuration to JSON.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `inhaler_processor_new`.
/// - Returns a newly allocated string that must be freed with `inhaler_free_string`.
/// - Returns NULL on error; call `inhaler_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn inhaler_processor_save_config(
    processor: *mut AnalysisProcessorHandle,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }

    let handle = &*processor;

    match handle.processor.save_config() {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Load processor configuration from JSON.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `inhaler_processor_new`.
/// - `json` must be a valid null-terminated C string.
/// - Returns 0 on success, non-zero on error.
/// - On error, call `inhaler_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn inhaler_processor_load_config(
    processor: *mut AnalysisProcessorHandle,
    json: *const c_char,
) -> i32 {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return -1;
    }

    let handle = &mut *processor;

    let json_str = match cstr_to_string(json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid JSON string pointer");
            return -1;
        }
    };

    match handle.processor.load_config(&json_str) {
        Ok(()) => 0,
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by inhaler functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by an inhaler function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn inhaler_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next inhaler function call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn inhaler_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn inhaler_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
