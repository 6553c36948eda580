//! C ABI for jsbridge.
//!
//! Every handle crossing this boundary is an opaque, individually boxed
//! pointer released by exactly one matching `*_free` call. Fallible calls
//! return a [`JsbStatus`] and, on failure, store a [`JsbError`] through the
//! `err` out-pointer when it is non-null. Panics never cross the boundary:
//! they are caught and reported as host errors.
//!
//! A runtime and everything derived from it must stay on the thread that
//! created the runtime.

use std::ffi::{CStr, CString, c_char};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::ptr;

use jsbridge::{
    CompiledBytecode, Error, ErrorKind, Function, Object, Result, Runtime, RuntimeConfig, Value,
    ValueKind,
};

mod types;

pub use types::{
    JsbBigInt, JsbBuffer, JsbError, JsbFunction, JsbObject, JsbRuntime, JsbRuntimeConfig,
    JsbStatus, JsbString, JsbValue, JsbValueKind,
};

// ─────────────────────────────────────────────────────────────────────────────
// Boundary helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Run `f`, translating its error or panic into a status and error object.
fn guard(err: *mut *mut JsbError, f: impl FnOnce() -> Result<()>) -> JsbStatus {
    let outcome = match catch_unwind(AssertUnwindSafe(f)) {
        Ok(outcome) => outcome,
        Err(panic) => {
            let detail = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            tracing::error!("panic caught at the C boundary: {}", detail);
            Err(Error::host(format!("internal panic: {}", detail)))
        }
    };

    match outcome {
        Ok(()) => JsbStatus::Ok,
        Err(error) => {
            let status = JsbStatus::from(error.kind());
            if !err.is_null() {
                // SAFETY: the caller passed a writable out-pointer or null.
                unsafe { *err = Box::into_raw(Box::new(JsbError::new(&error))) };
            }
            status
        }
    }
}

/// Borrow a handle argument, rejecting null.
///
/// # Safety
/// `ptr` must be null or point to a live value of type `T`.
unsafe fn arg<'a, T>(ptr: *const T, name: &str) -> Result<&'a T> {
    // SAFETY: guaranteed by the caller.
    unsafe { ptr.as_ref() }.ok_or_else(|| Error::host(format!("{} is null", name)))
}

/// Borrow a handle argument mutably, rejecting null.
///
/// # Safety
/// `ptr` must be null or point to a live value of type `T` not aliased
/// elsewhere for the duration of the call.
unsafe fn arg_mut<'a, T>(ptr: *mut T, name: &str) -> Result<&'a mut T> {
    // SAFETY: guaranteed by the caller.
    unsafe { ptr.as_mut() }.ok_or_else(|| Error::host(format!("{} is null", name)))
}

/// Borrow `len` bytes at `data`. A zero length accepts a null pointer.
///
/// # Safety
/// `data` must be valid for reads of `len` bytes when `len` is non-zero.
unsafe fn bytes<'a>(data: *const u8, len: usize, name: &str) -> Result<&'a [u8]> {
    if len == 0 {
        return Ok(&[]);
    }
    if data.is_null() {
        return Err(Error::host(format!("{} is null", name)));
    }
    // SAFETY: guaranteed by the caller.
    Ok(unsafe { std::slice::from_raw_parts(data, len) })
}

/// Borrow `len` bytes of UTF-8 text at `data`.
///
/// # Safety
/// Same as [`bytes`].
unsafe fn text<'a>(data: *const u8, len: usize, name: &str) -> Result<&'a str> {
    // SAFETY: guaranteed by the caller.
    let raw = unsafe { bytes(data, len, name)? };
    std::str::from_utf8(raw).map_err(|_| Error::host(format!("{} is not valid UTF-8", name)))
}

/// Borrow a NUL-terminated string; null reads as empty.
///
/// # Safety
/// `ptr` must be null or point to a NUL-terminated string.
unsafe fn c_str<'a>(ptr: *const c_char, name: &str) -> Result<&'a str> {
    if ptr.is_null() {
        return Ok("");
    }
    // SAFETY: guaranteed by the caller.
    unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .map_err(|_| Error::host(format!("{} is not valid UTF-8", name)))
}

/// Collect call arguments, checking ownership before any handle is copied.
///
/// # Safety
/// `args` must be null with `argc == 0`, or point to `argc` valid value
/// pointers.
unsafe fn call_args(rt: &Runtime, args: *const *const JsbValue, argc: usize) -> Result<Vec<Value>> {
    if argc == 0 {
        return Ok(Vec::new());
    }
    if args.is_null() {
        return Err(Error::host("args is null"));
    }
    // SAFETY: guaranteed by the caller.
    let raw = unsafe { std::slice::from_raw_parts(args, argc) };
    raw.iter()
        .enumerate()
        .map(|(i, ptr)| {
            // SAFETY: each entry is a value pointer per the contract above.
            let value = unsafe { arg(*ptr, "argument") }
                .map_err(|_| Error::host(format!("argument {} is null", i)))?;
            if value.0.owner().is_some_and(|owner| owner != rt.id()) {
                return Err(Error::host(format!(
                    "argument {} belongs to a different runtime",
                    i
                )));
            }
            Ok(value.0.clone())
        })
        .collect()
}

/// Store `value` through `out` as a new boxed handle.
///
/// # Safety
/// `out` must be null or writable.
unsafe fn put<T>(out: *mut *mut T, value: T) -> Result<()> {
    if out.is_null() {
        return Err(Error::host("output pointer is null"));
    }
    // SAFETY: guaranteed by the caller.
    unsafe { *out = Box::into_raw(Box::new(value)) };
    Ok(())
}

/// Release a boxed handle.
///
/// # Safety
/// `ptr` must be null or have come from `Box::into_raw` and not been freed.
unsafe fn release<T>(ptr: *mut T) {
    if !ptr.is_null() {
        // SAFETY: guaranteed by the caller.
        drop(unsafe { Box::from_raw(ptr) });
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Runtime
// ─────────────────────────────────────────────────────────────────────────────

/// Fill `out` with the default configuration.
///
/// # Safety
/// `out` must be null or point to writable memory for a `JsbRuntimeConfig`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn jsb_runtime_config_default(out: *mut JsbRuntimeConfig) {
    if !out.is_null() {
        // SAFETY: guaranteed by the caller.
        unsafe { out.write(JsbRuntimeConfig::from(&RuntimeConfig::default())) };
    }
}

/// Create a runtime. A null `config` selects the defaults.
///
/// # Safety
/// `config` must be null or point to a valid `JsbRuntimeConfig`; `out` and
/// `err` must be null or writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn jsb_runtime_create(
    config: *const JsbRuntimeConfig,
    out: *mut *mut JsbRuntime,
    err: *mut *mut JsbError,
) -> JsbStatus {
    guard(err, || {
        // SAFETY: guaranteed by the caller.
        let config = match unsafe { config.as_ref() } {
            Some(c) => RuntimeConfig::from(c),
            None => RuntimeConfig::default(),
        };
        let runtime = Runtime::with_config(&config)?;
        // SAFETY: guaranteed by the caller.
        unsafe { put(out, JsbRuntime(runtime)) }
    })
}

/// Destroy a runtime. Runtimes may be destroyed in any order. Handles it
/// produced must not be used afterwards except to free them.
///
/// # Safety
/// `rt` must be null or a runtime from `jsb_runtime_create` not yet destroyed.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn jsb_runtime_destroy(rt: *mut JsbRuntime) {
    // SAFETY: guaranteed by the caller.
    let outcome = catch_unwind(AssertUnwindSafe(|| unsafe { release(rt) }));
    if outcome.is_err() {
        tracing::error!("panic caught while destroying a runtime");
    }
}

/// Evaluate `len` bytes of UTF-8 source. `source_url` may be null.
///
/// # Safety
/// `rt` must be a live runtime; `source` valid for `len` bytes; `source_url`
/// null or NUL-terminated; `out` and `err` null or writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn jsb_evaluate(
    rt: *mut JsbRuntime,
    source: *const u8,
    len: usize,
    source_url: *const c_char,
    out: *mut *mut JsbValue,
    err: *mut *mut JsbError,
) -> JsbStatus {
    guard(err, || {
        // SAFETY: guaranteed by the caller.
        let (rt, source, url) = unsafe {
            (
                arg_mut(rt, "runtime")?,
                text(source, len, "source")?,
                c_str(source_url, "source_url")?,
            )
        };
        let value = rt.0.evaluate(source, url)?;
        // SAFETY: guaranteed by the caller.
        unsafe { put(out, JsbValue(value)) }
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Bytecode
// ─────────────────────────────────────────────────────────────────────────────

/// Compile source into an artifact written to `out`; free it with
/// `jsb_buffer_free`.
///
/// # Safety
/// `source` valid for `len` bytes; `source_url` null or NUL-terminated;
/// `out` and `err` null or writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn jsb_compile(
    source: *const u8,
    len: usize,
    source_url: *const c_char,
    optimize: bool,
    out: *mut JsbBuffer,
    err: *mut *mut JsbError,
) -> JsbStatus {
    guard(err, || {
        if out.is_null() {
            return Err(Error::host("output pointer is null"));
        }
        // SAFETY: guaranteed by the caller.
        let (source, url) = unsafe { (text(source, len, "source")?, c_str(source_url, "source_url")?) };
        let artifact = jsbridge::compile_source(source, url, optimize)?;
        // SAFETY: checked non-null above.
        unsafe { out.write(JsbBuffer::from_vec(artifact.into_vec())) };
        Ok(())
    })
}

/// Whether `len` bytes at `data` start like an artifact.
///
/// # Safety
/// `data` must be null or valid for reads of `len` bytes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn jsb_is_valid_artifact(data: *const u8, len: usize) -> bool {
    // SAFETY: guaranteed by the caller.
    match unsafe { bytes(data, len, "data") } {
        Ok(raw) => jsbridge::is_valid_artifact(raw),
        Err(_) => false,
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn jsb_artifact_format_version() -> u32 {
    jsbridge::artifact_version()
}

/// Execute an artifact.
///
/// With `zero_copy` the engine reads `data` in place and the buffer must stay
/// alive and unchanged until the call returns; otherwise it is copied first.
///
/// # Safety
/// `rt` must be a live runtime; `data` valid for `len` bytes; `out` and `err`
/// null or writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn jsb_execute_artifact(
    rt: *mut JsbRuntime,
    data: *const u8,
    len: usize,
    zero_copy: bool,
    out: *mut *mut JsbValue,
    err: *mut *mut JsbError,
) -> JsbStatus {
    guard(err, || {
        // SAFETY: guaranteed by the caller.
        let (rt, raw) = unsafe { (arg_mut(rt, "runtime")?, bytes(data, len, "data")?) };
        let artifact = if zero_copy {
            CompiledBytecode::borrowed(raw)
        } else {
            CompiledBytecode::copy_from(raw)
        };
        let value = rt.0.execute_artifact(&artifact)?;
        // SAFETY: guaranteed by the caller.
        unsafe { put(out, JsbValue(value)) }
    })
}

/// # Safety
/// `buffer` must be null or point to a buffer filled by this library.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn jsb_buffer_free(buffer: *mut JsbBuffer) {
    // SAFETY: guaranteed by the caller.
    if let Some(buffer) = unsafe { buffer.as_mut() } {
        // SAFETY: the buffer came from `JsbBuffer::from_vec`.
        unsafe { buffer.release() };
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Values
// ─────────────────────────────────────────────────────────────────────────────

#[unsafe(no_mangle)]
pub extern "C" fn jsb_value_undefined() -> *mut JsbValue {
    Box::into_raw(Box::new(JsbValue(Value::undefined())))
}

#[unsafe(no_mangle)]
pub extern "C" fn jsb_value_null() -> *mut JsbValue {
    Box::into_raw(Box::new(JsbValue(Value::null())))
}

#[unsafe(no_mangle)]
pub extern "C" fn jsb_value_bool(b: bool) -> *mut JsbValue {
    Box::into_raw(Box::new(JsbValue(Value::from_bool(b))))
}

#[unsafe(no_mangle)]
pub extern "C" fn jsb_value_number(n: f64) -> *mut JsbValue {
    Box::into_raw(Box::new(JsbValue(Value::from_number(n))))
}

/// Create a string value from `len` bytes of UTF-8.
///
/// # Safety
/// `rt` must be a live runtime; `data` valid for `len` bytes; `out` and `err`
/// null or writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn jsb_value_string(
    rt: *mut JsbRuntime,
    data: *const u8,
    len: usize,
    out: *mut *mut JsbValue,
    err: *mut *mut JsbError,
) -> JsbStatus {
    guard(err, || {
        // SAFETY: guaranteed by the caller.
        let (rt, s) = unsafe { (arg_mut(rt, "runtime")?, text(data, len, "data")?) };
        let value = Value::from_string(&mut rt.0, s)?;
        // SAFETY: guaranteed by the caller.
        unsafe { put(out, JsbValue(value)) }
    })
}

/// # Safety
/// `value` must be null or a value from this library not yet freed.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn jsb_value_free(value: *mut JsbValue) {
    // SAFETY: guaranteed by the caller.
    unsafe { release(value) }
}

/// Type tag of a value. Null reads as undefined.
///
/// # Safety
/// `value` must be null or a live value.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn jsb_value_kind(value: *const JsbValue) -> JsbValueKind {
    // SAFETY: guaranteed by the caller.
    match unsafe { value.as_ref() } {
        Some(v) => JsbValueKind::from(v.0.kind()),
        None => JsbValueKind::from(ValueKind::Undefined),
    }
}

/// # Safety
/// `value` must be a live value; `out` and `err` null or writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn jsb_value_as_bool(
    value: *const JsbValue,
    out: *mut bool,
    err: *mut *mut JsbError,
) -> JsbStatus {
    guard(err, || {
        // SAFETY: guaranteed by the caller.
        let b = unsafe { arg(value, "value")? }.0.as_bool()?;
        // SAFETY: guaranteed by the caller.
        *unsafe { arg_mut(out, "out")? } = b;
        Ok(())
    })
}

/// # Safety
/// `value` must be a live value; `out` and `err` null or writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn jsb_value_as_number(
    value: *const JsbValue,
    out: *mut f64,
    err: *mut *mut JsbError,
) -> JsbStatus {
    guard(err, || {
        // SAFETY: guaranteed by the caller.
        let n = unsafe { arg(value, "value")? }.0.as_number()?;
        // SAFETY: guaranteed by the caller.
        *unsafe { arg_mut(out, "out")? } = n;
        Ok(())
    })
}

/// # Safety
/// `rt` must be a live runtime; `value` a live value; `out` and `err` null
/// or writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn jsb_value_as_string(
    rt: *mut JsbRuntime,
    value: *const JsbValue,
    out: *mut *mut JsbString,
    err: *mut *mut JsbError,
) -> JsbStatus {
    guard(err, || {
        // SAFETY: guaranteed by the caller.
        let (rt, value) = unsafe { (arg_mut(rt, "runtime")?, arg(value, "value")?) };
        let s = value.0.as_string(&mut rt.0)?;
        // SAFETY: guaranteed by the caller.
        unsafe { put(out, JsbString(s)) }
    })
}

/// # Safety
/// `rt` must be a live runtime; `value` a live value; `out` and `err` null
/// or writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn jsb_value_as_object(
    rt: *mut JsbRuntime,
    value: *const JsbValue,
    out: *mut *mut JsbObject,
    err: *mut *mut JsbError,
) -> JsbStatus {
    guard(err, || {
        // SAFETY: guaranteed by the caller.
        let (rt, value) = unsafe { (arg_mut(rt, "runtime")?, arg(value, "value")?) };
        let obj = value.0.as_object(&mut rt.0)?;
        // SAFETY: guaranteed by the caller.
        unsafe { put(out, JsbObject(obj)) }
    })
}

/// # Safety
/// `rt` must be a live runtime; `value` a live value; `out` and `err` null
/// or writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn jsb_value_as_bigint(
    rt: *mut JsbRuntime,
    value: *const JsbValue,
    out: *mut *mut JsbBigInt,
    err: *mut *mut JsbError,
) -> JsbStatus {
    guard(err, || {
        // SAFETY: guaranteed by the caller.
        let (rt, value) = unsafe { (arg_mut(rt, "runtime")?, arg(value, "value")?) };
        let big = value.0.as_bigint(&mut rt.0)?;
        // SAFETY: guaranteed by the caller.
        unsafe { put(out, JsbBigInt(big)) }
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Strings and BigInts
// ─────────────────────────────────────────────────────────────────────────────

/// Copy a string out as UTF-8 into `out`; free it with `jsb_buffer_free`.
///
/// # Safety
/// `rt` must be a live runtime; `s` a live string; `out` and `err` null or
/// writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn jsb_string_utf8(
    rt: *mut JsbRuntime,
    s: *const JsbString,
    out: *mut JsbBuffer,
    err: *mut *mut JsbError,
) -> JsbStatus {
    guard(err, || {
        if out.is_null() {
            return Err(Error::host("output pointer is null"));
        }
        // SAFETY: guaranteed by the caller.
        let (rt, s) = unsafe { (arg_mut(rt, "runtime")?, arg(s, "string")?) };
        let utf8 = s.0.utf8(&mut rt.0)?;
        // SAFETY: checked non-null above.
        unsafe { out.write(JsbBuffer::from_vec(utf8.into_bytes())) };
        Ok(())
    })
}

/// # Safety
/// `s` must be null or a string from this library not yet freed.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn jsb_string_free(s: *mut JsbString) {
    // SAFETY: guaranteed by the caller.
    unsafe { release(s) }
}

/// # Safety
/// `rt` must be a live runtime; `big` a live BigInt; `out` and `err` null or
/// writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn jsb_bigint_to_i64(
    rt: *mut JsbRuntime,
    big: *const JsbBigInt,
    out: *mut i64,
    err: *mut *mut JsbError,
) -> JsbStatus {
    guard(err, || {
        // SAFETY: guaranteed by the caller.
        let (rt, big) = unsafe { (arg_mut(rt, "runtime")?, arg(big, "bigint")?) };
        let v = big.0.to_i64(&mut rt.0)?;
        // SAFETY: guaranteed by the caller.
        *unsafe { arg_mut(out, "out")? } = v;
        Ok(())
    })
}

/// # Safety
/// `big` must be null or a BigInt from this library not yet freed.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn jsb_bigint_free(big: *mut JsbBigInt) {
    // SAFETY: guaranteed by the caller.
    unsafe { release(big) }
}

// ─────────────────────────────────────────────────────────────────────────────
// Objects and calls
// ─────────────────────────────────────────────────────────────────────────────

/// Read the property `name` (NUL-terminated).
///
/// # Safety
/// `rt` must be a live runtime; `obj` a live object; `name` NUL-terminated;
/// `out` and `err` null or writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn jsb_object_get(
    rt: *mut JsbRuntime,
    obj: *const JsbObject,
    name: *const c_char,
    out: *mut *mut JsbValue,
    err: *mut *mut JsbError,
) -> JsbStatus {
    guard(err, || {
        if name.is_null() {
            return Err(Error::host("name is null"));
        }
        // SAFETY: guaranteed by the caller.
        let (rt, obj, name) = unsafe { (arg_mut(rt, "runtime")?, arg(obj, "object")?, c_str(name, "name")?) };
        let value = obj.0.get(&mut rt.0, name)?;
        // SAFETY: guaranteed by the caller.
        unsafe { put(out, JsbValue(value)) }
    })
}

/// # Safety
/// `rt` must be a live runtime; `obj` a live object; `out` and `err` null or
/// writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn jsb_object_as_function(
    rt: *mut JsbRuntime,
    obj: *const JsbObject,
    out: *mut *mut JsbFunction,
    err: *mut *mut JsbError,
) -> JsbStatus {
    guard(err, || {
        // SAFETY: guaranteed by the caller.
        let (rt, obj) = unsafe { (arg_mut(rt, "runtime")?, arg(obj, "object")?) };
        let func = obj.0.as_function(&mut rt.0)?;
        // SAFETY: guaranteed by the caller.
        unsafe { put(out, JsbFunction(func)) }
    })
}

/// # Safety
/// `obj` must be null or an object from this library not yet freed.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn jsb_object_free(obj: *mut JsbObject) {
    // SAFETY: guaranteed by the caller.
    unsafe { release(obj) }
}

/// # Safety
/// `func` must be null or a function from this library not yet freed.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn jsb_function_free(func: *mut JsbFunction) {
    // SAFETY: guaranteed by the caller.
    unsafe { release(func) }
}

/// Call `func` with `this` bound to `undefined`.
///
/// # Safety
/// `rt` must be a live runtime; `func` a live function; `args` null with
/// `argc == 0` or `argc` live values; `out` and `err` null or writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn jsb_call_function(
    rt: *mut JsbRuntime,
    func: *const JsbFunction,
    args: *const *const JsbValue,
    argc: usize,
    out: *mut *mut JsbValue,
    err: *mut *mut JsbError,
) -> JsbStatus {
    guard(err, || {
        // SAFETY: guaranteed by the caller.
        let (rt, func) = unsafe { (arg_mut(rt, "runtime")?, arg(func, "function")?) };
        // SAFETY: guaranteed by the caller.
        let argv = unsafe { call_args(&rt.0, args, argc)? };
        let value = call(&mut rt.0, &func.0, None, &argv)?;
        // SAFETY: guaranteed by the caller.
        unsafe { put(out, JsbValue(value)) }
    })
}

/// Call `func` with `this` bound to `receiver`.
///
/// # Safety
/// As `jsb_call_function`; `receiver` must be a live object.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn jsb_call_function_with_receiver(
    rt: *mut JsbRuntime,
    func: *const JsbFunction,
    receiver: *const JsbObject,
    args: *const *const JsbValue,
    argc: usize,
    out: *mut *mut JsbValue,
    err: *mut *mut JsbError,
) -> JsbStatus {
    guard(err, || {
        // SAFETY: guaranteed by the caller.
        let (rt, func, receiver) = unsafe {
            (
                arg_mut(rt, "runtime")?,
                arg(func, "function")?,
                arg(receiver, "receiver")?,
            )
        };
        // SAFETY: guaranteed by the caller.
        let argv = unsafe { call_args(&rt.0, args, argc)? };
        let value = call(&mut rt.0, &func.0, Some(&receiver.0), &argv)?;
        // SAFETY: guaranteed by the caller.
        unsafe { put(out, JsbValue(value)) }
    })
}

/// Invoke `func` as a constructor.
///
/// # Safety
/// As `jsb_call_function`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn jsb_call_as_constructor(
    rt: *mut JsbRuntime,
    func: *const JsbFunction,
    args: *const *const JsbValue,
    argc: usize,
    out: *mut *mut JsbValue,
    err: *mut *mut JsbError,
) -> JsbStatus {
    guard(err, || {
        // SAFETY: guaranteed by the caller.
        let (rt, func) = unsafe { (arg_mut(rt, "runtime")?, arg(func, "function")?) };
        // SAFETY: guaranteed by the caller.
        let argv = unsafe { call_args(&rt.0, args, argc)? };
        let value = func.0.call_as_constructor(&mut rt.0, &argv)?;
        // SAFETY: guaranteed by the caller.
        unsafe { put(out, JsbValue(value)) }
    })
}

fn call(rt: &mut Runtime, func: &Function, receiver: Option<&Object>, args: &[Value]) -> Result<Value> {
    match receiver {
        Some(this) => func.call_with_this(rt, this, args),
        None => func.call(rt, args),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// # Safety
/// `err` must be null or a live error.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn jsb_error_kind(err: *const JsbError) -> JsbStatus {
    // SAFETY: guaranteed by the caller.
    match unsafe { err.as_ref() } {
        Some(e) => e.status,
        None => JsbStatus::Ok,
    }
}

/// NUL-terminated message, valid until `jsb_error_free`.
///
/// # Safety
/// `err` must be null or a live error.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn jsb_error_message(err: *const JsbError) -> *const c_char {
    // SAFETY: guaranteed by the caller.
    match unsafe { err.as_ref() } {
        Some(e) => e.message.as_ptr(),
        None => ptr::null(),
    }
}

/// # Safety
/// `err` must be null or an error from this library not yet freed.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn jsb_error_free(err: *mut JsbError) {
    // SAFETY: guaranteed by the caller.
    unsafe { release(err) }
}

impl From<ErrorKind> for JsbStatus {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::Host => JsbStatus::HostError,
            ErrorKind::Script => JsbStatus::ScriptError,
            ErrorKind::Compile => JsbStatus::CompileError,
        }
    }
}

impl JsbError {
    fn new(error: &Error) -> Self {
        // Interior NULs would truncate the C string; replace them.
        let text = error.to_string().replace('\0', "\u{FFFD}");
        Self {
            status: JsbStatus::from(error.kind()),
            message: CString::new(text).unwrap_or_default(),
        }
    }
}
