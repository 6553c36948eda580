//! `#[repr(C)]` types and opaque handles of the C ABI.

use std::ffi::CString;

use jsbridge::{BigInt, Function, JsString, Object, Runtime, RuntimeConfig, Value, ValueKind};

/// Outcome of a fallible call.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsbStatus {
    Ok = 0,
    HostError = 1,
    ScriptError = 2,
    CompileError = 3,
}

/// Type tag of a value.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsbValueKind {
    Undefined = 0,
    Null = 1,
    Bool = 2,
    Number = 3,
    String = 4,
    Object = 5,
    BigInt = 6,
    Symbol = 7,
}

impl From<ValueKind> for JsbValueKind {
    fn from(kind: ValueKind) -> Self {
        match kind {
            ValueKind::Undefined => JsbValueKind::Undefined,
            ValueKind::Null => JsbValueKind::Null,
            ValueKind::Bool => JsbValueKind::Bool,
            ValueKind::Number => JsbValueKind::Number,
            ValueKind::String => JsbValueKind::String,
            ValueKind::Object => JsbValueKind::Object,
            ValueKind::BigInt => JsbValueKind::BigInt,
            ValueKind::Symbol => JsbValueKind::Symbol,
        }
    }
}

/// Runtime options. Zero-valued numeric fields keep the engine defaults.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct JsbRuntimeConfig {
    pub initial_heap_size: usize,
    pub max_heap_size: usize,
    pub enable_eval: bool,
    pub enable_jit: bool,
    pub enable_experimental_features: bool,
    pub enable_microtask_queue: bool,
    pub enable_sample_profiling: bool,
    pub native_stack_gap: u32,
    pub max_num_registers: u32,
}

impl From<&RuntimeConfig> for JsbRuntimeConfig {
    fn from(c: &RuntimeConfig) -> Self {
        Self {
            initial_heap_size: c.initial_heap_size,
            max_heap_size: c.max_heap_size,
            enable_eval: c.enable_eval,
            enable_jit: c.enable_jit,
            enable_experimental_features: c.enable_experimental_features,
            enable_microtask_queue: c.enable_microtask_queue,
            enable_sample_profiling: c.enable_sample_profiling,
            native_stack_gap: c.native_stack_gap,
            max_num_registers: c.max_num_registers,
        }
    }
}

impl From<&JsbRuntimeConfig> for RuntimeConfig {
    fn from(c: &JsbRuntimeConfig) -> Self {
        RuntimeConfig {
            initial_heap_size: c.initial_heap_size,
            max_heap_size: c.max_heap_size,
            enable_eval: c.enable_eval,
            enable_jit: c.enable_jit,
            enable_experimental_features: c.enable_experimental_features,
            enable_microtask_queue: c.enable_microtask_queue,
            enable_sample_profiling: c.enable_sample_profiling,
            native_stack_gap: c.native_stack_gap,
            max_num_registers: c.max_num_registers,
        }
    }
}

/// Bytes owned by this library, released with `jsb_buffer_free`.
#[repr(C)]
#[derive(Debug)]
pub struct JsbBuffer {
    pub data: *mut u8,
    pub len: usize,
}

impl JsbBuffer {
    pub(crate) fn from_vec(bytes: Vec<u8>) -> Self {
        let boxed = bytes.into_boxed_slice();
        let len = boxed.len();
        let data = Box::into_raw(boxed) as *mut u8;
        Self { data, len }
    }

    /// Free the bytes and reset the buffer to empty.
    ///
    /// # Safety
    /// The buffer must have come from [`JsbBuffer::from_vec`] (or be empty)
    /// and not been released.
    pub(crate) unsafe fn release(&mut self) {
        if !self.data.is_null() {
            let slice = std::ptr::slice_from_raw_parts_mut(self.data, self.len);
            // SAFETY: reconstructs the box leaked by `from_vec`.
            drop(unsafe { Box::from_raw(slice) });
        }
        self.data = std::ptr::null_mut();
        self.len = 0;
    }

    /// View the bytes.
    ///
    /// # Safety
    /// The buffer must be live.
    pub unsafe fn as_slice(&self) -> &[u8] {
        if self.data.is_null() {
            return &[];
        }
        // SAFETY: guaranteed by the caller.
        unsafe { std::slice::from_raw_parts(self.data, self.len) }
    }
}

impl Default for JsbBuffer {
    fn default() -> Self {
        Self {
            data: std::ptr::null_mut(),
            len: 0,
        }
    }
}

/// Opaque runtime.
pub struct JsbRuntime(pub(crate) Runtime);

/// Opaque value.
pub struct JsbValue(pub(crate) Value);

/// Opaque object.
pub struct JsbObject(pub(crate) Object);

/// Opaque function.
pub struct JsbFunction(pub(crate) Function);

/// Opaque string.
pub struct JsbString(pub(crate) JsString);

/// Opaque BigInt.
pub struct JsbBigInt(pub(crate) BigInt);

/// Opaque error.
pub struct JsbError {
    pub(crate) status: JsbStatus,
    pub(crate) message: CString,
}
