//! Process-wide engine state.
//!
//! V8 flags and the V8 platform belong to the process, not to a runtime.
//! The first runtime created decides the flags; isolate creation is
//! serialized behind a single lock.

use std::sync::{Once, OnceLock};

use deno_core::JsRuntime;
use parking_lot::Mutex;

use crate::config::RuntimeConfig;

/// Ensure the V8 platform is initialized exactly once.
static V8_INIT: Once = Once::new();

/// Flags the platform was initialized with.
static APPLIED_FLAGS: OnceLock<Vec<String>> = OnceLock::new();

/// Mutex to serialize V8 isolate creation.
/// Creating multiple isolates concurrently can crash V8.
pub(crate) static ISOLATE_CREATE_LOCK: Mutex<()> = parking_lot::const_mutex(());

/// Initialize the V8 platform with the flags `config` needs.
///
/// Safe to call any number of times. Only the first call applies flags;
/// later configs asking for different process-wide flags get a warning.
pub(crate) fn init(config: &RuntimeConfig) {
    let wanted = config.engine_flags();
    initialize(&wanted);

    if let Some(applied) = APPLIED_FLAGS.get() {
        if *applied != wanted {
            tracing::warn!(
                "engine flags are process-wide and already set to {:?}; requested {:?} ignored",
                applied,
                wanted
            );
        }
    }
}

/// Initialize the V8 platform if nothing has yet, keeping whatever flags
/// an earlier runtime chose.
pub(crate) fn ensure_initialized() {
    initialize(&[]);
}

fn initialize(flags: &[String]) {
    V8_INIT.call_once(|| {
        if !flags.is_empty() {
            let mut args = Vec::with_capacity(flags.len() + 1);
            args.push("jsbridge".to_string());
            args.extend(flags.iter().cloned());
            let unrecognized = deno_core::v8_set_flags(args);
            // The first entry is the program name placeholder.
            for flag in unrecognized.iter().skip(1) {
                tracing::warn!("engine ignored unrecognized flag {}", flag);
            }
        }
        tracing::debug!("Initializing V8 platform (flags: {:?})", flags);
        JsRuntime::init_platform(None, false);
        let _ = APPLIED_FLAGS.set(flags.to_vec());
    });
}

/// Flags the platform was initialized with, if it has been.
pub fn engine_flags() -> Option<&'static [String]> {
    APPLIED_FLAGS.get().map(Vec::as_slice)
}

/// Version string of the embedded engine.
pub fn engine_version() -> &'static str {
    deno_core::v8::V8::get_version()
}
