//! Ownership of one `JsRuntime` per bridge runtime.
//!
//! V8 enters an isolate on the creating thread and expects isolates to be
//! exited in reverse creation order. Several runtimes on one thread may be
//! destroyed in any order, so an [`Engine`] keeps its isolate exited while
//! idle and enters it only for the duration of an [`Entered`] guard.

use std::ops::{Deref, DerefMut};

use deno_core::{JsRuntime, RuntimeOptions};

use crate::handle::RuntimeId;
use crate::platform::ISOLATE_CREATE_LOCK;

pub(crate) struct Engine {
    js_runtime: JsRuntime,
}

impl Engine {
    pub(crate) fn new(id: RuntimeId, options: RuntimeOptions) -> Self {
        let mut js_runtime = {
            let _lock = ISOLATE_CREATE_LOCK.lock();
            tracing::debug!("[{}] Creating JsRuntime", id);
            JsRuntime::new(options)
        };
        // SAFETY: the isolate was entered on this thread by its constructor.
        unsafe { js_runtime.v8_isolate().exit() };
        Self { js_runtime }
    }

    /// Enter the isolate on the current thread until the guard drops.
    pub(crate) fn enter(&mut self) -> Entered<'_> {
        // SAFETY: balanced by `Entered::drop` on the same thread; `Engine`
        // is not `Send`.
        unsafe { self.js_runtime.v8_isolate().enter() };
        Entered {
            js_runtime: &mut self.js_runtime,
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        // The isolate exits itself when `js_runtime` drops and requires to be
        // the current one at that point.
        // SAFETY: exited again by `OwnedIsolate::drop` right after this.
        unsafe { self.js_runtime.v8_isolate().enter() };
    }
}

/// An entered isolate. Derefs to the owning `JsRuntime`.
pub(crate) struct Entered<'a> {
    js_runtime: &'a mut JsRuntime,
}

impl Deref for Entered<'_> {
    type Target = JsRuntime;

    fn deref(&self) -> &JsRuntime {
        self.js_runtime
    }
}

impl DerefMut for Entered<'_> {
    fn deref_mut(&mut self) -> &mut JsRuntime {
        self.js_runtime
    }
}

impl Drop for Entered<'_> {
    fn drop(&mut self) {
        // SAFETY: entered in `Engine::enter`.
        unsafe { self.js_runtime.v8_isolate().exit() };
    }
}
