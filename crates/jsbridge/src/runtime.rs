//! The runtime handle.
//!
//! A [`Runtime`] owns one engine instance (a V8 isolate with its main
//! context). It is confined to the thread that created it: every operation
//! takes `&mut Runtime`, and the type is neither `Send` nor `Sync`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use deno_core::v8;
use deno_core::{JsRuntime, RuntimeOptions};

use crate::bytecode::{self, CompiledBytecode};
use crate::config::RuntimeConfig;
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::exception::take_exception;
use crate::handle::{Handle, RuntimeId};
use crate::object::Object;
use crate::platform;
use crate::prepared::PreparedScript;
use crate::string::new_string;
use crate::value::Value;

/// A single-threaded JavaScript engine instance.
pub struct Runtime {
    id: RuntimeId,
    config: RuntimeConfig,
    heap_limit: Option<HeapLimit>,
    engine: Engine,
}

impl Runtime {
    /// Create a runtime with engine defaults.
    pub fn new() -> Result<Self> {
        Self::with_config(&RuntimeConfig::default())
    }

    /// Create a runtime with `config`. Zero-valued numeric options keep the
    /// engine defaults.
    pub fn with_config(config: &RuntimeConfig) -> Result<Self> {
        config.validate()?;
        platform::init(config);

        let id = RuntimeId::next();
        let mut engine = Engine::new(
            id,
            RuntimeOptions {
                create_params: config.create_params(),
                ..Default::default()
            },
        );

        let heap_limit = (config.max_heap_size != 0).then(|| {
            let limit = HeapLimit {
                runtime: id,
                max: config.max_heap_size,
                reached: Arc::new(AtomicBool::new(false)),
            };
            limit.arm(&mut engine.enter());
            limit
        });

        tracing::debug!("[{}] Runtime ready", id);
        Ok(Self {
            id,
            config: config.clone(),
            heap_limit,
            engine,
        })
    }

    /// Tear the runtime down. Runtimes may be destroyed in any order.
    ///
    /// Every handle the runtime produced becomes unusable: passing one to
    /// another runtime is a host error. Dropping such a handle is fine, but
    /// cloning it after the runtime is gone is not allowed and panics inside
    /// the engine.
    pub fn destroy(self) {
        drop(self);
    }

    pub fn id(&self) -> RuntimeId {
        self.id
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Parse and run `source` as a classic script.
    ///
    /// `source_url` only labels stack traces. Syntax errors and uncaught
    /// exceptions are both script errors.
    pub fn evaluate(&mut self, source: &str, source_url: &str) -> Result<Value> {
        tracing::trace!("[{}] Evaluating {} ({} bytes)", self.id, source_url, source.len());
        let text = with_source_url(source, source_url);
        self.enter_script(|tc, id| {
            let code = new_string(tc, &text, v8::NewStringType::Normal)?;
            let Some(script) = v8::Script::compile(tc, code, None) else {
                return Err(take_exception(tc));
            };
            match script.run(tc) {
                Some(result) => Ok(Value::from_local(id, tc, result)),
                None => Err(take_exception(tc)),
            }
        })
    }

    /// Compile `source` with this runtime's isolate.
    pub fn compile(&mut self, source: &str, source_url: &str, optimize: bool) -> Result<CompiledBytecode<'static>> {
        self.enter(|tc, _| bytecode::compile_in(tc, source, source_url, optimize))
    }

    /// Run a bytecode artifact.
    ///
    /// The artifact is checked before the engine sees it: a bad magic number
    /// or an unsupported version is a host error.
    pub fn execute_artifact(&mut self, artifact: &CompiledBytecode<'_>) -> Result<Value> {
        let view = artifact.view()?;
        tracing::trace!(
            "[{}] Executing artifact {} ({} bytes, borrowed: {})",
            self.id,
            view.source_url,
            artifact.len(),
            artifact.is_borrowed()
        );
        self.enter_script(|tc, id| bytecode::run_in(tc, id, &view))
    }

    /// Run artifact bytes supplied by the host.
    ///
    /// With `zero_copy` the engine reads `bytes` in place; otherwise the
    /// bytes are copied into bridge-owned storage first.
    pub fn execute_bytes(&mut self, bytes: &[u8], zero_copy: bool) -> Result<Value> {
        if zero_copy {
            self.execute_artifact(&CompiledBytecode::borrowed(bytes))
        } else {
            self.execute_artifact(&CompiledBytecode::copy_from(bytes))
        }
    }

    /// Parse `source` once for repeated evaluation.
    pub fn prepare(&mut self, source: &str, source_url: &str) -> Result<PreparedScript> {
        let text = with_source_url(source, source_url);
        let url = source_url.to_string();
        self.enter(|tc, id| {
            let code = new_string(tc, &text, v8::NewStringType::Normal)?;
            let mut src = v8::script_compiler::Source::new(code, None);
            let Some(unbound) = v8::script_compiler::compile_unbound_script(
                tc,
                &mut src,
                v8::script_compiler::CompileOptions::NoCompileOptions,
                v8::script_compiler::NoCacheReason::NoReason,
            ) else {
                return Err(take_exception(tc));
            };
            Ok(PreparedScript::new(id, url, v8::Global::new(tc, unbound)))
        })
    }

    /// Run a prepared script in this runtime's global context.
    pub fn evaluate_prepared(&mut self, prepared: &PreparedScript) -> Result<Value> {
        if prepared.owner() != self.id {
            return Err(Error::host(format!(
                "prepared script belongs to {} and cannot run in {}",
                prepared.owner(),
                self.id
            )));
        }
        tracing::trace!("[{}] Evaluating prepared {}", self.id, prepared.source_url());
        self.enter_script(|tc, id| {
            let unbound = v8::Local::new(tc, prepared.script());
            let script = unbound.bind_to_current_context(tc);
            match script.run(tc) {
                Some(result) => Ok(Value::from_local(id, tc, result)),
                None => Err(take_exception(tc)),
            }
        })
    }

    /// The global object of the main context.
    pub fn global(&mut self) -> Result<Object> {
        self.enter(|tc, id| {
            let global = tc.get_current_context().global(tc);
            Ok(Object::from_handle(Handle::new(id, tc, global.into())))
        })
    }

    /// Run every pending promise job.
    pub fn drain_microtasks(&mut self) -> Result<()> {
        self.enter(|tc, _| {
            tc.perform_microtask_checkpoint();
            if tc.has_caught() || tc.has_terminated() {
                return Err(take_exception(tc));
            }
            Ok(())
        })
    }

    /// A handle other threads can use to stop the running script.
    pub fn interrupt_handle(&mut self) -> InterruptHandle {
        InterruptHandle {
            runtime: self.id,
            isolate_handle: self.engine.enter().v8_isolate().thread_safe_handle(),
        }
    }

    /// Enter the engine with an exception guard.
    pub(crate) fn enter<T>(
        &mut self,
        f: impl FnOnce(&mut v8::TryCatch<v8::HandleScope>, RuntimeId) -> Result<T>,
    ) -> Result<T> {
        let id = self.id;
        let mut entered = self.engine.enter();
        let out = {
            let scope = &mut entered.handle_scope();
            let tc = &mut v8::TryCatch::new(scope);
            f(tc, id)
        };
        if let Some(limit) = &self.heap_limit {
            limit.restore(&mut entered);
        }
        out
    }

    /// Like [`Runtime::enter`], for operations that run script. Drains the
    /// microtask queue afterwards when the config asks for it.
    pub(crate) fn enter_script<T>(
        &mut self,
        f: impl FnOnce(&mut v8::TryCatch<v8::HandleScope>, RuntimeId) -> Result<T>,
    ) -> Result<T> {
        let drain = self.config.enable_microtask_queue;
        self.enter(|tc, id| {
            let out = f(tc, id)?;
            if drain {
                tc.perform_microtask_checkpoint();
                if tc.has_caught() || tc.has_terminated() {
                    return Err(take_exception(tc));
                }
            }
            Ok(out)
        })
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        tracing::debug!("[{}] Destroying runtime", self.id);
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("id", &self.id)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Stops scripts that run into `max_heap_size` instead of letting the
/// engine abort the process.
struct HeapLimit {
    runtime: RuntimeId,
    max: usize,
    reached: Arc<AtomicBool>,
}

impl HeapLimit {
    /// Install the near-heap-limit callback. It grants the terminating
    /// script enough headroom to unwind.
    fn arm(&self, js_runtime: &mut JsRuntime) {
        let id = self.runtime;
        let reached = self.reached.clone();
        let isolate_handle = js_runtime.v8_isolate().thread_safe_handle();
        js_runtime.add_near_heap_limit_callback(move |current, _initial| {
            tracing::warn!("[{}] Heap limit reached, terminating script", id);
            reached.store(true, Ordering::SeqCst);
            isolate_handle.terminate_execution();
            current.saturating_mul(2)
        });
    }

    /// Put the configured limit back after the callback raised it.
    fn restore(&self, js_runtime: &mut JsRuntime) {
        if !self.reached.swap(false, Ordering::SeqCst) {
            return;
        }
        tracing::debug!("[{}] Restoring heap limit of {} bytes", self.runtime, self.max);
        js_runtime.v8_isolate().low_memory_notification();
        js_runtime.remove_near_heap_limit_callback(self.max);
        self.arm(js_runtime);
    }
}

/// Requests termination of whatever script a runtime is running.
///
/// May be used from any thread. The interrupted operation fails with a
/// script error and the runtime keeps accepting work.
///
/// The request is not tied to a particular script: if nothing is running
/// when [`InterruptHandle::interrupt`] is called, it stays pending and the
/// next operation that enters the engine fails with `execution terminated`,
/// including operations that run no script such as [`Object::get`].
#[derive(Clone)]
pub struct InterruptHandle {
    runtime: RuntimeId,
    isolate_handle: v8::IsolateHandle,
}

impl InterruptHandle {
    /// Returns `false` if the runtime has already been destroyed.
    ///
    /// Called while the runtime is idle, this fails the next engine entry
    /// instead.
    pub fn interrupt(&self) -> bool {
        tracing::debug!("[{}] Interrupt requested", self.runtime);
        self.isolate_handle.terminate_execution()
    }

    pub fn runtime(&self) -> RuntimeId {
        self.runtime
    }
}

/// Append a `sourceURL` directive so stack traces name the script.
pub(crate) fn with_source_url(source: &str, source_url: &str) -> String {
    if source_url.is_empty() {
        return source.to_string();
    }
    let label: String = source_url
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect();
    format!("{}\n//# sourceURL={}", source, label)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfigBuilder;
    use crate::error::ErrorKind;

    #[test]
    fn test_create_and_destroy() {
        let rt = Runtime::new().unwrap();
        let id = rt.id();
        rt.destroy();

        let config = RuntimeConfigBuilder::new()
            .initial_heap_size(4 << 20)
            .max_heap_size(64 << 20)
            .build()
            .unwrap();
        let rt = Runtime::with_config(&config).unwrap();
        assert_ne!(rt.id(), id);
        assert_eq!(rt.config().max_heap_size, 64 << 20);
    }

    #[test]
    fn test_destroy_in_creation_order() {
        let a = Runtime::new().unwrap();
        let mut b = Runtime::new().unwrap();
        let mut c = Runtime::new().unwrap();
        a.destroy();

        assert_eq!(b.evaluate("6 * 7", "b.js").unwrap().as_number().unwrap(), 42.0);
        let global = c.global().unwrap();
        global.set(&mut c, "name", &Value::from(true)).unwrap();
        b.destroy();

        assert!(c.evaluate("name", "c.js").unwrap().as_bool().unwrap());
        let mut d = Runtime::new().unwrap();
        c.destroy();
        assert_eq!(d.evaluate("1 + 1", "d.js").unwrap().as_number().unwrap(), 2.0);
    }

    #[test]
    fn test_heap_limit_terminates_script() {
        let config = RuntimeConfigBuilder::new()
            .max_heap_size(32 << 20)
            .build()
            .unwrap();
        let mut rt = Runtime::with_config(&config).unwrap();
        let hog = "(() => { const chunks = []; for (;;) chunks.push(new Array(100000).fill(1.5)); })()";

        for _ in 0..2 {
            let err = rt.evaluate(hog, "hog.js").unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Script);
            assert!(err.contains("execution terminated"));
        }
        let value = rt.evaluate("'still ' + 'alive'", "after.js").unwrap();
        assert_eq!(value.to_display_string(&mut rt).unwrap(), "still alive");
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = RuntimeConfig {
            initial_heap_size: 1 << 20,
            ..Default::default()
        };
        let err = Runtime::with_config(&config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Host);
    }

    #[test]
    fn test_evaluate_number() {
        let mut rt = Runtime::new().unwrap();
        let value = rt.evaluate("1 + 2", "add.js").unwrap();
        assert_eq!(value.as_number().unwrap(), 3.0);
    }

    #[test]
    fn test_syntax_error_is_script_error() {
        let mut rt = Runtime::new().unwrap();
        let err = rt.evaluate("let = ;", "broken.js").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Script);
        assert!(err.contains("SyntaxError"));
    }

    #[test]
    fn test_stack_names_source_url() {
        let mut rt = Runtime::new().unwrap();
        let err = rt
            .evaluate("function fail() { throw new Error('boom'); }\nfail();", "my script.js")
            .unwrap_err();
        assert!(err.contains("boom"));
        assert!(err.stack().is_some_and(|s| s.contains("my_script.js")));
    }

    #[test]
    fn test_global_object() {
        let mut rt = Runtime::new().unwrap();
        let global = rt.global().unwrap();
        global.set(&mut rt, "answer", &Value::from(42)).unwrap();
        let value = rt.evaluate("answer + 1", "global.js").unwrap();
        assert_eq!(value.as_number().unwrap(), 43.0);
    }

    #[test]
    fn test_prepared_script() {
        let mut rt = Runtime::new().unwrap();
        rt.evaluate("var counter = 0;", "init.js").unwrap();
        let prepared = rt.prepare("++counter", "bump.js").unwrap();
        assert_eq!(prepared.source_url(), "bump.js");

        for expected in 1..=3 {
            let value = rt.evaluate_prepared(&prepared).unwrap();
            assert_eq!(value.as_number().unwrap(), f64::from(expected));
        }

        let err = rt.prepare("function (", "broken.js").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Script);

        let mut other = Runtime::new().unwrap();
        let err = other.evaluate_prepared(&prepared).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Host);
    }

    #[test]
    fn test_microtasks_drain_on_demand() {
        let mut rt = Runtime::new().unwrap();
        rt.evaluate("var done = false; Promise.resolve().then(() => { done = true; });", "p.js")
            .unwrap();
        assert!(!rt.evaluate("done", "check.js").unwrap().as_bool().unwrap());

        rt.drain_microtasks().unwrap();
        assert!(rt.evaluate("done", "check.js").unwrap().as_bool().unwrap());
    }

    #[test]
    fn test_microtask_queue_enabled() {
        let config = RuntimeConfigBuilder::new()
            .enable_microtask_queue(true)
            .build()
            .unwrap();
        let mut rt = Runtime::with_config(&config).unwrap();
        rt.evaluate("var done = false; Promise.resolve().then(() => { done = true; });", "p.js")
            .unwrap();
        assert!(rt.evaluate("done", "check.js").unwrap().as_bool().unwrap());
    }

    #[test]
    fn test_interrupt_infinite_loop() {
        let mut rt = Runtime::new().unwrap();
        let handle = rt.interrupt_handle();
        assert_eq!(handle.runtime(), rt.id());

        let stopper = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(100));
            handle.interrupt();
        });
        let err = rt.evaluate("while (true) {}", "spin.js").unwrap_err();
        stopper.join().unwrap();

        assert_eq!(err.kind(), ErrorKind::Script);
        assert!(err.contains("execution terminated"));
        assert_eq!(rt.evaluate("2 * 21", "after.js").unwrap().as_number().unwrap(), 42.0);
    }

    #[test]
    fn test_idle_interrupt_fails_next_entry() {
        let mut rt = Runtime::new().unwrap();
        assert!(rt.interrupt_handle().interrupt());

        let err = rt.evaluate("for (let i = 0; i < 1000; i++) {}", "next.js").unwrap_err();
        assert!(err.contains("execution terminated"));
        assert_eq!(rt.evaluate("3", "after.js").unwrap().as_number().unwrap(), 3.0);
    }

    #[test]
    fn test_with_source_url() {
        assert_eq!(with_source_url("1", ""), "1");
        assert_eq!(with_source_url("1", "a b.js"), "1\n//# sourceURL=a_b.js");
    }
}
