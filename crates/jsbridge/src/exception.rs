//! Translation of caught engine exceptions into [`Error`] values.
//!
//! Every entry into the engine runs inside a `v8::TryCatch`. When the guarded
//! operation returns nothing, the helpers here turn whatever the engine
//! recorded into an [`Error`] so that no exception outlives the call.

use deno_core::v8;

use crate::error::Error;

/// Message used when the engine was asked to stop the running script.
pub(crate) const TERMINATED: &str = "execution terminated";

/// Take the pending exception out of `tc` as a script error.
///
/// A termination request is cancelled here so the isolate accepts new work.
pub(crate) fn take_exception(tc: &mut v8::TryCatch<v8::HandleScope>) -> Error {
    if tc.has_terminated() || tc.is_execution_terminating() {
        tc.cancel_terminate_execution();
        tracing::debug!("script execution was terminated");
        return Error::script(TERMINATED);
    }

    let Some(exception) = tc.exception() else {
        return Error::script("unknown exception");
    };

    let message = describe(tc, exception);
    let stack = tc
        .stack_trace()
        .and_then(|s| s.to_string(tc))
        .map(|s| s.to_rust_string_lossy(tc))
        .filter(|s| !s.is_empty() && *s != message)
        .or_else(|| location(tc));

    Error::Script { message, stack }
}

/// Take the pending exception out of `tc` as a compile error.
///
/// The diagnostic includes the source location the compiler reported.
pub(crate) fn take_compile_error(tc: &mut v8::TryCatch<v8::HandleScope>) -> Error {
    match take_exception(tc) {
        Error::Script { message, stack } => match stack {
            Some(at) if !at.contains('\n') => Error::Compile(format!("{} ({})", message, at)),
            _ => Error::Compile(message),
        },
        other => other,
    }
}

/// Run the engine's `ToString` on an exception value.
///
/// Exceptions whose `toString` throws in turn are reported by type only.
fn describe(tc: &mut v8::TryCatch<v8::HandleScope>, exception: v8::Local<v8::Value>) -> String {
    let text = {
        let inner = &mut v8::TryCatch::new(tc);
        exception
            .to_string(inner)
            .map(|s| s.to_rust_string_lossy(inner))
    };
    match text {
        Some(text) => text,
        None => format!(
            "uncaught {}",
            exception.type_of(tc).to_rust_string_lossy(tc)
        ),
    }
}

/// `resource:line:column` of the pending message, if the engine recorded one.
fn location(tc: &mut v8::TryCatch<v8::HandleScope>) -> Option<String> {
    let message = tc.message()?;
    let line = message.get_line_number(tc)?;
    let column = message.get_start_column() + 1;
    let resource = message
        .get_script_resource_name(tc)
        .filter(|name| !name.is_undefined())
        .and_then(|name| name.to_string(tc))
        .map(|name| name.to_rust_string_lossy(tc))
        .unwrap_or_else(|| "<anonymous>".to_string());
    Some(format!("{}:{}:{}", resource, line, column))
}
