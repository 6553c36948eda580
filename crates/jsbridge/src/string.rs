//! Engine string handles.

use deno_core::v8;

use crate::error::{Error, Result};
use crate::handle::Handle;
use crate::runtime::Runtime;
use crate::value::{Value, ValueKind};

/// A string living in a runtime's heap.
#[derive(Debug, Clone)]
pub struct JsString {
    handle: Handle,
}

impl JsString {
    pub fn new(rt: &mut Runtime, text: &str) -> Result<Self> {
        rt.enter(|tc, id| {
            let local = new_string(tc, text, v8::NewStringType::Normal)?;
            Ok(Self::from_handle(Handle::new(id, tc, local.into())))
        })
    }

    pub(crate) fn from_handle(handle: Handle) -> Self {
        Self { handle }
    }

    /// Copy the string out as UTF-8.
    ///
    /// Unpaired surrogates are replaced with U+FFFD.
    pub fn utf8(&self, rt: &mut Runtime) -> Result<String> {
        self.handle.check(rt.id())?;
        rt.enter(|tc, _| {
            let local = self.handle.cast::<v8::String>(tc)?;
            Ok(local.to_rust_string_lossy(tc))
        })
    }

    /// Length in UTF-16 code units, as `.length` reports it.
    pub fn len(&self, rt: &mut Runtime) -> Result<usize> {
        self.handle.check(rt.id())?;
        rt.enter(|tc, _| Ok(self.handle.cast::<v8::String>(tc)?.length()))
    }

    pub fn is_empty(&self, rt: &mut Runtime) -> Result<bool> {
        Ok(self.len(rt)? == 0)
    }
}

impl From<JsString> for Value {
    fn from(s: JsString) -> Self {
        Value::from_handle(ValueKind::String, s.handle)
    }
}

/// Allocate an engine string, failing when it exceeds the engine's limit.
pub(crate) fn new_string<'s>(
    scope: &mut v8::HandleScope<'s>,
    text: &str,
    kind: v8::NewStringType,
) -> Result<v8::Local<'s, v8::String>> {
    v8::String::new_from_utf8(scope, text.as_bytes(), kind).ok_or_else(|| {
        Error::host(format!(
            "string of {} bytes exceeds the engine's maximum string length",
            text.len()
        ))
    })
}
