//! Property name handles.
//!
//! Property names are internalized strings, so repeated lookups with the same
//! name skip the engine's string hashing.

use deno_core::v8;

use crate::error::Result;
use crate::handle::Handle;
use crate::runtime::Runtime;
use crate::string::{JsString, new_string};

/// An internalized property key.
#[derive(Debug, Clone)]
pub struct PropNameId {
    handle: Handle,
}

impl PropNameId {
    pub fn new(rt: &mut Runtime, name: &str) -> Result<Self> {
        rt.enter(|tc, id| {
            let local = new_string(tc, name, v8::NewStringType::Internalized)?;
            Ok(Self {
                handle: Handle::new(id, tc, local.into()),
            })
        })
    }

    pub fn from_string(rt: &mut Runtime, s: &JsString) -> Result<Self> {
        let name = s.utf8(rt)?;
        Self::new(rt, &name)
    }

    pub(crate) fn handle(&self) -> &Handle {
        &self.handle
    }

    pub fn utf8(&self, rt: &mut Runtime) -> Result<String> {
        self.handle.check(rt.id())?;
        rt.enter(|tc, _| {
            let local = self.handle.cast::<v8::String>(tc)?;
            Ok(local.to_rust_string_lossy(tc))
        })
    }

    pub fn equals(&self, rt: &mut Runtime, other: &PropNameId) -> Result<bool> {
        self.handle.check(rt.id())?;
        other.handle.check(rt.id())?;
        rt.enter(|tc, _| {
            let a = self.handle.open(tc);
            let b = other.handle.open(tc);
            Ok(a.strict_equals(b))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_propname_equality() {
        let mut rt = Runtime::new().unwrap();
        let a = PropNameId::new(&mut rt, "speed").unwrap();
        let b = PropNameId::new(&mut rt, "speed").unwrap();
        let c = PropNameId::new(&mut rt, "setpoint").unwrap();

        assert!(a.equals(&mut rt, &b).unwrap());
        assert!(!a.equals(&mut rt, &c).unwrap());
        assert_eq!(c.utf8(&mut rt).unwrap(), "setpoint");
    }

    #[test]
    fn test_from_string() {
        let mut rt = Runtime::new().unwrap();
        let s = JsString::new(&mut rt, "label").unwrap();
        let name = PropNameId::from_string(&mut rt, &s).unwrap();
        assert_eq!(name.utf8(&mut rt).unwrap(), "label");
    }
}
