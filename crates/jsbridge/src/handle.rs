//! Owned references to engine values.
//!
//! Every string, object, BigInt or symbol handed to the host keeps the engine
//! value alive through a `v8::Global` tagged with the id of the runtime that
//! produced it. Using a handle with any other runtime is rejected before the
//! engine is entered.

use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use deno_core::v8;

use crate::error::{Error, Result};

static NEXT_RUNTIME_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a runtime. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuntimeId(u64);

impl RuntimeId {
    pub(crate) fn next() -> Self {
        RuntimeId(NEXT_RUNTIME_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RuntimeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "runtime#{}", self.0)
    }
}

/// A persistent engine reference owned by one runtime.
///
/// Confined to the thread of its runtime.
#[derive(Clone)]
pub(crate) struct Handle {
    owner: RuntimeId,
    global: v8::Global<v8::Value>,
    _not_send: PhantomData<Rc<()>>,
}

impl Handle {
    pub(crate) fn new(
        owner: RuntimeId,
        scope: &mut v8::HandleScope,
        local: v8::Local<v8::Value>,
    ) -> Self {
        Self {
            owner,
            global: v8::Global::new(scope, local),
            _not_send: PhantomData,
        }
    }

    pub(crate) fn owner(&self) -> RuntimeId {
        self.owner
    }

    /// Reject use with a runtime other than the owner.
    pub(crate) fn check(&self, runtime: RuntimeId) -> Result<()> {
        if self.owner == runtime {
            Ok(())
        } else {
            Err(Error::host(format!(
                "handle belongs to {} and cannot be used with {}",
                self.owner, runtime
            )))
        }
    }

    pub(crate) fn open<'s>(&self, scope: &mut v8::HandleScope<'s>) -> v8::Local<'s, v8::Value> {
        v8::Local::new(scope, &self.global)
    }

    /// Open the handle as a more specific engine type.
    ///
    /// The caller guarantees the kind; a mismatch is reported as misuse.
    pub(crate) fn cast<'s, T>(&self, scope: &mut v8::HandleScope<'s>) -> Result<v8::Local<'s, T>>
    where
        v8::Local<'s, T>: TryFrom<v8::Local<'s, v8::Value>>,
    {
        let local = self.open(scope);
        v8::Local::<T>::try_from(local)
            .map_err(|_| Error::host("handle does not refer to a value of the expected type"))
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle").field("owner", &self.owner).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_ids_are_unique() {
        let a = RuntimeId::next();
        let b = RuntimeId::next();
        assert_ne!(a, b);
        assert!(b > a);
        assert_eq!(a.to_string(), format!("runtime#{}", a.get()));
    }
}
