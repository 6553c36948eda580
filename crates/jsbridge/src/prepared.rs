//! Scripts parsed once and evaluated many times.

use std::marker::PhantomData;
use std::rc::Rc;

use deno_core::v8;

use crate::handle::RuntimeId;

/// A parsed script bound to the runtime that prepared it.
///
/// Created by [`Runtime::prepare`](crate::Runtime::prepare) and run with
/// [`Runtime::evaluate_prepared`](crate::Runtime::evaluate_prepared).
#[derive(Clone)]
pub struct PreparedScript {
    owner: RuntimeId,
    source_url: String,
    script: v8::Global<v8::UnboundScript>,
    _not_send: PhantomData<Rc<()>>,
}

impl PreparedScript {
    pub(crate) fn new(owner: RuntimeId, source_url: String, script: v8::Global<v8::UnboundScript>) -> Self {
        Self {
            owner,
            source_url,
            script,
            _not_send: PhantomData,
        }
    }

    pub(crate) fn script(&self) -> &v8::Global<v8::UnboundScript> {
        &self.script
    }

    pub fn owner(&self) -> RuntimeId {
        self.owner
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }
}

impl std::fmt::Debug for PreparedScript {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreparedScript")
            .field("owner", &self.owner)
            .field("source_url", &self.source_url)
            .finish()
    }
}
