//! Function handles and the call dispatcher.
//!
//! Three distinct entry points cover the ways a host invokes script code:
//! a plain call with an `undefined` receiver, a call with an explicit
//! receiver, and construction through `new`.

use deno_core::v8;

use crate::error::{Error, Result};
use crate::exception::take_exception;
use crate::handle::Handle;
use crate::object::Object;
use crate::runtime::Runtime;
use crate::value::{Value, ValueKind};

/// A callable object living in a runtime's heap.
#[derive(Debug, Clone)]
pub struct Function {
    handle: Handle,
}

impl Function {
    pub(crate) fn from_handle(handle: Handle) -> Self {
        Self { handle }
    }

    /// Call with `this` bound to `undefined`.
    pub fn call(&self, rt: &mut Runtime, args: &[Value]) -> Result<Value> {
        self.dispatch(rt, None, args)
    }

    /// Call with `this` bound to `receiver`.
    pub fn call_with_this(&self, rt: &mut Runtime, receiver: &Object, args: &[Value]) -> Result<Value> {
        receiver.handle().check(rt.id())?;
        self.dispatch(rt, Some(receiver), args)
    }

    /// Invoke as `new f(...args)`.
    ///
    /// Returns whatever construction produced: an object the constructor
    /// returns explicitly takes the place of the fresh instance.
    pub fn call_as_constructor(&self, rt: &mut Runtime, args: &[Value]) -> Result<Value> {
        self.check_args(rt, args)?;
        tracing::trace!("constructing with {} argument(s)", args.len());
        rt.enter_script(|tc, id| {
            let func = self.handle.cast::<v8::Function>(tc)?;
            let argv = materialize(tc, args);
            match func.new_instance(tc, &argv) {
                Some(instance) => Ok(Value::from_local(id, tc, instance.into())),
                None => Err(take_exception(tc)),
            }
        })
    }

    fn dispatch(&self, rt: &mut Runtime, receiver: Option<&Object>, args: &[Value]) -> Result<Value> {
        self.check_args(rt, args)?;
        tracing::trace!("calling with {} argument(s)", args.len());
        rt.enter_script(|tc, id| {
            let func = self.handle.cast::<v8::Function>(tc)?;
            let this = match receiver {
                Some(obj) => obj.handle().open(tc),
                None => v8::undefined(tc).into(),
            };
            let argv = materialize(tc, args);
            match func.call(tc, this, &argv) {
                Some(result) => Ok(Value::from_local(id, tc, result)),
                None => Err(take_exception(tc)),
            }
        })
    }

    /// Validate ownership and count before entering the engine.
    fn check_args(&self, rt: &Runtime, args: &[Value]) -> Result<()> {
        self.handle.check(rt.id())?;
        for arg in args {
            arg.check(rt.id())?;
        }
        let limit = rt.config().max_num_registers;
        if limit != 0 && args.len() > limit as usize {
            return Err(Error::host(format!(
                "{} arguments exceed the configured limit of {}",
                args.len(),
                limit
            )));
        }
        Ok(())
    }
}

fn materialize<'s>(scope: &mut v8::HandleScope<'s>, args: &[Value]) -> Vec<v8::Local<'s, v8::Value>> {
    args.iter().map(|arg| arg.to_local(scope)).collect()
}

impl From<Function> for Object {
    fn from(f: Function) -> Self {
        Object::from_handle(f.handle)
    }
}

impl From<Function> for Value {
    fn from(f: Function) -> Self {
        Value::from_handle(ValueKind::Object, f.handle)
    }
}
