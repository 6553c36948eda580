//! Array handles.

use deno_core::v8;

use crate::error::{Error, Result};
use crate::exception::take_exception;
use crate::handle::Handle;
use crate::object::Object;
use crate::runtime::Runtime;
use crate::value::{Value, ValueKind};

/// A JavaScript array living in a runtime's heap.
#[derive(Debug, Clone)]
pub struct Array {
    handle: Handle,
}

impl Array {
    /// Create an array of `len` holes.
    pub fn new(rt: &mut Runtime, len: usize) -> Result<Self> {
        let len = i32::try_from(len)
            .map_err(|_| Error::host(format!("array length {} is too large", len)))?;
        rt.enter(|tc, id| {
            let local = v8::Array::new(tc, len);
            Ok(Self::from_handle(Handle::new(id, tc, local.into())))
        })
    }

    /// Create an array holding `values` in order.
    pub fn from_values(rt: &mut Runtime, values: &[Value]) -> Result<Self> {
        for value in values {
            value.check(rt.id())?;
        }
        rt.enter(|tc, id| {
            let elements: Vec<v8::Local<v8::Value>> =
                values.iter().map(|v| v.to_local(tc)).collect();
            let local = v8::Array::new_with_elements(tc, &elements);
            Ok(Self::from_handle(Handle::new(id, tc, local.into())))
        })
    }

    pub(crate) fn from_handle(handle: Handle) -> Self {
        Self { handle }
    }

    pub fn len(&self, rt: &mut Runtime) -> Result<usize> {
        self.handle.check(rt.id())?;
        rt.enter(|tc, _| Ok(self.handle.cast::<v8::Array>(tc)?.length() as usize))
    }

    pub fn is_empty(&self, rt: &mut Runtime) -> Result<bool> {
        Ok(self.len(rt)? == 0)
    }

    /// Element at `index`; `undefined` past the end.
    pub fn get(&self, rt: &mut Runtime, index: usize) -> Result<Value> {
        self.handle.check(rt.id())?;
        rt.enter(|tc, id| {
            let arr = self.handle.cast::<v8::Array>(tc)?;
            let Ok(index) = u32::try_from(index) else {
                return Ok(Value::undefined());
            };
            if index >= arr.length() {
                return Ok(Value::undefined());
            }
            match arr.get_index(tc, index) {
                Some(value) => Ok(Value::from_local(id, tc, value)),
                None => Err(take_exception(tc)),
            }
        })
    }

    /// Replace the element at `index`. Writing past the end is a host error;
    /// arrays do not grow through this call.
    pub fn set(&self, rt: &mut Runtime, index: usize, value: &Value) -> Result<()> {
        self.handle.check(rt.id())?;
        value.check(rt.id())?;
        rt.enter(|tc, _| {
            let arr = self.handle.cast::<v8::Array>(tc)?;
            let len = arr.length();
            let slot = u32::try_from(index).ok().filter(|i| *i < len).ok_or_else(|| {
                Error::host(format!("index {} out of bounds for array of length {}", index, len))
            })?;
            let value = value.to_local(tc);
            match arr.set_index(tc, slot, value) {
                Some(_) => Ok(()),
                None => Err(take_exception(tc)),
            }
        })
    }

    /// Copy every element out into host-owned values.
    pub fn to_vec(&self, rt: &mut Runtime) -> Result<Vec<Value>> {
        let len = self.len(rt)?;
        (0..len).map(|i| self.get(rt, i)).collect()
    }
}

impl From<Array> for Object {
    fn from(arr: Array) -> Self {
        Object::from_handle(arr.handle)
    }
}

impl From<Array> for Value {
    fn from(arr: Array) -> Self {
        Value::from_handle(ValueKind::Object, arr.handle)
    }
}
