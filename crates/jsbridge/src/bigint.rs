//! BigInt handles.

use deno_core::v8;

use crate::error::{Error, Result};
use crate::exception::take_exception;
use crate::handle::Handle;
use crate::runtime::Runtime;
use crate::value::{Value, ValueKind};

/// An arbitrary-precision integer living in a runtime's heap.
#[derive(Debug, Clone)]
pub struct BigInt {
    handle: Handle,
}

impl BigInt {
    pub fn from_i64(rt: &mut Runtime, value: i64) -> Result<Self> {
        rt.enter(|tc, id| {
            let local = v8::BigInt::new_from_i64(tc, value);
            Ok(Self::from_handle(Handle::new(id, tc, local.into())))
        })
    }

    pub fn from_u64(rt: &mut Runtime, value: u64) -> Result<Self> {
        rt.enter(|tc, id| {
            let local = v8::BigInt::new_from_u64(tc, value);
            Ok(Self::from_handle(Handle::new(id, tc, local.into())))
        })
    }

    pub(crate) fn from_handle(handle: Handle) -> Self {
        Self { handle }
    }

    /// Whether the value fits an `i64` without truncation.
    pub fn is_i64(&self, rt: &mut Runtime) -> Result<bool> {
        Ok(self.i64_value(rt)?.1)
    }

    /// Whether the value fits a `u64` without truncation.
    pub fn is_u64(&self, rt: &mut Runtime) -> Result<bool> {
        Ok(self.u64_value(rt)?.1)
    }

    /// The value as an `i64`; a host error if it does not fit.
    pub fn to_i64(&self, rt: &mut Runtime) -> Result<i64> {
        match self.i64_value(rt)? {
            (v, true) => Ok(v),
            (_, false) => Err(Error::host("BigInt does not fit in a signed 64-bit integer")),
        }
    }

    /// The value as a `u64`; a host error if it does not fit.
    pub fn to_u64(&self, rt: &mut Runtime) -> Result<u64> {
        match self.u64_value(rt)? {
            (v, true) => Ok(v),
            (_, false) => Err(Error::host("BigInt does not fit in an unsigned 64-bit integer")),
        }
    }

    /// Digits of the value in `radix` (2 to 36), as `BigInt.prototype.toString`.
    pub fn to_string_radix(&self, rt: &mut Runtime, radix: u32) -> Result<String> {
        if !(2..=36).contains(&radix) {
            return Err(Error::host(format!("radix {} is outside 2..=36", radix)));
        }
        self.handle.check(rt.id())?;
        rt.enter(|tc, _| {
            let local = self.handle.open(tc);
            let Some(boxed) = local.to_object(tc) else {
                return Err(take_exception(tc));
            };
            let key = v8::String::new(tc, "toString")
                .ok_or_else(|| Error::host("failed to allocate property name"))?;
            let Some(method) = boxed.get(tc, key.into()) else {
                return Err(take_exception(tc));
            };
            let method = v8::Local::<v8::Function>::try_from(method)
                .map_err(|_| Error::host("BigInt.prototype.toString is not callable"))?;
            let arg = v8::Integer::new_from_unsigned(tc, radix);
            match method.call(tc, local, &[arg.into()]) {
                Some(digits) => Ok(digits.to_rust_string_lossy(tc)),
                None => Err(take_exception(tc)),
            }
        })
    }

    fn i64_value(&self, rt: &mut Runtime) -> Result<(i64, bool)> {
        self.handle.check(rt.id())?;
        rt.enter(|tc, _| Ok(self.handle.cast::<v8::BigInt>(tc)?.i64_value()))
    }

    fn u64_value(&self, rt: &mut Runtime) -> Result<(u64, bool)> {
        self.handle.check(rt.id())?;
        rt.enter(|tc, _| Ok(self.handle.cast::<v8::BigInt>(tc)?.u64_value()))
    }
}

impl From<BigInt> for Value {
    fn from(b: BigInt) -> Self {
        Value::from_handle(ValueKind::BigInt, b.handle)
    }
}
