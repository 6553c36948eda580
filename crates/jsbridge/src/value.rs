//! The tagged value type crossing the bridge.
//!
//! Primitives (`undefined`, `null`, booleans and numbers) are held by value
//! and need no runtime. Strings, objects, BigInts and symbols hold an engine
//! reference owned by the runtime that produced them.

use std::fmt;

use deno_core::serde_v8;
use deno_core::v8;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::bigint::BigInt;
use crate::error::{Error, Result};
use crate::exception::take_exception;
use crate::handle::{Handle, RuntimeId};
use crate::object::Object;
use crate::runtime::Runtime;
use crate::string::JsString;

/// Type tag of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Undefined,
    Null,
    Bool,
    Number,
    String,
    Object,
    BigInt,
    Symbol,
}

impl ValueKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ValueKind::Undefined => "undefined",
            ValueKind::Null => "null",
            ValueKind::Bool => "boolean",
            ValueKind::Number => "number",
            ValueKind::String => "string",
            ValueKind::Object => "object",
            ValueKind::BigInt => "bigint",
            ValueKind::Symbol => "symbol",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone)]
enum Repr {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Ref(ValueKind, Handle),
}

/// A JavaScript value.
#[derive(Clone)]
pub struct Value {
    repr: Repr,
}

impl Value {
    pub fn undefined() -> Self {
        Self { repr: Repr::Undefined }
    }

    pub fn null() -> Self {
        Self { repr: Repr::Null }
    }

    pub fn from_bool(b: bool) -> Self {
        Self { repr: Repr::Bool(b) }
    }

    pub fn from_number(n: f64) -> Self {
        Self { repr: Repr::Number(n) }
    }

    /// Create a string value in `rt`.
    pub fn from_string(rt: &mut Runtime, s: &str) -> Result<Self> {
        Ok(JsString::new(rt, s)?.into())
    }

    /// Convert any serializable host value into an engine value.
    pub fn from_serde<T: Serialize + ?Sized>(rt: &mut Runtime, value: &T) -> Result<Self> {
        rt.enter(|tc, id| {
            let local = serde_v8::to_v8(tc, value)
                .map_err(|e| Error::host(format!("failed to convert host value: {}", e)))?;
            Ok(Value::from_local(id, tc, local))
        })
    }

    /// Wrap a local engine value, classifying it by type.
    pub(crate) fn from_local(
        owner: RuntimeId,
        scope: &mut v8::HandleScope,
        local: v8::Local<v8::Value>,
    ) -> Self {
        let repr = if local.is_undefined() {
            Repr::Undefined
        } else if local.is_null() {
            Repr::Null
        } else if local.is_boolean() {
            Repr::Bool(local.is_true())
        } else if let Ok(number) = v8::Local::<v8::Number>::try_from(local) {
            Repr::Number(number.value())
        } else {
            let kind = if local.is_string() {
                ValueKind::String
            } else if local.is_big_int() {
                ValueKind::BigInt
            } else if local.is_symbol() {
                ValueKind::Symbol
            } else {
                ValueKind::Object
            };
            Repr::Ref(kind, Handle::new(owner, scope, local))
        };
        Self { repr }
    }

    pub(crate) fn from_handle(kind: ValueKind, handle: Handle) -> Self {
        Self {
            repr: Repr::Ref(kind, handle),
        }
    }

    /// Reject use with a runtime other than the owner. Primitives pass.
    pub(crate) fn check(&self, runtime: RuntimeId) -> Result<()> {
        match &self.repr {
            Repr::Ref(_, handle) => handle.check(runtime),
            _ => Ok(()),
        }
    }

    pub(crate) fn to_local<'s>(&self, scope: &mut v8::HandleScope<'s>) -> v8::Local<'s, v8::Value> {
        match &self.repr {
            Repr::Undefined => v8::undefined(scope).into(),
            Repr::Null => v8::null(scope).into(),
            Repr::Bool(b) => v8::Boolean::new(scope, *b).into(),
            Repr::Number(n) => v8::Number::new(scope, *n).into(),
            Repr::Ref(_, handle) => handle.open(scope),
        }
    }

    pub fn kind(&self) -> ValueKind {
        match &self.repr {
            Repr::Undefined => ValueKind::Undefined,
            Repr::Null => ValueKind::Null,
            Repr::Bool(_) => ValueKind::Bool,
            Repr::Number(_) => ValueKind::Number,
            Repr::Ref(kind, _) => *kind,
        }
    }

    /// The runtime a reference value belongs to. `None` for primitives.
    pub fn owner(&self) -> Option<RuntimeId> {
        match &self.repr {
            Repr::Ref(_, handle) => Some(handle.owner()),
            _ => None,
        }
    }

    pub fn is_undefined(&self) -> bool {
        self.kind() == ValueKind::Undefined
    }

    pub fn is_null(&self) -> bool {
        self.kind() == ValueKind::Null
    }

    pub fn is_bool(&self) -> bool {
        self.kind() == ValueKind::Bool
    }

    pub fn is_number(&self) -> bool {
        self.kind() == ValueKind::Number
    }

    pub fn is_string(&self) -> bool {
        self.kind() == ValueKind::String
    }

    pub fn is_object(&self) -> bool {
        self.kind() == ValueKind::Object
    }

    pub fn is_bigint(&self) -> bool {
        self.kind() == ValueKind::BigInt
    }

    pub fn is_symbol(&self) -> bool {
        self.kind() == ValueKind::Symbol
    }

    pub fn as_bool(&self) -> Result<bool> {
        match self.repr {
            Repr::Bool(b) => Ok(b),
            _ => Err(self.mismatch(ValueKind::Bool)),
        }
    }

    pub fn as_number(&self) -> Result<f64> {
        match self.repr {
            Repr::Number(n) => Ok(n),
            _ => Err(self.mismatch(ValueKind::Number)),
        }
    }

    /// The engine's `ToString` of this value.
    ///
    /// Values whose conversion throws (symbols, objects with a throwing
    /// `toString`) yield a script error.
    pub fn as_string(&self, rt: &mut Runtime) -> Result<JsString> {
        self.check(rt.id())?;
        if let Repr::Ref(ValueKind::String, handle) = &self.repr {
            return Ok(JsString::from_handle(handle.clone()));
        }
        rt.enter(|tc, id| {
            let local = self.to_local(tc);
            match local.to_string(tc) {
                Some(s) => Ok(JsString::from_handle(Handle::new(id, tc, s.into()))),
                None => Err(take_exception(tc)),
            }
        })
    }

    /// The engine's `ToObject` of this value.
    ///
    /// `null` and `undefined` yield a script error.
    pub fn as_object(&self, rt: &mut Runtime) -> Result<Object> {
        self.check(rt.id())?;
        if let Repr::Ref(ValueKind::Object, handle) = &self.repr {
            return Ok(Object::from_handle(handle.clone()));
        }
        rt.enter(|tc, id| {
            let local = self.to_local(tc);
            match local.to_object(tc) {
                Some(obj) => Ok(Object::from_handle(Handle::new(id, tc, obj.into()))),
                None => Err(take_exception(tc)),
            }
        })
    }

    /// The engine's `ToBigInt` of this value.
    ///
    /// Numbers, `null` and `undefined` yield a script error.
    pub fn as_bigint(&self, rt: &mut Runtime) -> Result<BigInt> {
        self.check(rt.id())?;
        if let Repr::Ref(ValueKind::BigInt, handle) = &self.repr {
            return Ok(BigInt::from_handle(handle.clone()));
        }
        rt.enter(|tc, id| {
            let local = self.to_local(tc);
            match local.to_big_int(tc) {
                Some(big) => Ok(BigInt::from_handle(Handle::new(id, tc, big.into()))),
                None => Err(take_exception(tc)),
            }
        })
    }

    /// Move an object value into an [`Object`] without entering the engine.
    pub fn into_object(self) -> Result<Object> {
        match self.repr {
            Repr::Ref(ValueKind::Object, handle) => Ok(Object::from_handle(handle)),
            _ => Err(self.mismatch(ValueKind::Object)),
        }
    }

    /// Deserialize this value into a host type.
    pub fn to_serde<T: DeserializeOwned>(&self, rt: &mut Runtime) -> Result<T> {
        self.check(rt.id())?;
        rt.enter(|tc, _| {
            let local = self.to_local(tc);
            serde_v8::from_v8(tc, local)
                .map_err(|e| Error::host(format!("failed to convert {} value: {}", self.kind(), e)))
        })
    }

    /// `===` between two values of the same runtime.
    pub fn strict_equals(&self, rt: &mut Runtime, other: &Value) -> Result<bool> {
        self.check(rt.id())?;
        other.check(rt.id())?;
        match (&self.repr, &other.repr) {
            (Repr::Ref(..), _) | (_, Repr::Ref(..)) => rt.enter(|tc, _| {
                let a = self.to_local(tc);
                let b = other.to_local(tc);
                Ok(a.strict_equals(b))
            }),
            (Repr::Undefined, Repr::Undefined) | (Repr::Null, Repr::Null) => Ok(true),
            (Repr::Bool(a), Repr::Bool(b)) => Ok(a == b),
            (Repr::Number(a), Repr::Number(b)) => Ok(a == b),
            _ => Ok(false),
        }
    }

    /// Printable form of the value, as `String(value)` would produce.
    pub fn to_display_string(&self, rt: &mut Runtime) -> Result<String> {
        match &self.repr {
            Repr::Undefined => Ok("undefined".to_string()),
            Repr::Null => Ok("null".to_string()),
            Repr::Bool(b) => Ok(b.to_string()),
            Repr::Number(_) | Repr::Ref(..) => {
                self.check(rt.id())?;
                rt.enter(|tc, _| {
                    let local = self.to_local(tc);
                    if let Ok(symbol) = v8::Local::<v8::Symbol>::try_from(local) {
                        let description = symbol.description(tc);
                        let text = if description.is_undefined() {
                            String::new()
                        } else {
                            description
                                .to_string(tc)
                                .map(|s| s.to_rust_string_lossy(tc))
                                .unwrap_or_default()
                        };
                        return Ok(format!("Symbol({})", text));
                    }
                    match local.to_string(tc) {
                        Some(s) => Ok(s.to_rust_string_lossy(tc)),
                        None => Err(take_exception(tc)),
                    }
                })
            }
        }
    }

    fn mismatch(&self, expected: ValueKind) -> Error {
        Error::host(format!("expected a {} value, found {}", expected, self.kind()))
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::undefined()
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::from_bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::from_number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::from_number(f64::from(n))
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::undefined()
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.repr {
            Repr::Undefined => f.write_str("undefined"),
            Repr::Null => f.write_str("null"),
            Repr::Bool(b) => write!(f, "{}", b),
            Repr::Number(n) => write!(f, "{}", n),
            Repr::Ref(kind, handle) => write!(f, "<{} in {}>", kind, handle.owner()),
        }
    }
}
