//! Object handles and property access.

use deno_core::v8;

use crate::array::Array;
use crate::error::{Error, Result};
use crate::exception::take_exception;
use crate::function::Function;
use crate::handle::Handle;
use crate::propname::PropNameId;
use crate::runtime::Runtime;
use crate::string::new_string;
use crate::value::{Value, ValueKind};

/// An object living in a runtime's heap. Arrays and functions are objects.
#[derive(Debug, Clone)]
pub struct Object {
    handle: Handle,
}

impl Object {
    /// Create an empty plain object.
    pub fn new(rt: &mut Runtime) -> Result<Self> {
        rt.enter(|tc, id| {
            let local = v8::Object::new(tc);
            Ok(Self::from_handle(Handle::new(id, tc, local.into())))
        })
    }

    pub(crate) fn from_handle(handle: Handle) -> Self {
        Self { handle }
    }

    pub(crate) fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Read a property. Getters run; a throwing getter is a script error.
    pub fn get(&self, rt: &mut Runtime, name: &str) -> Result<Value> {
        self.handle.check(rt.id())?;
        rt.enter(|tc, id| {
            let obj = self.handle.cast::<v8::Object>(tc)?;
            let key = new_string(tc, name, v8::NewStringType::Internalized)?;
            match obj.get(tc, key.into()) {
                Some(value) => Ok(Value::from_local(id, tc, value)),
                None => Err(take_exception(tc)),
            }
        })
    }

    pub fn get_property(&self, rt: &mut Runtime, name: &PropNameId) -> Result<Value> {
        self.handle.check(rt.id())?;
        name.handle().check(rt.id())?;
        rt.enter(|tc, id| {
            let obj = self.handle.cast::<v8::Object>(tc)?;
            let key = name.handle().open(tc);
            match obj.get(tc, key) {
                Some(value) => Ok(Value::from_local(id, tc, value)),
                None => Err(take_exception(tc)),
            }
        })
    }

    /// Write a property. Setters run; a throwing setter is a script error.
    pub fn set(&self, rt: &mut Runtime, name: &str, value: &Value) -> Result<()> {
        self.handle.check(rt.id())?;
        value.check(rt.id())?;
        rt.enter(|tc, _| {
            let obj = self.handle.cast::<v8::Object>(tc)?;
            let key = new_string(tc, name, v8::NewStringType::Internalized)?;
            let value = value.to_local(tc);
            match obj.set(tc, key.into(), value) {
                Some(_) => Ok(()),
                None => Err(take_exception(tc)),
            }
        })
    }

    pub fn set_property(&self, rt: &mut Runtime, name: &PropNameId, value: &Value) -> Result<()> {
        self.handle.check(rt.id())?;
        name.handle().check(rt.id())?;
        value.check(rt.id())?;
        rt.enter(|tc, _| {
            let obj = self.handle.cast::<v8::Object>(tc)?;
            let key = name.handle().open(tc);
            let value = value.to_local(tc);
            match obj.set(tc, key, value) {
                Some(_) => Ok(()),
                None => Err(take_exception(tc)),
            }
        })
    }

    /// The `in` operator: own or inherited property.
    pub fn has(&self, rt: &mut Runtime, name: &str) -> Result<bool> {
        self.handle.check(rt.id())?;
        rt.enter(|tc, _| {
            let obj = self.handle.cast::<v8::Object>(tc)?;
            let key = new_string(tc, name, v8::NewStringType::Internalized)?;
            obj.has(tc, key.into()).ok_or_else(|| take_exception(tc))
        })
    }

    /// Enumerable string keys, own and inherited, as an array.
    pub fn property_names(&self, rt: &mut Runtime) -> Result<Array> {
        self.handle.check(rt.id())?;
        rt.enter(|tc, id| {
            let obj = self.handle.cast::<v8::Object>(tc)?;
            let args = v8::GetPropertyNamesArgs {
                key_conversion: v8::KeyConversionMode::ConvertToString,
                ..Default::default()
            };
            match obj.get_property_names(tc, args) {
                Some(names) => Ok(Array::from_handle(Handle::new(id, tc, names.into()))),
                None => Err(take_exception(tc)),
            }
        })
    }

    pub fn is_function(&self, rt: &mut Runtime) -> Result<bool> {
        self.handle.check(rt.id())?;
        rt.enter(|tc, _| Ok(self.handle.open(tc).is_function()))
    }

    pub fn is_array(&self, rt: &mut Runtime) -> Result<bool> {
        self.handle.check(rt.id())?;
        rt.enter(|tc, _| Ok(self.handle.open(tc).is_array()))
    }

    /// View this object as a function; a host error if it is not callable.
    pub fn as_function(&self, rt: &mut Runtime) -> Result<Function> {
        if self.is_function(rt)? {
            Ok(Function::from_handle(self.handle.clone()))
        } else {
            Err(Error::host("object is not callable"))
        }
    }

    /// View this object as an array; a host error if it is not one.
    pub fn as_array(&self, rt: &mut Runtime) -> Result<Array> {
        if self.is_array(rt)? {
            Ok(Array::from_handle(self.handle.clone()))
        } else {
            Err(Error::host("object is not an array"))
        }
    }
}

impl From<Object> for Value {
    fn from(obj: Object) -> Self {
        Value::from_handle(ValueKind::Object, obj.handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_get_set_has() {
        let mut rt = Runtime::new().unwrap();
        let obj = Object::new(&mut rt).unwrap();

        obj.set(&mut rt, "speed", &Value::from(3)).unwrap();
        assert!(obj.has(&mut rt, "speed").unwrap());
        assert!(!obj.has(&mut rt, "missing").unwrap());
        assert_eq!(obj.get(&mut rt, "speed").unwrap().as_number().unwrap(), 3.0);
        assert!(obj.get(&mut rt, "missing").unwrap().is_undefined());
        // Inherited from Object.prototype.
        assert!(obj.has(&mut rt, "toString").unwrap());
    }

    #[test]
    fn test_propname_access() {
        let mut rt = Runtime::new().unwrap();
        let obj = Object::new(&mut rt).unwrap();
        let name = PropNameId::new(&mut rt, "label").unwrap();
        let text = Value::from_string(&mut rt, "AHU-1").unwrap();

        obj.set_property(&mut rt, &name, &text).unwrap();
        let got = obj.get_property(&mut rt, &name).unwrap();
        assert_eq!(got.to_display_string(&mut rt).unwrap(), "AHU-1");
    }

    #[test]
    fn test_throwing_getter_is_script_error() {
        let mut rt = Runtime::new().unwrap();
        let obj = rt
            .evaluate("({ get bad() { throw new Error('getter failed'); } })", "getter.js")
            .unwrap()
            .into_object()
            .unwrap();

        let err = obj.get(&mut rt, "bad").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Script);
        assert!(err.contains("getter failed"));

        // The runtime stays usable.
        assert_eq!(rt.evaluate("1", "after.js").unwrap().as_number().unwrap(), 1.0);
    }

    #[test]
    fn test_property_names() {
        let mut rt = Runtime::new().unwrap();
        let obj = rt
            .evaluate("({ a: 1, b: 2, 3: 'x' })", "names.js")
            .unwrap()
            .into_object()
            .unwrap();

        let names = obj.property_names(&mut rt).unwrap();
        let mut keys = Vec::new();
        for i in 0..names.len(&mut rt).unwrap() {
            let key = names.get(&mut rt, i).unwrap();
            keys.push(key.to_display_string(&mut rt).unwrap());
        }
        keys.sort();
        assert_eq!(keys, vec!["3", "a", "b"]);
    }

    #[test]
    fn test_as_function_and_as_array() {
        let mut rt = Runtime::new().unwrap();
        let plain = Object::new(&mut rt).unwrap();
        let err = plain.as_function(&mut rt).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Host);
        assert!(plain.as_array(&mut rt).is_err());

        let func = rt
            .evaluate("(function () { return 1; })", "fn.js")
            .unwrap()
            .into_object()
            .unwrap();
        assert!(func.is_function(&mut rt).unwrap());
        assert!(func.as_function(&mut rt).is_ok());

        let arr = rt.evaluate("[1, 2]", "arr.js").unwrap().into_object().unwrap();
        assert!(arr.is_array(&mut rt).unwrap());
        assert_eq!(arr.as_array(&mut rt).unwrap().len(&mut rt).unwrap(), 2);
    }
}
