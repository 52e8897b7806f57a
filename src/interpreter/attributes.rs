//! Attribute access on instances, classes, modules and builtin objects

use super::engine::Interpreter;
use super::errors::{Exec, RuntimeError};
use crate::memory::heap::{DictMap, HeapObject, NdArray};
use crate::memory::value::{HashKey, ObjectId, Value};
use std::rc::Rc;

impl Interpreter<'_> {
    /// `value.name`
    pub(crate) fn get_attribute(&mut self, value: &Value, name: &str) -> Exec<Value> {
        let id = match value {
            Value::Ref(id) => *id,
            Value::Builtin(builtin) if name == "__name__" => return Ok(Value::str(builtin.name())),
            Value::Type(ty) if name == "__name__" => return Ok(Value::str(ty.name())),
            _ if self.has_native_method(value, name) => return Ok(self.native_method(value, name)),
            _ => return Err(self.no_attribute(value, name).into()),
        };

        match self.object(id)? {
            HeapObject::Instance(instance) => {
                if let Some(field) = instance.fields.get(name) {
                    return Ok(field.clone());
                }
                let (class, args) = (instance.class, instance.args.clone());
                match name {
                    "__class__" => return Ok(Value::Ref(class)),
                    "__dict__" => return self.fields_dict(id),
                    "args" if args.is_some() => {
                        return Ok(self.alloc(HeapObject::Tuple(args.unwrap_or_default())));
                    }
                    _ => {}
                }
                if let Some((_, attr)) = self.heap.class_lookup(class, name) {
                    return Ok(self.bind_class_attribute(value.clone(), class, attr));
                }
                if self.has_native_method(value, name) {
                    return Ok(self.native_method(value, name));
                }
                if let Some(getattr) = self.user_method(class, "__getattr__") {
                    let args = vec![value.clone(), Value::str(name)];
                    return self.call_function(getattr, super::calls::CallArgs::positional(args));
                }
                Err(self.no_attribute(value, name).into())
            }
            HeapObject::Class(class) => {
                match name {
                    "__name__" | "__qualname__" => return Ok(Value::str(&class.name)),
                    "__bases__" => {
                        let bases = class.bases.clone();
                        return Ok(self.alloc(HeapObject::Tuple(bases)));
                    }
                    "__mro__" => {
                        let mro = self.heap.mro(id).into_iter().map(Value::Ref).collect();
                        return Ok(self.alloc(HeapObject::Tuple(mro)));
                    }
                    _ => {}
                }
                match self.heap.class_lookup(id, name) {
                    Some((_, attr)) => Ok(self.bind_class_attribute(Value::Ref(id), id, attr)),
                    None => Err(self.no_attribute(value, name).into()),
                }
            }
            HeapObject::Module { attrs, .. } => match attrs.get(name) {
                Some(attr) => Ok(attr.clone()),
                None => Err(self.no_attribute(value, name).into()),
            },
            HeapObject::Super { class, receiver } => {
                let (class, receiver) = (*class, receiver.clone());
                self.super_attribute(class, receiver, name)
            }
            HeapObject::Function(function) => match name {
                "__name__" => Ok(Value::str(&function.def.name)),
                "__qualname__" => Ok(Value::str(&function.qualname)),
                "__defaults__" => {
                    let defaults: Vec<Value> = function.defaults.iter().flatten().cloned().collect();
                    if defaults.is_empty() {
                        Ok(Value::None)
                    } else {
                        Ok(self.alloc(HeapObject::Tuple(defaults)))
                    }
                }
                _ => Err(self.no_attribute(value, name).into()),
            },
            HeapObject::BoundMethod { receiver, function } => match name {
                "__self__" => Ok(receiver.clone()),
                "__func__" => Ok(function.clone()),
                _ => {
                    let function = function.clone();
                    self.get_attribute(&function, name)
                }
            },
            HeapObject::Array(array) => {
                let array = array.clone();
                self.array_attribute(value, &array, name)
            }
            _ if self.has_native_method(value, name) => Ok(self.native_method(value, name)),
            _ => Err(self.no_attribute(value, name).into()),
        }
    }

    /// Binding rules for an attribute found on a class
    fn bind_class_attribute(&mut self, receiver: Value, class: ObjectId, attr: Value) -> Value {
        let is_instance = matches!(self.heap.deref(&receiver), Some(HeapObject::Instance(_)));
        match self.heap.deref(&attr) {
            Some(HeapObject::Function(_)) if is_instance => self.alloc(HeapObject::BoundMethod {
                receiver,
                function: attr,
            }),
            Some(HeapObject::ClassMethod(inner)) => {
                let function = inner.clone();
                self.alloc(HeapObject::BoundMethod {
                    receiver: Value::Ref(class),
                    function,
                })
            }
            Some(HeapObject::StaticMethod(inner)) => inner.clone(),
            _ => attr,
        }
    }

    /// `super().name`: search the receiver's MRO after `class`
    fn super_attribute(&mut self, class: ObjectId, receiver: Value, name: &str) -> Exec<Value> {
        let receiver_class = match self.heap.deref(&receiver) {
            Some(HeapObject::Instance(instance)) => instance.class,
            Some(HeapObject::Class(_)) => receiver.as_ref_id().unwrap_or(class),
            _ => class,
        };
        let mro = self.heap.mro(receiver_class);
        let after = mro.iter().position(|c| *c == class).map_or(mro.len(), |i| i + 1);
        for owner in &mro[after..] {
            let found = match self.heap.get(*owner) {
                Some(HeapObject::Class(def)) => def.attrs.get(name).cloned(),
                _ => None,
            };
            if let Some(attr) = found {
                return Ok(self.bind_class_attribute(receiver, receiver_class, attr));
            }
        }
        if name == "__init__" || self.has_native_method(&receiver, name) {
            return Ok(self.native_method(&receiver, name));
        }
        Err(RuntimeError::AttributeError(format!("'super' object has no attribute '{}'", name)).into())
    }

    fn array_attribute(&mut self, value: &Value, array: &NdArray, name: &str) -> Exec<Value> {
        match name {
            "shape" => {
                let dims = array.shape.iter().map(|d| Value::Int(*d as i64)).collect();
                Ok(self.alloc(HeapObject::Tuple(dims)))
            }
            "dtype" => Ok(Value::str(array.dtype.name())),
            "ndim" => Ok(Value::Int(array.ndim() as i64)),
            "size" => Ok(Value::Int(array.size() as i64)),
            "T" => Ok(self.alloc(HeapObject::Array(super::modules::transpose(array)))),
            _ if self.has_native_method(value, name) => Ok(self.native_method(value, name)),
            _ => Err(self.no_attribute(value, name).into()),
        }
    }

    /// Method of a builtin type bound to `receiver`
    fn native_method(&mut self, receiver: &Value, name: &str) -> Value {
        self.alloc(HeapObject::NativeMethod {
            receiver: receiver.clone(),
            name: Rc::from(name),
        })
    }

    fn fields_dict(&mut self, id: ObjectId) -> Exec<Value> {
        let fields = match self.object(id)? {
            HeapObject::Instance(instance) => instance.fields.clone(),
            _ => Default::default(),
        };
        let map: DictMap = fields
            .into_iter()
            .map(|(k, v)| {
                let key: Rc<str> = Rc::from(k.as_str());
                (HashKey::Str(key.clone()), (Value::Str(key), v))
            })
            .collect();
        Ok(self.alloc(HeapObject::Dict(map)))
    }

    fn no_attribute(&self, value: &Value, name: &str) -> RuntimeError {
        let message = match self.heap.deref(value) {
            Some(HeapObject::Class(class)) => {
                format!("type object '{}' has no attribute '{}'", class.name, name)
            }
            Some(HeapObject::Module { name: module, .. }) => {
                format!("module '{}' has no attribute '{}'", module, name)
            }
            _ => match value {
                Value::Type(ty) => format!("type object '{}' has no attribute '{}'", ty.name(), name),
                _ => format!("'{}' object has no attribute '{}'", self.type_name(value), name),
            },
        };
        RuntimeError::AttributeError(message)
    }

    /// `value.name = new`
    pub(crate) fn set_attribute(&mut self, value: &Value, name: &str, new: Value) -> Exec<()> {
        if let Some(id) = value.as_ref_id() {
            if let Some(setattr) = self.instance_method(value, "__setattr__") {
                let args = vec![value.clone(), Value::str(name), new];
                self.call_function(setattr, super::calls::CallArgs::positional(args))?;
                return Ok(());
            }
            match self.object_mut(id)? {
                HeapObject::Instance(instance) => {
                    instance.fields.insert(name.to_string(), new);
                    return Ok(());
                }
                HeapObject::Class(class) if !class.builtin => {
                    class.attrs.insert(name.to_string(), new);
                    return Ok(());
                }
                HeapObject::Module { attrs, .. } => {
                    attrs.insert(name.to_string(), new);
                    return Ok(());
                }
                _ => {}
            }
        }
        let message = if self.has_native_method(value, name) {
            format!("'{}' object attribute '{}' is read-only", self.type_name(value), name)
        } else {
            format!("'{}' object has no attribute '{}'", self.type_name(value), name)
        };
        Err(RuntimeError::AttributeError(message).into())
    }

    /// `del value.name`
    pub(crate) fn delete_attribute(&mut self, value: &Value, name: &str) -> Exec<()> {
        let removed = match value.as_ref_id().map(|id| self.object_mut(id)).transpose()? {
            Some(HeapObject::Instance(instance)) => instance.fields.shift_remove(name).is_some(),
            Some(HeapObject::Class(class)) if !class.builtin => class.attrs.shift_remove(name).is_some(),
            Some(HeapObject::Module { attrs, .. }) => attrs.shift_remove(name).is_some(),
            _ => false,
        };
        if removed {
            Ok(())
        } else {
            Err(self.no_attribute(value, name).into())
        }
    }

    /// `hasattr(value, name)`
    pub(crate) fn has_attribute(&mut self, value: &Value, name: &str) -> Exec<bool> {
        match self.get_attribute(value, name) {
            Ok(_) => Ok(true),
            Err(super::errors::Unwind::Error(exception)) => {
                let class = self.exception_class_of(&exception)?;
                let attribute_error = self.exception_class("AttributeError")?;
                if self.heap.is_subclass(class, attribute_error) {
                    Ok(false)
                } else {
                    Err(super::errors::Unwind::Error(exception))
                }
            }
            Err(other) => Err(other),
        }
    }
}
