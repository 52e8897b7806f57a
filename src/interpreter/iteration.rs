//! Iteration protocol
//!
//! `for` loops, comprehensions and builtins that consume iterables all drive an
//! [`IterState`]. Lists, tuples and deques are iterated live so mutation during
//! a loop behaves like Python; dicts, sets and dict views are iterated over a
//! snapshot.

use super::calls::CallArgs;
use super::engine::Interpreter;
use super::errors::{Exec, RuntimeError, Unwind};
use crate::memory::heap::HeapObject;
use crate::memory::value::{ObjectId, Value};
use std::rc::Rc;

pub(crate) enum IterState {
    Sequence { id: ObjectId, index: usize },
    Items(std::vec::IntoIter<Value>),
    Range { next: i64, stop: i64, step: i64 },
    /// Shared heap iterator; advancing it is visible to every holder
    Iterator(ObjectId),
    /// User object implementing `__next__`
    User(Value),
}

impl Interpreter<'_> {
    /// Start iterating a value (`iter(value)` semantics)
    pub(crate) fn iter_start(&mut self, value: &Value) -> Exec<IterState> {
        let id = match value {
            Value::Str(s) => {
                let chars: Vec<Value> = s.chars().map(|c| Value::Str(Rc::from(c.to_string()))).collect();
                return Ok(IterState::Items(chars.into_iter()));
            }
            Value::Bytes(b) => {
                let bytes: Vec<Value> = b.iter().map(|x| Value::Int(*x as i64)).collect();
                return Ok(IterState::Items(bytes.into_iter()));
            }
            Value::Ref(id) => *id,
            _ => return Err(self.not_iterable(value).into()),
        };
        match self.object(id)? {
            HeapObject::List(_) | HeapObject::Tuple(_) | HeapObject::Deque { .. } => {
                Ok(IterState::Sequence { id, index: 0 })
            }
            HeapObject::Dict(map) => {
                let keys: Vec<Value> = map.values().map(|(k, _)| k.clone()).collect();
                Ok(IterState::Items(keys.into_iter()))
            }
            HeapObject::Set(set) => {
                let items: Vec<Value> = set.values().cloned().collect();
                Ok(IterState::Items(items.into_iter()))
            }
            HeapObject::Range { start, stop, step } => Ok(IterState::Range {
                next: *start,
                stop: *stop,
                step: *step,
            }),
            HeapObject::Iterator { kind, items, .. } if kind.starts_with("dict_") => {
                Ok(IterState::Items(items.clone().into_iter()))
            }
            HeapObject::Iterator { .. } => Ok(IterState::Iterator(id)),
            HeapObject::Array(array) => {
                let array = array.clone();
                let rows = self.array_rows(&array);
                Ok(IterState::Items(rows.into_iter()))
            }
            HeapObject::Instance(instance) => {
                let class = instance.class;
                if let Some(iter) = self.user_method(class, "__iter__") {
                    let iterator = self.call_function(iter, CallArgs::positional(vec![value.clone()]))?;
                    if self.instance_method(&iterator, "__next__").is_some() {
                        return Ok(IterState::User(iterator));
                    }
                    return self.iter_start(&iterator);
                }
                if self.user_method(class, "__next__").is_some() {
                    return Ok(IterState::User(value.clone()));
                }
                Err(self.not_iterable(value).into())
            }
            _ => Err(self.not_iterable(value).into()),
        }
    }

    /// Next item, or `None` when exhausted
    pub(crate) fn iter_next(&mut self, state: &mut IterState) -> Exec<Option<Value>> {
        match state {
            IterState::Sequence { id, index } => {
                let item = match self.object(*id)? {
                    HeapObject::List(items) | HeapObject::Tuple(items) => items.get(*index).cloned(),
                    HeapObject::Deque { items, .. } => items.get(*index).cloned(),
                    _ => None,
                };
                *index += 1;
                Ok(item)
            }
            IterState::Items(items) => Ok(items.next()),
            IterState::Range { next, stop, step } => {
                let more = if *step > 0 { *next < *stop } else { *next > *stop };
                if !more {
                    return Ok(None);
                }
                let current = *next;
                *next = next.checked_add(*step).unwrap_or(*stop);
                Ok(Some(Value::Int(current)))
            }
            IterState::Iterator(id) => Ok(self.advance_iterator(*id)?),
            IterState::User(iterator) => {
                let iterator = iterator.clone();
                match self.call_method(iterator, "__next__", Vec::new()) {
                    Ok(value) => Ok(Some(value)),
                    Err(Unwind::Error(exception)) => {
                        let class = self.exception_class_of(&exception)?;
                        if self.heap.is_subclass(class, self.exception_class("StopIteration")?) {
                            Ok(None)
                        } else {
                            Err(Unwind::Error(exception))
                        }
                    }
                    Err(halt) => Err(halt),
                }
            }
        }
    }

    /// Step a heap iterator object
    pub(crate) fn advance_iterator(&mut self, id: ObjectId) -> Result<Option<Value>, RuntimeError> {
        match self.object_mut(id)? {
            HeapObject::Iterator { items, position, .. } => {
                let item = items.get(*position).cloned();
                if item.is_some() {
                    *position += 1;
                }
                Ok(item)
            }
            _ => Ok(None),
        }
    }

    /// Drain an iterable into a vector
    pub(crate) fn collect_iterable(&mut self, value: &Value) -> Exec<Vec<Value>> {
        if let Some(HeapObject::List(items) | HeapObject::Tuple(items)) = self.heap.deref(value) {
            return Ok(items.clone());
        }
        let mut state = self.iter_start(value)?;
        let mut items = Vec::new();
        while let Some(item) = self.iter_next(&mut state)? {
            items.push(item);
        }
        Ok(items)
    }

    /// Allocate a materialized iterator (`enumerate`, `zip`, ...)
    pub(crate) fn make_iterator(&mut self, kind: &'static str, items: Vec<Value>) -> Value {
        self.alloc(HeapObject::Iterator {
            kind,
            items,
            position: 0,
        })
    }

    fn not_iterable(&self, value: &Value) -> RuntimeError {
        RuntimeError::type_error(format!("'{}' object is not iterable", self.type_name(value)))
    }
}
