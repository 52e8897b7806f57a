//! Subscription, membership, hashing and length

use super::calls::CallArgs;
use super::engine::Interpreter;
use super::errors::{Exec, RuntimeError};
use crate::memory::heap::{range_len, HeapObject};
use crate::memory::value::{HashKey, Value};
use std::rc::Rc;

/// Evaluated subscript: a plain value, a slice, or a multi-axis index
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum IndexValue {
    Single(Value),
    Slice {
        lower: Option<i64>,
        upper: Option<i64>,
        step: Option<i64>,
    },
    Multi(Vec<IndexValue>),
}

/// Resolve slice bounds against a sequence length, returning `(start, stop, step)`
pub(crate) fn slice_bounds(
    len: usize,
    lower: Option<i64>,
    upper: Option<i64>,
    step: Option<i64>,
) -> Result<(i64, i64, i64), RuntimeError> {
    let len = len as i64;
    let step = step.unwrap_or(1);
    if step == 0 {
        return Err(RuntimeError::value_error("slice step cannot be zero"));
    }
    let clamp = |bound: i64, low: i64, high: i64| {
        let bound = if bound < 0 { bound + len } else { bound };
        bound.clamp(low, high)
    };
    let (start, stop) = if step > 0 {
        (
            lower.map_or(0, |b| clamp(b, 0, len)),
            upper.map_or(len, |b| clamp(b, 0, len)),
        )
    } else {
        (
            lower.map_or(len - 1, |b| clamp(b, -1, len - 1)),
            upper.map_or(-1, |b| clamp(b, -1, len - 1)),
        )
    };
    Ok((start, stop, step))
}

/// Positions selected by a slice, in order
pub(crate) fn slice_positions(
    len: usize,
    lower: Option<i64>,
    upper: Option<i64>,
    step: Option<i64>,
) -> Result<Vec<usize>, RuntimeError> {
    let (start, stop, step) = slice_bounds(len, lower, upper, step)?;
    let mut positions = Vec::new();
    let mut i = start;
    while (step > 0 && i < stop) || (step < 0 && i > stop) {
        positions.push(i as usize);
        i += step;
    }
    Ok(positions)
}

/// Resolve a possibly negative index
pub(crate) fn normalize_index(index: i64, len: usize) -> Option<usize> {
    let resolved = if index < 0 { index + len as i64 } else { index };
    (0..len as i64).contains(&resolved).then_some(resolved as usize)
}

impl Interpreter<'_> {
    /// Integer position from a subscript value
    fn position(&self, index: &Value, len: usize, kind: &str, what: &str) -> Exec<usize> {
        let Some(n) = index.as_int() else {
            return Err(RuntimeError::type_error(format!(
                "{} indices must be integers or slices, not {}",
                kind,
                self.type_name(index)
            ))
            .into());
        };
        normalize_index(n, len)
            .ok_or_else(|| RuntimeError::IndexError(format!("{} {} out of range", kind, what)).into())
    }

    /// `object[index]`
    pub(crate) fn get_item(&mut self, object: &Value, index: &IndexValue) -> Exec<Value> {
        match (object, index) {
            (Value::Str(s), IndexValue::Single(i)) => {
                let Some(n) = i.as_int() else {
                    return Err(RuntimeError::type_error(format!(
                        "string indices must be integers, not '{}'",
                        self.type_name(i)
                    ))
                    .into());
                };
                let len = s.chars().count();
                let position = normalize_index(n, len)
                    .ok_or_else(|| RuntimeError::IndexError("string index out of range".into()))?;
                let c = s.chars().nth(position).unwrap_or_default();
                return Ok(Value::str(&c.to_string()));
            }
            (Value::Str(s), IndexValue::Slice { lower, upper, step }) => {
                let chars: Vec<char> = s.chars().collect();
                let positions = slice_positions(chars.len(), *lower, *upper, *step)?;
                let text: String = positions.into_iter().map(|p| chars[p]).collect();
                return Ok(Value::str(&text));
            }
            (Value::Bytes(b), IndexValue::Single(i)) => {
                let position = self.position(i, b.len(), "byte", "index")?;
                return Ok(Value::Int(b[position] as i64));
            }
            (Value::Bytes(b), IndexValue::Slice { lower, upper, step }) => {
                let positions = slice_positions(b.len(), *lower, *upper, *step)?;
                let bytes: Vec<u8> = positions.into_iter().map(|p| b[p]).collect();
                return Ok(Value::Bytes(Rc::from(bytes)));
            }
            (Value::Ref(_), _) => {}
            (Value::Type(_), IndexValue::Single(_)) => return Ok(object.clone()),
            _ => {
                return Err(RuntimeError::type_error(format!(
                    "'{}' object is not subscriptable",
                    self.type_name(object)
                ))
                .into())
            }
        }

        let Some(id) = object.as_ref_id() else {
            return Err(RuntimeError::Internal("subscript of a non-heap value".into()).into());
        };
        if let Some(getitem) = self.instance_method(object, "__getitem__") {
            let key = self.index_to_value(index)?;
            return self.call_function(getitem, CallArgs::positional(vec![object.clone(), key]));
        }
        let kind = self.type_name(object);
        match (self.object(id)?, index) {
            (HeapObject::List(items) | HeapObject::Tuple(items), IndexValue::Single(i)) => {
                let position = self.position(i, items.len(), &kind, "index")?;
                Ok(items[position].clone())
            }
            (HeapObject::List(items), IndexValue::Slice { lower, upper, step }) => {
                let positions = slice_positions(items.len(), *lower, *upper, *step)?;
                let picked = positions.into_iter().map(|p| items[p].clone()).collect();
                Ok(self.alloc(HeapObject::List(picked)))
            }
            (HeapObject::Tuple(items), IndexValue::Slice { lower, upper, step }) => {
                let positions = slice_positions(items.len(), *lower, *upper, *step)?;
                let picked = positions.into_iter().map(|p| items[p].clone()).collect();
                Ok(self.alloc(HeapObject::Tuple(picked)))
            }
            (HeapObject::Deque { items, .. }, IndexValue::Single(i)) => {
                let position = self.position(i, items.len(), "deque", "index")?;
                Ok(items[position].clone())
            }
            (HeapObject::Dict(_), IndexValue::Single(key)) => {
                let hash = self.hash(key)?;
                match self.object(id)? {
                    HeapObject::Dict(map) => match map.get(&hash) {
                        Some((_, value)) => Ok(value.clone()),
                        None => {
                            let rendered = self.repr(key)?;
                            Err(RuntimeError::KeyError(rendered).into())
                        }
                    },
                    _ => Err(RuntimeError::Internal("dict changed during lookup".into()).into()),
                }
            }
            (HeapObject::Range { start, step, .. }, IndexValue::Single(i)) => {
                let (start, step) = (*start, *step);
                let len = self.object(id)?.len().unwrap_or(0);
                let position = self.position(i, len, "range object", "index")?;
                Ok(Value::Int(start + position as i64 * step))
            }
            (HeapObject::Range { start, step, .. }, IndexValue::Slice { lower, upper, step: s }) => {
                let (start, range_step) = (*start, *step);
                let len = self.object(id)?.len().unwrap_or(0);
                let positions = slice_positions(len, *lower, *upper, *s)?;
                let new_step = range_step * s.unwrap_or(1);
                let first = positions.first().map_or(start, |p| start + *p as i64 * range_step);
                let stop = first + positions.len() as i64 * new_step;
                Ok(self.alloc(HeapObject::Range {
                    start: first,
                    stop,
                    step: new_step,
                }))
            }
            (HeapObject::Array(array), _) => {
                let array = array.clone();
                self.array_get_item(&array, index)
            }
            (HeapObject::Deque { .. }, IndexValue::Slice { .. }) => {
                Err(RuntimeError::type_error("sequence index must be integer, not 'slice'").into())
            }
            (HeapObject::List(_) | HeapObject::Tuple(_), IndexValue::Multi(_)) => Err(RuntimeError::type_error(
                format!("{} indices must be integers or slices, not tuple", kind),
            )
            .into()),
            (HeapObject::Class(_), IndexValue::Single(_)) => Ok(object.clone()),
            _ => Err(RuntimeError::type_error(format!("'{}' object is not subscriptable", kind)).into()),
        }
    }

    /// Plain value handed to a user `__getitem__`
    fn index_to_value(&mut self, index: &IndexValue) -> Exec<Value> {
        match index {
            IndexValue::Single(value) => Ok(value.clone()),
            IndexValue::Multi(parts) => {
                let values = parts
                    .iter()
                    .map(|part| self.index_to_value(part))
                    .collect::<Exec<Vec<_>>>()?;
                Ok(self.alloc(HeapObject::Tuple(values)))
            }
            IndexValue::Slice { .. } => {
                Err(RuntimeError::type_error("slicing user-defined objects is not supported").into())
            }
        }
    }

    /// `object[index] = value`
    pub(crate) fn set_item(&mut self, object: &Value, index: &IndexValue, value: Value) -> Exec<()> {
        if let Some(setitem) = self.instance_method(object, "__setitem__") {
            let key = self.index_to_value(index)?;
            self.call_function(setitem, CallArgs::positional(vec![object.clone(), key, value]))?;
            return Ok(());
        }
        let Some(id) = object.as_ref_id() else {
            return Err(self.no_item_assignment(object).into());
        };
        match (self.object(id)?, index) {
            (HeapObject::List(items), IndexValue::Single(i)) => {
                let position = self.position(i, items.len(), "list", "assignment index")?;
                if let HeapObject::List(items) = self.object_mut(id)? {
                    items[position] = value;
                }
                Ok(())
            }
            (HeapObject::List(items), IndexValue::Slice { lower, upper, step }) => {
                let len = items.len();
                let replacement = self.collect_iterable(&value)?;
                if step.unwrap_or(1) == 1 {
                    let (start, stop, _) = slice_bounds(len, *lower, *upper, None)?;
                    let start = start as usize;
                    let stop = (stop as usize).max(start);
                    if let HeapObject::List(items) = self.object_mut(id)? {
                        items.splice(start..stop, replacement);
                    }
                    return Ok(());
                }
                let positions = slice_positions(len, *lower, *upper, *step)?;
                if positions.len() != replacement.len() {
                    return Err(RuntimeError::value_error(format!(
                        "attempt to assign sequence of size {} to extended slice of size {}",
                        replacement.len(),
                        positions.len()
                    ))
                    .into());
                }
                if let HeapObject::List(items) = self.object_mut(id)? {
                    for (position, item) in positions.into_iter().zip(replacement) {
                        items[position] = item;
                    }
                }
                Ok(())
            }
            (HeapObject::Deque { items, .. }, IndexValue::Single(i)) => {
                let position = self.position(i, items.len(), "deque", "index")?;
                if let HeapObject::Deque { items, .. } = self.object_mut(id)? {
                    items[position] = value;
                }
                Ok(())
            }
            (HeapObject::Dict(_), IndexValue::Single(key)) => {
                let hash = self.hash(key)?;
                let key = key.clone();
                if let HeapObject::Dict(map) = self.object_mut(id)? {
                    match map.get_mut(&hash) {
                        Some(entry) => entry.1 = value,
                        None => {
                            map.insert(hash, (key, value));
                        }
                    }
                }
                Ok(())
            }
            (HeapObject::Array(_), _) => self.array_set_item(id, index, value),
            _ => Err(self.no_item_assignment(object).into()),
        }
    }

    fn no_item_assignment(&self, object: &Value) -> RuntimeError {
        RuntimeError::type_error(format!(
            "'{}' object does not support item assignment",
            self.type_name(object)
        ))
    }

    /// `del object[index]`
    pub(crate) fn delete_item(&mut self, object: &Value, index: &IndexValue) -> Exec<()> {
        if let Some(delitem) = self.instance_method(object, "__delitem__") {
            let key = self.index_to_value(index)?;
            self.call_function(delitem, CallArgs::positional(vec![object.clone(), key]))?;
            return Ok(());
        }
        let Some(id) = object.as_ref_id() else {
            return Err(self.no_item_deletion(object).into());
        };
        match (self.object(id)?, index) {
            (HeapObject::List(items), IndexValue::Single(i)) => {
                let position = self.position(i, items.len(), "list", "assignment index")?;
                if let HeapObject::List(items) = self.object_mut(id)? {
                    items.remove(position);
                }
                Ok(())
            }
            (HeapObject::List(items), IndexValue::Slice { lower, upper, step }) => {
                let mut positions = slice_positions(items.len(), *lower, *upper, *step)?;
                positions.sort_unstable();
                if let HeapObject::List(items) = self.object_mut(id)? {
                    for position in positions.into_iter().rev() {
                        items.remove(position);
                    }
                }
                Ok(())
            }
            (HeapObject::Deque { items, .. }, IndexValue::Single(i)) => {
                let position = self.position(i, items.len(), "deque", "index")?;
                if let HeapObject::Deque { items, .. } = self.object_mut(id)? {
                    items.remove(position);
                }
                Ok(())
            }
            (HeapObject::Dict(_), IndexValue::Single(key)) => {
                let hash = self.hash(key)?;
                let removed = match self.object_mut(id)? {
                    HeapObject::Dict(map) => map.shift_remove(&hash).is_some(),
                    _ => false,
                };
                if removed {
                    Ok(())
                } else {
                    let rendered = self.repr(key)?;
                    Err(RuntimeError::KeyError(rendered).into())
                }
            }
            _ => Err(self.no_item_deletion(object).into()),
        }
    }

    fn no_item_deletion(&self, object: &Value) -> RuntimeError {
        RuntimeError::type_error(format!(
            "'{}' object doesn't support item deletion",
            self.type_name(object)
        ))
    }

    /// `item in container`
    pub(crate) fn contains(&mut self, container: &Value, item: &Value) -> Exec<bool> {
        match container {
            Value::Str(haystack) => {
                return match item {
                    Value::Str(needle) => Ok(haystack.contains(needle.as_ref())),
                    _ => Err(RuntimeError::type_error(format!(
                        "'in <string>' requires string as left operand, not {}",
                        self.type_name(item)
                    ))
                    .into()),
                };
            }
            Value::Bytes(haystack) => {
                return match item {
                    Value::Int(n) => Ok(haystack.iter().any(|b| *b as i64 == *n)),
                    Value::Bytes(needle) if needle.is_empty() => Ok(true),
                    Value::Bytes(needle) => Ok(haystack.windows(needle.len()).any(|w| w == needle.as_ref())),
                    _ => Err(RuntimeError::type_error("a bytes-like object is required").into()),
                };
            }
            Value::Ref(_) => {}
            _ => {
                return Err(RuntimeError::type_error(format!(
                    "argument of type '{}' is not iterable",
                    self.type_name(container)
                ))
                .into())
            }
        }
        if let Some(method) = self.instance_method(container, "__contains__") {
            let result = self.call_function(method, CallArgs::positional(vec![container.clone(), item.clone()]))?;
            return self.truthy(&result);
        }
        match self.heap.deref(container) {
            Some(HeapObject::Dict(_)) => {
                let hash = self.hash(item)?;
                Ok(matches!(self.heap.deref(container), Some(HeapObject::Dict(map)) if map.contains_key(&hash)))
            }
            Some(HeapObject::Set(_)) => {
                let hash = self.hash(item)?;
                Ok(matches!(self.heap.deref(container), Some(HeapObject::Set(set)) if set.contains_key(&hash)))
            }
            Some(HeapObject::Range { start, stop, step }) => {
                let (start, stop, step) = (*start, *stop, *step);
                let n = match item {
                    Value::Int(n) => *n,
                    Value::Bool(b) => *b as i64,
                    Value::Float(x) if x.fract() == 0.0 => *x as i64,
                    _ => return Ok(false),
                };
                let inside = if step > 0 { n >= start && n < stop } else { n <= start && n > stop };
                Ok(inside && (n - start) % step == 0)
            }
            _ => {
                let mut state = self.iter_start(container)?;
                while let Some(candidate) = self.iter_next(&mut state)? {
                    if self.values_equal(&candidate, item)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        }
    }

    /// Dict/set key for a value; unhashable values raise `TypeError`
    pub(crate) fn hash(&self, value: &Value) -> Exec<HashKey> {
        self.heap
            .hash_key(value)
            .map_err(|name| RuntimeError::type_error(format!("unhashable type: '{}'", name)).into())
    }

    /// `len(value)`
    pub(crate) fn len(&mut self, value: &Value) -> Exec<usize> {
        match value {
            Value::Str(s) => return Ok(s.chars().count()),
            Value::Bytes(b) => return Ok(b.len()),
            _ => {}
        }
        if let Some(method) = self.instance_method(value, "__len__") {
            let result = self.call_function(method, CallArgs::positional(vec![value.clone()]))?;
            return match result.as_int() {
                Some(n) if n >= 0 => Ok(n as usize),
                Some(_) => Err(RuntimeError::value_error("__len__() should return >= 0").into()),
                None => Err(RuntimeError::type_error(format!(
                    "'{}' object cannot be interpreted as an integer",
                    self.type_name(&result)
                ))
                .into()),
            };
        }
        match self.heap.deref(value) {
            Some(HeapObject::Range { start, stop, step }) => Ok(range_len(*start, *stop, *step)),
            Some(HeapObject::Iterator { kind, items, .. }) if kind.starts_with("dict_") => Ok(items.len()),
            Some(HeapObject::Iterator { .. }) | None => Err(RuntimeError::type_error(format!(
                "object of type '{}' has no len()",
                self.type_name(value)
            ))
            .into()),
            Some(object) => object.len().ok_or_else(|| {
                RuntimeError::type_error(format!("object of type '{}' has no len()", self.type_name(value))).into()
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slice_positions_forward_and_backward() {
        assert_eq!(slice_positions(5, None, None, None).unwrap(), vec![0, 1, 2, 3, 4]);
        assert_eq!(slice_positions(5, Some(1), Some(-1), None).unwrap(), vec![1, 2, 3]);
        assert_eq!(slice_positions(5, None, None, Some(-1)).unwrap(), vec![4, 3, 2, 1, 0]);
        assert_eq!(slice_positions(5, None, None, Some(2)).unwrap(), vec![0, 2, 4]);
        assert_eq!(slice_positions(5, Some(10), None, None).unwrap(), Vec::<usize>::new());
        assert_eq!(slice_positions(3, Some(-10), Some(10), None).unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_zero_step_rejected() {
        let err = slice_bounds(3, None, None, Some(0)).unwrap_err();
        assert_eq!(err.to_string(), "ValueError: slice step cannot be zero");
    }

    #[test]
    fn test_normalize_index() {
        assert_eq!(normalize_index(-1, 3), Some(2));
        assert_eq!(normalize_index(3, 3), None);
        assert_eq!(normalize_index(-4, 3), None);
    }
}
