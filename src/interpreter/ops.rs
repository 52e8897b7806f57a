//! Operators, equality, ordering, truthiness and text conversion
//!
//! Integers are 64-bit; results that do not fit raise `OverflowError` instead
//! of silently wrapping.

use super::calls::CallArgs;
use super::engine::Interpreter;
use super::errors::{Exec, RuntimeError};
use super::format::{array_str, percent_format, Repr};
use crate::memory::heap::{range_len, DictMap, HeapObject, SetMap};
use crate::memory::value::{ObjectId, Value};
use crate::parser::ast::{BinOp, CmpOp, UnaryOp};
use rustc_hash::{FxHashMap, FxHashSet};
use std::cmp::Ordering;
use std::rc::Rc;

fn dunder(op: BinOp) -> (&'static str, &'static str) {
    match op {
        BinOp::Add => ("__add__", "__radd__"),
        BinOp::Sub => ("__sub__", "__rsub__"),
        BinOp::Mul => ("__mul__", "__rmul__"),
        BinOp::Div => ("__truediv__", "__rtruediv__"),
        BinOp::FloorDiv => ("__floordiv__", "__rfloordiv__"),
        BinOp::Mod => ("__mod__", "__rmod__"),
        BinOp::Pow => ("__pow__", "__rpow__"),
        BinOp::BitAnd => ("__and__", "__rand__"),
        BinOp::BitOr => ("__or__", "__ror__"),
        BinOp::BitXor => ("__xor__", "__rxor__"),
        BinOp::Shl => ("__lshift__", "__rlshift__"),
        BinOp::Shr => ("__rshift__", "__rrshift__"),
    }
}

fn inplace_dunder(op: BinOp) -> String {
    format!("__i{}", &dunder(op).0[2..])
}

fn overflow() -> RuntimeError {
    RuntimeError::OverflowError("integer overflow".to_string())
}

/// Python floor division on integers
pub(crate) fn floor_div(a: i64, b: i64) -> Result<i64, RuntimeError> {
    if b == 0 {
        return Err(RuntimeError::ZeroDivisionError("integer division or modulo by zero".into()));
    }
    let q = a.checked_div(b).ok_or_else(overflow)?;
    if a % b != 0 && ((a < 0) != (b < 0)) {
        Ok(q - 1)
    } else {
        Ok(q)
    }
}

/// Python modulo on integers; the result takes the divisor's sign
pub(crate) fn floor_mod(a: i64, b: i64) -> Result<i64, RuntimeError> {
    if b == 0 {
        return Err(RuntimeError::ZeroDivisionError("integer modulo by zero".into()));
    }
    let r = a.checked_rem(b).unwrap_or(0);
    if r != 0 && ((r < 0) != (b < 0)) {
        Ok(r + b)
    } else {
        Ok(r)
    }
}

fn float_mod(a: f64, b: f64) -> f64 {
    let r = a % b;
    if r != 0.0 && ((r < 0.0) != (b < 0.0)) {
        r + b
    } else {
        r
    }
}

pub(crate) fn int_pow(base: i64, exponent: i64) -> Result<Value, RuntimeError> {
    if exponent < 0 {
        if base == 0 {
            return Err(RuntimeError::ZeroDivisionError(
                "0.0 cannot be raised to a negative power".into(),
            ));
        }
        return Ok(Value::Float((base as f64).powf(exponent as f64)));
    }
    let exponent = u32::try_from(exponent).map_err(|_| overflow())?;
    base.checked_pow(exponent).map(Value::Int).ok_or_else(overflow)
}

fn int_arith(op: BinOp, a: i64, b: i64) -> Result<Value, RuntimeError> {
    let value = match op {
        BinOp::Add => Value::Int(a.checked_add(b).ok_or_else(overflow)?),
        BinOp::Sub => Value::Int(a.checked_sub(b).ok_or_else(overflow)?),
        BinOp::Mul => Value::Int(a.checked_mul(b).ok_or_else(overflow)?),
        BinOp::Div => {
            if b == 0 {
                return Err(RuntimeError::ZeroDivisionError("division by zero".into()));
            }
            Value::Float(a as f64 / b as f64)
        }
        BinOp::FloorDiv => Value::Int(floor_div(a, b)?),
        BinOp::Mod => Value::Int(floor_mod(a, b)?),
        BinOp::Pow => return int_pow(a, b),
        BinOp::BitAnd => Value::Int(a & b),
        BinOp::BitOr => Value::Int(a | b),
        BinOp::BitXor => Value::Int(a ^ b),
        BinOp::Shl => {
            if b < 0 {
                return Err(RuntimeError::value_error("negative shift count"));
            }
            if a == 0 {
                return Ok(Value::Int(0));
            }
            let shifted = u32::try_from(b)
                .ok()
                .and_then(|s| a.checked_shl(s))
                .filter(|r| r >> b == a)
                .ok_or_else(overflow)?;
            Value::Int(shifted)
        }
        BinOp::Shr => {
            if b < 0 {
                return Err(RuntimeError::value_error("negative shift count"));
            }
            Value::Int(if b >= 64 { if a < 0 { -1 } else { 0 } } else { a >> b })
        }
    };
    Ok(value)
}

fn float_arith(op: BinOp, a: f64, b: f64) -> Option<Result<Value, RuntimeError>> {
    let zero = |message: &str| Some(Err(RuntimeError::ZeroDivisionError(message.to_string())));
    let value = match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div if b == 0.0 => return zero("float division by zero"),
        BinOp::Div => a / b,
        BinOp::FloorDiv if b == 0.0 => return zero("float floor division by zero"),
        BinOp::FloorDiv => (a / b).floor(),
        BinOp::Mod if b == 0.0 => return zero("float modulo by zero"),
        BinOp::Mod => float_mod(a, b),
        BinOp::Pow if a == 0.0 && b < 0.0 => return zero("0.0 cannot be raised to a negative power"),
        BinOp::Pow => {
            let result = a.powf(b);
            if result.is_nan() && !a.is_nan() && !b.is_nan() {
                return Some(Err(RuntimeError::value_error("math domain error")));
            }
            result
        }
        _ => return None,
    };
    Some(Ok(Value::Float(value)))
}

fn is_number(value: &Value) -> bool {
    matches!(value, Value::Int(_) | Value::Bool(_) | Value::Float(_))
}

impl Interpreter<'_> {
    /// `left <op> right`
    pub(crate) fn binary_op(&mut self, op: BinOp, left: Value, right: Value) -> Exec<Value> {
        let (method, reflected) = dunder(op);
        if let Some(function) = self.instance_method(&left, method) {
            return self.call_function(function, CallArgs::positional(vec![left, right]));
        }
        if let Some(function) = self.instance_method(&right, reflected) {
            return self.call_function(function, CallArgs::positional(vec![right, left]));
        }
        if self.is_array(&left) || self.is_array(&right) {
            return self.array_binary(op, &left, &right);
        }

        match (&left, &right) {
            (Value::Bool(a), Value::Bool(b)) if matches!(op, BinOp::BitAnd | BinOp::BitOr | BinOp::BitXor) => {
                let result = match op {
                    BinOp::BitAnd => a & b,
                    BinOp::BitOr => a | b,
                    _ => a ^ b,
                };
                return Ok(Value::Bool(result));
            }
            (Value::Int(_) | Value::Bool(_), Value::Int(_) | Value::Bool(_)) => {
                let (a, b) = (left.as_int().unwrap_or(0), right.as_int().unwrap_or(0));
                return Ok(int_arith(op, a, b)?);
            }
            (l, r) if is_number(l) && is_number(r) => {
                let (a, b) = (l.as_float().unwrap_or(0.0), r.as_float().unwrap_or(0.0));
                if let Some(result) = float_arith(op, a, b) {
                    return Ok(result?);
                }
            }
            (Value::Str(a), Value::Str(b)) if op == BinOp::Add => {
                return Ok(Value::str(&format!("{}{}", a, b)));
            }
            (Value::Str(s), n) | (n, Value::Str(s)) if op == BinOp::Mul && n.as_int().is_some() => {
                let times = n.as_int().unwrap_or(0).max(0) as usize;
                return Ok(Value::str(&s.repeat(times)));
            }
            (Value::Str(template), _) if op == BinOp::Mod => {
                let template = template.clone();
                return self.percent(&template, &right);
            }
            (Value::Str(_), other) if op == BinOp::Add => {
                return Err(RuntimeError::type_error(format!(
                    "can only concatenate str (not \"{}\") to str",
                    self.type_name(other)
                ))
                .into());
            }
            (Value::Bytes(a), Value::Bytes(b)) if op == BinOp::Add => {
                let joined: Vec<u8> = a.iter().chain(b.iter()).copied().collect();
                return Ok(Value::Bytes(Rc::from(joined)));
            }
            (Value::Bytes(b), n) | (n, Value::Bytes(b)) if op == BinOp::Mul && n.as_int().is_some() => {
                let times = n.as_int().unwrap_or(0).max(0) as usize;
                return Ok(Value::Bytes(Rc::from(b.repeat(times))));
            }
            _ => {}
        }

        if let Some(result) = self.container_op(op, &left, &right)? {
            return Ok(result);
        }
        Err(self.unsupported_operands(op.symbol(), &left, &right).into())
    }

    fn unsupported_operands(&self, symbol: &str, left: &Value, right: &Value) -> RuntimeError {
        let (l, r) = (self.type_name(left), self.type_name(right));
        if symbol == "+" && (l == "list" || l == "tuple") {
            return RuntimeError::type_error(format!(
                "can only concatenate {} (not \"{}\") to {}",
                l, r, l
            ));
        }
        RuntimeError::type_error(format!(
            "unsupported operand type(s) for {}: '{}' and '{}'",
            symbol, l, r
        ))
    }

    fn percent(&mut self, template: &str, args: &Value) -> Exec<Value> {
        let args = match self.heap.deref(args) {
            Some(HeapObject::Tuple(items)) => items.clone(),
            _ => vec![args.clone()],
        };
        let text = percent_format(template, &args, &mut |value, as_repr| {
            if as_repr {
                self.repr(value)
            } else {
                self.to_str(value)
            }
        })?;
        Ok(Value::str(&text))
    }

    /// Sequence concatenation and repetition, set algebra and dict merge
    fn container_op(&mut self, op: BinOp, left: &Value, right: &Value) -> Exec<Option<Value>> {
        let (l, r) = (self.heap.deref(left), self.heap.deref(right));
        let result = match (op, l, r) {
            (BinOp::Add, Some(HeapObject::List(a)), Some(HeapObject::List(b))) => {
                HeapObject::List(a.iter().chain(b).cloned().collect())
            }
            (BinOp::Add, Some(HeapObject::Tuple(a)), Some(HeapObject::Tuple(b))) => {
                HeapObject::Tuple(a.iter().chain(b).cloned().collect())
            }
            (BinOp::Mul, Some(HeapObject::List(items)), None) | (BinOp::Mul, None, Some(HeapObject::List(items))) => {
                let n = if l.is_some() { right.as_int() } else { left.as_int() };
                let Some(n) = n else { return Ok(None) };
                HeapObject::List(repeat(items, n))
            }
            (BinOp::Mul, Some(HeapObject::Tuple(items)), None) | (BinOp::Mul, None, Some(HeapObject::Tuple(items))) => {
                let n = if l.is_some() { right.as_int() } else { left.as_int() };
                let Some(n) = n else { return Ok(None) };
                HeapObject::Tuple(repeat(items, n))
            }
            (_, Some(HeapObject::Set(a)), Some(HeapObject::Set(b))) => {
                let set = match op {
                    BinOp::BitOr => {
                        let mut set = a.clone();
                        for (k, v) in b {
                            set.entry(k.clone()).or_insert_with(|| v.clone());
                        }
                        set
                    }
                    BinOp::BitAnd => a.iter().filter(|(k, _)| b.contains_key(*k)).map(|(k, v)| (k.clone(), v.clone())).collect(),
                    BinOp::Sub => a.iter().filter(|(k, _)| !b.contains_key(*k)).map(|(k, v)| (k.clone(), v.clone())).collect(),
                    BinOp::BitXor => a
                        .iter()
                        .filter(|(k, _)| !b.contains_key(*k))
                        .chain(b.iter().filter(|(k, _)| !a.contains_key(*k)))
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect::<SetMap>(),
                    _ => return Ok(None),
                };
                HeapObject::Set(set)
            }
            (BinOp::BitOr, Some(HeapObject::Dict(a)), Some(HeapObject::Dict(b))) => {
                let mut map: DictMap = a.clone();
                for (k, (key, value)) in b {
                    match map.get_mut(k) {
                        Some(entry) => entry.1 = value.clone(),
                        None => {
                            map.insert(k.clone(), (key.clone(), value.clone()));
                        }
                    }
                }
                HeapObject::Dict(map)
            }
            _ => return Ok(None),
        };
        Ok(Some(self.alloc(result)))
    }

    /// `left <op>= right`; mutable containers are updated in place
    pub(crate) fn inplace_op(&mut self, op: BinOp, left: Value, right: Value) -> Exec<Value> {
        if let Some(function) = self.instance_method(&left, &inplace_dunder(op)) {
            return self.call_function(function, CallArgs::positional(vec![left, right]));
        }
        let Some(id) = left.as_ref_id() else {
            return self.binary_op(op, left, right);
        };
        match (op, self.object(id)?) {
            (BinOp::Add, HeapObject::List(_)) => {
                let extra = self.collect_iterable(&right)?;
                if let HeapObject::List(items) = self.object_mut(id)? {
                    items.extend(extra);
                }
                Ok(left)
            }
            (BinOp::Mul, HeapObject::List(_)) => {
                let Some(n) = right.as_int() else {
                    return Err(RuntimeError::type_error(format!(
                        "can't multiply sequence by non-int of type '{}'",
                        self.type_name(&right)
                    ))
                    .into());
                };
                if let HeapObject::List(items) = self.object_mut(id)? {
                    *items = repeat(items, n);
                }
                Ok(left)
            }
            (BinOp::Add, HeapObject::Deque { .. }) => {
                let extra = self.collect_iterable(&right)?;
                for item in extra {
                    self.deque_push(id, item, false)?;
                }
                Ok(left)
            }
            (BinOp::BitOr | BinOp::BitAnd | BinOp::Sub | BinOp::BitXor, HeapObject::Set(_))
            | (BinOp::BitOr, HeapObject::Dict(_)) => {
                let combined = self.binary_op(op, left.clone(), right)?;
                let replacement = combined.as_ref_id().and_then(|c| self.heap.get(c)).cloned();
                if let Some(replacement) = replacement {
                    *self.object_mut(id)? = replacement;
                }
                Ok(left)
            }
            _ => self.binary_op(op, left, right),
        }
    }

    /// `<op> operand`
    pub(crate) fn unary_op(&mut self, op: UnaryOp, operand: Value) -> Exec<Value> {
        if op == UnaryOp::Not {
            return Ok(Value::Bool(!self.truthy(&operand)?));
        }
        let method = match op {
            UnaryOp::Neg => "__neg__",
            UnaryOp::Pos => "__pos__",
            _ => "__invert__",
        };
        if let Some(function) = self.instance_method(&operand, method) {
            return self.call_function(function, CallArgs::positional(vec![operand]));
        }
        if self.is_array(&operand) {
            return self.array_unary(op, &operand);
        }
        let result = match (op, &operand) {
            (UnaryOp::Neg, Value::Int(_) | Value::Bool(_)) => {
                Value::Int(operand.as_int().unwrap_or(0).checked_neg().ok_or_else(overflow)?)
            }
            (UnaryOp::Neg, Value::Float(x)) => Value::Float(-x),
            (UnaryOp::Pos, Value::Int(_) | Value::Bool(_)) => Value::Int(operand.as_int().unwrap_or(0)),
            (UnaryOp::Pos, Value::Float(x)) => Value::Float(*x),
            (UnaryOp::Invert, Value::Int(_) | Value::Bool(_)) => Value::Int(!operand.as_int().unwrap_or(0)),
            _ => {
                let symbol = match op {
                    UnaryOp::Neg => "-",
                    UnaryOp::Pos => "+",
                    _ => "~",
                };
                return Err(RuntimeError::type_error(format!(
                    "bad operand type for unary {}: '{}'",
                    symbol,
                    self.type_name(&operand)
                ))
                .into());
            }
        };
        Ok(result)
    }

    /// One comparison `left <op> right`
    pub(crate) fn compare(&mut self, op: CmpOp, left: &Value, right: &Value) -> Exec<Value> {
        let result = match op {
            CmpOp::Is => left.is_same(right),
            CmpOp::IsNot => !left.is_same(right),
            CmpOp::In => self.contains(right, left)?,
            CmpOp::NotIn => !self.contains(right, left)?,
            _ if self.is_array(left) || self.is_array(right) => return self.array_compare(op, left, right),
            CmpOp::Eq => self.values_equal(left, right)?,
            CmpOp::NotEq => {
                if let Some(function) = self.instance_method(left, "__ne__") {
                    let result =
                        self.call_function(function, CallArgs::positional(vec![left.clone(), right.clone()]))?;
                    return Ok(result);
                }
                !self.values_equal(left, right)?
            }
            CmpOp::Lt | CmpOp::Le | CmpOp::Gt | CmpOp::Ge => return self.rich_order(op, left, right),
        };
        Ok(Value::Bool(result))
    }

    /// `left < right` and friends, honouring user dunders and set inclusion
    fn rich_order(&mut self, op: CmpOp, left: &Value, right: &Value) -> Exec<Value> {
        let (method, reflected) = match op {
            CmpOp::Lt => ("__lt__", "__gt__"),
            CmpOp::Le => ("__le__", "__ge__"),
            CmpOp::Gt => ("__gt__", "__lt__"),
            _ => ("__ge__", "__le__"),
        };
        if let Some(function) = self.instance_method(left, method) {
            return self.call_function(function, CallArgs::positional(vec![left.clone(), right.clone()]));
        }
        if let Some(function) = self.instance_method(right, reflected) {
            return self.call_function(function, CallArgs::positional(vec![right.clone(), left.clone()]));
        }
        if let (Some(HeapObject::Set(a)), Some(HeapObject::Set(b))) = (self.heap.deref(left), self.heap.deref(right)) {
            let subset = a.keys().all(|k| b.contains_key(k));
            let superset = b.keys().all(|k| a.contains_key(k));
            let result = match op {
                CmpOp::Lt => subset && a.len() < b.len(),
                CmpOp::Le => subset,
                CmpOp::Gt => superset && a.len() > b.len(),
                _ => superset,
            };
            return Ok(Value::Bool(result));
        }
        let ordering = self.order(op.symbol(), left, right)?;
        let result = match (op, ordering) {
            (_, None) => false,
            (CmpOp::Lt, Some(o)) => o == Ordering::Less,
            (CmpOp::Le, Some(o)) => o != Ordering::Greater,
            (CmpOp::Gt, Some(o)) => o == Ordering::Greater,
            (_, Some(o)) => o != Ordering::Less,
        };
        Ok(Value::Bool(result))
    }

    /// Natural ordering of two values; `None` for unordered floats (NaN)
    fn order(&mut self, symbol: &str, left: &Value, right: &Value) -> Exec<Option<Ordering>> {
        match (left, right) {
            (Value::Int(_) | Value::Bool(_), Value::Int(_) | Value::Bool(_)) => {
                return Ok(Some(left.as_int().cmp(&right.as_int())));
            }
            (l, r) if is_number(l) && is_number(r) => {
                return Ok(l.as_float().partial_cmp(&r.as_float()));
            }
            (Value::Str(a), Value::Str(b)) => return Ok(Some(a.cmp(b))),
            (Value::Bytes(a), Value::Bytes(b)) => return Ok(Some(a.cmp(b))),
            _ => {}
        }
        let sequences = match (self.heap.deref(left), self.heap.deref(right)) {
            (Some(HeapObject::List(a)), Some(HeapObject::List(b)))
            | (Some(HeapObject::Tuple(a)), Some(HeapObject::Tuple(b))) => Some((a.clone(), b.clone())),
            _ => None,
        };
        if let Some((a, b)) = sequences {
            for (x, y) in a.iter().zip(&b) {
                if !self.values_equal(x, y)? {
                    if self.less_than(x, y)? {
                        return Ok(Some(Ordering::Less));
                    }
                    return Ok(Some(if self.less_than(y, x)? {
                        Ordering::Greater
                    } else {
                        Ordering::Equal
                    }));
                }
            }
            return Ok(Some(a.len().cmp(&b.len())));
        }
        Err(RuntimeError::type_error(format!(
            "'{}' not supported between instances of '{}' and '{}'",
            symbol,
            self.type_name(left),
            self.type_name(right)
        ))
        .into())
    }

    /// `left < right` as a bool
    pub(crate) fn less_than(&mut self, left: &Value, right: &Value) -> Exec<bool> {
        let result = self.rich_order(CmpOp::Lt, left, right)?;
        self.truthy(&result)
    }

    /// `left == right`
    pub(crate) fn values_equal(&mut self, left: &Value, right: &Value) -> Exec<bool> {
        if let Some(function) = self.instance_method(left, "__eq__") {
            let result = self.call_function(function, CallArgs::positional(vec![left.clone(), right.clone()]))?;
            return self.truthy(&result);
        }
        if let Some(function) = self.instance_method(right, "__eq__") {
            let result = self.call_function(function, CallArgs::positional(vec![right.clone(), left.clone()]))?;
            return self.truthy(&result);
        }
        match (left, right) {
            (l, r) if is_number(l) && is_number(r) => match (l, r) {
                (Value::Float(_), _) | (_, Value::Float(_)) => return Ok(l.as_float() == r.as_float()),
                _ => return Ok(l.as_int() == r.as_int()),
            },
            (Value::Ref(a), Value::Ref(b)) if a == b => return Ok(true),
            (Value::Ref(_), Value::Ref(_)) => {}
            _ => return Ok(left == right),
        }

        let pairs: Vec<(Value, Value)> = match (self.heap.deref(left), self.heap.deref(right)) {
            (Some(HeapObject::List(a)), Some(HeapObject::List(b)))
            | (Some(HeapObject::Tuple(a)), Some(HeapObject::Tuple(b))) => {
                if a.len() != b.len() {
                    return Ok(false);
                }
                a.iter().cloned().zip(b.iter().cloned()).collect()
            }
            (Some(HeapObject::Deque { items: a, .. }), Some(HeapObject::Deque { items: b, .. })) => {
                if a.len() != b.len() {
                    return Ok(false);
                }
                a.iter().cloned().zip(b.iter().cloned()).collect()
            }
            (Some(HeapObject::Dict(a)), Some(HeapObject::Dict(b))) => {
                if a.len() != b.len() {
                    return Ok(false);
                }
                let mut pairs = Vec::with_capacity(a.len());
                for (k, (_, value)) in a {
                    match b.get(k) {
                        Some((_, other)) => pairs.push((value.clone(), other.clone())),
                        None => return Ok(false),
                    }
                }
                pairs
            }
            (Some(HeapObject::Set(a)), Some(HeapObject::Set(b))) => {
                return Ok(a.len() == b.len() && a.keys().all(|k| b.contains_key(k)));
            }
            (
                Some(HeapObject::Range { start: s1, stop: e1, step: t1 }),
                Some(HeapObject::Range { start: s2, stop: e2, step: t2 }),
            ) => {
                let (n1, n2) = (range_len(*s1, *e1, *t1), range_len(*s2, *e2, *t2));
                return Ok(n1 == n2 && (n1 == 0 || (s1 == s2 && (n1 == 1 || t1 == t2))));
            }
            _ => return Ok(false),
        };
        for (a, b) in pairs {
            if !self.values_equal(&a, &b)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Python truthiness
    pub(crate) fn truthy(&mut self, value: &Value) -> Exec<bool> {
        let id = match value {
            Value::None => return Ok(false),
            Value::Bool(b) => return Ok(*b),
            Value::Int(n) => return Ok(*n != 0),
            Value::Float(x) => return Ok(*x != 0.0),
            Value::Str(s) => return Ok(!s.is_empty()),
            Value::Bytes(b) => return Ok(!b.is_empty()),
            Value::Builtin(_) | Value::Type(_) => return Ok(true),
            Value::Ref(id) => *id,
        };
        match self.object(id)? {
            HeapObject::Instance(instance) => {
                let class = instance.class;
                if let Some(function) = self.user_method(class, "__bool__") {
                    let result = self.call_function(function, CallArgs::positional(vec![value.clone()]))?;
                    return match result {
                        Value::Bool(b) => Ok(b),
                        other => Err(RuntimeError::type_error(format!(
                            "__bool__ should return bool, returned {}",
                            self.type_name(&other)
                        ))
                        .into()),
                    };
                }
                if self.user_method(class, "__len__").is_some() {
                    return Ok(self.len(value)? > 0);
                }
                Ok(true)
            }
            HeapObject::Array(array) => match array.size() {
                0 => Ok(false),
                1 => {
                    let element = array.element(0);
                    self.truthy(&element)
                }
                _ => Err(RuntimeError::value_error(
                    "The truth value of an array with more than one element is ambiguous. Use a.any() or a.all()",
                )
                .into()),
            },
            object => Ok(object.len().map_or(true, |n| n > 0)),
        }
    }

    /// `repr(value)`, running user `__repr__` methods of reachable instances
    pub(crate) fn repr(&mut self, value: &Value) -> Exec<String> {
        let overrides = self.user_reprs(value)?;
        Ok(Repr::with_overrides(&self.heap, &overrides).value(value))
    }

    /// Text of user `__repr__` for every instance reachable from `root` that defines one
    fn user_reprs(&mut self, root: &Value) -> Exec<FxHashMap<ObjectId, String>> {
        let mut overrides = FxHashMap::default();
        let mut seen: FxHashSet<ObjectId> = FxHashSet::default();
        let mut pending: Vec<Value> = vec![root.clone()];
        while let Some(value) = pending.pop() {
            let Some(id) = value.as_ref_id() else { continue };
            if !seen.insert(id) {
                continue;
            }
            match self.object(id)? {
                HeapObject::List(items) | HeapObject::Tuple(items) => pending.extend(items.iter().cloned()),
                HeapObject::Deque { items, .. } => pending.extend(items.iter().cloned()),
                HeapObject::Set(set) => pending.extend(set.values().cloned()),
                HeapObject::Dict(map) => {
                    for (k, v) in map.values() {
                        pending.push(k.clone());
                        pending.push(v.clone());
                    }
                }
                HeapObject::Instance(instance) => {
                    if let Some(function) = self.user_method(instance.class, "__repr__") {
                        let text = self.call_function(function, CallArgs::positional(vec![value.clone()]))?;
                        match text {
                            Value::Str(s) => {
                                overrides.insert(id, s.to_string());
                            }
                            other => {
                                return Err(RuntimeError::type_error(format!(
                                    "__repr__ returned non-string (type {})",
                                    self.type_name(&other)
                                ))
                                .into())
                            }
                        }
                    } else if let Some(args) = &instance.args {
                        pending.extend(args.iter().cloned());
                    }
                }
                _ => {}
            }
        }
        Ok(overrides)
    }

    /// `str(value)`
    pub(crate) fn to_str(&mut self, value: &Value) -> Exec<String> {
        let id = match value {
            Value::Str(s) => return Ok(s.to_string()),
            Value::Ref(id) => *id,
            other => return Ok(super::format::repr(&self.heap, other)),
        };
        match self.object(id)? {
            HeapObject::Instance(instance) => {
                let class = instance.class;
                if let Some(function) = self.user_method(class, "__str__") {
                    let text = self.call_function(function, CallArgs::positional(vec![value.clone()]))?;
                    return match text {
                        Value::Str(s) => Ok(s.to_string()),
                        other => Err(RuntimeError::type_error(format!(
                            "__str__ returned non-string (type {})",
                            self.type_name(&other)
                        ))
                        .into()),
                    };
                }
                if self.is_exception_class(class) {
                    return self.exception_str(id);
                }
                self.repr(value)
            }
            HeapObject::Array(array) => Ok(array_str(array)),
            _ => self.repr(value),
        }
    }

    /// Stable merge sort of `(key, item)` pairs; comparison errors propagate
    pub(crate) fn sort_pairs(&mut self, mut pairs: Vec<(Value, Value)>, reverse: bool) -> Exec<Vec<(Value, Value)>> {
        if pairs.len() <= 1 {
            return Ok(pairs);
        }
        let right = pairs.split_off(pairs.len() / 2);
        let left = self.sort_pairs(pairs, reverse)?;
        let right = self.sort_pairs(right, reverse)?;

        let mut merged = Vec::with_capacity(left.len() + right.len());
        let mut left = left.into_iter().peekable();
        let mut right = right.into_iter().peekable();
        while let (Some(l), Some(r)) = (left.peek(), right.peek()) {
            let take_right = if reverse {
                self.less_than(&l.0, &r.0)?
            } else {
                self.less_than(&r.0, &l.0)?
            };
            let next = if take_right { right.next() } else { left.next() };
            merged.extend(next);
        }
        merged.extend(left);
        merged.extend(right);
        Ok(merged)
    }
}

fn repeat(items: &[Value], n: i64) -> Vec<Value> {
    let times = n.max(0) as usize;
    let mut out = Vec::with_capacity(items.len() * times);
    for _ in 0..times {
        out.extend(items.iter().cloned());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_floor_semantics_follow_divisor_sign() {
        assert_eq!(floor_div(7, 2).unwrap(), 3);
        assert_eq!(floor_div(-7, 2).unwrap(), -4);
        assert_eq!(floor_mod(-7, 2).unwrap(), 1);
        assert_eq!(floor_mod(7, -2).unwrap(), -1);
        assert_eq!(float_mod(-7.5, 2.0), 0.5);
    }

    #[test]
    fn test_division_by_zero_messages() {
        assert_eq!(
            int_arith(BinOp::Div, 1, 0).unwrap_err().to_string(),
            "ZeroDivisionError: division by zero"
        );
        assert_eq!(
            int_arith(BinOp::Mod, 1, 0).unwrap_err().to_string(),
            "ZeroDivisionError: integer modulo by zero"
        );
    }

    #[test]
    fn test_overflow_is_reported() {
        assert!(matches!(
            int_arith(BinOp::Mul, i64::MAX, 2),
            Err(RuntimeError::OverflowError(_))
        ));
        assert!(matches!(int_arith(BinOp::Shl, 1, 70), Err(RuntimeError::OverflowError(_))));
        assert_eq!(int_arith(BinOp::Shl, 3, 2).unwrap(), Value::Int(12));
    }

    #[test]
    fn test_negative_power_gives_float() {
        assert_eq!(int_pow(2, -1).unwrap(), Value::Float(0.5));
        assert_eq!(int_pow(3, 4).unwrap(), Value::Int(81));
    }

    #[test]
    fn test_inplace_dunder_name() {
        assert_eq!(inplace_dunder(BinOp::Add), "__iadd__");
        assert_eq!(inplace_dunder(BinOp::FloorDiv), "__ifloordiv__");
    }
}
