//! Built-in function implementations
//!
//! Builtins are dispatched on [`Builtin`] and run as methods on the
//! [`Interpreter`]. Builtins that call back into user code (`sorted`, `min`,
//! `max`, `map`, `filter`) run inside an engine frame attributed to this file,
//! so an observer walking the stack sees engine code between the caller and
//! the callback.
//!
//! # Implementation Notes
//!
//! - `map` and `filter` are eager: they apply the function while the call runs
//!   and return a materialized iterator
//! - `id()` of a heap object is its address; scalars get a stable synthetic id
//! - `round()` uses round-half-to-even like Python

use super::calls::CallArgs;
use super::engine::Interpreter;
use super::errors::{Exec, RuntimeError};
use super::ops::{floor_div, floor_mod};
use crate::memory::heap::{DictMap, HeapObject};
use crate::memory::value::{Builtin, BuiltinType, Value};
use rustc_hash::FxHasher;
use std::collections::VecDeque;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

const CALLBACK_ORIGIN: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/", file!());

/// Base for synthetic ids of values without heap identity
const SCALAR_ID_BASE: u64 = 0x7f00_0000_0000;

fn math_domain() -> RuntimeError {
    RuntimeError::value_error("math domain error")
}

fn radix(n: i64, prefix: &str, digits: String) -> Value {
    let sign = if n < 0 { "-" } else { "" };
    Value::str(&format!("{}{}{}", sign, prefix, digits))
}

/// Round half to even at `ndigits` decimal places
fn round_float(x: f64, ndigits: i64) -> f64 {
    if !x.is_finite() {
        return x;
    }
    if ndigits >= 0 {
        let ndigits = ndigits.min(300) as usize;
        // Formatting rounds the exact binary value, which matches Python's round()
        format!("{:.*}", ndigits, x).parse().unwrap_or(x)
    } else {
        let factor = 10f64.powi((-ndigits).min(308) as i32);
        (x / factor).round_ties_even() * factor
    }
}

fn round_int(n: i64, ndigits: i64) -> Result<i64, RuntimeError> {
    if ndigits >= 0 {
        return Ok(n);
    }
    let Some(factor) = u32::try_from(-ndigits).ok().and_then(|e| 10i64.checked_pow(e)) else {
        return Ok(0);
    };
    let quotient = floor_div(n, factor)?;
    let remainder = n - quotient * factor;
    let rounded = match (remainder * 2).cmp(&factor) {
        std::cmp::Ordering::Less => quotient,
        std::cmp::Ordering::Greater => quotient + 1,
        std::cmp::Ordering::Equal => quotient + (quotient & 1),
    };
    rounded
        .checked_mul(factor)
        .ok_or_else(|| RuntimeError::OverflowError("integer overflow".into()))
}

fn gcd(a: i64, b: i64) -> i64 {
    let (mut a, mut b) = (a.unsigned_abs(), b.unsigned_abs());
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a as i64
}

/// Parse `int(text, base)` the way Python does: surrounding whitespace,
/// underscores between digits and a base prefix are accepted.
pub(crate) fn parse_int(text: &str, base: u32) -> Option<i64> {
    let trimmed = text.trim();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let lower = digits.to_ascii_lowercase();
    let (base, digits) = match (base, lower.get(..2)) {
        (0 | 16, Some("0x")) => (16, &lower[2..]),
        (0 | 8, Some("0o")) => (8, &lower[2..]),
        (0 | 2, Some("0b")) => (2, &lower[2..]),
        (0, _) => (10, lower.as_str()),
        _ => (base, lower.as_str()),
    };
    if digits.is_empty() || digits.starts_with('_') || digits.ends_with('_') || digits.contains("__") {
        return None;
    }
    let cleaned: String = digits.chars().filter(|c| *c != '_').collect();
    let magnitude = i64::from_str_radix(&cleaned, base).ok()?;
    Some(if negative { -magnitude } else { magnitude })
}

/// Parse `float(text)`
pub(crate) fn parse_float(text: &str) -> Option<f64> {
    let trimmed = text.trim().to_ascii_lowercase();
    let (sign, body) = match trimmed.as_bytes().first() {
        Some(b'-') => (-1.0, &trimmed[1..]),
        Some(b'+') => (1.0, &trimmed[1..]),
        _ => (1.0, trimmed.as_str()),
    };
    match body {
        "inf" | "infinity" => return Some(sign * f64::INFINITY),
        "nan" => return Some(f64::NAN),
        _ => {}
    }
    if body.is_empty() || body.contains("__") || !body.chars().all(|c| c.is_ascii_digit() || "._e+-".contains(c)) {
        return None;
    }
    let cleaned: String = body.chars().filter(|c| *c != '_').collect();
    cleaned.parse::<f64>().ok().map(|x| sign * x)
}

impl Interpreter<'_> {
    /// Call a builtin function
    pub(crate) fn call_builtin(&mut self, builtin: Builtin, args: CallArgs) -> Exec<Value> {
        if builtin.calls_back() {
            let frame = self.native_frame(builtin.name(), CALLBACK_ORIGIN, line!());
            return self.run_frame(frame, move |this| this.dispatch_builtin(builtin, args));
        }
        self.dispatch_builtin(builtin, args)
    }

    fn dispatch_builtin(&mut self, builtin: Builtin, mut args: CallArgs) -> Exec<Value> {
        let name = builtin.name();
        match builtin {
            Builtin::Print => {
                let sep = self.optional_text(args.take_keyword("sep"), " ")?;
                let end = self.optional_text(args.take_keyword("end"), "\n")?;
                args.take_keyword("flush");
                args.no_keywords(name)?;
                let mut parts = Vec::with_capacity(args.positional.len());
                for value in &args.positional {
                    parts.push(self.to_str(value)?);
                }
                self.console.write(&format!("{}{}", parts.join(&sep), end));
                Ok(Value::None)
            }
            Builtin::Input => {
                args.no_keywords(name)?;
                args.arity(name, 0, 1)?;
                let prompt = match args.positional.first() {
                    Some(value) => self.to_str(value)?,
                    None => String::new(),
                };
                let line = self.read_line(&prompt)?;
                Ok(Value::str(&line))
            }
            Builtin::Len => {
                args.arity(name, 1, 1)?;
                Ok(Value::Int(self.len(&args.positional[0])? as i64))
            }
            Builtin::Abs => {
                args.arity(name, 1, 1)?;
                let value = args.positional.remove(0);
                match value {
                    Value::Int(_) | Value::Bool(_) => value
                        .as_int()
                        .and_then(i64::checked_abs)
                        .map(Value::Int)
                        .ok_or_else(|| RuntimeError::OverflowError("integer overflow".into()).into()),
                    Value::Float(x) => Ok(Value::Float(x.abs())),
                    _ if self.instance_method(&value, "__abs__").is_some() => {
                        self.call_method(value, "__abs__", Vec::new())
                    }
                    _ => Err(RuntimeError::type_error(format!(
                        "bad operand type for abs(): '{}'",
                        self.type_name(&value)
                    ))
                    .into()),
                }
            }
            Builtin::Min | Builtin::Max => self.min_max(builtin, args),
            Builtin::Sum => {
                let start = args.take_keyword("start");
                args.no_keywords(name)?;
                args.arity(name, 1, 2)?;
                let mut total = start.or_else(|| args.positional.get(1).cloned()).unwrap_or(Value::Int(0));
                if matches!(total, Value::Str(_)) {
                    return Err(RuntimeError::type_error("sum() can't sum strings [use ''.join(seq) instead]").into());
                }
                let items = self.collect_iterable(&args.positional[0])?;
                for item in items {
                    total = self.binary_op(crate::parser::ast::BinOp::Add, total, item)?;
                }
                Ok(total)
            }
            Builtin::Sorted => {
                let key = args.take_keyword("key").filter(|k| !k.is_none());
                let reverse = match args.take_keyword("reverse") {
                    Some(value) => self.truthy(&value)?,
                    None => false,
                };
                args.no_keywords(name)?;
                args.arity(name, 1, 1)?;
                let items = self.collect_iterable(&args.positional[0])?;
                let sorted = self.sort_values(items, key, reverse)?;
                Ok(self.alloc(HeapObject::List(sorted)))
            }
            Builtin::Reversed => {
                args.arity(name, 1, 1)?;
                let value = args.positional.remove(0);
                if self.instance_method(&value, "__reversed__").is_some() {
                    return self.call_method(value, "__reversed__", Vec::new());
                }
                let kind = match (&value, self.heap.deref(&value)) {
                    (_, Some(HeapObject::List(_))) => "list_reverseiterator",
                    (_, Some(HeapObject::Dict(_))) => "dict_reversekeyiterator",
                    (_, Some(HeapObject::Range { .. })) => "range_iterator",
                    (_, Some(HeapObject::Tuple(_) | HeapObject::Deque { .. } | HeapObject::Array(_)))
                    | (Value::Str(_) | Value::Bytes(_), _) => "reversed",
                    _ => {
                        return Err(RuntimeError::type_error(format!(
                            "'{}' object is not reversible",
                            self.type_name(&value)
                        ))
                        .into())
                    }
                };
                let mut items = self.collect_iterable(&value)?;
                items.reverse();
                Ok(self.make_iterator(kind, items))
            }
            Builtin::Enumerate => {
                let start = args.take_keyword("start");
                args.no_keywords(name)?;
                args.arity(name, 1, 2)?;
                let start = match start.or_else(|| args.positional.get(1).cloned()) {
                    Some(value) => self.expect_int(&value)?,
                    None => 0,
                };
                let items = self.collect_iterable(&args.positional[0])?;
                let mut pairs = Vec::with_capacity(items.len());
                for (i, item) in items.into_iter().enumerate() {
                    let pair = self.alloc(HeapObject::Tuple(vec![Value::Int(start + i as i64), item]));
                    pairs.push(pair);
                }
                Ok(self.make_iterator("enumerate", pairs))
            }
            Builtin::Zip => {
                args.take_keyword("strict");
                args.no_keywords(name)?;
                let mut columns = Vec::with_capacity(args.positional.len());
                for iterable in &args.positional {
                    columns.push(self.collect_iterable(iterable)?);
                }
                let rows = columns.iter().map(Vec::len).min().unwrap_or(0);
                let mut tuples = Vec::with_capacity(rows);
                for row in 0..rows {
                    let items = columns.iter().map(|c| c[row].clone()).collect();
                    tuples.push(self.alloc(HeapObject::Tuple(items)));
                }
                Ok(self.make_iterator("zip", tuples))
            }
            Builtin::Map => {
                args.no_keywords(name)?;
                if args.positional.len() < 2 {
                    return Err(RuntimeError::type_error("map() must have at least two arguments.").into());
                }
                let function = args.positional.remove(0);
                let mut columns = Vec::with_capacity(args.positional.len());
                for iterable in &args.positional {
                    columns.push(self.collect_iterable(iterable)?);
                }
                let rows = columns.iter().map(Vec::len).min().unwrap_or(0);
                let mut results = Vec::with_capacity(rows);
                for row in 0..rows {
                    let call = columns.iter().map(|c| c[row].clone()).collect();
                    results.push(self.call_value(function.clone(), CallArgs::positional(call))?);
                }
                Ok(self.make_iterator("map", results))
            }
            Builtin::Filter => {
                args.no_keywords(name)?;
                args.arity(name, 2, 2)?;
                let function = args.positional[0].clone();
                let items = self.collect_iterable(&args.positional[1])?;
                let mut kept = Vec::new();
                for item in items {
                    let verdict = if function.is_none() {
                        item.clone()
                    } else {
                        self.call_value(function.clone(), CallArgs::positional(vec![item.clone()]))?
                    };
                    if self.truthy(&verdict)? {
                        kept.push(item);
                    }
                }
                Ok(self.make_iterator("filter", kept))
            }
            Builtin::Isinstance => {
                args.arity(name, 2, 2)?;
                let class = self.type_of(&args.positional[0]);
                Ok(Value::Bool(self.class_matches(&class, &args.positional[1], name)?))
            }
            Builtin::Issubclass => {
                args.arity(name, 2, 2)?;
                let class = args.positional[0].clone();
                let is_class = matches!(class, Value::Type(_))
                    || matches!(self.heap.deref(&class), Some(HeapObject::Class(_)));
                if !is_class {
                    return Err(RuntimeError::type_error("issubclass() arg 1 must be a class").into());
                }
                Ok(Value::Bool(self.class_matches(&class, &args.positional[1], name)?))
            }
            Builtin::Repr => {
                args.arity(name, 1, 1)?;
                Ok(Value::str(&self.repr(&args.positional[0])?))
            }
            Builtin::Round => {
                let ndigits = args.take_keyword("ndigits");
                args.arity(name, 1, 2)?;
                let ndigits = ndigits.or_else(|| args.positional.get(1).cloned()).filter(|v| !v.is_none());
                let value = args.positional.remove(0);
                match (&value, ndigits) {
                    (Value::Int(_) | Value::Bool(_), None) => Ok(Value::Int(value.as_int().unwrap_or(0))),
                    (Value::Int(_) | Value::Bool(_), Some(digits)) => {
                        let digits = self.expect_int(&digits)?;
                        Ok(Value::Int(round_int(value.as_int().unwrap_or(0), digits)?))
                    }
                    (Value::Float(x), None) => self.float_to_int(x.round_ties_even()),
                    (Value::Float(x), Some(digits)) => {
                        let digits = self.expect_int(&digits)?;
                        Ok(Value::Float(round_float(*x, digits)))
                    }
                    _ if self.instance_method(&value, "__round__").is_some() => {
                        self.call_method(value, "__round__", Vec::new())
                    }
                    _ => Err(RuntimeError::type_error(format!(
                        "type {} doesn't define __round__ method",
                        self.type_name(&value)
                    ))
                    .into()),
                }
            }
            Builtin::Any | Builtin::All => {
                args.arity(name, 1, 1)?;
                let want = builtin == Builtin::Any;
                let mut state = self.iter_start(&args.positional[0])?;
                while let Some(item) = self.iter_next(&mut state)? {
                    if self.truthy(&item)? == want {
                        return Ok(Value::Bool(want));
                    }
                }
                Ok(Value::Bool(!want))
            }
            Builtin::Chr => {
                args.arity(name, 1, 1)?;
                let code = self.expect_int(&args.positional[0])?;
                u32::try_from(code)
                    .ok()
                    .and_then(char::from_u32)
                    .map(|c| Value::str(&c.to_string()))
                    .ok_or_else(|| RuntimeError::value_error("chr() arg not in range(0x110000)").into())
            }
            Builtin::Ord => {
                args.arity(name, 1, 1)?;
                match &args.positional[0] {
                    Value::Str(s) => {
                        let mut chars = s.chars();
                        match (chars.next(), chars.next()) {
                            (Some(c), None) => Ok(Value::Int(c as i64)),
                            _ => Err(RuntimeError::type_error(format!(
                                "ord() expected a character, but string of length {} found",
                                s.chars().count()
                            ))
                            .into()),
                        }
                    }
                    Value::Bytes(b) if b.len() == 1 => Ok(Value::Int(b[0] as i64)),
                    other => Err(RuntimeError::type_error(format!(
                        "ord() expected string of length 1, but {} found",
                        self.type_name(other)
                    ))
                    .into()),
                }
            }
            Builtin::Hasattr => {
                args.arity(name, 2, 2)?;
                let attr = self.attribute_name(&args.positional[1], name)?;
                Ok(Value::Bool(self.has_attribute(&args.positional[0], &attr)?))
            }
            Builtin::Getattr => {
                args.arity(name, 2, 3)?;
                let attr = self.attribute_name(&args.positional[1], name)?;
                match args.positional.get(2).cloned() {
                    Some(default) if !self.has_attribute(&args.positional[0], &attr)? => Ok(default),
                    _ => self.get_attribute(&args.positional[0], &attr),
                }
            }
            Builtin::Setattr => {
                args.arity(name, 3, 3)?;
                let attr = self.attribute_name(&args.positional[1], name)?;
                let value = args.positional[2].clone();
                self.set_attribute(&args.positional[0], &attr, value)?;
                Ok(Value::None)
            }
            Builtin::Divmod => {
                args.arity(name, 2, 2)?;
                let (a, b) = (&args.positional[0], &args.positional[1]);
                let pair = match (a, b) {
                    (Value::Int(_) | Value::Bool(_), Value::Int(_) | Value::Bool(_)) => {
                        let (x, y) = (a.as_int().unwrap_or(0), b.as_int().unwrap_or(0));
                        vec![Value::Int(floor_div(x, y)?), Value::Int(floor_mod(x, y)?)]
                    }
                    _ => match (a.as_float(), b.as_float()) {
                        (Some(_), Some(y)) if y == 0.0 => {
                            return Err(RuntimeError::ZeroDivisionError("float divmod()".into()).into())
                        }
                        (Some(x), Some(y)) => {
                            let q = (x / y).floor();
                            vec![Value::Float(q), Value::Float(x - q * y)]
                        }
                        _ => {
                            return Err(RuntimeError::type_error(format!(
                                "unsupported operand type(s) for divmod(): '{}' and '{}'",
                                self.type_name(a),
                                self.type_name(b)
                            ))
                            .into())
                        }
                    },
                };
                Ok(self.alloc(HeapObject::Tuple(pair)))
            }
            Builtin::Pow => {
                args.arity(name, 2, 3)?;
                let base = args.positional[0].clone();
                let exponent = args.positional[1].clone();
                match args.positional.get(2) {
                    None => self.binary_op(crate::parser::ast::BinOp::Pow, base, exponent),
                    Some(modulus) => {
                        let (b, e, m) = (self.expect_int(&base)?, self.expect_int(&exponent)?, self.expect_int(modulus)?);
                        if m == 0 {
                            return Err(RuntimeError::value_error("pow() 3rd argument cannot be 0").into());
                        }
                        let modulus = (m as i128).abs();
                        let mut b = (b as i128).rem_euclid(modulus);
                        if e < 0 {
                            b = mod_inverse(b, modulus).ok_or_else(|| {
                                RuntimeError::value_error("base is not invertible for the given modulus")
                            })?;
                        }
                        let (mut result, mut e) = (1i128 % modulus, e.unsigned_abs());
                        while e > 0 {
                            if e & 1 == 1 {
                                result = result * b % modulus;
                            }
                            b = b * b % modulus;
                            e >>= 1;
                        }
                        let result = if m < 0 && result != 0 { result - modulus } else { result };
                        Ok(Value::Int(result as i64))
                    }
                }
            }
            Builtin::Hex | Builtin::Bin | Builtin::Oct => {
                args.arity(name, 1, 1)?;
                let n = self.expect_int(&args.positional[0])?;
                let magnitude = n.unsigned_abs();
                Ok(match builtin {
                    Builtin::Hex => radix(n, "0x", format!("{:x}", magnitude)),
                    Builtin::Bin => radix(n, "0b", format!("{:b}", magnitude)),
                    _ => radix(n, "0o", format!("{:o}", magnitude)),
                })
            }
            Builtin::Id => {
                args.arity(name, 1, 1)?;
                Ok(Value::Int(self.identity(&args.positional[0]) as i64))
            }
            Builtin::Hash => {
                args.arity(name, 1, 1)?;
                let value = &args.positional[0];
                let key = self.hash(value)?;
                Ok(Value::Int(match (value, &key) {
                    (Value::Int(_) | Value::Bool(_), _) => value.as_int().unwrap_or(0),
                    (_, crate::memory::value::HashKey::Identity(id)) => (id.address() >> 4) as i64,
                    _ => {
                        let mut hasher = FxHasher::default();
                        key.hash(&mut hasher);
                        hasher.finish() as i64
                    }
                }))
            }
            Builtin::Iter => {
                args.arity(name, 1, 1)?;
                let value = args.positional.remove(0);
                if let Some(HeapObject::Iterator { .. }) = self.heap.deref(&value) {
                    return Ok(value);
                }
                if self.instance_method(&value, "__iter__").is_some() {
                    return self.call_method(value, "__iter__", Vec::new());
                }
                let kind = match self.heap.deref(&value) {
                    Some(HeapObject::List(_)) => "list_iterator",
                    Some(HeapObject::Tuple(_)) => "tuple_iterator",
                    Some(HeapObject::Dict(_)) => "dict_keyiterator",
                    Some(HeapObject::Set(_)) => "set_iterator",
                    Some(HeapObject::Range { .. }) => "range_iterator",
                    _ if matches!(value, Value::Str(_)) => "str_iterator",
                    _ => "iterator",
                };
                let items = self.collect_iterable(&value)?;
                Ok(self.make_iterator(kind, items))
            }
            Builtin::Next => {
                args.arity(name, 1, 2)?;
                let iterator = args.positional[0].clone();
                let default = args.positional.get(1).cloned();
                let heap_iterator = iterator
                    .as_ref_id()
                    .filter(|id| matches!(self.heap.get(*id), Some(HeapObject::Iterator { .. })));
                let item = match heap_iterator {
                    Some(id) => self.advance_iterator(id)?,
                    _ if self.instance_method(&iterator, "__next__").is_some() => {
                        let mut state = super::iteration::IterState::User(iterator);
                        self.iter_next(&mut state)?
                    }
                    _ => {
                        return Err(RuntimeError::type_error(format!(
                            "'{}' object is not an iterator",
                            self.type_name(&iterator)
                        ))
                        .into())
                    }
                };
                match (item, default) {
                    (Some(item), _) => Ok(item),
                    (None, Some(default)) => Ok(default),
                    (None, None) => Err(RuntimeError::StopIteration(String::new()).into()),
                }
            }
            Builtin::Callable => {
                args.arity(name, 1, 1)?;
                let value = &args.positional[0];
                let callable = match value {
                    Value::Builtin(_) | Value::Type(_) => true,
                    _ => match self.heap.deref(value) {
                        Some(
                            HeapObject::Function(_)
                            | HeapObject::BoundMethod { .. }
                            | HeapObject::NativeMethod { .. }
                            | HeapObject::Class(_),
                        ) => true,
                        Some(HeapObject::Instance(_)) => self.instance_method(value, "__call__").is_some(),
                        _ => false,
                    },
                };
                Ok(Value::Bool(callable))
            }
            Builtin::Super => self.make_super(args),
            Builtin::Staticmethod => {
                args.arity(name, 1, 1)?;
                Ok(self.alloc(HeapObject::StaticMethod(args.positional.remove(0))))
            }
            Builtin::Classmethod => {
                args.arity(name, 1, 1)?;
                Ok(self.alloc(HeapObject::ClassMethod(args.positional.remove(0))))
            }
            Builtin::NpArray | Builtin::NpZeros | Builtin::NpOnes | Builtin::NpArange => {
                self.call_numpy(builtin, args)
            }
            _ => self.call_math(builtin, args),
        }
    }

    /// Functions of the `math` module
    fn call_math(&mut self, builtin: Builtin, mut args: CallArgs) -> Exec<Value> {
        let name = builtin.name();
        args.no_keywords(name)?;
        match builtin {
            Builtin::MathGcd => {
                let mut result = 0;
                for value in &args.positional {
                    result = gcd(result, self.expect_int(value)?);
                }
                return Ok(Value::Int(result));
            }
            Builtin::MathHypot => {
                let mut total = 0.0f64;
                for value in &args.positional {
                    total = total.hypot(self.expect_float(value)?);
                }
                return Ok(Value::Float(total));
            }
            Builtin::MathLog => {
                args.arity(name, 1, 2)?;
                let x = self.expect_float(&args.positional[0])?;
                if x <= 0.0 {
                    return Err(math_domain().into());
                }
                return match args.positional.get(1) {
                    Some(base) => {
                        let base = self.expect_float(base)?;
                        if base <= 0.0 || base == 1.0 {
                            return Err(math_domain().into());
                        }
                        Ok(Value::Float(x.ln() / base.ln()))
                    }
                    None => Ok(Value::Float(x.ln())),
                };
            }
            _ => {}
        }

        args.arity(name, 1, 1)?;
        let value = args.positional.remove(0);
        match builtin {
            Builtin::MathIsqrt => {
                let n = self.expect_int(&value)?;
                if n < 0 {
                    return Err(RuntimeError::value_error("isqrt() argument must be nonnegative").into());
                }
                let mut root = (n as f64).sqrt() as i64;
                while root.checked_mul(root).map_or(true, |sq| sq > n) {
                    root -= 1;
                }
                while (root + 1).checked_mul(root + 1).is_some_and(|sq| sq <= n) {
                    root += 1;
                }
                Ok(Value::Int(root))
            }
            Builtin::MathFactorial => {
                let n = self.expect_int(&value)?;
                if n < 0 {
                    return Err(RuntimeError::value_error("factorial() not defined for negative values").into());
                }
                let mut result: i64 = 1;
                for k in 2..=n {
                    result = result
                        .checked_mul(k)
                        .ok_or_else(|| RuntimeError::OverflowError("integer overflow".into()))?;
                }
                Ok(Value::Int(result))
            }
            Builtin::MathFloor | Builtin::MathCeil => {
                if let Some(n) = value.as_int() {
                    return Ok(Value::Int(n));
                }
                let x = self.expect_float(&value)?;
                self.float_to_int(if builtin == Builtin::MathFloor { x.floor() } else { x.ceil() })
            }
            _ => {
                let x = self.expect_float(&value)?;
                let result = match builtin {
                    Builtin::MathSqrt if x < 0.0 => return Err(math_domain().into()),
                    Builtin::MathSqrt => x.sqrt(),
                    Builtin::MathFabs => x.abs(),
                    Builtin::MathLog2 | Builtin::MathLog10 if x <= 0.0 => return Err(math_domain().into()),
                    Builtin::MathLog2 => x.log2(),
                    Builtin::MathLog10 => x.log10(),
                    Builtin::MathExp => {
                        let result = x.exp();
                        if result.is_infinite() && x.is_finite() {
                            return Err(RuntimeError::OverflowError("math range error".into()).into());
                        }
                        result
                    }
                    Builtin::MathSin => x.sin(),
                    Builtin::MathCos => x.cos(),
                    Builtin::MathTan => x.tan(),
                    _ => {
                        return Err(RuntimeError::Internal(format!("{} is not a math function", name)).into())
                    }
                };
                Ok(Value::Float(result))
            }
        }
    }

    /// `min()`/`max()` over one iterable or several arguments
    fn min_max(&mut self, builtin: Builtin, mut args: CallArgs) -> Exec<Value> {
        let name = builtin.name();
        let key = args.take_keyword("key").filter(|k| !k.is_none());
        let default = args.take_keyword("default");
        args.no_keywords(name)?;
        let items = match args.positional.len() {
            0 => {
                return Err(RuntimeError::type_error(format!(
                    "{} expected at least 1 argument, got 0",
                    name
                ))
                .into())
            }
            1 => self.collect_iterable(&args.positional[0])?,
            _ => std::mem::take(&mut args.positional),
        };
        let mut best: Option<(Value, Value)> = None;
        for item in items {
            let rank = match &key {
                Some(key) => self.call_value(key.clone(), CallArgs::positional(vec![item.clone()]))?,
                None => item.clone(),
            };
            let replace = match &best {
                None => true,
                Some((best_rank, _)) if builtin == Builtin::Min => self.less_than(&rank, best_rank)?,
                Some((best_rank, _)) => self.less_than(best_rank, &rank)?,
            };
            if replace {
                best = Some((rank, item));
            }
        }
        match (best, default) {
            (Some((_, item)), _) => Ok(item),
            (None, Some(default)) => Ok(default),
            (None, None) => Err(RuntimeError::value_error(format!("{}() iterable argument is empty", name)).into()),
        }
    }

    /// Sort values by an optional key function, stably
    pub(crate) fn sort_values(&mut self, items: Vec<Value>, key: Option<Value>, reverse: bool) -> Exec<Vec<Value>> {
        let mut pairs = Vec::with_capacity(items.len());
        for item in items {
            let rank = match &key {
                Some(key) => self.call_value(key.clone(), CallArgs::positional(vec![item.clone()]))?,
                None => item.clone(),
            };
            pairs.push((rank, item));
        }
        let sorted = self.sort_pairs(pairs, reverse)?;
        Ok(sorted.into_iter().map(|(_, item)| item).collect())
    }

    /// Class of a value as seen by `type()`
    pub(crate) fn type_of(&self, value: &Value) -> Value {
        let ty = match value {
            Value::None => BuiltinType::NoneType,
            Value::Bool(_) => BuiltinType::Bool,
            Value::Int(_) => BuiltinType::Int,
            Value::Float(_) => BuiltinType::Float,
            Value::Str(_) => BuiltinType::Str,
            Value::Bytes(_) => BuiltinType::Bytes,
            Value::Builtin(_) => BuiltinType::BuiltinFunction,
            Value::Type(_) => BuiltinType::Type,
            Value::Ref(id) => match self.heap.get(*id) {
                Some(HeapObject::Instance(instance)) => return Value::Ref(instance.class),
                Some(object) => object.builtin_type(),
                None => BuiltinType::Object,
            },
        };
        Value::Type(ty)
    }

    /// `isinstance`/`issubclass` test of a class against a class or tuple of classes
    fn class_matches(&self, class: &Value, classinfo: &Value, function: &str) -> Exec<bool> {
        let candidates = match self.heap.deref(classinfo) {
            Some(HeapObject::Tuple(items)) => items.clone(),
            _ => vec![classinfo.clone()],
        };
        for candidate in &candidates {
            let matched = match (class, candidate) {
                (_, Value::Type(BuiltinType::Object)) => true,
                (Value::Type(ty), Value::Type(other)) => ty.is_subtype_of(*other),
                (Value::Ref(c), Value::Ref(other)) if matches!(self.heap.get(*other), Some(HeapObject::Class(_))) => {
                    self.heap.is_subclass(*c, *other)
                }
                (_, Value::Type(_)) => false,
                (_, Value::Ref(other)) if matches!(self.heap.get(*other), Some(HeapObject::Class(_))) => false,
                _ => {
                    return Err(RuntimeError::type_error(format!(
                        "{}() arg 2 must be a type, a tuple of types, or a union",
                        function
                    ))
                    .into())
                }
            };
            if matched {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Construct a value of a builtin type
    pub(crate) fn construct(&mut self, ty: BuiltinType, mut args: CallArgs) -> Exec<Value> {
        let name = ty.name();
        match ty {
            BuiltinType::Int => {
                let base = args.take_keyword("base");
                args.no_keywords(name)?;
                args.arity(name, 0, 2)?;
                let base = match base.or_else(|| args.positional.get(1).cloned()) {
                    Some(base) => Some(self.expect_int(&base)?),
                    None => None,
                };
                let Some(value) = args.positional.first().cloned() else {
                    return Ok(Value::Int(0));
                };
                self.to_int(&value, base)
            }
            BuiltinType::Float => {
                args.arity(name, 0, 1)?;
                let Some(value) = args.positional.first().cloned() else {
                    return Ok(Value::Float(0.0));
                };
                match &value {
                    Value::Float(_) => Ok(value),
                    Value::Int(_) | Value::Bool(_) => Ok(Value::Float(value.as_float().unwrap_or(0.0))),
                    Value::Str(s) => parse_float(s).map(Value::Float).ok_or_else(|| {
                        RuntimeError::value_error(format!(
                            "could not convert string to float: {}",
                            super::format::string_repr(s)
                        ))
                        .into()
                    }),
                    _ if self.instance_method(&value, "__float__").is_some() => {
                        self.call_method(value, "__float__", Vec::new())
                    }
                    _ => Err(RuntimeError::type_error(format!(
                        "float() argument must be a string or a real number, not '{}'",
                        self.type_name(&value)
                    ))
                    .into()),
                }
            }
            BuiltinType::Str => {
                args.take_keyword("encoding");
                args.no_keywords(name)?;
                args.arity(name, 0, 3)?;
                match args.positional.as_slice() {
                    [] => Ok(Value::str("")),
                    [Value::Bytes(b), _, ..] => Ok(Value::str(&String::from_utf8_lossy(b))),
                    [value, ..] => {
                        let value = value.clone();
                        Ok(Value::str(&self.to_str(&value)?))
                    }
                }
            }
            BuiltinType::Bool => {
                args.arity(name, 0, 1)?;
                match args.positional.first().cloned() {
                    Some(value) => Ok(Value::Bool(self.truthy(&value)?)),
                    None => Ok(Value::Bool(false)),
                }
            }
            BuiltinType::List | BuiltinType::Tuple | BuiltinType::Set => {
                args.no_keywords(name)?;
                args.arity(name, 0, 1)?;
                let items = match args.positional.first() {
                    Some(iterable) => {
                        let iterable = iterable.clone();
                        self.collect_iterable(&iterable)?
                    }
                    None => Vec::new(),
                };
                Ok(match ty {
                    BuiltinType::List => self.alloc(HeapObject::List(items)),
                    BuiltinType::Tuple => self.alloc(HeapObject::Tuple(items)),
                    _ => {
                        let set = self.build_set(items)?;
                        self.alloc(HeapObject::Set(set))
                    }
                })
            }
            BuiltinType::Dict => {
                args.arity(name, 0, 1)?;
                let mut map = DictMap::new();
                if let Some(source) = args.positional.first().cloned() {
                    self.dict_update_from(&mut map, &source)?;
                }
                for (key, value) in std::mem::take(&mut args.keywords) {
                    self.dict_insert(&mut map, Value::str(&key), value)?;
                }
                Ok(self.alloc(HeapObject::Dict(map)))
            }
            BuiltinType::Range => {
                args.no_keywords(name)?;
                args.arity(name, 1, 3)?;
                let mut bounds = Vec::with_capacity(3);
                for value in &args.positional {
                    bounds.push(self.expect_int(value)?);
                }
                let (start, stop, step) = match bounds.as_slice() {
                    [stop] => (0, *stop, 1),
                    [start, stop] => (*start, *stop, 1),
                    [start, stop, step] => (*start, *stop, *step),
                    _ => (0, 0, 1),
                };
                if step == 0 {
                    return Err(RuntimeError::value_error("range() arg 3 must not be zero").into());
                }
                Ok(self.alloc(HeapObject::Range { start, stop, step }))
            }
            BuiltinType::Type => {
                args.arity(name, 1, 1)?;
                Ok(self.type_of(&args.positional[0]))
            }
            BuiltinType::Deque => {
                let maxlen = args.take_keyword("maxlen");
                args.no_keywords(name)?;
                args.arity(name, 0, 2)?;
                let maxlen = match maxlen.or_else(|| args.positional.get(1).cloned()) {
                    None | Some(Value::None) => None,
                    Some(value) => {
                        let n = self.expect_int(&value)?;
                        if n < 0 {
                            return Err(RuntimeError::value_error("maxlen must be non-negative").into());
                        }
                        Some(n as usize)
                    }
                };
                let items = match args.positional.first() {
                    Some(iterable) => {
                        let iterable = iterable.clone();
                        self.collect_iterable(&iterable)?
                    }
                    None => Vec::new(),
                };
                let mut deque: VecDeque<Value> = items.into();
                if let Some(limit) = maxlen {
                    while deque.len() > limit {
                        deque.pop_front();
                    }
                }
                Ok(self.alloc(HeapObject::Deque { items: deque, maxlen }))
            }
            BuiltinType::Bytes => {
                args.take_keyword("encoding");
                args.no_keywords(name)?;
                args.arity(name, 0, 3)?;
                let bytes: Vec<u8> = match args.positional.first().cloned() {
                    None => Vec::new(),
                    Some(Value::Str(s)) => s.as_bytes().to_vec(),
                    Some(Value::Bytes(b)) => b.to_vec(),
                    Some(Value::Int(n)) if n >= 0 => vec![0; n as usize],
                    Some(iterable) => {
                        let mut bytes = Vec::new();
                        for item in self.collect_iterable(&iterable)? {
                            let n = self.expect_int(&item)?;
                            let byte = u8::try_from(n)
                                .map_err(|_| RuntimeError::value_error("bytes must be in range(0, 256)"))?;
                            bytes.push(byte);
                        }
                        bytes
                    }
                };
                Ok(Value::Bytes(Rc::from(bytes)))
            }
            BuiltinType::NdArray => self.call_numpy(Builtin::NpArray, args),
            _ => Err(RuntimeError::type_error(format!("cannot create '{}' instances", name)).into()),
        }
    }

    /// Merge a dict or an iterable of key/value pairs into `map`
    pub(crate) fn dict_update_from(&mut self, map: &mut DictMap, source: &Value) -> Exec<()> {
        if let Some(HeapObject::Dict(other)) = self.heap.deref(source) {
            for (key, value) in other.values().cloned().collect::<Vec<_>>() {
                self.dict_insert(map, key, value)?;
            }
            return Ok(());
        }
        for (index, pair) in self.collect_iterable(source)?.into_iter().enumerate() {
            let items = self.collect_iterable(&pair)?;
            match <[Value; 2]>::try_from(items) {
                Ok([key, value]) => self.dict_insert(map, key, value)?,
                Err(items) => {
                    return Err(RuntimeError::value_error(format!(
                        "dictionary update sequence element #{} has length {}; 2 is required",
                        index,
                        items.len()
                    ))
                    .into())
                }
            }
        }
        Ok(())
    }

    /// `int(value[, base])`
    pub(crate) fn to_int(&mut self, value: &Value, base: Option<i64>) -> Exec<Value> {
        match (value, base) {
            (Value::Int(_) | Value::Bool(_), None) => Ok(Value::Int(value.as_int().unwrap_or(0))),
            (Value::Float(x), None) => self.float_to_int(x.trunc()),
            (Value::Str(s), base) => {
                let base = base.unwrap_or(10);
                if base != 0 && !(2..=36).contains(&base) {
                    return Err(RuntimeError::value_error("int() base must be >= 2 and <= 36, or 0").into());
                }
                parse_int(s, base as u32).map(Value::Int).ok_or_else(|| {
                    RuntimeError::value_error(format!(
                        "invalid literal for int() with base {}: {}",
                        base,
                        super::format::string_repr(s)
                    ))
                    .into()
                })
            }
            (_, Some(_)) => Err(RuntimeError::type_error("int() can't convert non-string with explicit base").into()),
            _ if self.instance_method(value, "__int__").is_some() => self.call_method(value.clone(), "__int__", Vec::new()),
            _ => Err(RuntimeError::type_error(format!(
                "int() argument must be a string, a bytes-like object or a real number, not '{}'",
                self.type_name(value)
            ))
            .into()),
        }
    }

    pub(crate) fn float_to_int(&self, x: f64) -> Exec<Value> {
        if x.is_nan() {
            return Err(RuntimeError::value_error("cannot convert float NaN to integer").into());
        }
        if x.is_infinite() {
            return Err(RuntimeError::OverflowError("cannot convert float infinity to integer".into()).into());
        }
        if x < -9.223_372_036_854_776e18 || x >= 9.223_372_036_854_776e18 {
            return Err(RuntimeError::OverflowError("integer overflow".into()).into());
        }
        Ok(Value::Int(x as i64))
    }

    /// Integer argument; bools count, floats do not
    pub(crate) fn expect_int(&self, value: &Value) -> Exec<i64> {
        value.as_int().ok_or_else(|| {
            RuntimeError::type_error(format!(
                "'{}' object cannot be interpreted as an integer",
                self.type_name(value)
            ))
            .into()
        })
    }

    pub(crate) fn expect_float(&self, value: &Value) -> Exec<f64> {
        value.as_float().ok_or_else(|| {
            RuntimeError::type_error(format!("must be real number, not {}", self.type_name(value))).into()
        })
    }

    fn attribute_name(&self, value: &Value, function: &str) -> Exec<String> {
        match value {
            Value::Str(s) => Ok(s.to_string()),
            other => Err(RuntimeError::type_error(format!(
                "{}(): attribute name must be string, not '{}'",
                function,
                self.type_name(other)
            ))
            .into()),
        }
    }

    fn optional_text(&mut self, value: Option<Value>, default: &str) -> Exec<String> {
        match value {
            None | Some(Value::None) => Ok(default.to_string()),
            Some(Value::Str(s)) => Ok(s.to_string()),
            Some(other) => Err(RuntimeError::type_error(format!(
                "sep must be None or a string, not {}",
                self.type_name(&other)
            ))
            .into()),
        }
    }

    /// `id(value)`
    pub(crate) fn identity(&self, value: &Value) -> u64 {
        if let Value::Ref(id) = value {
            return id.address();
        }
        let mut hasher = FxHasher::default();
        match self.heap.hash_key(value) {
            Ok(key) => key.hash(&mut hasher),
            Err(name) => name.hash(&mut hasher),
        }
        SCALAR_ID_BASE + (hasher.finish() % 0x1_0000_0000) * 0x10
    }
}

/// Inverse of `value` modulo `modulus`, if they are coprime
fn mod_inverse(value: i128, modulus: i128) -> Option<i128> {
    let (mut old_r, mut r) = (value, modulus);
    let (mut old_s, mut s) = (1i128, 0i128);
    while r != 0 {
        let q = old_r / r;
        (old_r, r) = (r, old_r - q * r);
        (old_s, s) = (s, old_s - q * s);
    }
    (old_r == 1 || modulus == 1).then(|| old_s.rem_euclid(modulus))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_int_forms() {
        assert_eq!(parse_int(" 42 ", 10), Some(42));
        assert_eq!(parse_int("-1_000", 10), Some(-1000));
        assert_eq!(parse_int("0x1f", 0), Some(31));
        assert_eq!(parse_int("ff", 16), Some(255));
        assert_eq!(parse_int("1__0", 10), None);
        assert_eq!(parse_int("abc", 10), None);
    }

    #[test]
    fn test_parse_float_forms() {
        assert_eq!(parse_float("3.5"), Some(3.5));
        assert_eq!(parse_float("-inf"), Some(f64::NEG_INFINITY));
        assert_eq!(parse_float("1e3"), Some(1000.0));
        assert!(parse_float("nan").is_some_and(f64::is_nan));
        assert_eq!(parse_float("x1"), None);
    }

    #[test]
    fn test_round_half_even() {
        assert_eq!(round_float(2.675, 2), 2.67);
        assert_eq!(round_float(1.23456, 3), 1.235);
        assert_eq!(round_int(1250, -2).unwrap(), 1200);
        assert_eq!(round_int(1350, -2).unwrap(), 1400);
        assert_eq!(round_int(-151, -2).unwrap(), -200);
    }

    #[test]
    fn test_gcd() {
        assert_eq!(gcd(12, 18), 6);
        assert_eq!(gcd(-4, 6), 2);
        assert_eq!(gcd(0, 5), 5);
    }

    #[test]
    fn test_mod_inverse() {
        assert_eq!(mod_inverse(2, 5), Some(3));
        assert_eq!(mod_inverse(3, 7), Some(5));
        assert_eq!(mod_inverse(4, 8), None);
        assert_eq!(mod_inverse(0, 1), Some(0));
    }
}
