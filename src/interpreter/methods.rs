//! Methods of builtin types (`str`, `list`, `dict`, `set`, `deque`, ...)

use super::calls::CallArgs;
use super::engine::Interpreter;
use super::errors::{Exec, RuntimeError};
use super::format::string_repr;
use crate::memory::heap::{DictMap, HeapObject, SetMap};
use crate::parser::ast::BinOp;
use crate::memory::value::{ObjectId, Value};
use std::rc::Rc;

const METHOD_ORIGIN: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/", file!());

const STR_METHODS: &[&str] = &[
    "upper", "lower", "strip", "lstrip", "rstrip", "split", "rsplit", "join", "replace", "startswith",
    "endswith", "find", "rfind", "index", "count", "format", "isdigit", "isalpha", "isalnum", "isspace",
    "isupper", "islower", "isnumeric", "isdecimal", "title", "capitalize", "swapcase", "splitlines", "center",
    "ljust", "rjust", "zfill", "encode", "partition", "rpartition",
];
const BYTES_METHODS: &[&str] = &["decode", "hex", "count", "startswith", "endswith"];
const LIST_METHODS: &[&str] = &[
    "append", "extend", "insert", "pop", "remove", "index", "count", "sort", "reverse", "clear", "copy",
];
const TUPLE_METHODS: &[&str] = &["index", "count"];
const DICT_METHODS: &[&str] = &[
    "get", "keys", "values", "items", "pop", "popitem", "setdefault", "update", "clear", "copy",
];
const SET_METHODS: &[&str] = &[
    "add", "remove", "discard", "pop", "clear", "copy", "update", "union", "intersection", "difference",
    "symmetric_difference", "issubset", "issuperset", "isdisjoint",
];
const DEQUE_METHODS: &[&str] = &[
    "append", "appendleft", "pop", "popleft", "extend", "extendleft", "clear", "rotate", "count", "copy",
];
pub(crate) const ARRAY_METHODS: &[&str] = &[
    "sum", "mean", "max", "min", "argmax", "argmin", "reshape", "tolist", "copy", "any", "all", "flatten",
];

fn method_names(receiver: &Value, object: Option<&HeapObject>) -> &'static [&'static str] {
    match (receiver, object) {
        (Value::Str(_), _) => STR_METHODS,
        (Value::Bytes(_), _) => BYTES_METHODS,
        (Value::Int(_), _) => &["bit_length"],
        (Value::Float(_), _) => &["is_integer"],
        (_, Some(HeapObject::List(_))) => LIST_METHODS,
        (_, Some(HeapObject::Tuple(_))) => TUPLE_METHODS,
        (_, Some(HeapObject::Dict(_))) => DICT_METHODS,
        (_, Some(HeapObject::Set(_))) => SET_METHODS,
        (_, Some(HeapObject::Deque { .. })) => DEQUE_METHODS,
        (_, Some(HeapObject::Array(_))) => ARRAY_METHODS,
        _ => &[],
    }
}

/// Split on runs of whitespace, at most `limit` times from the left
fn split_whitespace(s: &str, limit: Option<usize>) -> Vec<String> {
    let mut parts = Vec::new();
    let mut rest = s.trim_start();
    while !rest.is_empty() {
        if limit.is_some_and(|n| parts.len() >= n) {
            parts.push(rest.to_string());
            break;
        }
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        parts.push(rest[..end].to_string());
        rest = rest[end..].trim_start();
    }
    parts
}

fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut previous_cased = false;
    for c in s.chars() {
        if previous_cased {
            out.extend(c.to_lowercase());
        } else {
            out.extend(c.to_uppercase());
        }
        previous_cased = c.is_alphabetic();
    }
    out
}

/// Char offset of a byte offset
fn char_offset(s: &str, byte: usize) -> i64 {
    s[..byte].chars().count() as i64
}

/// Byte range of the `[start:end]` char slice used by `find`/`count`
fn char_window(s: &str, start: Option<i64>, end: Option<i64>) -> (usize, usize) {
    let len = s.chars().count() as i64;
    let resolve = |bound: i64| {
        let bound = if bound < 0 { bound + len } else { bound };
        bound.clamp(0, len) as usize
    };
    let (start, end) = (resolve(start.unwrap_or(0)), resolve(end.unwrap_or(len)));
    let byte = |chars: usize| s.char_indices().nth(chars).map_or(s.len(), |(i, _)| i);
    (byte(start), byte(end.max(start)))
}

impl Interpreter<'_> {
    /// Whether `receiver` has a builtin method `name`
    pub(crate) fn has_native_method(&self, receiver: &Value, name: &str) -> bool {
        method_names(receiver, self.heap.deref(receiver)).contains(&name)
    }

    /// Run builtin method `name` of `receiver`
    pub(crate) fn call_native_method(&mut self, receiver: Value, name: &str, args: CallArgs) -> Exec<Value> {
        match &receiver {
            Value::Str(s) => {
                let s = s.clone();
                return self.str_method(&s, name, args);
            }
            Value::Bytes(b) => {
                let b = b.clone();
                return self.bytes_method(&b, name, args);
            }
            Value::Int(n) if name == "bit_length" => {
                args.arity(name, 0, 0)?;
                return Ok(Value::Int(64 - n.unsigned_abs().leading_zeros() as i64));
            }
            Value::Float(x) if name == "is_integer" => {
                args.arity(name, 0, 0)?;
                return Ok(Value::Bool(x.is_finite() && x.fract() == 0.0));
            }
            _ => {}
        }
        let Some(id) = receiver.as_ref_id() else {
            return Err(self.missing_method(&receiver, name).into());
        };
        match self.object(id)? {
            HeapObject::List(_) => self.list_method(id, name, args),
            HeapObject::Tuple(items) => {
                let items = items.clone();
                self.sequence_search(&items, "tuple", name, args)
            }
            HeapObject::Dict(_) => self.dict_method(id, name, args),
            HeapObject::Set(_) => self.set_method(id, name, args),
            HeapObject::Deque { .. } => self.deque_method(id, name, args),
            HeapObject::Array(_) => self.array_method(id, name, args),
            HeapObject::Instance(instance) if name == "__init__" => {
                let is_exception = instance.args.is_some();
                if is_exception {
                    args.no_keywords("BaseException")?;
                    if let HeapObject::Instance(instance) = self.object_mut(id)? {
                        instance.args = Some(args.positional);
                    }
                } else if !args.positional.is_empty() || !args.keywords.is_empty() {
                    return Err(RuntimeError::type_error(
                        "object.__init__() takes exactly one argument (the instance to initialize)",
                    )
                    .into());
                }
                Ok(Value::None)
            }
            _ => Err(self.missing_method(&receiver, name).into()),
        }
    }

    fn missing_method(&self, receiver: &Value, name: &str) -> RuntimeError {
        RuntimeError::AttributeError(format!(
            "'{}' object has no attribute '{}'",
            self.type_name(receiver),
            name
        ))
    }

    fn expect_str(&self, value: &Value, what: &str) -> Exec<Rc<str>> {
        match value {
            Value::Str(s) => Ok(s.clone()),
            other => Err(RuntimeError::type_error(format!(
                "{} must be str, not {}",
                what,
                self.type_name(other)
            ))
            .into()),
        }
    }

    fn optional_int(&self, value: Option<&Value>) -> Exec<Option<i64>> {
        match value {
            None | Some(Value::None) => Ok(None),
            Some(value) => Ok(Some(self.expect_int(value)?)),
        }
    }

    fn str_method(&mut self, s: &str, name: &str, mut args: CallArgs) -> Exec<Value> {
        if name == "format" {
            return Ok(Value::str(&self.str_format(s, &args)?));
        }
        if name == "split" || name == "rsplit" {
            let sep = args.take_keyword("sep");
            let maxsplit = args.take_keyword("maxsplit");
            args.no_keywords(name)?;
            args.arity(name, 0, 2)?;
            let sep = sep.or_else(|| args.positional.first().cloned()).filter(|v| !v.is_none());
            let limit = self
                .optional_int(maxsplit.as_ref().or(args.positional.get(1)))?
                .filter(|n| *n >= 0)
                .map(|n| n as usize);
            let parts: Vec<String> = match sep {
                None if name == "split" => split_whitespace(s, limit),
                None => {
                    let reversed: String = s.chars().rev().collect();
                    let mut parts: Vec<String> = split_whitespace(&reversed, limit)
                        .into_iter()
                        .map(|p| p.chars().rev().collect())
                        .collect();
                    parts.reverse();
                    parts
                }
                Some(sep) => {
                    let sep = self.expect_str(&sep, "separator")?;
                    if sep.is_empty() {
                        return Err(RuntimeError::value_error("empty separator").into());
                    }
                    match (name, limit) {
                        ("split", Some(n)) => s.splitn(n + 1, sep.as_ref()).map(str::to_string).collect(),
                        ("split", None) => s.split(sep.as_ref()).map(str::to_string).collect(),
                        (_, Some(n)) => {
                            let mut parts: Vec<String> = s.rsplitn(n + 1, sep.as_ref()).map(str::to_string).collect();
                            parts.reverse();
                            parts
                        }
                        (_, None) => s.split(sep.as_ref()).map(str::to_string).collect(),
                    }
                }
            };
            let items = parts.iter().map(|p| Value::str(p)).collect();
            return Ok(self.alloc(HeapObject::List(items)));
        }
        args.no_keywords(name)?;
        let arg = |i: usize| args.positional.get(i).cloned();
        let result = match name {
            "upper" => Value::str(&s.to_uppercase()),
            "lower" => Value::str(&s.to_lowercase()),
            "title" => Value::str(&title_case(s)),
            "capitalize" => {
                let mut chars = s.chars();
                let text: String = match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                    None => String::new(),
                };
                Value::str(&text)
            }
            "swapcase" => Value::str(
                &s.chars()
                    .flat_map(|c| {
                        if c.is_uppercase() {
                            c.to_lowercase().collect::<Vec<_>>()
                        } else {
                            c.to_uppercase().collect::<Vec<_>>()
                        }
                    })
                    .collect::<String>(),
            ),
            "strip" | "lstrip" | "rstrip" => {
                args.arity(name, 0, 1)?;
                let chars: Option<Vec<char>> = match arg(0) {
                    None | Some(Value::None) => None,
                    Some(value) => Some(self.expect_str(&value, "strip arg")?.chars().collect()),
                };
                let matches = |c: char| chars.as_ref().map_or(c.is_whitespace(), |set| set.contains(&c));
                let text = match name {
                    "strip" => s.trim_matches(matches),
                    "lstrip" => s.trim_start_matches(matches),
                    _ => s.trim_end_matches(matches),
                };
                Value::str(text)
            }
            "join" => {
                args.arity(name, 1, 1)?;
                let items = self.collect_iterable(&args.positional[0])?;
                let mut parts = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    match item {
                        Value::Str(part) => parts.push(part.to_string()),
                        other => {
                            return Err(RuntimeError::type_error(format!(
                                "sequence item {}: expected str instance, {} found",
                                i,
                                self.type_name(other)
                            ))
                            .into())
                        }
                    }
                }
                Value::str(&parts.join(s))
            }
            "replace" => {
                args.arity(name, 2, 3)?;
                let old = self.expect_str(&args.positional[0], "replace() argument 1")?;
                let new = self.expect_str(&args.positional[1], "replace() argument 2")?;
                match self.optional_int(args.positional.get(2))?.filter(|n| *n >= 0) {
                    Some(count) => Value::str(&s.replacen(old.as_ref(), &new, count as usize)),
                    None => Value::str(&s.replace(old.as_ref(), &new)),
                }
            }
            "startswith" | "endswith" => {
                args.arity(name, 1, 1)?;
                let candidates = match self.heap.deref(&args.positional[0]) {
                    Some(HeapObject::Tuple(items)) => items.clone(),
                    _ => vec![args.positional[0].clone()],
                };
                let mut found = false;
                for candidate in &candidates {
                    let affix = self.expect_str(candidate, name)?;
                    found |= if name == "startswith" { s.starts_with(affix.as_ref()) } else { s.ends_with(affix.as_ref()) };
                }
                Value::Bool(found)
            }
            "find" | "rfind" | "index" | "count" => {
                args.arity(name, 1, 3)?;
                let needle = self.expect_str(&args.positional[0], "substring")?;
                let start = self.optional_int(args.positional.get(1))?;
                let end = self.optional_int(args.positional.get(2))?;
                let (from, to) = char_window(s, start, end);
                let window = &s[from..to];
                if name == "count" {
                    let count = if needle.is_empty() {
                        window.chars().count() + 1
                    } else {
                        window.matches(needle.as_ref()).count()
                    };
                    return Ok(Value::Int(count as i64));
                }
                let found = if name == "rfind" { window.rfind(needle.as_ref()) } else { window.find(needle.as_ref()) };
                match found {
                    Some(byte) => Value::Int(char_offset(s, from + byte)),
                    None if name == "index" => {
                        return Err(RuntimeError::value_error("substring not found").into());
                    }
                    None => Value::Int(-1),
                }
            }
            "isdigit" | "isnumeric" | "isdecimal" => {
                Value::Bool(!s.is_empty() && s.chars().all(|c| c.is_numeric()))
            }
            "isalpha" => Value::Bool(!s.is_empty() && s.chars().all(char::is_alphabetic)),
            "isalnum" => Value::Bool(!s.is_empty() && s.chars().all(char::is_alphanumeric)),
            "isspace" => Value::Bool(!s.is_empty() && s.chars().all(char::is_whitespace)),
            "isupper" => Value::Bool(s.chars().any(char::is_alphabetic) && !s.chars().any(char::is_lowercase)),
            "islower" => Value::Bool(s.chars().any(char::is_alphabetic) && !s.chars().any(char::is_uppercase)),
            "splitlines" => {
                let items = s.lines().map(Value::str).collect();
                return Ok(self.alloc(HeapObject::List(items)));
            }
            "center" | "ljust" | "rjust" => {
                args.arity(name, 1, 2)?;
                let width = self.expect_int(&args.positional[0])?.max(0) as usize;
                let fill = match arg(1) {
                    Some(value) => {
                        let fill = self.expect_str(&value, "fill character")?;
                        let mut chars = fill.chars();
                        match (chars.next(), chars.next()) {
                            (Some(c), None) => c,
                            _ => {
                                return Err(RuntimeError::type_error(
                                    "The fill character must be exactly one character long",
                                )
                                .into())
                            }
                        }
                    }
                    None => ' ',
                };
                let len = s.chars().count();
                let padding = width.saturating_sub(len);
                let (left, right) = match name {
                    "ljust" => (0, padding),
                    "rjust" => (padding, 0),
                    _ => {
                        let left = padding / 2 + (padding & width & 1);
                        (left, padding - left)
                    }
                };
                let fill = fill.to_string();
                Value::str(&format!("{}{}{}", fill.repeat(left), s, fill.repeat(right)))
            }
            "zfill" => {
                args.arity(name, 1, 1)?;
                let width = self.expect_int(&args.positional[0])?.max(0) as usize;
                let len = s.chars().count();
                if len >= width {
                    Value::str(s)
                } else {
                    let (sign, digits) = match s.chars().next() {
                        Some(c @ ('+' | '-')) => (c.to_string(), &s[1..]),
                        _ => (String::new(), s),
                    };
                    Value::str(&format!("{}{}{}", sign, "0".repeat(width - len), digits))
                }
            }
            "encode" => Value::Bytes(Rc::from(s.as_bytes())),
            "partition" | "rpartition" => {
                args.arity(name, 1, 1)?;
                let sep = self.expect_str(&args.positional[0], "separator")?;
                if sep.is_empty() {
                    return Err(RuntimeError::value_error("empty separator").into());
                }
                let found = if name == "partition" { s.find(sep.as_ref()) } else { s.rfind(sep.as_ref()) };
                let parts = match found {
                    Some(i) => [&s[..i], sep.as_ref(), &s[i + sep.len()..]],
                    None if name == "partition" => [s, "", ""],
                    None => ["", "", s],
                };
                let items = parts.iter().map(|p| Value::str(p)).collect();
                return Ok(self.alloc(HeapObject::Tuple(items)));
            }
            _ => return Err(self.missing_method(&Value::str(s), name).into()),
        };
        Ok(result)
    }

    /// `template.format(*args, **kwargs)`
    fn str_format(&mut self, template: &str, args: &CallArgs) -> Exec<String> {
        let mut out = String::new();
        let mut chars = template.chars().peekable();
        let mut auto_index = 0;
        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    out.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    out.push('}');
                }
                '}' => {
                    return Err(RuntimeError::value_error("Single '}' encountered in format string").into());
                }
                '{' => {
                    let mut field = String::new();
                    let mut closed = false;
                    for c in chars.by_ref() {
                        if c == '}' {
                            closed = true;
                            break;
                        }
                        field.push(c);
                    }
                    if !closed {
                        return Err(RuntimeError::value_error("expected '}' before end of string").into());
                    }
                    let (head, spec) = field.split_once(':').unwrap_or((field.as_str(), ""));
                    let (head, conversion) = match head.split_once('!') {
                        Some((head, conversion)) => (head, conversion.chars().next()),
                        None => (head, None),
                    };
                    let mut path = head.split('.');
                    let key = path.next().unwrap_or_default();
                    let mut value = if key.is_empty() {
                        let value = args.positional.get(auto_index).cloned();
                        auto_index += 1;
                        value.ok_or_else(|| {
                            RuntimeError::IndexError(format!(
                                "Replacement index {} out of range for positional args tuple",
                                auto_index - 1
                            ))
                        })?
                    } else if let Ok(index) = key.parse::<usize>() {
                        args.positional.get(index).cloned().ok_or_else(|| {
                            RuntimeError::IndexError(format!(
                                "Replacement index {} out of range for positional args tuple",
                                index
                            ))
                        })?
                    } else {
                        args.keywords
                            .iter()
                            .find(|(k, _)| k == key)
                            .map(|(_, v)| v.clone())
                            .ok_or_else(|| RuntimeError::KeyError(string_repr(key)))?
                    };
                    for attr in path {
                        value = self.get_attribute(&value, attr)?;
                    }
                    let value = match conversion {
                        Some('r') | Some('a') => Value::str(&self.repr(&value)?),
                        Some('s') => Value::str(&self.to_str(&value)?),
                        Some(other) => {
                            return Err(RuntimeError::value_error(format!(
                                "Unknown conversion specifier {}",
                                other
                            ))
                            .into())
                        }
                        None => value,
                    };
                    if spec.is_empty() {
                        out.push_str(&self.to_str(&value)?);
                    } else {
                        out.push_str(&self.format_value(&value, spec)?);
                    }
                }
                c => out.push(c),
            }
        }
        Ok(out)
    }

    fn bytes_method(&mut self, b: &[u8], name: &str, args: CallArgs) -> Exec<Value> {
        match name {
            "decode" => String::from_utf8(b.to_vec()).map(|s| Value::str(&s)).map_err(|e| {
                RuntimeError::value_error(format!(
                    "'utf-8' codec can't decode byte 0x{:02x} in position {}: invalid start byte",
                    b.get(e.utf8_error().valid_up_to()).copied().unwrap_or(0),
                    e.utf8_error().valid_up_to()
                ))
                .into()
            }),
            "hex" => Ok(Value::str(&b.iter().map(|x| format!("{:02x}", x)).collect::<String>())),
            "count" | "startswith" | "endswith" => {
                args.arity(name, 1, 1)?;
                let needle: Vec<u8> = match &args.positional[0] {
                    Value::Bytes(n) => n.to_vec(),
                    Value::Int(n) if name == "count" => vec![*n as u8],
                    other => {
                        return Err(RuntimeError::type_error(format!(
                            "a bytes-like object is required, not '{}'",
                            self.type_name(other)
                        ))
                        .into())
                    }
                };
                Ok(match name {
                    "startswith" => Value::Bool(b.starts_with(&needle)),
                    "endswith" => Value::Bool(b.ends_with(&needle)),
                    _ if needle.is_empty() => Value::Int(b.len() as i64 + 1),
                    _ => Value::Int(b.windows(needle.len()).filter(|w| *w == needle.as_slice()).count() as i64),
                })
            }
            _ => Err(self.missing_method(&Value::Bytes(Rc::from(b)), name).into()),
        }
    }

    /// `index` and `count` shared by lists and tuples
    fn sequence_search(&mut self, items: &[Value], kind: &str, name: &str, args: CallArgs) -> Exec<Value> {
        match name {
            "count" => {
                args.arity(name, 1, 1)?;
                let mut count = 0;
                for item in items {
                    if self.values_equal(item, &args.positional[0])? {
                        count += 1;
                    }
                }
                Ok(Value::Int(count))
            }
            "index" => {
                args.arity(name, 1, 3)?;
                let len = items.len();
                let start = self.optional_int(args.positional.get(1))?;
                let end = self.optional_int(args.positional.get(2))?;
                let (from, to, _) = super::containers::slice_bounds(len, start, end, None)?;
                for (i, item) in items.iter().enumerate().take(to.max(0) as usize).skip(from.max(0) as usize) {
                    if self.values_equal(item, &args.positional[0])? {
                        return Ok(Value::Int(i as i64));
                    }
                }
                let message = if kind == "list" {
                    format!("{} is not in list", self.repr(&args.positional[0])?)
                } else {
                    "tuple.index(x): x not in tuple".to_string()
                };
                Err(RuntimeError::value_error(message).into())
            }
            _ => Err(RuntimeError::AttributeError(format!("'{}' object has no attribute '{}'", kind, name)).into()),
        }
    }

    fn list_items(&self, id: ObjectId) -> Exec<Vec<Value>> {
        match self.object(id)? {
            HeapObject::List(items) => Ok(items.clone()),
            _ => Ok(Vec::new()),
        }
    }

    fn with_list<T>(&mut self, id: ObjectId, f: impl FnOnce(&mut Vec<Value>) -> T) -> Exec<T> {
        match self.object_mut(id)? {
            HeapObject::List(items) => Ok(f(items)),
            _ => Err(RuntimeError::Internal("list method on a non-list".into()).into()),
        }
    }

    fn list_method(&mut self, id: ObjectId, name: &str, mut args: CallArgs) -> Exec<Value> {
        if name == "sort" {
            let frame = self.native_frame("sort", METHOD_ORIGIN, line!());
            return self.run_frame(frame, move |this| {
                let key = args.take_keyword("key").filter(|k| !k.is_none());
                let reverse = match args.take_keyword("reverse") {
                    Some(value) => this.truthy(&value)?,
                    None => false,
                };
                args.no_keywords("sort")?;
                args.arity("sort", 0, 0)?;
                let items = this.list_items(id)?;
                let sorted = this.sort_values(items, key, reverse)?;
                this.with_list(id, |items| *items = sorted)?;
                Ok(Value::None)
            });
        }
        args.no_keywords(name)?;
        match name {
            "append" => {
                args.arity(name, 1, 1)?;
                let item = args.positional.remove(0);
                self.with_list(id, |items| items.push(item))?;
                Ok(Value::None)
            }
            "extend" => {
                args.arity(name, 1, 1)?;
                let extra = self.collect_iterable(&args.positional[0])?;
                self.with_list(id, |items| items.extend(extra))?;
                Ok(Value::None)
            }
            "insert" => {
                args.arity(name, 2, 2)?;
                let index = self.expect_int(&args.positional[0])?;
                let item = args.positional.remove(1);
                self.with_list(id, |items| {
                    let len = items.len() as i64;
                    let at = if index < 0 { (index + len).max(0) } else { index.min(len) };
                    items.insert(at as usize, item);
                })?;
                Ok(Value::None)
            }
            "pop" => {
                args.arity(name, 0, 1)?;
                let index = self.optional_int(args.positional.first())?.unwrap_or(-1);
                let popped = self.with_list(id, |items| {
                    if items.is_empty() {
                        return Err("pop from empty list");
                    }
                    super::containers::normalize_index(index, items.len())
                        .map(|i| items.remove(i))
                        .ok_or("pop index out of range")
                })?;
                popped.map_err(|message| RuntimeError::IndexError(message.to_string()).into())
            }
            "remove" => {
                args.arity(name, 1, 1)?;
                let items = self.list_items(id)?;
                for (i, item) in items.iter().enumerate() {
                    if self.values_equal(item, &args.positional[0])? {
                        self.with_list(id, |items| items.remove(i))?;
                        return Ok(Value::None);
                    }
                }
                Err(RuntimeError::value_error("list.remove(x): x not in list").into())
            }
            "index" | "count" => {
                let items = self.list_items(id)?;
                self.sequence_search(&items, "list", name, args)
            }
            "reverse" => {
                args.arity(name, 0, 0)?;
                self.with_list(id, |items| items.reverse())?;
                Ok(Value::None)
            }
            "clear" => {
                args.arity(name, 0, 0)?;
                self.with_list(id, Vec::clear)?;
                Ok(Value::None)
            }
            "copy" => {
                args.arity(name, 0, 0)?;
                let items = self.list_items(id)?;
                Ok(self.alloc(HeapObject::List(items)))
            }
            _ => Err(self.missing_method(&Value::Ref(id), name).into()),
        }
    }

    fn dict_map(&self, id: ObjectId) -> Exec<DictMap> {
        match self.object(id)? {
            HeapObject::Dict(map) => Ok(map.clone()),
            _ => Ok(DictMap::new()),
        }
    }

    fn with_dict<T>(&mut self, id: ObjectId, f: impl FnOnce(&mut DictMap) -> T) -> Exec<T> {
        match self.object_mut(id)? {
            HeapObject::Dict(map) => Ok(f(map)),
            _ => Err(RuntimeError::Internal("dict method on a non-dict".into()).into()),
        }
    }

    fn dict_method(&mut self, id: ObjectId, name: &str, mut args: CallArgs) -> Exec<Value> {
        if name == "update" {
            args.arity(name, 0, 1)?;
            let mut map = self.dict_map(id)?;
            if let Some(source) = args.positional.first().cloned() {
                self.dict_update_from(&mut map, &source)?;
            }
            for (key, value) in std::mem::take(&mut args.keywords) {
                self.dict_insert(&mut map, Value::str(&key), value)?;
            }
            self.with_dict(id, |target| *target = map)?;
            return Ok(Value::None);
        }
        args.no_keywords(name)?;
        match name {
            "get" => {
                args.arity(name, 1, 2)?;
                let hash = self.hash(&args.positional[0])?;
                let found = self.with_dict(id, |map| map.get(&hash).map(|(_, v)| v.clone()))?;
                Ok(found.or_else(|| args.positional.get(1).cloned()).unwrap_or_default())
            }
            "keys" | "values" | "items" => {
                args.arity(name, 0, 0)?;
                let map = self.dict_map(id)?;
                let items = match name {
                    "keys" => map.values().map(|(k, _)| k.clone()).collect(),
                    "values" => map.values().map(|(_, v)| v.clone()).collect(),
                    _ => map
                        .values()
                        .map(|(k, v)| self.alloc(HeapObject::Tuple(vec![k.clone(), v.clone()])))
                        .collect(),
                };
                let kind = match name {
                    "keys" => "dict_keys",
                    "values" => "dict_values",
                    _ => "dict_items",
                };
                Ok(self.make_iterator(kind, items))
            }
            "pop" => {
                args.arity(name, 1, 2)?;
                let hash = self.hash(&args.positional[0])?;
                let removed = self.with_dict(id, |map| map.shift_remove(&hash))?;
                match (removed, args.positional.get(1)) {
                    (Some((_, value)), _) => Ok(value),
                    (None, Some(default)) => Ok(default.clone()),
                    (None, None) => Err(RuntimeError::KeyError(self.repr(&args.positional[0])?).into()),
                }
            }
            "popitem" => {
                args.arity(name, 0, 0)?;
                match self.with_dict(id, |map| map.pop())? {
                    Some((_, (key, value))) => Ok(self.alloc(HeapObject::Tuple(vec![key, value]))),
                    None => Err(RuntimeError::KeyError("'popitem(): dictionary is empty'".into()).into()),
                }
            }
            "setdefault" => {
                args.arity(name, 1, 2)?;
                let key = args.positional[0].clone();
                let default = args.positional.get(1).cloned().unwrap_or_default();
                let hash = self.hash(&key)?;
                self.with_dict(id, |map| map.entry(hash).or_insert((key, default)).1.clone())
            }
            "clear" => {
                args.arity(name, 0, 0)?;
                self.with_dict(id, DictMap::clear)?;
                Ok(Value::None)
            }
            "copy" => {
                args.arity(name, 0, 0)?;
                let map = self.dict_map(id)?;
                Ok(self.alloc(HeapObject::Dict(map)))
            }
            _ => Err(self.missing_method(&Value::Ref(id), name).into()),
        }
    }

    fn set_mut(&mut self, id: ObjectId) -> Exec<&mut SetMap> {
        match self.object_mut(id)? {
            HeapObject::Set(set) => Ok(set),
            _ => Err(RuntimeError::Internal("set method on a non-set".into()).into()),
        }
    }

    fn set_method(&mut self, id: ObjectId, name: &str, args: CallArgs) -> Exec<Value> {
        args.no_keywords(name)?;
        match name {
            "add" | "remove" | "discard" => {
                args.arity(name, 1, 1)?;
                let item = args.positional[0].clone();
                let hash = self.hash(&item)?;
                let set = self.set_mut(id)?;
                match name {
                    "add" => {
                        set.entry(hash).or_insert(item);
                    }
                    "discard" => {
                        set.shift_remove(&hash);
                    }
                    _ => {
                        if set.shift_remove(&hash).is_none() {
                            return Err(RuntimeError::KeyError(self.repr(&item)?).into());
                        }
                    }
                }
                Ok(Value::None)
            }
            "pop" => {
                args.arity(name, 0, 0)?;
                match self.set_mut(id)?.shift_remove_index(0) {
                    Some((_, item)) => Ok(item),
                    None => Err(RuntimeError::KeyError("'pop from an empty set'".into()).into()),
                }
            }
            "clear" => {
                args.arity(name, 0, 0)?;
                self.set_mut(id)?.clear();
                Ok(Value::None)
            }
            "copy" => {
                args.arity(name, 0, 0)?;
                let set = self.set_mut(id)?.clone();
                Ok(self.alloc(HeapObject::Set(set)))
            }
            "update" => {
                for iterable in &args.positional {
                    let items = self.collect_iterable(iterable)?;
                    let extra = self.build_set(items)?;
                    let set = self.set_mut(id)?;
                    for (k, v) in extra {
                        set.entry(k).or_insert(v);
                    }
                }
                Ok(Value::None)
            }
            "union" | "intersection" | "difference" | "symmetric_difference" => {
                let op = match name {
                    "union" => BinOp::BitOr,
                    "intersection" => BinOp::BitAnd,
                    "difference" => BinOp::Sub,
                    _ => BinOp::BitXor,
                };
                let own = self.set_mut(id)?.clone();
                let mut result = self.alloc(HeapObject::Set(own));
                for iterable in &args.positional {
                    let items = self.collect_iterable(iterable)?;
                    let other = self.build_set(items)?;
                    let other = self.alloc(HeapObject::Set(other));
                    result = self.binary_op(op, result, other)?;
                }
                Ok(result)
            }
            "issubset" | "issuperset" | "isdisjoint" => {
                args.arity(name, 1, 1)?;
                let items = self.collect_iterable(&args.positional[0])?;
                let other = self.build_set(items)?;
                let own = self.set_mut(id)?;
                let result = match name {
                    "issubset" => own.keys().all(|k| other.contains_key(k)),
                    "issuperset" => other.keys().all(|k| own.contains_key(k)),
                    _ => !own.keys().any(|k| other.contains_key(k)),
                };
                Ok(Value::Bool(result))
            }
            _ => Err(self.missing_method(&Value::Ref(id), name).into()),
        }
    }

    /// Append to a deque, dropping from the opposite end when it is full
    pub(crate) fn deque_push(&mut self, id: ObjectId, item: Value, left: bool) -> Exec<()> {
        if let HeapObject::Deque { items, maxlen } = self.object_mut(id)? {
            if *maxlen == Some(0) {
                return Ok(());
            }
            if left {
                items.push_front(item);
            } else {
                items.push_back(item);
            }
            while maxlen.is_some_and(|limit| items.len() > limit) {
                if left {
                    items.pop_back();
                } else {
                    items.pop_front();
                }
            }
        }
        Ok(())
    }

    fn deque_method(&mut self, id: ObjectId, name: &str, args: CallArgs) -> Exec<Value> {
        args.no_keywords(name)?;
        match name {
            "append" | "appendleft" => {
                args.arity(name, 1, 1)?;
                self.deque_push(id, args.positional[0].clone(), name == "appendleft")?;
                Ok(Value::None)
            }
            "extend" | "extendleft" => {
                args.arity(name, 1, 1)?;
                for item in self.collect_iterable(&args.positional[0])? {
                    self.deque_push(id, item, name == "extendleft")?;
                }
                Ok(Value::None)
            }
            "pop" | "popleft" => {
                args.arity(name, 0, 0)?;
                let popped = match self.object_mut(id)? {
                    HeapObject::Deque { items, .. } if name == "pop" => items.pop_back(),
                    HeapObject::Deque { items, .. } => items.pop_front(),
                    _ => None,
                };
                popped.ok_or_else(|| RuntimeError::IndexError("pop from an empty deque".into()).into())
            }
            "clear" => {
                args.arity(name, 0, 0)?;
                if let HeapObject::Deque { items, .. } = self.object_mut(id)? {
                    items.clear();
                }
                Ok(Value::None)
            }
            "rotate" => {
                args.arity(name, 0, 1)?;
                let n = self.optional_int(args.positional.first())?.unwrap_or(1);
                if let HeapObject::Deque { items, .. } = self.object_mut(id)? {
                    if !items.is_empty() {
                        let len = items.len() as i64;
                        let shift = n.rem_euclid(len) as usize;
                        items.rotate_right(shift);
                    }
                }
                Ok(Value::None)
            }
            "count" => {
                let items: Vec<Value> = match self.object(id)? {
                    HeapObject::Deque { items, .. } => items.iter().cloned().collect(),
                    _ => Vec::new(),
                };
                self.sequence_search(&items, "deque", name, args)
            }
            "copy" => {
                let copy = self.object(id)?.clone();
                Ok(self.alloc(copy))
            }
            _ => Err(self.missing_method(&Value::Ref(id), name).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_whitespace_with_limit() {
        assert_eq!(split_whitespace("  a b  c ", None), vec!["a", "b", "c"]);
        assert_eq!(split_whitespace("a b c", Some(1)), vec!["a", "b c"]);
        assert!(split_whitespace("   ", None).is_empty());
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("hello wORLD"), "Hello World");
        assert_eq!(title_case("they're"), "They'Re");
    }

    #[test]
    fn test_char_window_handles_multibyte() {
        let s = "héllo";
        let (from, to) = char_window(s, Some(1), Some(3));
        assert_eq!(&s[from..to], "él");
    }
}
