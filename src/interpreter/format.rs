//! Text rendering of values
//!
//! - [`Repr`]: `repr()` of any value from the heap alone. User `__repr__`
//!   results are supplied by the interpreter through an override map, so this
//!   module never runs user code and can be used from execution hooks.
//! - [`float_repr`], [`string_repr`], [`bytes_repr`]: Python-compatible literal forms
//! - [`format_with_spec`]: the format-spec mini-language used by f-strings and `format`
//! - [`percent_format`]: printf-style `%` formatting of strings

use super::errors::{Exec, RuntimeError};
use crate::memory::heap::{Heap, HeapObject, NdArray};
use crate::memory::value::{ObjectId, Value};
use rustc_hash::FxHashMap;

/// Shortest round-tripping float text, using exponent notation outside 1e-4..1e16
pub fn float_repr(x: f64) -> String {
    if x.is_nan() {
        return "nan".to_string();
    }
    if x.is_infinite() {
        return if x > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if x == 0.0 {
        return if x.is_sign_negative() { "-0.0" } else { "0.0" }.to_string();
    }
    let exponent = x.abs().log10().floor() as i32;
    if (-4..16).contains(&exponent) {
        let text = format!("{}", x);
        if text.contains('.') {
            text
        } else {
            format!("{}.0", text)
        }
    } else {
        python_exponent(&format!("{:e}", x))
    }
}

/// Rewrite Rust exponent notation (`1.5e-7`) into Python's (`1.5e-07`)
fn python_exponent(text: &str) -> String {
    match text.split_once(['e', 'E']) {
        Some((mantissa, exponent)) => {
            let upper = text.contains('E');
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(rest) => ('-', rest),
                None => ('+', exponent.trim_start_matches('+')),
            };
            format!(
                "{}{}{}{:0>2}",
                mantissa,
                if upper { 'E' } else { 'e' },
                sign,
                digits
            )
        }
        None => text.to_string(),
    }
}

/// Quoted string literal the way Python's `repr` writes it
pub fn string_repr(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') { '"' } else { '\'' };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                out.push_str(&format!("\\x{:02x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

pub fn bytes_repr(bytes: &[u8]) -> String {
    let quote = if bytes.contains(&b'\'') && !bytes.contains(&b'"') { b'"' } else { b'\'' };
    let mut out = String::from("b");
    out.push(quote as char);
    for &b in bytes {
        match b {
            b'\\' => out.push_str("\\\\"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            b if b == quote => {
                out.push('\\');
                out.push(b as char);
            }
            0x20..=0x7e => out.push(b as char),
            b => out.push_str(&format!("\\x{:02x}", b)),
        }
    }
    out.push(quote as char);
    out
}

/// `repr()` over the heap. Cycles render as `[...]`/`{...}` like Python.
pub struct Repr<'a> {
    heap: &'a Heap,
    overrides: Option<&'a FxHashMap<ObjectId, String>>,
    active: Vec<ObjectId>,
}

impl<'a> Repr<'a> {
    pub fn new(heap: &'a Heap) -> Self {
        Repr {
            heap,
            overrides: None,
            active: Vec::new(),
        }
    }

    /// Use precomputed text for the given objects (results of user `__repr__`)
    pub fn with_overrides(heap: &'a Heap, overrides: &'a FxHashMap<ObjectId, String>) -> Self {
        Repr {
            heap,
            overrides: Some(overrides),
            active: Vec::new(),
        }
    }

    pub fn value(&mut self, value: &Value) -> String {
        match value {
            Value::None => "None".to_string(),
            Value::Bool(true) => "True".to_string(),
            Value::Bool(false) => "False".to_string(),
            Value::Int(n) => n.to_string(),
            Value::Float(x) => float_repr(*x),
            Value::Str(s) => string_repr(s),
            Value::Bytes(b) => bytes_repr(b),
            Value::Builtin(b) => format!("<built-in function {}>", b.name()),
            Value::Type(t) => format!("<class '{}'>", t.name()),
            Value::Ref(id) => self.object(*id),
        }
    }

    fn join(&mut self, items: &[Value]) -> String {
        items
            .iter()
            .map(|item| self.value(item))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn object(&mut self, id: ObjectId) -> String {
        if let Some(text) = self.overrides.and_then(|o| o.get(&id)) {
            return text.clone();
        }
        let heap = self.heap;
        let Some(object) = heap.get(id) else {
            return format!("<object at {}>", id);
        };
        if self.active.contains(&id) {
            return match object {
                HeapObject::List(_) | HeapObject::Deque { .. } => "[...]",
                HeapObject::Dict(_) | HeapObject::Set(_) => "{...}",
                HeapObject::Tuple(_) => "(...)",
                _ => "...",
            }
            .to_string();
        }
        self.active.push(id);
        let text = match object {
            HeapObject::List(items) => format!("[{}]", self.join(items)),
            HeapObject::Tuple(items) if items.len() == 1 => format!("({},)", self.value(&items[0])),
            HeapObject::Tuple(items) => format!("({})", self.join(items)),
            HeapObject::Dict(map) => {
                let pairs: Vec<String> = map
                    .values()
                    .map(|(k, v)| format!("{}: {}", self.value(k), self.value(v)))
                    .collect();
                format!("{{{}}}", pairs.join(", "))
            }
            HeapObject::Set(set) if set.is_empty() => "set()".to_string(),
            HeapObject::Set(set) => {
                let items: Vec<Value> = set.values().cloned().collect();
                format!("{{{}}}", self.join(&items))
            }
            HeapObject::Deque { items, maxlen } => {
                let items: Vec<Value> = items.iter().cloned().collect();
                match maxlen {
                    Some(n) => format!("deque([{}], maxlen={})", self.join(&items), n),
                    None => format!("deque([{}])", self.join(&items)),
                }
            }
            HeapObject::Array(array) => array_repr(array),
            HeapObject::Instance(instance) => {
                let class_name = heap.class_name(instance.class);
                match &instance.args {
                    Some(args) => format!("{}({})", class_name, self.join(args)),
                    None => format!("<__main__.{} object at {}>", class_name, id),
                }
            }
            HeapObject::Class(class) if class.builtin => format!("<class '{}'>", class.name),
            HeapObject::Class(class) => format!("<class '__main__.{}'>", class.name),
            HeapObject::Function(function) => format!("<function {} at {}>", function.qualname, id),
            HeapObject::BoundMethod { receiver, function } => {
                let name = match heap.deref(function) {
                    Some(HeapObject::Function(f)) => f.qualname.clone(),
                    _ => "?".to_string(),
                };
                format!("<bound method {} of {}>", name, self.value(receiver))
            }
            HeapObject::NativeMethod { receiver, name } => format!(
                "<built-in method {} of {} object at {}>",
                name,
                heap.type_name(receiver),
                receiver.as_ref_id().map(|r| r.to_string()).unwrap_or_default()
            ),
            HeapObject::StaticMethod(inner) => format!("<staticmethod({})>", self.value(inner)),
            HeapObject::ClassMethod(inner) => format!("<classmethod({})>", self.value(inner)),
            HeapObject::Super { class, receiver } => format!(
                "<super: <class '{}'>, <{} object>>",
                heap.class_name(*class),
                heap.type_name(receiver)
            ),
            HeapObject::Module { name, .. } => format!("<module '{}' (built-in)>", name),
            HeapObject::Range { start, stop, step: 1 } => format!("range({}, {})", start, stop),
            HeapObject::Range { start, stop, step } => format!("range({}, {}, {})", start, stop, step),
            HeapObject::Iterator { kind, items, .. } if kind.starts_with("dict_") => {
                format!("{}([{}])", kind, self.join(items))
            }
            HeapObject::Iterator { kind, .. } => format!("<{} object at {}>", kind, id),
        };
        self.active.pop();
        text
    }
}

/// `repr()` of a value without user overrides
pub fn repr(heap: &Heap, value: &Value) -> String {
    Repr::new(heap).value(value)
}

fn array_element(array: &NdArray, index: usize) -> String {
    match array.element(index) {
        Value::Float(x) if x.fract() == 0.0 && x.is_finite() => format!("{}.", x),
        Value::Float(x) => float_repr(x),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        other => other.as_int().unwrap_or(0).to_string(),
    }
}

/// Nested bracketed rows of an array with elements padded to a common width
fn array_rows(array: &NdArray, separator: &str, indent: usize) -> String {
    let cells: Vec<String> = (0..array.size()).map(|i| array_element(array, i)).collect();
    let width = cells.iter().map(|c| c.len()).max().unwrap_or(0);
    let cells: Vec<String> = cells.iter().map(|c| format!("{:>width$}", c)).collect();
    fn nest(shape: &[usize], cells: &[String], separator: &str, indent: usize, depth: usize) -> String {
        match shape {
            [] => cells.first().cloned().unwrap_or_default(),
            [_] => format!("[{}]", cells.join(separator)),
            [rows, rest @ ..] => {
                let stride: usize = rest.iter().product();
                let row_separator = format!(
                    "{}\n{}",
                    separator.trim_end(),
                    " ".repeat(indent + depth + 1)
                );
                let parts: Vec<String> = (0..*rows)
                    .map(|r| {
                        let slice = cells.get(r * stride..(r + 1) * stride).unwrap_or(&[]);
                        nest(rest, slice, separator, indent, depth + 1)
                    })
                    .collect();
                format!("[{}]", parts.join(&row_separator))
            }
        }
    }
    nest(&array.shape, &cells, separator, indent, 0)
}

/// `repr()` of a numeric array, e.g. `array([1, 2, 3])`
pub fn array_repr(array: &NdArray) -> String {
    if array.size() == 0 {
        return format!("array([], dtype={})", array.dtype.name());
    }
    format!("array({})", array_rows(array, ", ", "array(".len()))
}

/// `str()` of a numeric array, e.g. `[1 2 3]`
pub fn array_str(array: &NdArray) -> String {
    if array.size() == 0 {
        return "[]".to_string();
    }
    array_rows(array, " ", 0)
}

/// Parsed `[[fill]align][sign][#][0][width][,][.precision][type]`
#[derive(Debug, Default, PartialEq)]
struct FormatSpec {
    fill: Option<char>,
    align: Option<char>,
    sign: Option<char>,
    alternate: bool,
    zero: bool,
    width: usize,
    grouping: Option<char>,
    precision: Option<usize>,
    kind: Option<char>,
}

fn parse_spec(spec: &str) -> Result<FormatSpec, RuntimeError> {
    let chars: Vec<char> = spec.chars().collect();
    let mut parsed = FormatSpec::default();
    let mut i = 0;
    let is_align = |c: char| matches!(c, '<' | '>' | '^' | '=');
    if chars.len() >= 2 && is_align(chars[1]) {
        parsed.fill = Some(chars[0]);
        parsed.align = Some(chars[1]);
        i = 2;
    } else if chars.first().is_some_and(|c| is_align(*c)) {
        parsed.align = Some(chars[0]);
        i = 1;
    }
    if let Some(&c) = chars.get(i) {
        if matches!(c, '+' | '-' | ' ') {
            parsed.sign = Some(c);
            i += 1;
        }
    }
    if chars.get(i) == Some(&'#') {
        parsed.alternate = true;
        i += 1;
    }
    if chars.get(i) == Some(&'0') {
        parsed.zero = true;
        i += 1;
    }
    let start = i;
    while chars.get(i).is_some_and(|c| c.is_ascii_digit()) {
        i += 1;
    }
    if i > start {
        let digits: String = chars[start..i].iter().collect();
        parsed.width = digits
            .parse()
            .map_err(|_| RuntimeError::value_error("Too many decimal digits in format string"))?;
    }
    if let Some(&c) = chars.get(i) {
        if c == ',' || c == '_' {
            parsed.grouping = Some(c);
            i += 1;
        }
    }
    if chars.get(i) == Some(&'.') {
        i += 1;
        let start = i;
        while chars.get(i).is_some_and(|c| c.is_ascii_digit()) {
            i += 1;
        }
        if i == start {
            return Err(RuntimeError::value_error("Format specifier missing precision"));
        }
        let digits: String = chars[start..i].iter().collect();
        parsed.precision = digits.parse().ok();
    }
    if let Some(&c) = chars.get(i) {
        parsed.kind = Some(c);
        i += 1;
    }
    if i != chars.len() {
        return Err(RuntimeError::value_error("Invalid format specifier"));
    }
    Ok(parsed)
}

fn group_digits(digits: &str, separator: char) -> String {
    let (int_part, rest) = match digits.find('.') {
        Some(dot) => digits.split_at(dot),
        None => (digits, ""),
    };
    let mut grouped = String::new();
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(separator);
        }
        grouped.push(c);
    }
    grouped + rest
}

/// Scientific notation with Python's exponent format
fn sci(x: f64, precision: usize, upper: bool) -> String {
    let text = python_exponent(&format!("{:.*e}", precision, x));
    if upper {
        text.to_uppercase()
    } else {
        text
    }
}

/// `g` presentation: fixed or scientific depending on the exponent, trailing zeros stripped
fn general(x: f64, precision: usize, alternate: bool, upper: bool) -> String {
    if !x.is_finite() {
        return float_repr(x);
    }
    let precision = precision.max(1);
    let rounded = format!("{:.*e}", precision - 1, x);
    let exponent: i32 = rounded
        .split_once('e')
        .and_then(|(_, e)| e.parse().ok())
        .unwrap_or(0);
    let text = if exponent >= -4 && exponent < precision as i32 {
        format!("{:.*}", (precision as i32 - 1 - exponent).max(0) as usize, x)
    } else {
        sci(x, precision - 1, upper)
    };
    if alternate {
        return text;
    }
    match text.split_once(['e', 'E']) {
        Some((mantissa, exp)) if mantissa.contains('.') => {
            let mantissa = mantissa.trim_end_matches('0').trim_end_matches('.');
            format!("{}{}{}", mantissa, if upper { 'E' } else { 'e' }, exp)
        }
        None if text.contains('.') => text.trim_end_matches('0').trim_end_matches('.').to_string(),
        _ => text,
    }
}

fn pad(body: String, sign: &str, spec: &FormatSpec, numeric: bool) -> String {
    let fill = spec.fill.unwrap_or(if spec.zero && spec.align.is_none() { '0' } else { ' ' });
    let align = spec.align.unwrap_or(if spec.zero && numeric {
        '='
    } else if numeric {
        '>'
    } else {
        '<'
    });
    let len = sign.chars().count() + body.chars().count();
    if len >= spec.width {
        return format!("{}{}", sign, body);
    }
    let padding = spec.width - len;
    let repeat = |n: usize| fill.to_string().repeat(n);
    match align {
        '<' => format!("{}{}{}", sign, body, repeat(padding)),
        '^' => format!(
            "{}{}{}{}",
            repeat(padding / 2),
            sign,
            body,
            repeat(padding - padding / 2)
        ),
        '=' => format!("{}{}{}", sign, repeat(padding), body),
        _ => format!("{}{}{}", repeat(padding), sign, body),
    }
}

fn sign_prefix(negative: bool, spec: &FormatSpec) -> &'static str {
    match (negative, spec.sign) {
        (true, _) => "-",
        (false, Some('+')) => "+",
        (false, Some(' ')) => " ",
        _ => "",
    }
}

fn format_float(x: f64, spec: &FormatSpec) -> Result<String, RuntimeError> {
    let negative = x.is_sign_negative() && !x.is_nan();
    let magnitude = x.abs();
    let body = match spec.kind {
        Some('f') | Some('F') => format!("{:.*}", spec.precision.unwrap_or(6), magnitude),
        Some('e') | Some('E') => sci(magnitude, spec.precision.unwrap_or(6), spec.kind == Some('E')),
        Some('g') | Some('G') => general(
            magnitude,
            spec.precision.unwrap_or(6),
            spec.alternate,
            spec.kind == Some('G'),
        ),
        Some('%') => format!("{:.*}%", spec.precision.unwrap_or(6), magnitude * 100.0),
        None => match spec.precision {
            Some(p) => {
                let text = general(magnitude, p, spec.alternate, false);
                if text.contains(['.', 'e', 'n', 'i']) {
                    text
                } else {
                    format!("{}.0", text)
                }
            }
            None => float_repr(magnitude),
        },
        Some(other) => {
            return Err(RuntimeError::value_error(format!(
                "Unknown format code '{}' for object of type 'float'",
                other
            )))
        }
    };
    let body = match spec.grouping {
        Some(separator) => group_digits(&body, separator),
        None => body,
    };
    Ok(pad(body, sign_prefix(negative, spec), spec, true))
}

fn format_int(n: i64, spec: &FormatSpec) -> Result<String, RuntimeError> {
    let magnitude = n.unsigned_abs();
    let body = match spec.kind {
        None | Some('d') | Some('n') => magnitude.to_string(),
        Some('b') => format!("{}{:b}", if spec.alternate { "0b" } else { "" }, magnitude),
        Some('o') => format!("{}{:o}", if spec.alternate { "0o" } else { "" }, magnitude),
        Some('x') => format!("{}{:x}", if spec.alternate { "0x" } else { "" }, magnitude),
        Some('X') => format!("{}{:X}", if spec.alternate { "0X" } else { "" }, magnitude),
        Some('c') => {
            let c = u32::try_from(n)
                .ok()
                .and_then(char::from_u32)
                .ok_or_else(|| RuntimeError::OverflowError("%c arg not in range(0x110000)".into()))?;
            return Ok(pad(c.to_string(), "", spec, false));
        }
        Some('f' | 'F' | 'e' | 'E' | 'g' | 'G' | '%') => return format_float(n as f64, spec),
        Some(other) => {
            return Err(RuntimeError::value_error(format!(
                "Unknown format code '{}' for object of type 'int'",
                other
            )))
        }
    };
    if spec.precision.is_some() {
        return Err(RuntimeError::value_error("Precision not allowed in integer format specifier"));
    }
    let body = match spec.grouping {
        Some(separator) => group_digits(&body, separator),
        None => body,
    };
    Ok(pad(body, sign_prefix(n < 0, spec), spec, true))
}

/// Apply a format spec. `display` is the value's `str()`, used for non-numeric values.
pub fn format_with_spec(value: &Value, spec: &str, display: &str, type_name: &str) -> Result<String, RuntimeError> {
    if spec.is_empty() {
        return Ok(display.to_string());
    }
    let parsed = parse_spec(spec)?;
    match value {
        Value::Bool(_) if parsed.kind.is_none() => Ok(pad(display.to_string(), "", &parsed, false)),
        Value::Int(_) | Value::Bool(_) => format_int(value.as_int().unwrap_or(0), &parsed),
        Value::Float(x) => format_float(*x, &parsed),
        Value::Str(s) => {
            if !matches!(parsed.kind, None | Some('s')) || parsed.sign.is_some() {
                return Err(RuntimeError::value_error(format!(
                    "Unknown format code '{}' for object of type 'str'",
                    parsed.kind.unwrap_or('?')
                )));
            }
            let body: String = match parsed.precision {
                Some(p) => s.chars().take(p).collect(),
                None => s.to_string(),
            };
            Ok(pad(body, "", &parsed, false))
        }
        _ => Err(RuntimeError::type_error(format!(
            "unsupported format string passed to {}.__format__",
            type_name
        ))),
    }
}

/// printf-style formatting. `render` produces `str()` (false) or `repr()` (true) of an argument.
pub(crate) fn percent_format(
    template: &str,
    args: &[Value],
    render: &mut dyn FnMut(&Value, bool) -> Exec<String>,
) -> Exec<String> {
    let mut out = String::new();
    let mut chars = template.chars().peekable();
    let mut next_arg = args.iter();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        let mut spec = FormatSpec::default();
        while let Some(&flag) = chars.peek() {
            match flag {
                '-' => spec.align = Some('<'),
                '+' => spec.sign = Some('+'),
                ' ' => spec.sign = spec.sign.or(Some(' ')),
                '0' => spec.zero = true,
                '#' => spec.alternate = true,
                _ => break,
            }
            chars.next();
        }
        let mut width = String::new();
        while let Some(&d) = chars.peek().filter(|d| d.is_ascii_digit()) {
            width.push(d);
            chars.next();
        }
        spec.width = width.parse().unwrap_or(0);
        if chars.peek() == Some(&'.') {
            chars.next();
            let mut precision = String::new();
            while let Some(&d) = chars.peek().filter(|d| d.is_ascii_digit()) {
                precision.push(d);
                chars.next();
            }
            spec.precision = Some(precision.parse().unwrap_or(0));
        }
        let Some(kind) = chars.next() else {
            return Err(RuntimeError::value_error("incomplete format").into());
        };
        if kind == '%' {
            out.push('%');
            continue;
        }
        let arg = next_arg
            .next()
            .ok_or_else(|| RuntimeError::type_error("not enough arguments for format string"))?;
        let piece = match kind {
            's' | 'r' | 'a' => {
                let text = render(arg, kind != 's')?;
                let text = match spec.precision {
                    Some(p) => text.chars().take(p).collect(),
                    None => text,
                };
                pad(text, "", &spec, false)
            }
            'd' | 'i' | 'u' => {
                let n = match arg {
                    Value::Float(x) => x.trunc() as i64,
                    other => other.as_int().ok_or_else(|| {
                        RuntimeError::type_error("%d format: a real number is required")
                    })?,
                };
                spec.precision = None;
                format_int(n, &spec)?
            }
            'x' | 'X' | 'o' | 'c' => {
                let n = arg.as_int().ok_or_else(|| {
                    RuntimeError::type_error(format!("%{} format: an integer is required", kind))
                })?;
                spec.kind = Some(kind);
                format_int(n, &spec)?
            }
            'f' | 'F' | 'e' | 'E' | 'g' | 'G' => {
                let x = arg
                    .as_float()
                    .ok_or_else(|| RuntimeError::type_error("must be real number"))?;
                spec.kind = Some(kind);
                format_float(x, &spec)?
            }
            other => {
                return Err(RuntimeError::value_error(format!(
                    "unsupported format character '{}'",
                    other
                ))
                .into())
            }
        };
        out.push_str(&piece);
    }
    if next_arg.next().is_some() {
        return Err(RuntimeError::type_error("not all arguments converted during string formatting").into());
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::heap::DType;

    #[test]
    fn test_float_repr() {
        assert_eq!(float_repr(1.0), "1.0");
        assert_eq!(float_repr(0.1 + 0.2), "0.30000000000000004");
        assert_eq!(float_repr(1e20), "1e+20");
        assert_eq!(float_repr(1.5e-7), "1.5e-07");
        assert_eq!(float_repr(-2.5), "-2.5");
        assert_eq!(float_repr(f64::INFINITY), "inf");
    }

    #[test]
    fn test_string_repr_quotes() {
        assert_eq!(string_repr("hi"), "'hi'");
        assert_eq!(string_repr("it's"), "\"it's\"");
        assert_eq!(string_repr("a\nb"), "'a\\nb'");
        assert_eq!(bytes_repr(b"ab\x00"), "b'ab\\x00'");
    }

    #[test]
    fn test_container_repr_with_cycle() {
        let mut heap = Heap::new();
        let list = heap.allocate(HeapObject::List(vec![Value::Int(1)]));
        if let Some(HeapObject::List(items)) = heap.get_mut(list) {
            items.push(Value::Ref(list));
        }
        assert_eq!(repr(&heap, &Value::Ref(list)), "[1, [...]]");
        let single = heap.allocate(HeapObject::Tuple(vec![Value::str("a")]));
        assert_eq!(repr(&heap, &Value::Ref(single)), "('a',)");
    }

    #[test]
    fn test_format_specs() {
        let f = |v: Value, spec: &str| format_with_spec(&v, spec, "", "x").unwrap();
        assert_eq!(f(Value::Float(3.14159), ".2f"), "3.14");
        assert_eq!(f(Value::Int(42), "05d"), "00042");
        assert_eq!(f(Value::Int(1234567), ","), "1,234,567");
        assert_eq!(f(Value::Int(255), "#x"), "0xff");
        assert_eq!(f(Value::Float(0.25), ".0%"), "25%");
        assert_eq!(f(Value::str("ab"), ">4"), "  ab");
        assert_eq!(f(Value::str("ab"), "*^6"), "**ab**");
        assert_eq!(f(Value::Float(1234.5), "e"), "1.234500e+03");
        assert_eq!(f(Value::Float(0.0001234), "g"), "0.0001234");
        assert_eq!(f(Value::Int(-7), "+"), "-7");
    }

    #[test]
    fn test_percent_format() {
        let mut render = |v: &Value, _repr: bool| -> Exec<String> {
            Ok(match v {
                Value::Str(s) => s.to_string(),
                other => format!("{:?}", other),
            })
        };
        let out = percent_format("%s is %d years, %.1f%%", &[Value::str("Ann"), Value::Int(30), Value::Float(99.45)], &mut render)
            .unwrap();
        assert_eq!(out, "Ann is 30 years, 99.5%");
    }

    #[test]
    fn test_array_text() {
        let array = NdArray {
            dtype: DType::Int64,
            shape: vec![2, 2],
            data: vec![1.0, 2.0, 3.0, 40.0],
        };
        assert_eq!(array_str(&array), "[[ 1  2]\n [ 3 40]]");
        assert_eq!(array_repr(&array), "array([[ 1,  2],\n       [ 3, 40]])");
    }
}
