//! Runtime value representation
//!
//! This module defines the [`Value`] enum, which represents all possible runtime values
//! in the Python interpreter. Immutable scalars are stored inline; everything with
//! identity (containers, instances, functions, classes, modules) lives on the
//! [`Heap`](super::heap::Heap) and is referenced through an [`ObjectId`].
//!
//! # Value Types
//!
//! - [`Value::None`], [`Value::Bool`], [`Value::Int`], [`Value::Float`]: scalars
//! - [`Value::Str`], [`Value::Bytes`]: immutable text and byte strings (shared, never graph nodes)
//! - [`Value::Builtin`]: a builtin function such as `len` or `math.sqrt`
//! - [`Value::Type`]: a builtin type such as `int` or `list` (callable as a constructor)
//! - [`Value::Ref`]: a reference to a heap object

use std::fmt;
use std::rc::Rc;

/// Identity of a heap object. Rendered as an address, stable across replays
/// because allocation order is deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

impl ObjectId {
    pub(crate) fn from_address(address: u64) -> Self {
        ObjectId(address)
    }

    pub fn address(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

/// Runtime values in the interpreter
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    Bytes(Rc<[u8]>),
    Builtin(Builtin),
    Type(BuiltinType),
    Ref(ObjectId),
}

impl Value {
    pub fn str(s: &str) -> Self {
        Value::Str(Rc::from(s))
    }

    pub fn as_ref_id(&self) -> Option<ObjectId> {
        match self {
            Value::Ref(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::Bool(b) => Some(*b as i64),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Bool(b) => Some(*b as i64 as f64),
            Value::Float(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    /// Identity comparison (`is`)
    pub fn is_same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Ref(a), Value::Ref(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => Rc::ptr_eq(a, b) || a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (a, b) => a == b,
        }
    }
}

/// Hashable projection of a value, used as the key of dicts and sets.
/// `True`, `1` and `1.0` collapse to the same key like they do in Python.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HashKey {
    None,
    Int(i64),
    Float(u64),
    Str(Rc<str>),
    Bytes(Rc<[u8]>),
    Tuple(Vec<HashKey>),
    Builtin(Builtin),
    Type(BuiltinType),
    Identity(ObjectId),
}

impl HashKey {
    pub fn from_float(x: f64) -> Self {
        if x.fract() == 0.0 && x.is_finite() && x.abs() < 9.2e18 {
            HashKey::Int(x as i64)
        } else {
            HashKey::Float(x.to_bits())
        }
    }
}

macro_rules! builtins {
    ($($variant:ident => $name:literal),* $(,)?) => {
        /// Builtin functions, including functions of the bundled modules
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Builtin {
            $($variant),*
        }

        impl Builtin {
            /// Name as seen by user code (`__name__`)
            pub fn name(self) -> &'static str {
                match self {
                    $(Builtin::$variant => $name),*
                }
            }
        }
    };
}

builtins! {
    Print => "print",
    Input => "input",
    Len => "len",
    Abs => "abs",
    Min => "min",
    Max => "max",
    Sum => "sum",
    Sorted => "sorted",
    Reversed => "reversed",
    Enumerate => "enumerate",
    Zip => "zip",
    Map => "map",
    Filter => "filter",
    Isinstance => "isinstance",
    Issubclass => "issubclass",
    Repr => "repr",
    Round => "round",
    Any => "any",
    All => "all",
    Chr => "chr",
    Ord => "ord",
    Hasattr => "hasattr",
    Getattr => "getattr",
    Setattr => "setattr",
    Divmod => "divmod",
    Pow => "pow",
    Hex => "hex",
    Bin => "bin",
    Oct => "oct",
    Id => "id",
    Hash => "hash",
    Iter => "iter",
    Next => "next",
    Callable => "callable",
    Super => "super",
    Staticmethod => "staticmethod",
    Classmethod => "classmethod",
    MathSqrt => "sqrt",
    MathIsqrt => "isqrt",
    MathFloor => "floor",
    MathCeil => "ceil",
    MathFabs => "fabs",
    MathGcd => "gcd",
    MathFactorial => "factorial",
    MathLog => "log",
    MathLog2 => "log2",
    MathLog10 => "log10",
    MathExp => "exp",
    MathSin => "sin",
    MathCos => "cos",
    MathTan => "tan",
    MathHypot => "hypot",
    NpArray => "array",
    NpZeros => "zeros",
    NpOnes => "ones",
    NpArange => "arange",
}

impl Builtin {
    /// Look up a name in the builtins namespace (module functions excluded)
    pub fn lookup(name: &str) -> Option<Builtin> {
        use Builtin::*;
        const GLOBAL: &[Builtin] = &[
            Print, Input, Len, Abs, Min, Max, Sum, Sorted, Reversed, Enumerate, Zip, Map,
            Filter, Isinstance, Issubclass, Repr, Round, Any, All, Chr, Ord, Hasattr, Getattr,
            Setattr, Divmod, Pow, Hex, Bin, Oct, Id, Hash, Iter, Next, Callable, Super,
            Staticmethod, Classmethod,
        ];
        GLOBAL.iter().copied().find(|b| b.name() == name)
    }

    /// Builtins that call back into user code run inside an engine frame
    pub fn calls_back(self) -> bool {
        matches!(
            self,
            Builtin::Sorted | Builtin::Min | Builtin::Max | Builtin::Map | Builtin::Filter
        )
    }
}

/// Builtin classes. Calling one constructs or converts a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinType {
    Object,
    Int,
    Float,
    Str,
    Bool,
    Bytes,
    List,
    Tuple,
    Dict,
    Set,
    NoneType,
    Range,
    Deque,
    NdArray,
    Function,
    BuiltinFunction,
    Method,
    Module,
    Iterator,
    Type,
}

impl BuiltinType {
    pub fn name(self) -> &'static str {
        match self {
            BuiltinType::Object => "object",
            BuiltinType::Int => "int",
            BuiltinType::Float => "float",
            BuiltinType::Str => "str",
            BuiltinType::Bool => "bool",
            BuiltinType::Bytes => "bytes",
            BuiltinType::List => "list",
            BuiltinType::Tuple => "tuple",
            BuiltinType::Dict => "dict",
            BuiltinType::Set => "set",
            BuiltinType::NoneType => "NoneType",
            BuiltinType::Range => "range",
            BuiltinType::Deque => "deque",
            BuiltinType::NdArray => "ndarray",
            BuiltinType::Function => "function",
            BuiltinType::BuiltinFunction => "builtin_function_or_method",
            BuiltinType::Method => "method",
            BuiltinType::Module => "module",
            BuiltinType::Iterator => "iterator",
            BuiltinType::Type => "type",
        }
    }

    /// Types reachable by name from the builtins namespace
    pub fn lookup(name: &str) -> Option<BuiltinType> {
        let ty = match name {
            "object" => BuiltinType::Object,
            "int" => BuiltinType::Int,
            "float" => BuiltinType::Float,
            "str" => BuiltinType::Str,
            "bool" => BuiltinType::Bool,
            "bytes" => BuiltinType::Bytes,
            "list" => BuiltinType::List,
            "tuple" => BuiltinType::Tuple,
            "dict" => BuiltinType::Dict,
            "set" => BuiltinType::Set,
            "range" => BuiltinType::Range,
            "type" => BuiltinType::Type,
            _ => return None,
        };
        Some(ty)
    }

    /// `bool` is a subclass of `int`; everything is a subclass of `object`
    pub fn is_subtype_of(self, other: BuiltinType) -> bool {
        self == other
            || other == BuiltinType::Object
            || (self == BuiltinType::Bool && other == BuiltinType::Int)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_id_display() {
        assert_eq!(ObjectId::from_address(0x1000_0020).to_string(), "0x10000020");
    }

    #[test]
    fn test_numeric_hash_keys_collapse() {
        assert_eq!(HashKey::from_float(1.0), HashKey::Int(1));
        assert_ne!(HashKey::from_float(1.5), HashKey::Int(1));
    }

    #[test]
    fn test_builtin_lookup() {
        assert_eq!(Builtin::lookup("len"), Some(Builtin::Len));
        assert_eq!(Builtin::lookup("sqrt"), None);
        assert!(Builtin::Sorted.calls_back());
        assert!(BuiltinType::Bool.is_subtype_of(BuiltinType::Int));
    }
}
