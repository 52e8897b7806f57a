//! Object heap for the interpreter
//!
//! Every value with identity is stored here and addressed by an [`ObjectId`].
//! Identities are handed out from [`HEAP_ADDRESS_START`] in allocation order and
//! objects are never freed during a run, so two replays of the same program
//! observe the same addresses.

use super::scope::{Namespace, ScopeRef};
use super::value::{BuiltinType, HashKey, ObjectId, Value};
use crate::interpreter::constants::{HEAP_ADDRESS_START, OBJECT_ALIGN};
use crate::parser::ast::{FunctionDef, Parameters};
use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use std::collections::VecDeque;
use std::rc::Rc;

/// Insertion-ordered dict storage; the original key value is kept beside its hash key
pub type DictMap = IndexMap<HashKey, (Value, Value)>;

/// Insertion-ordered set storage
pub type SetMap = IndexMap<HashKey, Value>;

/// Element type of a numeric array
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DType {
    Int64,
    Float64,
    Bool,
}

impl DType {
    pub fn name(self) -> &'static str {
        match self {
            DType::Int64 => "int64",
            DType::Float64 => "float64",
            DType::Bool => "bool",
        }
    }
}

/// A minimal n-dimensional numeric array stored flat in row-major order
#[derive(Debug, Clone, PartialEq)]
pub struct NdArray {
    pub dtype: DType,
    pub shape: Vec<usize>,
    pub data: Vec<f64>,
}

impl NdArray {
    pub fn size(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Scalar value for one flat element, typed by the array's dtype
    pub fn element(&self, index: usize) -> Value {
        let x = self.data.get(index).copied().unwrap_or(0.0);
        match self.dtype {
            DType::Int64 => Value::Int(x as i64),
            DType::Float64 => Value::Float(x),
            DType::Bool => Value::Bool(x != 0.0),
        }
    }

    /// Number of flat elements covered by one index along the first axis
    pub fn row_stride(&self) -> usize {
        self.shape.iter().skip(1).product()
    }
}

/// Names a function body binds locally, plus its `global`/`nonlocal` declarations
#[derive(Debug, Clone, Default)]
pub struct NameInfo {
    pub locals: FxHashSet<String>,
    pub globals: FxHashSet<String>,
    pub nonlocals: FxHashSet<String>,
}

/// A user-defined function or lambda
#[derive(Debug, Clone)]
pub struct Function {
    pub def: Rc<FunctionDef>,
    pub qualname: String,
    pub params: Rc<Parameters>,
    /// Evaluated defaults, aligned with `def.params.positional`
    pub defaults: Vec<Option<Value>>,
    /// Evaluated defaults, aligned with `def.params.kwonly`
    pub kw_defaults: Vec<Option<Value>>,
    pub globals: ScopeRef,
    /// Enclosing function scopes, innermost first
    pub closure: Rc<[ScopeRef]>,
    pub names: Rc<NameInfo>,
    /// Class whose body created the function, for zero-argument `super()`
    pub defining_class: Option<ObjectId>,
}

/// A class object. Builtin exception classes are ordinary classes flagged `builtin`.
#[derive(Debug, Clone)]
pub struct Class {
    pub name: String,
    pub bases: Vec<Value>,
    pub attrs: Namespace,
    pub builtin: bool,
}

/// An instance of a user-defined class (including exception instances)
#[derive(Debug, Clone)]
pub struct Instance {
    pub class: ObjectId,
    pub fields: Namespace,
    /// Constructor arguments of exception instances
    pub args: Option<Vec<Value>>,
}

/// All heap-resident object kinds
#[derive(Debug, Clone)]
pub enum HeapObject {
    List(Vec<Value>),
    Tuple(Vec<Value>),
    Dict(DictMap),
    Set(SetMap),
    Deque {
        items: VecDeque<Value>,
        maxlen: Option<usize>,
    },
    Array(NdArray),
    Instance(Instance),
    Class(Class),
    Function(Function),
    BoundMethod {
        receiver: Value,
        function: Value,
    },
    /// Method of a builtin type bound to its receiver, e.g. `xs.append`
    NativeMethod {
        receiver: Value,
        name: Rc<str>,
    },
    StaticMethod(Value),
    ClassMethod(Value),
    Super {
        class: ObjectId,
        receiver: Value,
    },
    Module {
        name: String,
        attrs: Namespace,
    },
    Range {
        start: i64,
        stop: i64,
        step: i64,
    },
    /// Materialized iterator (`enumerate`, `zip`, `map`, `filter`, `reversed`, `iter`)
    Iterator {
        kind: &'static str,
        items: Vec<Value>,
        position: usize,
    },
}

impl HeapObject {
    /// Python-level type name of builtin object kinds
    pub fn builtin_type(&self) -> BuiltinType {
        match self {
            HeapObject::List(_) => BuiltinType::List,
            HeapObject::Tuple(_) => BuiltinType::Tuple,
            HeapObject::Dict(_) => BuiltinType::Dict,
            HeapObject::Set(_) => BuiltinType::Set,
            HeapObject::Deque { .. } => BuiltinType::Deque,
            HeapObject::Array(_) => BuiltinType::NdArray,
            HeapObject::Instance(_) => BuiltinType::Object,
            HeapObject::Class(_) => BuiltinType::Type,
            HeapObject::Function(_) => BuiltinType::Function,
            HeapObject::BoundMethod { .. } => BuiltinType::Method,
            HeapObject::NativeMethod { .. } => BuiltinType::BuiltinFunction,
            HeapObject::StaticMethod(_) | HeapObject::ClassMethod(_) | HeapObject::Super { .. } => {
                BuiltinType::Object
            }
            HeapObject::Module { .. } => BuiltinType::Module,
            HeapObject::Range { .. } => BuiltinType::Range,
            HeapObject::Iterator { .. } => BuiltinType::Iterator,
        }
    }

    /// Number of elements for sized containers
    pub fn len(&self) -> Option<usize> {
        match self {
            HeapObject::List(items) | HeapObject::Tuple(items) => Some(items.len()),
            HeapObject::Dict(map) => Some(map.len()),
            HeapObject::Set(set) => Some(set.len()),
            HeapObject::Deque { items, .. } => Some(items.len()),
            HeapObject::Array(array) => Some(array.shape.first().copied().unwrap_or(0)),
            HeapObject::Range { start, stop, step } => Some(range_len(*start, *stop, *step)),
            _ => None,
        }
    }
}

/// Number of values produced by `range(start, stop, step)`
pub fn range_len(start: i64, stop: i64, step: i64) -> usize {
    if step > 0 && start < stop {
        ((stop - start - 1) / step + 1) as usize
    } else if step < 0 && start > stop {
        ((start - stop - 1) / (-step) + 1) as usize
    } else {
        0
    }
}

/// The heap
#[derive(Debug, Clone, Default)]
pub struct Heap {
    objects: Vec<HeapObject>,
}

impl Heap {
    pub fn new() -> Self {
        Heap {
            objects: Vec::new(),
        }
    }

    /// Allocate an object and return its identity
    pub fn allocate(&mut self, object: HeapObject) -> ObjectId {
        let address = HEAP_ADDRESS_START + self.objects.len() as u64 * OBJECT_ALIGN;
        self.objects.push(object);
        ObjectId::from_address(address)
    }

    fn index(id: ObjectId) -> Option<usize> {
        let offset = id.address().checked_sub(HEAP_ADDRESS_START)?;
        if offset % OBJECT_ALIGN != 0 {
            return None;
        }
        Some((offset / OBJECT_ALIGN) as usize)
    }

    pub fn get(&self, id: ObjectId) -> Option<&HeapObject> {
        self.objects.get(Self::index(id)?)
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut HeapObject> {
        let index = Self::index(id)?;
        self.objects.get_mut(index)
    }

    /// Resolve a value to the heap object it references, if any
    pub fn deref(&self, value: &Value) -> Option<&HeapObject> {
        self.get(value.as_ref_id()?)
    }

    /// Get total number of allocated objects
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Python-level type name of any value (`type(v).__name__`)
    pub fn type_name(&self, value: &Value) -> String {
        match value {
            Value::None => "NoneType".to_string(),
            Value::Bool(_) => "bool".to_string(),
            Value::Int(_) => "int".to_string(),
            Value::Float(_) => "float".to_string(),
            Value::Str(_) => "str".to_string(),
            Value::Bytes(_) => "bytes".to_string(),
            Value::Builtin(_) => "builtin_function_or_method".to_string(),
            Value::Type(_) => "type".to_string(),
            Value::Ref(id) => match self.get(*id) {
                Some(HeapObject::Instance(instance)) => self.class_name(instance.class),
                Some(HeapObject::StaticMethod(_)) => "staticmethod".to_string(),
                Some(HeapObject::ClassMethod(_)) => "classmethod".to_string(),
                Some(HeapObject::Super { .. }) => "super".to_string(),
                Some(HeapObject::Iterator { kind, .. }) => kind.to_string(),
                Some(object) => object.builtin_type().name().to_string(),
                None => "object".to_string(),
            },
        }
    }

    pub fn class_name(&self, class: ObjectId) -> String {
        match self.get(class) {
            Some(HeapObject::Class(c)) => c.name.clone(),
            _ => "object".to_string(),
        }
    }

    /// Method resolution order of a class: depth-first, left to right, without repeats
    pub fn mro(&self, class: ObjectId) -> Vec<ObjectId> {
        let mut order = Vec::new();
        let mut pending = vec![class];
        while let Some(current) = pending.pop() {
            if order.contains(&current) {
                continue;
            }
            order.push(current);
            if let Some(HeapObject::Class(c)) = self.get(current) {
                for base in c.bases.iter().rev() {
                    if let Value::Ref(base_id) = base {
                        pending.push(*base_id);
                    }
                }
            }
        }
        order
    }

    /// Find an attribute along the class MRO
    pub fn class_lookup(&self, class: ObjectId, name: &str) -> Option<(ObjectId, Value)> {
        self.mro(class).into_iter().find_map(|c| match self.get(c) {
            Some(HeapObject::Class(def)) => def.attrs.get(name).map(|v| (c, v.clone())),
            _ => None,
        })
    }

    pub fn is_subclass(&self, class: ObjectId, base: ObjectId) -> bool {
        self.mro(class).contains(&base)
    }

    /// Hash key for dict/set membership. Errors carry the unhashable type name.
    pub fn hash_key(&self, value: &Value) -> Result<HashKey, String> {
        match value {
            Value::None => Ok(HashKey::None),
            Value::Bool(b) => Ok(HashKey::Int(*b as i64)),
            Value::Int(n) => Ok(HashKey::Int(*n)),
            Value::Float(x) => Ok(HashKey::from_float(*x)),
            Value::Str(s) => Ok(HashKey::Str(s.clone())),
            Value::Bytes(b) => Ok(HashKey::Bytes(b.clone())),
            Value::Builtin(b) => Ok(HashKey::Builtin(*b)),
            Value::Type(t) => Ok(HashKey::Type(*t)),
            Value::Ref(id) => match self.get(*id) {
                Some(HeapObject::Tuple(items)) => items
                    .iter()
                    .map(|item| self.hash_key(item))
                    .collect::<Result<Vec<_>, _>>()
                    .map(HashKey::Tuple),
                Some(
                    HeapObject::List(_)
                    | HeapObject::Dict(_)
                    | HeapObject::Set(_)
                    | HeapObject::Deque { .. }
                    | HeapObject::Array(_),
                ) => Err(self.type_name(value)),
                _ => Ok(HashKey::Identity(*id)),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic_addresses() {
        let mut heap = Heap::new();
        let a = heap.allocate(HeapObject::List(Vec::new()));
        let b = heap.allocate(HeapObject::Tuple(Vec::new()));
        assert_eq!(a.address(), HEAP_ADDRESS_START);
        assert_eq!(b.address(), HEAP_ADDRESS_START + OBJECT_ALIGN);
        assert!(matches!(heap.get(b), Some(HeapObject::Tuple(_))));
        assert!(heap.get(ObjectId::from_address(0x10)).is_none());
    }

    #[test]
    fn test_hash_key_rejects_mutable_containers() {
        let mut heap = Heap::new();
        let list = heap.allocate(HeapObject::List(vec![Value::Int(1)]));
        let tuple = heap.allocate(HeapObject::Tuple(vec![Value::Int(1), Value::str("a")]));
        assert_eq!(heap.hash_key(&Value::Ref(list)).unwrap_err(), "list");
        assert!(heap.hash_key(&Value::Ref(tuple)).is_ok());
        assert_eq!(heap.hash_key(&Value::Bool(true)), heap.hash_key(&Value::Int(1)));
    }

    #[test]
    fn test_range_len() {
        assert_eq!(range_len(0, 10, 3), 4);
        assert_eq!(range_len(10, 0, -1), 10);
        assert_eq!(range_len(5, 5, 1), 0);
    }

    #[test]
    fn test_mro_depth_first() {
        let mut heap = Heap::new();
        let class = |name: &str, bases: Vec<Value>| {
            HeapObject::Class(Class {
                name: name.to_string(),
                bases,
                attrs: Namespace::default(),
                builtin: false,
            })
        };
        let base = heap.allocate(class("Base", Vec::new()));
        let mid = heap.allocate(class("Mid", vec![Value::Ref(base)]));
        let leaf = heap.allocate(class("Leaf", vec![Value::Ref(mid)]));
        assert_eq!(heap.mro(leaf), vec![leaf, mid, base]);
        assert!(heap.is_subclass(leaf, base));
        assert!(!heap.is_subclass(base, leaf));
    }
}
