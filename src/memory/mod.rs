//! Memory model for the Python interpreter
//!
//! This module provides the core memory abstractions:
//! - [`value`]: Runtime value representation (scalars inline, everything else by reference)
//! - [`heap`]: Identity-keyed object store (lists, dicts, instances, functions...)
//! - [`scope`]: Shared, insertion-ordered namespaces
//! - [`stack`]: Call stack with frames, their origins and their namespaces
//!
//! # Identity
//!
//! Aliasing is modelled explicitly: two names bound to the same list hold the same
//! [`value::ObjectId`]. Identities are allocated from a fixed base in program order,
//! which keeps rendered addresses identical across deterministic replays.

pub mod heap;
pub mod scope;
pub mod stack;
pub mod value;

pub use heap::{Heap, HeapObject};
pub use scope::{Namespace, ScopeRef};
pub use value::{Builtin, BuiltinType, HashKey, ObjectId, Value};
