//! Variable namespaces
//!
//! A [`Namespace`] is an insertion-ordered name → value map. Frames hold their
//! locals behind a shared [`ScopeRef`] so closures created inside a function keep
//! observing later rebinding of the names they capture, and so the module frame
//! can use one namespace as both its locals and its globals.

use super::value::Value;
use indexmap::IndexMap;
use std::cell::RefCell;
use std::rc::Rc;

pub type Namespace = IndexMap<String, Value>;

pub type ScopeRef = Rc<RefCell<Namespace>>;

pub fn new_scope() -> ScopeRef {
    Rc::new(RefCell::new(Namespace::new()))
}

/// Read one name without holding the borrow
pub fn scope_get(scope: &ScopeRef, name: &str) -> Option<Value> {
    scope.borrow().get(name).cloned()
}

/// Snapshot of a scope's bindings in insertion order
pub fn scope_entries(scope: &ScopeRef) -> Vec<(String, Value)> {
    scope
        .borrow()
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}
