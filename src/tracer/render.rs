//! Safe value rendering
//!
//! [`Renderer`] turns a live value into bounded display text. Values the
//! object graph shows as nodes are replaced by a reference marker instead of
//! being inlined, which keeps cyclic structures finite and avoids repeating a
//! shared subgraph under every name that reaches it.

use crate::config::TracerConfig;
use crate::interpreter::format::{bytes_repr, repr, string_repr};
use crate::memory::heap::{Heap, HeapObject};
use crate::memory::value::{ObjectId, Value};
use rustc_hash::FxHashSet;

/// Closed classification of a value, decided once per value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Primitive,
    Text,
    /// list, tuple, deque
    Sequence,
    Mapping,
    Set,
    NumericArray,
    /// Instance of a user class
    Object,
    /// Functions, classes, modules, ranges, iterators and other runtime objects
    Unsupported,
}

impl ValueKind {
    pub fn classify(heap: &Heap, value: &Value) -> ValueKind {
        match value {
            Value::None | Value::Bool(_) | Value::Int(_) | Value::Float(_) => ValueKind::Primitive,
            Value::Str(_) | Value::Bytes(_) => ValueKind::Text,
            Value::Builtin(_) | Value::Type(_) => ValueKind::Unsupported,
            Value::Ref(id) => match heap.get(*id) {
                Some(HeapObject::List(_) | HeapObject::Tuple(_) | HeapObject::Deque { .. }) => {
                    ValueKind::Sequence
                }
                Some(HeapObject::Dict(_)) => ValueKind::Mapping,
                Some(HeapObject::Set(_)) => ValueKind::Set,
                Some(HeapObject::Array(_)) => ValueKind::NumericArray,
                Some(HeapObject::Instance(_)) => ValueKind::Object,
                _ => ValueKind::Unsupported,
            },
        }
    }

    /// Whether values of this kind become object-graph nodes
    pub fn is_candidate(self) -> bool {
        matches!(
            self,
            ValueKind::Sequence
                | ValueKind::Mapping
                | ValueKind::Set
                | ValueKind::NumericArray
                | ValueKind::Object
        )
    }
}

/// Whether a variable is hidden from the variables view: callables, classes
/// and modules are program structure rather than state
pub fn is_structural(heap: &Heap, value: &Value) -> bool {
    match value {
        Value::Builtin(_) | Value::Type(_) => true,
        Value::Ref(id) => match heap.get(*id) {
            Some(
                HeapObject::Function(_)
                | HeapObject::BoundMethod { .. }
                | HeapObject::NativeMethod { .. }
                | HeapObject::StaticMethod(_)
                | HeapObject::ClassMethod(_)
                | HeapObject::Class(_)
                | HeapObject::Module { .. },
            ) => true,
            Some(HeapObject::Instance(instance)) => heap.class_lookup(instance.class, "__call__").is_some(),
            _ => false,
        },
        _ => false,
    }
}

/// First `max_len` characters of `text`, with `...` appended when cut
pub fn truncate(text: &str, max_len: usize) -> String {
    match text.char_indices().nth(max_len) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// Container previews nest at most this deep before falling back to plain `repr`
const MAX_NESTING: usize = 4;

pub struct Renderer<'a> {
    heap: &'a Heap,
    tracked: &'a FxHashSet<ObjectId>,
    config: &'a TracerConfig,
}

impl<'a> Renderer<'a> {
    pub fn new(heap: &'a Heap, tracked: &'a FxHashSet<ObjectId>, config: &'a TracerConfig) -> Self {
        Renderer { heap, tracked, config }
    }

    /// Render `value` in at most about `max_len` characters. Every tracked
    /// identity, including one that contains itself, becomes a marker.
    pub fn render(&self, value: &Value, max_len: usize) -> String {
        self.render_nested(value, max_len, 0)
    }

    fn render_nested(&self, value: &Value, max_len: usize, depth: usize) -> String {
        if let Value::Ref(id) = value {
            if self.tracked.contains(id) {
                return self.reference_marker(*id, value);
            }
        }
        let kind = ValueKind::classify(self.heap, value);
        if depth >= MAX_NESTING && matches!(kind, ValueKind::Sequence | ValueKind::Set | ValueKind::Mapping) {
            return truncate(&repr(self.heap, value), max_len);
        }
        match kind {
            ValueKind::Primitive => repr(self.heap, value),
            ValueKind::Text => self.text(value, max_len),
            ValueKind::Sequence => self.sequence(value, depth),
            ValueKind::Set => self.set(value, depth),
            ValueKind::Mapping => self.mapping(value, depth),
            ValueKind::NumericArray | ValueKind::Object | ValueKind::Unsupported => {
                truncate(&repr(self.heap, value), max_len)
            }
        }
    }

    /// Render with the default length budget
    pub fn render_default(&self, value: &Value) -> String {
        self.render(value, self.config.repr_length)
    }

    fn reference_marker(&self, id: ObjectId, value: &Value) -> String {
        let type_name = self.heap.type_name(value);
        match self.heap.get(id) {
            Some(
                object @ (HeapObject::List(_)
                | HeapObject::Tuple(_)
                | HeapObject::Dict(_)
                | HeapObject::Set(_)
                | HeapObject::Deque { .. }),
            ) => {
                let len = object.len().unwrap_or(0);
                format!("➔ {}[{}] @ {}", type_name, len, id)
            }
            _ => format!("➔ {} @ {}", type_name, id),
        }
    }

    fn text(&self, value: &Value, max_len: usize) -> String {
        match value {
            Value::Str(s) => string_repr(&truncate(s, max_len)),
            Value::Bytes(b) if b.len() > max_len => {
                let mut cut = b[..max_len].to_vec();
                cut.extend_from_slice(b"...");
                bytes_repr(&cut)
            }
            Value::Bytes(b) => bytes_repr(b),
            other => repr(self.heap, other),
        }
    }

    fn preview<'v>(
        &self,
        items: impl ExactSizeIterator<Item = &'v Value>,
        depth: usize,
    ) -> (String, String) {
        let len = items.len();
        let shown: Vec<String> = items
            .take(self.config.preview_items)
            .map(|item| self.render_nested(item, self.config.nested_repr_length, depth + 1))
            .collect();
        (shown.join(", "), self.ellipsis(len))
    }

    fn ellipsis(&self, len: usize) -> String {
        if len > self.config.preview_items {
            format!(", ... ({})", len)
        } else {
            String::new()
        }
    }

    fn sequence(&self, value: &Value, depth: usize) -> String {
        match self.heap.deref(value) {
            Some(HeapObject::List(items)) => {
                let (body, more) = self.preview(items.iter(), depth);
                format!("[{}{}]", body, more)
            }
            Some(HeapObject::Tuple(items)) => {
                let comma = if items.len() == 1 { "," } else { "" };
                let (body, more) = self.preview(items.iter(), depth);
                format!("({}{}{})", body, comma, more)
            }
            Some(HeapObject::Deque { items, .. }) => {
                let (body, more) = self.preview(items.iter(), depth);
                format!("deque([{}{}])", body, more)
            }
            _ => repr(self.heap, value),
        }
    }

    fn set(&self, value: &Value, depth: usize) -> String {
        let Some(HeapObject::Set(set)) = self.heap.deref(value) else {
            return repr(self.heap, value);
        };
        if set.is_empty() {
            return "set()".to_string();
        }
        let mut keyed: Vec<(String, &Value)> = set
            .values()
            .map(|item| (format!("<class '{}'>{}", self.heap.type_name(item), repr(self.heap, item)), item))
            .collect();
        keyed.sort_by(|a, b| a.0.cmp(&b.0));
        let ordered: Vec<&Value> = keyed.into_iter().map(|(_, item)| item).collect();
        let (body, more) = self.preview(ordered.into_iter(), depth);
        format!("{{{}{}}}", body, more)
    }

    fn mapping(&self, value: &Value, depth: usize) -> String {
        let Some(HeapObject::Dict(map)) = self.heap.deref(value) else {
            return repr(self.heap, value);
        };
        if map.is_empty() {
            return "{}".to_string();
        }
        let pairs: Vec<String> = map
            .values()
            .take(self.config.preview_items)
            .map(|(k, v)| {
                format!(
                    "{}: {}",
                    self.render_nested(k, self.config.key_repr_length, depth + 1),
                    self.render_nested(v, self.config.nested_repr_length, depth + 1)
                )
            })
            .collect();
        format!("{{{}{}}}", pairs.join(", "), self.ellipsis(map.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::heap::{DictMap, SetMap};
    use crate::memory::value::HashKey;
    use proptest::prelude::*;
    use std::collections::VecDeque;

    fn list(heap: &mut Heap, items: Vec<Value>) -> Value {
        Value::Ref(heap.allocate(HeapObject::List(items)))
    }

    fn render(heap: &Heap, value: &Value) -> String {
        let tracked = FxHashSet::default();
        let config = TracerConfig::default();
        Renderer::new(heap, &tracked, &config).render_default(value)
    }

    #[test]
    fn test_primitives_use_literal_form() {
        let heap = Heap::new();
        assert_eq!(render(&heap, &Value::Int(42)), "42");
        assert_eq!(render(&heap, &Value::Float(2.5)), "2.5");
        assert_eq!(render(&heap, &Value::None), "None");
        assert_eq!(render(&heap, &Value::Bool(true)), "True");
    }

    #[test]
    fn test_long_text_is_cut_inside_quotes() {
        let heap = Heap::new();
        let tracked = FxHashSet::default();
        let config = TracerConfig::default();
        let renderer = Renderer::new(&heap, &tracked, &config);
        assert_eq!(renderer.render(&Value::str("abcdefgh"), 3), "'abc...'");
        assert_eq!(renderer.render(&Value::str("abc"), 3), "'abc'");
        let bytes = Value::Bytes(std::rc::Rc::from(&b"abcdef"[..]));
        assert_eq!(renderer.render(&bytes, 2), "b'ab...'");
    }

    #[test]
    fn test_sequence_preview() {
        let mut heap = Heap::new();
        let short = list(&mut heap, vec![Value::Int(1), Value::Int(2)]);
        let long = list(&mut heap, (1..=5).map(Value::Int).collect());
        let single = Value::Ref(heap.allocate(HeapObject::Tuple(vec![Value::Int(7)])));
        let deque = Value::Ref(heap.allocate(HeapObject::Deque {
            items: VecDeque::from(vec![Value::Int(1)]),
            maxlen: None,
        }));
        let empty = list(&mut heap, vec![]);
        assert_eq!(render(&heap, &short), "[1, 2]");
        assert_eq!(render(&heap, &long), "[1, 2, 3, ... (5)]");
        assert_eq!(render(&heap, &single), "(7,)");
        assert_eq!(render(&heap, &deque), "deque([1])");
        assert_eq!(render(&heap, &empty), "[]");
    }

    #[test]
    fn test_set_order_is_deterministic() {
        let mut heap = Heap::new();
        let mut set = SetMap::default();
        for value in [Value::str("b"), Value::Int(3), Value::str("a")] {
            let key = heap.hash_key(&value).unwrap();
            set.insert(key, value);
        }
        let value = Value::Ref(heap.allocate(HeapObject::Set(set)));
        assert_eq!(render(&heap, &value), "{3, 'a', 'b'}");
        let empty = Value::Ref(heap.allocate(HeapObject::Set(SetMap::default())));
        assert_eq!(render(&heap, &empty), "set()");
    }

    #[test]
    fn test_mapping_keys_use_short_budget() {
        let mut heap = Heap::new();
        let mut map = DictMap::default();
        let key = Value::str("a-rather-long-key-name");
        map.insert(HashKey::Str("k".into()), (key, Value::Int(1)));
        let value = Value::Ref(heap.allocate(HeapObject::Dict(map)));
        assert_eq!(render(&heap, &value), "{'a-rather-long-k...': 1}");
    }

    #[test]
    fn test_tracked_identity_becomes_marker() {
        let mut heap = Heap::new();
        let inner = list(&mut heap, vec![Value::Int(1), Value::Int(2)]);
        let outer = list(&mut heap, vec![inner.clone()]);
        let mut tracked = FxHashSet::default();
        tracked.insert(inner.as_ref_id().unwrap());
        let config = TracerConfig::default();
        let renderer = Renderer::new(&heap, &tracked, &config);
        let id = inner.as_ref_id().unwrap();
        assert_eq!(renderer.render_default(&outer), format!("[➔ list[2] @ {}]", id));
        assert_eq!(renderer.render(&inner, 150), format!("➔ list[2] @ {}", id));
    }

    #[test]
    fn test_self_containing_list_terminates() {
        let mut heap = Heap::new();
        let id = heap.allocate(HeapObject::List(Vec::new()));
        if let Some(HeapObject::List(items)) = heap.get_mut(id) {
            items.push(Value::Ref(id));
        }
        let mut tracked = FxHashSet::default();
        tracked.insert(id);
        let config = TracerConfig::default();
        let renderer = Renderer::new(&heap, &tracked, &config);
        let marker = format!("➔ list[1] @ {}", id);
        assert_eq!(renderer.render_default(&Value::Ref(id)), marker);

        let untracked = FxHashSet::default();
        let plain = Renderer::new(&heap, &untracked, &config);
        assert!(plain.render_default(&Value::Ref(id)).contains("[...]"));
    }

    #[test]
    fn test_truncate_counts_chars() {
        assert_eq!(truncate("héllo", 2), "hé...");
        assert_eq!(truncate("hi", 2), "hi");
    }

    /// Heap of `count` lists wired together by `edges`, cycles included
    fn wired_lists(count: usize, edges: &[(usize, usize)]) -> (Heap, Vec<ObjectId>) {
        let mut heap = Heap::new();
        let ids: Vec<ObjectId> = (0..count)
            .map(|i| heap.allocate(HeapObject::List(vec![Value::Int(i as i64)])))
            .collect();
        for &(from, to) in edges {
            let (from, to) = (ids[from % count], ids[to % count]);
            if let Some(HeapObject::List(items)) = heap.get_mut(from) {
                items.push(Value::Ref(to));
            }
        }
        (heap, ids)
    }

    proptest! {
        #[test]
        fn prop_text_respects_budget(text in "[a-z ]{0,300}", max_len in 1usize..200) {
            let heap = Heap::new();
            let tracked = FxHashSet::default();
            let config = TracerConfig::default();
            let rendered = Renderer::new(&heap, &tracked, &config).render(&Value::str(&text), max_len);
            // Quotes plus the cut marker
            prop_assert!(rendered.chars().count() <= max_len + 5);
        }

        #[test]
        fn prop_cyclic_heaps_render_bounded(
            count in 1usize..6,
            edges in proptest::collection::vec((0usize..6, 0usize..6), 0..12),
            track_every in 1usize..4,
        ) {
            let (heap, ids) = wired_lists(count, &edges);
            let tracked: FxHashSet<ObjectId> = ids.iter().copied().step_by(track_every).collect();
            let config = TracerConfig::default();
            let renderer = Renderer::new(&heap, &tracked, &config);
            for id in &ids {
                let rendered = renderer.render_default(&Value::Ref(*id));
                prop_assert!(rendered.chars().count() < 8192);
                if tracked.contains(id) {
                    prop_assert!(rendered.starts_with("➔ list["));
                }
            }
        }
    }
}
