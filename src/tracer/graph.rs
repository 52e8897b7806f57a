//! Object graph extraction
//!
//! Starting from the names visible at a step, the extractor walks the heap
//! breadth-first and produces one [`GraphNode`] per distinct identity it reaches.
//! Aliases collapse into one node carrying every name bound to it; identities
//! reached only through other objects get a synthesized name.
//!
//! Traversal is bounded by the configured node budget and per-container
//! fan-out. Rendering happens after traversal so every payload can refer to
//! any node in the final set by a reference marker.

use super::render::{truncate, Renderer, ValueKind};
use crate::config::TracerConfig;
use crate::interpreter::format::{array_str, repr};
use crate::interpreter::modules::shape_text;
use crate::memory::heap::{Heap, HeapObject, NdArray};
use crate::memory::value::{ObjectId, Value};
use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use serde::Serialize;
use std::collections::{BTreeSet, VecDeque};

/// Display family of a graph node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VizType {
    Object,
    /// list or tuple
    Array,
    Dict,
    Set,
    Deque,
    NumpyArray,
}

impl VizType {
    fn of(heap: &Heap, id: ObjectId) -> Option<VizType> {
        match heap.get(id)? {
            HeapObject::List(_) | HeapObject::Tuple(_) => Some(VizType::Array),
            HeapObject::Dict(_) => Some(VizType::Dict),
            HeapObject::Set(_) => Some(VizType::Set),
            HeapObject::Deque { .. } => Some(VizType::Deque),
            HeapObject::Array(_) => Some(VizType::NumpyArray),
            HeapObject::Instance(_) => Some(VizType::Object),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            VizType::Object => "object",
            VizType::Array => "array",
            VizType::Dict => "dict",
            VizType::Set => "set",
            VizType::Deque => "deque",
            VizType::NumpyArray => "numpy_array",
        }
    }

    /// Ordering among nodes with the same binding status
    fn priority(self) -> u8 {
        match self {
            VizType::Object => 0,
            VizType::Dict => 1,
            VizType::Set => 2,
            VizType::Array | VizType::Deque | VizType::NumpyArray => 3,
        }
    }
}

/// Outgoing edge of a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reference {
    pub field_name: String,
    pub target_id: u64,
    pub target_type: VizType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Field {
    pub name: String,
    pub value: String,
    #[serde(rename = "type")]
    pub type_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Element {
    pub index: usize,
    pub value_repr: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pair {
    pub key_repr: String,
    pub value_repr: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SetElement {
    pub value_repr: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArrayPreview {
    pub shape: String,
    pub dtype: String,
    pub ndim: usize,
    pub size: usize,
    pub string_preview: String,
}

/// Kind-specific contents of a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Payload {
    Fields(Vec<Field>),
    Elements(Vec<Element>),
    Pairs(Vec<Pair>),
    SetElements(Vec<SetElement>),
    Array(ArrayPreview),
}

/// One distinct object identity reachable at a step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphNode {
    pub viz_type: VizType,
    pub id: u64,
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub memory_address: String,
    pub has_direct_reference: bool,
    pub references: Vec<Reference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<usize>,
    #[serde(flatten)]
    pub payload: Option<Payload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl GraphNode {
    /// Variable names bound directly to this node
    pub fn names(&self) -> Vec<&str> {
        if self.has_direct_reference {
            self.name.split(", ").collect()
        } else {
            Vec::new()
        }
    }
}

/// The extracted graph of one step
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectGraph {
    pub nodes: Vec<GraphNode>,
    /// Every identity that has a node
    pub tracked: FxHashSet<ObjectId>,
}

struct Discovered {
    viz_type: VizType,
    names: BTreeSet<String>,
    direct: bool,
}

/// Build the object graph over `scope`
pub fn extract(heap: &Heap, scope: &[(String, Value)], config: &TracerConfig) -> ObjectGraph {
    let mut found: IndexMap<ObjectId, Discovered> = IndexMap::new();
    let mut queue: VecDeque<ObjectId> = VecDeque::new();

    for (name, value) in scope {
        if name.starts_with("__") || !ValueKind::classify(heap, value).is_candidate() {
            continue;
        }
        let Some(id) = value.as_ref_id() else {
            continue;
        };
        let Some(viz_type) = VizType::of(heap, id) else {
            continue;
        };
        let entry = found.entry(id).or_insert_with(|| {
            queue.push_back(id);
            Discovered {
                viz_type,
                names: BTreeSet::new(),
                direct: true,
            }
        });
        entry.names.insert(name.clone());
        entry.direct = true;
    }

    let mut processed = 0;
    while let Some(id) = queue.pop_front() {
        if processed >= config.node_budget {
            break;
        }
        processed += 1;
        for child in children(heap, id, config.fanout) {
            let Some(child_id) = child.as_ref_id() else {
                continue;
            };
            if found.contains_key(&child_id) || !ValueKind::classify(heap, &child).is_candidate() {
                continue;
            }
            let Some(viz_type) = VizType::of(heap, child_id) else {
                continue;
            };
            found.insert(
                child_id,
                Discovered {
                    viz_type,
                    names: BTreeSet::new(),
                    direct: false,
                },
            );
            queue.push_back(child_id);
        }
    }

    let tracked: FxHashSet<ObjectId> = found.keys().copied().collect();
    let kinds: IndexMap<ObjectId, VizType> = found.iter().map(|(id, d)| (*id, d.viz_type)).collect();
    let renderer = Renderer::new(heap, &tracked, config);
    let mut nodes: Vec<GraphNode> = found
        .iter()
        .map(|(id, discovered)| build_node(heap, &renderer, &kinds, *id, discovered, config))
        .collect();
    nodes.sort_by(|a, b| {
        (!a.has_direct_reference, a.viz_type.priority(), &a.name).cmp(&(
            !b.has_direct_reference,
            b.viz_type.priority(),
            &b.name,
        ))
    });
    ObjectGraph { nodes, tracked }
}

/// Values a traversal inspects below `id`
fn children(heap: &Heap, id: ObjectId, fanout: usize) -> Vec<Value> {
    match heap.get(id) {
        Some(HeapObject::Instance(instance)) => instance.fields.values().cloned().collect(),
        Some(HeapObject::List(items) | HeapObject::Tuple(items)) => {
            items.iter().take(fanout).cloned().collect()
        }
        Some(HeapObject::Deque { items, .. }) => items.iter().take(fanout).cloned().collect(),
        Some(HeapObject::Dict(map)) => map
            .values()
            .take(fanout)
            .flat_map(|(k, v)| [k.clone(), v.clone()])
            .collect(),
        Some(HeapObject::Set(set)) => set.values().take(fanout).cloned().collect(),
        _ => Vec::new(),
    }
}

fn label(text: &str, limit: usize) -> String {
    truncate(text, limit)
}

fn build_node(
    heap: &Heap,
    renderer: &Renderer<'_>,
    kinds: &IndexMap<ObjectId, VizType>,
    id: ObjectId,
    discovered: &Discovered,
    config: &TracerConfig,
) -> GraphNode {
    let name = if discovered.names.is_empty() {
        format!("<{} @ {}>", discovered.viz_type.name(), id)
    } else {
        discovered.names.iter().cloned().collect::<Vec<_>>().join(", ")
    };
    let mut node = GraphNode {
        viz_type: discovered.viz_type,
        id: id.address(),
        name,
        type_name: heap.type_name(&Value::Ref(id)),
        memory_address: id.to_string(),
        has_direct_reference: discovered.direct,
        references: Vec::new(),
        length: None,
        payload: None,
        error: None,
    };

    let mut refer = |references: &mut Vec<Reference>, field_name: String, value: &Value| {
        if let Some(target) = value.as_ref_id() {
            if let Some(target_type) = kinds.get(&target) {
                references.push(Reference {
                    field_name,
                    target_id: target.address(),
                    target_type: *target_type,
                });
            }
        }
    };

    let Some(object) = heap.get(id) else {
        node.error = Some(format!("Formatting Error: no object at {}", id));
        return node;
    };
    let limit = config.repr_length;
    let payload = match object {
        HeapObject::Instance(instance) => {
            let mut fields = Vec::new();
            for (field, value) in &instance.fields {
                if field.starts_with("__") {
                    continue;
                }
                fields.push(Field {
                    name: field.clone(),
                    value: renderer.render(value, limit),
                    type_name: heap.type_name(value),
                });
                refer(&mut node.references, field.clone(), value);
            }
            Payload::Fields(fields)
        }
        HeapObject::List(items) | HeapObject::Tuple(items) => {
            node.length = Some(items.len());
            Payload::Elements(elements(renderer, items.iter(), limit, &mut node.references, &mut refer))
        }
        HeapObject::Deque { items, .. } => {
            node.length = Some(items.len());
            Payload::Elements(elements(renderer, items.iter(), limit, &mut node.references, &mut refer))
        }
        HeapObject::Dict(map) => {
            node.length = Some(map.len());
            let mut pairs = Vec::new();
            for (key, value) in map.values() {
                let key_repr = renderer.render(key, limit);
                let value_repr = renderer.render(value, limit);
                let short = label(&key_repr, config.key_repr_length);
                refer(&mut node.references, format!("key_obj({})", short), key);
                refer(&mut node.references, format!("val_for_key({})", short), value);
                pairs.push(Pair { key_repr, value_repr });
            }
            Payload::Pairs(pairs)
        }
        HeapObject::Set(set) => {
            node.length = Some(set.len());
            let mut ordered: Vec<(String, &Value)> = set.values().map(|v| (repr(heap, v), v)).collect();
            ordered.sort_by(|a, b| a.0.cmp(&b.0));
            let mut members = Vec::new();
            for (_, value) in ordered {
                let value_repr = renderer.render(value, limit);
                refer(&mut node.references, format!("elem({})", label(&value_repr, 20)), value);
                members.push(SetElement { value_repr });
            }
            Payload::SetElements(members)
        }
        HeapObject::Array(array) => Payload::Array(array_preview(array, config)),
        _ => {
            node.error = Some(format!("Formatting Error: {} is not displayable", node.type_name));
            return node;
        }
    };
    node.payload = Some(payload);
    node
}

fn elements<'v>(
    renderer: &Renderer<'_>,
    items: impl Iterator<Item = &'v Value>,
    limit: usize,
    references: &mut Vec<Reference>,
    refer: &mut impl FnMut(&mut Vec<Reference>, String, &Value),
) -> Vec<Element> {
    items
        .enumerate()
        .map(|(index, value)| {
            refer(references, format!("[{}]", index), value);
            Element {
                index,
                value_repr: renderer.render(value, limit),
            }
        })
        .collect()
}

/// Shape, dtype and a line- and length-bounded `str()` preview
fn array_preview(array: &NdArray, config: &TracerConfig) -> ArrayPreview {
    let full = array_str(array);
    let lines: Vec<&str> = full.lines().collect();
    let mut preview = if lines.len() > config.array_preview_lines {
        let half = config.array_preview_lines / 2;
        format!(
            "{}\n...\n{}",
            lines[..half].join("\n"),
            lines[lines.len() - half..].join("\n")
        )
    } else {
        full.clone()
    };
    if preview.chars().count() > config.array_preview_chars {
        let keep = config.array_preview_chars.saturating_sub(3);
        preview = format!("{}...", preview.chars().take(keep).collect::<String>());
    }
    ArrayPreview {
        shape: shape_text(&array.shape),
        dtype: array.dtype.name().to_string(),
        ndim: array.ndim(),
        size: array.size(),
        string_preview: preview,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::heap::{DType, DictMap, Instance};
    use crate::memory::scope::Namespace;
    use crate::memory::value::HashKey;
    use pretty_assertions::assert_eq;

    fn scope(entries: &[(&str, &Value)]) -> Vec<(String, Value)> {
        entries.iter().map(|(n, v)| (n.to_string(), (*v).clone())).collect()
    }

    #[test]
    fn test_aliases_collapse_into_one_node() {
        let mut heap = Heap::new();
        let list = Value::Ref(heap.allocate(HeapObject::List(vec![Value::Int(1), Value::Int(2)])));
        let mut map = DictMap::default();
        map.insert(HashKey::Str("a".into()), (Value::str("a"), list.clone()));
        let dict = Value::Ref(heap.allocate(HeapObject::Dict(map)));

        let graph = extract(
            &heap,
            &scope(&[("x", &list), ("y", &list), ("z", &dict)]),
            &TracerConfig::default(),
        );
        assert_eq!(graph.nodes.len(), 2);
        let dict_node = &graph.nodes[0];
        let list_node = &graph.nodes[1];
        assert_eq!(dict_node.name, "z");
        assert_eq!(list_node.name, "x, y");
        assert_eq!(list_node.names(), vec!["x", "y"]);
        assert_eq!(
            dict_node.references,
            vec![Reference {
                field_name: "val_for_key('a')".to_string(),
                target_id: list_node.id,
                target_type: VizType::Array,
            }]
        );
        let Some(Payload::Pairs(pairs)) = &dict_node.payload else {
            panic!("dict payload expected");
        };
        assert_eq!(pairs[0].value_repr, format!("➔ list[2] @ {}", list_node.memory_address));
    }

    #[test]
    fn test_transitive_nodes_get_placeholder_names() {
        let mut heap = Heap::new();
        let inner = Value::Ref(heap.allocate(HeapObject::List(vec![])));
        let outer = Value::Ref(heap.allocate(HeapObject::Tuple(vec![inner.clone(), Value::Int(3)])));
        let graph = extract(&heap, &scope(&[("t", &outer)]), &TracerConfig::default());
        assert_eq!(graph.nodes.len(), 2);
        assert!(graph.nodes[0].has_direct_reference);
        assert!(!graph.nodes[1].has_direct_reference);
        assert_eq!(
            graph.nodes[1].name,
            format!("<array @ {}>", inner.as_ref_id().unwrap())
        );
        assert_eq!(graph.nodes[0].references[0].field_name, "[0]");
        assert_eq!(graph.nodes[0].length, Some(2));
    }

    #[test]
    fn test_cycle_terminates() {
        let mut heap = Heap::new();
        let class = heap.allocate(HeapObject::Class(crate::memory::heap::Class {
            name: "Node".to_string(),
            bases: vec![],
            attrs: Namespace::default(),
            builtin: false,
        }));
        let node = heap.allocate(HeapObject::Instance(Instance {
            class,
            fields: Namespace::default(),
            args: None,
        }));
        if let Some(HeapObject::Instance(instance)) = heap.get_mut(node) {
            instance.fields.insert("value".to_string(), Value::Int(1));
            instance.fields.insert("next".to_string(), Value::Ref(node));
        }
        let graph = extract(&heap, &scope(&[("n", &Value::Ref(node))]), &TracerConfig::default());
        assert_eq!(graph.nodes.len(), 1);
        let Some(Payload::Fields(fields)) = &graph.nodes[0].payload else {
            panic!("object payload expected");
        };
        assert_eq!(fields[1].value, format!("➔ Node @ {}", node));
        assert_eq!(graph.nodes[0].references[0].target_id, node.address());
        assert_eq!(graph.nodes[0].type_name, "Node");
    }

    #[test]
    fn test_budget_bounds_traversal() {
        let mut heap = Heap::new();
        let mut chain = Value::Ref(heap.allocate(HeapObject::List(vec![])));
        for _ in 0..50 {
            chain = Value::Ref(heap.allocate(HeapObject::List(vec![chain])));
        }
        let config = TracerConfig {
            node_budget: 5,
            ..TracerConfig::default()
        };
        let graph = extract(&heap, &scope(&[("c", &chain)]), &config);
        assert_eq!(graph.nodes.len(), 6);
    }

    #[test]
    fn test_primitives_and_dunders_are_skipped() {
        let mut heap = Heap::new();
        let list = Value::Ref(heap.allocate(HeapObject::List(vec![])));
        let graph = extract(
            &heap,
            &scope(&[("n", &Value::Int(1)), ("__hidden__", &list), ("s", &Value::str("x"))]),
            &TracerConfig::default(),
        );
        assert!(graph.nodes.is_empty());
    }

    #[test]
    fn test_array_preview_is_bounded() {
        let array = NdArray {
            dtype: DType::Int64,
            shape: vec![20, 2],
            data: (0..40).map(f64::from).collect(),
        };
        let preview = array_preview(&array, &TracerConfig::default());
        assert_eq!(preview.shape, "(20, 2)");
        assert_eq!(preview.ndim, 2);
        assert_eq!(preview.size, 40);
        assert_eq!(preview.string_preview.lines().count(), 11);
        assert!(preview.string_preview.contains("\n...\n"));
    }

    #[test]
    fn test_node_serializes_payload_inline() {
        let mut heap = Heap::new();
        let list = Value::Ref(heap.allocate(HeapObject::List(vec![Value::Int(5)])));
        let graph = extract(&heap, &scope(&[("xs", &list)]), &TracerConfig::default());
        let json = serde_json::to_value(&graph.nodes[0]).unwrap();
        assert_eq!(json["viz_type"], "array");
        assert_eq!(json["type"], "list");
        assert_eq!(json["elements"][0]["value_repr"], "5");
        assert!(json.get("error").is_none());
    }
}
