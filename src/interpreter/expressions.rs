//! Expression evaluation

use super::calls::CallArgs;
use super::containers::IndexValue;
use super::engine::Interpreter;
use super::errors::{Exec, RuntimeError};
use super::format::format_with_spec;
use crate::memory::heap::{DictMap, HeapObject, SetMap};
use crate::memory::value::Value;
use crate::parser::ast::{Argument, BoolOp, Comprehension, Expr, ExprKind, FStringPart};

impl Interpreter<'_> {
    /// Evaluate an expression
    pub(crate) fn eval(&mut self, expr: &Expr) -> Exec<Value> {
        match &expr.kind {
            ExprKind::None => Ok(Value::None),
            ExprKind::Bool(b) => Ok(Value::Bool(*b)),
            ExprKind::Int(n) => Ok(Value::Int(*n)),
            ExprKind::Float(x) => Ok(Value::Float(*x)),
            ExprKind::Str(s) => Ok(Value::Str(s.clone())),
            ExprKind::Bytes(b) => Ok(Value::Bytes(b.clone())),
            ExprKind::FString(parts) => self.eval_fstring(parts),
            ExprKind::Name(name) => self.load_name(name),

            ExprKind::List(items) => {
                let items = self.eval_elements(items)?;
                Ok(self.alloc(HeapObject::List(items)))
            }
            ExprKind::Tuple(items) => {
                let items = self.eval_elements(items)?;
                Ok(self.alloc(HeapObject::Tuple(items)))
            }
            ExprKind::Set(items) => {
                let items = self.eval_elements(items)?;
                let set = self.build_set(items)?;
                Ok(self.alloc(HeapObject::Set(set)))
            }
            ExprKind::Dict(pairs) => {
                let mut map = DictMap::new();
                for (key, value) in pairs {
                    if let ExprKind::Starred(mapping) = &key.kind {
                        let mapping = self.eval(mapping)?;
                        for (k, v) in self.mapping_items(&mapping)? {
                            self.dict_insert(&mut map, k, v)?;
                        }
                        continue;
                    }
                    let key = self.eval(key)?;
                    let value = self.eval(value)?;
                    self.dict_insert(&mut map, key, value)?;
                }
                Ok(self.alloc(HeapObject::Dict(map)))
            }
            ExprKind::Starred(_) => {
                Err(RuntimeError::SyntaxError("can't use starred expression here".into()).into())
            }
            ExprKind::Slice { .. } => Err(RuntimeError::SyntaxError("invalid syntax".into()).into()),

            ExprKind::Attribute { value, attr } => {
                let object = self.eval(value)?;
                self.get_attribute(&object, attr)
            }
            ExprKind::Subscript { value, index } => {
                let object = self.eval(value)?;
                let index = self.eval_index(index)?;
                self.get_item(&object, &index)
            }
            ExprKind::Call { func, args } => {
                if let ExprKind::Attribute { value, attr } = &func.kind {
                    let receiver = self.eval(value)?;
                    let args = self.eval_arguments(args)?;
                    return self.call_attribute(receiver, attr, args);
                }
                let callee = self.eval(func)?;
                let args = self.eval_arguments(args)?;
                self.call_value(callee, args)
            }

            ExprKind::BinaryOp { op, left, right } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                self.binary_op(*op, left, right)
            }
            ExprKind::UnaryOp { op, operand } => {
                let operand = self.eval(operand)?;
                self.unary_op(*op, operand)
            }
            ExprKind::BoolOp { op, left, right } => {
                let left = self.eval(left)?;
                let truthy = self.truthy(&left)?;
                match (op, truthy) {
                    (BoolOp::And, false) | (BoolOp::Or, true) => Ok(left),
                    _ => self.eval(right),
                }
            }
            ExprKind::Compare { left, comparisons } => {
                let mut current = self.eval(left)?;
                if let [(op, right)] = comparisons.as_slice() {
                    let right = self.eval(right)?;
                    return self.compare(*op, &current, &right);
                }
                for (op, right) in comparisons {
                    let right = self.eval(right)?;
                    let result = self.compare(*op, &current, &right)?;
                    if !self.truthy(&result)? {
                        return Ok(Value::Bool(false));
                    }
                    current = right;
                }
                Ok(Value::Bool(true))
            }
            ExprKind::IfExp { test, body, orelse } => {
                let condition = self.eval(test)?;
                if self.truthy(&condition)? {
                    self.eval(body)
                } else {
                    self.eval(orelse)
                }
            }
            ExprKind::Lambda(def) => self.make_function(def),

            ExprKind::ListComp { element, generators } => {
                let mut items = Vec::new();
                self.in_comprehension(generators, &mut |this| {
                    items.push(this.eval(element)?);
                    Ok(())
                })?;
                Ok(self.alloc(HeapObject::List(items)))
            }
            ExprKind::SetComp { element, generators } => {
                let mut items = Vec::new();
                self.in_comprehension(generators, &mut |this| {
                    items.push(this.eval(element)?);
                    Ok(())
                })?;
                let set = self.build_set(items)?;
                Ok(self.alloc(HeapObject::Set(set)))
            }
            ExprKind::DictComp {
                key,
                value,
                generators,
            } => {
                let mut map = DictMap::new();
                self.in_comprehension(generators, &mut |this| {
                    let k = this.eval(key)?;
                    let v = this.eval(value)?;
                    this.dict_insert(&mut map, k, v)
                })?;
                Ok(self.alloc(HeapObject::Dict(map)))
            }
        }
    }

    /// Elements of a display, expanding `*iterable`
    fn eval_elements(&mut self, items: &[Expr]) -> Exec<Vec<Value>> {
        let mut values = Vec::with_capacity(items.len());
        for item in items {
            match &item.kind {
                ExprKind::Starred(inner) => {
                    let iterable = self.eval(inner)?;
                    values.extend(self.collect_iterable(&iterable)?);
                }
                _ => values.push(self.eval(item)?),
            }
        }
        Ok(values)
    }

    pub(crate) fn build_set(&mut self, items: Vec<Value>) -> Exec<SetMap> {
        let mut set = SetMap::new();
        for item in items {
            let key = self.hash(&item)?;
            set.entry(key).or_insert(item);
        }
        Ok(set)
    }

    /// Insert into a dict, keeping the original key object when the key already exists
    pub(crate) fn dict_insert(&mut self, map: &mut DictMap, key: Value, value: Value) -> Exec<()> {
        let hash = self.hash(&key)?;
        match map.get_mut(&hash) {
            Some(entry) => entry.1 = value,
            None => {
                map.insert(hash, (key, value));
            }
        }
        Ok(())
    }

    /// Evaluate a subscript index, keeping slices distinct from values
    pub(crate) fn eval_index(&mut self, index: &Expr) -> Exec<IndexValue> {
        match &index.kind {
            ExprKind::Slice { lower, upper, step } => {
                let bound = |this: &mut Self, expr: &Option<Box<Expr>>| -> Exec<Option<i64>> {
                    match expr {
                        None => Ok(None),
                        Some(expr) => match this.eval(expr)? {
                            Value::None => Ok(None),
                            value => value.as_int().map(Some).ok_or_else(|| {
                                RuntimeError::type_error(
                                    "slice indices must be integers or None or have an __index__ method",
                                )
                                .into()
                            }),
                        },
                    }
                };
                let lower = bound(self, lower)?;
                let upper = bound(self, upper)?;
                let step = bound(self, step)?;
                Ok(IndexValue::Slice { lower, upper, step })
            }
            ExprKind::Tuple(items) if items.iter().any(|i| matches!(i.kind, ExprKind::Slice { .. })) => {
                let parts = items
                    .iter()
                    .map(|item| self.eval_index(item))
                    .collect::<Exec<Vec<_>>>()?;
                Ok(IndexValue::Multi(parts))
            }
            _ => Ok(IndexValue::Single(self.eval(index)?)),
        }
    }

    /// Evaluate call arguments, expanding `*args` and `**kwargs`
    pub(crate) fn eval_arguments(&mut self, args: &[Argument]) -> Exec<CallArgs> {
        let mut call = CallArgs::default();
        for arg in args {
            match arg {
                Argument::Positional(expr) => call.positional.push(self.eval(expr)?),
                Argument::Star(expr) => {
                    let iterable = self.eval(expr)?;
                    call.positional.extend(self.collect_iterable(&iterable)?);
                }
                Argument::Keyword(name, expr) => {
                    let value = self.eval(expr)?;
                    call.push_keyword(name.clone(), value)?;
                }
                Argument::DoubleStar(expr) => {
                    let mapping = self.eval(expr)?;
                    for (key, value) in self.mapping_items(&mapping)? {
                        let Value::Str(name) = key else {
                            return Err(RuntimeError::type_error("keywords must be strings").into());
                        };
                        call.push_keyword(name.to_string(), value)?;
                    }
                }
            }
        }
        Ok(call)
    }

    /// Key/value pairs of a dict (for `**mapping`)
    pub(crate) fn mapping_items(&mut self, mapping: &Value) -> Exec<Vec<(Value, Value)>> {
        match self.heap.deref(mapping) {
            Some(HeapObject::Dict(map)) => Ok(map.values().cloned().collect()),
            _ => Err(RuntimeError::type_error(format!(
                "'{}' object is not a mapping",
                self.type_name(mapping)
            ))
            .into()),
        }
    }

    /// Run `body` once per combination of comprehension clauses, in a fresh comprehension scope
    fn in_comprehension(
        &mut self,
        generators: &[Comprehension],
        body: &mut dyn FnMut(&mut Self) -> Exec<()>,
    ) -> Exec<()> {
        self.frame_mut()?.push_scope();
        let result = self.run_generators(generators, body);
        if let Ok(frame) = self.frame_mut() {
            frame.pop_scope();
        }
        result
    }

    fn run_generators(
        &mut self,
        generators: &[Comprehension],
        body: &mut dyn FnMut(&mut Self) -> Exec<()>,
    ) -> Exec<()> {
        let Some((clause, rest)) = generators.split_first() else {
            return body(self);
        };
        let iterable = self.eval(&clause.iter)?;
        let mut state = self.iter_start(&iterable)?;
        'items: while let Some(item) = self.iter_next(&mut state)? {
            self.bind_comprehension_target(&clause.target, item)?;
            for condition in &clause.conditions {
                let keep = self.eval(condition)?;
                if !self.truthy(&keep)? {
                    continue 'items;
                }
            }
            self.run_generators(rest, body)?;
        }
        Ok(())
    }

    fn eval_fstring(&mut self, parts: &[FStringPart]) -> Exec<Value> {
        let mut out = String::new();
        for part in parts {
            match part {
                FStringPart::Literal(text) => out.push_str(text),
                FStringPart::Field {
                    expr,
                    conversion,
                    spec,
                } => {
                    let value = self.eval(expr)?;
                    let value = match conversion {
                        Some('r') | Some('a') => Value::str(&self.repr(&value)?),
                        Some(_) => Value::str(&self.to_str(&value)?),
                        None => value,
                    };
                    match spec {
                        Some(spec) => out.push_str(&self.format_value(&value, spec)?),
                        None => out.push_str(&self.to_str(&value)?),
                    }
                }
            }
        }
        Ok(Value::str(&out))
    }

    /// `format(value, spec)`
    pub(crate) fn format_value(&mut self, value: &Value, spec: &str) -> Exec<String> {
        let display = self.to_str(value)?;
        let type_name = self.type_name(value);
        Ok(format_with_spec(value, spec, &display, &type_name)?)
    }
}
