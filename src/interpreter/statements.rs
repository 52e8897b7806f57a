//! Statement execution
//!
//! Every statement announces its line to the hook before it runs, except
//! `global`/`nonlocal` declarations and statements sharing a line with the
//! preceding statement (`a = 1; b = 2`). Loop headers announce again each time
//! they are re-evaluated, including the final check that ends the loop.

use super::calls::CallArgs;
use super::engine::Interpreter;
use super::errors::{Exception, Exec, Flow, RuntimeError, Unwind};
use crate::memory::heap::NameInfo;
use crate::memory::value::Value;
use crate::parser::ast::{ExceptHandler, Expr, ExprKind, FunctionDef, Stmt, StmtKind};

impl Interpreter<'_> {
    /// Execute a block of statements
    pub(crate) fn exec_block(&mut self, body: &[Stmt]) -> Exec<Flow> {
        let mut previous_line = 0;
        for stmt in body {
            let announce = stmt.location.line != previous_line;
            previous_line = stmt.location.line;
            match self.exec_statement(stmt, announce)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_statement(&mut self, stmt: &Stmt, announce: bool) -> Exec<Flow> {
        if announce && !matches!(stmt.kind, StmtKind::Global(_) | StmtKind::Nonlocal(_)) {
            self.notify_line(stmt.location.line)?;
        }

        match &stmt.kind {
            StmtKind::Expr(expr) => {
                self.eval(expr)?;
            }
            StmtKind::Assign { targets, value } => {
                let value = self.eval(value)?;
                for target in targets {
                    self.assign_target(target, value.clone())?;
                }
            }
            StmtKind::AugAssign { target, op, value } => self.exec_aug_assign(target, *op, value)?,
            StmtKind::Annotation(_) | StmtKind::Pass | StmtKind::Global(_) | StmtKind::Nonlocal(_) => {}
            StmtKind::If { branches, orelse } => {
                for (i, (test, body)) in branches.iter().enumerate() {
                    if i > 0 {
                        self.notify_line(test.location.line)?;
                    }
                    let condition = self.eval(test)?;
                    if self.truthy(&condition)? {
                        return self.exec_block(body);
                    }
                }
                if let Some(orelse) = orelse {
                    return self.exec_block(orelse);
                }
            }
            StmtKind::While { test, body, orelse } => {
                let mut first = true;
                loop {
                    if !first {
                        self.notify_line(stmt.location.line)?;
                    }
                    first = false;
                    let condition = self.eval(test)?;
                    if !self.truthy(&condition)? {
                        break;
                    }
                    match self.exec_block(body)? {
                        Flow::Break => return Ok(Flow::Normal),
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
                if let Some(orelse) = orelse {
                    return self.exec_block(orelse);
                }
            }
            StmtKind::For {
                target,
                iter,
                body,
                orelse,
            } => {
                let iterable = self.eval(iter)?;
                let mut state = self.iter_start(&iterable)?;
                let mut first = true;
                loop {
                    if !first {
                        self.notify_line(stmt.location.line)?;
                    }
                    first = false;
                    let Some(item) = self.iter_next(&mut state)? else {
                        break;
                    };
                    self.assign_target(target, item)?;
                    match self.exec_block(body)? {
                        Flow::Break => return Ok(Flow::Normal),
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
                if let Some(orelse) = orelse {
                    return self.exec_block(orelse);
                }
            }
            StmtKind::Break => return Ok(Flow::Break),
            StmtKind::Continue => return Ok(Flow::Continue),
            StmtKind::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval(expr)?,
                    None => Value::None,
                };
                return Ok(Flow::Return(value));
            }
            StmtKind::FunctionDef(def) => {
                let decorators = self.eval_all(&def.decorators)?;
                let mut function = self.make_function(def)?;
                for decorator in decorators.into_iter().rev() {
                    function = self.call_value(decorator, CallArgs::positional(vec![function]))?;
                }
                self.store_name(&def.name, function)?;
            }
            StmtKind::ClassDef(def) => self.define_class(def)?,
            StmtKind::Delete(targets) => {
                for target in targets {
                    self.delete_target(target)?;
                }
            }
            StmtKind::Try {
                body,
                handlers,
                orelse,
                finalbody,
            } => return self.exec_try(body, handlers, orelse.as_deref(), finalbody.as_deref()),
            StmtKind::Raise { exc, cause } => {
                let exception = match exc {
                    Some(expr) => {
                        let value = self.eval(expr)?;
                        if let Some(cause) = cause {
                            self.eval(cause)?;
                        }
                        self.exception_from_value(value)?
                    }
                    None => match self.handling.last() {
                        Some(active) => Exception {
                            value: active.value.clone(),
                            traceback: Vec::new(),
                        },
                        None => {
                            return Err(RuntimeError::Runtime("No active exception to reraise".into()).into())
                        }
                    },
                };
                return Err(Unwind::Error(Box::new(exception)));
            }
            StmtKind::Assert { test, msg } => {
                let condition = self.eval(test)?;
                if !self.truthy(&condition)? {
                    let message = match msg {
                        Some(expr) => {
                            let value = self.eval(expr)?;
                            self.to_str(&value)?
                        }
                        None => String::new(),
                    };
                    return Err(RuntimeError::AssertionError(message).into());
                }
            }
            StmtKind::Import(names) => {
                for import in names {
                    let module = self.import_module(&import.name)?;
                    let binding = import.alias.as_deref().unwrap_or(&import.name);
                    self.store_name(binding, module)?;
                }
            }
            StmtKind::ImportFrom { module, names } => {
                let module_value = self.import_module(module)?;
                for import in names {
                    if import.name == "*" {
                        for (name, value) in self.module_exports(&module_value)? {
                            self.store_name(&name, value)?;
                        }
                        continue;
                    }
                    let value = self.get_attribute(&module_value, &import.name).map_err(|_| {
                        Unwind::from(RuntimeError::ImportError(format!(
                            "cannot import name '{}' from '{}' (unknown location)",
                            import.name, module
                        )))
                    })?;
                    let binding = import.alias.as_deref().unwrap_or(&import.name);
                    self.store_name(binding, value)?;
                }
            }
        }
        Ok(Flow::Normal)
    }

    pub(crate) fn eval_all(&mut self, exprs: &[Expr]) -> Exec<Vec<Value>> {
        exprs.iter().map(|expr| self.eval(expr)).collect()
    }

    fn exec_try(
        &mut self,
        body: &[Stmt],
        handlers: &[ExceptHandler],
        orelse: Option<&[Stmt]>,
        finalbody: Option<&[Stmt]>,
    ) -> Exec<Flow> {
        let result = match self.exec_block(body) {
            Err(Unwind::Error(exception)) => self.handle_exception(*exception, handlers),
            Ok(Flow::Normal) => match orelse {
                Some(orelse) => self.exec_block(orelse),
                None => Ok(Flow::Normal),
            },
            other => other,
        };

        let Some(finalbody) = finalbody else {
            return result;
        };
        if matches!(result, Err(Unwind::Halt(_))) {
            return result;
        }
        match self.exec_block(finalbody)? {
            Flow::Normal => result,
            flow => Ok(flow),
        }
    }

    fn handle_exception(&mut self, mut exception: Exception, handlers: &[ExceptHandler]) -> Exec<Flow> {
        for handler in handlers {
            self.notify_line(handler.location.line)?;
            let matched = match &handler.kind {
                None => true,
                Some(kind) => {
                    let kind = self.eval(kind)?;
                    self.exception_matches(&exception, &kind)?
                }
            };
            if !matched {
                continue;
            }
            if let Some(name) = &handler.name {
                let value = self.materialize_exception(&mut exception)?;
                self.store_name(name, value)?;
            }
            self.handling.push(exception);
            let result = self.exec_block(&handler.body);
            self.handling.pop();
            if let Some(name) = &handler.name {
                // the handler body may already have deleted or rebound it
                let _ = self.delete_name(name);
            }
            return result;
        }
        Err(Unwind::Error(Box::new(exception)))
    }

    fn exec_aug_assign(&mut self, target: &Expr, op: crate::parser::ast::BinOp, value: &Expr) -> Exec<()> {
        match &target.kind {
            ExprKind::Name(name) => {
                let current = self.load_name(name)?;
                let operand = self.eval(value)?;
                let result = self.inplace_op(op, current, operand)?;
                self.store_name(name, result)
            }
            ExprKind::Attribute { value: object, attr } => {
                let object = self.eval(object)?;
                let current = self.get_attribute(&object, attr)?;
                let operand = self.eval(value)?;
                let result = self.inplace_op(op, current, operand)?;
                self.set_attribute(&object, attr, result)
            }
            ExprKind::Subscript { value: object, index } => {
                let object = self.eval(object)?;
                let index = self.eval_index(index)?;
                let current = self.get_item(&object, &index)?;
                let operand = self.eval(value)?;
                let result = self.inplace_op(op, current, operand)?;
                self.set_item(&object, &index, result)
            }
            _ => Err(RuntimeError::SyntaxError(
                "'expression' is an illegal expression for augmented assignment".into(),
            )
            .into()),
        }
    }

    /// Bind `value` to an assignment target
    pub(crate) fn assign_target(&mut self, target: &Expr, value: Value) -> Exec<()> {
        self.bind_target(target, value, false)
    }

    /// Bind a comprehension variable; names go to the comprehension scope
    pub(crate) fn bind_comprehension_target(&mut self, target: &Expr, value: Value) -> Exec<()> {
        self.bind_target(target, value, true)
    }

    fn bind_target(&mut self, target: &Expr, value: Value, comprehension: bool) -> Exec<()> {
        match &target.kind {
            ExprKind::Name(name) => {
                if comprehension && self.frame_mut()?.bind_comprehension_var(name, value.clone()) {
                    return Ok(());
                }
                self.store_name(name, value)
            }
            ExprKind::Tuple(elements) | ExprKind::List(elements) => {
                let values = self.unpack(elements, &value)?;
                for (element, value) in elements.iter().zip(values) {
                    let element = match &element.kind {
                        ExprKind::Starred(inner) => inner.as_ref(),
                        _ => element,
                    };
                    self.bind_target(element, value, comprehension)?;
                }
                Ok(())
            }
            ExprKind::Attribute { value: object, attr } => {
                let object = self.eval(object)?;
                self.set_attribute(&object, attr, value)
            }
            ExprKind::Subscript { value: object, index } => {
                let object = self.eval(object)?;
                let index = self.eval_index(index)?;
                self.set_item(&object, &index, value)
            }
            ExprKind::Starred(_) => Err(RuntimeError::SyntaxError(
                "starred assignment target must be in a list or tuple".into(),
            )
            .into()),
            _ => Err(RuntimeError::SyntaxError("cannot assign to expression".into()).into()),
        }
    }

    /// Split an iterable into one value per target; a starred target takes a list of the rest
    fn unpack(&mut self, targets: &[Expr], value: &Value) -> Exec<Vec<Value>> {
        let items = self.collect_iterable(value)?;
        let starred = targets
            .iter()
            .position(|t| matches!(t.kind, ExprKind::Starred(_)));
        match starred {
            None => {
                if items.len() > targets.len() {
                    return Err(RuntimeError::value_error(format!(
                        "too many values to unpack (expected {})",
                        targets.len()
                    ))
                    .into());
                }
                if items.len() < targets.len() {
                    return Err(RuntimeError::value_error(format!(
                        "not enough values to unpack (expected {}, got {})",
                        targets.len(),
                        items.len()
                    ))
                    .into());
                }
                Ok(items)
            }
            Some(star) => {
                let after = targets.len() - star - 1;
                if items.len() < targets.len() - 1 {
                    return Err(RuntimeError::value_error(format!(
                        "not enough values to unpack (expected at least {}, got {})",
                        targets.len() - 1,
                        items.len()
                    ))
                    .into());
                }
                let mut items = items;
                let tail = items.split_off(items.len() - after);
                let middle = items.split_off(star);
                let middle = self.alloc(crate::memory::heap::HeapObject::List(middle));
                items.push(middle);
                items.extend(tail);
                Ok(items)
            }
        }
    }

    fn delete_target(&mut self, target: &Expr) -> Exec<()> {
        match &target.kind {
            ExprKind::Name(name) => self.delete_name(name),
            ExprKind::Tuple(elements) | ExprKind::List(elements) => {
                for element in elements {
                    self.delete_target(element)?;
                }
                Ok(())
            }
            ExprKind::Attribute { value, attr } => {
                let object = self.eval(value)?;
                self.delete_attribute(&object, attr)
            }
            ExprKind::Subscript { value, index } => {
                let object = self.eval(value)?;
                let index = self.eval_index(index)?;
                self.delete_item(&object, &index)
            }
            _ => Err(RuntimeError::SyntaxError("cannot delete expression".into()).into()),
        }
    }
}

/// Static analysis of the names a function body binds
pub(crate) fn analyze_function(def: &FunctionDef) -> NameInfo {
    let mut info = NameInfo::default();
    for name in def.params.names() {
        info.locals.insert(name.to_string());
    }
    collect_block(&def.body, &mut info);
    for name in info.globals.iter().chain(info.nonlocals.iter()) {
        info.locals.remove(name);
    }
    info
}

fn collect_block(body: &[Stmt], info: &mut NameInfo) {
    for stmt in body {
        collect_statement(stmt, info);
    }
}

fn collect_statement(stmt: &Stmt, info: &mut NameInfo) {
    match &stmt.kind {
        StmtKind::Assign { targets, .. } => targets.iter().for_each(|t| collect_target(t, info)),
        StmtKind::AugAssign { target, .. } | StmtKind::Annotation(target) => collect_target(target, info),
        StmtKind::If { branches, orelse } => {
            for (_, body) in branches {
                collect_block(body, info);
            }
            if let Some(orelse) = orelse {
                collect_block(orelse, info);
            }
        }
        StmtKind::While { body, orelse, .. } => {
            collect_block(body, info);
            if let Some(orelse) = orelse {
                collect_block(orelse, info);
            }
        }
        StmtKind::For {
            target, body, orelse, ..
        } => {
            collect_target(target, info);
            collect_block(body, info);
            if let Some(orelse) = orelse {
                collect_block(orelse, info);
            }
        }
        StmtKind::Try {
            body,
            handlers,
            orelse,
            finalbody,
        } => {
            collect_block(body, info);
            for handler in handlers {
                if let Some(name) = &handler.name {
                    info.locals.insert(name.clone());
                }
                collect_block(&handler.body, info);
            }
            for block in [orelse, finalbody].into_iter().flatten() {
                collect_block(block, info);
            }
        }
        StmtKind::FunctionDef(def) => {
            info.locals.insert(def.name.clone());
        }
        StmtKind::ClassDef(def) => {
            info.locals.insert(def.name.clone());
        }
        StmtKind::Import(names) => {
            for import in names {
                let binding = import
                    .alias
                    .clone()
                    .unwrap_or_else(|| import.name.split('.').next().unwrap_or_default().to_string());
                info.locals.insert(binding);
            }
        }
        StmtKind::ImportFrom { names, .. } => {
            for import in names.iter().filter(|i| i.name != "*") {
                info.locals
                    .insert(import.alias.clone().unwrap_or_else(|| import.name.clone()));
            }
        }
        StmtKind::Delete(targets) => targets.iter().for_each(|t| collect_target(t, info)),
        StmtKind::Global(names) => info.globals.extend(names.iter().cloned()),
        StmtKind::Nonlocal(names) => info.nonlocals.extend(names.iter().cloned()),
        _ => {}
    }
}

fn collect_target(target: &Expr, info: &mut NameInfo) {
    match &target.kind {
        ExprKind::Name(name) => {
            info.locals.insert(name.clone());
        }
        ExprKind::Tuple(elements) | ExprKind::List(elements) => {
            elements.iter().for_each(|e| collect_target(e, info))
        }
        ExprKind::Starred(inner) => collect_target(inner, info),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse::Parser;

    fn first_function(source: &str) -> std::rc::Rc<FunctionDef> {
        let program = Parser::new(source).unwrap().parse_program().unwrap();
        match &program.body[0].kind {
            StmtKind::FunctionDef(def) => def.clone(),
            other => panic!("expected a function, got {:?}", other),
        }
    }

    #[test]
    fn test_analysis_finds_locals() {
        let def = first_function(
            "def f(a, *rest, k=1):\n    x = 1\n    for i, (j, *m) in items:\n        pass\n    global g\n    g = 2\n    def inner():\n        z = 3\n",
        );
        let info = analyze_function(&def);
        for name in ["a", "rest", "k", "x", "i", "j", "m", "inner"] {
            assert!(info.locals.contains(name), "missing {}", name);
        }
        assert!(!info.locals.contains("g"));
        assert!(!info.locals.contains("z"));
        assert!(info.globals.contains("g"));
    }

    #[test]
    fn test_nonlocal_is_not_local() {
        let def = first_function("def f():\n    nonlocal count\n    count += 1\n");
        let info = analyze_function(&def);
        assert!(info.nonlocals.contains("count"));
        assert!(!info.locals.contains("count"));
    }
}
