// Executor for the compiled operation graph
// Statements run against an activation chain mirroring the compile-time
// scope tree; all multi-value expansion and adjustment lives here

use std::rc::Rc;

use smol_str::SmolStr;

use super::call_frame::CallFrame;
use super::{LuaError, LuaResult, LuaVm, MAX_CALL_DEPTH, RuntimeErrorKind};
use crate::ast::{BinOp, UnOp};
use crate::compiler::{CodeBlock, ExprList, ExprOp, FieldOp, Op, Target};
use crate::lua_value::{Activation, LuaClosure, LuaTable, LuaValue};

/// Execution state of one function invocation; `activation` tracks the
/// innermost live scope.
pub(crate) struct ExecScope<'a> {
    pub activation: Rc<Activation>,
    pub closure: &'a Rc<LuaClosure>,
    pub varargs: &'a [LuaValue],
}

impl<'a> ExecScope<'a> {
    fn child(&self, activation: Rc<Activation>) -> ExecScope<'a> {
        ExecScope {
            activation,
            closure: self.closure,
            varargs: self.varargs,
        }
    }
}

/// Non-error control flow escaping a statement.
pub(crate) enum Flow {
    Normal,
    Break,
    Return(Vec<LuaValue>),
    Goto(SmolStr),
}

impl LuaVm {
    /// Invoke a compiled closure. Pushes a call frame for the duration; the
    /// frame pops on every exit path because the body result is captured
    /// before the pop.
    pub(crate) fn call_closure(
        &mut self,
        closure: &Rc<LuaClosure>,
        func_value: LuaValue,
        args: Vec<LuaValue>,
    ) -> LuaResult<Vec<LuaValue>> {
        if self.frames.len() >= MAX_CALL_DEPTH {
            return Err(LuaError::runtime(
                RuntimeErrorKind::StackOverflow,
                "stack overflow",
            ));
        }
        let chunk = Rc::clone(&closure.chunk);
        let activation = Activation::new(chunk.body.arena, closure.captured.clone());
        let mut args = args;
        let varargs: Vec<LuaValue> = if chunk.is_vararg && args.len() > chunk.param_count {
            args.split_off(chunk.param_count)
        } else {
            Vec::new()
        };
        for (index, arg) in args.into_iter().take(chunk.param_count).enumerate() {
            activation.set(0, index as u16, arg);
        }

        self.frames.push(CallFrame::lua(
            chunk.name.clone(),
            chunk.source.clone(),
            chunk.span.line,
            func_value,
            chunk.local_names.clone(),
            chunk.upvalue_names.clone(),
        ));
        let scope = ExecScope {
            activation,
            closure,
            varargs: &varargs,
        };
        let result = self.run_ops(&chunk.body, &scope);
        self.frames.pop();

        match result? {
            Flow::Return(values) => Ok(values),
            // falling off the end yields a single nil
            _ => Ok(vec![LuaValue::Nil]),
        }
    }

    /// Enter a block: fresh activation, then run its operations.
    fn run_block(&mut self, block: &CodeBlock, scope: &ExecScope) -> LuaResult<Flow> {
        let inner = scope.child(Activation::new(
            block.arena,
            Some(Rc::clone(&scope.activation)),
        ));
        self.run_ops(block, &inner)
    }

    /// Run a block's operations in the given scope. A `goto` whose label
    /// lives in this block jumps here; anything else propagates outward.
    fn run_ops(&mut self, block: &CodeBlock, scope: &ExecScope) -> LuaResult<Flow> {
        let mut index = 0;
        while index < block.ops.len() {
            match self.exec_op(&block.ops[index], scope)? {
                Flow::Normal => index += 1,
                Flow::Goto(label) => match block.label_target(&label) {
                    Some(target) => index = target + 1,
                    None => return Ok(Flow::Goto(label)),
                },
                other => return Ok(other),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_op(&mut self, op: &Op, scope: &ExecScope) -> LuaResult<Flow> {
        match op {
            Op::Eval { expr, line } => {
                self.set_line(*line);
                self.eval_expanded(expr, scope)?;
                Ok(Flow::Normal)
            }
            Op::Local { slots, values, line } => {
                self.set_line(*line);
                let values = self.eval_list_adjusted(values, scope, slots.len())?;
                for (slot, value) in slots.iter().zip(values) {
                    scope.activation.set(0, *slot, value);
                }
                Ok(Flow::Normal)
            }
            Op::Assign {
                targets,
                values,
                line,
            } => {
                self.set_line(*line);
                // right-hand side lands in temporaries before any write, so
                // `a, b = b, a` swaps
                let values = self.eval_list_adjusted(values, scope, targets.len())?;
                for (target, value) in targets.iter().zip(values) {
                    self.assign(target, value, scope)?;
                }
                Ok(Flow::Normal)
            }
            Op::Do(body) => self.run_block(body, scope),
            Op::While { cond, body, line } => {
                self.set_line(*line);
                loop {
                    if !self.eval(cond, scope)?.is_truthy() {
                        return Ok(Flow::Normal);
                    }
                    match self.run_block(body, scope)? {
                        Flow::Normal => {}
                        Flow::Break => return Ok(Flow::Normal),
                        other => return Ok(other),
                    }
                }
            }
            Op::Repeat { body, cond, line } => {
                self.set_line(*line);
                loop {
                    // the until expression runs in the iteration's own
                    // activation so it sees the body's locals
                    let inner = scope.child(Activation::new(
                        body.arena,
                        Some(Rc::clone(&scope.activation)),
                    ));
                    match self.run_ops(body, &inner)? {
                        Flow::Normal => {
                            if self.eval(cond, &inner)?.is_truthy() {
                                return Ok(Flow::Normal);
                            }
                        }
                        Flow::Break => return Ok(Flow::Normal),
                        other => return Ok(other),
                    }
                }
            }
            Op::If { arms, orelse, line } => {
                self.set_line(*line);
                for (cond, body) in arms {
                    if self.eval(cond, scope)?.is_truthy() {
                        return self.run_block(body, scope);
                    }
                }
                match orelse {
                    Some(body) => self.run_block(body, scope),
                    None => Ok(Flow::Normal),
                }
            }
            Op::NumericFor {
                start,
                limit,
                step,
                body,
                line,
            } => self.exec_numeric_for(start, limit, step.as_ref(), body, *line, scope),
            Op::GenericFor {
                vars,
                exprs,
                body,
                line,
            } => self.exec_generic_for(*vars, exprs, body, *line, scope),
            Op::Return { values, line } => {
                self.set_line(*line);
                let values = self.eval_list(values, scope)?;
                Ok(Flow::Return(values))
            }
            Op::Break { .. } => Ok(Flow::Break),
            Op::Goto { label, .. } => Ok(Flow::Goto(label.clone())),
            Op::Label { .. } => Ok(Flow::Normal),
        }
    }

    fn exec_numeric_for(
        &mut self,
        start: &ExprOp,
        limit: &ExprOp,
        step: Option<&ExprOp>,
        body: &CodeBlock,
        line: u32,
        scope: &ExecScope,
    ) -> LuaResult<Flow> {
        self.set_line(line);
        let start = self.for_number(start, scope, "initial")?;
        let limit = self.for_number(limit, scope, "limit")?;
        let step = match step {
            Some(expr) => self.for_number(expr, scope, "step")?,
            None => 1.0,
        };

        let mut value = start;
        loop {
            // step 0 is a legal infinite loop, not an error
            let done = if step > 0.0 {
                value > limit
            } else {
                value < limit
            };
            if done {
                return Ok(Flow::Normal);
            }
            let control = scope.child(Activation::new(1, Some(Rc::clone(&scope.activation))));
            control.activation.set(0, 0, LuaValue::Number(value));
            match self.run_block(body, &control)? {
                Flow::Normal => {}
                Flow::Break => return Ok(Flow::Normal),
                other => return Ok(other),
            }
            value += step;
        }
    }

    fn for_number(&mut self, expr: &ExprOp, scope: &ExecScope, what: &str) -> LuaResult<f64> {
        let value = self.eval(expr, scope)?;
        value.as_number().ok_or_else(|| {
            self.runtime_error(
                RuntimeErrorKind::BadArgument,
                format!("'for' {} value must be a number", what),
            )
        })
    }

    fn exec_generic_for(
        &mut self,
        vars: usize,
        exprs: &ExprList,
        body: &CodeBlock,
        line: u32,
        scope: &ExecScope,
    ) -> LuaResult<Flow> {
        self.set_line(line);
        // the iterator triple (f, s, control) is evaluated exactly once
        let mut triple = self.eval_list(exprs, scope)?;
        triple.resize(3, LuaValue::Nil);
        let iterator = triple[0].clone();
        let state = triple[1].clone();
        let mut control = triple[2].clone();

        loop {
            let results =
                self.call_value(&iterator, vec![state.clone(), control.clone()])?;
            let first = results.first().cloned().unwrap_or(LuaValue::Nil);
            if first.is_nil() {
                return Ok(Flow::Normal);
            }
            control = first;

            let inner = scope.child(Activation::new(vars, Some(Rc::clone(&scope.activation))));
            for index in 0..vars {
                let value = results.get(index).cloned().unwrap_or(LuaValue::Nil);
                inner.activation.set(0, index as u16, value);
            }
            match self.run_block(body, &inner)? {
                Flow::Normal => {}
                Flow::Break => return Ok(Flow::Normal),
                other => return Ok(other),
            }
        }
    }

    fn assign(&mut self, target: &Target, value: LuaValue, scope: &ExecScope) -> LuaResult<()> {
        match target {
            Target::Slot { hops, index } => {
                scope.activation.set(*hops, *index, value);
                Ok(())
            }
            Target::Global { name, line } => {
                self.set_line(*line);
                let env = self.effective_env(scope);
                let key = LuaValue::String(Rc::clone(name));
                self.newindex_value(&env, &key, value)
            }
            Target::Index { obj, key, line } => {
                self.set_line(*line);
                let obj = self.eval(obj, scope)?;
                let key = self.eval(key, scope)?;
                self.newindex_value(&obj, &key, value)
            }
        }
    }

    /// Evaluate to exactly one value; multi-value expressions truncate.
    pub(crate) fn eval(&mut self, expr: &ExprOp, scope: &ExecScope) -> LuaResult<LuaValue> {
        match expr {
            ExprOp::Nil => Ok(LuaValue::Nil),
            ExprOp::True => Ok(LuaValue::Boolean(true)),
            ExprOp::False => Ok(LuaValue::Boolean(false)),
            ExprOp::Number(n) => Ok(LuaValue::Number(*n)),
            ExprOp::Str(s) => Ok(LuaValue::String(Rc::clone(s))),
            ExprOp::Slot { hops, index } => Ok(scope.activation.get(*hops, *index)),
            ExprOp::Global { name, line } => {
                self.set_line(*line);
                self.env_get(scope, name)
            }
            ExprOp::Vararg { .. } => {
                Ok(scope.varargs.first().cloned().unwrap_or(LuaValue::Nil))
            }
            ExprOp::Index { obj, key, line } => {
                let obj = self.eval(obj, scope)?;
                let key = self.eval(key, scope)?;
                self.set_line(*line);
                self.index_value(&obj, &key)
            }
            ExprOp::Call { .. } | ExprOp::MethodCall { .. } => {
                let results = self.eval_expanded(expr, scope)?;
                Ok(results.into_iter().next().unwrap_or(LuaValue::Nil))
            }
            ExprOp::Binary { op, lhs, rhs, line } => {
                let lhs = self.eval(lhs, scope)?;
                let rhs = self.eval(rhs, scope)?;
                self.set_line(*line);
                self.eval_binary(*op, &lhs, &rhs)
            }
            ExprOp::And { lhs, rhs } => {
                let lhs = self.eval(lhs, scope)?;
                if lhs.is_truthy() {
                    self.eval(rhs, scope)
                } else {
                    // the deciding operand is returned unchanged, not
                    // coerced to boolean
                    Ok(lhs)
                }
            }
            ExprOp::Or { lhs, rhs } => {
                let lhs = self.eval(lhs, scope)?;
                if lhs.is_truthy() {
                    Ok(lhs)
                } else {
                    self.eval(rhs, scope)
                }
            }
            ExprOp::Unary { op, operand, line } => {
                let operand = self.eval(operand, scope)?;
                self.set_line(*line);
                match op {
                    UnOp::Not => Ok(LuaValue::Boolean(!operand.is_truthy())),
                    other => self.unary(*other, &operand),
                }
            }
            ExprOp::Closure { chunk } => {
                let closure = LuaClosure::new(
                    Rc::clone(chunk),
                    Some(Rc::clone(&scope.activation)),
                );
                Ok(LuaValue::Function(Rc::new(closure)))
            }
            ExprOp::Table { fields, line } => self.eval_table(fields, *line, scope),
            ExprOp::Paren(inner) => self.eval(inner, scope),
        }
    }

    fn eval_binary(&mut self, op: BinOp, lhs: &LuaValue, rhs: &LuaValue) -> LuaResult<LuaValue> {
        match op {
            BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod | BinOp::Pow => {
                self.arith(op, lhs, rhs)
            }
            BinOp::Concat => self.concat_values(lhs, rhs),
            BinOp::Eq => Ok(LuaValue::Boolean(self.values_equal(lhs, rhs)?)),
            BinOp::Ne => Ok(LuaValue::Boolean(!self.values_equal(lhs, rhs)?)),
            BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
                Ok(LuaValue::Boolean(self.compare(op, lhs, rhs)?))
            }
            BinOp::And | BinOp::Or => unreachable!("short-circuit ops compiled away"),
        }
    }

    /// Evaluate an expression that may produce multiple values.
    fn eval_expanded(&mut self, expr: &ExprOp, scope: &ExecScope) -> LuaResult<Vec<LuaValue>> {
        match expr {
            ExprOp::Call { func, args, line } => {
                let func = self.eval(func, scope)?;
                let args = self.eval_args(args, scope)?;
                self.set_line(*line);
                self.call_value(&func, args)
            }
            ExprOp::MethodCall {
                obj,
                name,
                args,
                line,
            } => {
                // the receiver is evaluated once
                let obj = self.eval(obj, scope)?;
                let key = LuaValue::String(Rc::clone(name));
                self.set_line(*line);
                let method = self.index_value(&obj, &key)?;
                let mut call_args = Vec::with_capacity(args.len() + 1);
                call_args.push(obj);
                call_args.extend(self.eval_args(args, scope)?);
                self.call_value(&method, call_args)
            }
            ExprOp::Vararg { .. } => Ok(scope.varargs.to_vec()),
            single => Ok(vec![self.eval(single, scope)?]),
        }
    }

    fn eval_args(&mut self, args: &[ExprOp], scope: &ExecScope) -> LuaResult<Vec<LuaValue>> {
        let mut out = Vec::with_capacity(args.len());
        for (index, arg) in args.iter().enumerate() {
            if index + 1 == args.len() && arg.is_multi() {
                out.extend(self.eval_expanded(arg, scope)?);
            } else {
                out.push(self.eval(arg, scope)?);
            }
        }
        Ok(out)
    }

    /// Evaluate an expression list with the "last expression expands" rule.
    pub(crate) fn eval_list(
        &mut self,
        list: &ExprList,
        scope: &ExecScope,
    ) -> LuaResult<Vec<LuaValue>> {
        self.eval_args(&list.exprs, scope)
    }

    /// Evaluate a list and adjust it to exactly `want` values, truncating or
    /// nil-padding.
    fn eval_list_adjusted(
        &mut self,
        list: &ExprList,
        scope: &ExecScope,
        want: usize,
    ) -> LuaResult<Vec<LuaValue>> {
        let mut values = self.eval_list(list, scope)?;
        values.resize(want, LuaValue::Nil);
        Ok(values)
    }

    fn eval_table(
        &mut self,
        fields: &[FieldOp],
        line: u32,
        scope: &ExecScope,
    ) -> LuaResult<LuaValue> {
        self.set_line(line);
        let table = Rc::new(std::cell::RefCell::new(LuaTable::new()));
        let mut array_index: i64 = 1;
        for (index, field) in fields.iter().enumerate() {
            match field {
                FieldOp::Item(expr) => {
                    if index + 1 == fields.len() && expr.is_multi() {
                        for value in self.eval_expanded(expr, scope)? {
                            let result = table
                                .borrow_mut()
                                .set(LuaValue::Number(array_index as f64), value);
                            result.map_err(|err| self.locate(err))?;
                            array_index += 1;
                        }
                    } else {
                        let value = self.eval(expr, scope)?;
                        let result = table
                            .borrow_mut()
                            .set(LuaValue::Number(array_index as f64), value);
                        result.map_err(|err| self.locate(err))?;
                        array_index += 1;
                    }
                }
                FieldOp::Named(name, expr) => {
                    let value = self.eval(expr, scope)?;
                    let result = table
                        .borrow_mut()
                        .set(LuaValue::String(Rc::clone(name)), value);
                    result.map_err(|err| self.locate(err))?;
                }
                FieldOp::Keyed(key, expr) => {
                    let key = self.eval(key, scope)?;
                    let value = self.eval(expr, scope)?;
                    let result = table.borrow_mut().set(key, value);
                    result.map_err(|err| self.locate(err))?;
                }
            }
        }
        Ok(LuaValue::Table(table))
    }

    /// Resolution of a free name: a dispatch-protected read of the effective
    /// environment, with lazy library loading against the ambient globals.
    fn env_get(&mut self, scope: &ExecScope, name: &Rc<str>) -> LuaResult<LuaValue> {
        let env = self.effective_env(scope);
        let key = LuaValue::String(Rc::clone(name));
        let value = self.index_value(&env, &key)?;
        if !value.is_nil() {
            return Ok(value);
        }
        // a miss on the ambient globals may name a library that has not
        // been loaded yet
        let is_ambient = match (&env, &self.globals) {
            (LuaValue::Table(env_table), LuaValue::Table(globals)) => {
                Rc::ptr_eq(env_table, globals)
            }
            _ => false,
        };
        if is_ambient {
            if let Some(library) = self.load_library(name.as_ref())? {
                return Ok(library);
            }
        }
        Ok(value)
    }

    /// The table global resolution goes through: the closure's `setfenv`
    /// override when installed, the ambient globals otherwise.
    pub(crate) fn effective_env(&self, scope: &ExecScope) -> LuaValue {
        scope
            .closure
            .env
            .borrow()
            .clone()
            .unwrap_or_else(|| self.globals.clone())
    }
}
