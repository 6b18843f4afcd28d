// Statement compilation

use std::rc::Rc;

use smol_str::SmolStr;

use super::code::{CodeBlock, ExprList, Op, Target};
use super::scope::{self, ScopeKind};
use super::{ExprOp, FuncCompiler};
use crate::ast::{Block, Expr, Stat};
use crate::lua_vm::LuaResult;

impl<'a> FuncCompiler<'a> {
    pub(crate) fn compile_stat(
        &mut self,
        stat: &Stat,
        ops: &mut Vec<Op>,
        labels: &mut Vec<(SmolStr, usize)>,
    ) -> LuaResult<()> {
        match stat {
            Stat::Local {
                names,
                values,
                span,
            } => {
                // values see the state before the declarations, so
                // `local x = x` reads the outer x
                let values = self.compile_expr_list(values)?;
                let slots = names
                    .iter()
                    .map(|name| self.scope.borrow_mut().declare_local(name))
                    .collect();
                ops.push(Op::Local {
                    slots,
                    values,
                    line: span.line,
                });
            }
            Stat::Assign {
                targets,
                values,
                span,
            } => {
                let targets = targets
                    .iter()
                    .map(|target| self.compile_target(target))
                    .collect::<LuaResult<Vec<_>>>()?;
                let values = self.compile_expr_list(values)?;
                ops.push(Op::Assign {
                    targets,
                    values,
                    line: span.line,
                });
            }
            Stat::Call { expr, span } => {
                let expr = self.compile_expr(expr)?;
                ops.push(Op::Eval {
                    expr,
                    line: span.line,
                });
            }
            Stat::Do { body, .. } => {
                let body = self.compile_block(body, ScopeKind::Block)?;
                ops.push(Op::Do(body));
            }
            Stat::While { cond, body, span } => {
                let cond = self.compile_expr(cond)?;
                let body = self.compile_block(body, ScopeKind::Loop)?;
                ops.push(Op::While {
                    cond,
                    body,
                    line: span.line,
                });
            }
            Stat::Repeat { body, until, span } => {
                let op = self.compile_repeat(body, until, span.line)?;
                ops.push(op);
            }
            Stat::If { arms, orelse, span } => {
                let mut compiled_arms = Vec::with_capacity(arms.len());
                for (cond, block) in arms {
                    let cond = self.compile_expr(cond)?;
                    let block = self.compile_block(block, ScopeKind::Block)?;
                    compiled_arms.push((cond, block));
                }
                let orelse = match orelse {
                    Some(block) => Some(self.compile_block(block, ScopeKind::Block)?),
                    None => None,
                };
                ops.push(Op::If {
                    arms: compiled_arms,
                    orelse,
                    line: span.line,
                });
            }
            Stat::NumericFor {
                var,
                start,
                limit,
                step,
                body,
                span,
            } => {
                // bounds are evaluated once, in the enclosing scope
                let start = self.compile_expr(start)?;
                let limit = self.compile_expr(limit)?;
                let step = match step {
                    Some(step) => Some(self.compile_expr(step)?),
                    None => None,
                };
                let parent = Rc::clone(&self.scope);
                self.scope = scope::Scope::child(Rc::clone(&parent), ScopeKind::Loop);
                self.scope.borrow_mut().declare_local(var);
                let body = self.compile_block(body, ScopeKind::Block)?;
                self.scope = parent;
                ops.push(Op::NumericFor {
                    start,
                    limit,
                    step,
                    body,
                    line: span.line,
                });
            }
            Stat::GenericFor {
                names,
                exprs,
                body,
                span,
            } => {
                let exprs = self.compile_expr_list(exprs)?;
                let parent = Rc::clone(&self.scope);
                self.scope = scope::Scope::child(Rc::clone(&parent), ScopeKind::Loop);
                for name in names {
                    self.scope.borrow_mut().declare_local(name);
                }
                let body = self.compile_block(body, ScopeKind::Block)?;
                self.scope = parent;
                ops.push(Op::GenericFor {
                    vars: names.len(),
                    exprs,
                    body,
                    line: span.line,
                });
            }
            Stat::Function { target, body, span } => {
                let chunk = self.compile_function(&target.dotted(), body)?;
                let closure = ExprOp::Closure { chunk };
                let assign_target = self.compile_function_target(target, span.line)?;
                ops.push(Op::Assign {
                    targets: vec![assign_target],
                    values: ExprList {
                        exprs: vec![closure],
                    },
                    line: span.line,
                });
            }
            Stat::LocalFunction { name, body, span } => {
                // the name is declared before the body compiles, so the
                // function can call itself
                let slot = self.scope.borrow_mut().declare_local(name);
                let chunk = self.compile_function(name, body)?;
                ops.push(Op::Local {
                    slots: vec![slot],
                    values: ExprList {
                        exprs: vec![ExprOp::Closure { chunk }],
                    },
                    line: span.line,
                });
            }
            Stat::Return { exprs, span } => {
                let values = self.compile_expr_list(exprs)?;
                ops.push(Op::Return {
                    values,
                    line: span.line,
                });
            }
            Stat::Break { span } => {
                if !scope::break_allowed(&self.scope) {
                    return Err(self.error("'break' outside a loop", span.line));
                }
                ops.push(Op::Break { line: span.line });
            }
            Stat::Goto { label, span } => {
                if !scope::label_visible(&self.scope, label) {
                    return Err(self.error(
                        format!("no visible label '{}' for goto", label),
                        span.line,
                    ));
                }
                ops.push(Op::Goto {
                    label: label.clone(),
                    line: span.line,
                });
            }
            Stat::Label { name, .. } => {
                labels.push((name.clone(), ops.len()));
                ops.push(Op::Label { name: name.clone() });
            }
        }
        Ok(())
    }

    /// `repeat` keeps its body scope open for the `until` expression, which
    /// by Lua rules sees the body's locals.
    fn compile_repeat(&mut self, body: &Block, until: &Expr, line: u32) -> LuaResult<Op> {
        let parent = Rc::clone(&self.scope);
        self.scope = scope::Scope::child(Rc::clone(&parent), ScopeKind::Loop);
        let result = (|| {
            self.prescan_labels_of(body);
            let mut ops = Vec::new();
            let mut labels = Vec::new();
            for stat in &body.stats {
                self.compile_stat(stat, &mut ops, &mut labels)?;
            }
            let cond = self.compile_expr(until)?;
            let arena = self.scope.borrow().slot_count();
            Ok(Op::Repeat {
                body: CodeBlock { ops, arena, labels },
                cond,
                line,
            })
        })();
        self.scope = parent;
        result
    }

    fn prescan_labels_of(&mut self, block: &Block) {
        for stat in &block.stats {
            if let Stat::Label { name, .. } = stat {
                self.scope.borrow_mut().declare_label(name);
            }
        }
    }

    pub(crate) fn compile_target(&mut self, expr: &Expr) -> LuaResult<Target> {
        match expr {
            Expr::Name(name, span) => Ok(match self.resolve_name(name) {
                super::Resolved::Local { hops, slot }
                | super::Resolved::Upvalue { hops, slot } => Target::Slot { hops, index: slot },
                super::Resolved::Global => Target::Global {
                    name: Rc::from(name.as_str()),
                    line: span.line,
                },
            }),
            Expr::Index { obj, key, span } => Ok(Target::Index {
                obj: self.compile_expr(obj)?,
                key: self.compile_expr(key)?,
                line: span.line,
            }),
            other => Err(self.error("cannot assign to this expression", other.span().line)),
        }
    }

    /// The assignment target of a `function name.a.b` statement.
    fn compile_function_target(
        &mut self,
        target: &crate::ast::FunctionTarget,
        line: u32,
    ) -> LuaResult<Target> {
        let base = match self.resolve_name(&target.base) {
            super::Resolved::Local { hops, slot }
            | super::Resolved::Upvalue { hops, slot } => ExprOp::Slot { hops, index: slot },
            super::Resolved::Global => {
                if target.fields.is_empty() {
                    return Ok(Target::Global {
                        name: Rc::from(target.base.as_str()),
                        line,
                    });
                }
                ExprOp::Global {
                    name: Rc::from(target.base.as_str()),
                    line,
                }
            }
        };
        if target.fields.is_empty() {
            // base resolved to a slot
            return self.compile_target(&Expr::Name(
                target.base.clone(),
                crate::ast::Span::new(line),
            ));
        }
        let mut obj = base;
        for field in &target.fields[..target.fields.len() - 1] {
            obj = ExprOp::Index {
                obj: Box::new(obj),
                key: Box::new(ExprOp::Str(Rc::from(field.as_str()))),
                line,
            };
        }
        let last = target.fields.last().expect("non-empty field list");
        Ok(Target::Index {
            obj,
            key: ExprOp::Str(Rc::from(last.as_str())),
            line,
        })
    }
}
