// Expression compilation

use std::rc::Rc;

use super::code::{ExprList, ExprOp, FieldOp};
use super::{FuncCompiler, Resolved};
use crate::ast::{BinOp, Expr, TableField};
use crate::lua_vm::LuaResult;

impl<'a> FuncCompiler<'a> {
    pub(crate) fn compile_expr_list(&mut self, exprs: &[Expr]) -> LuaResult<ExprList> {
        let exprs = exprs
            .iter()
            .map(|expr| self.compile_expr(expr))
            .collect::<LuaResult<Vec<_>>>()?;
        Ok(ExprList { exprs })
    }

    pub(crate) fn compile_expr(&mut self, expr: &Expr) -> LuaResult<ExprOp> {
        let op = match expr {
            Expr::Nil(_) => ExprOp::Nil,
            Expr::True(_) => ExprOp::True,
            Expr::False(_) => ExprOp::False,
            Expr::Number(n, _) => ExprOp::Number(*n),
            Expr::Str(s, _) => ExprOp::Str(Rc::clone(s)),
            Expr::Vararg(span) => {
                if !self.is_vararg {
                    return Err(self.error(
                        "cannot use '...' outside a vararg function",
                        span.line,
                    ));
                }
                ExprOp::Vararg { line: span.line }
            }
            Expr::Function(body, span) => {
                let name = format!("anonymous:{}", span.line);
                ExprOp::Closure {
                    chunk: self.compile_function(&name, body)?,
                }
            }
            Expr::Name(name, span) => match self.resolve_name(name) {
                Resolved::Local { hops, slot } | Resolved::Upvalue { hops, slot } => {
                    ExprOp::Slot { hops, index: slot }
                }
                Resolved::Global => ExprOp::Global {
                    name: Rc::from(name.as_str()),
                    line: span.line,
                },
            },
            Expr::Index { obj, key, span } => ExprOp::Index {
                obj: Box::new(self.compile_expr(obj)?),
                key: Box::new(self.compile_expr(key)?),
                line: span.line,
            },
            Expr::Call { func, args, span } => ExprOp::Call {
                func: Box::new(self.compile_expr(func)?),
                args: self.compile_args(args)?,
                line: span.line,
            },
            Expr::MethodCall {
                obj,
                name,
                args,
                span,
            } => ExprOp::MethodCall {
                obj: Box::new(self.compile_expr(obj)?),
                name: Rc::from(name.as_str()),
                args: self.compile_args(args)?,
                line: span.line,
            },
            Expr::Binary { op, lhs, rhs, span } => {
                let lhs = Box::new(self.compile_expr(lhs)?);
                let rhs = Box::new(self.compile_expr(rhs)?);
                match op {
                    // control flow, never dispatched as an operator
                    BinOp::And => ExprOp::And { lhs, rhs },
                    BinOp::Or => ExprOp::Or { lhs, rhs },
                    other => ExprOp::Binary {
                        op: *other,
                        lhs,
                        rhs,
                        line: span.line,
                    },
                }
            }
            Expr::Unary { op, operand, span } => ExprOp::Unary {
                op: *op,
                operand: Box::new(self.compile_expr(operand)?),
                line: span.line,
            },
            Expr::Table { fields, span } => {
                let fields = fields
                    .iter()
                    .map(|field| self.compile_field(field))
                    .collect::<LuaResult<Vec<_>>>()?;
                ExprOp::Table {
                    fields,
                    line: span.line,
                }
            }
            Expr::Paren(inner) => {
                let inner = self.compile_expr(inner)?;
                if inner.is_multi() {
                    ExprOp::Paren(Box::new(inner))
                } else {
                    inner
                }
            }
        };
        Ok(op)
    }

    fn compile_args(&mut self, args: &[Expr]) -> LuaResult<Vec<ExprOp>> {
        args.iter().map(|arg| self.compile_expr(arg)).collect()
    }

    fn compile_field(&mut self, field: &TableField) -> LuaResult<FieldOp> {
        Ok(match field {
            TableField::Item(expr) => FieldOp::Item(self.compile_expr(expr)?),
            TableField::Named(name, expr) => {
                FieldOp::Named(Rc::from(name.as_str()), self.compile_expr(expr)?)
            }
            TableField::Keyed(key, value) => {
                FieldOp::Keyed(self.compile_expr(key)?, self.compile_expr(value)?)
            }
        })
    }
}
