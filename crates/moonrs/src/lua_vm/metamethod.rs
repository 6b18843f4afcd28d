// Metamethod dispatch protocol
// Every operation runs TryBuiltin -> TryMetatable -> Resolved | Error and
// never re-enters the builtin path after falling through; a metamethod that
// triggers the same operation on another value starts a fresh dispatch

use std::rc::Rc;

use super::call_frame::CallFrame;
use super::{LuaError, LuaResult, LuaVm, MAX_CALL_DEPTH, RuntimeErrorKind};
use crate::ast::{BinOp, UnOp};
use crate::lua_value::{LuaValue, LuaValueKind, number_to_string};

impl LuaVm {
    /// Raw metatable slot lookup for a value; no dispatch of its own.
    pub(crate) fn metamethod_of(&self, value: &LuaValue, name: &LuaValue) -> Option<LuaValue> {
        let metatable = match value {
            LuaValue::Table(table) => table.borrow().metatable(),
            LuaValue::String(_) => self.string_metatable.clone(),
            _ => None,
        }?;
        let handler = metatable.as_table()?.borrow().get(name)?;
        if handler.is_nil() { None } else { Some(handler) }
    }

    /// Invoke a metamethod behind a synthetic frame carrying its name, so a
    /// failure inside the handler reads as e.g. "in '__index'" rather than
    /// an anonymous internal call.
    pub(crate) fn call_metamethod(
        &mut self,
        name: &'static str,
        handler: LuaValue,
        args: Vec<LuaValue>,
    ) -> LuaResult<Vec<LuaValue>> {
        self.frames.push(CallFrame::metamethod(name));
        let result = self.call_value(&handler, args);
        self.frames.pop();
        result
    }

    /// The Index operation: `obj[key]` with full fallback semantics.
    pub fn index_value(&mut self, obj: &LuaValue, key: &LuaValue) -> LuaResult<LuaValue> {
        if let LuaValue::Table(table) = obj {
            let found = table.borrow().get(key);
            if let Some(value) = found {
                return Ok(value);
            }
            // miss: __index function or table, then the parent link used by
            // scoped environments, then nil
            if let Some(handler) = self.metamethod_of(obj, &self.meta.index.clone()) {
                return match handler {
                    LuaValue::Table(_) => self.index_value(&handler, key),
                    _ => {
                        let results =
                            self.call_metamethod("__index", handler, vec![obj.clone(), key.clone()])?;
                        Ok(results.into_iter().next().unwrap_or(LuaValue::Nil))
                    }
                };
            }
            let parent = table.borrow().parent().cloned();
            if let Some(parent) = parent {
                return self.index_value(&LuaValue::Table(parent), key);
            }
            return Ok(LuaValue::Nil);
        }

        if let Some(handler) = self.metamethod_of(obj, &self.meta.index.clone()) {
            return match handler {
                LuaValue::Table(_) => self.index_value(&handler, key),
                _ => {
                    let results =
                        self.call_metamethod("__index", handler, vec![obj.clone(), key.clone()])?;
                    Ok(results.into_iter().next().unwrap_or(LuaValue::Nil))
                }
            };
        }
        Err(self.runtime_error(
            RuntimeErrorKind::UndefinedOperation,
            format!("attempt to index a {} value", obj.type_name()),
        ))
    }

    /// The NewIndex operation: `obj[key] = value`.
    pub fn newindex_value(
        &mut self,
        obj: &LuaValue,
        key: &LuaValue,
        value: LuaValue,
    ) -> LuaResult<()> {
        if let LuaValue::Table(table) = obj {
            let present = table.borrow().has(key);
            if present {
                let result = table.borrow_mut().set(key.clone(), value);
                return result.map_err(|err| self.locate(err));
            }
            if let Some(handler) = self.metamethod_of(obj, &self.meta.newindex.clone()) {
                return match handler {
                    LuaValue::Table(_) => self.newindex_value(&handler, key, value),
                    _ => {
                        self.call_metamethod(
                            "__newindex",
                            handler,
                            vec![obj.clone(), key.clone(), value],
                        )?;
                        Ok(())
                    }
                };
            }
            let result = table.borrow_mut().set(key.clone(), value);
            return result.map_err(|err| self.locate(err));
        }

        if let Some(handler) = self.metamethod_of(obj, &self.meta.newindex.clone()) {
            return match handler {
                LuaValue::Table(_) => self.newindex_value(&handler, key, value),
                _ => {
                    self.call_metamethod(
                        "__newindex",
                        handler,
                        vec![obj.clone(), key.clone(), value],
                    )?;
                    Ok(())
                }
            };
        }
        Err(self.runtime_error(
            RuntimeErrorKind::UndefinedOperation,
            format!("attempt to index a {} value", obj.type_name()),
        ))
    }

    /// The Call operation: functions call directly, anything else goes
    /// through `__call` with the callee prepended to the arguments.
    pub fn call_value(
        &mut self,
        func: &LuaValue,
        args: Vec<LuaValue>,
    ) -> LuaResult<Vec<LuaValue>> {
        match func {
            LuaValue::Function(closure) => {
                let closure = Rc::clone(closure);
                self.call_closure(&closure, func.clone(), args)
            }
            LuaValue::Native(native) => {
                if self.frames.len() >= MAX_CALL_DEPTH {
                    return Err(LuaError::runtime(
                        RuntimeErrorKind::StackOverflow,
                        "stack overflow",
                    ));
                }
                self.frames.push(CallFrame::native(native.name, func.clone()));
                let result = (native.func)(self, args);
                self.frames.pop();
                result
            }
            other => {
                if let Some(handler) = self.metamethod_of(other, &self.meta.call.clone()) {
                    let mut call_args = Vec::with_capacity(args.len() + 1);
                    call_args.push(other.clone());
                    call_args.extend(args);
                    return self.call_metamethod("__call", handler, call_args);
                }
                Err(self.runtime_error(
                    RuntimeErrorKind::UndefinedOperation,
                    format!("attempt to call a {} value", other.type_name()),
                ))
            }
        }
    }

    /// Binary arithmetic: builtin number semantics (numeric strings coerce),
    /// then the operator's metamethod on either operand.
    pub fn arith(&mut self, op: BinOp, lhs: &LuaValue, rhs: &LuaValue) -> LuaResult<LuaValue> {
        if let (Some(a), Some(b)) = (lhs.coerce_number(), rhs.coerce_number()) {
            let result = match op {
                BinOp::Add => a + b,
                BinOp::Sub => a - b,
                BinOp::Mul => a * b,
                BinOp::Div => a / b,
                BinOp::Mod => a - (a / b).floor() * b,
                BinOp::Pow => a.powf(b),
                _ => unreachable!("non-arithmetic operator in arith"),
            };
            return Ok(LuaValue::Number(result));
        }
        let (name, key) = self.arith_event(op);
        if let Some(handler) = self
            .metamethod_of(lhs, &key)
            .or_else(|| self.metamethod_of(rhs, &key))
        {
            let results =
                self.call_metamethod(name, handler, vec![lhs.clone(), rhs.clone()])?;
            return Ok(results.into_iter().next().unwrap_or(LuaValue::Nil));
        }
        let offender = if lhs.coerce_number().is_none() { lhs } else { rhs };
        Err(self.runtime_error(
            RuntimeErrorKind::UndefinedOperation,
            format!(
                "attempt to perform arithmetic on a {} value",
                offender.type_name()
            ),
        ))
    }

    fn arith_event(&self, op: BinOp) -> (&'static str, LuaValue) {
        match op {
            BinOp::Add => ("__add", self.meta.add.clone()),
            BinOp::Sub => ("__sub", self.meta.sub.clone()),
            BinOp::Mul => ("__mul", self.meta.mul.clone()),
            BinOp::Div => ("__div", self.meta.div.clone()),
            BinOp::Mod => ("__mod", self.meta.modulo.clone()),
            BinOp::Pow => ("__pow", self.meta.pow.clone()),
            _ => unreachable!("non-arithmetic operator"),
        }
    }

    /// Equality: raw equality first; `__eq` is only consulted when both
    /// operands are tables that are not raw-equal.
    pub fn values_equal(&mut self, lhs: &LuaValue, rhs: &LuaValue) -> LuaResult<bool> {
        if lhs.lua_eq(rhs) {
            return Ok(true);
        }
        if lhs.kind() == LuaValueKind::Table && rhs.kind() == LuaValueKind::Table {
            let key = self.meta.eq.clone();
            if let Some(handler) = self
                .metamethod_of(lhs, &key)
                .or_else(|| self.metamethod_of(rhs, &key))
            {
                let results =
                    self.call_metamethod("__eq", handler, vec![lhs.clone(), rhs.clone()])?;
                return Ok(results.first().is_some_and(|v| v.is_truthy()));
            }
        }
        Ok(false)
    }

    /// Ordering: numbers with numbers, strings with strings, otherwise
    /// `__lt`/`__le`. `>` and `>=` swap their operands.
    pub fn compare(&mut self, op: BinOp, lhs: &LuaValue, rhs: &LuaValue) -> LuaResult<bool> {
        let (op, lhs, rhs) = match op {
            BinOp::Gt => (BinOp::Lt, rhs, lhs),
            BinOp::Ge => (BinOp::Le, rhs, lhs),
            other => (other, lhs, rhs),
        };
        match (lhs, rhs) {
            (LuaValue::Number(a), LuaValue::Number(b)) => Ok(match op {
                BinOp::Lt => a < b,
                _ => a <= b,
            }),
            (LuaValue::String(a), LuaValue::String(b)) => Ok(match op {
                BinOp::Lt => a < b,
                _ => a <= b,
            }),
            _ => {
                let (name, key) = match op {
                    BinOp::Lt => ("__lt", self.meta.lt.clone()),
                    _ => ("__le", self.meta.le.clone()),
                };
                if let Some(handler) = self
                    .metamethod_of(lhs, &key)
                    .or_else(|| self.metamethod_of(rhs, &key))
                {
                    let results =
                        self.call_metamethod(name, handler, vec![lhs.clone(), rhs.clone()])?;
                    return Ok(results.first().is_some_and(|v| v.is_truthy()));
                }
                Err(self.runtime_error(
                    RuntimeErrorKind::UndefinedOperation,
                    format!(
                        "attempt to compare {} with {}",
                        lhs.type_name(),
                        rhs.type_name()
                    ),
                ))
            }
        }
    }

    /// Concatenation: strings and numbers concatenate directly, everything
    /// else goes through `__concat`.
    pub fn concat_values(&mut self, lhs: &LuaValue, rhs: &LuaValue) -> LuaResult<LuaValue> {
        if let (Some(a), Some(b)) = (lhs.coerce_string(), rhs.coerce_string()) {
            return Ok(LuaValue::from(format!("{}{}", a, b)));
        }
        let key = self.meta.concat.clone();
        if let Some(handler) = self
            .metamethod_of(lhs, &key)
            .or_else(|| self.metamethod_of(rhs, &key))
        {
            let results =
                self.call_metamethod("__concat", handler, vec![lhs.clone(), rhs.clone()])?;
            return Ok(results.into_iter().next().unwrap_or(LuaValue::Nil));
        }
        let offender = if lhs.coerce_string().is_none() { lhs } else { rhs };
        Err(self.runtime_error(
            RuntimeErrorKind::UndefinedOperation,
            format!(
                "attempt to concatenate a {} value",
                offender.type_name()
            ),
        ))
    }

    /// Unary operations. `not` is pure control flow and never arrives here.
    pub fn unary(&mut self, op: UnOp, operand: &LuaValue) -> LuaResult<LuaValue> {
        match op {
            UnOp::Neg => {
                if let Some(n) = operand.coerce_number() {
                    return Ok(LuaValue::Number(-n));
                }
                if let Some(handler) = self.metamethod_of(operand, &self.meta.unm.clone()) {
                    let results = self.call_metamethod(
                        "__unm",
                        handler,
                        vec![operand.clone(), operand.clone()],
                    )?;
                    return Ok(results.into_iter().next().unwrap_or(LuaValue::Nil));
                }
                Err(self.runtime_error(
                    RuntimeErrorKind::UndefinedOperation,
                    format!(
                        "attempt to perform arithmetic on a {} value",
                        operand.type_name()
                    ),
                ))
            }
            UnOp::Len => match operand {
                LuaValue::String(s) => Ok(LuaValue::Number(s.len() as f64)),
                LuaValue::Table(table) => {
                    if let Some(handler) = self.metamethod_of(operand, &self.meta.len.clone()) {
                        let results =
                            self.call_metamethod("__len", handler, vec![operand.clone()])?;
                        return Ok(results.into_iter().next().unwrap_or(LuaValue::Nil));
                    }
                    Ok(LuaValue::Number(table.borrow().length() as f64))
                }
                other => Err(self.runtime_error(
                    RuntimeErrorKind::UndefinedOperation,
                    format!("attempt to get length of a {} value", other.type_name()),
                )),
            },
            UnOp::Not => Ok(LuaValue::Boolean(!operand.is_truthy())),
        }
    }

    /// `tostring` semantics: `__tostring` when present, raw form otherwise.
    pub fn tostring_value(&mut self, value: &LuaValue) -> LuaResult<String> {
        if let Some(handler) = self.metamethod_of(value, &self.meta.tostring.clone()) {
            let results = self.call_metamethod("__tostring", handler, vec![value.clone()])?;
            let first = results.into_iter().next().unwrap_or(LuaValue::Nil);
            return match first {
                LuaValue::String(s) => Ok(s.to_string()),
                LuaValue::Number(n) => Ok(number_to_string(n)),
                other => Err(self.runtime_error(
                    RuntimeErrorKind::BadArgument,
                    format!("'__tostring' must return a string (got {})", other.type_name()),
                )),
            };
        }
        Ok(value.display_raw())
    }
}
