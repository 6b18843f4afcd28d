// Basic library (_G global functions)
// Implements: print, type, assert, error, tonumber, tostring, select,
// ipairs, pairs, next, pcall, xpcall, getmetatable, setmetatable, rawget,
// rawset, rawlen, rawequal, unpack, setfenv, getfenv, collectgarbage

use crate::lib_registry::{LibraryModule, arg, check_number, check_table};
use crate::lua_value::{LuaValue, NativeFunction};
use crate::lua_vm::{FrameKind, LuaError, LuaResult, LuaVm, RuntimeErrorKind};

pub fn create_basic_lib() -> LibraryModule {
    let module = crate::lib_module!("_G", {
        "print" => lua_print,
        "type" => lua_type,
        "assert" => lua_assert,
        "error" => lua_error,
        "tonumber" => lua_tonumber,
        "tostring" => lua_tostring,
        "select" => lua_select,
        "ipairs" => lua_ipairs,
        "pairs" => lua_pairs,
        "next" => lua_next,
        "pcall" => lua_pcall,
        "xpcall" => lua_xpcall,
        "getmetatable" => lua_getmetatable,
        "setmetatable" => lua_setmetatable,
        "rawget" => lua_rawget,
        "rawset" => lua_rawset,
        "rawlen" => lua_rawlen,
        "rawequal" => lua_rawequal,
        "unpack" => lua_unpack,
        "setfenv" => lua_setfenv,
        "getfenv" => lua_getfenv,
        "collectgarbage" => lua_collectgarbage,
    });

    module.with_value("_VERSION", |_vm| LuaValue::from("Lua 5.1"))
}

/// print(...) - tostring each argument, tab-separated, to stdout.
fn lua_print(vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let mut parts = Vec::with_capacity(args.len());
    for value in &args {
        parts.push(vm.tostring_value(value)?);
    }
    println!("{}", parts.join("\t"));
    Ok(Vec::new())
}

fn lua_type(vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    if args.is_empty() {
        return Err(vm.runtime_error(
            RuntimeErrorKind::BadArgument,
            "bad argument #1 to 'type' (value expected)",
        ));
    }
    Ok(vec![LuaValue::from(args[0].type_name())])
}

/// assert(v [, message]) - raise when v is falsy, pass everything through
/// otherwise.
fn lua_assert(_vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    if arg(&args, 0).is_truthy() {
        return Ok(args);
    }
    let message = match args.get(1) {
        Some(custom) => custom.clone(),
        None => LuaValue::from("assertion failed!"),
    };
    Err(LuaError::User {
        value: message,
        level: 1,
    })
}

/// error(value [, level]) - raise with an arbitrary payload. String payloads
/// gain a `source:line:` prefix attributed `level` frames up.
fn lua_error(vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let mut value = arg(&args, 0);
    let level = arg(&args, 1).as_number().unwrap_or(1.0).max(0.0) as u32;
    if level > 0 {
        if let LuaValue::String(message) = &value {
            if let Some(frame) = vm.frame_at_level(level as usize) {
                if frame.kind == FrameKind::Lua && frame.line > 0 {
                    value = LuaValue::from(format!(
                        "{}:{}: {}",
                        frame.source, frame.line, message
                    ));
                }
            }
        }
    }
    Err(LuaError::User { value, level })
}

fn lua_tonumber(vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let value = arg(&args, 0);
    match args.get(1) {
        None | Some(LuaValue::Nil) => Ok(vec![
            value
                .coerce_number()
                .map(LuaValue::Number)
                .unwrap_or(LuaValue::Nil),
        ]),
        Some(_) => {
            let base = check_number(vm, &args, 1, "tonumber")? as u32;
            if !(2..=36).contains(&base) {
                return Err(vm.runtime_error(
                    RuntimeErrorKind::BadArgument,
                    "bad argument #2 to 'tonumber' (base out of range)",
                ));
            }
            let text = match value.as_str() {
                Some(text) => text.trim().to_lowercase(),
                None => {
                    return Err(vm.runtime_error(
                        RuntimeErrorKind::BadArgument,
                        "bad argument #1 to 'tonumber' (string expected)",
                    ));
                }
            };
            Ok(vec![
                i64::from_str_radix(&text, base)
                    .map(|n| LuaValue::Number(n as f64))
                    .unwrap_or(LuaValue::Nil),
            ])
        }
    }
}

fn lua_tostring(vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let text = vm.tostring_value(&arg(&args, 0))?;
    Ok(vec![LuaValue::from(text)])
}

/// select('#', ...) and select(n, ...).
fn lua_select(vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    match arg(&args, 0) {
        LuaValue::String(s) if &*s == "#" => {
            Ok(vec![LuaValue::Number((args.len() - 1) as f64)])
        }
        value => {
            let n = value.as_number().ok_or_else(|| {
                vm.runtime_error(
                    RuntimeErrorKind::BadArgument,
                    "bad argument #1 to 'select' (number expected)",
                )
            })?;
            if n < 1.0 {
                return Err(vm.runtime_error(
                    RuntimeErrorKind::BadArgument,
                    "bad argument #1 to 'select' (index out of range)",
                ));
            }
            let start = (n as usize).min(args.len());
            Ok(args[start..].to_vec())
        }
    }
}

/// Stateless ipairs iterator: (t, i) -> i + 1, t[i + 1].
fn lua_inext(vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let table = check_table(vm, &args, 0, "ipairs iterator")?;
    let next = check_number(vm, &args, 1, "ipairs iterator")? + 1.0;
    let value = table
        .borrow()
        .get(&LuaValue::Number(next))
        .unwrap_or(LuaValue::Nil);
    if value.is_nil() {
        Ok(vec![LuaValue::Nil])
    } else {
        Ok(vec![LuaValue::Number(next), value])
    }
}

fn lua_ipairs(vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let table = check_table(vm, &args, 0, "ipairs")?;
    Ok(vec![
        LuaValue::Native(NativeFunction {
            name: "ipairs iterator",
            func: lua_inext,
        }),
        LuaValue::Table(table),
        LuaValue::Number(0.0),
    ])
}

fn lua_pairs(vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let table = check_table(vm, &args, 0, "pairs")?;
    Ok(vec![
        LuaValue::Native(NativeFunction {
            name: "next",
            func: lua_next,
        }),
        LuaValue::Table(table),
        LuaValue::Nil,
    ])
}

fn lua_next(vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let table = check_table(vm, &args, 0, "next")?;
    let key = arg(&args, 1);
    let entry = {
        let borrowed = table.borrow();
        borrowed.next(&key).map_err(|err| vm.locate(err))?
    };
    match entry {
        Some((key, value)) => Ok(vec![key, value]),
        None => Ok(vec![LuaValue::Nil]),
    }
}

/// pcall(f, ...) - call under protection; errors become (false, payload).
fn lua_pcall(vm: &mut LuaVm, mut args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    if args.is_empty() {
        return Err(vm.runtime_error(
            RuntimeErrorKind::BadArgument,
            "bad argument #1 to 'pcall' (value expected)",
        ));
    }
    let func = args.remove(0);
    let (ok, mut results) = vm.protected_call(&func, args)?;
    let mut out = vec![LuaValue::Boolean(ok)];
    out.append(&mut results);
    Ok(out)
}

/// xpcall(f, handler, ...) - protected call with an error handler.
fn lua_xpcall(vm: &mut LuaVm, mut args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    if args.len() < 2 {
        return Err(vm.runtime_error(
            RuntimeErrorKind::BadArgument,
            "bad argument #2 to 'xpcall' (value expected)",
        ));
    }
    let func = args.remove(0);
    let handler = args.remove(0);
    let (ok, mut results) = vm.protected_call_with_handler(&func, args, &handler)?;
    let mut out = vec![LuaValue::Boolean(ok)];
    out.append(&mut results);
    Ok(out)
}

/// getmetatable(v) - honors the __metatable protection field.
fn lua_getmetatable(vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let value = arg(&args, 0);
    let metatable = match &value {
        LuaValue::Table(table) => table.borrow().metatable(),
        LuaValue::String(_) => vm.string_metatable.clone(),
        _ => None,
    };
    let Some(metatable) = metatable else {
        return Ok(vec![LuaValue::Nil]);
    };
    if let Some(table) = metatable.as_table() {
        if let Some(protected) = table.borrow().get(&vm.meta.metatable) {
            return Ok(vec![protected]);
        }
    }
    Ok(vec![metatable])
}

fn lua_setmetatable(vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let table = check_table(vm, &args, 0, "setmetatable")?;
    let metatable = arg(&args, 1);
    if !matches!(metatable, LuaValue::Nil | LuaValue::Table(_)) {
        return Err(vm.runtime_error(
            RuntimeErrorKind::BadArgument,
            "bad argument #2 to 'setmetatable' (nil or table expected)",
        ));
    }
    let current = table.borrow().metatable();
    if let Some(current) = current {
        if let Some(meta) = current.as_table() {
            if meta.borrow().has(&vm.meta.metatable) {
                return Err(vm.runtime_error(
                    RuntimeErrorKind::BadArgument,
                    "cannot change a protected metatable",
                ));
            }
        }
    }
    table.borrow_mut().set_metatable(match metatable {
        LuaValue::Nil => None,
        other => Some(other),
    });
    Ok(vec![LuaValue::Table(table)])
}

fn lua_rawget(vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let table = check_table(vm, &args, 0, "rawget")?;
    let value = table.borrow().get(&arg(&args, 1)).unwrap_or(LuaValue::Nil);
    Ok(vec![value])
}

fn lua_rawset(vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let table = check_table(vm, &args, 0, "rawset")?;
    let result = table.borrow_mut().set(arg(&args, 1), arg(&args, 2));
    result.map_err(|err| vm.locate(err))?;
    Ok(vec![LuaValue::Table(table)])
}

fn lua_rawlen(vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    match arg(&args, 0) {
        LuaValue::Table(table) => {
            Ok(vec![LuaValue::Number(table.borrow().length() as f64)])
        }
        LuaValue::String(s) => Ok(vec![LuaValue::Number(s.len() as f64)]),
        _ => Err(vm.runtime_error(
            RuntimeErrorKind::BadArgument,
            "table or string expected",
        )),
    }
}

fn lua_rawequal(_vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    Ok(vec![LuaValue::Boolean(
        arg(&args, 0).lua_eq(&arg(&args, 1)),
    )])
}

/// unpack(t [, i [, j]]) - spread a sequence into multiple values.
fn lua_unpack(vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let table = check_table(vm, &args, 0, "unpack")?;
    let first = args
        .get(1)
        .and_then(|v| v.as_number())
        .unwrap_or(1.0) as i64;
    let last = match args.get(2).and_then(|v| v.as_number()) {
        Some(n) => n as i64,
        None => table.borrow().length(),
    };
    let mut out = Vec::new();
    let borrowed = table.borrow();
    for index in first..=last {
        out.push(
            borrowed
                .get(&LuaValue::Number(index as f64))
                .unwrap_or(LuaValue::Nil),
        );
    }
    Ok(out)
}

/// setfenv(f | level, table) - install a custom environment on a closure.
fn lua_setfenv(vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let env = arg(&args, 1);
    if !matches!(env, LuaValue::Table(_)) {
        return Err(vm.runtime_error(
            RuntimeErrorKind::BadArgument,
            "bad argument #2 to 'setfenv' (table expected)",
        ));
    }
    match arg(&args, 0) {
        LuaValue::Function(closure) => {
            *closure.env.borrow_mut() = Some(env);
            Ok(vec![LuaValue::Function(closure)])
        }
        LuaValue::Number(n) => {
            let level = n as i64;
            if level == 0 {
                vm.globals = env;
                return Ok(Vec::new());
            }
            if level < 0 {
                return Err(vm.runtime_error(
                    RuntimeErrorKind::InvalidStackLevel,
                    "bad argument #1 to 'setfenv' (invalid level)",
                ));
            }
            let func = vm
                .frame_at_level(level as usize)
                .map(|frame| frame.func.clone())
                .ok_or_else(|| {
                    vm.runtime_error(
                        RuntimeErrorKind::InvalidStackLevel,
                        "bad argument #1 to 'setfenv' (invalid level)",
                    )
                })?;
            match &func {
                LuaValue::Function(closure) => {
                    *closure.env.borrow_mut() = Some(env);
                    Ok(vec![func.clone()])
                }
                _ => Err(vm.runtime_error(
                    RuntimeErrorKind::BadArgument,
                    "'setfenv' cannot change environment of given object",
                )),
            }
        }
        _ => Err(vm.runtime_error(
            RuntimeErrorKind::BadArgument,
            "bad argument #1 to 'setfenv' (function or level expected)",
        )),
    }
}

/// getfenv(f | level) - the effective environment of a function or frame;
/// level 0 (and functions without an override) read as the ambient globals.
fn lua_getfenv(vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let closure_env = |value: &LuaValue| -> Option<LuaValue> {
        match value {
            LuaValue::Function(closure) => closure.env.borrow().clone(),
            _ => None,
        }
    };
    match arg(&args, 0) {
        LuaValue::Function(closure) => {
            let env = closure.env.borrow().clone().unwrap_or_else(|| vm.globals());
            Ok(vec![env])
        }
        LuaValue::Nil => {
            // default level 1: the caller
            let env = vm
                .frame_at_level(1)
                .map(|frame| frame.func.clone())
                .and_then(|func| closure_env(&func))
                .unwrap_or_else(|| vm.globals());
            Ok(vec![env])
        }
        LuaValue::Number(n) => {
            let level = n as i64;
            if level == 0 {
                return Ok(vec![vm.globals()]);
            }
            if level < 0 {
                return Err(vm.runtime_error(
                    RuntimeErrorKind::InvalidStackLevel,
                    "bad argument #1 to 'getfenv' (invalid level)",
                ));
            }
            let frame = vm.frame_at_level(level as usize).ok_or_else(|| {
                vm.runtime_error(
                    RuntimeErrorKind::InvalidStackLevel,
                    "bad argument #1 to 'getfenv' (invalid level)",
                )
            })?;
            let env = closure_env(&frame.func).unwrap_or_else(|| vm.globals());
            Ok(vec![env])
        }
        _ => Err(vm.runtime_error(
            RuntimeErrorKind::BadArgument,
            "bad argument #1 to 'getfenv' (function or level expected)",
        )),
    }
}

/// collectgarbage([opt]) - memory is reference-counted by the host; this
/// exists for source compatibility and reports zero.
fn lua_collectgarbage(_vm: &mut LuaVm, _args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    Ok(vec![LuaValue::Number(0.0)])
}
