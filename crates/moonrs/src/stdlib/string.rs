// String library (non-pattern subset)
// Implements: len, sub, upper, lower, rep, reverse, byte, char, format

use crate::lib_registry::{LibraryModule, arg, check_number, check_string};
use crate::lua_value::{LuaValue, number_to_string};
use crate::lua_vm::{LuaResult, LuaVm, RuntimeErrorKind};

pub fn create_string_lib() -> LibraryModule {
    crate::lib_module!("string", {
        "len" => string_len,
        "sub" => string_sub,
        "upper" => string_upper,
        "lower" => string_lower,
        "rep" => string_rep,
        "reverse" => string_reverse,
        "byte" => string_byte,
        "char" => string_char,
        "format" => string_format,
    })
}

fn string_len(vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let s = check_string(vm, &args, 0, "len")?;
    Ok(vec![LuaValue::Number(s.len() as f64)])
}

/// Translate a 1-based, possibly negative Lua string position.
fn str_position(pos: i64, len: usize) -> usize {
    if pos >= 0 {
        pos as usize
    } else {
        (len as i64 + pos + 1).max(0) as usize
    }
}

fn string_sub(vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let s = check_string(vm, &args, 0, "sub")?;
    let len = s.len();
    let first = str_position(check_number(vm, &args, 1, "sub")? as i64, len).max(1);
    let last = match args.get(2).and_then(|v| v.coerce_number()) {
        Some(n) => str_position(n as i64, len).min(len),
        None => len,
    };
    if first > last {
        return Ok(vec![LuaValue::from("")]);
    }
    Ok(vec![LuaValue::from(&s[first - 1..last])])
}

fn string_upper(vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let s = check_string(vm, &args, 0, "upper")?;
    Ok(vec![LuaValue::from(s.to_uppercase())])
}

fn string_lower(vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let s = check_string(vm, &args, 0, "lower")?;
    Ok(vec![LuaValue::from(s.to_lowercase())])
}

fn string_rep(vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let s = check_string(vm, &args, 0, "rep")?;
    let count = check_number(vm, &args, 1, "rep")?.max(0.0) as usize;
    Ok(vec![LuaValue::from(s.repeat(count))])
}

fn string_reverse(vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let s = check_string(vm, &args, 0, "reverse")?;
    Ok(vec![LuaValue::from(s.chars().rev().collect::<String>())])
}

fn string_byte(vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let s = check_string(vm, &args, 0, "byte")?;
    let first = args
        .get(1)
        .and_then(|v| v.coerce_number())
        .unwrap_or(1.0) as i64;
    let last = args
        .get(2)
        .and_then(|v| v.coerce_number())
        .unwrap_or(first as f64) as i64;
    let len = s.len();
    let bytes = s.as_bytes();
    let first = str_position(first, len).max(1);
    let last = str_position(last, len).min(len);
    let mut out = Vec::new();
    for index in first..=last {
        if index >= 1 && index <= len {
            out.push(LuaValue::Number(bytes[index - 1] as f64));
        }
    }
    Ok(out)
}

fn string_char(vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let mut out = String::with_capacity(args.len());
    for index in 0..args.len() {
        let code = check_number(vm, &args, index, "char")? as i64;
        if !(0..=255).contains(&code) {
            return Err(vm.runtime_error(
                RuntimeErrorKind::BadArgument,
                format!("bad argument #{} to 'char' (value out of range)", index + 1),
            ));
        }
        out.push(code as u8 as char);
    }
    Ok(vec![LuaValue::from(out)])
}

/// format(fmt, ...) - a directive subset: %d %s %f %g %x %q %%.
fn string_format(vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let fmt = check_string(vm, &args, 0, "format")?;
    let mut out = String::with_capacity(fmt.len());
    let mut next_arg = 1usize;
    let mut chars = fmt.chars();
    while let Some(ch) = chars.next() {
        if ch != '%' {
            out.push(ch);
            continue;
        }
        let Some(directive) = chars.next() else {
            return Err(vm.runtime_error(
                RuntimeErrorKind::BadArgument,
                "invalid format string to 'format'",
            ));
        };
        match directive {
            '%' => out.push('%'),
            'd' | 'i' => {
                let n = check_number(vm, &args, next_arg, "format")?;
                next_arg += 1;
                let mut buf = itoa::Buffer::new();
                out.push_str(buf.format(n as i64));
            }
            'f' => {
                let n = check_number(vm, &args, next_arg, "format")?;
                next_arg += 1;
                out.push_str(&format!("{:.6}", n));
            }
            'g' => {
                let n = check_number(vm, &args, next_arg, "format")?;
                next_arg += 1;
                out.push_str(&number_to_string(n));
            }
            'x' => {
                let n = check_number(vm, &args, next_arg, "format")?;
                next_arg += 1;
                out.push_str(&format!("{:x}", n as i64));
            }
            's' => {
                let value = arg(&args, next_arg);
                next_arg += 1;
                out.push_str(&vm.tostring_value(&value)?);
            }
            'q' => {
                let s = check_string(vm, &args, next_arg, "format")?;
                next_arg += 1;
                out.push('"');
                for ch in s.chars() {
                    match ch {
                        '"' => out.push_str("\\\""),
                        '\\' => out.push_str("\\\\"),
                        '\n' => out.push_str("\\n"),
                        '\r' => out.push_str("\\r"),
                        '\0' => out.push_str("\\0"),
                        other => out.push(other),
                    }
                }
                out.push('"');
            }
            other => {
                return Err(vm.runtime_error(
                    RuntimeErrorKind::BadArgument,
                    format!("invalid option '%{}' to 'format'", other),
                ));
            }
        }
    }
    Ok(vec![LuaValue::from(out)])
}
