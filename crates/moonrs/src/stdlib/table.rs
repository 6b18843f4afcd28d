// Table library
// Implements: insert, remove, concat, unpack, sort

use crate::ast::BinOp;
use crate::lib_registry::{LibraryModule, arg, check_table};
use crate::lua_value::LuaValue;
use crate::lua_vm::{LuaResult, LuaVm, RuntimeErrorKind};

pub fn create_table_lib() -> LibraryModule {
    crate::lib_module!("table", {
        "insert" => table_insert,
        "remove" => table_remove,
        "concat" => table_concat,
        "unpack" => table_unpack,
        "sort" => table_sort,
    })
}

fn seq_get(table: &std::rc::Rc<std::cell::RefCell<crate::lua_value::LuaTable>>, index: i64) -> LuaValue {
    table
        .borrow()
        .get(&LuaValue::Number(index as f64))
        .unwrap_or(LuaValue::Nil)
}

fn seq_set(
    vm: &LuaVm,
    table: &std::rc::Rc<std::cell::RefCell<crate::lua_value::LuaTable>>,
    index: i64,
    value: LuaValue,
) -> LuaResult<()> {
    let result = table
        .borrow_mut()
        .set(LuaValue::Number(index as f64), value);
    result.map_err(|err| vm.locate(err))
}

/// insert(t, v) appends; insert(t, pos, v) shifts the tail up.
fn table_insert(vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let table = check_table(vm, &args, 0, "insert")?;
    let len = table.borrow().length();
    match args.len() {
        0 | 1 => Err(vm.runtime_error(
            RuntimeErrorKind::BadArgument,
            "wrong number of arguments to 'insert'",
        )),
        2 => {
            seq_set(vm, &table, len + 1, arg(&args, 1))?;
            Ok(Vec::new())
        }
        _ => {
            let pos = arg(&args, 1).as_number().ok_or_else(|| {
                vm.runtime_error(
                    RuntimeErrorKind::BadArgument,
                    "bad argument #2 to 'insert' (number expected)",
                )
            })? as i64;
            if pos < 1 || pos > len + 1 {
                return Err(vm.runtime_error(
                    RuntimeErrorKind::BadArgument,
                    "bad argument #2 to 'insert' (position out of bounds)",
                ));
            }
            let mut index = len;
            while index >= pos {
                let value = seq_get(&table, index);
                seq_set(vm, &table, index + 1, value)?;
                index -= 1;
            }
            seq_set(vm, &table, pos, arg(&args, 2))?;
            Ok(Vec::new())
        }
    }
}

/// remove(t [, pos]) - removes and returns t[pos], shifting the tail down.
fn table_remove(vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let table = check_table(vm, &args, 0, "remove")?;
    let len = table.borrow().length();
    let pos = match args.get(1).and_then(|v| v.as_number()) {
        Some(n) => n as i64,
        None => len,
    };
    if len == 0 {
        return Ok(vec![LuaValue::Nil]);
    }
    if pos < 1 || pos > len {
        return Err(vm.runtime_error(
            RuntimeErrorKind::BadArgument,
            "bad argument #2 to 'remove' (position out of bounds)",
        ));
    }
    let removed = seq_get(&table, pos);
    for index in pos..len {
        let value = seq_get(&table, index + 1);
        seq_set(vm, &table, index, value)?;
    }
    seq_set(vm, &table, len, LuaValue::Nil)?;
    Ok(vec![removed])
}

/// concat(t [, sep [, i [, j]]]).
fn table_concat(vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let table = check_table(vm, &args, 0, "concat")?;
    let sep = match args.get(1) {
        None | Some(LuaValue::Nil) => String::new(),
        Some(value) => value.coerce_string().ok_or_else(|| {
            vm.runtime_error(
                RuntimeErrorKind::BadArgument,
                "bad argument #2 to 'concat' (string expected)",
            )
        })?,
    };
    let first = args.get(2).and_then(|v| v.as_number()).unwrap_or(1.0) as i64;
    let last = match args.get(3).and_then(|v| v.as_number()) {
        Some(n) => n as i64,
        None => table.borrow().length(),
    };
    let mut out = String::new();
    for index in first..=last {
        let value = seq_get(&table, index);
        let piece = value.coerce_string().ok_or_else(|| {
            vm.runtime_error(
                RuntimeErrorKind::BadArgument,
                format!(
                    "invalid value (at index {}) in table for 'concat'",
                    index
                ),
            )
        })?;
        if index > first {
            out.push_str(&sep);
        }
        out.push_str(&piece);
    }
    Ok(vec![LuaValue::from(out)])
}

fn table_unpack(vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let table = check_table(vm, &args, 0, "unpack")?;
    let first = args.get(1).and_then(|v| v.as_number()).unwrap_or(1.0) as i64;
    let last = match args.get(2).and_then(|v| v.as_number()) {
        Some(n) => n as i64,
        None => table.borrow().length(),
    };
    let mut out = Vec::new();
    for index in first..=last {
        out.push(seq_get(&table, index));
    }
    Ok(out)
}

/// sort(t [, comp]) - insertion sort so comparator errors (and __lt
/// dispatch) propagate cleanly.
fn table_sort(vm: &mut LuaVm, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
    let table = check_table(vm, &args, 0, "sort")?;
    let comparator = args.get(1).cloned();
    let len = table.borrow().length();

    let mut values: Vec<LuaValue> = (1..=len).map(|index| seq_get(&table, index)).collect();

    let less = |vm: &mut LuaVm, a: &LuaValue, b: &LuaValue| -> LuaResult<bool> {
        match &comparator {
            Some(comp) if !comp.is_nil() => {
                let results = vm.call_value(comp, vec![a.clone(), b.clone()])?;
                Ok(results.first().is_some_and(|v| v.is_truthy()))
            }
            _ => vm.compare(BinOp::Lt, a, b),
        }
    };

    for sorted in 1..values.len() {
        let pivot = values[sorted].clone();
        let mut index = sorted;
        while index > 0 && less(vm, &pivot, &values[index - 1])? {
            values[index] = values[index - 1].clone();
            index -= 1;
        }
        values[index] = pivot;
    }

    for (offset, value) in values.into_iter().enumerate() {
        seq_set(vm, &table, offset as i64 + 1, value)?;
    }
    Ok(Vec::new())
}
