/// Environments: setfenv/getfenv, sandboxed chunks, custom globals
use crate::lua_value::{LuaTable, LuaValue};
use crate::lua_vm::LuaVm;

#[test]
fn test_setfenv_redirects_global_reads() {
    let mut vm = LuaVm::new();
    vm.open_libs();
    let result = vm.execute_string(
        r#"
        local function f() return x end
        setfenv(f, { x = 42 })
        assert(f() == 42)
        assert(x == nil)
    "#,
    );
    assert!(result.is_ok(), "{:?}", result);
}

#[test]
fn test_setfenv_redirects_global_writes() {
    let mut vm = LuaVm::new();
    vm.open_libs();
    let result = vm.execute_string(
        r#"
        local box = {}
        local function f() y = "written" end
        setfenv(f, box)
        f()
        assert(box.y == "written")
        assert(y == nil)
    "#,
    );
    assert!(result.is_ok(), "{:?}", result);
}

#[test]
fn test_getfenv_returns_installed_environment() {
    let mut vm = LuaVm::new();
    vm.open_libs();
    let result = vm.execute_string(
        r#"
        local env = { marker = true }
        local function f() end
        setfenv(f, env)
        assert(getfenv(f) == env)
    "#,
    );
    assert!(result.is_ok(), "{:?}", result);
}

#[test]
fn test_getfenv_level_zero_is_globals() {
    let mut vm = LuaVm::new();
    vm.open_libs();
    let result = vm.execute_string(
        r#"
        assert(getfenv(0) == _G)
    "#,
    );
    assert!(result.is_ok(), "{:?}", result);
}

#[test]
fn test_getfenv_by_level_sees_callers_environment() {
    let mut vm = LuaVm::new();
    vm.open_libs();
    let result = vm.execute_string(
        r#"
        local env = { getfenv = getfenv, assertion = assert }
        local function probe()
            return getfenv(1)
        end
        setfenv(probe, env)
        assert(probe() == env)
    "#,
    );
    assert!(result.is_ok(), "{:?}", result);
}

#[test]
fn test_default_environment_is_globals() {
    let mut vm = LuaVm::new();
    vm.open_libs();
    let result = vm.execute_string(
        r#"
        local function f() end
        assert(getfenv(f) == _G)
    "#,
    );
    assert!(result.is_ok(), "{:?}", result);
}

#[test]
fn test_invalid_level_raises() {
    let mut vm = LuaVm::new();
    vm.open_libs();
    let result = vm.execute_string(
        r#"
        local ok = pcall(getfenv, 99)
        assert(ok == false)
        local ok2 = pcall(setfenv, 99, {})
        assert(ok2 == false)
    "#,
    );
    assert!(result.is_ok(), "{:?}", result);
}

#[test]
fn test_execute_with_custom_environment() {
    let mut vm = LuaVm::new();
    vm.open_libs();

    let mut env = LuaTable::new();
    env.set(LuaValue::from("secret"), LuaValue::Number(99.0))
        .unwrap();
    let env = LuaValue::table(env);

    let chunk = vm.compile("return secret").unwrap();
    let result = vm.execute_with_env(chunk, env.clone()).unwrap();
    assert_eq!(result, LuaValue::Number(99.0));

    // the ambient globals were untouched
    assert_eq!(vm.get_global("secret"), LuaValue::Nil);

    // writes land in the sandbox
    let chunk = vm.compile("leaked = true").unwrap();
    vm.execute_with_env(chunk, env.clone()).unwrap();
    assert_eq!(vm.get_global("leaked"), LuaValue::Nil);
    if let LuaValue::Table(table) = &env {
        assert_eq!(
            table.borrow().get_str("leaked"),
            Some(LuaValue::Boolean(true))
        );
    }
}

#[test]
fn test_sandbox_cannot_reach_removed_functions() {
    let mut vm = LuaVm::new();
    vm.open_libs();

    // an empty sandbox has no assert, no print, nothing
    let chunk = vm.compile("return assert").unwrap();
    let result = vm
        .execute_with_env(chunk, LuaValue::new_table())
        .unwrap();
    assert_eq!(result, LuaValue::Nil);
}

#[test]
fn test_sandbox_with_read_through_parent() {
    let mut vm = LuaVm::new();
    vm.open_libs();

    // a scoped environment delegates reads to its parent but keeps writes
    let parent = match vm.globals() {
        LuaValue::Table(globals) => globals,
        _ => unreachable!(),
    };
    let sandbox = LuaValue::table(LuaTable::with_parent(parent));

    let chunk = vm
        .compile("shadowed = type(assert) return shadowed")
        .unwrap();
    let result = vm.execute_with_env(chunk, sandbox.clone()).unwrap();
    // `type` and `assert` resolved through the parent
    assert_eq!(result, LuaValue::from("function"));
    // the write stayed local to the sandbox
    assert_eq!(vm.get_global("shadowed"), LuaValue::Nil);
    if let LuaValue::Table(table) = &sandbox {
        assert_eq!(
            table.borrow().get_str("shadowed"),
            Some(LuaValue::from("function"))
        );
    }
}

#[test]
fn test_setfenv_level_zero_replaces_globals() {
    let mut vm = LuaVm::new();
    vm.open_libs();
    vm.execute_string(
        r#"
        local fresh = { keep = "me" }
        setfenv(0, fresh)
    "#,
    )
    .unwrap();
    assert_eq!(vm.get_global("keep"), LuaValue::from("me"));
    // the old globals (with the stdlib) were swapped out
    assert_eq!(vm.get_global("print"), LuaValue::Nil);
}
