/// Lexical scoping: shadowing, block visibility, redeclaration
use crate::lua_value::LuaValue;
use crate::lua_vm::LuaVm;

#[test]
fn test_local_shadows_global() {
    let mut vm = LuaVm::new();
    vm.open_libs();
    let result = vm.execute_string(
        r#"
        x = "global"
        local x = "local"
        assert(x == "local")
        assert(_G.x == "global")
    "#,
    );
    assert!(result.is_ok(), "{:?}", result);
}

#[test]
fn test_block_local_not_visible_after_block() {
    let mut vm = LuaVm::new();
    vm.open_libs();
    let result = vm.execute_string(
        r#"
        do
            local hidden = 1
        end
        assert(hidden == nil)
    "#,
    );
    assert!(result.is_ok(), "{:?}", result);
}

#[test]
fn test_sibling_blocks_do_not_share_locals() {
    let mut vm = LuaVm::new();
    vm.open_libs();
    let result = vm.execute_string(
        r#"
        do local a = 1 end
        do assert(a == nil) end
    "#,
    );
    assert!(result.is_ok(), "{:?}", result);
}

#[test]
fn test_nested_block_sees_outer_local() {
    let mut vm = LuaVm::new();
    vm.open_libs();
    let result = vm.execute_string(
        r#"
        local outer = 5
        do
            do
                assert(outer == 5)
                outer = 6
            end
        end
        assert(outer == 6)
    "#,
    );
    assert!(result.is_ok(), "{:?}", result);
}

#[test]
fn test_shadowing_in_nested_block() {
    let mut vm = LuaVm::new();
    vm.open_libs();
    let result = vm.execute_string(
        r#"
        local v = "outer"
        do
            local v = "inner"
            assert(v == "inner")
        end
        assert(v == "outer")
    "#,
    );
    assert!(result.is_ok(), "{:?}", result);
}

#[test]
fn test_redeclaration_creates_new_slot() {
    let mut vm = LuaVm::new();
    vm.open_libs();
    let result = vm.execute_string(
        r#"
        local x = 1
        local x = x + 1
        assert(x == 2)
    "#,
    );
    assert!(result.is_ok(), "{:?}", result);
}

#[test]
fn test_same_statement_redeclaration_binds_left_to_right() {
    let mut vm = LuaVm::new();
    vm.open_libs();
    // both occurrences get distinct slots; the later one shadows
    let result = vm.execute_string(
        r#"
        local x, x = 1, 2
        assert(x == 2)
    "#,
    );
    assert!(result.is_ok(), "{:?}", result);
}

#[test]
fn test_local_initializer_sees_previous_binding() {
    let mut vm = LuaVm::new();
    vm.open_libs();
    let result = vm.execute_string(
        r#"
        local x = "old"
        local x = x .. "!"
        assert(x == "old!")
    "#,
    );
    assert!(result.is_ok(), "{:?}", result);
}

#[test]
fn test_loop_variable_scoped_to_loop() {
    let mut vm = LuaVm::new();
    vm.open_libs();
    let result = vm.execute_string(
        r#"
        for i = 1, 3 do end
        assert(i == nil)
    "#,
    );
    assert!(result.is_ok(), "{:?}", result);
}

#[test]
fn test_undeclared_name_is_global() {
    let mut vm = LuaVm::new();
    let result = vm
        .execute_string(
            r#"
        value = 42
        return value
    "#,
        )
        .unwrap();
    assert_eq!(result, LuaValue::Number(42.0));
    assert_eq!(vm.get_global("value"), LuaValue::Number(42.0));
}
