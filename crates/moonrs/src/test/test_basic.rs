/// Core round-trip tests: literals, arithmetic, table reads and writes
use crate::lua_value::LuaValue;
use crate::lua_vm::LuaVm;

#[test]
fn test_arithmetic_round_trip() {
    let mut vm = LuaVm::new();
    let result = vm.execute_string("return 1 + 2 * 3").unwrap();
    assert_eq!(result, LuaValue::Number(7.0));
}

#[test]
fn test_table_field_round_trip() {
    let mut vm = LuaVm::new();
    let result = vm.execute_string("local t = {} t.a = 10 return t.a").unwrap();
    assert_eq!(result, LuaValue::Number(10.0));
}

#[test]
fn test_literals() {
    let mut vm = LuaVm::new();
    vm.open_libs();
    let result = vm.execute_string(
        r#"
        assert(nil == nil)
        assert(true ~= false)
        assert(0.5 == .5)
        assert(0x10 == 16)
        assert(1e2 == 100)
        assert("hello" == 'hello')
        assert([[long
string]] == "long\nstring")
    "#,
    );
    assert!(result.is_ok(), "{:?}", result);
}

#[test]
fn test_string_escapes() {
    let mut vm = LuaVm::new();
    vm.open_libs();
    let result = vm.execute_string(
        r#"
        assert(#"\n" == 1)
        assert("\116\101\120\116" == "text")
        assert("\x41" == "A")
    "#,
    );
    assert!(result.is_ok(), "{:?}", result);
}

#[test]
fn test_comments_are_skipped() {
    let mut vm = LuaVm::new();
    let result = vm
        .execute_string(
            r#"
        -- a short comment
        --[[ a long
             comment ]]
        return 1 -- trailing
    "#,
        )
        .unwrap();
    assert_eq!(result, LuaValue::Number(1.0));
}

#[test]
fn test_if_else_chain() {
    let mut vm = LuaVm::new();
    let result = vm
        .execute_string(
            r#"
        local x = 7
        if x < 5 then
            return "low"
        elseif x < 10 then
            return "mid"
        else
            return "high"
        end
    "#,
        )
        .unwrap();
    assert_eq!(result, LuaValue::from("mid"));
}

#[test]
fn test_while_and_repeat() {
    let mut vm = LuaVm::new();
    vm.open_libs();
    let result = vm.execute_string(
        r#"
        local n = 0
        while n < 10 do n = n + 1 end
        assert(n == 10)

        local m = 0
        repeat m = m + 1 until m >= 3
        assert(m == 3)
    "#,
    );
    assert!(result.is_ok(), "{:?}", result);
}

#[test]
fn test_repeat_condition_sees_body_locals() {
    let mut vm = LuaVm::new();
    let result = vm
        .execute_string(
            r#"
        local n = 0
        repeat
            local done = n > 2
            n = n + 1
        until done
        return n
    "#,
        )
        .unwrap();
    assert_eq!(result, LuaValue::Number(4.0));
}

#[test]
fn test_numeric_for() {
    let mut vm = LuaVm::new();
    vm.open_libs();
    let result = vm.execute_string(
        r#"
        local sum = 0
        for i = 1, 5 do sum = sum + i end
        assert(sum == 15)

        local down = {}
        for i = 3, 1, -1 do down[#down + 1] = i end
        assert(down[1] == 3 and down[3] == 1)

        -- bounds are evaluated exactly once
        local evals = 0
        local function limit() evals = evals + 1 return 3 end
        for i = 1, limit() do end
        assert(evals == 1)
    "#,
    );
    assert!(result.is_ok(), "{:?}", result);
}

#[test]
fn test_numeric_for_zero_step_spins_until_break() {
    let mut vm = LuaVm::new();
    vm.open_libs();
    // with step 0 and start >= limit the loop never terminates on its own
    let result = vm.execute_string(
        r#"
        local spins = 0
        for i = 10, 1, 0 do
            spins = spins + 1
            if spins == 5 then break end
        end
        assert(spins == 5)

        -- start below the limit with a non-positive step runs zero times
        local runs = 0
        for i = 1, 10, 0 do runs = runs + 1 end
        assert(runs == 0)
    "#,
    );
    assert!(result.is_ok(), "{:?}", result);
}

#[test]
fn test_generic_for_over_ipairs() {
    let mut vm = LuaVm::new();
    vm.open_libs();
    let result = vm.execute_string(
        r#"
        local t = {10, 20, 30}
        local sum = 0
        for i, v in ipairs(t) do sum = sum + i * v end
        assert(sum == 10 + 40 + 90)
    "#,
    );
    assert!(result.is_ok(), "{:?}", result);
}

#[test]
fn test_nested_tables() {
    let mut vm = LuaVm::new();
    vm.open_libs();
    let result = vm.execute_string(
        r#"
        local config = {
            name = "server",
            limits = { connections = 8, ["time out"] = 30 },
            1, 2, 3,
        }
        assert(config.name == "server")
        assert(config.limits.connections == 8)
        assert(config.limits["time out"] == 30)
        assert(config[2] == 2)
        assert(#config == 3)
    "#,
    );
    assert!(result.is_ok(), "{:?}", result);
}

#[test]
fn test_chunk_returns_nil_without_return() {
    let mut vm = LuaVm::new();
    let result = vm.execute_string("local x = 1").unwrap();
    assert_eq!(result, LuaValue::Nil);
}
