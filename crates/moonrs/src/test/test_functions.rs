/// Calls, returns, multiple assignment, varargs
use crate::lua_value::LuaValue;
use crate::lua_vm::LuaVm;

#[test]
fn test_multiple_assignment_pads_and_truncates() {
    let mut vm = LuaVm::new();
    vm.open_libs();
    let result = vm.execute_string(
        r#"
        local a, b, c = 1, 2
        assert(a == 1 and b == 2 and c == nil)

        local d, e = 1, 2, 3
        assert(d == 1 and e == 2)
    "#,
    );
    assert!(result.is_ok(), "{:?}", result);
}

#[test]
fn test_swap_assignment() {
    let mut vm = LuaVm::new();
    vm.open_libs();
    let result = vm.execute_string(
        r#"
        local a, b = 1, 2
        a, b = b, a
        assert(a == 2 and b == 1)
    "#,
    );
    assert!(result.is_ok(), "{:?}", result);
}

#[test]
fn test_trailing_call_expands() {
    let mut vm = LuaVm::new();
    vm.open_libs();
    let result = vm.execute_string(
        r#"
        local function three() return 1, 2, 3 end

        local a, b = three()
        assert(a == 1 and b == 2)

        local c, d, e, f = 0, three()
        assert(c == 0 and d == 1 and e == 2 and f == 3)
    "#,
    );
    assert!(result.is_ok(), "{:?}", result);
}

#[test]
fn test_call_in_middle_position_truncates_to_one() {
    let mut vm = LuaVm::new();
    vm.open_libs();
    let result = vm.execute_string(
        r#"
        local function three() return 1, 2, 3 end
        local a, b, c = three(), 10
        assert(a == 1 and b == 10 and c == nil)
    "#,
    );
    assert!(result.is_ok(), "{:?}", result);
}

#[test]
fn test_parentheses_truncate_multiple_results() {
    let mut vm = LuaVm::new();
    vm.open_libs();
    let result = vm.execute_string(
        r#"
        local function pair() return 1, 2 end
        local a, b = (pair())
        assert(a == 1 and b == nil)
    "#,
    );
    assert!(result.is_ok(), "{:?}", result);
}

#[test]
fn test_function_without_return_yields_nil() {
    let mut vm = LuaVm::new();
    vm.open_libs();
    let result = vm.execute_string(
        r#"
        local function quiet() local x = 1 end
        assert(quiet() == nil)
    "#,
    );
    assert!(result.is_ok(), "{:?}", result);
}

#[test]
fn test_missing_arguments_read_as_nil() {
    let mut vm = LuaVm::new();
    vm.open_libs();
    let result = vm.execute_string(
        r#"
        local function f(a, b) return b end
        assert(f(1) == nil)
    "#,
    );
    assert!(result.is_ok(), "{:?}", result);
}

#[test]
fn test_varargs_spread_and_count() {
    let mut vm = LuaVm::new();
    vm.open_libs();
    let result = vm.execute_string(
        r##"
        local function count(...)
            return select("#", ...)
        end
        assert(count() == 0)
        assert(count(1, nil, 3) == 3)

        local function collect(...)
            local t = {...}
            return #t
        end
        assert(collect(7, 8, 9) == 3)

        local function forward(...)
            return ...
        end
        local a, b = forward(4, 5)
        assert(a == 4 and b == 5)
    "##,
    );
    assert!(result.is_ok(), "{:?}", result);
}

#[test]
fn test_vararg_in_middle_of_list_yields_one_value() {
    let mut vm = LuaVm::new();
    vm.open_libs();
    let result = vm.execute_string(
        r#"
        local function f(...)
            local a, b = ..., "tail"
            return a, b
        end
        local x, y = f(1, 2)
        assert(x == 1 and y == "tail")
    "#,
    );
    assert!(result.is_ok(), "{:?}", result);
}

#[test]
fn test_method_definition_and_call() {
    let mut vm = LuaVm::new();
    vm.open_libs();
    let result = vm.execute_string(
        r#"
        local account = { balance = 0 }
        function account:deposit(amount)
            self.balance = self.balance + amount
        end
        account:deposit(100)
        account:deposit(20)
        assert(account.balance == 120)
    "#,
    );
    assert!(result.is_ok(), "{:?}", result);
}

#[test]
fn test_dotted_function_definition() {
    let mut vm = LuaVm::new();
    vm.open_libs();
    let result = vm.execute_string(
        r#"
        lib = {}
        lib.util = {}
        function lib.util.double(x) return x * 2 end
        assert(lib.util.double(21) == 42)
    "#,
    );
    assert!(result.is_ok(), "{:?}", result);
}

#[test]
fn test_call_sugar_with_string_and_table() {
    let mut vm = LuaVm::new();
    vm.open_libs();
    let result = vm.execute_string(
        r#"
        local function id(x) return x end
        assert(id "hello" == "hello")
        local t = id { key = "value" }
        assert(t.key == "value")
    "#,
    );
    assert!(result.is_ok(), "{:?}", result);
}

#[test]
fn test_return_multiple_values_to_host() {
    let mut vm = LuaVm::new();
    let result = vm.execute_string("return 1, 2, 3").unwrap();
    // the host-facing result is the first value
    assert_eq!(result, LuaValue::Number(1.0));
}

#[test]
fn test_argument_evaluation_order() {
    let mut vm = LuaVm::new();
    vm.open_libs();
    let result = vm.execute_string(
        r##"
        local order = {}
        local function note(n) order[#order + 1] = n return n end
        local function f(...) return select("#", ...) end
        f(note(1), note(2), note(3))
        assert(order[1] == 1 and order[2] == 2 and order[3] == 3)
    "##,
    );
    assert!(result.is_ok(), "{:?}", result);
}
