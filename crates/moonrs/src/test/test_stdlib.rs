/// Standard library behavior and lazy module loading
use crate::lua_value::LuaValue;
use crate::lua_vm::LuaVm;

#[test]
fn test_library_loads_lazily_on_first_reference() {
    // no open_libs: referencing the identifier triggers the module setup
    let mut vm = LuaVm::new();
    let result = vm.execute_string("return math.floor(3.7)").unwrap();
    assert_eq!(result, LuaValue::Number(3.0));
}

#[test]
fn test_lazy_load_caches_per_context() {
    let mut vm = LuaVm::new();
    let result = vm
        .execute_string(
            r#"
        local first = math
        local second = math
        return first == second
    "#,
        )
        .unwrap();
    assert_eq!(result, LuaValue::Boolean(true));
}

#[test]
fn test_math_functions() {
    let mut vm = LuaVm::new();
    vm.open_libs();
    let result = vm.execute_string(
        r#"
        assert(math.abs(-5) == 5)
        assert(math.floor(3.9) == 3)
        assert(math.ceil(3.1) == 4)
        assert(math.sqrt(16) == 4)
        assert(math.max(1, 9, 4) == 9)
        assert(math.min(1, 9, 4) == 1)
        assert(math.fmod(7, 3) == 1)
        local int, frac = math.modf(3.25)
        assert(int == 3 and frac == 0.25)
        assert(math.pi > 3.14 and math.pi < 3.15)
        assert(math.huge > 1e300)
        assert(math.pow(2, 10) == 1024)
        assert(math.log(math.exp(1)) > 0.999)
    "#,
    );
    assert!(result.is_ok(), "{:?}", result);
}

#[test]
fn test_math_random_ranges() {
    let mut vm = LuaVm::new();
    vm.open_libs();
    let result = vm.execute_string(
        r#"
        math.randomseed(42)
        for _ = 1, 20 do
            local r = math.random()
            assert(r >= 0 and r < 1)
            local d = math.random(6)
            assert(d >= 1 and d <= 6)
            local range = math.random(10, 12)
            assert(range >= 10 and range <= 12)
        end
    "#,
    );
    assert!(result.is_ok(), "{:?}", result);
}

#[test]
fn test_string_functions() {
    let mut vm = LuaVm::new();
    vm.open_libs();
    let result = vm.execute_string(
        r#"
        assert(string.len("hello") == 5)
        assert(string.sub("hello", 2, 4) == "ell")
        assert(string.sub("hello", -3) == "llo")
        assert(string.upper("abc") == "ABC")
        assert(string.lower("ABC") == "abc")
        assert(string.rep("ab", 3) == "ababab")
        assert(string.reverse("abc") == "cba")
        assert(string.byte("A") == 65)
        assert(string.char(104, 105) == "hi")
    "#,
    );
    assert!(result.is_ok(), "{:?}", result);
}

#[test]
fn test_string_format() {
    let mut vm = LuaVm::new();
    vm.open_libs();
    let result = vm.execute_string(
        r#"
        assert(string.format("%d items", 3) == "3 items")
        assert(string.format("%s=%d", "x", 1) == "x=1")
        assert(string.format("100%%") == "100%")
        assert(string.format("%x", 255) == "ff")
        assert(string.format("%q", 'say "hi"') == '"say \\"hi\\""')
        assert(string.format("%g", 2.5) == "2.5")
    "#,
    );
    assert!(result.is_ok(), "{:?}", result);
}

#[test]
fn test_table_insert_remove() {
    let mut vm = LuaVm::new();
    vm.open_libs();
    let result = vm.execute_string(
        r#"
        local t = {}
        table.insert(t, "a")
        table.insert(t, "c")
        table.insert(t, 2, "b")
        assert(t[1] == "a" and t[2] == "b" and t[3] == "c")

        local removed = table.remove(t, 1)
        assert(removed == "a")
        assert(t[1] == "b" and t[2] == "c" and t[3] == nil)

        local last = table.remove(t)
        assert(last == "c")
        assert(#t == 1)
    "#,
    );
    assert!(result.is_ok(), "{:?}", result);
}

#[test]
fn test_table_concat() {
    let mut vm = LuaVm::new();
    vm.open_libs();
    let result = vm.execute_string(
        r#"
        assert(table.concat({1, 2, 3}) == "123")
        assert(table.concat({"a", "b", "c"}, "-") == "a-b-c")
        assert(table.concat({"a", "b", "c"}, ",", 2, 3) == "b,c")
        assert(table.concat({}) == "")
    "#,
    );
    assert!(result.is_ok(), "{:?}", result);
}

#[test]
fn test_table_sort() {
    let mut vm = LuaVm::new();
    vm.open_libs();
    let result = vm.execute_string(
        r#"
        local t = {5, 2, 8, 1, 9}
        table.sort(t)
        assert(t[1] == 1 and t[2] == 2 and t[3] == 5 and t[4] == 8 and t[5] == 9)

        table.sort(t, function(a, b) return a > b end)
        assert(t[1] == 9 and t[5] == 1)

        local words = {"pear", "apple", "fig"}
        table.sort(words)
        assert(words[1] == "apple" and words[3] == "pear")
    "#,
    );
    assert!(result.is_ok(), "{:?}", result);
}

#[test]
fn test_table_unpack() {
    let mut vm = LuaVm::new();
    vm.open_libs();
    let result = vm.execute_string(
        r#"
        local a, b, c = table.unpack({10, 20, 30})
        assert(a == 10 and b == 20 and c == 30)
        local d, e = unpack({1, 2, 3}, 2)
        assert(d == 2 and e == 3)
    "#,
    );
    assert!(result.is_ok(), "{:?}", result);
}

#[test]
fn test_tostring_and_tonumber() {
    let mut vm = LuaVm::new();
    vm.open_libs();
    let result = vm.execute_string(
        r#"
        assert(tostring(nil) == "nil")
        assert(tostring(true) == "true")
        assert(tostring(42) == "42")
        assert(tostring(1.5) == "1.5")
        assert(tonumber("42") == 42)
        assert(tonumber("  3.5  ") == 3.5)
        assert(tonumber("0x10") == 16)
        assert(tonumber("ff", 16) == 255)
        assert(tonumber("zz") == nil)
        assert(tonumber({}) == nil)
    "#,
    );
    assert!(result.is_ok(), "{:?}", result);
}

#[test]
fn test_type_names() {
    let mut vm = LuaVm::new();
    vm.open_libs();
    let result = vm.execute_string(
        r#"
        assert(type(nil) == "nil")
        assert(type(true) == "boolean")
        assert(type(1) == "number")
        assert(type("s") == "string")
        assert(type({}) == "table")
        assert(type(print) == "function")
        assert(type(function() end) == "function")
    "#,
    );
    assert!(result.is_ok(), "{:?}", result);
}

#[test]
fn test_select_variants() {
    let mut vm = LuaVm::new();
    vm.open_libs();
    let result = vm.execute_string(
        r##"
        assert(select("#", "a", "b", "c") == 3)
        assert(select("#") == 0)
        local b, c = select(2, "a", "b", "c")
        assert(b == "b" and c == "c")
    "##,
    );
    assert!(result.is_ok(), "{:?}", result);
}

#[test]
fn test_os_time_and_clock() {
    let mut vm = LuaVm::new();
    vm.open_libs();
    let result = vm.execute_string(
        r#"
        local now = os.time()
        assert(type(now) == "number")
        assert(now > 1000000000)

        local stamp = os.time({ year = 2000, month = 1, day = 1 })
        assert(stamp < now)

        assert(type(os.clock()) == "number")
    "#,
    );
    assert!(result.is_ok(), "{:?}", result);
}

#[test]
fn test_os_date() {
    let mut vm = LuaVm::new();
    vm.open_libs();
    let result = vm.execute_string(
        r#"
        local y = os.date("!%Y", 0)
        assert(y == "1970")

        local t = os.date("*t", 86400)
        assert(t.year == 1970 or t.year == 1969)
        assert(type(t.month) == "number")
        assert(type(t.day) == "number")
    "#,
    );
    assert!(result.is_ok(), "{:?}", result);
}

#[test]
fn test_rawget_rawset_bypass_metamethods() {
    let mut vm = LuaVm::new();
    vm.open_libs();
    let result = vm.execute_string(
        r#"
        local t = setmetatable({}, {
            __index = function() return "proxied" end,
            __newindex = function() error("blocked") end,
        })
        assert(t.anything == "proxied")
        assert(rawget(t, "anything") == nil)
        rawset(t, "direct", 1)
        assert(rawget(t, "direct") == 1)
    "#,
    );
    assert!(result.is_ok(), "{:?}", result);
}

#[test]
fn test_version_string() {
    let mut vm = LuaVm::new();
    vm.open_libs();
    let result = vm.execute_string(r#"return _VERSION"#).unwrap();
    assert_eq!(result, LuaValue::from("Lua 5.1"));
}
