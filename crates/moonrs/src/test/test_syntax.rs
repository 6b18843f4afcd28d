/// Compile-time rejection and goto/label handling
use crate::lua_vm::{LuaError, LuaVm};

fn compile_error(source: &str) -> String {
    let mut vm = LuaVm::new();
    match vm.compile(source) {
        Err(LuaError::Syntax { message, .. }) => message,
        Err(other) => panic!("expected syntax error, got {:?}", other),
        Ok(_) => panic!("expected compile failure for: {}", source),
    }
}

#[test]
fn test_break_outside_loop_rejected() {
    let message = compile_error("break");
    assert!(message.contains("'break' outside a loop"), "{}", message);
}

#[test]
fn test_goto_without_label_rejected() {
    let message = compile_error("goto nowhere");
    assert!(message.contains("no visible label"), "{}", message);
}

#[test]
fn test_goto_cannot_enter_nested_block() {
    // the label lives inside the do-block, invisible from outside
    let message = compile_error(
        r#"
        goto inner
        do
            ::inner::
        end
    "#,
    );
    assert!(message.contains("no visible label"), "{}", message);
}

#[test]
fn test_vararg_outside_vararg_function_rejected() {
    let message = compile_error(
        r#"
        local function f()
            return ...
        end
    "#,
    );
    assert!(
        message.contains("outside a vararg function"),
        "{}",
        message
    );
}

#[test]
fn test_unfinished_string_rejected() {
    let message = compile_error(r#"local s = "open"#);
    assert!(message.contains("unfinished string"), "{}", message);
}

#[test]
fn test_malformed_number_rejected() {
    let message = compile_error("return 0x");
    assert!(message.contains("malformed number"), "{}", message);
}

#[test]
fn test_unbalanced_end_rejected() {
    let message = compile_error("if true then");
    assert!(message.contains("expected"), "{}", message);
}

#[test]
fn test_assignment_to_call_rejected() {
    let message = compile_error("f() = 1");
    assert!(!message.is_empty());
}

#[test]
fn test_error_message_carries_chunk_and_line() {
    let message = compile_error("local x =\nbreak");
    assert!(message.starts_with("chunk:2:"), "{}", message);
}

#[test]
fn test_backward_goto_forms_loop() {
    let mut vm = LuaVm::new();
    vm.open_libs();
    let result = vm.execute_string(
        r#"
        local i = 0
        ::top::
        i = i + 1
        if i < 5 then goto top end
        assert(i == 5)
    "#,
    );
    assert!(result.is_ok(), "{:?}", result);
}

#[test]
fn test_forward_goto_skips_statements() {
    let mut vm = LuaVm::new();
    vm.open_libs();
    let result = vm.execute_string(
        r#"
        local touched = false
        goto after
        touched = true
        ::after::
        assert(touched == false)
    "#,
    );
    assert!(result.is_ok(), "{:?}", result);
}

#[test]
fn test_goto_out_of_nested_block() {
    let mut vm = LuaVm::new();
    vm.open_libs();
    let result = vm.execute_string(
        r#"
        local path = ""
        do
            do
                path = path .. "a"
                goto outside
            end
        end
        path = path .. "b"
        ::outside::
        path = path .. "c"
        assert(path == "ac")
    "#,
    );
    assert!(result.is_ok(), "{:?}", result);
}

#[test]
fn test_goto_as_continue() {
    let mut vm = LuaVm::new();
    vm.open_libs();
    let result = vm.execute_string(
        r#"
        local evens = {}
        for i = 1, 10 do
            if i % 2 == 1 then goto continue end
            evens[#evens + 1] = i
            ::continue::
        end
        assert(#evens == 5)
        assert(evens[1] == 2 and evens[5] == 10)
    "#,
    );
    assert!(result.is_ok(), "{:?}", result);
}

#[test]
fn test_goto_as_continue_inside_repeat() {
    let mut vm = LuaVm::new();
    vm.open_libs();
    let result = vm.execute_string(
        r#"
        local tries = 0
        local skipped = 0
        repeat
            tries = tries + 1
            if tries % 2 == 0 then goto next end
            skipped = skipped + 1
            ::next::
        until tries >= 4
        assert(tries == 4)
        assert(skipped == 2)
    "#,
    );
    assert!(result.is_ok(), "{:?}", result);
}
