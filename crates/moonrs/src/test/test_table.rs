/// Table semantics: borders, iteration, constants, parent delegation
use proptest::prelude::*;

use crate::lua_value::{LuaTable, LuaValue};
use crate::lua_vm::{LuaError, LuaVm, RuntimeErrorKind};

#[test]
fn test_length_of_sequence() {
    let mut vm = LuaVm::new();
    vm.open_libs();
    let result = vm.execute_string(
        r#"
        local t = {1, 2, 3}
        assert(#t == 3)
        t[4] = 4
        assert(#t == 4)
        t[4] = nil
        assert(#t == 3)
    "#,
    );
    assert!(result.is_ok(), "{:?}", result);
}

#[test]
fn test_length_with_hole_is_some_border() {
    let mut vm = LuaVm::new();
    vm.open_libs();
    // with a hole at 2, both 1 and 3 are valid borders; 2 never is
    let result = vm.execute_string(
        r#"
        local t = {1, 2, 3}
        t[2] = nil
        local n = #t
        assert(n == 1 or n == 3)
    "#,
    );
    assert!(result.is_ok(), "{:?}", result);
}

#[test]
fn test_setting_nil_removes_entry() {
    let mut vm = LuaVm::new();
    vm.open_libs();
    let result = vm.execute_string(
        r#"
        local t = { k = 1 }
        t.k = nil
        assert(t.k == nil)
        assert(next(t) == nil)
    "#,
    );
    assert!(result.is_ok(), "{:?}", result);
}

#[test]
fn test_next_walks_every_entry_once() {
    let mut vm = LuaVm::new();
    vm.open_libs();
    let result = vm.execute_string(
        r#"
        local t = { a = 1, b = 2, c = 3 }
        local seen = 0
        local keys = {}
        local k, v = next(t)
        while k do
            seen = seen + 1
            assert(keys[k] == nil)
            keys[k] = v
            k, v = next(t, k)
        end
        assert(seen == 3)
        assert(keys.a == 1 and keys.b == 2 and keys.c == 3)
    "#,
    );
    assert!(result.is_ok(), "{:?}", result);
}

#[test]
fn test_removing_current_key_during_iteration() {
    let mut vm = LuaVm::new();
    vm.open_libs();
    let result = vm.execute_string(
        r#"
        local t = { a = 1, b = 2, c = 3 }
        local count = 0
        for k in pairs(t) do
            t[k] = nil
            count = count + 1
        end
        assert(count == 3)
        assert(next(t) == nil)
    "#,
    );
    assert!(result.is_ok(), "{:?}", result);
}

#[test]
fn test_mixed_keys() {
    let mut vm = LuaVm::new();
    vm.open_libs();
    let result = vm.execute_string(
        r#"
        local t = {}
        t[1] = "one"
        t["1"] = "string one"
        t[1.5] = "fraction"
        t[true] = "yes"
        assert(t[1] == "one")
        assert(t["1"] == "string one")
        assert(t[1.5] == "fraction")
        assert(t[true] == "yes")
    "#,
    );
    assert!(result.is_ok(), "{:?}", result);
}

#[test]
fn test_nil_key_rejected() {
    let mut vm = LuaVm::new();
    vm.open_libs();
    let result = vm.execute_string(
        r#"
        local t = {}
        local ok, err = pcall(function() t[nil] = 1 end)
        assert(ok == false)
        assert(string.sub(err, -#"table index is nil") == "table index is nil")
    "#,
    );
    assert!(result.is_ok(), "{:?}", result);
}

#[test]
fn test_count_tracks_live_entries() {
    let mut table = LuaTable::new();
    table.set(LuaValue::from("a"), LuaValue::Number(1.0)).unwrap();
    table.set(LuaValue::from("b"), LuaValue::Number(2.0)).unwrap();
    assert_eq!(table.count(), 2);
    table.set(LuaValue::from("a"), LuaValue::Nil).unwrap();
    assert_eq!(table.count(), 1);
    // overwriting does not change the count
    table.set(LuaValue::from("b"), LuaValue::Number(5.0)).unwrap();
    assert_eq!(table.count(), 1);
}

#[test]
fn test_constant_entry_rejects_overwrite() {
    let mut table = LuaTable::new();
    table
        .set_constant(LuaValue::from("limit"), LuaValue::Number(8.0))
        .unwrap();

    let err = table
        .set(LuaValue::from("limit"), LuaValue::Number(9.0))
        .unwrap_err();
    match err {
        LuaError::Runtime(e) => assert_eq!(e.kind, RuntimeErrorKind::AlreadyConstant),
        other => panic!("expected runtime error, got {:?}", other),
    }

    // relocking fails too
    let err = table
        .set_constant(LuaValue::from("limit"), LuaValue::Number(9.0))
        .unwrap_err();
    match err {
        LuaError::Runtime(e) => assert_eq!(e.kind, RuntimeErrorKind::AlreadyConstant),
        other => panic!("expected runtime error, got {:?}", other),
    }

    // the original value survives
    assert_eq!(
        table.get(&LuaValue::from("limit")),
        Some(LuaValue::Number(8.0))
    );
}

#[test]
fn test_plain_entry_can_be_promoted_to_constant() {
    let mut table = LuaTable::new();
    table.set(LuaValue::from("k"), LuaValue::Number(1.0)).unwrap();
    // promotion locks from this point on
    table
        .set_constant(LuaValue::from("k"), LuaValue::Number(2.0))
        .unwrap();
    assert!(table.set(LuaValue::from("k"), LuaValue::Number(3.0)).is_err());
    assert_eq!(table.get(&LuaValue::from("k")), Some(LuaValue::Number(2.0)));
}

#[test]
fn test_parent_delegation_for_reads_through_dispatch() {
    let mut vm = LuaVm::new();
    let parent = LuaValue::new_table();
    if let LuaValue::Table(p) = &parent {
        p.borrow_mut()
            .set(LuaValue::from("inherited"), LuaValue::Number(7.0))
            .unwrap();
    }
    let child = match &parent {
        LuaValue::Table(p) => LuaValue::table(LuaTable::with_parent(p.clone())),
        _ => unreachable!(),
    };

    // the raw table read does not delegate
    if let LuaValue::Table(c) = &child {
        assert_eq!(c.borrow().get(&LuaValue::from("inherited")), None);
    }
    // the dispatch protocol does
    let value = vm
        .index_value(&child, &LuaValue::from("inherited"))
        .unwrap();
    assert_eq!(value, LuaValue::Number(7.0));
}

#[test]
fn test_remove_of_absent_key_delegates_to_parent() {
    let parent = std::rc::Rc::new(std::cell::RefCell::new(LuaTable::new()));
    parent
        .borrow_mut()
        .set(LuaValue::from("shared"), LuaValue::Number(1.0))
        .unwrap();
    let mut child = LuaTable::with_parent(parent.clone());

    child.remove(&LuaValue::from("shared")).unwrap();
    assert_eq!(parent.borrow().get(&LuaValue::from("shared")), None);
}

#[test]
fn test_local_write_shadows_parent() {
    let parent = std::rc::Rc::new(std::cell::RefCell::new(LuaTable::new()));
    parent
        .borrow_mut()
        .set(LuaValue::from("k"), LuaValue::Number(1.0))
        .unwrap();
    let mut child = LuaTable::with_parent(parent.clone());
    child
        .set(LuaValue::from("k"), LuaValue::Number(2.0))
        .unwrap();
    assert_eq!(child.get(&LuaValue::from("k")), Some(LuaValue::Number(2.0)));
    assert_eq!(parent.borrow().get(&LuaValue::from("k")), Some(LuaValue::Number(1.0)));
}

#[test]
fn test_repeated_access_uses_cache_correctly_after_removal() {
    let mut table = LuaTable::new();
    let key = LuaValue::from("hot");
    table.set(key.clone(), LuaValue::Number(1.0)).unwrap();
    // repeated reads hit the one-entry cache
    for _ in 0..4 {
        assert_eq!(table.get(&key), Some(LuaValue::Number(1.0)));
    }
    table.remove(&key).unwrap();
    assert_eq!(table.get(&key), None);
    table.set(key.clone(), LuaValue::Number(2.0)).unwrap();
    assert_eq!(table.get(&key), Some(LuaValue::Number(2.0)));
}

proptest! {
    /// After any sequence of integer-key inserts and removals, length()
    /// reports a valid border: t[n] present and t[n+1] absent (or 0 with
    /// t[1] absent).
    #[test]
    fn prop_length_is_always_a_border(
        ops in prop::collection::vec((1i64..=16, any::<bool>()), 0..64)
    ) {
        let mut table = LuaTable::new();
        for (key, insert) in ops {
            let key = LuaValue::Number(key as f64);
            if insert {
                table.set(key, LuaValue::Boolean(true)).unwrap();
            } else {
                table.remove(&key).unwrap();
            }
        }
        let n = table.length();
        if n == 0 {
            prop_assert!(!table.has(&LuaValue::Number(1.0)));
        } else {
            prop_assert!(table.has(&LuaValue::Number(n as f64)));
            prop_assert!(!table.has(&LuaValue::Number((n + 1) as f64)));
        }
    }

    /// next() started from nil visits every live entry exactly once while
    /// the table is not mutated.
    #[test]
    fn prop_next_visits_each_live_entry_once(
        keys in prop::collection::btree_set(1i64..=32, 0..24)
    ) {
        let mut table = LuaTable::new();
        for key in &keys {
            table
                .set(LuaValue::Number(*key as f64), LuaValue::Number(*key as f64))
                .unwrap();
        }
        let mut seen = std::collections::BTreeSet::new();
        let mut cursor = LuaValue::Nil;
        while let Some((key, _value)) = table.next(&cursor).unwrap() {
            let n = key.as_number().unwrap() as i64;
            prop_assert!(seen.insert(n));
            cursor = key;
        }
        prop_assert_eq!(seen, keys);
    }
}
