// Library registration system
// Modules populate a table with named host functions; the execution context
// installs them on first reference and caches the result per context

use smol_str::SmolStr;

use crate::lua_value::{LuaTable, LuaValue, NativeFn, NativeFunction};
use crate::lua_vm::{LuaResult, LuaVm, RuntimeErrorKind};
use crate::stdlib;

/// Initializer for non-function entries, run when the module installs.
pub type ValueInitializer = fn(&mut LuaVm) -> LuaValue;

#[derive(Clone, Copy)]
pub enum LibraryEntry {
    Function(NativeFn),
    Value(ValueInitializer),
}

/// A library module: a named set of host functions and values.
#[derive(Clone)]
pub struct LibraryModule {
    pub name: &'static str,
    pub entries: Vec<(&'static str, LibraryEntry)>,
}

impl LibraryModule {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: Vec::new(),
        }
    }

    pub fn with_function(mut self, name: &'static str, func: NativeFn) -> Self {
        self.entries.push((name, LibraryEntry::Function(func)));
        self
    }

    pub fn with_value(mut self, name: &'static str, init: ValueInitializer) -> Self {
        self.entries.push((name, LibraryEntry::Value(init)));
        self
    }
}

/// Builder for library modules.
#[macro_export]
macro_rules! lib_module {
    ($name:expr, {
        $($item_name:expr => $item:expr),* $(,)?
    }) => {{
        let mut module = $crate::lib_registry::LibraryModule::new($name);
        $(
            module.entries.push((
                $item_name,
                $crate::lib_registry::LibraryEntry::Function($item),
            ));
        )*
        module
    }};
}

/// Registry of library modules, in installation order.
pub struct LibraryRegistry {
    modules: Vec<LibraryModule>,
}

impl LibraryRegistry {
    pub fn new() -> Self {
        Self {
            modules: Vec::new(),
        }
    }

    pub fn register(&mut self, module: LibraryModule) {
        self.modules.push(module);
    }

    pub fn get_module(&self, name: &str) -> Option<&LibraryModule> {
        self.modules.iter().find(|module| module.name == name)
    }

    pub fn module_names(&self) -> Vec<SmolStr> {
        self.modules
            .iter()
            .map(|module| SmolStr::new(module.name))
            .collect()
    }
}

impl Default for LibraryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Populate a table with the module's entries and install it. The `_G`
/// module writes straight into the globals instead of a named table.
pub(crate) fn install_module(vm: &mut LuaVm, module: &LibraryModule) -> LuaValue {
    if module.name == "_G" {
        for (name, entry) in module.entries.iter().copied() {
            let value = realize(vm, name, entry);
            vm.set_global(name, value);
        }
        return vm.globals();
    }

    let mut table = LuaTable::new();
    for (name, entry) in module.entries.iter().copied() {
        let value = realize(vm, name, entry);
        // module tables are fresh, writes cannot hit a constant
        let _ = table.set(LuaValue::from(name), value);
    }
    let table = LuaValue::table(table);
    vm.set_global(module.name, table.clone());

    // all strings share one metatable whose __index is the string library,
    // enabling s:upper() style calls
    if module.name == "string" {
        let mut meta = LuaTable::new();
        let _ = meta.set(LuaValue::from("__index"), table.clone());
        vm.string_metatable = Some(LuaValue::table(meta));
    }

    table
}

fn realize(vm: &mut LuaVm, name: &'static str, entry: LibraryEntry) -> LuaValue {
    match entry {
        LibraryEntry::Function(func) => LuaValue::Native(NativeFunction { name, func }),
        LibraryEntry::Value(init) => init(vm),
    }
}

/// The standard library set.
pub fn standard_registry() -> LibraryRegistry {
    let mut registry = LibraryRegistry::new();
    registry.register(stdlib::basic::create_basic_lib());
    registry.register(stdlib::math::create_math_lib());
    registry.register(stdlib::string::create_string_lib());
    registry.register(stdlib::table::create_table_lib());
    registry.register(stdlib::os::create_os_lib());
    registry
}

// ===== Argument helpers for host functions =====

/// Fetch an argument by zero-based position; missing arguments read as nil.
pub fn arg(args: &[LuaValue], index: usize) -> LuaValue {
    args.get(index).cloned().unwrap_or(LuaValue::Nil)
}

pub fn check_number(
    vm: &LuaVm,
    args: &[LuaValue],
    index: usize,
    func: &str,
) -> LuaResult<f64> {
    arg(args, index).coerce_number().ok_or_else(|| {
        vm.runtime_error(
            RuntimeErrorKind::BadArgument,
            format!("bad argument #{} to '{}' (number expected)", index + 1, func),
        )
    })
}

pub fn check_string(
    vm: &LuaVm,
    args: &[LuaValue],
    index: usize,
    func: &str,
) -> LuaResult<String> {
    arg(args, index).coerce_string().ok_or_else(|| {
        vm.runtime_error(
            RuntimeErrorKind::BadArgument,
            format!("bad argument #{} to '{}' (string expected)", index + 1, func),
        )
    })
}

pub fn check_table(
    vm: &LuaVm,
    args: &[LuaValue],
    index: usize,
    func: &str,
) -> LuaResult<std::rc::Rc<std::cell::RefCell<crate::lua_value::LuaTable>>> {
    match arg(args, index) {
        LuaValue::Table(table) => Ok(table),
        other => Err(vm.runtime_error(
            RuntimeErrorKind::BadArgument,
            format!(
                "bad argument #{} to '{}' (table expected, got {})",
                index + 1,
                func,
                other.type_name()
            ),
        )),
    }
}
