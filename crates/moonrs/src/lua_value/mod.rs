// Runtime value model: tagged values, tables, closures

mod lua_function;
mod lua_table;
mod lua_value;

pub use lua_function::{Activation, LuaClosure};
pub use lua_table::LuaTable;
pub use lua_value::{LuaValue, LuaValueKind, NativeFn, NativeFunction, number_to_string};
