// moonrs - an embeddable Lua runtime
// Source is parsed, lexically resolved, and compiled into per-function
// operation graphs executed against a metatable-aware value model

#[cfg(test)]
mod test;

pub mod ast;
pub mod compiler;
pub mod lib_registry;
pub mod lua_value;
pub mod lua_vm;
pub mod stdlib;
pub mod syntax;

pub use compiler::{Chunk, compile_chunk};
pub use lib_registry::LibraryRegistry;
pub use lua_value::{LuaClosure, LuaTable, LuaValue};
pub use lua_vm::{LuaError, LuaResult, LuaVm, RuntimeErrorKind};
