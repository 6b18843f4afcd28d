// Call frames
// One record per function or metamethod invocation, kept for stack-level
// introspection (getfenv/setfenv) and error attribution

use smol_str::SmolStr;

use crate::lua_value::LuaValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// A compiled Lua function (including the main chunk).
    Lua,
    /// A host function.
    Native,
    /// Synthetic frame wrapping a metamethod fallback, labeled with the
    /// metamethod's name so diagnostics attribute errors to e.g. `__index`.
    Metamethod,
}

#[derive(Debug, Clone)]
pub struct CallFrame {
    /// Dotted diagnostic name.
    pub name: SmolStr,
    pub kind: FrameKind,
    /// Chunk source name; empty for native and synthetic frames.
    pub source: SmolStr,
    /// Current line, updated as statements execute.
    pub line: u32,
    /// The callee, so `setfenv(level, t)` can reach the closure.
    pub func: LuaValue,
    /// Snapshot of the function's root-scope slot names.
    pub local_names: Vec<SmolStr>,
    pub upvalue_names: Vec<SmolStr>,
}

impl CallFrame {
    pub fn lua(
        name: SmolStr,
        source: SmolStr,
        line: u32,
        func: LuaValue,
        local_names: Vec<SmolStr>,
        upvalue_names: Vec<SmolStr>,
    ) -> Self {
        CallFrame {
            name,
            kind: FrameKind::Lua,
            source,
            line,
            func,
            local_names,
            upvalue_names,
        }
    }

    pub fn native(name: &'static str, func: LuaValue) -> Self {
        CallFrame {
            name: SmolStr::new(name),
            kind: FrameKind::Native,
            source: SmolStr::default(),
            line: 0,
            func,
            local_names: Vec::new(),
            upvalue_names: Vec::new(),
        }
    }

    pub fn metamethod(name: &'static str) -> Self {
        CallFrame {
            name: SmolStr::new(name),
            kind: FrameKind::Metamethod,
            source: SmolStr::default(),
            line: 0,
            func: LuaValue::Nil,
            local_names: Vec::new(),
            upvalue_names: Vec::new(),
        }
    }
}
