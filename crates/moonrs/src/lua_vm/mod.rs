// The execution context
// Owns the global table, the live call-frame stack, the loaded-library
// cache, and the interned metamethod name values; no ambient/static state

mod call_frame;
mod exec;
mod lua_error;
mod metamethod;

pub use call_frame::{CallFrame, FrameKind};
pub use lua_error::{LuaError, LuaResult, RuntimeError, RuntimeErrorKind};

use std::rc::Rc;

use hashbrown::HashMap;
use smol_str::SmolStr;

use crate::compiler::{self, Chunk};
use crate::lib_registry::{self, LibraryRegistry};
use crate::lua_value::{LuaClosure, LuaValue};
use crate::syntax;

/// Maximum call stack depth. Kept well below what the host stack could bear
/// because every Lua frame costs several native frames in the tree walker.
pub const MAX_CALL_DEPTH: usize = 120;

/// Interned metamethod name values, created once per context so dispatch
/// never re-allocates a key.
pub(crate) struct MetaNames {
    pub index: LuaValue,
    pub newindex: LuaValue,
    pub call: LuaValue,
    pub add: LuaValue,
    pub sub: LuaValue,
    pub mul: LuaValue,
    pub div: LuaValue,
    pub modulo: LuaValue,
    pub pow: LuaValue,
    pub unm: LuaValue,
    pub concat: LuaValue,
    pub len: LuaValue,
    pub eq: LuaValue,
    pub lt: LuaValue,
    pub le: LuaValue,
    pub tostring: LuaValue,
    pub metatable: LuaValue,
}

impl MetaNames {
    fn new() -> Self {
        MetaNames {
            index: LuaValue::from("__index"),
            newindex: LuaValue::from("__newindex"),
            call: LuaValue::from("__call"),
            add: LuaValue::from("__add"),
            sub: LuaValue::from("__sub"),
            mul: LuaValue::from("__mul"),
            div: LuaValue::from("__div"),
            modulo: LuaValue::from("__mod"),
            pow: LuaValue::from("__pow"),
            unm: LuaValue::from("__unm"),
            concat: LuaValue::from("__concat"),
            len: LuaValue::from("__len"),
            eq: LuaValue::from("__eq"),
            lt: LuaValue::from("__lt"),
            le: LuaValue::from("__le"),
            tostring: LuaValue::from("__tostring"),
            metatable: LuaValue::from("__metatable"),
        }
    }
}

pub struct LuaVm {
    /// The ambient global table (`_G`).
    pub(crate) globals: LuaValue,
    /// Live call frames, innermost last.
    pub(crate) frames: Vec<CallFrame>,
    registry: LibraryRegistry,
    /// Per-context cache of loaded library tables.
    loaded: HashMap<SmolStr, LuaValue, ahash::RandomState>,
    pub(crate) meta: MetaNames,
    /// Shared metatable of all string values (`__index` -> string library).
    pub(crate) string_metatable: Option<LuaValue>,
    /// math.random state, reseedable via math.randomseed.
    pub(crate) rng: rand::rngs::StdRng,
    /// os.clock epoch.
    pub(crate) start: std::time::Instant,
}

impl LuaVm {
    pub fn new() -> Self {
        let globals = LuaValue::new_table();
        let mut vm = LuaVm {
            globals: globals.clone(),
            frames: Vec::new(),
            registry: lib_registry::standard_registry(),
            loaded: HashMap::with_hasher(ahash::RandomState::new()),
            meta: MetaNames::new(),
            string_metatable: None,
            rng: rand::SeedableRng::from_entropy(),
            start: std::time::Instant::now(),
        };
        vm.set_global("_G", globals);
        vm
    }

    /// Eagerly load every registered library. Without this, module tables
    /// still load lazily the first time their identifier is referenced.
    pub fn open_libs(&mut self) {
        for name in self.registry.module_names() {
            // load failures cannot occur for the built-in set
            let _ = self.load_library(&name);
        }
    }

    /// Compile source text to an executable unit, without running it.
    pub fn compile(&mut self, source: &str) -> LuaResult<Rc<Chunk>> {
        self.compile_named(source, "chunk")
    }

    pub fn compile_named(&mut self, source: &str, chunk_name: &str) -> LuaResult<Rc<Chunk>> {
        let tree = syntax::parse(source, chunk_name)?;
        compiler::compile_chunk(&tree, chunk_name)
    }

    /// Run a compiled chunk against the ambient globals; the chunk's first
    /// return value is the result.
    pub fn execute(&mut self, chunk: Rc<Chunk>) -> LuaResult<LuaValue> {
        let closure = Rc::new(LuaClosure::new(chunk, None));
        let func = LuaValue::Function(Rc::clone(&closure));
        let results = self.call_closure(&closure, func, Vec::new())?;
        Ok(results.into_iter().next().unwrap_or(LuaValue::Nil))
    }

    /// Run a compiled chunk with a caller-supplied environment table in
    /// place of the ambient globals.
    pub fn execute_with_env(&mut self, chunk: Rc<Chunk>, env: LuaValue) -> LuaResult<LuaValue> {
        let closure = Rc::new(LuaClosure::new(chunk, None));
        *closure.env.borrow_mut() = Some(env);
        let func = LuaValue::Function(Rc::clone(&closure));
        let results = self.call_closure(&closure, func, Vec::new())?;
        Ok(results.into_iter().next().unwrap_or(LuaValue::Nil))
    }

    pub fn execute_string(&mut self, source: &str) -> LuaResult<LuaValue> {
        let chunk = self.compile(source)?;
        self.execute(chunk)
    }

    pub fn get_global(&self, name: &str) -> LuaValue {
        match &self.globals {
            LuaValue::Table(table) => {
                table.borrow().get_str(name).unwrap_or(LuaValue::Nil)
            }
            _ => LuaValue::Nil,
        }
    }

    pub fn set_global(&mut self, name: &str, value: LuaValue) {
        if let LuaValue::Table(table) = &self.globals {
            // the globals table carries no constants; this cannot fail
            let _ = table.borrow_mut().set(LuaValue::from(name), value);
        }
    }

    pub fn globals(&self) -> LuaValue {
        self.globals.clone()
    }

    /// Call any callable value from host code.
    pub fn call(&mut self, func: &LuaValue, args: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
        self.call_value(func, args)
    }

    /// Call with error capture: `(true, results)` on success, `(false,
    /// [payload])` on failure, after unwinding frames to the call depth.
    pub fn protected_call(
        &mut self,
        func: &LuaValue,
        args: Vec<LuaValue>,
    ) -> LuaResult<(bool, Vec<LuaValue>)> {
        let depth = self.frames.len();
        match self.call_value(func, args) {
            Ok(values) => Ok((true, values)),
            Err(err) => {
                self.frames.truncate(depth);
                Ok((false, vec![err.into_value()]))
            }
        }
    }

    /// `xpcall`: like `protected_call`, but the error payload is passed
    /// through the handler first.
    pub fn protected_call_with_handler(
        &mut self,
        func: &LuaValue,
        args: Vec<LuaValue>,
        handler: &LuaValue,
    ) -> LuaResult<(bool, Vec<LuaValue>)> {
        let depth = self.frames.len();
        match self.call_value(func, args) {
            Ok(values) => Ok((true, values)),
            Err(err) => {
                let payload = err.into_value();
                self.frames.truncate(depth);
                match self.call_value(handler, vec![payload]) {
                    Ok(handled) => {
                        let first = handled.into_iter().next().unwrap_or(LuaValue::Nil);
                        Ok((false, vec![first]))
                    }
                    Err(_) => {
                        self.frames.truncate(depth);
                        Ok((false, vec![LuaValue::from("error in error handling")]))
                    }
                }
            }
        }
    }

    // ===== Frame stack and error attribution =====

    pub fn stack_depth(&self) -> usize {
        self.frames.len()
    }

    /// Update the current statement line of the innermost Lua frame.
    pub(crate) fn set_line(&mut self, line: u32) {
        if let Some(frame) = self
            .frames
            .iter_mut()
            .rev()
            .find(|frame| frame.kind == FrameKind::Lua)
        {
            frame.line = line;
        }
    }

    /// `source:line:` of the nearest Lua frame, for error prefixes.
    fn current_location(&self) -> Option<(SmolStr, u32)> {
        self.frames
            .iter()
            .rev()
            .find(|frame| frame.kind == FrameKind::Lua && frame.line > 0)
            .map(|frame| (frame.source.clone(), frame.line))
    }

    /// Build a runtime error with the current source location prefixed.
    pub(crate) fn runtime_error(
        &self,
        kind: RuntimeErrorKind,
        message: impl Into<String>,
    ) -> LuaError {
        let message = message.into();
        match self.current_location() {
            Some((source, line)) => {
                LuaError::runtime(kind, format!("{}:{}: {}", source, line, message))
            }
            None => LuaError::runtime(kind, message),
        }
    }

    /// Attach the current location to a bare error raised by a value-level
    /// operation (table constant/key violations carry no position of their
    /// own).
    pub(crate) fn locate(&self, err: LuaError) -> LuaError {
        match err {
            LuaError::Runtime(inner) => self.runtime_error(inner.kind, inner.message),
            other => other,
        }
    }

    /// Frame at a user-visible stack level, where level 1 is the caller of
    /// the currently running native function.
    pub(crate) fn frame_at_level(&self, level: usize) -> Option<&CallFrame> {
        if level == 0 || level >= self.frames.len() {
            return None;
        }
        self.frames.get(self.frames.len() - 1 - level)
    }

    /// Introspection: the diagnostic name of the frame at `level` (0 = the
    /// innermost frame).
    pub fn frame_name(&self, level: usize) -> Option<&str> {
        self.frames
            .get(self.frames.len().checked_sub(level + 1)?)
            .map(|frame| frame.name.as_str())
    }

    /// A human-readable traceback of the live call stack.
    pub fn traceback(&self, message: &str) -> String {
        let mut out = format!("{}\nstack traceback:", message);
        for frame in self.frames.iter().rev() {
            match frame.kind {
                FrameKind::Lua => {
                    out.push_str(&format!(
                        "\n\t{}:{}: in function '{}'",
                        frame.source, frame.line, frame.name
                    ));
                }
                FrameKind::Native => {
                    out.push_str(&format!("\n\t[builtin]: in function '{}'", frame.name));
                }
                FrameKind::Metamethod => {
                    out.push_str(&format!("\n\t[metamethod]: in '{}'", frame.name));
                }
            }
        }
        out
    }

    // ===== Library loading =====

    /// Load a registered library into this context, caching the result;
    /// returns `None` for an unknown name.
    pub(crate) fn load_library(&mut self, name: &str) -> LuaResult<Option<LuaValue>> {
        if let Some(value) = self.loaded.get(name) {
            return Ok(Some(value.clone()));
        }
        let Some(module) = self.registry.get_module(name).cloned() else {
            return Ok(None);
        };
        let value = lib_registry::install_module(self, &module);
        self.loaded.insert(SmolStr::new(name), value.clone());
        Ok(Some(value))
    }
}

impl Default for LuaVm {
    fn default() -> Self {
        Self::new()
    }
}
