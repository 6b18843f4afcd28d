// Code generator: statement/expression tree -> executable operation graph
// Identifier resolution goes through the scope graph; everything unresolved
// lowers to dispatch-protected environment lookups

mod code;
mod expr;
pub mod scope;
mod stmt;

pub use code::{Chunk, CodeBlock, ExprList, ExprOp, FieldOp, Op, Target};
pub use scope::{Resolved, Scope, ScopeKind};

use std::cell::RefCell;
use std::rc::Rc;

use smol_str::SmolStr;

use crate::ast;
use crate::lua_vm::{LuaError, LuaResult};

/// Compile a parsed chunk into its executable unit. Pure: the result depends
/// only on the tree and the chunk name.
pub fn compile_chunk(tree: &ast::Block, chunk_name: &str) -> LuaResult<Rc<Chunk>> {
    let root = Scope::function_root(None);
    let mut compiler = FuncCompiler {
        chunk_name,
        scope: Rc::clone(&root),
        func_scope: root,
        upvalue_names: Vec::new(),
        is_vararg: true,
    };
    let body = compiler.compile_body(tree)?;
    let local_names = compiler.func_scope.borrow().local_names();
    Ok(Rc::new(Chunk {
        name: SmolStr::new("main chunk"),
        source: SmolStr::new(chunk_name),
        param_count: 0,
        is_vararg: true,
        body,
        local_names,
        upvalue_names: compiler.upvalue_names,
        span: ast::Span::new(1),
    }))
}

/// Per-function compilation state. The scope chain stays connected across
/// nested functions so upvalue resolution can cross the boundary.
pub(crate) struct FuncCompiler<'a> {
    pub(crate) chunk_name: &'a str,
    /// Innermost scope currently being compiled into.
    pub(crate) scope: Rc<RefCell<Scope>>,
    /// This function's root scope (parameters + function-level locals).
    pub(crate) func_scope: Rc<RefCell<Scope>>,
    /// Names resolved as upvalues while compiling this function.
    pub(crate) upvalue_names: Vec<SmolStr>,
    pub(crate) is_vararg: bool,
}

impl<'a> FuncCompiler<'a> {
    pub(crate) fn error(&self, message: impl Into<String>, line: u32) -> LuaError {
        LuaError::syntax(
            format!("{}:{}: {}", self.chunk_name, line, message.into()),
            line,
        )
    }

    /// Compile a block into the current scope (used for function bodies,
    /// whose locals live in the root arena next to the parameters).
    pub(crate) fn compile_body(&mut self, block: &ast::Block) -> LuaResult<CodeBlock> {
        self.prescan_labels(block);
        let mut ops = Vec::new();
        let mut labels = Vec::new();
        for stat in &block.stats {
            self.compile_stat(stat, &mut ops, &mut labels)?;
        }
        let arena = self.scope.borrow().slot_count();
        Ok(CodeBlock { ops, arena, labels })
    }

    /// Compile a block in a fresh child scope of the given kind.
    pub(crate) fn compile_block(
        &mut self,
        block: &ast::Block,
        kind: ScopeKind,
    ) -> LuaResult<CodeBlock> {
        let parent = Rc::clone(&self.scope);
        self.scope = Scope::child(Rc::clone(&parent), kind);
        let result = self.compile_body(block);
        self.scope = parent;
        result
    }

    /// Labels are visible to the whole block, including statements that
    /// precede them (forward gotos).
    fn prescan_labels(&mut self, block: &ast::Block) {
        for stat in &block.stats {
            if let ast::Stat::Label { name, .. } = stat {
                self.scope.borrow_mut().declare_label(name);
            }
        }
    }

    /// Compile a nested function literal. Its root scope hangs off the
    /// current scope so free names resolve as upvalues of this function.
    pub(crate) fn compile_function(
        &mut self,
        name: &str,
        body: &ast::FunctionBody,
    ) -> LuaResult<Rc<Chunk>> {
        let root = Scope::function_root(Some(Rc::clone(&self.scope)));
        let mut inner = FuncCompiler {
            chunk_name: self.chunk_name,
            scope: Rc::clone(&root),
            func_scope: Rc::clone(&root),
            upvalue_names: Vec::new(),
            is_vararg: body.is_vararg,
        };
        for param in &body.params {
            inner.func_scope.borrow_mut().declare_parameter(param);
        }
        let code = inner.compile_body(&body.body)?;
        let local_names = root.borrow().local_names();
        Ok(Rc::new(Chunk {
            name: SmolStr::new(name),
            source: SmolStr::new(self.chunk_name),
            param_count: body.params.len(),
            is_vararg: body.is_vararg,
            body: code,
            local_names,
            upvalue_names: inner.upvalue_names,
            span: body.span,
        }))
    }

    pub(crate) fn resolve_name(&mut self, name: &str) -> Resolved {
        let resolved = scope::resolve(&self.scope, name);
        if let Resolved::Upvalue { .. } = resolved {
            if !self.upvalue_names.iter().any(|n| n == name) {
                self.upvalue_names.push(SmolStr::new(name));
            }
        }
        resolved
    }
}
