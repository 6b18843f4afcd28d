// Compiled representation: one executable operation graph per function
// Identifier references are resolved to (hops, slot) pairs into the runtime
// activation chain; globals stay by-name and go through the dispatch protocol

use std::rc::Rc;

use smol_str::SmolStr;

use crate::ast::{BinOp, Span, UnOp};

/// A compiled function unit. The root block's arena holds the parameters
/// followed by the function-level locals.
pub struct Chunk {
    /// Dotted diagnostic name, e.g. `obj.handler` or `main chunk`.
    pub name: SmolStr,
    /// Source (chunk) name used in `source:line:` error prefixes.
    pub source: SmolStr,
    pub param_count: usize,
    pub is_vararg: bool,
    pub body: CodeBlock,
    /// Slot names of the root scope, for call-frame introspection.
    pub local_names: Vec<SmolStr>,
    /// Names this function captures from enclosing functions.
    pub upvalue_names: Vec<SmolStr>,
    pub span: Span,
}

/// A block of operations together with the size of its slot arena. Entering
/// the block creates a fresh activation of `arena` slots; labels map to the
/// operation index to resume from on `goto`.
pub struct CodeBlock {
    pub ops: Vec<Op>,
    pub arena: usize,
    pub labels: Vec<(SmolStr, usize)>,
}

impl CodeBlock {
    pub fn label_target(&self, name: &str) -> Option<usize> {
        self.labels
            .iter()
            .find(|(label, _)| label == name)
            .map(|(_, target)| *target)
    }
}

/// An expression list in assignment/return/call position. The executor
/// applies the "last expression expands" rule when the final expression is a
/// call or vararg.
pub struct ExprList {
    pub exprs: Vec<ExprOp>,
}

pub enum Op {
    /// An expression evaluated for its effects (a call statement).
    Eval { expr: ExprOp, line: u32 },
    /// `local a, b = ...` writing freshly declared slots of the current
    /// block; redeclared names get distinct slots.
    Local {
        slots: Vec<u16>,
        values: ExprList,
        line: u32,
    },
    Assign {
        targets: Vec<Target>,
        values: ExprList,
        line: u32,
    },
    Do(CodeBlock),
    While {
        cond: ExprOp,
        body: CodeBlock,
        line: u32,
    },
    /// The until condition is compiled in the body's scope and evaluated in
    /// the same activation as the iteration that just ran.
    Repeat {
        body: CodeBlock,
        cond: ExprOp,
        line: u32,
    },
    If {
        arms: Vec<(ExprOp, CodeBlock)>,
        orelse: Option<CodeBlock>,
        line: u32,
    },
    /// Control variable lives in slot 0 of a one-slot activation created
    /// fresh for every iteration.
    NumericFor {
        start: ExprOp,
        limit: ExprOp,
        step: Option<ExprOp>,
        body: CodeBlock,
        line: u32,
    },
    /// Loop variables live in slots 0..vars of a fresh per-iteration
    /// activation; the iterator triple is evaluated once.
    GenericFor {
        vars: usize,
        exprs: ExprList,
        body: CodeBlock,
        line: u32,
    },
    Return { values: ExprList, line: u32 },
    Break { line: u32 },
    Goto { label: SmolStr, line: u32 },
    /// Jump target; executing it is a no-op.
    Label { name: SmolStr },
}

pub enum Target {
    /// A resolved local or upvalue slot.
    Slot { hops: u16, index: u16 },
    /// A global write against the effective environment.
    Global { name: Rc<str>, line: u32 },
    /// `obj[key] = v` through the NewIndex dispatch.
    Index {
        obj: ExprOp,
        key: ExprOp,
        line: u32,
    },
}

pub enum ExprOp {
    Nil,
    True,
    False,
    Number(f64),
    Str(Rc<str>),
    Vararg { line: u32 },
    /// A resolved local or upvalue read.
    Slot { hops: u16, index: u16 },
    Global { name: Rc<str>, line: u32 },
    Index {
        obj: Box<ExprOp>,
        key: Box<ExprOp>,
        line: u32,
    },
    Call {
        func: Box<ExprOp>,
        args: Vec<ExprOp>,
        line: u32,
    },
    /// `obj:name(...)` - evaluates `obj` once, passes it as the first
    /// argument.
    MethodCall {
        obj: Box<ExprOp>,
        name: Rc<str>,
        args: Vec<ExprOp>,
        line: u32,
    },
    Binary {
        op: BinOp,
        lhs: Box<ExprOp>,
        rhs: Box<ExprOp>,
        line: u32,
    },
    /// Short-circuit forms; the right operand is only evaluated when the
    /// left one does not decide the result.
    And {
        lhs: Box<ExprOp>,
        rhs: Box<ExprOp>,
    },
    Or {
        lhs: Box<ExprOp>,
        rhs: Box<ExprOp>,
    },
    Unary {
        op: UnOp,
        operand: Box<ExprOp>,
        line: u32,
    },
    /// Closure creation: captures the current activation as the defining
    /// scope of the new function.
    Closure { chunk: Rc<Chunk> },
    Table { fields: Vec<FieldOp>, line: u32 },
    /// Parenthesized expression: truncates a multi-value result to one.
    Paren(Box<ExprOp>),
}

impl ExprOp {
    /// True when this expression spreads all of its results in the final
    /// position of an expression list.
    pub fn is_multi(&self) -> bool {
        matches!(
            self,
            ExprOp::Call { .. } | ExprOp::MethodCall { .. } | ExprOp::Vararg { .. }
        )
    }
}

pub enum FieldOp {
    Item(ExprOp),
    Named(Rc<str>, ExprOp),
    Keyed(ExprOp, ExprOp),
}
