// Lexical scope graph
// A tree of nested scopes resolving identifiers to local slots, upvalues, or
// globals; each scope maps one-to-one onto a runtime activation level

use std::cell::RefCell;
use std::rc::Rc;

use smol_str::SmolStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    /// Function root: owns parameters, stops break/label visibility.
    Function,
    Block,
    /// A block that is also a break target.
    Loop,
}

#[derive(Debug, Clone)]
struct LocalVar {
    name: SmolStr,
    slot: u16,
}

/// One node of the scope tree. The local list only grows while the scope's
/// body compiles; redeclaring a name appends a new slot that shadows the old
/// one for the rest of the block.
pub struct Scope {
    parent: Option<Rc<RefCell<Scope>>>,
    kind: ScopeKind,
    locals: Vec<LocalVar>,
    labels: Vec<SmolStr>,
    slot_count: usize,
}

/// Resolution result: where an identifier reference lands. `hops` counts
/// activation levels upward from the referencing scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolved {
    Local { hops: u16, slot: u16 },
    Upvalue { hops: u16, slot: u16 },
    Global,
}

impl Scope {
    pub fn function_root(parent: Option<Rc<RefCell<Scope>>>) -> Rc<RefCell<Scope>> {
        Rc::new(RefCell::new(Scope {
            parent,
            kind: ScopeKind::Function,
            locals: Vec::new(),
            labels: Vec::new(),
            slot_count: 0,
        }))
    }

    pub fn child(parent: Rc<RefCell<Scope>>, kind: ScopeKind) -> Rc<RefCell<Scope>> {
        Rc::new(RefCell::new(Scope {
            parent: Some(parent),
            kind,
            locals: Vec::new(),
            labels: Vec::new(),
            slot_count: 0,
        }))
    }

    pub fn kind(&self) -> ScopeKind {
        self.kind
    }

    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    /// Declare a local, returning its slot in this scope's arena. A name
    /// already present gets a fresh slot; the old one stays reachable from
    /// code compiled before this point.
    pub fn declare_local(&mut self, name: &str) -> u16 {
        let slot = self.slot_count as u16;
        self.slot_count += 1;
        self.locals.push(LocalVar {
            name: SmolStr::new(name),
            slot,
        });
        slot
    }

    /// Parameters are ordinary leading slots of a function-root scope.
    pub fn declare_parameter(&mut self, name: &str) -> u16 {
        debug_assert_eq!(self.kind, ScopeKind::Function);
        self.declare_local(name)
    }

    fn find_local(&self, name: &str) -> Option<u16> {
        self.locals
            .iter()
            .rev()
            .find(|local| local.name == name)
            .map(|local| local.slot)
    }

    pub fn declare_label(&mut self, name: &str) {
        self.labels.push(SmolStr::new(name));
    }

    fn has_label(&self, name: &str) -> bool {
        self.labels.iter().any(|label| label == name)
    }

    /// Ordered slot names, used for call-frame snapshots.
    pub fn local_names(&self) -> Vec<SmolStr> {
        self.locals.iter().map(|local| local.name.clone()).collect()
    }
}

/// Walk the chain innermost-outward; the first scope owning the name decides.
/// Crossing a function boundary turns the result into an upvalue.
pub fn resolve(scope: &Rc<RefCell<Scope>>, name: &str) -> Resolved {
    let mut current = Rc::clone(scope);
    let mut hops: u16 = 0;
    let mut crossed_function = false;
    loop {
        let next = {
            let borrowed = current.borrow();
            if let Some(slot) = borrowed.find_local(name) {
                return if crossed_function {
                    Resolved::Upvalue { hops, slot }
                } else {
                    Resolved::Local { hops, slot }
                };
            }
            if borrowed.kind == ScopeKind::Function {
                crossed_function = true;
            }
            borrowed.parent.clone()
        };
        match next {
            Some(parent) => {
                current = parent;
                hops += 1;
            }
            None => return Resolved::Global,
        }
    }
}

/// True when a `break` here has a loop to leave; visibility stops at the
/// enclosing function boundary.
pub fn break_allowed(scope: &Rc<RefCell<Scope>>) -> bool {
    let mut current = Rc::clone(scope);
    loop {
        let next = {
            let borrowed = current.borrow();
            if borrowed.kind == ScopeKind::Loop {
                return true;
            }
            if borrowed.kind == ScopeKind::Function {
                return false;
            }
            borrowed.parent.clone()
        };
        match next {
            Some(parent) => current = parent,
            None => return false,
        }
    }
}

/// True when a `goto` here can reach the named label in this or an enclosing
/// block of the same function.
pub fn label_visible(scope: &Rc<RefCell<Scope>>, name: &str) -> bool {
    let mut current = Rc::clone(scope);
    loop {
        let next = {
            let borrowed = current.borrow();
            if borrowed.has_label(name) {
                return true;
            }
            if borrowed.kind == ScopeKind::Function {
                return false;
            }
            borrowed.parent.clone()
        };
        match next {
            Some(parent) => current = parent,
            None => return false,
        }
    }
}
