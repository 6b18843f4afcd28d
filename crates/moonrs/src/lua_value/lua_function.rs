// Closures and activation records
// An activation is one runtime instance of a scope's slot arena; closures
// keep their defining activation alive through the parent chain

use std::cell::RefCell;
use std::rc::Rc;

use super::LuaValue;
use crate::compiler::Chunk;

/// Runtime storage for one scope instance. Block entry and every loop
/// iteration create a fresh activation, so closures made inside a loop body
/// capture that iteration's variables.
pub struct Activation {
    slots: RefCell<Vec<LuaValue>>,
    parent: Option<Rc<Activation>>,
}

impl Activation {
    pub fn new(size: usize, parent: Option<Rc<Activation>>) -> Rc<Activation> {
        Rc::new(Activation {
            slots: RefCell::new(vec![LuaValue::Nil; size]),
            parent,
        })
    }

    fn ancestor(&self, hops: u16) -> &Activation {
        let mut scope = self;
        for _ in 0..hops {
            scope = scope
                .parent
                .as_deref()
                .expect("activation chain shorter than resolved depth");
        }
        scope
    }

    pub fn get(&self, hops: u16, index: u16) -> LuaValue {
        self.ancestor(hops).slots.borrow()[index as usize].clone()
    }

    pub fn set(&self, hops: u16, index: u16, value: LuaValue) {
        self.ancestor(hops).slots.borrow_mut()[index as usize] = value;
    }
}

/// A compiled Lua function bound to its defining scope chain.
pub struct LuaClosure {
    pub chunk: Rc<Chunk>,
    /// The activation of the lexically enclosing scope at closure-creation
    /// time; `None` only for the main chunk.
    pub captured: Option<Rc<Activation>>,
    /// Environment override installed by `setfenv`; global resolution in the
    /// body goes through this table instead of the ambient globals.
    pub env: RefCell<Option<LuaValue>>,
}

impl LuaClosure {
    pub fn new(chunk: Rc<Chunk>, captured: Option<Rc<Activation>>) -> Self {
        LuaClosure {
            chunk,
            captured,
            env: RefCell::new(None),
        }
    }
}
