// Lua table implementation
// Slot vector (stable iteration order) plus a hashbrown index keyed by value
// Entries can be locked as constants; a parent link supports read-through
// scoped environments

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use hashbrown::HashMap;

use super::LuaValue;
use crate::lua_vm::{LuaError, LuaResult, RuntimeErrorKind};

/// One entry slot. A removed entry keeps its key as a ghost (value `None`)
/// so iteration with `next` survives removal of the current key.
struct Slot {
    key: LuaValue,
    value: Option<LuaValue>,
    constant: bool,
}

pub struct LuaTable {
    entries: Vec<Slot>,
    index: HashMap<LuaValue, usize, ahash::RandomState>,
    live: usize,
    /// One-entry cache of the last accessed slot; invalidated on removal.
    last_access: Cell<Option<usize>>,
    metatable: Option<LuaValue>,
    /// Read-through parent for hierarchical environments. Set at
    /// construction, immutable afterwards.
    parent: Option<Rc<RefCell<LuaTable>>>,
}

impl LuaTable {
    pub fn new() -> Self {
        LuaTable {
            entries: Vec::new(),
            index: HashMap::with_hasher(ahash::RandomState::new()),
            live: 0,
            last_access: Cell::new(None),
            metatable: None,
            parent: None,
        }
    }

    pub fn with_parent(parent: Rc<RefCell<LuaTable>>) -> Self {
        let mut table = LuaTable::new();
        table.parent = Some(parent);
        table
    }

    pub fn parent(&self) -> Option<&Rc<RefCell<LuaTable>>> {
        self.parent.as_ref()
    }

    pub fn metatable(&self) -> Option<LuaValue> {
        self.metatable.clone()
    }

    pub fn set_metatable(&mut self, metatable: Option<LuaValue>) {
        self.metatable = metatable;
    }

    /// Number of live entries.
    pub fn count(&self) -> usize {
        self.live
    }

    fn find(&self, key: &LuaValue) -> Option<usize> {
        if let Some(slot) = self.last_access.get() {
            if let Some(entry) = self.entries.get(slot) {
                if entry.key == *key {
                    return Some(slot);
                }
            }
        }
        let slot = self.index.get(key).copied()?;
        self.last_access.set(Some(slot));
        Some(slot)
    }

    pub fn get(&self, key: &LuaValue) -> Option<LuaValue> {
        let slot = self.find(key)?;
        self.entries[slot].value.clone()
    }

    /// Convenience lookup with a string key.
    pub fn get_str(&self, key: &str) -> Option<LuaValue> {
        self.get(&LuaValue::from(key))
    }

    pub fn has(&self, key: &LuaValue) -> bool {
        self.find(key)
            .is_some_and(|slot| self.entries[slot].value.is_some())
    }

    fn check_key(key: &LuaValue) -> LuaResult<()> {
        match key {
            LuaValue::Nil => Err(LuaError::runtime(
                RuntimeErrorKind::InvalidKey,
                "table index is nil",
            )),
            LuaValue::Number(n) if n.is_nan() => Err(LuaError::runtime(
                RuntimeErrorKind::InvalidKey,
                "table index is NaN",
            )),
            _ => Ok(()),
        }
    }

    fn constant_error(key: &LuaValue) -> LuaError {
        LuaError::runtime(
            RuntimeErrorKind::AlreadyConstant,
            format!(
                "cannot overwrite constant entry '{}'",
                key.display_raw()
            ),
        )
    }

    /// Write an entry. A nil value removes the key; removal of a key absent
    /// locally is delegated to the parent table when one exists.
    pub fn set(&mut self, key: LuaValue, value: LuaValue) -> LuaResult<()> {
        Self::check_key(&key)?;
        if value.is_nil() {
            return self.remove(&key);
        }
        match self.find(&key) {
            Some(slot) => {
                let entry = &mut self.entries[slot];
                if entry.constant {
                    return Err(Self::constant_error(&key));
                }
                if entry.value.is_none() {
                    self.live += 1;
                }
                entry.value = Some(value);
                Ok(())
            }
            None => {
                self.insert(key, value, false);
                Ok(())
            }
        }
    }

    /// Write an entry and lock it. Fails with `AlreadyConstant` when the
    /// entry is already locked; a plain entry is promoted and locked.
    pub fn set_constant(&mut self, key: LuaValue, value: LuaValue) -> LuaResult<()> {
        Self::check_key(&key)?;
        if value.is_nil() {
            return Err(LuaError::runtime(
                RuntimeErrorKind::InvalidKey,
                "constant entry cannot be nil",
            ));
        }
        match self.find(&key) {
            Some(slot) => {
                let entry = &mut self.entries[slot];
                if entry.constant {
                    return Err(Self::constant_error(&key));
                }
                if entry.value.is_none() {
                    self.live += 1;
                }
                entry.value = Some(value);
                entry.constant = true;
                Ok(())
            }
            None => {
                self.insert(key, value, true);
                Ok(())
            }
        }
    }

    fn insert(&mut self, key: LuaValue, value: LuaValue, constant: bool) {
        if self.entries.len() > 32 && self.entries.len() > self.live * 2 {
            self.compact();
        }
        let slot = self.entries.len();
        self.index.insert(key.clone(), slot);
        self.entries.push(Slot {
            key,
            value: Some(value),
            constant,
        });
        self.live += 1;
        self.last_access.set(Some(slot));
    }

    pub fn remove(&mut self, key: &LuaValue) -> LuaResult<()> {
        match self.find(key) {
            Some(slot) if self.entries[slot].value.is_some() => {
                let entry = &mut self.entries[slot];
                if entry.constant {
                    return Err(Self::constant_error(key));
                }
                entry.value = None;
                self.live -= 1;
                self.last_access.set(None);
                Ok(())
            }
            // absent locally (never present, or already a ghost): the
            // removal falls through to the parent scope when one exists
            _ => match &self.parent {
                Some(parent) => parent.borrow_mut().remove(key),
                None => Ok(()),
            },
        }
    }

    /// Drop ghost slots and rebuild the index. Only called from `insert`,
    /// i.e. under a mutation, where iteration order may legally change.
    fn compact(&mut self) {
        self.entries.retain(|entry| entry.value.is_some());
        self.index.clear();
        for (slot, entry) in self.entries.iter().enumerate() {
            self.index.insert(entry.key.clone(), slot);
        }
        self.last_access.set(None);
    }

    /// Stateless iteration: `next(nil)` yields the first entry, `next(k)`
    /// the entry after `k`'s slot, `None` past the end. The order is stable
    /// only while the table is not mutated.
    pub fn next(&self, key: &LuaValue) -> LuaResult<Option<(LuaValue, LuaValue)>> {
        let start = if key.is_nil() {
            0
        } else {
            match self.index.get(key) {
                Some(slot) => slot + 1,
                None => {
                    return Err(LuaError::runtime(
                        RuntimeErrorKind::InvalidKey,
                        "invalid key to 'next'",
                    ));
                }
            }
        };
        for entry in &self.entries[start.min(self.entries.len())..] {
            if let Some(value) = &entry.value {
                return Ok(Some((entry.key.clone(), value.clone())));
            }
        }
        Ok(None)
    }

    fn has_int(&self, n: i64) -> bool {
        self.has(&LuaValue::Number(n as f64))
    }

    /// A border: an `n` with `t[n]` present and `t[n+1]` absent. For a
    /// contiguous sequence this is its length; with holes, any valid border
    /// may be returned, as Lua itself specifies.
    pub fn length(&self) -> i64 {
        if !self.has_int(1) {
            return 0;
        }
        let mut present: i64 = 1;
        let mut absent: i64 = 2;
        while self.has_int(absent) {
            present = absent;
            if absent > i64::MAX / 2 {
                while self.has_int(present + 1) {
                    present += 1;
                }
                return present;
            }
            absent *= 2;
        }
        while absent - present > 1 {
            let middle = (present + absent) / 2;
            if self.has_int(middle) {
                present = middle;
            } else {
                absent = middle;
            }
        }
        present
    }
}

impl Default for LuaTable {
    fn default() -> Self {
        Self::new()
    }
}
