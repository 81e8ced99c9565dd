//! Symbol tables: a thread-local chain of name-to-value bindings.
//!
//! Mirrors the original engine's `basic_symbol_table`: a table holds its own
//! bindings plus a (possibly absent) parent to search when a lookup misses
//! locally. The original uses a non-owning raw pointer to the parent under
//! the guarantee that the parent outlives every child; we use `Arc` instead,
//! the ownership-safe analogue of that same guarantee (Design Notes §9).
//!
//! Every table is internally synchronized (`Mutex`) even though most tables
//! are only ever touched by their owning thread: the VM's shared-globals
//! snapshot is published through [`arc_swap::ArcSwap`] and read concurrently
//! by every thread, so `SymbolTable` must be `Send + Sync` uniformly rather
//! than split into a thread-local and a shared variant.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::value::Value;

#[derive(Debug, Default)]
struct Bindings(HashMap<String, Value>);

/// A name-to-value binding table with an optional parent for chained
/// lookups.
#[derive(Debug)]
pub struct SymbolTable {
    bindings: Mutex<Bindings>,
    parent: Option<Arc<SymbolTable>>,
}

impl SymbolTable {
    pub fn new(parent: Option<Arc<SymbolTable>>) -> Self {
        Self {
            bindings: Mutex::new(Bindings::default()),
            parent,
        }
    }

    pub fn root() -> Self {
        Self::new(None)
    }

    /// `true` if `name` is bound here, or (if `use_parent`) in an ancestor.
    pub fn contains(&self, name: &str, use_parent: bool) -> bool {
        if self.bindings.lock().expect("symbol table poisoned").0.contains_key(name) {
            return true;
        }
        use_parent
            && self
                .parent
                .as_ref()
                .is_some_and(|p| p.contains(name, true))
    }

    /// Looks up `name`, searching ancestors if `use_parent` and not found
    /// locally.
    pub fn lookup(&self, name: &str, use_parent: bool) -> Option<Value> {
        if let Some(v) = self.bindings.lock().expect("symbol table poisoned").0.get(name) {
            return Some(v.clone());
        }
        if use_parent {
            if let Some(parent) = &self.parent {
                return parent.lookup(name, true);
            }
        }
        None
    }

    /// Binds `name` to `value` in *this* table only, overwriting any
    /// existing local binding (never touches ancestors).
    pub fn insert_or_assign(&self, name: String, value: Value) {
        self.bindings
            .lock()
            .expect("symbol table poisoned")
            .0
            .insert(name, value);
    }

    /// Removes a local binding, returning whether one existed.
    pub fn erase(&self, name: &str) -> bool {
        self.bindings
            .lock()
            .expect("symbol table poisoned")
            .0
            .remove(name)
            .is_some()
    }

    /// Builds a fresh table with `self`'s local bindings but a new parent.
    /// Used by a thread's opt-in re-resolve (`ThreadState::refresh_globals`)
    /// to adopt a shared-globals snapshot published after the thread was
    /// created, without losing bindings the thread made on its own table.
    pub fn rebase(&self, new_parent: Arc<SymbolTable>) -> SymbolTable {
        let copy = self
            .bindings
            .lock()
            .expect("symbol table poisoned")
            .0
            .clone();
        SymbolTable {
            bindings: Mutex::new(Bindings(copy)),
            parent: Some(new_parent),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_binding_shadows_parent() {
        let parent = Arc::new(SymbolTable::root());
        parent.insert_or_assign("x".into(), Value::new_int(1));
        let child = SymbolTable::new(Some(parent.clone()));
        child.insert_or_assign("x".into(), Value::new_int(2));
        assert_eq!(child.lookup("x", true).unwrap().expect_int().unwrap(), 2);
        assert_eq!(parent.lookup("x", true).unwrap().expect_int().unwrap(), 1);
    }

    #[test]
    fn lookup_falls_through_to_parent() {
        let parent = Arc::new(SymbolTable::root());
        parent.insert_or_assign("y".into(), Value::new_int(9));
        let child = SymbolTable::new(Some(parent));
        assert_eq!(child.lookup("y", true).unwrap().expect_int().unwrap(), 9);
    }

    #[test]
    fn lookup_without_parent_flag_is_local_only() {
        let parent = Arc::new(SymbolTable::root());
        parent.insert_or_assign("z".into(), Value::new_int(1));
        let child = SymbolTable::new(Some(parent));
        assert!(child.lookup("z", false).is_none());
        assert!(!child.contains("z", false));
    }

    #[test]
    fn erase_only_affects_local_table() {
        let parent = Arc::new(SymbolTable::root());
        parent.insert_or_assign("a".into(), Value::new_int(1));
        let child = SymbolTable::new(Some(parent.clone()));
        assert!(!child.erase("a"));
        assert!(parent.lookup("a", false).is_some());
    }
}
