//! The resolve/unresolve pass (§4.2): converts the `O(depth)` name lookups
//! a freshly parsed tree performs on every evaluation into an `O(1)` bound
//! value per node, and lets a VM freeze builtin/global semantics before
//! worker threads start.

use std::sync::Arc;

use crate::code::CodeNode;
use crate::symbol::SymbolTable;

/// Walks `node` and its descendants, binding each named node (`name` is
/// non-empty) to a value found in `table`:
///
/// - `replace == false`: only binds nodes that are not already bound.
/// - `replace == true`: also overwrites existing bindings.
/// - In both cases, a binding is only made when the looked-up value is
///   `null` or mt-safe — a non-mt-safe value cannot be embedded into a
///   tree that must remain safely shareable across threads.
/// - `remove == true`: if the lookup misses and the node currently has a
///   bound value, the binding is cleared (falling back to a fresh
///   per-evaluation lookup).
///
/// Pure literal nodes (empty `name`) are left untouched.
pub fn resolve(node: &Arc<CodeNode>, table: &SymbolTable, replace: bool, remove: bool) {
    if !node.name.is_empty() {
        match table.lookup(&node.name, true) {
            Some(value) => {
                let already_bound = node.bound_value().is_some();
                if (!already_bound || replace) && (value.is_null() || value.mt_safe()) {
                    node.set_bound(Some(value));
                }
            }
            None => {
                if remove && node.bound_value().is_some() {
                    node.set_bound(None);
                }
            }
        }
    }
    for child in node.children() {
        resolve(&child, table, replace, remove);
    }
}

/// Clears the bound value of every named node in the tree (pure literals
/// are untouched).
pub fn unresolve(node: &Arc<CodeNode>) {
    if !node.name.is_empty() {
        node.set_bound(None);
    }
    for child in node.children() {
        unresolve(&child);
    }
}
