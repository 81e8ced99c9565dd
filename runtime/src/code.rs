//! Parsed script storage: code nodes and the script tree.
//!
//! Grounded on the original engine's `basic_code_node`/`basic_script`: a
//! script owns a tree of nodes built incrementally through `add_node`
//! (`parent == None` sets the root; otherwise the new node is appended as
//! the last child of `parent`). A node's `value` is present once either a
//! literal was parsed directly into it, or the resolve pass has looked its
//! `name` up in a symbol table; until then `name` is resolved afresh on
//! every evaluation.
//!
//! Nodes are `Arc`-shared (the original's `node_ptr` keeps the owning
//! script alive via `shared_ptr` aliasing); children are stored behind a
//! `Mutex` only to support incremental construction by the builder, not
//! because the tree mutates during evaluation (besides `value`, which the
//! resolver does update in place).

use std::sync::{Arc, Mutex};

use threadscript_core::{Result, SrcLocation, ThreadScriptError};

use crate::value::Value;

/// A single node of a parsed script.
#[derive(Debug)]
pub struct CodeNode {
    pub loc: SrcLocation,
    pub name: String,
    bound: Mutex<Option<Value>>,
    children: Mutex<Vec<Arc<CodeNode>>>,
}

impl CodeNode {
    fn new(loc: SrcLocation, name: impl Into<String>, value: Option<Value>) -> Arc<Self> {
        Arc::new(Self {
            loc,
            name: name.into(),
            bound: Mutex::new(value),
            children: Mutex::new(Vec::new()),
        })
    }

    /// The currently bound value, if the node has been resolved (or was
    /// parsed with a literal value).
    pub fn bound_value(&self) -> Option<Value> {
        self.bound.lock().expect("code node poisoned").clone()
    }

    /// Sets (or clears) the bound value; used by the resolve/unresolve pass.
    pub fn set_bound(&self, value: Option<Value>) {
        *self.bound.lock().expect("code node poisoned") = value;
    }

    /// A snapshot of the child list (cheap: only `Arc` clones).
    pub fn children(&self) -> Vec<Arc<CodeNode>> {
        self.children.lock().expect("code node poisoned").clone()
    }

    pub fn narg(&self) -> usize {
        self.children.lock().expect("code node poisoned").len()
    }

    fn push_child(&self, child: Arc<CodeNode>) {
        self.children.lock().expect("code node poisoned").push(child);
    }
}

impl PartialEq for CodeNode {
    /// Structural equality intended for parser tests: `value` is compared
    /// only for both being present or both absent, never by content
    /// (matching the original's documented `operator==`).
    fn eq(&self, other: &Self) -> bool {
        if self.name != other.name {
            return false;
        }
        let self_has_value = self.bound.lock().expect("code node poisoned").is_some();
        let other_has_value = other.bound.lock().expect("code node poisoned").is_some();
        if self_has_value != other_has_value {
            return false;
        }
        self.children() == other.children()
    }
}

/// A parsed script: a file name and an (incrementally built) node tree.
///
/// [`ScriptBuilder`] is the construction-time facade used by parsers; once
/// built a `Script` is wrapped in [`crate::value::ScriptValue`] to become a
/// first-class `Value`.
#[derive(Debug)]
pub struct Script {
    pub file: String,
    pub root: Arc<CodeNode>,
}

/// The builder interface a parser uses to incrementally construct a
/// [`Script`], decoupling grammar implementations from the node
/// representation (§6's "script builder interface").
pub struct ScriptBuilder {
    file: String,
    root: Mutex<Option<Arc<CodeNode>>>,
}

impl ScriptBuilder {
    pub fn create_script(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            root: Mutex::new(None),
        }
    }

    pub fn create_value_null(&self) -> Value {
        Value::Null
    }
    pub fn create_value_bool(&self, b: bool) -> Value {
        Value::new_literal_bool(b)
    }
    pub fn create_value_int(&self, i: i64) -> Value {
        Value::new_literal_int(i)
    }
    pub fn create_value_unsigned(&self, u: u64) -> Value {
        Value::new_literal_unsigned(u)
    }
    pub fn create_value_string(&self, s: impl Into<String>) -> Value {
        Value::new_literal_string(s)
    }

    /// Creates a new node. If `parent` is `None` it becomes the script's
    /// root (failing if one already exists); otherwise it is appended as
    /// the last child of `parent`.
    pub fn add_node(
        &self,
        parent: Option<&Arc<CodeNode>>,
        loc: SrcLocation,
        name: impl Into<String>,
        value: Option<Value>,
    ) -> Result<Arc<CodeNode>> {
        let node = CodeNode::new(loc.clone(), name, value);
        match parent {
            Some(p) => p.push_child(Arc::clone(&node)),
            None => {
                let mut root = self.root.lock().expect("script builder poisoned");
                if root.is_some() {
                    return Err(ThreadScriptError::parse_error(
                        "a root node already exists",
                        loc,
                    ));
                }
                *root = Some(Arc::clone(&node));
            }
        }
        Ok(node)
    }

    pub fn finish(self) -> Result<Script> {
        let root = self
            .root
            .into_inner()
            .expect("script builder poisoned")
            .ok_or_else(|| {
                ThreadScriptError::parse_error("empty script", SrcLocation::unknown())
            })?;
        Ok(Script {
            file: self.file,
            root,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_node_sets_root_once() {
        let b = ScriptBuilder::create_script("t.ts");
        let v = b.create_value_int(1);
        let root = b
            .add_node(None, SrcLocation::unknown(), "", Some(v))
            .unwrap();
        assert!(b.add_node(None, SrcLocation::unknown(), "", None).is_err());
        assert_eq!(root.narg(), 0);
    }

    #[test]
    fn add_node_appends_child_in_order() {
        let b = ScriptBuilder::create_script("t.ts");
        let root = b
            .add_node(None, SrcLocation::unknown(), "print", None)
            .unwrap();
        let c1 = b
            .add_node(Some(&root), SrcLocation::unknown(), "", Some(b.create_value_int(1)))
            .unwrap();
        let c2 = b
            .add_node(Some(&root), SrcLocation::unknown(), "", Some(b.create_value_int(2)))
            .unwrap();
        let children = root.children();
        assert_eq!(children.len(), 2);
        assert!(Arc::ptr_eq(&children[0], &c1));
        assert!(Arc::ptr_eq(&children[1], &c2));
    }

    #[test]
    fn structural_equality_ignores_value_content() {
        let b = ScriptBuilder::create_script("t.ts");
        let n1 = b
            .add_node(None, SrcLocation::unknown(), "", Some(b.create_value_int(1)))
            .unwrap();
        let n2 = b
            .add_node(None, SrcLocation::unknown(), "", Some(b.create_value_int(999)))
            .unwrap();
        // Two independent single-node trees with differing literal content
        // but the same "has a value" shape compare equal.
        assert_eq!(*n1, *n2);
    }
}
