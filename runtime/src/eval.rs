//! The tree-walking evaluation engine.
//!
//! `eval_node` is the one recursive entry point every other evaluation path
//! (function bodies, builtin argument fetches, object method dispatch)
//! funnels through. It implements §4.3's five-step dispatch: update the
//! current frame's location, resolve the node's value (bound value, or a
//! symbol-table lookup by name), short-circuit `null`, and otherwise hand
//! off to [`Value::eval`].

use std::sync::Arc;

use threadscript_core::Result;

use crate::code::CodeNode;
use crate::state::ThreadState;
use crate::symbol::SymbolTable;
use crate::value::Value;

pub fn eval_node(
    thread: &mut ThreadState,
    l_vars: &Arc<SymbolTable>,
    node: &Arc<CodeNode>,
) -> Result<Value> {
    thread.update_location(node.loc.clone());
    let value = match node.bound_value() {
        Some(v) => v,
        None => l_vars
            .lookup(&node.name, true)
            .ok_or_else(|| threadscript_core::ThreadScriptError::unknown_symbol(node.name.clone()))?,
    };
    if value.is_null() {
        return Ok(Value::Null);
    }
    value.eval(thread, l_vars, node, &node.name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::ScriptBuilder;
    use crate::state::{ThreadState, Vm};
    use threadscript_core::{Allocator, SrcLocation};

    fn fresh_thread(vm: &Arc<Vm>) -> ThreadState {
        vm.new_thread_state(1024, Allocator::default())
    }

    #[test]
    fn literal_node_evaluates_to_itself() {
        let vm = Arc::new(Vm::new());
        let mut thread = fresh_thread(&vm);
        let b = ScriptBuilder::create_script("t.ts");
        let node = b
            .add_node(None, SrcLocation::unknown(), "", Some(b.create_value_int(7)))
            .unwrap();
        let l_vars = thread.top_locals_for_test();
        let result = eval_node(&mut thread, &l_vars, &node).unwrap();
        assert_eq!(result.expect_int().unwrap(), 7);
    }

    #[test]
    fn unresolved_name_looks_up_symbol_table() {
        let vm = Arc::new(Vm::new());
        let mut thread = fresh_thread(&vm);
        let l_vars = thread.top_locals_for_test();
        l_vars.insert_or_assign("x".to_string(), Value::new_int(42));
        let b = ScriptBuilder::create_script("t.ts");
        let node = b.add_node(None, SrcLocation::unknown(), "x", None).unwrap();
        let result = eval_node(&mut thread, &l_vars, &node).unwrap();
        assert_eq!(result.expect_int().unwrap(), 42);
    }

    #[test]
    fn unknown_name_is_an_error() {
        let vm = Arc::new(Vm::new());
        let mut thread = fresh_thread(&vm);
        let l_vars = thread.top_locals_for_test();
        let b = ScriptBuilder::create_script("t.ts");
        let node = b
            .add_node(None, SrcLocation::unknown(), "nope", None)
            .unwrap();
        let err = eval_node(&mut thread, &l_vars, &node).unwrap_err();
        assert!(matches!(
            err.kind,
            threadscript_core::ErrorKind::UnknownSymbol(_)
        ));
    }
}
