//! `shared_vector` — a vector object that is always mt-safe and mutable
//! from any thread.
//!
//! Grounded on `shared_vector.hpp`/`shared_vector_impl.hpp`: unlike the
//! plain `vector` value (whose mt-safe transition freezes it), every
//! `shared_vector` is thread-safe by construction and stays writable,
//! synchronized internally by a mutex rather than by the one-way mt-safe
//! flag. Methods: `at(idx[, value])`, `erase([idx])`, `size()`.

use std::sync::{Arc, Mutex};

use threadscript_core::{Result, ThreadScriptError};

use crate::builtins::util::account_growth;
use crate::code::CodeNode;
use crate::state::ThreadState;
use crate::symbol::SymbolTable;
use crate::value::{ObjectValue, Value};

#[derive(Debug, Default)]
pub struct SharedVector {
    data: Mutex<Vec<Value>>,
}

impl SharedVector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

impl ObjectValue for SharedVector {
    fn class_name(&self) -> &'static str {
        "shared_vector"
    }

    fn call_method(
        &self,
        thread: &mut ThreadState,
        l_vars: &Arc<SymbolTable>,
        node: &Arc<CodeNode>,
        method: &str,
    ) -> Result<Value> {
        let narg = node.narg();
        match method {
            "at" => {
                if narg != 2 && narg != 3 {
                    return Err(ThreadScriptError::op_narg());
                }
                let idx = thread.arg(l_vars, node, 1)?.expect_index()?;
                let mut data = self.data.lock().expect("shared_vector poisoned");
                if narg == 3 {
                    let value = thread.arg(l_vars, node, 2)?;
                    if !value.is_null() && !value.mt_safe() {
                        return Err(ThreadScriptError::value_mt_unsafe());
                    }
                    if idx >= data.len() {
                        account_growth(thread, (idx + 1 - data.len()) as u64)?;
                        data.resize(idx + 1, Value::Null);
                    }
                    data[idx] = value.clone();
                    Ok(value)
                } else {
                    data.get(idx)
                        .cloned()
                        .ok_or_else(ThreadScriptError::value_out_of_range)
                }
            }
            "erase" => {
                if narg != 1 && narg != 2 {
                    return Err(ThreadScriptError::op_narg());
                }
                let mut data = self.data.lock().expect("shared_vector poisoned");
                if narg == 2 {
                    let idx = thread.arg(l_vars, node, 1)?.expect_index()?;
                    if idx < data.len() {
                        data.truncate(idx);
                        shrink_if_sparse(&mut data);
                    }
                } else {
                    data.clear();
                    data.shrink_to_fit();
                }
                Ok(Value::Null)
            }
            "size" => {
                if narg != 1 {
                    return Err(ThreadScriptError::op_narg());
                }
                let data = self.data.lock().expect("shared_vector poisoned");
                Ok(Value::new_unsigned(data.len() as u64))
            }
            _ => Err(ThreadScriptError::not_implemented(method.to_string())),
        }
    }
}

/// Shrinks storage once occupancy drops below a third of capacity, matching
/// the growth/shrink discipline documented for `vm_data.hpp`'s value
/// containers.
fn shrink_if_sparse(data: &mut Vec<Value>) {
    if data.capacity() > 0 && data.len() < data.capacity() / 3 {
        data.shrink_to_fit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::ScriptBuilder;
    use crate::state::Vm;
    use threadscript_core::{Allocator, SrcLocation};

    fn call_node(b: &ScriptBuilder, method: &str, args: Vec<Value>) -> Arc<CodeNode> {
        let node = b
            .add_node(None, SrcLocation::unknown(), "", None)
            .unwrap();
        b.add_node(
            Some(&node),
            SrcLocation::unknown(),
            "",
            Some(b.create_value_string(method)),
        )
        .unwrap();
        for a in args {
            b.add_node(Some(&node), SrcLocation::unknown(), "", Some(a))
                .unwrap();
        }
        node
    }

    #[test]
    fn extends_with_nulls_on_out_of_order_set() {
        let vm = Arc::new(Vm::new());
        let mut thread = vm.new_thread_state(10, Allocator::default());
        let l_vars = thread.top_locals_for_test();
        let v = SharedVector::new();
        let b = ScriptBuilder::create_script("t.ts");
        let node = call_node(&b, "at", vec![Value::new_literal_unsigned(2), Value::new_literal_int(9)]);
        v.call_method(&mut thread, &l_vars, &node, "at").unwrap();
        let size_node = call_node(&b, "size", vec![]);
        let size = v.call_method(&mut thread, &l_vars, &size_node, "size").unwrap();
        assert_eq!(size.type_name(), "unsigned");
        let get0 = call_node(&b, "at", vec![Value::new_literal_unsigned(0)]);
        let got = v.call_method(&mut thread, &l_vars, &get0, "at").unwrap();
        assert!(got.is_null());
    }

    #[test]
    fn set_rejects_non_mt_safe_value() {
        let vm = Arc::new(Vm::new());
        let mut thread = vm.new_thread_state(10, Allocator::default());
        let l_vars = thread.top_locals_for_test();
        let v = SharedVector::new();
        let b = ScriptBuilder::create_script("t.ts");
        let node = call_node(&b, "at", vec![Value::new_literal_unsigned(0), Value::new_int(1)]);
        let err = v.call_method(&mut thread, &l_vars, &node, "at").unwrap_err();
        assert!(matches!(
            err.kind,
            threadscript_core::ErrorKind::ValueMtUnsafe
        ));
    }
}
