//! `shared_hash` — a string-keyed hash object that is always mt-safe and
//! mutable from any thread.
//!
//! Grounded on `shared_hash.hpp`/`shared_hash_impl.hpp`. Methods:
//! `at(key[, value])`, `contains(key)`, `erase([key])`, `keys()`, `size()`.
//! `keys()` returns a plain (non-shared) `vector` of mt-safe strings, per
//! the original's note that the returned vector's *elements* are mt-safe
//! even though the vector itself is an ordinary, non-shared container.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use threadscript_core::{Result, ThreadScriptError};

use crate::builtins::util::account_growth;
use crate::code::CodeNode;
use crate::state::ThreadState;
use crate::symbol::SymbolTable;
use crate::value::{ObjectValue, Value};

#[derive(Debug, Default)]
pub struct SharedHash {
    data: Mutex<BTreeMap<String, Value>>,
}

impl SharedHash {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

impl ObjectValue for SharedHash {
    fn class_name(&self) -> &'static str {
        "shared_hash"
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
                let key = thread.arg(l_vars, node, 1)?.expect_string()?;
                let mut data = self.data.lock().expect("shared_hash poisoned");
                if narg == 3 {
                    let value = thread.arg(l_vars, node, 2)?;
                    if !value.is_null() && !value.mt_safe() {
                        return Err(ThreadScriptError::value_mt_unsafe());
                    }
                    if !data.contains_key(&key) {
                        account_growth(thread, 1)?;
                    }
                    data.insert(key, value.clone());
                    Ok(value)
                } else {
                    data.get(&key)
                        .cloned()
                        .ok_or_else(ThreadScriptError::value_out_of_range)
                }
            }
            "contains" => {
                if narg != 2 {
                    return Err(ThreadScriptError::op_narg());
                }
                let key = thread.arg(l_vars, node, 1)?.expect_string()?;
                let data = self.data.lock().expect("shared_hash poisoned");
                Ok(Value::new_bool(data.contains_key(&key)))
            }
            "erase" => {
                if narg != 1 && narg != 2 {
                    return Err(ThreadScriptError::op_narg());
                }
                let mut data = self.data.lock().expect("shared_hash poisoned");
                if narg == 2 {
                    let key = thread.arg(l_vars, node, 1)?.expect_string()?;
                    data.remove(&key);
                } else {
                    data.clear();
                }
                Ok(Value::Null)
            }
            "keys" => {
                if narg != 1 {
                    return Err(ThreadScriptError::op_narg());
                }
                let data = self.data.lock().expect("shared_hash poisoned");
                let keys = data
                    .keys()
                    .map(|k| Value::new_literal_string(k.clone()))
                    .collect();
                Ok(Value::new_vector(keys))
            }
            "size" => {
                if narg != 1 {
                    return Err(ThreadScriptError::op_narg());
                }
                let data = self.data.lock().expect("shared_hash poisoned");
                Ok(Value::new_unsigned(data.len() as u64))
            }
            _ => Err(ThreadScriptError::not_implemented(method.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::ScriptBuilder;
    use crate::state::Vm;
    use threadscript_core::{Allocator, SrcLocation};

    fn call_node(b: &ScriptBuilder, args: Vec<Value>) -> Arc<CodeNode> {
        let node = b
            .add_node(None, SrcLocation::unknown(), "", None)
            .unwrap();
        for a in args {
            b.add_node(Some(&node), SrcLocation::unknown(), "", Some(a))
                .unwrap();
        }
        node
    }

    #[test]
    fn keys_are_lexicographically_sorted_and_mt_safe() {
        let vm = Arc::new(Vm::new());
        let mut thread = vm.new_thread_state(10, Allocator::default());
        let l_vars = thread.top_locals_for_test();
        let h = SharedHash::new();
        let b = ScriptBuilder::create_script("t.ts");
        for (k, v) in [("b", 2), ("a", 1)] {
            let node = call_node(
                &b,
                vec![
                    b.create_value_string("at"),
                    Value::new_literal_string(k),
                    Value::new_literal_int(v),
                ],
            );
            h.call_method(&mut thread, &l_vars, &node, "at").unwrap();
        }
        let keys_node = call_node(&b, vec![b.create_value_string("keys")]);
        let keys = h.call_method(&mut thread, &l_vars, &keys_node, "keys").unwrap();
        let Value::Vector(v) = keys else { unreachable!() };
        let names: Vec<String> = v.with(|vec| {
            vec.iter()
                .map(|e| {
                    assert!(e.mt_safe());
                    e.expect_string().unwrap()
                })
                .collect()
        });
        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn at_without_value_on_missing_key_is_out_of_range() {
        let vm = Arc::new(Vm::new());
        let mut thread = vm.new_thread_state(10, Allocator::default());
        let l_vars = thread.top_locals_for_test();
        let h = SharedHash::new();
        let b = ScriptBuilder::create_script("t.ts");
        let node = call_node(
            &b,
            vec![b.create_value_string("at"), Value::new_literal_string("missing")],
        );
        let err = h.call_method(&mut thread, &l_vars, &node, "at").unwrap_err();
        assert!(matches!(
            err.kind,
            threadscript_core::ErrorKind::ValueOutOfRange
        ));
    }
}
