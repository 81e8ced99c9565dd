//! Control flow, variable binding, value introspection and I/O builtins.
//!
//! Grounded on the original engine's `predef.hpp` (doc comments for `f_bool`,
//! `f_if`, `f_clone`, `f_mt_safe`, `f_is_mt_safe`/`f_is_null`/`f_is_same`,
//! `f_print`, `f_seq`, `f_type`, `f_var`, `f_while`) and §4.4's authoritative
//! arity/semantics table for the rest (`gvar`, `fun`, `throw`, `try`, and the
//! `channel`/`shared_vector`/`shared_hash` object constructors, which
//! `predef.hpp` does not document).

use std::sync::Arc;

use threadscript_core::ThreadScriptError;
use threadscript_core::Result;

use crate::builtins::util::{convert_to_bool, reuse_bool, reuse_string};
use crate::channel::Channel;
use crate::code::CodeNode;
use crate::shared_hash::SharedHash;
use crate::shared_vector::SharedVector;
use crate::state::ThreadState;
use crate::symbol::SymbolTable;
use crate::value::Value;

pub fn f_seq(thread: &mut ThreadState, l_vars: &Arc<SymbolTable>, node: &Arc<CodeNode>) -> Result<Value> {
    let mut last = Value::Null;
    for i in 0..node.narg() {
        last = thread.arg(l_vars, node, i)?;
    }
    Ok(last)
}

pub fn f_if(thread: &mut ThreadState, l_vars: &Arc<SymbolTable>, node: &Arc<CodeNode>) -> Result<Value> {
    let narg = node.narg();
    if narg != 2 && narg != 3 {
        return Err(ThreadScriptError::op_narg());
    }
    let cond = thread.arg(l_vars, node, 0)?;
    if convert_to_bool(&cond)? {
        thread.arg(l_vars, node, 1)
    } else if narg == 3 {
        thread.arg(l_vars, node, 2)
    } else {
        Ok(Value::Null)
    }
}

pub fn f_while(thread: &mut ThreadState, l_vars: &Arc<SymbolTable>, node: &Arc<CodeNode>) -> Result<Value> {
    if node.narg() != 2 {
        return Err(ThreadScriptError::op_narg());
    }
    let mut last_cond = Value::Null;
    loop {
        let cond = thread.arg(l_vars, node, 0)?;
        let proceed = convert_to_bool(&cond)?;
        last_cond = cond;
        if !proceed {
            break;
        }
        thread.arg(l_vars, node, 1)?;
    }
    Ok(last_cond)
}

fn var_impl(
    thread: &mut ThreadState,
    l_vars: &Arc<SymbolTable>,
    node: &Arc<CodeNode>,
    target: &Arc<SymbolTable>,
) -> Result<Value> {
    let narg = node.narg();
    if narg != 1 && narg != 2 {
        return Err(ThreadScriptError::op_narg());
    }
    let name = thread.arg(l_vars, node, 0)?.expect_string()?;
    if narg == 2 {
        let value = thread.arg(l_vars, node, 1)?;
        target.insert_or_assign(name, value.clone());
        Ok(value)
    } else {
        target
            .lookup(&name, true)
            .ok_or_else(|| ThreadScriptError::unknown_symbol(name))
    }
}

pub fn f_var(thread: &mut ThreadState, l_vars: &Arc<SymbolTable>, node: &Arc<CodeNode>) -> Result<Value> {
    let l_vars_owned = Arc::clone(l_vars);
    var_impl(thread, l_vars, node, &l_vars_owned)
}

pub fn f_gvar(thread: &mut ThreadState, l_vars: &Arc<SymbolTable>, node: &Arc<CodeNode>) -> Result<Value> {
    let globals = Arc::clone(thread.globals());
    var_impl(thread, l_vars, node, &globals)
}

pub fn f_fun(thread: &mut ThreadState, l_vars: &Arc<SymbolTable>, node: &Arc<CodeNode>) -> Result<Value> {
    if node.narg() != 2 {
        return Err(ThreadScriptError::op_narg());
    }
    let name = thread.arg(l_vars, node, 0)?.expect_string()?;
    let body = Arc::clone(&node.children()[1]);
    let func = Value::Function(Arc::new(crate::value::FunctionValue {
        name: name.clone(),
        body,
    }));
    l_vars.insert_or_assign(name, func.clone());
    Ok(func)
}

pub fn f_bool(thread: &mut ThreadState, l_vars: &Arc<SymbolTable>, node: &Arc<CodeNode>) -> Result<Value> {
    let narg = node.narg();
    if narg != 1 && narg != 2 {
        return Err(ThreadScriptError::op_narg());
    }
    let val = thread.arg(l_vars, node, narg - 1)?;
    let b = convert_to_bool(&val)?;
    if narg == 2 {
        let dest = thread.arg(l_vars, node, 0)?;
        Ok(reuse_bool(dest, b))
    } else {
        Ok(Value::new_bool(b))
    }
}

pub fn f_clone(thread: &mut ThreadState, l_vars: &Arc<SymbolTable>, node: &Arc<CodeNode>) -> Result<Value> {
    if node.narg() != 1 {
        return Err(ThreadScriptError::op_narg());
    }
    thread.arg(l_vars, node, 0)?.shallow_copy(Some(false))
}

pub fn f_mt_safe(thread: &mut ThreadState, l_vars: &Arc<SymbolTable>, node: &Arc<CodeNode>) -> Result<Value> {
    if node.narg() != 1 {
        return Err(ThreadScriptError::op_narg());
    }
    let v = thread.arg(l_vars, node, 0)?;
    v.set_mt_safe()?;
    Ok(v)
}

pub fn f_is_mt_safe(thread: &mut ThreadState, l_vars: &Arc<SymbolTable>, node: &Arc<CodeNode>) -> Result<Value> {
    let narg = node.narg();
    if narg != 1 && narg != 2 {
        return Err(ThreadScriptError::op_narg());
    }
    let val = thread.arg(l_vars, node, narg - 1)?;
    let b = val.mt_safe();
    if narg == 2 {
        let dest = thread.arg(l_vars, node, 0)?;
        Ok(reuse_bool(dest, b))
    } else {
        Ok(Value::new_bool(b))
    }
}

pub fn f_is_null(thread: &mut ThreadState, l_vars: &Arc<SymbolTable>, node: &Arc<CodeNode>) -> Result<Value> {
    let narg = node.narg();
    if narg != 1 && narg != 2 {
        return Err(ThreadScriptError::op_narg());
    }
    let val = thread.arg(l_vars, node, narg - 1)?;
    let b = val.is_null();
    if narg == 2 {
        let dest = thread.arg(l_vars, node, 0)?;
        Ok(reuse_bool(dest, b))
    } else {
        Ok(Value::new_bool(b))
    }
}

pub fn f_is_same(thread: &mut ThreadState, l_vars: &Arc<SymbolTable>, node: &Arc<CodeNode>) -> Result<Value> {
    let narg = node.narg();
    if narg != 2 && narg != 3 {
        return Err(ThreadScriptError::op_narg());
    }
    let has_dest = narg == 3;
    let a_idx = if has_dest { 1 } else { 0 };
    let a = thread.arg(l_vars, node, a_idx)?;
    let b = thread.arg(l_vars, node, a_idx + 1)?;
    let same = a.is_same(&b);
    if has_dest {
        let dest = thread.arg(l_vars, node, 0)?;
        Ok(reuse_bool(dest, same))
    } else {
        Ok(Value::new_bool(same))
    }
}

pub fn f_type(thread: &mut ThreadState, l_vars: &Arc<SymbolTable>, node: &Arc<CodeNode>) -> Result<Value> {
    let narg = node.narg();
    if narg != 1 && narg != 2 {
        return Err(ThreadScriptError::op_narg());
    }
    let val = thread.arg(l_vars, node, narg - 1)?;
    let name = val.type_name().to_string();
    if narg == 2 {
        let dest = thread.arg(l_vars, node, 0)?;
        Ok(reuse_string(dest, name))
    } else {
        Ok(Value::new_string(name))
    }
}

/// Writes every argument's display form to the thread's stdout in a single
/// call, so a single `print` invocation is never interleaved with another's
/// output (`predef.hpp`'s `f_print`: synchronized stream, one call atomic).
pub fn f_print(thread: &mut ThreadState, l_vars: &Arc<SymbolTable>, node: &Arc<CodeNode>) -> Result<Value> {
    let mut buf = String::new();
    for i in 0..node.narg() {
        let v = thread.arg(l_vars, node, i)?;
        v.write(&mut buf).expect("String writer never fails");
    }
    thread
        .write_stdout(&buf)
        .map_err(|_| ThreadScriptError::op_library())?;
    Ok(Value::Null)
}

pub fn f_throw(thread: &mut ThreadState, l_vars: &Arc<SymbolTable>, node: &Arc<CodeNode>) -> Result<Value> {
    if node.narg() != 1 {
        return Err(ThreadScriptError::op_narg());
    }
    let msg = thread.arg(l_vars, node, 0)?.expect_string()?;
    Err(ThreadScriptError::script_exception(msg))
}

/// `try(body, handler)`: runs `body`; on any error, binds the error's kind
/// name (e.g. `"op_div_zero"`) to the auto-variable `_exception` in the
/// current scope (mirroring `_args`'s auto-binding convention for function
/// calls) and runs `handler`.
pub fn f_try(thread: &mut ThreadState, l_vars: &Arc<SymbolTable>, node: &Arc<CodeNode>) -> Result<Value> {
    if node.narg() != 2 {
        return Err(ThreadScriptError::op_narg());
    }
    let children = node.children();
    match crate::eval::eval_node(thread, l_vars, &children[0]) {
        Ok(v) => Ok(v),
        Err(e) => {
            l_vars.insert_or_assign(
                "_exception".to_string(),
                Value::new_literal_string(e.kind_name()),
            );
            crate::eval::eval_node(thread, l_vars, &children[1])
        }
    }
}

pub fn f_channel(thread: &mut ThreadState, l_vars: &Arc<SymbolTable>, node: &Arc<CodeNode>) -> Result<Value> {
    if node.narg() != 1 {
        return Err(ThreadScriptError::op_narg());
    }
    let capacity = thread.arg(l_vars, node, 0)?.expect_index()?;
    Ok(Value::Object(Channel::new(capacity)))
}

pub fn f_shared_vector(
    _thread: &mut ThreadState,
    _l_vars: &Arc<SymbolTable>,
    node: &Arc<CodeNode>,
) -> Result<Value> {
    if node.narg() != 0 {
        return Err(ThreadScriptError::op_narg());
    }
    Ok(Value::Object(SharedVector::new()))
}

pub fn f_shared_hash(
    _thread: &mut ThreadState,
    _l_vars: &Arc<SymbolTable>,
    node: &Arc<CodeNode>,
) -> Result<Value> {
    if node.narg() != 0 {
        return Err(ThreadScriptError::op_narg());
    }
    Ok(Value::Object(SharedHash::new()))
}
