//! Arithmetic, comparison and logic builtins (§4.4: "Integer; div-by-zero
//! and signed overflow raise dedicated kinds" / "Standard").
//!
//! Arithmetic follows the same optional-destination convention as the
//! introspection builtins in [`crate::builtins::core`]: arity 2 is
//! `op(a, b)`, arity 3 is `op(result, a, b)`. Comparison and logic operators
//! take no destination (§4.4 lists their arity as unspecified beyond their
//! natural operand count).

use std::cmp::Ordering;
use std::sync::Arc;

use threadscript_core::{Result, ThreadScriptError};

use crate::builtins::util::{convert_to_bool, reuse_int};
use crate::code::CodeNode;
use crate::state::ThreadState;
use crate::symbol::SymbolTable;
use crate::value::Value;

fn binary_int(
    thread: &mut ThreadState,
    l_vars: &Arc<SymbolTable>,
    node: &Arc<CodeNode>,
    op: impl FnOnce(i64, i64) -> Result<i64>,
) -> Result<Value> {
    let narg = node.narg();
    if narg != 2 && narg != 3 {
        return Err(ThreadScriptError::op_narg());
    }
    let has_dest = narg == 3;
    let a_idx = if has_dest { 1 } else { 0 };
    let a = thread.arg(l_vars, node, a_idx)?.expect_int()?;
    let b = thread.arg(l_vars, node, a_idx + 1)?.expect_int()?;
    let result = op(a, b)?;
    if has_dest {
        let dest = thread.arg(l_vars, node, 0)?;
        Ok(reuse_int(dest, result))
    } else {
        Ok(Value::new_int(result))
    }
}

pub fn f_add(thread: &mut ThreadState, l_vars: &Arc<SymbolTable>, node: &Arc<CodeNode>) -> Result<Value> {
    binary_int(thread, l_vars, node, |a, b| {
        a.checked_add(b).ok_or_else(ThreadScriptError::op_overflow)
    })
}

pub fn f_sub(thread: &mut ThreadState, l_vars: &Arc<SymbolTable>, node: &Arc<CodeNode>) -> Result<Value> {
    binary_int(thread, l_vars, node, |a, b| {
        a.checked_sub(b).ok_or_else(ThreadScriptError::op_overflow)
    })
}

pub fn f_mul(thread: &mut ThreadState, l_vars: &Arc<SymbolTable>, node: &Arc<CodeNode>) -> Result<Value> {
    binary_int(thread, l_vars, node, |a, b| {
        a.checked_mul(b).ok_or_else(ThreadScriptError::op_overflow)
    })
}

pub fn f_div(thread: &mut ThreadState, l_vars: &Arc<SymbolTable>, node: &Arc<CodeNode>) -> Result<Value> {
    binary_int(thread, l_vars, node, |a, b| {
        if b == 0 {
            Err(ThreadScriptError::op_div_zero())
        } else {
            a.checked_div(b).ok_or_else(ThreadScriptError::op_overflow)
        }
    })
}

pub fn f_mod(thread: &mut ThreadState, l_vars: &Arc<SymbolTable>, node: &Arc<CodeNode>) -> Result<Value> {
    binary_int(thread, l_vars, node, |a, b| {
        if b == 0 {
            Err(ThreadScriptError::op_div_zero())
        } else {
            a.checked_rem(b).ok_or_else(ThreadScriptError::op_overflow)
        }
    })
}

fn scalar_eq(a: &Value, b: &Value) -> Result<bool> {
    match (a, b) {
        (Value::Null, Value::Null) => Ok(true),
        (Value::Bool(x), Value::Bool(y)) => Ok(x.get() == y.get()),
        (Value::Int(x), Value::Int(y)) => Ok(x.get() == y.get()),
        (Value::Unsigned(x), Value::Unsigned(y)) => Ok(x.get() == y.get()),
        (Value::String(x), Value::String(y)) => Ok(x.get() == y.get()),
        _ => Err(ThreadScriptError::value_type()),
    }
}

fn scalar_cmp(a: &Value, b: &Value) -> Result<Ordering> {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => Ok(x.get().cmp(&y.get())),
        (Value::Int(x), Value::Int(y)) => Ok(x.get().cmp(&y.get())),
        (Value::Unsigned(x), Value::Unsigned(y)) => Ok(x.get().cmp(&y.get())),
        (Value::String(x), Value::String(y)) => Ok(x.get().cmp(&y.get())),
        _ => Err(ThreadScriptError::value_type()),
    }
}

fn binary_args(
    thread: &mut ThreadState,
    l_vars: &Arc<SymbolTable>,
    node: &Arc<CodeNode>,
) -> Result<(Value, Value)> {
    if node.narg() != 2 {
        return Err(ThreadScriptError::op_narg());
    }
    let a = thread.arg(l_vars, node, 0)?;
    let b = thread.arg(l_vars, node, 1)?;
    Ok((a, b))
}

pub fn f_eq(thread: &mut ThreadState, l_vars: &Arc<SymbolTable>, node: &Arc<CodeNode>) -> Result<Value> {
    let (a, b) = binary_args(thread, l_vars, node)?;
    Ok(Value::new_bool(scalar_eq(&a, &b)?))
}

pub fn f_ne(thread: &mut ThreadState, l_vars: &Arc<SymbolTable>, node: &Arc<CodeNode>) -> Result<Value> {
    let (a, b) = binary_args(thread, l_vars, node)?;
    Ok(Value::new_bool(!scalar_eq(&a, &b)?))
}

pub fn f_lt(thread: &mut ThreadState, l_vars: &Arc<SymbolTable>, node: &Arc<CodeNode>) -> Result<Value> {
    let (a, b) = binary_args(thread, l_vars, node)?;
    Ok(Value::new_bool(scalar_cmp(&a, &b)? == Ordering::Less))
}

pub fn f_le(thread: &mut ThreadState, l_vars: &Arc<SymbolTable>, node: &Arc<CodeNode>) -> Result<Value> {
    let (a, b) = binary_args(thread, l_vars, node)?;
    Ok(Value::new_bool(scalar_cmp(&a, &b)? != Ordering::Greater))
}

pub fn f_gt(thread: &mut ThreadState, l_vars: &Arc<SymbolTable>, node: &Arc<CodeNode>) -> Result<Value> {
    let (a, b) = binary_args(thread, l_vars, node)?;
    Ok(Value::new_bool(scalar_cmp(&a, &b)? == Ordering::Greater))
}

pub fn f_ge(thread: &mut ThreadState, l_vars: &Arc<SymbolTable>, node: &Arc<CodeNode>) -> Result<Value> {
    let (a, b) = binary_args(thread, l_vars, node)?;
    Ok(Value::new_bool(scalar_cmp(&a, &b)? != Ordering::Less))
}

/// Short-circuiting: the second operand is only evaluated if the first is
/// `true`.
pub fn f_and(thread: &mut ThreadState, l_vars: &Arc<SymbolTable>, node: &Arc<CodeNode>) -> Result<Value> {
    if node.narg() != 2 {
        return Err(ThreadScriptError::op_narg());
    }
    let a = thread.arg(l_vars, node, 0)?;
    if !convert_to_bool(&a)? {
        return Ok(Value::new_bool(false));
    }
    let b = thread.arg(l_vars, node, 1)?;
    Ok(Value::new_bool(convert_to_bool(&b)?))
}

/// Short-circuiting: the second operand is only evaluated if the first is
/// `false`.
pub fn f_or(thread: &mut ThreadState, l_vars: &Arc<SymbolTable>, node: &Arc<CodeNode>) -> Result<Value> {
    if node.narg() != 2 {
        return Err(ThreadScriptError::op_narg());
    }
    let a = thread.arg(l_vars, node, 0)?;
    if convert_to_bool(&a)? {
        return Ok(Value::new_bool(true));
    }
    let b = thread.arg(l_vars, node, 1)?;
    Ok(Value::new_bool(convert_to_bool(&b)?))
}

pub fn f_not(thread: &mut ThreadState, l_vars: &Arc<SymbolTable>, node: &Arc<CodeNode>) -> Result<Value> {
    if node.narg() != 1 {
        return Err(ThreadScriptError::op_narg());
    }
    let a = thread.arg(l_vars, node, 0)?;
    Ok(Value::new_bool(!convert_to_bool(&a)?))
}
