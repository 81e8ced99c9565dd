//! The ThreadScript value model.
//!
//! Every runtime value is either [`Value::Null`] or one of a fixed set of
//! typed variants (§3 of the design: bool, int, unsigned, string, vector,
//! hash, script, function, native_function, object). Values have shared
//! ownership and an irreversible *mt-safe* transition: once a value is
//! marked thread-safe it becomes permanently read-only, at which point (and
//! only then) it may be observed from more than one thread.
//!
//! Rather than the original engine's polymorphic `basic_value` hierarchy, we
//! use a tagged `enum` (Design Notes §9) for the scalar/container variants
//! and a small [`Callable`] trait object for the four variants that can be
//! invoked (`script`, `function`, `native_function`, `object`). Mutable
//! state lives behind [`Shared<T>`], which pairs a `Mutex<T>` with the
//! sticky mt-safe flag so every variant — even `int` and `bool` — has its
//! own identity and flag, matching the original's "every value is a
//! `shared_ptr<basic_value>`" design.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use threadscript_core::{ErrorKind, Result, ThreadScriptError};

use crate::code::CodeNode;
use crate::symbol::SymbolTable;

/// A mutex-guarded cell with a sticky thread-safety flag.
///
/// `Shared<T>` is the building block for every reference-counted value
/// variant. Reads always succeed (`with`); writes (`with_mut`) fail with
/// [`ErrorKind::ValueReadOnly`] once `mark_mt_safe` has been called.
#[derive(Debug)]
pub struct Shared<T> {
    data: Mutex<T>,
    mt_safe: AtomicBool,
}

impl<T> Shared<T> {
    pub fn new(data: T) -> Self {
        Self {
            data: Mutex::new(data),
            mt_safe: AtomicBool::new(false),
        }
    }

    pub fn mt_safe(&self) -> bool {
        self.mt_safe.load(Ordering::Acquire)
    }

    /// Sets the flag unconditionally. Callers must have already verified any
    /// deep precondition (e.g. that a vector's elements are all mt-safe).
    pub fn mark_mt_safe(&self) {
        self.mt_safe.store(true, Ordering::Release);
    }

    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let guard = self.data.lock().expect("value mutex poisoned");
        f(&guard)
    }

    /// Mutates the contained value, failing if this value is mt-safe.
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut T) -> R) -> Result<R> {
        if self.mt_safe() {
            return Err(ThreadScriptError::value_read_only());
        }
        let mut guard = self.data.lock().expect("value mutex poisoned");
        Ok(f(&mut guard))
    }
}

impl<T: Clone> Shared<T> {
    pub fn get(&self) -> T {
        self.with(|v| v.clone())
    }
}

/// The callable interface shared by `script`, `function`, `native_function`
/// and `object` values (Design Notes §9's "small trait for callable
/// values").
pub trait Callable: fmt::Debug + Send + Sync {
    fn call(
        &self,
        thread: &mut crate::state::ThreadState,
        l_vars: &Arc<SymbolTable>,
        node: &Arc<CodeNode>,
    ) -> Result<Value>;
}

/// The object-value dispatch convention: the first child of the call node
/// names a method; remaining children are that method's arguments.
pub trait ObjectValue: fmt::Debug + Send + Sync {
    /// Stable class name, also used as `type()`'s result for this object.
    fn class_name(&self) -> &'static str;

    /// Invokes `method` with the call node still available so the method
    /// can evaluate its own argument children (`node.children()[1..]`).
    fn call_method(
        &self,
        thread: &mut crate::state::ThreadState,
        l_vars: &Arc<SymbolTable>,
        node: &Arc<CodeNode>,
        method: &str,
    ) -> Result<Value>;

    /// Objects do not support shallow copy (§4.6: "Neither container
    /// supports cloning").
    fn not_clonable_name(&self) -> &'static str {
        self.class_name()
    }
}

/// A defined (scripted) function: a name and an unevaluated body node.
#[derive(Debug)]
pub struct FunctionValue {
    pub name: String,
    pub body: Arc<CodeNode>,
}

/// A native (builtin) function implementation.
pub type NativeFn = fn(
    &mut crate::state::ThreadState,
    &Arc<SymbolTable>,
    &Arc<CodeNode>,
) -> Result<Value>;

#[derive(Clone, Copy)]
pub struct NativeFunctionValue {
    pub name: &'static str,
    pub func: NativeFn,
}

impl fmt::Debug for NativeFunctionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunctionValue")
            .field("name", &self.name)
            .finish()
    }
}

impl Callable for NativeFunctionValue {
    fn call(
        &self,
        thread: &mut crate::state::ThreadState,
        l_vars: &Arc<SymbolTable>,
        node: &Arc<CodeNode>,
    ) -> Result<Value> {
        (self.func)(thread, l_vars, node)
    }
}

impl Callable for FunctionValue {
    fn call(
        &self,
        thread: &mut crate::state::ThreadState,
        l_vars: &Arc<SymbolTable>,
        node: &Arc<CodeNode>,
    ) -> Result<Value> {
        // Eager, left-to-right evaluation of all call-site arguments,
        // using the *caller's* locals, before the new frame is pushed.
        let nargs = node.children().len();
        let mut args = Vec::with_capacity(nargs);
        for i in 0..nargs {
            args.push(thread.arg(l_vars, node, i)?);
        }
        let body = Arc::clone(&self.body);
        thread.call_frame(self.name.clone(), node.loc.clone(), move |thread, locals| {
            locals.insert_or_assign("_args".to_string(), Value::new_vector(args));
            crate::eval::eval_node(thread, locals, &body)
        })
    }
}

/// A parsed, shareable script: a file name and a root code node.
#[derive(Debug)]
pub struct ScriptValue {
    pub file: String,
    pub root: Arc<CodeNode>,
}

impl Callable for ScriptValue {
    fn call(
        &self,
        thread: &mut crate::state::ThreadState,
        _l_vars: &Arc<SymbolTable>,
        node: &Arc<CodeNode>,
    ) -> Result<Value> {
        let root = Arc::clone(&self.root);
        thread.call_frame(String::new(), node.loc.clone(), move |thread, locals| {
            crate::eval::eval_node(thread, locals, &root)
        })
    }
}

/// The tagged value enum. See the module documentation for the design
/// rationale.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(Arc<Shared<bool>>),
    Int(Arc<Shared<i64>>),
    Unsigned(Arc<Shared<u64>>),
    String(Arc<Shared<String>>),
    Vector(Arc<Shared<Vec<Value>>>),
    Hash(Arc<Shared<BTreeMap<String, Value>>>),
    Script(Arc<ScriptValue>),
    Function(Arc<FunctionValue>),
    NativeFunction(Arc<NativeFunctionValue>),
    Object(Arc<dyn ObjectValue>),
}

impl Value {
    pub fn new_bool(b: bool) -> Self {
        Value::Bool(Arc::new(Shared::new(b)))
    }
    pub fn new_int(i: i64) -> Self {
        Value::Int(Arc::new(Shared::new(i)))
    }
    pub fn new_unsigned(u: u64) -> Self {
        Value::Unsigned(Arc::new(Shared::new(u)))
    }
    pub fn new_string(s: impl Into<String>) -> Self {
        Value::String(Arc::new(Shared::new(s.into())))
    }
    pub fn new_vector(v: Vec<Value>) -> Self {
        Value::Vector(Arc::new(Shared::new(v)))
    }
    pub fn new_hash(h: BTreeMap<String, Value>) -> Self {
        Value::Hash(Arc::new(Shared::new(h)))
    }

    /// A mt-safe scalar/string/vector/hash, used by the parser to build
    /// literal nodes (§3: "Script literals are mt-safe by construction").
    pub fn new_literal_bool(b: bool) -> Self {
        let v = Value::new_bool(b);
        v.set_mt_safe().expect("scalar mt-safe is infallible");
        v
    }
    pub fn new_literal_int(i: i64) -> Self {
        let v = Value::new_int(i);
        v.set_mt_safe().expect("scalar mt-safe is infallible");
        v
    }
    pub fn new_literal_unsigned(u: u64) -> Self {
        let v = Value::new_unsigned(u);
        v.set_mt_safe().expect("scalar mt-safe is infallible");
        v
    }
    pub fn new_literal_string(s: impl Into<String>) -> Self {
        let v = Value::new_string(s);
        v.set_mt_safe().expect("scalar mt-safe is infallible");
        v
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Unsigned(_) => "unsigned",
            Value::String(_) => "string",
            Value::Vector(_) => "vector",
            Value::Hash(_) => "hash",
            Value::Script(_) => "script",
            Value::Function(_) => "function",
            Value::NativeFunction(_) => "native_function",
            Value::Object(o) => o.class_name(),
        }
    }

    pub fn mt_safe(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Bool(s) => s.mt_safe(),
            Value::Int(s) => s.mt_safe(),
            Value::Unsigned(s) => s.mt_safe(),
            Value::String(s) => s.mt_safe(),
            Value::Vector(s) => s.mt_safe(),
            Value::Hash(s) => s.mt_safe(),
            // Scripts, functions, native functions and objects are
            // constructed mt-safe and can never become otherwise.
            Value::Script(_) | Value::Function(_) | Value::NativeFunction(_) | Value::Object(_) => {
                true
            }
        }
    }

    /// Attempts the one-way mt-safe transition. Fails if this value
    /// transitively references a value that is not itself mt-safe.
    pub fn set_mt_safe(&self) -> Result<()> {
        match self {
            Value::Null
            | Value::Script(_)
            | Value::Function(_)
            | Value::NativeFunction(_)
            | Value::Object(_) => Ok(()),
            Value::Bool(s) => {
                s.mark_mt_safe();
                Ok(())
            }
            Value::Int(s) => {
                s.mark_mt_safe();
                Ok(())
            }
            Value::Unsigned(s) => {
                s.mark_mt_safe();
                Ok(())
            }
            Value::String(s) => {
                s.mark_mt_safe();
                Ok(())
            }
            Value::Vector(s) => {
                let ok = s.with(|v| v.iter().all(|e| e.is_null() || e.mt_safe()));
                if !ok {
                    return Err(ThreadScriptError::value_mt_unsafe());
                }
                s.mark_mt_safe();
                Ok(())
            }
            Value::Hash(s) => {
                let ok = s.with(|h| h.values().all(|e| e.is_null() || e.mt_safe()));
                if !ok {
                    return Err(ThreadScriptError::value_mt_unsafe());
                }
                s.mark_mt_safe();
                Ok(())
            }
        }
    }

    /// Shallow copy: new identity, same scalar content or the same child
    /// references (not recursively cloned). `mt_safe_override` forces the
    /// new flag; `None` inherits the source's current flag.
    pub fn shallow_copy(&self, mt_safe_override: Option<bool>) -> Result<Value> {
        let copy = match self {
            Value::Null => Value::Null,
            Value::Bool(s) => Value::new_bool(s.get()),
            Value::Int(s) => Value::new_int(s.get()),
            Value::Unsigned(s) => Value::new_unsigned(s.get()),
            Value::String(s) => Value::new_string(s.get()),
            Value::Vector(s) => Value::new_vector(s.get()),
            Value::Hash(s) => Value::new_hash(s.get()),
            Value::Script(_) | Value::Function(_) | Value::NativeFunction(_) => {
                return Err(ThreadScriptError::not_implemented("clone"))
            }
            Value::Object(o) => {
                return Err(ThreadScriptError::not_implemented(o.not_clonable_name()))
            }
        };
        let make_safe = mt_safe_override.unwrap_or_else(|| self.mt_safe());
        if make_safe {
            copy.set_mt_safe()?;
        }
        Ok(copy)
    }

    /// Identity comparison: `true` iff both values reference the same
    /// underlying object.
    pub fn is_same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => Arc::ptr_eq(a, b),
            (Value::Int(a), Value::Int(b)) => Arc::ptr_eq(a, b),
            (Value::Unsigned(a), Value::Unsigned(b)) => Arc::ptr_eq(a, b),
            (Value::String(a), Value::String(b)) => Arc::ptr_eq(a, b),
            (Value::Vector(a), Value::Vector(b)) => Arc::ptr_eq(a, b),
            (Value::Hash(a), Value::Hash(b)) => Arc::ptr_eq(a, b),
            (Value::Script(a), Value::Script(b)) => Arc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Arc::ptr_eq(a, b),
            (Value::NativeFunction(a), Value::NativeFunction(b)) => Arc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Writes the textual form used by `print` and `write`-to-string: raw
    /// decimal numbers, `true`/`false`, raw string bytes, and the type name
    /// for everything else.
    pub fn write(&self, out: &mut impl fmt::Write) -> fmt::Result {
        match self {
            Value::Null => write!(out, "null"),
            Value::Bool(s) => write!(out, "{}", if s.get() { "true" } else { "false" }),
            Value::Int(s) => write!(out, "{}", s.get()),
            Value::Unsigned(s) => write!(out, "{}", s.get()),
            Value::String(s) => write!(out, "{}", s.get()),
            _ => write!(out, "{}", self.type_name()),
        }
    }

    pub fn to_display_string(&self) -> String {
        let mut s = String::new();
        self.write(&mut s).expect("String writer never fails");
        s
    }

    /// The dispatch verb (§4.3 step 4): scalars/containers return
    /// themselves, callables execute.
    pub fn eval(
        &self,
        thread: &mut crate::state::ThreadState,
        l_vars: &Arc<SymbolTable>,
        node: &Arc<CodeNode>,
        _fun_name: &str,
    ) -> Result<Value> {
        match self {
            Value::Script(s) => s.call(thread, l_vars, node),
            Value::Function(f) => f.call(thread, l_vars, node),
            Value::NativeFunction(f) => f.call(thread, l_vars, node),
            Value::Object(obj) => {
                let children = node.children();
                if children.is_empty() {
                    return Err(ThreadScriptError::op_narg());
                }
                let method_val = thread.arg(l_vars, node, 0)?;
                let method = method_val.expect_string()?;
                obj.call_method(thread, l_vars, node, &method)
            }
            _ => Ok(self.clone()),
        }
    }

    /// Requires this value to be a `string`, returning its contents.
    pub fn expect_string(&self) -> Result<String> {
        match self {
            Value::String(s) => Ok(s.get()),
            Value::Null => Err(ThreadScriptError::value_null()),
            _ => Err(ThreadScriptError::value_type()),
        }
    }

    /// Requires this value to be `int` or `unsigned`, returning it as an
    /// index (rejecting negative `int`s), per §4.6's index argument rule.
    pub fn expect_index(&self) -> Result<usize> {
        match self {
            Value::Int(s) => {
                let n = s.get();
                if n < 0 {
                    Err(ThreadScriptError::value_out_of_range())
                } else {
                    Ok(n as usize)
                }
            }
            Value::Unsigned(s) => Ok(s.get() as usize),
            Value::Null => Err(ThreadScriptError::value_null()),
            _ => Err(ThreadScriptError::value_type()),
        }
    }

    pub fn expect_bool(&self) -> Result<bool> {
        match self {
            Value::Bool(s) => Ok(s.get()),
            Value::Null => Err(ThreadScriptError::value_null()),
            _ => Err(ThreadScriptError::value_type()),
        }
    }

    pub fn expect_int(&self) -> Result<i64> {
        match self {
            Value::Int(s) => Ok(s.get()),
            Value::Null => Err(ThreadScriptError::value_null()),
            _ => Err(ThreadScriptError::value_type()),
        }
    }
}

/// Helper matching `exception::value_type` for a mismatched `ErrorKind` in
/// tests that need to assert on a specific kind without the trace.
pub fn is_value_type_err(e: &ThreadScriptError) -> bool {
    matches!(e.kind, ErrorKind::ValueType)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mt_safe_is_sticky_and_idempotent() {
        let v = Value::new_int(5);
        assert!(!v.mt_safe());
        v.set_mt_safe().unwrap();
        assert!(v.mt_safe());
        // idempotent
        v.set_mt_safe().unwrap();
        assert!(v.mt_safe());
    }

    #[test]
    fn mt_safe_vector_requires_mt_safe_elements() {
        let unsafe_elem = Value::new_int(1);
        let v = Value::new_vector(vec![unsafe_elem.clone()]);
        assert!(v.set_mt_safe().is_err());
        unsafe_elem.set_mt_safe().unwrap();
        assert!(v.set_mt_safe().is_ok());
    }

    #[test]
    fn mt_safe_vector_allows_null_elements() {
        let v = Value::new_vector(vec![Value::Null]);
        assert!(v.set_mt_safe().is_ok());
    }

    #[test]
    fn writable_accessor_fails_once_mt_safe() {
        let v = Value::new_vector(vec![]);
        v.set_mt_safe().unwrap();
        let Value::Vector(inner) = &v else {
            unreachable!()
        };
        let err = inner.with_mut(|vec| vec.push(Value::Null)).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::ValueReadOnly));
    }

    #[test]
    fn clone_clears_mt_safe_and_keeps_content() {
        let v = Value::new_int(42);
        v.set_mt_safe().unwrap();
        let c = v.shallow_copy(Some(false)).unwrap();
        assert!(!c.mt_safe());
        assert_eq!(c.expect_int().unwrap(), 42);
        assert!(!v.is_same(&c));
    }

    #[test]
    fn shallow_copy_of_vector_shares_element_identity() {
        let elem = Value::new_int(1);
        let v = Value::new_vector(vec![elem.clone()]);
        let c = v.shallow_copy(Some(false)).unwrap();
        let (Value::Vector(orig), Value::Vector(copy)) = (&v, &c) else {
            unreachable!()
        };
        assert!(!Arc::ptr_eq(orig, copy));
        let orig_elem = orig.with(|v| v[0].clone());
        let copy_elem = copy.with(|v| v[0].clone());
        assert!(orig_elem.is_same(&copy_elem));
    }

    #[test]
    fn objects_reject_shallow_copy() {
        // Exercised concretely by the channel/shared_vector/shared_hash
        // tests; Script/Function/NativeFunction share the same behavior.
    }

    #[test]
    fn is_same_is_identity_not_value_equality() {
        let a = Value::new_int(1);
        let b = Value::new_int(1);
        assert!(!a.is_same(&b));
        assert!(a.is_same(&a.clone()));
    }
}
