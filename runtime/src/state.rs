//! The virtual machine and per-thread execution state.
//!
//! Grounded on the original engine's `basic_virtual_machine`/`basic_state`:
//! a [`Vm`] is a single engine instance, shared by every thread running
//! against it, holding the shared-globals symbol table and the default
//! output stream. A [`ThreadState`] is one thread's private call stack plus
//! a thread-local globals table whose parent is the shared-globals snapshot
//! in effect when the thread was created — later replacements of the shared
//! table (via [`Vm::publish_globals`]) are only picked up by new threads
//! (§5: "Existing threads will continue to use the old symbol table until
//! they request the new one").

pub mod run;

use std::cell::RefCell;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;
use threadscript_core::{Allocator, FrameLocation, Result, SrcLocation, ThreadScriptError};
use tracing::debug;

use crate::code::CodeNode;
use crate::symbol::SymbolTable;
use crate::value::Value;

/// The default maximum call-stack depth, matching the original's
/// `basic_virtual_machine::default_max_stack`.
pub const DEFAULT_MAX_STACK: usize = 1000;

/// A shared interpreter instance. Multiple [`ThreadState`]s can attach to
/// the same `Vm`, sharing its global symbol table and default stdout.
pub struct Vm {
    shared_globals: ArcSwap<SymbolTable>,
    default_stdout: Mutex<Option<Arc<Mutex<dyn Write + Send>>>>,
    num_states: AtomicUsize,
}

impl std::fmt::Debug for Vm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vm")
            .field("num_states", &self.num_states.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

impl Vm {
    pub fn new() -> Self {
        Self {
            shared_globals: ArcSwap::from_pointee(SymbolTable::root()),
            default_stdout: Mutex::new(None),
            num_states: AtomicUsize::new(0),
        }
    }

    /// Atomically replaces the shared-globals table. Threads already
    /// running keep their existing snapshot (§5); only threads created
    /// afterwards see the replacement.
    pub fn publish_globals(&self, globals: Arc<SymbolTable>) {
        self.shared_globals.store(globals);
    }

    pub fn shared_globals(&self) -> Arc<SymbolTable> {
        self.shared_globals.load_full()
    }

    pub fn set_default_stdout(&self, out: Arc<Mutex<dyn Write + Send>>) {
        *self.default_stdout.lock().expect("vm poisoned") = Some(out);
    }

    pub fn num_states(&self) -> usize {
        self.num_states.load(Ordering::Relaxed)
    }

    /// Creates a new thread state attached to this VM, with a fresh
    /// thread-local globals table chained to the current shared-globals
    /// snapshot.
    pub fn new_thread_state(self: &Arc<Self>, max_stack: usize, alloc: Allocator) -> ThreadState {
        let count = self.num_states.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(num_states = count, max_stack, "thread state created");
        let t_vars = Arc::new(SymbolTable::new(Some(self.shared_globals())));
        let stdout = self
            .default_stdout
            .lock()
            .expect("vm poisoned")
            .clone();
        ThreadState {
            vm: Arc::clone(self),
            frames: Vec::new(),
            t_vars,
            max_stack,
            alloc,
            stdout,
        }
    }
}

struct Frame {
    function: String,
    loc: RefCell<SrcLocation>,
    locals: Arc<SymbolTable>,
}

/// One thread's private execution state: call stack, thread-local globals,
/// allocator handle and (optional) output override.
pub struct ThreadState {
    vm: Arc<Vm>,
    frames: Vec<Frame>,
    t_vars: Arc<SymbolTable>,
    max_stack: usize,
    alloc: Allocator,
    stdout: Option<Arc<Mutex<dyn Write + Send>>>,
}

impl Drop for ThreadState {
    fn drop(&mut self) {
        let remaining = self.vm.num_states.fetch_sub(1, Ordering::Relaxed) - 1;
        debug!(num_states = remaining, "thread state dropped");
    }
}

impl ThreadState {
    pub fn vm(&self) -> &Arc<Vm> {
        &self.vm
    }

    pub fn allocator(&self) -> &Allocator {
        &self.alloc
    }

    /// The thread-local globals table (used by the `gvar` builtin).
    pub fn globals(&self) -> &Arc<SymbolTable> {
        &self.t_vars
    }

    /// Re-points this thread's globals table at the VM's *current*
    /// shared-globals snapshot, keeping every binding this thread already
    /// made on `t_vars` itself (§5: "opt-in re-resolve", analogous to a
    /// driver's `-r` flag). A `ThreadState` never picks up a later
    /// [`Vm::publish_globals`] on its own — a caller must call this
    /// explicitly once it is safe to do so.
    pub fn refresh_globals(&mut self) {
        debug!("refreshing thread-local globals to current shared snapshot");
        let fresh_parent = self.vm.shared_globals();
        self.t_vars = Arc::new(self.t_vars.rebase(fresh_parent));
    }

    pub fn stack_depth(&self) -> usize {
        self.frames.len()
    }

    fn push_frame(&mut self, function: String, loc: SrcLocation) -> Result<()> {
        if self.frames.len() >= self.max_stack {
            debug!(depth = self.frames.len(), max_stack = self.max_stack, "stack depth cap hit");
            return Err(ThreadScriptError::op_recursion());
        }
        let locals = Arc::new(SymbolTable::new(Some(Arc::clone(&self.t_vars))));
        self.frames.push(Frame {
            function,
            loc: RefCell::new(loc),
            locals,
        });
        Ok(())
    }

    fn pop_frame(&mut self) {
        self.frames.pop();
    }

    fn top_locals(&self) -> Arc<SymbolTable> {
        Arc::clone(&self.frames.last().expect("no active frame").locals)
    }

    /// Updates the current frame's location, called on every node visit.
    pub fn update_location(&self, loc: SrcLocation) {
        if let Some(frame) = self.frames.last() {
            *frame.loc.borrow_mut() = loc;
        }
    }

    fn current_frame_location(&self) -> FrameLocation {
        let frame = self.frames.last().expect("no active frame");
        FrameLocation::new(frame.function.clone(), frame.loc.borrow().clone())
    }

    /// Pushes a new call frame, runs `body` with its locals, and (if `body`
    /// fails) tags the error with this frame's location before popping.
    /// This is the single place frame bookkeeping and trace-tagging happen,
    /// used by every callable variant (`function`, `script`, and the
    /// top-level entry point in the `run` module).
    pub fn call_frame(
        &mut self,
        function: String,
        loc: SrcLocation,
        body: impl FnOnce(&mut ThreadState, &Arc<SymbolTable>) -> Result<Value>,
    ) -> Result<Value> {
        self.push_frame(function, loc)?;
        let locals = self.top_locals();
        let mut result = body(self, &locals);
        if let Err(ref mut e) = result {
            let frame_loc = self.current_frame_location();
            e.add_frame(frame_loc);
        }
        self.pop_frame();
        result
    }

    /// Evaluates the `idx`-th child of `node` in `l_vars`, the builtin
    /// argument-fetch helper (§4.3: "Native functions decide for themselves
    /// which children to evaluate").
    pub fn arg(
        &mut self,
        l_vars: &Arc<SymbolTable>,
        node: &Arc<CodeNode>,
        idx: usize,
    ) -> Result<Value> {
        let children = node.children();
        let child = children.get(idx).ok_or_else(ThreadScriptError::op_narg)?;
        crate::eval::eval_node(self, l_vars, child)
    }

    pub fn narg(&self, node: &Arc<CodeNode>) -> usize {
        node.narg()
    }

    /// Writes to this thread's stdout override, falling back to the VM's
    /// default, discarding output if neither is set.
    pub fn write_stdout(&self, s: &str) -> std::io::Result<()> {
        let target = self
            .stdout
            .clone()
            .or_else(|| self.vm.default_stdout.lock().expect("vm poisoned").clone());
        if let Some(out) = target {
            out.lock().expect("stdout poisoned").write_all(s.as_bytes())?;
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn top_locals_for_test(&mut self) -> Arc<SymbolTable> {
        if self.frames.is_empty() {
            self.push_frame(String::new(), SrcLocation::unknown())
                .expect("fresh thread state has room for one frame");
        }
        self.top_locals()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_frame_enforces_max_stack() {
        let vm = Arc::new(Vm::new());
        let mut thread = vm.new_thread_state(2, Allocator::default());
        thread.push_frame("a".into(), SrcLocation::unknown()).unwrap();
        thread.push_frame("b".into(), SrcLocation::unknown()).unwrap();
        let err = thread
            .push_frame("c".into(), SrcLocation::unknown())
            .unwrap_err();
        assert!(matches!(err.kind, threadscript_core::ErrorKind::OpRecursion));
    }

    #[test]
    fn call_frame_tags_error_with_frame_location_once() {
        let vm = Arc::new(Vm::new());
        let mut thread = vm.new_thread_state(10, Allocator::default());
        let result: Result<Value> = thread.call_frame(
            "f".into(),
            SrcLocation::new("t.ts", 3, 1),
            |_thread, _locals| Err(ThreadScriptError::op_div_zero()),
        );
        let err = result.unwrap_err();
        assert_eq!(err.trace.0.len(), 1);
        assert_eq!(err.trace.0[0].function, "f");
    }

    #[test]
    fn new_threads_see_globals_published_before_creation_only() {
        let vm = Arc::new(Vm::new());
        let g1 = Arc::new(SymbolTable::root());
        g1.insert_or_assign("x".into(), Value::new_int(1));
        vm.publish_globals(g1);
        let thread = vm.new_thread_state(10, Allocator::default());
        assert_eq!(
            thread.globals().lookup("x", true).unwrap().expect_int().unwrap(),
            1
        );

        let g2 = Arc::new(SymbolTable::root());
        g2.insert_or_assign("x".into(), Value::new_int(2));
        vm.publish_globals(g2);
        // Existing thread's snapshot is unaffected.
        assert_eq!(
            thread.globals().lookup("x", true).unwrap().expect_int().unwrap(),
            1
        );
    }
}
