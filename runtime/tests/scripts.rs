//! End-to-end tests: parse real canonical-grammar source, run it through a
//! VM, and check observable results (stdout, return values, error kinds)
//! rather than individual module internals.

use std::sync::{Arc, Mutex};

use threadscript_runtime::builtins::predef_symbols;
use threadscript_runtime::config::Config;
use threadscript_runtime::state::run::{run_single_phase, run_two_phase, WorkerOutcome};
use threadscript_runtime::{parse, ErrorKind, Vm};

fn vm_with_builtins() -> Arc<Vm> {
    let vm = Arc::new(Vm::new());
    vm.publish_globals(predef_symbols());
    vm
}

fn config_with_max_stack(max_stack: usize) -> Config {
    Config {
        max_stack,
        ..Config::default()
    }
}

fn config_with_memory_limit(memory_limit: usize) -> Config {
    Config {
        memory_limit,
        ..Config::default()
    }
}

fn captured_stdout(vm: &Arc<Vm>) -> Arc<Mutex<Vec<u8>>> {
    let buf = Arc::new(Mutex::new(Vec::new()));
    vm.set_default_stdout(buf.clone());
    buf
}

#[test]
fn prints_hello_world() {
    let vm = vm_with_builtins();
    let out = captured_stdout(&vm);
    let script = parse(r#"fun("_main", print("Hello, World!"))"#, "hello.ts").unwrap();
    let outcome = run_single_phase(&vm, &script, &config_with_max_stack(1000));
    assert!(matches!(outcome, WorkerOutcome::Ok(_)));
    assert_eq!(
        String::from_utf8(out.lock().unwrap().clone()).unwrap(),
        "Hello, World!"
    );
}

#[test]
fn buffered_channel_preserves_fifo_order() {
    let vm = vm_with_builtins();
    let src = r#"
        fun("_main", seq(
            var("ch", channel(1)),
            ch("send", +1),
            ch("send", +2),
            var("a", ch("recv")),
            var("b", ch("recv")),
            eq(var("a"), sub(var("b"), +1))
        ))
    "#;
    let script = parse(src, "fifo.ts").unwrap();
    let outcome = run_single_phase(&vm, &script, &config_with_max_stack(1000));
    match outcome {
        WorkerOutcome::Ok(v) => assert!(v.expect_bool().unwrap()),
        other => panic!("expected a successful bool result, got {other:?}"),
    }
}

#[test]
fn rendezvous_channel_pairs_main_sends_with_thread_receives() {
    let vm = vm_with_builtins();
    let src = r#"
        seq(
            var("ch", channel(0)),
            fun("_main", seq(
                var("i", +0),
                while(lt(var("i"), +3), seq(
                    ch("send", var("i")),
                    var("i", add(var("i"), +1))
                )),
                +1
            )),
            fun("_thread", ch("recv"))
        )
    "#;
    let script = parse(src, "rendezvous.ts").unwrap();
    let outcome = run_two_phase(&vm, &script, 3, &config_with_max_stack(1000));
    assert!(outcome.all_ok(), "outcome was not all-ok: {outcome:?}");
    assert_eq!(outcome.workers.len(), 3);
}

#[test]
fn stack_recursion_cap_raises_op_recursion() {
    let vm = vm_with_builtins();
    let src = r#"
        seq(
            fun("f", f()),
            fun("_main", f())
        )
    "#;
    let script = parse(src, "recurse.ts").unwrap();
    let outcome = run_single_phase(&vm, &script, &config_with_max_stack(5));
    match outcome {
        WorkerOutcome::Err(e) => assert!(matches!(e.kind, ErrorKind::OpRecursion)),
        other => panic!("expected op_recursion, got {other:?}"),
    }
}

#[test]
fn growing_a_shared_vector_past_the_memory_limit_raises_alloc_limit() {
    let vm = vm_with_builtins();
    let src = r#"
        fun("_main", seq(
            var("v", shared_vector()),
            v("at", +5, +1)
        ))
    "#;
    let script = parse(src, "quota.ts").unwrap();
    let outcome = run_single_phase(&vm, &script, &config_with_memory_limit(3));
    match outcome {
        WorkerOutcome::Err(e) => assert!(matches!(e.kind, ErrorKind::AllocLimit)),
        other => panic!("expected alloc_limit, got {other:?}"),
    }
}

#[test]
fn try_catches_div_by_zero_by_kind_name() {
    let vm = vm_with_builtins();
    let src = r#"
        fun("_main", try(div(+1, +0), var("_exception")))
    "#;
    let script = parse(src, "try.ts").unwrap();
    let outcome = run_single_phase(&vm, &script, &config_with_max_stack(1000));
    match outcome {
        WorkerOutcome::Ok(v) => assert_eq!(v.expect_string().unwrap(), "op_div_zero"),
        other => panic!("expected the caught exception kind name, got {other:?}"),
    }
}

#[test]
fn two_parses_of_the_same_source_are_structurally_equal() {
    let src = r#"print("a", 1, null)"#;
    let a = parse(src, "x.ts").unwrap();
    let b = parse(src, "x.ts").unwrap();
    assert_eq!(*a.root, *b.root);
}

#[test]
fn missing_closing_paren_reports_a_parse_error_location() {
    let err = parse("seq(print(1)", "bad.ts").unwrap_err();
    assert!(matches!(err.kind, ErrorKind::ParseError(_)));
    assert_eq!(err.kind_name(), "parse_error");
}
