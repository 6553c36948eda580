//! End-to-end scenarios across evaluation, bytecode and the value bridge.

use jsbridge::{
    CompiledBytecode, ErrorKind, MAGIC, Runtime, RuntimeConfigBuilder, Value, ValueKind,
    compile_source, is_valid_artifact,
};

#[test]
fn test_evaluate_arithmetic() {
    let mut rt = Runtime::new().unwrap();
    let value = rt.evaluate("1+2", "scenario.js").unwrap();
    assert_eq!(value.kind(), ValueKind::Number);
    assert_eq!(value.as_number().unwrap(), 3.0);
}

#[test]
fn test_evaluate_object_literal() {
    let mut rt = Runtime::new().unwrap();
    let value = rt.evaluate("({a:1})", "scenario.js").unwrap();
    assert_eq!(value.kind(), ValueKind::Object);

    let obj = value.as_object(&mut rt).unwrap();
    assert_eq!(obj.get(&mut rt, "a").unwrap().as_number().unwrap(), 1.0);
}

#[test]
fn test_thrown_error_message() {
    let mut rt = Runtime::new().unwrap();
    let err = rt.evaluate("throw new Error('boom')", "scenario.js").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Script);
    assert!(err.contains("boom"));
}

#[test]
fn test_zeroed_buffer_is_host_error() {
    let mut rt = Runtime::new().unwrap();
    let zeros = [0u8; 16];
    let err = rt.execute_bytes(&zeros, false).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Host);
    let err = rt.execute_bytes(&zeros, true).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Host);

    let err = rt.execute_bytes(&[], true).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Host);

    // Right magic, nothing after it.
    let mut header = MAGIC.to_vec();
    header.extend_from_slice(&[0xFF; 4]);
    let err = rt.execute_bytes(&header, false).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Host);
}

#[test]
fn test_globals_persist_between_evaluations() {
    let mut rt = Runtime::new().unwrap();
    rt.evaluate("var x = 5", "first.js").unwrap();
    let value = rt.evaluate("x * 2", "second.js").unwrap();
    assert_eq!(value.as_number().unwrap(), 10.0);

    rt.evaluate("y = 7", "assign.js").unwrap();
    let value = rt.evaluate("y", "read.js").unwrap();
    assert_eq!(value.as_number().unwrap(), 7.0);
}

#[test]
fn test_runtimes_destroyed_out_of_order() {
    let first = Runtime::new().unwrap();
    let mut second = Runtime::new().unwrap();
    first.destroy();

    let value = second.evaluate("'b'.repeat(3)", "second.js").unwrap();
    let text = value.as_string(&mut second).unwrap();
    assert_eq!(text.utf8(&mut second).unwrap(), "bbb");
}

#[test]
fn test_runtime_usable_after_error() {
    let mut rt = Runtime::new().unwrap();
    assert!(rt.evaluate("undefinedFunction()", "bad.js").is_err());
    assert_eq!(rt.evaluate("'still ' + 'alive'", "ok.js").unwrap().to_display_string(&mut rt).unwrap(), "still alive");
}

#[test]
fn test_artifact_round_trip_matches_evaluate() {
    let sources = [
        "1 + 2",
        "'abc'.toUpperCase()",
        "[1, 2, 3].map(n => n * n).reduce((a, b) => a + b)",
        "typeof undefined === 'undefined'",
        "null",
        "void 0",
        "(function fib(n) { return n < 2 ? n : fib(n - 1) + fib(n - 2); })(15)",
    ];

    for optimize in [false, true] {
        for source in sources {
            let mut direct = Runtime::new().unwrap();
            let expected = direct.evaluate(source, "direct.js").unwrap();
            let expected_text = expected.to_display_string(&mut direct).unwrap();

            let artifact = compile_source(source, "compiled.js", optimize).unwrap();
            assert!(is_valid_artifact(artifact.as_bytes()));

            let mut rt = Runtime::new().unwrap();
            let owned = rt.execute_artifact(&artifact).unwrap();
            assert_eq!(owned.kind(), expected.kind(), "{}", source);
            assert_eq!(owned.to_display_string(&mut rt).unwrap(), expected_text);

            let borrowed = rt.execute_bytes(artifact.as_bytes(), true).unwrap();
            assert_eq!(borrowed.kind(), expected.kind(), "{}", source);
            assert_eq!(borrowed.to_display_string(&mut rt).unwrap(), expected_text);
        }
    }
}

#[test]
fn test_owned_copy_outlives_host_buffer() {
    let artifact = compile_source("6 * 7", "answer.js", false).unwrap();
    let owned = {
        let host_buffer = artifact.as_bytes().to_vec();
        CompiledBytecode::copy_from(&host_buffer)
    };

    let mut rt = Runtime::new().unwrap();
    assert_eq!(rt.execute_artifact(&owned).unwrap().as_number().unwrap(), 42.0);
}

#[test]
fn test_artifact_compiled_in_runtime() {
    let mut rt = Runtime::new().unwrap();
    let artifact = rt
        .compile("var greeting = 'hi'; greeting.length", "greet.js", false)
        .unwrap();

    let mut other = Runtime::new().unwrap();
    assert_eq!(other.execute_artifact(&artifact).unwrap().as_number().unwrap(), 2.0);
    let greeting = other.evaluate("greeting", "check.js").unwrap();
    assert_eq!(greeting.to_display_string(&mut other).unwrap(), "hi");
}

#[test]
fn test_artifact_runtime_error() {
    let artifact = compile_source("throw new TypeError('from bytecode')", "throws.js", false).unwrap();
    let mut rt = Runtime::new().unwrap();
    let err = rt.execute_artifact(&artifact).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Script);
    assert!(err.contains("from bytecode"));
}

#[test]
fn test_compile_error_produces_no_artifact() {
    let err = compile_source("var = 1;", "broken.js", true).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Compile);
}

#[test]
fn test_call_dispatch_scenarios() {
    let mut rt = Runtime::new().unwrap();
    rt.evaluate(
        r#"
        function add(a, b) { return a + b; }
        function Point(x, y) { this.x = x; this.y = y; }
        function fail() { throw new Error('test error'); }
        "#,
        "setup.js",
    )
    .unwrap();

    let global = rt.global().unwrap();
    let add = global
        .get(&mut rt, "add")
        .unwrap()
        .as_object(&mut rt)
        .unwrap()
        .as_function(&mut rt)
        .unwrap();
    let sum = add.call(&mut rt, &[Value::from(5), Value::from(3)]).unwrap();
    assert_eq!(sum.as_number().unwrap(), 8.0);

    let point = global
        .get(&mut rt, "Point")
        .unwrap()
        .as_object(&mut rt)
        .unwrap()
        .as_function(&mut rt)
        .unwrap();
    let p = point
        .call_as_constructor(&mut rt, &[Value::from(3), Value::from(4)])
        .unwrap()
        .as_object(&mut rt)
        .unwrap();
    assert_eq!(p.get(&mut rt, "x").unwrap().as_number().unwrap(), 3.0);
    assert_eq!(p.get(&mut rt, "y").unwrap().as_number().unwrap(), 4.0);

    let fail = global
        .get(&mut rt, "fail")
        .unwrap()
        .as_object(&mut rt)
        .unwrap()
        .as_function(&mut rt)
        .unwrap();
    let err = fail.call(&mut rt, &[]).unwrap_err();
    assert!(err.contains("test error"));
}

#[test]
fn test_runtimes_on_separate_threads() {
    let workers: Vec<_> = (0..4)
        .map(|i| {
            std::thread::spawn(move || {
                let config = RuntimeConfigBuilder::new()
                    .max_heap_size(64 << 20)
                    .build()
                    .unwrap();
                let mut rt = Runtime::with_config(&config).unwrap();
                let value = rt.evaluate(&format!("{} * 10", i), "worker.js").unwrap();
                value.as_number().unwrap()
            })
        })
        .collect();

    let results: Vec<f64> = workers.into_iter().map(|w| w.join().unwrap()).collect();
    assert_eq!(results, vec![0.0, 10.0, 20.0, 30.0]);
}

#[test]
fn test_handles_from_destroyed_runtime_are_rejected() {
    let mut first = Runtime::new().unwrap();
    let obj = first.evaluate("({ a: 1 })", "first.js").unwrap().as_object(&mut first).unwrap();
    first.destroy();

    let mut second = Runtime::new().unwrap();
    let err = obj.get(&mut second, "a").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Host);
}
