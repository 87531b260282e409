//! Capture-layer behaviour observed through a real console and pipeline.

mod test_utils;

use std::panic;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use console_bridge::{
    ArgValue, BridgeConfig, Console, ConsoleBridge, ConsoleLevel, ErrorValue, InstallError,
    NativeHandle, ObjectRef, OriginSource, args,
};
use rstest::rstest;
use serde_json::json;
use serial_test::serial;

use test_utils::{
    BufferedConsole, FLUSH_WAIT, RecordingSink, buffered_console, new_buffered_console, test_config,
};

#[rstest]
fn restore_puts_back_the_exact_originals(buffered_console: BufferedConsole, test_config: BridgeConfig) {
    let console = &buffered_console.console;
    let before = console.snapshot();

    let bridge = ConsoleBridge::install_with_sink(console, test_config, RecordingSink::default())
        .expect("install");
    for (level, original) in ConsoleLevel::ALL.into_iter().zip(&before) {
        assert!(!Arc::ptr_eq(&console.method(level), original));
        assert!(Arc::ptr_eq(&bridge.original(level), original));
    }

    bridge.restore();
    bridge.restore();
    for (level, original) in ConsoleLevel::ALL.into_iter().zip(&before) {
        assert!(Arc::ptr_eq(&console.method(level), original));
    }
    assert!(!bridge.is_active());
}

#[rstest]
fn original_output_is_unchanged(buffered_console: BufferedConsole, test_config: BridgeConfig) {
    let BufferedConsole {
        console,
        stdout,
        stderr,
    } = buffered_console;
    console.log(&args!["before", 1]);
    console.error(&args!["failure", false]);

    let bridge = ConsoleBridge::install_with_sink(&console, test_config, RecordingSink::default())
        .expect("install");
    console.log(&args!["before", 1]);
    console.error(&args!["failure", false]);
    bridge.restore();

    assert_eq!(stdout.contents(), "before 1\nbefore 1\n");
    assert_eq!(stderr.contents(), "failure false\nfailure false\n");
}

#[rstest]
fn every_level_is_captured_in_call_order(
    buffered_console: BufferedConsole,
    test_config: BridgeConfig,
) {
    let console = &buffered_console.console;
    let sink = RecordingSink::default();
    let bridge =
        ConsoleBridge::install_with_sink(console, test_config, sink.clone()).expect("install");

    console.debug(&args!["d"]);
    console.info(&args!["i"]);
    console.log(&args!["l"]);
    console.warn(&args!["w"]);
    console.error(&args!["e"]);
    assert!(bridge.flush(FLUSH_WAIT));

    assert_eq!(
        sink.levels(),
        [
            ConsoleLevel::Debug,
            ConsoleLevel::Info,
            ConsoleLevel::Log,
            ConsoleLevel::Warn,
            ConsoleLevel::Error,
        ]
    );
    let records = sink.records();
    assert!(records.iter().all(|r| r.url() == "http://localhost:5173/"));
    assert_eq!(records[2].args(), &[json!("l")]);
}

#[rstest]
fn arguments_are_serialised_safely(buffered_console: BufferedConsole, test_config: BridgeConfig) {
    let console = &buffered_console.console;
    let sink = RecordingSink::default();
    let bridge =
        ConsoleBridge::install_with_sink(console, test_config, sink.clone()).expect("install");

    let cyclic = ObjectRef::map();
    cyclic.insert("name", "loop");
    cyclic.insert("self", &cyclic);
    let error = ErrorValue::new("TypeError", "x is undefined").with_stack("at render");
    let element = ObjectRef::from_entries([("target", NativeHandle::element("button"))]);

    console.log(&args![
        ArgValue::Undefined,
        ArgValue::Null,
        error,
        &cyclic,
        &element,
        NativeHandle::Window,
        7.5
    ]);
    assert!(bridge.flush(FLUSH_WAIT));

    let records = sink.records();
    assert_eq!(
        records[0].args(),
        &[
            json!("undefined"),
            json!(null),
            json!({"__type": "Error", "name": "TypeError", "message": "x is undefined", "stack": "at render"}),
            json!("[object Object]"),
            json!({"target": "[HTMLElement: BUTTON]"}),
            json!("[Window]"),
            json!(7.5),
        ]
    );
}

#[rstest]
fn nested_console_calls_are_not_forwarded(
    buffered_console: BufferedConsole,
    mut test_config: BridgeConfig,
) {
    let console = Arc::clone(&buffered_console.console);
    let weak: Weak<Console> = Arc::downgrade(&console);
    test_config.origin = OriginSource::Dynamic(Arc::new(move || {
        if let Some(console) = weak.upgrade() {
            console.warn(&args!["resolving origin"]);
        }
        "app://nested".to_owned()
    }));
    let sink = RecordingSink::default();
    let bridge =
        ConsoleBridge::install_with_sink(&console, test_config, sink.clone()).expect("install");

    console.log(&args!["outer"]);
    assert!(bridge.flush(FLUSH_WAIT));

    assert_eq!(sink.levels(), [ConsoleLevel::Log]);
    assert_eq!(buffered_console.stderr.contents(), "resolving origin\n");
    assert_eq!(buffered_console.stdout.contents(), "outer\n");
}

#[rstest]
fn panicking_origin_never_reaches_the_caller(
    buffered_console: BufferedConsole,
    mut test_config: BridgeConfig,
) {
    test_config.origin = OriginSource::Dynamic(Arc::new(|| -> String { panic!("no location available") }));
    let console = &buffered_console.console;
    let bridge = ConsoleBridge::install_with_sink(console, test_config, RecordingSink::default())
        .expect("install");

    console.info(&args!["still printed"]);
    assert!(bridge.flush(FLUSH_WAIT));
    assert_eq!(buffered_console.stdout.contents(), "still printed\n");
}

#[rstest]
fn dropping_the_handle_restores_and_delivers(
    buffered_console: BufferedConsole,
    test_config: BridgeConfig,
) {
    let console = &buffered_console.console;
    let before = console.snapshot();
    let sink = RecordingSink::default();
    let bridge =
        ConsoleBridge::install_with_sink(console, test_config, sink.clone()).expect("install");
    for n in 0..3 {
        console.log(&args![n]);
    }
    drop(bridge);

    assert_eq!(sink.records().len(), 3);
    assert!(!console.is_bridged());
    for (level, original) in ConsoleLevel::ALL.into_iter().zip(&before) {
        assert!(Arc::ptr_eq(&console.method(level), original));
    }
}

#[rstest]
fn stale_handle_cannot_undo_a_newer_bridge(
    buffered_console: BufferedConsole,
    test_config: BridgeConfig,
) {
    let console = &buffered_console.console;
    let first = ConsoleBridge::install_with_sink(
        console,
        test_config.clone(),
        RecordingSink::default(),
    )
    .expect("first install");
    first.restore();

    let second = ConsoleBridge::install_with_sink(console, test_config, RecordingSink::default())
        .expect("second install");
    let wrapped = console.method(ConsoleLevel::Log);
    first.restore();
    drop(first);
    assert!(Arc::ptr_eq(&console.method(ConsoleLevel::Log), &wrapped));
    assert!(second.is_active());
}

fn explode() {
    panic!("kaboom");
}

#[rstest]
#[serial]
fn panics_are_reported_as_uncaught_errors(
    buffered_console: BufferedConsole,
    mut test_config: BridgeConfig,
) {
    test_config.capture_panics = true;
    let console = &buffered_console.console;
    let sink = RecordingSink::default();
    let bridge =
        ConsoleBridge::install_with_sink(console, test_config, sink.clone()).expect("install");

    let outcome = panic::catch_unwind(explode);
    assert!(outcome.is_err());
    assert!(bridge.flush(FLUSH_WAIT));

    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].level(), ConsoleLevel::Error);
    let payload = &records[0].args()[0];
    assert_eq!(payload["__type"], "UncaughtError");
    assert_eq!(payload["message"], "kaboom");
    assert!(payload["filename"].as_str().expect("filename").ends_with("bridge_tests.rs"));
    assert!(payload["lineno"].as_u64().expect("lineno") > 0);
}

#[rstest]
#[serial]
fn only_one_bridge_owns_the_panic_hook(mut test_config: BridgeConfig) {
    test_config.capture_panics = true;
    let first_console = new_buffered_console().console;
    let second_console = new_buffered_console().console;
    let _first = ConsoleBridge::install_with_sink(
        &first_console,
        test_config.clone(),
        RecordingSink::default(),
    )
    .expect("first install");

    let before = second_console.snapshot();
    let err = ConsoleBridge::install_with_sink(&second_console, test_config, RecordingSink::default())
        .expect_err("hook already owned");
    assert!(matches!(err, InstallError::PanicHookInUse));
    assert!(!second_console.is_bridged());
    for (level, original) in ConsoleLevel::ALL.into_iter().zip(&before) {
        assert!(Arc::ptr_eq(&second_console.method(level), original));
    }
}

#[rstest]
#[serial]
fn host_panics_survive_a_panicking_origin(
    buffered_console: BufferedConsole,
    mut test_config: BridgeConfig,
) {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);
    test_config.capture_panics = true;
    test_config.origin = OriginSource::Dynamic(Arc::new(move || -> String {
        if seen.fetch_add(1, Ordering::SeqCst) == 0 {
            "http://localhost:5173/first".to_owned()
        } else {
            panic!("no location")
        }
    }));
    let console = &buffered_console.console;
    let sink = RecordingSink::default();
    let bridge =
        ConsoleBridge::install_with_sink(console, test_config, sink.clone()).expect("install");

    console.log(&args!["ready"]);
    assert!(panic::catch_unwind(explode).is_err());
    let rejection = panic::catch_unwind(panic::AssertUnwindSafe(|| {
        bridge.report_unhandled_rejection(&ArgValue::from("timeout"));
    }));
    assert!(rejection.is_ok());
    assert!(bridge.flush(FLUSH_WAIT));

    let records = sink.records();
    assert_eq!(records.len(), 3);
    assert!(records.iter().all(|r| r.url() == "http://localhost:5173/first"));
    assert_eq!(records[1].args()[0]["message"], "kaboom");
    assert_eq!(records[2].args()[0]["reason"], "timeout");
}
