//! Tests for the global hooks.
//!
//! Hooks are process-wide, so everything touching them runs in a single test
//! of its own binary.

use std::{
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
    thread,
};

use softcheck::{
    CollectionMode, ErrorCollector, Failure, context,
    hooks::Hooks,
    trace::{FrameFilter, Trace, TraceCleaner},
};

static CLEANED: AtomicUsize = AtomicUsize::new(0);

fn counting_cleaner(trace: &mut Trace) {
    CLEANED.fetch_add(1, Ordering::SeqCst);
    FrameFilter::DEFAULT.clean(trace);
}

#[test]
fn test_hooks_lifecycle() {
    // Without hooks, collectors start in immediate mode.
    assert_eq!(ErrorCollector::new().mode(), CollectionMode::Immediate);

    Hooks::new()
        .default_mode(CollectionMode::Deferred)
        .trace_cleaner(counting_cleaner)
        .install()
        .unwrap();

    let rejected = Hooks::new().install().unwrap_err();
    assert_eq!(rejected.to_string(), "hooks are already installed globally");

    // A thread that never used softcheck picks up the configured mode.
    let mode = thread::spawn(context::mode).join().unwrap();
    assert_eq!(mode, CollectionMode::Deferred);

    let mut collector = ErrorCollector::new();
    collector.push_errors([Failure::new("a"), Failure::new("b")]);
    collector.throw_aggregate().unwrap_err();
    assert_eq!(CLEANED.load(Ordering::SeqCst), 1);

    // A collector's own cleaner takes precedence.
    let mut custom = ErrorCollector::new().with_cleaner(|_: &mut Trace| {});
    custom.push_error(Failure::new("c"));
    custom.throw_aggregate().unwrap_err();
    assert_eq!(CLEANED.load(Ordering::SeqCst), 1);

    let previous = Hooks::new().replace();
    assert!(previous.is_some());
    assert_eq!(ErrorCollector::new().mode(), CollectionMode::Immediate);

    assert!(Hooks::uninstall().is_some());
    assert!(Hooks::uninstall().is_none());

    // The frame filter is the cleaner of last resort.
    let mut fallback = ErrorCollector::stateful(CollectionMode::Deferred);
    fallback.push_error(Failure::new("d"));
    fallback.throw_aggregate().unwrap_err();
    assert_eq!(CLEANED.load(Ordering::SeqCst), 1);

    // An installed cleaner may reconfigure the hooks while it runs.
    static UNINSTALLED: AtomicBool = AtomicBool::new(false);
    Hooks::new()
        .trace_cleaner(|_: &mut Trace| {
            UNINSTALLED.store(Hooks::uninstall().is_some(), Ordering::SeqCst);
        })
        .install()
        .unwrap();

    let mut reconfiguring = ErrorCollector::stateful(CollectionMode::Deferred);
    reconfiguring.push_errors([Failure::new("e"), Failure::new("f")]);
    reconfiguring.throw_aggregate().unwrap_err();
    assert!(UNINSTALLED.load(Ordering::SeqCst));
    assert!(Hooks::uninstall().is_none());
}
