//! Retrying resolution against a tree that changes while we wait

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use element_locator::{Criteria, Desktop, LocateError, ResolutionState, Timings, WaitFor};
use serial_test::serial;
use souldesk_element::{MemoryBackend, MemoryTree, NativeId, NodeSpec};
use tokio_util::sync::CancellationToken;

const TIMEOUT: Duration = Duration::from_millis(500);
const RETRY: Duration = Duration::from_millis(100);

fn desktop() -> (MemoryTree, Desktop) {
    let tree = MemoryTree::from_spec(NodeSpec::new("#32769").child(
        NodeSpec::window("Notepad", "Untitled - Notepad")
            .with_id("np")
            .child(NodeSpec::control("Edit", "").with_id("np-edit")),
    ))
    .unwrap();
    let desktop = Desktop::new(Arc::new(MemoryBackend::new(tree.clone())));
    (tree, desktop)
}

fn add_later(tree: &MemoryTree, delay: Duration, spec: NodeSpec) -> thread::JoinHandle<()> {
    let tree = tree.clone();
    thread::spawn(move || {
        thread::sleep(delay);
        tree.add_top_level(spec).unwrap();
    })
}

#[test]
#[serial]
fn element_appearing_late_is_found() {
    let (tree, desktop) = desktop();
    let spec = desktop.window(Criteria::new().title("Save As"));
    let writer = add_later(
        &tree,
        Duration::from_millis(300),
        NodeSpec::window("#32770", "Save As").with_id("dlg"),
    );

    let start = Instant::now();
    let report = spec.resolve_report(TIMEOUT, RETRY);
    writer.join().unwrap();

    assert_eq!(report.state, ResolutionState::Resolved);
    assert!(report.attempts >= 2);
    assert!(start.elapsed() >= Duration::from_millis(300));
    assert!(start.elapsed() < Duration::from_millis(1500));
    assert_eq!(report.outcome.unwrap().native_id().as_str(), "dlg");
}

#[test]
#[serial]
fn element_never_appearing_times_out() {
    let (_tree, desktop) = desktop();
    let spec = desktop.window(Criteria::new().title("Save As"));

    let start = Instant::now();
    let err = spec.resolve_with(TIMEOUT, RETRY).unwrap_err();
    let elapsed = start.elapsed();

    assert!(elapsed >= TIMEOUT);
    assert!(elapsed < Duration::from_millis(1500));
    match &err {
        LocateError::Timeout { attempts, last, .. } => {
            assert!(*attempts >= 5);
            assert!(matches!(**last, LocateError::NotFound { .. }));
        }
        other => panic!("expected timeout, got {other}"),
    }
    assert!(err.is_not_found());
}

#[test]
#[serial]
fn chain_is_reevaluated_when_window_is_recreated() {
    let (tree, desktop) = desktop();
    let edit = desktop
        .window(Criteria::new().class_name("Notepad"))
        .append(Criteria::new().control_type("Edit"));
    let first = edit.resolve_with(TIMEOUT, RETRY).unwrap();

    tree.remove(&NativeId::from("np")).unwrap();
    let writer = add_later(
        &tree,
        Duration::from_millis(150),
        NodeSpec::window("Notepad", "Untitled - Notepad")
            .with_id("np-2")
            .child(NodeSpec::control("Edit", "").with_id("np-2-edit")),
    );

    let second = edit.resolve_with(Duration::from_secs(2), RETRY).unwrap();
    writer.join().unwrap();
    assert_ne!(first, second);
    assert_eq!(second.native_id().as_str(), "np-2-edit");
    assert!(!first.is_alive());
}

#[test]
#[serial]
fn stale_parent_override_times_out_as_invalid_reference() {
    let (tree, desktop) = desktop();
    let window = desktop
        .window(Criteria::new().class_name("Notepad"))
        .resolve_with(TIMEOUT, RETRY)
        .unwrap();
    let spec = desktop
        .window(Criteria::new().class_name("Unrelated"))
        .append_under(window, Criteria::new().control_type("Edit"));

    // the override skips the unresolvable first level entirely
    assert_eq!(
        spec.resolve_with(TIMEOUT, RETRY).unwrap().native_id().as_str(),
        "np-edit"
    );

    tree.remove(&NativeId::from("np")).unwrap();
    let err = spec
        .resolve_with(Duration::from_millis(200), Duration::from_millis(50))
        .unwrap_err();
    assert!(err.is_timeout());
    assert!(err.is_invalid_reference());
}

#[test]
#[serial]
fn cancellation_stops_retrying() {
    let (_tree, desktop) = desktop();
    let token = CancellationToken::new();
    let spec = desktop
        .clone()
        .with_cancel(token.clone())
        .window(Criteria::new().title("Never"));

    let canceller = {
        let token = token.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(150));
            token.cancel();
        })
    };

    let start = Instant::now();
    let err = spec
        .resolve_with(Duration::from_secs(10), Duration::from_millis(50))
        .unwrap_err();
    canceller.join().unwrap();

    assert!(matches!(err, LocateError::Cancelled));
    assert!(start.elapsed() < Duration::from_secs(5));
}

#[test]
#[serial]
fn resolve_all_returns_every_last_level_match() {
    let (tree, desktop) = desktop();
    tree.add(
        &NativeId::from("np"),
        NodeSpec::control("Edit", "second").with_id("np-edit-2"),
    )
    .unwrap();
    let edits = desktop
        .window(Criteria::new().class_name("Notepad"))
        .append(Criteria::new().control_type("Edit"));

    assert!(edits.resolve_with(TIMEOUT, RETRY).unwrap_err().is_ambiguous());

    let all = edits.resolve_all_with(TIMEOUT, RETRY).unwrap();
    let ids: Vec<&str> = all.iter().map(|e| e.native_id().as_str()).collect();
    assert_eq!(ids, vec!["np-edit", "np-edit-2"]);

    let second = edits
        .levels()
        .last()
        .map(|level| level.criteria.clone().found_index(1))
        .unwrap();
    let picked = desktop
        .window(Criteria::new().class_name("Notepad"))
        .append(second)
        .resolve_with(TIMEOUT, RETRY)
        .unwrap();
    assert_eq!(picked.native_id().as_str(), "np-edit-2");

    let none = desktop
        .window(Criteria::new().class_name("Notepad"))
        .append(Criteria::new().control_type("Button"))
        .resolve_all_with(Duration::from_millis(100), Duration::from_millis(25))
        .unwrap_err();
    assert!(none.is_not_found());
}

#[test]
#[serial]
fn wait_for_visibility_change() {
    let (tree, desktop) = desktop();
    tree.update(&NativeId::from("np-edit"), |props| props.visible = false)
        .unwrap();
    let edit = desktop
        .window(Criteria::new().class_name("Notepad"))
        .append(Criteria::new().control_type("Edit").visible_only(false));

    let updater = {
        let tree = tree.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(150));
            tree.update(&NativeId::from("np-edit"), |props| props.visible = true)
                .unwrap();
        })
    };
    let element = edit
        .wait_for(WaitFor::VISIBLE, Duration::from_secs(2), Duration::from_millis(25))
        .unwrap();
    updater.join().unwrap();
    assert!(element.is_visible().unwrap());

    let timings = Timings::defaults().scaled(0.1);
    assert!(edit.with_timings(timings).exists());
    tree.remove(&NativeId::from("np")).unwrap();
    assert!(!edit.with_timings(timings).exists());
}
