//! Lifecycle ordering and failure isolation of the execution engine.

mod common;

use common::Journal;
use mspec_core::fakes::RecordingListener;
use mspec_core::{
    capture, AssemblyMetadata, Engine, FailureKind, FixtureBuilder, RunOptions, Status,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct Account {
    balance: i64,
}

fn run(metadata: &AssemblyMetadata) -> RecordingListener {
    let recorder = RecordingListener::new();
    Engine::default().run(metadata, &recorder);
    recorder
}

// ── Action failures ───────────────────────────────────────────────────

#[test]
fn throwing_action_fails_both_specs_with_same_exception() {
    let journal = Journal::new();
    let metadata = AssemblyMetadata::new("asm").with_type(
        FixtureBuilder::<Account>::new("ns", "context_with_throwing_because")
            .establish("context", journal.step("establish"))
            .because("of", journal.failing("because", "something went wrong"))
            .it("should_fail", journal.step("it_1"))
            .it("should_also_fail", journal.step("it_2"))
            .context("after_all", journal.step("after_all"))
            .build(),
    );

    let recorder = run(&metadata);
    let results = recorder.results();
    assert_eq!(results.len(), 2);
    for (_, result) in &results {
        assert_eq!(result.status, Status::Failing);
        assert_eq!(
            result.exception.as_ref().map(|e| e.message.as_str()),
            Some("something went wrong")
        );
    }
    let kinds: Vec<_> = results
        .iter()
        .map(|(_, r)| r.exception.as_ref().map(|e| e.kind))
        .collect();
    assert_eq!(kinds, [Some(FailureKind::Error), Some(FailureKind::Error)]);
    assert_eq!(journal.count("it_1"), 0);
    assert_eq!(journal.count("it_2"), 0);
    assert_eq!(journal.count("after_all"), 1);
}

#[test]
fn failing_setup_each_skips_action_and_assertion() {
    let journal = Journal::new();
    let metadata = AssemblyMetadata::new("asm").with_type(
        FixtureBuilder::<Account>::new("ns", "Ctx")
            .establish("context", journal.failing("establish", "no database"))
            .because("of", journal.step("because"))
            .it("never_runs", journal.step("it"))
            .cleanup("after", journal.step("cleanup"))
            .build(),
    );

    let recorder = run(&metadata);
    assert_eq!(recorder.result_of("never_runs").map(|r| r.status), Some(Status::Failing));
    assert_eq!(journal.entries(), ["establish", "cleanup"]);
}

#[test]
fn failing_assertion_still_runs_teardown() {
    let journal = Journal::new();
    let metadata = AssemblyMetadata::new("asm").with_type(
        FixtureBuilder::<Account>::new("ns", "Ctx")
            .because("of", journal.step("because"))
            .it("fails", journal.failing("it", "expected 1, got 2"))
            .cleanup("after", journal.step("cleanup"))
            .build(),
    );

    let recorder = run(&metadata);
    let result = recorder.result_of("fails").expect("result");
    assert_eq!(result.status, Status::Failing);
    assert_eq!(journal.entries(), ["because", "it", "cleanup"]);
}

#[test]
fn panicking_assertion_is_contained() {
    let metadata = AssemblyMetadata::new("asm").with_type(
        FixtureBuilder::<Account>::new("ns", "Ctx")
            .it("panics", |_| panic!("assertion blew up"))
            .it("still_runs", |_| Ok(()))
            .build(),
    );

    let recorder = run(&metadata);
    let panicked = recorder.result_of("panics").expect("result");
    assert_eq!(panicked.status, Status::Failing);
    let exception = panicked.exception.expect("exception");
    assert_eq!(exception.kind, FailureKind::Panic);
    assert_eq!(exception.message, "assertion blew up");
    assert_eq!(recorder.result_of("still_runs").map(|r| r.status), Some(Status::Passing));
}

// ── Action policies ───────────────────────────────────────────────────

#[test]
fn assertion_without_action_mutates_fixture_and_passes() {
    let metadata = AssemblyMetadata::new("asm").with_type(
        FixtureBuilder::<Account>::new("ns", "context_without_because")
            .it("should_be_able_to_deposit", |a| {
                a.balance += 10;
                anyhow::ensure!(a.balance == 10, "balance was {}", a.balance);
                Ok(())
            })
            .build(),
    );

    let recorder = run(&metadata);
    assert_eq!(
        recorder.result_of("should_be_able_to_deposit").map(|r| r.status),
        Some(Status::Passing)
    );
}

#[test]
fn unassigned_action_is_a_no_op() {
    let metadata = AssemblyMetadata::new("asm").with_type(
        FixtureBuilder::<Account>::new("ns", "DescriptionWithEmptyWhen")
            .unassigned("Because", "nothing_happens")
            .it("should_pass", |_| Ok(()))
            .build(),
    );

    let recorder = run(&metadata);
    assert_eq!(recorder.result_of("should_pass").map(|r| r.status), Some(Status::Passing));
}

#[test]
fn two_actions_compound_before_every_assertion() {
    let journal = Journal::new();
    let metadata = AssemblyMetadata::new("asm").with_type(
        FixtureBuilder::<Account>::new("ns", "DescriptionWithTwoWhens")
            .because("of_1", journal.step("when_1"))
            .it("should_do_1", journal.step("it_1"))
            .because("of_2", journal.step("when_2"))
            .it("should_do_2", journal.step("it_2"))
            .build(),
    );

    let recorder = run(&metadata);
    assert!(recorder.results().iter().all(|(_, r)| r.status == Status::Passing));
    assert_eq!(
        journal.entries(),
        ["when_1", "when_2", "it_1", "when_1", "when_2", "it_2"]
    );
}

#[test]
fn unassigned_assertion_skips_whole_chain() {
    let journal = Journal::new();
    let metadata = AssemblyMetadata::new("asm").with_type(
        FixtureBuilder::<Account>::new("ns", "DescriptionWithEmptySpecification")
            .establish("context", journal.step("establish"))
            .because("not_called", journal.step("because"))
            .unassigned("It", "should_be_not_implemented")
            .cleanup("after", journal.step("cleanup"))
            .build(),
    );

    let recorder = run(&metadata);
    let result = recorder.result_of("should_be_not_implemented").expect("result");
    assert_eq!(result.status, Status::NotImplemented);
    assert!(result.exception.is_none());
    assert!(journal.entries().is_empty());
}

// ── Teardown ──────────────────────────────────────────────────────────

#[test]
fn throwing_cleanup_attaches_supplementary_to_passing_spec() {
    let journal = Journal::new();
    let metadata = AssemblyMetadata::new("asm").with_type(
        FixtureBuilder::<Account>::new("ns", "context_with_throwing_cleanup")
            .it("should_pass", |_| Ok(()))
            .cleanup("after", journal.failing("cleanup", "cannot clean up"))
            .member("After", "also_after", journal.step("after"))
            .build(),
    );

    let recorder = run(&metadata);
    let result = recorder.result_of("should_pass").expect("result");
    assert_eq!(result.status, Status::Passing);
    assert!(result.exception.is_none());
    assert_eq!(
        result.supplementary.map(|e| e.message),
        Some("cannot clean up".to_string())
    );
    assert_eq!(journal.entries(), ["cleanup", "after"]);
}

#[test]
fn cleanup_failure_never_replaces_assertion_failure() {
    let metadata = AssemblyMetadata::new("asm").with_type(
        FixtureBuilder::<Account>::new("ns", "Ctx")
            .it("fails", |_| anyhow::bail!("assertion failed"))
            .cleanup("after", |_| anyhow::bail!("cleanup failed"))
            .build(),
    );

    let recorder = run(&metadata);
    let result = recorder.result_of("fails").expect("result");
    assert_eq!(result.status, Status::Failing);
    assert_eq!(result.exception.map(|e| e.message), Some("assertion failed".to_string()));
    assert!(result.supplementary.is_none());
}

// ── Once-phases ───────────────────────────────────────────────────────

#[test]
fn setup_once_runs_exactly_once() {
    let journal = Journal::new();
    let metadata = AssemblyMetadata::new("asm").with_type(
        FixtureBuilder::<Account>::new("ns", "Ctx")
            .context("before_all", journal.step("before_all"))
            .context("before_each", journal.step("before_each"))
            .it("a", |_| Ok(()))
            .it("b", |_| Ok(()))
            .it("c", |_| Ok(()))
            .context("after_all", journal.step("after_all"))
            .build(),
    );

    run(&metadata);
    assert_eq!(journal.count("before_all"), 1);
    assert_eq!(journal.count("before_each"), 3);
    assert_eq!(journal.count("after_all"), 1);
    assert_eq!(journal.entries().first().map(String::as_str), Some("before_all"));
    assert_eq!(journal.entries().last().map(String::as_str), Some("after_all"));
}

#[test]
fn setup_once_runs_for_context_without_specifications() {
    let journal = Journal::new();
    let metadata = AssemblyMetadata::new("asm").with_type(
        FixtureBuilder::<Account>::new("ns", "OnlyAction")
            .context("before_all", journal.step("before_all"))
            .because("of", journal.step("because"))
            .build(),
    );

    let recorder = run(&metadata);
    assert!(recorder.results().is_empty());
    assert_eq!(journal.entries(), ["before_all"]);
}

#[test]
fn setup_once_failure_fails_every_spec_beneath() {
    let journal = Journal::new();
    let metadata = AssemblyMetadata::new("asm")
        .with_type(
            FixtureBuilder::<Account>::new("ns", "Outer")
                .context("before_all", journal.failing("before_all", "cannot connect"))
                .it("outer_spec", journal.step("outer_spec"))
                .unassigned("It", "outer_pending")
                .context("after_all", journal.step("after_all"))
                .build(),
        )
        .with_type(
            FixtureBuilder::<Account>::new("ns", "Inner")
                .nested_in("ns::Outer")
                .context("before_all", journal.step("inner_before_all"))
                .it("inner_spec", journal.step("inner_spec"))
                .ignored_it("inner_ignored", "later", journal.step("inner_ignored"))
                .build(),
        );

    let recorder = run(&metadata);
    for field in ["outer_spec", "inner_spec"] {
        let result = recorder.result_of(field).expect("result");
        assert_eq!(result.status, Status::Failing, "{field}");
        assert_eq!(result.exception.map(|e| e.message), Some("cannot connect".to_string()));
    }
    assert_eq!(
        recorder.result_of("outer_pending").map(|r| r.status),
        Some(Status::NotImplemented)
    );
    assert_eq!(
        recorder.result_of("inner_ignored").map(|r| r.status),
        Some(Status::Ignored)
    );
    assert_eq!(journal.entries(), ["before_all", "after_all"]);
}

#[test]
fn failing_factory_is_a_setup_failure() {
    let metadata = AssemblyMetadata::new("asm").with_type(
        FixtureBuilder::<Account>::with_factory("ns", "Ctx", || panic!("factory exploded"))
            .it("spec", |_| Ok(()))
            .build(),
    );

    let recorder = run(&metadata);
    let result = recorder.result_of("spec").expect("result");
    assert_eq!(result.status, Status::Failing);
    assert_eq!(result.exception.map(|e| e.kind), Some(FailureKind::Panic));
}

#[test]
fn teardown_once_failure_is_a_context_note() {
    let metadata = AssemblyMetadata::new("asm").with_type(
        FixtureBuilder::<Account>::new("ns", "Ctx")
            .it("passes", |_| Ok(()))
            .context("after_all", |_| anyhow::bail!("leaked handle"))
            .build(),
    );

    let report = Engine::default().run(&metadata, &RecordingListener::new());
    assert_eq!(report.passed_count(), 1);
    assert_eq!(report.context_failures.len(), 1);
    assert_eq!(report.context_failures[0].context, "ns::Ctx");
    assert!(!report.failure_occurred());
}

// ── Ignored ───────────────────────────────────────────────────────────

#[test]
fn ignored_spec_runs_no_phase_for_itself() {
    let journal = Journal::new();
    let metadata = AssemblyMetadata::new("asm").with_type(
        FixtureBuilder::<Account>::new("ns", "Ctx")
            .establish("context", journal.step("establish"))
            .because("of", journal.step("because"))
            .ignored_it("skipped", "not ready", journal.step("skipped"))
            .cleanup("after", journal.step("cleanup"))
            .build(),
    );

    let recorder = run(&metadata);
    assert_eq!(recorder.result_of("skipped").map(|r| r.status), Some(Status::Ignored));
    assert!(journal.entries().is_empty());
}

#[test]
fn ignored_context_creates_no_instance() {
    let created = Arc::new(AtomicUsize::new(0));
    let counter = created.clone();
    let journal = Journal::new();
    let metadata = AssemblyMetadata::new("asm")
        .with_type(
            FixtureBuilder::<Account>::with_factory("ns", "Ignored", move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Account::default()
            })
            .ignore("flaky backend")
            .context("before_all", journal.step("before_all"))
            .it("a", journal.step("a"))
            .build(),
        )
        .with_type(
            FixtureBuilder::<Account>::new("ns", "Child")
                .nested_in("ns::Ignored")
                .it("b", journal.step("b"))
                .build(),
        );

    let recorder = run(&metadata);
    assert_eq!(created.load(Ordering::SeqCst), 0);
    assert!(journal.entries().is_empty());
    assert!(recorder.results().iter().all(|(_, r)| r.status == Status::Ignored));
    assert_eq!(recorder.results().len(), 2);
}

// ── Nesting and shared behavior ───────────────────────────────────────

#[test]
fn nested_setup_root_to_leaf_and_teardown_leaf_to_root() {
    let journal = Journal::new();
    let metadata = AssemblyMetadata::new("asm")
        .with_type(
            FixtureBuilder::<Account>::new("ns", "Outer")
                .context("before_all", journal.step("outer_before_all"))
                .establish("context", journal.step("outer_establish"))
                .because("of", journal.step("outer_because"))
                .cleanup("after", journal.step("outer_cleanup"))
                .context("after_all", journal.step("outer_after_all"))
                .build(),
        )
        .with_type(
            FixtureBuilder::<Account>::new("ns", "Inner")
                .nested_in("ns::Outer")
                .context("before_all", journal.step("inner_before_all"))
                .establish("context", journal.step("inner_establish"))
                .because("of", journal.step("inner_because"))
                .it("works", journal.step("inner_it"))
                .cleanup("after", journal.step("inner_cleanup"))
                .context("after_all", journal.step("inner_after_all"))
                .build(),
        );

    run(&metadata);
    assert_eq!(
        journal.entries(),
        [
            "outer_before_all",
            "inner_before_all",
            "outer_establish",
            "inner_establish",
            "outer_because",
            "inner_because",
            "inner_it",
            "inner_cleanup",
            "outer_cleanup",
            "inner_after_all",
            "outer_after_all",
        ]
    );
}

#[test]
fn ancestor_members_run_against_their_own_instance() {
    #[derive(Default)]
    struct Outer {
        prepared: bool,
    }

    let metadata = AssemblyMetadata::new("asm")
        .with_type(
            FixtureBuilder::<Outer>::new("ns", "Outer")
                .establish("context", |o| {
                    o.prepared = true;
                    Ok(())
                })
                .build(),
        )
        .with_type(
            FixtureBuilder::<Account>::new("ns", "Inner")
                .nested_in("ns::Outer")
                .because("of", |a| {
                    a.balance = 5;
                    Ok(())
                })
                .it("sees_own_state", |a| {
                    anyhow::ensure!(a.balance == 5);
                    Ok(())
                })
                .build(),
        );

    let recorder = run(&metadata);
    assert_eq!(
        recorder.result_of("sees_own_state").map(|r| r.status),
        Some(Status::Passing)
    );
}

#[test]
fn shared_behavior_runs_at_inclusion_point() {
    let journal = Journal::new();
    let metadata = AssemblyMetadata::new("asm")
        .with_type(
            FixtureBuilder::<Account>::new("ns", "StandardAccountBehavior")
                .behavior()
                .establish("shared_setup", journal.step("shared_setup"))
                .it("should_have_a_balance", journal.step("shared_it"))
                .build(),
        )
        .with_type(
            FixtureBuilder::<Account>::new("ns", "when_opening_an_account")
                .establish("first", journal.step("first"))
                .behaves_like("standard", "ns::StandardAccountBehavior")
                .establish("last", journal.step("last"))
                .build(),
        );

    let recorder = run(&metadata);
    let results = recorder.results();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].0.containing_type, "ns::when_opening_an_account");
    assert_eq!(journal.entries(), ["first", "shared_setup", "last", "shared_it"]);
}

// ── Watchdog and capture ──────────────────────────────────────────────

#[test]
fn slow_specification_times_out_at_phase_boundary() {
    let journal = Journal::new();
    let metadata = AssemblyMetadata::new("asm").with_type(
        FixtureBuilder::<Account>::new("ns", "Ctx")
            .because("of", |_| {
                std::thread::sleep(Duration::from_millis(30));
                Ok(())
            })
            .it("too_slow", journal.step("it"))
            .cleanup("after", journal.step("cleanup"))
            .build(),
    );

    let recorder = RecordingListener::new();
    Engine::new(RunOptions::default().with_timeout(Duration::from_millis(5))).run(&metadata, &recorder);

    let result = recorder.result_of("too_slow").expect("result");
    assert_eq!(result.status, Status::Failing);
    assert_eq!(result.exception.map(|e| e.kind), Some(FailureKind::Timeout));
    assert_eq!(journal.entries(), ["cleanup"]);
}

#[test]
fn zero_timeout_from_toml_never_expires() {
    let metadata = AssemblyMetadata::new("asm").with_type(
        FixtureBuilder::<Account>::new("ns", "Ctx")
            .because("of", |a| {
                a.balance += 1;
                Ok(())
            })
            .it("passes", |a| {
                anyhow::ensure!(a.balance == 1, "balance was {}", a.balance);
                Ok(())
            })
            .build(),
    );

    let options = RunOptions::from_toml_str("specification_timeout_ms = 0").expect("options");
    let recorder = RecordingListener::new();
    Engine::new(options).run(&metadata, &recorder);

    let result = recorder.result_of("passes").expect("result");
    assert_eq!(result.status, Status::Passing);
    assert!(result.exception.is_none());
}

#[test]
fn output_is_captured_per_specification() {
    let metadata = AssemblyMetadata::new("asm").with_type(
        FixtureBuilder::<Account>::new("ns", "Ctx")
            .establish("context", |_| {
                capture::write_line("setting up");
                Ok(())
            })
            .it("talks", |_| {
                capture::write("hello");
                Ok(())
            })
            .it("quiet", |_| Ok(()))
            .build(),
    );

    let recorder = run(&metadata);
    let results = recorder.results();
    assert_eq!(results[0].0.captured_output.as_deref(), Some("setting up\nhello"));
    assert_eq!(results[1].0.captured_output.as_deref(), Some("setting up\n"));
    assert!(!capture::is_capturing());
}

// ── Assembly hooks ────────────────────────────────────────────────────

#[test]
fn failing_start_hook_is_fatal() {
    let journal = Journal::new();
    let metadata = AssemblyMetadata::new("asm")
        .on_start(|| anyhow::bail!("environment missing"))
        .with_type(
            FixtureBuilder::<Account>::new("ns", "Ctx")
                .it("never", journal.step("it"))
                .build(),
        );

    let recorder = RecordingListener::new();
    let report = Engine::default().run(&metadata, &recorder);
    assert!(report.fatal.is_some());
    assert!(report.failure_occurred());
    assert_eq!(recorder.labels(), ["assembly_start:asm", "fatal_error", "assembly_end:asm"]);
    assert!(journal.entries().is_empty());
}

#[test]
fn failing_complete_hook_is_recorded() {
    let metadata = AssemblyMetadata::new("asm")
        .on_complete(|| anyhow::bail!("could not flush"))
        .with_type(
            FixtureBuilder::<Account>::new("ns", "Ctx")
                .it("passes", |_| Ok(()))
                .build(),
        );

    let report = Engine::default().run(&metadata, &RecordingListener::new());
    assert!(report.fatal.is_none());
    assert_eq!(report.hook_failures.len(), 1);
    assert_eq!(report.passed_count(), 1);
}

#[test]
fn after_each_context_hook_runs_per_context() {
    let journal = Journal::new();
    let hook_journal = journal.clone();
    let metadata = AssemblyMetadata::new("asm")
        .after_each_context(move || {
            hook_journal.push("after_context");
            Ok(())
        })
        .with_type(
            FixtureBuilder::<Account>::new("ns", "A")
                .it("a", |_| Ok(()))
                .build(),
        )
        .with_type(
            FixtureBuilder::<Account>::new("ns", "B")
                .it("b", |_| Ok(()))
                .build(),
        );

    run(&metadata);
    assert_eq!(journal.count("after_context"), 2);
}
