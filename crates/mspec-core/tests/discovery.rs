//! Discovery and context tree assembly over realistic assemblies.

mod common;

use common::Journal;
use mspec_core::fakes::RecordingListener;
use mspec_core::{
    AssemblyMetadata, Engine, FixtureBuilder, MspecError, RunOptions, Status, Vocabulary,
    WarningKind,
};

#[derive(Default)]
struct Example;

fn example_assembly() -> AssemblyMetadata {
    AssemblyMetadata::new("example.specs")
        .with_type(
            FixtureBuilder::<Example>::new("ExampleA", "InExampleA_1")
                .it("is_spec_1", |_| Ok(()))
                .build(),
        )
        .with_type(
            FixtureBuilder::<Example>::new("ExampleB", "InExampleB_1")
                .it("is_spec_1", |_| Ok(()))
                .build(),
        )
        .with_type(
            FixtureBuilder::<Example>::new("ExampleC", "InExampleC_1")
                .it("is_spec_1", |_| Ok(()))
                .it("is_spec_2", |_| Ok(()))
                .build(),
        )
        .with_type(FixtureBuilder::<Example>::new("ExampleC", "InExampleC_2").build())
}

#[test]
fn discovers_contexts_across_namespaces() {
    let tree = Engine::default().discover(&example_assembly()).expect("tree");

    let names: Vec<_> = tree.roots.iter().map(|c| c.info.full_name.as_str()).collect();
    assert_eq!(
        names,
        ["ExampleA::InExampleA_1", "ExampleB::InExampleB_1", "ExampleC::InExampleC_1"]
    );
    assert_eq!(tree.specification_count(), 4);

    let c1 = tree.find("ExampleC::InExampleC_1").expect("context");
    assert_eq!(c1.info.name, "InExampleC 1");
    assert_eq!(c1.specifications[1].info.name, "is spec 2");
    assert_eq!(c1.specifications[1].info.leader, "It");
    assert!(tree.find("ExampleC::InExampleC_2").is_none());
}

#[test]
fn context_filter_selects_one_namespace_member() {
    let options = RunOptions::default().with_context_filter("ExampleC::InExampleC_1");
    let recorder = RecordingListener::new();
    let report = Engine::new(options).run(&example_assembly(), &recorder);

    assert_eq!(report.specifications.len(), 2);
    assert!(report
        .specifications
        .iter()
        .all(|r| r.info.containing_type == "ExampleC::InExampleC_1"));
}

#[test]
fn badly_named_context_member_is_skipped_with_warning() {
    let journal = Journal::new();
    let metadata = AssemblyMetadata::new("asm").with_type(
        FixtureBuilder::<Example>::new("ns", "DescriptionWithBadlyNamedContext")
            .context("foo", journal.step("foo"))
            .it("still_runs", journal.step("it"))
            .build(),
    );

    let report = Engine::default().run(&metadata, &RecordingListener::new());
    assert_eq!(report.passed_count(), 1);
    assert_eq!(report.warnings.len(), 1);
    assert_eq!(report.warnings[0].kind, WarningKind::BadlyNamedMember);
    assert_eq!(journal.entries(), ["it"]);
}

#[test]
fn alternate_vocabulary_from_toml() {
    let vocabulary = Vocabulary::from_toml_str(
        r#"
        [[rules]]
        marker = "Given"
        role = "setup_each"

        [[rules]]
        marker = "When"
        role = "action"

        [[rules]]
        marker = "Then"
        role = "assertion"
        "#,
    )
    .expect("vocabulary");

    let journal = Journal::new();
    let metadata = AssemblyMetadata::new("asm").with_type(
        FixtureBuilder::<Example>::new("ns", "withdrawal")
            .member("Given", "an_account", journal.step("given"))
            .member("When", "withdrawing", journal.step("when"))
            .member("Then", "balance_drops", journal.step("then"))
            .it("is_not_a_member_here", journal.step("it"))
            .build(),
    );

    let recorder = RecordingListener::new();
    Engine::new(RunOptions::default().with_vocabulary(vocabulary)).run(&metadata, &recorder);

    let results = recorder.results();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].0.leader, "Then");
    assert_eq!(results[0].1.status, Status::Passing);
    assert_eq!(journal.entries(), ["given", "when", "then"]);
}

#[test]
fn unknown_declaring_type_aborts_discovery() {
    let metadata = AssemblyMetadata::new("asm").with_type(
        FixtureBuilder::<Example>::new("ns", "Orphan")
            .nested_in("ns::Gone")
            .it("spec", |_| Ok(()))
            .build(),
    );

    let err = Engine::default().discover(&metadata).expect_err("fatal");
    assert!(matches!(err, MspecError::UnknownDeclaringType { .. }));
}

#[test]
fn options_loaded_from_file_drive_discovery() {
    use std::io::Write;

    let mut file = tempfile::NamedTempFile::new().expect("tempfile");
    writeln!(file, "include_tags = [\"fast\"]").expect("write");

    let metadata = AssemblyMetadata::new("asm")
        .with_type(
            FixtureBuilder::<Example>::new("ns", "Fast")
                .tag("fast")
                .it("a", |_| Ok(()))
                .build(),
        )
        .with_type(
            FixtureBuilder::<Example>::new("ns", "Untagged")
                .it("b", |_| Ok(()))
                .build(),
        );

    let options = RunOptions::load(file.path()).expect("options");
    let tree = Engine::new(options).discover(&metadata).expect("tree");
    assert_eq!(tree.roots.len(), 1);
    assert_eq!(tree.roots[0].info.full_name, "ns::Fast");
}
