//! End-to-end tests for the `pipeline-gate` command.

mod common;
use common::prelude::*;

const ANNOTATION: &str = "pipelinesascode.tekton.dev/on-cel-expression";
const SENTINEL: &str = "\"non-existent-file.non-existent-ext\".pathChanged() && ";

fn trigger(fixture: &TestFixture) -> String {
    let pipeline: serde_yaml::Value =
        serde_yaml::from_str(&fixture.read("pipeline.yaml")).expect("pipeline should stay valid YAML");
    pipeline["metadata"]["annotations"][ANNOTATION]
        .as_str()
        .expect("trigger annotation")
        .to_string()
}

fn gate(fixture: &TestFixture, operation: &str) -> assert_cmd::assert::Assert {
    fixture
        .command()
        .args(["pipeline-gate", "--push-pipeline", "pipeline.yaml", "--operation", operation])
        .assert()
}

#[test]
fn test_disable_then_enable_round_trip() {
    let fixture = TestFixture::new().with_file("pipeline.yaml", fixtures::PUSH_PIPELINE);
    let original = trigger(&fixture);

    gate(&fixture, "disable")
        .success()
        .stdout(predicate::str::contains("[OK] Push pipeline disabled"));
    assert_eq!(trigger(&fixture), format!("{}{}", SENTINEL, original));

    gate(&fixture, "enable")
        .success()
        .stdout(predicate::str::contains("[OK] Push pipeline enabled"));
    assert_eq!(trigger(&fixture), original);
}

#[test]
fn test_repeated_disable_leaves_file_untouched() {
    let fixture = TestFixture::new().with_file("pipeline.yaml", fixtures::PUSH_PIPELINE);

    gate(&fixture, "disable").success();
    let after_first = fixture.read("pipeline.yaml");

    gate(&fixture, "disable")
        .success()
        .stdout(predicate::str::contains("already disabled"));
    assert_eq!(fixture.read("pipeline.yaml"), after_first);
}

#[test]
fn test_enable_on_enabled_pipeline_does_not_rewrite() {
    let fixture = TestFixture::new().with_file("pipeline.yaml", fixtures::PUSH_PIPELINE);

    gate(&fixture, "enable")
        .success()
        .stdout(predicate::str::contains("already enabled"));
    // Untouched byte for byte, including the original formatting
    assert_eq!(fixture.read("pipeline.yaml"), fixtures::PUSH_PIPELINE);
}

#[test]
fn test_pipeline_without_trigger_annotation_fails() {
    let fixture = TestFixture::new().with_file("pipeline.yaml", "metadata:\n  name: no-trigger\n");

    gate(&fixture, "disable")
        .code(1)
        .stderr(predicate::str::contains(ANNOTATION));
}
