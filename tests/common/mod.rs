//! Shared test utilities for integration and E2E tests.
//!
//! ## Usage
//!
//! Add `mod common;` to your test file, then use the helpers:
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! #[test]
//! fn test_example() {
//!     let fixture = TestFixture::new().with_file("pipeline.yaml", fixtures::PUSH_PIPELINE);
//!     fixture.command().arg("pipeline-gate").assert().success();
//! }
//! ```

use assert_fs::prelude::*;
use std::path::{Path, PathBuf};

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    #[allow(unused_imports)]
    pub use assert_cmd::cargo::cargo_bin_cmd;
    pub use assert_fs::prelude::*;
    pub use predicates::prelude::*;

    #[allow(unused_imports)]
    pub use super::fixtures;
    pub use super::TestFixture;
}

/// Document snippets shared by the CLI tests.
#[allow(dead_code)]
pub mod fixtures {
    /// Tekton push pipeline with an enabled trigger.
    pub const PUSH_PIPELINE: &str = r#"apiVersion: tekton.dev/v1
kind: PipelineRun
metadata:
  name: odh-operator-push
  annotations:
    pipelinesascode.tekton.dev/on-cel-expression: event == "push" && target_branch == "rhoai-2.16"
spec:
  pipelineRef:
    name: multiarch-push-pipeline
"#;

    /// Build config for per-platform catalog directories.
    pub const GROUPED_BUILD_CONFIG: &str = r#"config:
  supported-ocp-versions:
    release:
      - v4.17
      - v4.18
    build:
      - name: v4.19
"#;

    /// Build config for flat pcc catalogs.
    pub const LISTED_BUILD_CONFIG: &str = r#"config:
  supported-ocp-versions:
    - version: v4.14
      discontinued-from: rhods-operator.2.10.0
    - version: v4.15
"#;

    /// Shipped release versions, in the order release tooling writes them.
    pub const SHIPPED_VERSIONS: &str = "v2.9.2\nv2.10.0-rc1\nv2.16.0\n";

    /// A file-based catalog declaring the given bundles.
    pub fn catalog(bundles: &[&str]) -> String {
        let mut catalog = String::from("---\nschema: olm.package\nname: rhods-operator\ndefaultChannel: stable\n");
        for bundle in bundles {
            catalog.push_str(&format!("---\nschema: olm.bundle\nname: {}\npackage: rhods-operator\n", bundle));
        }
        catalog
    }
}

/// A temporary directory populated with input documents.
pub struct TestFixture {
    temp_dir: assert_fs::TempDir,
}

#[allow(dead_code)]
impl TestFixture {
    /// Create a new test fixture with an empty temporary directory.
    pub fn new() -> Self {
        Self {
            temp_dir: assert_fs::TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Add a file with the given path and content, creating parent directories.
    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.temp_dir
            .child(path)
            .write_str(content)
            .expect("Failed to write file");
        self
    }

    /// Get the path to the temporary directory.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Absolute path of a file inside the fixture.
    pub fn file(&self, path: &str) -> PathBuf {
        self.temp_dir.path().join(path)
    }

    /// Current content of a file inside the fixture.
    pub fn read(&self, path: &str) -> String {
        std::fs::read_to_string(self.file(path)).expect("Failed to read file")
    }

    /// Create a child path in the temp directory.
    pub fn child(&self, path: &str) -> assert_fs::fixture::ChildPath {
        self.temp_dir.child(path)
    }

    /// Create a command running in this fixture's directory with plain output.
    pub fn command(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("bundle-reconcile");
        cmd.current_dir(self.path()).arg("--color").arg("never");
        cmd
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_with_nested_file() {
        let fixture = TestFixture::new().with_file("v4.17/rhods-operator/catalog.yaml", "x: 1");
        assert!(fixture.file("v4.17/rhods-operator/catalog.yaml").exists());
    }

    #[test]
    fn test_fixtures_are_valid_yaml() {
        for doc in [
            fixtures::PUSH_PIPELINE,
            fixtures::GROUPED_BUILD_CONFIG,
            fixtures::LISTED_BUILD_CONFIG,
        ] {
            serde_yaml::from_str::<serde_yaml::Value>(doc).expect("fixture should be valid YAML");
        }
    }
}
