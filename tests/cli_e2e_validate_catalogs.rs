//! End-to-end tests for the `validate-catalogs` and `validate-pcc` commands.

mod common;
use common::prelude::*;

const BUNDLES: [&str; 3] = [
    "rhods-operator.2.9.2",
    "rhods-operator.2.10.0",
    "rhods-operator.2.16.0",
];

fn grouped_fixture() -> TestFixture {
    TestFixture::new()
        .with_file("build-config.yaml", fixtures::GROUPED_BUILD_CONFIG)
        .with_file("shipped.txt", fixtures::SHIPPED_VERSIONS)
}

fn validate_catalogs(fixture: &TestFixture) -> assert_cmd::assert::Assert {
    fixture
        .command()
        .args([
            "validate-catalogs",
            "--build-config",
            "build-config.yaml",
            "--catalog-dir",
            "catalogs",
            "--shipped-versions",
            "shipped.txt",
        ])
        .assert()
}

#[test]
fn test_complete_catalogs_pass() {
    let fixture = grouped_fixture()
        .with_file("catalogs/v4.17/rhods-operator/catalog.yaml", &fixtures::catalog(&BUNDLES))
        .with_file("catalogs/v4.18/rhods-operator/catalog.yaml", &fixtures::catalog(&BUNDLES))
        .with_file("catalogs/v4.19/rhods-operator/catalog.yaml", &fixtures::catalog(&BUNDLES));

    validate_catalogs(&fixture)
        .success()
        .stdout(predicate::str::contains("[OK] v4.17: all expected bundles present"))
        .stdout(predicate::str::contains("[OK] v4.19: all expected bundles present"))
        .stdout(predicate::str::contains("All catalogs are complete"));
}

#[test]
fn test_missing_bundle_fails_with_summary() {
    let fixture = grouped_fixture()
        .with_file("catalogs/v4.17/rhods-operator/catalog.yaml", &fixtures::catalog(&BUNDLES))
        .with_file(
            "catalogs/v4.18/rhods-operator/catalog.yaml",
            &fixtures::catalog(&BUNDLES[..2]),
        )
        .with_file("catalogs/v4.19/rhods-operator/catalog.yaml", &fixtures::catalog(&BUNDLES));

    validate_catalogs(&fixture)
        .code(1)
        .stdout(predicate::str::contains("[ERR] v4.18: missing rhods-operator.2.16.0"))
        .stdout(predicate::str::contains("[OK] v4.17: all expected bundles present"))
        .stderr(predicate::str::contains("Catalog validation failed"))
        .stderr(predicate::str::contains("Bundles missing from the catalogs:"));
}

#[test]
fn test_major_three_bundle_on_old_platform_is_misplaced() {
    let mut with_three = BUNDLES.to_vec();
    with_three.push("rhods-operator.3.0.0");
    let fixture = grouped_fixture()
        .with_file("shipped.txt", "v2.9.2\nv2.10.0\nv2.16.0\nv3.0.0\n")
        .with_file("catalogs/v4.17/rhods-operator/catalog.yaml", &fixtures::catalog(&BUNDLES))
        .with_file("catalogs/v4.18/rhods-operator/catalog.yaml", &fixtures::catalog(&with_three))
        .with_file("catalogs/v4.19/rhods-operator/catalog.yaml", &fixtures::catalog(&with_three));

    validate_catalogs(&fixture)
        .code(1)
        .stdout(predicate::str::contains(
            "[ERR] v4.18: not supported on this platform rhods-operator.3.0.0",
        ))
        .stdout(predicate::str::contains("[OK] v4.17"))
        .stdout(predicate::str::contains("[OK] v4.19"));
}

#[test]
fn test_missing_catalog_file_is_an_error() {
    let fixture = grouped_fixture()
        .with_file("catalogs/v4.17/rhods-operator/catalog.yaml", &fixtures::catalog(&BUNDLES));

    validate_catalogs(&fixture)
        .code(1)
        .stderr(predicate::str::contains("v4.18"));
}

#[test]
fn test_pcc_discontinued_releases_are_not_missing() {
    let fixture = TestFixture::new()
        .with_file("build-config.yaml", fixtures::LISTED_BUILD_CONFIG)
        .with_file("shipped.txt", fixtures::SHIPPED_VERSIONS)
        .with_file("pcc/catalog-v4.14.yaml", &fixtures::catalog(&BUNDLES[..1]))
        .with_file("pcc/catalog-v4.15.yaml", &fixtures::catalog(&BUNDLES));

    fixture
        .command()
        .args([
            "validate-pcc",
            "-b",
            "build-config.yaml",
            "-c",
            "pcc",
            "-s",
            "shipped.txt",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("[OK] v4.14: all expected bundles present"))
        .stdout(predicate::str::contains("[OK] v4.15: all expected bundles present"));
}

#[test]
fn test_pcc_rejects_grouped_build_config() {
    let fixture = grouped_fixture().with_file("pcc/catalog-v4.17.yaml", &fixtures::catalog(&BUNDLES));

    fixture
        .command()
        .args([
            "validate-pcc",
            "-b",
            "build-config.yaml",
            "-c",
            "pcc",
            "-s",
            "shipped.txt",
        ])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("pcc validation"));
}
