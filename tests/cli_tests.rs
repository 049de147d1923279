//! Integration tests for CLI execution using `assert_cmd`.
//!
//! These tests invoke the compiled binary against a manifest copied into a
//! scratch directory and check the generated files and printed reports.

use anyhow::{Context, Result, ensure};
use insta::assert_snapshot;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::{TempDir, tempdir};

const TWO_CONFIGS: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/data/two_configs.yml");

fn project_dir() -> Result<TempDir> {
    let temp = tempdir().context("create temp dir")?;
    let manifest = temp.path().join("bffgen.yml");
    fs::copy(TWO_CONFIGS, &manifest)
        .with_context(|| format!("copy manifest to {}", manifest.display()))?;
    Ok(temp)
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("read {}", path.display()))
}

#[test]
fn generate_writes_the_file_set() -> Result<()> {
    let temp = project_dir()?;
    assert_cmd::cargo::cargo_bin_cmd!("bffgen")
        .current_dir(temp.path())
        .args(["generate", "--output-dir", "out"])
        .assert()
        .success();
    let out = temp.path().join("out");
    for name in ["base.bff", "Debug.bff", "Release.bff", "fbuild.bff"] {
        ensure!(out.join(name).exists(), "{name} should be generated");
    }
    let main = read(&out.join("fbuild.bff"))?;
    ensure!(
        main.contains("Exec('rebuild-bff')") && main.contains(".ExecIsGenerator = true"),
        "fbuild.bff should carry the regeneration rule, got:\n{main}"
    );
    Ok(())
}

#[test]
fn generate_is_the_default_and_honours_directory() -> Result<()> {
    let temp = project_dir()?;
    let work = temp.path().join("work");
    fs::create_dir_all(&work).context("create work directory")?;
    fs::rename(temp.path().join("bffgen.yml"), work.join("bffgen.yml"))
        .context("move manifest")?;
    assert_cmd::cargo::cargo_bin_cmd!("bffgen")
        .current_dir(temp.path())
        .args(["-C", "work"])
        .assert()
        .success();
    ensure!(
        work.join("fbuild.bff").exists(),
        "files should land in the -C directory"
    );
    Ok(())
}

#[test]
fn no_regenerate_omits_the_rule() -> Result<()> {
    let temp = project_dir()?;
    assert_cmd::cargo::cargo_bin_cmd!("bffgen")
        .current_dir(temp.path())
        .args(["generate", "--no-regenerate"])
        .assert()
        .success();
    let main = read(&temp.path().join("fbuild.bff"))?;
    ensure!(
        !main.contains("rebuild-bff"),
        "regeneration rule should be omitted, got:\n{main}"
    );
    Ok(())
}

#[test]
fn order_prints_nodes_in_emission_order() -> Result<()> {
    let temp = project_dir()?;
    let output = assert_cmd::cargo::cargo_bin_cmd!("bffgen")
        .current_dir(temp.path())
        .arg("order")
        .output()
        .context("run bffgen order")?;
    ensure!(output.status.success(), "order should succeed");
    let stdout = String::from_utf8(output.stdout).context("stdout utf8")?;
    assert_snapshot!("order", stdout.trim_end());
    Ok(())
}

#[test]
fn plan_reports_classifications_and_decisions() {
    let temp = project_dir().expect("project dir");
    assert_cmd::cargo::cargo_bin_cmd!("bffgen")
        .current_dir(temp.path())
        .arg("plan")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "gen: common (identical in every configuration)",
        ))
        .stdout(predicate::str::contains("stamp: config-dependent (uses $<CONFIG>)"))
        .stdout(predicate::str::contains("Debug lib/gen: define lib-gen"))
        .stdout(predicate::str::contains("Release lib/gen: skip"));
}

#[test]
fn missing_manifest_is_reported_on_stderr() {
    let temp = tempdir().expect("create temp dir");
    assert_cmd::cargo::cargo_bin_cmd!("bffgen")
        .current_dir(temp.path())
        .arg("order")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no bffgen.yml found in"))
        .stdout(predicate::str::is_empty());
}

#[test]
fn invalid_project_fails() {
    let temp = tempdir().expect("create temp dir");
    fs::write(
        temp.path().join("bffgen.yml"),
        "bffgen_version: \"1.0.0\"\ntargets:\n  - name: app\n    commands: missing\n",
    )
    .expect("write manifest");
    assert_cmd::cargo::cargo_bin_cmd!("bffgen")
        .current_dir(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown command 'missing'"));
}
