#![cfg(feature = "cli")]

use assert_cmd::cargo::cargo_bin_cmd;
use pol_parser::{write_policy_file, PolicyEntry, PolicyScope};
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

const CHROME_ADMX: &str = r#"<policyDefinitions revision="1.0" schemaVersion="1.0">
  <policies>
    <policy name="HomepageLocation" class="Both" displayName="$(string.HomepageLocation)"
            key="Software\Policies\Google\Chrome" valueName="HomepageLocation" />
  </policies>
</policyDefinitions>"#;

/// Writes `<gpo>/Machine/registry.pol` with one Chrome setting.
fn seed_gpo(gpo: &Path) {
    let machine = gpo.join("Machine");
    fs::create_dir_all(&machine).unwrap();
    write_policy_file(
        machine.join("registry.pol"),
        &[PolicyEntry::string(
            PolicyScope::Machine,
            "Software\\Policies\\Google\\Chrome",
            "HomepageLocation",
            "https://example.com",
        )],
    )
    .unwrap();
}

/// Lays out `<root>/gpo/Machine/registry.pol` and `<root>/PolicyDefinitions/chrome.admx`.
fn seed(root: &Path) {
    seed_gpo(&root.join("gpo"));

    let store = root.join("PolicyDefinitions");
    fs::create_dir_all(&store).unwrap();
    fs::write(store.join("chrome.admx"), CHROME_ADMX).unwrap();
}

#[test]
fn text_report_lists_required_templates() {
    let temp = tempdir().unwrap();
    seed(temp.path());

    cargo_bin_cmd!("gpo2admx")
        .arg("--gpo-dir")
        .arg(temp.path().join("gpo"))
        .arg("--admx-store")
        .arg(temp.path().join("PolicyDefinitions"))
        .assert()
        .success()
        .stdout(predicate::str::contains("chrome.admx"))
        .stdout(predicate::str::contains("chrome.adml"))
        .stdout(predicate::str::contains("Missing"));
}

#[test]
fn json_report_written_to_file() {
    let temp = tempdir().unwrap();
    seed(temp.path());
    let out = temp.path().join("report.json");

    cargo_bin_cmd!("gpo2admx")
        .arg("--gpo-dir")
        .arg(temp.path().join("gpo"))
        .arg("--admx-store")
        .arg(temp.path().join("PolicyDefinitions"))
        .args(["--format", "json", "--output"])
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    let json: Value = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(json["entries_decoded"], 1);
    assert_eq!(json["required"]["language"], "en-US");
    assert_eq!(json["required"]["files"][0]["admx_file"], "chrome.admx");
    assert_eq!(json["required"]["files"][0]["adml_status"], "Missing");
    assert_eq!(json["matches"][0]["strategy"], "RegistryKeyValue");
}

#[test]
fn missing_source_is_rejected() {
    let temp = tempdir().unwrap();

    cargo_bin_cmd!("gpo2admx")
        .arg("--admx-store")
        .arg(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("no policy source given"));
}

#[test]
fn missing_admx_store_fails() {
    let temp = tempdir().unwrap();
    seed(temp.path());

    cargo_bin_cmd!("gpo2admx")
        .arg("--gpo-dir")
        .arg(temp.path().join("gpo"))
        .arg("--admx-store")
        .arg(temp.path().join("nowhere"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to analyse GPO"));
}

#[test]
fn sysvol_source_resolves_gpo_folder() {
    let temp = tempdir().unwrap();
    seed(temp.path());
    let sysvol = temp.path().join("SYSVOL");
    seed_gpo(
        &sysvol
            .join("corp.example.com")
            .join("Policies")
            .join("{31B2F340-016D-11D2-945F-00C04FB984F9}"),
    );

    cargo_bin_cmd!("gpo2admx")
        .arg("--sysvol")
        .arg(&sysvol)
        .args(["--domain", "corp.example.com"])
        .args(["--guid", "31b2f340-016d-11d2-945f-00c04fb984f9"])
        .arg("--admx-store")
        .arg(temp.path().join("PolicyDefinitions"))
        .assert()
        .success()
        .stdout(predicate::str::contains("{31B2F340-016D-11D2-945F-00C04FB984F9}"))
        .stdout(predicate::str::contains("chrome.admx"));
}

#[test]
fn gpo_dir_conflicts_with_sysvol() {
    let temp = tempdir().unwrap();

    cargo_bin_cmd!("gpo2admx")
        .arg("--gpo-dir")
        .arg(temp.path())
        .arg("--sysvol")
        .arg(temp.path())
        .args(["--domain", "corp.example.com", "--guid", "abc"])
        .arg("--admx-store")
        .arg(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn sysvol_requires_domain_and_guid() {
    let temp = tempdir().unwrap();

    cargo_bin_cmd!("gpo2admx")
        .arg("--sysvol")
        .arg(temp.path())
        .arg("--admx-store")
        .arg(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("--domain"));

    cargo_bin_cmd!("gpo2admx")
        .args(["--domain", "corp.example.com"])
        .arg("--admx-store")
        .arg(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("--sysvol"));
}

#[test]
fn verbose_wins_over_rust_log() {
    let temp = tempdir().unwrap();
    seed(temp.path());
    let args = |cmd: &mut assert_cmd::Command| {
        cmd.arg("--gpo-dir")
            .arg(temp.path().join("gpo"))
            .arg("--admx-store")
            .arg(temp.path().join("PolicyDefinitions"))
            .env("RUST_LOG", "error");
    };

    let mut quiet = cargo_bin_cmd!("gpo2admx");
    args(&mut quiet);
    quiet
        .assert()
        .success()
        .stderr(predicate::str::contains("DEBUG").not())
        .stderr(predicate::str::contains("INFO").not());

    let mut verbose = cargo_bin_cmd!("gpo2admx");
    args(&mut verbose);
    verbose
        .arg("--verbose")
        .assert()
        .success()
        .stderr(predicate::str::contains("DEBUG"));
}
