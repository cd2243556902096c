//! Integration test: directory tree → Checker → report and SARIF output.

use sops_check_core::rules::ResultKind;
use sops_check_core::{CheckReport, Checker, Config, ConfigFormat, SarifLog};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const OPS: &str = "age1ops0000000000000000000000000000000000000000000000000000";
const DEV: &str = "age1dev0000000000000000000000000000000000000000000000000000";
const KMS: &str = "arn:aws:kms:eu-central-1:123456789012:key/1234abcd";

const POLICY: &str = r"
rules:
  - description: Ops must be able to decrypt
    match: age1ops0000000000000000000000000000000000000000000000000000
  - anyOf:
      - matchRegex: ^arn:aws:kms:eu-central-1:
      - match: age1dev0000000000000000000000000000000000000000000000000000
";

fn yaml_secret(recipients: &[&str], arns: &[&str]) -> String {
    let mut out = String::from("password: ENC[AES256_GCM,data:abc,type:str]\nsops:\n");
    out.push_str("    kms:\n");
    for arn in arns {
        out.push_str(&format!("        - arn: {arn}\n          enc: AQICAH\n"));
    }
    out.push_str("    age:\n");
    for recipient in recipients {
        out.push_str(&format!("        - recipient: {recipient}\n          enc: abc\n"));
    }
    out.push_str("    version: 3.8.1\n");
    out
}

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// A tree with two compliant files, one violation and some noise.
fn fixture_tree() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();

    write(root, "prod/app.yaml", &yaml_secret(&[OPS], &[KMS]));
    write(
        root,
        "prod/app.json",
        &format!(r#"{{"token": "ENC[...]", "sops": {{"age": [{{"recipient": "{OPS}"}}, {{"recipient": "{DEV}"}}]}}}}"#),
    );
    write(
        root,
        "dev/.env",
        &format!("TOKEN=ENC[...]\nsops_age__list_0__map_recipient={DEV}\nsops_version=3.8.1\n"),
    );
    write(root, "dev/plain.yaml", "replicas: 3\n");
    write(root, "README.md", "# secrets\n");

    tmp
}

fn check(root: &Path, builder_config: Config) -> CheckReport {
    Checker::builder()
        .root(root)
        .config(builder_config)
        .build()
        .expect("checker should build")
        .check()
        .expect("check should succeed")
}

fn policy(allow_unmatched: bool) -> Config {
    let mut config = Config::parse(POLICY, ConfigFormat::Yaml).expect("policy should parse");
    config.allow_unmatched = allow_unmatched;
    config
}

fn relative(root: &Path, path: &Path) -> PathBuf {
    path.strip_prefix(root).unwrap().to_path_buf()
}

#[test]
fn reports_only_violating_files() {
    let tmp = fixture_tree();
    let report = check(tmp.path(), policy(true));

    let checked: Vec<PathBuf> = report.files.iter().map(|f| relative(tmp.path(), &f.path)).collect();
    assert_eq!(
        checked,
        vec![
            PathBuf::from("dev/.env"),
            PathBuf::from("prod/app.json"),
            PathBuf::from("prod/app.yaml"),
        ]
    );

    let problematic: Vec<PathBuf> = report
        .problematic_files()
        .map(|f| relative(tmp.path(), &f.path))
        .collect();
    assert_eq!(problematic, vec![PathBuf::from("dev/.env")]);

    let env = &report.files[0];
    assert!(!env.success);
    assert!(env.formatted.contains("[match] Ops must be able to decrypt"));
    assert!(env.formatted.contains(&format!("Expected trust anchor {OPS:?} was not found.")));
}

#[test]
fn unmatched_anchors_are_violations_by_default() {
    let tmp = fixture_tree();
    write(tmp.path(), "prod/extra.yml", &yaml_secret(&[OPS, "age1stray"], &[KMS]));

    let strict = check(tmp.path(), policy(false));
    let problematic: Vec<PathBuf> = strict
        .problematic_files()
        .map(|f| relative(tmp.path(), &f.path))
        .collect();
    assert_eq!(
        problematic,
        vec![PathBuf::from("dev/.env"), PathBuf::from("prod/extra.yml")]
    );

    let extra = strict
        .files
        .iter()
        .find(|f| f.path.ends_with("extra.yml"))
        .unwrap();
    assert!(extra.success);
    assert_eq!(extra.formatted, "Unmatched trust anchors:\n  - age1stray\n");

    let lenient = check(tmp.path(), policy(true));
    assert_eq!(lenient.problematic_files().count(), 1);
}

#[test]
fn violation_names_every_problematic_file() {
    let tmp = fixture_tree();
    write(tmp.path(), "prod/z.yaml", &yaml_secret(&[DEV], &[]));

    let report = check(tmp.path(), policy(true));
    let violation = report.violation().expect("violations expected");

    assert_eq!(violation.files.len(), 2);
    let message = violation.to_string();
    assert!(message.starts_with("Found 2 files with issues:\n  - "));
    assert!(message.ends_with("prod/z.yaml"));
}

#[test]
fn ignore_files_and_excludes_narrow_the_walk() {
    let tmp = fixture_tree();
    let ignore_file = tmp.path().join(".sops-check-ignore");
    fs::write(&ignore_file, "dev/\n").unwrap();

    let report = Checker::builder()
        .root(tmp.path())
        .config(policy(true))
        .ignore_file(&ignore_file)
        .exclude("prod/*.json")
        .build()
        .unwrap()
        .check()
        .unwrap();

    let checked: Vec<PathBuf> = report.files.iter().map(|f| relative(tmp.path(), &f.path)).collect();
    assert_eq!(checked, vec![PathBuf::from("prod/app.yaml")]);
    assert!(report.violation().is_none());
}

#[test]
fn sarif_report_contains_one_result_per_violation() {
    let tmp = fixture_tree();
    let report = check(tmp.path(), policy(true));
    let sarif_path = tmp.path().join("report.sarif");

    SarifLog::from_diagnostics(report.diagnostics())
        .write_file(&sarif_path)
        .unwrap();

    let log: SarifLog = serde_json::from_str(&fs::read_to_string(&sarif_path).unwrap()).unwrap();
    let run = &log.runs[0];
    assert_eq!(run.results.len(), 1);
    assert_eq!(run.results[0].rule_id, "allOf");
    assert_eq!(run.results[0].level, "error");
    assert_eq!(run.results[0].kind, ResultKind::Fail.to_string());
    assert!(run.results[0].locations[0]
        .physical_location
        .artifact_location
        .uri
        .ends_with(".env"));
}

#[test]
fn missing_root_is_a_discovery_error() {
    let tmp = TempDir::new().unwrap();
    let err = Checker::builder()
        .root(tmp.path().join("missing"))
        .build()
        .unwrap()
        .check()
        .unwrap_err();
    assert!(err.to_string().starts_with("failed to find sops files"));
}
