use std::fs;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

const VITRINE_VARS: &[&str] = &[
    "VITRINE_CONFIG_PATH",
    "VITRINE_GATEWAY_PREFIX",
    "VITRINE_SCHEME_PREFIXES",
    "VITRINE_ALTERNATE_GATEWAYS",
    "VITRINE_CACHE_BASE_URL",
    "VITRINE_API_BASE_URL",
    "VITRINE_REQUEST_TIMEOUT",
    "VITRINE_MAX_CONCURRENT_FETCHES",
    "VITRINE_ROOT_MARGIN",
    "VITRINE_USER_AGENT",
];

/// Command isolated from the caller's environment and working directory.
fn vitrinectl(dir: &TempDir) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("vitrinectl");
    cmd.current_dir(dir.path())
        .arg("--env-file")
        .arg(dir.path().join(".env"));
    for var in VITRINE_VARS {
        cmd.env_remove(var);
    }
    cmd
}

fn with_config(contents: &str) -> TempDir {
    let dir = TempDir::new().expect("temp dir");
    fs::write(dir.path().join("vitrine.toml"), contents).expect("write config");
    dir
}

#[test]
fn help_lists_subcommands() {
    let dir = TempDir::new().expect("temp dir");
    let out = vitrinectl(&dir)
        .arg("--help")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let text = String::from_utf8_lossy(&out);
    for command in ["normalize", "fingerprint", "resolve", "config"] {
        assert!(text.contains(command), "help missing '{command}'");
    }
}

#[test]
fn resolve_help_documents_flags() {
    let dir = TempDir::new().expect("temp dir");
    vitrinectl(&dir)
        .args(["resolve", "--help"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("--contract")
                .and(predicate::str::contains("--token-id"))
                .and(predicate::str::contains("--out"))
                .and(predicate::str::contains("--json")),
        );
}

#[test]
fn normalize_rewrites_onto_configured_gateway() {
    let dir = with_config(
        r#"
        [gateway]
        canonical_prefix = "https://gw.test/ipfs/"
        "#,
    );
    vitrinectl(&dir)
        .args(["normalize", "ipfs://abc123/img.png"])
        .assert()
        .success()
        .stdout("https://gw.test/ipfs/abc123/img.png\n");
}

#[test]
fn fingerprint_uses_the_canonical_address() {
    let dir = TempDir::new().expect("temp dir");
    vitrinectl(&dir)
        .args([
            "fingerprint",
            "https://gateway.pinata.cloud/ipfs/abc123/img.png",
        ])
        .assert()
        .success()
        .stdout(
            predicate::str::contains(
                "canonical: https://ftmdead.mypinata.cloud/ipfs/abc123/img.png",
            )
            .and(predicate::str::contains("fingerprint: 3391633774"))
            .and(predicate::str::contains("/cache/3391633774")),
        );
}

#[test]
fn config_reports_guard_rail_warnings() {
    let dir = with_config(
        r#"
        [gateway]
        canonical_prefix = "http://gw.test/ipfs/"
        "#,
    );
    vitrinectl(&dir)
        .args(["config", "--json"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains(
                "\"canonical_prefix\": \"http://gw.test/ipfs/\"",
            )
            .and(predicate::str::contains("not served over https")),
        );
}

#[test]
fn missing_explicit_config_fails() {
    let dir = TempDir::new().expect("temp dir");
    vitrinectl(&dir)
        .args(["--config", "missing.toml", "config"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing.toml"));
}

#[test]
fn overlapping_rewrite_rule_is_rejected() {
    let dir = with_config(
        r#"
        [gateway]
        canonical_prefix = "https://ipfs.io/ipfs/"
        alternate_prefixes = ["https://ipfs.io/"]
        "#,
    );
    vitrinectl(&dir)
        .args(["normalize", "ipfs://abc"])
        .assert()
        .failure();
}
