//! keygen -> issue -> extend -> verify, end to end through the binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;

fn custodia() -> Command {
    Command::cargo_bin("custodia").unwrap()
}

fn keygen(dir: &Path, name: &str, dn: &str) {
    custodia()
        .args([
            "keygen",
            "--dn",
            dn,
            "--out-key",
            dir.join(format!("{name}.pem")).to_str().unwrap(),
            "--out-cert",
            dir.join(format!("{name}.json")).to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("fingerprint: sha256:"));
}

#[test]
fn dn_chain_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let p = |name: &str| dir.path().join(name).to_str().unwrap().to_string();

    keygen(dir.path(), "alice", "CN=alice,O=acme");
    keygen(dir.path(), "bob", "CN=bob,O=acme");

    custodia()
        .args([
            "issue",
            "--custodian-dn",
            "CN=alice,O=acme",
            "--key",
            &p("alice.pem"),
            "--cert",
            &p("alice.json"),
            "--receiver-dn",
            "CN=bob,O=acme",
            "--days",
            "7",
            "--proxy",
            "2",
            "--out",
            &p("chain.json"),
        ])
        .assert()
        .success();

    custodia()
        .args([
            "extend",
            "--chain",
            &p("chain.json"),
            "--key",
            &p("bob.pem"),
            "--cert",
            &p("bob.json"),
            "--receiver-dn",
            "CN=carol,O=acme",
            "--days",
            "7",
            "--out",
            &p("chain2.json"),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("2-hop"));

    // Valid: carol holds authority delegated from alice.
    custodia()
        .args([
            "verify",
            "--chain",
            &p("chain2.json"),
            "--subject-dn",
            "CN=carol,O=acme",
            "--user-dn",
            "CN=alice, O=ACME",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("valid"));

    // Rejected with exit code 3: wrong root user.
    custodia()
        .args([
            "verify",
            "--chain",
            &p("chain2.json"),
            "--subject-dn",
            "CN=carol,O=acme",
            "--user-dn",
            "CN=mallory",
        ])
        .assert()
        .code(3)
        .stdout(predicate::str::contains("Wrong user"));

    custodia()
        .args(["inspect", "--chain", &p("chain2.json")])
        .assert()
        .success()
        .stdout(predicate::str::contains("hop 1:"));
}

#[test]
fn extend_refuses_mode_mismatch() {
    let dir = tempfile::tempdir().unwrap();
    let p = |name: &str| dir.path().join(name).to_str().unwrap().to_string();

    keygen(dir.path(), "alice", "CN=alice");
    keygen(dir.path(), "bob", "CN=bob");
    keygen(dir.path(), "carol", "CN=carol");

    custodia()
        .args([
            "issue",
            "--custodian-dn",
            "CN=alice",
            "--key",
            &p("alice.pem"),
            "--cert",
            &p("alice.json"),
            "--receiver-dn",
            "CN=bob",
            "--out",
            &p("chain.json"),
        ])
        .assert()
        .success();

    // Certificate-mode receiver against a DN-mode chain.
    custodia()
        .args([
            "extend",
            "--chain",
            &p("chain.json"),
            "--key",
            &p("bob.pem"),
            "--cert",
            &p("bob.json"),
            "--receiver-cert",
            &p("carol.json"),
            "--out",
            &p("chain2.json"),
        ])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("identity mode"));
}

#[test]
fn missing_chain_file_is_io_error() {
    custodia()
        .args([
            "verify",
            "--chain",
            "/nonexistent/chain.json",
            "--subject-dn",
            "CN=x",
            "--user-dn",
            "CN=y",
        ])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("failed to read chain"));
}

#[test]
fn usage_error_is_exit_code_2() {
    custodia().args(["verify"]).assert().code(2);
}
