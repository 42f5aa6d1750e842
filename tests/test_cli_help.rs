use predicates::prelude::*;

#[test]
fn test_help_lists_commands() {
    let mut cmd = assert_cmd::cargo_bin_cmd!("focusguard");
    cmd.arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("status"))
        .stdout(predicate::str::contains("add"))
        .stdout(predicate::str::contains("remove"))
        .stdout(predicate::str::contains("set-password"))
        .stdout(predicate::str::contains("reset-password"))
        .stdout(predicate::str::contains("factory-reset"))
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("--config"))
        .stdout(predicate::str::contains("--state"))
        .stdout(predicate::str::contains("--version"));
}

#[test]
fn test_status_help_describes_json() {
    let mut cmd = assert_cmd::cargo_bin_cmd!("focusguard");
    cmd.args(["status", "--help"]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("--json"))
        .stdout(predicate::str::contains("JSON"));
}

#[test]
fn test_no_command_prints_usage() {
    let mut cmd = assert_cmd::cargo_bin_cmd!("focusguard");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}
