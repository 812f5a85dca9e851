use assert_cmd::cargo::cargo_bin_cmd;

fn fixture(path: &str) -> String {
    format!("{}/tests/fixtures/{path}", env!("CARGO_MANIFEST_DIR"))
}

fn stdout_of(out: &assert_cmd::assert::Assert) -> String {
    String::from_utf8(out.get_output().stdout.clone()).expect("utf8")
}

#[test]
fn help_lists_subcommands() {
    let mut cmd = cargo_bin_cmd!("autograder");
    cmd.arg("--help");
    let out = cmd.assert().success();
    let stdout = stdout_of(&out);

    for name in ["list", "check", "simulate", "seeds", "--config", "--seed"] {
        assert!(stdout.contains(name), "help is missing {name}");
    }
}

#[test]
fn list_shows_both_activities() {
    let mut cmd = cargo_bin_cmd!("autograder");
    cmd.arg("list");
    let out = cmd.assert().success();
    let stdout = stdout_of(&out);
    assert!(stdout.contains("p2act6/anagram_checker (pure)"));
    assert!(stdout.contains("intro_io/running_total (interactive)"));
}

#[test]
fn check_with_config_reports_case_count() {
    let mut cmd = cargo_bin_cmd!("autograder");
    cmd.arg("check")
        .arg("--activity")
        .arg("p2act6")
        .arg("--function")
        .arg("complimentary_dna")
        .arg("--config")
        .arg(fixture("configs/quick.toml"));
    let out = cmd.assert().success();
    assert_eq!(
        stdout_of(&out).trim_end(),
        "check passed: p2act6/complimentary_dna cases=6"
    );
}

#[test]
fn simulate_flags_inputs_left_over() {
    let mut cmd = cargo_bin_cmd!("autograder");
    cmd.args([
        "simulate",
        "--activity",
        "intro_io",
        "--function",
        "greet_user",
        "--input",
        "Alice",
        "--input",
        "30",
        "--input",
        "extra",
    ]);
    let out = cmd.assert().success();
    let stdout = stdout_of(&out);
    assert!(stdout.contains("What is your name? Alice\n"));
    assert!(stdout.contains("How old are you? 30\n"));
    assert!(stdout.contains("FUNCTION SHOULD HAVE CONTINUED, BUT INSTEAD ENDED."));
    assert!(stdout.contains("ended_early=true ran_past_inputs=false completion=completed"));
}

#[test]
fn seeds_prints_one_line_per_value() {
    let mut cmd = cargo_bin_cmd!("autograder");
    cmd.args(["seeds", "--min", "1", "--max", "3", "--count", "3", "--seed", "17"]);
    let out = cmd.assert().success();
    let stdout = stdout_of(&out);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("value=1 seed="));
    assert!(lines[2].starts_with("value=3 seed="));
}

#[test]
fn run_log_is_written_when_requested() {
    let temp = tempfile::tempdir().expect("tempdir");
    let log = temp.path().join("logs/run.jsonl");
    let mut cmd = cargo_bin_cmd!("autograder");
    cmd.args(["check", "--activity", "intro_io", "--function", "greet_user", "--num-tests", "3"])
        .arg("--log")
        .arg(&log);
    cmd.assert().success();
    let text = std::fs::read_to_string(&log).expect("log file");
    let first: serde_json::Value =
        serde_json::from_str(text.lines().next().expect("first line")).expect("json line");
    assert_eq!(first["event_type"], "run.started");
    assert!(text.contains("\"comparison.case.matched\""));
}

#[test]
fn invalid_config_exits_nonzero() {
    let mut cmd = cargo_bin_cmd!("autograder");
    cmd.arg("list")
        .arg("--config")
        .arg(fixture("configs/missing.toml"));
    cmd.assert().failure();

    let mut cmd = cargo_bin_cmd!("autograder");
    cmd.arg("list").arg("--config").arg(fixture("configs/typo.toml"));
    cmd.assert().failure();
}

#[test]
fn unknown_function_exits_nonzero() {
    let mut cmd = cargo_bin_cmd!("autograder");
    cmd.args(["check", "--activity", "p2act6", "--function", "nope"]);
    cmd.assert().failure();
}
