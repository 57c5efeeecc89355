#![cfg(unix)]

use assert_cmd::Command;
use predicates::str::contains;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Child, Stdio};
use std::time::{Duration, Instant};
use tempfile::TempDir;

struct TestEnv {
    tmp: TempDir,
    config: PathBuf,
}

impl TestEnv {
    fn new() -> Self {
        let tmp = TempDir::new().expect("create temp dir");
        let config = tmp.path().join("site.yaml");
        fs::write(&config, "packages:\n  - nginx\n").expect("write config");
        Self { tmp, config }
    }

    /// Command running from inside the temp dir so no stray settings file is picked up
    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("idemcheck").expect("binary built");
        cmd.current_dir(self.tmp.path()).env_remove("RUST_LOG");
        cmd
    }
}

#[test]
fn help_exits_zero() {
    TestEnv::new()
        .cmd()
        .arg("-h")
        .assert()
        .success()
        .stdout(contains("--apply-command"))
        .stdout(contains("--checksum-command"));
}

#[test]
fn idempotent_run_exits_zero() {
    let env = TestEnv::new();
    env.cmd()
        .args(["-n", "3", "-a", "echo {} > state.txt", "-c", "cat state.txt"])
        .arg(&env.config)
        .assert()
        .code(0)
        .stdout(contains("is idempotent"));
}

#[test]
fn non_idempotent_run_exits_one() {
    let env = TestEnv::new();
    env.cmd()
        .args(["-n", "3", "-a", "echo x >> state.txt", "-c", "wc -l < state.txt"])
        .arg(&env.config)
        .assert()
        .code(1)
        .stdout(contains("NOT idempotent"))
        .stdout(contains("iteration 2 differs"));
}

#[test]
fn failing_apply_exits_two() {
    let env = TestEnv::new();
    env.cmd()
        .args(["-a", "exit 5", "-c", "echo stable"])
        .arg(&env.config)
        .assert()
        .code(2)
        .stderr(contains("iteration 1"))
        .stderr(contains("exited with code 5"));
}

#[test]
fn missing_apply_command_exits_two() {
    let env = TestEnv::new();
    env.cmd()
        .args(["-c", "echo stable"])
        .arg(&env.config)
        .assert()
        .code(2)
        .stderr(contains("apply command is required"));
}

#[test]
fn missing_config_file_exits_two() {
    let env = TestEnv::new();
    env.cmd()
        .args(["-a", "true", "-c", "echo stable", "nope.yaml"])
        .assert()
        .code(2)
        .stderr(contains("configuration file not found"));
}

#[test]
fn zero_iterations_exits_two() {
    let env = TestEnv::new();
    env.cmd()
        .args(["-n", "0", "-a", "true", "-c", "echo stable"])
        .arg(&env.config)
        .assert()
        .code(2);
}

#[test]
fn json_report_is_parseable() {
    let env = TestEnv::new();
    let out = env
        .cmd()
        .args(["--json", "--baseline", "-n", "2", "-a", "echo {} > state.txt", "-c", "cat state.txt 2>/dev/null || echo none"])
        .arg(&env.config)
        .assert()
        .code(0)
        .get_output()
        .stdout
        .clone();

    let report: Value = serde_json::from_slice(&out).expect("valid json output");
    assert_eq!(report["verdict"], "idempotent");
    assert_eq!(report["baseline"], "none");
    assert_eq!(report["iterations"].as_array().map(Vec::len), Some(2));
    assert!(report["iterations"][0]["digest"]
        .as_str()
        .unwrap()
        .starts_with("sha256:"));
}

#[test]
fn settings_file_supplies_commands() {
    let env = TestEnv::new();
    fs::write(
        env.tmp.path().join("idemcheck.toml"),
        "apply_command = \"echo {} > state.txt\"\nchecksum_command = \"cat state.txt\"\niterations = 3\n",
    )
    .unwrap();

    env.cmd()
        .arg(&env.config)
        .assert()
        .code(0)
        .stdout(contains("Iterations: 3/3"));
}

#[test]
fn validate_rejects_malformed_config() {
    let env = TestEnv::new();
    let broken = env.tmp.path().join("broken.yaml");
    fs::write(&broken, "packages: [nginx\n").unwrap();

    env.cmd()
        .args(["--validate", "-a", "touch applied", "-c", "echo stable"])
        .arg(&broken)
        .assert()
        .code(2)
        .stderr(contains("YAML validation failed"));
}

#[test]
fn provided_temp_dir_is_kept() {
    let env = TestEnv::new();
    let work = env.tmp.path().join("work");

    env.cmd()
        .args(["-a", "echo {} > state.txt", "-c", "cat state.txt", "-t"])
        .arg(&work)
        .arg(&env.config)
        .assert()
        .code(0);

    assert!(work.join("state.txt").exists());
}

#[test]
fn completions_do_not_need_config_file() {
    TestEnv::new()
        .cmd()
        .args(["--completions", "bash"])
        .assert()
        .success()
        .stdout(contains("idemcheck"));
}

/// Start a long-running check whose owned temp dir lands in `scratch`
fn spawn_sleeping_check(env: &TestEnv, scratch: &Path) -> Child {
    std::process::Command::new(env!("CARGO_BIN_EXE_idemcheck"))
        .args(["-n", "3", "-a", "sleep 5", "-c", "echo stable"])
        .arg(&env.config)
        .current_dir(env.tmp.path())
        .env("TMPDIR", scratch)
        .env_remove("RUST_LOG")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn idemcheck")
}

fn wait_for_workdir(scratch: &Path) {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        let created = fs::read_dir(scratch)
            .unwrap()
            .filter_map(Result::ok)
            .any(|e| e.file_name().to_string_lossy().starts_with("idemcheck-"));
        if created {
            // let the apply command get spawned too
            std::thread::sleep(Duration::from_millis(200));
            return;
        }
        assert!(Instant::now() < deadline, "working directory never appeared");
        std::thread::sleep(Duration::from_millis(20));
    }
}

fn assert_signal_cleans_up(signal: &str) {
    let env = TestEnv::new();
    let scratch = env.tmp.path().join("scratch");
    fs::create_dir(&scratch).unwrap();

    let mut child = spawn_sleeping_check(&env, &scratch);
    wait_for_workdir(&scratch);

    let sent = std::process::Command::new("kill")
        .args([signal, &child.id().to_string()])
        .status()
        .expect("run kill");
    assert!(sent.success());

    let status = child.wait().expect("wait for idemcheck");
    assert_eq!(status.code(), Some(130));
    assert_eq!(fs::read_dir(&scratch).unwrap().count(), 0);
}

#[test]
fn sigint_removes_temp_dir_and_exits_130() {
    assert_signal_cleans_up("-INT");
}

#[test]
fn sigterm_removes_temp_dir_and_exits_130() {
    assert_signal_cleans_up("-TERM");
}

#[test]
fn sighup_removes_temp_dir_and_exits_130() {
    assert_signal_cleans_up("-HUP");
}
