// ABOUTME: Integration tests for the sshctl CLI commands.
// ABOUTME: Validates --help output, init, list and argument errors without a network.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;

fn sshctl_cmd() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("sshctl"));
    cmd.env_remove("RUST_LOG").env_remove("SSH_AUTH_SOCK");
    cmd
}

fn write_config(dir: &std::path::Path, yaml: &str) -> std::path::PathBuf {
    let path = dir.join("config.yaml");
    fs::write(&path, yaml).unwrap();
    path
}

const CONFIG: &str = r#"
config:
  default_user: ops
  users:
    - name: ops
  jump_hosts:
    - name: edge
      host: edge.example.com
      user: ops
hosts:
  - name: web1
    host: 10.0.0.1
    tags: [web]
  - name: db1
    host: 10.0.0.2
    port: 2222
"#;

#[test]
fn help_shows_commands() {
    sshctl_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("connect"))
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("forward"))
        .stdout(predicate::str::contains("list"))
        .stdout(predicate::str::contains("init"));
}

mod init {
    use super::*;

    #[test]
    fn creates_config_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("nested/config.yaml");

        sshctl_cmd()
            .arg("--config")
            .arg(&config_path)
            .arg("init")
            .assert()
            .success()
            .stdout(predicate::str::contains("Created"));

        let content = fs::read_to_string(&config_path).unwrap();
        assert!(content.contains("jump_hosts:"));
        assert!(content.contains("hosts:"));
    }

    #[test]
    fn refuses_to_overwrite_existing_config() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = write_config(temp_dir.path(), "existing: config");

        sshctl_cmd()
            .arg("--config")
            .arg(&config_path)
            .arg("init")
            .assert()
            .failure()
            .stderr(predicate::str::contains("already exists"));

        assert_eq!(fs::read_to_string(&config_path).unwrap(), "existing: config");
    }

    #[test]
    fn force_overwrites() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = write_config(temp_dir.path(), "existing: config");

        sshctl_cmd()
            .arg("--config")
            .arg(&config_path)
            .args(["init", "--force"])
            .assert()
            .success();

        assert!(fs::read_to_string(&config_path).unwrap().contains("hosts:"));
    }

    #[test]
    fn default_location_is_under_home() {
        let home = tempfile::tempdir().unwrap();

        sshctl_cmd()
            .env("HOME", home.path())
            .arg("init")
            .assert()
            .success();

        assert!(home.path().join(".sshctl/config.yaml").exists());
    }
}

mod list {
    use super::*;

    #[test]
    fn prints_jump_hosts_and_hosts() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = write_config(temp_dir.path(), CONFIG);

        sshctl_cmd()
            .arg("--config")
            .arg(&config_path)
            .arg("list")
            .assert()
            .success()
            .stdout(predicate::str::contains("1. edge"))
            .stdout(predicate::str::contains("10.0.0.2:2222"))
            .stdout(predicate::str::contains("@web"));
    }

    #[test]
    fn json_output_is_one_document() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = write_config(temp_dir.path(), CONFIG);

        let assert = sshctl_cmd()
            .arg("--config")
            .arg(&config_path)
            .args(["--output", "json", "list"])
            .assert()
            .success();

        let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
        let value: serde_json::Value = serde_json::from_str(stdout.trim()).unwrap();
        assert_eq!(value["hosts"][1]["port"], 2222);
        assert_eq!(value["jump_hosts"][0]["name"], "edge");
    }

    #[test]
    fn missing_config_suggests_init() {
        let temp_dir = tempfile::tempdir().unwrap();

        sshctl_cmd()
            .arg("--config")
            .arg(temp_dir.path().join("absent.yaml"))
            .arg("list")
            .assert()
            .failure()
            .stderr(predicate::str::contains("sshctl init"));
    }
}

mod errors {
    use super::*;

    #[test]
    fn invalid_token_fails_before_dialing() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = write_config(temp_dir.path(), CONFIG);

        sshctl_cmd()
            .arg("--config")
            .arg(&config_path)
            .args(["connect", "a@b@c", "-c", "true"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("a@b@c"));
    }

    #[test]
    fn unknown_user_lists_configured_users() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = write_config(temp_dir.path(), CONFIG);

        sshctl_cmd()
            .arg("--config")
            .arg(&config_path)
            .args(["connect", "web1", "-u", "nobody", "-c", "true"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("nobody"))
            .stderr(predicate::str::contains("ops"));
    }

    #[test]
    fn unknown_jump_host_is_an_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = write_config(temp_dir.path(), CONFIG);

        sshctl_cmd()
            .arg("--config")
            .arg(&config_path)
            .args(["run", "web1", "-c", "true", "-j", "7"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("unknown jump host"));
    }

    #[test]
    fn empty_group_has_no_valid_hosts() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = write_config(temp_dir.path(), CONFIG);

        sshctl_cmd()
            .arg("--config")
            .arg(&config_path)
            .args(["run", "@nothing", "-c", "uptime"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("no hosts found with tag 'nothing'"))
            .stderr(predicate::str::contains("no valid hosts specified"));
    }

    #[test]
    fn malformed_forward_spec_is_rejected_by_the_parser() {
        sshctl_cmd()
            .args(["forward", "web1", "-L", "8080:db"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("8080:db"));
    }

    #[test]
    fn run_requires_a_command() {
        sshctl_cmd()
            .args(["run", "web1"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("--command"));
    }
}
