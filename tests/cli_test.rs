use std::io::{BufRead, BufReader};
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_help_lists_options() {
    let output = Command::new(env!("CARGO_BIN_EXE_sass-watcher"))
        .arg("--help")
        .output()
        .expect("Failed to run sass-watcher");

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    for flag in ["--output", "--command", "--root-dir", "--include-path", "--include-extensions", "--verbose"] {
        assert!(stdout.contains(flag), "help is missing {flag}");
    }
    assert!(stdout.contains("SASS_PATH"));
}

#[test]
fn test_missing_input_is_rejected() {
    let output = Command::new(env!("CARGO_BIN_EXE_sass-watcher"))
        .output()
        .expect("Failed to run sass-watcher");

    assert!(!output.status.success());
}

#[test]
fn test_missing_config_file_is_reported() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("main.scss");
    std::fs::write(&input, "a { b: c; }").unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_sass-watcher"))
        .arg(&input)
        .arg("--config")
        .arg(temp_dir.path().join("absent.toml"))
        .current_dir(temp_dir.path())
        .output()
        .expect("Failed to run sass-watcher");

    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("Configuration file not found"));
}

#[cfg(unix)]
#[test]
fn test_failing_command_is_logged_as_error() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("main.scss");
    std::fs::write(&input, "a { b: c; }").unwrap();

    let mut child = Command::new(env!("CARGO_BIN_EXE_sass-watcher"))
        .arg(&input)
        .arg("--command")
        .arg("exit 3")
        .arg("--root-dir")
        .arg(temp_dir.path())
        .current_dir(temp_dir.path())
        .env_remove("RUST_LOG")
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to run sass-watcher");

    let stderr = child.stderr.take().unwrap();
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        for line in BufReader::new(stderr).lines().map_while(Result::ok) {
            if tx.send(line).is_err() {
                break;
            }
        }
    });

    let logged = loop {
        match rx.recv_timeout(Duration::from_secs(10)) {
            Ok(line) if line.contains("[runner]") => break Some(line),
            Ok(_) => continue,
            Err(_) => break None,
        }
    };
    child.kill().unwrap();
    let _ = child.wait();

    let line = logged.expect("runner failure was not logged");
    assert!(line.contains("ERROR"), "not an error-level line: {line}");
}
