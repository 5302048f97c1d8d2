use std::io::Read;
use std::process::{Child, Command, ExitStatus, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const TIMEOUT: Duration = Duration::from_secs(30);

fn runtime(args: &[&str]) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_runtime_main"))
        .args(args)
        .env("RUST_LOG", "info")
        .env_remove("FULLSCREEN")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to spawn runtime_main process");

    let mut stdout = child.stdout.take().expect("Failed to capture stdout");
    let mut stderr = child.stderr.take().expect("Failed to capture stderr");
    let stdout_handle = thread::spawn(move || {
        let mut buf = Vec::new();
        stdout.read_to_end(&mut buf).map(|_| buf)
    });
    let stderr_handle = thread::spawn(move || {
        let mut buf = Vec::new();
        stderr.read_to_end(&mut buf).map(|_| buf)
    });

    let Some(status) = child.wait_timeout(TIMEOUT).expect("Failed to wait for runtime_main") else {
        child.kill().expect("Failed to kill timed-out process");
        panic!("runtime_main timed out after {TIMEOUT:?}");
    };
    let output = Output {
        status,
        stdout: stdout_handle.join().expect("stdout reader panicked").unwrap(),
        stderr: stderr_handle.join().expect("stderr reader panicked").unwrap(),
    };
    eprintln!("--- runtime_main STDERR ---\n{}", String::from_utf8_lossy(&output.stderr));
    output
}

fn stdout_lines(output: &Output) -> Vec<String> {
    String::from_utf8_lossy(&output.stdout).lines().map(str::to_string).collect()
}

#[test]
fn list_prints_the_catalog() {
    let output = runtime(&["list"]);
    assert!(output.status.success());
    let lines = stdout_lines(&output);
    assert_eq!(lines.len(), 68);
    assert_eq!(lines[0], "SuperMarioBros-1-1-v0");

    let tiles = stdout_lines(&runtime(&["list", "--tiles"]));
    assert_eq!(tiles.len(), 34);
    assert!(tiles.iter().all(|id| id.contains("-Tiles-")));
}

#[test]
fn show_prints_json() {
    let output = runtime(&["show", "SuperMarioBros-2-3-Tiles-v0"]);
    assert!(output.status.success());
    let spec: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(spec["world"], 2);
    assert_eq!(spec["level"], 3);
    assert_eq!(spec["observation"], "tiles");
    assert_eq!(spec["action_space"], "discrete");
}

#[test]
fn show_unknown_identifier_fails() {
    let output = runtime(&["show", "SuperMarioBros-9-9-v0"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("unknown environment identifier"));
}

#[test]
fn run_with_mock_backend_reports_episodes() {
    let output = runtime(&["run", "SuperMarioBros-1-1-v0", "--episodes", "2", "--max-steps", "60", "--seed", "4"]);
    assert!(output.status.success());
    let summaries: Vec<serde_json::Value> = stdout_lines(&output)
        .iter()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(summaries.len(), 2);
    assert_eq!(summaries[0]["steps"], 60);
    assert!(String::from_utf8_lossy(&output.stderr).contains("Episode 1 step 50"));
}

// `Child::wait` has no deadline; poll instead.
trait ChildExt {
    fn wait_timeout(&mut self, duration: Duration) -> std::io::Result<Option<ExitStatus>>;
}

impl ChildExt for Child {
    fn wait_timeout(&mut self, duration: Duration) -> std::io::Result<Option<ExitStatus>> {
        let start = Instant::now();
        loop {
            if let Some(status) = self.try_wait()? {
                return Ok(Some(status));
            }
            if start.elapsed() > duration {
                return Ok(None);
            }
            thread::sleep(Duration::from_millis(50));
        }
    }
}
