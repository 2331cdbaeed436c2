use std::io::{BufRead, BufReader, Read};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

fn capture(stream: impl Read + Send + 'static) -> (Arc<Mutex<String>>, thread::JoinHandle<()>) {
    let captured = Arc::new(Mutex::new(String::new()));
    let sink = Arc::clone(&captured);
    let handle = thread::spawn(move || {
        for line in BufReader::new(stream).lines().map_while(Result::ok) {
            let mut data = sink.lock().unwrap();
            data.push_str(&line);
            data.push('\n');
        }
    });
    (captured, handle)
}

fn wait_timeout(child: &mut Child, timeout: Duration) -> std::io::Result<Option<ExitStatus>> {
    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if start.elapsed() > timeout {
            return Ok(None);
        }
        thread::sleep(Duration::from_millis(50));
    }
}

/// Runs `raymarch_main` with `envs` and returns (status, stdout, stderr).
fn run_main(envs: &[(&str, &str)]) -> (ExitStatus, String, String) {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_raymarch_main"));
    cmd.env("RUST_LOG", "info")
        .envs(envs.iter().copied())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = cmd.spawn().expect("Failed to spawn raymarch_main process");
    let (stdout, stdout_handle) = capture(child.stdout.take().expect("stdout"));
    let (stderr, stderr_handle) = capture(child.stderr.take().expect("stderr"));

    let timeout = Duration::from_secs(30);
    let status = match wait_timeout(&mut child, timeout) {
        Ok(Some(status)) => status,
        Ok(None) => {
            child.kill().expect("Failed to kill timed-out process");
            panic!("raymarch_main timed out after {timeout:?}");
        }
        Err(e) => panic!("Failed to wait for raymarch_main: {e}"),
    };
    stdout_handle.join().expect("stdout reader panicked");
    stderr_handle.join().expect("stderr reader panicked");

    let stdout = stdout.lock().unwrap().clone();
    let stderr = stderr.lock().unwrap().clone();
    eprintln!("--- raymarch_main STDOUT ---\n{stdout}");
    eprintln!("--- raymarch_main STDERR ---\n{stderr}");
    (status, stdout, stderr)
}

#[test]
fn scripted_frames_only_dispatch_on_change() {
    let (status, stdout, _) = run_main(&[
        ("RAYMARCH_FRAMES", "40"),
        ("RAYMARCH_WIDTH", "320"),
        ("RAYMARCH_HEIGHT", "180"),
    ]);

    assert!(status.success(), "raymarch_main exited with {:?}", status.code());
    assert!(stdout.contains("Running headless on the mock compute backend."));
    assert!(stdout.contains("Frame loop finished."));
    // Initial frame, camera orbit, authoring burst, host move, add, remove.
    assert!(stdout.contains("dispatches=6"), "unexpected dispatch count");
    assert!(stdout.contains("reuses=34"));
    assert!(stdout.contains("recreations=3"));
    assert!(stdout.contains("failures=0"));
    assert!(stdout.contains("Fractal pass finished."));
}

#[test]
fn invalid_configuration_fails_cleanly() {
    let (status, _, stderr) = run_main(&[("RAYMARCH_FRAMES", "lots")]);
    assert!(!status.success());
    assert!(stderr.contains("RAYMARCH_FRAMES"), "error names the variable");
}
