//! Thin wrapper around the `ffmpeg`/`ffprobe` binaries.

use std::io::{Read, Write};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread::JoinHandle;

use framecast_common::error::{FramecastError, FramecastResult};

/// One ffmpeg invocation with the flags every pipeline step shares.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    label: &'static str,
    args: Vec<String>,
}

impl FfmpegCommand {
    /// Start a command; `label` names the pipeline step in logs and errors.
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            args: vec![
                "-y".to_string(),
                "-hide_banner".to_string(),
                "-loglevel".to_string(),
                "error".to_string(),
                "-nostats".to_string(),
            ],
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(path.display().to_string())
    }

    pub fn argv(&self) -> &[String] {
        &self.args
    }

    pub fn label(&self) -> &str {
        self.label
    }

    /// Run to completion, discarding stdout.
    pub fn run(&self) -> FramecastResult<()> {
        let mut child = self.spawn(Stdio::null(), Stdio::null())?;
        let stderr_task = drain_stderr(&mut child);
        self.finish(child, stderr_task)
    }

    /// Run to completion and return everything written to stdout.
    pub fn run_capture(&self) -> FramecastResult<Vec<u8>> {
        let mut child = self.spawn(Stdio::null(), Stdio::piped())?;
        let stderr_task = drain_stderr(&mut child);

        let mut stdout = child.stdout.take().ok_or_else(|| {
            FramecastError::render(format!("Failed to capture ffmpeg stdout ({})", self.label))
        })?;
        let mut output = Vec::new();
        stdout.read_to_end(&mut output).map_err(|e| {
            FramecastError::render(format!("Failed reading ffmpeg output ({}): {e}", self.label))
        })?;

        self.finish(child, stderr_task)?;
        Ok(output)
    }

    /// Run to completion feeding `input` on stdin.
    pub fn run_with_stdin(&self, input: &[u8]) -> FramecastResult<()> {
        let mut child = self.spawn(Stdio::piped(), Stdio::null())?;
        let stderr_task = drain_stderr(&mut child);

        {
            let mut stdin = child.stdin.take().ok_or_else(|| {
                FramecastError::render(format!("Failed to open ffmpeg stdin ({})", self.label))
            })?;
            if let Err(e) = stdin.write_all(input) {
                tracing::warn!(step = self.label, error = %e, "ffmpeg closed stdin early");
            }
        }

        self.finish(child, stderr_task)
    }

    fn spawn(&self, stdin: Stdio, stdout: Stdio) -> FramecastResult<Child> {
        tracing::debug!(step = self.label, args = ?self.args, "Running ffmpeg");
        Command::new("ffmpeg")
            .args(&self.args)
            .stdin(stdin)
            .stdout(stdout)
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| FramecastError::render(format!("Failed to start ffmpeg: {e}")))
    }

    fn finish(&self, mut child: Child, stderr_task: JoinHandle<String>) -> FramecastResult<()> {
        let status = child
            .wait()
            .map_err(|e| FramecastError::render(format!("Failed to wait on ffmpeg: {e}")))?;

        let stderr_output = stderr_task
            .join()
            .unwrap_or_else(|_| "<failed to join stderr reader>".to_string());

        if !status.success() {
            return Err(FramecastError::render(format!(
                "ffmpeg {} failed (status {}): {}",
                self.label,
                status,
                stderr_output.trim()
            )));
        }
        Ok(())
    }
}

// Drain stderr concurrently so ffmpeg never blocks on a full pipe.
fn drain_stderr(child: &mut Child) -> JoinHandle<String> {
    let stderr = child.stderr.take();
    std::thread::spawn(move || -> String {
        let Some(mut stderr) = stderr else {
            return String::new();
        };
        let mut output = String::new();
        match stderr.read_to_string(&mut output) {
            Ok(_) => output,
            Err(err) => format!("<failed to read ffmpeg stderr: {err}>"),
        }
    })
}

/// Whether `binary` resolves on `PATH`.
pub fn command_exists(binary: &str) -> bool {
    Command::new("sh")
        .arg("-c")
        .arg(format!("command -v {binary} >/dev/null 2>&1"))
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Container duration in seconds as reported by ffprobe.
pub fn probe_duration_secs(path: &Path) -> Option<f64> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(path)
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    let raw = String::from_utf8(output.stdout).ok()?;
    let secs = raw.lines().next()?.trim().parse::<f64>().ok()?;
    (secs.is_finite() && secs >= 0.0).then_some(secs)
}
