use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;

pub mod formats;
pub mod youtube;

pub use formats::{AudioQuality, MediaType, VideoFormat};
pub use youtube::{DownloadedMedia, FormatInfo, MediaDetails, SearchResult, YtDlp};

/// Errors raised while running the external tool
#[derive(thiserror::Error, Debug)]
pub enum ToolError {
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{stderr}")]
    Failed { code: Option<i32>, stderr: String },

    #[error("yt-dlp timed out after {}s", .after.as_secs())]
    TimedOut { after: Duration },

    #[error("yt-dlp returned unexpected output: {0}")]
    InvalidOutput(String),
}

impl ToolError {
    /// Build a failure from a non-zero exit, falling back to the exit code when stderr is empty
    pub fn failed(code: Option<i32>, stderr: &str) -> Self {
        let stderr = stderr.trim();
        let stderr = if stderr.is_empty() {
            match code {
                Some(code) => format!("yt-dlp exited with status {}", code),
                None => "yt-dlp was terminated by a signal".to_string(),
            }
        } else {
            stderr.to_string()
        };

        ToolError::Failed { code, stderr }
    }
}

/// Captured result of one tool invocation
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    /// Exit code, `None` when the process was killed by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Turn a non-zero exit into a [`ToolError::Failed`]
    pub fn into_success(self) -> std::result::Result<Self, ToolError> {
        if self.success() {
            Ok(self)
        } else {
            Err(ToolError::failed(self.code, &self.stderr))
        }
    }

    /// Non-empty, trimmed stdout lines
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.stdout.lines().map(str::trim).filter(|line| !line.is_empty())
    }
}

/// Runs the external extraction tool.
///
/// Every handler composes against this one capability: hand it an argument
/// list and a deadline, get back stdout, stderr and the exit code.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ToolRunner: Send + Sync {
    async fn run(
        &self,
        args: Vec<String>,
        deadline: Duration,
    ) -> std::result::Result<ToolOutput, ToolError>;

    /// Name of the program, for logs and error messages
    fn program(&self) -> String;
}

/// [`ToolRunner`] backed by a real child process
pub struct ProcessRunner {
    program: PathBuf,
}

impl ProcessRunner {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl ToolRunner for ProcessRunner {
    async fn run(
        &self,
        args: Vec<String>,
        deadline: Duration,
    ) -> std::result::Result<ToolOutput, ToolError> {
        tracing::debug!(program = %self.program.display(), ?args, "Running external tool");
        let started = Instant::now();

        // kill_on_drop: a dropped request future (client gone, deadline hit) reaps the child
        let child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ToolError::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;

        let output = match tokio::time::timeout(deadline, child.wait_with_output()).await {
            Ok(result) => result.map_err(|source| ToolError::Spawn {
                program: self.program.display().to_string(),
                source,
            })?,
            Err(_) => {
                tracing::warn!(
                    program = %self.program.display(),
                    timeout_secs = deadline.as_secs(),
                    "External tool timed out, killing it"
                );
                return Err(ToolError::TimedOut { after: deadline });
            }
        };

        let output = ToolOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        tracing::info!(
            program = %self.program.display(),
            code = ?output.code,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "External tool finished"
        );

        Ok(output)
    }

    fn program(&self) -> String {
        self.program.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_falls_back_to_exit_code() {
        let err = ToolError::failed(Some(2), "   \n");
        assert_eq!(err.to_string(), "yt-dlp exited with status 2");

        let err = ToolError::failed(Some(1), "ERROR: Unsupported URL\n");
        assert_eq!(err.to_string(), "ERROR: Unsupported URL");
    }

    #[test]
    fn test_output_lines_skip_blanks() {
        let output = ToolOutput {
            code: Some(0),
            stdout: "\n first \n\n second\n".to_string(),
            stderr: String::new(),
        };
        assert_eq!(output.lines().collect::<Vec<_>>(), vec!["first", "second"]);
    }

    #[test]
    fn test_into_success_rejects_non_zero_exit() {
        let output = ToolOutput {
            code: Some(1),
            stdout: String::new(),
            stderr: "ERROR: private video".to_string(),
        };
        match output.into_success() {
            Err(ToolError::Failed { code, stderr }) => {
                assert_eq!(code, Some(1));
                assert_eq!(stderr, "ERROR: private video");
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_program_is_a_spawn_error() {
        let runner = ProcessRunner::new("definitely-not-a-real-yt-dlp-binary");
        let result = runner.run(vec!["--version".into()], Duration::from_secs(5)).await;
        assert!(matches!(result, Err(ToolError::Spawn { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_process_runner_captures_streams() {
        let runner = ProcessRunner::new("sh");
        let output = runner
            .run(
                vec!["-c".into(), "echo out; echo err 1>&2; exit 3".into()],
                Duration::from_secs(5),
            )
            .await
            .unwrap();
        assert_eq!(output.code, Some(3));
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.stderr.trim(), "err");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_process_runner_enforces_deadline() {
        let runner = ProcessRunner::new("sleep");
        let result = runner.run(vec!["5".into()], Duration::from_millis(100)).await;
        assert!(matches!(result, Err(ToolError::TimedOut { .. })));
    }
}
