use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::debug;

/// How long to keep reading a pipe once the child is gone. A grandchild
/// that inherited the pipe can hold it open indefinitely.
const PIPE_DRAIN_GRACE: Duration = Duration::from_secs(1);

/// Where a child's stdout/stderr go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Pipe both streams and hand them back in [`ProcessOutput`].
    #[default]
    Capture,
    /// Inherit the terminal; the returned output is empty.
    Stream,
}

/// A fully described subprocess invocation.
#[derive(Debug, Clone)]
pub struct ProcessCommand {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    /// Overlaid on top of the inherited process environment.
    pub env: HashMap<String, String>,
    pub timeout: Duration,
    pub output: OutputMode,
}

impl ProcessCommand {
    #[must_use]
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            env: HashMap::new(),
            timeout,
            output: OutputMode::Capture,
        }
    }

    /// Build from an argv vector; `None` when `argv` is empty.
    #[must_use]
    pub fn from_argv(argv: &[String], timeout: Duration) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self::new(program.clone(), timeout).args(args.iter().cloned()))
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn envs(mut self, env: &HashMap<String, String>) -> Self {
        self.env
            .extend(env.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    #[must_use]
    pub fn output(mut self, mode: OutputMode) -> Self {
        self.output = mode;
        self
    }

    /// The command line as a single printable string.
    #[must_use]
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// stdout followed by stderr.
    #[must_use]
    pub fn combined(&self) -> String {
        if self.stderr.is_empty() {
            return self.stdout.clone();
        }
        if self.stdout.is_empty() || self.stdout.ends_with('\n') {
            return format!("{}{}", self.stdout, self.stderr);
        }
        format!("{}\n{}", self.stdout, self.stderr)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("Command not found: {0}")]
    NotFound(String),
    #[error("Command '{command}' timed out after {timeout:?}")]
    Timeout {
        command: String,
        timeout: Duration,
        /// Whatever the command printed before it was killed.
        output: ProcessOutput,
    },
    #[error("Failed to run '{command}': {source}")]
    Io {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

/// The one place subprocesses are started from.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run `command` to completion or until its timeout elapses.
    ///
    /// A non-zero exit is not an error; callers inspect
    /// [`ProcessOutput::exit_code`].
    async fn run(&self, command: &ProcessCommand) -> Result<ProcessOutput, ProcessError>;
}

/// [`ProcessRunner`] backed by `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioProcessRunner;

impl TokioProcessRunner {
    fn build_command(command: &ProcessCommand) -> Command {
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .envs(&command.env)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        if let Some(dir) = &command.working_dir {
            cmd.current_dir(dir);
        }

        match command.output {
            OutputMode::Capture => cmd.stdout(Stdio::piped()).stderr(Stdio::piped()),
            OutputMode::Stream => cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit()),
        };
        cmd
    }
}

/// Reads one child pipe into a shared buffer, so output survives a kill.
struct PipeReader {
    buf: Arc<Mutex<Vec<u8>>>,
    task: Option<JoinHandle<()>>,
}

impl PipeReader {
    fn spawn<R>(pipe: Option<R>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let task = pipe.map(|mut pipe| {
            let buf = Arc::clone(&buf);
            tokio::spawn(async move {
                let mut chunk = [0u8; 8192];
                loop {
                    match pipe.read(&mut chunk).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            buf.lock()
                                .unwrap_or_else(PoisonError::into_inner)
                                .extend_from_slice(&chunk[..n]);
                        }
                    }
                }
            })
        });
        Self { buf, task }
    }

    async fn collect(self) -> String {
        if let Some(mut task) = self.task {
            if tokio::time::timeout(PIPE_DRAIN_GRACE, &mut task).await.is_err() {
                task.abort();
            }
        }
        let bytes = std::mem::take(&mut *self.buf.lock().unwrap_or_else(PoisonError::into_inner));
        let text = String::from_utf8_lossy(&bytes).into_owned();
        text
    }
}

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(&self, command: &ProcessCommand) -> Result<ProcessOutput, ProcessError> {
        let line = command.display();
        debug!(command = %line, timeout_secs = command.timeout.as_secs(), "Spawning process");

        let mut child = Self::build_command(command).spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ProcessError::NotFound(command.program.clone())
            } else {
                ProcessError::Io {
                    command: line.clone(),
                    source: e,
                }
            }
        })?;

        let stdout = PipeReader::spawn(child.stdout.take());
        let stderr = PipeReader::spawn(child.stderr.take());

        let status = match tokio::time::timeout(command.timeout, child.wait()).await {
            Ok(status) => Some(status.map_err(|e| ProcessError::Io {
                command: line.clone(),
                source: e,
            })?),
            Err(_) => {
                if let Err(e) = child.kill().await {
                    debug!(command = %line, error = %e, "Failed to kill timed out process");
                }
                None
            }
        };

        let (stdout, stderr) = tokio::join!(stdout.collect(), stderr.collect());

        match status {
            Some(status) => Ok(ProcessOutput {
                exit_code: status.code(),
                stdout,
                stderr,
            }),
            None => Err(ProcessError::Timeout {
                command: line,
                timeout: command.timeout,
                output: ProcessOutput {
                    exit_code: None,
                    stdout,
                    stderr,
                },
            }),
        }
    }
}
