//! Post-processing step executed on every `Init` and `Update`.
//!
//! With a command, the input file is piped into the command's stdin and the
//! command's stdout becomes the result. Without one, the input contents pass
//! through unchanged. The result goes to the output file or to stdout.

use std::path::PathBuf;
use std::process::Stdio;

use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Placeholder replaced by the absolute input path in commands.
pub const INPUT_PLACEHOLDER: &str = "<input>";

/// Errors from a single run.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("Cannot read input {}: {source}", .path.display())]
    ReadInput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to spawn command \"{command}\": {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command \"{command}\" exited with {}", exit_description(.code))]
    CommandFailed { command: String, code: Option<i32> },

    #[error("Cannot write output {}: {source}", .path.display())]
    WriteOutput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot write to stdout: {0}")]
    Stdout(#[source] std::io::Error),
}

fn exit_description(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

/// Runs the post-processing step for one input file.
#[derive(Debug, Clone)]
pub struct Runner {
    input: PathBuf,
    output: Option<PathBuf>,
    command: Option<String>,
}

impl Runner {
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: None,
            command: None,
        }
    }

    /// Write results to this file instead of stdout.
    pub fn with_output(mut self, output: Option<PathBuf>) -> Self {
        self.output = output;
        self
    }

    /// Shell command to run; `<input>` is replaced by the input path.
    pub fn with_command(mut self, command: Option<String>) -> Self {
        self.command = command;
        self
    }

    /// The command with every placeholder expanded, if one is configured.
    pub fn expanded_command(&self) -> Option<String> {
        let input = self.input.display().to_string();
        self.command
            .as_ref()
            .map(|command| command.replace(INPUT_PLACEHOLDER, &input))
    }

    /// Produce the result bytes without delivering them.
    pub async fn produce(&self) -> Result<Vec<u8>, RunError> {
        let source = tokio::fs::read(&self.input)
            .await
            .map_err(|source| RunError::ReadInput {
                path: self.input.clone(),
                source,
            })?;

        match self.expanded_command() {
            Some(command) => run_command(&command, source).await,
            None => Ok(source),
        }
    }

    /// Produce the result and write it to the output file or stdout.
    ///
    /// An empty result is not written.
    pub async fn run(&self) -> Result<(), RunError> {
        let result = self.produce().await?;
        if result.is_empty() {
            crate::debug_event!("runner", "empty result", "nothing written");
            return Ok(());
        }

        match &self.output {
            Some(path) => {
                tokio::fs::write(path, &result)
                    .await
                    .map_err(|source| RunError::WriteOutput {
                        path: path.clone(),
                        source,
                    })?;
                crate::debug_event!("runner", "wrote", "{} bytes to {}", result.len(), path.display());
            }
            None => {
                let mut stdout = tokio::io::stdout();
                stdout.write_all(&result).await.map_err(RunError::Stdout)?;
                stdout.flush().await.map_err(RunError::Stdout)?;
            }
        }
        Ok(())
    }
}

/// Run `command` through the platform shell with `input` on its stdin.
async fn run_command(command: &str, input: Vec<u8>) -> Result<Vec<u8>, RunError> {
    let mut child = shell(command)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| RunError::Spawn {
            command: command.to_string(),
            source,
        })?;

    // Feed stdin concurrently so a chatty command cannot deadlock on a full pipe
    let writer = child.stdin.take().map(|mut stdin| {
        tokio::spawn(async move {
            if let Err(e) = stdin.write_all(&input).await {
                // Commands are free to ignore their stdin
                tracing::debug!("[runner] stdin not consumed: {e}");
            }
        })
    });

    let output = child
        .wait_with_output()
        .await
        .map_err(|source| RunError::Spawn {
            command: command.to_string(),
            source,
        })?;
    if let Some(writer) = writer {
        let _ = writer.await;
    }

    if !output.stderr.is_empty() {
        eprintln!("{}", String::from_utf8_lossy(&output.stderr).trim_end());
    }

    if !output.status.success() {
        return Err(RunError::CommandFailed {
            command: command.to_string(),
            code: output.status.code(),
        });
    }

    Ok(output.stdout)
}

#[cfg(not(windows))]
fn shell(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd
}

#[cfg(windows)]
fn shell(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(command);
    cmd
}
