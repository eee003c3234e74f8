//! Disk transfer through `ovirt-img`

use crate::connection::EngineConnection;
use crate::error::PopulatorError;
use crate::materialize::CredentialFiles;
use std::process::Stdio;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{error, info};

/// Transfer tool invoked by default
pub const DEFAULT_TRANSFER_TOOL: &str = "ovirt-img";

/// Exit status and output of a finished child process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when the process was killed by a signal
    pub exit_code: Option<i32>,
    /// Standard output and standard error, interleaved in write order
    pub output: Vec<u8>,
}

impl CommandOutput {
    /// True for a zero exit code
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runs external commands.
///
/// [`ProcessRunner`] spawns real processes; `MockCommandRunner` records calls
/// for tests.
#[async_trait::async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs `program` to completion and returns its exit status and output
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput, PopulatorError>;
}

/// Spawns child processes with `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

#[async_trait::async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput, PopulatorError> {
        let spawn_err = |source: std::io::Error| PopulatorError::TransferSpawn {
            program: program.to_string(),
            source,
        };

        // stdout and stderr share one pipe so progress and error lines keep their order
        let (reader, writer) = nix::unistd::pipe().map_err(|e| spawn_err(e.into()))?;
        let stderr = writer.try_clone().map_err(spawn_err)?;

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(writer))
            .stderr(Stdio::from(stderr));
        let child = command.spawn();
        // Release our copies of the write end, or the read below never sees EOF
        drop(command);
        let mut child = child.map_err(spawn_err)?;

        let mut output = Vec::new();
        let mut pipe = tokio::fs::File::from_std(std::fs::File::from(reader));
        pipe.read_to_end(&mut output).await.map_err(spawn_err)?;
        let status = child.wait().await.map_err(spawn_err)?;

        Ok(CommandOutput {
            exit_code: status.code(),
            output,
        })
    }
}

/// Arguments for `ovirt-img download-disk`, in the order the tool expects.
pub fn download_disk_args(connection: &EngineConnection, destination: &str, files: &CredentialFiles) -> Vec<String> {
    vec![
        "download-disk".to_string(),
        format!("--engine-url={}", connection.url),
        format!("--username={}", connection.username),
        format!("--password-file={}", files.password.display()),
        format!("--cafile={}", files.ca.display()),
        "-f".to_string(),
        "raw".to_string(),
        connection.disk_id.clone(),
        destination.to_string(),
    ]
}

/// Downloads the disk into `destination` and echoes the tool's output.
///
/// No timeout and no retry: a failed transfer fails the worker, and the
/// controller replaces the worker pod.
pub async fn run_transfer(
    runner: &dyn CommandRunner,
    program: &str,
    connection: &EngineConnection,
    destination: &str,
    files: &CredentialFiles,
) -> Result<CommandOutput, PopulatorError> {
    let args = download_disk_args(connection, destination, files);
    info!("Downloading disk {} from {} to {}", connection.disk_id, connection.url, destination);

    let output = runner.run(program, &args).await?;
    println!("{}", String::from_utf8_lossy(&output.output));

    if !output.success() {
        error!("{} failed for disk {}", program, connection.disk_id);
        return Err(PopulatorError::TransferFailed {
            program: program.to_string(),
            exit_code: output.exit_code,
        });
    }

    info!("Disk {} downloaded to {}", connection.disk_id, destination);
    Ok(output)
}
