use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;

use crate::error::Result;

/// Exit code the import command uses to signal a transient failure worth
/// one immediate retry: the target file was still locked by its writer.
pub const RETRY_EXIT_CODE: i32 = 75;

/// Host and port the import command delivers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

/// Everything one invocation of the external action produced.
#[derive(Debug, Clone)]
pub struct ActionOutput {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ActionOutput {
    pub fn succeeded(&self) -> bool {
        self.code == 0
    }
}

/// The external action fired for a quiet fileset.
#[async_trait]
pub trait ImportAction: Send + Sync {
    /// Run the action once. Output is captured, never streamed; the call
    /// may block for an unbounded time and must never run under the
    /// registry lock.
    async fn run(
        &self,
        target: &Path,
        endpoint: &Endpoint,
        credential: &str,
    ) -> Result<ActionOutput>;
}

/// Runs the configured import command as a subprocess:
///
/// ```text
/// <program> <args…> --server <host> --port <port> --key <credential> <target>
/// ```
pub struct CommandAction {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandAction {
    pub fn new(program: PathBuf, args: Vec<String>) -> Self {
        Self { program, args }
    }
}

#[async_trait]
impl ImportAction for CommandAction {
    async fn run(
        &self,
        target: &Path,
        endpoint: &Endpoint,
        credential: &str,
    ) -> Result<ActionOutput> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg("--server")
            .arg(&endpoint.host)
            .arg("--port")
            .arg(endpoint.port.to_string())
            .arg("--key")
            .arg(credential)
            .arg(target)
            .output()
            .await?;

        Ok(ActionOutput {
            // Signal-terminated processes carry no code; -1 is terminal.
            code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
