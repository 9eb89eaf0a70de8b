//! Compiles and runs a generated unit with an installed JDK.
//!
//! Compiler and runtime diagnostics are passed through verbatim.

use crate::types::ToolchainConfig;
use std::path::Path;
use std::process::{Output, Stdio};
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("failed to launch `{program}`: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("compilation failed:\n{0}")]
    Compile(String),
    #[error("program exited with {status}:\n{stderr}")]
    Runtime { status: String, stderr: String },
    #[error("unit path {0} has no class name")]
    BadPath(String),
}

#[derive(Debug, Clone)]
pub struct JavaToolchain {
    pub javac: String,
    pub java: String,
}

impl Default for JavaToolchain {
    fn default() -> Self {
        Self::from(&ToolchainConfig::default())
    }
}

impl From<&ToolchainConfig> for JavaToolchain {
    fn from(cfg: &ToolchainConfig) -> Self {
        Self {
            javac: cfg.javac.clone(),
            java: cfg.java.clone(),
        }
    }
}

impl JavaToolchain {
    /// Runs `javac` on the unit; the class file lands next to it.
    pub async fn compile(&self, unit: &Path) -> Result<(), RunError> {
        let mut cmd = Command::new(&self.javac);
        cmd.arg(unit);
        let output = self.capture(&self.javac, cmd).await?;
        if output.status.success() {
            Ok(())
        } else {
            Err(RunError::Compile(
                String::from_utf8_lossy(&output.stderr).into_owned(),
            ))
        }
    }

    /// Runs the compiled unit and returns its trimmed standard output.
    pub async fn run(&self, unit: &Path) -> Result<String, RunError> {
        let class_name = unit
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| RunError::BadPath(unit.display().to_string()))?;
        let class_path = match unit.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };

        let mut cmd = Command::new(&self.java);
        cmd.arg("-cp").arg(class_path).arg(class_name);
        let output = self.capture(&self.java, cmd).await?;
        if !output.status.success() {
            return Err(RunError::Runtime {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Compiles then runs the unit.
    pub async fn compile_and_run(&self, unit: &Path) -> Result<String, RunError> {
        self.compile(unit).await?;
        self.run(unit).await
    }

    async fn capture(&self, program: &str, mut cmd: Command) -> Result<Output, RunError> {
        debug!(program, "spawning toolchain process");
        cmd.stdin(Stdio::inherit())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| RunError::Launch {
                program: program.to_string(),
                source,
            })
    }
}
