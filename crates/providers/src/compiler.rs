//! Document compilers.
//!
//! [`CommandCompiler`] shells out to an external typesetter such as
//! `pandoc`; [`MarkdownCompiler`] delivers the markdown unchanged.

use async_trait::async_trait;
use dossier_core::error::CompileError;
use dossier_core::{DocumentCompiler, ExpertiseLevel};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

/// Runs `<program> <args...> --metadata=... <input.md> -o <output.ext>` in a
/// scratch directory.
pub struct CommandCompiler {
    program: String,
    args: Vec<String>,
    extension: String,
    timeout: Duration,
}

impl CommandCompiler {
    pub fn new(
        program: impl Into<String>,
        args: Vec<String>,
        extension: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            program: program.into(),
            args,
            extension: extension.into(),
            timeout,
        }
    }

    fn command_args(&self, input: &Path, output: &Path, expertise: ExpertiseLevel) -> Vec<String> {
        let mut args = self.args.clone();
        args.push(format!("--metadata=expertise_level:{expertise}"));
        args.push(format!("--metadata=depth:{}", expertise.depth_label()));
        args.push(input.display().to_string());
        args.push("-o".into());
        args.push(output.display().to_string());
        args
    }
}

#[async_trait]
impl DocumentCompiler for CommandCompiler {
    fn name(&self) -> &str {
        &self.program
    }

    fn extension(&self) -> &str {
        &self.extension
    }

    async fn compile(
        &self,
        markdown: &str,
        expertise: ExpertiseLevel,
    ) -> std::result::Result<Vec<u8>, CompileError> {
        // Removed when dropped, whatever the outcome.
        let scratch = tempfile::Builder::new()
            .prefix("dossier-compile-")
            .tempdir()
            .map_err(|e| CompileError::Io(e.to_string()))?;
        let input = scratch.path().join("report.md");
        let output = scratch.path().join(format!("report.{}", self.extension));
        tokio::fs::write(&input, markdown)
            .await
            .map_err(|e| CompileError::Io(e.to_string()))?;

        let args = self.command_args(&input, &output, expertise);
        debug!(program = %self.program, ?args, "Running document compiler");

        let child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| CompileError::Spawn {
                program: self.program.clone(),
                reason: e.to_string(),
            })?;

        let result = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| CompileError::Timeout {
                timeout_secs: self.timeout.as_secs(),
            })?
            .map_err(|e| CompileError::Io(e.to_string()))?;

        if !result.status.success() {
            return Err(CompileError::Failed {
                status: result.status.code(),
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            });
        }

        let bytes = tokio::fs::read(&output)
            .await
            .map_err(|e| CompileError::Io(format!("compiler produced no output: {e}")))?;
        info!(program = %self.program, bytes = bytes.len(), "Document compiled");
        Ok(bytes)
    }
}

/// Passthrough compiler: the delivered artifact is the markdown itself.
#[derive(Debug, Default)]
pub struct MarkdownCompiler;

#[async_trait]
impl DocumentCompiler for MarkdownCompiler {
    fn name(&self) -> &str {
        "markdown"
    }

    fn extension(&self) -> &str {
        "md"
    }

    async fn compile(
        &self,
        markdown: &str,
        _expertise: ExpertiseLevel,
    ) -> std::result::Result<Vec<u8>, CompileError> {
        Ok(markdown.as_bytes().to_vec())
    }
}
