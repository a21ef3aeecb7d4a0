//! Transform stage capability and the subprocess stage runner.

use crate::error::{PipelineError, PipelineResult};
use std::io::{ErrorKind, Read, Write};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// Default bound on how long a single stage process may run.
pub const DEFAULT_STAGE_TIMEOUT: Duration = Duration::from_secs(600);

/// Poll interval while waiting for a stage process to exit.
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Output of one whole-buffer transform stage.
#[derive(Debug)]
pub struct StageOutput {
    /// The transformed bytes.
    pub bytes: Vec<u8>,
    /// Diagnostic text emitted by the stage.
    ///
    /// Callers classify severity: some stages treat any diagnostic as
    /// fatal, others pass it along as advisory.
    pub diagnostics: Vec<String>,
}

/// One whole-buffer external transform.
///
/// The entire input is handed over and the entire output collected before
/// the caller proceeds; stages never stream partial results.
pub trait TransformStage: Send + Sync {
    /// A short name identifying the stage in errors and logs.
    fn name(&self) -> &str;

    /// Runs the transform over the complete input buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if the transform cannot be executed or fails.
    fn run(&self, input: &[u8]) -> PipelineResult<StageOutput>;
}

/// A transform stage backed by an external process.
///
/// The process reads the input buffer on stdin and writes the transformed
/// bytes to stdout; stderr is collected as diagnostics. The child is fed and
/// drained from worker threads so large buffers cannot deadlock on pipe
/// capacity, and it is killed if it outlives the configured deadline.
#[derive(Debug, Clone)]
pub struct CommandStage {
    name: String,
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandStage {
    /// Creates a stage invoking `program` with `args`.
    pub fn new(
        name: impl Into<String>,
        program: impl Into<String>,
        args: Vec<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            args,
            timeout,
        }
    }

    /// The xz compression stage used by the default pipeline.
    #[must_use]
    pub fn xz_compress(timeout: Duration) -> Self {
        Self::new("xz-compress", "xz", vec!["--compress".into()], timeout)
    }

    /// The xz decompression stage used by the default pipeline.
    #[must_use]
    pub fn xz_decompress(timeout: Duration) -> Self {
        Self::new("xz-decompress", "xz", vec!["--decompress".into()], timeout)
    }

    fn tool_failure(&self, message: impl Into<String>) -> PipelineError {
        PipelineError::external_tool(&self.name, message)
    }
}

impl TransformStage for CommandStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, input: &[u8]) -> PipelineResult<StageOutput> {
        tracing::debug!(stage = %self.name, input_len = input.len(), "running stage");

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                if e.kind() == ErrorKind::NotFound {
                    self.tool_failure(format!("executable `{}` not found", self.program))
                } else {
                    PipelineError::Io(e)
                }
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| self.tool_failure("stdin pipe unavailable"))?;
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| self.tool_failure("stdout pipe unavailable"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| self.tool_failure("stderr pipe unavailable"))?;

        let input_owned = input.to_vec();
        let writer = thread::spawn(move || -> std::io::Result<()> {
            // A child that exits before consuming its input closes the pipe.
            match stdin.write_all(&input_owned) {
                Err(e) if e.kind() == ErrorKind::BrokenPipe => Ok(()),
                other => other,
            }
        });
        let out_reader = thread::spawn(move || -> std::io::Result<Vec<u8>> {
            let mut buf = Vec::new();
            stdout.read_to_end(&mut buf)?;
            Ok(buf)
        });
        let err_reader = thread::spawn(move || -> std::io::Result<Vec<u8>> {
            let mut buf = Vec::new();
            stderr.read_to_end(&mut buf)?;
            Ok(buf)
        });

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            match child.try_wait()? {
                Some(status) => break status,
                None if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    let _ = writer.join();
                    let _ = out_reader.join();
                    let _ = err_reader.join();
                    return Err(self.tool_failure(format!(
                        "timed out after {}s",
                        self.timeout.as_secs()
                    )));
                }
                None => thread::sleep(WAIT_POLL_INTERVAL),
            }
        };

        writer
            .join()
            .map_err(|_| self.tool_failure("stdin writer thread panicked"))??;
        let bytes = out_reader
            .join()
            .map_err(|_| self.tool_failure("stdout reader thread panicked"))??;
        let err_bytes = err_reader
            .join()
            .map_err(|_| self.tool_failure("stderr reader thread panicked"))??;

        if !status.success() {
            let detail = String::from_utf8_lossy(&err_bytes);
            return Err(self.tool_failure(format!(
                "exited with {status}: {}",
                detail.trim()
            )));
        }

        let mut diagnostics = Vec::new();
        if !err_bytes.is_empty() {
            diagnostics.push(String::from_utf8_lossy(&err_bytes).into_owned());
        }

        tracing::debug!(
            stage = %self.name,
            output_len = bytes.len(),
            diagnostics = diagnostics.len(),
            "stage complete"
        );
        Ok(StageOutput { bytes, diagnostics })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage(program: &str, args: &[&str]) -> CommandStage {
        CommandStage::new(
            format!("test-{program}"),
            program,
            args.iter().map(|a| (*a).to_string()).collect(),
            Duration::from_secs(10),
        )
    }

    #[test]
    fn cat_echoes_input() {
        let out = stage("cat", &[]).run(b"whole buffer in, whole buffer out").unwrap();
        assert_eq!(out.bytes, b"whole buffer in, whole buffer out");
        assert!(out.diagnostics.is_empty());
    }

    #[test]
    fn cat_handles_large_buffers() {
        // Larger than any OS pipe buffer, to exercise the worker threads.
        let input = vec![0x5Au8; 4 * 1024 * 1024];
        let out = stage("cat", &[]).run(&input).unwrap();
        assert_eq!(out.bytes, input);
    }

    #[test]
    fn cat_handles_empty_input() {
        let out = stage("cat", &[]).run(b"").unwrap();
        assert!(out.bytes.is_empty());
    }

    #[test]
    fn missing_executable_is_tool_failure() {
        let err = stage("chunkfile-no-such-binary", &[]).run(b"x").unwrap_err();
        assert!(matches!(err, PipelineError::ExternalTool { .. }));
    }

    #[test]
    fn nonzero_exit_is_tool_failure() {
        let err = stage("false", &[]).run(b"").unwrap_err();
        match err {
            PipelineError::ExternalTool { message, .. } => {
                assert!(message.contains("exited with"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn hung_process_hits_deadline() {
        let stage = CommandStage::new(
            "test-sleep",
            "sleep",
            vec!["30".into()],
            Duration::from_millis(200),
        );
        let err = stage.run(b"").unwrap_err();
        match err {
            PipelineError::ExternalTool { message, .. } => {
                assert!(message.contains("timed out"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    #[ignore = "requires the xz binary"]
    fn xz_round_trips() {
        let payload = b"compress me through a real xz process".to_vec();
        let compressed = CommandStage::xz_compress(Duration::from_secs(30))
            .run(&payload)
            .unwrap();
        assert_ne!(compressed.bytes, payload);

        let restored = CommandStage::xz_decompress(Duration::from_secs(30))
            .run(&compressed.bytes)
            .unwrap();
        assert_eq!(restored.bytes, payload);
    }
}
