//! Single-job code execution in a throwaway scratch directory.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;

use crate::error::ExecutorError;
use crate::job::{Job, JobLanguage, JobOutput};

/// Appended to stderr when the deadline kills a job. The coordinator side
/// matches on this text, so it stays fixed even if the deadline is tuned.
const TIMEOUT_MARKER: &str = "Execution timed out after 30 seconds";

/// Runs one job at a time: materialize the source into a scratch
/// directory, spawn the interpreter, capture output under a hard deadline.
///
/// `execute` never fails past its boundary — every failure mode is folded
/// into the returned stdout/stderr pair.
#[derive(Debug, Clone)]
pub struct JobExecutor {
    deadline: Duration,
}

impl JobExecutor {
    pub fn new(deadline: Duration) -> Self {
        Self { deadline }
    }

    /// Execute `job` and return whatever it printed.
    pub async fn execute(&self, job: &Job) -> JobOutput {
        let interpreter = match &job.language {
            JobLanguage::Python => "python3",
            JobLanguage::Javascript => "node",
            JobLanguage::Other(lang) => {
                tracing::warn!(job_id = %job.id, language = %lang, "Unsupported job language");
                return JobOutput::stderr_only(format!("Unsupported language: {lang}"));
            }
        };

        match self.run_in_scratch(interpreter, job).await {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!(job_id = %job.id, error = %e, "Job execution failed");
                JobOutput::stderr_only(format!("Error executing code: {e}"))
            }
        }
    }

    async fn run_in_scratch(
        &self,
        interpreter: &str,
        job: &Job,
    ) -> Result<JobOutput, ExecutorError> {
        // Dropped on every exit path, taking the directory with it.
        let scratch = tempfile::tempdir().map_err(ExecutorError::Scratch)?;
        let source_path = scratch.path().join(&job.filename);

        tokio::fs::write(&source_path, &job.source)
            .await
            .map_err(ExecutorError::WriteSource)?;

        let mut child = Command::new(interpreter)
            .arg(&source_path)
            .current_dir(scratch.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ExecutorError::Spawn {
                interpreter: interpreter.to_string(),
                source: e,
            })?;

        // Readers accumulate concurrently so partial output survives a kill.
        let stdout_task = spawn_reader(child.stdout.take());
        let stderr_task = spawn_reader(child.stderr.take());

        let timed_out = match tokio::time::timeout(self.deadline, child.wait()).await {
            Ok(status) => {
                // A nonzero exit is a normal outcome; stderr tells the story.
                status.map_err(ExecutorError::Wait)?;
                false
            }
            Err(_) => {
                tracing::warn!(job_id = %job.id, "Job hit execution deadline; killing");
                let _ = child.start_kill();
                let _ = child.wait().await;
                true
            }
        };

        let stdout = stdout_task.await.unwrap_or_default();
        let mut stderr = stderr_task.await.unwrap_or_default();

        if timed_out {
            stderr.push('\n');
            stderr.push_str(TIMEOUT_MARKER);
        }

        Ok(JobOutput { stdout, stderr })
    }
}

/// Drain a child pipe to completion on its own task.
fn spawn_reader<R>(pipe: Option<R>) -> JoinHandle<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf).await;
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}
