//! External tool invoker: runs one job by launching and monitoring the
//! super-resolution executable.
//!
//! The invoker streams the subprocess's stdout and stderr line by line
//! to a [`JobSink`] while the process runs, then classifies the exit
//! status into a [`JobOutcome`]. Every fault is caught here and
//! converted to an outcome; `run` never propagates an error to the
//! pool.

use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;

use thiserror::Error;

use crate::logging::Severity;
use crate::models::{BatchConfig, Job, JobOutcome};

/// Directory created next to each source file for results.
pub const OUTPUT_DIR_NAME: &str = "super-resolution-output";

/// Suffix appended to the source's base name.
pub const OUTPUT_SUFFIX: &str = "_4K";

/// Fixed output image extension.
pub const OUTPUT_EXTENSION: &str = "png";

/// Faults that can occur while handling a job.
///
/// None of these escape the invoker: `run` converts them into a
/// `Failed` outcome with the fault description.
#[derive(Error, Debug)]
pub enum InvokerError {
    #[error("Failed to launch {tool}: {source}")]
    LaunchFailed {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error in {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not capture {stream} of child process")]
    PipeMissing { stream: &'static str },
}

/// Consumer of a running job's output and log lines.
///
/// Implemented by the batch coordinator; tests use a recording stub.
pub trait JobSink: Send + Sync {
    /// One line of the subprocess's stdout or stderr, as it arrives.
    fn tool_output(&self, job: &Job, line: &str);

    /// A severity-tagged log line about the job's lifecycle.
    fn log(&self, severity: Severity, message: &str);
}

/// Derive the output path for a source file.
///
/// For `D/name.ext` the result is
/// `D/super-resolution-output/name_4K.png`, with spaces in `name`
/// replaced by underscores. Deterministic and injective for distinct
/// (directory, base-name) pairs.
pub fn derive_output_path(source: &Path) -> PathBuf {
    let dir = source.parent().unwrap_or_else(|| Path::new(""));
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().replace(' ', "_"))
        .unwrap_or_else(|| "output".to_string());

    dir.join(OUTPUT_DIR_NAME)
        .join(format!("{}{}.{}", stem, OUTPUT_SUFFIX, OUTPUT_EXTENSION))
}

/// Build a job for one source file from a batch config snapshot.
pub fn job_for_source(source: PathBuf, config: &BatchConfig) -> Job {
    let output = derive_output_path(&source);
    Job {
        source,
        tool: config.tool_path.clone(),
        model: config.model,
        output,
    }
}

/// Run one job to its terminal outcome.
///
/// Blocks the calling worker thread for the job's full lifetime. The
/// precondition check (tool exists) happens before any filesystem or
/// process work; a missing tool yields `Skipped` without launching
/// anything.
pub fn run(job: &Job, sink: &dyn JobSink) -> JobOutcome {
    if !job.tool.exists() {
        sink.log(
            Severity::Error,
            &format!("Tool not found: {}", job.tool.display()),
        );
        return JobOutcome::Skipped {
            reason: format!("tool not found: {}", job.tool.display()),
        };
    }

    match execute(job, sink) {
        Ok(outcome) => outcome,
        Err(e) => {
            sink.log(
                Severity::Error,
                &format!("Error while processing {}: {}", job.source.display(), e),
            );
            JobOutcome::Failed {
                exit_code: -1,
                stderr: e.to_string(),
            }
        }
    }
}

fn execute(job: &Job, sink: &dyn JobSink) -> Result<JobOutcome, InvokerError> {
    // Output directory is created idempotently; concurrent jobs in the
    // same source directory derive distinct filenames.
    if let Some(result_dir) = job.output.parent() {
        std::fs::create_dir_all(result_dir).map_err(|e| InvokerError::Io {
            operation: format!("create {}", result_dir.display()),
            source: e,
        })?;
    }

    sink.log(
        Severity::Command,
        &format!(
            "{} -i {} -o {} -n {}",
            job.tool.display(),
            job.source.display(),
            job.output.display(),
            job.model
        ),
    );

    let mut child = Command::new(&job.tool)
        .arg("-i")
        .arg(&job.source)
        .arg("-o")
        .arg(&job.output)
        .arg("-n")
        .arg(job.model.as_arg())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| InvokerError::LaunchFailed {
            tool: job.tool.display().to_string(),
            source: e,
        })?;

    let stdout = child
        .stdout
        .take()
        .ok_or(InvokerError::PipeMissing { stream: "stdout" })?;
    let stderr = child
        .stderr
        .take()
        .ok_or(InvokerError::PipeMissing { stream: "stderr" })?;

    // Stream both pipes until EOF. Reading to EOF also drains whatever
    // the process buffered before exiting. Lines within one stream keep
    // the order the subprocess produced them.
    let mut stderr_lines = Vec::new();
    thread::scope(|scope| {
        let stderr_reader = scope.spawn(|| {
            let mut lines = Vec::new();
            for line in BufReader::new(stderr).lines() {
                match line {
                    Ok(line) => {
                        sink.tool_output(job, &line);
                        lines.push(line);
                    }
                    Err(_) => break,
                }
            }
            lines
        });

        for line in BufReader::new(stdout).lines() {
            match line {
                Ok(line) => sink.tool_output(job, &line),
                Err(_) => break,
            }
        }

        stderr_lines = stderr_reader.join().unwrap_or_default();
    });

    let status = child.wait().map_err(|e| InvokerError::Io {
        operation: "wait for child".to_string(),
        source: e,
    })?;

    if status.success() {
        Ok(JobOutcome::Succeeded {
            output: job.output.clone(),
        })
    } else {
        Ok(JobOutcome::Failed {
            exit_code: status.code().unwrap_or(-1),
            stderr: stderr_lines.join("\n"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UpscaleModel;
    use parking_lot::Mutex;
    use std::path::PathBuf;

    #[derive(Default)]
    struct RecordingSink {
        output: Mutex<Vec<String>>,
        logs: Mutex<Vec<(Severity, String)>>,
    }

    impl JobSink for RecordingSink {
        fn tool_output(&self, _job: &Job, line: &str) {
            self.output.lock().push(line.to_string());
        }

        fn log(&self, severity: Severity, message: &str) {
            self.logs.lock().push((severity, message.to_string()));
        }
    }

    fn config_with_tool(tool: PathBuf) -> BatchConfig {
        BatchConfig {
            tool_path: tool,
            model: UpscaleModel::RealesrganX4plusAnime,
            max_concurrency: 2,
        }
    }

    #[test]
    fn output_path_derivation() {
        assert_eq!(
            derive_output_path(Path::new("/data/pics/cat.jpg")),
            PathBuf::from("/data/pics/super-resolution-output/cat_4K.png")
        );
    }

    #[test]
    fn output_path_replaces_spaces() {
        assert_eq!(
            derive_output_path(Path::new("/data/a b.png")),
            PathBuf::from("/data/super-resolution-output/a_b_4K.png")
        );
    }

    #[test]
    fn output_path_distinct_for_distinct_sources() {
        let a = derive_output_path(Path::new("/d1/img.png"));
        let b = derive_output_path(Path::new("/d2/img.png"));
        let c = derive_output_path(Path::new("/d1/other.png"));
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn missing_tool_is_skipped_without_side_effects() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("photo.png");
        std::fs::write(&source, b"fake image").unwrap();

        let config = config_with_tool(dir.path().join("no-such-tool"));
        let job = job_for_source(source, &config);

        let sink = RecordingSink::default();
        let outcome = run(&job, &sink);

        assert!(matches!(outcome, JobOutcome::Skipped { .. }));
        // Precondition failure happens before any filesystem work.
        assert!(!dir.path().join(OUTPUT_DIR_NAME).exists());
        assert!(sink.output.lock().is_empty());
    }

    // Process-spawning tests use small shell scripts as the fake tool.
    #[cfg(unix)]
    mod process {
        use super::*;
        use std::os::unix::fs::PermissionsExt;

        fn fake_tool(dir: &Path, body: &str) -> PathBuf {
            let path = dir.join("fake-tool.sh");
            std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
            let mut perms = std::fs::metadata(&path).unwrap().permissions();
            perms.set_mode(0o755);
            std::fs::set_permissions(&path, perms).unwrap();
            path
        }

        #[test]
        fn successful_run_streams_output_and_succeeds() {
            let dir = tempfile::tempdir().unwrap();
            let source = dir.path().join("photo.png");
            std::fs::write(&source, b"fake image").unwrap();

            let tool = fake_tool(dir.path(), "echo 'loading model'\necho 'done'\nexit 0");
            let job = job_for_source(source, &config_with_tool(tool));

            let sink = RecordingSink::default();
            let outcome = run(&job, &sink);

            match outcome {
                JobOutcome::Succeeded { output } => assert_eq!(output, job.output),
                other => panic!("expected success, got {:?}", other),
            }

            let lines = sink.output.lock();
            assert_eq!(lines.as_slice(), ["loading model", "done"]);
            // Output directory was created for the tool to write into.
            assert!(dir.path().join(OUTPUT_DIR_NAME).exists());
        }

        #[test]
        fn tool_receives_expected_arguments() {
            let dir = tempfile::tempdir().unwrap();
            let source = dir.path().join("photo.png");
            std::fs::write(&source, b"fake image").unwrap();

            let tool = fake_tool(dir.path(), "printf '%s\\n' \"$@\"");
            let job = job_for_source(source.clone(), &config_with_tool(tool));

            let sink = RecordingSink::default();
            let outcome = run(&job, &sink);
            assert!(outcome.is_success());

            let lines = sink.output.lock();
            assert_eq!(
                lines.as_slice(),
                [
                    "-i".to_string(),
                    source.display().to_string(),
                    "-o".to_string(),
                    job.output.display().to_string(),
                    "-n".to_string(),
                    "realesrgan-x4plus-anime".to_string(),
                ]
            );
        }

        #[test]
        fn nonzero_exit_captures_stderr() {
            let dir = tempfile::tempdir().unwrap();
            let source = dir.path().join("photo.png");
            std::fs::write(&source, b"fake image").unwrap();

            let tool = fake_tool(dir.path(), "echo 'bad input' >&2\nexit 1");
            let job = job_for_source(source, &config_with_tool(tool));

            let sink = RecordingSink::default();
            let outcome = run(&job, &sink);

            match outcome {
                JobOutcome::Failed { exit_code, stderr } => {
                    assert_eq!(exit_code, 1);
                    assert_eq!(stderr, "bad input");
                }
                other => panic!("expected failure, got {:?}", other),
            }

            // stderr lines were also streamed live.
            assert_eq!(sink.output.lock().as_slice(), ["bad input"]);
        }

        #[test]
        fn launch_fault_converts_to_failed_outcome() {
            let dir = tempfile::tempdir().unwrap();
            let source = dir.path().join("photo.png");
            std::fs::write(&source, b"fake image").unwrap();

            // Exists but is not executable: spawn fails at the OS level.
            let tool = dir.path().join("not-executable");
            std::fs::write(&tool, b"not a program").unwrap();

            let job = job_for_source(source, &config_with_tool(tool));
            let sink = RecordingSink::default();
            let outcome = run(&job, &sink);

            match outcome {
                JobOutcome::Failed { exit_code, stderr } => {
                    assert_eq!(exit_code, -1);
                    assert!(stderr.contains("Failed to launch"));
                }
                other => panic!("expected failure, got {:?}", other),
            }
        }
    }
}
