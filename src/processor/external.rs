//! Signal processor adapter: renders an operation into a temporary file next to its
//! destination, then promotes it with a same-filesystem rename.
//!
//! The temporary file is deleted on every failure path, so a failed call leaves the
//! source byte-identical and no stray files behind.

use super::ProcessingResult;
use crate::error::{AudioError, AudioResult};
use log::{debug, info, warn};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::Builder;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Audio rewrite requested from a processor
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operation {
    /// Change playback speed by a percentage (pitch follows tempo)
    SpeedShift {
        /// Rate change, negative slows down
        percent: f64,
    },
    /// Apply a fixed gain
    Amplify {
        /// Gain in decibels
        gain_db: f64,
    },
}

impl Operation {
    /// Short label for logs
    pub fn label(&self) -> String {
        match self {
            Operation::SpeedShift { percent } => format!("speed {:+.2}%", percent),
            Operation::Amplify { gain_db } => format!("gain {:+.2} dB", gain_db),
        }
    }
}

/// Where the rendered audio ends up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputMode {
    /// Atomically replace the source file
    ReplaceInPlace,
    /// Promote the result to a new path, leaving the source alone
    ProduceNew(PathBuf),
}

/// Render into a temporary file beside `destination`, then rename it into place.
///
/// `render` receives the temporary path. If it fails, the temporary file is removed
/// and `destination` is not touched. The promoted file takes the permissions of
/// `like`, which is usually the source being rewritten.
pub fn write_via_temp<F>(destination: &Path, like: &Path, render: F) -> AudioResult<()>
where
    F: FnOnce(&Path) -> AudioResult<()>,
{
    let permissions = fs::metadata(like)?.permissions();
    let dir = match destination.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let temp = Builder::new()
        .prefix(".vinyl-split-")
        .suffix(".wav")
        .tempfile_in(dir)?;

    render(temp.path())?;
    fs::set_permissions(temp.path(), permissions)?;
    temp.persist(destination)?;
    debug!("Promoted temporary output to {}", destination.display());
    Ok(())
}

/// A backend able to render an [`Operation`]
pub trait SignalProcessor {
    /// Backend name for diagnostics
    fn name(&self) -> &str;

    /// Render `operation` applied to `source` into `target`, which already exists and is empty
    fn render(&self, source: &Path, target: &Path, operation: &Operation) -> AudioResult<()>;

    /// Apply `operation` to `source` using the temp-file-then-rename protocol
    fn apply(&self, source: &Path, operation: &Operation, mode: &OutputMode) -> ProcessingResult {
        let destination = match mode {
            OutputMode::ReplaceInPlace => source.to_path_buf(),
            OutputMode::ProduceNew(target) if target.as_path() == source => {
                return ProcessingResult::failed(format!(
                    "Refusing to produce {} over its own source",
                    target.display()
                ));
            }
            OutputMode::ProduceNew(target) => target.clone(),
        };

        info!(
            "{}: {} on {}",
            self.name(),
            operation.label(),
            source.display()
        );
        match write_via_temp(&destination, source, |temp| self.render(source, temp, operation)) {
            Ok(()) => ProcessingResult::ok(
                Some(destination),
                format!("{} applied by {}", operation.label(), self.name()),
            ),
            Err(e) => {
                warn!("{} failed on {}: {}", self.name(), source.display(), e);
                ProcessingResult::from_error(&operation.label(), &e)
            }
        }
    }
}

/// Captured result of an external process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    /// Exit code, `None` when terminated by a signal
    pub code: Option<i32>,
    /// Captured standard output
    pub stdout: String,
    /// Captured standard error
    pub stderr: String,
}

impl ToolOutput {
    /// True for a zero exit code
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Substitute `{name}` placeholders in every argument
pub fn expand_template(template: &[String], values: &[(&str, String)]) -> Vec<String> {
    template
        .iter()
        .map(|arg| {
            values.iter().fold(arg.clone(), |acc, (key, value)| {
                acc.replace(&format!("{{{}}}", key), value)
            })
        })
        .collect()
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut text = String::new();
        if let Some(mut pipe) = pipe {
            let mut bytes = Vec::new();
            if pipe.read_to_end(&mut bytes).is_ok() {
                text = String::from_utf8_lossy(&bytes).into_owned();
            }
        }
        text
    })
}

/// Run `args[0]` with the remaining arguments, capturing output.
///
/// Blocks until the process exits or `timeout` elapses; on expiry the process is
/// killed and [`AudioError::Timeout`] is returned.
pub fn run_tool(args: &[String], timeout: Duration) -> AudioResult<ToolOutput> {
    let (program, rest) = args
        .split_first()
        .ok_or_else(|| AudioError::ConfigError("Empty command template".to_string()))?;

    debug!("Running {:?}", args);
    let mut child = Command::new(program)
        .args(rest)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let started = Instant::now();
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if started.elapsed() >= timeout {
            let _ = child.kill();
            let _ = child.wait();
            return Err(AudioError::Timeout {
                tool: program.clone(),
                seconds: timeout.as_secs_f64(),
            });
        }
        thread::sleep(POLL_INTERVAL);
    };

    Ok(ToolOutput {
        code: status.code(),
        stdout: stdout.join().unwrap_or_default(),
        stderr: stderr.join().unwrap_or_default(),
    })
}

/// Signal processor that shells out to command line tools such as `sox`.
///
/// Templates may use `{source}`, `{target}`, `{percent}`, `{factor}` and `{gain_db}`.
#[derive(Debug, Clone)]
pub struct ExternalProcessor {
    speed_command: Vec<String>,
    gain_command: Vec<String>,
    timeout: Duration,
}

impl ExternalProcessor {
    /// Create a processor from argument templates
    pub fn new(speed_command: Vec<String>, gain_command: Vec<String>, timeout: Duration) -> Self {
        ExternalProcessor {
            speed_command,
            gain_command,
            timeout,
        }
    }

    /// Concrete argument list for `operation`
    pub fn command_for(&self, source: &Path, target: &Path, operation: &Operation) -> Vec<String> {
        let mut values = vec![
            ("source", source.display().to_string()),
            ("target", target.display().to_string()),
        ];
        let template = match operation {
            Operation::SpeedShift { percent } => {
                values.push(("percent", format!("{:.2}", percent)));
                values.push(("factor", format!("{:.6}", 1.0 + percent / 100.0)));
                &self.speed_command
            }
            Operation::Amplify { gain_db } => {
                values.push(("gain_db", format!("{:.2}", gain_db)));
                &self.gain_command
            }
        };
        expand_template(template, &values)
    }
}

impl SignalProcessor for ExternalProcessor {
    fn name(&self) -> &str {
        "external"
    }

    fn render(&self, source: &Path, target: &Path, operation: &Operation) -> AudioResult<()> {
        let args = self.command_for(source, target, operation);
        let output = run_tool(&args, self.timeout)?;

        if !output.success() {
            return Err(AudioError::ExternalTool {
                tool: args.first().cloned().unwrap_or_default(),
                code: output.code,
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(())
    }
}
