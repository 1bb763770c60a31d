//! Command execution delegates.
//!
//! Every side effect a builder performs (tool invocations, `mkdir -p`, `cp`)
//! goes through a [`Runner`]. Two implementations are provided:
//!
//! | Runner | Executes | `dry_run()` |
//! |--------|----------|-------------|
//! | [`ShellRunner`] | yes, blocking until exit | `false` |
//! | [`PrintOnlyRunner`] | no, records and optionally prints | `true` |
//!
//! Builders skip host-side validation when the runner is a dry run, since no
//! filesystem mutation will actually happen.

use std::io::Write;
use std::path::PathBuf;
use std::process::Command;
use std::sync::Mutex;

use crate::types::BuildError;

/// Executes (or records) a single command with a human-readable title.
pub trait Runner: Send + Sync {
    /// Whether this runner only records commands.
    fn dry_run(&self) -> bool;

    /// Runs `cmd` (program followed by arguments) to completion.
    fn run(&self, cmd: &[String], title: Option<&str>) -> Result<(), BuildError>;
}

/// Renders a command line the way a shell user would type it.
pub fn render_command(cmd: &[String]) -> String {
    shlex::try_join(cmd.iter().map(String::as_str)).unwrap_or_else(|_| cmd.join(" "))
}

/// Runs commands as child processes.
#[derive(Debug, Clone, Default)]
pub struct ShellRunner {
    current_dir: Option<PathBuf>,
}

impl ShellRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs every command from `dir` instead of the process working directory.
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }
}

impl Runner for ShellRunner {
    fn dry_run(&self) -> bool {
        false
    }

    fn run(&self, cmd: &[String], title: Option<&str>) -> Result<(), BuildError> {
        let rendered = render_command(cmd);
        let title = title.unwrap_or(&rendered);
        tracing::info!("{}", title);
        tracing::debug!("Executing: {}", rendered);

        let Some((program, args)) = cmd.split_first() else {
            return Err(BuildError::Command {
                title: title.to_string(),
                command: String::new(),
                detail: "empty command line".to_string(),
            });
        };

        let mut command = Command::new(program);
        command.args(args);
        if let Some(dir) = &self.current_dir {
            command.current_dir(dir);
        }

        let output = command.output().map_err(|e| BuildError::Command {
            title: title.to_string(),
            command: rendered.clone(),
            detail: format!(
                "Error: {}\n\nEnsure the tool is installed and available on PATH.",
                e
            ),
        })?;

        for line in String::from_utf8_lossy(&output.stdout).lines() {
            tracing::debug!("{}", line);
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BuildError::Command {
                title: title.to_string(),
                command: rendered,
                detail: format!("Exit status: {}\n\nStderr:\n{}", output.status, stderr),
            });
        }
        Ok(())
    }
}

/// A command captured by [`PrintOnlyRunner`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCommand {
    pub title: Option<String>,
    pub args: Vec<String>,
}

/// Records commands instead of running them.
///
/// When constructed with a writer, each command is also written out as a
/// shell-script fragment: a `# title` comment followed by the command line.
///
/// # Example
///
/// ```
/// use matterbuild_sdk::runner::{PrintOnlyRunner, Runner};
///
/// let runner = PrintOnlyRunner::new();
/// runner.run(&["ninja".into(), "-C".into(), "out".into()], Some("Building")).unwrap();
/// assert_eq!(runner.commands()[0].args, vec!["ninja", "-C", "out"]);
/// assert!(runner.dry_run());
/// ```
#[derive(Default)]
pub struct PrintOnlyRunner {
    commands: Mutex<Vec<RecordedCommand>>,
    output: Option<Mutex<Box<dyn Write + Send>>>,
}

impl PrintOnlyRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also writes each command as a script fragment to `output`.
    pub fn with_output(output: impl Write + Send + 'static) -> Self {
        Self {
            commands: Mutex::new(Vec::new()),
            output: Some(Mutex::new(Box::new(output))),
        }
    }

    /// Commands recorded so far, in order.
    pub fn commands(&self) -> Vec<RecordedCommand> {
        self.commands
            .lock()
            .map(|c| c.clone())
            .unwrap_or_default()
    }
}

impl std::fmt::Debug for PrintOnlyRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrintOnlyRunner")
            .field("commands", &self.commands())
            .field("has_output", &self.output.is_some())
            .finish()
    }
}

impl Runner for PrintOnlyRunner {
    fn dry_run(&self) -> bool {
        true
    }

    fn run(&self, cmd: &[String], title: Option<&str>) -> Result<(), BuildError> {
        if let Some(output) = &self.output {
            let mut out = output
                .lock()
                .map_err(|_| std::io::Error::other("dry-run output lock poisoned"))?;
            if let Some(title) = title {
                writeln!(out, "# {}", title)?;
            }
            writeln!(out, "{}\n", render_command(cmd))?;
        }

        if let Ok(mut commands) = self.commands.lock() {
            commands.push(RecordedCommand {
                title: title.map(str::to_string),
                args: cmd.to_vec(),
            });
        }
        Ok(())
    }
}
