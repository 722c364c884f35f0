use std::ffi::OsString;
use std::io::{self, Read};
use std::process::{Command, ExitStatus, Stdio};

use crate::error::{PluginError, Result};
use crate::model::config::RuntimeConfig;
use crate::model::mode::ShellMode;
use crate::plugin::embedded::EmbeddedStrategy;
use crate::plugin::manifest::{PluginFile, PluginKind};

/// What a single plugin run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub output: String,
    pub succeeded: bool,
}

impl ExecutionResult {
    pub fn succeeded(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            succeeded: true,
        }
    }

    pub fn failed(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            succeeded: false,
        }
    }
}

/// Runs one kind of plugin.
///
/// A strategy returns `Ok` with `succeeded == false` when the plugin itself
/// failed (non-zero exit), and `Err` when it could not be run at all.
pub trait ExecutionStrategy {
    fn kind(&self) -> PluginKind;

    fn execute(&self, plugin: &PluginFile, args: &[String]) -> Result<ExecutionResult>;
}

/// Runs a plugin file through an external interpreter: `python <path>`.
#[derive(Debug, Clone)]
pub struct InterpreterStrategy {
    program: OsString,
}

impl InterpreterStrategy {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl ExecutionStrategy for InterpreterStrategy {
    fn kind(&self) -> PluginKind {
        PluginKind::ExternalInterpreter
    }

    fn execute(&self, plugin: &PluginFile, _args: &[String]) -> Result<ExecutionResult> {
        let mut command = Command::new(&self.program);
        command.arg(&plugin.path);

        captured(command).map_err(|err| spawn_failed(plugin, &self.program, err))
    }
}

/// Runs a script through the shell host:
/// `powershell -ExecutionPolicy Bypass -File <path> [args...]`.
#[derive(Debug, Clone)]
pub struct ShellStrategy {
    program: OsString,
    mode: ShellMode,
}

impl ShellStrategy {
    pub fn new(program: impl Into<OsString>, mode: ShellMode) -> Self {
        Self {
            program: program.into(),
            mode,
        }
    }

    fn command(&self, plugin: &PluginFile, args: &[String]) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(["-ExecutionPolicy", "Bypass", "-File"])
            .arg(&plugin.path)
            .args(args);
        command
    }
}

impl ExecutionStrategy for ShellStrategy {
    fn kind(&self) -> PluginKind {
        PluginKind::Shell
    }

    fn execute(&self, plugin: &PluginFile, args: &[String]) -> Result<ExecutionResult> {
        let mut command = self.command(plugin, args);
        tracing::debug!(mode = self.mode.label(), "starting shell host");

        match self.mode {
            ShellMode::Captured => {
                captured(command).map_err(|err| spawn_failed(plugin, &self.program, err))
            }
            ShellMode::Interactive => {
                // stdio is inherited, so there is nothing to capture.
                let status = command
                    .status()
                    .map_err(|err| spawn_failed(plugin, &self.program, err))?;
                Ok(ExecutionResult {
                    output: String::new(),
                    succeeded: status.success(),
                })
            }
        }
    }
}

/// Picks the strategy for a plugin's kind and runs it.
///
/// Each call is independent: no state survives between runs.
pub struct Dispatcher {
    embedded: EmbeddedStrategy,
    interpreter: InterpreterStrategy,
    shell: ShellStrategy,
}

impl Dispatcher {
    pub fn new(config: &RuntimeConfig) -> Self {
        Self {
            embedded: EmbeddedStrategy,
            interpreter: InterpreterStrategy::new(&config.python),
            shell: ShellStrategy::new(&config.shell, config.shell_mode),
        }
    }

    pub fn with_shell_mode(mut self, mode: ShellMode) -> Self {
        self.shell.mode = mode;
        self
    }

    fn strategy_for(&self, kind: PluginKind) -> Option<&dyn ExecutionStrategy> {
        match kind {
            PluginKind::Embedded => Some(&self.embedded),
            PluginKind::ExternalInterpreter => Some(&self.interpreter),
            PluginKind::Shell => Some(&self.shell),
            PluginKind::Unsupported => None,
        }
    }

    /// Run a plugin. Any failure comes back as an error; none of them are fatal.
    pub fn run(&self, plugin: &PluginFile, args: &[String]) -> Result<ExecutionResult> {
        let Some(strategy) = self.strategy_for(plugin.kind) else {
            tracing::warn!(plugin = %plugin.name(), "unsupported plugin type");
            return Err(PluginError::UnsupportedKind {
                path: plugin.path.clone(),
            });
        };

        tracing::info!(
            plugin = %plugin.name(),
            kind = strategy.kind().label(),
            args = args.len(),
            "dispatching plugin"
        );

        let result = strategy.execute(plugin, args).inspect_err(|err| {
            tracing::warn!(plugin = %plugin.name(), error = %err, "plugin run failed");
        })?;

        if !result.succeeded {
            tracing::warn!(
                plugin = %plugin.name(),
                output = %result.output,
                "plugin exited unsuccessfully"
            );
            return Err(PluginError::ExecutionFailed {
                plugin: plugin.name(),
                detail: "non-zero exit status".to_string(),
                result,
            });
        }

        tracing::info!(plugin = %plugin.name(), "plugin completed");
        Ok(result)
    }
}

/// Runs `command` with stdout and stderr on one pipe, so the captured text
/// keeps the order the child wrote it in. Lossily decoded.
fn captured(command: Command) -> io::Result<ExecutionResult> {
    let (raw, status) = merged_output(command)?;

    Ok(ExecutionResult {
        output: String::from_utf8_lossy(&raw).into_owned(),
        succeeded: status.success(),
    })
}

fn merged_output(mut command: Command) -> io::Result<(Vec<u8>, ExitStatus)> {
    let (mut reader, writer) = io::pipe()?;
    command
        .stdin(Stdio::null())
        .stdout(writer.try_clone()?)
        .stderr(writer);

    let mut child = command.spawn()?;
    // Close the parent's write ends, or the read below never sees EOF.
    drop(command);

    let mut raw = Vec::new();
    let read = reader.read_to_end(&mut raw);
    let status = child.wait()?;
    read?;

    Ok((raw, status))
}

fn spawn_failed(plugin: &PluginFile, program: &OsString, err: std::io::Error) -> PluginError {
    PluginError::ExecutionFailed {
        plugin: plugin.name(),
        detail: format!("failed to run {}: {err}", program.to_string_lossy()),
        result: ExecutionResult::failed(String::new()),
    }
}
