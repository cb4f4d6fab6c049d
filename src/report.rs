//! Side channel for fatal error messages.
//!
//! Reporting is best-effort: a reporter never fails and never blocks the pipeline on a missing
//! clipboard.

use std::io::Write as _;
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex};

/// Receives the human-readable message of a fatal run error.
pub trait FailureReporter {
    fn report(&self, message: &str);
}

/// Drops every message.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopReporter;

impl FailureReporter for NoopReporter {
    fn report(&self, _message: &str) {}
}

/// Records messages in memory. Clones share the same buffer.
#[derive(Clone, Debug, Default)]
pub struct CapturingReporter {
    messages: Arc<Mutex<Vec<String>>>,
}

impl CapturingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        match self.messages.lock() {
            Ok(m) => m.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl FailureReporter for CapturingReporter {
    fn report(&self, message: &str) {
        match self.messages.lock() {
            Ok(mut m) => m.push(message.to_string()),
            Err(poisoned) => poisoned.into_inner().push(message.to_string()),
        }
    }
}

/// One clipboard helper program and its arguments.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClipboardCommand {
    pub program: String,
    pub args: Vec<String>,
    /// Environment variable that must be set for the helper to have a display to talk to.
    pub requires_env: Option<String>,
}

impl ClipboardCommand {
    fn new(program: &str, args: &[&str], requires_env: Option<&str>) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            requires_env: requires_env.map(str::to_string),
        }
    }

    fn usable(&self) -> bool {
        self.requires_env
            .as_deref()
            .is_none_or(|var| std::env::var_os(var).is_some_and(|v| !v.is_empty()))
    }

    fn copy(&self, message: &str) -> std::io::Result<bool> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(message.as_bytes())?;
        }
        Ok(child.wait()?.success())
    }
}

/// Copies the message to the system clipboard through the first helper that works.
#[derive(Clone, Debug)]
pub struct ClipboardReporter {
    commands: Vec<ClipboardCommand>,
}

impl Default for ClipboardReporter {
    fn default() -> Self {
        Self::new(platform_clipboard_commands())
    }
}

impl ClipboardReporter {
    pub fn new(commands: Vec<ClipboardCommand>) -> Self {
        Self { commands }
    }

    /// Try each helper in order; returns whether any succeeded.
    pub fn try_copy(&self, message: &str) -> bool {
        for cmd in self.commands.iter().filter(|c| c.usable()) {
            match cmd.copy(message) {
                Ok(true) => {
                    tracing::debug!(helper = %cmd.program, "copied error message to clipboard");
                    return true;
                }
                Ok(false) => tracing::debug!(helper = %cmd.program, "clipboard helper failed"),
                Err(e) => tracing::debug!(helper = %cmd.program, error = %e, "clipboard helper unavailable"),
            }
        }
        false
    }
}

impl FailureReporter for ClipboardReporter {
    fn report(&self, message: &str) {
        if !self.try_copy(message) {
            tracing::debug!("no clipboard available; error message not copied");
        }
    }
}

fn platform_clipboard_commands() -> Vec<ClipboardCommand> {
    if cfg!(target_os = "macos") {
        vec![ClipboardCommand::new("pbcopy", &[], None)]
    } else if cfg!(windows) {
        vec![ClipboardCommand::new("clip", &[], None)]
    } else {
        vec![
            ClipboardCommand::new("wl-copy", &[], Some("WAYLAND_DISPLAY")),
            ClipboardCommand::new("xclip", &["-selection", "clipboard"], Some("DISPLAY")),
            ClipboardCommand::new("xsel", &["--clipboard", "--input"], Some("DISPLAY")),
        ]
    }
}
