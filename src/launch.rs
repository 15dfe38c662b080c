use std::fmt;
use std::path::PathBuf;
use std::process::{Command, Stdio};

/// A program plus the positional arguments for one repetition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// What one finished child process left behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedRun {
    pub success: bool,
    /// `None` when the child was killed by a signal.
    pub code: Option<i32>,
    pub stdout: String,
}

impl CapturedRun {
    pub fn status_text(&self) -> String {
        match self.code {
            Some(code) => format!("exit code {}", code),
            None => "no exit code (terminated by signal)".to_string(),
        }
    }
}

pub trait Launcher {
    fn launch(&self, invocation: &Invocation) -> std::io::Result<CapturedRun>;
}

/// Runs the program as a real child process and blocks until it exits.
///
/// Stdout is captured; stderr goes straight to ours.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandLauncher;

impl Launcher for CommandLauncher {
    fn launch(&self, invocation: &Invocation) -> std::io::Result<CapturedRun> {
        let output = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()?
            .wait_with_output()?;

        Ok(CapturedRun {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        })
    }
}
