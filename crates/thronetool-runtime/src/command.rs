use crate::adapter::AdapterOutput;
use crate::RuntimeError;
use std::fmt::Write as _;
use std::process::{Command, Output, Stdio};
use thronetool_schema::AppIdentity;
use tracing::debug;

const MASK: &str = "********";

/// An external command with its arguments, some of which may be secret.
///
/// Secret arguments are passed to the process unchanged but never appear in
/// [`CommandSpec::display`], logs, or diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    program: String,
    args: Vec<String>,
    secret: Vec<usize>,
    allow_failure: bool,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            secret: Vec::new(),
            allow_failure: false,
        }
    }

    pub fn sudo(program: impl Into<String>) -> Self {
        Self::new("sudo").arg(program)
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn secret_arg(mut self, arg: impl Into<String>) -> Self {
        self.secret.push(self.args.len());
        self.args.push(arg.into());
        self
    }

    /// A non-zero exit status is reported but not treated as an error.
    #[must_use]
    pub fn allow_failure(mut self) -> Self {
        self.allow_failure = true;
        self
    }

    pub fn tolerates_failure(&self) -> bool {
        self.allow_failure
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    /// Shell-like rendering with secrets masked.
    pub fn display(&self) -> String {
        let mut out = quote(&self.program);
        for (i, arg) in self.args.iter().enumerate() {
            out.push(' ');
            if self.secret.contains(&i) {
                out.push_str(MASK);
            } else {
                out.push_str(&quote(arg));
            }
        }
        out
    }

    /// Run to completion with stdout and stderr captured. Stdin stays
    /// attached so `sudo` can prompt.
    pub fn output(&self) -> Result<Output, RuntimeError> {
        debug!("exec: {}", self.display());
        Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::inherit())
            .output()
            .map_err(|e| RuntimeError::CommandFailed {
                command: self.display(),
                detail: e.to_string(),
            })
    }

    pub fn run(&self) -> Result<Output, RuntimeError> {
        let output = self.output()?;
        if !output.status.success() && !self.allow_failure {
            return Err(RuntimeError::CommandFailed {
                command: self.display(),
                detail: failure_detail(&output),
            });
        }
        Ok(output)
    }

    /// Stdout of a successful run, `None` if the command could not be
    /// started or exited non-zero.
    pub fn capture(&self) -> Option<String> {
        debug!("probe: {}", self.display());
        let output = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .output()
            .ok()?;
        output
            .status
            .success()
            .then(|| String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

fn quote(s: &str) -> String {
    let plain = !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=%+,@".contains(c));
    if plain {
        s.to_owned()
    } else {
        format!("'{}'", s.replace('\'', r"'\''"))
    }
}

fn failure_detail(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    match (output.status.code(), stderr.is_empty()) {
        (Some(code), true) => format!("exit status {code}"),
        (Some(code), false) => format!("exit status {code}: {stderr}"),
        (None, _) => "terminated by signal".to_owned(),
    }
}

pub fn command_exists(name: &str) -> bool {
    let probe = if cfg!(windows) { "where" } else { "which" };
    Command::new(probe)
        .arg(name)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Accumulated diagnostic text of one adapter operation.
#[derive(Debug, Default)]
pub struct Transcript {
    text: String,
}

impl Transcript {
    pub fn note(&mut self, line: impl AsRef<str>) {
        let _ = writeln!(self.text, "{}", line.as_ref());
    }

    /// Run `cmd`, recording the command line and its output.
    pub fn run(&mut self, cmd: &CommandSpec) -> Result<Output, RuntimeError> {
        self.note(format!("$ {}", cmd.display()));
        let output = cmd.output();
        if let Ok(out) = &output {
            for stream in [&out.stdout, &out.stderr] {
                let text = String::from_utf8_lossy(stream);
                let text = text.trim_end();
                if !text.is_empty() {
                    self.note(text);
                }
            }
        }
        let output = output?;
        if !output.status.success() && !cmd.tolerates_failure() {
            return Err(RuntimeError::CommandFailed {
                command: cmd.display(),
                detail: failure_detail(&output),
            });
        }
        Ok(output)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Turn the outcome of an adapter operation into its public result.
    pub fn finish(
        mut self,
        operation: &'static str,
        app: AppIdentity,
        outcome: Result<(), RuntimeError>,
    ) -> Result<AdapterOutput, RuntimeError> {
        match outcome {
            Ok(()) => Ok(AdapterOutput {
                diagnostics: self.text,
            }),
            Err(e) => {
                self.note(format!("error: {e}"));
                Err(RuntimeError::AdapterFailed {
                    operation,
                    app,
                    diagnostics: self.text.trim_end().to_owned(),
                })
            }
        }
    }
}
