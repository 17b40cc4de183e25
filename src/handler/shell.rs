use std::env;
use std::ffi::CString;

use anyhow::Context;
use tracing::debug;

use crate::handler::{into_variables, HandleCredentials, HandleCredentialsRequest, Variable};

/// Runs a command with the credentials in its environment, replacing the
/// current process.
pub struct ExecCredentialsHandler {
    command: Vec<String>,
}

impl ExecCredentialsHandler {
    pub fn new(command: Vec<String>) -> anyhow::Result<Self> {
        if command.is_empty() {
            anyhow::bail!("no command to execute");
        }
        Ok(ExecCredentialsHandler { command })
    }
}

impl HandleCredentials for ExecCredentialsHandler {
    fn handle_credentials(self, request: HandleCredentialsRequest) -> anyhow::Result<()> {
        set_credentials(request);
        exec(&self.command)
    }
}

fn set_credentials(request: HandleCredentialsRequest) {
    let variables = into_variables(request);
    for Variable { name, value } in variables {
        if let Some(value) = value {
            env::set_var(name, value);
        } else {
            env::remove_var(name);
        }
    }
}

fn exec(command: &[String]) -> anyhow::Result<()> {
    debug!("exec: {:?}", command);

    let args = command
        .iter()
        .map(|arg| CString::new(arg.as_bytes()))
        .collect::<Result<Vec<_>, _>>()
        .context("command contains a NUL byte")?;
    nix::unistd::execvp(&args[0], &args)
        .with_context(|| format!("failed to execute {}", command[0]))?;

    unreachable!("execvp will replace the current process, so never reach this instruction.")
}
