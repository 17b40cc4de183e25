use std::io::Write;

use assume_role_schema::shell::Shell;

use crate::handler::{into_variables, HandleCredentials, HandleCredentialsRequest, Variable};

/// Prints shell statements for `eval "$(assume-role --role ...)"`.
pub struct ExportCredentialsHandler<W> {
    shell: Shell,
    output: W,
}

impl<W: Write> ExportCredentialsHandler<W> {
    pub fn new(shell: Shell, output: W) -> Self {
        ExportCredentialsHandler { shell, output }
    }
}

impl<W: Write> HandleCredentials for ExportCredentialsHandler<W> {
    fn handle_credentials(mut self, request: HandleCredentialsRequest) -> anyhow::Result<()> {
        for variable in into_variables(request) {
            writeln!(self.output, "{}", statement(&self.shell, &variable))?;
        }
        self.output.flush()?;
        Ok(())
    }
}

fn statement(shell: &Shell, variable: &Variable) -> String {
    match (&variable.value, shell.is_fish()) {
        (Some(value), false) => format!("export {}={}", variable.name, quote(value)),
        (None, false) => format!("unset {}", variable.name),
        (Some(value), true) => format!("set -gx {} {};", variable.name, quote_fish(value)),
        (None, true) => format!("set -e {};", variable.name),
    }
}

fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

fn quote_fish(value: &str) -> String {
    format!("'{}'", value.replace('\\', r"\\").replace('\'', r"\'"))
}
