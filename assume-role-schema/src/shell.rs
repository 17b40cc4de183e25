use std::env;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Login shell flavour, used to pick the syntax of exported variables.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    Unknown(String),
}

impl Shell {
    pub fn from_process_path<P: AsRef<Path>>(process_path: P) -> Option<Shell> {
        let process = process_path.as_ref().file_stem().and_then(|f| f.to_str());
        process.filter(|p| !p.is_empty()).map(|p| match p {
            "bash" | "sh" => Shell::Bash,
            "zsh" => Shell::Zsh,
            "fish" => Shell::Fish,
            _ => Shell::Unknown(p.to_string()),
        })
    }

    /// Detects the shell from `$SHELL`, falling back to bash syntax.
    pub fn from_env() -> Shell {
        env::var_os("SHELL")
            .and_then(|s| Shell::from_process_path(s))
            .unwrap_or(Shell::Bash)
    }

    pub fn is_fish(&self) -> bool {
        matches!(self, Shell::Fish)
    }
}
