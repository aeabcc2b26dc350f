//! Where the MPD password comes from

use crate::error::{CliError, CliResult};
use crate::terminal;
use dialoguer::Password;
use log::debug;
use mpd_client_core::SecureString;
use std::fs;
use std::path::{Path, PathBuf};

/// Password source chosen on the command line or in the config
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PasswordSource {
    /// No password available; an auth request is an error
    None,
    /// First line of a file
    File(PathBuf),
    /// Ask on the terminal
    Prompt,
}

impl PasswordSource {
    /// `--pprompt` wins over `--pfile`, which wins over the config
    pub fn select(prompt: bool, file: Option<PathBuf>) -> Self {
        match (prompt, file) {
            (true, _) => Self::Prompt,
            (false, Some(path)) => Self::File(path),
            (false, None) => Self::None,
        }
    }

    /// Fetch the password
    pub fn resolve(&self) -> CliResult<SecureString> {
        match self {
            Self::None => Err(CliError::auth("MPD requires a password but none was given")),
            Self::File(path) => read_password_file(path),
            Self::Prompt => prompt_password(),
        }
    }
}

/// Read the first line of `path`, without its line ending
pub fn read_password_file(path: &Path) -> CliResult<SecureString> {
    debug!("Reading password from {}", path.display());
    let contents = fs::read_to_string(path)
        .map_err(|e| CliError::from_io_error(e, &path.display().to_string()))?;
    let password = SecureString::from_file_contents(&contents);
    // Zeroes the whole buffer on drop
    drop(SecureString::from(contents));

    if password.is_empty() {
        return Err(CliError::auth(&format!(
            "Password file {} is empty",
            path.display()
        )));
    }
    Ok(password)
}

fn prompt_password() -> CliResult<SecureString> {
    if !terminal::can_prompt() {
        return Err(CliError::auth("Cannot prompt for a password without a terminal"));
    }
    let password = Password::new()
        .with_prompt("MPD password")
        .interact()
        .map_err(|e| CliError::auth(&format!("Failed to read password: {e}")))?;
    Ok(SecureString::new(password))
}
