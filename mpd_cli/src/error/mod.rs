use colored::*;
use std::error::Error as StdError;
use std::fmt;
use std::io;

/// CLI-specific error type with semantic exit codes
#[derive(Debug)]
pub struct CliError {
    /// The main error message
    message: String,

    /// Error category for exit code determination
    category: ErrorCategory,

    /// Additional context information
    context: Vec<(String, String)>,

    /// Suggestions for recovery
    pub suggestions: Vec<String>,

    /// Source error if any
    source: Option<Box<dyn StdError + Send + Sync>>,
}

/// Error categories that map to exit codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ErrorCategory {
    General,
    Config,
    Connection,
    Auth,
    Interrupted,
}

/// Semantic exit codes for the CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    ConfigError = 2,
    ConnectionError = 3,
    AuthError = 4,
    Interrupted = 130,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }
}

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// Extension trait for adding context to errors
pub trait ErrorContext {
    fn with_context(self, key: &str, value: &str) -> Self;
    fn with_suggestion(self, suggestion: &str) -> Self;
    fn with_source(self, source: Box<dyn StdError + Send + Sync>) -> Self;
}

impl CliError {
    fn new(message: &str, category: ErrorCategory) -> Self {
        Self {
            message: message.to_string(),
            category,
            context: Vec::new(),
            suggestions: Vec::new(),
            source: None,
        }
    }

    /// Create a general error
    pub fn general(message: &str) -> Self {
        Self::new(message, ErrorCategory::General)
    }

    /// Create a configuration error
    pub fn config(message: &str) -> Self {
        let mut error = Self::new(message, ErrorCategory::Config);
        error
            .suggestions
            .push("Run 'mpdinfo config list' to inspect the effective configuration".to_string());
        error
    }

    /// Create a connection error
    pub fn connection(message: &str) -> Self {
        let mut error = Self::new(message, ErrorCategory::Connection);
        error.suggestions = vec![
            "Check that MPD is running and listening on TCP".to_string(),
            "Verify the host and port with 'mpdinfo config get connection.host'".to_string(),
        ];
        error
    }

    /// Create an authentication error
    pub fn auth(message: &str) -> Self {
        let mut error = Self::new(message, ErrorCategory::Auth);
        error
            .suggestions
            .push("Pass the password with --pfile <path> or --pprompt".to_string());
        error
    }

    /// The run was stopped by a signal
    pub fn interrupted() -> Self {
        Self::new("Interrupted", ErrorCategory::Interrupted)
    }

    /// Create an error from an IO error
    pub fn from_io_error(error: io::Error, path: &str) -> Self {
        let message = format!("IO error on '{path}': {error}");
        let mut cli_error = Self::general(&message);
        match error.kind() {
            io::ErrorKind::NotFound => cli_error
                .suggestions
                .push("Check if the file or directory exists".to_string()),
            io::ErrorKind::PermissionDenied => {
                cli_error.suggestions.push("Check file permissions".to_string())
            }
            _ => {}
        }

        cli_error.source = Some(Box::new(error));
        cli_error
            .context
            .push(("path".to_string(), path.to_string()));
        cli_error
    }

    /// Get the exit code for this error
    pub fn exit_code(&self) -> ExitCode {
        match self.category {
            ErrorCategory::General => ExitCode::GeneralError,
            ErrorCategory::Config => ExitCode::ConfigError,
            ErrorCategory::Connection => ExitCode::ConnectionError,
            ErrorCategory::Auth => ExitCode::AuthError,
            ErrorCategory::Interrupted => ExitCode::Interrupted,
        }
    }

    fn label(&self) -> &'static str {
        match self.category {
            ErrorCategory::General => "Error",
            ErrorCategory::Config => "Configuration Error",
            ErrorCategory::Connection => "Connection Error",
            ErrorCategory::Auth => "Authentication Error",
            ErrorCategory::Interrupted => "Interrupted",
        }
    }

    /// Format the error for user display
    pub fn format_for_user(&self, debug: bool) -> String {
        let mut output = String::new();

        let prefix = match self.category {
            ErrorCategory::Interrupted => self.label().yellow(),
            _ => self.label().red(),
        };
        output.push_str(&format!("{}: {}\n", prefix, self.message));

        if !self.context.is_empty() {
            output.push_str("\nContext:\n");
            for (key, value) in &self.context {
                output.push_str(&format!("  {}: {}\n", key.bold(), value));
            }
        }

        // Error chain in debug mode
        if debug && let Some(source) = &self.source {
            output.push_str("\nCaused by:\n");
            let mut current: Option<&dyn StdError> = Some(source.as_ref());
            let mut level = 1;

            while let Some(err) = current {
                output.push_str(&format!("  {level}: {err}\n"));
                current = err.source();
                level += 1;
            }
        }

        if !self.suggestions.is_empty() {
            output.push_str("\nSuggestions:\n");
            for suggestion in &self.suggestions {
                output.push_str(&format!("  • {suggestion}\n"));
            }
        }

        output
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.label(), self.message)?;

        for (key, value) in &self.context {
            write!(f, " ({key}: {value})")?;
        }

        Ok(())
    }
}

impl StdError for CliError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl ErrorContext for CliError {
    fn with_context(mut self, key: &str, value: &str) -> Self {
        self.context.push((key.to_string(), value.to_string()));
        self
    }

    fn with_suggestion(mut self, suggestion: &str) -> Self {
        self.suggestions.push(suggestion.to_string());
        self
    }

    fn with_source(mut self, source: Box<dyn StdError + Send + Sync>) -> Self {
        self.source = Some(source);
        self
    }
}

/// Convert anyhow errors to CLI errors
impl From<anyhow::Error> for CliError {
    fn from(error: anyhow::Error) -> Self {
        Self::general(&format!("{error:#}"))
    }
}

impl From<mpd_client_core::ProtocolError> for CliError {
    fn from(error: mpd_client_core::ProtocolError) -> Self {
        let message = error.to_string();
        // ACK 3 is a rejected password
        let rejected = error.requires_auth()
            || matches!(&error, mpd_client_core::ProtocolError::Ack(ack) if ack.code == 3);
        let cli_error = if rejected {
            Self::auth(&message)
        } else {
            Self::connection(&message)
        };
        cli_error.with_source(Box::new(error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mpd_client_core::ProtocolError;
    use mpd_client_core::protocol::AckError;

    #[test]
    fn test_exit_codes() {
        assert_eq!(CliError::general("x").exit_code().code(), 1);
        assert_eq!(CliError::config("x").exit_code().code(), 2);
        assert_eq!(CliError::connection("x").exit_code().code(), 3);
        assert_eq!(CliError::auth("x").exit_code().code(), 4);
        assert_eq!(CliError::interrupted().exit_code().code(), 130);
        assert_eq!(ExitCode::Success.code(), 0);
    }

    #[test]
    fn test_display_includes_context() {
        let err = CliError::general("boom").with_context("path", "/tmp/x");
        assert_eq!(err.to_string(), "Error: boom (path: /tmp/x)");
    }

    #[test]
    fn test_format_for_user_lists_suggestions() {
        let text = CliError::auth("password rejected").format_for_user(false);
        assert!(text.contains("password rejected"));
        assert!(text.contains("--pfile"));
    }

    #[test]
    fn test_debug_shows_source_chain() {
        let err = CliError::from(ProtocolError::PeerClosed);
        assert_eq!(err.exit_code(), ExitCode::ConnectionError);
        let text = err.format_for_user(true);
        assert!(text.contains("Caused by:"));
        assert!(text.contains("Connection closed by MPD server"));
    }

    #[test]
    fn test_protocol_acks_map_to_exit_codes() {
        let ack = |line: &[u8]| ProtocolError::Ack(AckError::parse(line).unwrap());

        let missing = CliError::from(ack(b"ACK [4@0] {status} you don't have permission"));
        assert_eq!(missing.exit_code(), ExitCode::AuthError);
        let wrong = CliError::from(ack(b"ACK [3@0] {password} incorrect password"));
        assert_eq!(wrong.exit_code(), ExitCode::AuthError);
        let unknown = CliError::from(ack(b"ACK [5@0] {foo} unknown command"));
        assert_eq!(unknown.exit_code(), ExitCode::ConnectionError);
    }

    #[test]
    fn test_io_error_keeps_path() {
        let io = io::Error::new(io::ErrorKind::NotFound, "missing");
        let err = CliError::from_io_error(io, "/tmp/pw");
        assert!(err.to_string().contains("/tmp/pw"));
        assert!(err.suggestions.iter().any(|s| s.contains("exists")));
    }
}
