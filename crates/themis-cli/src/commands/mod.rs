//! Slash commands for interactive mode

mod backend;
mod status;

pub use backend::BackendCommand;
pub use status::StatusCommand;

use themis_engine::Snapshot;

/// Result of executing a slash command
#[derive(Debug, PartialEq)]
pub enum CommandResult {
    /// Point the session at a new backend and persist it. `None` clears the
    /// saved override.
    SetBackend(Option<String>),
    /// Show a message to the user (not sent to the backend)
    Message(String),
    /// Exit the application
    Exit,
    /// Unknown command
    Unknown(String),
}

/// Parse and execute a slash command
pub fn execute_command(
    input: &str,
    current_backend: &str,
    snapshot: &Snapshot,
) -> Option<CommandResult> {
    let input = input.trim();
    let rest = input.strip_prefix('/')?;

    let mut parts = rest.splitn(2, ' ');
    let command = parts.next().unwrap_or("").to_lowercase();
    let args = parts.next().map(str::trim).unwrap_or("");

    Some(match command.as_str() {
        "help" | "h" | "?" => CommandResult::Message(help_message()),

        "quit" | "exit" | "q" => CommandResult::Exit,

        "backend" | "b" => BackendCommand::execute(args, current_backend),

        "status" | "s" => StatusCommand::execute(snapshot, current_backend),

        _ => CommandResult::Unknown(command),
    })
}

fn help_message() -> String {
    r#"Available commands:
  /help, /h, /?         Show this help message
  /backend, /b [url]    Show or set the backend URL (saved to config)
  /status, /s           Show request state and stream diagnostics
  /quit, /exit, /q      Exit themis

Examples:
  /backend                            Show the backend in use
  /backend https://research.local     Switch backend
  /backend ""                         Clear the saved override

Ctrl-C aborts a running request."#
        .to_string()
}
