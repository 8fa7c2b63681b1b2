//! /backend command - show, set or clear the backend URL

use super::CommandResult;
use themis_wire::validate_base_url;

pub struct BackendCommand;

impl BackendCommand {
    pub fn execute(args: &str, current: &str) -> CommandResult {
        if args.is_empty() {
            return CommandResult::Message(format!(
                "Backend: {}\nSet with: /backend <url>, clear with: /backend \"\"",
                current
            ));
        }

        let url = unquote(args);
        if url.is_empty() {
            return CommandResult::SetBackend(None);
        }

        match validate_base_url(url) {
            Ok(url) => CommandResult::SetBackend(Some(url)),
            Err(e) => CommandResult::Message(e.to_string()),
        }
    }
}

fn unquote(s: &str) -> &str {
    let s = s.trim();
    for quote in ['"', '\''] {
        if let Some(inner) = s.strip_prefix(quote).and_then(|s| s.strip_suffix(quote)) {
            return inner.trim();
        }
    }
    s
}
