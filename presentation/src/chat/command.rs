//! Parsing of REPL input lines.

use std::path::PathBuf;

/// One line of REPL input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    /// Plain text: start a round by broadcasting it
    Broadcast(String),
    Vulnerability,
    Judgment,
    Reflection,
    Select(String),
    Status,
    Timeline,
    Reset,
    Load(PathBuf),
    Enable(String),
    Disable(String),
    /// Verify hash chains, of one agent or all
    Integrity(Option<String>),
    /// Rewrite an agent's log with a fresh chain
    Rebuild(String),
    Help,
    Quit,
}

impl ReplCommand {
    /// Parse a trimmed, non-empty input line. Errors carry the message to
    /// show the user.
    pub fn parse(line: &str) -> Result<Self, String> {
        let line = line.trim();
        let Some(command) = line.strip_prefix('/') else {
            return Ok(ReplCommand::Broadcast(line.to_string()));
        };
        let (name, arg) = match command.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (command, ""),
        };

        match name {
            "vuln" | "vulnerability" => Ok(ReplCommand::Vulnerability),
            "judge" | "judgment" => Ok(ReplCommand::Judgment),
            "reflect" | "reflection" => Ok(ReplCommand::Reflection),
            "select" => {
                if arg.is_empty() {
                    Err("Usage: /select <harmonizer>".to_string())
                } else {
                    Ok(ReplCommand::Select(arg.to_string()))
                }
            }
            "status" => Ok(ReplCommand::Status),
            "timeline" | "history" => Ok(ReplCommand::Timeline),
            "reset" => Ok(ReplCommand::Reset),
            "load" => {
                if arg.is_empty() {
                    Err("Usage: /load <directory>".to_string())
                } else {
                    Ok(ReplCommand::Load(PathBuf::from(arg)))
                }
            }
            "enable" => required(arg, "/enable <agent>").map(ReplCommand::Enable),
            "disable" => required(arg, "/disable <agent>").map(ReplCommand::Disable),
            "integrity" | "verify" => Ok(ReplCommand::Integrity(
                (!arg.is_empty()).then(|| arg.to_string()),
            )),
            "rebuild" => required(arg, "/rebuild <agent>").map(ReplCommand::Rebuild),
            "help" | "h" | "?" => Ok(ReplCommand::Help),
            "quit" | "exit" | "q" => Ok(ReplCommand::Quit),
            other => Err(format!(
                "Unknown command: /{}\nType /help for available commands",
                other
            )),
        }
    }
}

fn required(arg: &str, usage: &str) -> Result<String, String> {
    if arg.is_empty() {
        Err(format!("Usage: {}", usage))
    } else {
        Ok(arg.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_broadcasts() {
        assert_eq!(
            ReplCommand::parse("  Is P = NP?  "),
            Ok(ReplCommand::Broadcast("Is P = NP?".into()))
        );
    }

    #[test]
    fn test_commands_with_arguments() {
        assert_eq!(
            ReplCommand::parse("/select  judge one"),
            Ok(ReplCommand::Select("judge one".into()))
        );
        assert_eq!(
            ReplCommand::parse("/load ./old-logs"),
            Ok(ReplCommand::Load(PathBuf::from("./old-logs")))
        );
        assert!(ReplCommand::parse("/select").is_err());
        assert!(ReplCommand::parse("/load   ").is_err());
    }

    #[test]
    fn test_agent_commands() {
        assert_eq!(
            ReplCommand::parse("/disable gpt"),
            Ok(ReplCommand::Disable("gpt".into()))
        );
        assert_eq!(
            ReplCommand::parse("/enable gpt "),
            Ok(ReplCommand::Enable("gpt".into()))
        );
        assert_eq!(
            ReplCommand::parse("/integrity"),
            Ok(ReplCommand::Integrity(None))
        );
        assert_eq!(
            ReplCommand::parse("/verify claude"),
            Ok(ReplCommand::Integrity(Some("claude".into())))
        );
        assert_eq!(
            ReplCommand::parse("/rebuild claude"),
            Ok(ReplCommand::Rebuild("claude".into()))
        );
        assert_eq!(
            ReplCommand::parse("/rebuild"),
            Err("Usage: /rebuild <agent>".to_string())
        );
        assert!(ReplCommand::parse("/enable").is_err());
    }

    #[test]
    fn test_aliases_and_unknown() {
        assert_eq!(ReplCommand::parse("/q"), Ok(ReplCommand::Quit));
        assert_eq!(ReplCommand::parse("/vuln"), Ok(ReplCommand::Vulnerability));
        assert_eq!(ReplCommand::parse("/judge"), Ok(ReplCommand::Judgment));
        assert!(ReplCommand::parse("/models").unwrap_err().contains("/models"));
    }
}
