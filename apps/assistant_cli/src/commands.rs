//! Terminal input parsed into controller operations.

use std::path::PathBuf;

use shared::domain::{AnswerMode, FileId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCommand {
    Ask(String),
    Mode(AnswerMode),
    Add(Vec<PathBuf>),
    Remove(FileId),
    Files,
    Cancel,
    Health,
    Help,
    Quit,
    Invalid(String),
}

pub const HELP: &str = "\
Type a question to ask it. Commands:
  /mode <concise|five-mark|ten-mark>  choose the answer shape for the next question
  /add <path>...                      upload notes (PDF only)
  /remove <id>                        stop tracking an upload
  /files                              list uploads
  /cancel                             abandon the pending answer
  /health                             ping the answer backend
  /help                               show this help
  /quit                               leave";

pub fn parse_command(line: &str) -> HostCommand {
    let line = line.trim();
    let Some(rest) = line.strip_prefix('/') else {
        return HostCommand::Ask(line.to_string());
    };

    let mut parts = rest.split_whitespace();
    let name = parts.next().unwrap_or_default().to_ascii_lowercase();
    let args: Vec<&str> = parts.collect();

    match name.as_str() {
        "mode" => match args.as_slice() {
            [mode] => match mode.parse() {
                Ok(mode) => HostCommand::Mode(mode),
                Err(err) => HostCommand::Invalid(err.to_string()),
            },
            _ => HostCommand::Invalid("usage: /mode <concise|five-mark|ten-mark>".into()),
        },
        "add" | "upload" if !args.is_empty() => {
            HostCommand::Add(args.iter().copied().map(PathBuf::from).collect())
        }
        "add" | "upload" => HostCommand::Invalid("usage: /add <path>...".into()),
        "remove" | "rm" => match args.as_slice() {
            [id] => match id.parse() {
                Ok(id) => HostCommand::Remove(id),
                Err(_) => HostCommand::Invalid(format!("not a file id: {id}")),
            },
            _ => HostCommand::Invalid("usage: /remove <id>".into()),
        },
        "files" | "ls" => HostCommand::Files,
        "cancel" => HostCommand::Cancel,
        "health" => HostCommand::Health,
        "help" | "?" => HostCommand::Help,
        "quit" | "exit" | "q" => HostCommand::Quit,
        other => HostCommand::Invalid(format!("unknown command /{other}; try /help")),
    }
}
