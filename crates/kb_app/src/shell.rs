use std::path::PathBuf;

/// One line typed at the interactive prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Files,
    Delete(String),
    Upload(Vec<PathBuf>),
    Logout,
    Quit,
    Chat(String),
    /// Blank line or a slash command with missing arguments.
    Nothing,
}

impl ShellCommand {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return ShellCommand::Nothing;
        }
        let (head, rest) = match line.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest.trim()),
            None => (line, ""),
        };
        match head {
            "/files" => ShellCommand::Files,
            "/logout" => ShellCommand::Logout,
            "/quit" | "/exit" => ShellCommand::Quit,
            "/delete" if !rest.is_empty() => ShellCommand::Delete(rest.to_string()),
            "/upload" => {
                let paths: Vec<PathBuf> = rest.split_whitespace().map(PathBuf::from).collect();
                if paths.is_empty() {
                    ShellCommand::Nothing
                } else {
                    ShellCommand::Upload(paths)
                }
            }
            "/delete" => ShellCommand::Nothing,
            _ => ShellCommand::Chat(line.to_string()),
        }
    }
}

pub const HELP: &str = "Type a question to chat. Commands: /files, /delete <name>, /upload <paths...>, /logout, /quit";
