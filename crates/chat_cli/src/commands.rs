use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlashCommand {
    Help,
    Clear,
    Cancel,
    /// `/model` alone reports the current model.
    Model(Option<String>),
    Models,
    Save(Option<PathBuf>),
    Export,
    Load(Option<PathBuf>),
    Quit,
    Unknown(String),
}

pub fn parse_slash_command(input: &str) -> Option<SlashCommand> {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return None;
    }

    let (command, argument) = match trimmed.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, Some(rest.trim()).filter(|rest| !rest.is_empty())),
        None => (trimmed, None),
    };

    let parsed = match command {
        "/help" => SlashCommand::Help,
        "/clear" => SlashCommand::Clear,
        "/cancel" => SlashCommand::Cancel,
        "/model" => SlashCommand::Model(argument.map(ToString::to_string)),
        "/models" => SlashCommand::Models,
        "/save" => SlashCommand::Save(argument.map(PathBuf::from)),
        "/export" => SlashCommand::Export,
        "/load" => SlashCommand::Load(argument.map(PathBuf::from)),
        "/quit" | "/exit" => SlashCommand::Quit,
        _ => SlashCommand::Unknown(command.to_string()),
    };

    Some(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_not_a_command() {
        assert_eq!(parse_slash_command("explain /etc/hosts"), None);
    }

    #[test]
    fn arguments_are_trimmed() {
        assert_eq!(
            parse_slash_command("  /model   mistral  "),
            Some(SlashCommand::Model(Some("mistral".to_string())))
        );
        assert_eq!(parse_slash_command("/model"), Some(SlashCommand::Model(None)));
        assert_eq!(
            parse_slash_command("/load chats/today.json"),
            Some(SlashCommand::Load(Some(PathBuf::from("chats/today.json"))))
        );
    }

    #[test]
    fn unknown_commands_keep_their_name() {
        assert_eq!(
            parse_slash_command("/frobnicate now"),
            Some(SlashCommand::Unknown("/frobnicate".to_string()))
        );
    }
}
