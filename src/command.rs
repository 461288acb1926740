//! Command parsing for inbound chat text.
//!
//! Text looks like `/name[@botname] arg arg ...`. Anything that is not one of
//! the known commands is ignored before it reaches the gates.

/// Known commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Start,
    Add,
    Del,
    List,
    DelAll,
    Fact,
}

impl CommandKind {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "start" => Some(Self::Start),
            "add" => Some(Self::Add),
            "del" => Some(Self::Del),
            "list" => Some(Self::List),
            "delall" => Some(Self::DelAll),
            "fact" => Some(Self::Fact),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Add => "add",
            Self::Del => "del",
            Self::List => "list",
            Self::DelAll => "delall",
            Self::Fact => "fact",
        }
    }

    /// Whether the command is limited to allow-listed chats.
    pub fn is_restricted(self) -> bool {
        matches!(self, Self::Start | Self::Add | Self::Del | Self::DelAll)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub kind: CommandKind,
    pub args: Vec<String>,
}

impl Command {
    /// Parse chat text. Returns `None` for plain text, unknown commands and
    /// commands addressed to a different bot.
    pub fn parse(text: &str, bot_username: Option<&str>) -> Option<Self> {
        let mut words = text.split_whitespace();
        let head = words.next()?.strip_prefix('/')?;

        let name = match head.split_once('@') {
            Some((name, target)) => {
                if let Some(me) = bot_username {
                    if !target.eq_ignore_ascii_case(me) {
                        return None;
                    }
                }
                name
            }
            None => head,
        };

        let kind = CommandKind::from_name(&name.to_ascii_lowercase())?;
        Some(Self {
            kind,
            args: words.map(str::to_string).collect(),
        })
    }

    /// Arguments joined back with single spaces.
    pub fn raw_args(&self) -> String {
        self.args.join(" ")
    }
}
