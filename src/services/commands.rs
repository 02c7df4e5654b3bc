//! Chat command surface.

/// Commands recognised in chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatCommand {
    /// `!triviastart`
    Start,
    /// `!triviaend`
    End,
    /// `!next`
    Next,
    /// `!stop`
    Stop,
    /// `!score`
    Score,
    /// `!triviatop3` or `!top3`
    Top3,
    /// `!bonus`
    Bonus,
    /// `!backuptrivia`
    Backup,
    /// `!loadtrivia`
    Load,
}

impl ChatCommand {
    /// Parse a chat line. Whitespace is ignored; tokens are case-sensitive.
    pub fn parse(text: &str) -> Option<Self> {
        let mut token = text.to_owned();
        token.retain(|c| !c.is_whitespace());
        let command = match token.as_str() {
            "!triviastart" => Self::Start,
            "!triviaend" => Self::End,
            "!next" => Self::Next,
            "!stop" => Self::Stop,
            "!score" => Self::Score,
            "!triviatop3" | "!top3" => Self::Top3,
            "!bonus" => Self::Bonus,
            "!backuptrivia" => Self::Backup,
            "!loadtrivia" => Self::Load,
            _ => return None,
        };
        Some(command)
    }

    /// Whether only configured admins may run the command.
    pub fn requires_admin(self) -> bool {
        !matches!(self, Self::Score | Self::Top3)
    }
}
