/// The chat messages the scheduler reacts to. Anything else is ignored so
/// the bot stays quiet in ordinary conversation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    /// `on call` — begin the interactive scheduling flow.
    OnCall,
    /// `view on call` — post the full roster to the channel.
    ViewOnCall,
    /// `view me` — ephemeral view of the sender's own record.
    ViewMe,
    /// `reset on call` — clear the sender's scheduled range immediately.
    ResetOnCall,
    /// `help me schedule` — usage summary.
    Help,
}

/// Exact, case-sensitive match on the trimmed message text. `On Call` or
/// `on  call` deliberately do not trigger anything.
pub fn classify(text: &str) -> Option<Command> {
    match text.trim() {
        "on call" => Some(Command::OnCall),
        "view on call" => Some(Command::ViewOnCall),
        "view me" => Some(Command::ViewMe),
        "reset on call" => Some(Command::ResetOnCall),
        "help me schedule" => Some(Command::Help),
        _ => None,
    }
}
