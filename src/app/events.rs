/// Inputs to the main loop other than controller events.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// A line typed at the prompt
    Input(String),
    /// stdin reached end of file
    InputClosed,
    /// One second of simulated playback (`--dry-run` only)
    Tick,
}
