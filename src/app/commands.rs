use fuzzy_matcher::{skim::SkimMatcherV2, FuzzyMatcher};
use thiserror::Error;

/// Command names in resolution order: an ambiguous prefix picks the
/// earliest entry.
pub const COMMAND_NAMES: &[&str] = &[
    "play", "pause", "next", "prev", "search", "seek", "status", "shuffle", "tag", "tags",
    "popular", "latest", "repeat", "random", "vol", "quit", "queue", "help", "history", "jump",
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SeekTarget {
    Seconds(f64),
    Percent(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Search(String),
    Tag(String),
    Tags,
    Popular,
    Latest,
    Random,
    /// 1-based row of the last listing; bare `play` resumes
    Play(Option<usize>),
    Pause,
    Next,
    Prev,
    /// 1-based queue position, independent of the last listing
    Jump(usize),
    Seek(SeekTarget),
    Volume(i32),
    Shuffle,
    Repeat,
    Queue,
    History,
    Status,
    Help,
    Quit,
}

#[derive(Error, Debug, PartialEq)]
pub enum CommandError {
    #[error("type a command, or `help`")]
    Empty,

    #[error("unknown command `{0}`")]
    Unknown(String),

    #[error("`{0}` needs an argument")]
    MissingArgument(&'static str),

    #[error("`{command}` cannot use `{value}`")]
    InvalidArgument { command: &'static str, value: String },
}

/// Map a typed word to a command name: exact, then prefix, then the best
/// fuzzy match.
pub fn resolve(word: &str) -> Option<&'static str> {
    let word = word.to_lowercase();
    if let Some(name) = COMMAND_NAMES.iter().copied().find(|n| *n == word) {
        return Some(name);
    }
    if let Some(name) = COMMAND_NAMES.iter().copied().find(|n| n.starts_with(&word)) {
        return Some(name);
    }

    let matcher = SkimMatcherV2::default();
    COMMAND_NAMES
        .iter()
        .filter_map(|name| matcher.fuzzy_match(name, &word).map(|score| (score, *name)))
        .max_by_key(|(score, _)| *score)
        .map(|(_, name)| name)
}

pub fn parse(line: &str) -> Result<Command, CommandError> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((w, r)) => (w, r.trim()),
        None => (line, ""),
    };
    if word.is_empty() {
        return Err(CommandError::Empty);
    }
    let name = resolve(word).ok_or_else(|| CommandError::Unknown(word.to_string()))?;

    let cmd = match name {
        "search" => Command::Search(required(name, rest)?.to_string()),
        "tag" => Command::Tag(required(name, rest)?.to_string()),
        "tags" => Command::Tags,
        "popular" => Command::Popular,
        "latest" => Command::Latest,
        "random" => Command::Random,
        "play" if rest.is_empty() => Command::Play(None),
        "play" => Command::Play(Some(number(name, rest)?)),
        "pause" => Command::Pause,
        "next" => Command::Next,
        "prev" => Command::Prev,
        "jump" => Command::Jump(number(name, required(name, rest)?)?),
        "seek" => Command::Seek(seek_target(required(name, rest)?)?),
        "vol" => Command::Volume(number(name, required(name, rest)?)?),
        "shuffle" => Command::Shuffle,
        "repeat" => Command::Repeat,
        "queue" => Command::Queue,
        "history" => Command::History,
        "status" => Command::Status,
        "help" => Command::Help,
        _ => Command::Quit,
    };
    Ok(cmd)
}

fn required<'a>(command: &'static str, rest: &'a str) -> Result<&'a str, CommandError> {
    if rest.is_empty() {
        Err(CommandError::MissingArgument(command))
    } else {
        Ok(rest)
    }
}

fn number<T: std::str::FromStr>(command: &'static str, value: &str) -> Result<T, CommandError> {
    value.parse().map_err(|_| CommandError::InvalidArgument {
        command,
        value: value.to_string(),
    })
}

fn seek_target(value: &str) -> Result<SeekTarget, CommandError> {
    if let Some(percent) = value.strip_suffix('%') {
        return number("seek", percent.trim()).map(SeekTarget::Percent);
    }
    if let Some((m, s)) = value.split_once(':') {
        let minutes: f64 = number("seek", m)?;
        let seconds: f64 = number("seek", s)?;
        return Ok(SeekTarget::Seconds(minutes * 60.0 + seconds));
    }
    number("seek", value).map(SeekTarget::Seconds)
}

pub const HELP: &str = "\
search <text>   find tracks          tag <name>   tracks with a tag
tags            list tags            popular | latest | random
play <n>        play row n           play         resume
pause           toggle pause         next | prev
seek <s|m:ss|n%>                     vol <0-100>
shuffle         toggle shuffle       repeat       cycle off/all/one
jump <n>        play queue entry n   queue | history | status
quit";
