pub mod cli;
pub mod commands;
pub mod config;
pub mod events;
pub mod lock;
pub mod shell;

pub use commands::{parse, Command, CommandError};
pub use events::AppEvent;
pub use shell::{Flow, Shell};
