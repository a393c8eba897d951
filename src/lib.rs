pub mod app;
pub mod catalog;
pub mod error;
pub mod player;
