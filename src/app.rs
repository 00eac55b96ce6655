//! Process surface: command-line arguments and logging setup.

pub mod cli;
pub mod logging;
