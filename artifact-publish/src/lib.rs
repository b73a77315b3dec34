pub mod cli;
pub mod load_config;
pub mod logging;
pub mod outcome;
pub mod upload;

pub use cli::{run, Cli, Commands};
