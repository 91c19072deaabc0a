//! Subcommand implementations

pub mod readings;
pub mod status;
pub mod watch;
