//! Subcommand implementations

pub mod directory;
pub mod governance;
pub mod inventory;
pub mod usage;
