//! Configuration, logging and gate state shared by every subcommand.

pub mod config;
pub mod cooldown;
pub mod logging;
pub mod persistence;
