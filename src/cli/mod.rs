//! CLI module for kcli.
//!
//! This module provides the command-line interface for managing
//! libvirt VMs, profiles and plans.

mod commands;
mod output;

pub use commands::{Cli, Commands, OutputFormat};
pub use output::OutputFormatter;
