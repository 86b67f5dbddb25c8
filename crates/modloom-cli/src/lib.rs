//! modloom - mod loader front end
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
//!
//! Loads `modloom.toml`, registers host modules, resolves a mod manifest's
//! dependencies against the configured feeds and prints the outcome.
//!
//! # Configuration
//!
//! ```text
//! ~/.modloom/
//! └── modloom.toml   # feeds, enabled classes, host target, extra compatibility
//! ```
//!
//! `--config` or `$MODLOOM_HOME` override the location.

pub mod cmd;
pub mod ui;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command line interface.
#[derive(Debug, Parser)]
#[command(name = "modloom")]
#[command(author, version, about = "modloom - resolve and pre-patch mods")]
pub struct Cli {
    /// Configuration file (defaults to ~/.modloom/modloom.toml)
    #[arg(long, global = true, env = "MODLOOM_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Resolve a mod manifest's dependencies
    Resolve {
        /// Path to the mod manifest (mod.toml)
        manifest: PathBuf,
        /// Manifest listing modules the host already provides
        #[arg(long)]
        host_modules: Option<PathBuf>,
        /// Do not resolve library dependencies from feeds
        #[arg(long)]
        no_libraries: bool,
        /// Do not resolve mod dependencies from feeds
        #[arg(long)]
        no_mods: bool,
    },
    /// List configured package sources
    Sources,
    /// Show targets compatible with the host, most specific first
    Targets {
        /// Host target to evaluate instead of the configured one
        #[arg(long)]
        host: Option<String>,
    },
}
