use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "sitemill", version, about = "Render a tree of handlebars pages into a static site")]
pub struct Cli {
    /// Site directory; defaults to the current directory.
    #[arg(long, global = true)]
    pub cwd: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Build the site (default)
    #[default]
    Build,
    /// Build the site, then serve the output until interrupted
    Serve,
}
