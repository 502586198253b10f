use std::{path::PathBuf, sync::OnceLock};

use clap::Parser;

/// Keeps a reverse-proxy configuration in sync with a container
/// orchestrator's event stream.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Path to the nginx config template. Falls back to the built-in
    /// template when not given.
    #[arg(short, long)]
    pub template: Option<PathBuf>,
}

static ARGS: OnceLock<Args> = OnceLock::new();

pub fn get_cli_args() -> &'static Args {
    ARGS.get_or_init(Args::parse)
}
