use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use crate::common::Workspace;
use crate::GlobalOpts;

#[derive(Args, Debug, Clone)]
pub struct KeysCommand {
    /// Directory containing the function sources (default: current directory)
    pub source: Option<PathBuf>,
}

/// Print one `key<TAB>location` line per endpoint, in manifest order
pub fn handle_keys(cmd: KeysCommand, opts: &GlobalOpts) -> Result<()> {
    let workspace = Workspace::open(cmd.source.as_deref(), opts)?;
    let manifest = workspace.compile()?;
    for endpoint in manifest.endpoints.values() {
        println!("{}\t{}", endpoint.key, endpoint.location);
    }
    Ok(())
}
