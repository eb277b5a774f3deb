use anyhow::{Context, Result};
use clap::Args;
use std::io::Write;
use std::path::PathBuf;
use tracing::debug;
use trigr_manifest::{render, write_to_path, ManifestFormat};

use crate::common::Workspace;
use crate::{logger, GlobalOpts};

#[derive(Args, Debug, Clone)]
pub struct BuildCommand {
    /// Directory containing the function sources (default: current directory)
    pub source: Option<PathBuf>,

    /// Manifest output path (default: <SOURCE>/functions.<ext>)
    #[arg(short, long, conflicts_with = "stdout")]
    pub output: Option<PathBuf>,

    /// Manifest format: yaml or json
    #[arg(short, long)]
    pub format: Option<ManifestFormat>,

    /// Print the manifest to stdout instead of writing a file
    #[arg(long)]
    pub stdout: bool,
}

pub fn handle_build(cmd: BuildCommand, opts: &GlobalOpts) -> Result<()> {
    let workspace = Workspace::open(cmd.source.as_deref(), opts)?;
    let format = workspace.config.resolve_format(cmd.format);
    let manifest = workspace.compile()?;
    debug!(%format, stdout = cmd.stdout, "Emitting manifest");

    if cmd.stdout {
        let content = render(&manifest, format).context("Failed to render manifest")?;
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(content.as_bytes())?;
        stdout.flush()?;
        return Ok(());
    }

    let output = workspace
        .config
        .resolve_output(&workspace.source, cmd.output.as_deref(), format);
    write_to_path(&manifest, &output, format)
        .with_context(|| format!("Failed to write manifest to {}", output.display()))?;

    logger::success(&format!(
        "Wrote {} endpoint(s) to {}",
        manifest.endpoints.len(),
        output.display()
    ));
    Ok(())
}
