//! Compile without writing and print what would be deployed

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;
use trigr_manifest::{Manifest, OptionValue};

use crate::common::Workspace;
use crate::{logger, GlobalOpts};

#[derive(Args, Debug, Clone)]
pub struct CheckCommand {
    /// Directory containing the function sources (default: current directory)
    pub source: Option<PathBuf>,
}

pub fn handle_check(cmd: CheckCommand, opts: &GlobalOpts) -> Result<()> {
    let workspace = Workspace::open(cmd.source.as_deref(), opts)?;
    let manifest = workspace.compile()?;

    if !opts.quiet {
        print_summary(&manifest, opts.verbosity_level() > 0);
    }
    logger::success(&format!(
        "{} endpoint(s) compiled from {}",
        manifest.endpoints.len(),
        workspace.source.display()
    ));
    Ok(())
}

fn print_summary(manifest: &Manifest, verbose: bool) {
    if manifest.endpoints.is_empty() {
        println!("{}", "No endpoints found".yellow());
    } else {
        println!("{}", "Endpoints:".bold().green());
    }
    for endpoint in manifest.endpoints.values() {
        let mut kind = endpoint.trigger.wire_name().to_string();
        if let Some(event_type) = endpoint.trigger.event_type() {
            kind = format!("{} ({})", kind, event_type);
        }
        println!("  {} {}", endpoint.key.cyan(), kind);
        if verbose {
            println!("    entry point: {}", endpoint.entry_point);
            println!("    defined at:  {}", endpoint.location);
        }
    }

    if !manifest.params.is_empty() {
        println!("{}", "Params:".bold().green());
        for param in &manifest.params {
            let default = param
                .default
                .as_ref()
                .and_then(display_value)
                .map(|value| format!(" = {}", value))
                .unwrap_or_default();
            println!("  {} {}{}", param.name.cyan(), param.kind, default);
        }
    }

    println!("{}", "Required APIs:".bold().green());
    for api in &manifest.required_apis {
        println!("  {} ({})", api.api, api.reason.dimmed());
    }
}

fn display_value(value: &OptionValue) -> Option<String> {
    match value {
        OptionValue::Literal(literal) => Some(literal.to_wire_string()),
        OptionValue::Reset => None,
        other => other.expression(),
    }
}
