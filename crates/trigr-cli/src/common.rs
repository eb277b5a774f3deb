//! Common types and utilities shared across commands

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use trigr_ast::{Compiler, DEFAULT_EXCLUDES};
use trigr_config::Config;
use trigr_manifest::Manifest;

use crate::errors::CliError;
use crate::logger;

/// Global CLI options available to all commands
#[derive(Parser, Debug, Clone, Default)]
pub struct GlobalOpts {
    #[arg(short, long, global = true, help = "Only print errors")]
    pub quiet: bool,

    #[arg(short, long, global = true, action = clap::ArgAction::Count, help = "Increase verbosity (-v for debug, -vv for trace)")]
    pub verbose: u8,

    #[arg(long, global = true, help = "Disable colored output")]
    pub no_color: bool,
}

impl GlobalOpts {
    /// Get the effective verbosity level
    /// - 0: quiet/warn only
    /// - 1: debug (-v)
    /// - 2: trace (-vv)
    pub fn verbosity_level(&self) -> u8 {
        if self.quiet {
            0
        } else {
            self.verbose
        }
    }
}

/// Source root and configuration for one command invocation
#[derive(Debug, Clone)]
pub struct Workspace {
    pub source: PathBuf,
    pub config: Config,
}

impl Workspace {
    /// Resolve the source root, load its configuration and start file logging
    pub fn open(source: Option<&Path>, opts: &GlobalOpts) -> Result<Self> {
        let source = source.map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        if !source.is_dir() {
            return Err(CliError::MissingSource(source).into());
        }

        let config = Config::load(&source).map_err(|e| CliError::Config(e.to_string()))?;

        if let Err(e) = logger::init(
            opts.verbosity_level(),
            opts.quiet,
            config.log_file().as_deref(),
        ) {
            logger::warn(&format!("Failed to initialize log file: {}", e));
        }
        logger::step(&format!("Source root: {}", source.display()));

        Ok(Workspace { source, config })
    }

    /// Compile the source root, showing a spinner while it runs
    pub fn compile(&self) -> Result<Manifest> {
        let exclude = self.config.resolve_exclude(DEFAULT_EXCLUDES);
        logger::debug(&format!("Excluded directories: {}", exclude.join(", ")));

        logger::spinner_start(&format!("Compiling {}", self.source.display()));
        let result = Compiler::new(&self.source).with_exclude(exclude).compile();
        logger::spinner_stop();

        result.with_context(|| format!("Failed to compile {}", self.source.display()))
    }
}
