//! Static manifest compiler for Python function registrations
//!
//! The compiler never runs the scanned code. It works in four steps:
//! 1. Discover `.py` modules under the source root and parse them with ast-grep
//!    (in parallel, re-joined in path order)
//! 2. Build the deploy-time parameter table in declaration order
//! 3. Resolve, evaluate and normalize every registration call site
//! 4. Assemble the manifest, detecting duplicate keys
//!
//! Every error is fatal and carries the source location that caused it. When
//! several call sites fail, the earliest one in path order is reported.
pub mod errors;
pub mod evaluator;
pub mod families;
pub mod normalizer;
pub mod params;
pub mod resolver;
pub mod scanner;
pub mod syntax;

use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};
use trigr_manifest::{Endpoint, Manifest, ManifestBuilder};

pub use errors::CompileError;
pub use families::Family;
pub use scanner::DEFAULT_EXCLUDES;

use evaluator::Evaluator;
use normalizer::{GlobalOptions, Normalizer};
use params::ParamTable;
use scanner::{discover_files, scan_file, CallSite, ModuleScan};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOptions {
    /// Directory names skipped while walking the source root
    pub exclude: Vec<String>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            exclude: DEFAULT_EXCLUDES.iter().map(|s| (*s).to_string()).collect(),
        }
    }
}

/// Compiles one source root into a [`Manifest`]
#[derive(Debug, Clone)]
pub struct Compiler {
    root: PathBuf,
    options: CompileOptions,
}

impl Compiler {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Compiler {
            root: root.into(),
            options: CompileOptions::default(),
        }
    }

    pub fn with_options(mut self, options: CompileOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_exclude(mut self, exclude: Vec<String>) -> Self {
        self.options.exclude = exclude;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn compile(&self) -> Result<Manifest, CompileError> {
        let start_time = Instant::now();

        let files = discover_files(&self.root, &self.options.exclude)?;
        let scans = self.scan_all(&files)?;
        info!(
            "Scanned {} modules in {:.2}ms",
            scans.len(),
            start_time.elapsed().as_secs_f64() * 1000.0
        );

        let mut params = ParamTable::new();
        for scan in &scans {
            for decl in &scan.param_decls {
                params.declare(decl)?;
            }
        }
        let globals = GlobalOptions::from_scans(&scans, &params)?;
        let normalizer = Normalizer::new(&params, &globals);

        let sites: Vec<(&ModuleScan, &CallSite)> = scans
            .iter()
            .flat_map(|scan| scan.call_sites.iter().map(move |site| (scan, site)))
            .collect();
        let endpoints: Vec<Result<Endpoint, CompileError>> = sites
            .par_iter()
            .map(|(scan, site)| -> Result<Endpoint, CompileError> {
                let evaluator = Evaluator::new(&params, scan);
                let resolved = resolver::resolve(site)?;
                normalizer.normalize(&resolved, &evaluator)
            })
            .collect();

        let mut builder = ManifestBuilder::new();
        for param in params.params() {
            builder.add_param(param.clone());
        }
        for ((_, site), endpoint) in sites.iter().zip(endpoints) {
            let endpoint = endpoint?;
            if let Some((api, reason)) = site.family.required_api() {
                builder.require_api(api, reason);
            }
            let location = endpoint.location.clone();
            builder
                .add_endpoint(endpoint)
                .map_err(|e| CompileError::from_manifest(e, &location))?;
        }
        let manifest = builder.build();

        info!(
            "Compiled {} endpoints and {} params from {} modules in {:.2}ms",
            manifest.endpoints.len(),
            manifest.params.len(),
            scans.len(),
            start_time.elapsed().as_secs_f64() * 1000.0
        );
        Ok(manifest)
    }

    /// Scan modules in parallel; the first failure in path order wins
    fn scan_all(&self, files: &[PathBuf]) -> Result<Vec<ModuleScan>, CompileError> {
        let results: Vec<Result<ModuleScan, CompileError>> = files
            .par_iter()
            .map(|path| scan_file(&self.root, path))
            .collect();
        let scans = results.into_iter().collect::<Result<Vec<_>, _>>()?;
        debug!(
            "{} registration calls across {} modules",
            scans.iter().map(|s| s.call_sites.len()).sum::<usize>(),
            scans.len()
        );
        Ok(scans)
    }
}

/// Compile `root` with the default options
pub fn compile(root: &Path) -> Result<Manifest, CompileError> {
    Compiler::new(root).compile()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_compile_empty_root() -> Result<(), CompileError> {
        let Ok(temp_dir) = TempDir::new() else {
            return Ok(());
        };
        let manifest = compile(temp_dir.path())?;
        assert!(manifest.endpoints.is_empty());
        assert_eq!(manifest.required_apis.len(), 1);
        Ok(())
    }

    #[test]
    fn test_excluded_directories_are_skipped() -> Result<(), CompileError> {
        let Ok(temp_dir) = TempDir::new() else {
            return Ok(());
        };
        let vendored = temp_dir.path().join("venv");
        if fs::create_dir_all(&vendored).is_err() {
            return Ok(());
        }
        let write = fs::write(
            vendored.join("lib.py"),
            "@https.onRequest('vendored')\ndef f(req): pass\n",
        )
        .and_then(|()| {
            fs::write(
                temp_dir.path().join("main.py"),
                "@https.onRequest('local')\ndef f(req): pass\n",
            )
        });
        if write.is_err() {
            return Ok(());
        }

        let manifest = Compiler::new(temp_dir.path()).compile()?;
        assert_eq!(manifest.keys().collect::<Vec<_>>(), vec!["local"]);

        let manifest = Compiler::new(temp_dir.path())
            .with_exclude(Vec::new())
            .compile()?;
        assert_eq!(manifest.endpoints.len(), 2);
        Ok(())
    }
}
