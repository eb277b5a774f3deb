//! Source scanner
//!
//! Walks the source root, parses every Python module with ast-grep and
//! collects, in source order:
//! - registration call sites (decorator and call forms)
//! - parameter declarations
//! - `options.setGlobalOptions` calls
//! - every locally bound identifier
//!
//! Nothing is executed. Calls that do not match a known registration shape
//! are ignored.

use ahash::AHashSet;
use ast_grep_core::AstGrep;
use ast_grep_language::Python;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use trigr_manifest::{ParamKind, SourceLocation};
use walkdir::WalkDir;

use crate::errors::CompileError;
use crate::families::{self, Family};
use crate::syntax::{find_syntax_error, named_children, Arg, ExprKind, Lowering, PyNode};

/// Directory names skipped when no configuration says otherwise
pub const DEFAULT_EXCLUDES: &[&str] = &[".git", ".venv", "venv", "__pycache__", "node_modules"];

#[derive(Debug, Clone, PartialEq)]
pub enum CallForm {
    /// `@ns.method(...)` above a `def`
    Decorator { function: String },
    /// `@ns.method` without a call
    BareDecorator { function: String },
    /// `ns.method(..., handler, ...)`, optionally assigned to a name
    Call { binding: Option<String> },
}

/// One registration call found in a module
#[derive(Debug, Clone, PartialEq)]
pub struct CallSite {
    pub family: Family,
    pub method: String,
    pub args: Vec<Arg>,
    pub form: CallForm,
    pub location: SourceLocation,
    pub offset: usize,
}

impl CallSite {
    /// Callee as written in source, for error messages
    pub fn display_name(&self) -> String {
        format!("{}.{}", self.family.namespaces()[0], self.method)
    }
}

/// A `params.defineX(...)` call
#[derive(Debug, Clone, PartialEq)]
pub struct ParamDeclSite {
    pub kind: ParamKind,
    pub binding: Option<String>,
    pub args: Vec<Arg>,
    pub location: SourceLocation,
    pub offset: usize,
}

/// An `options.setGlobalOptions(...)` call
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalOptionsSite {
    pub args: Vec<Arg>,
    pub location: SourceLocation,
    pub offset: usize,
}

/// Everything the later phases need from one module
#[derive(Debug, Clone, Default)]
pub struct ModuleScan {
    /// Path relative to the source root, `/`-separated
    pub file: String,
    pub call_sites: Vec<CallSite>,
    pub param_decls: Vec<ParamDeclSite>,
    pub global_options: Vec<GlobalOptionsSite>,
    /// Names bound by assignment, definition, loop target or parameter
    pub locals: AHashSet<String>,
    /// Names bound by `import` / `from ... import`
    pub imports: AHashSet<String>,
}

/// List the Python modules under `root` in file-name order
pub fn discover_files(root: &Path, exclude: &[String]) -> Result<Vec<PathBuf>, CompileError> {
    let mut files = Vec::new();

    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || !entry.file_type().is_dir()
                || !exclude
                    .iter()
                    .any(|name| entry.file_name().to_str() == Some(name.as_str()))
        });

    for entry in walker {
        let entry = entry.map_err(|e| CompileError::Io {
            path: e.path().map_or_else(|| root.to_path_buf(), Path::to_path_buf),
            source: e.into(),
        })?;
        let path = entry.path();
        if entry.file_type().is_file() && path.extension().and_then(|s| s.to_str()) == Some("py") {
            files.push(path.to_path_buf());
        }
    }

    debug!("Discovered {} Python modules under {:?}", files.len(), root);
    Ok(files)
}

/// Path of `path` relative to `root`, joined with `/`
pub fn relative_name(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let joined = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    if joined.is_empty() {
        path.file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    } else {
        joined
    }
}

/// Read and scan one module
pub fn scan_file(root: &Path, path: &Path) -> Result<ModuleScan, CompileError> {
    let content = fs::read_to_string(path).map_err(|source| CompileError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    scan_source(&relative_name(root, path), &content)
}

/// Scan module source text
pub fn scan_source(file: &str, content: &str) -> Result<ModuleScan, CompileError> {
    let sg = AstGrep::new(content, Python);
    let root = sg.root();
    let lowering = Lowering::new(file, content);

    if let Some((offset, message)) = find_syntax_error(&root, true) {
        return Err(CompileError::SyntaxError {
            location: lowering.location(offset),
            message,
        });
    }

    let mut visitor = Visitor {
        lowering: &lowering,
        scan: ModuleScan {
            file: file.to_string(),
            ..ModuleScan::default()
        },
    };
    visitor.visit(&root);

    let scan = visitor.scan;
    debug!(
        "Scanned {}: {} registrations, {} params",
        file,
        scan.call_sites.len(),
        scan.param_decls.len()
    );
    Ok(scan)
}

struct Visitor<'a> {
    lowering: &'a Lowering<'a>,
    scan: ModuleScan,
}

impl Visitor<'_> {
    fn visit(&mut self, node: &PyNode<'_>) {
        match &*node.kind() {
            "decorated_definition" => {
                self.visit_decorated(node);
                return;
            }
            "call" => {
                if self.visit_call(node, None) {
                    return;
                }
            }
            "assignment" => {
                let left = node.field("left");
                if let Some(left) = &left {
                    self.bind_targets(left);
                }
                let binding = left
                    .filter(|l| l.kind() == "identifier")
                    .map(|l| l.text().to_string());
                if let Some(right) = node.field("right") {
                    if right.kind() == "call" && self.visit_call(&right, binding) {
                        return;
                    }
                }
            }
            "augmented_assignment" | "for_statement" | "for_in_clause" => {
                if let Some(left) = node.field("left") {
                    self.bind_targets(&left);
                }
            }
            "function_definition" | "class_definition" => {
                if let Some(name) = node.field("name") {
                    self.bind(&name.text());
                }
            }
            "parameters" | "lambda_parameters" => {
                for param in named_children(node) {
                    self.bind_parameter(&param);
                }
            }
            "import_statement" | "import_from_statement" => self.bind_imports(node),
            "as_pattern_target" => self.bind_targets(node),
            _ => {}
        }

        for child in node.children() {
            self.visit(&child);
        }
    }

    fn visit_decorated(&mut self, node: &PyNode<'_>) {
        let Some(definition) = node.field("definition") else {
            return;
        };
        let function = definition
            .field("name")
            .map(|n| n.text().to_string())
            .unwrap_or_default();

        for decorator in node.children().filter(|c| c.kind() == "decorator") {
            let Some(expression) = named_children(&decorator).into_iter().next() else {
                continue;
            };
            match &*expression.kind() {
                "call" => {
                    let Some(callee) = expression.field("function") else {
                        continue;
                    };
                    if let Some((family, method)) = self.registration(&callee) {
                        let offset = expression.range().start;
                        self.scan.call_sites.push(CallSite {
                            family,
                            method,
                            args: self.lowering.args(&expression),
                            form: CallForm::Decorator {
                                function: function.clone(),
                            },
                            location: self.lowering.location(offset),
                            offset,
                        });
                    } else {
                        self.visit(&expression);
                    }
                }
                "attribute" => {
                    if let Some((family, method)) = self.registration(&expression) {
                        let offset = expression.range().start;
                        self.scan.call_sites.push(CallSite {
                            family,
                            method,
                            args: Vec::new(),
                            form: CallForm::BareDecorator {
                                function: function.clone(),
                            },
                            location: self.lowering.location(offset),
                            offset,
                        });
                    }
                }
                _ => self.visit(&expression),
            }
        }

        self.visit(&definition);
    }

    /// Record a registration, parameter or global-options call; false if the
    /// call is none of these
    fn visit_call(&mut self, node: &PyNode<'_>, binding: Option<String>) -> bool {
        let Some(callee) = node.field("function") else {
            return false;
        };
        let lowered = self.lowering.expr(&callee);
        let Some(path) = lowered.path() else {
            return false;
        };
        let [.., namespace, method] = path.as_slice() else {
            return false;
        };

        let offset = node.range().start;
        let location = self.lowering.location(offset);

        if *namespace == "params" {
            if let Some(kind) = ParamKind::from_define_method(method) {
                self.scan.param_decls.push(ParamDeclSite {
                    kind,
                    binding,
                    args: self.lowering.args(node),
                    location,
                    offset,
                });
                return true;
            }
        }

        if *namespace == "options" && *method == "setGlobalOptions" {
            self.scan.global_options.push(GlobalOptionsSite {
                args: self.lowering.args(node),
                location,
                offset,
            });
            return true;
        }

        if let Some(family) = families::lookup(namespace, method) {
            self.scan.call_sites.push(CallSite {
                family,
                method: (*method).to_string(),
                args: self.lowering.args(node),
                form: CallForm::Call { binding },
                location,
                offset,
            });
            return true;
        }

        false
    }

    fn registration(&self, callee: &PyNode<'_>) -> Option<(Family, String)> {
        let lowered = self.lowering.expr(callee);
        if let ExprKind::Path(parts) = &lowered.kind {
            if let [.., namespace, method] = parts.as_slice() {
                return families::lookup(namespace, method).map(|f| (f, method.clone()));
            }
        }
        None
    }

    fn bind(&mut self, name: &str) {
        self.scan.locals.insert(name.to_string());
    }

    /// Bind every identifier in an assignment or loop target
    fn bind_targets(&mut self, target: &PyNode<'_>) {
        match &*target.kind() {
            "identifier" => self.bind(&target.text()),
            // `obj.attr = ...` and `x[i] = ...` bind nothing new
            "attribute" | "subscript" => {}
            _ => {
                for child in named_children(target) {
                    self.bind_targets(&child);
                }
            }
        }
    }

    fn bind_parameter(&mut self, param: &PyNode<'_>) {
        match &*param.kind() {
            "identifier" => self.bind(&param.text()),
            "default_parameter" | "typed_default_parameter" => {
                if let Some(name) = param.field("name") {
                    self.bind(&name.text());
                }
            }
            _ => {
                if let Some(name) = named_children(param)
                    .into_iter()
                    .find(|c| c.kind() == "identifier")
                {
                    self.bind(&name.text());
                }
            }
        }
    }

    fn bind_import(&mut self, name: &str) {
        self.scan.imports.insert(name.to_string());
    }

    fn bind_imports(&mut self, node: &PyNode<'_>) {
        let module = node.field("module_name").map(|m| m.range());
        for child in named_children(node) {
            if Some(child.range()) == module {
                continue;
            }
            match &*child.kind() {
                "aliased_import" => {
                    if let Some(alias) = child.field("alias") {
                        self.bind_import(&alias.text());
                    }
                }
                "dotted_name" => {
                    // `import a.b` binds `a`
                    if let Some(first) = named_children(&child).into_iter().next() {
                        self.bind_import(&first.text());
                    }
                }
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::CompileError;
    use crate::scanner::*;
    use std::fs;
    use tempfile::TempDir;

    const SOURCE: &str = r#"
from functions import https, pubsub, params, options

isProduction = params.defineBoolean("IS_PRODUCTION", default=False)
options.setGlobalOptions(region="europe-west1")

@https.onRequest("helloWorld")
def hello_world(req):
    local = 1
    return local

relay = pubsub.onMessagePublished("my-topic", handle_message, retry=True)

for item in range(3):
    print(item)
"#;

    #[test]
    fn test_scan_collects_sites_in_source_order() -> Result<(), CompileError> {
        let scan = scan_source("main.py", SOURCE)?;

        assert_eq!(scan.call_sites.len(), 2);
        let first = &scan.call_sites[0];
        assert_eq!(first.family, Family::Https);
        assert_eq!(
            first.form,
            CallForm::Decorator {
                function: "hello_world".to_string()
            }
        );
        assert_eq!(first.location.to_string(), "main.py:7:2");

        let second = &scan.call_sites[1];
        assert_eq!(second.family, Family::PubSub);
        assert_eq!(
            second.form,
            CallForm::Call {
                binding: Some("relay".to_string())
            }
        );
        assert_eq!(second.args.len(), 3);

        assert_eq!(scan.param_decls.len(), 1);
        assert_eq!(scan.param_decls[0].binding.as_deref(), Some("isProduction"));
        assert_eq!(scan.param_decls[0].kind, ParamKind::Boolean);
        assert_eq!(scan.global_options.len(), 1);
        Ok(())
    }

    #[test]
    fn test_scan_collects_local_bindings() -> Result<(), CompileError> {
        let scan = scan_source("main.py", SOURCE)?;
        for name in ["isProduction", "hello_world", "local", "relay", "item", "req"] {
            assert!(scan.locals.contains(name), "missing local {name}");
        }
        assert!(!scan.locals.contains("handle_message"));
        for name in ["https", "pubsub", "params", "options"] {
            assert!(scan.imports.contains(name), "missing import {name}");
            assert!(!scan.locals.contains(name));
        }
        Ok(())
    }

    #[test]
    fn test_scan_ignores_unrelated_calls() -> Result<(), CompileError> {
        let scan = scan_source("util.py", "import requests\nrequests.get('x')\nfoo.onRequest('y')\n")?;
        assert!(scan.call_sites.is_empty());
        assert!(scan.param_decls.is_empty());
        Ok(())
    }

    #[test]
    fn test_scan_reports_syntax_error_location() {
        let result = scan_source("broken.py", "x = 1\ndef broken(:\n    pass\n");
        let Err(CompileError::SyntaxError { location, .. }) = result else {
            panic!("expected a syntax error");
        };
        assert_eq!(location.file, "broken.py");
        assert_eq!(location.line, 2);
    }

    #[test]
    fn test_discover_files_sorted_and_excluded() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };
        let root = temp_dir.path();
        let Ok(()) = fs::create_dir_all(root.join("pkg")) else {
            return;
        };
        let Ok(()) = fs::create_dir_all(root.join("venv/lib")) else {
            return;
        };
        for file in ["main.py", "pkg/b.py", "pkg/a.py", "venv/lib/site.py", "README.md"] {
            let Ok(()) = fs::write(root.join(file), "") else {
                return;
            };
        }

        let exclude: Vec<String> = DEFAULT_EXCLUDES.iter().map(|s| (*s).to_string()).collect();
        let Ok(files) = discover_files(root, &exclude) else {
            panic!("discovery failed");
        };
        let names: Vec<String> = files.iter().map(|p| relative_name(root, p)).collect();
        assert_eq!(names, vec!["main.py", "pkg/a.py", "pkg/b.py"]);
    }
}
