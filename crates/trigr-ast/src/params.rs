//! Deploy-time parameter table
//!
//! Built once, in declaration order, after every module has been scanned.
//! The evaluator receives it by reference; there is no global registry.

use ahash::AHashMap;
use smallvec::SmallVec;
use tracing::debug;
use trigr_manifest::{OptionValue, Param, ParamKind};

use crate::errors::CompileError;
use crate::evaluator::literal;
use crate::scanner::ParamDeclSite;
use crate::syntax::{Arg, Expr};

#[derive(Debug, Clone)]
struct ParamEntry {
    param: Param,
    binding: Option<String>,
    offset: usize,
}

/// Result of resolving a binding at a given point in a module
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamLookup<'a> {
    Found(&'a Param),
    /// Declared in another module under the same binding name
    OtherModule(&'a Param),
    /// Bound in the same module, but only after the reference
    DeclaredLater(&'a Param),
    NotFound,
}

#[derive(Debug, Default)]
pub struct ParamTable {
    entries: Vec<ParamEntry>,
    by_name: AHashMap<String, usize>,
    by_binding: AHashMap<String, SmallVec<[usize; 2]>>,
}

impl ParamTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate a `params.defineX(...)` call and register it
    pub fn declare(&mut self, site: &ParamDeclSite) -> Result<(), CompileError> {
        let param = build_param(site)?;
        if let Some(&existing) = self.by_name.get(&param.name) {
            return Err(CompileError::DuplicateParam {
                name: param.name,
                first: self.entries[existing].param.location.clone(),
                second: site.location.clone(),
            });
        }

        debug!("Declared {} parameter {}", param.kind, param.name);
        let index = self.entries.len();
        self.by_name.insert(param.name.clone(), index);
        if let Some(binding) = &site.binding {
            self.by_binding.entry(binding.clone()).or_default().push(index);
        }
        self.entries.push(ParamEntry {
            param,
            binding: site.binding.clone(),
            offset: site.offset,
        });
        Ok(())
    }

    /// Resolve a binding referenced at `offset` in `file`
    ///
    /// A declaration in the same module wins and must precede the reference;
    /// otherwise the first declaration from another module is reported, and
    /// the caller decides whether that module's name is visible here.
    pub fn lookup(&self, binding: &str, file: &str, offset: usize) -> ParamLookup<'_> {
        let Some(indices) = self.by_binding.get(binding) else {
            return ParamLookup::NotFound;
        };
        let entries = indices.iter().map(|&i| &self.entries[i]);

        let mut same_file = entries
            .clone()
            .filter(|e| e.param.location.file == file)
            .peekable();
        if same_file.peek().is_some() {
            let mut later = None;
            let mut found = None;
            for entry in same_file {
                if entry.offset < offset {
                    found = Some(&entry.param);
                } else if later.is_none() {
                    later = Some(&entry.param);
                }
            }
            return match (found, later) {
                (Some(param), _) => ParamLookup::Found(param),
                (None, Some(param)) => ParamLookup::DeclaredLater(param),
                (None, None) => ParamLookup::NotFound,
            };
        }

        entries
            .map(|e| &e.param)
            .next()
            .map_or(ParamLookup::NotFound, ParamLookup::OtherModule)
    }

    pub fn get(&self, name: &str) -> Option<&Param> {
        self.by_name.get(name).map(|&i| &self.entries[i].param)
    }

    /// Binding identifier a parameter was assigned to, if any
    pub fn binding_of(&self, name: &str) -> Option<&str> {
        self.by_name
            .get(name)
            .and_then(|&i| self.entries[i].binding.as_deref())
    }

    /// Params in declaration order
    pub fn params(&self) -> impl Iterator<Item = &Param> {
        self.entries.iter().map(|e| &e.param)
    }
}

fn build_param(site: &ParamDeclSite) -> Result<Param, CompileError> {
    let invalid = |reason: String| CompileError::InvalidParam {
        location: site.location.clone(),
        reason,
    };

    let mut name = None;
    let mut default = None;
    let mut label = None;
    let mut description = None;
    let mut positional = 0;

    for arg in &site.args {
        match arg {
            Arg::Positional(expr) if positional == 0 => {
                positional += 1;
                name = Some(expr);
            }
            Arg::Positional(_) => {
                return Err(invalid(
                    "only the parameter name may be passed positionally".to_string(),
                ))
            }
            Arg::Splat(_) => {
                return Err(invalid(
                    "argument unpacking is not supported in parameter declarations".to_string(),
                ))
            }
            Arg::Keyword { name: keyword, value, .. } => {
                let slot = match keyword.as_str() {
                    "name" => &mut name,
                    "default" => &mut default,
                    "label" => &mut label,
                    "description" => &mut description,
                    other => return Err(invalid(format!("unexpected keyword '{}'", other))),
                };
                if slot.is_some() {
                    return Err(invalid(format!("'{}' given more than once", keyword)));
                }
                *slot = Some(value);
            }
        }
    }

    let Some(name_expr) = name else {
        return Err(invalid("missing parameter name".to_string()));
    };
    let Some(param_name) = name_expr.as_str() else {
        return Err(invalid("parameter name must be a string literal".to_string()));
    };
    if !Param::is_valid_name(param_name) {
        return Err(invalid(format!(
            "parameter name '{}' must match ^[A-Z][A-Z0-9_]*$",
            param_name
        )));
    }

    let default = match default.filter(|expr| !expr.is_none()) {
        None => None,
        Some(_) if site.kind == ParamKind::Secret => {
            return Err(invalid(format!(
                "secret parameter '{}' cannot have a default",
                param_name
            )))
        }
        Some(expr) => {
            let value = literal(expr)?;
            if !site.kind.accepts(&value) {
                return Err(invalid(format!(
                    "default for {} parameter '{}' must be {}, got {}",
                    site.kind,
                    param_name,
                    site.kind,
                    value.type_name()
                )));
            }
            Some(OptionValue::Literal(value))
        }
    };

    let text = |expr: Option<&Expr>, what: &str| -> Result<Option<String>, CompileError> {
        match expr.filter(|e| !e.is_none()) {
            None => Ok(None),
            Some(e) => e
                .as_str()
                .map(|s| Some(s.to_string()))
                .ok_or_else(|| invalid(format!("{} must be a string literal", what))),
        }
    };

    Ok(Param {
        name: param_name.to_string(),
        kind: site.kind,
        default,
        label: text(label, "label")?,
        description: text(description, "description")?,
        location: site.location.clone(),
    })
}
