//! Option normalizer
//!
//! Turns a resolved call site into a canonical [`Endpoint`]. Option values
//! are evaluated in source order, converted per field and then merged with
//! the project-wide options from `options.setGlobalOptions(...)`.
//!
//! Defaults are applied only where the platform has one (`region`, event
//! `retry`, Firestore database and namespace, Database instance). A field set
//! to `RESET_VALUE` never receives a default and is left out of the manifest.

use ahash::AHashMap;
use tracing::debug;
use trigr_manifest::{endpoint_key, Endpoint, Literal, OptionValue, ParamKind, SourceLocation};

use crate::errors::CompileError;
use crate::evaluator::{unsupported, Evaluator};
use crate::params::ParamTable;
use crate::resolver::{resolve_global_options, OptionArg, ResolvedCall};
use crate::scanner::ModuleScan;
use crate::syntax::{Expr, ExprKind};

mod base;
mod fields;
mod triggers;

pub use base::BaseOptions;
use fields::Field;

const SECRETS_OPTION: &str = "secrets";

#[derive(Debug, Clone)]
struct Evaluated {
    value: OptionValue,
    location: SourceLocation,
}

/// Evaluated option keywords of one call, consumed field by field
#[derive(Debug, Default)]
pub(crate) struct OptionSet {
    values: AHashMap<String, Evaluated>,
}

impl OptionSet {
    /// Evaluate every option in source order; the first failure wins
    pub fn evaluate(args: &[OptionArg<'_>], evaluator: &Evaluator<'_>) -> Result<Self, CompileError> {
        let mut values = AHashMap::with_capacity(args.len());
        for arg in args {
            let value = if arg.name == SECRETS_OPTION {
                secrets(arg.value, evaluator)?
            } else {
                evaluator.evaluate(arg.value)?
            };
            values.insert(
                arg.name.to_string(),
                Evaluated {
                    value,
                    location: arg.location.clone(),
                },
            );
        }
        Ok(OptionSet { values })
    }

    /// Remove `name` and convert it; `None` when it was not given
    pub fn convert(
        &mut self,
        params: &ParamTable,
        name: &str,
        convert: impl FnOnce(&Field<'_>, OptionValue) -> Result<OptionValue, CompileError>,
    ) -> Result<Option<OptionValue>, CompileError> {
        self.convert_with(params, name, convert)
    }

    pub fn convert_with<T>(
        &mut self,
        params: &ParamTable,
        name: &str,
        convert: impl FnOnce(&Field<'_>, OptionValue) -> Result<T, CompileError>,
    ) -> Result<Option<T>, CompileError> {
        let Some(Evaluated { value, location }) = self.values.remove(name) else {
            return Ok(None);
        };
        let field = Field {
            params,
            option: name,
            location: &location,
        };
        convert(&field, value).map(Some)
    }
}

/// `secrets=[API_KEY, "OTHER_SECRET"]`: secret parameter bindings or names
fn secrets(expr: &Expr, evaluator: &Evaluator<'_>) -> Result<OptionValue, CompileError> {
    let items: Vec<&Expr> = match &expr.kind {
        ExprKind::List(items) => items.iter().collect(),
        ExprKind::Str(_) => vec![expr],
        ExprKind::Name(name) if name != "RESET_VALUE" => vec![expr],
        _ => {
            return match evaluator.evaluate(expr)? {
                OptionValue::Reset => Ok(OptionValue::Reset),
                _ => Err(unsupported(expr, "secrets must be a list of secret parameters")),
            };
        }
    };

    let mut names = Vec::with_capacity(items.len());
    for item in items {
        let name = match &item.kind {
            ExprKind::Str(name) => name.clone(),
            ExprKind::Name(binding) => {
                let param = evaluator.param(binding, item)?;
                if param.kind != ParamKind::Secret {
                    return Err(CompileError::InvalidOption {
                        location: item.location.clone(),
                        option: SECRETS_OPTION.to_string(),
                        reason: format!("parameter {} is {}, expected secret", param.name, param.kind),
                    });
                }
                param.name.clone()
            }
            _ => return Err(unsupported(item, "expected a secret parameter or its name")),
        };
        names.push(Literal::Str(name));
    }
    Ok(OptionValue::Literal(Literal::List(names)))
}

/// Base options from the single `options.setGlobalOptions(...)` call
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    pub base: BaseOptions,
    pub location: Option<SourceLocation>,
}

impl GlobalOptions {
    /// Collect global options across modules, evaluated in their own module's scope
    pub fn from_scans(scans: &[ModuleScan], params: &ParamTable) -> Result<Self, CompileError> {
        let mut globals = GlobalOptions::default();
        for scan in scans {
            for site in &scan.global_options {
                if let Some(first) = &globals.location {
                    return Err(CompileError::DuplicateGlobalOptions {
                        first: first.clone(),
                        second: site.location.clone(),
                    });
                }
                let evaluator = Evaluator::new(params, scan);
                let args = resolve_global_options(site)?;
                let mut options = OptionSet::evaluate(&args, &evaluator)?;
                globals.base = BaseOptions::take(&mut options, params)?;
                globals.location = Some(site.location.clone());
                debug!("Global options set at {}", site.location);
            }
        }
        Ok(globals)
    }
}

pub struct Normalizer<'a> {
    params: &'a ParamTable,
    globals: &'a GlobalOptions,
}

impl<'a> Normalizer<'a> {
    pub fn new(params: &'a ParamTable, globals: &'a GlobalOptions) -> Self {
        Normalizer { params, globals }
    }

    pub fn normalize(
        &self,
        call: &ResolvedCall<'_>,
        evaluator: &Evaluator<'_>,
    ) -> Result<Endpoint, CompileError> {
        let site = call.site;
        let address = call.address.as_ref();
        let key = endpoint_key(
            site.family.key_scheme(),
            &site.method,
            address.map(|a| a.value.as_str()),
        );

        let mut options = OptionSet::evaluate(&call.options, evaluator)?;
        let trigger = triggers::build(site, address, &mut options, self.params)?;
        let base = BaseOptions::take(&mut options, self.params)?.or(&self.globals.base);

        let entry_point = call.entry_point.clone().unwrap_or_else(|| key.clone());
        let mut endpoint = Endpoint::new(key, entry_point, site.location.clone(), trigger);
        base.apply(&mut endpoint)?;

        debug!(
            "Normalized {} at {} as {} ({})",
            site.display_name(),
            site.location,
            endpoint.key,
            endpoint.trigger.wire_name()
        );
        Ok(endpoint)
    }
}
