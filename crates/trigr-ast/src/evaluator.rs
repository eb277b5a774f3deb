//! Restricted constant evaluator
//!
//! Accepts literals, enumerated constants, `RESET_VALUE`, references to
//! declared parameters and one level of `cond.thenElse(a, b)`. Everything
//! else is rejected with the location of the offending expression; nothing is
//! approximated.

use ahash::AHashSet;
use std::collections::BTreeMap;
use trigr_manifest::{Literal, OptionValue, Param, ParamKind, Ternary};

use crate::errors::CompileError;
use crate::params::{ParamLookup, ParamTable};
use crate::scanner::ModuleScan;
use crate::syntax::{Arg, Expr, ExprKind};

const RESET_VALUE: &str = "RESET_VALUE";

const SUPPORTED_REGIONS: &[&str] = &[
    "ASIA_EAST1",
    "ASIA_EAST2",
    "ASIA_NORTHEAST1",
    "ASIA_NORTHEAST2",
    "ASIA_NORTHEAST3",
    "ASIA_SOUTH1",
    "ASIA_SOUTHEAST1",
    "ASIA_SOUTHEAST2",
    "AUSTRALIA_SOUTHEAST1",
    "EUROPE_CENTRAL2",
    "EUROPE_NORTH1",
    "EUROPE_WEST1",
    "EUROPE_WEST2",
    "EUROPE_WEST3",
    "EUROPE_WEST4",
    "EUROPE_WEST6",
    "NORTHAMERICA_NORTHEAST1",
    "SOUTHAMERICA_EAST1",
    "US_CENTRAL1",
    "US_EAST1",
    "US_EAST4",
    "US_WEST1",
    "US_WEST2",
    "US_WEST3",
    "US_WEST4",
];

/// Evaluates expressions of one module against the shared parameter table
pub struct Evaluator<'a> {
    params: &'a ParamTable,
    file: &'a str,
    locals: &'a AHashSet<String>,
    imports: &'a AHashSet<String>,
}

impl<'a> Evaluator<'a> {
    pub fn new(params: &'a ParamTable, scan: &'a ModuleScan) -> Self {
        Evaluator {
            params,
            file: &scan.file,
            locals: &scan.locals,
            imports: &scan.imports,
        }
    }

    pub fn evaluate(&self, expr: &Expr) -> Result<OptionValue, CompileError> {
        match &expr.kind {
            ExprKind::Bool(_)
            | ExprKind::Int(_)
            | ExprKind::Float(_)
            | ExprKind::Str(_)
            | ExprKind::List(_)
            | ExprKind::Dict(_) => literal(expr).map(OptionValue::Literal),
            ExprKind::None => Err(unsupported(
                expr,
                "None is only accepted as an omitted keyword",
            )),
            ExprKind::Name(name) if name == RESET_VALUE => Ok(OptionValue::Reset),
            ExprKind::Name(name) => self
                .param(name, expr)
                .map(|param| OptionValue::ParamRef(param.name.clone())),
            ExprKind::Path(parts) => {
                let parts: Vec<&str> = parts.iter().map(String::as_str).collect();
                constant(&parts, expr)
            }
            ExprKind::Call { callee, args } => match callee.path().as_deref() {
                Some([condition, "thenElse"]) => self.ternary(condition, args, expr),
                _ => Err(unsupported(expr, "function calls are not constant")),
            },
            ExprKind::Unsupported => Err(unsupported(expr, "not a constant expression")),
        }
    }

    /// Resolve an identifier to a parameter visible at the expression
    ///
    /// A param declared in another module is visible when the name is
    /// imported here, or not bound in this module at all. A local assignment
    /// shadows it.
    pub fn param(&self, name: &str, expr: &Expr) -> Result<&'a Param, CompileError> {
        match self.params.lookup(name, self.file, expr.offset) {
            ParamLookup::Found(param) => Ok(param),
            ParamLookup::OtherModule(param)
                if self.imports.contains(name) || !self.locals.contains(name) =>
            {
                Ok(param)
            }
            ParamLookup::OtherModule(param) => Err(unsupported(
                expr,
                &format!(
                    "`{}` is assigned in this module and shadows parameter {}",
                    name, param.name
                ),
            )),
            ParamLookup::DeclaredLater(_) => Err(CompileError::UnknownParamReference {
                location: expr.location.clone(),
                name: name.to_string(),
            }),
            ParamLookup::NotFound if self.locals.contains(name) || self.imports.contains(name) => {
                Err(unsupported(
                    expr,
                    &format!("`{}` is a local variable, not a declared parameter", name),
                ))
            }
            ParamLookup::NotFound => Err(CompileError::UnknownParamReference {
                location: expr.location.clone(),
                name: name.to_string(),
            }),
        }
    }

    fn ternary(
        &self,
        condition: &str,
        args: &[Arg],
        expr: &Expr,
    ) -> Result<OptionValue, CompileError> {
        let [Arg::Positional(then), Arg::Positional(otherwise)] = args else {
            return Err(unsupported(
                expr,
                "thenElse takes exactly two positional arguments",
            ));
        };

        let param = self.param(condition, expr)?;
        if param.kind != ParamKind::Boolean {
            return Err(unsupported(
                expr,
                &format!(
                    "condition `{}` is a {} parameter, not a boolean",
                    condition, param.kind
                ),
            ));
        }

        Ok(OptionValue::Ternary(Ternary {
            condition: param.name.clone(),
            then: Box::new(self.branch(then)?),
            otherwise: Box::new(self.branch(otherwise)?),
        }))
    }

    fn branch(&self, expr: &Expr) -> Result<OptionValue, CompileError> {
        match self.evaluate(expr)? {
            value @ OptionValue::ParamRef(_) => Ok(value),
            OptionValue::Literal(lit) if lit.is_scalar() => Ok(OptionValue::Literal(lit)),
            OptionValue::Literal(_) => Err(unsupported(
                expr,
                "thenElse branches must be scalar literals or parameters",
            )),
            OptionValue::Ternary(_) => Err(unsupported(expr, "nested thenElse is not supported")),
            OptionValue::Reset => Err(unsupported(expr, "RESET_VALUE cannot be a thenElse branch")),
        }
    }
}

/// Evaluate an expression that must be a pure literal
pub fn literal(expr: &Expr) -> Result<Literal, CompileError> {
    match &expr.kind {
        ExprKind::Bool(b) => Ok(Literal::Bool(*b)),
        ExprKind::Int(i) => Ok(Literal::Int(*i)),
        ExprKind::Float(f) => Ok(Literal::Float(*f)),
        ExprKind::Str(s) => Ok(Literal::Str(s.clone())),
        ExprKind::List(items) => items.iter().map(literal).collect::<Result<_, _>>().map(Literal::List),
        ExprKind::Dict(entries) => {
            let mut map = BTreeMap::new();
            for (key, value) in entries {
                let Some(key) = key.as_str() else {
                    return Err(unsupported(key, "dictionary keys must be string literals"));
                };
                map.insert(key.to_string(), literal(value)?);
            }
            Ok(Literal::Map(map))
        }
        ExprKind::Path(parts) => {
            let parts: Vec<&str> = parts.iter().map(String::as_str).collect();
            match constant(&parts, expr)? {
                OptionValue::Literal(lit) => Ok(lit),
                _ => Err(unsupported(expr, "expected a literal value")),
            }
        }
        _ => Err(unsupported(expr, "expected a literal value")),
    }
}

/// Enumerated constants and `options.RESET_VALUE`
fn constant(parts: &[&str], expr: &Expr) -> Result<OptionValue, CompileError> {
    let parts = match parts {
        ["options", rest @ ..] => rest,
        other => other,
    };

    let value = match parts {
        [RESET_VALUE] => return Ok(OptionValue::Reset),
        ["IngressSetting", member @ ("ALLOW_ALL" | "ALLOW_INTERNAL_ONLY" | "ALLOW_INTERNAL_AND_GCLB")]
        | ["VpcEgressSetting", member @ ("PRIVATE_RANGES_ONLY" | "ALL_TRAFFIC")] => {
            Literal::Str((*member).to_string())
        }
        ["MemoryOption", member] => match memory_member(member) {
            Some(mb) => Literal::Int(mb),
            None => return Err(unsupported(expr, "unknown MemoryOption member")),
        },
        ["SupportedRegion", member] if SUPPORTED_REGIONS.contains(member) => {
            Literal::Str(member.to_ascii_lowercase().replace('_', "-"))
        }
        ["IngressSetting" | "VpcEgressSetting" | "SupportedRegion", _] => {
            return Err(unsupported(expr, "unknown enum member"));
        }
        _ => return Err(unsupported(expr, "not a known constant")),
    };
    Ok(OptionValue::Literal(value))
}

fn memory_member(member: &str) -> Option<i64> {
    let mb = match member {
        "MB_128" => 128,
        "MB_256" => 256,
        "MB_512" => 512,
        "GB_1" => 1024,
        "GB_2" => 2048,
        "GB_4" => 4096,
        "GB_8" => 8192,
        "GB_16" => 16384,
        "GB_32" => 32768,
        _ => return None,
    };
    Some(mb)
}

pub(crate) fn unsupported(expr: &Expr, reason: &str) -> CompileError {
    CompileError::UnsupportedExpression {
        location: expr.location.clone(),
        expression: expr.text.clone(),
        reason: reason.to_string(),
    }
}
