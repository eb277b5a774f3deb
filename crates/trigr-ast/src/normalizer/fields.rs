//! Per-field type checks and unit conversions
//!
//! Each check accepts `Reset` unchanged, validates literals, checks the kind
//! of referenced parameters and applies the same rules to both branches of a
//! ternary.

use std::collections::BTreeMap;
use trigr_manifest::{Literal, OptionValue, ParamKind, SourceLocation, Ternary};

use crate::errors::CompileError;
use crate::params::ParamTable;

/// Conversion context for one option keyword
pub(crate) struct Field<'a> {
    pub params: &'a ParamTable,
    pub option: &'a str,
    pub location: &'a SourceLocation,
}

impl Field<'_> {
    pub fn invalid(&self, reason: impl Into<String>) -> CompileError {
        CompileError::InvalidOption {
            location: self.location.clone(),
            option: self.option.to_string(),
            reason: reason.into(),
        }
    }

    /// Validate literals with `accepts` and parameter kinds against `kinds`
    fn check(
        &self,
        value: OptionValue,
        expected: &str,
        accepts: &dyn Fn(&Literal) -> bool,
        kinds: &[ParamKind],
    ) -> Result<OptionValue, CompileError> {
        match &value {
            OptionValue::Reset => {}
            OptionValue::Literal(lit) => {
                if !accepts(lit) {
                    return Err(self.invalid(format!(
                        "expected {}, got {}",
                        expected,
                        lit.type_name()
                    )));
                }
            }
            OptionValue::ParamRef(name) => self.check_param(name, expected, kinds)?,
            OptionValue::Ternary(t) => {
                self.check((*t.then).clone(), expected, accepts, kinds)?;
                self.check((*t.otherwise).clone(), expected, accepts, kinds)?;
            }
        }
        Ok(value)
    }

    fn check_param(&self, name: &str, expected: &str, kinds: &[ParamKind]) -> Result<(), CompileError> {
        match self.params.get(name) {
            Some(param) if kinds.contains(&param.kind) => Ok(()),
            Some(param) => Err(self.invalid(format!(
                "parameter {} is {}, expected {}",
                name, param.kind, expected
            ))),
            None => Err(CompileError::UnknownParamReference {
                location: self.location.clone(),
                name: name.to_string(),
            }),
        }
    }

    /// Rewrite literals, including ternary branches
    fn map_literals(
        &self,
        value: OptionValue,
        convert: &dyn Fn(&Field<'_>, Literal) -> Result<Literal, CompileError>,
    ) -> Result<OptionValue, CompileError> {
        Ok(match value {
            OptionValue::Literal(lit) => OptionValue::Literal(convert(self, lit)?),
            OptionValue::Ternary(t) => OptionValue::Ternary(Ternary {
                condition: t.condition,
                then: Box::new(self.map_literals(*t.then, convert)?),
                otherwise: Box::new(self.map_literals(*t.otherwise, convert)?),
            }),
            other => other,
        })
    }

    pub fn int(&self, value: OptionValue) -> Result<OptionValue, CompileError> {
        self.check(
            value,
            "an integer",
            &|lit| matches!(lit, Literal::Int(_)),
            &[ParamKind::Int],
        )
    }

    pub fn number(&self, value: OptionValue) -> Result<OptionValue, CompileError> {
        self.check(
            value,
            "a number",
            &|lit| matches!(lit, Literal::Int(_) | Literal::Float(_)),
            &[ParamKind::Int, ParamKind::Float],
        )
    }

    pub fn boolean(&self, value: OptionValue) -> Result<OptionValue, CompileError> {
        self.check(
            value,
            "a boolean",
            &|lit| matches!(lit, Literal::Bool(_)),
            &[ParamKind::Boolean],
        )
    }

    pub fn string(&self, value: OptionValue) -> Result<OptionValue, CompileError> {
        self.check(
            value,
            "a string",
            &|lit| matches!(lit, Literal::Str(_)),
            &[ParamKind::String],
        )
    }

    /// A string restricted to `allowed`
    pub fn one_of(&self, value: OptionValue, allowed: &[&str]) -> Result<OptionValue, CompileError> {
        let expected = format!("one of {}", allowed.join(", "));
        self.check(
            value,
            &expected,
            &|lit| lit.as_str().is_some_and(|s| allowed.contains(&s)),
            &[ParamKind::String],
        )
    }

    /// A string or list of strings; scalars are wrapped in a one-element list
    pub fn string_list(&self, value: OptionValue) -> Result<OptionValue, CompileError> {
        match value {
            OptionValue::Literal(Literal::Str(s)) => {
                Ok(OptionValue::Literal(Literal::List(vec![Literal::Str(s)])))
            }
            OptionValue::Literal(Literal::List(items)) => {
                if let Some(bad) = items.iter().find(|item| !matches!(item, Literal::Str(_))) {
                    return Err(self.invalid(format!(
                        "expected a list of strings, found {}",
                        bad.type_name()
                    )));
                }
                Ok(OptionValue::Literal(Literal::List(items)))
            }
            OptionValue::Literal(other) => Err(self.invalid(format!(
                "expected a string or list of strings, got {}",
                other.type_name()
            ))),
            OptionValue::ParamRef(ref name) => {
                match self.params.get(name).map(|p| p.kind) {
                    Some(ParamKind::List) => Ok(value),
                    Some(ParamKind::String) => Ok(wrap_expression(&value)),
                    _ => {
                        self.check_param(name, "a string or list", &[ParamKind::String, ParamKind::List])?;
                        Ok(value)
                    }
                }
            }
            OptionValue::Ternary(_) => {
                let value = self.string(value)?;
                Ok(wrap_expression(&value))
            }
            OptionValue::Reset => Ok(value),
        }
    }

    /// A map of strings to strings; `None` when the map is empty
    pub fn string_map(&self, value: OptionValue) -> Result<Option<OptionValue>, CompileError> {
        match value {
            OptionValue::Literal(Literal::Map(entries)) => {
                if let Some((key, bad)) = entries.iter().find(|(_, v)| !matches!(v, Literal::Str(_))) {
                    return Err(self.invalid(format!(
                        "value for '{}' must be a string, got {}",
                        key,
                        bad.type_name()
                    )));
                }
                if entries.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(OptionValue::Literal(Literal::Map(entries))))
                }
            }
            OptionValue::Reset => Ok(None),
            OptionValue::Literal(other) => Err(self.invalid(format!(
                "expected a map of strings, got {}",
                other.type_name()
            ))),
            OptionValue::ParamRef(_) | OptionValue::Ternary(_) => {
                Err(self.invalid("expected a literal map of strings"))
            }
        }
    }

    /// Plain map of strings, for filter groups
    pub fn string_entries(&self, value: OptionValue) -> Result<BTreeMap<String, String>, CompileError> {
        let Some(OptionValue::Literal(Literal::Map(entries))) = self.string_map(value)? else {
            return Ok(BTreeMap::new());
        };
        Ok(entries
            .into_iter()
            .filter_map(|(k, v)| match v {
                Literal::Str(s) => Some((k, s)),
                _ => None,
            })
            .collect())
    }

    /// Memory in MB from an integer or a `"256MiB"` / `"1GiB"` string
    pub fn memory(&self, value: OptionValue) -> Result<OptionValue, CompileError> {
        let value = self.map_literals(value, &|field, lit| match lit {
            Literal::Str(s) => parse_memory(&s)
                .map(Literal::Int)
                .ok_or_else(|| field.invalid(format!("unrecognized memory size '{}'", s))),
            other => Ok(other),
        })?;
        self.int(value)
    }

    /// A number of vCPUs or the literal `"gcf_gen1"`
    pub fn cpu(&self, value: OptionValue) -> Result<OptionValue, CompileError> {
        self.check(
            value,
            "a number or \"gcf_gen1\"",
            &|lit| match lit {
                Literal::Int(_) | Literal::Float(_) => true,
                Literal::Str(s) => s == "gcf_gen1",
                _ => false,
            },
            &[ParamKind::Int, ParamKind::Float],
        )
    }

    /// Render a string-typed value as filter text
    pub fn filter_text(&self, value: OptionValue) -> Result<Option<String>, CompileError> {
        match self.string(value)? {
            OptionValue::Literal(Literal::Str(s)) => Ok(Some(s)),
            OptionValue::Reset => Ok(None),
            other => Ok(other.expression()),
        }
    }
}

/// `{{ params.X }}` wrapped in a one-element list
fn wrap_expression(value: &OptionValue) -> OptionValue {
    OptionValue::Literal(Literal::List(vec![Literal::Str(
        value.expression().unwrap_or_default(),
    )]))
}

/// Parse `"512MiB"`, `"512MB"`, `"1GiB"` or `"1GB"` into megabytes
pub(crate) fn parse_memory(text: &str) -> Option<i64> {
    const UNITS: &[(&str, i64)] = &[("MiB", 1), ("MB", 1), ("Mi", 1), ("GiB", 1024), ("GB", 1024), ("Gi", 1024)];
    let text = text.trim();
    UNITS.iter().find_map(|(suffix, factor)| {
        text.strip_suffix(suffix)
            .and_then(|amount| amount.trim().parse::<i64>().ok())
            .and_then(|amount| amount.checked_mul(*factor))
    })
}

#[cfg(test)]
mod tests {
    use crate::normalizer::fields::*;

    fn field(params: &ParamTable) -> Field<'_> {
        Field {
            params,
            option: "memory",
            location: &LOCATION,
        }
    }

    static LOCATION: SourceLocation = SourceLocation {
        file: String::new(),
        line: 1,
        column: 1,
    };

    #[test]
    fn test_parse_memory() {
        assert_eq!(parse_memory("256MiB"), Some(256));
        assert_eq!(parse_memory("1GiB"), Some(1024));
        assert_eq!(parse_memory("2GB"), Some(2048));
        assert_eq!(parse_memory("lots"), None);
        assert_eq!(parse_memory("9007199254740993GiB"), None);
    }

    #[test]
    fn test_oversized_memory_is_invalid() {
        let params = ParamTable::new();
        let result = field(&params).memory(OptionValue::str("9007199254740993GiB"));
        assert!(matches!(
            result,
            Err(CompileError::InvalidOption { ref option, .. }) if option == "memory"
        ));
    }

    #[test]
    fn test_memory_converts_strings_and_ternary_branches() -> Result<(), CompileError> {
        let params = ParamTable::new();
        let f = field(&params);
        assert_eq!(f.memory(OptionValue::str("512MiB"))?, OptionValue::int(512));
        assert_eq!(f.memory(OptionValue::int(256))?, OptionValue::int(256));
        assert!(matches!(
            f.memory(OptionValue::bool(true)),
            Err(CompileError::InvalidOption { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_int_rejects_strings() {
        let params = ParamTable::new();
        let f = field(&params);
        let Err(CompileError::InvalidOption { reason, .. }) = f.int(OptionValue::str("60")) else {
            panic!("expected InvalidOption");
        };
        assert_eq!(reason, "expected an integer, got string");
    }

    #[test]
    fn test_zero_and_false_are_kept() -> Result<(), CompileError> {
        let params = ParamTable::new();
        let f = field(&params);
        assert_eq!(f.int(OptionValue::int(0))?, OptionValue::int(0));
        assert_eq!(f.boolean(OptionValue::bool(false))?, OptionValue::bool(false));
        assert_eq!(f.int(OptionValue::Reset)?, OptionValue::Reset);
        Ok(())
    }

    #[test]
    fn test_string_list_wraps_scalars() -> Result<(), CompileError> {
        let params = ParamTable::new();
        let f = field(&params);
        assert_eq!(
            f.string_list(OptionValue::str("us-east1"))?,
            OptionValue::Literal(Literal::List(vec![Literal::Str("us-east1".to_string())]))
        );
        assert!(f
            .string_list(OptionValue::Literal(Literal::List(vec![Literal::Int(1)])))
            .is_err());
        Ok(())
    }

    #[test]
    fn test_empty_map_is_dropped() -> Result<(), CompileError> {
        let params = ParamTable::new();
        let f = field(&params);
        assert_eq!(f.string_map(OptionValue::Literal(Literal::Map(BTreeMap::new())))?, None);
        Ok(())
    }
}
