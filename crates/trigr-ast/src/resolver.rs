//! Call-site resolver
//!
//! Binds the arguments of a registration call to typed slots: the addressing
//! argument, the handler and the option keywords. The handler is only
//! checked for presence; it is never inspected.

use ahash::AHashSet;
use trigr_manifest::SourceLocation;

use crate::errors::CompileError;
use crate::evaluator::unsupported;
use crate::families::{Family, BASE_OPTIONS};
use crate::scanner::{CallForm, CallSite, GlobalOptionsSite};
use crate::syntax::{Arg, Expr};

const HANDLER_KEYWORD: &str = "handler";

#[derive(Debug, Clone, PartialEq)]
pub struct Address {
    pub value: String,
    pub location: SourceLocation,
}

/// One option keyword as written at the call site
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptionArg<'s> {
    pub name: &'s str,
    pub value: &'s Expr,
    pub location: &'s SourceLocation,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedCall<'s> {
    pub site: &'s CallSite,
    pub address: Option<Address>,
    /// Keyword options in source order; `None`-valued keywords are dropped
    pub options: Vec<OptionArg<'s>>,
    /// Exported name when the source makes one visible
    pub entry_point: Option<String>,
}

pub fn resolve(site: &CallSite) -> Result<ResolvedCall<'_>, CompileError> {
    let call = site.display_name();
    let shape_error = |location: &SourceLocation, reason: String| {
        CompileError::UnrecognizedTriggerShape {
            location: location.clone(),
            call: call.clone(),
            reason,
        }
    };

    if let CallForm::BareDecorator { .. } = site.form {
        return Err(shape_error(
            &site.location,
            "registration decorators must be called".to_string(),
        ));
    }

    let mut positional: Vec<&Expr> = Vec::new();
    let mut keywords: Vec<(&str, &Expr, &SourceLocation)> = Vec::new();
    let mut seen = AHashSet::new();
    for arg in &site.args {
        match arg {
            Arg::Positional(expr) => {
                if !keywords.is_empty() {
                    return Err(shape_error(
                        &expr.location,
                        "positional argument follows keyword argument".to_string(),
                    ));
                }
                positional.push(expr);
            }
            Arg::Keyword {
                name,
                value,
                location,
            } => {
                if !seen.insert(name.as_str()) {
                    return Err(shape_error(
                        location,
                        format!("keyword '{}' given more than once", name),
                    ));
                }
                keywords.push((name.as_str(), value, location));
            }
            Arg::Splat(location) => {
                return Err(shape_error(
                    location,
                    "argument unpacking is not supported".to_string(),
                ));
            }
        }
    }
    let mut positional = positional.into_iter();

    // Addressing argument: first positional or its keyword
    let address_keyword = site.family.address_keyword();
    let address = match address_keyword {
        Some(keyword) => {
            let from_keyword = keywords.iter().find(|(name, _, _)| *name == keyword);
            let expr = match (positional.next(), from_keyword) {
                (Some(_), Some((_, _, location))) => {
                    return Err(shape_error(
                        location,
                        format!("'{}' given both positionally and by keyword", keyword),
                    ));
                }
                (Some(expr), None) => Some(expr),
                (None, Some((_, expr, _))) => Some(*expr),
                (None, None) => None,
            };
            let Some(expr) = expr.filter(|e| !e.is_none()) else {
                return Err(CompileError::MissingRequiredArgument {
                    location: site.location.clone(),
                    call: site.display_name(),
                    argument: keyword.to_string(),
                });
            };
            let Some(value) = expr.as_str() else {
                return Err(unsupported(
                    expr,
                    &format!("'{}' must be a string literal", keyword),
                ));
            };
            Some(Address {
                value: value.to_string(),
                location: expr.location.clone(),
            })
        }
        None => None,
    };

    // Handler: decorator target, next positional or `handler=`
    let handler_keyword = keywords.iter().find(|(name, _, _)| *name == HANDLER_KEYWORD);
    let entry_point = match &site.form {
        CallForm::Decorator { function } => {
            if let Some(extra) = positional.next() {
                return Err(shape_error(
                    &extra.location,
                    "decorator form takes the handler from the decorated function".to_string(),
                ));
            }
            if let Some((_, _, location)) = handler_keyword {
                return Err(shape_error(
                    location,
                    "decorator form cannot also pass handler=".to_string(),
                ));
            }
            Some(function.clone())
        }
        CallForm::Call { binding } => {
            let handler = match (positional.next(), handler_keyword) {
                (Some(_), Some((_, _, location))) => {
                    return Err(shape_error(
                        location,
                        "handler given both positionally and by keyword".to_string(),
                    ));
                }
                (Some(expr), None) => Some(expr),
                (None, Some((_, expr, _))) => Some(*expr),
                (None, None) => None,
            };
            let Some(handler) = handler.filter(|e| !e.is_none()) else {
                return Err(CompileError::MissingRequiredArgument {
                    location: site.location.clone(),
                    call: site.display_name(),
                    argument: HANDLER_KEYWORD.to_string(),
                });
            };
            binding
                .clone()
                .or_else(|| handler.as_name().map(str::to_string))
        }
        CallForm::BareDecorator { .. } => None,
    };

    if let Some(extra) = positional.next() {
        return Err(shape_error(
            &extra.location,
            "too many positional arguments".to_string(),
        ));
    }

    let mut options = Vec::new();
    for (name, value, location) in keywords {
        if Some(name) == address_keyword || name == HANDLER_KEYWORD {
            continue;
        }
        if !site.family.accepts_option(name) {
            return Err(shape_error(
                location,
                format!("unknown option '{}' for {}", name, family_label(site.family)),
            ));
        }
        if value.is_none() {
            continue;
        }
        options.push(OptionArg {
            name,
            value,
            location,
        });
    }

    Ok(ResolvedCall {
        site,
        address,
        options,
        entry_point,
    })
}

/// Bind the keywords of `options.setGlobalOptions(...)`
pub fn resolve_global_options(site: &GlobalOptionsSite) -> Result<Vec<OptionArg<'_>>, CompileError> {
    let shape_error = |location: &SourceLocation, reason: String| {
        CompileError::UnrecognizedTriggerShape {
            location: location.clone(),
            call: "options.setGlobalOptions".to_string(),
            reason,
        }
    };

    let mut options = Vec::new();
    let mut seen = AHashSet::new();
    for arg in &site.args {
        match arg {
            Arg::Positional(expr) => {
                return Err(shape_error(
                    &expr.location,
                    "global options are keyword-only".to_string(),
                ))
            }
            Arg::Splat(location) => {
                return Err(shape_error(
                    location,
                    "argument unpacking is not supported".to_string(),
                ))
            }
            Arg::Keyword {
                name,
                value,
                location,
            } => {
                if !seen.insert(name.as_str()) {
                    return Err(shape_error(
                        location,
                        format!("keyword '{}' given more than once", name),
                    ));
                }
                if !BASE_OPTIONS.contains(&name.as_str()) {
                    return Err(shape_error(
                        location,
                        format!("unknown global option '{}'", name),
                    ));
                }
                if !value.is_none() {
                    options.push(OptionArg {
                        name,
                        value,
                        location,
                    });
                }
            }
        }
    }
    Ok(options)
}

fn family_label(family: Family) -> String {
    format!("{:?} triggers", family)
}

#[cfg(test)]
mod tests {
    use crate::errors::CompileError;
    use crate::resolver::*;
    use crate::scanner::scan_source;

    fn resolve_first(source: &str) -> Result<(String, Option<String>, Vec<String>), CompileError> {
        let scan = scan_source("main.py", source)?;
        let Some(site) = scan.call_sites.first() else {
            panic!("no call site");
        };
        let resolved = resolve(site)?;
        Ok((
            resolved.address.map(|a| a.value).unwrap_or_default(),
            resolved.entry_point,
            resolved.options.iter().map(|o| o.name.to_string()).collect(),
        ))
    }

    #[test]
    fn test_decorator_form() -> Result<(), CompileError> {
        let (address, entry, options) = resolve_first(
            "@https.onRequest('helloWorld', memory=512, timeoutSeconds=None)\ndef hello(req): pass\n",
        )?;
        assert_eq!(address, "helloWorld");
        assert_eq!(entry.as_deref(), Some("hello"));
        assert_eq!(options, vec!["memory"]);
        Ok(())
    }

    #[test]
    fn test_call_form_with_keyword_address() -> Result<(), CompileError> {
        let (address, entry, options) = resolve_first(
            "relay = pubsub.onMessagePublished(topic='my-topic', handler=handle, retry=True)\n",
        )?;
        assert_eq!(address, "my-topic");
        assert_eq!(entry.as_deref(), Some("relay"));
        assert_eq!(options, vec!["retry"]);

        let (_, entry, _) = resolve_first("pubsub.onMessagePublished('t', handle)\n")?;
        assert_eq!(entry.as_deref(), Some("handle"));
        Ok(())
    }

    #[test]
    fn test_missing_arguments() {
        assert!(matches!(
            resolve_first("@pubsub.onMessagePublished(retry=True)\ndef f(e): pass\n"),
            Err(CompileError::MissingRequiredArgument { ref argument, .. }) if argument == "topic"
        ));
        assert!(matches!(
            resolve_first("pubsub.onMessagePublished('my-topic')\n"),
            Err(CompileError::MissingRequiredArgument { ref argument, .. }) if argument == "handler"
        ));
        assert!(matches!(
            resolve_first("@https.onRequest(name=None)\ndef f(r): pass\n"),
            Err(CompileError::MissingRequiredArgument { .. })
        ));
    }

    #[test]
    fn test_unrecognized_shapes() {
        let cases = [
            "@https.onRequest('a', handler_fn)\ndef f(r): pass\n",
            "@https.onRequest('a', **opts)\ndef f(r): pass\n",
            "@https.onRequest('a', retry=True)\ndef f(r): pass\n",
            "@https.onRequest('a', memory=1, memory=2)\ndef f(r): pass\n",
            "https.onRequest('a', handle, extra)\n",
            "https.onRequest('a', handle, handler=other)\n",
            "@identity.beforeUserCreated\ndef f(e): pass\n",
        ];
        for source in cases {
            let result = resolve_first(source);
            assert!(
                matches!(result, Err(CompileError::UnrecognizedTriggerShape { .. })),
                "expected UnrecognizedTriggerShape for {source}, got {result:?}"
            );
        }
    }

    #[test]
    fn test_non_literal_address_is_unsupported() {
        let result = resolve_first("NAME = 'x'\n@https.onRequest(NAME)\ndef f(r): pass\n");
        assert!(matches!(
            result,
            Err(CompileError::UnsupportedExpression { .. })
        ));
    }

    #[test]
    fn test_global_options_keywords_only() -> Result<(), CompileError> {
        let scan = scan_source("main.py", "options.setGlobalOptions(region='us-east1', memory=None)\n")?;
        let options = resolve_global_options(&scan.global_options[0])?;
        assert_eq!(options.len(), 1);
        assert_eq!(options[0].name, "region");

        let scan = scan_source("main.py", "options.setGlobalOptions('us-east1')\n")?;
        assert!(resolve_global_options(&scan.global_options[0]).is_err());
        Ok(())
    }
}
