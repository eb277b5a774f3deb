//! Slash-delimited address patterns with `{name}` captures
//!
//! Used by the normalizer to validate event addresses and pick the filter
//! group, and by the dispatcher to match inbound resource paths.

use crate::errors::ManifestError;
use smallvec::SmallVec;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    /// `{name}` binds exactly one path segment
    Capture(String),
    /// `*` matches one segment without binding it
    Wildcard,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    segments: SmallVec<[Segment; 4]>,
}

impl PathPattern {
    /// Parse a pattern, ignoring leading and trailing `/`
    pub fn parse(pattern: &str) -> Result<Self, ManifestError> {
        let invalid = |reason: &str| ManifestError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = pattern.trim_matches('/');
        let mut segments = SmallVec::new();
        if trimmed.is_empty() {
            return Ok(PathPattern { segments });
        }

        for raw in trimmed.split('/') {
            if raw.is_empty() {
                return Err(invalid("empty path segment"));
            }
            let segment = if raw == "*" {
                Segment::Wildcard
            } else if raw.contains('{') || raw.contains('}') {
                let Some(name) = raw.strip_prefix('{').and_then(|s| s.strip_suffix('}')) else {
                    return Err(invalid("unbalanced braces or partial-segment capture"));
                };
                if !is_identifier(name) {
                    return Err(invalid(&format!("capture '{}' is not an identifier", name)));
                }
                Segment::Capture(name.to_string())
            } else {
                Segment::Literal(raw.to_string())
            };
            segments.push(segment);
        }

        Ok(PathPattern { segments })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn has_captures(&self) -> bool {
        self.segments
            .iter()
            .any(|s| matches!(s, Segment::Capture(_) | Segment::Wildcard))
    }

    pub fn capture_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Capture(name) => Some(name.as_str()),
            _ => None,
        })
    }

    /// Match a concrete resource path, returning the bound captures
    pub fn matches(&self, path: &str) -> Option<BTreeMap<String, String>> {
        let trimmed = path.trim_matches('/');
        let parts: SmallVec<[&str; 8]> = if trimmed.is_empty() {
            SmallVec::new()
        } else {
            trimmed.split('/').collect()
        };
        if parts.len() != self.segments.len() {
            return None;
        }

        let mut captures = BTreeMap::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Literal(lit) if lit == part => {}
                Segment::Literal(_) => return None,
                Segment::Wildcard => {}
                Segment::Capture(name) => {
                    captures.insert(name.clone(), part.to_string());
                }
            }
        }
        Some(captures)
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            match segment {
                Segment::Literal(lit) => f.write_str(lit)?,
                Segment::Capture(name) => write!(f, "{{{}}}", name)?,
                Segment::Wildcard => f.write_str("*")?,
            }
        }
        Ok(())
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use crate::errors::ManifestError;
    use crate::pattern::*;

    #[test]
    fn test_parse_literal_and_capture() -> Result<(), ManifestError> {
        let pattern = PathPattern::parse("/users/{userId}/")?;
        assert_eq!(
            pattern.segments(),
            &[
                Segment::Literal("users".to_string()),
                Segment::Capture("userId".to_string())
            ]
        );
        assert!(pattern.has_captures());
        assert_eq!(pattern.to_string(), "users/{userId}");
        Ok(())
    }

    #[test]
    fn test_parse_without_captures() -> Result<(), ManifestError> {
        let pattern = PathPattern::parse("config/site")?;
        assert!(!pattern.has_captures());
        assert_eq!(pattern.capture_names().count(), 0);
        Ok(())
    }

    #[test]
    fn test_parse_rejects_bad_captures() {
        for bad in ["users/{userId", "users/userId}", "users/{1abc}", "users/pre{id}", "a//b", "users/{}"] {
            let result = PathPattern::parse(bad);
            assert!(
                matches!(result, Err(ManifestError::InvalidPattern { .. })),
                "expected InvalidPattern for {bad}"
            );
        }
    }

    #[test]
    fn test_matches_binds_single_segment() -> Result<(), ManifestError> {
        let pattern = PathPattern::parse("users/{userId}")?;
        let Some(captures) = pattern.matches("/users/alice") else {
            panic!("pattern should match");
        };
        assert_eq!(captures.get("userId").map(String::as_str), Some("alice"));
        assert!(pattern.matches("users/alice/posts").is_none());
        assert!(pattern.matches("groups/alice").is_none());
        Ok(())
    }

    #[test]
    fn test_wildcard_matches_without_binding() -> Result<(), ManifestError> {
        let pattern = PathPattern::parse("*")?;
        let Some(captures) = pattern.matches("my-instance") else {
            panic!("wildcard should match");
        };
        assert!(captures.is_empty());
        Ok(())
    }
}
