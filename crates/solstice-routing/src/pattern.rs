//! Route pattern syntax: literal segments plus `{name}`, `{name:int}` and
//! `{name:bool}` parameters.

use thiserror::Error;

/// Constraint attached to a pattern parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// Any non-empty segment.
    Str,
    /// Must parse as a signed 64-bit integer.
    Int,
    /// Must parse as `true` or `false`.
    Bool,
}

impl ParamKind {
    fn parse(constraint: &str) -> Option<Self> {
        match constraint {
            "int" => Some(ParamKind::Int),
            "bool" => Some(ParamKind::Bool),
            _ => None,
        }
    }

    /// Check a raw path value against this constraint.
    pub fn accepts(&self, value: &str) -> bool {
        match self {
            ParamKind::Str => !value.is_empty(),
            ParamKind::Int => value.parse::<i64>().is_ok(),
            ParamKind::Bool => value.parse::<bool>().is_ok(),
        }
    }
}

/// One segment of a parsed pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Param { name: String, kind: ParamKind },
}

/// Errors from [`RoutePattern::parse`].
#[derive(Debug, Error)]
pub enum PatternError {
    #[error("route pattern is empty")]
    Empty,

    #[error("malformed parameter segment '{segment}' in '{pattern}'")]
    MalformedParameter { pattern: String, segment: String },

    #[error("unknown constraint '{constraint}' in '{pattern}'")]
    UnknownConstraint { pattern: String, constraint: String },

    #[error("duplicate parameter '{name}' in '{pattern}'")]
    DuplicateParameter { pattern: String, name: String },
}

/// A parsed route pattern.
#[derive(Debug, Clone)]
pub struct RoutePattern {
    raw: String,
    segments: Vec<Segment>,
}

impl RoutePattern {
    /// Parse a pattern such as `/b/sum/{x:int}/{y:int}`.
    pub fn parse(pattern: &str) -> Result<Self, PatternError> {
        let trimmed = pattern.trim();
        if trimmed.is_empty() || trimmed == "/" {
            return Err(PatternError::Empty);
        }

        let mut segments = Vec::new();
        let mut seen = Vec::new();

        for part in trimmed.split('/').filter(|p| !p.is_empty()) {
            if let Some(inner) = part.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
                let (name, constraint) = match inner.split_once(':') {
                    Some((name, constraint)) => (name, Some(constraint)),
                    None => (inner, None),
                };

                if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
                {
                    return Err(PatternError::MalformedParameter {
                        pattern: trimmed.to_string(),
                        segment: part.to_string(),
                    });
                }

                let kind = match constraint {
                    None => ParamKind::Str,
                    Some(c) => ParamKind::parse(c).ok_or_else(|| {
                        PatternError::UnknownConstraint {
                            pattern: trimmed.to_string(),
                            constraint: c.to_string(),
                        }
                    })?,
                };

                if seen.contains(&name.to_string()) {
                    return Err(PatternError::DuplicateParameter {
                        pattern: trimmed.to_string(),
                        name: name.to_string(),
                    });
                }
                seen.push(name.to_string());

                segments.push(Segment::Param {
                    name: name.to_string(),
                    kind,
                });
            } else if part.contains('{') || part.contains('}') {
                return Err(PatternError::MalformedParameter {
                    pattern: trimmed.to_string(),
                    segment: part.to_string(),
                });
            } else {
                segments.push(Segment::Literal(part.to_string()));
            }
        }

        let raw = if trimmed.starts_with('/') {
            trimmed.to_string()
        } else {
            format!("/{trimmed}")
        };

        Ok(Self { raw, segments })
    }

    /// The normalized pattern text, always with a leading slash.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Parsed segments.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// First literal segment, used as the default plugin name.
    pub fn first_segment(&self) -> Option<&str> {
        self.segments.iter().find_map(|s| match s {
            Segment::Literal(l) => Some(l.as_str()),
            Segment::Param { .. } => None,
        })
    }

    /// Render in the router's path syntax (`/:name` placeholders).
    pub fn to_router_path(&self) -> String {
        let mut path = String::new();
        for segment in &self.segments {
            path.push('/');
            match segment {
                Segment::Literal(l) => path.push_str(l),
                Segment::Param { name, .. } => {
                    path.push(':');
                    path.push_str(name);
                }
            }
        }
        path
    }

    /// Check already-extracted raw parameters against the typed
    /// constraints. A failing constraint means the route does not match.
    pub fn accepts(&self, params: &[(String, String)]) -> bool {
        self.segments.iter().all(|segment| match segment {
            Segment::Literal(_) => true,
            Segment::Param { name, kind } => params
                .iter()
                .find(|(n, _)| n == name)
                .is_some_and(|(_, value)| kind.accepts(value)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_typed_segments() {
        let pattern = RoutePattern::parse("/b/sum/{x:int}/{y:int}").unwrap();
        assert_eq!(pattern.raw(), "/b/sum/{x:int}/{y:int}");
        assert_eq!(pattern.first_segment(), Some("b"));
        assert_eq!(pattern.to_router_path(), "/b/sum/:x/:y");
    }

    #[test]
    fn untyped_and_bool_segments() {
        let pattern = RoutePattern::parse("toggle/{name}/{on:bool}").unwrap();
        assert_eq!(pattern.raw(), "/toggle/{name}/{on:bool}");
        assert_eq!(pattern.to_router_path(), "/toggle/:name/:on");
    }

    #[test]
    fn rejects_bad_patterns() {
        assert!(matches!(RoutePattern::parse(""), Err(PatternError::Empty)));
        assert!(matches!(RoutePattern::parse("/"), Err(PatternError::Empty)));
        assert!(matches!(
            RoutePattern::parse("/a/{x:float}"),
            Err(PatternError::UnknownConstraint { .. })
        ));
        assert!(matches!(
            RoutePattern::parse("/a/{}"),
            Err(PatternError::MalformedParameter { .. })
        ));
        assert!(matches!(
            RoutePattern::parse("/a/{x}/{x}"),
            Err(PatternError::DuplicateParameter { .. })
        ));
        assert!(matches!(
            RoutePattern::parse("/a/b{x}"),
            Err(PatternError::MalformedParameter { .. })
        ));
    }

    #[test]
    fn typed_constraints_gate_matching() {
        let pattern = RoutePattern::parse("/b/sum/{x:int}/{y:int}").unwrap();

        let good = vec![
            ("x".to_string(), "3".to_string()),
            ("y".to_string(), "4".to_string()),
        ];
        assert!(pattern.accepts(&good));

        let bad = vec![
            ("x".to_string(), "three".to_string()),
            ("y".to_string(), "4".to_string()),
        ];
        assert!(!pattern.accepts(&bad));
    }

    #[test]
    fn first_segment_skips_parameters() {
        let pattern = RoutePattern::parse("/{id}/detail").unwrap();
        assert_eq!(pattern.first_segment(), Some("detail"));
    }
}
