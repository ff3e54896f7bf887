use crate::error::GatewayError;
use regex::Regex;

/// A compiled path expression.
///
/// The matcher is anchored at the start of the incoming path and its first
/// capture group captures the mount actual — the portion of the path the
/// route is mounted at, excluding any trailing child path.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    pub matcher: Regex,
    /// `Some(normalized expression)` when the expression contains no
    /// parameters or escapes and matches as a literal prefix.
    pub static_mount: Option<String>,
    /// Length of the literal prefix before the first `:`, or the full
    /// expression length when no parameter is present. Primary sort key
    /// for route selection.
    pub base_specificity: usize,
}

impl CompiledPattern {
    pub fn is_static_mount(&self) -> bool {
        self.static_mount.is_some()
    }
}

/// Normalize a path expression: leading `/`, no trailing `/` except at root.
pub fn normalize(expr: &str) -> String {
    let mut path = if expr.starts_with('/') {
        expr.to_string()
    } else {
        format!("/{}", expr)
    };
    while path.len() > 1 && path.ends_with('/') {
        path.pop();
    }
    path
}

fn has_meta(expr: &str) -> bool {
    expr.contains(|c| matches!(c, ':' | '(' | ')' | '\\'))
}

enum TrailingWildcard {
    /// `:name*` — zero or more further segments.
    Star,
    /// `:name+` — at least one further segment.
    Plus,
}

pub fn compile(raw: &str) -> Result<CompiledPattern, GatewayError> {
    let expr = normalize(raw);

    if !has_meta(&expr) {
        let matcher = build_regex(&format!("^({})(?:/.*)?$", regex::escape(&expr)), &expr)?;
        return Ok(CompiledPattern {
            matcher,
            base_specificity: expr.len(),
            static_mount: Some(expr),
        });
    }

    let parts: Vec<&str> = expr.split('/').filter(|p| !p.is_empty()).collect();
    let trailing = parts.last().and_then(|p| trailing_wildcard(p));
    let mount_parts = match trailing {
        Some(_) => &parts[..parts.len() - 1],
        None => &parts[..],
    };

    let mut mount_pattern = String::new();
    for part in mount_parts {
        mount_pattern.push('/');
        mount_pattern.push_str(&translate_segment(part, &expr)?);
    }

    let pattern = match trailing {
        Some(TrailingWildcard::Plus) => format!("^({})/.+$", mount_pattern),
        _ => format!("^({})(?:/.*)?$", mount_pattern),
    };

    Ok(CompiledPattern {
        matcher: build_regex(&pattern, &expr)?,
        static_mount: None,
        base_specificity: base_specificity(&expr),
    })
}

fn build_regex(pattern: &str, expr: &str) -> Result<Regex, GatewayError> {
    Regex::new(pattern)
        .map_err(|e| GatewayError::Config(format!("invalid path expression {:?}: {}", expr, e)))
}

/// Detect `:NAME*` / `:NAME+` in the final segment.
fn trailing_wildcard(part: &str) -> Option<TrailingWildcard> {
    let rest = part.strip_prefix(':')?;
    let (marker, name) = if let Some(name) = rest.strip_suffix('*') {
        (TrailingWildcard::Star, name)
    } else if let Some(name) = rest.strip_suffix('+') {
        (TrailingWildcard::Plus, name)
    } else {
        return None;
    };
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return None;
    }
    Some(marker)
}

/// Translate one path segment to a regex fragment.
///
/// Backslash escapes the next character. `:name` emits the default
/// one-segment group; `:name(FRAGMENT)` embeds the balanced parenthesized
/// fragment as a capture group, unescaping its backslash escapes once.
/// Everything else is a regex-escaped literal.
fn translate_segment(part: &str, expr: &str) -> Result<String, GatewayError> {
    let mut out = String::new();
    let mut chars = part.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(next) => push_escaped(&mut out, next),
                None => {
                    return Err(GatewayError::Config(format!(
                        "invalid path expression {:?}: dangling escape",
                        expr
                    )))
                }
            },
            ':' => {
                let mut name = String::new();
                while let Some(&next) = chars.peek() {
                    if next.is_ascii_alphanumeric() || next == '_' {
                        name.push(next);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if name.is_empty() {
                    return Err(GatewayError::Config(format!(
                        "invalid path expression {:?}: parameter name expected after ':'",
                        expr
                    )));
                }
                if chars.peek() == Some(&'(') {
                    chars.next();
                    let mut depth = 1usize;
                    let mut fragment = String::new();
                    loop {
                        match chars.next() {
                            Some('\\') => match chars.next() {
                                Some(escaped) => fragment.push(escaped),
                                None => {
                                    return Err(GatewayError::Config(format!(
                                        "invalid path expression {:?}: dangling escape",
                                        expr
                                    )))
                                }
                            },
                            Some('(') => {
                                depth += 1;
                                fragment.push('(');
                            }
                            Some(')') => {
                                depth -= 1;
                                if depth == 0 {
                                    break;
                                }
                                fragment.push(')');
                            }
                            Some(other) => fragment.push(other),
                            None => {
                                return Err(GatewayError::Config(format!(
                                    "invalid path expression {:?}: unclosed parameter constraint",
                                    expr
                                )))
                            }
                        }
                    }
                    out.push('(');
                    out.push_str(&fragment);
                    out.push(')');
                } else {
                    out.push_str("([^/]+)");
                }
            }
            other => push_escaped(&mut out, other),
        }
    }

    Ok(out)
}

fn push_escaped(out: &mut String, c: char) {
    let mut buf = [0u8; 4];
    out.push_str(&regex::escape(c.encode_utf8(&mut buf)));
}

/// Length of the prefix up to but not including the first `:`.
fn base_specificity(expr: &str) -> usize {
    expr.find(':').unwrap_or(expr.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mount_of<'a>(p: &CompiledPattern, path: &'a str) -> Option<&'a str> {
        p.matcher
            .captures(path)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("/app"), "/app");
        assert_eq!(normalize("app"), "/app");
        assert_eq!(normalize("/app/"), "/app");
        assert_eq!(normalize("/"), "/");
        assert_eq!(normalize(""), "/");
        // already-normalized input is a fixed point
        assert_eq!(normalize(&normalize("/a/b/")), "/a/b");
    }

    #[test]
    fn test_static_mount() {
        let p = compile("/app").unwrap();
        assert_eq!(p.static_mount.as_deref(), Some("/app"));
        assert_eq!(p.base_specificity, 4);
        assert_eq!(mount_of(&p, "/app"), Some("/app"));
        assert_eq!(mount_of(&p, "/app/deep/page"), Some("/app"));
        assert_eq!(mount_of(&p, "/application"), None);
        assert_eq!(mount_of(&p, "/other"), None);
    }

    #[test]
    fn test_root_static_mount() {
        let p = compile("/").unwrap();
        assert_eq!(p.static_mount.as_deref(), Some("/"));
        assert_eq!(mount_of(&p, "/"), Some("/"));
        // the root literal does not match arbitrary children; selection
        // falls back to the root route instead
        assert_eq!(mount_of(&p, "/other"), None);
    }

    #[test]
    fn test_named_parameter() {
        let p = compile("/user/:id").unwrap();
        assert!(p.static_mount.is_none());
        assert_eq!(p.base_specificity, "/user/".len());
        assert_eq!(mount_of(&p, "/user/42"), Some("/user/42"));
        assert_eq!(mount_of(&p, "/user/42/profile"), Some("/user/42"));
        assert_eq!(mount_of(&p, "/user"), None);
    }

    #[test]
    fn test_parameter_constraint() {
        let p = compile("/v/:num([0-9]+)").unwrap();
        assert_eq!(mount_of(&p, "/v/123"), Some("/v/123"));
        assert_eq!(mount_of(&p, "/v/abc"), None);
    }

    #[test]
    fn test_constraint_unescapes_once() {
        // `\)` inside the constraint is a literal close paren
        let p = compile(r"/x/:v(a\)b)").unwrap();
        assert_eq!(mount_of(&p, "/x/a)b"), Some("/x/a)b"));
    }

    #[test]
    fn test_trailing_star_wildcard() {
        let p = compile("/files/:rest*").unwrap();
        assert_eq!(mount_of(&p, "/files"), Some("/files"));
        assert_eq!(mount_of(&p, "/files/a/b/c"), Some("/files"));
        assert_eq!(mount_of(&p, "/file"), None);
    }

    #[test]
    fn test_trailing_plus_wildcard() {
        let p = compile("/files/:rest+").unwrap();
        assert_eq!(mount_of(&p, "/files"), None);
        assert_eq!(mount_of(&p, "/files/a"), Some("/files"));
    }

    #[test]
    fn test_escaped_literal_is_not_a_parameter() {
        let p = compile(r"/a/\:b").unwrap();
        assert!(p.static_mount.is_none());
        assert_eq!(mount_of(&p, "/a/:b"), Some("/a/:b"));
        assert_eq!(mount_of(&p, "/a/x"), None);
    }

    #[test]
    fn test_base_specificity_without_parameter() {
        let p = compile("/app/api").unwrap();
        assert_eq!(p.base_specificity, "/app/api".len());
    }

    #[test]
    fn test_invalid_expressions() {
        assert!(compile("/x/:").is_err());
        assert!(compile("/x/:id(abc").is_err());
        assert!(compile(r"/x/trailing\").is_err());
    }

    #[test]
    fn test_recompile_accepts_same_language() {
        let a = compile("/shop/:item([a-z-]+)").unwrap();
        let b = compile("/shop/:item([a-z-]+)").unwrap();
        for path in ["/shop/red-hat", "/shop/RED", "/shop", "/shop/red-hat/x"] {
            assert_eq!(a.matcher.is_match(path), b.matcher.is_match(path));
        }
    }
}
