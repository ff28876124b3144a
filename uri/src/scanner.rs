//! Walks a raw component string and yields a sequence of literal text and
//! `{name[:regex]}` template holes, including the ant-style glob shorthands
//! `*`, `?`, and `**`.
use crate::error::BuilderError;

lazy_static::lazy_static! {
    static ref NAME_RE: regex::Regex = regex::Regex::new("^[A-Za-z_][A-Za-z0-9_]*$").unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub name: Option<String>,
    pub regex: String,
    /// Set for a `**` (or `{name:**}`) hole that occupies an entire path
    /// segment by itself.
    pub exclusive: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Literal(String),
    Parameter(Parameter),
}

/// Where a scan is taking place; determines the default regex for an
/// unconstrained parameter and whether bare glob tokens are recognized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanContext {
    PathSegment { path_pattern: bool },
    Other,
}

impl ScanContext {
    fn default_regex(&self) -> &'static str {
        match self {
            ScanContext::PathSegment { .. } => "[^/]*",
            ScanContext::Other => ".*",
        }
    }

    fn path_pattern_enabled(&self) -> bool {
        matches!(self, ScanContext::PathSegment { path_pattern: true })
    }
}

fn glob_regex(token: &str) -> Option<(&'static str, bool)> {
    match token {
        "?" => Some(("[^/]", false)),
        "*" => Some(("[^/]*", false)),
        "**" => Some(("[^/]*(?:/[^/]*)*", true)),
        _ => None,
    }
}

fn validate_name(name: &str) -> Result<(), BuilderError> {
    if !NAME_RE.is_match(name) {
        return Err(BuilderError::InvalidCharacter(name.to_string()));
    }
    Ok(())
}

/// Scans one path segment or component value for templates and (when
/// enabled) bare glob tokens, returning the token sequence in source order.
pub fn scan(raw: &str, parameterized: bool, ctx: ScanContext) -> Result<Vec<Token>, BuilderError> {
    let mut tokens = Vec::new();
    let mut literal = String::new();
    let chars: Vec<char> = raw.chars().collect();
    let mut i = 0;

    let flush_literal = |literal: &mut String, tokens: &mut Vec<Token>| {
        if !literal.is_empty() {
            tokens.push(Token::Literal(std::mem::take(literal)));
        }
    };

    while i < chars.len() {
        let c = chars[i];

        if parameterized && c == '\\' && i + 1 < chars.len() && chars[i + 1] == '{' {
            literal.push('{');
            i += 2;
            continue;
        }

        if parameterized && c == '{' {
            flush_literal(&mut literal, &mut tokens);
            let (param, consumed) = scan_template(&chars[i..], ctx)?;
            tokens.push(Token::Parameter(param));
            i += consumed;
            continue;
        }

        if ctx.path_pattern_enabled() {
            if chars[i..].starts_with(&['*', '*']) {
                flush_literal(&mut literal, &mut tokens);
                let (regex, exclusive) = glob_regex("**").unwrap();
                tokens.push(Token::Parameter(Parameter {
                    name: None,
                    regex: regex.to_string(),
                    exclusive,
                }));
                i += 2;
                continue;
            }
            if c == '*' || c == '?' {
                flush_literal(&mut literal, &mut tokens);
                let (regex, exclusive) = glob_regex(&c.to_string()).unwrap();
                tokens.push(Token::Parameter(Parameter {
                    name: None,
                    regex: regex.to_string(),
                    exclusive,
                }));
                i += 1;
                continue;
            }
        }

        literal.push(c);
        i += 1;
    }

    flush_literal(&mut literal, &mut tokens);

    let exclusive_count = tokens
        .iter()
        .filter(|t| matches!(t, Token::Parameter(p) if p.exclusive))
        .count();
    if exclusive_count > 0 && tokens.len() > 1 {
        return Err(BuilderError::ExclusiveSegmentMisuse(raw.to_string()));
    }

    Ok(tokens)
}

/// Parses a single `{...}` template starting at `chars[0] == '{'`. Returns
/// the parameter plus the number of `char`s consumed (including braces).
/// Brace depth tracks unescaped `{`/`}` so a regex quantifier can embed
/// its own un-escaped braces like `{name:a{2,3}}` as far as depth balancing
/// allows; `\{`/`\}` never affect depth and are kept as literal braces in
/// the regex text.
fn scan_template(chars: &[char], ctx: ScanContext) -> Result<(Parameter, usize), BuilderError> {
    let mut depth = 0i32;
    let mut i = 0usize;
    let mut inner = String::new();

    loop {
        if i >= chars.len() {
            return Err(BuilderError::MalformedTemplate(
                "unterminated '{'".to_string(),
            ));
        }

        let c = chars[i];

        if c == '\\' && i + 1 < chars.len() && (chars[i + 1] == '{' || chars[i + 1] == '}') {
            inner.push(chars[i + 1]);
            i += 2;
            continue;
        }

        if c == '{' {
            depth += 1;
            if depth > 1 {
                inner.push(c);
            }
            i += 1;
            continue;
        }

        if c == '}' {
            depth -= 1;
            if depth == 0 {
                i += 1;
                break;
            }
            inner.push(c);
            i += 1;
            continue;
        }

        inner.push(c);
        i += 1;
    }

    let (name_part, regex_part) = match inner.find(':') {
        Some(idx) => (&inner[..idx], Some(&inner[idx + 1..])),
        None => (inner.as_str(), None),
    };

    let name = if name_part.is_empty() {
        None
    } else {
        validate_name(name_part)?;
        Some(name_part.to_string())
    };

    let (regex, exclusive) = match regex_part {
        None => (ctx.default_regex().to_string(), false),
        Some(r) if matches!(ctx, ScanContext::PathSegment { .. }) && glob_regex(r).is_some() => {
            let (rx, ex) = glob_regex(r).unwrap();
            (rx.to_string(), ex)
        }
        Some(r) => (r.to_string(), false),
    };

    Ok((
        Parameter {
            name,
            regex,
            exclusive,
        },
        i,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path_ctx(pattern: bool) -> ScanContext {
        ScanContext::PathSegment {
            path_pattern: pattern,
        }
    }

    #[test]
    fn plain_literal() {
        let tokens = scan("hello", true, path_ctx(false)).unwrap();
        assert_eq!(tokens, vec![Token::Literal("hello".to_string())]);
    }

    #[test]
    fn named_parameter_default_regex() {
        let tokens = scan("{p1}", true, path_ctx(false)).unwrap();
        assert_eq!(
            tokens,
            vec![Token::Parameter(Parameter {
                name: Some("p1".to_string()),
                regex: "[^/]*".to_string(),
                exclusive: false,
            })]
        );
    }

    #[test]
    fn unnamed_parameter_with_custom_regex() {
        let tokens = scan("_{:.*}_", true, ScanContext::Other).unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Literal("_".to_string()),
                Token::Parameter(Parameter {
                    name: None,
                    regex: ".*".to_string(),
                    exclusive: false,
                }),
                Token::Literal("_".to_string()),
            ]
        );
    }

    #[test]
    fn rejects_invalid_name() {
        assert!(scan("{1abc}", true, path_ctx(false)).is_err());
    }

    #[test]
    fn bare_globs_in_path_pattern() {
        let tokens = scan("a*b?", true, path_ctx(true)).unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Literal("a".to_string()),
                Token::Parameter(Parameter {
                    name: None,
                    regex: "[^/]*".to_string(),
                    exclusive: false,
                }),
                Token::Literal("b".to_string()),
                Token::Parameter(Parameter {
                    name: None,
                    regex: "[^/]".to_string(),
                    exclusive: false,
                }),
            ]
        );
    }

    #[test]
    fn exclusive_double_star_alone() {
        let tokens = scan("**", true, path_ctx(true)).unwrap();
        assert_eq!(tokens.len(), 1);
        match &tokens[0] {
            Token::Parameter(p) => assert!(p.exclusive),
            _ => panic!("expected parameter"),
        }
    }

    #[test]
    fn exclusive_double_star_mixed_is_rejected() {
        assert!(scan("a**", true, path_ctx(true)).is_err());
        assert!(scan("_{p:**}", true, path_ctx(true)).is_err());
    }

    #[test]
    fn named_double_star_alone_is_exclusive() {
        let tokens = scan("{p:**}", true, path_ctx(true)).unwrap();
        assert_eq!(tokens.len(), 1);
        match &tokens[0] {
            Token::Parameter(p) => {
                assert!(p.exclusive);
                assert_eq!(p.name.as_deref(), Some("p"));
            }
            _ => panic!("expected parameter"),
        }
    }

    #[test]
    fn escaped_brace_is_literal() {
        let tokens = scan("\\{not-a-template\\}", true, path_ctx(false)).unwrap();
        assert_eq!(
            tokens,
            vec![Token::Literal("{not-a-template}".to_string())]
        );
    }
}
