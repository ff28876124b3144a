//! Component model: each `scheme`, `user_info`, `host`, path segment, query
//! value, and `fragment` is an immutable token sequence that exposes
//! `raw_value`, `encoded_value`, and a regex `pattern` fragment.
use crate::charset::{self, ComponentKind};
use crate::error::BuilderError;
use crate::scanner::{self, Parameter, ScanContext, Token};

#[derive(Debug, Clone)]
pub struct Component {
    pub kind: ComponentKind,
    pub tokens: Vec<Token>,
}

/// Resolves a bound value for a parameter hole, addressed both by name (when
/// present) and by its position among all holes in building order.
pub trait Bindings {
    fn resolve(&self, name: Option<&str>, position: usize) -> Option<String>;
}

impl Bindings for std::collections::HashMap<String, String> {
    fn resolve(&self, name: Option<&str>, _position: usize) -> Option<String> {
        name.and_then(|n| self.get(n)).cloned()
    }
}

impl Bindings for Vec<String> {
    fn resolve(&self, _name: Option<&str>, position: usize) -> Option<String> {
        self.get(position).cloned()
    }
}

impl Component {
    pub fn parse(
        raw: &str,
        kind: ComponentKind,
        parameterized: bool,
        path_pattern: bool,
    ) -> Result<Component, BuilderError> {
        let ctx = match kind {
            ComponentKind::PathSegment => ScanContext::PathSegment { path_pattern },
            _ => ScanContext::Other,
        };
        let tokens = scanner::scan(raw, parameterized, ctx)?;
        Ok(Component { kind, tokens })
    }

    pub fn literal(kind: ComponentKind, text: &str) -> Component {
        Component {
            kind,
            tokens: vec![Token::Literal(text.to_string())],
        }
    }

    pub fn is_exclusive_segment(&self) -> bool {
        self.tokens.len() == 1
            && matches!(&self.tokens[0], Token::Parameter(p) if p.exclusive)
    }

    pub fn has_parameters(&self) -> bool {
        self.tokens.iter().any(|t| matches!(t, Token::Parameter(_)))
    }

    /// Un-substituted form, with template holes rendered as `{name:regex}`.
    pub fn raw_value(&self) -> String {
        let mut out = String::new();
        for t in &self.tokens {
            match t {
                Token::Literal(s) => out.push_str(s),
                Token::Parameter(p) => {
                    out.push('{');
                    if let Some(n) = &p.name {
                        out.push_str(n);
                    }
                    out.push(':');
                    out.push_str(&p.regex);
                    out.push('}');
                }
            }
        }
        out
    }

    /// Literal text percent-encoded per this component's charset policy;
    /// template holes are left as in `raw_value`.
    pub fn encoded_value(&self) -> String {
        let mut out = String::new();
        for t in &self.tokens {
            match t {
                Token::Literal(s) => out.push_str(&charset::encode(self.kind, s)),
                Token::Parameter(p) => {
                    out.push('{');
                    if let Some(n) = &p.name {
                        out.push_str(n);
                    }
                    out.push(':');
                    out.push_str(&p.regex);
                    out.push('}');
                }
            }
        }
        out
    }

    /// Regex fragment with one capture group per parameter hole, plus the
    /// side-indexed parameter name list (None for unnamed holes).
    pub fn pattern(&self) -> (String, Vec<Option<String>>) {
        let mut regex = String::new();
        let mut names = Vec::new();
        for t in &self.tokens {
            match t {
                Token::Literal(s) => regex.push_str(&regex::escape(s)),
                Token::Parameter(p) => {
                    regex.push('(');
                    regex.push_str(&p.regex);
                    regex.push(')');
                    names.push(p.name.clone());
                }
            }
        }
        (regex, names)
    }

    pub fn parameters(&self) -> Vec<&Parameter> {
        self.tokens
            .iter()
            .filter_map(|t| match t {
                Token::Parameter(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    /// Substitutes bound values into each parameter hole. `position` is the
    /// running index of parameter holes across the whole URI being built;
    /// it is advanced by this call and must be threaded through components
    /// in builder order.
    pub fn build(
        &self,
        bindings: &dyn Bindings,
        escape: bool,
        position: &mut usize,
    ) -> Result<String, BuilderError> {
        let mut out = String::new();
        for t in &self.tokens {
            match t {
                Token::Literal(s) => out.push_str(&charset::encode(self.kind, s)),
                Token::Parameter(p) => {
                    let value = bindings.resolve(p.name.as_deref(), *position).ok_or_else(|| {
                        BuilderError::MissingParameter(
                            p.name.clone().unwrap_or_else(|| format!("#{}", position)),
                        )
                    })?;
                    *position += 1;

                    if escape {
                        out.push_str(&charset::encode(self.kind, &value));
                    } else {
                        out.push_str(&value);
                    }
                }
            }
        }
        Ok(out)
    }
}
