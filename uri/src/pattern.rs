//! A pattern is a regex string synthesized from the component model plus a
//! side-indexed parameter name list. `PathPattern` additionally keeps the
//! per-segment component list so it can participate in the inclusion
//! algorithm (`crate::inclusion`), which needs segment-level structure that
//! a flattened regex throws away.
use crate::component::Component;
use crate::inclusion::{self, Inclusion};
use crate::matcher::UriMatcher;
use common::errors::*;

#[derive(Debug, Clone)]
pub struct PathPattern {
    pub(crate) segments: Vec<Component>,
    pub(crate) regex: regex::Regex,
    pub(crate) param_names: Vec<Option<String>>,
    /// Whether the pattern's path ends with a literal trailing slash.
    pub(crate) trailing_slash: bool,
}

impl PathPattern {
    pub fn compile(segments: Vec<Component>, trailing_slash: bool) -> Result<PathPattern> {
        let mut regex = String::from("^");
        let mut param_names = Vec::new();

        for (i, seg) in segments.iter().enumerate() {
            if i > 0 {
                regex.push('/');
            }
            let (fragment, names) = seg.pattern();
            regex.push_str(&fragment);
            param_names.extend(names);
        }
        if trailing_slash {
            regex.push('/');
        }
        regex.push('$');

        let compiled = regex::Regex::new(&regex)
            .map_err(|e| format_err!("invalid synthesized path pattern regex: {}", e))?;

        Ok(PathPattern {
            segments,
            regex: compiled,
            param_names,
            trailing_slash,
        })
    }

    pub fn regex_str(&self) -> &str {
        self.regex.as_str()
    }

    pub fn matcher<'p, 't>(&'p self, text: &'t str) -> UriMatcher<'p, 't> {
        UriMatcher::new(self, text)
    }

    /// `self.includes(other)`: every path matching `other` also matches
    /// `self`.
    pub fn includes(&self, other: &PathPattern) -> Inclusion {
        inclusion::includes(&self.segments, &other.segments)
    }

    /// A rough specificity score: more literal characters, fewer unnamed
    /// wildcards, `**` least specific, custom-regex parameters most
    /// specific among holes. Used to order matchers of different patterns
    /// on the same input so the more specific pattern sorts first.
    pub(crate) fn specificity(&self) -> Specificity {
        let mut literal_chars = 0i64;
        let mut unnamed_wildcards = 0i64;
        let mut has_double_star = false;
        let mut custom_regex_params = 0i64;

        for seg in &self.segments {
            for t in &seg.tokens {
                match t {
                    crate::scanner::Token::Literal(s) => literal_chars += s.len() as i64,
                    crate::scanner::Token::Parameter(p) => {
                        if p.exclusive {
                            has_double_star = true;
                        } else if p.name.is_none() && (p.regex == "[^/]*" || p.regex == "[^/]") {
                            unnamed_wildcards += 1;
                        } else {
                            custom_regex_params += 1;
                        }
                    }
                }
            }
        }

        Specificity {
            literal_chars,
            unnamed_wildcards,
            has_double_star,
            custom_regex_params,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Specificity {
    literal_chars: i64,
    unnamed_wildcards: i64,
    has_double_star: bool,
    custom_regex_params: i64,
}

impl PartialOrd for Specificity {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Specificity {
    /// Greater `Specificity` means "more specific"; sort descending to put
    /// the more specific pattern first.
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.literal_chars
            .cmp(&other.literal_chars)
            .then_with(|| other.unnamed_wildcards.cmp(&self.unnamed_wildcards))
            .then_with(|| {
                // "**" is less specific than any fixed wildcard count.
                other.has_double_star.cmp(&self.has_double_star)
            })
            .then_with(|| self.custom_regex_params.cmp(&other.custom_regex_params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charset::ComponentKind;

    fn segs(raw: &[&str]) -> Vec<Component> {
        raw.iter()
            .map(|s| Component::parse(s, ComponentKind::PathSegment, true, true).unwrap())
            .collect()
    }

    #[test]
    fn matches_literal_path() {
        let p = PathPattern::compile(segs(&["a", "b"]), false).unwrap();
        assert!(p.matcher("a/b").matches());
        assert!(!p.matcher("a/c").matches());
    }

    #[test]
    fn double_star_less_specific_than_fixed_wildcards() {
        let star = PathPattern::compile(segs(&["a", "**"]), false).unwrap();
        let fixed = PathPattern::compile(segs(&["a", "*", "*"]), false).unwrap();
        assert!(fixed.specificity() > star.specificity());
    }
}
