use crate::pattern::PathPattern;
use std::collections::HashMap;

pub struct UriMatcher<'p, 't> {
    pattern: &'p PathPattern,
    text: &'t str,
    captures: Option<regex::Captures<'t>>,
}

impl<'p, 't> UriMatcher<'p, 't> {
    pub(crate) fn new(pattern: &'p PathPattern, text: &'t str) -> Self {
        let captures = pattern.regex.captures(text);
        UriMatcher {
            pattern,
            text,
            captures,
        }
    }

    pub fn matches(&self) -> bool {
        self.captures.is_some()
    }

    pub fn parameter_value(&self, name: &str) -> Option<&'t str> {
        let captures = self.captures.as_ref()?;
        self.pattern
            .param_names
            .iter()
            .position(|n| n.as_deref() == Some(name))
            .and_then(|i| captures.get(i + 1))
            .map(|m| m.as_str())
    }

    pub fn parameters(&self) -> HashMap<String, String> {
        let mut out = HashMap::new();
        let Some(captures) = self.captures.as_ref() else {
            return out;
        };
        for (i, name) in self.pattern.param_names.iter().enumerate() {
            if let Some(name) = name {
                if let Some(m) = captures.get(i + 1) {
                    out.insert(name.clone(), m.as_str().to_string());
                }
            }
        }
        out
    }

    pub fn text(&self) -> &'t str {
        self.text
    }
}

/// Orders two matchers of (potentially different) patterns run against the
/// same input, more-specific pattern first.
pub fn specificity_order(a: &PathPattern, b: &PathPattern) -> std::cmp::Ordering {
    b.specificity().cmp(&a.specificity())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charset::ComponentKind;
    use crate::component::Component;

    #[test]
    fn extracts_named_parameter() {
        let segs = vec![
            Component::parse("users", ComponentKind::PathSegment, true, true).unwrap(),
            Component::parse("{id}", ComponentKind::PathSegment, true, true).unwrap(),
        ];
        let pattern = PathPattern::compile(segs, false).unwrap();
        let m = pattern.matcher("users/42");
        assert!(m.matches());
        assert_eq!(m.parameter_value("id"), Some("42"));
    }

    #[test]
    fn unnamed_parameter_excluded_from_map() {
        let segs = vec![
            Component::parse("{:.*}", ComponentKind::PathSegment, true, true).unwrap(),
        ];
        let pattern = PathPattern::compile(segs, false).unwrap();
        let m = pattern.matcher("anything");
        assert!(m.matches());
        assert!(m.parameters().is_empty());
    }
}
