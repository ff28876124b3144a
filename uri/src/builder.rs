//! Composes immutable URIs and URI patterns from typed components. Mutator
//! methods consume and return `self` (value-semantic append/override); the
//! contract does not require structural sharing between revisions.
use crate::charset::ComponentKind;
use crate::component::{Bindings, Component};
use crate::error::BuilderError;
use crate::flags::{RequestTargetForm, UriFlags};
use crate::normalize;
use crate::pattern::PathPattern;
use common::errors::*;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct UriBuilder {
    flags: UriFlags,
    form: Option<RequestTargetForm>,
    scheme: Option<Component>,
    user_info: Option<Component>,
    host: Option<Component>,
    port: Option<Component>,
    leading_slash: bool,
    path_segments: Vec<Component>,
    trailing_slash: bool,
    query_raw: Option<Component>,
    query_params: Vec<(Component, Component)>,
    fragment: Option<Component>,
}

impl UriBuilder {
    pub fn new(flags: UriFlags) -> UriBuilder {
        UriBuilder {
            flags,
            ..Default::default()
        }
    }

    pub fn with_form(mut self, form: RequestTargetForm) -> Result<UriBuilder> {
        form.check_compatible(self.flags)?;
        self.form = Some(form);
        Ok(self)
    }

    fn parameterized(&self) -> bool {
        self.flags.is_parameterized()
    }

    fn path_pattern(&self) -> bool {
        self.flags.is_path_pattern()
    }

    pub fn scheme(mut self, raw: &str) -> Result<UriBuilder> {
        self.scheme = Some(Component::parse(
            raw,
            ComponentKind::Scheme,
            self.parameterized(),
            false,
        )?);
        Ok(self)
    }

    /// Dropped if no host is ever set (`user_info` without a host is a
    /// no-op, per the builder's ordering rules).
    pub fn user_info(mut self, raw: &str) -> Result<UriBuilder> {
        self.user_info = Some(Component::parse(
            raw,
            ComponentKind::UserInfo,
            self.parameterized(),
            false,
        )?);
        Ok(self)
    }

    pub fn host(mut self, raw: &str) -> Result<UriBuilder> {
        self.host = Some(Component::parse(
            raw,
            ComponentKind::Host,
            self.parameterized(),
            false,
        )?);
        Ok(self)
    }

    pub fn port(mut self, raw: &str) -> Result<UriBuilder> {
        self.port = Some(Component::parse(
            raw,
            ComponentKind::Host,
            self.parameterized(),
            false,
        )?);
        Ok(self)
    }

    /// Sets the authority as one opaque string, bypassing user-info/host/
    /// port decomposition.
    pub fn authority(mut self, raw: &str) -> Result<UriBuilder> {
        self.host = Some(Component::parse(
            raw,
            ComponentKind::Host,
            self.parameterized(),
            false,
        )?);
        self.port = None;
        self.user_info = None;
        Ok(self)
    }

    /// Replaces the whole path. A leading `/` makes the path absolute; a
    /// trailing `/` is tracked as a flag, not as a synthetic empty segment.
    pub fn path(mut self, raw: &str) -> Result<UriBuilder> {
        self.leading_slash = raw.starts_with('/');
        let trimmed = raw.strip_prefix('/').unwrap_or(raw);
        self.trailing_slash = !trimmed.is_empty() && trimmed.ends_with('/');
        let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);

        self.path_segments.clear();
        if !trimmed.is_empty() {
            for part in trimmed.split('/') {
                self.path_segments.push(Component::parse(
                    part,
                    ComponentKind::PathSegment,
                    self.parameterized(),
                    self.path_pattern(),
                )?);
            }
        }
        Ok(self)
    }

    /// Appends one path segment. An empty segment clears/sets the trailing
    /// slash flag instead of pushing a synthetic empty entry; pushing a
    /// real segment after a trailing slash clears it.
    pub fn segment(mut self, raw: &str) -> Result<UriBuilder> {
        if raw.is_empty() {
            self.trailing_slash = true;
            return Ok(self);
        }

        self.trailing_slash = false;
        self.path_segments.push(Component::parse(
            raw,
            ComponentKind::PathSegment,
            self.parameterized(),
            self.path_pattern(),
        )?);
        Ok(self)
    }

    /// Sets an opaque raw query string, replacing any parameter-keyed view
    /// previously built up via `query_parameter`.
    pub fn query(mut self, raw: &str) -> Result<UriBuilder> {
        self.query_raw = Some(Component::parse(
            raw,
            ComponentKind::Query,
            self.parameterized(),
            false,
        )?);
        self.query_params.clear();
        Ok(self)
    }

    /// Appends a `name=value` pair; appends to any previously parsed `?...`
    /// string rather than replacing it.
    pub fn query_parameter(mut self, name: &str, value: &str) -> Result<UriBuilder> {
        let name_c = Component::parse(
            name,
            ComponentKind::QueryParameterName,
            self.parameterized(),
            false,
        )?;
        let value_c = Component::parse(
            value,
            ComponentKind::QueryParameterValue,
            self.parameterized(),
            false,
        )?;
        self.query_params.push((name_c, value_c));
        Ok(self)
    }

    pub fn fragment(mut self, raw: &str) -> Result<UriBuilder> {
        self.fragment = Some(Component::parse(
            raw,
            ComponentKind::Fragment,
            self.parameterized(),
            false,
        )?);
        Ok(self)
    }

    fn effective_segments(&self) -> Vec<Component> {
        if self.flags.is_normalized() {
            let literals: Vec<String> = self
                .path_segments
                .iter()
                .map(|c| c.raw_value())
                .collect();
            normalize::normalize_segments(&literals, self.leading_slash)
                .into_iter()
                .map(|s| Component::literal(ComponentKind::PathSegment, &s))
                .collect()
        } else {
            self.path_segments.clone()
        }
    }

    fn build_path_only(
        &self,
        bindings: &dyn Bindings,
        escape: bool,
        position: &mut usize,
    ) -> Result<String> {
        let segs = self.effective_segments();
        let mut out = String::new();
        if self.leading_slash {
            out.push('/');
        }
        for (i, seg) in segs.iter().enumerate() {
            if i > 0 {
                out.push('/');
            }
            out.push_str(&seg.build(bindings, escape, position).map_err(Error::from)?);
        }
        if self.trailing_slash && !segs.is_empty() {
            out.push('/');
        }
        Ok(out)
    }

    fn build_query_part(
        &self,
        bindings: &dyn Bindings,
        escape: bool,
        position: &mut usize,
    ) -> Result<Option<String>> {
        if !self.query_params.is_empty() {
            let mut parts = Vec::new();
            for (name, value) in &self.query_params {
                let n = name.build(bindings, escape, position).map_err(Error::from)?;
                let v = value.build(bindings, escape, position).map_err(Error::from)?;
                parts.push(format!("{}={}", n, v));
            }
            return Ok(Some(parts.join("&")));
        }
        if let Some(q) = &self.query_raw {
            return Ok(Some(q.build(bindings, escape, position).map_err(Error::from)?));
        }
        Ok(None)
    }

    /// Substitutes bound template values and assembles the full URI string.
    pub fn build(&self, bindings: &dyn Bindings, escape: bool) -> Result<String> {
        let mut position = 0usize;
        let mut out = String::new();

        if let Some(scheme) = &self.scheme {
            out.push_str(&scheme.build(bindings, escape, &mut position).map_err(Error::from)?);
            out.push(':');
        }

        if let Some(host) = &self.host {
            out.push_str("//");
            if let Some(ui) = &self.user_info {
                out.push_str(&ui.build(bindings, escape, &mut position).map_err(Error::from)?);
                out.push('@');
            }
            out.push_str(&host.build(bindings, escape, &mut position).map_err(Error::from)?);
            if let Some(port) = &self.port {
                out.push(':');
                out.push_str(&port.build(bindings, escape, &mut position).map_err(Error::from)?);
            }
        }

        out.push_str(&self.build_path_only(bindings, escape, &mut position)?);

        if let Some(q) = self.build_query_part(bindings, escape, &mut position)? {
            out.push('?');
            out.push_str(&q);
        }

        if let Some(frag) = &self.fragment {
            out.push('#');
            out.push_str(&frag.build(bindings, escape, &mut position).map_err(Error::from)?);
        }

        Ok(out)
    }

    pub fn build_string(&self) -> Result<String> {
        let empty: HashMap<String, String> = HashMap::new();
        self.build(&empty, true)
    }

    pub fn build_path(&self, bindings: &dyn Bindings, escape: bool) -> Result<String> {
        let mut position = 0usize;
        let mut out = self.build_path_only(bindings, escape, &mut position)?;
        if let Some(q) = self.build_query_part(bindings, escape, &mut position)? {
            out.push('?');
            out.push_str(&q);
        }
        Ok(out)
    }

    pub fn build_query(&self, bindings: &dyn Bindings, escape: bool) -> Result<Option<String>> {
        let mut position = 0usize;
        self.build_query_part(bindings, escape, &mut position)
    }

    /// The un-substituted query string, with any templates rendered
    /// verbatim as `{name:regex}`.
    pub fn build_raw_query(&self) -> Option<String> {
        if !self.query_params.is_empty() {
            let parts: Vec<String> = self
                .query_params
                .iter()
                .map(|(n, v)| format!("{}={}", n.raw_value(), v.raw_value()))
                .collect();
            return Some(parts.join("&"));
        }
        self.query_raw.as_ref().map(|q| q.raw_value())
    }

    pub fn build_raw_path(&self) -> String {
        let mut out = String::new();
        if self.leading_slash {
            out.push('/');
        }
        for (i, seg) in self.effective_segments().iter().enumerate() {
            if i > 0 {
                out.push('/');
            }
            out.push_str(&seg.raw_value());
        }
        if self.trailing_slash && !self.path_segments.is_empty() {
            out.push('/');
        }
        out
    }

    /// Synthesizes a matchable pattern over the path only. Per this crate's
    /// scope, `build_pattern` and `build_path_pattern` are equivalent: the
    /// inclusion algorithm and the end-to-end test battery operate on path
    /// patterns, so there is no independent full-URI (scheme+authority)
    /// pattern synthesis.
    pub fn build_path_pattern(&self) -> Result<PathPattern> {
        PathPattern::compile(self.effective_segments(), self.trailing_slash)
    }

    pub fn build_pattern(&self) -> Result<PathPattern> {
        self.build_path_pattern()
    }
}

/// A best-effort parser used to support the `parse(build(values)).build() ==
/// build(values)` round-trip property for fully-substituted (template-free)
/// URI strings produced by `build_string`.
pub fn parse_uri(s: &str) -> Result<UriBuilder> {
    let mut builder = UriBuilder::new(UriFlags::NONE);

    let (scheme, rest) = match s.find(':') {
        Some(idx) if s[..idx].chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
            && !s[..idx].is_empty()
            && s[..idx].chars().next().map_or(false, |c| c.is_ascii_alphabetic()) =>
        {
            (Some(&s[..idx]), &s[idx + 1..])
        }
        _ => (None, s),
    };

    if let Some(scheme) = scheme {
        builder = builder.scheme(scheme)?;
    }

    let (authority, rest) = if let Some(stripped) = rest.strip_prefix("//") {
        let end = stripped
            .find(|c| c == '/' || c == '?' || c == '#')
            .unwrap_or(stripped.len());
        (Some(&stripped[..end]), &stripped[end..])
    } else {
        (None, rest)
    };

    if let Some(authority) = authority {
        let (userinfo, hostport) = match authority.find('@') {
            Some(idx) => (Some(&authority[..idx]), &authority[idx + 1..]),
            None => (None, authority),
        };
        if let Some(ui) = userinfo {
            builder = builder.user_info(ui)?;
        }
        match hostport.rfind(':') {
            Some(idx) if hostport[idx + 1..].chars().all(|c| c.is_ascii_digit()) => {
                builder = builder.host(&hostport[..idx])?;
                builder = builder.port(&hostport[idx + 1..])?;
            }
            _ => {
                builder = builder.host(hostport)?;
            }
        }
    }

    let frag_idx = rest.find('#');
    let (rest, fragment) = match frag_idx {
        Some(idx) => (&rest[..idx], Some(&rest[idx + 1..])),
        None => (rest, None),
    };

    let query_idx = rest.find('?');
    let (path, query) = match query_idx {
        Some(idx) => (&rest[..idx], Some(&rest[idx + 1..])),
        None => (rest, None),
    };

    builder = builder.path(path)?;
    if let Some(q) = query {
        builder = builder.query(q)?;
    }
    if let Some(f) = fragment {
        builder = builder.fragment(f)?;
    }

    Ok(builder)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_substitution_with_reserved_character() -> Result<()> {
        let b = UriBuilder::new(UriFlags::PARAMETERIZED)
            .path("a/{p1}/b/_{p2:.*}_")?;

        let mut values = HashMap::new();
        values.insert("p1".to_string(), "1".to_string());
        values.insert("p2".to_string(), "2/b".to_string());

        assert_eq!(b.build(&values, true)?, "a/1/b/_2%2Fb_");
        assert_eq!(b.build(&values, false)?, "a/1/b/_2/b_");
        Ok(())
    }

    #[test]
    fn normalization_with_dot_dot() -> Result<()> {
        let mut b = UriBuilder::new(UriFlags::NORMALIZED).path("/a/b/c/")?;
        for _ in 0..5 {
            b = b.segment("..")?;
        }
        assert_eq!(b.build_string()?, "/../..");
        Ok(())
    }

    #[test]
    fn round_trip_without_templates() -> Result<()> {
        let b = UriBuilder::new(UriFlags::NONE)
            .scheme("http")?
            .host("example.com")?
            .port("8080")?
            .path("/a/b")?
            .query("x=1")?
            .fragment("top")?;

        let built = b.build_string()?;
        assert_eq!(built, "http://example.com:8080/a/b?x=1#top");

        let reparsed = parse_uri(&built)?;
        assert_eq!(reparsed.build_string()?, built);
        Ok(())
    }

    #[test]
    fn path_query_rejects_path_pattern_flag() {
        let r = UriBuilder::new(UriFlags::PATH_PATTERN).with_form(RequestTargetForm::PathQuery);
        assert!(r.is_err());
    }

    #[test]
    fn query_parameters_append_to_raw_query() -> Result<()> {
        let b = UriBuilder::new(UriFlags::NONE)
            .query_parameter("a", "1")?
            .query_parameter("b", "2")?;
        assert_eq!(b.build_query(&HashMap::<String, String>::new(), true)?, Some("a=1&b=2".to_string()));
        Ok(())
    }
}
