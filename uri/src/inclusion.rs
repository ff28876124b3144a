//! Four-valued inclusion relation between two path patterns, used to decide
//! whether one pattern (e.g. an interceptor route) subsumes another.
use crate::component::Component;

#[derive(Debug, Clone, PartialEq, Eq, Copy)]
pub enum Inclusion {
    /// Every string matching the right pattern also matches the left one.
    /// Semantically-equivalent patterns also report `Included` both ways.
    Included,
    /// No string matches both patterns.
    Disjoint,
    /// The two patterns overlap but neither is a superset of the other.
    Indeterminate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum SegClass {
    Literal(String),
    /// A segment mixing literal text with `*`/`?`/named-parameter tokens.
    LiteralWithWildcards,
    /// A full-segment parameter with a non-default regex, e.g. `{id:[0-9]+}`.
    ParamCustomRegex(String),
    /// A bare `*` or `?` occupying the whole segment.
    Wildcard,
    /// An exclusive `**` segment.
    MultiWildcard,
}

fn classify(segment: &Component) -> SegClass {
    if segment.tokens.len() == 1 {
        match &segment.tokens[0] {
            crate::scanner::Token::Literal(s) => return SegClass::Literal(s.clone()),
            crate::scanner::Token::Parameter(p) => {
                if p.exclusive {
                    return SegClass::MultiWildcard;
                }
                if p.name.is_none() && (p.regex == "[^/]*" || p.regex == "[^/]") {
                    return SegClass::Wildcard;
                }
                return SegClass::ParamCustomRegex(p.regex.clone());
            }
        }
    }
    SegClass::LiteralWithWildcards
}

/// `a.includes(b)`: classify and segment-align both sides, walking
/// left-to-right; `**` tries every split against the remaining suffix of
/// the other side and short-circuits as soon as an `Included` split is
/// found (`Included` dominates `Indeterminate`; `Disjoint` only once every
/// split disproves it).
pub fn includes(a: &[Component], b: &[Component]) -> Inclusion {
    let a: Vec<SegClass> = a.iter().map(classify).collect();
    let b: Vec<SegClass> = b.iter().map(classify).collect();
    cmp(&a, &b)
}

fn cmp(a: &[SegClass], b: &[SegClass]) -> Inclusion {
    if a.is_empty() && b.is_empty() {
        return Inclusion::Included;
    }
    if a.is_empty() {
        // `a` matches only the empty suffix. That overlaps with `b` iff
        // `b` can also match zero segments, i.e. every remaining `b`
        // segment is `**` — never a superset (`b` also matches longer
        // suffixes `a` can't), but not disjoint either.
        return if b.iter().all(|seg| matches!(seg, SegClass::MultiWildcard)) {
            Inclusion::Indeterminate
        } else {
            Inclusion::Disjoint
        };
    }
    if b.is_empty() {
        return if matches!(a[0], SegClass::MultiWildcard) {
            cmp(&a[1..], b)
        } else {
            Inclusion::Disjoint
        };
    }

    let (ha, ta) = (&a[0], &a[1..]);
    let (hb, tb) = (&b[0], &b[1..]);

    if matches!(ha, SegClass::MultiWildcard) {
        let mut indeterminate = false;
        for k in 0..=b.len() {
            match cmp(ta, &b[k..]) {
                Inclusion::Included => return Inclusion::Included,
                Inclusion::Indeterminate => indeterminate = true,
                Inclusion::Disjoint => {}
            }
        }
        return if indeterminate {
            Inclusion::Indeterminate
        } else {
            Inclusion::Disjoint
        };
    }

    if matches!(hb, SegClass::MultiWildcard) {
        // `b`'s `**` can expand to any number of segments; approximate by
        // checking the zero-segment expansion (drop it) and a one-segment
        // expansion (consume one literal position from `a`). Unlike
        // `combine`, these are alternatives, not a head-then-rest
        // conjunction: `b`'s match set is the union over every expansion,
        // so `a` is disjoint from it only if every expansion is disjoint,
        // and a superset only if every expansion is.
        let zero = cmp(a, tb);
        let one = cmp(ta, b);
        return fold_alternatives(zero, one);
    }

    match (ha, hb) {
        (SegClass::Literal(la), SegClass::Literal(lb)) => {
            if la == lb {
                cmp(ta, tb)
            } else {
                Inclusion::Disjoint
            }
        }
        (SegClass::Wildcard, SegClass::Literal(_)) => cmp(ta, tb),
        (SegClass::Wildcard, SegClass::Wildcard) => cmp(ta, tb),
        (SegClass::ParamCustomRegex(r), SegClass::Literal(lb)) => {
            match regex::Regex::new(&format!("^(?:{})$", r)) {
                Ok(re) if re.is_match(lb) => cmp(ta, tb),
                _ => Inclusion::Disjoint,
            }
        }
        // Custom-regex parameter compared with `*` or another custom
        // regex: cannot prove subset or disjointness in general.
        (SegClass::ParamCustomRegex(_), SegClass::Wildcard)
        | (SegClass::ParamCustomRegex(_), SegClass::ParamCustomRegex(_)) => {
            combine(Inclusion::Indeterminate, cmp(ta, tb))
        }
        // A fixed literal can't be a superset of anything but an identical
        // literal; anything else at least overlaps with that one value.
        (SegClass::Literal(_), _) => combine(Inclusion::Indeterminate, cmp(ta, tb)),
        _ => combine(Inclusion::Indeterminate, cmp(ta, tb)),
    }
}

/// Folds a local verdict with the verdict of the remaining suffix: an
/// `Indeterminate`/`Disjoint` head never gets upgraded to `Included` by a
/// downstream match, but a downstream `Disjoint` always wins (since
/// alignment failed somewhere).
fn combine(head: Inclusion, rest: Inclusion) -> Inclusion {
    use Inclusion::*;
    match (head, rest) {
        (Disjoint, _) | (_, Disjoint) => Disjoint,
        (Indeterminate, _) | (_, Indeterminate) => Indeterminate,
        (Included, Included) => Included,
    }
}

/// Folds two alternative expansions of a `**` into one verdict: disjoint
/// only if both alternatives are, included only if both are, otherwise
/// indeterminate. The opposite of `combine`'s head-then-rest fold.
fn fold_alternatives(x: Inclusion, y: Inclusion) -> Inclusion {
    use Inclusion::*;
    match (x, y) {
        (Disjoint, Disjoint) => Disjoint,
        (Included, Included) => Included,
        _ => Indeterminate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charset::ComponentKind;

    fn path(segments: &[&str]) -> Vec<Component> {
        segments
            .iter()
            .map(|s| Component::parse(s, ComponentKind::PathSegment, true, true).unwrap())
            .collect()
    }

    #[test]
    fn double_star_includes_deeper_path() {
        let a = path(&["a", "**"]);
        let b = path(&["a", "b", "c"]);
        assert_eq!(includes(&a, &b), Inclusion::Included);
    }

    #[test]
    fn fixed_wildcard_arity_disjoint_with_fewer_segments() {
        let a = path(&["a", "*", "*", "*"]);
        let b = path(&["a", "b", "c"]);
        assert_eq!(includes(&a, &b), Inclusion::Disjoint);
    }

    #[test]
    fn wildcard_against_double_star_is_indeterminate() {
        let a = path(&["a", "*", "b", "c"]);
        let b = path(&["a", "**", "b", "c"]);
        assert_eq!(includes(&a, &b), Inclusion::Indeterminate);
    }

    #[test]
    fn identical_literal_paths_are_included() {
        let a = path(&["a", "b", "c"]);
        let b = path(&["a", "b", "c"]);
        assert_eq!(includes(&a, &b), Inclusion::Included);
    }

    #[test]
    fn differing_literal_paths_are_disjoint() {
        let a = path(&["a", "b"]);
        let b = path(&["a", "c"]);
        assert_eq!(includes(&a, &b), Inclusion::Disjoint);
    }

    #[test]
    fn literal_is_indeterminate_against_a_pattern_that_includes_it() {
        // /a/b vs /a/** overlap (both match /a/b), but /a/b isn't a
        // superset of /a/** (which also matches /a/x, /a/y/z, ...), so
        // the literal-includes-pattern direction must be Indeterminate,
        // not Disjoint, even though /a/** does include /a/b the other
        // way round.
        let a = path(&["a", "b"]);
        let b = path(&["a", "**"]);
        assert_eq!(includes(&a, &b), Inclusion::Indeterminate);
        assert_eq!(includes(&b, &a), Inclusion::Included);
    }
}
