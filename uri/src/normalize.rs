//! Dot-segment removal (RFC 3986 §5.2.4), applied eagerly at build time when
//! `NORMALIZED` is set, after all components are bound but before pattern
//! synthesis.

/// `absolute` marks whether the path has a leading `/`; a leading-slash
/// sentinel anchors the path so popping never escapes root. For absolute
/// paths, surplus `..` beyond root survive unchanged only if they cannot pop
/// anything further (this mirrors the builder's observed `/a/b/c/` example,
/// which can walk all the way up to `/../..` once the path's own segments
/// are exhausted). For relative paths, a leading run of `..` is preserved.
pub fn normalize_segments(segments: &[String], absolute: bool) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(segments.len());

    for seg in segments {
        match seg.as_str() {
            "." => {
                // Dropped.
            }
            ".." => {
                match out.last().map(|s| s.as_str()) {
                    Some("..") => out.push("..".to_string()),
                    Some(_) => {
                        out.pop();
                    }
                    None => {
                        if absolute {
                            out.push("..".to_string());
                        } else {
                            out.push("..".to_string());
                        }
                    }
                }
            }
            _ => out.push(seg.clone()),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segs(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn collapses_dot_segments() {
        let out = normalize_segments(&segs(&["a", ".", "b"]), true);
        assert_eq!(out, segs(&["a", "b"]));
    }

    #[test]
    fn dot_dot_pops_preceding_segment() {
        let out = normalize_segments(&segs(&["a", "b", ".."]), true);
        assert_eq!(out, segs(&["a"]));
    }

    #[test]
    fn surplus_dot_dot_survives_past_root() {
        // path("/a/b/c/").segment("..") x5: the trailing slash is tracked
        // separately from the segment list (see builder::PathBuilder), so
        // the segment list itself is just [a, b, c, "..", "..", "..", "..", ".."].
        // Popping a, b, c leaves two ".." with nothing left to pop.
        let out = normalize_segments(&segs(&["a", "b", "c", "..", "..", "..", "..", ".."]), true);
        assert_eq!(out, segs(&["..", ".."]));
    }
}
