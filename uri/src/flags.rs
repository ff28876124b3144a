/// Options captured at builder-construction time; immutable afterwards.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UriFlags(u8);

impl UriFlags {
    /// Enable `{name}` / `{name:regex}` template parsing.
    pub const PARAMETERIZED: UriFlags = UriFlags(0b001);
    /// Eagerly collapse `.` and `..` path segments at build time.
    pub const NORMALIZED: UriFlags = UriFlags(0b010);
    /// Enable `*` / `?` / `**` ant-style glob tokens.
    pub const PATH_PATTERN: UriFlags = UriFlags(0b100);

    pub const NONE: UriFlags = UriFlags(0);

    pub fn contains(&self, other: UriFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_parameterized(&self) -> bool {
        self.contains(Self::PARAMETERIZED)
    }

    pub fn is_normalized(&self) -> bool {
        self.contains(Self::NORMALIZED)
    }

    pub fn is_path_pattern(&self) -> bool {
        self.contains(Self::PATH_PATTERN)
    }
}

impl std::ops::BitOr for UriFlags {
    type Output = UriFlags;
    fn bitor(self, rhs: UriFlags) -> UriFlags {
        UriFlags(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for UriFlags {
    fn bitor_assign(&mut self, rhs: UriFlags) {
        self.0 |= rhs.0;
    }
}

/// Constrains which components may be set on a builder.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum RequestTargetForm {
    /// `scheme://host[:port]` with no path.
    Origin,
    /// A bare path, no query.
    Path,
    /// A path plus an optional query. Mutually exclusive with `PATH_PATTERN`.
    PathQuery,
}

impl RequestTargetForm {
    pub fn check_compatible(&self, flags: UriFlags) -> Result<(), crate::error::BuilderError> {
        if *self == RequestTargetForm::PathQuery && flags.is_path_pattern() {
            return Err(crate::error::BuilderError::IncompatibleFlags);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_query_rejects_path_pattern() {
        let flags = UriFlags::PATH_PATTERN;
        assert!(RequestTargetForm::PathQuery.check_compatible(flags).is_err());
        assert!(RequestTargetForm::Path.check_compatible(flags).is_ok());
    }

    #[test]
    fn combination_of_flags() {
        let flags = UriFlags::PARAMETERIZED | UriFlags::NORMALIZED;
        assert!(flags.is_parameterized());
        assert!(flags.is_normalized());
        assert!(!flags.is_path_pattern());
    }
}
