#[derive(Debug, PartialEq, Eq, Clone)]
pub enum BuilderError {
    /// A substituted value or parameter name contained a character not
    /// allowed by the component's grammar.
    InvalidCharacter(String),
    /// A `**` token was mixed with literal text in the same segment.
    ExclusiveSegmentMisuse(String),
    /// `PATH_QUERY` request-target form combined with `PATH_PATTERN`.
    IncompatibleFlags,
    /// A referenced template parameter has no bound value.
    MissingParameter(String),
    /// A template could not be parsed (unbalanced braces, empty name when a
    /// name was expected, ...).
    MalformedTemplate(String),
}

impl std::fmt::Display for BuilderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuilderError::InvalidCharacter(s) => write!(f, "invalid character in '{}'", s),
            BuilderError::ExclusiveSegmentMisuse(s) => {
                write!(f, "'**' may not be mixed with other text in segment '{}'", s)
            }
            BuilderError::IncompatibleFlags => {
                write!(f, "PATH_QUERY request-target form is incompatible with PATH_PATTERN")
            }
            BuilderError::MissingParameter(name) => {
                write!(f, "missing value for parameter '{}'", name)
            }
            BuilderError::MalformedTemplate(s) => write!(f, "malformed template: {}", s),
        }
    }
}

impl std::error::Error for BuilderError {}

impl From<BuilderError> for common::errors::Error {
    fn from(e: BuilderError) -> Self {
        common::errors::format_err!("{}", e)
    }
}
