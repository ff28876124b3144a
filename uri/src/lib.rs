pub mod builder;
pub mod charset;
pub mod component;
pub mod error;
pub mod flags;
pub mod inclusion;
pub mod matcher;
pub mod normalize;
pub mod pattern;
pub mod scanner;

pub use builder::{parse_uri, UriBuilder};
pub use error::BuilderError;
pub use flags::{RequestTargetForm, UriFlags};
pub use inclusion::Inclusion;
pub use matcher::UriMatcher;
pub use pattern::PathPattern;
