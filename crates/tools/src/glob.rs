//! Path filter for `search_files`.
//!
//! `*` matches any run of non-separator characters, `**` any run
//! including separators, `?` a single non-separator character.

use ::glob::{MatchOptions, Pattern, PatternError};

const OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// A compiled glob matched against `/`-separated relative paths.
#[derive(Debug, Clone)]
pub struct PathGlob(Pattern);

impl PathGlob {
    pub fn new(raw: &str) -> Result<Self, PatternError> {
        Pattern::new(raw.trim().trim_start_matches("./")).map(Self)
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.0.matches_with(path, OPTIONS)
    }
}
