//! Path prefixes that bypass authentication.
//!
//! # Matching Behavior
//!
//! A request path is exempt when it starts with any configured prefix:
//!
//! - matching is a plain, case-sensitive `starts_with`, not a glob or regex
//! - `/health` exempts `/health`, `/health/live` and also `/healthz`
//! - entries are trimmed, and empty entries are dropped, so a stray comma in
//!   `EXCLUDE_PATHS` never exempts every path
//! - an empty or blank configuration exempts nothing
//!
//! Matching runs on the raw path, which is also the path forwarded. A path
//! with `.` or `..` segments (literal or percent-encoded) would be resolved
//! to a different path by URL normalization, so such paths are refused
//! before matching; see [`has_dot_segments`].

use std::convert::Infallible;
use std::str::FromStr;
use std::sync::Arc;

use tracing::warn;

/// Ordered, immutable list of exempt path prefixes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExemptionList {
    prefixes: Arc<[String]>,
}

impl ExemptionList {
    /// Build from individual prefixes. Each one is trimmed; blanks are dropped.
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let prefixes: Vec<String> = prefixes
            .into_iter()
            .map(|p| p.as_ref().trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();

        for prefix in prefixes.iter().filter(|p| !p.starts_with('/')) {
            warn!(prefix = %prefix, "Exempt prefix does not start with '/' and will never match");
        }

        Self {
            prefixes: prefixes.into(),
        }
    }

    /// Parse a comma-separated list such as `"/health, /api/auth/"`.
    pub fn parse(raw: &str) -> Self {
        Self::new(raw.split(','))
    }

    /// Whether `path` starts with any configured prefix.
    pub fn is_exempt(&self, path: &str) -> bool {
        self.prefixes.iter().any(|prefix| path.starts_with(prefix.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.prefixes.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.prefixes.iter().map(String::as_str)
    }
}

/// Whether `path` has a `.` or `..` segment, in any mix of literal dots and
/// `%2e`. Backslashes count as separators, as URL parsers treat them so for
/// http(s).
pub fn has_dot_segments(path: &str) -> bool {
    path.split(['/', '\\']).any(|segment| {
        let decoded = segment.to_ascii_lowercase().replace("%2e", ".");
        decoded == "." || decoded == ".."
    })
}

impl FromStr for ExemptionList {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}
