//! Version triple parsed from compiler banner text.
//!
//! The first `major.minor.patch` run of ASCII digits anywhere in the text wins.
//! Banners that carry several triples (a year, a library version) are not
//! disambiguated.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

static TRIPLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([0-9]+)\.([0-9]+)\.([0-9]+)").expect("version regex is valid")
});

/// One numeric component, kept as the digits that were matched.
///
/// Digits are written to the header verbatim, so leading zeros survive and
/// there is no upper bound on the value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Component(String);

impl Component {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric value, or `None` if it does not fit in a `u64`.
    pub fn value(&self) -> Option<u64> {
        self.0.parse().ok()
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Version {
    pub major: Component,
    pub minor: Component,
    pub patch: Component,
}

impl Version {
    /// Find the first version triple in `text`.
    pub fn find(text: &str) -> Option<Self> {
        let caps = TRIPLE_RE.captures(text)?;
        Some(Version {
            major: Component(caps[1].to_string()),
            minor: Component(caps[2].to_string()),
            patch: Component(caps[3].to_string()),
        })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for Version {
    type Err = String;

    /// Strict parse: the whole string must be a single triple.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match Version::find(trimmed) {
            Some(v) if v.to_string() == trimmed => Ok(v),
            _ => Err(format!("'{s}' is not a MAJOR.MINOR.PATCH version")),
        }
    }
}
