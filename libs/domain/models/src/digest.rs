use serde::{Deserialize, Serialize};
use std::fmt;

/// Content-address of a blob in the file cache. Equality defines blob
/// identity; the value itself carries no meaning beyond "same bytes in,
/// same digest out".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Digest(String);

impl Digest {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Digest {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Digest {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}
