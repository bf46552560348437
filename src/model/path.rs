use crate::error::{BridgeError, Result};

/// Slash-delimited hierarchical entity path, e.g. `/sys/power/bus_voltage`
///
/// The leading slash is optional; `sys/power` and `/sys/power` are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityPath {
    segments: Vec<String>,
}

impl EntityPath {
    /// Parse a path, rejecting empty input and empty segments (`/a//b`, `/a/`)
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.strip_prefix('/').unwrap_or(raw);
        if trimmed.is_empty() {
            return Err(BridgeError::InvalidArgument(format!(
                "empty entity path: {:?}",
                raw
            )));
        }

        let segments: Vec<String> = trimmed.split('/').map(str::to_string).collect();
        if segments.iter().any(|s| s.is_empty() || s.trim() != s) {
            return Err(BridgeError::InvalidArgument(format!(
                "malformed entity path: {:?}",
                raw
            )));
        }

        Ok(Self { segments })
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().map(String::as_str)
    }
}

impl std::fmt::Display for EntityPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for segment in &self.segments {
            write!(f, "/{}", segment)?;
        }
        Ok(())
    }
}

impl std::str::FromStr for EntityPath {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
