//! Operating mode of a running application.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Named configuration profile controlling disclosure behavior.
///
/// Parsing never fails and is exact: only `development` and `production`
/// name the built-in modes, anything else is kept as-is in
/// [`OperatingMode::Other`], and an empty value means development.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum OperatingMode {
    /// Local development. Error pages carry full failure detail.
    #[default]
    Development,
    /// Production deployment.
    Production,
    /// Any other profile name (e.g. `test`, `staging`).
    Other(String),
}

impl OperatingMode {
    /// Parse a mode name. Names are compared exactly, so `Production` is
    /// [`OperatingMode::Other`].
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "" | "development" => Self::Development,
            "production" => Self::Production,
            other => Self::Other(other.to_owned()),
        }
    }

    /// Returns the canonical name of the mode.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Other(name) => name,
        }
    }

    /// Whether failure detail may be disclosed to clients.
    #[must_use]
    pub const fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }

    #[must_use]
    pub const fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

impl fmt::Display for OperatingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for OperatingMode {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<OperatingMode> for String {
    fn from(mode: OperatingMode) -> Self {
        mode.as_str().to_owned()
    }
}

impl std::str::FromStr for OperatingMode {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_modes() {
        assert_eq!(OperatingMode::parse("development"), OperatingMode::Development);
        assert_eq!(OperatingMode::parse("production"), OperatingMode::Production);
    }

    #[test]
    fn test_parse_empty_defaults_to_development() {
        assert_eq!(OperatingMode::parse(""), OperatingMode::Development);
        assert_eq!(OperatingMode::default(), OperatingMode::Development);
    }

    #[test]
    fn test_parse_other_keeps_name() {
        let mode = OperatingMode::parse("staging");
        assert_eq!(mode, OperatingMode::Other("staging".to_owned()));
        assert_eq!(mode.as_str(), "staging");
        assert!(!mode.is_development());
        assert!(!mode.is_production());
    }

    #[test]
    fn test_parse_is_case_sensitive() {
        let mode = OperatingMode::parse("Production");
        assert_eq!(mode, OperatingMode::Other("Production".to_owned()));
        assert!(!mode.is_production());
        assert!(!OperatingMode::parse("DEVELOPMENT").is_development());
    }

    #[test]
    fn test_serde_uses_name() {
        let json = serde_json::to_string(&OperatingMode::Production).unwrap();
        assert_eq!(json, "\"production\"");
        let parsed: OperatingMode = serde_json::from_str("\"test\"").unwrap();
        assert_eq!(parsed, OperatingMode::Other("test".to_owned()));
    }
}
