use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Access level for a bound path.
///
/// Variants are declared in precedence order so the derived `Ord` is the
/// precedence ladder: `Hidden < ReadOnly < Write`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Mode {
    /// Observed but not exposed to the sandbox (`n`).
    #[serde(rename = "n")]
    Hidden,
    /// Bound read-only (`r`, `--ro-bind`).
    #[serde(rename = "r")]
    ReadOnly,
    /// Bound read-write (`w`, `--bind`).
    #[serde(rename = "w")]
    Write,
}

impl Mode {
    /// Position on the precedence ladder.
    pub fn rank(self) -> u8 {
        match self {
            Mode::Hidden => 0,
            Mode::ReadOnly => 1,
            Mode::Write => 2,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Mode::Hidden => 'n',
            Mode::ReadOnly => 'r',
            Mode::Write => 'w',
        }
    }

    /// Whether the mode ever reaches an emitted artifact.
    pub fn is_visible(self) -> bool {
        self != Mode::Hidden
    }

    /// Combine two observations of the same path. Ties keep `self`.
    pub fn strongest(self, other: Mode) -> Mode {
        if other > self { other } else { self }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownMode(pub String);

impl fmt::Display for UnknownMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown access mode {:?}", self.0)
    }
}

impl std::error::Error for UnknownMode {}

impl FromStr for Mode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "n" => Ok(Mode::Hidden),
            "r" => Ok(Mode::ReadOnly),
            "w" => Ok(Mode::Write),
            other => Err(UnknownMode(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precedence_is_total_order() {
        assert!(Mode::Hidden < Mode::ReadOnly);
        assert!(Mode::ReadOnly < Mode::Write);
        assert_eq!(Mode::Hidden.rank(), 0);
        assert_eq!(Mode::Write.rank(), 2);
    }

    #[test]
    fn strongest_never_downgrades() {
        assert_eq!(Mode::Write.strongest(Mode::ReadOnly), Mode::Write);
        assert_eq!(Mode::ReadOnly.strongest(Mode::Write), Mode::Write);
        assert_eq!(Mode::ReadOnly.strongest(Mode::Hidden), Mode::ReadOnly);
        assert_eq!(Mode::Hidden.strongest(Mode::Hidden), Mode::Hidden);
    }

    #[test]
    fn parses_log_letters() {
        assert_eq!("r".parse::<Mode>().unwrap(), Mode::ReadOnly);
        assert_eq!("w".parse::<Mode>().unwrap(), Mode::Write);
        assert_eq!("n".parse::<Mode>().unwrap(), Mode::Hidden);
        assert!("rw".parse::<Mode>().is_err());
    }

    #[test]
    fn serializes_as_letter() {
        let json = serde_json::to_string(&Mode::Write).unwrap();
        assert_eq!(json, "\"w\"");
        let back: Mode = serde_json::from_str("\"n\"").unwrap();
        assert_eq!(back, Mode::Hidden);
    }
}
