//! Model kit grades.
//!
//! A grade denotes the complexity/fidelity tier of a kit. The backend stores
//! the upper-case code; parsing accepts any case.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned when a string is not a known grade code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid grade: {0}")]
pub struct GradeParseError(pub String);

/// Kit grade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Grade {
    /// High Grade (1/144).
    #[default]
    HG,
    /// Master Grade (1/100).
    MG,
    /// Super Deformed.
    SD,
    /// Perfect Grade (1/60).
    PG,
    /// Real Grade (1/144, high detail).
    RG,
}

impl Grade {
    /// All grades in display order.
    pub const ALL: [Self; 5] = [Self::HG, Self::MG, Self::SD, Self::PG, Self::RG];

    /// The upper-case grade code.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::HG => "HG",
            Self::MG => "MG",
            Self::SD => "SD",
            Self::PG => "PG",
            Self::RG => "RG",
        }
    }

    /// The long grade name.
    #[must_use]
    pub const fn full_name(self) -> &'static str {
        match self {
            Self::HG => "High Grade",
            Self::MG => "Master Grade",
            Self::SD => "Super Deformed",
            Self::PG => "Perfect Grade",
            Self::RG => "Real Grade",
        }
    }

    /// Badge label, e.g. "MG - Master Grade".
    #[must_use]
    pub fn badge_label(self) -> String {
        format!("{} - {}", self.code(), self.full_name())
    }
}

impl std::fmt::Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for Grade {
    type Err = GradeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "HG" => Ok(Self::HG),
            "MG" => Ok(Self::MG),
            "SD" => Ok(Self::SD),
            "PG" => Ok(Self::PG),
            "RG" => Ok(Self::RG),
            _ => Err(GradeParseError(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grade_parse_is_case_insensitive() {
        assert_eq!("mg".parse::<Grade>(), Ok(Grade::MG));
        assert_eq!(" Rg ".parse::<Grade>(), Ok(Grade::RG));
        assert!("XG".parse::<Grade>().is_err());
    }

    #[test]
    fn test_grade_badge_label() {
        assert_eq!(Grade::SD.badge_label(), "SD - Super Deformed");
    }

    #[test]
    fn test_grade_serde_uses_code() {
        assert_eq!(serde_json::to_value(Grade::PG).expect("serialize"), "PG");
        let grade: Grade = serde_json::from_str("\"HG\"").expect("deserialize");
        assert_eq!(grade, Grade::HG);
    }
}
