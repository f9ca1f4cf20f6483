//! Named value transforms applied before cleaning.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transform {
    Trim,
    Lower,
    Upper,
    /// Collapse runs of whitespace into single spaces.
    Collapse,
    /// Keep ASCII digits only.
    Digits,
    StripPunctuation,
}

impl Transform {
    pub const ALL: [Transform; 6] = [
        Transform::Trim,
        Transform::Lower,
        Transform::Upper,
        Transform::Collapse,
        Transform::Digits,
        Transform::StripPunctuation,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Transform::Trim => "trim",
            Transform::Lower => "lower",
            Transform::Upper => "upper",
            Transform::Collapse => "collapse",
            Transform::Digits => "digits",
            Transform::StripPunctuation => "strip_punctuation",
        }
    }

    pub fn apply(self, value: &str) -> String {
        match self {
            Transform::Trim => value.trim().to_string(),
            Transform::Lower => value.to_lowercase(),
            Transform::Upper => value.to_uppercase(),
            Transform::Collapse => value.split_whitespace().collect::<Vec<_>>().join(" "),
            Transform::Digits => value.chars().filter(char::is_ascii_digit).collect(),
            Transform::StripPunctuation => value
                .chars()
                .filter(|c| !c.is_ascii_punctuation())
                .collect(),
        }
    }
}

impl fmt::Display for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Transform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Transform::ALL
            .iter()
            .copied()
            .find(|transform| transform.name() == s)
            .ok_or_else(|| format!("unknown transform: {s}"))
    }
}

/// Apply `transforms` in order.
pub fn apply_all(transforms: &[Transform], value: &str) -> String {
    transforms
        .iter()
        .fold(value.to_string(), |current, transform| transform.apply(&current))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transforms_chain_in_order() {
        let transforms = [Transform::StripPunctuation, Transform::Collapse, Transform::Upper];
        assert_eq!(apply_all(&transforms, "  ab-12,  c "), "AB12 C");
        assert_eq!(Transform::Digits.apply("+44 (20) 7946-0958"), "442079460958");
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("strip_punctuation".parse::<Transform>(), Ok(Transform::StripPunctuation));
        assert!("reverse".parse::<Transform>().is_err());
    }
}
