//! Reader expertise on a 1–10 scale and the depth settings derived from it.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A validated expertise score, 1 (novice) through 10 (professional).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct ExpertiseLevel(u8);

/// Named depth bands used in prompts and report metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepthLabel {
    Foundational,
    Educational,
    Intermediate,
    Advanced,
    Executive,
}

impl ExpertiseLevel {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 10;

    pub fn new(level: u8) -> Result<Self> {
        if (Self::MIN..=Self::MAX).contains(&level) {
            Ok(Self(level))
        } else {
            Err(Error::validation(format!(
                "expertise level must be between {} and {}, got {level}",
                Self::MIN,
                Self::MAX
            )))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// Section length multiplier. Lower expertise gets longer sections.
    pub fn depth_multiplier(self) -> f32 {
        match self.0 {
            1 => 2.5,
            2 => 2.2,
            3 => 2.0,
            4 => 1.6,
            5 => 1.3,
            6 => 1.0,
            7 => 0.8,
            8 => 0.6,
            9 => 0.5,
            _ => 0.4,
        }
    }

    /// Whether sections should carry explanatory, teaching-oriented framing.
    pub fn wants_educational_content(self) -> bool {
        self.0 <= 5
    }

    pub fn depth_label(self) -> DepthLabel {
        match self.0 {
            1..=2 => DepthLabel::Foundational,
            3..=4 => DepthLabel::Educational,
            5..=6 => DepthLabel::Intermediate,
            7..=8 => DepthLabel::Advanced,
            _ => DepthLabel::Executive,
        }
    }
}

impl TryFrom<u8> for ExpertiseLevel {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        Self::new(value)
    }
}

impl From<ExpertiseLevel> for u8 {
    fn from(level: ExpertiseLevel) -> Self {
        level.0
    }
}

impl std::fmt::Display for ExpertiseLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl DepthLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Foundational => "foundational",
            Self::Educational => "educational",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
            Self::Executive => "executive",
        }
    }

    /// Rough report length, in pages, that readers at this depth expect.
    pub fn target_pages(self) -> &'static str {
        match self {
            Self::Foundational => "250-300",
            Self::Educational => "150-200",
            Self::Intermediate => "80-100",
            Self::Advanced => "50-60",
            Self::Executive => "10-20",
        }
    }

    /// Tone guidance for producers and the section generator.
    pub fn detail(self) -> &'static str {
        match self {
            Self::Foundational => "comprehensive with educational explanations",
            Self::Educational => "detailed with explanatory context",
            Self::Intermediate => "focused analysis",
            Self::Advanced => "executive-level insights",
            Self::Executive => "summary with key implications",
        }
    }
}

impl std::fmt::Display for DepthLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
