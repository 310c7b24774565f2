//! Resonance label schema
//!
//! The closed vocabulary of resonance types and the typed records that every
//! model answer must satisfy before it reaches a human or the corpus:
//! - [`Fragment`] and [`Triad`] for the text under analysis
//! - [`ResonanceType`] for the closed label vocabulary
//! - [`AnalysisResult`] for a complete, validated label

use crate::error::ParseFailure;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Wire names of every structured field
pub mod fields {
    pub const FRAGMENT_A: &str = "fragment_a";
    pub const FRAGMENT_B: &str = "fragment_b";
    pub const FRAGMENT_C: &str = "fragment_c";
    pub const LABEL: &str = "label";
    pub const INFLUENCE_DESCRIPTION: &str = "influence_description";
    pub const RESULTING_TYPE: &str = "resulting_type";
    pub const RESULTING_STRENGTH: &str = "resulting_strength";
}

/// An opaque piece of text
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fragment(String);

impl Fragment {
    /// Wrap text as a fragment
    #[inline]
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// Borrow the text
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the fragment carries no visible text
    #[inline]
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Display for Fragment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Fragment {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for Fragment {
    fn from(text: String) -> Self {
        Self(text)
    }
}

/// Three fragments: A and B, and C which influences their relationship
///
/// A triad is never mutated after construction; a changed triad is a new
/// value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Triad {
    fragment_a: Fragment,
    fragment_b: Fragment,
    fragment_c: Fragment,
}

impl Triad {
    /// Create triad from its three fragments
    #[must_use]
    pub fn new(
        fragment_a: impl Into<Fragment>,
        fragment_b: impl Into<Fragment>,
        fragment_c: impl Into<Fragment>,
    ) -> Self {
        Self {
            fragment_a: fragment_a.into(),
            fragment_b: fragment_b.into(),
            fragment_c: fragment_c.into(),
        }
    }

    /// Fragment A
    #[inline]
    #[must_use]
    pub fn fragment_a(&self) -> &Fragment {
        &self.fragment_a
    }

    /// Fragment B
    #[inline]
    #[must_use]
    pub fn fragment_b(&self) -> &Fragment {
        &self.fragment_b
    }

    /// Fragment C, the influence
    #[inline]
    #[must_use]
    pub fn fragment_c(&self) -> &Fragment {
        &self.fragment_c
    }

    /// Fragments paired with their wire names, in A, B, C order
    #[must_use]
    pub fn named_fragments(&self) -> [(&'static str, &Fragment); 3] {
        [
            (fields::FRAGMENT_A, &self.fragment_a),
            (fields::FRAGMENT_B, &self.fragment_b),
            (fields::FRAGMENT_C, &self.fragment_c),
        ]
    }

    /// Wire name of the first blank fragment, if any
    #[must_use]
    pub fn first_blank(&self) -> Option<&'static str> {
        self.named_fragments()
            .into_iter()
            .find(|(_, fragment)| fragment.is_blank())
            .map(|(name, _)| name)
    }
}

/// Closed vocabulary of resonance labels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResonanceType {
    Reinforcement,
    Contrast,
    Complement,
    Continuation,
    Example,
    Background,
    PerspectiveShift,
    EmotionalHarmony,
    EmotionalTension,
    StructuralAnalogy,
    WeakNeutral,
    Conflict,
    Echo,
    Development,
}

impl ResonanceType {
    /// Every member, in vocabulary order
    pub const ALL: [ResonanceType; 14] = [
        Self::Reinforcement,
        Self::Contrast,
        Self::Complement,
        Self::Continuation,
        Self::Example,
        Self::Background,
        Self::PerspectiveShift,
        Self::EmotionalHarmony,
        Self::EmotionalTension,
        Self::StructuralAnalogy,
        Self::WeakNeutral,
        Self::Conflict,
        Self::Echo,
        Self::Development,
    ];

    /// Wire token
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reinforcement => "REINFORCEMENT",
            Self::Contrast => "CONTRAST",
            Self::Complement => "COMPLEMENT",
            Self::Continuation => "CONTINUATION",
            Self::Example => "EXAMPLE",
            Self::Background => "BACKGROUND",
            Self::PerspectiveShift => "PERSPECTIVE_SHIFT",
            Self::EmotionalHarmony => "EMOTIONAL_HARMONY",
            Self::EmotionalTension => "EMOTIONAL_TENSION",
            Self::StructuralAnalogy => "STRUCTURAL_ANALOGY",
            Self::WeakNeutral => "WEAK_NEUTRAL",
            Self::Conflict => "CONFLICT",
            Self::Echo => "ECHO",
            Self::Development => "DEVELOPMENT",
        }
    }

    /// Comma separated list of every wire token
    #[must_use]
    pub fn vocabulary() -> String {
        Self::ALL
            .iter()
            .map(ResonanceType::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl std::fmt::Display for ResonanceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Token outside the resonance vocabulary
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("`{0}` is not a known resonance type")]
pub struct UnknownResonanceType(pub String);

impl FromStr for ResonanceType {
    type Err = UnknownResonanceType;

    /// Exact match only: no case folding, no trimming.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownResonanceType(s.to_string()))
    }
}

/// A complete resonance label
///
/// Only constructible through [`AnalysisResult::new`] or the structured
/// parser, so every instance satisfies the schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    influence_description: String,
    resulting_type: ResonanceType,
    resulting_strength: f64,
}

impl AnalysisResult {
    /// Validate and create a label
    ///
    /// # Errors
    /// - `ParseFailure::InvalidValue` if the description is blank or the
    ///   strength lies outside `[0.0, 1.0]`
    pub fn new(
        influence_description: impl Into<String>,
        resulting_type: ResonanceType,
        resulting_strength: f64,
    ) -> Result<Self, ParseFailure> {
        let influence_description = influence_description.into();
        if influence_description.trim().is_empty() {
            return Err(ParseFailure::invalid(
                fields::INFLUENCE_DESCRIPTION,
                "must not be blank",
            ));
        }
        check_strength(resulting_strength)?;

        Ok(Self {
            influence_description,
            resulting_type,
            resulting_strength,
        })
    }

    /// One-sentence description of how C changes A and B
    #[inline]
    #[must_use]
    pub fn influence_description(&self) -> &str {
        &self.influence_description
    }

    /// Resonance between A and B after C
    #[inline]
    #[must_use]
    pub fn resulting_type(&self) -> ResonanceType {
        self.resulting_type
    }

    /// Strength of that resonance, within `[0.0, 1.0]`
    #[inline]
    #[must_use]
    pub fn resulting_strength(&self) -> f64 {
        self.resulting_strength
    }
}

/// Reject strengths outside the unit interval (NaN included)
pub(crate) fn check_strength(strength: f64) -> Result<(), ParseFailure> {
    if (0.0..=1.0).contains(&strength) {
        Ok(())
    } else {
        Err(ParseFailure::invalid(
            fields::RESULTING_STRENGTH,
            format!("{strength} is outside [0.0, 1.0]"),
        ))
    }
}
