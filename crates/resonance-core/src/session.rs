//! Annotation session
//!
//! One sample's path from input to corpus:
//!
//! ```text
//! Idle ──generate──▶ Generating ──▶ Idle
//! Idle ──analyze───▶ Analyzing ──▶ Reviewing ──save──▶ Saved
//!                                  ▲        │
//!                                  └─edit───┘
//! ```
//!
//! The label proposed by the model is copied into an editable
//! [`LabelDraft`]; the human may change every field (or none) before
//! saving. The triad is frozen once analysis starts. A failed analysis
//! returns to `Idle`; a failed save stays in `Reviewing`.

use crate::corpus::{CorpusWriter, SampleDraft};
use crate::error::SessionError;
use crate::model::GenerativeModel;
use crate::schema::{fields, AnalysisResult, Triad};
use crate::service::{analyze_triad, generate_triad};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Client-observable session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    /// Waiting for input
    Idle,
    /// Model is producing a candidate triad
    Generating,
    /// Model is labeling the triad
    Analyzing,
    /// Human is reviewing the label
    Reviewing,
    /// Sample was appended to the corpus
    Saved,
}

impl SessionState {
    /// Lowercase name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Generating => "generating",
            Self::Analyzing => "analyzing",
            Self::Reviewing => "reviewing",
            Self::Saved => "saved",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Editable label under review
///
/// Holds whatever the human typed; validity is only enforced on save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelDraft {
    /// Description of C's influence
    pub influence_description: String,
    /// Resonance type token
    pub resulting_type: String,
    /// Resonance strength
    pub resulting_strength: f64,
}

impl LabelDraft {
    /// Label as a JSON object for validation
    #[must_use]
    pub fn to_value(&self) -> Value {
        json!({
            fields::INFLUENCE_DESCRIPTION: self.influence_description,
            fields::RESULTING_TYPE: self.resulting_type,
            fields::RESULTING_STRENGTH: self.resulting_strength,
        })
    }
}

impl From<&AnalysisResult> for LabelDraft {
    fn from(label: &AnalysisResult) -> Self {
        Self {
            influence_description: label.influence_description().to_string(),
            resulting_type: label.resulting_type().as_str().to_string(),
            resulting_strength: label.resulting_strength(),
        }
    }
}

/// State machine for annotating a single sample
#[derive(Debug, Clone)]
pub struct AnnotationSession {
    state: SessionState,
    triad: Triad,
    proposed: Option<AnalysisResult>,
    draft: Option<LabelDraft>,
}

impl Default for AnnotationSession {
    fn default() -> Self {
        Self::new()
    }
}

impl AnnotationSession {
    /// Fresh session with an empty triad
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::with_triad(Triad::default())
    }

    /// Fresh session with manually entered fragments
    #[inline]
    #[must_use]
    pub fn with_triad(triad: Triad) -> Self {
        Self {
            state: SessionState::Idle,
            triad,
            proposed: None,
            draft: None,
        }
    }

    /// Current state
    #[inline]
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Current triad
    #[inline]
    #[must_use]
    pub fn triad(&self) -> &Triad {
        &self.triad
    }

    /// Label as proposed by the model
    #[inline]
    #[must_use]
    pub fn proposed_label(&self) -> Option<&AnalysisResult> {
        self.proposed.as_ref()
    }

    /// Label as currently edited
    #[inline]
    #[must_use]
    pub fn draft(&self) -> Option<&LabelDraft> {
        self.draft.as_ref()
    }

    /// Replace the triad with manual input
    ///
    /// # Errors
    /// - `SessionError::InvalidTransition` unless idle
    pub fn set_triad(&mut self, triad: Triad) -> Result<(), SessionError> {
        self.ensure_idle("edit the triad")?;
        self.triad = triad;
        Ok(())
    }

    /// Replace the triad with one generated for `topic`
    ///
    /// The previous triad is kept if generation fails.
    ///
    /// # Errors
    /// - `SessionError::InvalidTransition` unless idle
    /// - `SessionError::Service` if generation fails
    pub async fn generate<M>(&mut self, model: &M, topic: &str) -> Result<&Triad, SessionError>
    where
        M: GenerativeModel + ?Sized,
    {
        self.ensure_idle("generate")?;
        self.state = SessionState::Generating;

        let outcome = generate_triad(model, topic).await;
        self.state = SessionState::Idle;

        self.triad = outcome?;
        Ok(&self.triad)
    }

    /// Label the current triad and start the review
    ///
    /// # Errors
    /// - `SessionError::InvalidTransition` unless idle
    /// - `SessionError::Service` if analysis fails (session returns to idle)
    pub async fn analyze<M>(&mut self, model: &M) -> Result<&LabelDraft, SessionError>
    where
        M: GenerativeModel + ?Sized,
    {
        self.ensure_idle("analyze")?;
        self.state = SessionState::Analyzing;

        let outcome = analyze_triad(model, &self.triad).await;
        match outcome {
            Ok(label) => {
                let draft = LabelDraft::from(&label);
                self.proposed = Some(label);
                self.state = SessionState::Reviewing;
                Ok(self.draft.insert(draft))
            }
            Err(e) => {
                self.state = SessionState::Idle;
                Err(e.into())
            }
        }
    }

    /// Change the influence description
    ///
    /// # Errors
    /// - `SessionError::InvalidTransition` unless reviewing
    pub fn edit_description(&mut self, description: impl Into<String>) -> Result<(), SessionError> {
        self.draft_mut("edit the label")?.influence_description = description.into();
        Ok(())
    }

    /// Change the resonance type token
    ///
    /// # Errors
    /// - `SessionError::InvalidTransition` unless reviewing
    pub fn edit_type(&mut self, resulting_type: impl Into<String>) -> Result<(), SessionError> {
        self.draft_mut("edit the label")?.resulting_type = resulting_type.into();
        Ok(())
    }

    /// Change the resonance strength
    ///
    /// # Errors
    /// - `SessionError::InvalidTransition` unless reviewing
    pub fn edit_strength(&mut self, resulting_strength: f64) -> Result<(), SessionError> {
        self.draft_mut("edit the label")?.resulting_strength = resulting_strength;
        Ok(())
    }

    /// Save request for the reviewed sample
    #[must_use]
    pub fn sample_draft(&self) -> Option<SampleDraft> {
        self.draft
            .as_ref()
            .map(|label| SampleDraft::new(&self.triad, label.to_value()))
    }

    /// Confirm the reviewed label and append the sample to the corpus
    ///
    /// # Errors
    /// - `SessionError::InvalidTransition` unless reviewing
    /// - `SessionError::Store` if validation or the append fails (session
    ///   stays in review)
    pub async fn save(&mut self, writer: &CorpusWriter) -> Result<(), SessionError> {
        if self.state != SessionState::Reviewing {
            return Err(self.invalid("save"));
        }
        let Some(draft) = self.sample_draft() else {
            return Err(self.invalid("save"));
        };

        writer.save_sample(draft).await?;
        self.state = SessionState::Saved;
        Ok(())
    }

    // A dropped generate/analyze future leaves its transient state behind;
    // nothing was recorded, so it counts as idle.
    fn ensure_idle(&self, action: &'static str) -> Result<(), SessionError> {
        match self.state {
            SessionState::Idle | SessionState::Generating | SessionState::Analyzing => Ok(()),
            SessionState::Reviewing | SessionState::Saved => Err(self.invalid(action)),
        }
    }

    fn draft_mut(&mut self, action: &'static str) -> Result<&mut LabelDraft, SessionError> {
        let state = self.state;
        match (state, self.draft.as_mut()) {
            (SessionState::Reviewing, Some(draft)) => Ok(draft),
            _ => Err(SessionError::InvalidTransition { state, action }),
        }
    }

    fn invalid(&self, action: &'static str) -> SessionError {
        SessionError::InvalidTransition {
            state: self.state,
            action,
        }
    }
}
