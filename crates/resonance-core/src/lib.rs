//! Resonance Core - triadic resonance annotation pipeline
//!
//! Turns free-form generative output into strictly validated training data:
//! - Builds deterministic prompts for triad generation and analysis
//! - Parses untrusted model answers into typed records, or classified failures
//! - Drives the human review of each proposed label
//! - Appends confirmed samples to an append-only JSON Lines corpus
//!
//! # Architecture
//!
//! ```text
//! topic ─▶ generate_triad ─┐
//!                          ▼
//!                        Triad ─▶ analyze_triad ─▶ AnalysisResult ─▶ review ─▶ CorpusWriter
//!                                     │                                            │
//!                              GenerativeModel                              training_data.jsonl
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use resonance_core::{analyze_triad, AnnotationSession, CorpusWriter, Triad};
//!
//! # async fn example(model: &impl resonance_core::GenerativeModel) -> Result<(), Box<dyn std::error::Error>> {
//! let mut session = AnnotationSession::with_triad(Triad::new(
//!     "The room is quiet.",
//!     "Every object seems to whisper a story.",
//!     "Only the photo on the nightstand makes it real.",
//! ));
//!
//! session.analyze(model).await?;
//! session.edit_strength(0.8)?;
//! session.save(&CorpusWriter::new("training_data.jsonl")).await?;
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

// Core modules
pub mod config;
pub mod corpus;
pub mod error;
pub mod model;
pub mod parser;
pub mod prompts;
pub mod schema;
pub mod service;
pub mod session;

// Re-exports for convenience
pub use config::{AnnotatorConfig, ModelSettings, ServerSettings};
pub use corpus::{CorpusWriter, SampleDraft, TrainingSample};
pub use error::{
    AnnotatorError, ConfigError, ErrorKind, ModelError, ParseFailure, ServiceError, SessionError,
    StoreError,
};
pub use model::GenerativeModel;
pub use parser::{parse_structured, parse_value, strip_formatting, StructuredRecord};
pub use prompts::{analysis_prompt, generation_prompt, PromptTask};
pub use schema::{AnalysisResult, Fragment, ResonanceType, Triad};
pub use service::{analyze_triad, generate_triad};
pub use session::{AnnotationSession, LabelDraft, SessionState};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with the annotation pipeline
    pub use crate::{
        analyze_triad, generate_triad, AnalysisResult, AnnotationSession, CorpusWriter,
        GenerativeModel, ResonanceType, SampleDraft, Triad,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
