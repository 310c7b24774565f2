//! Generation and analysis services
//!
//! Each call is one unit of work: build the prompt, call the collaborator
//! exactly once, parse the answer. No state is shared between calls and no
//! retry is attempted; callers decide whether to re-invoke.

use crate::error::ServiceError;
use crate::model::GenerativeModel;
use crate::parser::parse_structured;
use crate::prompts::PromptTask;
use crate::schema::{AnalysisResult, Triad};

/// Ask the model for a new candidate triad about `topic`
///
/// # Errors
/// - `ServiceError::EmptyInput` if `topic` is blank (the model is not called)
/// - `ServiceError::ExternalCallFailed` if the model call fails
/// - `ServiceError::Parse` if the answer is not a valid triad
#[tracing::instrument(name = "generate_triad", skip_all, fields(topic_len = topic.len()))]
pub async fn generate_triad<M>(model: &M, topic: &str) -> Result<Triad, ServiceError>
where
    M: GenerativeModel + ?Sized,
{
    if topic.trim().is_empty() {
        return Err(ServiceError::EmptyInput { field: "topic" });
    }

    let raw = call_model(model, PromptTask::Generate { topic }).await?;

    let triad = parse_structured::<Triad>(&raw).map_err(|e| {
        tracing::warn!(error = %e, "model answer is not a valid triad");
        e
    })?;

    tracing::info!("generated candidate triad");
    Ok(triad)
}

/// Ask the model how fragment C changes the resonance between A and B
///
/// Blank fragments are forwarded as given.
///
/// # Errors
/// - `ServiceError::ExternalCallFailed` if the model call fails
/// - `ServiceError::Parse` if the answer is not a valid label
#[tracing::instrument(name = "analyze_triad", skip_all)]
pub async fn analyze_triad<M>(model: &M, triad: &Triad) -> Result<AnalysisResult, ServiceError>
where
    M: GenerativeModel + ?Sized,
{
    if let Some(field) = triad.first_blank() {
        tracing::warn!(field, "analyzing triad with a blank fragment");
    }

    let raw = call_model(model, PromptTask::Analyze { triad }).await?;

    let label = parse_structured::<AnalysisResult>(&raw).map_err(|e| {
        tracing::warn!(error = %e, "model answer is not a valid label");
        e
    })?;

    tracing::info!(
        resulting_type = %label.resulting_type(),
        resulting_strength = label.resulting_strength(),
        "analysis completed"
    );
    Ok(label)
}

async fn call_model<M>(model: &M, task: PromptTask<'_>) -> Result<String, ServiceError>
where
    M: GenerativeModel + ?Sized,
{
    let prompt = task.build();
    tracing::debug!(task = task.name(), prompt_len = prompt.len(), "calling generative model");

    model.generate(&prompt).await.map_err(|e| {
        tracing::warn!(task = task.name(), error = %e, "generative model call failed");
        ServiceError::ExternalCallFailed(e)
    })
}
