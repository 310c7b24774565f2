//! End-to-end annotation flow with a scripted collaborator.

use resonance_core::{
    analyze_triad, generate_triad, AnnotationSession, ErrorKind, ModelError, ResonanceType,
    SessionState, Triad,
};
use resonance_test_utils::{
    corpus_bytes, corpus_records, fenced, label_reply, quiet_room_triad, temp_corpus, triad_reply,
    ScriptedModel,
};
use std::time::Duration;

#[tokio::test]
async fn analyze_quiet_room_returns_schema_valid_label() {
    let model = ScriptedModel::always(label_reply("PERSPECTIVE_SHIFT", 0.8));

    let label = analyze_triad(&model, &quiet_room_triad()).await.unwrap();

    assert!(ResonanceType::ALL.contains(&label.resulting_type()));
    assert!((0.0..=1.0).contains(&label.resulting_strength()));
    assert_eq!(model.calls(), 1);

    let prompt = &model.prompts()[0];
    assert!(prompt.contains("The room is quiet."));
    assert!(prompt.contains("Only the photo on the nightstand makes it real."));
}

#[tokio::test]
async fn empty_topic_makes_no_call() {
    let model = ScriptedModel::always(triad_reply("a", "b", "c"));

    let err = generate_triad(&model, "").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::EmptyInput);
    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn no_automatic_retry_after_failure() {
    let model = ScriptedModel::sequence([
        Err(ModelError::Timeout(Duration::from_secs(30))),
        Ok(triad_reply("a", "b", "c")),
    ]);

    let err = generate_triad(&model, "memory").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ExternalCallFailed);
    assert_eq!(model.calls(), 1);

    // A manual re-invocation gets the next answer
    let triad = generate_triad(&model, "memory").await.unwrap();
    assert_eq!(triad, Triad::new("a", "b", "c"));
}

#[tokio::test]
async fn full_session_generate_analyze_edit_save() {
    let (_dir, writer) = temp_corpus();
    let model = ScriptedModel::sequence([
        Ok(fenced(&triad_reply("The room is quiet.", "Objects whisper.", "A photo speaks."))),
        Ok(label_reply("COMPLEMENT", 0.6)),
    ]);

    let mut session = AnnotationSession::new();
    session.generate(&model, "loss and memory").await.unwrap();
    session.analyze(&model).await.unwrap();
    session.edit_type("EMOTIONAL_TENSION").unwrap();
    session.edit_strength(0.7).unwrap();
    session.save(&writer).await.unwrap();

    assert_eq!(session.state(), SessionState::Saved);
    assert_eq!(model.calls(), 2);

    let records = corpus_records(writer.path());
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["fragment_a"], "The room is quiet.");
    assert_eq!(records[0]["label"]["resulting_type"], "EMOTIONAL_TENSION");
    assert_eq!(records[0]["label"]["resulting_strength"], 0.7);
}

#[tokio::test]
async fn unchanged_review_still_saves() {
    let (_dir, writer) = temp_corpus();
    let model = ScriptedModel::always(label_reply("ECHO", 0.3));

    let mut session = AnnotationSession::with_triad(quiet_room_triad());
    session.analyze(&model).await.unwrap();
    session.save(&writer).await.unwrap();

    assert_eq!(corpus_records(writer.path())[0]["label"]["resulting_type"], "ECHO");
}

#[tokio::test]
async fn invalid_edit_blocks_save_until_fixed() {
    let (_dir, writer) = temp_corpus();
    let model = ScriptedModel::always(label_reply("ECHO", 0.3));

    let mut session = AnnotationSession::with_triad(quiet_room_triad());
    session.analyze(&model).await.unwrap();
    session.edit_strength(1.5).unwrap();

    let err = session.save(&writer).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IncompleteSample);
    assert_eq!(session.state(), SessionState::Reviewing);
    assert!(corpus_bytes(writer.path()).is_empty());

    session.edit_strength(1.0).unwrap();
    session.save(&writer).await.unwrap();
    assert_eq!(session.state(), SessionState::Saved);

    // Saved is terminal
    let err = session.save(&writer).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidTransition);
    assert_eq!(corpus_records(writer.path()).len(), 1);
}

#[tokio::test]
async fn blank_manual_fragment_cannot_be_saved() {
    let (_dir, writer) = temp_corpus();
    let model = ScriptedModel::always(label_reply("WEAK_NEUTRAL", 0.1));

    let mut session = AnnotationSession::with_triad(Triad::new("a", "", "c"));
    session.analyze(&model).await.unwrap();

    let err = session.save(&writer).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IncompleteSample);
}
