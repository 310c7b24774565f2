//! Terminal annotation session
//!
//! Walks one sample through generation (optional), analysis, field-by-field
//! review and save. Every model call is started by the annotator; failures
//! are shown and the annotator decides whether to try again.

use anyhow::{Context, Result};
use resonance_core::{
    AnnotationSession, CorpusWriter, ErrorKind, GenerativeModel, LabelDraft, ResonanceType, Triad,
};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, Lines};

/// How an interactive session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    /// The sample was appended to the corpus
    Saved,
    /// The annotator declined to save
    Discarded,
    /// Input ended before the sample was confirmed
    InputClosed,
}

struct Terminal<R, W> {
    lines: Lines<R>,
    out: W,
}

impl<R, W> Terminal<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    async fn say(&mut self, text: &str) -> Result<()> {
        self.out.write_all(text.as_bytes()).await?;
        self.out.write_all(b"\n").await?;
        self.out.flush().await?;
        Ok(())
    }

    /// `None` once input is closed
    async fn ask(&mut self, question: &str) -> Result<Option<String>> {
        self.out.write_all(question.as_bytes()).await?;
        self.out.flush().await?;
        let line = self.lines.next_line().await.context("reading input")?;
        Ok(line.map(|l| l.trim().to_string()))
    }

    async fn confirm(&mut self, question: &str, default: bool) -> Result<Option<bool>> {
        let hint = if default { "[Y/n]" } else { "[y/N]" };
        Ok(self
            .ask(&format!("{question} {hint} "))
            .await?
            .map(|answer| match answer.to_ascii_lowercase().as_str() {
                "y" | "yes" => true,
                "n" | "no" => false,
                _ => default,
            }))
    }
}

/// Run one annotation over `input`/`output`
///
/// # Errors
/// Fails on terminal I/O errors and on corpus store failures; model and
/// validation failures are reported to the annotator instead.
pub(crate) async fn run<M, R, W>(
    model: &M,
    writer: &CorpusWriter,
    input: R,
    output: W,
) -> Result<Outcome>
where
    M: GenerativeModel + ?Sized,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut term = Terminal {
        lines: input.lines(),
        out: output,
    };
    let mut session = AnnotationSession::new();

    if !choose_triad(&mut term, &mut session, model).await? {
        return Ok(Outcome::InputClosed);
    }

    loop {
        match session.analyze(model).await {
            Ok(_) => break,
            Err(e) => {
                term.say(&format!("analysis failed ({}): {e}", e.kind())).await?;
                match term.confirm("Try the analysis again?", false).await? {
                    Some(true) => {}
                    Some(false) => return Ok(Outcome::Discarded),
                    None => return Ok(Outcome::InputClosed),
                }
            }
        }
    }

    loop {
        let Some(draft) = session.draft().cloned() else {
            return Ok(Outcome::Discarded);
        };
        if !review(&mut term, &mut session, &draft).await? {
            return Ok(Outcome::InputClosed);
        }

        match term.confirm("Save this sample?", true).await? {
            None => return Ok(Outcome::InputClosed),
            Some(false) => return Ok(Outcome::Discarded),
            Some(true) => {}
        }

        match session.save(writer).await {
            Ok(()) => {
                term.say(&format!("saved to {}", writer.path().display())).await?;
                return Ok(Outcome::Saved);
            }
            Err(e) if e.kind() == ErrorKind::IncompleteSample => {
                term.say(&format!("not saved: {e}")).await?;
            }
            Err(e) => return Err(e).context("appending to the corpus"),
        }
    }
}

/// Fill the session triad, generated or typed; `false` if input closed
async fn choose_triad<M, R, W>(
    term: &mut Terminal<R, W>,
    session: &mut AnnotationSession,
    model: &M,
) -> Result<bool>
where
    M: GenerativeModel + ?Sized,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    loop {
        let Some(topic) = term.ask("Topic to generate from (blank to type fragments): ").await?
        else {
            return Ok(false);
        };
        if topic.is_empty() {
            break;
        }

        match session.generate(model, &topic).await {
            Ok(triad) => {
                let shown = show_triad(triad);
                term.say(&shown).await?;
                match term.confirm("Use this triad?", true).await? {
                    Some(true) => return Ok(true),
                    Some(false) => {}
                    None => return Ok(false),
                }
            }
            Err(e) => {
                term.say(&format!("generation failed ({}): {e}", e.kind())).await?;
            }
        }
    }

    let mut fragments = Vec::with_capacity(3);
    for name in ["A", "B", "C"] {
        let Some(text) = term.ask(&format!("Fragment {name}: ")).await? else {
            return Ok(false);
        };
        fragments.push(text);
    }
    let [a, b, c]: [String; 3] = fragments
        .try_into()
        .map_err(|_| anyhow::anyhow!("expected three fragments"))?;
    session.set_triad(Triad::new(a, b, c))?;
    Ok(true)
}

fn show_triad(triad: &Triad) -> String {
    triad
        .named_fragments()
        .iter()
        .map(|(name, fragment)| format!("  {name}: {fragment}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Field-by-field edit of the proposed label; blank keeps the current value
async fn review<R, W>(
    term: &mut Terminal<R, W>,
    session: &mut AnnotationSession,
    draft: &LabelDraft,
) -> Result<bool>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    term.say("Proposed label (press enter to keep a value):").await?;

    let Some(description) = term
        .ask(&format!("  influence_description [{}]: ", draft.influence_description))
        .await?
    else {
        return Ok(false);
    };
    if !description.is_empty() {
        session.edit_description(description)?;
    }

    term.say(&format!("  types: {}", ResonanceType::vocabulary())).await?;
    let Some(resulting_type) = term
        .ask(&format!("  resulting_type [{}]: ", draft.resulting_type))
        .await?
    else {
        return Ok(false);
    };
    if !resulting_type.is_empty() {
        session.edit_type(resulting_type)?;
    }

    loop {
        let Some(strength) = term
            .ask(&format!("  resulting_strength [{}]: ", draft.resulting_strength))
            .await?
        else {
            return Ok(false);
        };
        if strength.is_empty() {
            break;
        }
        match strength.parse::<f64>() {
            Ok(value) if value.is_finite() => {
                session.edit_strength(value)?;
                break;
            }
            _ => term.say("  enter a number between 0.0 and 1.0").await?,
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use resonance_core::ModelError;
    use resonance_test_utils::{
        corpus_bytes, corpus_records, label_reply, temp_corpus, triad_reply, ScriptedModel,
    };

    async fn annotate(model: &ScriptedModel, writer: &CorpusWriter, input: &str) -> (Outcome, String) {
        let mut output = Vec::new();
        let outcome = run(model, writer, input.as_bytes(), &mut output)
            .await
            .unwrap();
        (outcome, String::from_utf8(output).unwrap())
    }

    #[tokio::test]
    async fn manual_fragments_accept_proposal() {
        let (_dir, writer) = temp_corpus();
        let model = ScriptedModel::always(label_reply("ECHO", 0.3));

        let input = "\nquiet\nloud\necho\n\n\n\ny\n";
        let (outcome, shown) = annotate(&model, &writer, input).await;

        assert_eq!(outcome, Outcome::Saved);
        assert!(shown.contains("saved to"));
        let records = corpus_records(writer.path());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["fragment_c"], "echo");
        assert_eq!(records[0]["label"]["resulting_type"], "ECHO");
    }

    #[tokio::test]
    async fn generated_triad_with_edits() {
        let (_dir, writer) = temp_corpus();
        let model = ScriptedModel::sequence([
            Ok(triad_reply("a", "b", "c")),
            Ok(label_reply("ECHO", 0.3)),
        ]);

        let input = "memory\ny\nC reframes A\nCONTRAST\n0.9\ny\n";
        let (outcome, _) = annotate(&model, &writer, input).await;

        assert_eq!(outcome, Outcome::Saved);
        let label = &corpus_records(writer.path())[0]["label"];
        assert_eq!(label["influence_description"], "C reframes A");
        assert_eq!(label["resulting_type"], "CONTRAST");
        assert_eq!(label["resulting_strength"], 0.9);
    }

    #[tokio::test]
    async fn invalid_type_is_reported_and_reviewed_again() {
        let (_dir, writer) = temp_corpus();
        let model = ScriptedModel::always(label_reply("ECHO", 0.3));

        // First pass types an unknown token, second pass fixes it
        let input = "\na\nb\nc\n\nKONTRAST\n\ny\n\nCONTRAST\n\ny\n";
        let (outcome, shown) = annotate(&model, &writer, input).await;

        assert_eq!(outcome, Outcome::Saved);
        assert!(shown.contains("not saved"));
        assert_eq!(corpus_records(writer.path()).len(), 1);
    }

    #[tokio::test]
    async fn non_finite_strength_is_asked_again() {
        let (_dir, writer) = temp_corpus();
        let model = ScriptedModel::always(label_reply("ECHO", 0.3));

        let input = "\na\nb\nc\n\n\nNaN\ninf\n0.6\ny\n";
        let (outcome, shown) = annotate(&model, &writer, input).await;

        assert_eq!(outcome, Outcome::Saved);
        assert_eq!(shown.matches("enter a number between 0.0 and 1.0").count(), 2);
        let label = &corpus_records(writer.path())[0]["label"];
        assert_eq!(label["resulting_strength"], 0.6);
    }

    #[tokio::test]
    async fn failed_analysis_can_be_abandoned() {
        let (_dir, writer) = temp_corpus();
        let model = ScriptedModel::failing(ModelError::EmptyResponse);

        let (outcome, shown) = annotate(&model, &writer, "\na\nb\nc\nn\n").await;

        assert_eq!(outcome, Outcome::Discarded);
        assert!(shown.contains("ExternalCallFailed"));
        assert_eq!(model.calls(), 1);
        assert!(corpus_bytes(writer.path()).is_empty());
    }

    #[tokio::test]
    async fn closed_input_writes_nothing() {
        let (_dir, writer) = temp_corpus();
        let model = ScriptedModel::always(label_reply("ECHO", 0.3));

        let (outcome, _) = annotate(&model, &writer, "\na\nb\n").await;

        assert_eq!(outcome, Outcome::InputClosed);
        assert_eq!(model.calls(), 0);
        assert!(!writer.path().exists());
    }
}
