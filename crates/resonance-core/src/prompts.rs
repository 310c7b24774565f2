//! Prompt builder
//!
//! Deterministic instruction text for the two model tasks. Both prompts
//! demand a bare JSON object so the structured parser can validate the
//! answer; user text is embedded verbatim.

use crate::schema::{ResonanceType, Triad};

/// Shared output contract appended to every task
const JSON_ONLY: &str = "Return your answer as a strict JSON object only. \
    Do NOT use markdown code fences. \
    Do NOT include any text before or after the JSON object.";

/// A model task and its typed inputs
#[derive(Debug, Clone, Copy)]
pub enum PromptTask<'a> {
    /// Invent a new triad about a topic
    Generate { topic: &'a str },
    /// Label an existing triad
    Analyze { triad: &'a Triad },
}

impl PromptTask<'_> {
    /// Short task name for logs
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Generate { .. } => "generate",
            Self::Analyze { .. } => "analyze",
        }
    }

    /// Build the instruction text
    #[must_use]
    pub fn build(&self) -> String {
        match self {
            Self::Generate { topic } => generation_prompt(topic),
            Self::Analyze { triad } => analysis_prompt(triad),
        }
    }
}

/// Prompt asking for three fragments that form an interesting triadic resonance
#[must_use]
pub fn generation_prompt(topic: &str) -> String {
    format!(
        r#"You are a creative writer and an expert in nuanced relationships between texts.
Your task is to write three short, thematically connected text fragments (A, B and C) that form an interesting triadic resonance.
The topic is: "{topic}"

- Fragments A and B must share a base relationship (for example a statement and a complement, or a mild contrast).
- Fragment C must change that relationship in an interesting way, for example by adding a new perspective, a contradiction, a reinforcement or a bridge.
- Keep every sentence short and concise.

{JSON_ONLY} The object MUST contain exactly these three keys:
- "fragment_a": the text of fragment A.
- "fragment_b": the text of fragment B.
- "fragment_c": the text of fragment C.

Example for the topic "loss and memory":
{{
  "fragment_a": "The room is quiet.",
  "fragment_b": "Every object seems to whisper a story.",
  "fragment_c": "Only the photo on the nightstand makes it real."
}}"#
    )
}

/// Prompt asking how fragment C changes the resonance between A and B
#[must_use]
pub fn analysis_prompt(triad: &Triad) -> String {
    let vocabulary = ResonanceType::vocabulary();
    format!(
        r#"You are an expert in text analysis and in the concept of "resonance" between text fragments.
Analyze how fragment C changes the semantic and emotional relationship between fragment A and fragment B.

Fragment A: "{a}"
Fragment B: "{b}"
Fragment C (the influence): "{c}"

{JSON_ONLY} The object MUST contain these keys:
- "influence_description": one short, precise sentence describing how C changes the relationship (e.g. "C builds a bridge", "C introduces a contradiction").
- "resulting_type": the most likely resonance type between A and B AFTER the influence of C. Choose exactly one of: {vocabulary}.
- "resulting_strength": a floating point number between 0.0 and 1.0 for the strength of the new resonance.

Example output:
{{
  "influence_description": "C reinforces the shared theme of trying and creates a logical continuation.",
  "resulting_type": "CONTINUATION",
  "resulting_strength": 0.75
}}"#,
        a = triad.fragment_a(),
        b = triad.fragment_b(),
        c = triad.fragment_c(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_prompt_embeds_topic_and_keys() {
        let prompt = generation_prompt("understanding and complexity");
        assert!(prompt.contains("The topic is: \"understanding and complexity\""));
        for key in ["\"fragment_a\"", "\"fragment_b\"", "\"fragment_c\""] {
            assert!(prompt.contains(key), "missing {key}");
        }
        assert!(prompt.contains("Do NOT use markdown code fences"));
    }

    #[test]
    fn analysis_prompt_embeds_fragments_verbatim() {
        let triad = Triad::new("A {with} braces", "B \"quoted\"", "C\nmultiline");
        let prompt = analysis_prompt(&triad);
        assert!(prompt.contains("Fragment A: \"A {with} braces\""));
        assert!(prompt.contains("Fragment B: \"B \"quoted\"\""));
        assert!(prompt.contains("Fragment C (the influence): \"C\nmultiline\""));
    }

    #[test]
    fn analysis_prompt_lists_full_vocabulary() {
        let prompt = analysis_prompt(&Triad::new("a", "b", "c"));
        for t in ResonanceType::ALL {
            assert!(prompt.contains(t.as_str()), "missing {t}");
        }
    }

    #[test]
    fn prompts_are_deterministic() {
        let triad = Triad::new("a", "b", "c");
        assert_eq!(analysis_prompt(&triad), analysis_prompt(&triad));
        assert_eq!(generation_prompt("x"), generation_prompt("x"));
    }

    #[test]
    fn empty_inputs_still_build() {
        assert!(generation_prompt("").contains("The topic is: \"\""));
        assert!(PromptTask::Analyze { triad: &Triad::default() }
            .build()
            .contains("Fragment A: \"\""));
    }

    #[test]
    fn task_names() {
        assert_eq!(PromptTask::Generate { topic: "t" }.name(), "generate");
        assert_eq!(PromptTask::Analyze { triad: &Triad::default() }.name(), "analyze");
    }
}
