//! Typed prompt templates with named `{context}` and `{question}` slots.
//!
//! A template is parsed once, when it is constructed. A template missing
//! either slot, or naming a slot that does not exist, is rejected then
//! rather than at answer time. Literal braces are written `{{` and `}}`.

use serde::{Deserialize, Serialize};

use crate::document::SearchResult;
use crate::error::{RagError, Result};

/// Header placed before the context block by [`PromptTemplate::grounded`].
pub(crate) const CONTEXT_HEADER: &str = "Context:\n";
/// Header placed before the question by [`PromptTemplate::grounded`].
pub(crate) const QUESTION_HEADER: &str = "\n\nQuestion:\n";

/// A named slot in a [`PromptTemplate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
    /// The assembled retrieval context.
    Context,
    /// The user's question.
    Question,
}

impl Slot {
    fn parse(name: &str) -> Option<Self> {
        match name.trim() {
            "context" => Some(Slot::Context),
            "question" => Some(Slot::Question),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Slot(Slot),
}

/// Values for every slot of a [`PromptTemplate`].
#[derive(Debug, Clone, Copy)]
pub struct PromptInputs<'a> {
    /// Text substituted for `{context}`.
    pub context: &'a str,
    /// Text substituted for `{question}`.
    pub question: &'a str,
}

/// A prompt template validated to contain exactly the `context` and `question` slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl PromptTemplate {
    /// Parse a template.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::PromptError`] if a brace is unbalanced, a slot name
    /// is unknown, or either required slot is absent.
    pub fn new(source: impl Into<String>) -> Result<Self> {
        let source = source.into();
        let segments = parse_segments(&source)?;
        for required in [Slot::Context, Slot::Question] {
            if !segments.contains(&Segment::Slot(required)) {
                return Err(RagError::PromptError(format!(
                    "template is missing the required {{{}}} slot",
                    slot_name(required)
                )));
            }
        }
        Ok(Self { source, segments })
    }

    /// The grounding template used by default.
    ///
    /// It instructs the model to answer only from the supplied context and to
    /// reply with exactly `not_found_sentinel` otherwise. This is an
    /// instruction to the model, not something the pipeline can enforce.
    pub fn grounded(not_found_sentinel: &str) -> Self {
        let sentinel = not_found_sentinel.replace('{', "{{").replace('}', "}}");
        let source = format!(
            "You are an HR assistant.\n\
             Answer ONLY using the resume context provided.\n\
             If the candidate is not found, say:\n\
             \"{sentinel}\"\n\n\
             {CONTEXT_HEADER}{{context}}{QUESTION_HEADER}{{question}}\n"
        );
        // The source above always contains both slots and balanced braces.
        let segments = parse_segments(&source).unwrap_or_default();
        Self { source, segments }
    }

    /// The template text as written.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Substitute every slot.
    pub fn fill(&self, inputs: &PromptInputs<'_>) -> String {
        let mut prompt = String::with_capacity(
            self.source.len() + inputs.context.len() + inputs.question.len(),
        );
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => prompt.push_str(text),
                Segment::Slot(Slot::Context) => prompt.push_str(inputs.context),
                Segment::Slot(Slot::Question) => prompt.push_str(inputs.question),
            }
        }
        prompt
    }
}

fn slot_name(slot: Slot) -> &'static str {
    match slot {
        Slot::Context => "context",
        Slot::Question => "question",
    }
}

fn parse_segments(source: &str) -> Result<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = source.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                literal.push('{');
            }
            '{' => {
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(ch) => name.push(ch),
                        None => {
                            return Err(RagError::PromptError(format!(
                                "unclosed slot '{{{name}' in template"
                            )));
                        }
                    }
                }
                let slot = Slot::parse(&name).ok_or_else(|| {
                    RagError::PromptError(format!("unknown slot '{{{name}}}' in template"))
                })?;
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Slot(slot));
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                literal.push('}');
            }
            '}' => {
                return Err(RagError::PromptError(
                    "unmatched '}' in template; write '}}' for a literal brace".to_string(),
                ));
            }
            _ => literal.push(c),
        }
    }
    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

/// Join retrieved chunk texts, in retrieval order, separated by a blank line.
///
/// Overlapping chunks are not deduplicated.
pub fn assemble_context(results: &[SearchResult]) -> String {
    results.iter().map(|r| r.chunk.text.trim()).collect::<Vec<_>>().join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_both_slots() {
        let template = PromptTemplate::new("C={context} Q={question}").unwrap();
        let prompt = template.fill(&PromptInputs { context: "ctx", question: "who?" });
        assert_eq!(prompt, "C=ctx Q=who?");
    }

    #[test]
    fn missing_slot_is_rejected() {
        let err = PromptTemplate::new("only {context}").unwrap_err();
        assert!(matches!(err, RagError::PromptError(msg) if msg.contains("question")));
    }

    #[test]
    fn unknown_and_unbalanced_slots_are_rejected() {
        assert!(PromptTemplate::new("{context} {question} {answer}").is_err());
        assert!(PromptTemplate::new("{context} {question").is_err());
        assert!(PromptTemplate::new("{context} } {question}").is_err());
    }

    #[test]
    fn escaped_braces_are_literal() {
        let template = PromptTemplate::new("{{json}} {context} {question}").unwrap();
        let prompt = template.fill(&PromptInputs { context: "a", question: "b" });
        assert_eq!(prompt, "{json} a b");
    }

    #[test]
    fn grounded_template_embeds_sentinel_and_slots() {
        let template = PromptTemplate::grounded("Nobody {here}.");
        let prompt = template.fill(&PromptInputs { context: "Alice: Java", question: "Java?" });
        assert!(prompt.contains("\"Nobody {here}.\""));
        assert!(prompt.contains("Context:\nAlice: Java\n\nQuestion:\nJava?"));
        assert!(prompt.contains("Answer ONLY"));
    }
}
