//! Response parsing: raw backend text → validated [`FlashcardSet`].
//!
//! Models often wrap JSON in a Markdown code fence even when told not to, so
//! fence stripping runs first as a tolerant normalisation step. It is not a
//! schema guarantee: when several fenced blocks are present only the first
//! is read, and a payload holding more than one JSON value (two arrays, an
//! array plus prose) is rejected as malformed.
//!
//! Validation is fail-fast. The first card missing a usable `question` or
//! `answer` aborts the parse, so a caller never receives a partial deck
//! presented as complete.

use crate::error::PipelineError;
use crate::output::{Flashcard, FlashcardSet};
use crate::pipeline::llm::RawModelOutput;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// First fenced block, optionally tagged `json` (any case).
static RE_FENCED_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?i:json)?[ \t]*\r?\n?(.*?)```").unwrap());

/// Parse and validate the backend's answer.
pub fn parse_flashcards(raw: &RawModelOutput) -> Result<FlashcardSet, PipelineError> {
    parse_str(&raw.text)
}

/// [`parse_flashcards`] on a bare string.
pub fn parse_str(raw: &str) -> Result<FlashcardSet, PipelineError> {
    let payload = strip_code_fence(raw.trim());

    let value: Value = serde_json::from_str(payload)
        .map_err(|e| PipelineError::malformed(format!("invalid JSON: {e}"), payload))?;

    let items = match value {
        Value::Array(items) => items,
        _ => return Err(PipelineError::malformed("not an array", payload)),
    };

    let mut cards = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let question = required_field(item, "question", index, payload)?;
        let answer = required_field(item, "answer", index, payload)?;
        cards.push(Flashcard { question, answer });
    }

    Ok(FlashcardSet::from(cards))
}

/// Interior of the first fenced block, or the input unchanged.
fn strip_code_fence(text: &str) -> &str {
    match RE_FENCED_BLOCK.captures(text).and_then(|caps| caps.get(1)) {
        Some(inner) => inner.as_str().trim(),
        None => text,
    }
}

fn required_field(
    item: &Value,
    field: &str,
    index: usize,
    payload: &str,
) -> Result<String, PipelineError> {
    match item.get(field).and_then(Value::as_str) {
        Some(s) if !s.trim().is_empty() => Ok(s.to_string()),
        _ => Err(PipelineError::malformed(
            format!("flashcard at index {index} is missing a non-empty string `{field}`"),
            payload,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reason(err: PipelineError) -> String {
        match err {
            PipelineError::MalformedResponse { reason, .. } => reason,
            other => panic!("expected MalformedResponse, got {other:?}"),
        }
    }

    #[test]
    fn plain_array_parses() {
        let set = parse_str(r#"[{"question":"Q","answer":"A"}]"#).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.as_slice()[0].question, "Q");
        assert_eq!(set.as_slice()[0].answer, "A");
    }

    #[test]
    fn fenced_and_unfenced_parse_identically() {
        let bare = r#"[{"question":"Q","answer":"A"}]"#;
        let fenced = format!("```json\n{bare}\n```");
        let untagged = format!("```\n{bare}\n```");
        let upper = format!("```JSON\n{bare}\n```");
        let expected = parse_str(bare).unwrap();
        assert_eq!(parse_str(&fenced).unwrap(), expected);
        assert_eq!(parse_str(&untagged).unwrap(), expected);
        assert_eq!(parse_str(&upper).unwrap(), expected);
    }

    #[test]
    fn fence_inside_prose_is_found() {
        let raw = "Here are your cards:\n```json\n[{\"question\":\"Q\",\"answer\":\"A\"}]\n```\nEnjoy!";
        assert_eq!(parse_str(raw).unwrap().len(), 1);
    }

    #[test]
    fn only_first_fenced_block_is_read() {
        let raw = "```json\n[{\"question\":\"1\",\"answer\":\"a\"}]\n```\n```json\n[{\"question\":\"2\",\"answer\":\"b\"}]\n```";
        let set = parse_str(raw).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.as_slice()[0].question, "1");
    }

    #[test]
    fn two_bare_arrays_are_rejected() {
        let raw = r#"[{"question":"1","answer":"a"}] [{"question":"2","answer":"b"}]"#;
        assert!(reason(parse_str(raw).unwrap_err()).contains("invalid JSON"));
    }

    #[test]
    fn parsing_is_idempotent_and_order_preserving() {
        let raw = r#"[{"question":"first","answer":"1"},{"question":"second","answer":"2"},{"question":"third","answer":"3"}]"#;
        let a = parse_str(raw).unwrap();
        let b = parse_str(raw).unwrap();
        assert_eq!(a, b);
        let qs: Vec<&str> = a.iter().map(|c| c.question.as_str()).collect();
        assert_eq!(qs, ["first", "second", "third"]);
    }

    #[test]
    fn invalid_json_keeps_diagnostic_and_content() {
        match parse_str("Sorry, I cannot help with that.").unwrap_err() {
            PipelineError::MalformedResponse { reason, content } => {
                assert!(reason.starts_with("invalid JSON:"), "got: {reason}");
                assert_eq!(content, "Sorry, I cannot help with that.");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn object_is_not_an_array() {
        let r = reason(parse_str(r#"{"question":"Q","answer":"A"}"#).unwrap_err());
        assert_eq!(r, "not an array");
    }

    #[test]
    fn validation_fails_fast_at_first_bad_index() {
        let raw = r#"[{"question":"Q1","answer":"A1"},{"question":"Q2"}]"#;
        let r = reason(parse_str(raw).unwrap_err());
        assert!(r.contains("index 1"), "got: {r}");
        assert!(r.contains("answer"), "got: {r}");
    }

    #[test]
    fn reports_the_first_violation_only() {
        let raw = r#"[{"answer":"A0"},{"question":"Q1"}]"#;
        let r = reason(parse_str(raw).unwrap_err());
        assert!(r.contains("index 0"), "got: {r}");
        assert!(r.contains("question"), "got: {r}");
    }

    #[test]
    fn blank_and_non_string_fields_are_rejected() {
        for raw in [
            r#"[{"question":"","answer":"A"}]"#,
            r#"[{"question":"   ","answer":"A"}]"#,
            r#"[{"question":42,"answer":"A"}]"#,
            r#"[{"question":"Q","answer":null}]"#,
            r#"["just a string"]"#,
        ] {
            assert!(
                reason(parse_str(raw).unwrap_err()).contains("index 0"),
                "{raw}"
            );
        }
    }

    #[test]
    fn extra_fields_are_ignored() {
        let set =
            parse_str(r#"[{"question":"Q","answer":"A","difficulty":"easy"}]"#).unwrap();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn empty_array_is_a_valid_empty_set() {
        assert!(parse_str("[]").unwrap().is_empty());
    }

    #[test]
    fn raw_output_wrapper() {
        let raw = RawModelOutput::from_text("  [{\"question\":\"Q\",\"answer\":\"A\"}]\n");
        assert_eq!(parse_flashcards(&raw).unwrap().len(), 1);
    }
}
