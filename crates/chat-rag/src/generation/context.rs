//! Context assembly from retrieved passages

use crate::types::RetrievedPassage;

/// Default look-ahead window for sentence extension
pub const DEFAULT_LOOKAHEAD_CHARS: usize = 1000;

/// Builds the bounded context block handed to the generator
#[derive(Debug, Clone, Copy)]
pub struct ContextAssembler {
    /// Characters kept per passage before sentence extension
    pub per_doc_chars: usize,
    /// How far past the head to look for a sentence terminator
    pub lookahead_chars: usize,
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self {
            per_doc_chars: 400,
            lookahead_chars: DEFAULT_LOOKAHEAD_CHARS,
        }
    }
}

impl ContextAssembler {
    /// Create an assembler with the given per-passage budget
    pub fn new(per_doc_chars: usize, lookahead_chars: usize) -> Self {
        Self {
            per_doc_chars: per_doc_chars.max(1),
            lookahead_chars,
        }
    }

    /// Tag and join passages, one segment per passage
    pub fn build(&self, passages: &[RetrievedPassage]) -> String {
        passages
            .iter()
            .map(|p| {
                format!(
                    "[source:{}] {}",
                    p.source,
                    self.snippet(&p.text)
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Normalize whitespace and cut the text at a sentence boundary
    pub fn snippet(&self, text: &str) -> String {
        let normalized = collapse_whitespace(text);
        let chars: Vec<char> = normalized.chars().collect();

        if chars.len() <= self.per_doc_chars {
            return normalized;
        }

        let window_end = (self.per_doc_chars + self.lookahead_chars).min(chars.len());
        let end = chars[self.per_doc_chars..window_end]
            .iter()
            .position(|c| matches!(c, '.' | '!' | '?'))
            .map(|offset| self.per_doc_chars + offset + 1)
            .unwrap_or(self.per_doc_chars);

        chars[..end].iter().collect()
    }
}

/// Build a context block with the default look-ahead
pub fn build_context(passages: &[RetrievedPassage], per_doc_chars: usize) -> String {
    ContextAssembler::new(per_doc_chars, DEFAULT_LOOKAHEAD_CHARS).build(passages)
}

/// Collapse whitespace runs to single spaces and trim
fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PassageId;

    fn passage(source: &str, text: &str) -> RetrievedPassage {
        RetrievedPassage {
            id: PassageId::from(source),
            text: text.to_string(),
            source: source.to_string(),
            score: 1.0,
        }
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(build_context(&[], 400), "");
    }

    #[test]
    fn test_short_passages_are_tagged_and_joined() {
        let context = build_context(
            &[
                passage("doc_1", "Python was created by Guido van Rossum in 1991."),
                passage("doc_2", "  Machine\nlearning \t learns.  "),
            ],
            400,
        );
        assert_eq!(
            context,
            "[source:doc_1] Python was created by Guido van Rossum in 1991.\n\n\
             [source:doc_2] Machine learning learns."
        );
    }

    #[test]
    fn test_extends_to_sentence_terminator() {
        let mut text: String = "a".repeat(1200);
        text.replace_range(1040..1041, ".");

        let snippet = ContextAssembler::new(1000, 1000).snippet(&text);
        assert_eq!(snippet.chars().count(), 1041);
        assert!(snippet.ends_with('.'));
    }

    #[test]
    fn test_no_terminator_keeps_exact_head() {
        let text = "b".repeat(50);
        let snippet = ContextAssembler::new(10, 20).snippet(&text);
        assert_eq!(snippet, "b".repeat(10));
    }

    #[test]
    fn test_terminator_outside_lookahead_is_ignored() {
        let text = format!("{}!{}", "c".repeat(40), "c".repeat(10));
        let snippet = ContextAssembler::new(10, 20).snippet(&text);
        assert_eq!(snippet.chars().count(), 10);
    }

    #[test]
    fn test_counts_characters_not_bytes() {
        let text = format!("{}? trailing text", "é".repeat(12));
        let snippet = ContextAssembler::new(10, 5).snippet(&text);
        assert_eq!(snippet, format!("{}?", "é".repeat(12)));
    }

    #[test]
    fn test_deterministic() {
        let passages = vec![passage("doc_1", &"word ".repeat(200))];
        assert_eq!(build_context(&passages, 50), build_context(&passages, 50));
    }
}
