//! Citation extraction and answer presentation

use regex::Regex;
use std::sync::OnceLock;

use crate::types::RetrievedPassage;

/// Replies that carry no information for the user
const WEAK_ANSWERS: &[&str] = &[
    "i don't know",
    "i don't know.",
    "i am not sure",
    "i'm not sure",
    "no idea",
    "sorry, i don't know",
    "i don't have that information",
];

/// Sources from `passages` cited in `answer`, in retrieval order, without duplicates
pub fn extract_used_sources(answer: &str, passages: &[RetrievedPassage]) -> Vec<String> {
    let mut used: Vec<String> = Vec::new();

    for passage in passages {
        if used.contains(&passage.source) {
            continue;
        }
        if answer.contains(&format!("[source:{}]", passage.source)) {
            used.push(passage.source.clone());
        }
    }

    used
}

fn source_tag_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\s*\[source:[^\]]*\]").expect("Invalid regex"))
}

fn sources_line_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?is)\n?Sources?:.*$").expect("Invalid regex"))
}

fn space_before_newline_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\s+\n").expect("Invalid regex"))
}

fn repeated_blanks_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[ \t]{2,}").expect("Invalid regex"))
}

/// Remove `[source:...]` tags and trailing `Sources:` lines for display
pub fn strip_source_tags(answer: &str) -> String {
    let text = source_tag_pattern().replace_all(answer, "");
    let text = sources_line_pattern().replace(&text, "");
    let text = space_before_newline_pattern().replace_all(&text, "\n");
    let text = repeated_blanks_pattern().replace_all(&text, " ");
    text.trim().to_string()
}

/// True for answers too short or generic to show as-is
pub fn is_weak_answer(answer: &str) -> bool {
    let trimmed = answer.trim();
    trimmed.chars().count() < 5 || WEAK_ANSWERS.contains(&trimmed.to_lowercase().as_str())
}

/// Cut text to `max_chars` characters, marking the cut
pub fn truncate_for_display(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let head: String = text.chars().take(max_chars).collect();
    format!("{}\n\n...(truncated)", head)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PassageId;

    fn passages(sources: &[&str]) -> Vec<RetrievedPassage> {
        sources
            .iter()
            .enumerate()
            .map(|(i, source)| RetrievedPassage {
                id: PassageId::from(i),
                text: String::new(),
                source: source.to_string(),
                score: 0.0,
            })
            .collect()
    }

    #[test]
    fn test_extracts_cited_source() {
        let docs = passages(&["doc_1", "doc_2", "doc_3"]);
        let used = extract_used_sources("Guido made it [source:doc_2].", &docs);
        assert_eq!(used, vec!["doc_2"]);
    }

    #[test]
    fn test_retrieval_order_and_dedup() {
        let docs = passages(&["doc_3", "doc_1", "doc_3"]);
        let answer = "First [source:doc_1], then [source:doc_3] and [source:doc_1].";
        assert_eq!(extract_used_sources(answer, &docs), vec!["doc_3", "doc_1"]);
    }

    #[test]
    fn test_no_citations() {
        let docs = passages(&["doc_1"]);
        assert!(extract_used_sources("I don't know", &docs).is_empty());
        // A tag must match exactly, not as a prefix.
        assert!(extract_used_sources("[source:doc_10]", &docs).is_empty());
    }

    #[test]
    fn test_strip_source_tags() {
        let answer = "Python was created by Guido  [source:doc_1] in 1991 [source:doc_2].\nSources: doc_1, doc_2";
        assert_eq!(strip_source_tags(answer), "Python was created by Guido in 1991.");
    }

    #[test]
    fn test_weak_answers() {
        assert!(is_weak_answer("I don't know."));
        assert!(is_weak_answer("  no idea "));
        assert!(is_weak_answer("ok"));
        assert!(!is_weak_answer("Guido van Rossum created Python."));
    }

    #[test]
    fn test_truncate_for_display() {
        assert_eq!(truncate_for_display("short", 10), "short");
        assert_eq!(truncate_for_display("abcdef", 3), "abc\n\n...(truncated)");
    }
}
