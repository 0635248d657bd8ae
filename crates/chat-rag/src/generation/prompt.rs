//! Prompt templates for grounded answer generation

/// System instruction sent with every question
pub const SYSTEM_PROMPT: &str = "You are an assistant that answers user questions using ONLY the provided CONTEXT. Cite sources inline using [source:doc_X]. If the answer cannot be found in the context, say 'I don't know' and do not hallucinate.";

/// Build the user prompt around the assembled context
pub fn build_user_prompt(context: &str, question: &str) -> String {
    format!(
        "CONTEXT:\n{context}\n\n\
         QUESTION:\n{question}\n\n\
         INSTRUCTIONS:\n\
         - Answer based only on the CONTEXT above.\n\
         - Keep the answer concise and include source tags like [source:doc_1].\n\
         - If context doesn't contain the answer, reply: 'I don't know'.\n\n\
         ANSWER:"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_prompt_layout() {
        let prompt = build_user_prompt("[source:doc_1] Python.", "Who created Python?");
        assert_eq!(
            prompt,
            "CONTEXT:\n[source:doc_1] Python.\n\nQUESTION:\nWho created Python?\n\n\
INSTRUCTIONS:\n- Answer based only on the CONTEXT above.\n\
- Keep the answer concise and include source tags like [source:doc_1].\n\
- If context doesn't contain the answer, reply: 'I don't know'.\n\nANSWER:"
        );
    }

    #[test]
    fn test_system_prompt_mentions_citation_format() {
        assert!(SYSTEM_PROMPT.contains("[source:doc_X]"));
        assert!(SYSTEM_PROMPT.ends_with("do not hallucinate."));
    }
}
