use ragline_core::SearchResult;

/// Fixed answer-style instructions appended to every prompt.
const INSTRUCTIONS: &str = "\
- Answer the question using the provided context
- Be accurate and helpful
- If the context doesn't contain enough information, say so
- Keep it short and conversational, easy to read on a phone
- Write short paragraphs of one to three sentences, separated by a blank line
- Do not add inline citations, source numbers or URLs; sources are shown to the user separately";

/// Number the ranked context entries as `[i] content\nSource: url`.
pub fn format_context(results: &[SearchResult]) -> String {
    results
        .iter()
        .enumerate()
        .map(|(i, r)| format!("[{}] {}\nSource: {}", i + 1, r.chunk.content, r.chunk.url))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Assemble the grounding prompt for `question`.
pub fn build_prompt(persona: &str, question: &str, results: &[SearchResult]) -> String {
    format!(
        "You are {persona}.\n\n\
         Context from the website:\n{context}\n\n\
         Question: {question}\n\n\
         Instructions:\n{INSTRUCTIONS}\n\n\
         Answer:",
        context = format_context(results),
    )
}
