//! Lexical relevance scoring

/// Split a prompt into lowercase search terms
///
/// Terms are runs of alphanumeric characters longer than two characters.
/// Repeated words are kept, so each occurrence in the prompt adds to the score.
pub fn tokenize(prompt: &str) -> Vec<String> {
    prompt
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|term| term.chars().count() > 2)
        .map(str::to_string)
        .collect()
}

/// Total number of term occurrences in `content`
///
/// Each term is counted independently as non-overlapping substring matches in
/// the lowercased content. The sum is not normalised by content length.
pub fn score(content: &str, terms: &[String]) -> usize {
    let haystack = content.to_lowercase();
    terms.iter().map(|term| haystack.matches(term.as_str()).count()).sum()
}
