//! Snippet extraction: up to two highlighted fragments of the body that
//! contain matched terms, falling back to the first N characters when no
//! fragment can be formed.

use std::collections::HashSet;

use crate::analysis::stem;

const WINDOW_WORDS: usize = 10;

pub fn build_snippet(body: &str, matched_stems: &HashSet<String>, max_fragments: usize, fallback_chars: usize) -> String {
    let words: Vec<&str> = body.split_whitespace().collect();
    if words.is_empty() {
        return String::new();
    }

    let mut hit_positions = Vec::new();
    for (i, word) in words.iter().enumerate() {
        let cleaned: String = word.chars().filter(|c| c.is_alphanumeric()).collect();
        if cleaned.is_empty() {
            continue;
        }
        if matched_stems.contains(&stem(&cleaned.to_lowercase())) {
            hit_positions.push(i);
        }
    }

    if hit_positions.is_empty() {
        return body.chars().take(fallback_chars).collect();
    }

    let mut fragments = Vec::new();
    let mut covered_until: Option<usize> = None;
    for &pos in &hit_positions {
        if fragments.len() >= max_fragments {
            break;
        }
        if let Some(until) = covered_until {
            if pos <= until {
                continue;
            }
        }
        let start = pos.saturating_sub(WINDOW_WORDS / 2);
        let end = (pos + WINDOW_WORDS / 2 + 1).min(words.len());
        fragments.push(words[start..end].join(" "));
        covered_until = Some(end);
    }

    fragments.join(" ... ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_first_chars_when_no_match() {
        let body = "a".repeat(300);
        let snippet = build_snippet(&body, &HashSet::new(), 2, 200);
        assert_eq!(snippet.len(), 200);
    }

    #[test]
    fn extracts_fragment_around_match() {
        let body = "the quick brown fox jumps over the lazy dog and keeps running for a very long distance indeed";
        let mut terms = HashSet::new();
        terms.insert(stem("fox"));
        let snippet = build_snippet(body, &terms, 2, 200);
        assert!(snippet.contains("fox"));
    }
}
