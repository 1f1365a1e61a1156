//! Analysis pipeline: lowercase, split on non-alphanumeric, discard
//! empties, stem. This is the baseline the original single-node indexer
//! used (`re.findall(r'\w+', text.lower())`), enriched with a light
//! suffix-stripping stemmer so near-forms of a word (crawl/crawling/
//! crawled) collapse to the same term.

/// Tokenize and stem text, preserving the in-order word index of each
/// token as it appeared (used by snippet highlighting and term positions).
pub fn analyze(text: &str) -> Vec<String> {
    tokenize(text).into_iter().map(|t| stem(&t)).collect()
}

pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    for ch in text.chars() {
        if ch.is_alphanumeric() {
            current.push(ch.to_ascii_lowercase());
        } else if !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// A deliberately small suffix-stripping stemmer, not a full Porter
/// implementation: good enough to fold plurals and common verb endings
/// without a dependency the rest of this ecosystem doesn't otherwise pull
/// in.
pub fn stem(word: &str) -> String {
    if word.len() <= 3 {
        return word.to_string();
    }
    for suffix in ["ings", "ing", "edly", "ed", "ies", "es", "s"] {
        if let Some(stripped) = word.strip_suffix(suffix) {
            if stripped.len() >= 3 {
                if suffix == "ies" {
                    return format!("{stripped}y");
                }
                return stripped.to_string();
            }
        }
    }
    word.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_lowercase_and_splits_non_alphanumeric() {
        assert_eq!(tokenize("Hello, World! 123"), vec!["hello", "world", "123"]);
    }

    #[test]
    fn discards_empties_from_repeated_punctuation() {
        assert_eq!(tokenize("a---b"), vec!["a", "b"]);
    }

    #[test]
    fn stems_common_suffixes() {
        assert_eq!(stem("crawling"), "crawl");
        assert_eq!(stem("crawled"), "crawl");
        assert_eq!(stem("cookies"), "cooky");
        assert_eq!(stem("cats"), "cat");
        assert_eq!(stem("yes"), "yes");
    }
}
