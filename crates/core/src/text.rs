//! Lexical normalization helpers.
//!
//! Shared by the request profiler, the hash embedder, and the overlap
//! reranker. The assistant is French-first, so normalization folds the
//! French diacritics before any keyword comparison.

/// Lowercase a string and fold French diacritics to their bare letters.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.to_lowercase().chars() {
        match c {
            'à' | 'â' | 'ä' => out.push('a'),
            'é' | 'è' | 'ê' | 'ë' => out.push('e'),
            'î' | 'ï' => out.push('i'),
            'ô' | 'ö' => out.push('o'),
            'ù' | 'û' | 'ü' => out.push('u'),
            'ÿ' => out.push('y'),
            'ç' => out.push('c'),
            'œ' => out.push_str("oe"),
            'æ' => out.push_str("ae"),
            _ => out.push(c),
        }
    }
    out
}

/// Split a text into normalized alphanumeric words of at least `min_len`
/// characters.
pub fn content_words(text: &str, min_len: usize) -> Vec<String> {
    normalize(text)
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= min_len)
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_folds_diacritics() {
        assert_eq!(normalize("Éléphant à côté"), "elephant a cote");
        assert_eq!(normalize("CŒUR"), "coeur");
    }

    #[test]
    fn normalize_leaves_ascii_alone() {
        assert_eq!(normalize("Hello World"), "hello world");
    }

    #[test]
    fn content_words_filters_short_words() {
        let words = content_words("le chat dort à côté du poêle", 4);
        assert_eq!(words, vec!["chat", "dort", "cote", "poele"]);
    }

    #[test]
    fn content_words_splits_on_punctuation() {
        let words = content_words("config.toml, chargé!", 4);
        assert_eq!(words, vec!["config", "toml", "charge"]);
    }
}
