//! Tokenize, lemmatize, count and tag one message.

use std::collections::{BTreeSet, HashMap};

/// One distinct token of a message.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TokenSummary {
    pub token: String,
    /// Lower-cased base form.
    pub base: String,
    /// Occurrences of `token` in the message.
    pub frequency: usize,
    pub pos: &'static str,
}

/// Split into tokens: runs of alphanumerics, with inner apostrophes, hyphens and underscores kept
/// (`don't`, `use-after-free`, `foo_bar`). Everything else separates tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c.is_alphanumeric() {
            current.push(c);
            continue;
        }
        let joins = matches!(c, '\'' | '-' | '_')
            && !current.is_empty()
            && chars.peek().is_some_and(|n| n.is_alphanumeric());
        if joins {
            current.push(c);
        } else if !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Suffix rules, longest first: (suffix, replacement, minimum stem length).
const SUFFIX_RULES: &[(&str, &str, usize)] = &[
    ("ies", "y", 2),
    ("sses", "ss", 2),
    ("ing", "", 3),
    ("ed", "", 3),
    ("es", "", 3),
    ("s", "", 3),
];

/// Lower-cased base form by suffix stripping. Numbers and short words are left as is.
pub fn lemmatize(token: &str) -> String {
    let lower = token.to_lowercase();
    if lower.chars().any(|c| c.is_numeric()) || lower.ends_with("ss") {
        return lower;
    }
    for (suffix, replacement, min_stem) in SUFFIX_RULES {
        if let Some(stem) = lower.strip_suffix(suffix)
            && stem.chars().count() >= *min_stem
        {
            return format!("{stem}{replacement}");
        }
    }
    lower
}

const DETERMINERS: &[&str] = &["a", "an", "the", "this", "that", "these", "those"];
const PRONOUNS: &[&str] = &["i", "you", "he", "she", "it", "we", "they", "me", "us", "them"];
const PREPOSITIONS: &[&str] = &["in", "on", "at", "of", "for", "with", "to", "from", "by"];

/// Coarse Penn-style part-of-speech tag from word lists and suffixes.
pub fn pos_tag(token: &str) -> &'static str {
    let lower = token.to_lowercase();
    let word = lower.as_str();
    if word.chars().all(|c| c.is_numeric()) {
        "CD"
    } else if DETERMINERS.contains(&word) {
        "DT"
    } else if PRONOUNS.contains(&word) {
        "PRP"
    } else if PREPOSITIONS.contains(&word) {
        "IN"
    } else if word.ends_with("ly") {
        "RB"
    } else if word.ends_with("ing") {
        "VBG"
    } else if word.ends_with("ed") {
        "VBD"
    } else if token.chars().next().is_some_and(|c| c.is_uppercase()) {
        "NNP"
    } else {
        "NN"
    }
}

/// Distinct `(token, base, frequency, pos)` tuples of `text`, sorted.
pub fn summarize(text: &str) -> Vec<TokenSummary> {
    let tokens = tokenize(text);
    let mut frequency: HashMap<&str, usize> = HashMap::new();
    for t in &tokens {
        *frequency.entry(t.as_str()).or_default() += 1;
    }
    tokens
        .iter()
        .map(|t| TokenSummary {
            token: t.clone(),
            base: lemmatize(t),
            frequency: frequency[t.as_str()],
            pos: pos_tag(t),
        })
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
