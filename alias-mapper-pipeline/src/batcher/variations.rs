//! Search-friendly variations of alias strings.

use std::collections::HashSet;

/// Lowercase, trim and collapse internal whitespace.
fn normalize(term: &str) -> String {
    term.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Normalized form with ASCII punctuation removed.
fn strip_punctuation(term: &str) -> String {
    let stripped: String = term.chars().filter(|c| !c.is_ascii_punctuation()).collect();
    normalize(&stripped)
}

/// Expand every term into its normalized and punctuation-free forms.
///
/// The result keeps first-occurrence order and contains no duplicates or
/// blank strings.
pub fn expand(terms: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    terms
        .iter()
        .flat_map(|term| {
            let lowered = normalize(term);
            let cleaned = strip_punctuation(&lowered);
            [lowered, cleaned]
        })
        .filter(|variation| !variation.is_empty())
        .filter(|variation| seen.insert(variation.clone()))
        .collect()
}
