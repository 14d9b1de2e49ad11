use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::classifier::ClassifierError;

const BUILTIN_DICTIONARY: &str = include_str!("../../../resources/lemma_dictionary.txt");

/// Detachment rules tried in order (noun rules first), `(suffix, replacement)`.
/// A candidate is accepted only when it is a known base form.
const NOUN_RULES: &[(&str, &str)] = &[
    ("s", ""),
    ("ses", "s"),
    ("xes", "x"),
    ("zes", "z"),
    ("ches", "ch"),
    ("shes", "sh"),
    ("men", "man"),
    ("ies", "y"),
];

const VERB_RULES: &[(&str, &str)] = &[
    ("s", ""),
    ("ies", "y"),
    ("es", "e"),
    ("es", ""),
    ("ed", "e"),
    ("ed", ""),
    ("ing", "e"),
    ("ing", ""),
];

lazy_static! {
    static ref BUILTIN: Arc<LemmaDictionary> = Arc::new(
        LemmaDictionary::parse(BUILTIN_DICTIONARY).unwrap_or_default()
    );
}

/// Dictionary-backed lemmatizer: a lexicon of base forms plus a table of
/// irregular inflections.
///
/// Lemmatization is deterministic and idempotent: the result is either a base
/// form from the lexicon or the unchanged input, and base forms map to
/// themselves.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LemmaDictionary {
    lemmas: BTreeSet<String>,
    exceptions: BTreeMap<String, String>,
}

impl LemmaDictionary {
    /// Creates an empty dictionary. Every word lemmatizes to itself.
    pub fn new() -> Self {
        Self::default()
    }

    /// The dictionary shipped with the crate, parsed once per process.
    pub fn builtin() -> Arc<LemmaDictionary> {
        Arc::clone(&BUILTIN)
    }

    /// Parses the line format: `lemma` or `inflected lemma`, `#` comments.
    pub fn parse(text: &str) -> Result<Self, ClassifierError> {
        let mut dictionary = Self::new();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = line.split_whitespace().collect();
            match fields.as_slice() {
                [lemma] => dictionary.add_lemma(lemma),
                [form, lemma] => dictionary.add_exception(form, lemma),
                _ => {
                    return Err(ClassifierError::configuration(format!(
                        "Invalid lemma dictionary entry on line {}: '{}'",
                        lineno + 1,
                        line
                    )))
                }
            }
        }
        Ok(dictionary)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ClassifierError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            ClassifierError::configuration(format!(
                "Failed to read lemma dictionary {:?}: {}",
                path, e
            ))
        })?;
        Self::parse(&text)
    }

    pub fn add_lemma(&mut self, lemma: &str) {
        self.lemmas.insert(lemma.to_lowercase());
    }

    /// Registers an irregular form. The target is added as a base form.
    pub fn add_exception(&mut self, form: &str, lemma: &str) {
        let lemma = lemma.to_lowercase();
        self.lemmas.insert(lemma.clone());
        self.exceptions.insert(form.to_lowercase(), lemma);
    }

    pub fn contains(&self, word: &str) -> bool {
        self.lemmas.contains(word)
    }

    pub fn len(&self) -> usize {
        self.lemmas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lemmas.is_empty()
    }

    /// Reduces `word` to its dictionary base form, or returns it unchanged
    /// when no rule produces a known base form.
    pub fn lemmatize(&self, word: &str) -> String {
        if word.is_empty() || self.contains(word) {
            return word.to_string();
        }
        if let Some(lemma) = self.exceptions.get(word) {
            return lemma.clone();
        }
        NOUN_RULES
            .iter()
            .chain(VERB_RULES.iter())
            .find_map(|&(suffix, replacement)| self.detach(word, suffix, replacement))
            .unwrap_or_else(|| word.to_string())
    }

    fn detach(&self, word: &str, suffix: &str, replacement: &str) -> Option<String> {
        if word.len() <= suffix.len() || !word.ends_with(suffix) {
            return None;
        }
        let stem = &word[..word.len() - suffix.len()];
        let candidate = format!("{}{}", stem, replacement);
        if self.contains(&candidate) {
            return Some(candidate);
        }
        // running -> runn -> run, stopped -> stopp -> stop
        if replacement.is_empty() && (suffix == "ing" || suffix == "ed") {
            let mut chars = stem.char_indices().rev();
            if let (Some((last_at, last)), Some((_, previous))) = (chars.next(), chars.next()) {
                if last == previous && last.is_ascii_alphabetic() && !is_vowel(last) {
                    let undoubled = &stem[..last_at];
                    if self.contains(undoubled) {
                        return Some(undoubled.to_string());
                    }
                }
            }
        }
        None
    }
}

fn is_vowel(c: char) -> bool {
    matches!(c, 'a' | 'e' | 'i' | 'o' | 'u')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_dictionary_loads() {
        let dictionary = LemmaDictionary::builtin();
        assert!(dictionary.len() > 100);
        assert!(dictionary.contains("water"));
        assert!(dictionary.contains("village"));
    }

    #[test]
    fn test_regular_inflections() {
        let dictionary = LemmaDictionary::builtin();
        assert_eq!(dictionary.lemmatize("needed"), "need");
        assert_eq!(dictionary.lemmatize("villages"), "village");
        assert_eq!(dictionary.lemmatize("running"), "run");
        assert_eq!(dictionary.lemmatize("supplies"), "supply");
        assert_eq!(dictionary.lemmatize("boxes"), "box");
        assert_eq!(dictionary.lemmatize("evacuated"), "evacuate");
    }

    #[test]
    fn test_irregular_and_unknown_words() {
        let dictionary = LemmaDictionary::builtin();
        assert_eq!(dictionary.lemmatize("children"), "child");
        assert_eq!(dictionary.lemmatize("women"), "woman");
        assert_eq!(dictionary.lemmatize("is"), "is");
        assert_eq!(dictionary.lemmatize("xyzzy"), "xyzzy");
        assert_eq!(dictionary.lemmatize(""), "");
    }

    #[test]
    fn test_lemmatize_is_idempotent() {
        let dictionary = LemmaDictionary::builtin();
        for word in ["needed", "children", "running", "floods", "qwerty", "news"] {
            let once = dictionary.lemmatize(word);
            assert_eq!(dictionary.lemmatize(&once), once, "word: {}", word);
        }
    }

    #[test]
    fn test_parse_rejects_malformed_lines() {
        assert!(LemmaDictionary::parse("water\nbad line here\n").is_err());
        let parsed = LemmaDictionary::parse("# comment\n\nwater\ngeese goose\n").unwrap();
        assert!(parsed.contains("goose"));
        assert_eq!(parsed.lemmatize("geese"), "goose");
        assert_eq!(parsed.lemmatize("waters"), "water");
    }

    #[test]
    fn test_non_ascii_stems_are_left_alone() {
        let dictionary = LemmaDictionary::builtin();
        assert_eq!(dictionary.lemmatize("x\u{2082}ing"), "x\u{2082}ing");
        assert_eq!(dictionary.lemmatize("caf\u{e9}\u{e9}ed"), "caf\u{e9}\u{e9}ed");
        assert_eq!(dictionary.lemmatize("running"), "run");
    }

    #[test]
    fn test_empty_dictionary_is_identity() {
        let dictionary = LemmaDictionary::new();
        assert_eq!(dictionary.lemmatize("needed"), "needed");
    }
}
