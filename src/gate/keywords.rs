//! Affirmative keyword matching
//!
//! A transcript confirms a pending command when any configured keyword appears
//! in it as a whole word (or whole word sequence), ignoring case and
//! punctuation.

/// Keywords accepted as "yes" when none are configured
pub const DEFAULT_AFFIRMATIVE: &[&str] = &["yes", "proceed", "okay", "ok"];

/// Set of phrases that confirm a pending command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AffirmativeKeywords {
    /// Each phrase pre-split into lowercase words
    phrases: Vec<Vec<String>>,
}

impl AffirmativeKeywords {
    /// Build a keyword set, normalizing case and whitespace
    ///
    /// Blank entries are dropped.
    #[must_use]
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let phrases: Vec<Vec<String>> = keywords
            .into_iter()
            .map(|k| words(k.as_ref()))
            .filter(|p| !p.is_empty())
            .collect();

        tracing::debug!(count = phrases.len(), "affirmative keywords loaded");

        Self { phrases }
    }

    /// Check whether a transcript contains an affirmative phrase
    #[must_use]
    pub fn matches(&self, transcript: &str) -> bool {
        let spoken = words(transcript);
        self.phrases.iter().any(|phrase| {
            spoken
                .windows(phrase.len())
                .any(|window| window == phrase.as_slice())
        })
    }

    /// Number of configured phrases
    #[must_use]
    pub fn len(&self) -> usize {
        self.phrases.len()
    }

    /// Whether no phrases are configured
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.phrases.is_empty()
    }
}

impl Default for AffirmativeKeywords {
    fn default() -> Self {
        Self::new(DEFAULT_AFFIRMATIVE)
    }
}

/// Split text into lowercase alphanumeric words
fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_keywords() {
        let keywords = AffirmativeKeywords::default();
        assert_eq!(keywords.len(), 4);

        assert!(keywords.matches("yes"));
        assert!(keywords.matches("Yes please"));
        assert!(keywords.matches("OK, go ahead"));
        assert!(keywords.matches("okay."));
        assert!(keywords.matches("please PROCEED"));
    }

    #[test]
    fn test_rejects_non_affirmative() {
        let keywords = AffirmativeKeywords::default();

        assert!(!keywords.matches("no"));
        assert!(!keywords.matches("no thanks"));
        assert!(!keywords.matches("yesterday"));
        assert!(!keywords.matches("broken"));
        assert!(!keywords.matches(""));
    }

    #[test]
    fn test_multi_word_phrase() {
        let keywords = AffirmativeKeywords::new(["go ahead", "  Do It "]);

        assert!(keywords.matches("sure, go ahead"));
        assert!(keywords.matches("just do it!"));
        assert!(!keywords.matches("go and ahead"));
        assert!(!keywords.matches("yes"));
    }

    #[test]
    fn test_blank_keywords_dropped() {
        let keywords = AffirmativeKeywords::new(["", "   ", "yes"]);
        assert_eq!(keywords.len(), 1);

        let none = AffirmativeKeywords::new(Vec::<String>::new());
        assert!(none.is_empty());
        assert!(!none.matches("yes"));
    }
}
