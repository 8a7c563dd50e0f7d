//! Text cleaning, language detection and lemmatization.
//!
//! [`Normalizer::normalize`] takes one raw text and produces:
//!
//! - `cleaned_text`: URLs, `@mentions` and `#hashtags` removed, lowercased,
//!   digits and symbols dropped (ASCII letters and Latin accented letters
//!   only), whitespace collapsed
//! - `detected_language`: a language code from `whatlang`, or
//!   [`NOT_DETECTED`] when the cleaned text is too short or undecidable
//! - `lemmatized_text`: stopword-free lemmas for English and Italian when that
//!   language's model is loaded, empty otherwise
//!
//! The batch join over the collected tables lives in [`corpus`].

pub mod corpus;
pub mod lemmatizer;
pub mod stopwords;

use crate::models::NOT_DETECTED;
use lemmatizer::{LanguageModels, Lemmatizer};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use unicode_segmentation::UnicodeSegmentation;
use whatlang::Lang;

static URL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"http\S+|www\S+").unwrap());
static MENTION_HASHTAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[@#]\w+").unwrap());

/// Latin accented letters kept by the cleaner besides `a-z`/`A-Z`.
const ACCENTED: &str = "àáâãäåæçèéêëìíîïðñòóôõöøùúûüýþÿÀÁÂÃÄÅÆÇÈÉÊËÌÍÎÏÐÑÒÓÔÕÖØÙÚÛÜÝÞß";

/// Output of [`Normalizer::normalize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedText {
    pub detected_language: String,
    pub cleaned_text: String,
    pub lemmatized_text: String,
}

/// Remove URLs, mentions and hashtags, then lowercase.
pub fn strip_markup(raw: &str) -> String {
    let without_urls = URL_RE.replace_all(raw, "");
    MENTION_HASHTAG_RE
        .replace_all(&without_urls, "")
        .to_lowercase()
}

/// Keep letters from the allowed set and whitespace, then collapse runs of
/// whitespace. Applying it twice gives the same result as applying it once.
pub fn clean_chars(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_ascii_alphabetic() || ACCENTED.contains(*c) || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Full cleaning pipeline used for `cleaned_text`.
pub fn clean_text(raw: &str) -> String {
    clean_chars(&strip_markup(raw))
}

/// Two-letter code for the languages the corpus is likely to contain,
/// `whatlang`'s three-letter code otherwise.
pub fn language_code(lang: Lang) -> &'static str {
    match lang {
        Lang::Eng => "en",
        Lang::Ita => "it",
        Lang::Rus => "ru",
        Lang::Ukr => "uk",
        Lang::Deu => "de",
        Lang::Fra => "fr",
        Lang::Spa => "es",
        Lang::Por => "pt",
        Lang::Pol => "pl",
        Lang::Nld => "nl",
        Lang::Ron => "ro",
        Lang::Ces => "cs",
        Lang::Swe => "sv",
        Lang::Dan => "da",
        Lang::Fin => "fi",
        Lang::Tur => "tr",
        Lang::Hun => "hu",
        other => other.code(),
    }
}

/// Detect the language of already cleaned text.
pub fn detect_language(cleaned: &str, min_chars: usize) -> String {
    if cleaned.chars().count() < min_chars {
        return NOT_DETECTED.to_string();
    }
    whatlang::detect(cleaned)
        .map(|info| language_code(info.lang()).to_string())
        .unwrap_or_else(|| NOT_DETECTED.to_string())
}

/// Word tokens of lowercased text. Italian elisions (`dell'esercito`) are
/// split at the apostrophe.
fn tokens(text: &str, italian: bool) -> Vec<&str> {
    text.unicode_words()
        .flat_map(|word| {
            if italian {
                word.split(['\'', '’']).filter(|p| !p.is_empty()).collect()
            } else {
                vec![word]
            }
        })
        .collect()
}

/// Lemmatize `text`, dropping non-alphabetic tokens, one-letter lemmas and
/// stopwords.
///
/// `stop_words` is matched against the surface token only, so a content word
/// whose lemma happens to be a stopword (`said` -> `say`) is kept.
/// `lemma_stop_words` is matched against both the token and the lemma.
pub fn lemmatize<L: Lemmatizer>(
    text: &str,
    lemmatizer: &L,
    stop_words: &HashSet<&'static str>,
    lemma_stop_words: Option<&HashSet<&'static str>>,
    italian: bool,
) -> String {
    let curated = |word: &str| lemma_stop_words.is_some_and(|set| set.contains(word));
    tokens(text, italian)
        .into_iter()
        .filter(|token| token.chars().all(char::is_alphabetic))
        .filter(|token| !stop_words.contains(token) && !curated(*token))
        .map(|token| lemmatizer.lemma(token))
        .filter(|lemma| lemma.chars().count() > 1 && !curated(*lemma))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Per-text normalizer holding the loaded language models.
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    models: LanguageModels,
    min_detect_chars: usize,
}

impl Normalizer {
    pub fn new(models: LanguageModels, min_detect_chars: usize) -> Self {
        Self {
            models,
            min_detect_chars,
        }
    }

    pub fn normalize(&self, raw: &str) -> NormalizedText {
        self.normalize_with(raw, true)
    }

    /// Like [`Normalizer::normalize`]; with `detect` off the language is
    /// [`NOT_DETECTED`] and no lemmatization happens.
    pub fn normalize_with(&self, raw: &str, detect: bool) -> NormalizedText {
        let lowered = strip_markup(raw);
        let cleaned_text = clean_chars(&lowered);
        let detected_language = if detect {
            detect_language(&cleaned_text, self.min_detect_chars)
        } else {
            NOT_DETECTED.to_string()
        };

        let lemmatized_text = match (
            detected_language.as_str(),
            self.models.for_language(&detected_language),
        ) {
            ("en", Some(model)) => lemmatize(&lowered, model, &stopwords::ENGLISH, None, false),
            ("it", Some(model)) => lemmatize(
                &lowered,
                model,
                &stopwords::ITALIAN,
                Some(&stopwords::CUSTOM_ITALIAN),
                true,
            ),
            _ => String::new(),
        };

        NormalizedText {
            detected_language,
            cleaned_text,
            lemmatized_text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::lemmatizer::LookupLemmatizer;
    use super::*;

    const ENGLISH_TEXT: &str = "The soldiers were defending the cities against missiles \
        launched overnight by the invading forces near Kharkiv.";
    const ITALIAN_TEXT: &str = "L'esercito ucraino ha respinto l'attacco delle forze russe \
        vicino alla città di Kharkiv durante la notte.";

    fn english_model() -> LookupLemmatizer {
        LookupLemmatizer::from_pairs([
            ("soldier", "soldiers"),
            ("be", "were"),
            ("defend", "defending"),
            ("city", "cities"),
            ("missile", "missiles"),
            ("launch", "launched"),
            ("invade", "invading"),
            ("force", "forces"),
        ])
    }

    fn italian_model() -> LookupLemmatizer {
        LookupLemmatizer::from_pairs([
            ("respingere", "respinto"),
            ("forza", "forze"),
            ("russo", "russe"),
            ("avere", "ha"),
        ])
    }

    #[test]
    fn test_strips_urls_mentions_and_hashtags() {
        let normalizer = Normalizer::default();
        let out = normalizer.normalize_with("Check this out http://x.co/a @nato #war123", false);
        assert_eq!(out.cleaned_text, "check this out");
        assert_eq!(out.detected_language, NOT_DETECTED);
        assert_eq!(out.lemmatized_text, "");
    }

    #[test]
    fn test_clean_keeps_accents_and_drops_digits() {
        assert_eq!(
            clean_text("Città  di Kharkiv: 24 febbraio, perché?\n www.example.org"),
            "città di kharkiv febbraio perché"
        );
        assert_eq!(clean_text("Київ 2024"), "");
    }

    #[test]
    fn test_cleaning_is_idempotent() {
        for raw in [
            "Check this out http://x.co/a @nato #war123",
            "  Città   di Kharkiv!! 24 febbraio ",
            "ÀÉÎ ß mixed CASE",
            "",
        ] {
            let once = clean_text(raw);
            assert_eq!(clean_text(&once), once, "input: {raw:?}");
            assert_eq!(clean_chars(&once), once);
        }
    }

    #[test]
    fn test_short_text_is_not_detected() {
        assert_eq!(detect_language("war news", 15), NOT_DETECTED);
        assert_eq!(detect_language("", 15), NOT_DETECTED);
    }

    #[test]
    fn test_detects_english_and_italian() {
        assert_eq!(detect_language(&clean_text(ENGLISH_TEXT), 15), "en");
        assert_eq!(detect_language(&clean_text(ITALIAN_TEXT), 15), "it");
    }

    #[test]
    fn test_english_lemmatization() {
        let normalizer = Normalizer::new(
            LanguageModels {
                en: Some(english_model()),
                it: None,
            },
            15,
        );
        let out = normalizer.normalize(ENGLISH_TEXT);
        assert_eq!(out.detected_language, "en");
        assert_eq!(
            out.lemmatized_text,
            "soldier defend city missile launch overnight invade force near kharkiv"
        );
    }

    #[test]
    fn test_italian_lemmatization_splits_elisions() {
        let normalizer = Normalizer::new(
            LanguageModels {
                en: None,
                it: Some(italian_model()),
            },
            15,
        );
        let out = normalizer.normalize(ITALIAN_TEXT);
        assert_eq!(out.detected_language, "it");
        assert_eq!(
            out.lemmatized_text,
            "esercito ucraino respingere attacco forza russo vicino città kharkiv durante notte"
        );
    }

    #[test]
    fn test_stopwords_match_tokens_not_lemmas() {
        let model = LookupLemmatizer::from_pairs([
            ("official", "officials"),
            ("say", "said"),
            ("troop", "troops"),
            ("go", "went"),
        ]);
        let out = lemmatize(
            "officials said the troops went north",
            &model,
            &stopwords::ENGLISH,
            None,
            false,
        );
        assert_eq!(out, "official say troop go north");
    }

    #[test]
    fn test_custom_italian_stopwords_match_lemmas() {
        let model = LookupLemmatizer::from_pairs([("fatto", "fatti"), ("drone", "droni")]);
        let out = lemmatize(
            "i fatti e i droni",
            &model,
            &stopwords::ITALIAN,
            Some(&stopwords::CUSTOM_ITALIAN),
            true,
        );
        assert_eq!(out, "drone");
    }

    #[test]
    fn test_missing_model_leaves_lemmas_empty() {
        let normalizer = Normalizer::new(LanguageModels::default(), 15);
        let out = normalizer.normalize(ENGLISH_TEXT);
        assert_eq!(out.detected_language, "en");
        assert!(!out.cleaned_text.is_empty());
        assert_eq!(out.lemmatized_text, "");
    }

    #[test]
    fn test_other_languages_are_not_lemmatized() {
        let normalizer = Normalizer::new(
            LanguageModels {
                en: Some(english_model()),
                it: Some(italian_model()),
            },
            15,
        );
        let out = normalizer.normalize(
            "Die ukrainischen Streitkräfte haben in der Nacht mehrere Drohnen abgeschossen.",
        );
        assert_ne!(out.detected_language, "en");
        assert_ne!(out.detected_language, "it");
        assert_eq!(out.lemmatized_text, "");
    }
}
