//! Dictionary lemmatizers for English and Italian.
//!
//! A model is a tab-separated table with one `lemma<TAB>form` pair per line,
//! the layout of the freely available lemmatization lists. Forms are matched
//! lowercased; unknown tokens are their own lemma.

use crate::error::Result;
use csv::ReaderBuilder;
use std::collections::HashMap;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument, warn};

pub trait Lemmatizer {
    /// Base form of `token`, or `token` itself when unknown.
    fn lemma<'a>(&'a self, token: &'a str) -> &'a str;
}

#[derive(Debug, Clone, Default)]
pub struct LookupLemmatizer {
    forms: HashMap<String, String>,
}

impl LookupLemmatizer {
    pub fn from_pairs<I, L, F>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (L, F)>,
        L: AsRef<str>,
        F: AsRef<str>,
    {
        let forms = pairs
            .into_iter()
            .map(|(lemma, form)| {
                (
                    form.as_ref().trim().to_lowercase(),
                    lemma.as_ref().trim().to_lowercase(),
                )
            })
            .filter(|(form, lemma)| !form.is_empty() && !lemma.is_empty())
            .collect();
        Self { forms }
    }

    /// Parse a `lemma<TAB>form` table. Lines with fewer than two fields are skipped.
    pub fn from_tsv(bytes: &[u8]) -> Result<Self> {
        let mut reader = ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .flexible(true)
            .quoting(false)
            .comment(Some(b'#'))
            .from_reader(bytes);
        let mut pairs = Vec::new();
        for record in reader.records() {
            let record = record?;
            if let (Some(lemma), Some(form)) = (record.get(0), record.get(1)) {
                pairs.push((lemma.to_string(), form.to_string()));
            }
        }
        Ok(Self::from_pairs(pairs))
    }

    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub async fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).await?;
        let lemmatizer = Self::from_tsv(&bytes)?;
        info!(forms = lemmatizer.len(), "Loaded lemma table");
        Ok(lemmatizer)
    }

    pub fn len(&self) -> usize {
        self.forms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forms.is_empty()
    }
}

impl Lemmatizer for LookupLemmatizer {
    fn lemma<'a>(&'a self, token: &'a str) -> &'a str {
        self.forms.get(token).map(String::as_str).unwrap_or(token)
    }
}

/// The per-language models the normalizer can use. A `None` slot means that
/// language gets cleaned text only.
#[derive(Debug, Clone, Default)]
pub struct LanguageModels {
    pub en: Option<LookupLemmatizer>,
    pub it: Option<LookupLemmatizer>,
}

impl LanguageModels {
    /// Load `lemmas_en.tsv` and `lemmas_it.tsv` from `models_dir`.
    ///
    /// A missing or unreadable table is logged and leaves its slot empty.
    pub async fn load(models_dir: &Path) -> Self {
        let en = Self::load_one(models_dir, "en").await;
        let it = Self::load_one(models_dir, "it").await;
        match (&en, &it) {
            (None, None) => warn!(
                models_dir = %models_dir.display(),
                "No lemma tables loaded; every document gets cleaned text only"
            ),
            (None, Some(_)) => warn!("English lemma table missing; English texts get cleaned text only"),
            (Some(_), None) => warn!("Italian lemma table missing; Italian texts get cleaned text only"),
            (Some(_), Some(_)) => {}
        }
        Self { en, it }
    }

    async fn load_one(models_dir: &Path, code: &str) -> Option<LookupLemmatizer> {
        let path = models_dir.join(format!("lemmas_{code}.tsv"));
        match LookupLemmatizer::load(&path).await {
            Ok(lemmatizer) => Some(lemmatizer),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Could not load lemma table");
                None
            }
        }
    }

    /// Model for a detected language code, if that language is lemmatized and loaded.
    pub fn for_language(&self, code: &str) -> Option<&LookupLemmatizer> {
        match code {
            "en" => self.en.as_ref(),
            "it" => self.it.as_ref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_tsv() {
        let table = b"# comment\nbe\twas\nbe\tWere\nmissile\tmissiles\nbroken line\n";
        let lemmatizer = LookupLemmatizer::from_tsv(table).unwrap();
        assert_eq!(lemmatizer.len(), 3);
        assert_eq!(lemmatizer.lemma("were"), "be");
        assert_eq!(lemmatizer.lemma("missiles"), "missile");
        assert_eq!(lemmatizer.lemma("drone"), "drone");
    }

    #[tokio::test]
    async fn test_missing_tables_leave_slots_empty() {
        let tmp = tempfile::tempdir().unwrap();
        tokio::fs::write(tmp.path().join("lemmas_it.tsv"), "guerra\tguerre\n")
            .await
            .unwrap();

        let models = LanguageModels::load(tmp.path()).await;
        assert!(models.en.is_none());
        assert!(models.for_language("en").is_none());
        assert_eq!(models.for_language("it").unwrap().lemma("guerre"), "guerra");
        assert!(models.for_language("ru").is_none());
    }
}
