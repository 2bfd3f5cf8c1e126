//! Gazetteer matching: finds place-name mentions in free text.
//!
//! The lexicon maps lower-cased, tokenized names (primary per-language names and
//! alternate names) to a canonical point geometry. Scanning is greedy
//! longest-match-first over sentence tokens, so "Zawiyat at Tart" wins over a
//! single-token "Tart".
//!
//! Results are ordered by the first position at which each place is mentioned.

use super::providers::{bounded, ReferenceStore};
use super::types::{FeatureCollection, GeoFeature};
use crate::error::{InferenceError, StoreError};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Column holding comma-delimited aliases, always queried.
pub const ALTERNATE_NAMES_COLUMN: &str = "alternatenames";

/// Names shorter than this (in characters) are too noisy to match.
pub const MIN_NAME_CHARS: usize = 3;

const BUILTIN_COLUMNS: &[(&str, &str)] = &[
    ("en", "name"),
    ("ar", "ar_name"),
    ("de", "de_name"),
    ("es", "es_name"),
    ("fr", "fr_name"),
    ("id", "id_name"),
    ("it", "it_name"),
    ("ru", "ru_name"),
    ("ur", "ur_name"),
    ("zh", "zh_name"),
];

// ─── Language → column table ────────────────────────────────────

/// Maps a language code to the reference-store column holding names in that language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageColumns {
    columns: BTreeMap<String, String>,
}

impl Default for LanguageColumns {
    fn default() -> Self {
        Self {
            columns: BUILTIN_COLUMNS
                .iter()
                .map(|(lang, col)| (lang.to_string(), col.to_string()))
                .collect(),
        }
    }
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl LanguageColumns {
    /// Build a table from `(language, column)` pairs, rejecting bad identifiers
    /// and duplicate languages.
    pub fn new<'a, I>(pairs: I) -> Result<Self, InferenceError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut columns = BTreeMap::new();
        for (lang, col) in pairs {
            let (lang, col) = (lang.trim(), col.trim());
            if !is_identifier(lang) || !is_identifier(col) {
                return Err(InferenceError::configuration(format!(
                    "invalid language column mapping '{}:{}'",
                    lang, col
                )));
            }
            if col == ALTERNATE_NAMES_COLUMN {
                return Err(InferenceError::configuration(format!(
                    "'{}' is reserved for alternate names",
                    col
                )));
            }
            if columns.insert(lang.to_string(), col.to_string()).is_some() {
                return Err(InferenceError::configuration(format!(
                    "language '{}' is mapped twice",
                    lang
                )));
            }
        }
        if columns.is_empty() {
            return Err(InferenceError::configuration("language column table is empty"));
        }
        Ok(Self { columns })
    }

    /// Parse `"en:name,ar:ar_name"`.
    pub fn parse(spec: &str) -> Result<Self, InferenceError> {
        let pairs = spec
            .split(',')
            .filter(|p| !p.trim().is_empty())
            .map(|pair| {
                pair.split_once(':').ok_or_else(|| {
                    InferenceError::configuration(format!(
                        "expected 'language:column', got '{}'",
                        pair.trim()
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(pairs)
    }

    pub fn column_for(&self, language: &str) -> Option<&str> {
        self.columns.get(language).map(String::as_str)
    }

    /// Name columns for a tenant's languages, in language order, without duplicates.
    pub fn columns_for(&self, languages: &[String]) -> Result<Vec<String>, InferenceError> {
        let mut out: Vec<String> = Vec::with_capacity(languages.len());
        for lang in languages {
            let col = self.column_for(lang).ok_or_else(|| {
                InferenceError::configuration(format!(
                    "no reference-store column mapped for language [{}]",
                    lang
                ))
            })?;
            if !out.iter().any(|c| c == col) {
                out.push(col.to_string());
            }
        }
        Ok(out)
    }
}

// ─── Lexicon ────────────────────────────────────────────────────

/// One grouped reference-store row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GazetteerEntry {
    /// Values of the requested name columns, each possibly comma-delimited.
    pub names: Vec<String>,
    pub alternate_names: String,
    /// Serialized GeoJSON point.
    pub geometry: String,
}

fn is_separator(c: char) -> bool {
    c.is_whitespace()
        || c.is_ascii_punctuation()
        || matches!(
            c,
            '\u{060C}' // Arabic comma
                | '\u{061B}' // Arabic semicolon
                | '\u{061F}' // Arabic question mark
                | '«'
                | '»'
                | '‘'
                | '’'
                | '“'
                | '”'
                | '…'
                | '–'
                | '—'
        )
}

/// Lower-case and split into word tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(is_separator)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Surface form → geometry index.
#[derive(Debug, Default)]
pub struct Lexicon {
    phrases: HashMap<String, usize>,
    features: Vec<GeoFeature>,
    longest: usize,
}

impl Lexicon {
    pub fn build(entries: &[GazetteerEntry]) -> Result<Self, StoreError> {
        let mut lexicon = Lexicon::default();
        let mut by_key: HashMap<String, usize> = HashMap::new();

        for entry in entries {
            let feature: GeoFeature = serde_json::from_str(&entry.geometry).map_err(|e| {
                StoreError::Malformed(format!("locality geometry '{}': {}", entry.geometry, e))
            })?;
            let next = lexicon.features.len();
            let index = *by_key.entry(feature.canonical_key()).or_insert(next);
            if index == next {
                lexicon.features.push(feature);
            }

            let surface_forms = entry
                .names
                .iter()
                .chain(std::iter::once(&entry.alternate_names))
                .flat_map(|column| column.split(','));
            for name in surface_forms {
                lexicon.insert(name, index);
            }
        }

        Ok(lexicon)
    }

    fn insert(&mut self, name: &str, index: usize) {
        let name = name.trim();
        if name.chars().count() < MIN_NAME_CHARS {
            return;
        }
        let tokens = tokenize(name);
        if tokens.is_empty() {
            return;
        }
        self.longest = self.longest.max(tokens.len());
        // later rows win on a shared surface form
        self.phrases.insert(tokens.join(" "), index);
    }

    /// Number of distinct surface forms.
    pub fn len(&self) -> usize {
        self.phrases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phrases.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.phrases.contains_key(&tokenize(name).join(" "))
    }

    /// Every distinct place mentioned in `sentence`, in order of first mention.
    pub fn find(&self, sentence: &str) -> Vec<GeoFeature> {
        let tokens = tokenize(sentence);
        let mut seen = HashSet::new();
        let mut hits = Vec::new();

        let mut i = 0;
        while i < tokens.len() {
            let max = self.longest.min(tokens.len() - i);
            let matched = (1..=max).rev().find_map(|len| {
                self.phrases
                    .get(&tokens[i..i + len].join(" "))
                    .map(|&index| (index, len))
            });
            match matched {
                Some((index, len)) => {
                    if seen.insert(index) {
                        hits.push(self.features[index].clone());
                    }
                    i += len;
                }
                None => i += 1,
            }
        }

        hits
    }
}

// ─── Matcher ────────────────────────────────────────────────────

/// Builds a lexicon from the tenant's reference store and scans text with it.
pub struct GazetteerMatcher {
    store: Arc<dyn ReferenceStore>,
    columns: LanguageColumns,
    timeout: Duration,
}

impl GazetteerMatcher {
    pub fn new(store: Arc<dyn ReferenceStore>, columns: LanguageColumns, timeout: Duration) -> Self {
        Self {
            store,
            columns,
            timeout,
        }
    }

    /// Find every place mentioned in `sentence`. An empty collection means no match.
    pub async fn match_sentence(
        &self,
        sentence: &str,
        supported_languages: &[String],
        reference_store: &str,
    ) -> Result<FeatureCollection, InferenceError> {
        let name_columns = self.columns.columns_for(supported_languages)?;
        if tokenize(sentence).is_empty() {
            debug!("Empty sentence, skipping locality query");
            return Ok(FeatureCollection::empty());
        }

        let entries = bounded(
            self.timeout,
            "locality query",
            self.store.query_localities(reference_store, &name_columns),
        )
        .await?;
        let lexicon = Lexicon::build(&entries)?;
        let features = lexicon.find(sentence);

        debug!(
            localities = entries.len(),
            surface_forms = lexicon.len(),
            matches = features.len(),
            "Gazetteer scan complete"
        );
        Ok(FeatureCollection::new(features))
    }
}
