//! Label text index: an inverted index `token -> {term ids}` over each
//! term's preferred label and alt labels.
//!
//! The index is cached in memory and tagged with the store generation it was
//! built from; any mutation bumps the generation, and the next word search
//! rebuilds it.
//!
//! Tokenization:
//! - Split on anything that is not alphanumeric (Unicode aware, so
//!   "Égypte--Antiquités" yields "égypte" and "antiquités").
//! - Lowercase everything.
//! - Drop one-character tokens and a handful of English stopwords.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::Term;

#[derive(Debug, Default, Clone)]
pub(crate) struct InvertedIndex {
    pub(crate) token_to_terms: HashMap<String, BTreeSet<String>>,
}

impl InvertedIndex {
    fn build<'a>(terms: impl Iterator<Item = &'a Term>) -> Self {
        let mut out = InvertedIndex::default();
        for term in terms {
            let texts = std::iter::once(&term.label).chain(term.alt_labels.iter());
            for text in texts {
                for token in tokenize(text) {
                    out.token_to_terms
                        .entry(token)
                        .or_default()
                        .insert(term.id.clone());
                }
            }
        }
        out
    }

    /// Ids containing every token, in id order.
    fn query_all(&self, tokens: &[String]) -> BTreeSet<String> {
        let mut sets = Vec::with_capacity(tokens.len());
        for token in tokens {
            match self.token_to_terms.get(token) {
                Some(set) => sets.push(set),
                None => return BTreeSet::new(),
            }
        }
        sets.sort_by_key(|s| s.len());
        let Some((first, rest)) = sets.split_first() else {
            return BTreeSet::new();
        };
        first
            .iter()
            .filter(|id| rest.iter().all(|s| s.contains(*id)))
            .cloned()
            .collect()
    }
}

#[derive(Debug, Default)]
pub(crate) struct TextIndexCache {
    generation: AtomicU64,
    // (built_generation, index)
    index: RwLock<Option<(u64, InvertedIndex)>>,
}

impl TextIndexCache {
    pub(crate) fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn is_ready(&self) -> bool {
        let gen = self.generation.load(Ordering::SeqCst);
        self.index
            .read()
            .as_ref()
            .is_some_and(|(built, _)| *built == gen)
    }

    pub(crate) fn ensure_built(&self, terms: &BTreeMap<String, Term>) {
        if self.is_ready() {
            return;
        }
        let gen = self.generation.load(Ordering::SeqCst);
        let index = InvertedIndex::build(terms.values());
        tracing::debug!(
            tokens = index.token_to_terms.len(),
            terms = terms.len(),
            "built label text index"
        );
        *self.index.write() = Some((gen, index));
    }

    pub(crate) fn query_all(&self, terms: &BTreeMap<String, Term>, query: &str) -> BTreeSet<String> {
        let tokens = tokenize(query);
        if tokens.is_empty() {
            return BTreeSet::new();
        }
        self.ensure_built(terms);
        match self.index.read().as_ref() {
            Some((_, index)) => index.query_all(&tokens),
            None => BTreeSet::new(),
        }
    }
}

/// Split text into lowercase search tokens, using the same rules as the
/// label index.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    let mut current = String::new();

    for c in text.chars() {
        if c.is_alphanumeric() {
            current.extend(c.to_lowercase());
            continue;
        }
        if !current.is_empty() {
            push_token_if_interesting(&mut tokens, &mut current);
        }
    }
    if !current.is_empty() {
        push_token_if_interesting(&mut tokens, &mut current);
    }

    tokens
}

fn push_token_if_interesting(tokens: &mut Vec<String>, current: &mut String) {
    const MIN_TOKEN_CHARS: usize = 2;
    const STOPWORDS: &[&str] = &[
        "an", "and", "as", "at", "by", "for", "in", "is", "of", "on", "or", "the", "to", "with",
    ];

    if current.chars().count() >= MIN_TOKEN_CHARS && !STOPWORDS.contains(&current.as_str()) {
        tokens.push(std::mem::take(current));
    } else {
        current.clear();
    }
}
