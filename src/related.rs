//! Related-content lookup.
//!
//! With `related_posts = true`, each entity's related list is ranked by
//! TF-IDF cosine similarity against the other entities of its kind.
//! Building the index costs a pass over the whole corpus, so it happens at
//! most once per [`RelatedCache`] and is then shared read-only by every
//! render, including concurrent ones. The cache outlives
//! [`Site::reset`](crate::site::Site::reset): a long-running process keeps
//! the index it built first.
//!
//! ## Stale indices
//!
//! The index stores positions in the corpus it was built from. Once posts
//! are added, removed or re-dated, those positions refer to whatever entry
//! now sits there, so ranked lists can name unrelated entries. Lookups
//! still only return positions that exist in the current corpus and never
//! the entry itself. A fresh `Site` rebuilds the index.
//!
//! Without the flag, the related list is simply the first ten other
//! entities of the corpus in the order given.

use crate::entity::EntityKind;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Neighbours requested from the index. The entity itself is usually among
/// them and is dropped afterwards.
pub const NEIGHBOURS: usize = 11;

/// Length of the related list when similarity ranking is off.
pub const FALLBACK_LIMIT: usize = 10;

/// TF-IDF vectors for a fixed corpus.
#[derive(Debug, Clone, Default)]
pub struct SimilarityIndex {
    idf: HashMap<String, f64>,
    vectors: Vec<HashMap<String, f64>>,
}

impl SimilarityIndex {
    pub fn build<'a>(corpus: impl IntoIterator<Item = &'a str>) -> Self {
        let counts: Vec<HashMap<String, usize>> = corpus.into_iter().map(term_counts).collect();
        let n = counts.len() as f64;

        let mut document_frequency: HashMap<&str, usize> = HashMap::new();
        for doc in &counts {
            for term in doc.keys() {
                *document_frequency.entry(term.as_str()).or_default() += 1;
            }
        }
        let idf: HashMap<String, f64> = document_frequency
            .into_iter()
            .map(|(term, df)| (term.to_string(), (n / df as f64).ln() + 1.0))
            .collect();

        let vectors = counts.iter().map(|doc| weigh(doc, &idf)).collect();
        Self { idf, vectors }
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Indices of the `n` corpus documents most similar to `text`, best
    /// first. Ties keep corpus order.
    pub fn nearest(&self, text: &str, n: usize) -> Vec<usize> {
        let query = weigh(&term_counts(text), &self.idf);
        let mut scored: Vec<(usize, f64)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(i, doc)| (i, cosine(&query, doc)))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        scored.into_iter().take(n).map(|(i, _)| i).collect()
    }
}

fn term_counts(text: &str) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() > 1)
    {
        *counts.entry(word.to_lowercase()).or_default() += 1;
    }
    counts
}

/// Unit-length TF-IDF vector. Terms unknown to `idf` are dropped.
fn weigh(counts: &HashMap<String, usize>, idf: &HashMap<String, f64>) -> HashMap<String, f64> {
    let mut vector: HashMap<String, f64> = counts
        .iter()
        .filter_map(|(term, &count)| idf.get(term).map(|w| (term.clone(), count as f64 * w)))
        .collect();
    let norm = vector.values().map(|v| v * v).sum::<f64>().sqrt();
    if norm > 0.0 {
        vector.values_mut().for_each(|v| *v /= norm);
    }
    vector
}

fn cosine(a: &HashMap<String, f64>, b: &HashMap<String, f64>) -> f64 {
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    small
        .iter()
        .filter_map(|(term, w)| large.get(term).map(|v| w * v))
        .sum()
}

/// One lazily built index per entity kind.
#[derive(Debug, Default)]
pub struct RelatedCache {
    posts: OnceLock<SimilarityIndex>,
    photos: OnceLock<SimilarityIndex>,
}

impl RelatedCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The index for `kind`, building it with `build` on first use.
    /// Concurrent callers block until the single build finishes.
    pub fn get_or_build(
        &self,
        kind: EntityKind,
        build: impl FnOnce() -> SimilarityIndex,
    ) -> &SimilarityIndex {
        let cell = match kind {
            EntityKind::Post => &self.posts,
            EntityKind::Photo => &self.photos,
        };
        cell.get_or_init(build)
    }

    pub fn is_built(&self, kind: EntityKind) -> bool {
        match kind {
            EntityKind::Post => self.posts.get().is_some(),
            EntityKind::Photo => self.photos.get().is_some(),
        }
    }
}

/// Related entries for `corpus[target]`, as indices into `corpus`.
///
/// With an index, the nearest neighbours of `text` minus the target itself;
/// indices the current corpus does not have are skipped. Without one, the
/// first [`FALLBACK_LIMIT`] other entries. A corpus of one has no relations.
pub fn related_indices(
    target: usize,
    text: &str,
    corpus_len: usize,
    index: Option<&SimilarityIndex>,
) -> Vec<usize> {
    if corpus_len <= 1 {
        return Vec::new();
    }
    match index {
        Some(index) => index
            .nearest(text, NEIGHBOURS)
            .into_iter()
            .filter(|&i| i != target && i < corpus_len)
            .collect(),
        None => (0..corpus_len)
            .filter(|&i| i != target)
            .take(FALLBACK_LIMIT)
            .collect(),
    }
}
