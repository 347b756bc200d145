use std::collections::HashMap;

/// BM25 parameters.
const K1: f32 = 1.2;
const B: f32 = 0.75;

/// Tokenize text into lowercase words, filtering tokens with length <= 1.
pub(crate) fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .map(str::to_lowercase)
        .filter(|w| w.len() > 1)
        .collect()
}

/// A BM25 inverted index over chunk text.
///
/// Documents are keyed by their position in the owning store, which makes
/// ties resolve in corpus order and keeps result ordering deterministic.
#[derive(Debug, Clone, Default)]
pub struct Bm25Index {
    /// term -> (doc -> term frequency)
    inverted_index: HashMap<String, HashMap<usize, f32>>,
    /// doc -> document length (word count)
    doc_lengths: HashMap<usize, f32>,
    total_length: f32,
}

impl Bm25Index {
    /// Create a new, empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document to the index under `doc`.
    ///
    /// Chunks are immutable, so each key is added once by the owning store.
    pub fn add_document(&mut self, doc: usize, text: &str) {
        let tokens = tokenize(text);
        let doc_len = tokens.len() as f32;

        let mut term_freq: HashMap<String, f32> = HashMap::new();
        for token in tokens {
            *term_freq.entry(token).or_insert(0.0) += 1.0;
        }

        for (term, freq) in term_freq {
            self.inverted_index
                .entry(term)
                .or_default()
                .insert(doc, freq);
        }

        self.doc_lengths.insert(doc, doc_len);
        self.total_length += doc_len;
    }

    /// Score every document against `query`, returning up to `top_k`
    /// `(doc, score)` pairs by descending score, ties by ascending `doc`.
    ///
    /// ```text
    /// score = sum over query terms of:
    ///   IDF(t) * (tf * (k1 + 1)) / (tf + k1 * (1 - b + b * dl / avgdl))
    /// IDF(t) = ln((N - df + 0.5) / (df + 0.5) + 1.0)
    /// ```
    pub fn search(&self, query: &str, top_k: usize) -> Vec<(usize, f32)> {
        if self.doc_lengths.is_empty() || top_k == 0 {
            return Vec::new();
        }

        let query_tokens = tokenize(query);
        if query_tokens.is_empty() {
            return Vec::new();
        }

        let n = self.doc_lengths.len() as f32;
        let avgdl = match self.total_length / n {
            avg if avg > 0.0 => avg,
            _ => 1.0,
        };
        let mut scores: HashMap<usize, f32> = HashMap::new();

        for token in &query_tokens {
            if let Some(postings) = self.inverted_index.get(token) {
                let df = postings.len() as f32;
                // Robertson IDF, always non-negative
                let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();

                for (&doc, &tf) in postings {
                    let dl = self.doc_lengths.get(&doc).copied().unwrap_or(0.0);
                    let numerator = tf * (K1 + 1.0);
                    let denominator = tf + K1 * (1.0 - B + B * dl / avgdl);
                    *scores.entry(doc).or_insert(0.0) += idf * numerator / denominator;
                }
            }
        }

        let mut results: Vec<(usize, f32)> = scores.into_iter().collect();
        results.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        results.truncate(top_k);
        results
    }
}
