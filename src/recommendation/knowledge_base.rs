//! Knowledge-base chunking and retrieval
//!
//! The strategy notes live in a plain text file. It is cut into overlapping
//! chunks with a recursive character splitter and indexed with TF-IDF
//! vectors; retrieval ranks chunks by cosine similarity to the query.

use crate::config::RecommendationSection;
use crate::error::{AppError, AppResult};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use tracing::{debug, info};

const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

static TOKEN_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[a-z0-9]+").expect("static regex"));

static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "how", "in", "is", "it",
        "its", "of", "on", "or", "that", "the", "their", "this", "to", "was", "were", "will",
        "with", "your", "you", "can", "into", "than", "then", "they", "them", "these", "those",
    ]
    .into_iter()
    .collect()
});

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Splits text on the coarsest separator present, recursing into pieces
/// that are still too long, then packs neighbours back together up to
/// `chunk_size` characters with `chunk_overlap` characters carried over.
#[derive(Debug, Clone, Copy)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TextSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size - 1),
        }
    }

    pub fn split(&self, text: &str) -> Vec<String> {
        self.split_with(text, &SEPARATORS)
    }

    fn split_with(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let chosen = separators
            .iter()
            .position(|sep| sep.is_empty() || text.contains(sep))
            .unwrap_or(separators.len().saturating_sub(1));
        let separator = separators.get(chosen).copied().unwrap_or("");
        let finer = separators.get(chosen + 1..).unwrap_or(&[]);

        let pieces: Vec<&str> = if separator.is_empty() {
            text.char_indices()
                .map(|(i, ch)| &text[i..i + ch.len_utf8()])
                .collect()
        } else {
            text.split(separator).filter(|s| !s.is_empty()).collect()
        };

        let mut chunks = Vec::new();
        let mut short: Vec<&str> = Vec::new();
        for piece in pieces {
            if char_len(piece) < self.chunk_size {
                short.push(piece);
                continue;
            }
            if !short.is_empty() {
                chunks.extend(self.merge(&short, separator));
                short.clear();
            }
            if finer.is_empty() {
                chunks.push(piece.to_string());
            } else {
                chunks.extend(self.split_with(piece, finer));
            }
        }
        if !short.is_empty() {
            chunks.extend(self.merge(&short, separator));
        }
        chunks
    }

    fn merge(&self, pieces: &[&str], separator: &str) -> Vec<String> {
        let sep_len = char_len(separator);
        let mut merged = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for piece in pieces {
            let len = char_len(piece);
            let joiner = if window.is_empty() { 0 } else { sep_len };
            if total + len + joiner > self.chunk_size && !window.is_empty() {
                push_joined(&mut merged, &window, separator);
                // Drop from the front until only the overlap remains and the
                // next piece fits
                while total > self.chunk_overlap
                    || (total > 0
                        && total + len + if window.is_empty() { 0 } else { sep_len }
                            > self.chunk_size)
                {
                    let Some(first) = window.pop_front() else {
                        break;
                    };
                    let dropped = char_len(first) + if window.is_empty() { 0 } else { sep_len };
                    total = total.saturating_sub(dropped);
                }
            }
            window.push_back(piece);
            total += len + if window.len() > 1 { sep_len } else { 0 };
        }
        push_joined(&mut merged, &window, separator);
        merged
    }
}

fn push_joined(out: &mut Vec<String>, window: &VecDeque<&str>, separator: &str) {
    let joined = window.iter().copied().collect::<Vec<_>>().join(separator);
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
}

fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    TOKEN_PATTERN
        .find_iter(&lowered)
        .map(|m| m.as_str())
        .filter(|token| token.len() > 1 && !STOP_WORDS.contains(token))
        .map(str::to_string)
        .collect()
}

type SparseVector = HashMap<String, f64>;

fn dot(a: &SparseVector, b: &SparseVector) -> f64 {
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    small
        .iter()
        .filter_map(|(term, weight)| large.get(term).map(|other| weight * other))
        .sum()
}

/// Chunked strategy notes with a TF-IDF index over them
#[derive(Debug, Clone)]
pub struct KnowledgeBase {
    chunks: Vec<String>,
    vectors: Vec<SparseVector>,
    idf: HashMap<String, f64>,
}

impl KnowledgeBase {
    /// Read and index the configured knowledge-base file
    pub async fn load(section: &RecommendationSection) -> AppResult<Self> {
        Self::load_path(
            &section.knowledge_base_path,
            TextSplitter::new(section.chunk_size, section.chunk_overlap),
        )
        .await
    }

    pub async fn load_path(path: &Path, splitter: TextSplitter) -> AppResult<Self> {
        let text = tokio::fs::read_to_string(path).await.map_err(|e| {
            AppError::internal(format!(
                "Knowledge base file not found at '{}': {e}",
                path.display()
            ))
        })?;
        let kb = Self::from_text(&text, splitter);
        info!(
            path = %path.display(),
            chunks = kb.len(),
            "Knowledge base indexed"
        );
        Ok(kb)
    }

    pub fn from_text(text: &str, splitter: TextSplitter) -> Self {
        let chunks = splitter.split(text);
        let tokenized: Vec<Vec<String>> = chunks.iter().map(|c| tokenize(c)).collect();

        let mut document_frequency: HashMap<&str, usize> = HashMap::new();
        for tokens in &tokenized {
            let unique: HashSet<&str> = tokens.iter().map(String::as_str).collect();
            for term in unique {
                *document_frequency.entry(term).or_default() += 1;
            }
        }

        // Smoothed idf so terms present everywhere still carry some weight
        let n = chunks.len() as f64;
        let idf: HashMap<String, f64> = document_frequency
            .into_iter()
            .map(|(term, df)| {
                let weight = ((1.0 + n) / (1.0 + df as f64)).ln() + 1.0;
                (term.to_string(), weight)
            })
            .collect();

        let vectors = tokenized
            .iter()
            .map(|tokens| vectorize(tokens, &idf))
            .collect();

        debug!(terms = idf.len(), "Built TF-IDF vocabulary");
        Self {
            chunks,
            vectors,
            idf,
        }
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn chunks(&self) -> &[String] {
        &self.chunks
    }

    /// The `k` chunks most similar to `query`, best first
    pub fn similarity_search(&self, query: &str, k: usize) -> Vec<&str> {
        let query_vector = vectorize(&tokenize(query), &self.idf);
        let mut scored: Vec<(usize, f64)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(i, vector)| (i, dot(&query_vector, vector)))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored
            .into_iter()
            .take(k)
            .map(|(i, _)| self.chunks[i].as_str())
            .collect()
    }
}

/// L2-normalised term-frequency times idf; unknown terms are ignored
fn vectorize(tokens: &[String], idf: &HashMap<String, f64>) -> SparseVector {
    let mut vector = SparseVector::new();
    for token in tokens {
        if let Some(weight) = idf.get(token) {
            *vector.entry(token.clone()).or_default() += weight;
        }
    }
    let norm = vector.values().map(|w| w * w).sum::<f64>().sqrt();
    if norm > 0.0 {
        for weight in vector.values_mut() {
            *weight /= norm;
        }
    }
    vector
}
