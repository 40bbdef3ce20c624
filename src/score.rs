//! Per-example similarity scoring between gold and predicted SOAP notes.
//!
//! Two independent scorers: an LCS-based overlap F-measure over stemmed
//! tokens (`rougeL`), and a greedy token-alignment F1 over hashed-feature
//! token embeddings (`bertscore_F1`). Both treat missing input as the empty
//! string and never fail. The embedder is held by [`Scorer`] so it is
//! acquired once per run and reused across all examples.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::model::RowMetrics;
use crate::soap::parse_soap;

const EMBEDDING_DIM: usize = 128;

pub struct Scorer {
    embedder: TokenEmbedder,
}

impl Scorer {
    pub fn new() -> Self {
        Self {
            embedder: TokenEmbedder {
                dimensions: EMBEDDING_DIM,
            },
        }
    }

    /// Score a gold/pred pair. The `has_*` flags describe the prediction,
    /// not the gold text.
    pub fn score(&self, gold: Option<&str>, pred: Option<&str>) -> RowMetrics {
        let gold = gold.unwrap_or("");
        let pred = pred.unwrap_or("");
        let sections = parse_soap(pred);

        RowMetrics {
            rouge_l: rouge_l_f1(gold, pred),
            bertscore_f1: self.embedder.alignment_f1(gold, pred),
            has_s: !sections.subjective.is_empty(),
            has_o: !sections.objective.is_empty(),
            has_a: !sections.assessment.is_empty(),
            has_p: !sections.plan.is_empty(),
        }
    }
}

impl Default for Scorer {
    fn default() -> Self {
        Self::new()
    }
}

/// LCS-based F-measure over stemmed tokens.
fn rouge_l_f1(gold: &str, pred: &str) -> f64 {
    let gold_tokens = stemmed_tokens(gold);
    let pred_tokens = stemmed_tokens(pred);
    if gold_tokens.is_empty() || pred_tokens.is_empty() {
        return 0.0;
    }

    let lcs = lcs_length(&gold_tokens, &pred_tokens) as f64;
    if lcs == 0.0 {
        return 0.0;
    }

    let precision = lcs / pred_tokens.len() as f64;
    let recall = lcs / gold_tokens.len() as f64;
    2.0 * precision * recall / (precision + recall)
}

fn lcs_length(left: &[String], right: &[String]) -> usize {
    let mut previous = vec![0usize; right.len() + 1];
    let mut current = vec![0usize; right.len() + 1];

    for left_token in left {
        for (j, right_token) in right.iter().enumerate() {
            current[j + 1] = if left_token == right_token {
                previous[j] + 1
            } else {
                previous[j + 1].max(current[j])
            };
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[right.len()]
}

fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|word| {
            word.chars()
                .filter(|character| character.is_ascii_alphanumeric())
                .collect::<String>()
                .to_ascii_lowercase()
        })
        .filter(|word| !word.is_empty())
        .collect()
}

fn stemmed_tokens(text: &str) -> Vec<String> {
    tokenize(text)
        .into_iter()
        .map(|word| stem(&word).to_string())
        .collect()
}

/// Light suffix stripper, enough to fold common inflections together.
fn stem(word: &str) -> &str {
    for (suffix, min_len) in [("ing", 6), ("ed", 5), ("es", 5), ("ly", 6), ("s", 4)] {
        if word.len() >= min_len && word.ends_with(suffix) && !word.ends_with("ss") {
            return &word[..word.len() - suffix.len()];
        }
    }
    word
}

/// Embeds each token into a fixed-width hashed-feature vector (unigram plus
/// left/right neighbor context), L2-normalized, compared by cosine.
struct TokenEmbedder {
    dimensions: usize,
}

impl TokenEmbedder {
    /// Greedy token-alignment F1: precision is the mean best-match
    /// similarity of predicted tokens against gold tokens, recall the
    /// reverse.
    fn alignment_f1(&self, gold: &str, pred: &str) -> f64 {
        let gold_tokens = tokenize(gold);
        let pred_tokens = tokenize(pred);
        if gold_tokens.is_empty() || pred_tokens.is_empty() {
            return 0.0;
        }

        let gold_vectors = self.embed_all(&gold_tokens);
        let pred_vectors = self.embed_all(&pred_tokens);

        let precision = mean_best_match(&pred_vectors, &gold_vectors);
        let recall = mean_best_match(&gold_vectors, &pred_vectors);
        if precision + recall == 0.0 {
            return 0.0;
        }

        2.0 * precision * recall / (precision + recall)
    }

    fn embed_all(&self, tokens: &[String]) -> Vec<Vec<f32>> {
        (0..tokens.len())
            .map(|index| self.embed_token(tokens, index))
            .collect()
    }

    fn embed_token(&self, tokens: &[String], index: usize) -> Vec<f32> {
        let mut features = vec![(format!("w:{}", tokens[index]), 1.0_f32)];
        if index > 0 {
            features.push((format!("l:{}", tokens[index - 1]), 0.5));
        }
        if let Some(next) = tokens.get(index + 1) {
            features.push((format!("r:{next}"), 0.5));
        }

        let mut vector = vec![0_f32; self.dimensions];
        for (feature, weight) in features {
            let hash = stable_hash(&feature);
            let slot = (hash as usize) % self.dimensions;
            let sign = if (hash >> 63) & 1 == 0 { 1.0 } else { -1.0 };
            vector[slot] += sign * weight;
        }

        normalize_vector(&mut vector);
        vector
    }
}

fn mean_best_match(from: &[Vec<f32>], to: &[Vec<f32>]) -> f64 {
    let total: f64 = from
        .iter()
        .map(|vector| {
            to.iter()
                .map(|other| cosine_similarity(vector, other))
                .fold(0.0_f64, f64::max)
                .max(0.0)
        })
        .sum();
    total / from.len() as f64
}

fn cosine_similarity(left: &[f32], right: &[f32]) -> f64 {
    if left.len() != right.len() || left.is_empty() {
        return 0.0;
    }

    left.iter()
        .zip(right.iter())
        .map(|(left_value, right_value)| f64::from(*left_value) * f64::from(*right_value))
        .sum::<f64>()
}

fn stable_hash(value: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

fn normalize_vector(values: &mut [f32]) {
    let squared_norm = values
        .iter()
        .map(|value| f64::from(*value) * f64::from(*value))
        .sum::<f64>();

    if squared_norm <= 0.0 {
        return;
    }

    let norm = squared_norm.sqrt() as f32;
    if norm == 0.0 {
        return;
    }

    for value in values {
        *value /= norm;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::soap::parse_soap;

    #[test]
    fn score_tolerates_missing_inputs() {
        let scorer = Scorer::new();
        let metrics = scorer.score(None, None);
        assert_eq!(metrics.rouge_l, 0.0);
        assert_eq!(metrics.bertscore_f1, 0.0);
        assert!(!metrics.has_s && !metrics.has_o && !metrics.has_a && !metrics.has_p);
    }

    #[test]
    fn identical_texts_score_one_on_rouge() {
        let text = "S: chest pain for two days\nO: afebrile\nA: angina\nP: order ECG";
        let value = rouge_l_f1(text, text);
        assert!((value - 1.0).abs() < 1e-9, "got {value}");
    }

    #[test]
    fn disjoint_texts_score_zero_on_rouge() {
        assert_eq!(rouge_l_f1("alpha beta gamma", "delta epsilon"), 0.0);
    }

    #[test]
    fn rouge_respects_token_order() {
        let partial = rouge_l_f1("chest pain two days", "two days chest pain");
        assert!(partial > 0.0 && partial < 1.0, "got {partial}");
    }

    #[test]
    fn stemming_folds_inflections() {
        assert_eq!(stem("reporting"), "report");
        assert_eq!(stem("reported"), "report");
        assert_eq!(stem("symptoms"), "symptom");
        assert_eq!(stem("pain"), "pain");
        // Too short to strip, and double-s is protected.
        assert_eq!(stem("as"), "as");
        assert_eq!(stem("dizziness"), "dizziness");
    }

    #[test]
    fn identical_texts_score_near_one_on_embedding_f1() {
        let scorer = Scorer::new();
        let text = "patient reports chest pain radiating to the left arm";
        let metrics = scorer.score(Some(text), Some(text));
        assert!(metrics.bertscore_f1 > 0.99, "got {}", metrics.bertscore_f1);
    }

    #[test]
    fn unrelated_texts_score_lower_on_embedding_f1() {
        let scorer = Scorer::new();
        let close = scorer
            .score(Some("chest pain since tuesday"), Some("chest pain since monday"))
            .bertscore_f1;
        let far = scorer
            .score(Some("chest pain since tuesday"), Some("refill lisinopril prescription"))
            .bertscore_f1;
        assert!(close > far, "close={close} far={far}");
    }

    #[test]
    fn has_flags_agree_with_the_parser() {
        let scorer = Scorer::new();
        let pred = "S: chest pain\nA: angina";
        let metrics = scorer.score(Some("anything"), Some(pred));
        let sections = parse_soap(pred);
        assert_eq!(metrics.has_s, !sections.subjective.is_empty());
        assert_eq!(metrics.has_o, !sections.objective.is_empty());
        assert_eq!(metrics.has_a, !sections.assessment.is_empty());
        assert_eq!(metrics.has_p, !sections.plan.is_empty());
        assert!(metrics.has_s && !metrics.has_o && metrics.has_a && !metrics.has_p);
    }

    #[test]
    fn lcs_length_matches_known_cases() {
        let a: Vec<String> = ["a", "b", "c", "d"].iter().map(|s| s.to_string()).collect();
        let b: Vec<String> = ["b", "d"].iter().map(|s| s.to_string()).collect();
        assert_eq!(lcs_length(&a, &b), 2);
        assert_eq!(lcs_length(&a, &[]), 0);
    }
}
