use serde::{Deserialize, Serialize};

/// One dialogue-to-summary unit. Constructed once at load time and
/// immutable for the rest of the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Example {
    pub id: String,
    pub dialogue: String,
    pub gold: Option<String>,
}

/// Per-example similarity metrics, present only when the example carried
/// a gold reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowMetrics {
    #[serde(rename = "rougeL")]
    pub rouge_l: f64,
    #[serde(rename = "bertscore_F1")]
    pub bertscore_f1: f64,
    #[serde(rename = "has_S")]
    pub has_s: bool,
    #[serde(rename = "has_O")]
    pub has_o: bool,
    #[serde(rename = "has_A")]
    pub has_a: bool,
    #[serde(rename = "has_P")]
    pub has_p: bool,
}

/// One output record of the predictions file, written in input order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultRow {
    pub id: String,
    pub dialogue: String,
    pub gold: Option<String>,
    pub pred: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<RowMetrics>,
}

/// Summary over all rows that carry metrics. The `has_*` fields are
/// coverage rates in [0,1].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateMetrics {
    #[serde(rename = "mean_rougeL")]
    pub mean_rouge_l: f64,
    #[serde(rename = "mean_bertscore_F1")]
    pub mean_bertscore_f1: f64,
    #[serde(rename = "has_S")]
    pub has_s: f64,
    #[serde(rename = "has_O")]
    pub has_o: f64,
    #[serde(rename = "has_A")]
    pub has_a: f64,
    #[serde(rename = "has_P")]
    pub has_p: f64,
    pub n_eval: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunManifest {
    pub manifest_version: u32,
    pub generated_at: String,
    pub dataset: String,
    pub split: String,
    pub limit: Option<usize>,
    pub provider: String,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub example_count: usize,
    pub scored_count: usize,
    pub source_sha256: Option<String>,
    pub predictions_path: String,
    pub metrics_path: Option<String>,
}
