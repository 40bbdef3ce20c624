//! The generation-and-evaluation pipeline: load the dataset, generate one
//! note per example in input order, score against gold where present, then
//! persist predictions plus aggregate metrics.
//!
//! Execution is strictly sequential. Any backend failure aborts the whole
//! run before the predictions file is written; there is no retry and no
//! partial-result salvage.

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::dataset::load_dataset;
use crate::generate::{GenConfig, GenerationBackend, backend_from_env, generate_note};
use crate::model::{AggregateMetrics, ResultRow, RowMetrics, RunManifest};
use crate::score::Scorer;
use crate::util::{ensure_directory, now_utc_string, sha256_file, write_json_pretty, write_jsonl};

pub const PREDICTIONS_FILENAME: &str = "predictions.jsonl";
pub const METRICS_FILENAME: &str = "metrics.json";
pub const RUN_MANIFEST_FILENAME: &str = "run_manifest.json";

pub fn run(args: RunArgs) -> Result<()> {
    let cfg = GenConfig {
        provider: args.provider,
        model: args.model.clone(),
        temperature: args.temperature,
        max_tokens: args.max_tokens,
    };
    let backend = backend_from_env(&cfg)?;

    execute(&args, &cfg, backend.as_ref())
}

fn execute(args: &RunArgs, cfg: &GenConfig, backend: &dyn GenerationBackend) -> Result<()> {
    let examples = load_dataset(&args.dataset, &args.split, args.limit)?;
    info!(
        dataset = %args.dataset,
        split = %args.split,
        count = examples.len(),
        provider = cfg.provider.as_str(),
        model = %cfg.model,
        "dataset loaded"
    );

    ensure_directory(&args.out_dir)?;

    let scorer = Scorer::new();
    let mut rows = Vec::with_capacity(examples.len());
    for (position, example) in examples.iter().enumerate() {
        info!(id = %example.id, position, total = examples.len(), "generating");
        let pred = generate_note(&example.dialogue, cfg, backend)?;

        let metrics = example
            .gold
            .as_deref()
            .filter(|gold| !gold.is_empty())
            .map(|gold| scorer.score(Some(gold), Some(&pred)));

        rows.push(ResultRow {
            id: example.id.clone(),
            dialogue: example.dialogue.clone(),
            gold: example.gold.clone(),
            pred,
            metrics,
        });
    }

    let predictions_path = args.out_dir.join(PREDICTIONS_FILENAME);
    write_jsonl(&predictions_path, &rows)?;
    info!(path = %predictions_path.display(), rows = rows.len(), "wrote predictions");

    let scored: Vec<&RowMetrics> = rows.iter().filter_map(|row| row.metrics.as_ref()).collect();
    let metrics_path = if scored.is_empty() {
        warn!("no gold references found; only predictions written");
        None
    } else {
        let aggregate = aggregate_metrics(&scored);
        let path = args.out_dir.join(METRICS_FILENAME);
        write_json_pretty(&path, &aggregate)?;
        info!(
            path = %path.display(),
            n_eval = aggregate.n_eval,
            mean_rouge_l = aggregate.mean_rouge_l,
            "wrote aggregate metrics"
        );
        Some(path)
    };

    let source_sha256 = match args.dataset.strip_prefix("local:") {
        Some(path) => Some(
            sha256_file(std::path::Path::new(path))
                .with_context(|| format!("failed to hash dataset file: {path}"))?,
        ),
        None => None,
    };

    let manifest = RunManifest {
        manifest_version: 1,
        generated_at: now_utc_string(),
        dataset: args.dataset.clone(),
        split: args.split.clone(),
        limit: args.limit,
        provider: cfg.provider.as_str().to_string(),
        model: cfg.model.clone(),
        temperature: cfg.temperature,
        max_tokens: cfg.max_tokens,
        example_count: rows.len(),
        scored_count: scored.len(),
        source_sha256,
        predictions_path: predictions_path.display().to_string(),
        metrics_path: metrics_path.map(|path| path.display().to_string()),
    };
    let manifest_path = args.out_dir.join(RUN_MANIFEST_FILENAME);
    write_json_pretty(&manifest_path, &manifest)?;
    info!(path = %manifest_path.display(), "wrote run manifest");

    Ok(())
}

/// Arithmetic means over the scored rows; coverage rates are the fraction
/// of rows where each section flag holds. Caller guarantees `scored` is
/// non-empty.
fn aggregate_metrics(scored: &[&RowMetrics]) -> AggregateMetrics {
    let denominator = scored.len() as f64;
    let mean = |value: fn(&RowMetrics) -> f64| -> f64 {
        scored.iter().map(|metrics| value(metrics)).sum::<f64>() / denominator
    };
    let rate = |flag: fn(&RowMetrics) -> bool| -> f64 {
        scored.iter().filter(|metrics| flag(metrics)).count() as f64 / denominator
    };

    AggregateMetrics {
        mean_rouge_l: mean(|metrics| metrics.rouge_l),
        mean_bertscore_f1: mean(|metrics| metrics.bertscore_f1),
        has_s: rate(|metrics| metrics.has_s),
        has_o: rate(|metrics| metrics.has_o),
        has_a: rate(|metrics| metrics.has_a),
        has_p: rate(|metrics| metrics.has_p),
        n_eval: scored.len(),
    }
}
