//! Convert a tabular CSV dataset into the local line-delimited JSON input
//! format. Column names for the dialogue and the optional gold SOAP text
//! are configurable; the `soap` key is emitted only when the column exists.

use std::fs::File;
use std::io::{BufWriter, Write};

use anyhow::{Context, Result};
use csv::StringRecord;
use serde_json::{Map, Value, json};
use tracing::info;

use crate::cli::PrepareDataArgs;
use crate::util::ensure_directory;

pub fn run(args: PrepareDataArgs) -> Result<()> {
    let mut reader = csv::Reader::from_path(&args.in_csv)
        .with_context(|| format!("failed to open csv: {}", args.in_csv.display()))?;

    let headers = reader
        .headers()
        .with_context(|| format!("failed to read csv headers: {}", args.in_csv.display()))?
        .clone();

    let dialogue_idx = headers
        .iter()
        .position(|header| header == args.dialogue_col)
        .with_context(|| {
            format!(
                "missing dialogue column '{}' in {}",
                args.dialogue_col,
                args.in_csv.display()
            )
        })?;
    let soap_idx = headers.iter().position(|header| header == args.soap_col);

    if let Some(parent) = args.out_jsonl.parent() {
        ensure_directory(parent)?;
    }
    let file = File::create(&args.out_jsonl)
        .with_context(|| format!("failed to create jsonl file: {}", args.out_jsonl.display()))?;
    let mut writer = BufWriter::new(file);

    let mut count = 0usize;
    for (index, record) in reader.records().enumerate() {
        let record =
            record.with_context(|| format!("failed to read csv record {index}"))?;
        let row = record_to_row(index, &record, dialogue_idx, soap_idx);

        serde_json::to_writer(&mut writer, &row)
            .with_context(|| format!("failed to serialize record {index}"))?;
        writer
            .write_all(b"\n")
            .with_context(|| format!("failed to write jsonl file: {}", args.out_jsonl.display()))?;
        count += 1;
    }

    writer
        .flush()
        .with_context(|| format!("failed to flush jsonl file: {}", args.out_jsonl.display()))?;

    info!(path = %args.out_jsonl.display(), rows = count, "wrote jsonl dataset");
    Ok(())
}

fn record_to_row(
    index: usize,
    record: &StringRecord,
    dialogue_idx: usize,
    soap_idx: Option<usize>,
) -> Value {
    let mut row = Map::new();
    row.insert("id".to_string(), json!(index.to_string()));
    row.insert(
        "dialogue".to_string(),
        json!(record.get(dialogue_idx).unwrap_or_default()),
    );
    if let Some(soap_idx) = soap_idx
        && let Some(soap) = record.get(soap_idx)
    {
        row.insert("soap".to_string(), json!(soap));
    }
    Value::Object(row)
}
