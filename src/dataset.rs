//! Dataset loading over heterogeneous sources.
//!
//! Three source kinds are recognized: a local line-delimited JSON file
//! (`local:<path>`), and two named Hugging Face corpora fetched through the
//! datasets-server rows API. All sources normalize into [`Example`] records
//! with insertion order preserved.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use crate::model::Example;

pub const OMI_HEALTH_SPEC: &str = "hf:omi-health/medical-dialogue-to-soap-summary";
pub const MEDDIALOG_SPEC: &str = "hf:bigbio/meddialog";

const DATASETS_SERVER_ROWS_ENDPOINT: &str = "https://datasets-server.huggingface.co/rows";
const ROWS_PAGE_SIZE: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("unknown dataset spec: {spec}")]
    UnknownSpec { spec: String },

    #[error("line {line}: missing required field '{field}'")]
    MissingField { line: usize, field: &'static str },

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line}: invalid JSON: {source}")]
    InvalidJson {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("datasets-server request failed for {dataset}: {reason}")]
    Fetch { dataset: String, reason: String },
}

/// Load a dataset given its spec string. `split` selects the corpus
/// partition (ignored for local files). `limit` truncates after loading,
/// it is never pushed down to the source.
pub fn load_dataset(
    spec: &str,
    split: &str,
    limit: Option<usize>,
) -> Result<Vec<Example>, DatasetError> {
    let mut examples = if let Some(path) = spec.strip_prefix("local:") {
        load_local_jsonl(Path::new(path))?
    } else if spec == OMI_HEALTH_SPEC {
        load_omi_health(split)?
    } else if spec == MEDDIALOG_SPEC {
        load_meddialog(split)?
    } else {
        return Err(DatasetError::UnknownSpec {
            spec: spec.to_string(),
        });
    };

    if let Some(limit) = limit {
        examples.truncate(limit);
    }

    Ok(examples)
}

fn load_local_jsonl(path: &Path) -> Result<Vec<Example>, DatasetError> {
    let file = File::open(path).map_err(|source| DatasetError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let reader = BufReader::new(file);

    let mut examples = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(|source| DatasetError::Io {
            path: path.display().to_string(),
            source,
        })?;
        examples.push(parse_local_line(&line, index)?);
    }

    info!(path = %path.display(), count = examples.len(), "loaded local dataset");
    Ok(examples)
}

fn parse_local_line(line: &str, index: usize) -> Result<Example, DatasetError> {
    let row: Value = serde_json::from_str(line)
        .map_err(|source| DatasetError::InvalidJson { line: index, source })?;

    let dialogue = row
        .get("dialogue")
        .and_then(Value::as_str)
        .ok_or(DatasetError::MissingField {
            line: index,
            field: "dialogue",
        })?
        .to_string();

    let id = field_as_string(&row, "id").unwrap_or_else(|| index.to_string());
    let gold = row.get("soap").and_then(Value::as_str).map(ToOwned::to_owned);

    Ok(Example { id, dialogue, gold })
}

fn load_omi_health(split: &str) -> Result<Vec<Example>, DatasetError> {
    let rows = fetch_rows("omi-health/medical-dialogue-to-soap-summary", "default", split)?;

    Ok(rows
        .iter()
        .enumerate()
        .map(|(index, row)| Example {
            id: field_as_string(row, "id").unwrap_or_else(|| index.to_string()),
            dialogue: first_text(row, &["dialogue", "conversation"]).unwrap_or_default(),
            gold: first_text(row, &["summary", "soap", "soap_summary"]),
        })
        .collect())
}

fn load_meddialog(split: &str) -> Result<Vec<Example>, DatasetError> {
    let rows = fetch_rows("bigbio/meddialog", "meddialog_en", split)?;

    // This corpus carries no reference summaries.
    Ok(rows
        .iter()
        .enumerate()
        .map(|(index, row)| Example {
            id: field_as_string(row, "id").unwrap_or_else(|| index.to_string()),
            dialogue: first_text(row, &["dialogue", "content"]).unwrap_or_default(),
            gold: None,
        })
        .collect())
}

#[derive(Debug, Deserialize)]
struct RowsPage {
    rows: Vec<RowEntry>,
    num_rows_total: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct RowEntry {
    row: Value,
}

/// Page through the datasets-server rows endpoint until the split is
/// exhausted. One blocking request per page, no retries.
fn fetch_rows(dataset: &str, config: &str, split: &str) -> Result<Vec<Value>, DatasetError> {
    let mut rows = Vec::new();
    let mut offset = 0usize;

    loop {
        info!(dataset, config, split, offset, "fetching rows page");

        let response = ureq::get(DATASETS_SERVER_ROWS_ENDPOINT)
            .query("dataset", dataset)
            .query("config", config)
            .query("split", split)
            .query("offset", &offset.to_string())
            .query("length", &ROWS_PAGE_SIZE.to_string())
            .call()
            .map_err(|err| DatasetError::Fetch {
                dataset: dataset.to_string(),
                reason: format!("rows request failed at offset {offset}: {err}"),
            })?;

        let body = response
            .into_body()
            .read_to_string()
            .map_err(|err| DatasetError::Fetch {
                dataset: dataset.to_string(),
                reason: format!("failed reading rows response body: {err}"),
            })?;

        let page: RowsPage =
            serde_json::from_str(&body).map_err(|err| DatasetError::Fetch {
                dataset: dataset.to_string(),
                reason: format!("failed parsing rows response: {err}"),
            })?;

        let fetched = page.rows.len();
        rows.extend(page.rows.into_iter().map(|entry| entry.row));
        offset += fetched;

        let total = page.num_rows_total.unwrap_or(rows.len());
        if fetched == 0 || offset >= total {
            break;
        }
    }

    Ok(rows)
}

/// First non-empty string value among alternately-named fields.
fn first_text(row: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        row.get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(ToOwned::to_owned)
    })
}

fn field_as_string(row: &Value, key: &str) -> Option<String> {
    match row.get(key)? {
        Value::String(value) => Some(value.clone()),
        Value::Number(value) => Some(value.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn parse_local_line_reads_all_fields() {
        let example =
            parse_local_line(r#"{"id":"ex-1","dialogue":"D: hello","soap":"S: fine"}"#, 0)
                .expect("line should parse");
        assert_eq!(example.id, "ex-1");
        assert_eq!(example.dialogue, "D: hello");
        assert_eq!(example.gold.as_deref(), Some("S: fine"));
    }

    #[test]
    fn parse_local_line_defaults_id_to_line_index() {
        let example = parse_local_line(r#"{"dialogue":"D: hello"}"#, 7).expect("line should parse");
        assert_eq!(example.id, "7");
        assert!(example.gold.is_none());
    }

    #[test]
    fn parse_local_line_accepts_numeric_id() {
        let example =
            parse_local_line(r#"{"id":42,"dialogue":"D: hello"}"#, 0).expect("line should parse");
        assert_eq!(example.id, "42");
    }

    #[test]
    fn parse_local_line_requires_dialogue() {
        let err = parse_local_line(r#"{"id":"a"}"#, 3).expect_err("dialogue is required");
        match err {
            DatasetError::MissingField { line, field } => {
                assert_eq!(line, 3);
                assert_eq!(field, "dialogue");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn load_dataset_rejects_unknown_spec() {
        let err = load_dataset("ftp:foo", "validation", None).expect_err("spec is unknown");
        assert!(matches!(err, DatasetError::UnknownSpec { .. }));
    }

    #[test]
    fn load_dataset_applies_limit_after_loading() {
        let dir = std::env::temp_dir().join(format!("soapeval-dataset-{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("temp dir");
        let path = dir.join("five_lines.jsonl");

        let mut file = File::create(&path).expect("create temp jsonl");
        for i in 0..5 {
            writeln!(file, r#"{{"id":"{i}","dialogue":"turn {i}"}}"#).expect("write line");
        }
        drop(file);

        let spec = format!("local:{}", path.display());
        let examples = load_dataset(&spec, "validation", Some(2)).expect("load should succeed");
        assert_eq!(examples.len(), 2);
        assert_eq!(examples[0].id, "0");
        assert_eq!(examples[1].id, "1");
    }

    #[test]
    fn first_text_skips_empty_and_missing_fields() {
        let row: Value =
            serde_json::from_str(r#"{"dialogue":"  ","conversation":"spoken text"}"#).unwrap();
        assert_eq!(
            first_text(&row, &["dialogue", "conversation"]).as_deref(),
            Some("spoken text")
        );
        assert!(first_text(&row, &["summary", "soap"]).is_none());
    }
}
