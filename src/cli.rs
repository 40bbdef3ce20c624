use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::generate::Provider;

#[derive(Parser, Debug)]
#[command(
    name = "soapeval",
    version,
    about = "Generate SOAP notes from dialogue transcripts and score them against gold references"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the generation-and-evaluation pipeline over a dataset
    Run(RunArgs),
    /// Convert a tabular CSV dataset into the local JSONL input format
    PrepareData(PrepareDataArgs),
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Dataset spec: local:<path> | hf:omi-health/medical-dialogue-to-soap-summary | hf:bigbio/meddialog
    #[arg(long)]
    pub dataset: String,

    /// Corpus split (ignored for local files)
    #[arg(long, default_value = "validation")]
    pub split: String,

    /// Keep only the first N examples after loading
    #[arg(long)]
    pub limit: Option<usize>,

    #[arg(long, value_enum, default_value_t = Provider::Openai)]
    pub provider: Provider,

    /// Model id (e.g. gpt-4o-mini, claude-3-5-sonnet-latest)
    #[arg(long, default_value = "gpt-4o-mini")]
    pub model: String,

    #[arg(long, default_value_t = 0.2)]
    pub temperature: f64,

    #[arg(long, default_value_t = 512)]
    pub max_tokens: u32,

    /// Where to write predictions and aggregate metrics
    #[arg(long, default_value = "./outputs")]
    pub out_dir: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct PrepareDataArgs {
    #[arg(long)]
    pub in_csv: PathBuf,

    #[arg(long, default_value = "dialogue")]
    pub dialogue_col: String,

    #[arg(long, default_value = "soap")]
    pub soap_col: String,

    #[arg(long)]
    pub out_jsonl: PathBuf,
}
