//! Scan an emotion-labelled folder tree and write its index CSV.

use std::path::PathBuf;

use clap::Parser;
use semotion::config;
use semotion::dataset::{build_index, default_index_path};
use semotion::logging;

/// Index every clip under DATASET by its parent folder name.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Dataset root whose subfolders are emotion names
    #[arg(long)]
    dataset: PathBuf,

    /// Index CSV to write (default: DATASET/index.csv)
    #[arg(long)]
    out: Option<PathBuf>,

    /// Pipeline config supplying the emotion vocabulary
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() {
    if let Err(err) = logging::init() {
        eprintln!("Logging to file disabled: {err}");
    }
    if let Err(err) = run(Cli::parse()) {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), String> {
    let config = match &cli.config {
        Some(path) => config::load_from(path),
        None => config::load_or_default(),
    }
    .map_err(|err| err.to_string())?;
    let vocabulary = config.vocabulary().map_err(|err| err.to_string())?;
    let out = cli.out.unwrap_or_else(|| default_index_path(&cli.dataset));
    let index = build_index(&cli.dataset, &vocabulary, &out).map_err(|err| err.to_string())?;
    println!("Indexed {} clips into {}", index.len(), out.display());
    for (label, name) in vocabulary.names().iter().enumerate() {
        let count = index.rows.iter().filter(|row| row.label == label).count();
        println!("{name:<10} {count}");
    }
    Ok(())
}
