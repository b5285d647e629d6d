//! Train the emotion classifier end to end and report test metrics.

use std::io::Write;
use std::path::PathBuf;

use clap::Parser;
use semotion::config::{self, PipelineConfig};
use semotion::dataset::MatrixProgress;
use semotion::logging;
use semotion::pipeline::{PipelineProgress, run_training};

/// Index, extract features, train and evaluate in one run.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Pipeline config (default: the app config, or built-in defaults)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Dataset root whose subfolders are emotion names
    #[arg(long)]
    dataset: Option<PathBuf>,

    /// Number of training epochs
    #[arg(long)]
    epochs: Option<usize>,

    /// Directory for the trained model artifact
    #[arg(long)]
    model_dir: Option<PathBuf>,

    /// Nominal feature sample rate; clips are analysed at twice this rate
    #[arg(long)]
    sample_rate: Option<u32>,

    /// Seed for the split shuffle and the training run
    #[arg(long)]
    seed: Option<u64>,

    /// Feature extraction worker threads
    #[arg(long)]
    workers: Option<usize>,
}

impl Cli {
    fn apply(&self, config: &mut PipelineConfig) {
        if let Some(dataset) = &self.dataset {
            config.dataset.root = dataset.clone();
        }
        if let Some(epochs) = self.epochs {
            config.training.epochs = epochs;
        }
        if let Some(model_dir) = &self.model_dir {
            config.output.model_dir = Some(model_dir.clone());
        }
        if let Some(rate) = self.sample_rate {
            config.features.sample_rate = rate;
        }
        if let Some(seed) = self.seed {
            config.dataset.seed = seed;
            config.training.seed = seed;
        }
        if self.workers.is_some() {
            config.features.workers = self.workers;
        }
    }
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
    let mut config = match &cli.config {
        Some(path) => config::load_from(path),
        None => config::load_or_default(),
    }
    .map_err(|err| err.to_string())?;
    cli.apply(&mut config);

    let mut last_print = 0usize;
    let mut progress = |update: PipelineProgress| match update {
        PipelineProgress::Indexed { rows } => println!("Indexed {rows} clips"),
        PipelineProgress::Split { train, test } => {
            println!("Split into {train} train / {test} test clips");
            last_print = 0;
        }
        PipelineProgress::TrainFeatures(step) => print_extraction("train", step, &mut last_print),
        PipelineProgress::TestFeatures(step) => print_extraction("test", step, &mut last_print),
        PipelineProgress::Training { epochs } => println!("Training for {epochs} epochs..."),
        PipelineProgress::Saved => println!("Model saved"),
    };
    let report = run_training(&config, Some(&mut progress), None).map_err(|err| err.to_string())?;

    println!("model: {}", report.model_dir.display());
    println!("history: {}", report.history_path.display());
    if report.skipped > 0 {
        println!("skipped clips: {}", report.skipped);
    }
    if let Some(evaluation) = report.evaluation {
        println!(
            "test loss: {:.4}  test accuracy: {:.4}",
            evaluation.loss, evaluation.accuracy
        );
        println!("predictions: {}", report.predictions_path.display());
    }
    if let Some(metrics) = &report.metrics {
        for class in &metrics.per_class {
            println!(
                "{:<10} precision={:.3}  recall={:.3}  f1={:.3}  support={}",
                class.class_id, class.precision, class.recall, class.f1, class.support
            );
        }
    }
    if let Some(confusion) = &report.confusion {
        println!("confusion matrix (rows=true, cols=pred):");
        println!("{confusion}");
    }
    Ok(())
}

fn print_extraction(split: &str, step: MatrixProgress, last_print: &mut usize) {
    if step.processed == 0 {
        *last_print = 0;
    }
    if step.processed == step.total || step.processed.saturating_sub(*last_print) >= 25 {
        *last_print = step.processed;
        print!(
            "\rExtracting {split} features {}/{} (skipped {})",
            step.processed, step.total, step.skipped
        );
        let _ = std::io::stdout().flush();
        if step.processed == step.total {
            println!();
        }
    }
}
