//! Predict the emotion of one or more clips with a trained model.

use std::path::PathBuf;

use clap::Parser;
use semotion::analysis::DEFAULT_SAMPLE_RATE;
use semotion::inference::EmotionPredictor;
use semotion::logging;

/// Print `path<TAB>emotion<TAB>confidence` for every clip.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Trained model artifact directory
    #[arg(long)]
    model_dir: PathBuf,

    /// Nominal feature sample rate used at training time
    #[arg(long, default_value_t = DEFAULT_SAMPLE_RATE)]
    sample_rate: u32,

    /// Audio clips to classify
    #[arg(required = true)]
    files: Vec<PathBuf>,
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
    let predictor =
        EmotionPredictor::load(&cli.model_dir, cli.sample_rate).map_err(|err| err.to_string())?;
    let mut failures = 0usize;
    for (path, result) in cli.files.iter().zip(predictor.predict_files(&cli.files)) {
        match result {
            Ok(prediction) => {
                let confidence = prediction
                    .probabilities
                    .get(prediction.index)
                    .copied()
                    .unwrap_or_default();
                println!("{}\t{}\t{confidence:.3}", path.display(), prediction.label);
            }
            Err(err) => {
                failures += 1;
                eprintln!("{}: {err}", path.display());
            }
        }
    }
    if failures > 0 {
        return Err(format!("{failures} of {} clips failed", cli.files.len()));
    }
    Ok(())
}
