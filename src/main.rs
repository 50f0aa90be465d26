//! brainscan CLI
//!
//! Indexes the MRI dataset, trains and evaluates the two classifiers, and
//! classifies single scans with a saliency overlay and optional explanation.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;

use brainscan::config::load_config;
use brainscan::dataset::{class_counts, index_directory, ClassLabel};
use brainscan::eval::{format_confusion, Evaluation};
use brainscan::explain::{Explainer, GeminiExplainer};
use brainscan::inference::{analyze_file, save_saliency, Classifier, Explanation, ModelChoice};
use brainscan::logging::{init_logging, LogConfig};
use brainscan::train::{evaluate_splits, load_splits, train_model};

/// Brain MRI tumor classification
#[derive(Parser, Debug)]
#[command(name = "brainscan")]
#[command(version)]
#[command(about = "Brain MRI tumor classification with saliency maps", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (defaults to ./brainscan.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Arch {
    /// Custom convolutional network trained from scratch
    Cnn,
    /// Classification head on a pretrained backbone
    Transfer,
}

impl From<Arch> for ModelChoice {
    fn from(arch: Arch) -> Self {
        match arch {
            Arch::Cnn => ModelChoice::CustomCnn,
            Arch::Transfer => ModelChoice::Transfer,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Count images per class under a dataset directory
    Index {
        /// Directory with one sub-directory per class
        dir: PathBuf,
    },

    /// Train a classifier and evaluate it on every split
    Train {
        #[arg(short, long, value_enum, default_value = "cnn")]
        arch: Arch,

        /// Pretrained artifact for the transfer model's feature layers
        #[arg(long)]
        backbone: Option<PathBuf>,

        /// Override the configured number of epochs
        #[arg(short, long)]
        epochs: Option<usize>,
    },

    /// Evaluate a trained model on the train, validation and test splits
    Evaluate {
        #[arg(short, long)]
        model: PathBuf,
    },

    /// Classify one scan and write its saliency overlay
    Predict {
        #[arg(short, long)]
        model: PathBuf,

        #[arg(short, long)]
        image: PathBuf,

        /// Ask the explanation API to describe the saliency map
        #[arg(long)]
        explain: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = if cli.verbose { LogConfig::verbose() } else { LogConfig::default() };
    init_logging(&log_config).map_err(anyhow::Error::msg)?;

    let mut config = load_config(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::Index { dir } => {
            let samples = index_directory(&dir)?;
            let counts = class_counts(&samples);
            println!("{} images under {}", samples.len(), dir.display());
            for label in ClassLabel::ALL {
                println!("  {:<12} {:>6}", label.display_name(), counts[label.index()]);
            }
        }

        Commands::Train { arch, backbone, epochs } => {
            if let Some(epochs) = epochs {
                config.training.epochs = epochs;
            }
            let outcome = train_model(&config, arch.into(), backbone.as_deref())
                .with_context(|| format!("Training the {:?} model failed", arch))?;

            println!("Model written to {}", outcome.model_path.display());
            println!("History: {} / {}", outcome.history_path.display(), outcome.chart_path.display());
            for best in outcome.history.best_epochs() {
                println!("  best {:<9} epoch {} ({:.4})", best.metric.to_string(), best.epoch, best.value);
            }
            print_evaluations(&outcome.evaluations);
        }

        Commands::Evaluate { model } => {
            let mut classifier = Classifier::load(&model)
                .with_context(|| format!("Failed to load model {}", model.display()))?;
            let splits = load_splits(&config)?;
            let evaluations = evaluate_splits(&mut classifier.network, &splits)?;
            print_evaluations(&evaluations);
        }

        Commands::Predict { model, image, explain } => {
            let mut classifier = Classifier::load(&model)
                .with_context(|| format!("Failed to load model {}", model.display()))?;
            let explainer = if explain {
                if !config.explain.enabled {
                    bail!("explanations are disabled in the configuration");
                }
                Some(GeminiExplainer::from_config(&config.explain)?)
            } else {
                None
            };

            let analysis = analyze_file(
                &mut classifier,
                &image,
                &config.saliency,
                explainer.as_ref().map(|e| e as &dyn Explainer),
            )?;
            let upload_name = image.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
            let saliency_path = save_saliency(&analysis.saliency, &config.saliency.output_dir, &upload_name)?;

            println!(
                "{}: {} ({:.2}%)",
                image.display(),
                analysis.prediction.label,
                analysis.prediction.confidence * 100.0
            );
            for (label, p) in analysis.prediction.ranked() {
                println!("  {:<12} {:>7.2}%", label.display_name(), p * 100.0);
            }
            println!("Saliency map: {}", saliency_path.display());
            match analysis.explanation {
                Explanation::Text(text) => println!("\n{}", text),
                Explanation::Unavailable(reason) => println!("\nExplanation unavailable: {}", reason),
                Explanation::Disabled => {}
            }
        }
    }

    info!("done");
    Ok(())
}

fn print_evaluations(evaluations: &[Evaluation]) {
    for eval in evaluations {
        let m = &eval.metrics;
        println!(
            "{:<10} loss {:.4}  accuracy {:.2}%  precision {:.2}%  recall {:.2}%",
            eval.split,
            m.loss,
            m.accuracy * 100.0,
            m.precision * 100.0,
            m.recall * 100.0
        );
    }
    if let Some(test) = evaluations.iter().find(|e| e.split == "test") {
        let names: Vec<String> = ClassLabel::ALL.iter().map(|l| l.display_name().to_string()).collect();
        println!("\nConfusion matrix (test):\n{}", format_confusion(&test.confusion, &names));
        println!("Classification report (test):\n{}", test.report);
    }
}
