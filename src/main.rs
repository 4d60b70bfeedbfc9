//! Emotion Ensemble CLI
//!
//! `train` runs the cross-validated ensemble from a TOML configuration with
//! optional command-line overrides. `vote` re-aggregates a saved ensemble.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::info;

use emotion_ensemble::backend::{backend_name, default_device, TrainingBackend};
use emotion_ensemble::config::{class_weight_preset, EnsembleConfig, LossMode};
use emotion_ensemble::dataset::{load_corpus, LabelMode};
use emotion_ensemble::inference::{write_submission, EnsembleResult};
use emotion_ensemble::training::run_experiment;
use emotion_ensemble::utils::{init_logging, EmotionMetrics, LogConfig, LogLevel};

/// K-fold ensemble training for conversational emotion classification
#[derive(Parser, Debug)]
#[command(name = "emotion-ensemble")]
#[command(version)]
#[command(about = "Cross-validated emotion classifier ensemble with Burn", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, default_value = "false")]
    verbose: bool,

    /// Log level (trace, debug, info, warn, error); overrides --verbose
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Train the K-fold ensemble and write its artifacts
    Train {
        /// TOML configuration file (defaults apply when omitted)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Number of folds
        #[arg(long)]
        folds: Option<usize>,

        #[arg(long)]
        batch_size: Option<usize>,

        /// Initial learning rate
        #[arg(long)]
        lr: Option<f64>,

        /// Per-epoch learning-rate decay factor
        #[arg(long)]
        gamma: Option<f64>,

        /// Mixing weight of the binary loss
        #[arg(long)]
        lambda1: Option<f64>,

        /// Mixing weight of the emotion regression loss
        #[arg(long)]
        lambda2: Option<f64>,

        /// Early-stopping patience in epochs
        #[arg(long)]
        patience: Option<usize>,

        /// Exponent applied to the class weights
        #[arg(long)]
        flat: Option<f64>,

        /// Focusing parameter of the focal loss
        #[arg(long)]
        focal_gamma: Option<f64>,

        /// Class-weight preset (1 or 2)
        #[arg(long)]
        weights_preset: Option<u8>,

        /// Loss on the class head: ce or focal
        #[arg(long)]
        loss: Option<String>,

        #[arg(long)]
        hidden_size: Option<usize>,

        /// GloVe-style word vector file
        #[arg(long)]
        embedding_path: Option<PathBuf>,

        /// Suffix for the submission file name
        #[arg(long)]
        postname: Option<String>,
    },

    /// Majority-vote a saved ensemble result
    Vote {
        /// `dev_ensemble.json` or `test_ensemble.json` from a training run
        #[arg(short, long)]
        ensemble: PathBuf,

        /// Labeled corpus to score the voted predictions against
        #[arg(short, long)]
        gold: Option<PathBuf>,

        /// Unlabeled corpus to write a submission for
        #[arg(long, requires = "output")]
        submission_input: Option<PathBuf>,

        /// Submission output path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut log_config = if cli.verbose {
        LogConfig::verbose()
    } else {
        LogConfig::default()
    };
    if let Some(level) = &cli.log_level {
        log_config.level = LogLevel::parse(level);
    }
    let _ = init_logging(&log_config);

    match cli.command {
        Commands::Train {
            config,
            folds,
            batch_size,
            lr,
            gamma,
            lambda1,
            lambda2,
            patience,
            flat,
            focal_gamma,
            weights_preset,
            loss,
            hidden_size,
            embedding_path,
            postname,
        } => {
            let mut config = match config {
                Some(path) => EnsembleConfig::load(&path)
                    .with_context(|| format!("Failed to load config {:?}", path))?,
                None => EnsembleConfig::default(),
            };

            let training = &mut config.training;
            if let Some(v) = folds {
                training.folds = v;
            }
            if let Some(v) = batch_size {
                training.batch_size = v;
            }
            if let Some(v) = lr {
                training.learning_rate = v;
            }
            if let Some(v) = gamma {
                training.lr_gamma = v;
            }
            if let Some(v) = patience {
                training.patience = v;
            }

            let loss_config = &mut config.loss;
            if let Some(v) = lambda1 {
                loss_config.lambda_binary = v;
            }
            if let Some(v) = lambda2 {
                loss_config.lambda_emotion = v;
            }
            if let Some(v) = flat {
                loss_config.flatten = v;
            }
            if let Some(v) = focal_gamma {
                loss_config.focal_gamma = v;
            }
            if let Some(preset) = weights_preset {
                loss_config.class_weights = class_weight_preset(preset)?;
            }
            if let Some(mode) = loss {
                loss_config.mode = mode.parse::<LossMode>()?;
            }

            if let Some(v) = hidden_size {
                config.predictor.hidden_size = v;
            }
            if let Some(path) = embedding_path {
                config.data.embedding_path = Some(path);
            }
            if let Some(v) = postname {
                config.output.postname = v;
            }

            cmd_train(&config)?;
        }

        Commands::Vote {
            ensemble,
            gold,
            submission_input,
            output,
        } => {
            cmd_vote(&ensemble, gold.as_deref(), submission_input.as_deref(), output.as_deref())?;
        }
    }

    Ok(())
}

fn cmd_train(config: &EnsembleConfig) -> Result<()> {
    println!("{}", "Training emotion ensemble".green().bold());
    println!("  Backend:       {}", backend_name());
    println!("  Folds:         {}", config.training.folds);
    println!("  Batch size:    {}", config.training.batch_size);
    println!("  Learning rate: {}", config.training.learning_rate);
    println!(
        "  Loss:          {:?} (λ1 = {}, λ2 = {}, flat = {})",
        config.loss.mode, config.loss.lambda_binary, config.loss.lambda_emotion, config.loss.flatten
    );
    println!();

    let summary = run_experiment::<TrainingBackend>(config, default_device())?;

    println!();
    println!("{}", "Ensemble complete".green().bold());
    println!("  Dev micro-F1:  {:.4}", summary.dev.micro_f1);
    println!("  Test micro-F1: {:.4}", summary.test.micro_f1);
    if summary.total_attempts > config.training.folds {
        println!(
            "  {} {} divergence restarts",
            "Note:".yellow(),
            summary.total_attempts - config.training.folds
        );
    }
    println!("  Artifacts:     {:?}", summary.output_dir);

    Ok(())
}

fn cmd_vote(
    ensemble: &Path,
    gold: Option<&Path>,
    submission_input: Option<&Path>,
    output: Option<&Path>,
) -> Result<()> {
    let result = EnsembleResult::load(ensemble)
        .with_context(|| format!("Failed to load ensemble {:?}", ensemble))?;
    let votes = result.majority_vote()?;
    info!(
        "Voted {} examples across {} folds ({})",
        votes.len(),
        result.num_folds(),
        result.name
    );

    if let Some(path) = gold {
        let corpus = load_corpus(path, LabelMode::Labeled)?;
        let metrics = EmotionMetrics::from_predictions(&votes, &corpus.class_labels()?);
        println!("{}", metrics.display());
    }

    match (submission_input, output) {
        (Some(input), Some(output)) => {
            let corpus = load_corpus(input, LabelMode::Unlabeled)?;
            write_submission(&corpus, &votes, output)?;
            println!("{} {:?}", "Submission written to".green(), output);
        }
        (None, Some(output)) => {
            std::fs::write(output, serde_json::to_string_pretty(&votes)?)?;
            println!("{} {:?}", "Votes written to".green(), output);
        }
        _ => {
            let counts = votes.iter().fold([0usize; 4], |mut acc, &v| {
                if let Some(slot) = acc.get_mut(v) {
                    *slot += 1;
                }
                acc
            });
            println!("Vote distribution (happy, angry, sad, others): {:?}", counts);
        }
    }

    Ok(())
}
