//! Train command implementation.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use faro_features::{DEFAULT_TARGET, FeatureTable};
use faro_model::{
    DatasetEncoder, EncoderConfig, FitScalersOn, LogisticConfig, LogisticRegression, SplitSpec,
    evaluate,
};

use crate::cmd::{banner, cli_date};

/// Arguments of `faro train`.
#[derive(Debug, Args)]
pub(crate) struct TrainArgs {
    /// Feature table
    #[arg(long, default_value = "data/data_clean.csv")]
    input: PathBuf,

    /// First date of the validation partition (YYYY-MM-DD)
    #[arg(long, default_value = "2019-01-01")]
    valid_cutoff: String,

    /// First date of the test partition (YYYY-MM-DD)
    #[arg(long, default_value = "2020-06-01")]
    test_cutoff: String,

    /// Binary target column
    #[arg(long, default_value = DEFAULT_TARGET)]
    target: String,

    /// Feature columns (default: every normalized and absolute feature)
    #[arg(long, value_delimiter = ',')]
    features: Vec<String>,

    /// Fit scalers on every partition instead of training rows only
    #[arg(long)]
    scale_on_all: bool,

    /// Gradient step size
    #[arg(long, default_value_t = 0.1)]
    learning_rate: f64,

    /// Maximum number of gradient steps
    #[arg(long, default_value_t = 200)]
    max_epochs: usize,

    /// Where to save the fitted model
    #[arg(long, default_value = "data/model.json")]
    model_out: PathBuf,
}

/// Split, fit and report ROC-AUC per partition.
pub(crate) fn run_train(args: &TrainArgs) -> Result<()> {
    banner("Model evaluation");

    let table = FeatureTable::read_csv(&args.input)?;
    let features = if args.features.is_empty() {
        table.default_features()
    } else {
        args.features.clone()
    };
    let spec = SplitSpec {
        valid_cutoff: cli_date(&args.valid_cutoff)?,
        test_cutoff: cli_date(&args.test_cutoff)?,
        features,
        target: args.target.clone(),
    };
    let encoder = DatasetEncoder::new(EncoderConfig {
        fit_scalers_on: if args.scale_on_all {
            FitScalersOn::AllPartitions
        } else {
            FitScalersOn::TrainOnly
        },
        ..EncoderConfig::default()
    });
    let classifier = LogisticRegression::new(LogisticConfig {
        learning_rate: args.learning_rate,
        max_epochs: args.max_epochs,
        ..LogisticConfig::default()
    });

    println!("Rows:       {}", table.len());
    println!("Features:   {}", spec.features.len());
    println!("Target:     {}", spec.target);
    println!("Valid from: {}", spec.valid_cutoff);
    println!("Test from:  {}", spec.test_cutoff);
    println!();

    let (model, _, report) = evaluate(&classifier, &encoder, &table.rows, &spec)?;

    println!("{:<8} {:>8} {:>8} {:>8}", "Split", "Rows", "Labeled", "AUC");
    println!("{}", "─".repeat(36));
    for score in &report.scores {
        let auc = score.auc.map_or_else(|| "n/a".to_string(), |a| format!("{a:.4}"));
        println!(
            "{:<8} {:>8} {:>8} {:>8}",
            score.partition.to_string(),
            score.rows,
            score.labeled,
            auc
        );
    }

    println!("\nFeature importances ({})", report.classifier);
    println!("{}", "─".repeat(36));
    for (name, importance) in &report.importances {
        println!("{name:<28} {importance:>7.4}");
    }

    model.save(&args.model_out)?;
    println!("\nSaved model to {}", args.model_out.display());
    Ok(())
}
