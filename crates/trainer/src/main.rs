//! kstarter CLI
//!
//! Environment checks, the k-fold baseline and single-model training.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kstarter_trainer::dataset::{FeatureMatrix, Labels, Table};
use kstarter_trainer::probe::{run_probe, ProbeConfig};
use kstarter_trainer::workflow::baseline::{DEFAULT_ID_COL, DEFAULT_N_FOLDS, DEFAULT_TARGET_COL};
use kstarter_trainer::{
    clean_data, config, model_feature_columns, run_baseline, run_train, BaselineSettings, Device,
    StarterConfig, TrainRequest, VERSION,
};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "kstarter")]
#[command(version = VERSION)]
#[command(about = "Reproducible boosted-tree training for tabular competitions", long_about = None)]
struct Cli {
    /// TOML configuration overlay
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check data access, accelerator visibility and output writability
    CheckEnv {
        /// Dataset to load [default: <data_raw_dir>/train.csv]
        #[arg(long)]
        data: Option<PathBuf>,

        /// File to write [default: <data_output_dir>/test_output.txt]
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Stratified k-fold baseline producing a submission file
    Train {
        /// Directory holding train.csv, test.csv and sample_submission.csv
        #[arg(long)]
        data_dir: Option<PathBuf>,

        #[arg(long)]
        output_dir: Option<PathBuf>,

        #[arg(long)]
        model_dir: Option<PathBuf>,

        #[arg(long, default_value = DEFAULT_TARGET_COL)]
        target: String,

        #[arg(long, default_value = DEFAULT_ID_COL)]
        id_col: String,

        #[arg(long, default_value_t = DEFAULT_N_FOLDS)]
        folds: usize,

        #[arg(long)]
        seed: Option<u64>,

        /// `cuda` or `cpu` [default: $LGBM_DEVICE, else cuda]
        #[arg(long)]
        device: Option<String>,
    },

    /// Fit one model on pre-split data
    Fit {
        /// Training CSV
        #[arg(long)]
        train: PathBuf,

        /// Validation CSV used for early stopping
        #[arg(long)]
        val: Option<PathBuf>,

        #[arg(long, default_value = DEFAULT_TARGET_COL)]
        target: String,

        #[arg(long, default_value = DEFAULT_ID_COL)]
        id_col: String,

        /// Model family
        #[arg(long, default_value = "xgboost")]
        model: String,

        /// Directory for model.json and model.hash
        #[arg(long)]
        save_dir: Option<PathBuf>,

        #[arg(long)]
        seed: Option<u64>,
    },

    /// Print the effective configuration as TOML
    ShowConfig,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    let cfg = match &cli.config {
        Some(path) => StarterConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => config().clone(),
    };

    match cli.command {
        Command::CheckEnv { data, output } => {
            let mut probe = ProbeConfig::from_config(&cfg);
            if let Some(data) = data {
                probe.data_path = data;
            }
            if let Some(output) = output {
                probe.output_path = output;
            }
            let report = run_probe(&probe).context("Environment check failed")?;
            let passed = report.outcomes.iter().filter(|o| o.passed).count();
            info!("{}/{} checks passed", passed, report.outcomes.len());
        }

        Command::Train {
            data_dir,
            output_dir,
            model_dir,
            target,
            id_col,
            folds,
            seed,
            device,
        } => {
            let device = match device {
                Some(name) => name.parse::<Device>()?,
                None => Device::from_env()?,
            };
            let settings = BaselineSettings {
                data_dir: data_dir.unwrap_or_else(|| cfg.paths.data_raw_dir.clone()),
                output_dir: output_dir.unwrap_or_else(|| cfg.paths.data_output_dir.clone()),
                model_dir: model_dir.unwrap_or_else(|| cfg.paths.models_dir.clone()),
                id_col,
                target_col: target,
                n_folds: folds,
                seed: seed.unwrap_or(cfg.default_seed),
                device,
            };

            info!("kstarter v{} - k-fold baseline ({} folds, device {})", VERSION, folds, device);
            let report = run_baseline(&settings).context("Baseline training failed")?;
            info!(
                "Done: CV AUC {:.4}, {} models, submission {}",
                report.cv_auc,
                report.folds.len(),
                report.submission_path.display()
            );
        }

        Command::Fit {
            train,
            val,
            target,
            id_col,
            model,
            save_dir,
            seed,
        } => {
            let train_table = load_table(&train)?;
            let features = model_feature_columns(&train_table, &id_col, &target)?;

            let x_train = FeatureMatrix::from_table(&train_table, &features, "training data")?;
            let y_train = Labels::from_table(&train_table, &target, "training data")?;

            let validation = match &val {
                Some(path) => {
                    let table = load_table(path)?;
                    Some((
                        FeatureMatrix::from_table(&table, &features, "validation data")?,
                        Labels::from_table(&table, &target, "validation data")?,
                    ))
                }
                None => None,
            };

            let request = TrainRequest {
                x_val: validation.as_ref().map(|(x, _)| x),
                y_val: validation.as_ref().map(|(_, y)| y),
                model_name: model,
                save_dir,
                ..TrainRequest::new(&x_train, &y_train, seed.unwrap_or(cfg.default_seed))
            };

            let fitted = run_train(&request).context("Training failed")?;
            info!(
                "Trained {} trees (best iteration: {:?})",
                fitted.num_trees(),
                fitted.best_iteration
            );
        }

        Command::ShowConfig => {
            let rendered = toml::to_string_pretty(&cfg).context("Failed to render config")?;
            println!("{rendered}");
        }
    }

    Ok(())
}

fn load_table(path: &Path) -> Result<Table> {
    info!("Loading data from: {}", path.display());
    let table = Table::from_csv(path).with_context(|| format!("Failed to load {}", path.display()))?;
    Ok(clean_data(&table))
}
