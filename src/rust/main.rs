use anyhow::Context;
use clap::error::ErrorKind;
use clap::{Parser, Subcommand};
use disaster_response::{
    initialize, train, Categories, Dataset, ModelStore, RandomForest, RuntimeConfig, TrainingConfig,
};
use log::{error, info};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

const USAGE: &str = "Please provide the filepath of the disaster messages database \
as the first argument and the filepath of the model file to save the model to \
as the second argument.\n\n\
Example: disaster-response train data/DisasterResponse.db models/classifier.model\n\n\
To classify a message with a saved model:\n\
    disaster-response classify models/classifier.model \"We need water\"";

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Train on the ETL database and save the fitted model
    Train {
        database_path: PathBuf,
        model_output_path: PathBuf,
        /// JSON file with training settings
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        seed: Option<u64>,
        /// Worker threads, 0 for one per core
        #[arg(long)]
        threads: Option<usize>,
    },
    /// Print the category flags a saved model predicts for one message
    Classify { model_path: PathBuf, message: String },
}

async fn run_train(
    database_path: PathBuf,
    model_output_path: PathBuf,
    config_path: Option<PathBuf>,
    seed: Option<u64>,
    threads: Option<usize>,
) -> anyhow::Result<()> {
    let mut config = match config_path {
        Some(path) => TrainingConfig::from_file(&path)?,
        None => TrainingConfig::default(),
    };
    if let Some(seed) = seed {
        config.seed = seed;
    }
    if let Some(threads) = threads {
        config.threads = threads;
    }
    config.validate()?;
    let dictionary = initialize(&RuntimeConfig::from(&config))?;

    let start = Instant::now();
    info!("Loading data...\n    DATABASE: {}", database_path.display());
    let categories = Categories::disaster_response();
    let dataset = Dataset::from_sqlite(&database_path, &config.table, &categories)
        .await
        .with_context(|| format!("Failed to load {}", database_path.display()))?;

    let outcome = tokio::task::spawn_blocking(move || train(&dataset, &config, dictionary)).await??;

    println!("{}", outcome.report);
    match outcome.best_score {
        Some(score) => info!("Best parameters (cv score {:.4}): {:?}", score, outcome.best_params),
        None => info!("Parameters: {:?}", outcome.best_params),
    }
    for excluded in outcome.candidates.iter().filter(|c| c.is_excluded()) {
        info!(
            "Excluded candidate {:?}: {}",
            excluded.params,
            excluded.error.as_deref().unwrap_or("unknown error")
        );
    }

    info!("Saving model...\n    MODEL: {}", model_output_path.display());
    ModelStore::new(&model_output_path)
        .save(&outcome.classifier)
        .with_context(|| format!("Failed to save {}", model_output_path.display()))?;
    info!(
        "Trained model saved! ({} train / {} test messages, {:.2?})",
        outcome.train_size,
        outcome.test_size,
        start.elapsed()
    );
    Ok(())
}

fn run_classify(model_path: PathBuf, message: String) -> anyhow::Result<()> {
    initialize(&RuntimeConfig::default())?;
    let classifier = ModelStore::new(&model_path)
        .load_for::<RandomForest>(&Categories::disaster_response())
        .with_context(|| format!("Failed to load {}", model_path.display()))?;

    println!("Message: {}", message);
    for (category, flag) in classifier.predict_ordered(&message)? {
        println!("  {:<24} {}", category, flag);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    disaster_response::init_logger();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
        Err(_) => {
            println!("{}", USAGE);
            return ExitCode::SUCCESS;
        }
    };

    let result = match cli.command {
        Command::Train {
            database_path,
            model_output_path,
            config,
            seed,
            threads,
        } => run_train(database_path, model_output_path, config, seed, threads).await,
        Command::Classify { model_path, message } => run_classify(model_path, message),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
