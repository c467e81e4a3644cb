use anyhow::Context;
use clap::{Parser, Subcommand};
use dino_identifier::{
    config::Config,
    dataset::DatasetLoader,
    ml::{Classifier, InferenceService, Trainer, TrainingReport},
    models::{Diet, FeatureVector, FEATURE_NAMES},
    state::{FileModelStore, ModelStore},
    telemetry::init_tracing,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "dino-cli")]
#[command(about = "Dinosaur diet identifier CLI", version, long_about = None)]
struct Cli {
    /// Log at info level instead of warnings only
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train the forest on the dataset and store the artifact
    Train {
        /// CSV dataset (defaults to data.dataset_path)
        #[arg(short, long)]
        dataset: Option<PathBuf>,

        /// Artifact destination (defaults to model.artifact_path)
        #[arg(short, long)]
        artifact: Option<PathBuf>,

        /// Print the training report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Predict the diet of one specimen
    Predict {
        /// Body length in meters
        #[arg(long, allow_hyphen_values = true)]
        length_m: f64,

        /// Oldest age the species lived at, in millions of years ago
        #[arg(long, allow_hyphen_values = true)]
        max_ma: f64,

        /// Youngest age the species lived at, in millions of years ago
        #[arg(long, allow_hyphen_values = true)]
        min_ma: f64,

        /// Artifact to load (defaults to model.artifact_path)
        #[arg(short, long)]
        artifact: Option<PathBuf>,

        /// Print the prediction as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show metadata of the stored artifact
    Inspect {
        /// Artifact to load (defaults to model.artifact_path)
        #[arg(short, long)]
        artifact: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let mut config = Config::load().context("failed to load configuration")?;
    if !cli.verbose {
        config.observability.log_level = "warn".to_string();
    }
    if let Err(e) = init_tracing(&config.observability) {
        eprintln!("Failed to initialize tracing: {}", e);
    }

    match cli.command {
        Commands::Train {
            dataset,
            artifact,
            json,
        } => {
            let dataset = dataset.unwrap_or(config.data.dataset_path.clone());
            let artifact = artifact.unwrap_or(config.model.artifact_path.clone());
            train(&config, dataset, artifact, json)?;
            Ok(ExitCode::SUCCESS)
        }

        Commands::Predict {
            length_m,
            max_ma,
            min_ma,
            artifact,
            json,
        } => {
            let artifact = artifact.unwrap_or(config.model.artifact_path);
            let store: Arc<dyn ModelStore> = Arc::new(FileModelStore::new(artifact));
            let service = InferenceService::new(store);
            let features = FeatureVector::new(length_m, max_ma, min_ma);

            match service.predict(&features) {
                Ok(prediction) if json => {
                    println!("{}", serde_json::to_string_pretty(&prediction)?);
                    Ok(ExitCode::SUCCESS)
                }
                Ok(prediction) => {
                    print_prediction(prediction.diet, prediction.confidence, &features);
                    Ok(ExitCode::SUCCESS)
                }
                Err(e) if e.is_missing_model() => {
                    eprintln!("{}", e);
                    Ok(ExitCode::from(2))
                }
                Err(e) => Err(e).context("prediction failed"),
            }
        }

        Commands::Inspect { artifact } => {
            let artifact = artifact.unwrap_or(config.model.artifact_path);
            let store = FileModelStore::new(&artifact);
            let forest = match store.read() {
                Ok(forest) => forest,
                Err(e) if e.is_missing_model() => {
                    eprintln!("{}", e);
                    eprintln!("{}", dino_identifier::ml::TRAIN_FIRST_HINT);
                    return Ok(ExitCode::from(2));
                }
                Err(e) => {
                    return Err(e)
                        .with_context(|| format!("failed to read {}", artifact.display()))
                }
            };

            let summary = forest.summary();
            let params = forest.params();
            println!("Artifact: {}", store.location());
            println!("Model: {}", summary.model_type);
            println!("Trees: {}", forest.n_trees());
            println!(
                "Hyperparameters: seed={} max_depth={} min_samples_split={} min_samples_leaf={} max_features={:?}",
                params.seed,
                params
                    .max_depth
                    .map_or_else(|| "none".to_string(), |d| d.to_string()),
                params.min_samples_split,
                params.min_samples_leaf,
                params.max_features
            );
            let deepest = forest.trees().iter().map(|t| t.depth()).max().unwrap_or(0);
            let leaves: usize = forest.trees().iter().map(|t| t.n_leaves()).sum();
            println!("Deepest tree: {}  Total leaves: {}", deepest, leaves);
            println!("Feature importances:");
            for (name, importance) in summary
                .feature_names
                .iter()
                .zip(&summary.feature_importances)
            {
                println!("  {:<8} {:.4}", name, importance);
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn train(config: &Config, dataset: PathBuf, artifact: PathBuf, json: bool) -> anyhow::Result<()> {
    println!("Training process started...");

    let cleaned = DatasetLoader::new()
        .load_path(&dataset)
        .with_context(|| format!("failed to load dataset {}", dataset.display()))?;

    let store: Arc<dyn ModelStore> = Arc::new(FileModelStore::new(&artifact));
    let trainer = Trainer::new(config.training.forest_params(), store);
    let report = trainer.train_cleaned(&cleaned).context("training failed")?;

    println!("Model training complete.");
    println!("Model saved to {}", report.artifact_location);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &TrainingReport) {
    println!();
    if let Some(cleaning) = &report.cleaning {
        println!("Rows read:            {}", cleaning.rows_read);
        println!("Rows missing diet:    {}", cleaning.rows_missing_diet);
        println!("Rows out of scope:    {}", cleaning.rows_out_of_scope);
        println!("Rows kept:            {}", cleaning.rows_kept);
        for (i, name) in FEATURE_NAMES.iter().enumerate() {
            let median = cleaning.medians[i].map_or_else(|| "-".to_string(), |m| format!("{}", m));
            println!(
                "Imputed {:<8}      {} (median {})",
                name, cleaning.imputed[i], median
            );
        }
    }
    for diet in Diet::ALL {
        println!(
            "{:<21} {}",
            format!("{}:", diet.category()),
            report.class_counts[diet.index()]
        );
    }
    println!("Trees:                {}", report.n_trees);
    println!(
        "Training accuracy:    {:.2}% (training set, informational)",
        report.training_accuracy * 100.0
    );
}

fn print_prediction(diet: Diet, confidence: f64, features: &FeatureVector) {
    println!("The dinosaur was likely a {}.", diet.display_name());
    println!("{}", diet.caption());
    println!("Confidence Level: {:.2}%", confidence * 100.0);
    println!();
    println!("Length: {} meters", features.length_m);
    println!("Lived Between: {} and {} Mya", features.max_ma, features.min_ma);
}
