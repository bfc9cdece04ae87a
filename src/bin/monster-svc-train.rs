//! Train the monster classifier once, print held-out scores and export the model.

use std::path::PathBuf;

use monster_svc::dataset::ColumnSelector;
use monster_svc::registry::{FolderRegistry, ModelRegistry};
use monster_svc::{config, logging, startup};

struct CliOptions {
    config: Option<PathBuf>,
    dataset: PathBuf,
    model_out: PathBuf,
    seed: Option<u64>,
    test_fraction: Option<f64>,
    features: Option<Vec<ColumnSelector>>,
    label: Option<ColumnSelector>,
    name: Option<String>,
    registry: Option<PathBuf>,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let options = parse_args(std::env::args().skip(1).collect())?;
    let mut config = match &options.config {
        Some(path) => config::load_from(path).map_err(|err| err.to_string())?,
        None => config::ServiceConfig::default(),
    };
    config.dataset.path = options.dataset.clone();
    if let Some(seed) = options.seed {
        config.training.seed = seed;
    }
    if let Some(fraction) = options.test_fraction {
        config.training.test_fraction = fraction;
    }
    if let Some(features) = options.features {
        config.dataset.feature_columns = features;
    }
    if let Some(label) = options.label {
        config.dataset.label_column = label;
    }
    if let Some(name) = options.name {
        config.model.name = name;
    }
    config.validate().map_err(|err| err.to_string())?;
    let _logs = logging::init(logging::TRAINER_PREFIX, &config.logging).unwrap_or_else(|err| {
        eprintln!("File logging disabled: {err}");
        if let Err(err) = logging::init_stdout(&config.logging.level) {
            eprintln!("Logging disabled: {err}");
        }
        logging::LogSession::default()
    });

    let trained = startup::train_from_config(&config)
        .inspect_err(|err| tracing::error!("{err}"))
        .map_err(|err| err.to_string())?;
    let evaluation = &trained.evaluation;
    println!(
        "Test accuracy: {:.4} ({} rows, {} with unseen labels)",
        evaluation.accuracy, evaluation.rows, evaluation.unseen_labels
    );
    for class in &evaluation.per_class {
        println!(
            "  {:<12} precision {:.4}  recall {:.4}  support {}",
            class.class_id, class.precision, class.recall, class.support
        );
    }

    let json = trained
        .wrapper
        .to_json_pretty()
        .map_err(|err| err.to_string())?;
    if let Some(parent) = options.model_out.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .map_err(|err| format!("Failed to create {}: {err}", parent.display()))?;
    }
    std::fs::write(&options.model_out, json)
        .map_err(|err| format!("Failed to write {}: {err}", options.model_out.display()))?;
    println!(
        "Wrote {} (fingerprint {})",
        options.model_out.display(),
        trained.wrapper.fingerprint()
    );

    if let Some(root) = options.registry {
        let registry = FolderRegistry::new(root);
        let version = registry
            .save(trained.wrapper.name(), &trained.wrapper)
            .map_err(|err| err.to_string())?;
        println!("Saved {} version {version}", trained.wrapper.name());
    }
    Ok(())
}

fn parse_args(args: Vec<String>) -> Result<CliOptions, String> {
    let mut config = None;
    let mut dataset: Option<PathBuf> = None;
    let mut model_out = PathBuf::from("model.json");
    let mut seed = None;
    let mut test_fraction = None;
    let mut features = None;
    let mut label = None;
    let mut name = None;
    let mut registry = None;

    let mut idx = 0usize;
    while idx < args.len() {
        let flag = args[idx].as_str();
        if matches!(flag, "-h" | "--help") {
            return Err(help_text());
        }
        idx += 1;
        let value = args
            .get(idx)
            .ok_or_else(|| format!("{flag} requires a value"))?;
        match flag {
            "--config" => config = Some(PathBuf::from(value)),
            "--dataset" => dataset = Some(PathBuf::from(value)),
            "--out" => model_out = PathBuf::from(value),
            "--seed" => {
                seed = Some(
                    value
                        .parse::<u64>()
                        .map_err(|_| format!("Invalid --seed value: {value}"))?,
                );
            }
            "--test-fraction" => {
                test_fraction = Some(
                    value
                        .parse::<f64>()
                        .map_err(|_| format!("Invalid --test-fraction value: {value}"))?,
                );
            }
            "--features" => {
                features = Some(value.split(',').map(parse_column).collect::<Vec<_>>());
            }
            "--label" => label = Some(parse_column(value)),
            "--name" => name = Some(value.clone()),
            "--registry" => registry = Some(PathBuf::from(value)),
            unknown => return Err(format!("Unknown argument: {unknown}\n\n{}", help_text())),
        }
        idx += 1;
    }

    let dataset = dataset.ok_or_else(|| format!("--dataset is required\n\n{}", help_text()))?;
    Ok(CliOptions {
        config,
        dataset,
        model_out,
        seed,
        test_fraction,
        features,
        label,
        name,
        registry,
    })
}

fn parse_column(value: &str) -> ColumnSelector {
    let value = value.trim();
    match value.parse::<usize>() {
        Ok(index) => ColumnSelector::Index(index),
        Err(_) => ColumnSelector::Name(value.to_string()),
    }
}

fn help_text() -> String {
    [
        "monster-svc-train",
        "",
        "Trains the scaler + linear SVM pipeline on a dataset and exports the model wrapper.",
        "",
        "Usage:",
        "  monster-svc-train --dataset <file> [--out model.json] [options]",
        "",
        "Options:",
        "  --dataset <file>        Arrow IPC / Feather or CSV file (required).",
        "  --out <file>            Output model path (default: model.json).",
        "  --config <file>         Start from a TOML config instead of defaults.",
        "  --seed <n>              Split and solver seed (default: 500).",
        "  --test-fraction <f>     Held-out fraction in (0, 1) (default: 0.2).",
        "  --features <cols>       Comma-separated feature columns, by index or name (default: 1,2).",
        "  --label <col>           Label column, by index or name (default: monster_real).",
        "  --name <name>           Model name (default: isabel.zimmerman/scooby-doo).",
        "  --registry <dir>        Also save into a folder registry rooted at <dir>.",
    ]
    .join("\n")
}
