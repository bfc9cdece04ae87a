//! Entry point for the prediction service: train at startup, then serve.

use std::path::PathBuf;

use monster_svc::registry::ModelRegistry;
use monster_svc::serve::{Server, shutdown_signal};
use monster_svc::{config, logging, startup};

struct CliOptions {
    config: Option<PathBuf>,
    port: Option<u16>,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), String> {
    let options = parse_args(std::env::args().skip(1).collect())?;
    let mut config = config::load(options.config.as_deref()).map_err(|err| err.to_string())?;
    if let Some(port) = options.port {
        config.server.port = port;
    }
    let _logs = logging::init(logging::SERVER_PREFIX, &config.logging).unwrap_or_else(|err| {
        eprintln!("File logging disabled: {err}");
        if let Err(err) = logging::init_stdout(&config.logging.level) {
            eprintln!("Logging disabled: {err}");
        }
        logging::LogSession::default()
    });
    match &options.config {
        Some(path) => tracing::info!("Loaded config from {}", path.display()),
        None => tracing::info!("Using app directory config or defaults"),
    }
    serve(config).await.inspect_err(|err| tracing::error!("{err}"))
}

async fn serve(config: config::ServiceConfig) -> Result<(), String> {
    let registry = startup::registry_from_config(&config);
    let (wrapper, config) = tokio::task::spawn_blocking(move || {
        let registry = registry.as_ref().map(|r| r as &dyn ModelRegistry);
        startup::prepare_model(&config, registry).map(|wrapper| (wrapper, config))
    })
    .await
    .map_err(|err| format!("Startup task failed: {err}"))?
    .map_err(|err| err.to_string())?;

    Server::new(wrapper)
        .run(&config.server.bind_addr(), shutdown_signal())
        .await
        .map_err(|err| err.to_string())
}

fn parse_args(args: Vec<String>) -> Result<CliOptions, String> {
    let mut config = None;
    let mut port = None;
    let mut idx = 0usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "-h" | "--help" => return Err(help_text()),
            "--config" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--config requires a value".to_string())?;
                config = Some(PathBuf::from(value));
            }
            "--port" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--port requires a value".to_string())?;
                port = Some(
                    value
                        .parse::<u16>()
                        .map_err(|_| format!("Invalid --port value: {value}"))?,
                );
            }
            unknown => return Err(format!("Unknown argument: {unknown}\n\n{}", help_text())),
        }
        idx += 1;
    }
    Ok(CliOptions { config, port })
}

fn help_text() -> String {
    [
        "monster-svc",
        "",
        "Trains the monster classifier from the configured dataset and serves predictions.",
        "",
        "Usage:",
        "  monster-svc [--config <file>] [--port <n>]",
        "",
        "Options:",
        "  --config <file>  TOML config (default: config.toml in the app directory).",
        "  --port <n>       Listening port (overrides config and MONSTER_SVC_PORT).",
    ]
    .join("\n")
}
