use clap::{command, Parser};
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use workflow::{config::SystemConfig, system::System, WorkflowError};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Read the program from a file instead of the command line
    #[arg(short, long, conflicts_with = "expression")]
    file: Option<PathBuf>,

    /// Enable debug mode
    #[arg(short, long)]
    verbose: bool,

    /// Program to evaluate, e.g. "any(add(1, 3), mul(4, 5))"
    #[arg(required_unless_present = "file")]
    expression: Option<String>,
}

async fn run(cli: &Cli) -> Result<(), WorkflowError> {
    let config = if cli.config.exists() {
        SystemConfig::from_file(&cli.config)?
    } else {
        SystemConfig::default()
    };

    info!("config loaded.");
    debug!("config: {:?}", config);

    let source = match (&cli.file, &cli.expression) {
        (Some(path), _) => std::fs::read_to_string(path)?,
        (None, Some(expression)) => expression.clone(),
        (None, None) => return Err(WorkflowError::internal("nothing to evaluate")),
    };

    let system = System::new(config).await?;
    let value = system.evaluate(&source).await?;
    println!("{}", value);

    system.shutdown();
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Err(e) = run(&cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
