use clap::Parser;
use nuget_analyzer::{AnalyzerConfig, render, run};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Resolves the NuGet dependency tree of a .NET project.
#[derive(Debug, Parser)]
#[command(name = "nuget-analyzer", version, about)]
struct Args {
    /// packages.config or SDK-style project file (*.csproj, *.fsproj, *.vbproj)
    definition_file: PathBuf,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print JSON on a single line
    #[arg(long)]
    compact: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let outcome = async {
        let config = AnalyzerConfig::load(args.config.as_deref()).await?;
        let result = run(&args.definition_file, &config).await?;
        render(&result, args.compact)
    }
    .await;

    match outcome {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("analysis of {} failed: {}", args.definition_file.display(), e);
            ExitCode::FAILURE
        }
    }
}
