//! sitepipe CLI tool.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::Overrides;

#[derive(Parser)]
#[command(name = "sitepipe")]
#[command(about = "Plan and deploy static sites behind a CDN", long_about = None)]
struct Cli {
    /// Path to the site configuration file
    #[arg(
        long,
        env = "SITEPIPE_CONFIG",
        default_value = sitepipe_config::site::DEFAULT_CONFIG_FILE
    )]
    config: PathBuf,

    /// Target environment (overrides SITEPIPE_ENV / CDK_ENV / DEPLOY_ENV)
    #[arg(long, short)]
    environment: Option<String>,

    /// Target account (overrides SITEPIPE_ACCOUNT / CDK_DEFAULT_ACCOUNT /
    /// AWS_DEFAULT_ACCOUNT_ID)
    #[arg(long)]
    account: Option<String>,

    /// Target region (overrides SITEPIPE_REGION / CDK_DEFAULT_REGION / AWS_DEFAULT_REGION)
    #[arg(long)]
    region: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the identifiers derived for the environment
    Resolve,
    /// Build the deployment unit and print it
    Synth {
        /// Also write the unit manifest into this directory
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Check the hosted zone and submit the deployment unit
    Deploy {
        /// Directory the manifest engine writes to
        #[arg(long, default_value = "sitepipe.out")]
        out: PathBuf,
    },
    /// Validate the configuration and the resulting plan
    Validate,
    /// Walk the plan locally without touching any service
    Rehearse {
        /// Make the named action or resource fail
        #[arg(long)]
        fail: Vec<String>,
    },
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let overrides = Overrides {
        environment: cli.environment,
        account: cli.account,
        region: cli.region,
    };

    match cli.command {
        Commands::Resolve => {
            commands::resolve(&cli.config, &overrides)?;
        }
        Commands::Synth { out } => {
            commands::deploy::synth(&cli.config, &overrides, out.as_deref()).await?;
        }
        Commands::Deploy { out } => {
            commands::deploy::deploy(&cli.config, &overrides, &out).await?;
        }
        Commands::Validate => {
            commands::validate(&cli.config, &overrides)?;
        }
        Commands::Rehearse { fail } => {
            commands::rehearse::rehearse(&cli.config, &overrides, fail).await?;
        }
    }

    Ok(())
}
