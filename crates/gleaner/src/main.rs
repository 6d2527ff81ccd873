mod cli;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let parsed = Cli::parse();

    match parsed.command {
        Commands::Run {
            input,
            output,
            config,
            template_info,
            template,
            output_file,
            output_dir,
            no_upload,
            dry_run,
        } => {
            cli::run::run(cli::run::RunArgs {
                input,
                output,
                config,
                template_info,
                template,
                output_file,
                output_dir,
                no_upload,
                dry_run,
            })
            .await
        }
        Commands::Validate {
            config,
            template_info,
            input,
        } => {
            cli::validate::run(cli::validate::ValidateArgs {
                config,
                template_info,
                input,
            })
            .await
        }
    }
}
