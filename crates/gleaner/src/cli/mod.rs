pub mod run;
pub mod validate;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "glnr",
    about = "Bulk structured-field extraction from scanned documents",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Discover documents, run extraction jobs, and export the CSV artifact
    Run {
        /// Input location containing the source documents
        #[arg(long)]
        input: String,
        /// Output location for the uploaded artifact
        #[arg(long)]
        output: String,
        /// Configuration file (TOML)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Template info file written by the provisioning step
        #[arg(long = "template-info", default_value = "template_info.json")]
        template_info: PathBuf,
        /// Template reference, bypassing the info file
        #[arg(long)]
        template: Option<String>,
        /// Override the artifact filename (disables the timestamp suffix)
        #[arg(long = "output-file")]
        output_file: Option<String>,
        /// Directory for the local copy of the artifact
        #[arg(long = "output-dir", default_value = ".")]
        output_dir: PathBuf,
        /// Skip uploading the artifact after the local write
        #[arg(long = "no-upload")]
        no_upload: bool,
        /// List discovered documents without submitting anything
        #[arg(long = "dry-run")]
        dry_run: bool,
    },
    /// Pre-flight checks: configuration, provisioning, input reachability
    Validate {
        /// Configuration file (TOML)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Template info file written by the provisioning step
        #[arg(long = "template-info", default_value = "template_info.json")]
        template_info: PathBuf,
        /// Input location to probe
        #[arg(long)]
        input: Option<String>,
    },
}

/// Load the configuration: an explicit path must parse, otherwise
/// `gleaner.toml` is used when present, and defaults apply when not.
pub fn load_config(path: Option<&PathBuf>) -> anyhow::Result<gleaner_core::PipelineConfig> {
    match path {
        Some(path) => Ok(gleaner_core::PipelineConfig::load(path)?),
        None => {
            let fallback = PathBuf::from("gleaner.toml");
            if fallback.exists() {
                Ok(gleaner_core::PipelineConfig::load(&fallback)?)
            } else {
                Ok(gleaner_core::PipelineConfig::default())
            }
        }
    }
}
