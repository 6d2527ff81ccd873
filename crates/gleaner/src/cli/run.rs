use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use tokio::sync::mpsc;

use gleaner_core::{
    ExtractionPipeline, HttpExtractionClient, JobCompletion, JobState, LocalStore, RunReport,
    TemplateRef,
};

pub struct RunArgs {
    pub input: String,
    pub output: String,
    pub config: Option<PathBuf>,
    pub template_info: PathBuf,
    pub template: Option<String>,
    pub output_file: Option<String>,
    pub output_dir: PathBuf,
    pub no_upload: bool,
    pub dry_run: bool,
}

pub async fn run(args: RunArgs) -> anyhow::Result<()> {
    let mut config = super::load_config(args.config.as_ref())?;

    if let Some(name) = args.output_file {
        config.output.csv_filename = name;
        config.output.include_timestamp = false;
    }
    config.validate_for_run()?;

    let template = match args.template {
        Some(reference) => TemplateRef::new(reference),
        None => gleaner_core::load_template_ref(&args.template_info)?,
    };
    tracing::info!(template = %template, "using extraction template");

    let client = HttpExtractionClient::new(&config.service.endpoint)?;
    let store = LocalStore::new();

    let (progress_tx, mut progress_rx) = mpsc::unbounded_channel::<JobCompletion>();
    let bar = make_progress_bar();
    let bar_task = {
        let bar = bar.clone();
        tokio::spawn(async move {
            while let Some(event) = progress_rx.recv().await {
                bar.inc(1);
                bar.set_message(format!("{} ({})", event.filename, event.state));
            }
        })
    };

    let pipeline = ExtractionPipeline::new(
        Arc::new(store),
        Arc::new(client),
        config,
        template,
    )
    .with_progress(progress_tx)
    .with_upload(!args.no_upload);

    let report = pipeline
        .run(&args.input, &args.output, &args.output_dir, args.dry_run)
        .await
        .context("pipeline run failed")?;

    bar.finish_and_clear();
    bar_task.abort();

    print_report(&report, args.dry_run);
    Ok(())
}

fn print_report(report: &RunReport, dry_run: bool) {
    if dry_run {
        println!("Dry run: {} documents discovered, nothing submitted", report.summary.total);
        return;
    }

    println!("Processed {} documents", report.summary.total);
    println!("  succeeded: {}", report.summary.succeeded);
    println!("  failed:    {}", report.summary.failed);
    println!("  timed out: {}", report.summary.timed_out);

    for record in &report.records {
        if record.final_state != JobState::Succeeded {
            tracing::warn!(
                document = %record.document,
                state = %record.final_state,
                error = %record.error_message,
                "document did not succeed"
            );
        }
    }

    if let Some(path) = &report.artifact_path {
        println!("Results written to: {}", path.display());
    }
    if let Some(uri) = &report.uploaded_uri {
        println!("Results uploaded to: {uri}");
    }
}

fn make_progress_bar() -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} [{elapsed_precise}] {pos} docs done {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.set_draw_target(ProgressDrawTarget::stderr_with_hz(12));
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}
