use crate::cli::Cli;
use crate::config::PartialToolConfig;
use crate::error::Result;
use crate::ui::{CliProgressHandler, UiEvent};
use abprof::core::{discovery, report};
use abprof::engine::aggregate::AggregateStatus;
use abprof::engine::pipeline::ExternalPipeline;
use abprof::engine::progress::ProgressReporter;
use abprof::workflows;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

pub async fn run(args: Cli, ui_sender: mpsc::Sender<UiEvent>) -> Result<()> {
    let partial_config = match &args.config {
        Some(path) => PartialToolConfig::from_file(path)?,
        None => PartialToolConfig::default(),
    };
    info!("Merging configuration from file and CLI arguments...");
    let config = partial_config.merge_with_cli(&args)?;

    info!("Discovering input structures in {:?}", &config.input);
    let structures = discovery::discover_structures(&config.input)?;
    if structures.is_empty() {
        warn!("No .pdb structures found under {:?}", &config.input);
        println!(
            "Warning: no .pdb structures found under {}",
            config.input.display()
        );
    } else {
        info!(
            "Discovered {} structure(s); scheduling {} repeat(s) each.",
            structures.len(),
            config.run.repeats
        );
    }

    let pipeline = Arc::new(ExternalPipeline::new(config.pipeline.clone())?);

    let (cancel_sender, cancel_receiver) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; finishing with partial results.");
            let _ = cancel_sender.send(true);
        }
    });

    let progress_handler = CliProgressHandler::new(ui_sender);
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!(
        "Profiling {} structure(s) × {} repeat(s)...",
        structures.len(),
        config.run.repeats
    );

    let result = workflows::profile::run(
        structures,
        &config.run,
        pipeline,
        &reporter,
        cancel_receiver,
    )
    .await?;

    report::write_report(&result, &config.output)?;

    let partial = result
        .structures
        .values()
        .filter(|s| s.status == AggregateStatus::Partial)
        .count();
    let failed_repeats: u32 = result.structures.values().map(|s| s.summary.failures).sum();

    if partial > 0 {
        println!(
            "Warning: {partial} structure(s) are incomplete; their aggregates are marked partial."
        );
    }
    if failed_repeats > 0 {
        println!("Note: {failed_repeats} repeat(s) failed; details are recorded in the report.");
    }
    println!(
        "Processing complete in {:.2} seconds. Results saved to {}",
        result.metadata.wall_time_secs,
        config.output.display()
    );

    Ok(())
}
