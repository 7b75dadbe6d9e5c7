//! `geosnap run` - one export job from the terminal.

use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use super::{build_pipeline, EndpointArgs};
use crate::error::CliError;

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Place name to export imagery for.
    #[arg(long, env = "GEOSNAP_LOCATION", value_name = "NAME")]
    pub location: String,

    /// Path the manifest JSON is written to.
    #[arg(
        long,
        env = "GEOSNAP_OUTPUT_JSON",
        value_name = "FILE",
        default_value = "output.json"
    )]
    pub output: PathBuf,

    #[command(flatten)]
    pub endpoints: EndpointArgs,
}

pub fn run(args: RunArgs) -> Result<(), CliError> {
    let settings = args.endpoints.resolve()?;
    let pipeline = build_pipeline(&settings)?;

    // Ctrl+C cancels the export poll loop instead of killing the
    // process mid-download.
    let cancel = pipeline.cancel_token();
    ctrlc::set_handler(move || {
        eprintln!();
        eprintln!("Received interrupt, cancelling export...");
        cancel.cancel();
    })
    .map_err(|e| CliError::Setup(format!("failed to set signal handler: {}", e)))?;

    println!("Exporting imagery for \"{}\"", args.location);
    println!(
        "  Collection: {} ({}..{})",
        pipeline.config().query.collection,
        pipeline.config().query.start_date,
        pipeline.config().query.end_date
    );
    println!("  Downloads:  {}", pipeline.config().downloads_dir.display());
    println!();

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message("running export pipeline");

    let result = pipeline.run(&args.location, &args.output);
    spinner.finish_and_clear();

    let manifest = result?;
    let snapshot = pipeline.metrics().snapshot();
    info!(
        polls = snapshot.export_polls,
        bytes = snapshot.bytes_downloaded,
        "pipeline run finished"
    );

    println!("Export complete.");
    println!("  Capture date: {}", manifest.date);
    println!("  Raster:       {}", manifest.tif);
    println!("  Previews:     {}", manifest.png.rgb);
    println!("                {}", manifest.png.ndvi);
    println!("                {}", manifest.png.ndbi);
    println!("  Manifest:     {}", args.output.display());

    Ok(())
}
